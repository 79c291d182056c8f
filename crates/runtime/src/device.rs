//! Port/device protocol
//!
//! I/O backends plug into the core as **devices**: records with a command
//! dispatcher indexed by [`RequestCode`]. The core submits [`Request`]s and
//! interprets the result: `Done` completes synchronously, `Pending` parks
//! the request on the device's queue until a later poll, `Error` carries a
//! backend code. Real file/network/serial backends live with the host; the
//! in-memory [`LoopbackDevice`] exercises the contract in tests.

use std::collections::VecDeque;

use bitflags::bitflags;

/// Standard command codes. Devices may define custom codes at and above
/// [`RequestCode::CUSTOM_BASE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestCode {
    Init,
    Quit,
    Open,
    Close,
    Read,
    Write,
    Poll,
    Connect,
    Query,
    Modify,
    Create,
    Delete,
    Rename,
    Lookup,
    Custom(u8),
}

impl RequestCode {
    pub const CUSTOM_BASE: u8 = 32;

    pub fn code(self) -> u8 {
        match self {
            RequestCode::Init => 0,
            RequestCode::Quit => 1,
            RequestCode::Open => 2,
            RequestCode::Close => 3,
            RequestCode::Read => 4,
            RequestCode::Write => 5,
            RequestCode::Poll => 6,
            RequestCode::Connect => 7,
            RequestCode::Query => 8,
            RequestCode::Modify => 9,
            RequestCode::Create => 10,
            RequestCode::Delete => 11,
            RequestCode::Rename => 12,
            RequestCode::Lookup => 13,
            RequestCode::Custom(code) => code,
        }
    }
}

/// Dispatcher verdict for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceResult {
    Pending,
    Done,
    Error(u32),
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RequestFlags: u32 {
        const OPEN = 1 << 0;
        const READ = 1 << 1;
        const WRITE = 1 << 2;
        const PENDING = 1 << 3;
    }
}

/// Device-specific tail of a request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RequestTarget {
    #[default]
    None,
    File {
        path: String,
        index: u64,
    },
    Net {
        address: [u8; 4],
        port: u16,
    },
    Serial {
        path: String,
        baud: u32,
    },
}

/// One I/O request record.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Request {
    pub device: usize,
    pub command: u8,
    pub error: u32,
    pub modes: u32,
    pub flags: RequestFlags,
    pub state: u32,
    pub timeout_ms: Option<u64>,
    /// Transfer buffer and the byte count actually moved.
    pub data: Vec<u8>,
    pub actual: usize,
    pub target: RequestTarget,
}

impl Request {
    pub fn new(device: usize, command: RequestCode) -> Request {
        Request {
            device,
            command: command.code(),
            ..Request::default()
        }
    }
}

/// An I/O backend.
pub trait Device {
    fn name(&self) -> &'static str;
    fn dispatch(&mut self, request: &mut Request) -> DeviceResult;
}

/// The device registry with per-device pending queues.
#[derive(Default)]
pub struct DeviceTable {
    devices: Vec<Box<dyn Device>>,
    pending: Vec<VecDeque<Request>>,
}

impl DeviceTable {
    pub fn new() -> DeviceTable {
        DeviceTable::default()
    }

    pub fn register(&mut self, device: Box<dyn Device>) -> usize {
        self.devices.push(device);
        self.pending.push(VecDeque::new());
        self.devices.len() - 1
    }

    /// Submit a request. `Pending` parks it on the device's queue; the
    /// caller gets the verdict either way.
    pub fn do_device(&mut self, mut request: Request) -> (DeviceResult, Option<Request>) {
        let id = request.device;
        let result = self.devices[id].dispatch(&mut request);
        match result {
            DeviceResult::Pending => {
                request.flags |= RequestFlags::PENDING;
                self.pending[id].push_back(request);
                (result, None)
            }
            _ => (result, Some(request)),
        }
    }

    /// Re-dispatch parked requests; completed ones are returned.
    pub fn poll_pending(&mut self, device: usize) -> Vec<(DeviceResult, Request)> {
        let mut finished = Vec::new();
        let queue_len = self.pending[device].len();
        for _ in 0..queue_len {
            let mut request = self.pending[device].pop_front().expect("queue length checked");
            let result = self.devices[device].dispatch(&mut request);
            match result {
                DeviceResult::Pending => self.pending[device].push_back(request),
                _ => {
                    request.flags -= RequestFlags::PENDING;
                    finished.push((result, request));
                }
            }
        }
        finished
    }

    pub fn pending_count(&self, device: usize) -> usize {
        self.pending[device].len()
    }
}

/// In-memory byte-echo device: WRITE queues bytes, READ drains them, POLL
/// answers Pending while empty. Exists to pin down the protocol.
#[derive(Debug, Default)]
pub struct LoopbackDevice {
    open: bool,
    buffered: VecDeque<u8>,
}

impl Device for LoopbackDevice {
    fn name(&self) -> &'static str {
        "loopback"
    }

    fn dispatch(&mut self, request: &mut Request) -> DeviceResult {
        const NOT_OPEN: u32 = 1;
        match request.command {
            c if c == RequestCode::Init.code() => DeviceResult::Done,
            c if c == RequestCode::Open.code() => {
                self.open = true;
                request.flags |= RequestFlags::OPEN;
                DeviceResult::Done
            }
            c if c == RequestCode::Close.code() => {
                self.open = false;
                request.flags -= RequestFlags::OPEN;
                DeviceResult::Done
            }
            c if c == RequestCode::Write.code() => {
                if !self.open {
                    request.error = NOT_OPEN;
                    return DeviceResult::Error(NOT_OPEN);
                }
                self.buffered.extend(request.data.iter().copied());
                request.actual = request.data.len();
                DeviceResult::Done
            }
            c if c == RequestCode::Read.code() => {
                if !self.open {
                    request.error = NOT_OPEN;
                    return DeviceResult::Error(NOT_OPEN);
                }
                if self.buffered.is_empty() {
                    return DeviceResult::Pending;
                }
                let wanted = request.data.capacity().max(self.buffered.len());
                request.data.clear();
                while request.data.len() < wanted {
                    match self.buffered.pop_front() {
                        Some(byte) => request.data.push(byte),
                        None => break,
                    }
                }
                request.actual = request.data.len();
                DeviceResult::Done
            }
            c if c == RequestCode::Poll.code() => {
                if self.buffered.is_empty() {
                    DeviceResult::Pending
                } else {
                    DeviceResult::Done
                }
            }
            _ => DeviceResult::Error(u32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_loopback() -> (DeviceTable, usize) {
        let mut table = DeviceTable::new();
        let id = table.register(Box::new(LoopbackDevice::default()));
        let (result, _) = table.do_device(Request::new(id, RequestCode::Open));
        assert_eq!(result, DeviceResult::Done);
        (table, id)
    }

    #[test]
    fn loopback_round_trips_bytes() {
        let (mut table, id) = open_loopback();

        let mut write = Request::new(id, RequestCode::Write);
        write.data = b"ping".to_vec();
        let (result, done) = table.do_device(write);
        assert_eq!(result, DeviceResult::Done);
        assert_eq!(done.unwrap().actual, 4);

        let (result, done) = table.do_device(Request::new(id, RequestCode::Read));
        assert_eq!(result, DeviceResult::Done);
        assert_eq!(done.unwrap().data, b"ping");
    }

    #[test]
    fn empty_reads_park_until_data_arrives() {
        let (mut table, id) = open_loopback();

        let (result, _) = table.do_device(Request::new(id, RequestCode::Read));
        assert_eq!(result, DeviceResult::Pending);
        assert_eq!(table.pending_count(id), 1);

        let mut write = Request::new(id, RequestCode::Write);
        write.data = b"late".to_vec();
        table.do_device(write);

        let finished = table.poll_pending(id);
        assert_eq!(finished.len(), 1);
        assert_eq!(finished[0].1.data, b"late");
        assert_eq!(table.pending_count(id), 0);
    }

    #[test]
    fn poll_on_empty_device_is_pending() {
        let (mut table, id) = open_loopback();
        let (result, _) = table.do_device(Request::new(id, RequestCode::Poll));
        assert_eq!(result, DeviceResult::Pending);
    }

    #[test]
    fn unopened_device_errors() {
        let mut table = DeviceTable::new();
        let id = table.register(Box::new(LoopbackDevice::default()));
        let mut write = Request::new(id, RequestCode::Write);
        write.data = b"x".to_vec();
        let (result, _) = table.do_device(write);
        assert!(matches!(result, DeviceResult::Error(_)));
    }
}

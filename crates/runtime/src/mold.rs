//! Mold and form: rendering values to text
//!
//! `mold` produces re-loadable text; `form` produces human text (strings
//! unquoted). Arrays being visited sit on the engine's mold stack — a
//! visited set keyed by node identity — so self-referencing structures
//! render `...` instead of recursing forever. The mold stack depth is part
//! of the trap snapshot, keeping unwinds balanced.

use revel_core::{Cell, ContextKind, ListKind, NodeId, Payload, WordKind};

use crate::engine::Engine;

impl Engine {
    /// Re-loadable rendering.
    pub fn mold_value(&mut self, cell: &Cell) -> String {
        self.render(cell, true)
    }

    /// Human-facing rendering.
    pub fn form_value(&mut self, cell: &Cell) -> String {
        self.render(cell, false)
    }

    fn render(&mut self, cell: &Cell, molded: bool) -> String {
        match cell.payload {
            Payload::End => "~end~".to_string(),
            Payload::Void => String::new(),
            Payload::Blank => "_".to_string(),
            Payload::Logic(b) => if b { "true" } else { "false" }.to_string(),
            Payload::Integer(n) => n.to_string(),
            Payload::Decimal(f) => {
                if f.fract() == 0.0 && f.is_finite() && f.abs() < 1e15 {
                    format!("{f:.1}")
                } else {
                    format!("{f}")
                }
            }
            Payload::Char(c) => {
                if molded {
                    format!("#\"{c}\"")
                } else {
                    c.to_string()
                }
            }
            Payload::Datatype(kind) => kind.name().to_string(),
            Payload::Typeset { .. } => "typeset!".to_string(),
            Payload::Word { kind, spelling, .. } => {
                let name = self.symbols.spelling(spelling).to_string();
                match kind {
                    WordKind::Word => name,
                    WordKind::SetWord => format!("{name}:"),
                    WordKind::GetWord => format!(":{name}"),
                    WordKind::LitWord => format!("'{name}"),
                    WordKind::Refinement => format!("/{name}"),
                }
            }
            Payload::List { kind, node, index, .. } => self.render_list(kind, node, index, molded),
            Payload::Text { node, index } => {
                let text: String = self
                    .heap
                    .node(node)
                    .as_str()
                    .chars()
                    .skip(index as usize)
                    .collect();
                if molded {
                    let escaped = text.replace('^', "^^").replace('"', "^\"").replace('\n', "^/");
                    format!("\"{escaped}\"")
                } else {
                    text
                }
            }
            Payload::Binary { node, index } => {
                let bytes = self.heap.node(node).bytes();
                let hex: String = bytes
                    .iter()
                    .skip(index as usize)
                    .map(|b| format!("{b:02X}"))
                    .collect();
                format!("#{{{hex}}}")
            }
            Payload::Context { kind, varlist } => self.render_context(kind, varlist, molded),
            Payload::Function { .. } => "#[function!]".to_string(),
            Payload::Map { pairlist } => {
                let body = self.render_span(pairlist, 0, molded);
                format!("#[map! [{body}]]")
            }
            Payload::Handle { id } => format!("#[handle! {id}]"),
        }
    }

    fn render_list(&mut self, kind: ListKind, node: NodeId, index: u32, molded: bool) -> String {
        if self.mold_stack.contains(&node) {
            return match kind {
                ListKind::Block => "[...]".to_string(),
                ListKind::Group => "(...)".to_string(),
                _ => "...".to_string(),
            };
        }
        self.mold_stack.push(node);
        let body = if kind.kind().is_path() {
            let len = self.heap.node(node).len();
            let mut parts = Vec::with_capacity(len);
            for i in index as usize..len {
                let segment = self.heap.node(node).at(i);
                parts.push(self.render(&segment, molded));
            }
            parts.join("/")
        } else {
            self.render_span(node, index, molded)
        };
        self.mold_stack.pop();

        match kind {
            ListKind::Block => format!("[{body}]"),
            ListKind::Group => format!("({body})"),
            ListKind::Path => body,
            ListKind::SetPath => format!("{body}:"),
            ListKind::GetPath => format!(":{body}"),
            ListKind::LitPath => format!("'{body}"),
        }
    }

    fn render_span(&mut self, node: NodeId, index: u32, molded: bool) -> String {
        let len = self.heap.node(node).len();
        let mut parts = Vec::with_capacity(len.saturating_sub(index as usize));
        for i in index as usize..len {
            let cell = self.heap.node(node).at(i);
            parts.push(self.render(&cell, molded));
        }
        parts.join(" ")
    }

    fn render_context(&mut self, kind: ContextKind, varlist: NodeId, molded: bool) -> String {
        if self.mold_stack.contains(&varlist) {
            return "make object! [...]".to_string();
        }
        self.mold_stack.push(varlist);
        let keylist = self.keylist_of(varlist);
        let len = self.heap.node(varlist).len();
        let mut parts = Vec::new();
        for index in 1..len {
            let Some(sym) = self.key_sym(keylist, index as u32) else {
                continue;
            };
            let name = self.symbols.spelling(sym).to_string();
            let value = self.var_at(varlist, index as u32);
            let rendered = self.render(&value, molded);
            parts.push(format!("{name}: {rendered}"));
        }
        self.mold_stack.pop();

        let tag = match kind {
            ContextKind::Object => "object!",
            ContextKind::Frame => "frame!",
            ContextKind::Error => "error!",
            ContextKind::Port => "port!",
            ContextKind::Module => "module!",
        };
        format!("make {tag} [{}]", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revel_core::NodeFlags;

    #[test]
    fn molds_scalars_and_words() {
        let mut engine = Engine::new();
        assert_eq!(engine.mold_value(&Cell::integer(42)), "42");
        assert_eq!(engine.mold_value(&Cell::decimal(1.5)), "1.5");
        assert_eq!(engine.mold_value(&Cell::decimal(2.0)), "2.0");
        assert_eq!(engine.mold_value(&Cell::logic(true)), "true");
        assert_eq!(engine.mold_value(&Cell::blank()), "_");

        let sym = engine.symbols.intern("foo");
        assert_eq!(engine.mold_value(&Cell::word(WordKind::SetWord, sym)), "foo:");
        assert_eq!(engine.mold_value(&Cell::word(WordKind::Refinement, sym)), "/foo");
    }

    #[test]
    fn mold_quotes_text_and_form_does_not() {
        let mut engine = Engine::new();
        let node = engine.heap.make_text("hi").unwrap();
        engine.heap.manage(node);
        let cell = Cell::text(node, 0);
        assert_eq!(engine.mold_value(&cell), "\"hi\"");
        assert_eq!(engine.form_value(&cell), "hi");
    }

    #[test]
    fn molds_blocks_recursively() {
        let mut engine = Engine::new();
        let inner = engine.heap.make_array(1, NodeFlags::empty()).unwrap();
        engine.heap.push_cell(inner, Cell::integer(2)).unwrap();
        let outer = engine.heap.make_array(2, NodeFlags::empty()).unwrap();
        engine.heap.push_cell(outer, Cell::integer(1)).unwrap();
        engine
            .heap
            .push_cell(outer, Cell::list(ListKind::Block, inner, 0))
            .unwrap();
        let cell = Cell::list(ListKind::Block, outer, 0);
        assert_eq!(engine.mold_value(&cell), "[1 [2]]");
    }

    #[test]
    fn cyclic_blocks_terminate() {
        let mut engine = Engine::new();
        let node = engine.heap.make_array(1, NodeFlags::empty()).unwrap();
        engine
            .heap
            .push_cell(node, Cell::list(ListKind::Block, node, 0))
            .unwrap();
        let cell = Cell::list(ListKind::Block, node, 0);
        assert_eq!(engine.mold_value(&cell), "[[...]]");
        assert!(engine.mold_stack.is_empty(), "mold stack balanced");
    }
}

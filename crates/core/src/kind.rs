//! Datatype kind tags
//!
//! Every cell carries an 8-bit kind tag in its header byte. Kind `0` is
//! reserved (an all-zero header never looks like a live cell) and the tag
//! space is capped below 63 so two header bits remain available to the
//! end-marker encoding.

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The 8-bit datatype tag stored in a cell header.
///
/// Ordering matters in two places: the word family and the list family are
/// contiguous runs (see [`Kind::is_word`] / [`Kind::is_list`]), and typeset
/// bitsets index bits by this discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Kind {
    Void = 1,
    Blank,
    Logic,
    Integer,
    Decimal,
    Char,

    // Word family (contiguous)
    Word,
    SetWord,
    GetWord,
    LitWord,
    Refinement,

    // List family (contiguous)
    Block,
    Group,
    Path,
    SetPath,
    GetPath,
    LitPath,

    Text,
    Binary,

    // Context family (contiguous)
    Object,
    FrameCtx,
    Error,
    Port,
    Module,

    Function,
    Typeset,
    Datatype,
    Map,
    Handle,
}

/// One past the largest valid kind tag. Must stay below 63 so the tag byte
/// never collides with the end-marker header encoding.
pub const KIND_MAX: u8 = Kind::Handle as u8 + 1;

const _: () = assert!(KIND_MAX <= 63, "kind tags must fit below the end-marker encoding");

impl Kind {
    /// Word-family kinds (`word`, `set-word`, `get-word`, `lit-word`,
    /// `refinement`).
    pub fn is_word(self) -> bool {
        (Kind::Word as u8..=Kind::Refinement as u8).contains(&(self as u8))
    }

    /// List-family kinds backed by a cell array.
    pub fn is_list(self) -> bool {
        (Kind::Block as u8..=Kind::LitPath as u8).contains(&(self as u8))
    }

    /// Path-shaped list kinds.
    pub fn is_path(self) -> bool {
        (Kind::Path as u8..=Kind::LitPath as u8).contains(&(self as u8))
    }

    /// Context-backed kinds (object, frame, error, port, module).
    pub fn is_context(self) -> bool {
        (Kind::Object as u8..=Kind::Module as u8).contains(&(self as u8))
    }

    /// Kinds the evaluator copies to the output untouched. The do-loop may
    /// take its inert shortcut only for these (and only when the next cell
    /// cannot begin an enfix lookup).
    pub fn is_inert(self) -> bool {
        !matches!(
            self,
            Kind::Word
                | Kind::SetWord
                | Kind::GetWord
                | Kind::LitWord
                | Kind::Path
                | Kind::SetPath
                | Kind::GetPath
                | Kind::LitPath
                | Kind::Group
                | Kind::Function
        )
    }

    /// Canonical datatype name, e.g. `integer!`.
    pub fn name(self) -> &'static str {
        match self {
            Kind::Void => "void!",
            Kind::Blank => "blank!",
            Kind::Logic => "logic!",
            Kind::Integer => "integer!",
            Kind::Decimal => "decimal!",
            Kind::Char => "char!",
            Kind::Word => "word!",
            Kind::SetWord => "set-word!",
            Kind::GetWord => "get-word!",
            Kind::LitWord => "lit-word!",
            Kind::Refinement => "refinement!",
            Kind::Block => "block!",
            Kind::Group => "group!",
            Kind::Path => "path!",
            Kind::SetPath => "set-path!",
            Kind::GetPath => "get-path!",
            Kind::LitPath => "lit-path!",
            Kind::Text => "text!",
            Kind::Binary => "binary!",
            Kind::Object => "object!",
            Kind::FrameCtx => "frame!",
            Kind::Error => "error!",
            Kind::Port => "port!",
            Kind::Module => "module!",
            Kind::Function => "function!",
            Kind::Typeset => "typeset!",
            Kind::Datatype => "datatype!",
            Kind::Map => "map!",
            Kind::Handle => "handle!",
        }
    }

    /// Bit for this kind in a typeset bitset.
    pub const fn typeset_bit(self) -> u64 {
        1u64 << (self as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_zero_is_reserved() {
        assert!(Kind::try_from(0u8).is_err());
    }

    #[test]
    fn kind_tags_fit_below_end_encoding() {
        assert!(KIND_MAX <= 63);
        // Every declared kind round-trips through its byte.
        for raw in 1..KIND_MAX {
            let kind = Kind::try_from(raw).expect("contiguous tag space");
            assert_eq!(u8::from(kind), raw);
        }
        assert!(Kind::try_from(KIND_MAX).is_err());
    }

    #[test]
    fn family_ranges() {
        assert!(Kind::SetWord.is_word());
        assert!(!Kind::Block.is_word());
        assert!(Kind::LitPath.is_list());
        assert!(Kind::LitPath.is_path());
        assert!(!Kind::Block.is_path());
        assert!(Kind::Error.is_context());
    }

    #[test]
    fn inert_classification() {
        assert!(Kind::Integer.is_inert());
        assert!(Kind::Block.is_inert());
        assert!(Kind::Refinement.is_inert());
        assert!(!Kind::Word.is_inert());
        assert!(!Kind::Group.is_inert());
        assert!(!Kind::SetPath.is_inert());
    }
}

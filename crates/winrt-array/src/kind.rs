//! Element Kinds
//!
//! The closed set of element types a WinRT array can hold. Each kind has a
//! fixed byte width and a canonical PEP 3118 format string, looked up in a
//! single dispatch table indexed by the kind's discriminant.

use std::ffi::CStr;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ArrayError, ArrayResult};

/// Width of a native pointer, the slot size of the handle kinds.
pub const POINTER_WIDTH: usize = std::mem::size_of::<usize>();

/// Element type of a WinRT array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementKind {
    Bool,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Char16,
    /// HSTRING handle
    String,
    Guid,
    /// 100-ns ticks since 1601-01-01 UTC
    DateTime,
    /// 100-ns ticks
    TimeSpan,
    Point,
    Size,
    Rect,
    /// Reference to an `IInspectable`-like foreign object
    ObjectRef,
}

struct KindInfo {
    name: &'static str,
    format: &'static str,
    format_c: &'static CStr,
    width: usize,
}

const fn info(
    name: &'static str,
    format: &'static str,
    format_c: &'static CStr,
    width: usize,
) -> KindInfo {
    KindInfo {
        name,
        format,
        format_c,
        width,
    }
}

// Indexed by `ElementKind as usize`; order must match the enum.
const KIND_TABLE: [KindInfo; 20] = [
    info("Bool", "?", c"?", 1),
    info("Int8", "b", c"b", 1),
    info("UInt8", "B", c"B", 1),
    info("Int16", "h", c"h", 2),
    info("UInt16", "H", c"H", 2),
    info("Int32", "i", c"i", 4),
    info("UInt32", "I", c"I", 4),
    info("Int64", "q", c"q", 8),
    info("UInt64", "Q", c"Q", 8),
    info("Float32", "f", c"f", 4),
    info("Float64", "d", c"d", 8),
    info("Char16", "u", c"u", 2),
    info("String", "P", c"P", POINTER_WIDTH),
    info("Guid", "T{I2H8B}", c"T{I2H8B}", 16),
    info("DateTime", "q", c"q", 8),
    info("TimeSpan", "q", c"q", 8),
    info("Point", "T{f:x:f:y:}", c"T{f:x:f:y:}", 8),
    info("Size", "T{f:width:f:height:}", c"T{f:width:f:height:}", 8),
    info("Rect", "T{f:x:f:y:f:width:f:height:}", c"T{f:x:f:y:f:width:f:height:}", 16),
    info("ObjectRef", "P", c"P", POINTER_WIDTH),
];

impl ElementKind {
    /// Every kind, in declaration order.
    pub const ALL: [ElementKind; 20] = [
        ElementKind::Bool,
        ElementKind::Int8,
        ElementKind::UInt8,
        ElementKind::Int16,
        ElementKind::UInt16,
        ElementKind::Int32,
        ElementKind::UInt32,
        ElementKind::Int64,
        ElementKind::UInt64,
        ElementKind::Float32,
        ElementKind::Float64,
        ElementKind::Char16,
        ElementKind::String,
        ElementKind::Guid,
        ElementKind::DateTime,
        ElementKind::TimeSpan,
        ElementKind::Point,
        ElementKind::Size,
        ElementKind::Rect,
        ElementKind::ObjectRef,
    ];

    /// The kinds reachable from a single-character format code.
    pub const FORMAT_CODES: [(char, ElementKind); 12] = [
        ('?', ElementKind::Bool),
        ('b', ElementKind::Int8),
        ('B', ElementKind::UInt8),
        ('h', ElementKind::Int16),
        ('H', ElementKind::UInt16),
        ('i', ElementKind::Int32),
        ('I', ElementKind::UInt32),
        ('q', ElementKind::Int64),
        ('Q', ElementKind::UInt64),
        ('f', ElementKind::Float32),
        ('d', ElementKind::Float64),
        ('u', ElementKind::Char16),
    ];

    fn info(self) -> &'static KindInfo {
        &KIND_TABLE[self as usize]
    }

    /// Resolve a single-character format code.
    pub fn from_format_code(code: &str) -> ArrayResult<Self> {
        let mut chars = code.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::FORMAT_CODES
                .iter()
                .find(|(candidate, _)| *candidate == c)
                .map(|(_, kind)| *kind)
                .ok_or_else(|| ArrayError::unsupported_format(code)),
            _ => Err(ArrayError::unsupported_format(code)),
        }
    }

    /// Size of one element in bytes
    pub fn byte_width(self) -> usize {
        self.info().width
    }

    /// Canonical buffer format string (PEP 3118)
    pub fn format(self) -> &'static str {
        self.info().format
    }

    /// Canonical format string, nul-terminated for C buffer consumers
    pub fn format_cstr(self) -> &'static CStr {
        self.info().format_c
    }

    pub fn name(self) -> &'static str {
        self.info().name
    }

    /// Slots hold reference-counted foreign handles rather than plain data.
    pub fn is_handle(self) -> bool {
        matches!(self, ElementKind::String | ElementKind::ObjectRef)
    }

    /// Check if this is an integer kind
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ElementKind::Int8
                | ElementKind::UInt8
                | ElementKind::Int16
                | ElementKind::UInt16
                | ElementKind::Int32
                | ElementKind::UInt32
                | ElementKind::Int64
                | ElementKind::UInt64
        )
    }

    /// Check if this is one of the foundation structs
    pub fn is_struct(self) -> bool {
        matches!(
            self,
            ElementKind::Guid | ElementKind::Point | ElementKind::Size | ElementKind::Rect
        )
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementKind {
    type Err = ArrayError;

    /// Parse a kind by name, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ArrayError::value_error(format!("unknown element kind '{}'", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_matches_enum_order() {
        for kind in ElementKind::ALL {
            assert_eq!(kind.name(), format!("{:?}", kind));
        }
    }

    #[test]
    fn test_format_codes_round_trip() {
        for (code, kind) in ElementKind::FORMAT_CODES {
            let resolved = ElementKind::from_format_code(&code.to_string()).unwrap();
            assert_eq!(resolved, kind);
            assert_eq!(resolved.format(), code.to_string());
        }
    }

    #[test]
    fn test_unknown_format_code() {
        assert_eq!(
            ElementKind::from_format_code("x"),
            Err(ArrayError::unsupported_format("x"))
        );
        assert!(ElementKind::from_format_code("").is_err());
        assert!(ElementKind::from_format_code("ii").is_err());
        // valid buffer format, but not an element descriptor
        assert!(ElementKind::from_format_code("P").is_err());
    }

    #[test]
    fn test_byte_widths() {
        assert_eq!(ElementKind::Bool.byte_width(), 1);
        assert_eq!(ElementKind::Char16.byte_width(), 2);
        assert_eq!(ElementKind::Guid.byte_width(), 16);
        assert_eq!(ElementKind::DateTime.byte_width(), 8);
        assert_eq!(ElementKind::Rect.byte_width(), 16);
        assert_eq!(ElementKind::ObjectRef.byte_width(), POINTER_WIDTH);
        assert_eq!(ElementKind::String.byte_width(), POINTER_WIDTH);
    }

    #[test]
    fn test_format_cstr_agrees() {
        for kind in ElementKind::ALL {
            assert_eq!(kind.format_cstr().to_str().unwrap(), kind.format());
        }
    }

    #[test]
    fn test_parse_by_name() {
        assert_eq!("point".parse::<ElementKind>().unwrap(), ElementKind::Point);
        assert_eq!("ObjectRef".parse::<ElementKind>().unwrap(), ElementKind::ObjectRef);
        assert!("Matrix".parse::<ElementKind>().is_err());
    }
}

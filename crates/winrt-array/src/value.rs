//! Host Value Representation
//!
//! `HostValue` is what the element converters produce and consume: a static
//! picture of the host runtime's dynamic values, limited to what a WinRT
//! array element can hold. The binding crate translates between these and
//! live host objects.

use std::fmt;

use indexmap::IndexMap;
use smol_str::SmolStr;
use uuid::Uuid;

use crate::foreign::ObjectRef;

/// A host-runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    /// `None`
    None,

    /// `bool`
    Bool(bool),

    /// `int`, wide enough for every integer kind
    Int(i128),

    /// `float`
    Float(f64),

    /// `str`
    Str(SmolStr),

    /// `uuid.UUID`
    Guid(Uuid),

    /// `datetime.datetime`, microseconds since the Unix epoch (UTC)
    DateTime(i64),

    /// `datetime.timedelta`, in microseconds
    TimeSpan(i64),

    /// A value with named fields (a projected struct or a mapping)
    Struct(HostStruct),

    /// A positional sequence
    Tuple(Vec<HostValue>),

    /// A projected foreign object
    Object(ObjectRef),
}

impl HostValue {
    /// Host type name, used in conversion error messages
    pub fn type_name(&self) -> &str {
        match self {
            HostValue::None => "NoneType",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "str",
            HostValue::Guid(_) => "UUID",
            HostValue::DateTime(_) => "datetime",
            HostValue::TimeSpan(_) => "timedelta",
            HostValue::Struct(s) if !s.name.is_empty() => s.name.as_str(),
            HostValue::Struct(_) => "dict",
            HostValue::Tuple(_) => "tuple",
            HostValue::Object(_) => "Object",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, HostValue::None)
    }

    /// Integer value; `bool` counts as an integer like in the host
    pub fn as_int(&self) -> Option<i128> {
        match self {
            HostValue::Int(n) => Some(*n),
            HostValue::Bool(b) => Some(i128::from(*b)),
            _ => None,
        }
    }

    /// Numeric value as a double
    pub fn as_float(&self) -> Option<f64> {
        match self {
            HostValue::Float(f) => Some(*f),
            HostValue::Int(n) => Some(*n as f64),
            HostValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Default for HostValue {
    fn default() -> Self {
        HostValue::None
    }
}

impl From<bool> for HostValue {
    fn from(b: bool) -> Self {
        HostValue::Bool(b)
    }
}

impl From<i64> for HostValue {
    fn from(n: i64) -> Self {
        HostValue::Int(i128::from(n))
    }
}

impl From<f64> for HostValue {
    fn from(f: f64) -> Self {
        HostValue::Float(f)
    }
}

impl From<&str> for HostValue {
    fn from(s: &str) -> Self {
        HostValue::Str(SmolStr::new(s))
    }
}

impl From<Uuid> for HostValue {
    fn from(id: Uuid) -> Self {
        HostValue::Guid(id)
    }
}

impl From<ObjectRef> for HostValue {
    fn from(obj: ObjectRef) -> Self {
        HostValue::Object(obj)
    }
}

impl From<HostStruct> for HostValue {
    fn from(s: HostStruct) -> Self {
        HostValue::Struct(s)
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::None => write!(f, "None"),
            HostValue::Bool(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            HostValue::Int(n) => write!(f, "{}", n),
            HostValue::Float(n) => write!(f, "{}", n),
            HostValue::Str(s) => write!(f, "'{}'", s),
            HostValue::Guid(id) => write!(f, "UUID('{}')", id),
            HostValue::DateTime(us) => write!(f, "datetime(+{}us)", us),
            HostValue::TimeSpan(us) => write!(f, "timedelta(microseconds={})", us),
            HostValue::Struct(s) => write!(f, "{}", s),
            HostValue::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            HostValue::Object(obj) => write!(f, "<{} object>", obj.runtime_class_name()),
        }
    }
}

// ============================================================================
// HostStruct
// ============================================================================

/// Named fields, in insertion order. An empty `name` means a plain mapping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HostStruct {
    pub name: SmolStr,
    pub fields: IndexMap<SmolStr, HostValue>,
}

impl HostStruct {
    pub fn new(name: impl Into<SmolStr>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Add a field
    pub fn with(mut self, field: impl Into<SmolStr>, value: impl Into<HostValue>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&HostValue> {
        self.fields.get(field)
    }
}

impl fmt::Display for HostStruct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, (k, v)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", k, v)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_is_int() {
        assert_eq!(HostValue::Bool(true).as_int(), Some(1));
        assert_eq!(HostValue::Float(1.0).as_int(), None);
        assert_eq!(HostValue::Int(3).as_float(), Some(3.0));
    }

    #[test]
    fn test_type_names() {
        assert_eq!(HostValue::from("a").type_name(), "str");
        assert_eq!(HostValue::Struct(HostStruct::default()).type_name(), "dict");
        assert_eq!(
            HostValue::Struct(HostStruct::new("Point")).type_name(),
            "Point"
        );
    }

    #[test]
    fn test_struct_display() {
        let p = HostStruct::new("Point").with("x", 1.5).with("y", 2.0);
        assert_eq!(p.to_string(), "Point(x=1.5, y=2)");
        assert_eq!(p.get("y"), Some(&HostValue::Float(2.0)));
    }

    #[test]
    fn test_tuple_display() {
        let t = HostValue::Tuple(vec![HostValue::from(1_i64)]);
        assert_eq!(t.to_string(), "(1,)");
    }
}

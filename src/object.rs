//! PDF object types.
//!
//! The object layer represents every PDF value as a tagged variant.
//! Composite values (arrays, dictionaries, streams) may contain indirect
//! references that are resolved on demand through a [`crate::document::Document`].

use std::cell::OnceCell;
use std::collections::HashMap;

use bytes::Bytes;

/// A PDF dictionary. Key order carries no meaning.
pub type Dict = HashMap<String, Object>;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// String (byte array; escape sequences already decoded)
    String(Vec<u8>),
    /// Name (without the leading /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary
    Dictionary(Dict),
    /// Stream (dictionary + raw data)
    Stream(Stream),
    /// Indirect object reference
    Reference(ObjectRef),
}

/// Reference to an indirect object.
///
/// Only the object id participates in resolution. The generation number is
/// parsed and retained for display, but shadowing between incremental
/// updates is decided by cross-reference section order, not generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// A stream object: dictionary plus payload bytes.
///
/// The raw bytes are kept as read from the file; the decoded form is
/// memoized on first decode, so decoding is idempotent.
#[derive(Debug, Clone)]
pub struct Stream {
    /// The stream dictionary (`Length`, optional `Filter`/`DecodeParms`)
    pub dict: Dict,
    raw: Bytes,
    pub(crate) decoded: OnceCell<Bytes>,
}

impl Stream {
    /// Create a stream from its dictionary and raw payload.
    pub fn new(dict: Dict, raw: impl Into<Bytes>) -> Self {
        Self {
            dict,
            raw: raw.into(),
            decoded: OnceCell::new(),
        }
    }

    /// The raw (still encoded) payload.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The decoded payload if a decode already ran.
    pub fn decoded(&self) -> Option<&[u8]> {
        self.decoded.get().map(|b| b.as_ref())
    }
}

impl PartialEq for Stream {
    fn eq(&self, other: &Self) -> bool {
        self.dict == other.dict && self.raw == other.raw
    }
}

impl Object {
    /// Human-readable type name, without the data.
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Stream(_) => "Stream",
            Object::Reference(_) => "Reference",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to cast to a number (integer or real).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary. Works for both Dictionary and Stream objects.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to string bytes.
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Object::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to cast to reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to stream.
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Object::Stream(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_integer() {
        let obj = Object::Integer(42);
        assert_eq!(obj.as_integer(), Some(42));
        assert_eq!(obj.as_number(), Some(42.0));
        assert!(obj.as_name().is_none());
        assert!(!obj.is_null());
    }

    #[test]
    fn test_object_real_as_number() {
        let obj = Object::Real(2.5);
        assert_eq!(obj.as_number(), Some(2.5));
        assert!(obj.as_integer().is_none());
    }

    #[test]
    fn test_object_name() {
        let obj = Object::Name("Type".to_string());
        assert_eq!(obj.as_name(), Some("Type"));
    }

    #[test]
    fn test_object_stream_dict_access() {
        let mut dict = Dict::new();
        dict.insert("Length".to_string(), Object::Integer(11));
        let obj = Object::Stream(Stream::new(dict, &b"stream data"[..]));

        // Stream objects are also accessible as dictionaries
        let d = obj.as_dict().unwrap();
        assert_eq!(d.get("Length").unwrap().as_integer(), Some(11));
    }

    #[test]
    fn test_object_ref_display() {
        let obj_ref = ObjectRef::new(10, 0);
        assert_eq!(format!("{}", obj_ref), "10 0 R");
    }

    #[test]
    fn test_object_ref_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ObjectRef::new(1, 0));
        set.insert(ObjectRef::new(2, 0));
        set.insert(ObjectRef::new(1, 0));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_stream_eq_ignores_decode_state() {
        let a = Stream::new(Dict::new(), &b"abc"[..]);
        let b = Stream::new(Dict::new(), &b"abc"[..]);
        b.decoded.set(Bytes::from_static(b"abc")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_type_name() {
        assert_eq!(Object::Null.type_name(), "Null");
        assert_eq!(Object::Array(vec![]).type_name(), "Array");
        assert_eq!(Object::Reference(ObjectRef::new(1, 0)).type_name(), "Reference");
    }
}

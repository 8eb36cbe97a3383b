//! The owned, in-memory form of a VelocyPack value. Values are what calling code builds to send
//! something and what a [`Slice`](crate::Slice) materializes into when a caller needs to keep a
//! response around.

use crate::encoder::{EncodedBuffer, Encoder};
use crate::header::Variant;
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display, Formatter, Write};

/// Object members in insertion order. Keys are unique by construction.
pub type Object = IndexMap<String, Value>;

/// The possible values according to the VelocyPack data model, restricted to the types a client
/// sends and receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    Array(Vec<Value>),
    Object(Object),
}

impl Value {

    /// Builds an object from key value pairs. Later duplicates of a key replace the value of the
    /// earlier one but keep its position.
    pub fn object<K, V, I>(members: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(members.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    pub fn array<V: Into<Value>, I: IntoIterator<Item = V>>(elements: I) -> Value {
        Value::Array(elements.into_iter().map(Into::into).collect())
    }

    pub fn variant(&self) -> Variant {
        match *self {
            Value::Null      => Variant::Null,
            Value::Bool(_)   => Variant::Bool,
            Value::Int(_)    => Variant::Int,
            Value::UInt(_)   => Variant::UInt,
            Value::Double(_) => Variant::Double,
            Value::String(_) => Variant::String,
            Value::Binary(_) => Variant::Binary,
            Value::Array(_)  => Variant::Array,
            Value::Object(_) => Variant::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// Both integer variants, as long as the value fits
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Int(v) => Some(v),
            Value::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::Int(v) => u64::try_from(v).ok(),
            Value::UInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Binary(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(v) => Some(v),
            _ => None,
        }
    }

    /// Looks up an object member. Returns `None` for absent keys and for non-objects.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|o| o.get(key))
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.as_array().and_then(|a| a.get(index))
    }

    /// Encodes the value with default options
    pub fn encode(&self) -> EncodedBuffer {
        Encoder::default().encode(self)
    }

    fn write_str(f: &mut Formatter<'_>, v: &str) -> fmt::Result {
        f.write_char('"')?;
        for c in v.chars() {
            match c {
                '"'  => f.write_str("\\\"")?,
                '\\' => f.write_str("\\\\")?,
                '\n' => f.write_str("\\n")?,
                '\r' => f.write_str("\\r")?,
                '\t' => f.write_str("\\t")?,
                c if c.is_control() => write!(f, "\\u{{{:x}}}", c as u32)?,
                c    => f.write_char(c)?,
            }
        }
        f.write_char('"')
    }

    fn write_indent(f: &mut Formatter<'_>, depth: usize) -> fmt::Result {
        for _ in 0..depth {
            f.write_str("  ")?;
        }
        Ok(())
    }

    /// Writes the text notation. In pretty mode every container member goes on its own line.
    fn write_text(&self, f: &mut Formatter<'_>, pretty: bool, depth: usize) -> fmt::Result {
        match self {
            Value::Null         => f.write_str("null"),
            Value::Bool(true)   => f.write_str("true"),
            Value::Bool(false)  => f.write_str("false"),
            Value::Int(v)       => write!(f, "{}", v),
            Value::UInt(v)      => write!(f, "{}u", v),
            // Debug always keeps a decimal point or exponent, so doubles stay doubles when parsed back
            Value::Double(v)    => write!(f, "{:?}", v),
            Value::String(v)    => Self::write_str(f, v),
            Value::Binary(v)    => write!(f, "b'{}'", base64::encode(v)),
            Value::Array(v) if v.is_empty() => f.write_str("[]"),
            Value::Object(v) if v.is_empty() => f.write_str("{}"),
            Value::Array(v) => {
                f.write_char('[')?;
                for (i, element) in v.iter().enumerate() {
                    if pretty {
                        f.write_char('\n')?;
                        Self::write_indent(f, depth + 1)?;
                    } else if i > 0 {
                        f.write_char(' ')?;
                    }
                    element.write_text(f, pretty, depth + 1)?;
                    if pretty || i + 1 < v.len() {
                        f.write_char(',')?;
                    }
                }
                if pretty {
                    f.write_char('\n')?;
                    Self::write_indent(f, depth)?;
                }
                f.write_char(']')
            },
            Value::Object(v) => {
                f.write_char('{')?;
                for (i, (key, member)) in v.iter().enumerate() {
                    if pretty {
                        f.write_char('\n')?;
                        Self::write_indent(f, depth + 1)?;
                    } else if i > 0 {
                        f.write_char(' ')?;
                    }
                    Self::write_str(f, key)?;
                    f.write_str(": ")?;
                    member.write_text(f, pretty, depth + 1)?;
                    if pretty || i + 1 < v.len() {
                        f.write_char(',')?;
                    }
                }
                if pretty {
                    f.write_char('\n')?;
                    Self::write_indent(f, depth)?;
                }
                f.write_char('}')
            },
        }
    }

}

/// `{}` prints everything on one line, `{:#}` prints one member per line.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.write_text(f, f.alternate(), 0)
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::UInt(u64::from(v))
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64);
from_unsigned!(u8, u16, u32, u64);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Binary(v.to_vec())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::array(v)
    }
}

impl From<Object> for Value {
    fn from(v: Object) -> Self {
        Value::Object(v)
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(v: BTreeMap<String, V>) -> Self {
        Value::object(v)
    }
}

impl<V: Into<Value>> From<HashMap<String, V>> for Value {
    fn from(v: HashMap<String, V>) -> Self {
        Value::object(v)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Value {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Value::object(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::Value;

    #[test]
    fn conversions() {
        assert_eq!(Value::Int(-3), Value::from(-3i8));
        assert_eq!(Value::UInt(3), Value::from(3u16));
        assert_eq!(Value::Double(0.5), Value::from(0.5f32));
        assert_eq!(Value::Null, Value::from(None::<bool>));
        assert_eq!(Value::String("x".into()), Value::from(Some("x")));
        assert_eq!(Value::Binary(vec![1, 2]), Value::from(&[1u8, 2][..]));
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
            Value::from(vec![1i32, 2]),
        );
    }

    #[test]
    fn object_keeps_insertion_order_and_unique_keys() {
        let value = Value::object([("b", 1i64), ("a", 2), ("b", 3)]);
        let object = value.as_object().unwrap();
        assert_eq!(vec!["b", "a"], object.keys().collect::<Vec<_>>());
        assert_eq!(Some(&Value::Int(3)), value.get("b"));
        assert_eq!(None, value.get("c"));
    }

    #[test]
    fn integer_views() {
        assert_eq!(Some(-1), Value::Int(-1).as_i64());
        assert_eq!(None, Value::Int(-1).as_u64());
        assert_eq!(Some(7), Value::UInt(7).as_i64());
        assert_eq!(None, Value::UInt(u64::MAX).as_i64());
        assert_eq!(None, Value::Double(1.0).as_i64());
    }

    #[test]
    fn display_compact() {
        let value = Value::object([
            ("name", Value::from("Jessica \"Jess\"")),
            ("age", Value::from(3u8)),
            ("weight", Value::from(4.0)),
            ("tags", Value::array(["cat", "fishing"])),
            ("chip", Value::Binary(vec![0xde, 0xad])),
            ("owner", Value::Null),
        ]);
        assert_eq!(
            r#"{"name": "Jessica \"Jess\"", "age": 3u, "weight": 4.0, "tags": ["cat", "fishing"], "chip": b'3q0=', "owner": null}"#,
            value.to_string(),
        );
    }

    #[test]
    fn display_pretty() {
        let value = Value::object([("cats", Value::array([Value::Int(-1)])), ("empty", Value::Array(vec![]))]);
        assert_eq!("{\n  \"cats\": [\n    -1,\n  ],\n  \"empty\": [],\n}", format!("{:#}", value));
    }

}

use crate::error::{mismatch, ErrorKind, Result};
use crate::header::Variant;
use crate::slice::Slice;
use crate::value::{Object, Value};
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use tracing::debug;

/// Describes the shape a [`Decoder`] should fold a slice into
#[derive(Debug, Clone, PartialEq)]
pub enum TypeDescriptor {
    /// Whatever is there, materialized as is
    Any,
    Null,
    Bool,
    Int,
    UInt,
    Double,
    String,
    Binary,
    /// `null` or an absent value decode to `Value::Null`, anything else to the inner type
    Optional(Box<TypeDescriptor>),
    /// An array with elements of the inner type
    Sequence(Box<TypeDescriptor>),
    /// An object with values of the inner type
    Map(Box<TypeDescriptor>),
    Record(RecordDescriptor),
    /// The inner type wrapped into an object under `key`, as in `{"graph": {...}}`
    Nested { key: String, inner: Box<TypeDescriptor> },
    /// Decoded by the function registered under this name
    Named(String),
}

impl TypeDescriptor {

    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Optional(Box::new(inner))
    }

    pub fn sequence(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Sequence(Box::new(inner))
    }

    pub fn map(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Map(Box::new(inner))
    }

    pub fn nested(key: impl Into<String>, inner: TypeDescriptor) -> Self {
        TypeDescriptor::Nested { key: key.into(), inner: Box::new(inner) }
    }

    pub fn named(name: impl Into<String>) -> Self {
        TypeDescriptor::Named(name.into())
    }

}

impl From<RecordDescriptor> for TypeDescriptor {
    fn from(record: RecordDescriptor) -> Self {
        TypeDescriptor::Record(record)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub ty: TypeDescriptor,
    pub required: bool,
}

/// The fields of a record in the order they appear in the decoded object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordDescriptor {
    pub fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.fields.push(FieldDescriptor { name: name.into(), ty, required: true });
        self
    }

    /// A field which decodes to `Value::Null` when the member is absent
    pub fn optional_field(mut self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.fields.push(FieldDescriptor { name: name.into(), ty, required: false });
        self
    }

}

type DecodeFn = dyn Fn(Slice<'_>, &Decoder) -> Result<Value> + Send + Sync;

/// Folds slices into values shaped after a [`TypeDescriptor`]. Shapes which the descriptors can
/// not express are handled by functions registered under a name and referred to through
/// [`TypeDescriptor::Named`]; they receive the decoder so that they can delegate back to it.
#[derive(Default)]
pub struct Decoder {
    named: HashMap<String, Box<DecodeFn>>,
}

impl Decoder {

    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `decode` under `name`, replacing any earlier registration
    pub fn register<F>(&mut self, name: impl Into<String>, decode: F) -> &mut Self
    where
        F: Fn(Slice<'_>, &Decoder) -> Result<Value> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(name = name.as_str(), "registering named decoder");
        self.named.insert(name, Box::new(decode));
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    pub fn decode(&self, slice: Slice<'_>, ty: &TypeDescriptor) -> Result<Value> {
        match ty {
            TypeDescriptor::Any => slice.to_value(),
            TypeDescriptor::Null if slice.is_null() => Ok(Value::Null),
            TypeDescriptor::Null => mismatch(Variant::Null, slice.type_of()),
            TypeDescriptor::Bool => Ok(Value::Bool(slice.as_bool()?)),
            TypeDescriptor::Int => decode_int(slice).map(Value::Int),
            TypeDescriptor::UInt => decode_uint(slice).map(Value::UInt),
            TypeDescriptor::Double => slice.as_f64_exact().map(Value::Double),
            TypeDescriptor::String => Ok(Value::String(slice.as_str()?.to_owned())),
            TypeDescriptor::Binary => Ok(Value::Binary(slice.as_binary()?.to_vec())),
            TypeDescriptor::Optional(_) if slice.is_null() || slice.is_none() => Ok(Value::Null),
            TypeDescriptor::Optional(inner) => self.decode(slice, inner),
            TypeDescriptor::Sequence(inner) => {
                let mut elements = Vec::new();
                for (i, element) in slice.array_iter()?.enumerate() {
                    elements.push(element.and_then(|e| self.decode(e, inner)).map_err(|e| e.within(i))?);
                }
                Ok(Value::Array(elements))
            },
            TypeDescriptor::Map(inner) => {
                let mut members = Object::new();
                for member in slice.object_iter()? {
                    let (key, value) = member?;
                    members.insert(key.to_owned(), self.decode(value, inner).map_err(|e| e.within(key))?);
                }
                Ok(Value::Object(members))
            },
            TypeDescriptor::Record(record) => self.decode_record(slice, record),
            TypeDescriptor::Nested { key, inner } => match slice.find(key)? {
                Some(member) => self.decode(member, inner).map_err(|e| e.within(key.as_str())),
                None => Err(ErrorKind::MissingField(key.clone()).into()),
            },
            TypeDescriptor::Named(name) => match self.named.get(name) {
                Some(decode) => {
                    debug!(name = name.as_str(), offset = slice.offset(), "dispatching to named decoder");
                    decode(slice, self)
                },
                None => Err(ErrorKind::DeserializationFailure(format!("no decoder registered under `{}`", name)).into()),
            },
        }
    }

    /// Looks up each field by key, so members the record does not mention are never read
    fn decode_record(&self, slice: Slice<'_>, record: &RecordDescriptor) -> Result<Value> {
        if !slice.is_object() {
            return mismatch(Variant::Object, slice.type_of());
        }
        let mut members = Object::new();
        for field in record.fields.iter() {
            let value = match slice.find(&field.name)? {
                Some(member) => self.decode(member, &field.ty).map_err(|e| e.within(field.name.as_str()))?,
                None if field.required => return Err(ErrorKind::MissingField(field.name.clone()).into()),
                None => Value::Null,
            };
            members.insert(field.name.clone(), value);
        }
        Ok(Value::Object(members))
    }

}

impl Debug for Decoder {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.named.keys().collect();
        names.sort();
        f.debug_struct("Decoder").field("named", &names).finish()
    }
}

fn lossy(what: impl fmt::Display, target: &str) -> ErrorKind {
    ErrorKind::DeserializationFailure(format!("{} can not be represented as {} without loss", what, target))
}

fn decode_int(slice: Slice<'_>) -> Result<i64> {
    match slice.type_of() {
        Variant::Double => {
            let v = slice.as_double()?;
            // 2^63 itself is out of range
            if v.fract() == 0.0 && v >= -9_223_372_036_854_775_808.0 && v < 9_223_372_036_854_775_808.0 {
                Ok(v as i64)
            } else {
                Err(lossy(v, "Int").into())
            }
        },
        Variant::Int | Variant::UInt => slice.as_int(),
        actual => mismatch(Variant::Int, actual),
    }
}

fn decode_uint(slice: Slice<'_>) -> Result<u64> {
    match slice.type_of() {
        Variant::Double => {
            let v = slice.as_double()?;
            if v.fract() == 0.0 && v >= 0.0 && v < 18_446_744_073_709_551_616.0 {
                Ok(v as u64)
            } else {
                Err(lossy(v, "UInt").into())
            }
        },
        Variant::Int | Variant::UInt => slice.as_uint(),
        actual => mismatch(Variant::UInt, actual),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncodedBuffer;

    fn user() -> RecordDescriptor {
        RecordDescriptor::new()
            .field("name", TypeDescriptor::String)
            .field("gender", TypeDescriptor::String)
            .field("age", TypeDescriptor::Int)
    }

    fn test_user() -> EncodedBuffer {
        Value::object([
            ("name", Value::from("TestUser11")),
            ("gender", Value::from("FEMALE")),
            ("age", Value::Int(21)),
        ]).encode()
    }

    #[test]
    fn record() {
        let buffer = test_user();
        let decoded = Decoder::new().decode(buffer.slice(), &user().into()).unwrap();
        assert_eq!(Some("TestUser11"), decoded.get("name").and_then(Value::as_str));
        assert_eq!(Some("FEMALE"), decoded.get("gender").and_then(Value::as_str));
        assert_eq!(Some(21), decoded.get("age").and_then(Value::as_i64));
        assert_eq!(21, buffer.slice().get("age").unwrap().as_int().unwrap());
    }

    #[test]
    fn record_ignores_unknown_members() {
        let buffer = Value::object([("name", "Wantan"), ("gender", "MALE"), ("color", "black")]).encode();
        let record = RecordDescriptor::new()
            .field("name", TypeDescriptor::String)
            .optional_field("age", TypeDescriptor::Int);
        let decoded = Decoder::new().decode(buffer.slice(), &record.into()).unwrap();
        assert_eq!(Value::object([("name", Value::from("Wantan")), ("age", Value::Null)]), decoded);
    }

    #[test]
    fn record_requires_fields() {
        let buffer = Value::object([("name", "TestUser11"), ("gender", "FEMALE")]).encode();
        let error = Decoder::new().decode(buffer.slice(), &user().into()).unwrap_err();
        assert_eq!(&ErrorKind::MissingField("age".into()), error.kind());
    }

    #[test]
    fn errors_carry_the_path() {
        let users = Value::object([("users", Value::array([
            Value::object([("name", Value::from("a")), ("gender", Value::from("f")), ("age", Value::Int(1))]),
            Value::object([("name", Value::from("b")), ("gender", Value::from("m")), ("age", Value::from("old"))]),
        ]))]).encode();
        let ty = TypeDescriptor::nested("users", TypeDescriptor::sequence(user().into()));
        let error = Decoder::new().decode(users.slice(), &ty).unwrap_err();
        assert_eq!("Type mismatch: expected Int, found String at $.users[1].age", error.to_string());
    }

    #[test]
    fn numeric_coercions() {
        let decoder = Decoder::new();
        let decode = |value: Value, ty: TypeDescriptor| decoder.decode(value.encode().slice(), &ty);
        assert_eq!(Value::Double(21.0), decode(Value::Int(21), TypeDescriptor::Double).unwrap());
        assert_eq!(Value::Double(9007199254740992.0), decode(Value::UInt(1 << 53), TypeDescriptor::Double).unwrap());
        assert!(decode(Value::UInt((1 << 53) + 1), TypeDescriptor::Double).is_err());
        assert!(decode(Value::Int(-(1 << 60)), TypeDescriptor::Double).is_err());
        assert_eq!(Value::Int(3), decode(Value::Double(3.0), TypeDescriptor::Int).unwrap());
        assert!(matches!(decode(Value::Double(3.5), TypeDescriptor::Int).unwrap_err().kind(), ErrorKind::DeserializationFailure(_)));
        assert!(decode(Value::Double(f64::INFINITY), TypeDescriptor::Int).is_err());
        assert!(decode(Value::Double(-1.0), TypeDescriptor::UInt).is_err());
        assert_eq!(Value::UInt(7), decode(Value::Int(7), TypeDescriptor::UInt).unwrap());
        assert_eq!(Value::Int(7), decode(Value::UInt(7), TypeDescriptor::Int).unwrap());
        assert!(decode(Value::Int(-7), TypeDescriptor::UInt).is_err());
        assert!(decode(Value::UInt(u64::MAX), TypeDescriptor::Int).is_err());
        let error = decode(Value::Bool(true), TypeDescriptor::Double).unwrap_err();
        assert_eq!(&ErrorKind::TypeMismatch { expected: Variant::Double, actual: Variant::Bool }, error.kind());
    }

    #[test]
    fn collections() {
        let decoder = Decoder::new();
        let names = Value::array(["knows", "likes"]).encode();
        let decoded = decoder.decode(names.slice(), &TypeDescriptor::sequence(TypeDescriptor::String)).unwrap();
        assert_eq!(Value::array(["knows", "likes"]), decoded);
        let counts = Value::object([("a", 1i64), ("b", 2)]).encode();
        let decoded = decoder.decode(counts.slice(), &TypeDescriptor::map(TypeDescriptor::Double)).unwrap();
        assert_eq!(Value::object([("a", 1.0), ("b", 2.0)]), decoded);
        let maybe = Value::array([Value::Null, Value::Int(1)]).encode();
        let decoded = decoder.decode(maybe.slice(), &TypeDescriptor::sequence(TypeDescriptor::optional(TypeDescriptor::Int))).unwrap();
        assert_eq!(Value::array([Value::Null, Value::Int(1)]), decoded);
    }

    #[test]
    fn named_decoders() {
        let mut decoder = Decoder::new();
        decoder.register("graph", |slice, decoder| {
            let record = RecordDescriptor::new().field("name", TypeDescriptor::String);
            decoder.decode(slice, &TypeDescriptor::nested("graph", record.into()))
        });
        decoder.register("edge-count", |slice, _| Ok(Value::UInt(slice.get("edges")?.length()? as u64)));
        assert!(decoder.is_registered("graph"));
        let response = Value::object([
            ("error", Value::Bool(false)),
            ("code", Value::Int(202)),
            ("graph", Value::object([("name", Value::from("social")), ("edges", Value::array(["knows"]))])),
        ]).encode();
        let graph = decoder.decode(response.slice(), &TypeDescriptor::named("graph")).unwrap();
        assert_eq!(Value::object([("name", "social")]), graph);
        let nested = TypeDescriptor::nested("graph", TypeDescriptor::named("edge-count"));
        assert_eq!(Value::UInt(1), decoder.decode(response.slice(), &nested).unwrap());
        let error = decoder.decode(response.slice(), &TypeDescriptor::named("vertex")).unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::DeserializationFailure(_)));
    }

    #[test]
    fn decoder_is_shareable() {
        fn shareable<T: Send + Sync>() {}
        shareable::<Decoder>();
        shareable::<Slice<'static>>();
        shareable::<Value>();
        shareable::<EncodedBuffer>();
    }

}

//! Conveniently serialize your Rust data structures into VelocyPack and deserialize them straight
//! out of a [`vpack::Slice`].
//!
//! # Representation
//!
//! Structs and maps become objects, sequences and tuples become arrays. Enums are externally
//! tagged: unit variants are written as their name, all other variants as an object with the
//! variant name as its only key. Unsigned Rust integers are written as unsigned VelocyPack
//! integers and signed ones as signed integers; when reading, any integer which fits the target
//! type is accepted. Map keys need to be strings or integers.
//!
//! Deserialization never materializes the whole buffer. Members a struct does not know are
//! skipped by offset, so reading a few fields of a large response costs only those fields.
//!
//! # Examples
//!
//! ```
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! pub enum Gender {
//!     Female,
//!     Male,
//! }
//!
//! #[derive(Serialize, Deserialize, PartialEq, Debug)]
//! pub struct User<'a> {
//!     name: &'a str,
//!     gender: Gender,
//!     age: u8,
//! }
//!
//! let user = User { name: "TestUser11", gender: Gender::Female, age: 21 };
//! let buffer = vpack_serde::to_buffer(&user).unwrap();
//! assert_eq!(buffer.len(), 39);
//! assert_eq!(buffer.as_bytes(), [
//!   0x14, 0x27,                                             // compact object of 39 bytes
//!     0x44, 0x6e, 0x61, 0x6d, 0x65,                         // 'name'
//!     0x4a, 0x54, 0x65, 0x73, 0x74, 0x55, 0x73, 0x65, 0x72, // 'TestUser11'
//!           0x31, 0x31,
//!     0x46, 0x67, 0x65, 0x6e, 0x64, 0x65, 0x72,             // 'gender'
//!     0x46, 0x46, 0x65, 0x6d, 0x61, 0x6c, 0x65,             // 'Female'
//!     0x43, 0x61, 0x67, 0x65,                               // 'age'
//!     0x28, 0x15,                                           // unsigned integer 21
//!   0x03,                                                   // 3 members
//! ]);
//!
//! // borrows the name from the buffer
//! let deserialized: User = vpack_serde::from_slice(buffer.slice()).unwrap();
//! assert_eq!(user, deserialized);
//! ```

mod de;
mod error;
mod registry;
mod ser;

pub use de::{from_bytes, from_slice, from_value, Deserializer};
pub use error::{Error, Result};
pub use registry::Registry;
pub use ser::{to_buffer, to_buffer_with_options, to_value, to_vec, to_writer, Serializer};

#[cfg(test)]
mod tests {
    use serde::{Serialize, Deserialize};
    use std::collections::{BTreeMap, HashMap};
    use vpack::{ErrorKind, Head, Options, Slice, Value, Variant};
    use super::*;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    enum Enum {
        UnitVariant,
        NewtypeVariant(bool),
        TupleVariant(f32, f32),
        StructVariant{ a: usize, b: usize, c: usize },
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Struct {
        field: u8,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct UnitStruct;

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct NewtypeStruct(String);

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct TupleStruct(char, char, char);

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Test {
        bool: bool,
        i8: i8,
        i16: i16,
        i32: i32,
        i64: i64,
        i128: i128,
        u8: u8,
        u16: u16,
        u32: u32,
        u64: u64,
        f32: f32,
        f64: f64,
        char: char,
        str: String,
        #[serde(with = "serde_bytes")]
        bytes: Vec<u8>,
        none: Option<u8>,
        some: Option<u8>,
        unit: (),
        unit_struct: UnitStruct,
        newtype_struct: NewtypeStruct,
        tuple_struct: TupleStruct,
        seq: Vec<String>,
        tuple: (u16, u16, u16),
        map: HashMap<usize, String>,
        registry: BTreeMap<String, u32>,
        r#struct: Struct,
        unit_variant: Enum,
        newtype_variant: Enum,
        tuple_variant: Enum,
        struct_variant: Enum,
    }

    fn message() -> Test {
        Test {
            bool: true,
            i8: -1,
            i16: -20,
            i32: -7000,
            i64: i64::MIN,
            i128: -(1 << 40),
            u8: 1,
            u16: 20,
            u32: 7000,
            u64: u64::MAX,
            f32: 1337.8472,
            f64: 1337.8472,
            char: 'x',
            str: "x".repeat(200),
            bytes: (0..=255).collect(),
            none: None,
            some: Some(0),
            unit: (),
            unit_struct: UnitStruct,
            newtype_struct: NewtypeStruct("Qapla'".to_string()),
            tuple_struct: TupleStruct('a', 'ß', '🐈'),
            seq: vec![
                "Elen".to_string(),
                "síla".to_string(),
                "lúmenn'".to_string(),
                "omentielvo".to_string(),
            ],
            tuple: (0, 0, 0),
            map: [
                (1701, "Enterprise".to_string()),
                (74656, "Voyager".to_string())
            ].into_iter().collect(),
            registry: [
                ("Enterprise", 1701),
                ("Excelsior", 2000),
                ("Defiant", 74205),
                ("Voyager", 74656),
                ("Reliant", 1864),
                ("Stargazer", 2893),
                ("Yamato", 71807),
            ].into_iter().map(|(name, number)| (name.to_string(), number)).collect(),
            r#struct: Struct {
                field: 42,
            },
            unit_variant: Enum::UnitVariant,
            newtype_variant: Enum::NewtypeVariant(false),
            tuple_variant: Enum::TupleVariant(1.0, 0.999),
            struct_variant: Enum::StructVariant {
                a: 255,
                b: 0,
                c: 33,
            }
        }
    }

    #[test]
    fn roundtrip() {
        let message = message();
        let buffer = to_buffer(&message).unwrap();
        assert_eq!(message, from_slice::<Test>(buffer.slice()).unwrap());
        assert_eq!(message, from_bytes::<Test>(buffer.as_bytes()).unwrap());
        let indexed = to_buffer_with_options(&message, Options { object_index_threshold: 0, compact_arrays: true }).unwrap();
        assert_eq!(message, from_slice::<Test>(indexed.slice()).unwrap());
        assert_eq!(message, from_value::<Test>(&to_value(&message).unwrap()).unwrap());
    }

    #[test]
    fn representation() {
        let value = to_value(&message()).unwrap();
        assert_eq!(Some(&Value::UInt(u64::MAX)), value.get("u64"));
        assert_eq!(Some(&Value::Int(-1)), value.get("i8"));
        assert_eq!(Some(&Value::Null), value.get("none"));
        assert_eq!(Some(&Value::from("UnitVariant")), value.get("unit_variant"));
        assert_eq!(Some(&Value::object([("NewtypeVariant", false)])), value.get("newtype_variant"));
        assert_eq!(Some("Enterprise"), value.get("map").and_then(|m| m.get("1701")).and_then(Value::as_str));
        assert_eq!(Some(256), value.get("bytes").and_then(Value::as_bytes).map(<[u8]>::len));

        // more members than the index threshold get a sorted index table, fewer are compact
        let buffer = to_buffer(&message()).unwrap();
        let registry = buffer.slice().get("registry").unwrap();
        assert_eq!(Head::ObjectSorted(1), registry.head());
        assert_eq!(1701, registry.get("Enterprise").unwrap().as_uint().unwrap());
        assert_eq!(Head::ObjectCompact, buffer.slice().get("struct").unwrap().head());
        assert_eq!(Head::LongStr, buffer.slice().get("str").unwrap().head());
    }

    #[test]
    fn doubles_are_exact() {
        let buffer = Value::Int((1 << 53) + 1).encode();
        let error = from_slice::<f64>(buffer.slice()).unwrap_err();
        assert!(matches!(error.kind(), Some(ErrorKind::DeserializationFailure(_))));
        assert!(from_slice::<f32>(buffer.slice()).is_err());
        assert_eq!(21.0, from_slice::<f64>(Value::Int(21).encode().slice()).unwrap());
        assert_eq!(3.0, from_slice::<f32>(Value::UInt(3).encode().slice()).unwrap());

        #[derive(Deserialize, Debug)]
        struct Weight {
            #[allow(dead_code)]
            kg: f64,
        }
        let buffer = Value::object([("kg", Value::UInt(u64::MAX))]).encode();
        let error = from_slice::<Weight>(buffer.slice()).unwrap_err();
        assert_eq!("$.kg", error.path().unwrap().to_string());
    }

    #[test]
    fn unsupported_inputs() {
        let error = to_buffer(&u128::MAX).unwrap_err();
        assert!(matches!(error.kind(), Some(ErrorKind::UnsupportedType(_))));
        let keyed_by_bytes: BTreeMap<Vec<u8>, u8> = [(vec![1], 1)].into_iter().collect();
        let error = to_buffer(&keyed_by_bytes).unwrap_err();
        assert!(matches!(error.kind(), Some(ErrorKind::UnsupportedType(_))));
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct User {
        name: String,
        gender: String,
        age: i32,
    }

    fn test_user() -> vpack::EncodedBuffer {
        Value::object([
            ("_key", Value::from("4711")),
            ("name", Value::from("TestUser11")),
            ("gender", Value::from("FEMALE")),
            ("age", Value::Int(21)),
        ]).encode()
    }

    #[test]
    fn unknown_members_are_ignored() {
        let user: User = from_slice(test_user().slice()).unwrap();
        assert_eq!(User { name: "TestUser11".into(), gender: "FEMALE".into(), age: 21 }, user);
    }

    #[test]
    fn errors_carry_the_path() {
        let buffer = Value::object([("users", Value::array([
            Value::object([("name", "a"), ("gender", "f")]),
        ]))]).encode();
        let error = from_slice::<HashMap<String, Vec<User>>>(buffer.slice()).unwrap_err();
        assert_eq!(Some(&ErrorKind::MissingField("age".into())), error.kind());
        assert_eq!("Missing field `age` at $.users[0]", error.to_string());

        let buffer = Value::object([("age", Value::Int(-1))]).encode();
        #[derive(Deserialize, Debug)]
        struct Age {
            #[allow(dead_code)]
            age: u8,
        }
        let error = from_slice::<Age>(buffer.slice()).unwrap_err();
        assert!(matches!(error.kind(), Some(ErrorKind::DeserializationFailure(_))));
        assert_eq!("$.age", error.path().unwrap().to_string());
    }

    #[test]
    fn trailing_bytes() {
        let mut bytes = to_vec(&1u8).unwrap();
        bytes.push(0x18);
        let error = from_bytes::<u8>(&bytes).unwrap_err();
        assert!(matches!(error.kind(), Some(ErrorKind::Malformed(_))));
    }

    #[test]
    fn writer() {
        let mut out = Vec::new();
        let written = to_writer(&mut out, &("Wantan", 9u8)).unwrap();
        assert_eq!(written, out.len());
        assert_eq!(("Wantan".to_string(), 9u8), from_bytes::<(String, u8)>(&out).unwrap());
    }

    #[derive(Deserialize, Debug, PartialEq)]
    struct Graph {
        name: String,
        #[serde(rename = "edgeDefinitions")]
        edge_definitions: Vec<String>,
    }

    #[test]
    fn registry() {
        let mut registry = Registry::new();
        registry.register(|slice: Slice<'_>| from_slice::<Graph>(slice.get("graph")?));
        registry.register(|slice: Slice<'_>| Ok(slice.get("code")?.as_uint()? as u16));
        assert!(registry.contains::<Graph>());
        assert!(!registry.contains::<User>());

        let response = Value::object([
            ("error", Value::Bool(false)),
            ("code", Value::Int(202)),
            ("graph", Value::object([
                ("name", Value::from("social")),
                ("edgeDefinitions", Value::array(["knows"])),
            ])),
        ]).encode();
        let graph: Graph = registry.deserialize(response.slice()).unwrap();
        assert_eq!(Graph { name: "social".into(), edge_definitions: vec!["knows".into()] }, graph);
        assert_eq!(202u16, registry.deserialize_registered::<u16>(response.slice()).unwrap());

        // falls back to serde
        let user: User = registry.deserialize(test_user().slice()).unwrap();
        assert_eq!(21, user.age);
        let error = registry.deserialize_registered::<User>(test_user().slice()).unwrap_err();
        assert!(matches!(error.kind(), Some(ErrorKind::DeserializationFailure(_))));
    }

    #[test]
    fn type_mismatch() {
        let buffer = to_buffer(&7u8).unwrap();
        let error = from_slice::<Enum>(buffer.slice()).unwrap_err();
        assert_eq!(Some(&ErrorKind::TypeMismatch { expected: Variant::Object, actual: Variant::UInt }), error.kind());
    }

}

use serde::de::value::BorrowedStrDeserializer;
use serde::de::{self, Deserialize, DeserializeOwned, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess, VariantAccess, Visitor};
use serde::forward_to_deserialize_any;
use std::iter::Enumerate;
use vpack::{ArrayIter, ErrorKind, ObjectIter, Slice, Value, Variant};

use crate::error::{Error, Result};

/// Reads straight from a [`Slice`]. Structs and maps are visited member by member without
/// building an intermediate [`Value`], and members the target type ignores are skipped without
/// being looked at.
pub struct Deserializer<'de> {
    slice: Slice<'de>,
}

impl<'de> Deserializer<'de> {
    pub fn new(slice: Slice<'de>) -> Self {
        Deserializer { slice }
    }
}

pub fn from_slice<'de, T: Deserialize<'de>>(slice: Slice<'de>) -> Result<T> {
    T::deserialize(Deserializer::new(slice))
}

/// Deserializes the value at the start of `bytes`, which must not be followed by anything else
pub fn from_bytes<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    let slice = Slice::new(bytes);
    let size = slice.byte_size()?;
    if size != bytes.len() {
        return Err(ErrorKind::Malformed(format!("{} trailing bytes after value", bytes.len() - size)).into());
    }
    from_slice(slice)
}

pub fn from_value<T: DeserializeOwned>(value: &Value) -> Result<T> {
    from_slice(value.encode().slice())
}

impl<'de> de::Deserializer<'de> for Deserializer<'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        let slice = self.slice;
        match slice.type_of() {
            Variant::Null    => visitor.visit_unit(),
            Variant::Bool    => visitor.visit_bool(slice.as_bool()?),
            Variant::Int     => visitor.visit_i64(slice.as_int()?),
            Variant::UInt    => visitor.visit_u64(slice.as_uint()?),
            Variant::Double  => visitor.visit_f64(slice.as_double()?),
            Variant::UtcDate => visitor.visit_i64(slice.as_utc_date()?),
            Variant::String  => visitor.visit_borrowed_str(slice.as_str()?),
            Variant::Binary  => visitor.visit_borrowed_bytes(slice.as_binary()?),
            Variant::Array   => visitor.visit_seq(SeqDeserializer::new(slice.array_iter()?)),
            Variant::Object  => visitor.visit_map(MapDeserializer::new(slice.object_iter()?)),
            other => Err(ErrorKind::DeserializationFailure(format!("{} values can not be deserialized", other)).into()),
        }
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        if self.slice.is_null() || self.slice.is_none() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    /// Unit variants are plain strings, all others objects with the variant name as only key
    fn deserialize_enum<V: Visitor<'de>>(self, _name: &'static str, _variants: &'static [&'static str], visitor: V) -> Result<V::Value> {
        match self.slice.type_of() {
            Variant::String => visitor.visit_enum(self.slice.as_str()?.into_deserializer()),
            Variant::Object => {
                let mut members = self.slice.object_iter()?;
                match (members.next(), members.next()) {
                    (Some(member), None) => {
                        let (variant, value) = member?;
                        visitor.visit_enum(EnumDeserializer { variant, value })
                    },
                    _ => Err(ErrorKind::DeserializationFailure("enum objects must have exactly one member".to_owned()).into()),
                }
            },
            actual => Err(ErrorKind::TypeMismatch { expected: Variant::Object, actual }.into()),
        }
    }

    /// Integers are accepted where a double holds them exactly
    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_f64(self.slice.as_f64_exact()?)
    }

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_f64(self, visitor)
    }

    /// Nothing to consume, the parent moves on by offset
    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_unit()
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 char str string
        bytes byte_buf unit unit_struct seq tuple tuple_struct map struct identifier
    }
}

struct SeqDeserializer<'de> {
    elements: Enumerate<ArrayIter<'de>>,
}

impl<'de> SeqDeserializer<'de> {
    fn new(elements: ArrayIter<'de>) -> Self {
        Self { elements: elements.enumerate() }
    }
}

impl<'de> SeqAccess<'de> for SeqDeserializer<'de> {
    type Error = Error;

    fn next_element_seed<T: DeserializeSeed<'de>>(&mut self, seed: T) -> Result<Option<T::Value>> {
        match self.elements.next() {
            None => Ok(None),
            Some((i, element)) => seed.deserialize(Deserializer::new(element?)).map(Some).map_err(|e| e.within(i)),
        }
    }

    #[inline]
    fn size_hint(&self) -> Option<usize> {
        self.elements.size_hint().1
    }

}

struct MapDeserializer<'de> {
    members: ObjectIter<'de>,
    value: Option<(&'de str, Slice<'de>)>,
}

impl<'de> MapDeserializer<'de> {
    fn new(members: ObjectIter<'de>) -> Self {
        Self { members, value: None }
    }
}

impl<'de> MapAccess<'de> for MapDeserializer<'de> {
    type Error = Error;

    fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>> {
        match self.members.next() {
            None => Ok(None),
            Some(member) => {
                let (key, value) = member?;
                self.value = Some((key, value));
                seed.deserialize(KeyDeserializer(key)).map(Some).map_err(|e| e.within(key))
            },
        }
    }

    fn next_value_seed<V: DeserializeSeed<'de>>(&mut self, seed: V) -> Result<V::Value> {
        match self.value.take() {
            Some((key, value)) => seed.deserialize(Deserializer::new(value)).map_err(|e| e.within(key)),
            None => Err(ErrorKind::DeserializationFailure("value requested before its key".to_owned()).into()),
        }
    }

    #[inline]
    fn size_hint(&self) -> Option<usize> {
        self.members.size_hint().1
    }
}

struct EnumDeserializer<'de> {
    variant: &'de str,
    value: Slice<'de>,
}

impl<'de> EnumAccess<'de> for EnumDeserializer<'de> {
    type Error = Error;
    type Variant = Self;

    fn variant_seed<V: DeserializeSeed<'de>>(self, seed: V) -> Result<(V::Value, Self::Variant)> {
        let deserializer: BorrowedStrDeserializer<'de, Error> = BorrowedStrDeserializer::new(self.variant);
        let variant = seed.deserialize(deserializer)?;
        Ok((variant, self))
    }
}

impl<'de> VariantAccess<'de> for EnumDeserializer<'de> {
    type Error = Error;

    fn unit_variant(self) -> Result<()> {
        match self.value.type_of() {
            Variant::Null => Ok(()),
            actual => Err(Error::from(ErrorKind::TypeMismatch { expected: Variant::Null, actual }).within(self.variant)),
        }
    }

    fn newtype_variant_seed<T: DeserializeSeed<'de>>(self, seed: T) -> Result<T::Value> {
        seed.deserialize(Deserializer::new(self.value)).map_err(|e| e.within(self.variant))
    }

    fn tuple_variant<V: Visitor<'de>>(self, _len: usize, visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_seq(Deserializer::new(self.value), visitor).map_err(|e| e.within(self.variant))
    }

    fn struct_variant<V: Visitor<'de>>(self, _fields: &'static [&'static str], visitor: V) -> Result<V::Value> {
        de::Deserializer::deserialize_map(Deserializer::new(self.value), visitor).map_err(|e| e.within(self.variant))
    }

}

/// Object keys are strings on the wire, but maps with integer keys are written with their keys in
/// decimal, so integer targets parse them back.
struct KeyDeserializer<'de>(&'de str);

macro_rules! parse_key {
    ($($method:ident => $visit:ident),*) => {
        $(fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
            match self.0.parse() {
                Ok(v) => visitor.$visit(v),
                Err(_) => Err(ErrorKind::DeserializationFailure(format!("key `{}` is not a valid {}", self.0, stringify!($method).trim_start_matches("deserialize_"))).into()),
            }
        })*
    };
}

impl<'de> de::Deserializer<'de> for KeyDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value> {
        visitor.visit_borrowed_str(self.0)
    }

    parse_key! {
        deserialize_i8 => visit_i8,
        deserialize_i16 => visit_i16,
        deserialize_i32 => visit_i32,
        deserialize_i64 => visit_i64,
        deserialize_u8 => visit_u8,
        deserialize_u16 => visit_u16,
        deserialize_u32 => visit_u32,
        deserialize_u64 => visit_u64
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(self, _name: &'static str, visitor: V) -> Result<V::Value> {
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_enum<V: Visitor<'de>>(self, _name: &'static str, _variants: &'static [&'static str], visitor: V) -> Result<V::Value> {
        visitor.visit_enum(self.0.into_deserializer())
    }

    forward_to_deserialize_any! {
        bool i128 u128 f32 f64 char str string bytes byte_buf option unit unit_struct seq tuple
        tuple_struct map struct identifier ignored_any
    }
}

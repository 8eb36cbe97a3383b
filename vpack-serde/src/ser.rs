use serde::ser::{self, Impossible, Serialize};
use std::io::Write;
use vpack::{Builder, EncodedBuffer, ErrorKind, Options, Value};

use crate::error::{Error, Result};

/// Drives a [`Builder`]. Containers are opened and closed as serde announces them, the builder
/// takes care of their lengths, so sequences and maps of unknown size are fine.
pub struct Serializer {
    builder: Builder,
}

pub fn to_buffer<T: ?Sized + Serialize>(value: &T) -> Result<EncodedBuffer> {
    to_buffer_with_options(value, Options::default())
}

pub fn to_buffer_with_options<T: ?Sized + Serialize>(value: &T, options: Options) -> Result<EncodedBuffer> {
    let mut serializer = Serializer::with_options(options);
    value.serialize(&mut serializer)?;
    serializer.finish()
}

pub fn to_vec<T: ?Sized + Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(to_buffer(value)?.into_vec())
}

/// Writes the encoding of `value` and returns the number of bytes written
pub fn to_writer<T: ?Sized + Serialize, W: Write>(mut writer: W, value: &T) -> Result<usize> {
    let buffer = to_buffer(value)?;
    writer.write_all(buffer.as_bytes())?;
    Ok(buffer.len())
}

/// Converts anything serializable into a [`Value`]. Fails for data the wire format can not carry,
/// such as integers beyond 64 bits or map keys which are neither strings nor integers.
pub fn to_value<T: ?Sized + Serialize>(value: &T) -> Result<Value> {
    Ok(to_buffer(value)?.slice().to_value()?)
}

impl Serializer {

    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        Self { builder: Builder::with_options(options) }
    }

    pub fn finish(self) -> Result<EncodedBuffer> {
        Ok(self.builder.finish()?)
    }

}

impl Default for Serializer {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> ser::Serializer for &'a mut Serializer {

    type Ok = ();
    type Error = Error;
    type SerializeSeq = Self;
    type SerializeTuple = Self;
    type SerializeTupleStruct = Self;
    type SerializeTupleVariant = Self;
    type SerializeMap = Self;
    type SerializeStruct = Self;
    type SerializeStructVariant = Self;

    fn serialize_bool(self, v: bool) -> Result<()> {
        self.builder.add_bool(v)?;
        Ok(())
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.builder.add_int(v)?;
        Ok(())
    }

    fn serialize_i128(self, v: i128) -> Result<()> {
        match i64::try_from(v) {
            Ok(v) => self.serialize_i64(v),
            Err(_) => Err(ErrorKind::UnsupportedType(format!("integer {} exceeds 64 bits", v)).into()),
        }
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.builder.add_uint(v)?;
        Ok(())
    }

    fn serialize_u128(self, v: u128) -> Result<()> {
        match u64::try_from(v) {
            Ok(v) => self.serialize_u64(v),
            Err(_) => Err(ErrorKind::UnsupportedType(format!("integer {} exceeds 64 bits", v)).into()),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<()> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<()> {
        self.builder.add_double(v)?;
        Ok(())
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.serialize_str(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.builder.add_str(v)?;
        Ok(())
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<()> {
        self.builder.add_binary(v)?;
        Ok(())
    }

    fn serialize_none(self) -> Result<()> {
        self.builder.add_null()?;
        Ok(())
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        self.builder.add_null()?;
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<()> {
        self.serialize_unit()
    }

    fn serialize_unit_variant(self, _name: &'static str, _index: u32, variant: &'static str) -> Result<()> {
        self.serialize_str(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _name: &'static str, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(self, _name: &'static str, _index: u32, variant: &'static str, value: &T) -> Result<()> {
        self.builder.open_object()?.add_key(variant)?;
        value.serialize(&mut *self).map_err(|e| e.within(variant))?;
        self.builder.close()?;
        Ok(())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        self.builder.open_array()?;
        Ok(self)
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<Self::SerializeTupleStruct> {
        self.serialize_seq(Some(len))
    }

    /// Written as `{variant: [fields...]}`
    fn serialize_tuple_variant(self, _name: &'static str, _index: u32, variant: &'static str, _len: usize) -> Result<Self::SerializeTupleVariant> {
        self.builder.open_object()?.add_key(variant)?.open_array()?;
        Ok(self)
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        self.builder.open_object()?;
        Ok(self)
    }

    fn serialize_struct(self, _name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        self.builder.open_object()?;
        Ok(self)
    }

    /// Written as `{variant: {fields...}}`
    fn serialize_struct_variant(self, _name: &'static str, _index: u32, variant: &'static str, _len: usize) -> Result<Self::SerializeStructVariant> {
        self.builder.open_object()?.add_key(variant)?.open_object()?;
        Ok(self)
    }

}

impl<'a> ser::SerializeSeq for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.builder.close()?;
        Ok(())
    }

}

impl<'a> ser::SerializeTuple for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.builder.close()?;
        Ok(())
    }
}

impl<'a> ser::SerializeTupleStruct for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.builder.close()?;
        Ok(())
    }
}

impl<'a> ser::SerializeTupleVariant for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.builder.close()?.close()?;
        Ok(())
    }
}

impl<'a> ser::SerializeMap for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<()> {
        key.serialize(MapKeySerializer { builder: &mut self.builder })
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<()> {
        value.serialize(&mut **self)
    }

    fn end(self) -> Result<()> {
        self.builder.close()?;
        Ok(())
    }

}

impl<'a> ser::SerializeStruct for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.builder.add_key(key)?;
        value.serialize(&mut **self).map_err(|e| e.within(key))
    }

    fn end(self) -> Result<()> {
        self.builder.close()?;
        Ok(())
    }

}

impl<'a> ser::SerializeStructVariant for &'a mut Serializer {
    type Ok = ();
    type Error = Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, key: &'static str, value: &T) -> Result<()> {
        self.builder.add_key(key)?;
        value.serialize(&mut **self).map_err(|e| e.within(key))
    }

    fn end(self) -> Result<()> {
        self.builder.close()?.close()?;
        Ok(())
    }

}

/// Object keys on the wire are strings. Integer keys are written in decimal, everything else is
/// rejected.
struct MapKeySerializer<'a> {
    builder: &'a mut Builder,
}

fn key_error(what: &str) -> Error {
    ErrorKind::UnsupportedType(format!("{} as map key, keys must be strings or integers", what)).into()
}

impl<'a> MapKeySerializer<'a> {
    fn add_key(self, key: &str) -> Result<()> {
        self.builder.add_key(key)?;
        Ok(())
    }
}

impl<'a> ser::Serializer for MapKeySerializer<'a> {

    type Ok = ();
    type Error = Error;
    type SerializeSeq = Impossible<(), Error>;
    type SerializeTuple = Impossible<(), Error>;
    type SerializeTupleStruct = Impossible<(), Error>;
    type SerializeTupleVariant = Impossible<(), Error>;
    type SerializeMap = Impossible<(), Error>;
    type SerializeStruct = Impossible<(), Error>;
    type SerializeStructVariant = Impossible<(), Error>;

    fn serialize_bool(self, _v: bool) -> Result<()> {
        Err(key_error("bool"))
    }

    fn serialize_i8(self, v: i8) -> Result<()> {
        self.add_key(&v.to_string())
    }

    fn serialize_i16(self, v: i16) -> Result<()> {
        self.add_key(&v.to_string())
    }

    fn serialize_i32(self, v: i32) -> Result<()> {
        self.add_key(&v.to_string())
    }

    fn serialize_i64(self, v: i64) -> Result<()> {
        self.add_key(&v.to_string())
    }

    fn serialize_u8(self, v: u8) -> Result<()> {
        self.add_key(&v.to_string())
    }

    fn serialize_u16(self, v: u16) -> Result<()> {
        self.add_key(&v.to_string())
    }

    fn serialize_u32(self, v: u32) -> Result<()> {
        self.add_key(&v.to_string())
    }

    fn serialize_u64(self, v: u64) -> Result<()> {
        self.add_key(&v.to_string())
    }

    fn serialize_f32(self, _v: f32) -> Result<()> {
        Err(key_error("f32"))
    }

    fn serialize_f64(self, _v: f64) -> Result<()> {
        Err(key_error("f64"))
    }

    fn serialize_char(self, v: char) -> Result<()> {
        self.add_key(v.encode_utf8(&mut [0; 4]))
    }

    fn serialize_str(self, v: &str) -> Result<()> {
        self.add_key(v)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<()> {
        Err(key_error("bytes"))
    }

    fn serialize_none(self) -> Result<()> {
        Err(key_error("none"))
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<()> {
        Err(key_error("unit"))
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<()> {
        Err(key_error(name))
    }

    fn serialize_unit_variant(self, _name: &'static str, _index: u32, variant: &'static str) -> Result<()> {
        self.add_key(variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(self, _name: &'static str, value: &T) -> Result<()> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(self, name: &'static str, _index: u32, _variant: &'static str, _value: &T) -> Result<()> {
        Err(key_error(name))
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq> {
        Err(key_error("sequence"))
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple> {
        Err(key_error("tuple"))
    }

    fn serialize_tuple_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeTupleStruct> {
        Err(key_error(name))
    }

    fn serialize_tuple_variant(self, name: &'static str, _index: u32, _variant: &'static str, _len: usize) -> Result<Self::SerializeTupleVariant> {
        Err(key_error(name))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap> {
        Err(key_error("map"))
    }

    fn serialize_struct(self, name: &'static str, _len: usize) -> Result<Self::SerializeStruct> {
        Err(key_error(name))
    }

    fn serialize_struct_variant(self, name: &'static str, _index: u32, _variant: &'static str, _len: usize) -> Result<Self::SerializeStructVariant> {
        Err(key_error(name))
    }

}

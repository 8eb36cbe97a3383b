//! Every VelocyPack value starts with a single head byte. The head alone determines the type of
//! the value and either its full size or where the size can be read from, so looking at a value
//! never requires parsing its neighbours. All multi-byte integers that follow a head are stored in
//! little endian byte order.
//!
//! Containers come in four flavours: empty (a single byte), equal-size arrays (no index table,
//! elements are addressed by multiplication), indexed containers (a trailing table of offsets) and
//! compact containers (no table, lengths stored as variable-length integers).

use std::fmt::{self, Display, Formatter};

pub(crate) const NONE: u8 = 0x00;
pub(crate) const EMPTY_ARRAY: u8 = 0x01;
pub(crate) const ARRAY_EQUAL: u8 = 0x02;
pub(crate) const ARRAY_INDEXED: u8 = 0x06;
pub(crate) const EMPTY_OBJECT: u8 = 0x0a;
pub(crate) const OBJECT_SORTED: u8 = 0x0b;
pub(crate) const OBJECT_UNSORTED: u8 = 0x0f;
pub(crate) const ARRAY_COMPACT: u8 = 0x13;
pub(crate) const OBJECT_COMPACT: u8 = 0x14;
pub(crate) const ILLEGAL: u8 = 0x17;
pub(crate) const NULL: u8 = 0x18;
pub(crate) const FALSE: u8 = 0x19;
pub(crate) const TRUE: u8 = 0x1a;
pub(crate) const DOUBLE: u8 = 0x1b;
pub(crate) const UTC_DATE: u8 = 0x1c;
pub(crate) const EXTERNAL: u8 = 0x1d;
pub(crate) const MIN_KEY: u8 = 0x1e;
pub(crate) const MAX_KEY: u8 = 0x1f;
/// `INT + n` is a signed integer of `n` bytes
pub(crate) const INT: u8 = 0x1f;
/// `UINT + n` is an unsigned integer of `n` bytes
pub(crate) const UINT: u8 = 0x27;
pub(crate) const SMALL_INT: u8 = 0x30;
pub(crate) const SHORT_STR: u8 = 0x40;
pub(crate) const LONG_STR: u8 = 0xbf;
/// `BINARY + n` is a byte array whose length takes `n` bytes
pub(crate) const BINARY: u8 = 0xbf;

/// Longest string that still fits into the head byte
pub(crate) const SHORT_STR_MAX: usize = 126;

/// The variant of a value as seen from its head byte. The first nine variants correspond to the
/// variants of [`Value`](crate::Value); the remaining ones exist on the wire but have no
/// counterpart in the value model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    Null,
    Bool,
    Int,
    UInt,
    Double,
    String,
    Binary,
    Array,
    Object,
    /// Milliseconds since the epoch
    UtcDate,
    MinKey,
    MaxKey,
    /// Packed decimal
    Bcd,
    Custom,
    External,
    Illegal,
    /// Head byte `0x00`, never produced by the encoder
    None,
}

impl Variant {
    /// Returns the mnemonic of the variant. This is useful for error messages.
    pub fn name(&self) -> &'static str {
        match *self {
            Variant::Null     => "Null",
            Variant::Bool     => "Bool",
            Variant::Int      => "Int",
            Variant::UInt     => "UInt",
            Variant::Double   => "Double",
            Variant::String   => "String",
            Variant::Binary   => "Binary",
            Variant::Array    => "Array",
            Variant::Object   => "Object",
            Variant::UtcDate  => "UtcDate",
            Variant::MinKey   => "MinKey",
            Variant::MaxKey   => "MaxKey",
            Variant::Bcd      => "Bcd",
            Variant::Custom   => "Custom",
            Variant::External => "External",
            Variant::Illegal  => "Illegal",
            Variant::None     => "None",
        }
    }
}

impl Display for Variant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded head byte. Widths are given in bytes and are always one of 1, 2, 4 or 8 for
/// containers and 1 to 8 for integers and binary lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Head {
    None,
    EmptyArray,
    /// Array of equally sized elements, the width is the one of the byte length
    ArrayEqual(u8),
    /// Array with an index table, the width is the one of the byte length, count and offsets
    ArrayIndexed(u8),
    EmptyObject,
    ObjectSorted(u8),
    ObjectUnsorted(u8),
    ArrayCompact,
    ObjectCompact,
    Reserved(u8),
    Illegal,
    Null,
    False,
    True,
    Double,
    UtcDate,
    External,
    MinKey,
    MaxKey,
    Int(u8),
    UInt(u8),
    SmallInt(i8),
    ShortStr(u8),
    LongStr,
    Binary(u8),
    /// Packed decimal with the width of its length field
    Bcd(u8),
    Custom(u8),
}

impl Head {

    /// Decodes a head byte. Every byte has a meaning, unassigned ones decode to `Reserved`.
    pub fn decode(byte: u8) -> Head {
        match byte {
            NONE                => Head::None,
            EMPTY_ARRAY         => Head::EmptyArray,
            0x02..=0x05         => Head::ArrayEqual(1 << (byte - ARRAY_EQUAL)),
            0x06..=0x09         => Head::ArrayIndexed(1 << (byte - ARRAY_INDEXED)),
            EMPTY_OBJECT        => Head::EmptyObject,
            0x0b..=0x0e         => Head::ObjectSorted(1 << (byte - OBJECT_SORTED)),
            0x0f..=0x12         => Head::ObjectUnsorted(1 << (byte - OBJECT_UNSORTED)),
            ARRAY_COMPACT       => Head::ArrayCompact,
            OBJECT_COMPACT      => Head::ObjectCompact,
            ILLEGAL             => Head::Illegal,
            NULL                => Head::Null,
            FALSE               => Head::False,
            TRUE                => Head::True,
            DOUBLE              => Head::Double,
            UTC_DATE            => Head::UtcDate,
            EXTERNAL            => Head::External,
            MIN_KEY             => Head::MinKey,
            MAX_KEY             => Head::MaxKey,
            0x20..=0x27         => Head::Int(byte - INT),
            0x28..=0x2f         => Head::UInt(byte - UINT),
            0x30..=0x39         => Head::SmallInt((byte - SMALL_INT) as i8),
            0x3a..=0x3f         => Head::SmallInt(byte as i8 - SHORT_STR as i8),
            0x40..=0xbe         => Head::ShortStr(byte - SHORT_STR),
            LONG_STR            => Head::LongStr,
            0xc0..=0xc7         => Head::Binary(byte - BINARY),
            0xc8..=0xcf         => Head::Bcd(byte - 0xc7),
            0xd0..=0xd7         => Head::Bcd(byte - 0xcf),
            0xf0..=0xff         => Head::Custom(byte),
            other               => Head::Reserved(other),
        }
    }

    /// Returns the head byte. Packed decimals always encode as positive.
    pub fn encode(&self) -> u8 {
        match *self {
            Head::None              => NONE,
            Head::EmptyArray        => EMPTY_ARRAY,
            Head::ArrayEqual(w)     => ARRAY_EQUAL + width_code(w),
            Head::ArrayIndexed(w)   => ARRAY_INDEXED + width_code(w),
            Head::EmptyObject       => EMPTY_OBJECT,
            Head::ObjectSorted(w)   => OBJECT_SORTED + width_code(w),
            Head::ObjectUnsorted(w) => OBJECT_UNSORTED + width_code(w),
            Head::ArrayCompact      => ARRAY_COMPACT,
            Head::ObjectCompact     => OBJECT_COMPACT,
            Head::Reserved(b)       => b,
            Head::Illegal           => ILLEGAL,
            Head::Null              => NULL,
            Head::False             => FALSE,
            Head::True              => TRUE,
            Head::Double            => DOUBLE,
            Head::UtcDate           => UTC_DATE,
            Head::External          => EXTERNAL,
            Head::MinKey            => MIN_KEY,
            Head::MaxKey            => MAX_KEY,
            Head::Int(n)            => INT + n,
            Head::UInt(n)           => UINT + n,
            Head::SmallInt(v) if v >= 0 => SMALL_INT + v as u8,
            Head::SmallInt(v)       => (SHORT_STR as i16 + v as i16) as u8,
            Head::ShortStr(n)       => SHORT_STR + n,
            Head::LongStr           => LONG_STR,
            Head::Binary(n)         => BINARY + n,
            Head::Bcd(n)            => 0xc7 + n,
            Head::Custom(b)         => b,
        }
    }

    pub fn variant(&self) -> Variant {
        match *self {
            Head::None                                            => Variant::None,
            Head::EmptyArray | Head::ArrayEqual(_)
                | Head::ArrayIndexed(_) | Head::ArrayCompact      => Variant::Array,
            Head::EmptyObject | Head::ObjectSorted(_)
                | Head::ObjectUnsorted(_) | Head::ObjectCompact   => Variant::Object,
            Head::Reserved(_) | Head::Illegal                     => Variant::Illegal,
            Head::Null                                            => Variant::Null,
            Head::False | Head::True                              => Variant::Bool,
            Head::Double                                          => Variant::Double,
            Head::UtcDate                                         => Variant::UtcDate,
            Head::External                                        => Variant::External,
            Head::MinKey                                          => Variant::MinKey,
            Head::MaxKey                                          => Variant::MaxKey,
            Head::Int(_) | Head::SmallInt(_)                      => Variant::Int,
            Head::UInt(_)                                         => Variant::UInt,
            Head::ShortStr(_) | Head::LongStr                     => Variant::String,
            Head::Binary(_)                                       => Variant::Binary,
            Head::Bcd(_)                                          => Variant::Bcd,
            Head::Custom(_)                                       => Variant::Custom,
        }
    }

    /// Offset of the first member of a non-empty container in the absence of padding
    pub(crate) fn first_member(&self) -> usize {
        match *self {
            Head::ArrayEqual(w)                                    => 1 + w as usize,
            Head::ArrayIndexed(8) | Head::ObjectSorted(8) | Head::ObjectUnsorted(8) => 9,
            Head::ArrayIndexed(w) | Head::ObjectSorted(w) | Head::ObjectUnsorted(w) => 1 + 2 * w as usize,
            _                                                      => 1,
        }
    }

}

#[inline]
fn width_code(width: u8) -> u8 {
    width.trailing_zeros() as u8
}

/// Returns the number of bytes needed to store `value` as an unsigned integer, at least one
#[inline]
pub(crate) fn uint_width(value: u64) -> u8 {
    (8 - (value.leading_zeros() / 8) as u8).max(1)
}

/// Returns the number of bytes needed to store `value` in two's complement, at least one
#[inline]
pub(crate) fn int_width(value: i64) -> u8 {
    // the number of significant bits including the sign bit
    let bits = 65 - if value < 0 { (!value).leading_zeros() } else { value.leading_zeros() };
    ((bits + 7) / 8).max(1) as u8
}

/// Object keys the server stores as small integers instead of strings, indexed by that integer
/// minus one
const TRANSLATED_KEYS: [&str; 5] = ["_key", "_rev", "_id", "_from", "_to"];

/// Resolves an integer object key to the attribute name it stands for
pub fn translate_key(id: u64) -> Option<&'static str> {
    let index = usize::try_from(id.checked_sub(1)?).ok()?;
    TRANSLATED_KEYS.get(index).copied()
}

/// Returns the smallest container width out of 1, 2, 4 and 8 which can represent `value`
#[inline]
pub(crate) fn container_width(value: u64) -> u8 {
    match uint_width(value) {
        1 => 1,
        2 => 2,
        3 | 4 => 4,
        _ => 8,
    }
}

#[inline]
pub(crate) fn read_uint(bytes: &[u8]) -> u64 {
    let mut tmp = [0u8; 8];
    tmp[..bytes.len()].copy_from_slice(bytes);
    u64::from_le_bytes(tmp)
}

#[inline]
pub(crate) fn read_int(bytes: &[u8]) -> i64 {
    let shift = 64 - 8 * bytes.len() as u32;
    ((read_uint(bytes) << shift) as i64) >> shift
}

/// Number of bytes the variable-length encoding of `value` occupies
#[inline]
pub(crate) fn varint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value >= 0x80 {
        value >>= 7;
        len += 1;
    }
    len
}

pub(crate) fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push(value as u8 & 0x7f | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Writes a variable-length integer back to front so that it can be read starting from its last byte
pub(crate) fn write_varint_reversed(out: &mut Vec<u8>, value: u64) {
    let start = out.len();
    write_varint(out, value);
    out[start..].reverse();
}

/// Reads a variable-length integer, returning the value and the number of consumed bytes
pub(crate) fn read_varint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, b) in bytes.iter().enumerate().take(10) {
        value |= ((b & 0x7f) as u64).checked_shl(7 * i as u32)?;
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Reads a variable-length integer that ends at the last byte of `bytes`
pub(crate) fn read_varint_reversed(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, b) in bytes.iter().rev().enumerate().take(10) {
        value |= ((b & 0x7f) as u64).checked_shl(7 * i as u32)?;
        if b & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_bytes() {
        for b in 0..=u8::MAX {
            let head = Head::decode(b);
            match head {
                // negative packed decimals canonicalize to positive ones
                Head::Bcd(_) => assert_eq!(if b >= 0xd0 { b - 8 } else { b }, head.encode()),
                _ => assert_eq!(b, head.encode(), "{:#04x} decoded to {:?}", b, head),
            }
        }
    }

    #[test]
    fn small_ints() {
        assert_eq!(Head::SmallInt(0), Head::decode(0x30));
        assert_eq!(Head::SmallInt(9), Head::decode(0x39));
        assert_eq!(Head::SmallInt(-6), Head::decode(0x3a));
        assert_eq!(Head::SmallInt(-1), Head::decode(0x3f));
    }

    #[test]
    fn variants() {
        assert_eq!(Variant::Array, Head::decode(0x13).variant());
        assert_eq!(Variant::Object, Head::decode(0x0e).variant());
        assert_eq!(Variant::Illegal, Head::decode(0x15).variant());
        assert_eq!(Variant::String, Head::decode(0xbf).variant());
        assert_eq!(Variant::Custom, Head::decode(0xf7).variant());
    }

    #[test]
    fn widths() {
        assert_eq!(1, uint_width(0));
        assert_eq!(1, uint_width(255));
        assert_eq!(2, uint_width(256));
        assert_eq!(8, uint_width(u64::MAX));
        assert_eq!(1, int_width(-128));
        assert_eq!(1, int_width(127));
        assert_eq!(2, int_width(128));
        assert_eq!(2, int_width(-129));
        assert_eq!(4, int_width(i32::MIN as i64));
        assert_eq!(8, int_width(i64::MIN));
        assert_eq!(8, int_width(i64::MAX));
        assert_eq!(4, container_width(1 << 16));
        assert_eq!(8, container_width(1 << 32));
    }

    #[test]
    fn translated_keys() {
        assert_eq!(Some("_key"), translate_key(1));
        assert_eq!(Some("_to"), translate_key(5));
        assert_eq!(None, translate_key(0));
        assert_eq!(None, translate_key(6));
        assert_eq!(None, translate_key(u64::MAX));
    }

    #[test]
    fn signed_reads() {
        assert_eq!(-1, read_int(&[0xff]));
        assert_eq!(-32768, read_int(&[0x00, 0x80]));
        assert_eq!(127, read_int(&[0x7f]));
        assert_eq!(i64::MIN, read_int(&i64::MIN.to_le_bytes()));
    }

    #[test]
    fn varints() {
        let mut buf = Vec::new();
        for value in [0u64, 1, 127, 128, 300, 1 << 35, u64::MAX] {
            buf.clear();
            write_varint(&mut buf, value);
            assert_eq!(varint_len(value), buf.len());
            assert_eq!(Some((value, buf.len())), read_varint(&buf));
            buf.clear();
            write_varint_reversed(&mut buf, value);
            assert_eq!(Some((value, buf.len())), read_varint_reversed(&buf));
        }
        assert_eq!(None, read_varint(&[0x80, 0x80]));
    }

}

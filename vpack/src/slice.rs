//! Zero-copy access to encoded buffers. A [`Slice`] is nothing more than a reference to a buffer
//! and the offset of a value inside it; looking at the head byte tells the type and size of that
//! value without touching anything behind it. Object members are found through the index table
//! where there is one, so pulling a single field out of a large response stays cheap.
//!
//! Every read is bounds checked. Corrupt or truncated buffers produce [`ErrorKind::Malformed`]
//! instead of panics.

use crate::error::{malformed, mismatch, ErrorKind, PathSegment, Result};
use crate::header::*;
use crate::value::{Object, Value};
use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};

/// Maximum container nesting [`Slice::to_value`] descends into
pub const MAX_DEPTH: usize = 512;

/// Largest magnitude up to which every integer is exactly representable as a double
const EXACT_DOUBLE: u64 = 1 << 53;

/// A read-only view of the value at `pos` in `buf`
#[derive(Clone, Copy)]
pub struct Slice<'a> {
    buf: &'a [u8],
    pos: usize,
}

/// Where the members of a container live, relative to its head
struct Layout {
    size: usize,
    len: usize,
    first: usize,
    /// Start and width of the index table
    index: Option<(usize, usize)>,
}

impl<'a> Slice<'a> {

    /// Views the value at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Views the value starting at `pos`
    pub fn with_offset(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    /// A slice of a null value which is not backed by any response buffer
    pub fn null() -> Slice<'static> {
        Slice { buf: &[NULL], pos: 0 }
    }

    pub fn offset(&self) -> usize {
        self.pos
    }

    /// Decodes the head byte. An offset past the end of the buffer reads as [`Head::None`].
    pub fn head(&self) -> Head {
        Head::decode(self.buf.get(self.pos).copied().unwrap_or(NONE))
    }

    pub fn type_of(&self) -> Variant {
        self.head().variant()
    }

    pub fn is_none(&self) -> bool {
        self.type_of() == Variant::None
    }

    pub fn is_null(&self) -> bool {
        self.type_of() == Variant::Null
    }

    pub fn is_bool(&self) -> bool {
        self.type_of() == Variant::Bool
    }

    /// True for signed and unsigned integers
    pub fn is_integer(&self) -> bool {
        matches!(self.type_of(), Variant::Int | Variant::UInt)
    }

    pub fn is_double(&self) -> bool {
        self.type_of() == Variant::Double
    }

    pub fn is_string(&self) -> bool {
        self.type_of() == Variant::String
    }

    pub fn is_binary(&self) -> bool {
        self.type_of() == Variant::Binary
    }

    pub fn is_array(&self) -> bool {
        self.type_of() == Variant::Array
    }

    pub fn is_object(&self) -> bool {
        self.type_of() == Variant::Object
    }

    fn bytes(&self, from: usize, len: usize) -> Result<&'a [u8]> {
        let start = self.pos.checked_add(from);
        let end = start.and_then(|start| start.checked_add(len));
        match (start, end) {
            (Some(start), Some(end)) => match self.buf.get(start..end) {
                Some(bytes) => Ok(bytes),
                None => malformed(format!("{} bytes at offset {} exceed the buffer of {} bytes", len, start, self.buf.len())),
            },
            _ => malformed("length exceeds the address space"),
        }
    }

    fn byte(&self, at: usize) -> Result<u8> {
        Ok(self.bytes(at, 1)?[0])
    }

    fn uint_at(&self, at: usize, width: usize) -> Result<usize> {
        to_usize(read_uint(self.bytes(at, width)?))
    }

    /// Number of bytes the value occupies, including its head
    pub fn byte_size(&self) -> Result<usize> {
        let size = match self.head() {
            Head::None | Head::EmptyArray | Head::EmptyObject | Head::Illegal | Head::Null
                | Head::False | Head::True | Head::MinKey | Head::MaxKey | Head::SmallInt(_) => 1,
            Head::Double | Head::UtcDate | Head::External => 9,
            Head::Int(n) | Head::UInt(n) => 1 + n as usize,
            Head::ShortStr(n) => 1 + n as usize,
            Head::LongStr => 9usize.checked_add(self.uint_at(1, 8)?).unwrap_or(usize::MAX),
            Head::Binary(n) => (1 + n as usize).checked_add(self.uint_at(1, n as usize)?).unwrap_or(usize::MAX),
            Head::Bcd(n) => (5 + n as usize).checked_add(self.uint_at(1, n as usize)?).unwrap_or(usize::MAX),
            Head::ArrayEqual(w) | Head::ArrayIndexed(w) | Head::ObjectSorted(w) | Head::ObjectUnsorted(w) => {
                let size = self.uint_at(1, w as usize)?;
                if size <= w as usize {
                    return malformed(format!("container of {} bytes is too short for its header", size));
                }
                size
            },
            Head::ArrayCompact | Head::ObjectCompact => self.compact_size()?.0,
            Head::Custom(b) => self.custom_size(b)?,
            Head::Reserved(b) => return malformed(format!("reserved head byte {:#04x}", b)),
        };
        self.bytes(0, size)?;
        Ok(size)
    }

    /// The byte length of a compact container and the number of bytes it is stored in
    fn compact_size(&self) -> Result<(usize, usize)> {
        let rest = self.buf.get(self.pos.saturating_add(1)..).unwrap_or(&[]);
        match read_varint(rest) {
            Some((size, n)) if size > n as u64 => Ok((to_usize(size)?, n)),
            Some((size, _)) => malformed(format!("compact container of {} bytes is too short for its header", size)),
            None => malformed("unterminated byte length of compact container"),
        }
    }

    fn custom_size(&self, head: u8) -> Result<usize> {
        let (width, fixed) = match head {
            0xf0 => return Ok(2),
            0xf1 => return Ok(3),
            0xf2 => return Ok(5),
            0xf3 => return Ok(9),
            0xf4..=0xf6 => (1, 2),
            0xf7..=0xf9 => (2, 3),
            0xfa..=0xfc => (4, 5),
            _           => (8, 9),
        };
        Ok(self.uint_at(1, width)?.checked_add(fixed).unwrap_or(usize::MAX))
    }

    /// All bytes of the value, head included
    pub fn raw(&self) -> Result<&'a [u8]> {
        self.bytes(0, self.byte_size()?)
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self.head() {
            Head::False => Ok(false),
            Head::True => Ok(true),
            _ => mismatch(Variant::Bool, self.type_of()),
        }
    }

    /// Reads any integer which fits into an `i64`
    pub fn as_int(&self) -> Result<i64> {
        match self.head() {
            Head::SmallInt(v) => Ok(v as i64),
            Head::Int(n) => Ok(read_int(self.bytes(1, n as usize)?)),
            Head::UInt(n) => {
                let v = read_uint(self.bytes(1, n as usize)?);
                i64::try_from(v).map_err(|_| ErrorKind::DeserializationFailure(format!("{} does not fit into i64", v)).into())
            },
            _ => mismatch(Variant::Int, self.type_of()),
        }
    }

    /// Reads any non-negative integer
    pub fn as_uint(&self) -> Result<u64> {
        match self.head() {
            Head::UInt(n) => Ok(read_uint(self.bytes(1, n as usize)?)),
            Head::SmallInt(_) | Head::Int(_) => {
                let v = self.as_int()?;
                u64::try_from(v).map_err(|_| ErrorKind::DeserializationFailure(format!("{} does not fit into u64", v)).into())
            },
            _ => mismatch(Variant::UInt, self.type_of()),
        }
    }

    pub fn as_double(&self) -> Result<f64> {
        match self.head() {
            Head::Double => Ok(f64::from_bits(read_uint(self.bytes(1, 8)?))),
            _ => mismatch(Variant::Double, self.type_of()),
        }
    }

    /// Like [`Slice::as_double`], but integers are accepted as long as the double holds them
    /// exactly, which is the case up to a magnitude of 2^53
    pub fn as_f64_exact(&self) -> Result<f64> {
        let lossy = |v: &dyn fmt::Display| -> Result<f64> {
            Err(ErrorKind::DeserializationFailure(format!("{} can not be represented as Double without loss", v)).into())
        };
        match self.type_of() {
            Variant::Double => self.as_double(),
            Variant::UInt => match self.as_uint()? {
                v if v <= EXACT_DOUBLE => Ok(v as f64),
                v => lossy(&v),
            },
            Variant::Int => match self.as_int()? {
                v if v.unsigned_abs() <= EXACT_DOUBLE => Ok(v as f64),
                v => lossy(&v),
            },
            actual => mismatch(Variant::Double, actual),
        }
    }

    /// Milliseconds since the epoch
    pub fn as_utc_date(&self) -> Result<i64> {
        match self.head() {
            Head::UtcDate => Ok(read_int(self.bytes(1, 8)?)),
            _ => mismatch(Variant::UtcDate, self.type_of()),
        }
    }

    fn string_bytes(&self) -> Result<&'a [u8]> {
        match self.head() {
            Head::ShortStr(n) => self.bytes(1, n as usize),
            Head::LongStr => self.bytes(9, self.uint_at(1, 8)?),
            _ => mismatch(Variant::String, self.type_of()),
        }
    }

    pub fn as_str(&self) -> Result<&'a str> {
        std::str::from_utf8(self.string_bytes()?).or_else(|e| malformed(format!("invalid UTF-8 in string: {}", e)))
    }

    pub fn as_binary(&self) -> Result<&'a [u8]> {
        match self.head() {
            Head::Binary(n) => self.bytes(1 + n as usize, self.uint_at(1, n as usize)?),
            _ => mismatch(Variant::Binary, self.type_of()),
        }
    }

    /// Finds the first member of a container with an index table or of an equal-size array.
    /// Writers may leave zero padding after a header which is shorter than nine bytes.
    fn data_offset(&self, head: Head) -> Result<usize> {
        let fixed = head.first_member();
        for candidate in [2, 3, 5] {
            if fixed <= candidate && self.byte(candidate)? != 0 {
                return Ok(candidate);
            }
        }
        Ok(9)
    }

    fn layout(&self, expected: Variant) -> Result<Layout> {
        let head = self.head();
        match head {
            Head::EmptyArray | Head::EmptyObject => Ok(Layout { size: 1, len: 0, first: 1, index: None }),
            Head::ArrayEqual(_) => {
                let size = self.byte_size()?;
                let first = self.data_offset(head)?;
                let item = self.member_at(first, size)?.byte_size()?;
                match size.checked_sub(first) {
                    Some(data) => Ok(Layout { size, len: data / item, first, index: None }),
                    None => malformed("array header exceeds its byte length"),
                }
            },
            Head::ArrayIndexed(w) | Head::ObjectSorted(w) | Head::ObjectUnsorted(w) => {
                let w = w as usize;
                let size = self.byte_size()?;
                let (len, trailer) = if w == 8 {
                    (self.uint_at(size.saturating_sub(8), 8)?, 8)
                } else {
                    (self.uint_at(1 + w, w)?, 0)
                };
                let table = len.checked_mul(w)
                    .and_then(|t| t.checked_add(trailer))
                    .and_then(|t| size.checked_sub(t));
                let Some(table) = table else {
                    return malformed(format!("index table of {} entries exceeds its container", len));
                };
                let first = self.data_offset(head)?;
                if table < first {
                    return malformed("index table overlaps the container header");
                }
                Ok(Layout { size, len, first, index: Some((table, w)) })
            },
            Head::ArrayCompact | Head::ObjectCompact => {
                let (size, n) = self.compact_size()?;
                let len = match read_varint_reversed(self.bytes(0, size)?) {
                    Some((len, _)) => to_usize(len)?,
                    None => return malformed("unterminated member count of compact container"),
                };
                Ok(Layout { size, len, first: 1 + n, index: None })
            },
            _ => mismatch(expected, self.type_of()),
        }
    }

    /// The member starting `offset` bytes after the head, which must lie within the container
    fn member_at(&self, offset: usize, size: usize) -> Result<Slice<'a>> {
        if offset == 0 || offset >= size {
            return malformed(format!("member offset {} lies outside of its container of {} bytes", offset, size));
        }
        Ok(Slice::with_offset(self.buf, self.pos + offset))
    }

    fn index_entry(&self, layout: &Layout, i: usize) -> Result<usize> {
        match layout.index {
            Some((table, w)) => self.uint_at(table + i * w, w),
            None => malformed("container has no index table"),
        }
    }

    /// Reads the key at `offset` and returns its bytes together with the value following it.
    /// Integer keys are resolved to the attribute names they stand for.
    fn entry_at(&self, offset: usize, size: usize) -> Result<(&'a [u8], Slice<'a>)> {
        let key = self.member_at(offset, size)?;
        let key_bytes = match key.head() {
            Head::SmallInt(_) | Head::UInt(_) => {
                let id = key.as_uint()?;
                match translate_key(id) {
                    Some(name) => name.as_bytes(),
                    None => return malformed(format!("unknown translated key {}", id)),
                }
            },
            _ => key.string_bytes()?,
        };
        let value = self.member_at(offset + key.byte_size()?, size)?;
        Ok((key_bytes, value))
    }

    /// Number of elements or members of a container, or number of bytes of a string or binary
    pub fn length(&self) -> Result<usize> {
        match self.head() {
            Head::ShortStr(_) | Head::LongStr => Ok(self.string_bytes()?.len()),
            Head::Binary(_) => Ok(self.as_binary()?.len()),
            _ => Ok(self.layout(Variant::Array)?.len),
        }
    }

    /// Returns the array element at `index`
    pub fn at(&self, index: usize) -> Result<Slice<'a>> {
        let head = self.head();
        if head.variant() != Variant::Array {
            return mismatch(Variant::Array, self.type_of());
        }
        let layout = self.layout(Variant::Array)?;
        if index >= layout.len {
            return Err(ErrorKind::IndexOutOfRange { index, length: layout.len }.into());
        }
        let offset = match head {
            Head::ArrayEqual(_) => layout.first + index * ((layout.size - layout.first) / layout.len),
            Head::ArrayIndexed(_) => self.index_entry(&layout, index)?,
            _ => {
                let mut offset = layout.first;
                for _ in 0..index {
                    offset += self.member_at(offset, layout.size)?.byte_size()?;
                }
                offset
            },
        };
        self.member_at(offset, layout.size)
    }

    /// Looks up an object member. Absent keys are reported as `None`.
    pub fn find(&self, key: &str) -> Result<Option<Slice<'a>>> {
        let wanted = key.as_bytes();
        let head = self.head();
        if head.variant() != Variant::Object {
            return mismatch(Variant::Object, self.type_of());
        }
        let layout = self.layout(Variant::Object)?;
        match head {
            Head::ObjectSorted(_) => {
                let (mut low, mut high) = (0, layout.len);
                while low < high {
                    let mid = low + (high - low) / 2;
                    let (candidate, value) = self.entry_at(self.index_entry(&layout, mid)?, layout.size)?;
                    match candidate.cmp(wanted) {
                        Ordering::Less => low = mid + 1,
                        Ordering::Greater => high = mid,
                        Ordering::Equal => return Ok(Some(value)),
                    }
                }
                Ok(None)
            },
            Head::ObjectUnsorted(_) => {
                for i in 0..layout.len {
                    let (candidate, value) = self.entry_at(self.index_entry(&layout, i)?, layout.size)?;
                    if candidate == wanted {
                        return Ok(Some(value));
                    }
                }
                Ok(None)
            },
            _ => {
                let mut offset = layout.first;
                for _ in 0..layout.len {
                    let (candidate, value) = self.entry_at(offset, layout.size)?;
                    if candidate == wanted {
                        return Ok(Some(value));
                    }
                    offset = value.pos - self.pos + value.byte_size()?;
                }
                Ok(None)
            },
        }
    }

    /// Looks up an object member, returning a null slice if it is absent
    pub fn get(&self, key: &str) -> Result<Slice<'a>> {
        Ok(self.find(key)?.unwrap_or_else(|| Slice::null()))
    }

    pub fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.find(key)?.is_some())
    }

    /// Follows a chain of keys and indices. An absent key anywhere along the way yields a null
    /// slice, other failures carry the path up to the point they occurred at.
    pub fn get_path(&self, path: &[PathSegment]) -> Result<Slice<'a>> {
        let mut current = *self;
        for (depth, segment) in path.iter().enumerate() {
            let next = match segment {
                PathSegment::Key(key) => current.find(key),
                PathSegment::Index(index) => current.at(*index).map(Some),
            };
            let next = next.map_err(|e| path[..depth].iter().rev().fold(e, |e, s| e.within(s.clone())))?;
            match next {
                Some(slice) => current = slice,
                None => return Ok(Slice::null()),
            }
        }
        Ok(current)
    }

    /// Iterates over the elements of an array in order
    pub fn array_iter(&self) -> Result<ArrayIter<'a>> {
        if !self.is_array() {
            return mismatch(Variant::Array, self.type_of());
        }
        let layout = self.layout(Variant::Array)?;
        Ok(ArrayIter { array: *self, offset: layout.first, index: 0, layout })
    }

    /// Iterates over the members of an object in the order they were written
    pub fn object_iter(&self) -> Result<ObjectIter<'a>> {
        if !self.is_object() {
            return mismatch(Variant::Object, self.type_of());
        }
        let layout = self.layout(Variant::Object)?;
        Ok(ObjectIter { object: *self, offset: layout.first, index: 0, layout })
    }

    pub fn keys(&self) -> Result<impl Iterator<Item = Result<&'a str>>> {
        Ok(self.object_iter()?.map(|member| member.map(|(key, _)| key)))
    }

    /// Copies the value and everything it contains into a [`Value`]
    pub fn to_value(&self) -> Result<Value> {
        self.materialize(0)
    }

    fn materialize(&self, depth: usize) -> Result<Value> {
        match self.head() {
            Head::Null => Ok(Value::Null),
            Head::False | Head::True => Ok(Value::Bool(self.as_bool()?)),
            Head::SmallInt(_) | Head::Int(_) => Ok(Value::Int(self.as_int()?)),
            Head::UInt(_) => Ok(Value::UInt(self.as_uint()?)),
            Head::Double => Ok(Value::Double(self.as_double()?)),
            Head::UtcDate => Ok(Value::Int(self.as_utc_date()?)),
            Head::ShortStr(_) | Head::LongStr => Ok(Value::String(self.as_str()?.to_owned())),
            Head::Binary(_) => Ok(Value::Binary(self.as_binary()?.to_vec())),
            head if depth >= MAX_DEPTH && matches!(head.variant(), Variant::Array | Variant::Object) => {
                Err(ErrorKind::DeserializationFailure(format!("containers nested deeper than {} levels", MAX_DEPTH)).into())
            },
            head if head.variant() == Variant::Array => {
                let iter = self.array_iter()?;
                let mut elements = Vec::with_capacity(iter.layout.len.min(iter.layout.size));
                for (i, element) in iter.enumerate() {
                    elements.push(element.and_then(|e| e.materialize(depth + 1)).map_err(|e| e.within(i))?);
                }
                Ok(Value::Array(elements))
            },
            head if head.variant() == Variant::Object => {
                let mut members = Object::new();
                for member in self.object_iter()? {
                    let (key, value) = member?;
                    members.insert(key.to_owned(), value.materialize(depth + 1).map_err(|e| e.within(key))?);
                }
                Ok(Value::Object(members))
            },
            head => Err(ErrorKind::DeserializationFailure(format!("{} values have no counterpart in the value model", head.variant())).into()),
        }
    }

}

impl Debug for Slice<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slice")
            .field("offset", &self.pos)
            .field("head", &self.head())
            .finish()
    }
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).or_else(|_| malformed(format!("length {} exceeds the address space", value)))
}

/// Iterator over the elements of an array slice. Stops after the first error.
pub struct ArrayIter<'a> {
    array: Slice<'a>,
    layout: Layout,
    index: usize,
    offset: usize,
}

impl<'a> Iterator for ArrayIter<'a> {
    type Item = Result<Slice<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.layout.len {
            return None;
        }
        let element = self.array.member_at(self.offset, self.layout.size)
            .and_then(|e| Ok((e, e.byte_size()?)));
        match element {
            Ok((element, size)) => {
                self.index += 1;
                self.offset += size;
                Some(Ok(element))
            },
            Err(e) => {
                let index = self.index;
                self.index = self.layout.len;
                Some(Err(e.within(index)))
            },
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.layout.len - self.index;
        (remaining, Some(remaining))
    }
}

/// Iterator over the members of an object slice in data order. Stops after the first error.
pub struct ObjectIter<'a> {
    object: Slice<'a>,
    layout: Layout,
    index: usize,
    offset: usize,
}

impl<'a> Iterator for ObjectIter<'a> {
    type Item = Result<(&'a str, Slice<'a>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.layout.len {
            return None;
        }
        let member = self.object.entry_at(self.offset, self.layout.size).and_then(|(key, value)| {
            let key = std::str::from_utf8(key).or_else(|e| malformed(format!("invalid UTF-8 in key: {}", e)))?;
            Ok((key, value, value.pos - self.object.pos + value.byte_size()?))
        });
        match member {
            Ok((key, value, next)) => {
                self.index += 1;
                self.offset = next;
                Some(Ok((key, value)))
            },
            Err(e) => {
                let index = self.index;
                self.index = self.layout.len;
                Some(Err(e.within(index)))
            },
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.layout.len - self.index;
        (remaining, Some(remaining))
    }
}

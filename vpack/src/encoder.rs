//! Writing VelocyPack. The [`Builder`] appends values one at a time and keeps a stack of the
//! containers which are still open. Since a container's header holds its byte length and member
//! count, nine bytes are reserved when it is opened; on close the final layout is chosen, the
//! members are shifted down to directly follow the real header and the index table is appended.
//!
//! The [`Encoder`] drives a builder from a [`Value`] with an explicit work stack, so nesting depth
//! is only bounded by memory.

use crate::error::{ErrorKind, Result};
use crate::header::*;
use crate::slice::Slice;
use crate::value::Value;
use tracing::trace;

/// Space reserved for a container header until its final size is known
const RESERVED: usize = 9;

/// Tunes the layouts the encoder picks. All layouts are valid VelocyPack, so these only trade
/// buffer size against lookup speed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Objects with fewer members than this are written without an index table and get searched
    /// linearly. Zero indexes every non-empty object.
    pub object_index_threshold: usize,
    /// Write arrays without index table. Positional access on them needs a linear scan.
    pub compact_arrays: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { object_index_threshold: 5, compact_arrays: false }
    }
}

/// The finished encoding of exactly one value. It can be read through [`EncodedBuffer::slice`] or
/// handed on as bytes, but not changed anymore.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EncodedBuffer {
    bytes: Vec<u8>,
}

impl EncodedBuffer {

    pub fn slice(&self) -> Slice<'_> {
        Slice::new(&self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

}

impl AsRef<[u8]> for EncodedBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<EncodedBuffer> for Vec<u8> {
    fn from(buffer: EncodedBuffer) -> Vec<u8> {
        buffer.bytes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Array,
    Object,
}

/// A container which has been opened but not closed yet
#[derive(Debug)]
struct Frame {
    kind: Kind,
    /// Position of the reserved header
    start: usize,
    /// Absolute positions of the elements, or of the keys for objects
    members: Vec<usize>,
    /// Objects only: a key has been written and waits for its value
    key_pending: bool,
}

/// Incrementally writes one value. Scalars are appended directly, containers are opened, filled and
/// closed again. Inside objects every value has to be preceded by [`Builder::add_key`].
///
/// Errors are reported for misuse only and leave the builder unchanged.
#[derive(Debug, Default)]
pub struct Builder {
    buf: Vec<u8>,
    stack: Vec<Frame>,
    options: Options,
}

impl Builder {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: Options) -> Self {
        Self { buf: Vec::new(), stack: Vec::new(), options }
    }

    /// Number of containers which are still open
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn open_array(&mut self) -> Result<&mut Self> {
        self.check_value()?;
        self.open(Kind::Array);
        Ok(self)
    }

    pub fn open_object(&mut self) -> Result<&mut Self> {
        self.check_value()?;
        self.open(Kind::Object);
        Ok(self)
    }

    pub fn add_key(&mut self, key: &str) -> Result<&mut Self> {
        match self.stack.last() {
            Some(Frame { kind: Kind::Object, key_pending: false, .. }) => {
                self.write_key(key);
                Ok(self)
            },
            Some(Frame { kind: Kind::Object, .. }) => Err(ErrorKind::InvalidBuilderState("a key must be followed by a value").into()),
            _ => Err(ErrorKind::InvalidBuilderState("keys are only allowed inside objects").into()),
        }
    }

    pub fn add_null(&mut self) -> Result<&mut Self> {
        self.check_value()?;
        self.begin_value();
        self.buf.push(NULL);
        Ok(self)
    }

    pub fn add_bool(&mut self, v: bool) -> Result<&mut Self> {
        self.check_value()?;
        self.begin_value();
        self.buf.push(if v { TRUE } else { FALSE });
        Ok(self)
    }

    pub fn add_int(&mut self, v: i64) -> Result<&mut Self> {
        self.check_value()?;
        self.begin_value();
        self.write_int(v);
        Ok(self)
    }

    pub fn add_uint(&mut self, v: u64) -> Result<&mut Self> {
        self.check_value()?;
        self.begin_value();
        self.write_uint(v);
        Ok(self)
    }

    pub fn add_double(&mut self, v: f64) -> Result<&mut Self> {
        self.check_value()?;
        self.begin_value();
        self.buf.push(DOUBLE);
        self.buf.extend_from_slice(&v.to_le_bytes());
        Ok(self)
    }

    pub fn add_str(&mut self, v: &str) -> Result<&mut Self> {
        self.check_value()?;
        self.begin_value();
        self.write_str(v);
        Ok(self)
    }

    pub fn add_binary(&mut self, v: &[u8]) -> Result<&mut Self> {
        self.check_value()?;
        self.begin_value();
        self.write_binary(v);
        Ok(self)
    }

    /// Appends a complete value, containers included
    pub fn add_value(&mut self, value: &Value) -> Result<&mut Self> {
        self.check_value()?;
        self.write_value(value);
        Ok(self)
    }

    /// Closes the innermost open container
    pub fn close(&mut self) -> Result<&mut Self> {
        match self.stack.last() {
            None => return Err(ErrorKind::InvalidBuilderState("no open container to close").into()),
            Some(Frame { key_pending: true, .. }) => return Err(ErrorKind::InvalidBuilderState("a key must be followed by a value").into()),
            Some(frame) if frame.kind == Kind::Object && self.has_duplicate_keys(frame) => {
                return Err(ErrorKind::InvalidBuilderState("duplicate key in object").into());
            },
            _ => {},
        }
        self.close_innermost();
        Ok(self)
    }

    /// Seals the buffer. Fails if containers are still open or nothing has been added.
    pub fn finish(self) -> Result<EncodedBuffer> {
        if !self.stack.is_empty() {
            Err(ErrorKind::InvalidBuilderState("unclosed container").into())
        } else if self.buf.is_empty() {
            Err(ErrorKind::InvalidBuilderState("no value has been added").into())
        } else {
            Ok(EncodedBuffer { bytes: self.buf })
        }
    }

    fn check_value(&self) -> Result<()> {
        match self.stack.last() {
            Some(Frame { kind: Kind::Object, key_pending: false, .. }) => Err(ErrorKind::InvalidBuilderState("object members need a key").into()),
            None if !self.buf.is_empty() => Err(ErrorKind::InvalidBuilderState("the builder already holds a complete value").into()),
            _ => Ok(()),
        }
    }

    /// Registers the value about to be written with its parent container
    fn begin_value(&mut self) {
        let pos = self.buf.len();
        match self.stack.last_mut() {
            Some(frame) if frame.kind == Kind::Array => frame.members.push(pos),
            Some(frame) => frame.key_pending = false,
            None => {},
        }
    }

    fn open(&mut self, kind: Kind) {
        self.begin_value();
        let start = self.buf.len();
        self.buf.resize(start + RESERVED, 0);
        self.stack.push(Frame { kind, start, members: Vec::new(), key_pending: false });
    }

    fn write_key(&mut self, key: &str) {
        let pos = self.buf.len();
        if let Some(frame) = self.stack.last_mut() {
            frame.members.push(pos);
            frame.key_pending = true;
        }
        self.write_str(key);
    }

    /// Writes a value without checking the builder state. Callers guarantee that a value is
    /// allowed at the current position.
    pub(crate) fn write_value(&mut self, value: &Value) {
        enum Step<'v> {
            Value(&'v Value),
            Key(&'v str),
            Close,
        }
        let mut steps = vec![Step::Value(value)];
        while let Some(step) = steps.pop() {
            match step {
                Step::Key(key) => self.write_key(key),
                Step::Close => self.close_innermost(),
                Step::Value(Value::Array(elements)) => {
                    self.open(Kind::Array);
                    steps.push(Step::Close);
                    steps.extend(elements.iter().rev().map(Step::Value));
                },
                Step::Value(Value::Object(members)) => {
                    self.open(Kind::Object);
                    steps.push(Step::Close);
                    for (key, member) in members.iter().rev() {
                        steps.push(Step::Value(member));
                        steps.push(Step::Key(key));
                    }
                },
                Step::Value(scalar) => self.write_scalar(scalar),
            }
        }
    }

    fn write_scalar(&mut self, value: &Value) {
        self.begin_value();
        match value {
            Value::Null         => self.buf.push(NULL),
            Value::Bool(false)  => self.buf.push(FALSE),
            Value::Bool(true)   => self.buf.push(TRUE),
            Value::Int(v)       => self.write_int(*v),
            Value::UInt(v)      => self.write_uint(*v),
            Value::Double(v)    => {
                self.buf.push(DOUBLE);
                self.buf.extend_from_slice(&v.to_le_bytes());
            },
            Value::String(v)    => self.write_str(v),
            Value::Binary(v)    => self.write_binary(v),
            // unrolled by write_value
            Value::Array(_) | Value::Object(_) => {},
        }
    }

    fn write_int(&mut self, v: i64) {
        match v {
            0..=9 => self.buf.push(SMALL_INT + v as u8),
            -6..=-1 => self.buf.push((SHORT_STR as i64 + v) as u8),
            _ => {
                let n = int_width(v);
                self.buf.push(INT + n);
                self.buf.extend_from_slice(&v.to_le_bytes()[..n as usize]);
            },
        }
    }

    /// Unsigned integers never use the small int encoding so that they decode as `UInt` again
    fn write_uint(&mut self, v: u64) {
        let n = uint_width(v);
        self.buf.push(UINT + n);
        self.buf.extend_from_slice(&v.to_le_bytes()[..n as usize]);
    }

    fn write_str(&mut self, v: &str) {
        if v.len() <= SHORT_STR_MAX {
            self.buf.push(SHORT_STR + v.len() as u8);
        } else {
            self.buf.push(LONG_STR);
            self.buf.extend_from_slice(&(v.len() as u64).to_le_bytes());
        }
        self.buf.extend_from_slice(v.as_bytes());
    }

    fn write_binary(&mut self, v: &[u8]) {
        let len = v.len() as u64;
        let n = uint_width(len);
        self.buf.push(BINARY + n);
        self.buf.extend_from_slice(&len.to_le_bytes()[..n as usize]);
        self.buf.extend_from_slice(v);
    }

    fn has_duplicate_keys(&self, frame: &Frame) -> bool {
        let mut keys: Vec<&[u8]> = frame.members.iter().map(|&p| key_bytes(&self.buf, p)).collect();
        keys.sort_unstable();
        keys.windows(2).any(|w| w[0] == w[1])
    }

    fn close_innermost(&mut self) {
        let Some(frame) = self.stack.pop() else { return };
        let n = frame.members.len();
        match frame.kind {
            Kind::Array if n == 0 => self.close_empty(frame.start, EMPTY_ARRAY),
            Kind::Object if n == 0 => self.close_empty(frame.start, EMPTY_OBJECT),
            Kind::Array if self.options.compact_arrays => self.close_compact(frame.start, n, ARRAY_COMPACT),
            Kind::Array => match self.equal_size(&frame.members) {
                Some(_) => self.close_equal(frame.start),
                None => self.close_indexed(frame.start, &frame.members, ARRAY_INDEXED),
            },
            Kind::Object if n < self.options.object_index_threshold => self.close_compact(frame.start, n, OBJECT_COMPACT),
            Kind::Object => {
                let mut members = frame.members;
                members.sort_by(|&a, &b| key_bytes(&self.buf, a).cmp(key_bytes(&self.buf, b)));
                self.close_indexed(frame.start, &members, OBJECT_SORTED);
            },
        }
    }

    /// Returns the common size of all elements if there is one
    fn equal_size(&self, members: &[usize]) -> Option<usize> {
        let last = self.buf.len() - members[members.len() - 1];
        members.windows(2).all(|w| w[1] - w[0] == last).then_some(last)
    }

    fn close_empty(&mut self, start: usize, head: u8) {
        self.buf.truncate(start);
        self.buf.push(head);
    }

    /// Moves the members down so that they follow a header of `header` bytes
    fn shift_members(&mut self, start: usize, header: usize) {
        let data = start + RESERVED;
        let end = self.buf.len();
        self.buf.copy_within(data..end, start + header);
        self.buf.truncate(end - (RESERVED - header));
    }

    fn close_equal(&mut self, start: usize) {
        let data_len = self.buf.len() - start - RESERVED;
        let width = [1u8, 2, 4, 8].into_iter()
            .find(|&w| container_width((1 + w as usize + data_len) as u64) <= w)
            .unwrap_or(8);
        let total = 1 + width as usize + data_len;
        trace!(start, total, width, "closing array with equally sized elements");
        self.shift_members(start, 1 + width as usize);
        self.buf[start] = Head::ArrayEqual(width).encode();
        self.buf[start + 1..start + 1 + width as usize].copy_from_slice(&(total as u64).to_le_bytes()[..width as usize]);
    }

    fn close_indexed(&mut self, start: usize, members: &[usize], base: u8) {
        let n = members.len();
        let data_len = self.buf.len() - start - RESERVED;
        let fits = |w: usize| {
            let total = 1 + 2 * w + data_len + n * w;
            container_width(total as u64) as usize <= w && container_width(n as u64) as usize <= w
        };
        let width = [1usize, 2, 4].into_iter().find(|&w| fits(w)).unwrap_or(8);
        let header = if width == 8 { RESERVED } else { 1 + 2 * width };
        let total = header + data_len + n * width + if width == 8 { 8 } else { 0 };
        trace!(start, total, width, members = n, "closing indexed container");
        self.shift_members(start, header);
        let shift = RESERVED - header;
        for &member in members {
            let offset = (member - shift - start) as u64;
            self.buf.extend_from_slice(&offset.to_le_bytes()[..width]);
        }
        if width == 8 {
            self.buf.extend_from_slice(&(n as u64).to_le_bytes());
        }
        self.buf[start] = base + (width as u32).trailing_zeros() as u8;
        self.buf[start + 1..start + 1 + width].copy_from_slice(&(total as u64).to_le_bytes()[..width]);
        if width < 8 {
            self.buf[start + 1 + width..start + 1 + 2 * width].copy_from_slice(&(n as u64).to_le_bytes()[..width]);
        }
    }

    fn close_compact(&mut self, start: usize, n: usize, head: u8) {
        let data_len = self.buf.len() - start - RESERVED;
        let tail = varint_len(n as u64);
        let mut len_bytes = varint_len((1 + 1 + data_len + tail) as u64);
        let mut total = 1 + len_bytes + data_len + tail;
        if varint_len(total as u64) != len_bytes {
            len_bytes += 1;
            total += 1;
        }
        trace!(start, total, members = n, "closing compact container");
        self.shift_members(start, 1 + len_bytes);
        self.buf[start] = head;
        let mut length = Vec::with_capacity(len_bytes);
        write_varint(&mut length, total as u64);
        self.buf[start + 1..start + 1 + len_bytes].copy_from_slice(&length);
        write_varint_reversed(&mut self.buf, n as u64);
    }

}

/// The raw bytes of a key the builder wrote itself at `pos`
fn key_bytes(buf: &[u8], pos: usize) -> &[u8] {
    match Head::decode(buf[pos]) {
        Head::ShortStr(n) => &buf[pos + 1..pos + 1 + n as usize],
        _ => {
            let len = read_uint(&buf[pos + 1..pos + 9]) as usize;
            &buf[pos + 9..pos + 9 + len]
        },
    }
}

/// Encodes whole values
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    options: Options,
}

impl Encoder {

    pub fn with_options(options: Options) -> Self {
        Self { options }
    }

    /// Encodes a value. Every value can be encoded, so this never fails.
    pub fn encode(&self, value: &Value) -> EncodedBuffer {
        let mut builder = Builder::with_options(self.options.clone());
        builder.write_value(value);
        EncodedBuffer { bytes: builder.buf }
    }

}

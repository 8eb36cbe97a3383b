//! Encoding and zero-copy decoding of VelocyPack, the binary format request and response bodies of
//! the database are exchanged in.
//!
//! Outgoing bodies are built as a [`Value`] (or through a [`Builder`]) and encoded into an
//! [`EncodedBuffer`]. Incoming bodies are wrapped into a [`Slice`] which reads members straight
//! from the buffer, so a caller interested in a single field of a large document never pays for
//! the rest of it. A [`Decoder`] folds slices into values of a shape given by a
//! [`TypeDescriptor`].
//!
//! # A note on layouts
//!
//! The encoder picks one of several valid layouts for every container. Arrays whose elements all
//! have the same size go without index table, other arrays get one. Objects with fewer members
//! than [`Options::object_index_threshold`] are written compactly and searched linearly, larger
//! ones get an index table sorted by key which lookups binary search. The members themselves are
//! always stored in insertion order.
//!
//! # A note on `usize`
//!
//! Lengths on the wire are up to 64 bits wide. On platforms where `usize` is smaller, buffers with
//! lengths beyond the address space are reported as malformed.
//!
//! # Examples
//!
//! ```
//! use vpack::*;
//!
//! let user = Value::object([
//!     ("name", Value::from("TestUser11")),
//!     ("gender", Value::from("FEMALE")),
//!     ("age", Value::Int(21)),
//! ]);
//! let buffer = user.encode();
//! assert_eq!(&buffer.as_bytes()[..8], [
//!     0x14, // compact object
//!     0x27, // of 39 bytes
//!     0x44, // String of length 4
//!     b'n',
//!     b'a',
//!     b'm',
//!     b'e',
//!     0x4a, // String of length 10
//! ]);
//! assert_eq!(buffer.as_bytes()[38], 0x03); // 3 members
//!
//! let slice = buffer.slice();
//! assert_eq!(21, slice.get("age")?.as_int()?);
//!
//! let record = RecordDescriptor::new()
//!     .field("name", TypeDescriptor::String)
//!     .field("gender", TypeDescriptor::String)
//!     .field("age", TypeDescriptor::Int);
//! let decoded = Decoder::new().decode(slice, &record.into())?;
//! assert_eq!(user, decoded);
//! # Ok::<(), vpack::Error>(())
//! ```

mod decoder;
mod encoder;
mod error;
mod header;
mod slice;
mod value;

pub use decoder::*;
pub use encoder::*;
pub use error::*;
pub use header::{translate_key, Head, Variant};
pub use slice::*;
pub use value::*;

use serde::{de, ser};
use std::fmt::Display;
use thiserror::Error;
use vpack::{ErrorKind, Path, PathSegment};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Vpack(#[from] vpack::Error),
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {

    /// The kind of the error, if it originated from the data rather than from writing the output
    pub fn kind(&self) -> Option<&ErrorKind> {
        match self {
            Error::Vpack(e) => Some(e.kind()),
            Error::Io(_) => None,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Error::Vpack(e) => Some(e.path()),
            Error::Io(_) => None,
        }
    }

    pub(crate) fn within(self, segment: impl Into<PathSegment>) -> Self {
        match self {
            Error::Vpack(e) => Error::Vpack(e.within(segment)),
            e => e,
        }
    }

}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::Vpack(kind.into())
    }
}

impl ser::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        ErrorKind::UnsupportedType(msg.to_string()).into()
    }
}

impl de::Error for Error {
    fn custom<T: Display>(msg: T) -> Self {
        ErrorKind::DeserializationFailure(msg.to_string()).into()
    }

    fn missing_field(field: &'static str) -> Self {
        ErrorKind::MissingField(field.to_owned()).into()
    }
}

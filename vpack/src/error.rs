use crate::header::Variant;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// One step from a container to one of its members
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// The chain of keys and indices leading from the outermost value to the one an error occurred
/// at. Displayed as `$.cats[1].name`, where `$` denotes the outermost value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path(Vec<PathSegment>);

impl Path {

    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: impl Into<PathSegment>) {
        self.0.push(segment.into());
    }

    fn prepend(&mut self, segment: PathSegment) {
        self.0.insert(0, segment);
    }

}

impl<S: Into<PathSegment>> FromIterator<S> for Path {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in self.0.iter() {
            match segment {
                PathSegment::Key(key) if key.chars().all(|c| c.is_alphanumeric() || c == '_') && !key.is_empty()
                                        => write!(f, ".{}", key)?,
                PathSegment::Key(key)   => write!(f, "[{:?}]", key)?,
                PathSegment::Index(i)   => write!(f, "[{}]", i)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    /// The input can not be represented in the wire format
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// An accessor was used on a value of a different variant
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: Variant, actual: Variant },
    #[error("Index {index} out of range for length {length}")]
    IndexOutOfRange { index: usize, length: usize },
    #[error("Missing field `{0}`")]
    MissingField(String),
    #[error("Deserialization failed: {0}")]
    DeserializationFailure(String),
    /// The buffer is truncated or contains bytes which are not valid VelocyPack
    #[error("Malformed buffer: {0}")]
    Malformed(String),
    #[error("Invalid builder state: {0}")]
    InvalidBuilderState(&'static str),
}

impl ErrorKind {
    pub fn at(self, path: Path) -> Error {
        Error { kind: self, path }
    }
}

/// An error together with the location inside the value at which it occurred
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} at {path}")]
pub struct Error {
    kind: ErrorKind,
    path: Path,
}

impl Error {

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// Marks the error as having occurred inside the member `segment`. Called while the error
    /// travels outwards, so segments get prepended.
    pub fn within(mut self, segment: impl Into<PathSegment>) -> Self {
        self.path.prepend(segment.into());
        self
    }

}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        kind.at(Path::root())
    }
}

pub(crate) fn mismatch<T>(expected: Variant, actual: Variant) -> Result<T> {
    Err(ErrorKind::TypeMismatch { expected, actual }.into())
}

pub(crate) fn malformed<T>(what: impl Into<String>) -> Result<T> {
    Err(ErrorKind::Malformed(what.into()).into())
}

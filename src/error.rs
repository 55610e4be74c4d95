//! Error types for the hfile format engine.

use std::fmt;
use std::io;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for hfile operations.
#[derive(Debug)]
pub enum Error {
    /// An I/O error occurred, including short reads from the byte source.
    Io(io::Error),

    /// A key passed to the writer was empty or longer than the maximum.
    InvalidKey(String),

    /// A value passed to the writer was rejected.
    InvalidValue(String),

    /// An appended key was not strictly greater than the previous key.
    OutOfOrder(String),

    /// A file-info key used the reserved `hfile.` prefix.
    ReservedPrefix(String),

    /// A block or trailer magic did not match the expected sentinel.
    BadMagic(String),

    /// The trailer names a compression codec ordinal this build cannot resolve.
    UnknownCodec(u32),

    /// The comparator identity stored in the file is not registered.
    UnknownComparator(String),

    /// The trailer version is not the one this engine writes.
    UnsupportedVersion(u32),

    /// The compression codec reported a failure while inflating a block.
    DecompressionFailed(String),

    /// A scanner query was made before a successful seek.
    NotSeeked,

    /// A reader accessor was called before `load_metadata`.
    NotLoaded,

    /// An operation that needs at least one data block ran on an empty file.
    Empty,

    /// An invalid argument was provided.
    InvalidArgument(String),
}

impl Error {
    /// Creates a new invalid key error.
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Error::InvalidKey(msg.into())
    }

    /// Creates a new invalid value error.
    pub fn invalid_value(msg: impl Into<String>) -> Self {
        Error::InvalidValue(msg.into())
    }

    /// Creates a new out-of-order error.
    pub fn out_of_order(msg: impl Into<String>) -> Self {
        Error::OutOfOrder(msg.into())
    }

    /// Creates a new bad magic error naming the offending section.
    pub fn bad_magic(section: impl Into<String>) -> Self {
        Error::BadMagic(section.into())
    }

    /// Creates a new decompression error.
    pub fn decompression_failed(msg: impl Into<String>) -> Self {
        Error::DecompressionFailed(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates an I/O error signalling corrupt on-disk data.
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Error::Io(io::Error::new(io::ErrorKind::InvalidData, msg.into()))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::InvalidKey(msg) => write!(f, "Invalid key: {}", msg),
            Error::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
            Error::OutOfOrder(msg) => write!(f, "Key out of order: {}", msg),
            Error::ReservedPrefix(msg) => {
                write!(f, "File-info key uses a reserved prefix: {}", msg)
            }
            Error::BadMagic(section) => write!(f, "Bad magic in {}", section),
            Error::UnknownCodec(ordinal) => {
                write!(f, "Unknown compression codec ordinal: {}", ordinal)
            }
            Error::UnknownComparator(id) => write!(f, "Unknown comparator: {}", id),
            Error::UnsupportedVersion(v) => write!(f, "Unsupported file version: {}", v),
            Error::DecompressionFailed(msg) => write!(f, "Decompression failed: {}", msg),
            Error::NotSeeked => write!(f, "Scanner queried before a successful seek"),
            Error::NotLoaded => write!(f, "Reader metadata not loaded"),
            Error::Empty => write!(f, "File has no data blocks"),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

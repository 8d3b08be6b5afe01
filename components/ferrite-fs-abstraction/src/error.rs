//! File-system error types.
//!
//! Helpers inside a backend return bare [`ErrorKind`] values; the operation
//! entry points wrap them into a [`PathError`] carrying the operation name
//! and the user-visible path. End of file is reported as [`FsError::Eof`]
//! and is never wrapped.

use alloc::string::{String, ToString};
use core::fmt;

/// Result type for file-system operations.
pub type FsResult<T> = Result<T, FsError>;

/// Bare failure kind, before any path context is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed path or forbidden flag combination.
    Invalid,
    /// File or directory not found.
    NotFound,
    /// File or directory already exists.
    AlreadyExists,
    /// A path component is not a directory.
    NotADirectory,
    /// The path is a directory where a file was expected.
    IsADirectory,
    /// Operation on a closed handle.
    BadHandle,
    /// Operation not supported by this backend.
    NotSupported,
    /// No space left on device.
    NoSpace,
    /// Interrupted by the user (`^C` in cooked mode).
    Canceled,
    /// Input line does not fit the configured line buffer.
    LineTooLong,
    /// The semihosting host reported this errno.
    Host(i32),
    /// Error from the underlying byte stream.
    Io(embedded_io::ErrorKind),
}

impl ErrorKind {
    /// Returns a human-readable description.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Invalid => "invalid argument",
            ErrorKind::NotFound => "no such file or directory",
            ErrorKind::AlreadyExists => "already exists",
            ErrorKind::NotADirectory => "not a directory",
            ErrorKind::IsADirectory => "is a directory",
            ErrorKind::BadHandle => "bad file handle",
            ErrorKind::NotSupported => "operation not supported",
            ErrorKind::NoSpace => "no space left on device",
            ErrorKind::Canceled => "operation canceled",
            ErrorKind::LineTooLong => "line too long",
            ErrorKind::Host(_) => "semihosting error",
            ErrorKind::Io(_) => "i/o error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Host(no) => write!(f, "semihosting error {no}"),
            ErrorKind::Io(kind) => write!(f, "i/o error: {kind:?}"),
            _ => f.write_str(self.as_str()),
        }
    }
}

/// An [`ErrorKind`] tagged with the failed operation and the path it was
/// given, mirroring what the runtime reports to applications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathError {
    pub op: &'static str,
    pub path: String,
    pub kind: ErrorKind,
}

impl fmt::Display for PathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.op, self.path, self.kind)
    }
}

/// Error returned by file-system operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    /// End of file or stream. Carries no operation context.
    Eof,
    /// A failed operation with its path context.
    Path(PathError),
}

impl FsError {
    /// Wraps `kind` with the operation name and path.
    pub fn path(op: &'static str, path: &str, kind: ErrorKind) -> FsError {
        FsError::Path(PathError {
            op,
            path: path.to_string(),
            kind,
        })
    }

    /// Returns the bare kind, or `None` for end of file.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            FsError::Eof => None,
            FsError::Path(e) => Some(e.kind),
        }
    }

    /// Reports whether this is the end-of-file marker.
    pub fn is_eof(&self) -> bool {
        matches!(self, FsError::Eof)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Eof => f.write_str("end of file"),
            FsError::Path(e) => e.fmt(f),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FsError {}

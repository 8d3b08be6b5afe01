//! Common VFS data types.

use alloc::string::String;

#[cfg(feature = "std")]
use std::time::SystemTime;

/// Unix timestamp with nanosecond part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    /// Seconds since the Unix epoch.
    pub secs: i64,
    /// Nanoseconds (0..=999_999_999).
    pub nsecs: u32,
}

impl Timestamp {
    pub const fn new(secs: i64, nsecs: u32) -> Self {
        Self { secs, nsecs }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self { secs, nsecs: 0 }
    }
}

#[cfg(feature = "std")]
impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        match time.duration_since(SystemTime::UNIX_EPOCH) {
            Ok(d) => Self {
                secs: d.as_secs() as i64,
                nsecs: d.subsec_nanos(),
            },
            Err(e) => {
                let d = e.duration();
                Self {
                    secs: -(d.as_secs() as i64),
                    nsecs: d.subsec_nanos(),
                }
            }
        }
    }
}

/// Time source a backend uses to stamp modifications.
///
/// The embedding runtime installs its own clock; the default returns the
/// zero timestamp.
pub type Clock = fn() -> Timestamp;

// Unix mode bits. Only the file-type bits the backends produce are named.
pub const MODE_TYPE_MASK: u32 = 0o170000;
pub const MODE_DIR: u32 = 0o040000;
pub const MODE_FILE: u32 = 0o100000;
pub const MODE_DEVICE: u32 = 0o020000;

/// Mode reported for directories: `drwxrwxrwx`.
pub const DIR_MODE: u32 = MODE_DIR | 0o777;
/// Mode reported for regular files: `-rw-rw-rw-`.
pub const FILE_MODE: u32 = MODE_FILE | 0o666;
/// Mode reported for the terminal device node: `c-w--w--w-`.
pub const TERM_MODE: u32 = MODE_DEVICE | 0o222;

/// File metadata snapshot, as returned by `stat` and `read_dir`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    /// Final path component.
    pub name: String,
    /// Content length in bytes; 0 for directories and devices.
    pub size: u64,
    /// Unix mode, including the file-type bits.
    pub mode: u32,
    /// Last modification time.
    pub mtime: Timestamp,
}

impl FileInfo {
    pub const fn is_dir(&self) -> bool {
        self.mode & MODE_TYPE_MASK == MODE_DIR
    }
}

/// Resource usage reported by a backend.
///
/// `-1` means unbounded or unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsUsage {
    pub used_items: i64,
    pub max_items: i64,
    pub used_bytes: i64,
    pub max_bytes: i64,
}

impl FsUsage {
    /// Usage of a backend that does not account anything.
    pub const UNKNOWN: FsUsage = FsUsage {
        used_items: -1,
        max_items: -1,
        used_bytes: -1,
        max_bytes: -1,
    };
}

bitflags::bitflags! {
    /// POSIX-style open flags (Linux bit values).
    ///
    /// Read-only access is the absence of `WRONLY` and `RDWR`; use
    /// [`OpenFlags::RDONLY`] for clarity.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const WRONLY = 0o1;
        const RDWR   = 0o2;
        const CREAT  = 0o100;
        const EXCL   = 0o200;
        const TRUNC  = 0o1000;
        const APPEND = 0o2000;
    }
}

impl OpenFlags {
    /// Read-only access: the empty flag set.
    pub const RDONLY: OpenFlags = OpenFlags::empty();

    /// Extracts the access mode from the low bits.
    pub fn access(self) -> Access {
        if self.contains(OpenFlags::RDWR) {
            Access::ReadWrite
        } else if self.contains(OpenFlags::WRONLY) {
            Access::WriteOnly
        } else {
            Access::ReadOnly
        }
    }
}

/// Access mode of an open handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub const fn readable(self) -> bool {
        !matches!(self, Access::WriteOnly)
    }

    pub const fn writable(self) -> bool {
        !matches!(self, Access::ReadOnly)
    }
}

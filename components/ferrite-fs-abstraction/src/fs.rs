//! File-system capability traits.
//!
//! These traits define the contract the runtime's mount layer consumes from
//! every backend. A backend implements [`FileSystem`]; its open handles
//! implement [`File`]. Both are object-safe so the mount table can hold
//! `Arc<dyn FileSystem>` and hand out `Box<dyn File>`.
//!
//! # Thread safety
//!
//! Implementations must be `Send + Sync`: multiple threads may call into
//! the same file system, and a handle may be shared.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{ErrorKind, FsError, FsResult};
use crate::types::{FileInfo, FsUsage, OpenFlags};

/// Callback invoked exactly once when an open handle is closed.
///
/// The runtime uses it to release a reservation taken at open time.
pub type Finalizer = Box<dyn FnOnce() + Send>;

/// An open file or directory handle.
///
/// All methods take `&self`; handles guard their mutable state internally.
/// After a successful [`File::close`] every operation, including a second
/// close, fails with [`ErrorKind::BadHandle`].
pub trait File: Send + Sync {
    /// Reads from the current position into `buf`.
    ///
    /// A short read is not an error. Returns [`FsError::Eof`] when the
    /// position is at or past the end of the content.
    fn read(&self, buf: &mut [u8]) -> FsResult<usize>;

    /// Writes `buf` at the current position.
    fn write(&self, buf: &[u8]) -> FsResult<usize>;

    /// Returns a metadata snapshot.
    fn stat(&self) -> FsResult<FileInfo>;

    /// Closes the handle, invoking the finalizer passed at open time.
    fn close(&self) -> FsResult<()>;

    /// Reads at an absolute offset, leaving the current position alone
    /// where the backend can afford to.
    fn read_at(&self, buf: &mut [u8], off: u64) -> FsResult<usize> {
        let _ = (buf, off);
        Err(FsError::path("readat", "", ErrorKind::NotSupported))
    }

    /// Writes at an absolute offset.
    fn write_at(&self, buf: &[u8], off: u64) -> FsResult<usize> {
        let _ = (buf, off);
        Err(FsError::path("writeat", "", ErrorKind::NotSupported))
    }

    /// Reads up to `n` directory entries, advancing the enumeration
    /// cursor; `n <= 0` reads all remaining entries. Returns
    /// [`FsError::Eof`] when none remain.
    fn read_dir(&self, n: i32) -> FsResult<Vec<FileInfo>> {
        let _ = n;
        Err(FsError::path("readdir", "", ErrorKind::NotSupported))
    }
}

/// A file-system backend.
pub trait FileSystem: Send + Sync {
    /// Opens `name` with the given flags, attaching a finalizer to the
    /// resulting handle.
    ///
    /// The finalizer is invoked exactly once, by [`File::close`]. On the
    /// error paths no handle exists and the finalizer is **not** invoked;
    /// the caller keeps whatever reservation it took.
    fn open_with_finalizer(
        &self,
        name: &str,
        flags: OpenFlags,
        perm: u32,
        closed: Finalizer,
    ) -> FsResult<Box<dyn File>>;

    /// Opens `name` read-only with a no-op finalizer.
    fn open(&self, name: &str) -> FsResult<Box<dyn File>> {
        self.open_with_finalizer(name, OpenFlags::RDONLY, 0, Box::new(|| {}))
    }

    /// Short lowercase backend-type identifier, e.g. `"ram"`.
    fn fs_type(&self) -> &'static str;

    /// The name this backend instance was given.
    fn name(&self) -> &str;

    /// Current resource usage.
    fn usage(&self) -> FsUsage;

    /// Creates a directory.
    fn mkdir(&self, name: &str, perm: u32) -> FsResult<()> {
        let _ = perm;
        Err(FsError::path("mkdir", name, ErrorKind::NotSupported))
    }

    /// Removes a file or an empty directory.
    fn remove(&self, name: &str) -> FsResult<()> {
        Err(FsError::path("remove", name, ErrorKind::NotSupported))
    }

    /// Renames `old` to `new`, possibly across directories.
    fn rename(&self, old: &str, new: &str) -> FsResult<()> {
        let _ = old;
        Err(FsError::path("rename", new, ErrorKind::NotSupported))
    }

    /// Flushes pending state. A no-op for volatile backends.
    fn sync(&self) -> FsResult<()> {
        Ok(())
    }
}

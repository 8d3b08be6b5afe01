//! Host-backed file system over semihosting.
//!
//! ## Design
//!
//! Every operation is proxied to the debugger/host through the single
//! [`HostCall`] primitive: a breakpoint instruction taking an operation
//! number and a pointer to a parameter block (see [`hostcall`] for the
//! subset used). The host pairs some results with a separate errno query,
//! and the two traps are not atomic from its perspective, so a
//! process-wide mutex serialises each call-plus-query sequence.
//!
//! All names are resolved under a host-side root prefix given at
//! construction. The special names `":stdin"`, `":stdout"` and
//! `":stderr"` open the host console instead.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod arch;
pub mod hostcall;

mod file;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ffi::c_void;
use core::ptr;

use ferrite_fs_abstraction::{
    valid_path, Access, ErrorKind, File, FileSystem, Finalizer, FsError, FsResult, FsUsage,
    OpenFlags,
};

use file::SemiFile;
use hostcall::{
    with_host_lock, HostCall, OpenArgs, RemoveArgs, RenameArgs, SYS_ERRNO, SYS_OPEN, SYS_REMOVE,
    SYS_RENAME,
};

pub(crate) struct Inner<H> {
    name: String,
    root: String,
    pub(crate) host: H,
}

/// A file system proxying operations to the semihosting host, rooted at a
/// host-side directory prefix.
pub struct SemihostFs<H: HostCall> {
    inner: Arc<Inner<H>>,
}

impl<H: HostCall> Clone for SemihostFs<H> {
    fn clone(&self) -> Self {
        SemihostFs {
            inner: self.inner.clone(),
        }
    }
}

impl<H: HostCall> SemihostFs<H> {
    /// Creates a file system named `name` whose files live under the
    /// host-side `root` directory, issuing calls through `host`.
    pub fn new(name: &str, root: &str, host: H) -> SemihostFs<H> {
        SemihostFs {
            inner: Arc::new(Inner {
                name: String::from(name),
                root: String::from(root),
                host,
            }),
        }
    }

    /// Builds the NUL-terminated host path for `name`.
    fn host_path(&self, name: &str) -> Vec<u8> {
        let root = self.inner.root.as_bytes();
        let mut path = Vec::with_capacity(root.len() + 1 + name.len() + 1);
        path.extend_from_slice(root);
        if !root.is_empty() {
            path.push(b'/');
        }
        path.extend_from_slice(name.as_bytes());
        path.push(0);
        path
    }
}

/// Translates POSIX open flags to the host's fopen-style mode number.
///
/// Combinations outside the table are rejected.
fn host_mode(flags: OpenFlags) -> Option<usize> {
    if flags.contains(OpenFlags::EXCL) {
        return None;
    }
    let how = flags & (OpenFlags::CREAT | OpenFlags::TRUNC | OpenFlags::APPEND);
    match flags.access() {
        // rb
        Access::ReadOnly if how.is_empty() => Some(1),
        Access::ReadWrite => match how {
            // r+b
            x if x.is_empty() => Some(3),
            // w+b
            x if x == OpenFlags::CREAT | OpenFlags::TRUNC => Some(7),
            // a+b
            x if x == OpenFlags::CREAT | OpenFlags::APPEND => Some(11),
            _ => None,
        },
        Access::WriteOnly => match how {
            // wb
            x if x == OpenFlags::CREAT | OpenFlags::TRUNC => Some(5),
            // ab
            x if x == OpenFlags::CREAT | OpenFlags::APPEND => Some(9),
            _ => None,
        },
        _ => None,
    }
}

impl<H: HostCall + 'static> FileSystem for SemihostFs<H> {
    fn open_with_finalizer(
        &self,
        name: &str,
        flags: OpenFlags,
        _perm: u32,
        closed: Finalizer,
    ) -> FsResult<Box<dyn File>> {
        // The console sentinels bypass the root prefix and force the mode.
        let (path, mode) = match name {
            ":stdin" => (Vec::from(&b":tt\0"[..]), 0),
            ":stdout" => (Vec::from(&b":tt\0"[..]), 4),
            ":stderr" => (Vec::from(&b":tt\0"[..]), 8),
            _ => {
                if !valid_path(name) {
                    return Err(FsError::path("open", name, ErrorKind::Invalid));
                }
                let mode = host_mode(flags)
                    .ok_or_else(|| FsError::path("open", name, ErrorKind::Invalid))?;
                (self.host_path(name), mode)
            }
        };
        let mut args = OpenArgs {
            path: path.as_ptr(),
            mode,
            path_len: path.len() - 1,
        };
        // SAFETY: `args` matches the SYS_OPEN block; errno is paired with
        // the call under the host lock.
        let (fd, errno) = with_host_lock(|| unsafe {
            let fd = self
                .inner
                .host
                .call(SYS_OPEN, &mut args as *mut _ as *mut c_void);
            let errno = if fd == -1 {
                self.inner.host.call(SYS_ERRNO, ptr::null_mut())
            } else {
                0
            };
            (fd, errno)
        });
        if fd == -1 {
            log::debug!("{}: host open failed, errno {}", self.inner.name, errno);
            return Err(FsError::path("open", name, ErrorKind::Host(errno as i32)));
        }
        Ok(Box::new(SemiFile::new(name, self.inner.clone(), fd, closed)))
    }

    fn fs_type(&self) -> &'static str {
        "sh"
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn usage(&self) -> FsUsage {
        FsUsage::UNKNOWN
    }

    fn remove(&self, name: &str) -> FsResult<()> {
        if !valid_path(name) {
            return Err(FsError::path("remove", name, ErrorKind::Invalid));
        }
        let path = self.host_path(name);
        let mut args = RemoveArgs {
            path: path.as_ptr(),
            path_len: path.len() - 1,
        };
        // SAFETY: `args` matches the SYS_REMOVE block. The result is the
        // errno itself, so no separate query is needed.
        let errno = with_host_lock(|| unsafe {
            self.inner
                .host
                .call(SYS_REMOVE, &mut args as *mut _ as *mut c_void)
        });
        if errno != 0 {
            return Err(FsError::path("remove", name, ErrorKind::Host(errno as i32)));
        }
        Ok(())
    }

    fn rename(&self, old: &str, new: &str) -> FsResult<()> {
        if !valid_path(old) {
            return Err(FsError::path("rename", old, ErrorKind::Invalid));
        }
        if !valid_path(new) {
            return Err(FsError::path("rename", new, ErrorKind::Invalid));
        }
        let old_path = self.host_path(old);
        let new_path = self.host_path(new);
        let mut args = RenameArgs {
            old: old_path.as_ptr(),
            old_len: old_path.len() - 1,
            new: new_path.as_ptr(),
            new_len: new_path.len() - 1,
        };
        // SAFETY: `args` matches the SYS_RENAME block. The result is the
        // errno itself.
        let errno = with_host_lock(|| unsafe {
            self.inner
                .host
                .call(SYS_RENAME, &mut args as *mut _ as *mut c_void)
        });
        if errno != 0 {
            return Err(FsError::path("rename", new, ErrorKind::Host(errno as i32)));
        }
        Ok(())
    }
}

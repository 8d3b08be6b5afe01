//! Open file handles backed by host descriptors.

use alloc::string::String;
use alloc::sync::Arc;
use core::ffi::c_void;
use core::ptr;

use ferrite_fs_abstraction::types::FILE_MODE;
use ferrite_fs_abstraction::{
    split_base, ErrorKind, File, FileInfo, Finalizer, FsError, FsResult, Timestamp,
};
use spin::Mutex;

use crate::hostcall::{
    with_host_lock, HostCall, RwArgs, SeekArgs, SYS_CLOSE, SYS_ERRNO, SYS_FLEN, SYS_READ,
    SYS_SEEK, SYS_WRITE,
};
use crate::Inner;

/// An open host-side file. The state mutex guards the descriptor for the
/// duration of each host call; after `close` every operation fails
/// `EBADF`.
pub(crate) struct SemiFile<H: HostCall> {
    name: String,
    fs: Arc<Inner<H>>,
    state: Mutex<FdState>,
}

struct FdState {
    fd: Option<isize>,
    closed: Option<Finalizer>,
}

impl<H: HostCall> SemiFile<H> {
    pub(crate) fn new(name: &str, fs: Arc<Inner<H>>, fd: isize, closed: Finalizer) -> Self {
        SemiFile {
            name: String::from(name),
            fs,
            state: Mutex::new(FdState {
                fd: Some(fd),
                closed: Some(closed),
            }),
        }
    }

    fn fd_for(&self, op: &'static str, st: &FdState) -> FsResult<isize> {
        st.fd
            .ok_or_else(|| FsError::path(op, &self.name, ErrorKind::BadHandle))
    }

    fn read_fd(&self, fd: isize, p: &mut [u8]) -> FsResult<usize> {
        if p.is_empty() {
            return Ok(0);
        }
        let mut args = RwArgs {
            fd,
            buf: p.as_mut_ptr(),
            len: p.len(),
        };
        // SAFETY: `args` matches the SYS_READ block and outlives the call.
        let not_read = with_host_lock(|| unsafe {
            self.fs.host.call(SYS_READ, &mut args as *mut _ as *mut c_void)
        });
        let n = p.len() - not_read as usize;
        if n == 0 {
            return Err(FsError::Eof);
        }
        Ok(n)
    }

    fn write_fd(&self, fd: isize, p: &[u8]) -> FsResult<usize> {
        if p.is_empty() {
            return Ok(0);
        }
        let mut args = RwArgs {
            fd,
            buf: p.as_ptr() as *mut u8,
            len: p.len(),
        };
        // SAFETY: `args` matches the SYS_WRITE block; the errno query is
        // paired with the call under the host lock.
        let (not_written, errno) = with_host_lock(|| unsafe {
            let nw = self
                .fs
                .host
                .call(SYS_WRITE, &mut args as *mut _ as *mut c_void);
            let errno = if nw != 0 {
                self.fs.host.call(SYS_ERRNO, ptr::null_mut())
            } else {
                0
            };
            (nw, errno)
        });
        if not_written != 0 {
            return Err(FsError::path("write", &self.name, ErrorKind::Host(errno as i32)));
        }
        Ok(p.len())
    }

    fn seek_fd(&self, fd: isize, pos: usize) -> FsResult<()> {
        let mut args = SeekArgs { fd, pos };
        // SAFETY: `args` matches the SYS_SEEK block; errno is paired with
        // the call under the host lock.
        let (res, errno) = with_host_lock(|| unsafe {
            let res = self
                .fs
                .host
                .call(SYS_SEEK, &mut args as *mut _ as *mut c_void);
            let errno = if res < 0 {
                self.fs.host.call(SYS_ERRNO, ptr::null_mut())
            } else {
                0
            };
            (res, errno)
        });
        if res < 0 {
            return Err(FsError::path("seek", &self.name, ErrorKind::Host(errno as i32)));
        }
        Ok(())
    }
}

impl<H: HostCall + 'static> File for SemiFile<H> {
    fn read(&self, p: &mut [u8]) -> FsResult<usize> {
        let st = self.state.lock();
        let fd = self.fd_for("read", &st)?;
        self.read_fd(fd, p)
    }

    fn write(&self, p: &[u8]) -> FsResult<usize> {
        let st = self.state.lock();
        let fd = self.fd_for("write", &st)?;
        self.write_fd(fd, p)
    }

    fn read_at(&self, p: &mut [u8], off: u64) -> FsResult<usize> {
        let st = self.state.lock();
        let fd = self.fd_for("read", &st)?;
        self.seek_fd(fd, off as usize)?;
        self.read_fd(fd, p)
    }

    fn write_at(&self, p: &[u8], off: u64) -> FsResult<usize> {
        let st = self.state.lock();
        let fd = self.fd_for("write", &st)?;
        self.seek_fd(fd, off as usize)?;
        self.write_fd(fd, p)
    }

    fn stat(&self) -> FsResult<FileInfo> {
        let st = self.state.lock();
        let mut fd = self.fd_for("stat", &st)?;
        // SAFETY: SYS_FLEN takes a pointer to the descriptor word; errno
        // is paired with the call under the host lock.
        let (size, errno) = with_host_lock(|| unsafe {
            let size = self
                .fs
                .host
                .call(SYS_FLEN, &mut fd as *mut _ as *mut c_void);
            let errno = if size == -1 {
                self.fs.host.call(SYS_ERRNO, ptr::null_mut())
            } else {
                0
            };
            (size, errno)
        });
        if size == -1 {
            return Err(FsError::path("stat", &self.name, ErrorKind::Host(errno as i32)));
        }
        Ok(FileInfo {
            name: String::from(split_base(&self.name).1),
            size: size as u64,
            mode: FILE_MODE,
            mtime: Timestamp::default(),
        })
    }

    fn close(&self) -> FsResult<()> {
        let mut st = self.state.lock();
        let mut fd = match st.fd.take() {
            Some(fd) => fd,
            None => return Err(FsError::path("close", &self.name, ErrorKind::BadHandle)),
        };
        // SAFETY: SYS_CLOSE takes a pointer to the descriptor word; errno
        // is paired with the call under the host lock.
        let (res, errno) = with_host_lock(|| unsafe {
            let res = self
                .fs
                .host
                .call(SYS_CLOSE, &mut fd as *mut _ as *mut c_void);
            let errno = if res == -1 {
                self.fs.host.call(SYS_ERRNO, ptr::null_mut())
            } else {
                0
            };
            (res, errno)
        });
        // The finalizer runs even when the host reports a close error.
        if let Some(closed) = st.closed.take() {
            closed();
        }
        if res == -1 {
            return Err(FsError::path("close", &self.name, ErrorKind::Host(errno as i32)));
        }
        Ok(())
    }
}

impl<H: HostCall> Drop for SemiFile<H> {
    fn drop(&mut self) {
        let st = self.state.get_mut();
        if st.fd.take().is_some() {
            if let Some(closed) = st.closed.take() {
                closed();
            }
        }
    }
}

//! Featureless terminal file system.
//!
//! A thin locked wrapper over the provided byte streams that makes them
//! usable from multiple threads. Unlike [`TermFs`](crate::TermFs) it does
//! no CR/LF conversion, no echo and no line editing; configure the
//! terminal emulator to handle those locally, or use `TermFs`.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;

use embedded_io::{Read, Write};
use ferrite_fs_abstraction::types::TERM_MODE;
use ferrite_fs_abstraction::{
    ErrorKind, File, FileInfo, FileSystem, Finalizer, FsError, FsResult, FsUsage, OpenFlags,
    Timestamp,
};
use spin::Mutex;

use crate::io_err;

struct LightInner<R, W> {
    name: String,
    rd: Mutex<R>,
    wr: Mutex<W>,
}

/// A terminal file system without any data conversion.
pub struct LightTermFs<R, W> {
    inner: Arc<LightInner<R, W>>,
}

impl<R, W> Clone for LightTermFs<R, W> {
    fn clone(&self) -> Self {
        LightTermFs {
            inner: self.inner.clone(),
        }
    }
}

impl<R, W> LightTermFs<R, W> {
    /// Creates a terminal file system named `name` over the input stream
    /// `r` and the output stream `w`.
    pub fn new(name: &str, r: R, w: W) -> LightTermFs<R, W> {
        LightTermFs {
            inner: Arc::new(LightInner {
                name: String::from(name),
                rd: Mutex::new(r),
                wr: Mutex::new(w),
            }),
        }
    }
}

struct LightFile<R, W> {
    fs: Arc<LightInner<R, W>>,
    closed: Mutex<Option<Finalizer>>,
}

impl<R, W> LightFile<R, W> {
    fn is_closed(&self) -> bool {
        self.closed.lock().is_none()
    }
}

impl<R, W> File for LightFile<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    fn read(&self, p: &mut [u8]) -> FsResult<usize> {
        if p.is_empty() {
            return Ok(0);
        }
        let mut rd = self.fs.rd.lock();
        if self.is_closed() {
            return Err(FsError::path("read", ".", ErrorKind::BadHandle));
        }
        match rd.read(p) {
            Ok(0) => Err(FsError::Eof),
            Ok(n) => Ok(n),
            Err(e) => Err(io_err("read", e)),
        }
    }

    fn write(&self, p: &[u8]) -> FsResult<usize> {
        if p.is_empty() {
            return Ok(0);
        }
        let mut wr = self.fs.wr.lock();
        if self.is_closed() {
            return Err(FsError::path("write", ".", ErrorKind::BadHandle));
        }
        wr.write(p).map_err(|e| io_err("write", e))
    }

    fn stat(&self) -> FsResult<FileInfo> {
        Ok(FileInfo {
            name: String::from("."),
            size: 0,
            mode: TERM_MODE,
            mtime: Timestamp::default(),
        })
    }

    fn close(&self) -> FsResult<()> {
        let _rd = self.fs.rd.lock();
        let _wr = self.fs.wr.lock();
        match self.closed.lock().take() {
            Some(closed) => {
                closed();
                Ok(())
            }
            None => Err(FsError::path("close", ".", ErrorKind::BadHandle)),
        }
    }
}

impl<R, W> Drop for LightFile<R, W> {
    fn drop(&mut self) {
        if let Some(closed) = self.closed.get_mut().take() {
            closed();
        }
    }
}

impl<R, W> FileSystem for LightTermFs<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    fn open_with_finalizer(
        &self,
        name: &str,
        _flags: OpenFlags,
        _perm: u32,
        closed: Finalizer,
    ) -> FsResult<Box<dyn File>> {
        if name != "." {
            return Err(FsError::path("open", name, ErrorKind::NotFound));
        }
        Ok(Box::new(LightFile {
            fs: self.inner.clone(),
            closed: Mutex::new(Some(closed)),
        }))
    }

    fn fs_type(&self) -> &'static str {
        "lterm"
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn usage(&self) -> FsUsage {
        FsUsage::UNKNOWN
    }
}

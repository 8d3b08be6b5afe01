//! Terminal device file system.
//!
//! ## Design
//!
//! Embedded systems rarely need more than one terminal (the console), so
//! the file system exposes a single device node `"."` multiplexing all
//! reads and writes over the byte streams it was built around. One mutex
//! serialises the read side (stream, line-editor state), one the write
//! side; configuration lives in an atomic flag byte so both sides can
//! consult it without taking the other's lock. `close` takes the read lock
//! before the write lock, the same order every other path uses.
//!
//! Two flavours are provided: [`TermFs`] with CR/LF mapping, echo and a
//! cooked line mode, and the featureless [`LightTermFs`] pass-through.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod light;
mod readline;

pub use light::LightTermFs;

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use core::sync::atomic::{AtomicU8, Ordering};

use embedded_io::{Error as _, Read, Write};
use ferrite_fs_abstraction::types::TERM_MODE;
use ferrite_fs_abstraction::{
    Access, ErrorKind, File, FileInfo, FileSystem, Finalizer, FsError, FsResult, FsUsage,
    OpenFlags, Timestamp,
};
use spin::Mutex;

pub(crate) const ESC: u8 = 0x1b;

bitflags::bitflags! {
    /// Character-mapping configuration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CharMap: u8 {
        /// Map input `\r` to `\n`.
        const IN_CRLF = 1 << 0;
        /// Map output `\n` to `\r\n`.
        const OUT_LFCRLF = 1 << 3;
    }
}

const MAP_FLAGS: u8 = CharMap::all().bits();
pub(crate) const FLAG_LINE: u8 = 1 << 5;
pub(crate) const FLAG_EOF: u8 = 1 << 6;
pub(crate) const FLAG_ECHO: u8 = 1 << 7;

/// Read-side state: the input stream and the line-editor buffer.
pub(crate) struct ReadSide<R> {
    pub r: R,
    /// Line buffer of the configured maximum length. Bytes past `len` may
    /// hold the one-line history.
    pub buf: Box<[u8]>,
    pub len: usize,
    /// `-1` when no finished line is being delivered, otherwise the number
    /// of bytes already handed out of `buf[..len]`.
    pub rpos: i32,
    /// Scratch for ANSI echo sequences; `[0..3]` is seeded with
    /// `\b ESC [` when line mode is enabled.
    pub ansi: [u8; 7],
}

pub(crate) struct Inner<R, W> {
    name: String,
    pub(crate) flags: AtomicU8,
    pub(crate) rd: Mutex<ReadSide<R>>,
    pub(crate) wr: Mutex<W>,
}

/// A terminal file system over an input and an output byte stream.
///
/// The single device file `"."` may be opened, read and written
/// concurrently by multiple threads.
pub struct TermFs<R, W> {
    inner: Arc<Inner<R, W>>,
}

impl<R, W> Clone for TermFs<R, W> {
    fn clone(&self) -> Self {
        TermFs {
            inner: self.inner.clone(),
        }
    }
}

impl<R, W> TermFs<R, W> {
    /// Creates a terminal file system named `name` over the input stream
    /// `r` and the output stream `w`.
    pub fn new(name: &str, r: R, w: W) -> TermFs<R, W> {
        TermFs {
            inner: Arc::new(Inner {
                name: String::from(name),
                flags: AtomicU8::new(0),
                rd: Mutex::new(ReadSide {
                    r,
                    buf: Box::default(),
                    len: 0,
                    rpos: -1,
                    ansi: [0; 7],
                }),
                wr: Mutex::new(w),
            }),
        }
    }

    /// Returns the character-mapping configuration.
    pub fn char_map(&self) -> CharMap {
        CharMap::from_bits_truncate(self.inner.flags.load(Ordering::SeqCst) & MAP_FLAGS)
    }

    /// Replaces the character-mapping configuration.
    pub fn set_char_map(&self, cmap: CharMap) {
        let _rd = self.inner.rd.lock();
        let _wr = self.inner.wr.lock();
        let flags = self.inner.flags.load(Ordering::SeqCst);
        self.inner
            .flags
            .store(flags & !MAP_FLAGS | cmap.bits(), Ordering::SeqCst);
    }

    /// Returns the echo configuration.
    pub fn echo(&self) -> bool {
        self.inner.flags.load(Ordering::SeqCst) & FLAG_ECHO != 0
    }

    /// Enables or disables echoing of input data.
    ///
    /// Data is echoed by the `read` path; the echo confirms the reading
    /// thread is ready to consume it.
    pub fn set_echo(&self, on: bool) {
        let _rd = self.inner.rd.lock();
        if on {
            self.inner.flags.fetch_or(FLAG_ECHO, Ordering::SeqCst);
        } else {
            self.inner.flags.fetch_and(!FLAG_ECHO, Ordering::SeqCst);
        }
    }

    /// Returns the line-mode configuration: enabled flag and the maximum
    /// line length.
    pub fn line_mode(&self) -> (bool, usize) {
        let rd = self.inner.rd.lock();
        let enabled = self.inner.flags.load(Ordering::SeqCst) & FLAG_LINE != 0;
        (enabled, rd.buf.len())
    }

    /// Enables or disables line mode, optionally resizing the line buffer.
    ///
    /// `max_len > 0` allocates a new buffer, `max_len == 0` frees it
    /// (which also disables cooked reads), `max_len < 0` keeps the
    /// current buffer.
    ///
    /// In line mode the terminal input is buffered until a newline is
    /// received. A small subset of ANSI control sequences allows editing
    /// the line before it is passed to the reading thread, and there is a
    /// one-line history (up/down arrows).
    pub fn set_line_mode(&self, enable: bool, max_len: i32) {
        let mut rd = self.inner.rd.lock();
        if enable {
            rd.ansi[0] = b'\x08'; // cursor-back prefix of the DCH sequence
            rd.ansi[1] = ESC;
            rd.ansi[2] = b'[';
            self.inner.flags.fetch_or(FLAG_LINE, Ordering::SeqCst);
        } else {
            self.inner.flags.fetch_and(!FLAG_LINE, Ordering::SeqCst);
        }
        rd.rpos = -1;
        if max_len >= 0 {
            rd.buf = if max_len == 0 {
                Box::default()
            } else {
                vec![0u8; max_len as usize].into_boxed_slice()
            };
            rd.len = 0;
        }
    }
}

pub(crate) fn io_err<E: embedded_io::Error>(op: &'static str, e: E) -> FsError {
    FsError::path(op, ".", ErrorKind::Io(e.kind()))
}

/// Writes all of `buf`, retrying short writes.
fn write_all<W: Write>(w: &mut W, mut buf: &[u8]) -> Result<(), ErrorKind> {
    while !buf.is_empty() {
        match w.write(buf) {
            Ok(0) => return Err(ErrorKind::Io(embedded_io::ErrorKind::WriteZero)),
            Ok(n) => buf = &buf[n..],
            Err(e) => return Err(ErrorKind::Io(e.kind())),
        }
    }
    Ok(())
}

/// An open handle on the terminal device.
pub(crate) struct TermFile<R, W> {
    pub(crate) fs: Arc<Inner<R, W>>,
    flag: Access,
    closed: Mutex<Option<Finalizer>>,
}

impl<R: Read, W: Write> TermFile<R, W> {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.lock().is_none()
    }

    /// The write path shared by `write` and the echo generators. Takes the
    /// write lock; the caller may already hold the read lock.
    pub(crate) fn write_through(&self, p: &[u8]) -> FsResult<usize> {
        if p.is_empty() {
            return Ok(0);
        }
        let mut wr = self.fs.wr.lock();
        if self.is_closed() {
            return Err(FsError::path("write", ".", ErrorKind::BadHandle));
        }
        if self.fs.flags.load(Ordering::SeqCst) & CharMap::OUT_LFCRLF.bits() == 0 {
            return wr.write(p).map_err(|e| io_err("write", e));
        }
        // Copy each run up to a newline, then emit the CRLF pair, counting
        // one byte of progress per newline consumed.
        let mut n = 0;
        loop {
            let mut m = n;
            while m < p.len() && p[m] != b'\n' {
                m += 1;
            }
            if m != n {
                write_all(&mut *wr, &p[n..m]).map_err(|k| FsError::path("write", ".", k))?;
                n = m;
                if n == p.len() {
                    return Ok(n);
                }
            }
            write_all(&mut *wr, b"\r\n").map_err(|k| FsError::path("write", ".", k))?;
            n += 1;
            if n == p.len() {
                return Ok(n);
            }
        }
    }
}

impl<R, W> File for TermFile<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    fn read(&self, p: &mut [u8]) -> FsResult<usize> {
        if self.flag == Access::WriteOnly {
            return Err(FsError::path("read", ".", ErrorKind::NotSupported));
        }
        if p.is_empty() {
            return Ok(0);
        }
        let mut rd = self.fs.rd.lock();
        if self.is_closed() {
            return Err(FsError::path("read", ".", ErrorKind::BadHandle));
        }
        let flags = self.fs.flags.load(Ordering::SeqCst);
        if flags & FLAG_LINE != 0 && !rd.buf.is_empty() {
            return self.read_line(&mut rd, p);
        }
        let n = match rd.r.read(p) {
            Ok(0) => return Err(FsError::Eof),
            Ok(n) => n,
            Err(e) => return Err(io_err("read", e)),
        };
        drop(rd);
        if flags & CharMap::IN_CRLF.bits() != 0 {
            for b in p[..n].iter_mut() {
                if *b == b'\r' {
                    *b = b'\n';
                }
            }
        }
        if flags & FLAG_ECHO == 0 {
            return Ok(n);
        }
        self.write_through(&p[..n])
    }

    fn write(&self, p: &[u8]) -> FsResult<usize> {
        if self.flag == Access::ReadOnly {
            return Err(FsError::path("write", ".", ErrorKind::NotSupported));
        }
        self.write_through(p)
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
        // Closing a terminal file is rare, so the expensive both-locks
        // sequence beats carrying an extra per-handle lock on every read.
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

impl<R, W> Drop for TermFile<R, W> {
    fn drop(&mut self) {
        if let Some(closed) = self.closed.get_mut().take() {
            closed();
        }
    }
}

impl<R, W> FileSystem for TermFs<R, W>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    fn open_with_finalizer(
        &self,
        name: &str,
        flags: OpenFlags,
        _perm: u32,
        closed: Finalizer,
    ) -> FsResult<Box<dyn File>> {
        if name != "." {
            return Err(FsError::path("open", name, ErrorKind::NotFound));
        }
        if flags.intersects(
            OpenFlags::CREAT | OpenFlags::EXCL | OpenFlags::TRUNC | OpenFlags::APPEND,
        ) {
            return Err(FsError::path("open", name, ErrorKind::Invalid));
        }
        Ok(Box::new(TermFile {
            fs: self.inner.clone(),
            flag: flags.access(),
            closed: Mutex::new(Some(closed)),
        }))
    }

    fn fs_type(&self) -> &'static str {
        "term"
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn usage(&self) -> FsUsage {
        FsUsage::UNKNOWN
    }
}

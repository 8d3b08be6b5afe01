//! Open file handles.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use ferrite_fs_abstraction::types::FILE_MODE;
use ferrite_fs_abstraction::{
    split_base, Access, ErrorKind, File, FileInfo, Finalizer, FsError, FsResult,
};
use spin::Mutex;

use crate::node::{NodeKind, RamNode};
use crate::Shared;

/// An open file.
///
/// The handle mutex guards the position and the open/closed state; byte
/// access goes through the node's own reader-writer lock. The handle mutex
/// is always taken before the node lock.
pub(crate) struct RamFile {
    name: String,
    rdwr: Access,
    fs: Arc<Shared>,
    state: Mutex<FileState>,
}

struct FileState {
    node: Option<Arc<RamNode>>,
    pos: usize,
    closed: Option<Finalizer>,
}

/// Rounds a requested end position up to the capacity tier for `cap`.
///
/// Small files grow in 16-byte steps, medium ones in 32, large ones in 64.
fn grow_cap(cap: usize, pos1: usize) -> usize {
    let round = match cap {
        c if c < 64 => 15,
        c if c < 256 => 31,
        _ => 63,
    };
    (pos1 + round) & !round
}

impl RamFile {
    pub(crate) fn new(
        name: &str,
        rdwr: Access,
        fs: Arc<Shared>,
        node: Arc<RamNode>,
        pos: usize,
        closed: Finalizer,
    ) -> RamFile {
        RamFile {
            name: String::from(name),
            rdwr,
            fs,
            state: Mutex::new(FileState {
                node: Some(node),
                pos,
                closed: Some(closed),
            }),
        }
    }

    fn node_for(&self, op: &'static str, st: &FileState) -> FsResult<Arc<RamNode>> {
        match &st.node {
            Some(node) => Ok(node.clone()),
            None => Err(FsError::path(op, &self.name, ErrorKind::BadHandle)),
        }
    }

    /// Copies bytes starting at `pos` under the node's read lock.
    fn read_node(&self, node: &RamNode, pos: usize, buf: &mut [u8]) -> FsResult<usize> {
        let body = node.body.read();
        let data = match &body.kind {
            NodeKind::File(fd) => &fd.data,
            NodeKind::Dir(_) => {
                return Err(FsError::path("read", &self.name, ErrorKind::IsADirectory))
            }
        };
        if pos >= data.len() {
            return Err(FsError::Eof);
        }
        let n = buf.len().min(data.len() - pos);
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        Ok(n)
    }

    /// Stores `buf` at `pos` under the node's write lock, growing the
    /// accounted capacity (and charging the delta) as needed.
    fn write_node(&self, node: &RamNode, pos: usize, buf: &[u8]) -> FsResult<usize> {
        let mtime = self.fs.now();
        let mut body = node.body.write();
        let fd = match &mut body.kind {
            NodeKind::File(fd) => fd,
            NodeKind::Dir(_) => {
                return Err(FsError::path("write", &self.name, ErrorKind::IsADirectory))
            }
        };
        let pos1 = pos + buf.len();
        if pos1 > fd.cap {
            let new_cap = grow_cap(fd.cap, pos1);
            let add = (new_cap - fd.cap) as u64;
            self.fs
                .charge(add)
                .map_err(|kind| FsError::path("write", &self.name, kind))?;
            let mut data1 = Vec::with_capacity(new_cap);
            data1.extend_from_slice(&fd.data[..pos.min(fd.data.len())]);
            data1.resize(pos1, 0);
            fd.data = data1;
            fd.cap = new_cap;
        } else if pos1 > fd.data.len() {
            fd.data.resize(pos1, 0);
        }
        fd.data[pos..pos1].copy_from_slice(buf);
        body.mtime = mtime;
        Ok(buf.len())
    }
}

impl File for RamFile {
    fn read(&self, buf: &mut [u8]) -> FsResult<usize> {
        if !self.rdwr.readable() {
            return Err(FsError::path("read", &self.name, ErrorKind::NotSupported));
        }
        let mut st = self.state.lock();
        let node = self.node_for("read", &st)?;
        let n = self.read_node(&node, st.pos, buf)?;
        st.pos += n;
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> FsResult<usize> {
        if !self.rdwr.writable() {
            return Err(FsError::path("write", &self.name, ErrorKind::NotSupported));
        }
        let mut st = self.state.lock();
        let node = self.node_for("write", &st)?;
        let n = self.write_node(&node, st.pos, buf)?;
        st.pos += n;
        Ok(n)
    }

    fn read_at(&self, buf: &mut [u8], off: u64) -> FsResult<usize> {
        if !self.rdwr.readable() {
            return Err(FsError::path("read", &self.name, ErrorKind::NotSupported));
        }
        let st = self.state.lock();
        let node = self.node_for("read", &st)?;
        self.read_node(&node, off as usize, buf)
    }

    fn write_at(&self, buf: &[u8], off: u64) -> FsResult<usize> {
        if !self.rdwr.writable() {
            return Err(FsError::path("write", &self.name, ErrorKind::NotSupported));
        }
        let st = self.state.lock();
        let node = self.node_for("write", &st)?;
        self.write_node(&node, off as usize, buf)
    }

    fn stat(&self) -> FsResult<FileInfo> {
        let st = self.state.lock();
        let node = self.node_for("stat", &st)?;
        drop(st);
        let body = node.body.read();
        let size = match &body.kind {
            NodeKind::File(fd) => fd.data.len() as u64,
            NodeKind::Dir(_) => 0,
        };
        Ok(FileInfo {
            name: String::from(split_base(&self.name).1),
            size,
            mode: FILE_MODE,
            mtime: body.mtime,
        })
    }

    fn close(&self) -> FsResult<()> {
        let mut st = self.state.lock();
        if st.node.is_none() {
            return Err(FsError::path("close", &self.name, ErrorKind::BadHandle));
        }
        st.node = None;
        if let Some(closed) = st.closed.take() {
            closed();
        }
        Ok(())
    }
}

impl Drop for RamFile {
    fn drop(&mut self) {
        // Best-effort: run the finalizer if the handle was never closed.
        let st = self.state.get_mut();
        if st.node.take().is_some() {
            if let Some(closed) = st.closed.take() {
                closed();
            }
        }
    }
}

//! Open directory handles.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

use ferrite_fs_abstraction::types::{DIR_MODE, FILE_MODE};
use ferrite_fs_abstraction::{
    split_base, ErrorKind, File, FileInfo, Finalizer, FsError, FsResult,
};
use spin::Mutex;

use crate::node::{NodeKind, RamNode};

/// An open directory. Supports `stat` and cursor-based enumeration.
pub(crate) struct RamDir {
    name: String,
    state: Mutex<DirState>,
}

struct DirState {
    node: Option<Arc<RamNode>>,
    /// Enumeration index; advances monotonically, entries are never
    /// revisited.
    pos: usize,
    closed: Option<Finalizer>,
}

impl RamDir {
    pub(crate) fn new(name: &str, node: Arc<RamNode>, closed: Finalizer) -> RamDir {
        RamDir {
            name: String::from(name),
            state: Mutex::new(DirState {
                node: Some(node),
                pos: 0,
                closed: Some(closed),
            }),
        }
    }
}

/// Builds the metadata snapshot of one child entry.
fn entry_info(name: &str, node: &RamNode) -> FileInfo {
    let body = node.body.read();
    let (size, mode) = match &body.kind {
        NodeKind::File(fd) => (fd.data.len() as u64, FILE_MODE),
        NodeKind::Dir(_) => (0, DIR_MODE),
    };
    FileInfo {
        name: String::from(name),
        size,
        mode,
        mtime: body.mtime,
    }
}

impl File for RamDir {
    fn read(&self, _buf: &mut [u8]) -> FsResult<usize> {
        Err(FsError::path("read", &self.name, ErrorKind::NotSupported))
    }

    fn write(&self, _buf: &[u8]) -> FsResult<usize> {
        Err(FsError::path("write", &self.name, ErrorKind::IsADirectory))
    }

    fn stat(&self) -> FsResult<FileInfo> {
        let st = self.state.lock();
        let node = match &st.node {
            Some(n) => n.clone(),
            None => return Err(FsError::path("stat", &self.name, ErrorKind::BadHandle)),
        };
        drop(st);
        let mtime = node.body.read().mtime;
        Ok(FileInfo {
            name: String::from(split_base(&self.name).1),
            size: 0,
            mode: DIR_MODE,
            mtime,
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

    fn read_dir(&self, n: i32) -> FsResult<Vec<FileInfo>> {
        let mut st = self.state.lock();
        let node = match &st.node {
            Some(n) => n.clone(),
            None => return Err(FsError::path("readdir", &self.name, ErrorKind::BadHandle)),
        };
        // Snapshot the remaining children under the directory's read lock,
        // then stat each child without the parent lock held.
        let mut remaining: Vec<(String, Arc<RamNode>)> = {
            let body = node.body.read();
            match &body.kind {
                NodeKind::Dir(children) => children
                    .iter()
                    .skip(st.pos)
                    .map(|(name, child)| (name.clone(), child.clone()))
                    .collect(),
                NodeKind::File(_) => {
                    return Err(FsError::path("readdir", &self.name, ErrorKind::NotADirectory))
                }
            }
        };
        if remaining.is_empty() {
            return Err(FsError::Eof);
        }
        if n > 0 && remaining.len() > n as usize {
            remaining.truncate(n as usize);
        }
        st.pos += remaining.len();
        drop(st);
        Ok(remaining
            .iter()
            .map(|(name, child)| entry_info(name, child))
            .collect())
    }
}

impl Drop for RamDir {
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

//! In-memory file system with bounded capacity.
//!
//! ## Design
//!
//! The tree is built from reference-counted nodes, each carrying its own
//! reader-writer lock; there is no global lock. Directories own a
//! name-keyed map of children, files own a byte buffer whose accounted
//! capacity grows in tiers (16/32/64-byte steps). Two atomic counters track
//! the live item count and the bytes charged against the configured bound;
//! a charge is taken *before* an allocation commits and rolled back when
//! the bound would be exceeded, so `usage` never under-reports.
//!
//! Lock discipline: handle mutex before node lock; a directory's lock is
//! held across a child's lock only inside the link/unlink critical
//! sections. Cross-directory renames take both parents' write locks in
//! address order.
//!
//! The file system is volatile; `sync` is a no-op.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod dir;
mod file;
mod node;

pub use node::{DIR_SIZE, EMPTY_FILE_SIZE};

use node::RamNode;

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use ferrite_fs_abstraction::types::Clock;
use ferrite_fs_abstraction::{
    split_base, valid_path, ErrorKind, File, FileSystem, Finalizer, FsError, FsResult, FsUsage,
    OpenFlags, PathError, Timestamp,
};

use dir::RamDir;
use file::RamFile;
use node::{find, find_dir, NodeKind, WalkError};

/// The quota and clock state shared between the facade and its handles.
pub(crate) struct Shared {
    name: String,
    root: Arc<RamNode>,
    max_bytes: u64,
    used_bytes: AtomicU64,
    items: AtomicU32,
    clock: Clock,
}

impl Shared {
    /// Charges `add` bytes against the quota, rolling back when the bound
    /// would be exceeded.
    pub(crate) fn charge(&self, add: u64) -> Result<(), ErrorKind> {
        if self.used_bytes.fetch_add(add, Ordering::SeqCst) + add > self.max_bytes {
            self.used_bytes.fetch_sub(add, Ordering::SeqCst);
            log::debug!("{}: quota exceeded charging {} bytes", self.name, add);
            return Err(ErrorKind::NoSpace);
        }
        Ok(())
    }

    pub(crate) fn uncharge(&self, sub: u64) {
        self.used_bytes.fetch_sub(sub, Ordering::SeqCst);
    }

    pub(crate) fn now(&self) -> Timestamp {
        (self.clock)()
    }
}

fn zero_clock() -> Timestamp {
    Timestamp::default()
}

/// An in-RAM file system bounded to `max_bytes` of accounted storage.
///
/// Cloning is cheap and yields another handle to the same tree.
#[derive(Clone)]
pub struct RamFs {
    inner: Arc<Shared>,
}

impl RamFs {
    /// Creates an empty file system that may charge up to `max_bytes`.
    pub fn new(max_bytes: u64) -> RamFs {
        RamFs {
            inner: Arc::new(Shared {
                name: String::from("ram"),
                root: RamNode::new_dir(Timestamp::default()),
                max_bytes,
                used_bytes: AtomicU64::new(0),
                items: AtomicU32::new(0),
                clock: zero_clock,
            }),
        }
    }

    /// Sets the backend instance name reported by `name()`.
    pub fn with_name(mut self, name: &str) -> RamFs {
        Arc::get_mut(&mut self.inner)
            .expect("with_name after handles were created")
            .name = String::from(name);
        self
    }

    /// Installs the time source used to stamp modifications.
    pub fn with_clock(mut self, clock: Clock) -> RamFs {
        Arc::get_mut(&mut self.inner)
            .expect("with_clock after handles were created")
            .clock = clock;
        self
    }

    /// Opens an existing node, applying `O_TRUNC`/`O_APPEND`, and wraps it
    /// in the matching handle type.
    fn open_node(
        &self,
        name: &str,
        node: Arc<RamNode>,
        flags: OpenFlags,
        closed: Finalizer,
    ) -> FsResult<Box<dyn File>> {
        let access = flags.access();
        if node.is_dir() {
            if access.writable() || flags.intersects(OpenFlags::TRUNC | OpenFlags::APPEND) {
                return Err(FsError::path("open", name, ErrorKind::IsADirectory));
            }
            return Ok(Box::new(RamDir::new(name, node, closed)));
        }
        let mut pos = 0;
        if flags.contains(OpenFlags::TRUNC) {
            let mut body = node.body.write();
            body.mtime = self.inner.now();
            if let NodeKind::File(fd) = &mut body.kind {
                // Capacity (and its charge) is retained on truncation.
                fd.data.clear();
            }
        }
        if flags.contains(OpenFlags::APPEND) {
            let body = node.body.read();
            if let NodeKind::File(fd) = &body.kind {
                pos = fd.data.len();
            }
        }
        Ok(Box::new(RamFile::new(
            name,
            access,
            self.inner.clone(),
            node,
            pos,
            closed,
        )))
    }
}

fn wrap_walk(op: &'static str, name: &str, err: WalkError) -> FsError {
    match err {
        WalkError::NotFound => FsError::path(op, name, ErrorKind::NotFound),
        WalkError::NotADirectory(prefix) => FsError::Path(PathError {
            op,
            path: prefix,
            kind: ErrorKind::NotADirectory,
        }),
    }
}

/// Projects a directory body onto its child map.
fn dir_children<'a>(
    body: &'a mut node::Body,
    op: &'static str,
    path: &str,
) -> FsResult<&'a mut BTreeMap<String, Arc<RamNode>>> {
    match &mut body.kind {
        NodeKind::Dir(children) => Ok(children),
        NodeKind::File(_) => Err(FsError::path(op, path, ErrorKind::NotADirectory)),
    }
}

impl FileSystem for RamFs {
    fn open_with_finalizer(
        &self,
        name: &str,
        flags: OpenFlags,
        _perm: u32,
        closed: Finalizer,
    ) -> FsResult<Box<dyn File>> {
        if !valid_path(name) {
            return Err(FsError::path("open", name, ErrorKind::Invalid));
        }
        if name == "." {
            if flags.contains(OpenFlags::CREAT) {
                return Err(FsError::path("open", name, ErrorKind::NotSupported));
            }
            return self.open_node(name, self.inner.root.clone(), flags, closed);
        }
        if !flags.contains(OpenFlags::CREAT) {
            let node = find(&self.inner.root, name).map_err(|e| wrap_walk("open", name, e))?;
            return self.open_node(name, node, flags, closed);
        }

        let (parent, base) =
            find_dir(&self.inner.root, name).map_err(|e| wrap_walk("open", name, e))?;
        let node = {
            let mut body = parent.body.write();
            let children = dir_children(&mut body, "open", split_base(name).0)?;
            match children.get(base) {
                Some(existing) => {
                    if flags.contains(OpenFlags::EXCL) {
                        return Err(FsError::path("open", name, ErrorKind::AlreadyExists));
                    }
                    existing.clone()
                }
                None => {
                    self.inner
                        .charge(EMPTY_FILE_SIZE)
                        .map_err(|kind| FsError::path("open", name, kind))?;
                    self.inner.items.fetch_add(1, Ordering::SeqCst);
                    let node = RamNode::new_file(self.inner.now());
                    children.insert(String::from(base), node.clone());
                    node
                }
            }
        };
        self.open_node(name, node, flags, closed)
    }

    fn fs_type(&self) -> &'static str {
        "ram"
    }

    fn name(&self) -> &str {
        &self.inner.name
    }

    fn usage(&self) -> FsUsage {
        FsUsage {
            used_items: self.inner.items.load(Ordering::SeqCst) as i64,
            max_items: -1,
            used_bytes: self.inner.used_bytes.load(Ordering::SeqCst) as i64,
            max_bytes: self.inner.max_bytes as i64,
        }
    }

    fn mkdir(&self, name: &str, _perm: u32) -> FsResult<()> {
        if !valid_path(name) {
            return Err(FsError::path("mkdir", name, ErrorKind::Invalid));
        }
        if name == "." {
            return Err(FsError::path("mkdir", name, ErrorKind::AlreadyExists));
        }
        let (parent, base) =
            find_dir(&self.inner.root, name).map_err(|e| wrap_walk("mkdir", name, e))?;
        let mut body = parent.body.write();
        let children = dir_children(&mut body, "mkdir", split_base(name).0)?;
        if children.contains_key(base) {
            return Err(FsError::path("mkdir", name, ErrorKind::AlreadyExists));
        }
        self.inner
            .charge(DIR_SIZE)
            .map_err(|kind| FsError::path("mkdir", name, kind))?;
        self.inner.items.fetch_add(1, Ordering::SeqCst);
        children.insert(String::from(base), RamNode::new_dir(self.inner.now()));
        Ok(())
    }

    fn remove(&self, name: &str) -> FsResult<()> {
        if !valid_path(name) {
            return Err(FsError::path("remove", name, ErrorKind::Invalid));
        }
        if name == "." {
            return Err(FsError::path("remove", name, ErrorKind::NotSupported));
        }
        let (parent, base) =
            find_dir(&self.inner.root, name).map_err(|e| wrap_walk("remove", name, e))?;
        let mut body = parent.body.write();
        let children = dir_children(&mut body, "remove", split_base(name).0)?;
        let node = children
            .get(base)
            .cloned()
            .ok_or_else(|| FsError::path("remove", name, ErrorKind::NotFound))?;
        let contribution = {
            let nb = node.body.read();
            match &nb.kind {
                NodeKind::File(fd) => EMPTY_FILE_SIZE + fd.cap as u64,
                NodeKind::Dir(grandchildren) => {
                    if !grandchildren.is_empty() {
                        return Err(FsError::path("remove", name, ErrorKind::NotSupported));
                    }
                    DIR_SIZE
                }
            }
        };
        children.remove(base);
        self.inner.items.fetch_sub(1, Ordering::SeqCst);
        self.inner.uncharge(contribution);
        Ok(())
    }

    fn rename(&self, old: &str, new: &str) -> FsResult<()> {
        if !valid_path(old) || old == "." {
            return Err(FsError::path("rename", old, ErrorKind::Invalid));
        }
        if !valid_path(new) || new == "." {
            return Err(FsError::path("rename", new, ErrorKind::Invalid));
        }
        if old == new {
            return Ok(());
        }
        // Moving a directory underneath itself would detach a cycle.
        if new.len() > old.len() && new.starts_with(old) && new.as_bytes()[old.len()] == b'/' {
            return Err(FsError::path("rename", new, ErrorKind::Invalid));
        }
        let (old_parent, old_base) =
            find_dir(&self.inner.root, old).map_err(|e| wrap_walk("rename", old, e))?;
        let (new_parent, new_base) =
            find_dir(&self.inner.root, new).map_err(|e| wrap_walk("rename", new, e))?;

        if Arc::ptr_eq(&old_parent, &new_parent) {
            let mut body = old_parent.body.write();
            let children = dir_children(&mut body, "rename", split_base(old).0)?;
            if children.contains_key(new_base) {
                return Err(FsError::path("rename", new, ErrorKind::AlreadyExists));
            }
            let node = children
                .remove(old_base)
                .ok_or_else(|| FsError::path("rename", old, ErrorKind::NotFound))?;
            children.insert(String::from(new_base), node);
            return Ok(());
        }

        // Both parents' locks, in address order, held across the whole
        // unlink-link pair: the destination check and the move are atomic.
        let (mut g_old, mut g_new);
        if Arc::as_ptr(&old_parent) < Arc::as_ptr(&new_parent) {
            g_old = old_parent.body.write();
            g_new = new_parent.body.write();
        } else {
            g_new = new_parent.body.write();
            g_old = old_parent.body.write();
        }
        let new_children = dir_children(&mut g_new, "rename", split_base(new).0)?;
        if new_children.contains_key(new_base) {
            return Err(FsError::path("rename", new, ErrorKind::AlreadyExists));
        }
        let old_children = dir_children(&mut g_old, "rename", split_base(old).0)?;
        let node = old_children
            .remove(old_base)
            .ok_or_else(|| FsError::path("rename", old, ErrorKind::NotFound))?;
        new_children.insert(String::from(new_base), node);
        Ok(())
    }

    fn sync(&self) -> FsResult<()> {
        Ok(())
    }
}

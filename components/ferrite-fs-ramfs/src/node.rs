//! Tree nodes and path walkers.
//!
//! A node is a tagged variant: a file owning its byte buffer, or a
//! directory owning a name-keyed map of children. Every node carries its
//! own reader-writer lock; the child map replaces the intrusive sibling
//! list of older revisions, which makes child names unique by construction
//! and gives a stable (name-ordered) listing.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::mem;

use ferrite_fs_abstraction::{split_base, Timestamp};
use spin::RwLock;

/// Quota contribution of an empty file: the node itself plus the byte
/// buffer header. An approximation of the fixed memory footprint.
pub const EMPTY_FILE_SIZE: u64 = (mem::size_of::<RamNode>() + mem::size_of::<Vec<u8>>()) as u64;

/// Quota contribution of a directory.
pub const DIR_SIZE: u64 = mem::size_of::<RamNode>() as u64;

/// A tree node. The parent's child map owns the node's name.
pub struct RamNode {
    pub(crate) body: RwLock<Body>,
}

pub(crate) struct Body {
    pub mtime: Timestamp,
    pub kind: NodeKind,
}

pub(crate) enum NodeKind {
    File(FileData),
    Dir(BTreeMap<String, Arc<RamNode>>),
}

pub(crate) struct FileData {
    pub data: Vec<u8>,
    /// Accounted capacity. Drives the growth tiers and the quota math;
    /// `Vec::capacity` is allocator-defined and never consulted.
    pub cap: usize,
}

impl RamNode {
    pub(crate) fn new_file(mtime: Timestamp) -> Arc<RamNode> {
        Arc::new(RamNode {
            body: RwLock::new(Body {
                mtime,
                kind: NodeKind::File(FileData {
                    data: Vec::new(),
                    cap: 0,
                }),
            }),
        })
    }

    pub(crate) fn new_dir(mtime: Timestamp) -> Arc<RamNode> {
        Arc::new(RamNode {
            body: RwLock::new(Body {
                mtime,
                kind: NodeKind::Dir(BTreeMap::new()),
            }),
        })
    }

    pub(crate) fn is_dir(&self) -> bool {
        matches!(self.body.read().kind, NodeKind::Dir(_))
    }
}

/// Failure of a path walk, before any operation context is attached.
pub(crate) enum WalkError {
    /// Some component does not exist.
    NotFound,
    /// Traversal hit a file; carries the path prefix that named it.
    NotADirectory(String),
}

/// Resolves `name` (a valid path other than ".") starting at `dir`.
///
/// Each step takes the current directory's read lock only long enough to
/// clone the child reference; no lock is held across levels.
pub(crate) fn find(dir: &Arc<RamNode>, name: &str) -> Result<Arc<RamNode>, WalkError> {
    let mut cur = dir.clone();
    let mut consumed = 0usize;
    for seg in name.split('/') {
        let next = {
            let body = cur.body.read();
            match &body.kind {
                NodeKind::Dir(children) => children.get(seg).cloned(),
                NodeKind::File(_) => {
                    let prefix = &name[..consumed.saturating_sub(1)];
                    return Err(WalkError::NotADirectory(String::from(prefix)));
                }
            }
        };
        cur = next.ok_or(WalkError::NotFound)?;
        consumed += seg.len() + 1;
    }
    Ok(cur)
}

/// Resolves the parent directory of `name`, returning it together with the
/// final path component.
pub(crate) fn find_dir<'a>(
    root: &Arc<RamNode>,
    name: &'a str,
) -> Result<(Arc<RamNode>, &'a str), WalkError> {
    let (dir_part, base) = split_base(name);
    if dir_part.is_empty() {
        return Ok((root.clone(), base));
    }
    let parent = find(root, dir_part)?;
    if !parent.is_dir() {
        return Err(WalkError::NotADirectory(String::from(dir_part)));
    }
    Ok((parent, base))
}

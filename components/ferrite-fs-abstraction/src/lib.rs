//! File-system abstraction layer for the Ferrite runtime.
//!
//! This crate provides the pieces every backend shares:
//!
//! - [`FsError`], [`PathError`], [`ErrorKind`]: the error model
//! - [`valid_path`], [`split_base`]: path utilities
//! - [`FileSystem`], [`File`]: the capability traits the mount layer consumes
//! - [`FileInfo`], [`FsUsage`], [`Timestamp`], [`OpenFlags`]: VFS data types
//!
//! # Features
//!
//! - `std`: enables conversions from `std::time::SystemTime`

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod error;
pub mod fs;
pub mod path;
pub mod types;

// Re-exports for convenience
pub use error::{ErrorKind, FsError, FsResult, PathError};
pub use fs::{File, FileSystem, Finalizer};
pub use path::{split_base, valid_path};
pub use types::{Access, FileInfo, FsUsage, OpenFlags, Timestamp};

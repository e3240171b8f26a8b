// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! memfs core: an in-memory POSIX-like filesystem engine
//!
//! A [`Volume`] holds an inode tree and a descriptor table and exposes the
//! blocking call convention. [`CallbackFs`] and [`PromiseFs`] wrap a shared
//! volume for the two deferred conventions without duplicating any tree
//! logic. Failures carry a stable [`ErrorCode`] (`ENOENT`, `ENOTDIR`, ...).

pub mod callback;
pub mod config;
pub mod deferred;
pub mod encoding;
pub mod error;
pub mod inode;
pub mod promises;
pub mod types;
pub mod volume;

mod fd;
mod json;
mod path;

#[cfg(test)]
pub(crate) mod testing;

pub use callback::{CallbackFs, EventLoop};
pub use config::{DefaultModes, FsConfig, FsLimits, TempPolicy};
pub use deferred::{Deferred, FsFuture};
pub use encoding::Encoding;
pub use error::{ErrorCode, FsError, FsResult};
pub use inode::{Inode, InodeStore};
pub use promises::PromiseFs;
pub use types::{
    Dirent, Fd, FileData, FileHandle, FileKind, FileRef, FileTimes, InodeId, MkdirOptions,
    OpenFlags, ReadFileOptions, Readdir, ReaddirOptions, RmOptions, RmdirOptions, Stats,
    WriteFileOptions,
};
pub use volume::Volume;

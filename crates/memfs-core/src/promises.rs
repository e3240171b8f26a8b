// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Promise call convention
//!
//! Calls run against the volume right away and return a [`FsFuture`] that
//! yields once before resolving. `open` hands out a [`FileHandle`] instead of
//! a raw descriptor; the read/write family accepts either.

use std::io::SeekFrom;
use std::sync::Arc;

use crate::deferred::{Deferred, FsFuture};
use crate::types::{
    FileData, FileHandle, FileRef, MkdirOptions, OpenFlags, ReadFileOptions, Readdir,
    ReaddirOptions, RmOptions, RmdirOptions, Stats, WriteFileOptions,
};
use crate::volume::Volume;

#[derive(Clone, Debug)]
pub struct PromiseFs {
    volume: Arc<Volume>,
}

impl PromiseFs {
    pub fn new(volume: Arc<Volume>) -> Self {
        Self { volume }
    }

    pub fn volume(&self) -> &Arc<Volume> {
        &self.volume
    }

    pub fn mkdir(&self, path: &str, options: &MkdirOptions) -> FsFuture<Option<String>> {
        Deferred::settled(self.volume.mkdir(path, options))
    }

    pub fn mkdtemp(&self, prefix: &str) -> FsFuture<String> {
        Deferred::settled(self.volume.mkdtemp(prefix))
    }

    pub fn rmdir(&self, path: &str, options: &RmdirOptions) -> FsFuture<()> {
        Deferred::settled(self.volume.rmdir(path, options))
    }

    pub fn rm(&self, path: &str, options: &RmOptions) -> FsFuture<()> {
        Deferred::settled(self.volume.rm(path, options))
    }

    pub fn unlink(&self, path: &str) -> FsFuture<()> {
        Deferred::settled(self.volume.unlink(path))
    }

    pub fn open(&self, path: &str, flags: OpenFlags) -> FsFuture<FileHandle> {
        Deferred::settled(self.volume.open(path, flags).map(FileHandle::from_fd))
    }

    pub fn open_with_mode(
        &self,
        path: &str,
        flags: OpenFlags,
        mode: Option<u32>,
    ) -> FsFuture<FileHandle> {
        Deferred::settled(
            self.volume
                .open_with_mode(path, flags, mode)
                .map(FileHandle::from_fd),
        )
    }

    pub fn close(&self, handle: &FileHandle) -> FsFuture<()> {
        Deferred::settled(self.volume.close(handle.fd()))
    }

    pub fn read(&self, handle: &FileHandle, len: usize) -> FsFuture<Vec<u8>> {
        Deferred::settled(self.volume.read(handle.fd(), len))
    }

    pub fn read_at(&self, handle: &FileHandle, offset: u64, len: usize) -> FsFuture<Vec<u8>> {
        Deferred::settled(self.volume.read_at(handle.fd(), offset, len))
    }

    pub fn write(&self, handle: &FileHandle, data: &[u8]) -> FsFuture<usize> {
        Deferred::settled(self.volume.write(handle.fd(), data))
    }

    pub fn write_at(&self, handle: &FileHandle, offset: u64, data: &[u8]) -> FsFuture<usize> {
        Deferred::settled(self.volume.write_at(handle.fd(), offset, data))
    }

    pub fn seek(&self, handle: &FileHandle, pos: SeekFrom) -> FsFuture<u64> {
        Deferred::settled(self.volume.seek(handle.fd(), pos))
    }

    pub fn read_file<'a>(
        &self,
        target: impl Into<FileRef<'a>>,
        options: &ReadFileOptions,
    ) -> FsFuture<FileData> {
        Deferred::settled(self.volume.read_file(target, options))
    }

    pub fn write_file<'a>(
        &self,
        target: impl Into<FileRef<'a>>,
        data: impl Into<FileData>,
        options: &WriteFileOptions,
    ) -> FsFuture<()> {
        Deferred::settled(self.volume.write_file(target, data, options))
    }

    pub fn append_file<'a>(
        &self,
        target: impl Into<FileRef<'a>>,
        data: impl Into<FileData>,
        options: &WriteFileOptions,
    ) -> FsFuture<()> {
        Deferred::settled(self.volume.append_file(target, data, options))
    }

    pub fn truncate(&self, path: &str, len: u64) -> FsFuture<()> {
        Deferred::settled(self.volume.truncate(path, len))
    }

    pub fn ftruncate(&self, handle: &FileHandle, len: u64) -> FsFuture<()> {
        Deferred::settled(self.volume.ftruncate(handle.fd(), len))
    }

    pub fn readdir(&self, path: &str, options: &ReaddirOptions) -> FsFuture<Readdir> {
        Deferred::settled(self.volume.readdir(path, options))
    }

    pub fn stat(&self, path: &str) -> FsFuture<Stats> {
        Deferred::settled(self.volume.stat(path))
    }

    pub fn lstat(&self, path: &str) -> FsFuture<Stats> {
        Deferred::settled(self.volume.lstat(path))
    }

    pub fn fstat(&self, handle: &FileHandle) -> FsFuture<Stats> {
        Deferred::settled(self.volume.fstat(handle.fd()))
    }

    pub fn exists(&self, path: &str) -> Deferred<bool> {
        Deferred::settled(self.volume.exists(path))
    }

    pub fn symlink(&self, target: &str, path: &str) -> FsFuture<()> {
        Deferred::settled(self.volume.symlink(target, path))
    }

    pub fn readlink(&self, path: &str) -> FsFuture<String> {
        Deferred::settled(self.volume.readlink(path))
    }

    pub fn link(&self, existing: &str, new_path: &str) -> FsFuture<()> {
        Deferred::settled(self.volume.link(existing, new_path))
    }

    pub fn rename(&self, old_path: &str, new_path: &str) -> FsFuture<()> {
        Deferred::settled(self.volume.rename(old_path, new_path))
    }

    pub fn chmod(&self, path: &str, mode: u32) -> FsFuture<()> {
        Deferred::settled(self.volume.chmod(path, mode))
    }

    pub fn realpath(&self, path: &str) -> FsFuture<String> {
        Deferred::settled(self.volume.realpath(path))
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Callback call convention
//!
//! Each call runs against the volume immediately and queues the completion
//! callback on an [`EventLoop`]. Nothing is delivered until the host drains
//! the loop, so a callback never runs inside the call that scheduled it.

use std::collections::VecDeque;
use std::io::SeekFrom;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::FsResult;
use crate::types::{
    Fd, FileData, FileRef, MkdirOptions, OpenFlags, ReadFileOptions, Readdir, ReaddirOptions,
    RmOptions, RmdirOptions, Stats, WriteFileOptions,
};
use crate::volume::Volume;

/// Queued completion
pub type Task = Box<dyn FnOnce() + Send>;

/// Single-threaded FIFO of completions
#[derive(Clone, Default)]
pub struct EventLoop {
    queue: Arc<Mutex<VecDeque<Task>>>,
}

impl EventLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.lock().push_back(Box::new(task));
    }

    /// Run the oldest queued task; false when the queue was empty
    pub fn run_once(&self) -> bool {
        // the lock is released before the task runs so it may enqueue more work
        let task = self.queue.lock().pop_front();
        match task {
            Some(task) => {
                task();
                true
            }
            None => false,
        }
    }

    /// Run tasks, including ones queued meanwhile, until none remain
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_once() {
            ran += 1;
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Error-first callback front end over a shared [`Volume`]
#[derive(Clone, Debug)]
pub struct CallbackFs {
    volume: Arc<Volume>,
    event_loop: EventLoop,
}

impl CallbackFs {
    pub fn new(volume: Arc<Volume>, event_loop: EventLoop) -> Self {
        Self { volume, event_loop }
    }

    pub fn volume(&self) -> &Arc<Volume> {
        &self.volume
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }

    fn settle<T, F>(&self, result: T, cb: F)
    where
        T: Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        self.event_loop.enqueue(move || cb(result));
    }

    pub fn mkdir<F>(&self, path: &str, options: &MkdirOptions, cb: F)
    where
        F: FnOnce(FsResult<Option<String>>) + Send + 'static,
    {
        self.settle(self.volume.mkdir(path, options), cb);
    }

    pub fn mkdtemp<F>(&self, prefix: &str, cb: F)
    where
        F: FnOnce(FsResult<String>) + Send + 'static,
    {
        self.settle(self.volume.mkdtemp(prefix), cb);
    }

    pub fn rmdir<F>(&self, path: &str, options: &RmdirOptions, cb: F)
    where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.rmdir(path, options), cb);
    }

    pub fn rm<F>(&self, path: &str, options: &RmOptions, cb: F)
    where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.rm(path, options), cb);
    }

    pub fn unlink<F>(&self, path: &str, cb: F)
    where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.unlink(path), cb);
    }

    pub fn open<F>(&self, path: &str, flags: OpenFlags, cb: F)
    where
        F: FnOnce(FsResult<Fd>) + Send + 'static,
    {
        self.settle(self.volume.open(path, flags), cb);
    }

    pub fn open_with_mode<F>(&self, path: &str, flags: OpenFlags, mode: Option<u32>, cb: F)
    where
        F: FnOnce(FsResult<Fd>) + Send + 'static,
    {
        self.settle(self.volume.open_with_mode(path, flags, mode), cb);
    }

    pub fn close<F>(&self, fd: Fd, cb: F)
    where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.close(fd), cb);
    }

    pub fn read<F>(&self, fd: Fd, len: usize, cb: F)
    where
        F: FnOnce(FsResult<Vec<u8>>) + Send + 'static,
    {
        self.settle(self.volume.read(fd, len), cb);
    }

    pub fn read_at<F>(&self, fd: Fd, offset: u64, len: usize, cb: F)
    where
        F: FnOnce(FsResult<Vec<u8>>) + Send + 'static,
    {
        self.settle(self.volume.read_at(fd, offset, len), cb);
    }

    pub fn write<F>(&self, fd: Fd, data: &[u8], cb: F)
    where
        F: FnOnce(FsResult<usize>) + Send + 'static,
    {
        self.settle(self.volume.write(fd, data), cb);
    }

    pub fn write_at<F>(&self, fd: Fd, offset: u64, data: &[u8], cb: F)
    where
        F: FnOnce(FsResult<usize>) + Send + 'static,
    {
        self.settle(self.volume.write_at(fd, offset, data), cb);
    }

    pub fn seek<F>(&self, fd: Fd, pos: SeekFrom, cb: F)
    where
        F: FnOnce(FsResult<u64>) + Send + 'static,
    {
        self.settle(self.volume.seek(fd, pos), cb);
    }

    pub fn read_file<'a, F>(&self, target: impl Into<FileRef<'a>>, options: &ReadFileOptions, cb: F)
    where
        F: FnOnce(FsResult<FileData>) + Send + 'static,
    {
        self.settle(self.volume.read_file(target, options), cb);
    }

    pub fn write_file<'a, F>(
        &self,
        target: impl Into<FileRef<'a>>,
        data: impl Into<FileData>,
        options: &WriteFileOptions,
        cb: F,
    ) where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.write_file(target, data, options), cb);
    }

    pub fn append_file<'a, F>(
        &self,
        target: impl Into<FileRef<'a>>,
        data: impl Into<FileData>,
        options: &WriteFileOptions,
        cb: F,
    ) where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.append_file(target, data, options), cb);
    }

    pub fn truncate<F>(&self, path: &str, len: u64, cb: F)
    where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.truncate(path, len), cb);
    }

    pub fn ftruncate<F>(&self, fd: Fd, len: u64, cb: F)
    where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.ftruncate(fd, len), cb);
    }

    pub fn readdir<F>(&self, path: &str, options: &ReaddirOptions, cb: F)
    where
        F: FnOnce(FsResult<Readdir>) + Send + 'static,
    {
        self.settle(self.volume.readdir(path, options), cb);
    }

    pub fn stat<F>(&self, path: &str, cb: F)
    where
        F: FnOnce(FsResult<Stats>) + Send + 'static,
    {
        self.settle(self.volume.stat(path), cb);
    }

    pub fn lstat<F>(&self, path: &str, cb: F)
    where
        F: FnOnce(FsResult<Stats>) + Send + 'static,
    {
        self.settle(self.volume.lstat(path), cb);
    }

    pub fn fstat<F>(&self, fd: Fd, cb: F)
    where
        F: FnOnce(FsResult<Stats>) + Send + 'static,
    {
        self.settle(self.volume.fstat(fd), cb);
    }

    /// Completes with a bare bool; there is no error channel
    pub fn exists<F>(&self, path: &str, cb: F)
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.settle(self.volume.exists(path), cb);
    }

    pub fn symlink<F>(&self, target: &str, path: &str, cb: F)
    where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.symlink(target, path), cb);
    }

    pub fn readlink<F>(&self, path: &str, cb: F)
    where
        F: FnOnce(FsResult<String>) + Send + 'static,
    {
        self.settle(self.volume.readlink(path), cb);
    }

    pub fn link<F>(&self, existing: &str, new_path: &str, cb: F)
    where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.link(existing, new_path), cb);
    }

    pub fn rename<F>(&self, old_path: &str, new_path: &str, cb: F)
    where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.rename(old_path, new_path), cb);
    }

    pub fn chmod<F>(&self, path: &str, mode: u32, cb: F)
    where
        F: FnOnce(FsResult<()>) + Send + 'static,
    {
        self.settle(self.volume.chmod(path, mode), cb);
    }

    pub fn realpath<F>(&self, path: &str, cb: F)
    where
        F: FnOnce(FsResult<String>) + Send + 'static,
    {
        self.settle(self.volume.realpath(path), cb);
    }
}

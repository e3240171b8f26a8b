// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Operation layer
//!
//! [`Volume`] owns one inode tree (or a mounted subtree of a host store)
//! together with its descriptor table. Every operation takes the state lock
//! for its whole duration, so callers never observe a half-applied mutation.
//! Validation runs before the first mutation; only the recursive variants of
//! `mkdir`, `rmdir` and `rm` may stop partway.

use std::io::SeekFrom;

use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, warn};

use crate::config::FsConfig;
use crate::error::{CodeResult, ErrorCode, FsResult};
use crate::fd::{resize_span, FdTable};
use crate::inode::InodeStore;
use crate::path::{segments, Resolved, Resolver};
use crate::types::{
    Dirent, Fd, FileData, FileRef, InodeId, MkdirOptions, OpenFlags, ReadFileOptions, Readdir,
    ReaddirOptions, RmOptions, RmdirOptions, Stats, WriteFileOptions,
};

pub(crate) const COMPONENT: &str = "memfs-core";

/// Mutable engine state guarded by the volume lock
#[derive(Debug)]
pub(crate) struct State {
    pub store: InodeStore,
    pub fds: FdTable,
    pub root: InodeId,
    max_hops: u32,
}

impl State {
    pub fn resolver(&self) -> Resolver<'_> {
        Resolver::new(&self.store, self.root, self.max_hops)
    }

    pub fn resolve(&self, path: &str, follow: bool) -> CodeResult<Resolved> {
        self.resolver().resolve(path, follow)
    }

    fn resolve_existing(&self, path: &str, follow: bool) -> CodeResult<InodeId> {
        self.resolve(path, follow)?.existing()
    }

    fn mkdir_leaf(&mut self, path: &str, mode: u32) -> CodeResult<InodeId> {
        let target = self.resolve(path, false)?;
        if target.inode.is_some() {
            return Err(ErrorCode::AlreadyExists);
        }
        self.store.create_directory(target.dir, &target.name, mode)
    }

    /// Create every missing directory along `path`; returns the first one created
    pub fn mkdir_recursive(&mut self, path: &str, mode: u32) -> CodeResult<Option<String>> {
        let parts: Vec<&str> = segments(path).collect();
        let mut first_created = None;
        for i in 0..parts.len() {
            let prefix = parts[..=i].join("/");
            let step = self.resolve(&prefix, true)?;
            match step.inode {
                Some(id) => {
                    if self.store.node(id)?.is_dir() {
                        continue;
                    }
                    return Err(if i + 1 == parts.len() {
                        ErrorCode::AlreadyExists
                    } else {
                        ErrorCode::NotADirectory
                    });
                }
                None => {
                    self.store.create_directory(step.dir, &step.name, mode)?;
                    if first_created.is_none() {
                        first_created = Some(self.resolver().canonical(&step));
                    }
                }
            }
        }
        Ok(first_created)
    }

    /// Depth-first removal of `name` in `dir` and everything below it.
    /// A directory is revisited once its children are gone.
    fn remove_tree(&mut self, dir: InodeId, name: &str) -> CodeResult<()> {
        let mut work = vec![(dir, name.to_string(), false)];
        while let Some((parent, name, emptied)) = work.pop() {
            let id = self.store.lookup(parent, &name)?.ok_or(ErrorCode::NotFound)?;
            if !emptied && self.store.node(id)?.is_dir() {
                let children = self.store.entries(id)?;
                work.push((parent, name, true));
                work.extend(children.into_iter().map(|(child, _)| (id, child, false)));
                continue;
            }
            self.store.unlink(parent, &name)?;
        }
        Ok(())
    }

    fn rmdir(&mut self, path: &str, recursive: bool) -> CodeResult<()> {
        let target = self.resolve(path, false)?;
        let id = target.existing()?;
        if !self.store.node(id)?.is_dir() {
            return Err(ErrorCode::NotADirectory);
        }
        if target.is_root() {
            return Err(ErrorCode::Busy);
        }
        if recursive {
            self.remove_tree(target.dir, &target.name)
        } else {
            self.store.unlink(target.dir, &target.name).map(|_| ())
        }
    }

    fn rm(&mut self, path: &str, recursive: bool) -> CodeResult<()> {
        let target = self.resolve(path, false)?;
        let id = target.existing()?;
        if target.is_root() {
            return Err(ErrorCode::Busy);
        }
        if recursive && self.store.node(id)?.is_dir() {
            self.remove_tree(target.dir, &target.name)
        } else {
            self.store.unlink(target.dir, &target.name).map(|_| ())
        }
    }

    fn unlink(&mut self, path: &str) -> CodeResult<()> {
        let target = self.resolve(path, false)?;
        let id = target.existing()?;
        if self.store.node(id)?.is_dir() {
            return Err(ErrorCode::IsADirectory);
        }
        self.store.unlink(target.dir, &target.name).map(|_| ())
    }

    pub fn open(&mut self, path: &str, flags: OpenFlags, mode: u32) -> CodeResult<Fd> {
        if !self.fds.has_capacity() {
            return Err(ErrorCode::TooManyOpenFiles);
        }
        let exclusive = flags.create && flags.exclusive;
        let target = self.resolve(path, !exclusive)?;
        let inode = match target.inode {
            Some(_) if exclusive => return Err(ErrorCode::AlreadyExists),
            Some(id) => {
                let node = self.store.node_mut(id)?;
                if node.is_dir() {
                    if flags.write || flags.truncate {
                        return Err(ErrorCode::IsADirectory);
                    }
                } else if flags.truncate && flags.write {
                    node.bytes_mut()?.clear();
                    node.touch_modified();
                }
                id
            }
            None if flags.create => {
                self.store
                    .create_file(target.dir, &target.name, mode, Vec::new())?
            }
            None => return Err(ErrorCode::NotFound),
        };
        self.fds.allocate(&mut self.store, inode, flags)
    }

    fn read_to_end(&mut self, fd: Fd) -> CodeResult<Vec<u8>> {
        self.fds.read(&mut self.store, fd, usize::MAX)
    }

    fn write(&mut self, fd: Fd, data: &[u8]) -> CodeResult<usize> {
        self.fds.write(&mut self.store, fd, data)
    }

    fn close(&mut self, fd: Fd) -> CodeResult<()> {
        self.fds.release(&mut self.store, fd).map(|_| ())
    }

    /// Open, run `f` against the new descriptor and close it again, even
    /// when `f` fails
    fn with_opened<T>(
        &mut self,
        path: &str,
        flags: OpenFlags,
        mode: u32,
        syscall: &'static str,
        f: impl FnOnce(&mut Self, Fd) -> CodeResult<T>,
    ) -> Result<T, (ErrorCode, &'static str)> {
        let fd = self.open(path, flags, mode).map_err(|e| (e, "open"))?;
        let result = f(self, fd);
        let closed = self.close(fd);
        let value = result.map_err(|e| (e, syscall))?;
        closed.map_err(|e| (e, "close"))?;
        Ok(value)
    }

    fn resize(&mut self, inode: InodeId, len: u64) -> CodeResult<()> {
        let max_len = self.fds.max_file_size();
        let node = self.store.node_mut(inode)?;
        resize_span(node.bytes_mut()?, len, max_len)?;
        node.touch_modified();
        Ok(())
    }

    fn truncate(&mut self, path: &str, len: u64) -> CodeResult<()> {
        let id = self.resolve_existing(path, true)?;
        self.resize(id, len)
    }

    fn chmod(&mut self, path: &str, mode: u32) -> CodeResult<()> {
        let id = self.resolve_existing(path, true)?;
        self.store.node_mut(id)?.set_mode(mode);
        Ok(())
    }

    fn readdir(&self, path: &str, with_file_types: bool) -> CodeResult<Readdir> {
        let dir = self.resolve_existing(path, true)?;
        let mut entries = Vec::new();
        for (name, id) in self.store.node(dir)?.children()? {
            entries.push(Dirent::new(name.clone(), self.store.node(*id)?.kind()));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(if with_file_types {
            Readdir::Entries(entries)
        } else {
            Readdir::Names(entries.into_iter().map(|e| e.name).collect())
        })
    }

    fn stat(&self, path: &str, follow: bool) -> CodeResult<Stats> {
        let id = self.resolve_existing(path, follow)?;
        Ok(self.store.node(id)?.stats())
    }

    fn symlink(&mut self, target: &str, path: &str) -> CodeResult<()> {
        let at = self.resolve(path, false)?;
        if at.inode.is_some() {
            return Err(ErrorCode::AlreadyExists);
        }
        self.store.create_symlink(at.dir, &at.name, target).map(|_| ())
    }

    fn readlink(&self, path: &str) -> CodeResult<String> {
        let id = self.resolve_existing(path, false)?;
        self.store
            .node(id)?
            .symlink_target()
            .map(str::to_string)
            .ok_or(ErrorCode::InvalidArgument)
    }

    fn link(&mut self, existing: &str, new_path: &str) -> CodeResult<()> {
        let source = self.resolve_existing(existing, false)?;
        if self.store.node(source)?.is_dir() {
            return Err(ErrorCode::NotPermitted);
        }
        let at = self.resolve(new_path, false)?;
        if at.inode.is_some() {
            return Err(ErrorCode::AlreadyExists);
        }
        self.store.link(at.dir, &at.name, source)
    }

    fn rename(&mut self, old_path: &str, new_path: &str) -> CodeResult<()> {
        let from = self.resolve(old_path, false)?;
        let id = from.existing()?;
        let to = self.resolve(new_path, false)?;
        if from.is_root() || to.is_root() {
            return Err(ErrorCode::Busy);
        }
        let moving_dir = self.store.node(id)?.is_dir();
        if let Some(existing) = to.inode {
            if existing == id {
                return Ok(());
            }
            match (moving_dir, self.store.node(existing)?.is_dir()) {
                (true, false) => return Err(ErrorCode::NotADirectory),
                (false, true) => return Err(ErrorCode::IsADirectory),
                _ => {}
            }
        }
        if moving_dir && self.resolver().is_within(to.dir, id) {
            return Err(ErrorCode::InvalidArgument);
        }
        if to.inode.is_some() {
            self.store.unlink(to.dir, &to.name)?;
        }
        self.store
            .move_entry(from.dir, &from.name, to.dir, &to.name)
            .map(|_| ())
    }
}

/// In-memory filesystem volume exposing the blocking call convention
#[derive(Debug)]
pub struct Volume {
    state: Mutex<State>,
    config: FsConfig,
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(FsConfig::default())
    }
}

impl Volume {
    /// Fresh volume with its own store and an empty root directory
    pub fn new(config: FsConfig) -> Self {
        let config = config.normalized();
        let mut store = InodeStore::with_id_base(config.first_inode_id());
        let root = store.create_root(config.modes.directory);
        Self::assemble(store, root, config)
    }

    /// Operate on an existing directory of a host-supplied store. Paths
    /// resolve relative to `root` and `..` never climbs above it.
    pub fn mount(store: InodeStore, root: InodeId, config: FsConfig) -> FsResult<Self> {
        match store.get(root).map(|node| node.is_dir()) {
            None => Err(ErrorCode::NotFound.at("mount", root.to_string())),
            Some(false) => Err(ErrorCode::NotADirectory.at("mount", root.to_string())),
            Some(true) => {
                debug!(component = COMPONENT, root = %root, "mounting volume");
                Ok(Self::assemble(store, root, config))
            }
        }
    }

    fn assemble(store: InodeStore, root: InodeId, config: FsConfig) -> Self {
        let config = config.normalized();
        let state = State {
            store,
            fds: FdTable::new(config.limits.max_open_files, config.limits.max_file_size),
            root,
            max_hops: config.limits.max_symlink_hops,
        };
        Self {
            state: Mutex::new(state),
            config,
        }
    }

    /// Hand the store back to the host; open descriptors are discarded
    pub fn into_store(self) -> InodeStore {
        self.state.into_inner().store
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn root(&self) -> InodeId {
        self.state.lock().root
    }

    /// Number of live inodes in the backing store
    pub fn inode_count(&self) -> usize {
        self.state.lock().store.len()
    }

    pub fn open_descriptors(&self) -> Vec<Fd> {
        self.state.lock().fds.open_fds()
    }

    pub(crate) fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        f(&mut self.state.lock())
    }

    fn file_mode(&self, mode: Option<u32>) -> u32 {
        mode.unwrap_or(self.config.modes.file)
    }

    /// Create a directory. With `recursive`, returns the first directory
    /// actually created.
    pub fn mkdir(&self, path: &str, options: &MkdirOptions) -> FsResult<Option<String>> {
        let mode = options.mode.unwrap_or(self.config.modes.directory);
        debug!(component = COMPONENT, op = "mkdir", path, recursive = options.recursive);
        let mut state = self.state.lock();
        let result = if options.recursive {
            state.mkdir_recursive(path, mode)
        } else {
            state.mkdir_leaf(path, mode).map(|_| None)
        };
        result.map_err(|e| e.at("mkdir", path))
    }

    /// Create a uniquely named directory `prefix` + random suffix
    pub fn mkdtemp(&self, prefix: &str) -> FsResult<String> {
        let policy = &self.config.temp;
        let mode = self.config.modes.directory;
        let mut rng = rand::thread_rng();
        let mut state = self.state.lock();
        for _ in 0..policy.max_attempts {
            let suffix: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(policy.suffix_len)
                .map(char::from)
                .collect();
            let candidate = format!("{prefix}{suffix}");
            match state.mkdir_leaf(&candidate, mode) {
                Ok(_) => {
                    debug!(component = COMPONENT, op = "mkdtemp", path = %candidate);
                    return Ok(candidate);
                }
                Err(ErrorCode::AlreadyExists) => continue,
                Err(e) => return Err(e.at("mkdtemp", prefix)),
            }
        }
        warn!(
            component = COMPONENT,
            prefix,
            attempts = policy.max_attempts,
            "mkdtemp gave up after repeated name collisions"
        );
        Err(ErrorCode::AlreadyExists.at("mkdtemp", prefix))
    }

    pub fn rmdir(&self, path: &str, options: &RmdirOptions) -> FsResult<()> {
        debug!(component = COMPONENT, op = "rmdir", path, recursive = options.recursive);
        self.state
            .lock()
            .rmdir(path, options.recursive)
            .map_err(|e| e.at("rmdir", path))
    }

    /// Remove a file or directory. `force` turns a missing target into success.
    pub fn rm(&self, path: &str, options: &RmOptions) -> FsResult<()> {
        debug!(
            component = COMPONENT,
            op = "rm",
            path,
            recursive = options.recursive,
            force = options.force
        );
        match self.state.lock().rm(path, options.recursive) {
            Err(ErrorCode::NotFound) if options.force => Ok(()),
            result => result.map_err(|e| e.at("rm", path)),
        }
    }

    pub fn unlink(&self, path: &str) -> FsResult<()> {
        debug!(component = COMPONENT, op = "unlink", path);
        self.state
            .lock()
            .unlink(path)
            .map_err(|e| e.at("unlink", path))
    }

    pub fn open(&self, path: &str, flags: OpenFlags) -> FsResult<Fd> {
        self.open_with_mode(path, flags, None)
    }

    /// `open` with explicit mode bits for a newly created file
    pub fn open_with_mode(&self, path: &str, flags: OpenFlags, mode: Option<u32>) -> FsResult<Fd> {
        let mode = self.file_mode(mode);
        let fd = self
            .state
            .lock()
            .open(path, flags, mode)
            .map_err(|e| e.at("open", path))?;
        debug!(component = COMPONENT, op = "open", path, fd = %fd);
        Ok(fd)
    }

    pub fn close(&self, fd: Fd) -> FsResult<()> {
        debug!(component = COMPONENT, op = "close", fd = %fd);
        self.state.lock().close(fd).map_err(|e| e.on("close"))
    }

    /// Read up to `len` bytes at the descriptor's cursor
    pub fn read(&self, fd: Fd, len: usize) -> FsResult<Vec<u8>> {
        let mut state = self.state.lock();
        let State { store, fds, .. } = &mut *state;
        fds.read(store, fd, len).map_err(|e| e.on("read"))
    }

    /// Read at `offset` without moving the cursor
    pub fn read_at(&self, fd: Fd, offset: u64, len: usize) -> FsResult<Vec<u8>> {
        let mut state = self.state.lock();
        let State { store, fds, .. } = &mut *state;
        fds.read_at(store, fd, offset, len).map_err(|e| e.on("read"))
    }

    pub fn write(&self, fd: Fd, data: &[u8]) -> FsResult<usize> {
        debug!(component = COMPONENT, op = "write", fd = %fd, len = data.len());
        self.state.lock().write(fd, data).map_err(|e| e.on("write"))
    }

    /// Write at `offset` without moving the cursor
    pub fn write_at(&self, fd: Fd, offset: u64, data: &[u8]) -> FsResult<usize> {
        debug!(component = COMPONENT, op = "write", fd = %fd, offset, len = data.len());
        let mut state = self.state.lock();
        let State { store, fds, .. } = &mut *state;
        fds.write_at(store, fd, offset, data).map_err(|e| e.on("write"))
    }

    pub fn seek(&self, fd: Fd, pos: SeekFrom) -> FsResult<u64> {
        let mut state = self.state.lock();
        let State { store, fds, .. } = &mut *state;
        fds.seek(store, fd, pos).map_err(|e| e.on("seek"))
    }

    /// Whole-file read. A path is read from offset 0; a descriptor or handle
    /// from its cursor to the end.
    pub fn read_file<'a>(
        &self,
        target: impl Into<FileRef<'a>>,
        options: &ReadFileOptions,
    ) -> FsResult<FileData> {
        let mut state = self.state.lock();
        let bytes = match target.into() {
            FileRef::Path(path) => state
                .with_opened(path, options.flag, self.config.modes.file, "read", State::read_to_end)
                .map_err(|(e, syscall)| e.at(syscall, path))?,
            FileRef::Fd(fd) => state.read_to_end(fd).map_err(|e| e.on("read"))?,
            FileRef::Handle(handle) => state.read_to_end(handle.fd()).map_err(|e| e.on("read"))?,
        };
        Ok(match options.encoding {
            Some(encoding) => FileData::Text(encoding.decode(&bytes)),
            None => FileData::Bytes(bytes),
        })
    }

    /// Replace a file's content (path form) or write at the cursor (descriptor form)
    pub fn write_file<'a>(
        &self,
        target: impl Into<FileRef<'a>>,
        data: impl Into<FileData>,
        options: &WriteFileOptions,
    ) -> FsResult<()> {
        let flags = options.flag.unwrap_or_else(OpenFlags::write_truncate);
        self.put_file("writeFile", target.into(), data.into(), flags, options)
    }

    /// Append to a file, creating it when absent
    pub fn append_file<'a>(
        &self,
        target: impl Into<FileRef<'a>>,
        data: impl Into<FileData>,
        options: &WriteFileOptions,
    ) -> FsResult<()> {
        let flags = options.flag.unwrap_or_else(OpenFlags::append);
        self.put_file("appendFile", target.into(), data.into(), flags, options)
    }

    fn put_file(
        &self,
        op: &'static str,
        target: FileRef<'_>,
        data: FileData,
        flags: OpenFlags,
        options: &WriteFileOptions,
    ) -> FsResult<()> {
        let encoding = options.encoding.unwrap_or_default();
        let mode = self.file_mode(options.mode);
        let mut state = self.state.lock();
        let fd = match target {
            FileRef::Path(path) => {
                debug!(component = COMPONENT, op, path, len = data.len());
                let bytes = data.encode(encoding).map_err(|e| e.at("write", path))?;
                return state
                    .with_opened(path, flags, mode, "write", |state, fd| state.write(fd, &bytes))
                    .map(|_| ())
                    .map_err(|(e, syscall)| e.at(syscall, path));
            }
            FileRef::Fd(fd) => fd,
            FileRef::Handle(handle) => handle.fd(),
        };
        debug!(component = COMPONENT, op, fd = %fd, len = data.len());
        let bytes = data.encode(encoding).map_err(|e| e.on("write"))?;
        state.write(fd, &bytes).map_err(|e| e.on("write"))?;
        Ok(())
    }

    /// Resize a file, zero-padding when it grows. Cursors are untouched.
    pub fn truncate(&self, path: &str, len: u64) -> FsResult<()> {
        debug!(component = COMPONENT, op = "truncate", path, len);
        self.state
            .lock()
            .truncate(path, len)
            .map_err(|e| e.at("truncate", path))
    }

    pub fn ftruncate(&self, fd: Fd, len: u64) -> FsResult<()> {
        debug!(component = COMPONENT, op = "ftruncate", fd = %fd, len);
        let mut state = self.state.lock();
        let inode = state.fds.get(fd).map_err(|e| e.on("ftruncate"))?.inode;
        state.resize(inode, len).map_err(|e| e.on("ftruncate"))
    }

    /// List a directory, sorted by name
    pub fn readdir(&self, path: &str, options: &ReaddirOptions) -> FsResult<Readdir> {
        self.state
            .lock()
            .readdir(path, options.with_file_types)
            .map_err(|e| e.at("scandir", path))
    }

    pub fn stat(&self, path: &str) -> FsResult<Stats> {
        self.state
            .lock()
            .stat(path, true)
            .map_err(|e| e.at("stat", path))
    }

    pub fn lstat(&self, path: &str) -> FsResult<Stats> {
        self.state
            .lock()
            .stat(path, false)
            .map_err(|e| e.at("lstat", path))
    }

    pub fn fstat(&self, fd: Fd) -> FsResult<Stats> {
        let state = self.state.lock();
        state
            .fds
            .get(fd)
            .and_then(|open| state.store.node(open.inode))
            .map(|node| node.stats())
            .map_err(|e| e.on("fstat"))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.state
            .lock()
            .resolve(path, true)
            .is_ok_and(|r| r.inode.is_some())
    }

    pub fn symlink(&self, target: &str, path: &str) -> FsResult<()> {
        debug!(component = COMPONENT, op = "symlink", path, link_target = target);
        self.state
            .lock()
            .symlink(target, path)
            .map_err(|e| e.at("symlink", path))
    }

    pub fn readlink(&self, path: &str) -> FsResult<String> {
        self.state
            .lock()
            .readlink(path)
            .map_err(|e| e.at("readlink", path))
    }

    /// Hard link `new_path` to the inode at `existing`
    pub fn link(&self, existing: &str, new_path: &str) -> FsResult<()> {
        debug!(component = COMPONENT, op = "link", path = existing, new_path);
        self.state
            .lock()
            .link(existing, new_path)
            .map_err(|e| e.at("link", existing))
    }

    pub fn rename(&self, old_path: &str, new_path: &str) -> FsResult<()> {
        debug!(component = COMPONENT, op = "rename", path = old_path, new_path);
        self.state
            .lock()
            .rename(old_path, new_path)
            .map_err(|e| e.at("rename", old_path))
    }

    pub fn chmod(&self, path: &str, mode: u32) -> FsResult<()> {
        debug!(component = COMPONENT, op = "chmod", path, mode);
        self.state
            .lock()
            .chmod(path, mode)
            .map_err(|e| e.at("chmod", path))
    }

    /// Absolute path with every symlink resolved
    pub fn realpath(&self, path: &str) -> FsResult<String> {
        let state = self.state.lock();
        let resolved = state
            .resolve(path, true)
            .and_then(|r| r.existing().map(|_| r))
            .map_err(|e| e.at("realpath", path))?;
        Ok(state.resolver().canonical(&resolved))
    }
}

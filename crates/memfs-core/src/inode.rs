// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Inode store and directory tree
//!
//! The store owns every inode reachable from any mounted root. Directory
//! entries live inside their directory inode and keep insertion order.
//! Directories are never hard-linked, so the entry graph stays a tree;
//! symlinks are plain inodes whose cycles are the resolver's problem.
//!
//! An inode is dropped from the store once its link count is zero and no
//! open descriptor pins it.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::time::SystemTime;

use crate::error::{CodeResult, ErrorCode};
use crate::types::{FileKind, FileTimes, InodeId, Stats};

/// Inode payload
#[derive(Clone, Debug)]
pub(crate) enum InodeData {
    File(Vec<u8>),
    Directory(IndexMap<String, InodeId>),
    Symlink(String),
}

/// Content and metadata for one file, directory or symlink
#[derive(Clone, Debug)]
pub struct Inode {
    id: InodeId,
    pub(crate) data: InodeData,
    mode: u32,
    nlink: u32,
    pins: u32,
    /// Containing directory; only tracked for directories
    parent: Option<InodeId>,
    pub(crate) times: FileTimes,
}

impl Inode {
    fn new(id: InodeId, data: InodeData, mode: u32) -> Self {
        Self {
            id,
            data,
            mode: mode & 0o7777,
            nlink: 0,
            pins: 0,
            parent: None,
            times: FileTimes::now(),
        }
    }

    pub fn id(&self) -> InodeId {
        self.id
    }

    pub fn kind(&self) -> FileKind {
        match self.data {
            InodeData::File(_) => FileKind::File,
            InodeData::Directory(_) => FileKind::Directory,
            InodeData::Symlink(_) => FileKind::Symlink,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.data, InodeData::Directory(_))
    }

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn nlink(&self) -> u32 {
        self.nlink
    }

    pub fn times(&self) -> FileTimes {
        self.times
    }

    /// Byte length for files and symlinks, entry count for directories
    pub fn size(&self) -> u64 {
        match &self.data {
            InodeData::File(bytes) => bytes.len() as u64,
            InodeData::Directory(children) => children.len() as u64,
            InodeData::Symlink(target) => target.len() as u64,
        }
    }

    pub fn symlink_target(&self) -> Option<&str> {
        match &self.data {
            InodeData::Symlink(target) => Some(target),
            _ => None,
        }
    }

    pub(crate) fn children(&self) -> CodeResult<&IndexMap<String, InodeId>> {
        match &self.data {
            InodeData::Directory(children) => Ok(children),
            _ => Err(ErrorCode::NotADirectory),
        }
    }

    /// File bytes; directories fail `EISDIR`
    pub(crate) fn bytes(&self) -> CodeResult<&Vec<u8>> {
        match &self.data {
            InodeData::File(bytes) => Ok(bytes),
            InodeData::Directory(_) => Err(ErrorCode::IsADirectory),
            InodeData::Symlink(_) => Err(ErrorCode::InvalidArgument),
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> CodeResult<&mut Vec<u8>> {
        match &mut self.data {
            InodeData::File(bytes) => Ok(bytes),
            InodeData::Directory(_) => Err(ErrorCode::IsADirectory),
            InodeData::Symlink(_) => Err(ErrorCode::InvalidArgument),
        }
    }

    pub(crate) fn set_mode(&mut self, mode: u32) {
        self.mode = mode & 0o7777;
        self.touch_changed();
    }

    pub(crate) fn touch_accessed(&mut self) {
        self.times.atime = SystemTime::now();
    }

    pub(crate) fn touch_changed(&mut self) {
        self.times.ctime = SystemTime::now();
    }

    pub(crate) fn touch_modified(&mut self) {
        let now = SystemTime::now();
        self.times.mtime = now;
        self.times.ctime = now;
    }

    pub fn stats(&self) -> Stats {
        let kind = self.kind();
        Stats {
            ino: self.id,
            kind,
            mode: kind.type_bits() | self.mode,
            nlink: self.nlink,
            size: self.size(),
            times: self.times,
        }
    }
}

/// Owner of all inodes; may back several mounted roots
#[derive(Debug)]
pub struct InodeStore {
    inodes: HashMap<InodeId, Inode>,
    next_id: u64,
}

impl Default for InodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InodeStore {
    pub fn new() -> Self {
        Self::with_id_base(1)
    }

    /// Store whose ids start at `base`, for hosts that share an id space
    pub fn with_id_base(base: u64) -> Self {
        Self {
            inodes: HashMap::new(),
            next_id: base,
        }
    }

    fn allocate_id(&mut self) -> InodeId {
        let id = InodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(&mut self, data: InodeData, mode: u32) -> InodeId {
        let id = self.allocate_id();
        self.inodes.insert(id, Inode::new(id, data, mode));
        id
    }

    /// Unattached directory usable as a mount root; its link count stands
    /// for the mount reference
    pub fn create_root(&mut self, mode: u32) -> InodeId {
        let id = self.insert(InodeData::Directory(IndexMap::new()), mode);
        if let Some(root) = self.inodes.get_mut(&id) {
            root.nlink = 1;
        }
        id
    }

    pub fn create_directory(&mut self, dir: InodeId, name: &str, mode: u32) -> CodeResult<InodeId> {
        self.ensure_free(dir, name)?;
        let id = self.insert(InodeData::Directory(IndexMap::new()), mode);
        self.link(dir, name, id)?;
        Ok(id)
    }

    pub fn create_file(
        &mut self,
        dir: InodeId,
        name: &str,
        mode: u32,
        content: Vec<u8>,
    ) -> CodeResult<InodeId> {
        self.ensure_free(dir, name)?;
        let id = self.insert(InodeData::File(content), mode);
        self.link(dir, name, id)?;
        Ok(id)
    }

    pub fn create_symlink(&mut self, dir: InodeId, name: &str, target: &str) -> CodeResult<InodeId> {
        self.ensure_free(dir, name)?;
        let id = self.insert(InodeData::Symlink(target.to_string()), 0o777);
        self.link(dir, name, id)?;
        Ok(id)
    }

    pub fn get(&self, id: InodeId) -> Option<&Inode> {
        self.inodes.get(&id)
    }

    /// Inode that must be present; a dangling id reads as `ENOENT`
    pub(crate) fn node(&self, id: InodeId) -> CodeResult<&Inode> {
        self.inodes.get(&id).ok_or(ErrorCode::NotFound)
    }

    pub(crate) fn node_mut(&mut self, id: InodeId) -> CodeResult<&mut Inode> {
        self.inodes.get_mut(&id).ok_or(ErrorCode::NotFound)
    }

    pub fn contains(&self, id: InodeId) -> bool {
        self.inodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    pub fn lookup(&self, dir: InodeId, name: &str) -> CodeResult<Option<InodeId>> {
        Ok(self.node(dir)?.children()?.get(name).copied())
    }

    /// Entries of `dir` in insertion order
    pub fn entries(&self, dir: InodeId) -> CodeResult<Vec<(String, InodeId)>> {
        Ok(self
            .node(dir)?
            .children()?
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect())
    }

    /// Containing directory of a directory inode
    pub fn parent_of(&self, dir: InodeId) -> Option<InodeId> {
        self.inodes.get(&dir).and_then(|node| node.parent)
    }

    /// Name under which a directory is bound in its parent
    pub(crate) fn name_in_parent(&self, dir: InodeId) -> Option<String> {
        let parent = self.parent_of(dir)?;
        self.inodes
            .get(&parent)?
            .children()
            .ok()?
            .iter()
            .find(|(_, id)| **id == dir)
            .map(|(name, _)| name.clone())
    }

    fn ensure_free(&self, dir: InodeId, name: &str) -> CodeResult<()> {
        if self.lookup(dir, name)?.is_some() {
            return Err(ErrorCode::AlreadyExists);
        }
        Ok(())
    }

    /// Bind `name` in `dir` to `child`, incrementing the child's link count
    pub fn link(&mut self, dir: InodeId, name: &str, child: InodeId) -> CodeResult<()> {
        let child_node = self.node(child)?;
        if child_node.is_dir() && child_node.nlink > 0 {
            return Err(ErrorCode::NotPermitted);
        }
        let child_is_dir = child_node.is_dir();

        let parent = self.node_mut(dir)?;
        let InodeData::Directory(children) = &mut parent.data else {
            return Err(ErrorCode::NotADirectory);
        };
        if children.contains_key(name) {
            return Err(ErrorCode::AlreadyExists);
        }
        children.insert(name.to_string(), child);
        parent.touch_modified();

        let child_node = self.node_mut(child)?;
        child_node.nlink = child_node.nlink.saturating_add(1);
        child_node.touch_changed();
        if child_is_dir {
            child_node.parent = Some(dir);
        }
        Ok(())
    }

    /// Remove the entry `name` from `dir`, dropping the inode if nothing
    /// references or pins it any more. Non-empty directories are refused.
    pub fn unlink(&mut self, dir: InodeId, name: &str) -> CodeResult<InodeId> {
        let child = self.lookup(dir, name)?.ok_or(ErrorCode::NotFound)?;
        if let InodeData::Directory(grandchildren) = &self.node(child)?.data {
            if !grandchildren.is_empty() {
                return Err(ErrorCode::NotEmpty);
            }
        }

        let parent = self.node_mut(dir)?;
        if let InodeData::Directory(children) = &mut parent.data {
            children.shift_remove(name);
        }
        parent.touch_modified();

        let child_node = self.node_mut(child)?;
        child_node.nlink = child_node.nlink.saturating_sub(1);
        child_node.touch_changed();
        if child_node.is_dir() {
            child_node.parent = None;
        }
        self.release_if_orphaned(child);
        Ok(child)
    }

    /// Move an entry without touching link counts (rename)
    pub(crate) fn move_entry(
        &mut self,
        from_dir: InodeId,
        from_name: &str,
        to_dir: InodeId,
        to_name: &str,
    ) -> CodeResult<InodeId> {
        let child = self.lookup(from_dir, from_name)?.ok_or(ErrorCode::NotFound)?;
        self.ensure_free(to_dir, to_name)?;

        let source = self.node_mut(from_dir)?;
        if let InodeData::Directory(children) = &mut source.data {
            children.shift_remove(from_name);
        }
        source.touch_modified();

        let target = self.node_mut(to_dir)?;
        if let InodeData::Directory(children) = &mut target.data {
            children.insert(to_name.to_string(), child);
        }
        target.touch_modified();

        let node = self.node_mut(child)?;
        node.touch_changed();
        if node.is_dir() {
            node.parent = Some(to_dir);
        }
        Ok(child)
    }

    /// Keep an inode alive while a descriptor refers to it
    pub(crate) fn pin(&mut self, id: InodeId) {
        if let Some(node) = self.inodes.get_mut(&id) {
            node.pins = node.pins.saturating_add(1);
        }
    }

    pub(crate) fn unpin(&mut self, id: InodeId) {
        if let Some(node) = self.inodes.get_mut(&id) {
            node.pins = node.pins.saturating_sub(1);
        }
        self.release_if_orphaned(id);
    }

    fn release_if_orphaned(&mut self, id: InodeId) -> bool {
        let orphaned = self
            .inodes
            .get(&id)
            .is_some_and(|node| node.nlink == 0 && node.pins == 0);
        if orphaned {
            self.inodes.remove(&id);
        }
        orphaned
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! File descriptor table
//!
//! Each slot holds an open file: the inode it pins, its open flags and an
//! independent cursor. Descriptors are the smallest free slot index.

use std::io::SeekFrom;

use crate::error::{CodeResult, ErrorCode};
use crate::inode::InodeStore;
use crate::types::{Fd, InodeId, OpenFlags};

#[derive(Clone, Debug)]
pub(crate) struct OpenFile {
    pub inode: InodeId,
    pub flags: OpenFlags,
    pub position: u64,
}

#[derive(Debug)]
pub(crate) struct FdTable {
    slots: Vec<Option<OpenFile>>,
    limit: usize,
    max_file_size: u64,
}

impl FdTable {
    pub fn new(limit: usize, max_file_size: u64) -> Self {
        Self {
            slots: Vec::new(),
            limit,
            max_file_size,
        }
    }

    /// Largest length any write through this table may grow a file to
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn has_capacity(&self) -> bool {
        self.len() < self.limit
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn open_fds(&self) -> Vec<Fd> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .map(|(index, _)| Fd(index as u32))
            .collect()
    }

    /// Pin `inode` and hand out the lowest unused descriptor
    pub fn allocate(&mut self, store: &mut InodeStore, inode: InodeId, flags: OpenFlags) -> CodeResult<Fd> {
        if !self.has_capacity() {
            return Err(ErrorCode::TooManyOpenFiles);
        }
        let open = OpenFile {
            inode,
            flags,
            position: 0,
        };
        let index = match self.slots.iter().position(Option::is_none) {
            Some(index) => {
                self.slots[index] = Some(open);
                index
            }
            None => {
                self.slots.push(Some(open));
                self.slots.len() - 1
            }
        };
        store.pin(inode);
        Ok(Fd(index as u32))
    }

    pub fn get(&self, fd: Fd) -> CodeResult<&OpenFile> {
        self.slots
            .get(fd.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(ErrorCode::BadDescriptor)
    }

    pub fn get_mut(&mut self, fd: Fd) -> CodeResult<&mut OpenFile> {
        self.slots
            .get_mut(fd.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(ErrorCode::BadDescriptor)
    }

    /// Free the slot and unpin its inode, which may drop an unlinked file
    pub fn release(&mut self, store: &mut InodeStore, fd: Fd) -> CodeResult<InodeId> {
        let open = self
            .slots
            .get_mut(fd.0 as usize)
            .and_then(Option::take)
            .ok_or(ErrorCode::BadDescriptor)?;
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        store.unpin(open.inode);
        Ok(open.inode)
    }

    /// Read up to `len` bytes at the cursor and advance it
    pub fn read(&mut self, store: &mut InodeStore, fd: Fd, len: usize) -> CodeResult<Vec<u8>> {
        let open = self.readable(fd)?;
        let (inode, position) = (open.inode, open.position);
        let chunk = read_inode(store, inode, position, len)?;
        self.get_mut(fd)?.position = position + chunk.len() as u64;
        Ok(chunk)
    }

    /// Positional read; the cursor does not move
    pub fn read_at(
        &self,
        store: &mut InodeStore,
        fd: Fd,
        offset: u64,
        len: usize,
    ) -> CodeResult<Vec<u8>> {
        let inode = self.readable(fd)?.inode;
        read_inode(store, inode, offset, len)
    }

    /// Write at the cursor (or end of content in append mode) and advance it
    pub fn write(&mut self, store: &mut InodeStore, fd: Fd, data: &[u8]) -> CodeResult<usize> {
        let open = self.writable(fd)?;
        let (inode, append, position) = (open.inode, open.flags.append, open.position);
        let offset = if append {
            store.node(inode)?.bytes()?.len() as u64
        } else {
            position
        };
        let end = write_inode(store, inode, offset, data, self.max_file_size)?;
        self.get_mut(fd)?.position = end;
        Ok(data.len())
    }

    /// Positional write; the cursor does not move. Append mode still
    /// writes at the end of content.
    pub fn write_at(
        &self,
        store: &mut InodeStore,
        fd: Fd,
        offset: u64,
        data: &[u8],
    ) -> CodeResult<usize> {
        let open = self.writable(fd)?;
        let offset = if open.flags.append {
            store.node(open.inode)?.bytes()?.len() as u64
        } else {
            offset
        };
        write_inode(store, open.inode, offset, data, self.max_file_size)?;
        Ok(data.len())
    }

    /// Move the cursor; positions past the end are allowed
    pub fn seek(&mut self, store: &InodeStore, fd: Fd, pos: SeekFrom) -> CodeResult<u64> {
        let open = self.get(fd)?;
        let base = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => open.position.checked_add_signed(delta),
            SeekFrom::End(delta) => store.node(open.inode)?.size().checked_add_signed(delta),
        };
        let position = base.ok_or(ErrorCode::InvalidArgument)?;
        self.get_mut(fd)?.position = position;
        Ok(position)
    }

    fn readable(&self, fd: Fd) -> CodeResult<&OpenFile> {
        let open = self.get(fd)?;
        if !open.flags.read {
            return Err(ErrorCode::BadDescriptor);
        }
        Ok(open)
    }

    fn writable(&self, fd: Fd) -> CodeResult<&OpenFile> {
        let open = self.get(fd)?;
        if !open.flags.write {
            return Err(ErrorCode::BadDescriptor);
        }
        Ok(open)
    }
}

fn read_inode(store: &mut InodeStore, inode: InodeId, offset: u64, len: usize) -> CodeResult<Vec<u8>> {
    let node = store.node_mut(inode)?;
    let chunk = read_span(node.bytes()?, offset, len);
    node.touch_accessed();
    Ok(chunk)
}

fn write_inode(
    store: &mut InodeStore,
    inode: InodeId,
    offset: u64,
    data: &[u8],
    max_len: u64,
) -> CodeResult<u64> {
    let node = store.node_mut(inode)?;
    let end = write_span(node.bytes_mut()?, offset, data, max_len)?;
    node.touch_modified();
    Ok(end)
}

/// Bytes in `[offset, offset + len)` clamped to the buffer
pub(crate) fn read_span(content: &[u8], offset: u64, len: usize) -> Vec<u8> {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(content.len());
    let end = start.saturating_add(len).min(content.len());
    content[start..end].to_vec()
}

/// Copy `data` in at `offset`, zero-filling any gap past the current end.
/// Returns the offset just past the written bytes.
pub(crate) fn write_span(
    content: &mut Vec<u8>,
    offset: u64,
    data: &[u8],
    max_len: u64,
) -> CodeResult<u64> {
    let end = offset
        .checked_add(data.len() as u64)
        .ok_or(ErrorCode::InvalidArgument)?;
    let stop = bounded_len(end, max_len)?;
    if content.len() < stop {
        resize_span(content, end, max_len)?;
    }
    content[stop - data.len()..stop].copy_from_slice(data);
    Ok(end)
}

/// Truncate or zero-extend `content` to exactly `len` bytes
pub(crate) fn resize_span(content: &mut Vec<u8>, len: u64, max_len: u64) -> CodeResult<()> {
    let len = bounded_len(len, max_len)?;
    if len > content.len() {
        content
            .try_reserve_exact(len - content.len())
            .map_err(|_| ErrorCode::InvalidArgument)?;
    }
    content.resize(len, 0);
    Ok(())
}

fn bounded_len(len: u64, max_len: u64) -> CodeResult<usize> {
    if len > max_len {
        return Err(ErrorCode::InvalidArgument);
    }
    usize::try_from(len).map_err(|_| ErrorCode::InvalidArgument)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (InodeStore, InodeId, FdTable) {
        let mut store = InodeStore::new();
        let root = store.create_root(0o755);
        let file = store.create_file(root, "f", 0o644, b"hello".to_vec()).unwrap();
        (store, file, FdTable::new(16, 1 << 20))
    }

    #[test]
    fn test_lowest_free_descriptor_is_reused() {
        let (mut store, file, mut fds) = setup();
        let a = fds.allocate(&mut store, file, OpenFlags::read_only()).unwrap();
        let b = fds.allocate(&mut store, file, OpenFlags::read_only()).unwrap();
        let c = fds.allocate(&mut store, file, OpenFlags::read_only()).unwrap();
        assert_eq!((a, b, c), (Fd(0), Fd(1), Fd(2)));

        fds.release(&mut store, b).unwrap();
        assert_eq!(fds.get(b).unwrap_err(), ErrorCode::BadDescriptor);
        let d = fds.allocate(&mut store, file, OpenFlags::read_only()).unwrap();
        assert_eq!(d, Fd(1));
        assert_eq!(fds.open_fds(), vec![Fd(0), Fd(1), Fd(2)]);
    }

    #[test]
    fn test_limit() {
        let (mut store, file, _) = setup();
        let mut fds = FdTable::new(1, 1 << 20);
        fds.allocate(&mut store, file, OpenFlags::read_only()).unwrap();
        assert_eq!(
            fds.allocate(&mut store, file, OpenFlags::read_only()),
            Err(ErrorCode::TooManyOpenFiles)
        );
    }

    #[test]
    fn test_reads_clamp_and_advance() {
        let (mut store, file, mut fds) = setup();
        let fd = fds.allocate(&mut store, file, OpenFlags::read_only()).unwrap();

        assert_eq!(fds.read(&mut store, fd, 3).unwrap(), b"hel");
        assert_eq!(fds.read(&mut store, fd, 10).unwrap(), b"lo");
        assert!(fds.read(&mut store, fd, 10).unwrap().is_empty());
        assert_eq!(fds.read_at(&mut store, fd, 1, 2).unwrap(), b"el");
        assert_eq!(fds.get(fd).unwrap().position, 5);
    }

    #[test]
    fn test_independent_cursors_share_content() {
        let (mut store, file, mut fds) = setup();
        let writer = fds.allocate(&mut store, file, OpenFlags::read_write()).unwrap();
        let reader = fds.allocate(&mut store, file, OpenFlags::read_only()).unwrap();

        fds.write(&mut store, writer, b"J").unwrap();
        assert_eq!(fds.read(&mut store, reader, 5).unwrap(), b"Jello");
        assert_eq!(fds.get(writer).unwrap().position, 1);
    }

    #[test]
    fn test_write_past_end_zero_fills() {
        let (mut store, file, mut fds) = setup();
        let fd = fds.allocate(&mut store, file, OpenFlags::read_write()).unwrap();
        fds.seek(&store, fd, SeekFrom::Start(7)).unwrap();
        fds.write(&mut store, fd, b"!").unwrap();
        assert_eq!(store.get(file).unwrap().bytes().unwrap(), b"hello\0\0!");
    }

    #[test]
    fn test_append_ignores_cursor() {
        let (mut store, file, mut fds) = setup();
        let fd = fds.allocate(&mut store, file, OpenFlags::append()).unwrap();
        fds.write(&mut store, fd, b" world").unwrap();
        fds.write_at(&mut store, fd, 0, b"!").unwrap();
        assert_eq!(store.get(file).unwrap().bytes().unwrap(), b"hello world!");
        assert_eq!(fds.get(fd).unwrap().position, 11);
    }

    #[test]
    fn test_mode_checks() {
        let (mut store, file, mut fds) = setup();
        let ro = fds.allocate(&mut store, file, OpenFlags::read_only()).unwrap();
        let wo = fds.allocate(&mut store, file, OpenFlags::write_truncate()).unwrap();
        assert_eq!(fds.write(&mut store, ro, b"x"), Err(ErrorCode::BadDescriptor));
        assert_eq!(fds.read(&mut store, wo, 1), Err(ErrorCode::BadDescriptor));
        assert_eq!(
            fds.seek(&store, ro, SeekFrom::Current(-1)),
            Err(ErrorCode::InvalidArgument)
        );
    }

    #[test]
    fn test_release_drops_unlinked_inode() {
        let (mut store, file, mut fds) = setup();
        let root = InodeId(1);
        let fd = fds.allocate(&mut store, file, OpenFlags::read_only()).unwrap();
        store.unlink(root, "f").unwrap();
        assert_eq!(fds.read(&mut store, fd, 5).unwrap(), b"hello");

        fds.release(&mut store, fd).unwrap();
        assert!(!store.contains(file));
        assert_eq!(fds.release(&mut store, fd), Err(ErrorCode::BadDescriptor));
    }

    #[test]
    fn test_spans() {
        assert_eq!(read_span(b"abc", 10, 4), b"");
        let mut buf = Vec::new();
        assert_eq!(write_span(&mut buf, 2, b"x", 16), Ok(3));
        assert_eq!(buf, b"\0\0x");

        assert_eq!(write_span(&mut buf, 15, b"ab", 16), Err(ErrorCode::InvalidArgument));
        assert_eq!(resize_span(&mut buf, 17, 16), Err(ErrorCode::InvalidArgument));
        assert_eq!(buf, b"\0\0x");
        resize_span(&mut buf, 1, 16).unwrap();
        assert_eq!(buf, b"\0");
    }

    #[test]
    fn test_writes_near_offset_limit_fail_cleanly() {
        let (mut store, file, mut fds) = setup();
        let fd = fds.allocate(&mut store, file, OpenFlags::read_write()).unwrap();

        assert_eq!(fds.seek(&store, fd, SeekFrom::Start(u64::MAX)), Ok(u64::MAX));
        assert_eq!(fds.write(&mut store, fd, b"x"), Err(ErrorCode::InvalidArgument));
        assert_eq!(
            fds.write_at(&mut store, fd, u64::MAX - 1, b"xyz"),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(
            fds.write_at(&mut store, fd, 1 << 20, b"x"),
            Err(ErrorCode::InvalidArgument)
        );
        assert_eq!(fds.get(fd).unwrap().position, u64::MAX);
        assert_eq!(store.get(file).unwrap().bytes().unwrap(), b"hello");
    }
}

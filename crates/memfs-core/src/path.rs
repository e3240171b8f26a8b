// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Path resolution against a mount root

use std::collections::VecDeque;

use tracing::trace;

use crate::error::{CodeResult, ErrorCode};
use crate::inode::InodeStore;
use crate::types::{FileKind, InodeId};

/// Outcome of a walk: the directory holding the final name and, when
/// present, the inode bound to it. The mount root resolves with an empty name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub dir: InodeId,
    pub name: String,
    pub inode: Option<InodeId>,
}

impl Resolved {
    pub fn is_root(&self) -> bool {
        self.name.is_empty()
    }

    pub fn existing(&self) -> CodeResult<InodeId> {
        self.inode.ok_or(ErrorCode::NotFound)
    }
}

/// Path segments with empty and `.` components dropped
pub(crate) fn segments(path: &str) -> impl DoubleEndedIterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty() && *s != ".")
}

pub(crate) struct Resolver<'a> {
    store: &'a InodeStore,
    root: InodeId,
    max_hops: u32,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a InodeStore, root: InodeId, max_hops: u32) -> Self {
        Self {
            store,
            root,
            max_hops,
        }
    }

    /// Walk `path` from the root. Intermediate symlinks are always followed;
    /// a symlink in final position only when `follow` is set. A trailing
    /// `/`, `.` or `..` demands a directory at the end and follows it.
    pub fn resolve(&self, path: &str, follow: bool) -> CodeResult<Resolved> {
        let wants_dir = matches!(path.rsplit('/').next(), Some("" | "." | ".."));
        let resolved = self.walk(path, follow || wants_dir)?;
        if wants_dir {
            if let Some(id) = resolved.inode {
                if !self.store.node(id)?.is_dir() {
                    return Err(ErrorCode::NotADirectory);
                }
            }
        }
        Ok(resolved)
    }

    fn walk(&self, path: &str, follow: bool) -> CodeResult<Resolved> {
        let mut pending: VecDeque<String> = segments(path).map(str::to_string).collect();
        let mut dir = self.root;
        let mut hops = 0u32;

        while let Some(segment) = pending.pop_front() {
            if segment == ".." {
                dir = self.parent(dir);
                continue;
            }
            let last = pending.is_empty();
            let Some(child) = self.store.lookup(dir, &segment)? else {
                if last {
                    return Ok(Resolved {
                        dir,
                        name: segment,
                        inode: None,
                    });
                }
                return Err(ErrorCode::NotFound);
            };

            let node = self.store.node(child)?;
            match node.kind() {
                FileKind::Directory if !last => dir = child,
                FileKind::File if !last => return Err(ErrorCode::NotADirectory),
                FileKind::Symlink if !last || follow => {
                    hops += 1;
                    if hops > self.max_hops {
                        return Err(ErrorCode::Loop);
                    }
                    let target = node.symlink_target().unwrap_or_default();
                    trace!(link = %segment, link_target = %target, hops, "following symlink");
                    if target.starts_with('/') {
                        dir = self.root;
                    }
                    for part in segments(target).rev() {
                        pending.push_front(part.to_string());
                    }
                }
                _ => {
                    return Ok(Resolved {
                        dir,
                        name: segment,
                        inode: Some(child),
                    })
                }
            }
        }

        Ok(self.entry_for(dir))
    }

    /// Canonical absolute path of a resolved location
    pub fn canonical(&self, resolved: &Resolved) -> String {
        let mut parts = self.names_to(resolved.dir);
        if !resolved.is_root() {
            parts.push(resolved.name.clone());
        }
        format!("/{}", parts.join("/"))
    }

    /// True when `ancestor` is `dir` or one of its parents below the root
    pub fn is_within(&self, dir: InodeId, ancestor: InodeId) -> bool {
        let mut current = dir;
        loop {
            if current == ancestor {
                return true;
            }
            if current == self.root {
                return false;
            }
            match self.store.parent_of(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    fn parent(&self, dir: InodeId) -> InodeId {
        if dir == self.root {
            return self.root;
        }
        self.store.parent_of(dir).unwrap_or(self.root)
    }

    fn names_to(&self, dir: InodeId) -> Vec<String> {
        let mut names = Vec::new();
        let mut current = dir;
        while current != self.root {
            match (self.store.name_in_parent(current), self.store.parent_of(current)) {
                (Some(name), Some(parent)) => {
                    names.push(name);
                    current = parent;
                }
                _ => break,
            }
        }
        names.reverse();
        names
    }

    /// Resolution result naming a directory reached through `..` or as the
    /// last real segment
    fn entry_for(&self, dir: InodeId) -> Resolved {
        if dir != self.root {
            if let (Some(parent), Some(name)) =
                (self.store.parent_of(dir), self.store.name_in_parent(dir))
            {
                return Resolved {
                    dir: parent,
                    name,
                    inode: Some(dir),
                };
            }
        }
        Resolved {
            dir: self.root,
            name: String::new(),
            inode: Some(self.root),
        }
    }
}

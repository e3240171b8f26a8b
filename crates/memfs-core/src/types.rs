// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for memfs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use crate::encoding::Encoding;
use crate::error::{CodeResult, ErrorCode};

/// Process-unique inode identity
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InodeId(pub u64);

impl fmt::Display for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Integer file descriptor
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fd(pub u32);

impl Fd {
    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inode type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

impl FileKind {
    pub fn is_file(&self) -> bool {
        matches!(self, FileKind::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, FileKind::Directory)
    }

    pub fn is_symlink(&self) -> bool {
        matches!(self, FileKind::Symlink)
    }

    /// `S_IF*` type bits for this kind
    pub fn type_bits(&self) -> u32 {
        match self {
            FileKind::File => libc::S_IFREG as u32,
            FileKind::Directory => libc::S_IFDIR as u32,
            FileKind::Symlink => libc::S_IFLNK as u32,
        }
    }
}

/// File timestamps
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileTimes {
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub birthtime: SystemTime,
}

impl FileTimes {
    pub fn now() -> Self {
        let now = SystemTime::now();
        Self {
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
        }
    }
}

/// Metadata snapshot returned by `stat`, `lstat` and `fstat`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Stats {
    pub ino: InodeId,
    pub kind: FileKind,
    /// Type bits combined with permission bits
    pub mode: u32,
    pub nlink: u32,
    /// Bytes for files and symlinks, entry count for directories
    pub size: u64,
    pub times: FileTimes,
}

impl Stats {
    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }

    pub fn permissions(&self) -> u32 {
        self.mode & 0o7777
    }
}

/// Typed directory entry; the kind is captured when the listing is built
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Dirent {
    pub name: String,
    pub kind: FileKind,
}

impl Dirent {
    pub fn new(name: impl Into<String>, kind: FileKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_directory(&self) -> bool {
        self.kind.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }
}

/// Result of `readdir`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readdir {
    Names(Vec<String>),
    Entries(Vec<Dirent>),
}

impl Readdir {
    pub fn len(&self) -> usize {
        match self {
            Readdir::Names(names) => names.len(),
            Readdir::Entries(entries) => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            Readdir::Names(names) => names.iter().map(String::as_str).collect(),
            Readdir::Entries(entries) => entries.iter().map(|e| e.name.as_str()).collect(),
        }
    }

    pub fn entries(&self) -> Option<&[Dirent]> {
        match self {
            Readdir::Names(_) => None,
            Readdir::Entries(entries) => Some(entries),
        }
    }
}

/// Open-mode flags
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub create: bool,
    pub exclusive: bool,
    pub truncate: bool,
}

impl OpenFlags {
    /// `r`
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Default::default()
        }
    }

    /// `r+`
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Default::default()
        }
    }

    /// `w`
    pub fn write_truncate() -> Self {
        Self {
            write: true,
            create: true,
            truncate: true,
            ..Default::default()
        }
    }

    /// `a`
    pub fn append() -> Self {
        Self {
            write: true,
            append: true,
            create: true,
            ..Default::default()
        }
    }

    pub fn with_exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }
}

impl FromStr for OpenFlags {
    type Err = ErrorCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let base = match s {
            "r" | "rs" | "sr" => Self::read_only(),
            "r+" | "rs+" | "sr+" => Self::read_write(),
            "w" | "wx" | "xw" => Self::write_truncate(),
            "w+" | "wx+" | "xw+" => Self {
                read: true,
                ..Self::write_truncate()
            },
            "a" | "ax" | "xa" | "as" | "sa" => Self::append(),
            "a+" | "ax+" | "xa+" | "as+" | "sa+" => Self {
                read: true,
                ..Self::append()
            },
            _ => return Err(ErrorCode::InvalidArgument),
        };
        Ok(if s.contains('x') {
            base.with_exclusive()
        } else {
            base
        })
    }
}

/// Options for `mkdir`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MkdirOptions {
    pub recursive: bool,
    pub mode: Option<u32>,
}

impl MkdirOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Default::default()
        }
    }
}

/// Options for `rmdir`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RmdirOptions {
    pub recursive: bool,
}

impl RmdirOptions {
    pub fn recursive() -> Self {
        Self { recursive: true }
    }
}

/// Options for `rm`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RmOptions {
    pub recursive: bool,
    pub force: bool,
}

impl RmOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            force: false,
        }
    }

    pub fn force() -> Self {
        Self {
            recursive: false,
            force: true,
        }
    }
}

/// Options for `readdir`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaddirOptions {
    pub with_file_types: bool,
}

impl ReaddirOptions {
    pub fn with_file_types() -> Self {
        Self {
            with_file_types: true,
        }
    }
}

/// Options for `readFile`
#[derive(Clone, Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReadFileOptions {
    /// Decode content to text when set
    pub encoding: Option<Encoding>,
    /// Flags used when the target is a path
    pub flag: OpenFlags,
}

impl Default for ReadFileOptions {
    fn default() -> Self {
        Self {
            encoding: None,
            flag: OpenFlags::read_only(),
        }
    }
}

impl ReadFileOptions {
    pub fn utf8() -> Self {
        Self::encoded(Encoding::Utf8)
    }

    pub fn encoded(encoding: Encoding) -> Self {
        Self {
            encoding: Some(encoding),
            ..Default::default()
        }
    }
}

/// Options for `writeFile` and `appendFile`
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WriteFileOptions {
    /// Encoding applied to text payloads (UTF-8 when unset)
    pub encoding: Option<Encoding>,
    /// Mode for a newly created file
    pub mode: Option<u32>,
    /// Overrides the operation's default flags when the target is a path
    pub flag: Option<OpenFlags>,
}

impl WriteFileOptions {
    pub fn encoded(encoding: Encoding) -> Self {
        Self {
            encoding: Some(encoding),
            ..Default::default()
        }
    }
}

// serde support for the flag strings used in option objects
impl<'de> Deserialize<'de> for OpenFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid open flags: {raw}")))
    }
}

/// Payload written to or read from a file
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FileData {
    Bytes(Vec<u8>),
    Text(String),
}

impl FileData {
    /// Bytes to store; text is encoded with `encoding`
    pub(crate) fn encode(&self, encoding: Encoding) -> CodeResult<Vec<u8>> {
        match self {
            FileData::Bytes(bytes) => Ok(bytes.clone()),
            FileData::Text(text) => encoding.encode(text),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileData::Text(text) => Some(text),
            FileData::Bytes(_) => None,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileData::Bytes(bytes) => bytes,
            FileData::Text(text) => text.into_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FileData::Bytes(bytes) => bytes.len(),
            FileData::Text(text) => text.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for FileData {
    fn from(value: &str) -> Self {
        FileData::Text(value.to_string())
    }
}

impl From<String> for FileData {
    fn from(value: String) -> Self {
        FileData::Text(value)
    }
}

impl From<&[u8]> for FileData {
    fn from(value: &[u8]) -> Self {
        FileData::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for FileData {
    fn from(value: &[u8; N]) -> Self {
        FileData::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for FileData {
    fn from(value: Vec<u8>) -> Self {
        FileData::Bytes(value)
    }
}

impl PartialEq<str> for FileData {
    fn eq(&self, other: &str) -> bool {
        match self {
            FileData::Text(text) => text == other,
            FileData::Bytes(bytes) => bytes.as_slice() == other.as_bytes(),
        }
    }
}

impl PartialEq<&str> for FileData {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

/// Open file token handed out by the promise convention
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileHandle {
    fd: Fd,
}

impl FileHandle {
    pub fn from_fd(fd: Fd) -> Self {
        Self { fd }
    }

    pub fn fd(&self) -> Fd {
        self.fd
    }
}

/// Target accepted by the read/write family: a path, a raw descriptor or a handle
#[derive(Clone, Copy, Debug)]
pub enum FileRef<'a> {
    Path(&'a str),
    Fd(Fd),
    Handle(&'a FileHandle),
}

impl<'a> From<&'a str> for FileRef<'a> {
    fn from(value: &'a str) -> Self {
        FileRef::Path(value)
    }
}

impl<'a> From<&'a String> for FileRef<'a> {
    fn from(value: &'a String) -> Self {
        FileRef::Path(value)
    }
}

impl From<Fd> for FileRef<'_> {
    fn from(value: Fd) -> Self {
        FileRef::Fd(value)
    }
}

impl<'a> From<&'a FileHandle> for FileRef<'a> {
    fn from(value: &'a FileHandle) -> Self {
        FileRef::Handle(value)
    }
}

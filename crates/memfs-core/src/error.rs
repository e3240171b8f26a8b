// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for the memfs engine
//!
//! Every failure carries an [`ErrorCode`] whose string form (`ENOENT`,
//! `ENOTDIR`, ...) is stable and meant to be matched on by callers. The
//! human-readable message is not part of the contract.

use std::fmt;
use std::io;

use serde::Serialize;

/// errno-style failure kind
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    #[error("ENOENT")]
    NotFound,
    #[error("ENOTDIR")]
    NotADirectory,
    #[error("EISDIR")]
    IsADirectory,
    #[error("ENOTEMPTY")]
    NotEmpty,
    #[error("EEXIST")]
    AlreadyExists,
    #[error("EBADF")]
    BadDescriptor,
    #[error("ELOOP")]
    Loop,
    #[error("EBUSY")]
    Busy,
    #[error("EPERM")]
    NotPermitted,
    #[error("EINVAL")]
    InvalidArgument,
    #[error("EMFILE")]
    TooManyOpenFiles,
}

impl ErrorCode {
    /// Stable string code, e.g. `"ENOENT"`
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "ENOENT",
            ErrorCode::NotADirectory => "ENOTDIR",
            ErrorCode::IsADirectory => "EISDIR",
            ErrorCode::NotEmpty => "ENOTEMPTY",
            ErrorCode::AlreadyExists => "EEXIST",
            ErrorCode::BadDescriptor => "EBADF",
            ErrorCode::Loop => "ELOOP",
            ErrorCode::Busy => "EBUSY",
            ErrorCode::NotPermitted => "EPERM",
            ErrorCode::InvalidArgument => "EINVAL",
            ErrorCode::TooManyOpenFiles => "EMFILE",
        }
    }

    /// Host errno value for this code
    pub fn errno(&self) -> i32 {
        match self {
            ErrorCode::NotFound => libc::ENOENT,
            ErrorCode::NotADirectory => libc::ENOTDIR,
            ErrorCode::IsADirectory => libc::EISDIR,
            ErrorCode::NotEmpty => libc::ENOTEMPTY,
            ErrorCode::AlreadyExists => libc::EEXIST,
            ErrorCode::BadDescriptor => libc::EBADF,
            ErrorCode::Loop => libc::ELOOP,
            ErrorCode::Busy => libc::EBUSY,
            ErrorCode::NotPermitted => libc::EPERM,
            ErrorCode::InvalidArgument => libc::EINVAL,
            ErrorCode::TooManyOpenFiles => libc::EMFILE,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "no such file or directory",
            ErrorCode::NotADirectory => "not a directory",
            ErrorCode::IsADirectory => "illegal operation on a directory",
            ErrorCode::NotEmpty => "directory not empty",
            ErrorCode::AlreadyExists => "file already exists",
            ErrorCode::BadDescriptor => "bad file descriptor",
            ErrorCode::Loop => "too many symbolic links encountered",
            ErrorCode::Busy => "resource busy or locked",
            ErrorCode::NotPermitted => "operation not permitted",
            ErrorCode::InvalidArgument => "invalid argument",
            ErrorCode::TooManyOpenFiles => "too many open files",
        }
    }

    /// Attach the failing syscall and path, producing the public error
    pub(crate) fn at(self, syscall: &'static str, path: impl Into<String>) -> FsError {
        FsError::new(self, syscall).with_path(path)
    }

    /// Attach only the failing syscall (descriptor-based calls)
    pub(crate) fn on(self, syscall: &'static str) -> FsError {
        FsError::new(self, syscall)
    }
}

/// Public filesystem error
#[derive(thiserror::Error, Clone, Debug, PartialEq, Eq)]
#[error("{}: {}, {}{}", .code.as_str(), .code.description(), .syscall, PathSuffix(.path.as_deref()))]
pub struct FsError {
    code: ErrorCode,
    syscall: &'static str,
    path: Option<String>,
}

impl FsError {
    pub fn new(code: ErrorCode, syscall: &'static str) -> Self {
        Self {
            code,
            syscall,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn syscall(&self) -> &'static str {
        self.syscall
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Shorthand for `self.code() == code`
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == code
    }
}

struct PathSuffix<'a>(Option<&'a str>);

impl fmt::Display for PathSuffix<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(path) => write!(f, " '{path}'"),
            None => Ok(()),
        }
    }
}

impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        io::Error::from_raw_os_error(e.code.errno())
    }
}

pub type FsResult<T> = Result<T, FsError>;

/// Result type used below the operation layer, before syscall context is known
pub(crate) type CodeResult<T> = Result<T, ErrorCode>;

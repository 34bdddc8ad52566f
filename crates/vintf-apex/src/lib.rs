//! Discovery of extra VINTF directories on a device.
//!
//! Updatable vendor packages (APEXes) can carry their own VINTF fragments.
//! This crate reads the package index through a pluggable `FileSystem`,
//! lists the directories those packages contribute, and reports whether the
//! index changed since a caller-supplied observation. `FileSystem::list_files`
//! enumerates the fragments inside those directories.

pub mod apex;
pub mod fs;
pub mod mock;

pub use apex::{Apex, ApexInfo, ApexInfoList, ApexScan, DirWatcher, VintfDirSource, APEX_INFO_FILE, VINTF_SUB_DIR};
pub use fs::{Dirmap, FileSystem, HostFileSystem, MissingError};
pub use mock::MemoryFileSystem;

use std::time::SystemTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("'{0}' not found")]
    NotFound(String),
    #[error("permission denied: '{0}'")]
    PermissionDenied(String),
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl FsError {
    pub(crate) fn from_io(path: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_owned()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_owned()),
            _ => Self::Io {
                path: path.to_owned(),
                source: err,
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum ApexError {
    #[error(transparent)]
    Fs(#[from] FsError),
    #[error("cannot read package index {path}: {source}")]
    ReadIndex {
        path: String,
        observed: SystemTime,
        source: FsError,
    },
    #[error("not a valid package index {path}: {source}")]
    InvalidIndex {
        path: String,
        observed: SystemTime,
        source: serde_json::Error,
    },
}

impl ApexError {
    /// Index mtime read before the failure, if the scan got that far.
    pub fn observed(&self) -> Option<SystemTime> {
        match self {
            Self::Fs(_) => None,
            Self::ReadIndex { observed, .. } | Self::InvalidIndex { observed, .. } => Some(*observed),
        }
    }
}

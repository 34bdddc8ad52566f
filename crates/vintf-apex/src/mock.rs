use crate::fs::FileSystem;
use crate::FsError;
use std::collections::{BTreeMap, BTreeSet};
use std::time::SystemTime;

/// In-memory file system with explicit contents, mtimes and denied paths.
#[derive(Debug, Clone, Default)]
pub struct MemoryFileSystem {
    files: BTreeMap<String, (String, SystemTime)>,
    denied: BTreeSet<String>,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_file(mut self, path: &str, contents: &str, modified: SystemTime) -> Self {
        self.set_file(path, contents, modified);
        self
    }

    /// Every access to `path` fails with permission denied.
    #[must_use]
    pub fn with_denied(mut self, path: &str) -> Self {
        self.denied.insert(path.to_owned());
        self
    }

    pub fn set_file(&mut self, path: &str, contents: &str, modified: SystemTime) {
        self.files
            .insert(path.to_owned(), (contents.to_owned(), modified));
    }

    pub fn remove(&mut self, path: &str) {
        self.files.remove(path);
    }

    fn entry(&self, path: &str) -> Result<&(String, SystemTime), FsError> {
        if self.denied.contains(path) {
            return Err(FsError::PermissionDenied(path.to_owned()));
        }
        self.files
            .get(path)
            .ok_or_else(|| FsError::NotFound(path.to_owned()))
    }
}

impl FileSystem for MemoryFileSystem {
    fn fetch(&self, path: &str) -> Result<String, FsError> {
        self.entry(path).map(|(contents, _)| contents.clone())
    }

    fn modified_time(&self, path: &str) -> Result<SystemTime, FsError> {
        self.entry(path).map(|(_, modified)| *modified)
    }

    /// Directories exist only through the files under them.
    fn list_files(&self, path: &str) -> Result<Vec<String>, FsError> {
        if self.denied.contains(path) {
            return Err(FsError::PermissionDenied(path.to_owned()));
        }
        let dir = if path.ends_with('/') {
            path.to_owned()
        } else {
            format!("{path}/")
        };
        let mut found = false;
        let mut names = Vec::new();
        for name in self.files.keys().filter_map(|file| file.strip_prefix(&dir)) {
            found = true;
            if !name.contains('/') {
                names.push(name.to_owned());
            }
        }
        if found {
            Ok(names)
        } else {
            Err(FsError::NotFound(path.to_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_direct_children_only() {
        let t = SystemTime::UNIX_EPOCH;
        let fs = MemoryFileSystem::new()
            .with_file("/apex/a/etc/vintf/manifest.toml", "", t)
            .with_file("/apex/a/etc/vintf/compat.toml", "", t)
            .with_file("/apex/a/etc/vintf/sub/nested.toml", "", t)
            .with_file("/apex/ab/etc/vintf/other.toml", "", t);
        assert_eq!(
            fs.list_files("/apex/a/etc/vintf/").unwrap(),
            ["compat.toml", "manifest.toml"]
        );
        assert_eq!(
            fs.list_files("/apex/a/etc/vintf").unwrap(),
            ["compat.toml", "manifest.toml"]
        );
        assert_eq!(fs.list_files("/apex/a/etc/vintf/sub").unwrap(), ["nested.toml"]);
        assert!(matches!(fs.list_files("/apex/c"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn denied_dir_cannot_be_listed() {
        let fs = MemoryFileSystem::new()
            .with_file("/odm/etc/vintf/manifest.toml", "", SystemTime::UNIX_EPOCH)
            .with_denied("/odm/etc/vintf/");
        assert!(matches!(
            fs.list_files("/odm/etc/vintf/"),
            Err(FsError::PermissionDenied(_))
        ));
    }
}

use crate::FsError;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::trace;

/// Read access to device paths.
pub trait FileSystem: Send + Sync {
    fn fetch(&self, path: &str) -> Result<String, FsError>;

    fn modified_time(&self, path: &str) -> Result<SystemTime, FsError>;

    /// Names of the regular files directly inside directory `path`, sorted.
    fn list_files(&self, path: &str) -> Result<Vec<String>, FsError>;
}

/// What an unmapped device path reads as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingError {
    #[default]
    NotFound,
    PermissionDenied,
}

impl MissingError {
    fn to_error(self, path: &str) -> FsError {
        match self {
            Self::NotFound => FsError::NotFound(path.to_owned()),
            Self::PermissionDenied => FsError::PermissionDenied(path.to_owned()),
        }
    }
}

/// Device path prefixes mapped onto host directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dirmap {
    entries: BTreeMap<String, PathBuf>,
}

impl Dirmap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map the whole device tree onto `root`.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        Self::new().with_entry("/", root)
    }

    #[must_use]
    pub fn with_entry(mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        self.insert(prefix, dir);
        self
    }

    pub fn insert(&mut self, prefix: impl Into<String>, dir: impl Into<PathBuf>) {
        self.entries.insert(prefix.into(), dir.into());
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_path()))
    }

    /// Host path for `path` under the longest matching prefix.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let (prefix, dir) = self
            .entries
            .iter()
            .filter(|(prefix, _)| covers(prefix, path))
            .max_by_key(|(prefix, _)| prefix.len())?;
        let rest = path[prefix.len()..].trim_start_matches('/');
        Some(if rest.is_empty() { dir.clone() } else { dir.join(rest) })
    }
}

/// `/system` covers `/system` and `/system/etc`, not `/systemext`.
fn covers(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => prefix.ends_with('/') || rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Reads device paths from a host directory tree.
#[derive(Debug, Clone)]
pub struct HostFileSystem {
    dirmap: Dirmap,
    missing_error: MissingError,
}

impl HostFileSystem {
    pub fn new(dirmap: Dirmap) -> Self {
        Self {
            dirmap,
            missing_error: MissingError::default(),
        }
    }

    #[must_use]
    pub fn with_missing_error(mut self, missing_error: MissingError) -> Self {
        self.missing_error = missing_error;
        self
    }

    pub fn dirmap(&self) -> &Dirmap {
        &self.dirmap
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, FsError> {
        let resolved = self
            .dirmap
            .resolve(path)
            .ok_or_else(|| self.missing_error.to_error(path))?;
        trace!("{path} -> {}", resolved.display());
        Ok(resolved)
    }
}

impl FileSystem for HostFileSystem {
    fn fetch(&self, path: &str) -> Result<String, FsError> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved).map_err(|e| FsError::from_io(path, e))
    }

    fn modified_time(&self, path: &str) -> Result<SystemTime, FsError> {
        let resolved = self.resolve(path)?;
        std::fs::metadata(&resolved)
            .and_then(|m| m.modified())
            .map_err(|e| FsError::from_io(path, e))
    }

    fn list_files(&self, path: &str) -> Result<Vec<String>, FsError> {
        let resolved = self.resolve(path)?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&resolved).map_err(|e| FsError::from_io(path, e))? {
            let entry = entry.map_err(|e| FsError::from_io(path, e))?;
            let file_type = entry.file_type().map_err(|e| FsError::from_io(path, e))?;
            if file_type.is_dir() {
                continue;
            }
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins() {
        let dirmap = Dirmap::rooted_at("/host/root").with_entry("/vendor/", "/host/vendor");
        assert_eq!(
            dirmap.resolve("/vendor/etc/vintf/manifest.toml"),
            Some(PathBuf::from("/host/vendor/etc/vintf/manifest.toml"))
        );
        assert_eq!(
            dirmap.resolve("/apex/apex-info-list.json"),
            Some(PathBuf::from("/host/root/apex/apex-info-list.json"))
        );
    }

    #[test]
    fn unmapped_path_is_not_found() {
        let fs = HostFileSystem::new(Dirmap::new().with_entry("/odm/", "/host/odm"));
        assert!(matches!(fs.fetch("/vendor/x"), Err(FsError::NotFound(p)) if p == "/vendor/x"));
        assert!(fs.dirmap().resolve("/odm").is_none());
        assert!(matches!(fs.list_files("/vendor/etc"), Err(FsError::NotFound(_))));
    }

    #[test]
    fn unmapped_path_uses_configured_error() {
        let fs = HostFileSystem::new(Dirmap::new()).with_missing_error(MissingError::PermissionDenied);
        assert!(matches!(
            fs.fetch("/vendor/x"),
            Err(FsError::PermissionDenied(p)) if p == "/vendor/x"
        ));
        assert!(matches!(
            fs.modified_time("/vendor/x"),
            Err(FsError::PermissionDenied(_))
        ));
        assert!(matches!(fs.list_files("/vendor"), Err(FsError::PermissionDenied(_))));
    }

    #[test]
    fn exact_prefix_maps_to_dir() {
        let dirmap = Dirmap::new().with_entry("/system", "/out/system");
        assert_eq!(dirmap.resolve("/system"), Some(PathBuf::from("/out/system")));
        assert_eq!(
            dirmap.resolve("/system/etc"),
            Some(PathBuf::from("/out/system/etc"))
        );
        assert_eq!(dirmap.resolve("/systemext/etc"), None);
    }
}

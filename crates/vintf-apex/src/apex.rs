use crate::fs::FileSystem;
use crate::{ApexError, FsError};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use tracing::{debug, error, warn};

/// Index of installed packages.
pub const APEX_INFO_FILE: &str = "/apex/apex-info-list.json";

/// Where a package keeps its VINTF fragments, relative to its mount point.
pub const VINTF_SUB_DIR: &str = "etc/vintf/";

const VENDOR_APEX_PREFIXES: [&str; 2] = ["/vendor/apex/", "/system/vendor/apex/"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApexInfo {
    pub module_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preinstalled_module_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_code: Option<u64>,
    #[serde(default)]
    pub is_factory: bool,
    #[serde(default)]
    pub is_active: bool,
}

impl ApexInfo {
    /// Active and preinstalled on a vendor partition.
    pub fn is_vendor_apex(&self) -> bool {
        self.is_active
            && self
                .preinstalled_module_path
                .as_deref()
                .is_some_and(|p| VENDOR_APEX_PREFIXES.iter().any(|prefix| p.starts_with(prefix)))
    }

    /// `/apex/<module>/etc/vintf/`
    pub fn vintf_dir(&self) -> String {
        format!("/apex/{}/{VINTF_SUB_DIR}", self.module_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApexInfoList {
    #[serde(default, rename = "apexInfo")]
    pub apex_info: Vec<ApexInfo>,
}

/// Result of one discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApexScan {
    pub dirs: Vec<String>,
    /// Index mtime seen by this pass; feed it back to `has_update`. `None`
    /// when the index could not be observed: keep the previous observation.
    pub observed: Option<SystemTime>,
}

/// A source of extra VINTF directories.
pub trait VintfDirSource {
    /// The mtime is observed before the index is read, so a failed read or
    /// parse still reports it through [`ApexError::observed`].
    fn device_vintf_dirs(&self, fs: &dyn FileSystem) -> Result<ApexScan, ApexError>;

    /// Whether the source changed since `last_observed`.
    fn has_update(&self, fs: &dyn FileSystem, last_observed: Option<SystemTime>) -> bool;
}

/// Reads the package index.
#[derive(Debug, Clone)]
pub struct Apex {
    index_path: String,
}

impl Default for Apex {
    fn default() -> Self {
        Self {
            index_path: APEX_INFO_FILE.to_owned(),
        }
    }
}

impl Apex {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_index_path(mut self, path: impl Into<String>) -> Self {
        self.index_path = path.into();
        self
    }

    pub fn index_path(&self) -> &str {
        &self.index_path
    }
}

impl VintfDirSource for Apex {
    fn device_vintf_dirs(&self, fs: &dyn FileSystem) -> Result<ApexScan, ApexError> {
        let observed = match fs.modified_time(&self.index_path) {
            Ok(mtime) => mtime,
            Err(FsError::NotFound(_)) => return Ok(ApexScan::default()),
            Err(e @ FsError::PermissionDenied(_)) => {
                warn!("skipping package VINTF directories: {e}");
                return Ok(ApexScan::default());
            }
            Err(e) => return Err(e.into()),
        };

        let text = match fs.fetch(&self.index_path) {
            Ok(text) => text,
            Err(FsError::NotFound(_)) => {
                return Ok(ApexScan {
                    dirs: Vec::new(),
                    observed: Some(observed),
                })
            }
            Err(source) => {
                return Err(ApexError::ReadIndex {
                    path: self.index_path.clone(),
                    observed,
                    source,
                })
            }
        };

        let list: ApexInfoList = serde_json::from_str(&text).map_err(|source| ApexError::InvalidIndex {
            path: self.index_path.clone(),
            observed,
            source,
        })?;

        let dirs: Vec<String> = list
            .apex_info
            .iter()
            .filter(|info| info.is_vendor_apex())
            .map(ApexInfo::vintf_dir)
            .collect();
        debug!("{} of {} packages contribute VINTF directories", dirs.len(), list.apex_info.len());

        Ok(ApexScan {
            dirs,
            observed: Some(observed),
        })
    }

    fn has_update(&self, fs: &dyn FileSystem, last_observed: Option<SystemTime>) -> bool {
        match fs.modified_time(&self.index_path) {
            Ok(mtime) => Some(mtime) != last_observed,
            Err(FsError::NotFound(_)) => false,
            Err(e) => {
                error!("cannot check {} for updates: {e}", self.index_path);
                false
            }
        }
    }
}

/// Owns the last observation for one source. Single writer: only
/// [`scan`](Self::scan) records a new observation.
#[derive(Debug, Clone, Default)]
pub struct DirWatcher<S = Apex> {
    source: S,
    last_observed: Option<SystemTime>,
}

impl<S: VintfDirSource> DirWatcher<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            last_observed: None,
        }
    }

    /// Rescan, recording the index mtime even when the index itself is
    /// unreadable. A scan that could not observe the index keeps the
    /// previous observation.
    pub fn scan(&mut self, fs: &dyn FileSystem) -> Result<Vec<String>, ApexError> {
        match self.source.device_vintf_dirs(fs) {
            Ok(scan) => {
                self.record(scan.observed);
                Ok(scan.dirs)
            }
            Err(e) => {
                self.record(e.observed());
                Err(e)
            }
        }
    }

    fn record(&mut self, observed: Option<SystemTime>) {
        if observed.is_some() {
            self.last_observed = observed;
        }
    }

    pub fn has_update(&self, fs: &dyn FileSystem) -> bool {
        self.source.has_update(fs, self.last_observed)
    }

    pub fn last_observed(&self) -> Option<SystemTime> {
        self.last_observed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFileSystem;
    use std::time::Duration;

    const INDEX: &str = r#"{
  "apexInfo": [
    {"moduleName": "com.vendor.camera", "preinstalledModulePath": "/vendor/apex/com.vendor.camera.apex", "isActive": true},
    {"moduleName": "com.vendor.old", "preinstalledModulePath": "/vendor/apex/com.vendor.old.apex", "isActive": false},
    {"moduleName": "com.android.art", "preinstalledModulePath": "/system/apex/com.android.art.apex", "isActive": true},
    {"moduleName": "com.vendor.legacy", "preinstalledModulePath": "/system/vendor/apex/com.vendor.legacy.apex", "isActive": true},
    {"moduleName": "com.vendor.nopath", "isActive": true}
  ]
}"#;

    fn at(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[test]
    fn lists_active_vendor_packages() {
        let fs = MemoryFileSystem::new().with_file(APEX_INFO_FILE, INDEX, at(100));
        let scan = Apex::new().device_vintf_dirs(&fs).unwrap();
        assert_eq!(
            scan.dirs,
            [
                "/apex/com.vendor.camera/etc/vintf/",
                "/apex/com.vendor.legacy/etc/vintf/"
            ]
        );
        assert_eq!(scan.observed, Some(at(100)));
    }

    #[test]
    fn missing_index_is_empty() {
        let scan = Apex::new()
            .device_vintf_dirs(&MemoryFileSystem::new())
            .unwrap();
        assert_eq!(scan, ApexScan::default());
        assert!(!Apex::new().has_update(&MemoryFileSystem::new(), None));
    }

    #[test]
    fn denied_index_is_tolerated() {
        let fs = MemoryFileSystem::new()
            .with_file(APEX_INFO_FILE, INDEX, at(1))
            .with_denied(APEX_INFO_FILE);
        assert_eq!(Apex::new().device_vintf_dirs(&fs).unwrap(), ApexScan::default());
        assert!(!Apex::new().has_update(&fs, None));
    }

    #[test]
    fn malformed_index_is_an_error() {
        let fs = MemoryFileSystem::new().with_file(APEX_INFO_FILE, "<apex-info-list/>", at(1));
        let err = Apex::new().device_vintf_dirs(&fs).unwrap_err();
        assert!(matches!(err, ApexError::InvalidIndex { .. }));
        assert_eq!(err.observed(), Some(at(1)));
    }

    #[test]
    fn watcher_keeps_observation_when_index_is_denied() {
        let fs = MemoryFileSystem::new().with_file(APEX_INFO_FILE, INDEX, at(5));
        let mut watcher = DirWatcher::new(Apex::new());
        watcher.scan(&fs).unwrap();

        let denied = fs.clone().with_denied(APEX_INFO_FILE);
        assert!(watcher.scan(&denied).unwrap().is_empty());
        assert_eq!(watcher.last_observed(), Some(at(5)));
        assert!(!watcher.has_update(&fs));
    }

    #[test]
    fn watcher_records_observation_of_malformed_index() {
        let mut fs = MemoryFileSystem::new().with_file(APEX_INFO_FILE, "<apex-info-list/>", at(7));
        let mut watcher = DirWatcher::new(Apex::new());
        assert!(matches!(watcher.scan(&fs), Err(ApexError::InvalidIndex { .. })));
        assert_eq!(watcher.last_observed(), Some(at(7)));
        assert!(!watcher.has_update(&fs));

        fs.set_file(APEX_INFO_FILE, INDEX, at(8));
        assert!(watcher.has_update(&fs));
        assert_eq!(watcher.scan(&fs).unwrap().len(), 2);
        assert!(!watcher.has_update(&fs));
    }

    #[test]
    fn watcher_keeps_observation_when_index_disappears() {
        let mut fs = MemoryFileSystem::new().with_file(APEX_INFO_FILE, INDEX, at(5));
        let mut watcher = DirWatcher::new(Apex::new());
        watcher.scan(&fs).unwrap();
        fs.remove(APEX_INFO_FILE);
        assert!(watcher.scan(&fs).unwrap().is_empty());
        assert_eq!(watcher.last_observed(), Some(at(5)));
    }

    #[test]
    fn update_compares_against_last_observation() {
        let mut fs = MemoryFileSystem::new().with_file(APEX_INFO_FILE, INDEX, at(5));
        let apex = Apex::new();
        let scan = apex.device_vintf_dirs(&fs).unwrap();
        assert!(!apex.has_update(&fs, scan.observed));
        assert!(apex.has_update(&fs, None));

        fs.set_file(APEX_INFO_FILE, INDEX, at(6));
        assert!(apex.has_update(&fs, scan.observed));

        fs.remove(APEX_INFO_FILE);
        assert!(!apex.has_update(&fs, scan.observed));
    }

    #[test]
    fn watcher_records_observation_on_scan() {
        let mut fs = MemoryFileSystem::new().with_file(APEX_INFO_FILE, INDEX, at(5));
        let mut watcher = DirWatcher::new(Apex::new());
        assert!(watcher.has_update(&fs));
        assert_eq!(watcher.scan(&fs).unwrap().len(), 2);
        assert_eq!(watcher.last_observed(), Some(at(5)));
        assert!(!watcher.has_update(&fs));

        fs.set_file(APEX_INFO_FILE, r#"{"apexInfo": []}"#, at(9));
        assert!(watcher.has_update(&fs));
        assert!(watcher.scan(&fs).unwrap().is_empty());
        assert!(!watcher.has_update(&fs));
    }

    #[test]
    fn custom_index_path() {
        let fs = MemoryFileSystem::new().with_file("/idx.json", INDEX, at(1));
        let apex = Apex::new().with_index_path("/idx.json");
        assert_eq!(apex.index_path(), "/idx.json");
        assert_eq!(apex.device_vintf_dirs(&fs).unwrap().dirs.len(), 2);
    }
}

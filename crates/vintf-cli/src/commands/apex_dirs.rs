use super::{json_pretty, EXIT_SUCCESS};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::time::SystemTime;
use vintf_apex::{Apex, Dirmap, FileSystem, FsError, HostFileSystem, VintfDirSource};

#[derive(Debug, Serialize)]
struct ApexDirsView {
    dirs: Vec<String>,
    index_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    changed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<Vec<String>>,
}

/// `PREFIX=DIR` for `--map`.
pub fn parse_mapping(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((prefix, dir)) if prefix.starts_with('/') && !dir.is_empty() => {
            Ok((prefix.to_owned(), PathBuf::from(dir)))
        }
        _ => Err(format!("expected '/DEVICE/PREFIX=HOST_DIR', got '{s}'")),
    }
}

fn build_dirmap(root: Option<PathBuf>, mappings: Vec<(String, PathBuf)>) -> Dirmap {
    let mut dirmap = root.map_or_else(Dirmap::new, Dirmap::rooted_at);
    for (prefix, dir) in mappings {
        dirmap.insert(prefix, dir);
    }
    if dirmap.is_empty() {
        dirmap = Dirmap::rooted_at("/");
    }
    dirmap
}

/// Full device paths of the fragments in `dirs`. A directory that does not
/// exist contributes nothing.
fn fragment_files(fs: &dyn FileSystem, dirs: &[String]) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    for dir in dirs {
        match fs.list_files(dir) {
            Ok(names) => out.extend(names.iter().map(|name| format!("{dir}{name}"))),
            Err(FsError::NotFound(_)) => {}
            Err(e) => return Err(format!("apex error: {e}")),
        }
    }
    Ok(out)
}

fn rfc3339(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).to_rfc3339()
}

pub fn run(
    root: Option<PathBuf>,
    mappings: Vec<(String, PathBuf)>,
    since: Option<&str>,
    files: bool,
    json: bool,
) -> Result<u8, String> {
    let since = since
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(SystemTime::from)
                .map_err(|e| format!("parse error: invalid --since '{s}': {e}"))
        })
        .transpose()?;

    let fs = HostFileSystem::new(build_dirmap(root, mappings));
    let apex = Apex::new();
    let scan = apex
        .device_vintf_dirs(&fs)
        .map_err(|e| format!("apex error: {e}"))?;
    let changed = since.map(|t| apex.has_update(&fs, Some(t)));
    let files = if files {
        Some(fragment_files(&fs, &scan.dirs)?)
    } else {
        None
    };

    let view = ApexDirsView {
        dirs: scan.dirs,
        index_modified: scan.observed.map(rfc3339),
        changed,
        files,
    };
    if json {
        println!("{}", json_pretty(&view)?);
    } else {
        for dir in &view.dirs {
            println!("{dir}");
        }
        match &view.index_modified {
            Some(t) => println!("index modified: {t}"),
            None => println!("index modified: (no index)"),
        }
        if let Some(changed) = view.changed {
            println!("changed since: {}", super::yes_no(changed));
        }
        for file in view.files.iter().flatten() {
            println!("  {file}");
        }
    }
    Ok(EXIT_SUCCESS)
}

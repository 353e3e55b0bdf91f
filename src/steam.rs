use crate::lookup;
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

const LIBRARY_REGISTRY: &str = "libraryfolders.vdf";

/// Steam runtimes / redistributables whose prefixes are never inventoried:
/// Proton Experimental, Steamworks Common Redist, Steam Linux Runtime 2.0
/// and 3.0, and appid zero.
pub const IGNORE_APPIDS: &[&str] = &["1070560", "228980", "1391110", "1628350", "0"];

pub fn is_ignored(appid: &str) -> bool {
    IGNORE_APPIDS.contains(&appid)
}

/// Ordered, deduplicated list of Steam library roots, primary first.
///
/// The primary root is the first install-location candidate whose steamapps
/// directory carries the library registry file; if none qualifies the native
/// path is used unconditionally and its absence surfaces later as a root
/// with no data.
pub fn locate_library_roots() -> Vec<PathBuf> {
    let home = dirs_home().unwrap_or_else(|| PathBuf::from("/"));
    let candidates = [
        home.join(".steam/steam"),
        home.join(".local/share/Steam"),
        home.join(".var/app/com.valvesoftware.Steam/.local/share/Steam"),
        home.join("snap/steam/common/.local/share/Steam"),
    ];
    let primary = candidates
        .iter()
        .find(|base| base.join("steamapps").join(LIBRARY_REGISTRY).is_file())
        .cloned()
        .unwrap_or_else(|| home.join(".local/share/Steam"));
    collect_roots(&primary)
}

/// Primary root plus every existing secondary root named in its registry
/// file. Dedup is on the exact path value; trailing separators or case
/// differences count as distinct.
pub fn collect_roots(primary: &Path) -> Vec<PathBuf> {
    let mut roots = vec![primary.to_path_buf()];
    let registry = primary.join("steamapps").join(LIBRARY_REGISTRY);
    if let Ok(raw) = fs::read_to_string(&registry) {
        for path in registry_paths(&raw) {
            let path = PathBuf::from(path);
            let seen = roots.iter().any(|root| root.as_os_str() == path.as_os_str());
            if path.is_dir() && !seen {
                roots.push(path);
            }
        }
    }
    roots
}

/// Pull the quoted values following every `"path"` key out of the registry
/// text. Not a VDF parser; a line scan is all the format needs here.
pub fn registry_paths(raw: &str) -> Vec<String> {
    let mut paths = Vec::new();
    for line in raw.lines() {
        let line = line.trim();
        if !line.contains("\"path\"") {
            continue;
        }
        let parts: Vec<&str> = line.split('"').collect();
        if parts.len() >= 4 {
            paths.push(parts[3].replace("\\\\", "\\"));
        }
    }
    paths
}

/// Merge every root's app manifests into one appid -> name map.
///
/// Roots are visited in locator order, so an appid installed in two
/// libraries keeps the later root's name.
pub fn index_manifests(roots: &[PathBuf], warnings: &mut Vec<String>) -> HashMap<String, String> {
    let mut games = HashMap::new();
    for root in roots {
        let steamapps = root.join("steamapps");
        if !steamapps.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&steamapps).min_depth(1).max_depth(1) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warnings.push(format!("manifest scan: {err}"));
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy();
            if !file_name.ends_with(".acf") {
                continue;
            }
            let raw = match fs::read_to_string(entry.path()) {
                Ok(raw) => raw,
                Err(err) => {
                    warnings.push(format!("read {}: {err}", entry.path().display()));
                    continue;
                }
            };
            let Some(appid) = quoted_digits_after(&raw, "appid") else {
                warnings.push(format!("no appid in {}", entry.path().display()));
                continue;
            };
            if is_ignored(&appid) {
                continue;
            }
            let name = quoted_value_after(&raw, "name")
                .unwrap_or_else(|| lookup::placeholder_name(&appid));
            games.insert(appid, name);
        }
    }
    games
}

/// First quoted value following a quoted `key` token.
fn quoted_value_after(text: &str, key: &str) -> Option<String> {
    scan_quoted(text, key, |_| true)
}

/// Like `quoted_value_after` but keeps searching until the value is all
/// digits, matching how manifests are probed for their appid.
fn quoted_digits_after(text: &str, key: &str) -> Option<String> {
    scan_quoted(text, key, |value| {
        !value.is_empty() && value.bytes().all(|byte| byte.is_ascii_digit())
    })
}

fn scan_quoted(text: &str, key: &str, accept: impl Fn(&str) -> bool) -> Option<String> {
    let token = format!("\"{key}\"");
    let mut from = 0usize;
    while let Some(found) = text[from..].find(&token) {
        let after = from + found + token.len();
        let rest = text[after..].trim_start();
        if let Some(body) = rest.strip_prefix('"') {
            if let Some(end) = body.find('"') {
                let value = &body[..end];
                if accept(value) {
                    return Some(value.to_string());
                }
            }
        }
        from = after;
    }
    None
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

use crate::{
    lookup, shortcuts, steam,
    store::{self, OverrideStore},
};
use anyhow::Result;
use serde::Serialize;
use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::mpsc::{self, Receiver, Sender},
    thread,
};
use walkdir::WalkDir;

/// One Proton prefix in the final inventory, keyed by appid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrefixRecord {
    pub appid: String,
    pub name: String,
    pub path: PathBuf,
    pub installed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub records: Vec<PrefixRecord>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ScanMessage {
    Progress(String),
    Finished(ScanOutcome),
    Failed { error: String },
}

/// Run a full scan on a worker thread. Exactly one terminal message
/// (`Finished` or `Failed`) follows any number of `Progress` updates.
/// Callers must not start another scan while one is outstanding; the
/// override store is read at the start and written once at the end.
pub fn spawn_scan() -> Receiver<ScanMessage> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || match run_scan(&tx) {
        Ok(outcome) => {
            let _ = tx.send(ScanMessage::Finished(outcome));
        }
        Err(err) => {
            let _ = tx.send(ScanMessage::Failed {
                error: format!("{err:#}"),
            });
        }
    });
    rx
}

fn run_scan(tx: &Sender<ScanMessage>) -> Result<ScanOutcome> {
    let progress = |message: &str| {
        let _ = tx.send(ScanMessage::Progress(message.to_string()));
    };

    let store_path = store::store_path()?;
    let mut store = OverrideStore::load(&store_path);
    let mut warnings = Vec::new();

    progress("Locating Steam libraries");
    let roots = steam::locate_library_roots();

    progress("Indexing app manifests");
    let manifests = steam::index_manifests(&roots, &mut warnings);

    progress("Reading non-Steam shortcuts");
    let shortcut_names = shortcuts::shortcut_names(&roots, &mut warnings);

    progress("Scanning Proton prefixes");
    let records = build_inventory(
        &roots,
        &manifests,
        &shortcut_names,
        &mut store,
        &mut warnings,
        &mut lookup::fetch_app_name,
    );

    // Cache writes from this scan land in one save at the end.
    if let Err(err) = store.save(&store_path) {
        warnings.push(format!("save override store: {err:#}"));
    }

    Ok(ScanOutcome { records, warnings })
}

/// Walk every root's compatdata directory and resolve each numeric prefix
/// into a record via the priority chain, then dedup and sort. Per-item
/// failures become warnings; nothing here aborts the scan.
pub fn build_inventory(
    roots: &[PathBuf],
    manifests: &HashMap<String, String>,
    shortcut_names: &HashMap<String, String>,
    store: &mut OverrideStore,
    warnings: &mut Vec<String>,
    lookup_name: &mut dyn FnMut(&str) -> Option<String>,
) -> Vec<PrefixRecord> {
    let mut found = Vec::new();
    for root in roots {
        let compatdata = root.join("steamapps").join("compatdata");
        if fs::read_dir(&compatdata).is_err() {
            continue;
        }
        for entry in WalkDir::new(&compatdata)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warnings.push(format!("compatdata scan: {err}"));
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }
            let appid = entry.file_name().to_string_lossy().into_owned();
            if appid.is_empty() || !appid.bytes().all(|byte| byte.is_ascii_digit()) {
                continue;
            }
            if steam::is_ignored(&appid) {
                continue;
            }
            if entry.path().read_dir().is_err() {
                warnings.push(format!("unreadable prefix: {}", entry.path().display()));
                continue;
            }

            let installed = match store.custom_status.get(&appid) {
                Some(status) => *status,
                None => manifests.contains_key(&appid) || shortcut_names.contains_key(&appid),
            };
            let name = resolve_name(&appid, manifests, shortcut_names, store, lookup_name);

            found.push(PrefixRecord {
                appid,
                name,
                path: entry.path().to_path_buf(),
                installed,
            });
        }
    }

    let mut records = dedup_records(found);
    sort_records(&mut records);
    records
}

/// Name priority: user override, manifest, shortcut, cached lookup, live
/// lookup. A successful live lookup is cached; a failed one degrades to the
/// placeholder and stays uncached so the next scan retries it.
fn resolve_name(
    appid: &str,
    manifests: &HashMap<String, String>,
    shortcut_names: &HashMap<String, String>,
    store: &mut OverrideStore,
    lookup_name: &mut dyn FnMut(&str) -> Option<String>,
) -> String {
    if let Some(name) = store.custom_names.get(appid) {
        return name.clone();
    }
    if let Some(name) = manifests.get(appid) {
        return name.clone();
    }
    if let Some(name) = shortcut_names.get(appid) {
        return name.clone();
    }
    if let Some(name) = store.api_cache.get(appid) {
        return name.clone();
    }
    match lookup_name(appid) {
        Some(name) => {
            store.api_cache.insert(appid.to_string(), name.clone());
            name
        }
        None => lookup::placeholder_name(appid),
    }
}

/// Keep the first record per appid, except that installed evidence always
/// replaces an uninstalled record regardless of discovery order.
pub fn dedup_records(records: Vec<PrefixRecord>) -> Vec<PrefixRecord> {
    let mut out: Vec<PrefixRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for record in records {
        match index.get(&record.appid) {
            Some(&at) => {
                if record.installed && !out[at].installed {
                    out[at] = record;
                }
            }
            None => {
                index.insert(record.appid.clone(), out.len());
                out.push(record);
            }
        }
    }
    out
}

/// Installed records first, then case-insensitive by name within each group.
pub fn sort_records(records: &mut [PrefixRecord]) {
    records.sort_by(|a, b| {
        b.installed
            .cmp(&a.installed)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
}

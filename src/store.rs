use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Persisted user corrections plus the store-API name cache, all keyed by
/// the same decimal appid strings as manifests and shortcuts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverrideStore {
    #[serde(default)]
    pub custom_names: HashMap<String, String>,
    #[serde(default)]
    pub custom_status: HashMap<String, bool>,
    #[serde(default)]
    pub api_cache: HashMap<String, String>,
}

impl OverrideStore {
    /// A missing or corrupt store file is never an error; it resets to the
    /// empty defaults.
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(_) => return Self::default(),
        };
        serde_json::from_str(&raw).unwrap_or_default()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("create config dir")?;
        }
        let raw = serde_json::to_string_pretty(self).context("serialize games.json")?;
        fs::write(path, raw).context("write games.json")?;
        Ok(())
    }
}

pub fn store_path() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.config_dir().join("prefixhq").join("games.json"))
}

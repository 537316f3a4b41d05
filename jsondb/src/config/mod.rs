use crate::error::{JsonDbError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name used for the default folder and for configuration discovery.
pub const STORE_NAME: &str = "json-db";

pub const DEFAULT_FOLDER: &str = ".json-db";
pub const DEFAULT_NAMING: &str = ".db.{{name}}.json";

/// Files probed by [`StoreConfig::discover`], in order. The first one found wins.
const CONFIG_FILES: &[&str] = &[
    ".json-dbrc",
    ".json-dbrc.json",
    ".json-dbrc.yaml",
    ".json-dbrc.yml",
    "json-db.config.json",
    "json-db.config.yaml",
];

const PACKAGE_MANIFEST: &str = "package.json";

/// Store configuration, usually read from a `.json-dbrc` file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage directory, relative to the store root.
    #[serde(default)]
    pub folder: Option<String>,
    /// File-naming template containing a `{{name}}` placeholder.
    #[serde(default)]
    pub naming: Option<String>,
    #[serde(default)]
    pub entry_ids: EntryIdStrategy,
    /// Tables registered at startup, with their initial content.
    #[serde(default)]
    pub data: IndexMap<String, serde_json::Value>,
}

/// How entry identifiers are generated for map-like documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryIdStrategy {
    #[default]
    Uuid,
    Ulid,
    Nanoid,
}

impl EntryIdStrategy {
    pub fn generate(self) -> String {
        match self {
            EntryIdStrategy::Uuid => uuid::Uuid::new_v4().to_string(),
            EntryIdStrategy::Ulid => ulid::Ulid::new().to_string().to_lowercase(),
            EntryIdStrategy::Nanoid => nanoid::nanoid!(),
        }
    }
}

impl StoreConfig {
    pub fn folder(&self) -> &str {
        self.folder.as_deref().unwrap_or(DEFAULT_FOLDER)
    }

    pub fn naming(&self) -> &str {
        self.naming.as_deref().unwrap_or(DEFAULT_NAMING)
    }

    /// Parse a configuration string. YAML is a superset of JSON, so both work.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(StoreConfig::default());
        }
        serde_yaml::from_str(content).map_err(|e| JsonDbError::Config(e.to_string()))
    }

    /// Load configuration from an explicit file path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        if path.file_name().and_then(|n| n.to_str()) == Some(PACKAGE_MANIFEST) {
            return from_package_manifest(&content)?.ok_or_else(|| {
                JsonDbError::Config(format!(
                    "no \"{STORE_NAME}\" key in {}",
                    path.display()
                ))
            });
        }
        Self::parse(&content)
            .map_err(|e| JsonDbError::Config(format!("{}: {e}", path.display())))
    }

    /// Search `root` for a configuration source.
    /// Never fails: a missing or broken configuration falls back to defaults.
    pub fn discover(root: &Path) -> Self {
        match find_config_file(root) {
            Some(path) => match Self::from_path(&path) {
                Ok(config) => {
                    log::debug!("Loaded configuration from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("Ignoring configuration {}: {e}", path.display());
                    StoreConfig::default()
                }
            },
            None => {
                log::warn!(
                    "No config found on .{STORE_NAME}rc, {STORE_NAME}.config.* or \"{STORE_NAME}\" inside {PACKAGE_MANIFEST}"
                );
                StoreConfig::default()
            }
        }
    }
}

fn find_config_file(root: &Path) -> Option<PathBuf> {
    if let Some(path) = CONFIG_FILES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
    {
        return Some(path);
    }

    // package.json only counts when it carries our key
    let manifest = root.join(PACKAGE_MANIFEST);
    let content = std::fs::read_to_string(&manifest).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    value.get(STORE_NAME).map(|_| manifest)
}

fn from_package_manifest(content: &str) -> Result<Option<StoreConfig>> {
    let mut manifest: serde_json::Value =
        serde_json::from_str(content).map_err(|e| JsonDbError::Config(e.to_string()))?;
    match manifest.get_mut(STORE_NAME).map(serde_json::Value::take) {
        Some(section) => serde_json::from_value(section)
            .map(Some)
            .map_err(|e| JsonDbError::Config(e.to_string())),
        None => Ok(None),
    }
}

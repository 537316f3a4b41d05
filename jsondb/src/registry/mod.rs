use crate::error::{JsonDbError, Result};
use crate::naming::{NamingTemplate, TableKey};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Opaque identifier bound to a table when it is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(uuid::Uuid);

impl TableId {
    fn generate() -> Self {
        TableId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for TableId {
    type Err = JsonDbError;

    fn from_str(s: &str) -> Result<Self> {
        uuid::Uuid::parse_str(s)
            .map(TableId)
            .map_err(|_| JsonDbError::TableNotFound { id: s.to_string() })
    }
}

/// Outcome of [`Registry::register`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub key: TableKey,
    pub id: TableId,
    pub path: PathBuf,
    /// False when the key was already registered.
    pub created: bool,
}

/// Maps table keys to identifiers and identifiers to their backing files.
#[derive(Debug)]
pub struct Registry {
    folder: PathBuf,
    naming: NamingTemplate,
    keys: IndexMap<TableKey, TableId>,
    paths: HashMap<TableId, PathBuf>,
}

impl Registry {
    pub fn new(folder: impl Into<PathBuf>, naming: NamingTemplate) -> Self {
        Registry {
            folder: folder.into(),
            naming,
            keys: IndexMap::new(),
            paths: HashMap::new(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Path a table name maps to, whether or not it is registered.
    pub fn file_for(&self, name: &str) -> PathBuf {
        self.folder.join(self.naming.render(name))
    }

    /// Bind `name` to a fresh identifier unless its key is already known.
    pub fn register(&mut self, name: &str) -> Registration {
        let key = TableKey::from_name(name);
        if let Some(&id) = self.keys.get(&key) {
            return Registration {
                path: self.paths[&id].clone(),
                key,
                id,
                created: false,
            };
        }

        let id = TableId::generate();
        let path = self.file_for(name);
        log::debug!("Registered table {key} as {id} -> {}", path.display());
        self.keys.insert(key.clone(), id);
        self.paths.insert(id, path.clone());
        Registration {
            key,
            id,
            path,
            created: true,
        }
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> impl Iterator<Item = &TableKey> + '_ {
        self.keys.keys()
    }

    /// Identifier for a key. Names are accepted too, since normalization is idempotent.
    pub fn lookup(&self, key: &str) -> Option<TableId> {
        self.keys.get(&TableKey::from_name(key)).copied()
    }

    pub fn key_of(&self, id: &TableId) -> Option<&TableKey> {
        self.keys
            .iter()
            .find_map(|(key, bound)| (bound == id).then_some(key))
    }

    /// Resolve the backing file of a registered table.
    pub fn path_of(&self, id: &TableId) -> Result<&Path> {
        self.paths
            .get(id)
            .map(PathBuf::as_path)
            .ok_or_else(|| JsonDbError::TableNotFound { id: id.to_string() })
    }

    /// Forget a table. Returns the key it was bound to.
    pub fn unregister(&mut self, id: &TableId) -> Option<TableKey> {
        self.paths.remove(id)?;
        let key = self.key_of(id).cloned()?;
        self.keys.shift_remove(&key);
        log::debug!("Unregistered table {key} ({id})");
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

mod bulk;

pub use bulk::{DeleteFrom, InsertInto, Projection, Select, Selection, Update, UpdateWhere};

use crate::config::StoreConfig;
use crate::document::{self, array_index, kind_of, Document};
use crate::error::{JsonDbError, Result};
use crate::naming::{NamingTemplate, TableKey};
use crate::registry::{Registry, TableId};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Field that carries the generated identifier of an entry in a map-like document.
pub const ENTRY_ID_FIELD: &str = "__id__";

/// The main entry point for jsondb.
/// Owns the configuration and the table registry; every document operation
/// reads the table file, applies the change and writes it back.
pub struct Store {
    root: PathBuf,
    config: StoreConfig,
    registry: Registry,
}

impl Store {
    /// Open a store rooted at `root`.
    /// Creates the storage folder if needed and registers the tables listed in
    /// the configuration's `data` section.
    pub fn open(root: impl AsRef<Path>, config: StoreConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let folder = root.join(config.folder());
        let registry = Registry::new(folder, NamingTemplate::new(config.naming()));

        let mut store = Store {
            root,
            config,
            registry,
        };
        store.boot()?;
        Ok(store)
    }

    /// Open a store using the configuration discovered under `root`.
    pub fn discover(root: impl AsRef<Path>) -> Result<Self> {
        let config = StoreConfig::discover(root.as_ref());
        Self::open(root, config)
    }

    /// Boot lifecycle: ensure the folder exists, then register initial tables
    fn boot(&mut self) -> Result<()> {
        let folder = self.registry.folder();
        if !folder.exists() {
            std::fs::create_dir_all(folder)?;
            log::debug!("Created storage folder {}", folder.display());
        }

        let initial = std::mem::take(&mut self.config.data);
        for (name, value) in &initial {
            match self.create_table(name, value.clone()) {
                Ok(_) => {}
                Err(JsonDbError::Shape(reason)) => {
                    log::warn!("Skipping configured table {name}: {reason}");
                }
                Err(e) => return Err(e),
            }
        }
        self.config.data = initial;

        log::info!(
            "Opened store at {} with {} table(s)",
            self.registry.folder().display(),
            self.registry.len()
        );
        Ok(())
    }

    /// Get the root directory path
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Directory holding the table files
    pub fn folder(&self) -> &Path {
        self.registry.folder()
    }

    // ── Tables ──────────────────────────────────────────────────────

    /// Register a table and return its key. The initial value is only written
    /// when the table file does not exist yet.
    /// Initial values that are neither arrays nor objects are rejected
    /// before anything is registered.
    pub fn create_table(&mut self, name: &str, initial: Value) -> Result<TableKey> {
        let document = Document::try_from(initial)?;
        let registration = self.registry.register(name);
        if !registration.path.exists() {
            if let Err(e) = document::write_document(&registration.path, &document) {
                if registration.created {
                    self.registry.unregister(&registration.id);
                }
                return Err(e);
            }
            log::debug!(
                "Initialized table {} at {}",
                registration.key,
                registration.path.display()
            );
        }
        Ok(registration.key)
    }

    /// Registered table keys, in registration order.
    pub fn show_tables(&self) -> Vec<TableKey> {
        self.registry.keys().cloned().collect()
    }

    /// Delete a table's file and unregister it.
    /// Returns false, and keeps the registration, when the file is already gone.
    pub fn drop_table(&mut self, id: &TableId) -> Result<bool> {
        let path = self.registry.path_of(id)?.to_path_buf();
        if !path.exists() {
            return Ok(false);
        }
        document::delete_document(&path)?;
        self.registry.unregister(id);
        log::debug!("Dropped table {id} ({})", path.display());
        Ok(true)
    }

    /// Identifier bound to a table key, if registered.
    pub fn table_id(&self, key: &str) -> Option<TableId> {
        self.registry.lookup(key)
    }

    /// Identifier bound to a table key.
    pub fn resolve(&self, key: &str) -> Result<TableId> {
        self.table_id(key).ok_or_else(|| JsonDbError::UnknownTable {
            key: key.to_string(),
        })
    }

    /// Backing file of a registered table.
    pub fn path_of(&self, id: &TableId) -> Result<&Path> {
        self.registry.path_of(id)
    }

    // ── Whole documents ─────────────────────────────────────────────

    /// Read a table's whole document.
    pub fn browse(&self, id: &TableId) -> Result<Document> {
        document::read_document(self.registry.path_of(id)?)
    }

    /// Replace a table's whole document.
    pub fn set_whole(&self, id: &TableId, document: Document) -> Result<Document> {
        document::write_document(self.registry.path_of(id)?, &document)?;
        Ok(document)
    }

    fn save(&self, id: &TableId, document: &Document) -> Result<()> {
        document::write_document(self.registry.path_of(id)?, document)
    }

    // ── Entries ─────────────────────────────────────────────────────

    /// Add an entry. Arrays append and return the new index; maps generate an
    /// identifier, stamp it into object entries under [`ENTRY_ID_FIELD`] and
    /// return it.
    pub fn create(&self, id: &TableId, entry: Value) -> Result<String> {
        let mut document = self.browse(id)?;
        let entry_id = self.push_entry(&mut document, entry);
        self.save(id, &document)?;
        Ok(entry_id)
    }

    fn push_entry(&self, document: &mut Document, mut entry: Value) -> String {
        match document {
            Document::Array(items) => {
                items.push(entry);
                (items.len() - 1).to_string()
            }
            Document::Map(map) => {
                let entry_id = self.config.entry_ids.generate();
                if let Value::Object(fields) = &mut entry {
                    fields.insert(ENTRY_ID_FIELD.to_string(), Value::String(entry_id.clone()));
                }
                map.insert(entry_id.clone(), entry);
                entry_id
            }
        }
    }

    /// Look up an entry. `None` means the entry does not exist; a missing
    /// table is an error.
    pub fn read(&self, id: &TableId, entry_id: &str) -> Result<Option<Value>> {
        let document = self.browse(id)?;
        Ok(document.get(entry_id).cloned())
    }

    /// Shallow-merge `partial` over an entry and persist the result.
    pub fn edit(&self, id: &TableId, entry_id: &str, partial: &Value) -> Result<Value> {
        let mut document = self.browse(id)?;
        let merged = merge(document.get(entry_id), partial)?;
        document.put(entry_id, merged.clone())?;
        self.save(id, &document)?;
        Ok(merged)
    }

    /// Remove an entry. Array slots become `null` holes. Always true.
    pub fn delete(&self, id: &TableId, entry_id: &str) -> Result<bool> {
        let mut document = self.browse(id)?;
        document.remove(entry_id);
        self.save(id, &document)?;
        Ok(true)
    }

    /// Write `value` at one entry, without merging.
    pub fn set_entry(&self, id: &TableId, entry_id: &str, value: Value) -> Result<Value> {
        let mut document = self.browse(id)?;
        document.put(entry_id, value.clone())?;
        self.save(id, &document)?;
        Ok(value)
    }

    /// Insert at the front of an array (returns `"0"`); maps behave like [`Store::create`].
    pub fn prepend(&self, id: &TableId, entry: Value) -> Result<String> {
        let mut document = self.browse(id)?;
        if let Document::Array(items) = &mut document {
            items.insert(0, entry);
            self.save(id, &document)?;
            return Ok("0".to_string());
        }
        let entry_id = self.push_entry(&mut document, entry);
        self.save(id, &document)?;
        Ok(entry_id)
    }

    /// Create one entry per value, in order.
    pub fn insert_values(
        &self,
        id: &TableId,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Vec<String>> {
        values
            .into_iter()
            .map(|value| self.create(id, value))
            .collect()
    }

    // ── SQL-flavoured builders ──────────────────────────────────────

    /// `SELECT <projection> FROM <table>`
    pub fn select(&self, projection: Projection) -> Select<'_> {
        Select::new(self, projection)
    }

    /// `UPDATE <table> SET <partial> WHERE <predicate>`
    pub fn update(&self, id: &TableId) -> Update<'_> {
        Update::new(self, *id)
    }

    /// `DELETE FROM <table> WHERE <predicate>`
    pub fn delete_from(&self, id: &TableId) -> DeleteFrom<'_> {
        DeleteFrom::new(self, *id)
    }

    /// `INSERT INTO <table> VALUES ...`
    pub fn insert_into(&self, id: &TableId) -> InsertInto<'_> {
        InsertInto::new(self, *id)
    }

    // ── Aliases ─────────────────────────────────────────────────────

    pub fn add(&self, id: &TableId, entry: Value) -> Result<String> {
        self.create(id, entry)
    }

    pub fn append(&self, id: &TableId, entry: Value) -> Result<String> {
        self.create(id, entry)
    }

    pub fn view(&self, id: &TableId, entry_id: &str) -> Result<Option<Value>> {
        self.read(id, entry_id)
    }

    pub fn get(&self, id: &TableId, entry_id: &str) -> Result<Option<Value>> {
        self.read(id, entry_id)
    }

    pub fn put(&self, id: &TableId, entry_id: &str, partial: &Value) -> Result<Value> {
        self.edit(id, entry_id, partial)
    }

    pub fn update_one(&self, id: &TableId, entry_id: &str, partial: &Value) -> Result<Value> {
        self.edit(id, entry_id, partial)
    }

    pub fn pop(&self, id: &TableId, entry_id: &str) -> Result<bool> {
        self.delete(id, entry_id)
    }

    pub fn ro(&self, id: &TableId, entry_id: &str) -> Result<Option<Value>> {
        self.read(id, entry_id)
    }

    pub fn ro_all(&self, id: &TableId) -> Result<Document> {
        self.browse(id)
    }

    pub fn rw(&self, id: &TableId, entry_id: &str, value: Value) -> Result<Value> {
        self.set_entry(id, entry_id, value)
    }

    pub fn rw_all(&self, id: &TableId, document: Document) -> Result<Document> {
        self.set_whole(id, document)
    }

    pub fn mk(&mut self, name: &str) -> Result<TableKey> {
        self.create_table(name, Value::Object(Map::new()))
    }

    pub fn ls(&self) -> Vec<TableKey> {
        self.show_tables()
    }

    pub fn rm(&mut self, id: &TableId) -> Result<bool> {
        self.drop_table(id)
    }

    /// File-system flavoured names for the table operations.
    pub fn fs(&mut self) -> Fs<'_> {
        Fs { store: self }
    }
}

/// File-system naming: make / list / read / write / remove.
pub struct Fs<'a> {
    store: &'a mut Store,
}

impl<'a> Fs<'a> {
    pub fn make(&mut self, name: &str) -> Result<TableKey> {
        self.store.mk(name)
    }

    pub fn list(&self) -> Vec<TableKey> {
        self.store.ls()
    }

    pub fn read(&self, id: &TableId, entry_id: &str) -> Result<Option<Value>> {
        self.store.ro(id, entry_id)
    }

    pub fn read_all(&self, id: &TableId) -> Result<Document> {
        self.store.ro_all(id)
    }

    pub fn write(&self, id: &TableId, entry_id: &str, value: Value) -> Result<Value> {
        self.store.rw(id, entry_id, value)
    }

    pub fn write_all(&self, id: &TableId, document: Document) -> Result<Document> {
        self.store.rw_all(id, document)
    }

    pub fn remove(&mut self, id: &TableId) -> Result<bool> {
        self.store.rm(id)
    }
}

/// Shallow merge into a fresh container. An array base stays an array and
/// anything else merges into an object; scalar partials contribute nothing.
pub(crate) fn merge(base: Option<&Value>, partial: &Value) -> Result<Value> {
    match base {
        Some(Value::Array(items)) => {
            let mut merged = items.clone();
            match partial {
                Value::Array(over) => {
                    for (i, v) in over.iter().enumerate() {
                        document::place(&mut merged, i, v.clone())?;
                    }
                }
                Value::Object(over) => {
                    for (k, v) in over {
                        if let Some(i) = array_index(k) {
                            document::place(&mut merged, i, v.clone())?;
                        }
                    }
                }
                _ => {}
            }
            Ok(Value::Array(merged))
        }
        other => {
            let mut merged = match other {
                Some(Value::Object(fields)) => fields.clone(),
                _ => Map::new(),
            };
            match partial {
                Value::Object(over) => {
                    for (k, v) in over {
                        merged.insert(k.clone(), v.clone());
                    }
                }
                Value::Array(over) => {
                    for (i, v) in over.iter().enumerate() {
                        merged.insert(i.to_string(), v.clone());
                    }
                }
                scalar => {
                    log::debug!("Ignoring {} partial in merge", kind_of(scalar));
                }
            }
            Ok(Value::Object(merged))
        }
    }
}

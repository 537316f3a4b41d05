//! Bulk operations: projection, filtered update and filtered delete.
//!
//! Every builder ends with an explicit terminal call (`from`, `execute`,
//! `values`). Entries that are falsy (deleted array slots, `null`, `false`,
//! `0`, `""`) never match a bulk operation.

use super::{merge, Store};
use crate::document::{array_index, Document};
use crate::error::Result;
use crate::registry::TableId;
use indexmap::IndexMap;
use serde_json::{Map, Value};

type Predicate<'a> = Box<dyn FnMut(&Value, &str) -> bool + 'a>;

/// What `select` returns for each entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    /// The whole document.
    All,
    /// Only the identifiers of occupied entries.
    Ids,
    /// Each entry reduced to the named attributes. An empty list means `All`.
    Fields(Vec<String>),
}

impl Projection {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Fields(fields.into_iter().map(Into::into).collect())
    }
}

/// Result of a `select`.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Document(Document),
    Ids(Vec<String>),
}

impl Selection {
    pub fn into_value(self) -> Value {
        match self {
            Selection::Document(document) => document.into_value(),
            Selection::Ids(ids) => Value::Array(ids.into_iter().map(Value::String).collect()),
        }
    }
}

pub struct Select<'a> {
    store: &'a Store,
    projection: Projection,
}

impl<'a> Select<'a> {
    pub(super) fn new(store: &'a Store, projection: Projection) -> Self {
        Select { store, projection }
    }

    /// Run the projection against a table. Arrays keep their positions,
    /// with `null` where an entry was skipped.
    pub fn from(self, id: &TableId) -> Result<Selection> {
        let document = self.store.browse(id)?;
        let selection = match self.projection {
            Projection::All => Selection::Document(document),
            Projection::Fields(fields) if fields.is_empty() => Selection::Document(document),
            Projection::Ids => Selection::Ids(
                document
                    .entries()
                    .filter(|(_, entry)| is_truthy(entry))
                    .map(|(entry_id, _)| entry_id)
                    .collect(),
            ),
            Projection::Fields(fields) => {
                let occupied: Vec<(String, &Value)> = document
                    .entries()
                    .filter(|(_, entry)| is_truthy(entry))
                    .collect();
                let mut projected =
                    positional_like(&document, occupied.last().map(|(id, _)| id.as_str()));
                for (entry_id, entry) in &occupied {
                    projected.put(entry_id, project(entry, &fields))?;
                }
                Selection::Document(projected)
            }
        };
        Ok(selection)
    }
}

/// First stage of a bulk update: pick the table.
pub struct Update<'a> {
    store: &'a Store,
    id: TableId,
}

impl<'a> Update<'a> {
    pub(super) fn new(store: &'a Store, id: TableId) -> Self {
        Update { store, id }
    }

    pub fn set(self, partial: Value) -> UpdateWhere<'a> {
        UpdateWhere {
            store: self.store,
            id: self.id,
            partial,
            predicate: None,
        }
    }
}

pub struct UpdateWhere<'a> {
    store: &'a Store,
    id: TableId,
    partial: Value,
    predicate: Option<Predicate<'a>>,
}

impl<'a> UpdateWhere<'a> {
    /// Restrict the update to entries for which `predicate(entry, entry_id)` holds.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: FnMut(&Value, &str) -> bool + 'a,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Merge the partial into every matching entry. Returns the updated
    /// entries in a container shaped like the document.
    pub fn execute(self) -> Result<Document> {
        let mut document = self.store.browse(&self.id)?;
        let matched = matching_ids(&document, self.predicate);

        let mut updated = positional_like(&document, matched.last().map(String::as_str));
        for entry_id in &matched {
            let merged = merge(document.get(entry_id), &self.partial)?;
            document.put(entry_id, merged.clone())?;
            updated.put(entry_id, merged)?;
        }

        if !matched.is_empty() {
            self.store.save(&self.id, &document)?;
        }
        log::debug!("Updated {} entries in {}", matched.len(), self.id);
        Ok(updated)
    }
}

pub struct DeleteFrom<'a> {
    store: &'a Store,
    id: TableId,
    predicate: Option<Predicate<'a>>,
}

impl<'a> DeleteFrom<'a> {
    pub(super) fn new(store: &'a Store, id: TableId) -> Self {
        DeleteFrom {
            store,
            id,
            predicate: None,
        }
    }

    /// Restrict the delete to entries for which `predicate(entry, entry_id)` holds.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: FnMut(&Value, &str) -> bool + 'a,
    {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Delete every matching entry. Returns `entry_id -> true` for each.
    pub fn execute(self) -> Result<IndexMap<String, bool>> {
        let mut document = self.store.browse(&self.id)?;
        let matched = matching_ids(&document, self.predicate);

        for entry_id in &matched {
            document.remove(entry_id);
        }

        if !matched.is_empty() {
            self.store.save(&self.id, &document)?;
        }
        log::debug!("Deleted {} entries from {}", matched.len(), self.id);
        Ok(matched.into_iter().map(|entry_id| (entry_id, true)).collect())
    }
}

pub struct InsertInto<'a> {
    store: &'a Store,
    id: TableId,
}

impl<'a> InsertInto<'a> {
    pub(super) fn new(store: &'a Store, id: TableId) -> Self {
        InsertInto { store, id }
    }

    pub fn values(self, values: impl IntoIterator<Item = Value>) -> Result<Vec<String>> {
        self.store.insert_values(&self.id, values)
    }
}

fn matching_ids(document: &Document, mut predicate: Option<Predicate<'_>>) -> Vec<String> {
    document
        .entries()
        .filter(|(entry_id, entry)| {
            is_truthy(entry)
                && predicate
                    .as_mut()
                    .map_or(true, |matches| matches(*entry, entry_id.as_str()))
        })
        .map(|(entry_id, _)| entry_id)
        .collect()
}

/// An empty container shaped like `document`. Arrays are pre-filled with
/// `null` up to `last_id`, so results keep the positions of the source.
fn positional_like(document: &Document, last_id: Option<&str>) -> Document {
    let mut container = document.empty_like();
    if let (Document::Array(slots), Some(last)) = (&mut container, last_id.and_then(array_index)) {
        slots.resize(last + 1, Value::Null);
    }
    container
}

fn project(entry: &Value, fields: &[String]) -> Value {
    let mut projected = Map::new();
    for field in fields {
        if let Some(value) = entry.get(field.as_str()) {
            projected.insert(field.clone(), value.clone());
        }
    }
    Value::Object(projected)
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

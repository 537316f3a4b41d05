// Document I/O - read/write a table's JSON file

use crate::error::{JsonDbError, Result};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;

/// The content of a table: an ordered collection or a keyed mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Array(Vec<Value>),
    Map(Map<String, Value>),
}

impl Document {
    pub fn is_array(&self) -> bool {
        matches!(self, Document::Array(_))
    }

    /// Number of slots (array holes included) or keys.
    pub fn len(&self) -> usize {
        match self {
            Document::Array(items) => items.len(),
            Document::Map(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an entry. Non-numeric ids never match in an array.
    pub fn get(&self, entry_id: &str) -> Option<&Value> {
        match self {
            Document::Array(items) => array_index(entry_id).and_then(|i| items.get(i)),
            Document::Map(map) => map.get(entry_id),
        }
    }

    /// Store `value` at `entry_id`, padding an array with `null` holes when needed.
    /// Indices beyond [`MAX_ARRAY_INDEX`], or more than [`MAX_HOLES`] past the
    /// end, are rejected with `InvalidEntryId`.
    pub fn put(&mut self, entry_id: &str, value: Value) -> Result<()> {
        match self {
            Document::Array(items) => {
                let index = array_index(entry_id).ok_or_else(|| JsonDbError::InvalidEntryId {
                    id: entry_id.to_string(),
                })?;
                place(items, index, value)?;
            }
            Document::Map(map) => {
                map.insert(entry_id.to_string(), value);
            }
        }
        Ok(())
    }

    /// Remove an entry. Arrays keep the slot as a `null` hole so later
    /// entries retain their index.
    pub fn remove(&mut self, entry_id: &str) {
        match self {
            Document::Array(items) => {
                if let Some(slot) = array_index(entry_id).and_then(|i| items.get_mut(i)) {
                    *slot = Value::Null;
                }
            }
            Document::Map(map) => {
                map.shift_remove(entry_id);
            }
        }
    }

    /// Iterate `(entry_id, entry)` pairs in document order.
    pub fn entries(&self) -> Box<dyn Iterator<Item = (String, &Value)> + '_> {
        match self {
            Document::Array(items) => Box::new(
                items
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i.to_string(), v)),
            ),
            Document::Map(map) => Box::new(map.iter().map(|(k, v)| (k.clone(), v))),
        }
    }

    /// An empty document of the same shape.
    pub fn empty_like(&self) -> Document {
        match self {
            Document::Array(_) => Document::Array(Vec::new()),
            Document::Map(_) => Document::Map(Map::new()),
        }
    }

    pub fn into_value(self) -> Value {
        self.into()
    }
}

impl TryFrom<Value> for Document {
    type Error = JsonDbError;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Ok(Document::Array(items)),
            Value::Object(map) => Ok(Document::Map(map)),
            other => Err(JsonDbError::Shape(format!(
                "expected an array or an object, found {}",
                kind_of(&other)
            ))),
        }
    }
}

impl From<Document> for Value {
    fn from(document: Document) -> Self {
        match document {
            Document::Array(items) => Value::Array(items),
            Document::Map(map) => Value::Object(map),
        }
    }
}

impl From<Vec<Value>> for Document {
    fn from(items: Vec<Value>) -> Self {
        Document::Array(items)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Document::Map(map)
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Document::Array(items) => items.serialize(serializer),
            Document::Map(map) => map.serialize(serializer),
        }
    }
}

/// Largest array index, as for JSON-script arrays.
pub const MAX_ARRAY_INDEX: u64 = u32::MAX as u64 - 1;

/// How many `null` holes a single write may append past the end of an array.
pub const MAX_HOLES: usize = 1 << 16;

/// Parse an array entry id. Only canonical integers in `0..=MAX_ARRAY_INDEX` qualify.
pub(crate) fn array_index(entry_id: &str) -> Option<usize> {
    let canonical = !entry_id.is_empty()
        && entry_id.bytes().all(|b| b.is_ascii_digit())
        && (entry_id.len() == 1 || !entry_id.starts_with('0'));
    if !canonical {
        return None;
    }
    let index: u64 = entry_id.parse().ok()?;
    if index > MAX_ARRAY_INDEX {
        return None;
    }
    usize::try_from(index).ok()
}

/// Write `value` at `index`, growing the array with `null` as needed.
pub(crate) fn place(items: &mut Vec<Value>, index: usize, value: Value) -> Result<()> {
    if index >= items.len() {
        if index - items.len() > MAX_HOLES {
            return Err(JsonDbError::InvalidEntryId {
                id: index.to_string(),
            });
        }
        items.resize(index + 1, Value::Null);
    }
    items[index] = value;
    Ok(())
}

pub(crate) fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Read and parse a table file.
pub fn read_document(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content).map_err(|source| JsonDbError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Document::try_from(value)
}

/// Write a table file as pretty-printed JSON.
/// The content goes to a temporary file next to `path` which is then renamed
/// over it, so readers see either the old or the new document.
pub fn write_document(path: &Path, document: &Document) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let json = serde_json::to_string_pretty(document)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(json.as_bytes())?;
    // Temp files are created owner-only; keep the mode of the file being replaced
    if let Ok(existing) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(existing.permissions())?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| JsonDbError::Io(e.error))?;

    log::debug!("Wrote {} ({} bytes)", path.display(), json.len());
    Ok(())
}

/// Delete a table file.
pub fn delete_document(path: &Path) -> Result<()> {
    std::fs::remove_file(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: Value) -> Document {
        Document::try_from(value).unwrap()
    }

    #[test]
    fn test_round_trip_array() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".db.user.json");
        let original = doc(json!([{ "name": "David", "surname": "Smith" }, null, 3, "x"]));

        write_document(&path, &original).unwrap();
        assert_eq!(read_document(&path).unwrap(), original);
    }

    #[test]
    fn test_round_trip_map_keeps_key_order() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("map.json");
        let original = doc(json!({ "zeta": 1, "alpha": { "b": 2, "a": 1 }, "mid": [] }));

        write_document(&path, &original).unwrap();
        let loaded = read_document(&path).unwrap();
        assert_eq!(loaded, original);

        let keys: Vec<_> = loaded.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_write_is_pretty_printed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pretty.json");
        write_document(&path, &doc(json!([{ "a": 1 }]))).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "[\n  {\n    \"a\": 1\n  }\n]");
    }

    #[test]
    fn test_write_overwrites() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("t.json");
        write_document(&path, &doc(json!([1, 2, 3]))).unwrap();
        write_document(&path, &doc(json!({}))).unwrap();
        assert_eq!(read_document(&path).unwrap(), doc(json!({})));
    }

    #[test]
    fn test_read_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = read_document(&tmp.path().join("missing.json")).unwrap_err();
        match err {
            JsonDbError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::NotFound),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_invalid_json_is_parse_error_and_leaves_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        std::fs::write(&path, "[{ not json").unwrap();

        let err = read_document(&path).unwrap_err();
        assert!(matches!(err, JsonDbError::Parse { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[{ not json");
    }

    #[test]
    fn test_scalar_content_is_shape_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scalar.json");
        std::fs::write(&path, "42").unwrap();
        assert!(matches!(read_document(&path), Err(JsonDbError::Shape(_))));
    }

    #[test]
    fn test_array_get_put_remove() {
        let mut d = doc(json!(["a", "b"]));
        assert_eq!(d.get("1"), Some(&json!("b")));
        assert_eq!(d.get("5"), None);
        assert_eq!(d.get("name"), None);
        assert_eq!(d.get("01"), None);
        assert_eq!(d.get("+1"), None);

        d.put("4", json!("e")).unwrap();
        assert_eq!(d.into_value(), json!(["a", "b", null, null, "e"]));

        let mut d = doc(json!(["a", "b", "c"]));
        d.remove("1");
        d.remove("9");
        assert_eq!(d.len(), 3);
        assert_eq!(d.into_value(), json!(["a", null, "c"]));
    }

    #[test]
    fn test_array_put_rejects_non_numeric_id() {
        let mut d = doc(json!([]));
        let err = d.put("name", json!(1)).unwrap_err();
        assert!(matches!(err, JsonDbError::InvalidEntryId { .. }));
    }

    #[test]
    fn test_array_put_rejects_out_of_range_index() {
        let mut d = doc(json!(["a"]));
        for id in [usize::MAX.to_string(), "4294967295".to_string(), "100000000000".to_string()] {
            let err = d.put(&id, json!(1)).unwrap_err();
            assert!(matches!(err, JsonDbError::InvalidEntryId { .. }), "{id}");
            assert_eq!(d.get(&id), None);
        }

        let too_far = (1 + MAX_HOLES + 1).to_string();
        assert!(matches!(
            d.put(&too_far, json!(1)),
            Err(JsonDbError::InvalidEntryId { .. })
        ));
        assert_eq!(d.len(), 1);

        let furthest = (1 + MAX_HOLES).to_string();
        d.put(&furthest, json!("z")).unwrap();
        assert_eq!(d.len(), MAX_HOLES + 2);
        assert_eq!(d.get(&furthest), Some(&json!("z")));
    }

    #[cfg(unix)]
    #[test]
    fn test_write_keeps_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("mode.json");
        write_document(&path, &doc(json!([]))).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        write_document(&path, &doc(json!([1]))).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn test_map_remove_keeps_order() {
        let mut d = doc(json!({ "a": 1, "b": 2, "c": 3 }));
        d.remove("b");
        d.remove("missing");
        let keys: Vec<_> = d.entries().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "c"]);
    }
}

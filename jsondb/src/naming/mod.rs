// Table naming - key normalization and file-name templates

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]+").expect("static pattern"));

/// Placeholder substituted with the normalized table name.
pub const NAME_PLACEHOLDER: &str = "{{name}}";

/// The human-facing handle of a table, e.g. `"user list"` -> `USER_LIST`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableKey(String);

impl TableKey {
    /// Normalize a table name into its key. Idempotent.
    pub fn from_name(name: &str) -> Self {
        TableKey(
            NON_ALPHANUMERIC
                .replace_all(&name.to_uppercase(), "_")
                .into_owned(),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TableKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for TableKey {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for TableKey {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Normalize a table name for use inside a file name: lowercase, with runs of
/// non-alphanumeric characters collapsed into a single hyphen.
pub fn file_stem(name: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&name.to_lowercase(), "-")
        .into_owned()
}

/// A file-naming template such as `.db.{{name}}.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    pub raw: String,
}

impl NamingTemplate {
    pub fn new(raw: impl Into<String>) -> Self {
        NamingTemplate { raw: raw.into() }
    }

    /// Render the file name for a table. Only the first placeholder is replaced.
    pub fn render(&self, table_name: &str) -> String {
        self.raw.replacen(NAME_PLACEHOLDER, &file_stem(table_name), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_uppercases_and_collapses() {
        assert_eq!(TableKey::from_name("user"), "USER");
        assert_eq!(TableKey::from_name("list two"), "LIST_TWO");
        assert_eq!(TableKey::from_name("add to  -- document"), "ADD_TO_DOCUMENT");
        assert_eq!(TableKey::from_name("_leading"), "_LEADING");
    }

    #[test]
    fn test_key_is_idempotent() {
        for name in ["user", "List Two", "a--b..c", "Ünïcode name"] {
            let once = TableKey::from_name(name);
            let twice = TableKey::from_name(once.as_str());
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("User"), "user");
        assert_eq!(file_stem("list two"), "list-two");
        assert_eq!(file_stem("LIST_TWO"), "list-two");
        assert_eq!(file_stem("a!!b"), "a-b");
    }

    #[test]
    fn test_render_default_template() {
        let template = NamingTemplate::new(".db.{{name}}.json");
        assert_eq!(template.render("List Two"), ".db.list-two.json");
    }

    #[test]
    fn test_render_replaces_first_placeholder_only() {
        let template = NamingTemplate::new("{{name}}-{{name}}.json");
        assert_eq!(template.render("x"), "x-{{name}}.json");

        let fixed = NamingTemplate::new("static.json");
        assert_eq!(fixed.render("anything"), "static.json");
    }
}

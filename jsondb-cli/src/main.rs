use clap::{Parser, Subcommand, ValueEnum};
use jsondb::{Document, Projection, Store, TableId};
use serde_json::Value;
use std::process;

/// jsondb CLI - inspect and edit a jsondb store from the command line
#[derive(Parser)]
#[command(name = "jsondb", version, about)]
struct Cli {
    /// Directory holding the store configuration (default: current directory)
    #[arg(long, default_value = ".")]
    root: String,

    /// Output format
    #[arg(long, default_value = "yaml")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// List registered table keys
    Tables,

    /// Register a table, writing its initial content if the file is missing
    CreateTable {
        /// Table name (normalized into a key)
        name: String,
        /// Initial content as JSON (default: [])
        #[arg(long, value_parser = parse_json)]
        value: Option<Value>,
    },

    /// Delete a table file and unregister it
    DropTable {
        /// Table key
        key: String,
    },

    /// Print a whole table
    Browse {
        /// Table key
        key: String,
    },

    /// Print one entry
    Read {
        /// Table key
        key: String,
        /// Entry ID
        entry: String,
    },

    /// Add an entry and print its ID
    Create {
        /// Table key
        key: String,
        /// Entry as JSON
        #[arg(value_parser = parse_json)]
        value: Value,
    },

    /// Insert an entry at the front of an array table
    Prepend {
        /// Table key
        key: String,
        /// Entry as JSON
        #[arg(value_parser = parse_json)]
        value: Value,
    },

    /// Shallow-merge fields into an entry
    Edit {
        /// Table key
        key: String,
        /// Entry ID
        entry: String,
        /// Partial entry as JSON
        #[arg(value_parser = parse_json)]
        partial: Value,
    },

    /// Overwrite one entry (`set KEY ENTRY JSON`) or the whole table (`set KEY JSON`)
    Set {
        /// Table key
        key: String,
        /// Optional entry ID followed by the JSON value
        #[arg(num_args = 1..=2, required = true)]
        args: Vec<String>,
    },

    /// Delete an entry
    Delete {
        /// Table key
        key: String,
        /// Entry ID
        entry: String,
    },

    /// Project a table
    Select {
        /// Table key
        key: String,
        /// Attributes to keep (e.g. --field name --field surname)
        #[arg(long = "field")]
        fields: Vec<String>,
        /// Only print the IDs of occupied entries
        #[arg(long, conflicts_with = "fields")]
        ids: bool,
    },
}

fn parse_json(s: &str) -> Result<Value, String> {
    serde_json::from_str(s).map_err(|e| format!("Invalid JSON '{s}': {e}"))
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR:{e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = Store::discover(&cli.root)?;
    log::debug!("Using store folder {}", store.folder().display());

    let output = match cli.command {
        Command::Tables => {
            let keys: Vec<String> = store.show_tables().iter().map(|k| k.to_string()).collect();
            serde_json::json!(keys)
        }

        Command::CreateTable { name, value } => {
            let initial = value.unwrap_or_else(|| Value::Array(Vec::new()));
            let key = store.create_table(&name, initial)?;
            serde_json::json!({ "ok": true, "key": key.as_str() })
        }

        Command::DropTable { key } => {
            let id = store.resolve(&key)?;
            let dropped = store.drop_table(&id)?;
            serde_json::json!({ "ok": dropped, "dropped": key })
        }

        Command::Browse { key } => {
            let id = store.resolve(&key)?;
            store.browse(&id)?.into_value()
        }

        Command::Read { key, entry } => {
            let id = store.resolve(&key)?;
            store.read(&id, &entry)?.unwrap_or(Value::Null)
        }

        Command::Create { key, value } => {
            let id = store.resolve(&key)?;
            let entry = store.create(&id, value)?;
            serde_json::json!({ "id": entry })
        }

        Command::Prepend { key, value } => {
            let id = store.resolve(&key)?;
            let entry = store.prepend(&id, value)?;
            serde_json::json!({ "id": entry })
        }

        Command::Edit {
            key,
            entry,
            partial,
        } => {
            let id = store.resolve(&key)?;
            store.edit(&id, &entry, &partial)?
        }

        Command::Set { key, args } => {
            let id = store.resolve(&key)?;
            set(&store, &id, &args)?
        }

        Command::Delete { key, entry } => {
            let id = store.resolve(&key)?;
            store.delete(&id, &entry)?;
            serde_json::json!({ "ok": true, "deleted": entry })
        }

        Command::Select { key, fields, ids } => {
            let id = store.resolve(&key)?;
            let projection = if ids {
                Projection::Ids
            } else {
                Projection::Fields(fields)
            };
            store.select(projection).from(&id)?.into_value()
        }
    };

    print_output(&output, &cli.format)
}

fn set(store: &Store, id: &TableId, args: &[String]) -> Result<Value, Box<dyn std::error::Error>> {
    match args {
        [whole] => {
            let document = Document::try_from(parse_json(whole)?)?;
            Ok(store.set_whole(id, document)?.into_value())
        }
        [entry, value] => Ok(store.set_entry(id, entry, parse_json(value)?)?),
        _ => Err("expected `set KEY JSON` or `set KEY ENTRY JSON`".into()),
    }
}

fn print_output(value: &Value, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_set_with_entry() {
        let cli = Cli::try_parse_from(["jsondb", "set", "USER", "0", r#"{"a":1}"#]).unwrap();
        match cli.command {
            Command::Set { key, args } => {
                assert_eq!(key, "USER");
                assert_eq!(args, vec!["0", r#"{"a":1}"#]);
            }
            _ => panic!("expected set"),
        }
    }

    #[test]
    fn test_parse_json_argument() {
        assert_eq!(parse_json("[1, 2]").unwrap(), serde_json::json!([1, 2]));
        assert!(parse_json("{oops").is_err());
    }

    #[test]
    fn test_set_whole_and_entry() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut store = Store::open(tmp.path(), Default::default()).unwrap();
        store.create_table("user", serde_json::json!([])).unwrap();
        let id = store.resolve("USER").unwrap();

        set(&store, &id, &[r#"[{"name":"David"}]"#.to_string()]).unwrap();
        let value = set(&store, &id, &["1".to_string(), r#""x""#.to_string()]).unwrap();
        assert_eq!(value, serde_json::json!("x"));
        assert_eq!(
            store.browse(&id).unwrap().into_value(),
            serde_json::json!([{ "name": "David" }, "x"])
        );
        assert!(set(&store, &id, &["42".to_string()]).is_err());
    }

    fn run_in(root: &std::path::Path, args: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
        let root = root.to_str().unwrap();
        let argv = ["jsondb", "--root", root, "--format", "json"]
            .into_iter()
            .chain(args.iter().copied());
        run(Cli::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_run_resolves_configured_table_key() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(".json-dbrc"),
            "data:\n  user:\n    - name: David\n",
        )
        .unwrap();

        run_in(tmp.path(), &["create", "user", r#"{"name":"John"}"#]).unwrap();
        run_in(tmp.path(), &["edit", "USER", "1", r#"{"surname":"Smith"}"#]).unwrap();
        run_in(tmp.path(), &["read", "USER", "1"]).unwrap();

        let store = Store::discover(tmp.path()).unwrap();
        let id = store.resolve("USER").unwrap();
        assert_eq!(
            store.read(&id, "1").unwrap(),
            Some(serde_json::json!({ "name": "John", "surname": "Smith" }))
        );

        let err = run_in(tmp.path(), &["read", "MISSING", "0"]).unwrap_err();
        assert!(err.to_string().contains("MISSING"));
        let err = run_in(tmp.path(), &["set", "USER", "99999999999", "1"]).unwrap_err();
        assert!(err.to_string().contains("99999999999"));
    }
}

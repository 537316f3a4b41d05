pub mod config;
pub mod naming;
pub mod document;
pub mod registry;
pub mod store;
pub mod error;

pub use config::{EntryIdStrategy, StoreConfig};
pub use document::Document;
pub use error::{JsonDbError, Result};
pub use naming::TableKey;
pub use registry::TableId;
pub use store::{Projection, Selection, Store, ENTRY_ID_FIELD};

//! Storage backends for the catalog
//!
//! Backends implement the `ProductStore` trait. `SqliteStore` is the
//! persistent implementation; `MemoryStore` keeps everything in process.

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{OpenStore, ProductStore, StorageError, StorageResult};

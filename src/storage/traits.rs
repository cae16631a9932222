//! Storage trait definitions

use crate::catalog::{Attribute, Category, Product, ProductId, Registry};
use crate::query::{ProductQuery, ProductRow};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Lock poisoned: {0}")]
    Lock(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for catalog storage backends
///
/// Implementations must be thread-safe (Send + Sync): the enrichment
/// pipeline commits from blocking worker threads and queries may run
/// concurrently.
pub trait ProductStore: Send + Sync {
    // === Product Operations ===

    /// Delete every product. Returns the number removed.
    fn delete_all_products(&self) -> StorageResult<usize>;

    /// Insert a batch of products as one atomic write
    fn insert_products(&self, products: &[Product]) -> StorageResult<()>;

    /// Load a product by ID
    fn load_product(&self, id: &ProductId) -> StorageResult<Option<Product>>;

    /// Number of stored products
    fn count_products(&self) -> StorageResult<usize>;

    /// Run a planned query: type filter, filters, sort, projection
    fn find_products(&self, query: &ProductQuery) -> StorageResult<Vec<ProductRow>>;

    // === Registry Operations ===

    /// Create or replace an attribute definition
    fn save_attribute(&self, attribute: &Attribute) -> StorageResult<()>;

    /// Create or replace a category definition
    fn save_category(&self, category: &Category) -> StorageResult<()>;

    /// Fetch every attribute and category definition
    fn load_registry(&self) -> StorageResult<Registry>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: ProductStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}

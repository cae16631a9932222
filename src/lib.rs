//! Produpedia: product catalog core
//!
//! A catalog of products that belong to categories and carry an open-ended,
//! per-category set of typed attributes.
//!
//! # Core Concepts
//!
//! - **Registry**: attribute and category definitions, loaded once
//! - **Enrichment**: a batch pipeline that fills products from an external
//!   knowledge graph, one combined query per batch of stubs
//! - **Query**: plans the projected columns for a request (shown, interest
//!   fillers, sort keys) and runs filter, sort and projection over the store
//!
//! # Example
//!
//! ```
//! use produpedia::{CatalogApi, MemoryStore, RawQuery};
//! use std::sync::Arc;
//!
//! let api = CatalogApi::from_store(Arc::new(MemoryStore::new())).unwrap();
//! let response = api
//!     .search(&RawQuery { category: "city".into(), ..Default::default() })
//!     .unwrap();
//! assert!(response.products.is_empty());
//! ```

pub mod api;
pub mod catalog;
pub mod config;
pub mod enrich;
pub mod query;
pub mod storage;

pub use api::{import_registry, CatalogApi, RegistryDocument, SearchResponse};
pub use catalog::{
    Attribute, AttributeId, Category, Datum, DatumValue, Product, ProductData, ProductId, Registry, Value, ValueType,
};
pub use config::{ConfigError, Settings};
pub use enrich::{
    CancellationToken, EnrichmentPipeline, KnowledgeSource, PipelineConfig, RunAborted, RunReport, SparqlEndpoint,
};
pub use query::{QueryError, QueryRequest, QueryResult, RawQuery};
pub use storage::{MemoryStore, OpenStore, ProductStore, SqliteStore, StorageError, StorageResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

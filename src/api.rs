//! Transport-independent catalog API
//!
//! `CatalogApi` is the entry point for request-time operations. Transports
//! (the CLI today, an HTTP router tomorrow) hand it the raw `t`/`sh`/`so`/
//! `f`/`c` parameters and serialize the `SearchResponse` it returns.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::{Attribute, AttributeId, Category, Registry};
use crate::query::{self, ProductQuery, ProductRow, QueryRequest, QueryResult, RawQuery};
use crate::storage::{ProductStore, StorageResult};

/// Response body of a product search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub products: Vec<ProductRow>,
    /// Columns added by interest ranking rather than requested
    #[serde(rename = "extraIds")]
    pub extra_ids: Vec<AttributeId>,
}

/// Attribute and category definitions as provisioned out-of-band
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDocument {
    #[serde(default)]
    pub attributes: Vec<Attribute>,
    #[serde(default)]
    pub categories: Vec<Category>,
}

#[derive(Clone)]
pub struct CatalogApi {
    store: Arc<dyn ProductStore>,
    registry: Arc<Registry>,
}

impl CatalogApi {
    pub fn new(store: Arc<dyn ProductStore>, registry: Arc<Registry>) -> Self {
        Self { store, registry }
    }

    /// Build the API with the registry currently stored
    pub fn from_store(store: Arc<dyn ProductStore>) -> StorageResult<Self> {
        let registry = Arc::new(store.load_registry()?);
        Ok(Self { store, registry })
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Search products from the wire parameters
    pub fn search(&self, raw: &RawQuery) -> QueryResult<SearchResponse> {
        let request = QueryRequest::parse(raw)?;
        self.search_request(&request)
    }

    /// Plan and run an already parsed request
    pub fn search_request(&self, request: &QueryRequest) -> QueryResult<SearchResponse> {
        let started = Instant::now();
        request.validate(&self.registry)?;

        let plan = query::plan(request, &self.registry);
        debug!(
            category = %request.category,
            projected = plan.projected.len(),
            fillers = plan.fillers.len(),
            "planned columns"
        );

        let mut product_query = ProductQuery::new(request.category.as_str()).with_projection(plan.projected);
        for filter in &request.filters {
            product_query = product_query.with_filter(filter.clone());
        }
        for sorter in &request.sorters {
            product_query = product_query.with_sorter(sorter.clone());
        }

        let products = query::execute(self.store.as_ref(), &product_query)?;
        info!(
            category = %request.category,
            rows = products.len(),
            fillers = plan.fillers.len(),
            ms = started.elapsed().as_millis() as u64,
            "search complete"
        );

        Ok(SearchResponse {
            products,
            extra_ids: plan.fillers,
        })
    }
}

/// Store every definition in `document`. Returns (attributes, categories)
/// written.
pub fn import_registry(store: &dyn ProductStore, document: &RegistryDocument) -> StorageResult<(usize, usize)> {
    for attribute in &document.attributes {
        store.save_attribute(attribute)?;
    }
    for category in &document.categories {
        store.save_category(category)?;
    }
    info!(
        attributes = document.attributes.len(),
        categories = document.categories.len(),
        "imported registry definitions"
    );
    Ok((document.attributes.len(), document.categories.len()))
}

//! Filter + sort + projection over products

use super::request::{Filter, SortDirection, Sorter};
use crate::catalog::{AttributeId, Product, ProductData, ProductId, Value};
use crate::storage::{ProductStore, StorageResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A fully planned product query
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Implicit type filter: products must belong to this category
    pub category: String,
    pub filters: Vec<Filter>,
    pub sorters: Vec<Sorter>,
    /// Data keys to keep in each row
    pub projection: Vec<AttributeId>,
}

/// A projected product row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: ProductId,
    pub name: String,
    pub verified: bool,
    /// Projected slice of the product's data; empty, never absent
    pub data: ProductData,
}

impl ProductQuery {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_sorter(mut self, sorter: Sorter) -> Self {
        self.sorters.push(sorter);
        self
    }

    pub fn with_projection(mut self, projection: Vec<AttributeId>) -> Self {
        self.projection = projection;
        self
    }

    /// Type check plus every filter (logical AND)
    pub fn matches(&self, product: &Product) -> bool {
        product.is_of_type(&self.category) && self.filters.iter().all(|f| f.matches(&product.data))
    }

    /// Filter, sort and project a candidate set.
    ///
    /// The sort is stable, so candidates that tie on every key keep their
    /// input order.
    pub fn apply(&self, candidates: impl IntoIterator<Item = Product>) -> Vec<ProductRow> {
        let mut matched: Vec<Product> = candidates.into_iter().filter(|p| self.matches(p)).collect();
        if !self.sorters.is_empty() {
            matched.sort_by(|a, b| self.compare(&a.data, &b.data));
        }
        matched.into_iter().map(|p| self.project(p)).collect()
    }

    fn compare(&self, a: &ProductData, b: &ProductData) -> Ordering {
        for sorter in &self.sorters {
            let ord = compare_keys(sort_key(a, sorter), sort_key(b, sorter));
            let ord = match sorter.direction {
                SortDirection::Ascending => ord,
                SortDirection::Descending => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    fn project(&self, product: Product) -> ProductRow {
        let Product {
            id,
            name,
            verified,
            mut data,
            ..
        } = product;
        let data = self
            .projection
            .iter()
            .filter_map(|key| data.remove_entry(key.as_str()))
            .collect();
        ProductRow {
            id,
            name,
            verified,
            data,
        }
    }
}

/// The value a product sorts by: smallest element ascending, largest descending
fn sort_key<'a>(data: &'a ProductData, sorter: &Sorter) -> Option<&'a Value> {
    let values = data.get(sorter.attribute.as_str())?.values();
    match sorter.direction {
        SortDirection::Ascending => values.iter().min_by(|a, b| a.sort_cmp(b)),
        SortDirection::Descending => values.iter().max_by(|a, b| a.sort_cmp(b)),
    }
}

/// Missing keys compare as the minimum
fn compare_keys(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => a.sort_cmp(b),
    }
}

/// Run a planned query against a store
pub fn execute(store: &dyn ProductStore, query: &ProductQuery) -> StorageResult<Vec<ProductRow>> {
    store.find_products(query)
}

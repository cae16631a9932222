//! In-process storage backend

use super::traits::{ProductStore, StorageResult};
use crate::catalog::{Attribute, AttributeId, Category, Product, ProductId, Registry};
use crate::query::{ProductQuery, ProductRow};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// DashMap-backed store
///
/// Products remember their insertion sequence so query results tie-break
/// the same way the SQLite backend does.
#[derive(Debug, Default)]
pub struct MemoryStore {
    products: DashMap<ProductId, (u64, Product)>,
    attributes: DashMap<AttributeId, Attribute>,
    categories: DashMap<String, Category>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProductStore for MemoryStore {
    fn delete_all_products(&self) -> StorageResult<usize> {
        let removed = self.products.len();
        self.products.clear();
        Ok(removed)
    }

    fn insert_products(&self, products: &[Product]) -> StorageResult<()> {
        for product in products {
            let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
            self.products.insert(product.id.clone(), (seq, product.clone()));
        }
        Ok(())
    }

    fn load_product(&self, id: &ProductId) -> StorageResult<Option<Product>> {
        Ok(self.products.get(id).map(|r| r.value().1.clone()))
    }

    fn count_products(&self) -> StorageResult<usize> {
        Ok(self.products.len())
    }

    fn find_products(&self, query: &ProductQuery) -> StorageResult<Vec<ProductRow>> {
        let mut candidates: Vec<(u64, Product)> = self
            .products
            .iter()
            .filter(|r| r.value().1.is_of_type(&query.category))
            .map(|r| r.value().clone())
            .collect();
        candidates.sort_by_key(|(seq, _)| *seq);
        Ok(query.apply(candidates.into_iter().map(|(_, p)| p)))
    }

    fn save_attribute(&self, attribute: &Attribute) -> StorageResult<()> {
        self.attributes.insert(attribute.id.clone(), attribute.clone());
        Ok(())
    }

    fn save_category(&self, category: &Category) -> StorageResult<()> {
        self.categories.insert(category.name.clone(), category.clone());
        Ok(())
    }

    fn load_registry(&self) -> StorageResult<Registry> {
        let mut attributes: Vec<Attribute> = self.attributes.iter().map(|r| r.value().clone()).collect();
        attributes.sort_by(|a, b| a.id.cmp(&b.id));
        let categories = self.categories.iter().map(|r| r.value().clone()).collect();
        Ok(Registry::new(attributes, categories))
    }
}

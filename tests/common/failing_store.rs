//! Store wrapper that fails a chosen bulk write
//!
//! Delegates everything to a `MemoryStore`; the Nth `insert_products` call
//! (1-based) returns a storage error without writing anything.

use produpedia::catalog::ProductId;
use produpedia::query::{ProductQuery, ProductRow};
use produpedia::{
    Attribute, Category, MemoryStore, Product, ProductStore, Registry, StorageError, StorageResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct FailingStore {
    inner: MemoryStore,
    fail_on_insert: usize,
    inserts: AtomicUsize,
}

impl FailingStore {
    pub fn failing_on_insert(call: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_on_insert: call,
            inserts: AtomicUsize::new(0),
        }
    }

    pub fn insert_calls(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

impl ProductStore for FailingStore {
    fn delete_all_products(&self) -> StorageResult<usize> {
        self.inner.delete_all_products()
    }

    fn insert_products(&self, products: &[Product]) -> StorageResult<()> {
        let call = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on_insert {
            return Err(StorageError::Corrupt("database or disk is full".into()));
        }
        self.inner.insert_products(products)
    }

    fn load_product(&self, id: &ProductId) -> StorageResult<Option<Product>> {
        self.inner.load_product(id)
    }

    fn count_products(&self) -> StorageResult<usize> {
        self.inner.count_products()
    }

    fn find_products(&self, query: &ProductQuery) -> StorageResult<Vec<ProductRow>> {
        self.inner.find_products(query)
    }

    fn save_attribute(&self, attribute: &Attribute) -> StorageResult<()> {
        self.inner.save_attribute(attribute)
    }

    fn save_category(&self, category: &Category) -> StorageResult<()> {
        self.inner.save_category(category)
    }

    fn load_registry(&self) -> StorageResult<Registry> {
        self.inner.load_registry()
    }
}

//! Common test utilities for catalog integration tests
//!
//! Provides a deterministic in-process knowledge source, a fixture registry
//! and helpers for building stub streams.

#![allow(dead_code)]

pub mod failing_store;
pub mod mock_source;

pub use failing_store::FailingStore;
pub use mock_source::MockKnowledgeSource;

use produpedia::{Attribute, Category, ProductStore, Registry, ValueType};

/// Attributes for the `city` and `person` categories
pub fn fixture_attributes() -> Vec<Attribute> {
    vec![
        Attribute::new("pop", "populationTotal", ValueType::Number, "city")
            .with_bounds(Some(0.0), Some(1e10))
            .with_interest(90),
        Attribute::new("area", "areaTotal", ValueType::Number, "city")
            .with_float(true)
            .with_interest(70),
        Attribute::new("founded", "foundingDate", ValueType::Date, "city").with_interest(50),
        Attribute::new("mayor", "leaderName", ValueType::Resource, "city").with_interest(40),
        Attribute::new("nick", "nickname", ValueType::String, "city").with_interest(10),
        Attribute::new("lat", "lat", ValueType::Number, "city").with_float(true).with_interest(5),
        Attribute::new("height", "height", ValueType::Number, "person").with_interest(60),
    ]
}

pub fn fixture_categories() -> Vec<Category> {
    vec![Category::new("city", "City"), Category::new("person", "Person")]
}

pub fn fixture_registry() -> Registry {
    Registry::new(fixture_attributes(), fixture_categories())
}

/// Write the fixture definitions into `store`
pub fn provision(store: &dyn ProductStore) {
    for attribute in fixture_attributes() {
        store.save_attribute(&attribute).unwrap();
    }
    for category in fixture_categories() {
        store.save_category(&category).unwrap();
    }
}

/// One stub line per subject, all in category `City`
pub fn city_stubs(subjects: &[&str]) -> String {
    subjects
        .iter()
        .map(|s| format!("[\"{}\", {{\"categories\": [\"City\"], \"aliases\": []}}]\n", s))
        .collect()
}

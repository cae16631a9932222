//! Attribute registry: read-only lookup of attribute and category definitions
//!
//! Built once from the store before a pipeline run or a query and shared
//! behind an `Arc` afterwards.

use super::attribute::{Attribute, AttributeId};
use super::category::Category;
use super::product::reserved;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct Registry {
    attributes: Vec<Attribute>,
    by_id: HashMap<AttributeId, usize>,
    by_name: HashMap<String, usize>,
    categories: HashMap<String, Category>,
}

impl Registry {
    pub fn new(attributes: Vec<Attribute>, categories: Vec<Category>) -> Self {
        let mut by_id = HashMap::with_capacity(attributes.len());
        let mut by_name = HashMap::with_capacity(attributes.len());
        for (idx, attr) in attributes.iter().enumerate() {
            by_id.insert(attr.id.clone(), idx);
            by_name.insert(attr.name.clone(), idx);
        }
        let categories = categories.into_iter().map(|c| (c.name.clone(), c)).collect();

        Self {
            attributes,
            by_id,
            by_name,
            categories,
        }
    }

    pub fn attribute(&self, id: &str) -> Option<&Attribute> {
        self.by_id.get(id).map(|&idx| &self.attributes[idx])
    }

    pub fn attribute_by_name(&self, name: &str) -> Option<&Attribute> {
        self.by_name.get(name).map(|&idx| &self.attributes[idx])
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.get(name)
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    /// Whether `id` may be used as a query column
    pub fn is_column(&self, id: &str) -> bool {
        self.by_id.contains_key(id) || reserved::contains(id)
    }

    /// Up to `limit` attribute ids of `category`, not in `exclude`, ordered
    /// by descending interest with ties broken by ascending id.
    pub fn top_by_interest(
        &self,
        category: &str,
        exclude: &[AttributeId],
        limit: usize,
    ) -> Vec<AttributeId> {
        if limit == 0 {
            return Vec::new();
        }
        let excluded: HashSet<&AttributeId> = exclude.iter().collect();
        let mut candidates: Vec<&Attribute> = self
            .attributes
            .iter()
            .filter(|a| a.category == category && !excluded.contains(&a.id))
            .collect();
        candidates.sort_by(|a, b| b.interest.cmp(&a.interest).then_with(|| a.id.cmp(&b.id)));
        candidates
            .into_iter()
            .take(limit)
            .map(|a| a.id.clone())
            .collect()
    }
}

//! Product stubs: one line of the ingestion stream
//!
//! Each line is a JSON array `[subject, {categories, aliases, thumbnail?,
//! depiction?}]`. The subject is a compact resource identifier such as
//! `dbr:Berlin`.

use super::reconcile::{Reconciled, ReconcileConfig};
use crate::catalog::{reserved, Datum, Product, Value};
use serde::Deserialize;

/// Stub metadata carried next to the subject
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StubInfo {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub depiction: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stub {
    pub subject: String,
    pub info: StubInfo,
}

impl Stub {
    pub fn new(subject: impl Into<String>, info: StubInfo) -> Self {
        Self {
            subject: subject.into(),
            info,
        }
    }

    /// Parse one stream line
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        let (subject, info): (String, StubInfo) = serde_json::from_str(line)?;
        Ok(Self { subject, info })
    }

    pub fn has_categories(&self) -> bool {
        !self.info.categories.is_empty()
    }

    /// Build the product for this stub from its reconciled attribute map.
    ///
    /// Label, thumbnail and depiction become verified system data; category
    /// names get their first character lower-cased.
    pub fn into_product(self, reconciled: Reconciled, config: &ReconcileConfig) -> Product {
        let user = config.system_user.as_str();
        let mut data = reconciled.data;

        data.insert(
            reserved::LABEL.to_string(),
            Datum::new(Value::String(reconciled.label), user).verified(),
        );
        if let Some(thumbnail) = self.info.thumbnail {
            data.insert(
                reserved::THUMBNAIL.to_string(),
                Datum::new(Value::String(thumbnail), user).verified(),
            );
        }
        if let Some(depiction) = self.info.depiction {
            data.insert(
                reserved::DEPICTION.to_string(),
                Datum::new(Value::String(depiction), user).verified(),
            );
        }

        let mut product = Product::new(config.strip_resource_prefix(&self.subject), &config.source_tag);
        product.categories = self
            .info
            .categories
            .iter()
            .map(|c| lower_first(c))
            .collect();
        product.aliases = self.info.aliases.into_iter().collect();
        product.data = data;
        product
    }
}

/// `"City"` → `"city"`, `"SoccerClub"` → `"soccerClub"`
pub fn lower_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

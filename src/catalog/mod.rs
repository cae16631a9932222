//! Catalog data model: attributes, categories, products and their data

mod attribute;
mod category;
mod datum;
mod product;
mod registry;

pub use attribute::{Attribute, AttributeId, ValueType};
pub use category::Category;
pub use datum::{parse_date, Datum, DatumValue, ResourceRef, Value};
pub use product::{reserved, Product, ProductData, ProductId};
pub use registry::Registry;

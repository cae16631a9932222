//! Filter predicate evaluation over schema-less product data

use super::request::{Condition, Filter};
use crate::catalog::{ProductData, Value};
use std::cmp::Ordering;

impl Filter {
    /// Check whether a product's data satisfies this filter.
    ///
    /// Multi-valued data matches `eq`/`lt`/`gt` when any element does, and
    /// `ne` when no element equals the operand. A missing attribute only
    /// satisfies `nu` and `ne`.
    pub fn matches(&self, data: &ProductData) -> bool {
        let datum = data.get(self.attribute.as_str());
        match self.condition {
            Condition::Null => datum.is_none(),
            Condition::NotNull => datum.is_some(),
            Condition::Ne => datum.map_or(true, |d| {
                !d.values().iter().any(|v| self.compare(v) == Some(Ordering::Equal))
            }),
            Condition::Eq => self.any(datum.map(|d| d.values()), Ordering::Equal),
            Condition::Lt => self.any(datum.map(|d| d.values()), Ordering::Less),
            Condition::Gt => self.any(datum.map(|d| d.values()), Ordering::Greater),
        }
    }

    fn any(&self, values: Option<&[Value]>, wanted: Ordering) -> bool {
        values.map_or(false, |vs| vs.iter().any(|v| self.compare(v) == Some(wanted)))
    }

    fn compare(&self, value: &Value) -> Option<Ordering> {
        value.compare_operand(&self.operand)
    }
}

//! Dynamic attribute queries
//!
//! A request names a category, the columns the caller wants to see, sort
//! keys, filters and a desired column count. The planner settles the final
//! column set and the executor runs filter, sort and projection against the
//! store.

mod error;
mod executor;
mod filter;
mod planner;
mod request;

pub use error::{QueryError, QueryResult};
pub use executor::{execute, ProductQuery, ProductRow};
pub use planner::{plan, Plan};
pub use request::{Condition, Filter, QueryRequest, RawQuery, SortDirection, Sorter};

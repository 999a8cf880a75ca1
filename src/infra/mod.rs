//! Adapters between the advisor and its outside collaborators.

pub mod cache;
pub mod catalog;

pub use cache::{CompatCache, CompatibilityBuilder};
pub use catalog::{build_item_lookup, CatalogError, CatalogSource, RawCatalog, SnapshotFile};

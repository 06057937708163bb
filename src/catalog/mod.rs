//! Title Catalog - metadata caches and the eligibility filter

mod eligibility;
mod title_catalog;

pub use eligibility::{EligibilityFilter, Restriction};
pub use title_catalog::TitleCatalog;

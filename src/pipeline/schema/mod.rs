//! Star-schema construction: dimension tables with surrogate keys, then
//! fact tables joining cleaned data against them.

pub mod dimensions;
pub mod facts;

pub use dimensions::{build_dimensions, Dimensions};
pub use facts::{build_facts, is_placeholder, Facts};

use super::CleanedTables;

/// Builds the full warehouse for one run: every dimension first, then the
/// facts that reference them. Pure function of the cleaned tables.
pub fn build_schema(cleaned: &CleanedTables) -> (Dimensions, Facts) {
    let dims = build_dimensions(cleaned);
    let facts = build_facts(cleaned, &dims);
    (dims, facts)
}

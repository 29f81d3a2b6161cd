//! Source registry: loads all dataset definitions from embedded TOML configs.
//!
//! Each `.toml` file in `packages/source/sources/` is baked into the binary
//! at compile time via [`include_str!`]. Publishing a new yearly file means
//! adding a TOML file and an entry below. Order matters: the orchestrator
//! processes sources in the order listed here.

use crate::source_def::{SourceDefinition, parse_source_toml};

/// TOML configs embedded at compile time, oldest year first.
const SOURCE_TOMLS: &[(&str, &str)] = &[
    ("srag_2019", include_str!("../sources/srag_2019.toml")),
    ("srag_2020", include_str!("../sources/srag_2020.toml")),
    ("srag_2021", include_str!("../sources/srag_2021.toml")),
    ("srag_2022", include_str!("../sources/srag_2022.toml")),
    ("srag_2023", include_str!("../sources/srag_2023.toml")),
    ("srag_2024", include_str!("../sources/srag_2024.toml")),
    ("srag_2025", include_str!("../sources/srag_2025.toml")),
];

/// Total number of configured sources (used in tests).
#[cfg(test)]
const EXPECTED_SOURCE_COUNT: usize = 7;

/// Returns all configured source definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_sources() -> Vec<SourceDefinition> {
    SOURCE_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_source_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up a configured source by id.
#[must_use]
pub fn find_source(id: &str) -> Option<SourceDefinition> {
    all_sources().into_iter().find(|s| s.id() == id)
}

//! Deterministic providers built from keyword rules.
//!
//! They answer every documented ability without a model backend, which keeps
//! the CLI usable offline and gives tests a realistic baseline.

mod atlas;
mod common;

pub use atlas::RuleAtlasProvider;
pub use common::RuleCommonProvider;

//! Langie Config
//!
//! This crate contains the serializable input and configuration types for
//! langie. These types describe what the operator hands to the engine before
//! any stage runs:
//!
//! - [`TicketDef`]: the intake payload for one support request
//! - [`EngineSettings`]: branch/fallback policies and provider call policy
//! - [`KnowledgeBaseDef`]: the article file used by the rule-based providers
//!
//! Everything is loaded from JSON (via the CLI, or embedded by a host) and is
//! validated later, when the engine turns an intake into a workflow record.

mod enums;
mod error;
mod knowledge;
mod settings;
mod ticket;

pub use enums::{BranchPolicy, FallbackPolicy, Priority};
pub use error::ConfigError;
pub use knowledge::{ArticleDef, KnowledgeBaseDef};
pub use settings::{EngineSettings, ProviderPolicy};
pub use ticket::TicketDef;

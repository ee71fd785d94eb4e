//! Langie Engine
//!
//! The stage graph executor for support workflows.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                             │
//! │  - start(ticket) / resume(run_id, reply) → RunOutcome       │
//! │  - per-run locks, checkpoint after every stage              │
//! │  - run events via RunNotifier                               │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Stage functions                         │
//! │  - (record) → (RecordPatch, AuditDraft)                     │
//! │  - routing and merge rules in `policy`                      │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              CommonProvider / AtlasProvider                 │
//! │  - typed ability calls, neutral fallbacks on request        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use langie_engine::{Engine, EngineConfig, RunOutcome};
//!
//! let engine = Engine::new(
//!     EngineConfig::default(),
//!     Arc::new(RuleCommonProvider::new()),
//!     Arc::new(RuleAtlasProvider::default()),
//!     Arc::new(MemoryStore::new()),
//! );
//!
//! match engine.start(&ticket).await? {
//!     RunOutcome::Finished(record) => println!("{}", record.resolution_summary),
//!     RunOutcome::Suspended(record) => {
//!         println!("{}", record.clarification_prompt);
//!         engine.resume(&record.run_id, "it happens on the mobile app").await?;
//!     }
//! }
//! ```

mod calls;
mod engine;
mod error;
mod events;
mod locks;
pub mod policy;
mod stages;

pub use engine::{Engine, EngineConfig, RunOutcome};
pub use error::EngineError;
pub use events::{ChannelNotifier, NoopNotifier, RunEvent, RunNotifier};
pub use locks::RunLocks;
pub use stages::StageOutput;

//! Langie Workflow
//!
//! This crate provides the data the executor threads through a run:
//!
//! - [`Stage`] and [`StageGraph`]: the fixed stage sequence with its single
//!   branch point after DECIDE
//! - [`WorkflowRecord`]: the partially-populated document every stage reads
//! - [`RecordPatch`]: the delta a stage returns; applying it yields a new record
//! - [`AuditLedger`]: the append-only trail of stage executions
//!
//! Nothing in here calls a provider or touches storage. Stage functions live
//! in `langie-engine`, persistence in `langie-store`.

mod audit;
mod entities;
mod error;
mod graph;
mod patch;
mod record;
mod stage;

pub use audit::{AuditDraft, AuditEntry, AuditLedger, EntryStatus};
pub use entities::{Entities, Flags, REQUIRED_ENTITY_FIELDS, SlaRisk, StructuredData};
pub use error::WorkflowError;
pub use graph::StageGraph;
pub use patch::RecordPatch;
pub use record::{Route, RunStatus, WorkflowRecord};
pub use stage::Stage;

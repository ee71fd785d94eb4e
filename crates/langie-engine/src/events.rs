//! Run events and notifiers for observability.
//!
//! Events are emitted while a run executes so consumers can observe
//! progress, stream it to a UI, or collect it in tests.

use langie_workflow::{EntryStatus, RunStatus, Stage};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Events emitted during a run.
///
/// `invocation_id` identifies one `start` or `resume` call; a run that
/// suspends and resumes spans two invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunEvent {
  /// A new run has been accepted.
  RunStarted {
    invocation_id: String,
    run_id: String,
  },

  /// A suspended run has been handed a reply.
  RunResumed {
    invocation_id: String,
    run_id: String,
  },

  /// A stage has started executing.
  StageStarted {
    invocation_id: String,
    run_id: String,
    stage: Stage,
  },

  /// A stage has finished and its snapshot is persisted.
  StageCompleted {
    invocation_id: String,
    run_id: String,
    stage: Stage,
    status: EntryStatus,
  },

  /// The run is waiting for the requester.
  RunSuspended {
    invocation_id: String,
    run_id: String,
    prompt: String,
  },

  /// The run reached COMPLETE.
  RunCompleted {
    invocation_id: String,
    run_id: String,
    status: RunStatus,
  },

  /// The run was aborted.
  RunFailed {
    invocation_id: String,
    run_id: String,
    stage: Option<Stage>,
    error: String,
  },
}

/// Trait for receiving run events.
///
/// The engine calls `notify` for each event; implementations decide what to
/// do with them.
pub trait RunNotifier: Send + Sync {
  fn notify(&self, event: RunEvent);
}

/// A no-op notifier that discards all events.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

impl RunNotifier for NoopNotifier {
  fn notify(&self, _event: RunEvent) {}
}

/// A notifier that sends events to an unbounded channel.
///
/// Unbounded so a slow consumer never stalls a run; volume is a handful of
/// events per stage.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
  sender: mpsc::UnboundedSender<RunEvent>,
}

impl ChannelNotifier {
  pub fn new(sender: mpsc::UnboundedSender<RunEvent>) -> Self {
    Self { sender }
  }
}

impl RunNotifier for ChannelNotifier {
  fn notify(&self, event: RunEvent) {
    // Receiver may have been dropped
    let _ = self.sender.send(event);
  }
}

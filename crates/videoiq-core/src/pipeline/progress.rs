//! Progress Events
//!
//! The orchestrator reports through an unbounded channel so that rendering
//! never blocks indexing. Overall progress is monotone and reaches 1.0 only
//! at completion.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use super::IndexingState;

/// Discrete notification emitted during an analysis run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum IndexingEvent {
    /// Entered a new step
    StateChanged { state: IndexingState },
    /// Overall fraction in [0.0, 1.0]
    Progress {
        state: IndexingState,
        fraction: f32,
        message: String,
    },
    /// Non-fatal condition; the run continues
    Warning { message: String },
    /// Session is searchable
    #[serde(rename_all = "camelCase")]
    Completed {
        session_id: String,
        speech_records: usize,
        visual_records: usize,
    },
    /// Run aborted; nothing is searchable
    Failed { error: String },
}

/// Maps per-step progress onto the overall bar and forwards events
pub struct ProgressTracker {
    sender: Option<UnboundedSender<IndexingEvent>>,
    fraction: f32,
}

impl ProgressTracker {
    pub fn new(sender: Option<UnboundedSender<IndexingEvent>>) -> Self {
        Self {
            sender,
            fraction: 0.0,
        }
    }

    /// Last reported overall fraction
    pub fn fraction(&self) -> f32 {
        self.fraction
    }

    /// Sends an event; a dropped receiver is ignored
    pub fn emit(&self, event: IndexingEvent) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(event);
        }
    }

    pub fn state_changed(&self, state: IndexingState) {
        self.emit(IndexingEvent::StateChanged { state });
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(IndexingEvent::Warning {
            message: message.into(),
        });
    }

    /// Reports `done / total` of the work inside `state`'s band.
    ///
    /// Never moves backwards and stays below 1.0 until `complete`.
    pub fn report(&mut self, state: IndexingState, done: usize, total: usize, message: impl Into<String>) {
        let within = if total == 0 {
            1.0
        } else {
            (done as f32 / total as f32).clamp(0.0, 1.0)
        };
        let (lo, hi) = state.progress_band();
        let target = (lo + (hi - lo) * within).min(0.99);

        self.fraction = self.fraction.max(target);
        self.emit(IndexingEvent::Progress {
            state,
            fraction: self.fraction,
            message: message.into(),
        });
    }

    /// Reports 1.0; only called once, at `Complete`
    pub fn complete(&mut self, message: impl Into<String>) {
        self.fraction = 1.0;
        self.emit(IndexingEvent::Progress {
            state: IndexingState::Complete,
            fraction: 1.0,
            message: message.into(),
        });
    }
}

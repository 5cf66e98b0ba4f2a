//! Indexing State Machine

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Step of one analysis run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IndexingState {
    #[default]
    Idle,
    Resetting,
    Transcribing,
    EmbeddingSpeech,
    EmbeddingVisual,
    Complete,
    Failed,
}

impl IndexingState {
    /// Returns true for `Complete` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, IndexingState::Complete | IndexingState::Failed)
    }

    /// Returns true if the edge `self → next` exists.
    ///
    /// `Failed` is reachable from every non-terminal state.
    pub fn can_transition_to(&self, next: IndexingState) -> bool {
        use IndexingState::*;

        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Idle, Resetting) => true,
            (Resetting, Transcribing) => true,
            (Transcribing, EmbeddingSpeech) | (Transcribing, EmbeddingVisual) => true,
            (EmbeddingSpeech, EmbeddingVisual) | (EmbeddingSpeech, Complete) => true,
            (EmbeddingVisual, Complete) => true,
            _ => false,
        }
    }

    /// Checked transition
    pub fn transition_to(&mut self, next: IndexingState) -> CoreResult<()> {
        if !self.can_transition_to(next) {
            return Err(CoreError::Internal(format!(
                "Illegal indexing transition: {} -> {}",
                self, next
            )));
        }
        *self = next;
        Ok(())
    }

    /// Slice of overall progress owned by this step
    pub fn progress_band(&self) -> (f32, f32) {
        match self {
            IndexingState::Idle => (0.0, 0.0),
            IndexingState::Resetting => (0.0, 0.10),
            IndexingState::Transcribing => (0.10, 0.30),
            IndexingState::EmbeddingSpeech => (0.30, 0.50),
            IndexingState::EmbeddingVisual => (0.50, 0.99),
            IndexingState::Complete => (1.0, 1.0),
            IndexingState::Failed => (0.0, 0.0),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IndexingState::Idle => "idle",
            IndexingState::Resetting => "resetting",
            IndexingState::Transcribing => "transcribing",
            IndexingState::EmbeddingSpeech => "embeddingSpeech",
            IndexingState::EmbeddingVisual => "embeddingVisual",
            IndexingState::Complete => "complete",
            IndexingState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for IndexingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

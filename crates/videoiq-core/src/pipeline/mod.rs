//! Indexing Pipeline
//!
//! Drives one analysis run: reset → transcribe → embed speech → embed
//! frames → complete, reporting progress as discrete events.

pub mod orchestrator;
pub mod progress;
pub mod state;

pub use orchestrator::{IndexingConfig, IndexingOrchestrator};
pub use progress::{IndexingEvent, ProgressTracker};
pub use state::IndexingState;

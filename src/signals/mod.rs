pub mod consensus;
pub mod engine;

// Re-export the engine surface used by the dispatcher and config layers.
pub use consensus::ConsensusTracker;
pub use engine::{decide, SignalThresholds};

//! The computational engines: dissonance scoring, the bounded fixation
//! update law, vigilance drift monitoring, and the cycle engine composing
//! them into one input→output step.

pub mod cycle;
pub mod dissonance;
pub mod fixation;
pub mod vigilance;

pub use cycle::{CycleEngine, CycleOutcome};
pub use dissonance::DissonanceEngine;
pub use fixation::{ApplyTarget, FixationEngine, FixationResult, MethodOutcome, ScienceMode};
pub use vigilance::VigilanceMonitor;

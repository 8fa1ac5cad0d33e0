//! The concurrent orchestrator: owns the current state, runs the
//! conversation, autonomous, and vigilance loops, generates triggers, and
//! audits verbalized output.

pub mod audit;
pub mod config;
pub mod daemon;
pub mod stores;
pub mod triggers;

pub use daemon::{Boundaries, ConversationReply, Daemon, DaemonEvent, DaemonStats, Mode};
pub use triggers::TriggerGenerator;

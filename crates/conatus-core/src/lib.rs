//! Core value types for Conatus: the state tensor, shock and thought
//! records, boundary traits, and validated configuration.

pub mod config;
pub mod error;
pub mod tensor;
pub mod traits;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use tensor::{Channel, StateTensor, CHANNEL_COUNT, CHANNEL_DIM};
pub use types::{Impact, Thought, Trigger, VerbalizeReason};

//! A tabular Q-learning agent for discrete navigation tasks.
//!
//! The [`QTableAgent`] keeps one value estimate per (state, action) pair in a [`ValueTable`],
//! picks actions epsilon-greedily and persists its table through any [`Storage`] backend.
//! A [`Trainer`] drives it against an [`Environment`].

/// Implemented RL algorithms
pub mod algo;

/// Implementations of strategies for time-decaying hyperparameters
pub mod decay;

/// Environment
pub mod env;

/// Error types
pub mod error;

/// Exploration policies
pub mod exploration;

/// State labels
pub mod state;

/// Durable storage of table snapshots
pub mod storage;

/// State-action value table
pub mod table;

/// Training loop
pub mod train;

/// Testing environments
#[cfg(feature = "gym")]
pub mod gym;

mod util;

pub use algo::tabular::{QTableAgent, QTableAgentConfig};
pub use env::{Environment, Step};
pub use error::{Error, Result};
pub use state::{StateLabel, ToStateLabel};
pub use storage::{FileStorage, MemoryStorage, Storage};
pub use table::{Action, StateAction, ValueTable};
pub use train::{Checkpoint, Trainer, TrainerConfig};

//! Storage planning and commit engine. Compares a probed devicegraph with a
//! staging devicegraph, plans the actions that turn one into the other and
//! runs them on the system.

pub mod cli;
pub mod config;
pub mod engine;
pub mod lock;
pub mod logging;

pub use config::EngineConfig;
pub use engine::{
    actiongraph::{Action, ActionKind, Actiongraph},
    commit::{CommitCallbacks, CommitOptions, CommitReport, NoCallbacks},
    compound::{compound_actions, CompoundAction},
    Storage,
};
pub use logging::{background_log::BackgroundLog, multilog::MultiLogger};

/// Strata version as provided by the build.
pub const STRATA_VERSION: &str = env!("CARGO_PKG_VERSION");

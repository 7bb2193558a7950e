//! LiveSync library
//!
//! Presentation and startup layers of a live-reload development server:
//! event-driven console output, option merging and validation, and a small
//! static-file instance to drive them.

pub mod cli;
pub mod config;
pub mod events;
pub mod instance;
pub mod logger;
pub mod server;
pub mod snippet;
pub mod startup;
pub mod utils;

pub use cli::Cli;
pub use config::Options;
pub use events::{Emitter, EventKind};
pub use instance::{Instance, InstanceState, Registry};
pub use logger::{Logger, LoggerConfig};
pub use server::DevInstance;
pub use startup::{startup, StartArgs, Startup, StartupError};

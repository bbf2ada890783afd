//! hostbridge library
//!
//! Out-of-process automation for a compositing host that only exposes an
//! embedded script engine. Commands travel through a filesystem queue, script
//! bodies are compiled from typed arguments, and a timeline interpreter turns
//! a declarative project file into the command sequence.

pub mod cli;
pub mod command_queue;
pub mod config;
pub mod config_file;
pub mod error;
pub mod expand;
pub mod host;
pub mod host_process;
pub mod interpreter;
pub mod item_cache;
pub mod listener;
pub mod media;
pub mod poll;
pub mod readiness;
pub mod render;
pub mod script_runner;
pub mod script_template;
pub mod script_traits;
pub mod scripts;
pub mod types;
pub mod ui;

// Re-export main types for convenience
pub use command_queue::{CommandOutcome, CommandQueue, HostChannel, HostError};
pub use config::{Settings, Timeouts};
pub use config_file::{ProjectConfig, Scene};
pub use error::{AutomationError, Result};
pub use interpreter::{Interpreter, ResourceCatalog, RunSummary};
pub use item_cache::{HostItem, ItemCache};
pub use readiness::{ReadinessContext, ReadinessGate, ReadinessReport, ReadinessStage};
pub use script_runner::{ScriptOutput, ScriptRunner};
pub use script_traits::ScriptArgs;
pub use types::CustomAction;

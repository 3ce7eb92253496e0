//! Domain types for the ocrstack supervisor.
//!
//! This crate contains pure domain types with no process or network
//! dependencies: service descriptions, supervisor outcomes, settings with
//! validation, and filesystem path resolution. The runtime crate consumes
//! these; nothing here spawns a process.

pub mod outcome;
pub mod paths;
pub mod settings;
pub mod spec;

pub use outcome::{StartupFailureKind, SupervisorOutcome};
pub use paths::PathError;
pub use settings::{SettingsError, StackSettings};
pub use spec::{ServiceRole, ServiceSpec};

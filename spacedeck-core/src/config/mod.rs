//! Configuration types
//!
//! The console is described by one `ConsoleConfig`, assembled once at
//! startup and passed by reference to everything that needs it.

pub mod controls;
pub mod types;
pub mod validate;

pub use controls::*;
pub use types::*;
pub use validate::ConfigError;

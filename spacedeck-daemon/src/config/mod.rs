//! Console configuration loading

mod loader;

pub use loader::{load, parse, LoadError, Overrides, EMBEDDED_CONFIG};

//! Output models
//!
//! Pure descriptions of what the controller should show. The daemon turns
//! them into commands.

pub mod array;
pub mod progress;

pub use array::{LedArray, PASS_INDICATOR_PIN};
pub use progress::progress_colors;

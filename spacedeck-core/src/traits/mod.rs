//! Collaborator traits
//!
//! These traits define the interface between console logic and the
//! peripheral drivers that feed it or display its results.

pub mod feedback;
pub mod input;

pub use feedback::FeedbackSink;
pub use input::InputSource;

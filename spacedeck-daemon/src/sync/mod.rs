//! Coordinator session over TCP
//!
//! Messages are length-prefixed JSON. The console announces its controls
//! once, then reports changes; the coordinator answers with display
//! instructions and periodic keep-alives.

pub mod codec;
mod client;
pub mod messages;

pub use client::{SyncClient, SyncOptions};
pub use messages::SyncMessage;

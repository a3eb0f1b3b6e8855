//! Output staging and external sinks

mod sinks;
mod stage;

pub use sinks::{LogSoundSink, LogTextSink, SoundSink, TextSink};
pub use stage::{OutputStage, INITIAL_OXYGEN};

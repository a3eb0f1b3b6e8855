//! Display and sound collaborators
//!
//! Text rendering and audio playback live outside this daemon. These traits
//! are where a driver plugs in; the defaults only log.

use tracing::info;

/// Receives the text the console display should show
pub trait TextSink: Send {
    fn show(&mut self, text: &str);
}

/// Plays named sounds
pub trait SoundSink: Send {
    fn play(&mut self, name: &str);
}

/// Logs display changes
#[derive(Debug, Default)]
pub struct LogTextSink;

impl TextSink for LogTextSink {
    fn show(&mut self, text: &str) {
        info!(text, "display");
    }
}

/// Logs sounds instead of playing them
#[derive(Debug, Default)]
pub struct LogSoundSink;

impl SoundSink for LogSoundSink {
    fn play(&mut self, name: &str) {
        info!(sound = name, "play");
    }
}

//! Panel poller
//!
//! Everything that is not the controller: refreshes input readings, pushes
//! changed display text and plays queued sounds.

use std::sync::{Arc, Mutex};

use tokio::time::Instant;
use tracing::warn;

use super::poller::PollTask;
use crate::inputs::{InputDevice, PinBank};
use crate::outputs::{OutputStage, SoundSink, TextSink};

pub struct PanelPoller<D, T, S> {
    devices: Vec<D>,
    bank: Arc<PinBank>,
    stage: Arc<Mutex<OutputStage>>,
    text: T,
    sound: S,
    shown: Option<String>,
}

impl<D, T, S> PanelPoller<D, T, S>
where
    D: InputDevice + 'static,
    T: TextSink + 'static,
    S: SoundSink + 'static,
{
    pub fn new(
        devices: Vec<D>,
        bank: Arc<PinBank>,
        stage: Arc<Mutex<OutputStage>>,
        text: T,
        sound: S,
    ) -> Self {
        Self {
            devices,
            bank,
            stage,
            text,
            sound,
            shown: None,
        }
    }

    fn refresh_outputs(&mut self) {
        let Ok(mut stage) = self.stage.lock() else {
            return;
        };
        let text = stage.text(Instant::now()).to_string();
        let sounds = stage.take_sounds();
        drop(stage);

        if self.shown.as_deref() != Some(text.as_str()) {
            self.text.show(&text);
            self.shown = Some(text);
        }
        for name in sounds {
            self.sound.play(&name);
        }
    }
}

impl<D, T, S> PollTask for PanelPoller<D, T, S>
where
    D: InputDevice + 'static,
    T: TextSink + 'static,
    S: SoundSink + 'static,
{
    fn name(&self) -> &'static str {
        "panel"
    }

    async fn pass(&mut self) {
        for device in &mut self.devices {
            if let Err(e) = device.poll(&self.bank).await {
                warn!(device = device.name(), error = %e, "input poll failed");
            }
        }
        self.refresh_outputs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    use spacedeck_core::config::OutputsConfig;
    use spacedeck_core::traits::{FeedbackSink, InputSource};
    use spacedeck_core::Instruction;

    struct Toggle {
        level: bool,
    }

    impl InputDevice for Toggle {
        fn name(&self) -> &str {
            "toggle"
        }

        async fn poll(&mut self, bank: &PinBank) -> io::Result<()> {
            self.level = !self.level;
            bank.set_digital("toggle", 0, self.level);
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl TextSink for Recorder {
        fn show(&mut self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    impl SoundSink for Recorder {
        fn play(&mut self, name: &str) {
            self.0.lock().unwrap().push(format!("sound:{}", name));
        }
    }

    #[tokio::test]
    async fn test_text_pushed_only_on_change() {
        let bank = Arc::new(PinBank::new());
        let stage = Arc::new(Mutex::new(OutputStage::new(&OutputsConfig::default())));
        let shown = Recorder::default();
        let played = Recorder::default();
        let mut panel = PanelPoller::new(
            vec![Toggle { level: false }],
            Arc::clone(&bank),
            Arc::clone(&stage),
            shown.clone(),
            played.clone(),
        );

        stage
            .lock()
            .unwrap()
            .apply(Instruction::Display { text: "READY!".into() }, Instant::now());
        panel.pass().await;
        panel.pass().await;
        assert_eq!(*shown.0.lock().unwrap(), vec!["READY!".to_string()]);
        assert_eq!(bank.digital("toggle", 0), Some(false));

        stage.lock().unwrap().play_sound("chime");
        panel.pass().await;
        assert_eq!(*played.0.lock().unwrap(), vec!["sound:chime".to_string()]);
    }
}

//! Controller-facing poller
//!
//! Pushes whatever the output stage accumulated to the controller: LED
//! runs followed by a single latch, the LED-array bitmap, then scalar
//! outputs.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::warn;

use spacedeck_protocol::{Rgb, MAX_ARRAY_BYTES};

use super::poller::PollTask;
use crate::error::LinkError;
use crate::link::ControllerLink;
use crate::outputs::OutputStage;

pub struct ControllerPoller<P> {
    link: Arc<ControllerLink<P>>,
    stage: Arc<Mutex<OutputStage>>,
}

impl<P> ControllerPoller<P> {
    pub fn new(link: Arc<ControllerLink<P>>, stage: Arc<Mutex<OutputStage>>) -> Self {
        Self { link, stage }
    }
}

struct Pending {
    runs: Vec<(u8, Vec<Rgb>)>,
    array: Option<heapless::Vec<u8, MAX_ARRAY_BYTES>>,
    scalars: Vec<(u8, u16)>,
}

#[derive(Default)]
struct Sent {
    runs: usize,
    array: bool,
    scalars: usize,
}

impl<P> ControllerPoller<P>
where
    P: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn take_pending(&self) -> Option<Pending> {
        let mut stage = self.stage.lock().ok()?;
        Some(Pending {
            runs: stage.take_led_runs(),
            array: stage.next_array(),
            scalars: stage.take_scalars(),
        })
    }

    /// Send everything in `pending`, counting what got through
    async fn send_pending(&self, pending: &Pending, sent: &mut Sent) -> Result<(), LinkError> {
        for (first, colors) in &pending.runs {
            self.link.send_led_batch(*first, colors, false).await?;
            sent.runs += 1;
        }
        self.link.flush_latch().await?;
        if let Some(bitmap) = &pending.array {
            self.link.update_array(bitmap).await?;
            sent.array = true;
        }
        for &(tag, value) in &pending.scalars {
            self.link.set_scalar(tag, value).await?;
            sent.scalars += 1;
        }
        Ok(())
    }

    /// Hand unsent writes back to the stage so the next pass retries them
    fn restore(&self, pending: &Pending, sent: &Sent) {
        let Ok(mut stage) = self.stage.lock() else {
            return;
        };
        stage.restore_leds(&pending.runs[sent.runs..]);
        if pending.array.is_some() && !sent.array {
            stage.forget_sent_array();
        }
        stage.restore_scalars(&pending.scalars[sent.scalars..]);
    }

    async fn flush(&self, pending: Pending) -> Result<(), LinkError> {
        let mut sent = Sent::default();
        let result = self.send_pending(&pending, &mut sent).await;
        if result.is_err() {
            self.restore(&pending, &sent);
        }
        result
    }
}

impl<P> PollTask for ControllerPoller<P>
where
    P: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn name(&self) -> &'static str {
        "controller"
    }

    async fn pass(&mut self) {
        let Some(pending) = self.take_pending() else {
            return;
        };
        if let Err(e) = self.flush(pending).await {
            warn!(error = %e, "controller pass failed");
        }
    }
}

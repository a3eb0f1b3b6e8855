//! Framed command/response channel to the LED controller
//!
//! All traffic goes through one gate. A caller holds it for a single write,
//! or for a write followed by the matching read, so frames from different
//! tasks never interleave. Acquisition is bounded by the gate timeout.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use spacedeck_core::config::SerialConfig;
use spacedeck_protocol::{
    Command, ControllerResponse, Frame, FrameAccumulator, FrameError, Rgb, StateReport,
    MAX_ARRAY_BYTES, MAX_BATCH_LEDS,
};

use super::serial::SerialPort;
use crate::error::LinkError;

/// Link timing and color settings
#[derive(Debug, Clone, Copy)]
pub struct LinkOptions {
    pub gate_timeout: Duration,
    pub read_timeout: Duration,
    pub max_brightness: u8,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self::from(&SerialConfig::default())
    }
}

impl From<&SerialConfig> for LinkOptions {
    fn from(config: &SerialConfig) -> Self {
        Self {
            gate_timeout: Duration::from_millis(config.gate_timeout_ms as u64),
            read_timeout: Duration::from_millis(config.read_timeout_ms as u64),
            max_brightness: config.max_brightness,
        }
    }
}

/// Everything only the gate holder may touch
struct Channel<P> {
    port: BufReader<P>,
    accumulator: FrameAccumulator,
}

/// Exclusive-access link to the controller
pub struct ControllerLink<P> {
    channel: Mutex<Channel<P>>,
    options: LinkOptions,
    commands_sent: AtomicU64,
    latch_pending: AtomicBool,
}

impl ControllerLink<SerialPort> {
    /// Open the serial device
    pub fn connect(config: &SerialConfig) -> Result<Self, LinkError> {
        let port = SerialPort::open(Path::new(&config.port), config.baud_rate).map_err(|source| {
            LinkError::Connection {
                path: config.port.clone(),
                source,
            }
        })?;
        debug!(port = %config.port, baud = config.baud_rate, "serial link open");
        Ok(Self::new(port, LinkOptions::from(config)))
    }
}

impl<P> ControllerLink<P>
where
    P: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap an already open byte stream
    pub fn new(port: P, options: LinkOptions) -> Self {
        Self {
            channel: Mutex::new(Channel {
                port: BufReader::new(port),
                accumulator: FrameAccumulator::new(),
            }),
            options,
            commands_sent: AtomicU64::new(0),
            latch_pending: AtomicBool::new(false),
        }
    }

    /// Frames written since the link was opened
    pub fn commands_sent(&self) -> u64 {
        self.commands_sent.load(Ordering::Relaxed)
    }

    /// True when staged LED writes are waiting for a latch
    pub fn latch_pending(&self) -> bool {
        self.latch_pending.load(Ordering::Acquire)
    }

    async fn gate(&self) -> Result<MutexGuard<'_, Channel<P>>, LinkError> {
        timeout(self.options.gate_timeout, self.channel.lock())
            .await
            .map_err(|_| LinkError::GateTimeout(self.options.gate_timeout))
    }

    /// Send one raw frame: `opcode` followed by `payload`
    pub async fn send_command(&self, opcode: u8, payload: &[u8]) -> Result<(), LinkError> {
        let frame = Frame::with_opcode(opcode, payload)?;
        let mut channel = self.gate().await?;
        self.write_frame(&mut channel, &frame).await
    }

    /// Send a typed command
    pub async fn send(&self, command: &Command) -> Result<(), LinkError> {
        let frame = command.to_frame()?;
        let mut channel = self.gate().await?;
        self.write_frame(&mut channel, &frame).await
    }

    async fn write_frame(&self, channel: &mut Channel<P>, frame: &Frame) -> Result<(), LinkError> {
        let bytes = frame.encode_to_vec()?;
        let port = channel.port.get_mut();
        port.write_all(&bytes).await?;
        port.flush().await?;
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
        trace!(opcode = %char::from(frame.opcode()), len = bytes.len(), "frame sent");
        Ok(())
    }

    async fn read_frame(&self, channel: &mut Channel<P>) -> Result<Frame, LinkError> {
        loop {
            let byte = channel.port.read_u8().await?;
            match channel.accumulator.feed(byte) {
                Ok(Some(frame)) => return Ok(frame),
                Ok(None) => {}
                Err(FrameError::BufferOverflow) => {
                    warn!("controller frame overflowed the receive buffer");
                    return Err(LinkError::BufferOverflow);
                }
                Err(e) => {
                    warn!(error = ?e, "undecodable frame from controller");
                    return Err(e.into());
                }
            }
        }
    }

    /// Drop input nobody is waiting for, such as a reply that arrived
    /// after its request timed out
    async fn discard_stale(&self, channel: &mut Channel<P>) -> Result<(), LinkError> {
        let mut scratch = [0u8; 64];
        let mut discarded = channel.accumulator.len();
        channel.accumulator.reset();
        // A zero timeout still polls the read once, so only ready bytes go
        while let Ok(read) = timeout(Duration::ZERO, channel.port.read(&mut scratch)).await {
            match read? {
                0 => break,
                n => discarded += n,
            }
        }
        if discarded > 0 {
            debug!(bytes = discarded, "discarded stale controller input");
        }
        Ok(())
    }

    /// Ask the controller for its counters
    ///
    /// Holds the gate for the request and its response. Anything received
    /// before the request is written is discarded, so a late answer to an
    /// earlier request is never mistaken for this one.
    pub async fn request_state(&self) -> Result<StateReport, LinkError> {
        let frame = Command::GetState.to_frame()?;
        let mut channel = self.gate().await?;
        self.discard_stale(&mut channel).await?;
        self.write_frame(&mut channel, &frame).await?;

        let read_timeout = self.options.read_timeout;
        let response = match timeout(read_timeout, self.read_frame(&mut channel)).await {
            Ok(result) => result?,
            Err(_) => return Err(LinkError::Timeout(read_timeout)),
        };

        match ControllerResponse::from_frame(&response)? {
            ControllerResponse::StateReport(report) => Ok(report),
        }
    }

    /// Reboot the controller
    pub async fn reset(&self) -> Result<(), LinkError> {
        self.latch_pending.store(false, Ordering::Release);
        self.send(&Command::Reset).await
    }

    /// Show all staged LED writes
    pub async fn latch_leds(&self) -> Result<(), LinkError> {
        self.send(&Command::LatchLeds).await?;
        self.latch_pending.store(false, Ordering::Release);
        Ok(())
    }

    /// Latch only if a write is waiting for it
    pub async fn flush_latch(&self) -> Result<bool, LinkError> {
        if self.latch_pending.swap(false, Ordering::AcqRel) {
            if let Err(e) = self.send(&Command::LatchLeds).await {
                self.latch_pending.store(true, Ordering::Release);
                return Err(e);
            }
            return Ok(true);
        }
        Ok(false)
    }

    /// Stage one LED, scaled to the brightness ceiling
    pub async fn set_led(&self, index: u8, color: Rgb, latch: bool) -> Result<(), LinkError> {
        let command = Command::SetLed {
            index,
            color: color.scaled(self.options.max_brightness),
        };
        self.send(&command).await?;
        self.finish_write(latch).await
    }

    /// Stage a run of LEDs in groups of [`MAX_BATCH_LEDS`]
    ///
    /// Group `n` starts at `first + 10 * n`. The whole run goes out under
    /// one gate hold.
    pub async fn send_led_batch(&self, first: u8, colors: &[Rgb], latch: bool) -> Result<(), LinkError> {
        let last = first as usize + colors.len();
        if !colors.is_empty() && last - 1 > u8::MAX as usize {
            return Err(LinkError::LedIndexOutOfRange(last - 1));
        }

        let mut frames = Vec::with_capacity(colors.len().div_ceil(MAX_BATCH_LEDS));
        for (group, chunk) in colors.chunks(MAX_BATCH_LEDS).enumerate() {
            let mut scaled = heapless::Vec::new();
            for color in chunk {
                // Cannot fail: chunks are at most MAX_BATCH_LEDS long
                let _ = scaled.push(color.scaled(self.options.max_brightness));
            }
            let command = Command::SetLedBatch {
                first: first + (group * MAX_BATCH_LEDS) as u8,
                colors: scaled,
            };
            frames.push(command.to_frame()?);
        }

        {
            let mut channel = self.gate().await?;
            for frame in &frames {
                self.write_frame(&mut channel, frame).await?;
            }
        }
        self.finish_write(latch).await
    }

    async fn finish_write(&self, latch: bool) -> Result<(), LinkError> {
        if latch {
            self.latch_leds().await
        } else {
            self.latch_pending.store(true, Ordering::Release);
            Ok(())
        }
    }

    /// Replace the LED-array bitmap
    pub async fn update_array(&self, bitmap: &[u8]) -> Result<(), LinkError> {
        let mut bits = heapless::Vec::<u8, MAX_ARRAY_BYTES>::new();
        bits.extend_from_slice(bitmap)
            .map_err(|_| LinkError::Protocol(FrameError::PayloadTooLarge))?;
        self.send(&Command::SetArray { bitmap: bits }).await
    }

    /// Set a tagged 16-bit output
    pub async fn set_scalar(&self, tag: u8, value: u16) -> Result<(), LinkError> {
        self.send(&Command::SetScalar { tag, value }).await
    }
}

//! Controller hardware reset line

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::time::sleep;
use tracing::debug;

/// How long the line is held low
pub const RESET_PULSE: Duration = Duration::from_millis(100);

/// Something that can pull the controller's reset pin
pub trait ResetLine: Send {
    /// Drive the line low for [`RESET_PULSE`], then release it high
    fn pulse(&mut self) -> impl Future<Output = io::Result<()>> + Send;
}

/// Reset pin exposed through `/sys/class/gpio`
#[derive(Debug, Clone)]
pub struct SysfsResetLine {
    root: PathBuf,
    pin: u32,
}

impl SysfsResetLine {
    pub fn new(pin: u32) -> Self {
        Self::with_root("/sys/class/gpio", pin)
    }

    /// Use a different sysfs root (tests point this at a temp dir)
    pub fn with_root(root: impl Into<PathBuf>, pin: u32) -> Self {
        Self {
            root: root.into(),
            pin,
        }
    }

    fn pin_dir(&self) -> PathBuf {
        self.root.join(format!("gpio{}", self.pin))
    }

    async fn export(&self) -> io::Result<()> {
        if tokio::fs::metadata(self.pin_dir()).await.is_ok() {
            return Ok(());
        }
        tokio::fs::write(self.root.join("export"), self.pin.to_string()).await?;
        tokio::fs::write(self.pin_dir().join("direction"), "out").await
    }

    async fn set(&self, high: bool) -> io::Result<()> {
        let value = if high { "1" } else { "0" };
        tokio::fs::write(self.pin_dir().join("value"), value).await
    }
}

impl ResetLine for SysfsResetLine {
    async fn pulse(&mut self) -> io::Result<()> {
        self.export().await?;
        debug!(pin = self.pin, "pulsing controller reset");
        self.set(false).await?;
        sleep(RESET_PULSE).await;
        self.set(true).await
    }
}

/// For boards without a wired reset pin
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResetLine;

impl ResetLine for NoResetLine {
    async fn pulse(&mut self) -> io::Result<()> {
        Ok(())
    }
}

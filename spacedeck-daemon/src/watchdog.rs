//! Service-manager notifications
//!
//! Sends `READY=1` once the console is up and `WATCHDOG=1` on every main
//! loop iteration, over the datagram socket named by `$NOTIFY_SOCKET`. A
//! supervisor that stops hearing `WATCHDOG=1` restarts the process. With
//! no socket configured every call is a no-op.

use std::io;
use std::os::unix::net::{SocketAddr, UnixDatagram};
use std::path::PathBuf;

use tracing::{debug, warn};

const NOTIFY_SOCKET_ENV: &str = "NOTIFY_SOCKET";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Path(PathBuf),
    /// Linux abstract namespace, written `@name` in the environment
    Abstract(Vec<u8>),
}

impl Target {
    fn parse(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return None;
        }
        match raw.strip_prefix('@') {
            Some(name) => Some(Target::Abstract(name.as_bytes().to_vec())),
            None => Some(Target::Path(PathBuf::from(raw))),
        }
    }

    fn address(&self) -> io::Result<SocketAddr> {
        match self {
            Target::Path(path) => SocketAddr::from_pathname(path),
            Target::Abstract(name) => {
                use std::os::linux::net::SocketAddrExt;
                SocketAddr::from_abstract_name(name)
            }
        }
    }
}

/// Notifier bound to the service manager's socket, if there is one
#[derive(Debug)]
pub struct Watchdog {
    socket: Option<(UnixDatagram, SocketAddr)>,
    warned: bool,
}

impl Watchdog {
    /// Read `$NOTIFY_SOCKET`
    pub fn from_env() -> Self {
        let target = std::env::var(NOTIFY_SOCKET_ENV)
            .ok()
            .and_then(|raw| Target::parse(&raw));
        Self::for_target(target)
    }

    /// A notifier that never sends anything
    pub fn disabled() -> Self {
        Self {
            socket: None,
            warned: false,
        }
    }

    /// Notify a socket at `path`
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self::for_target(Some(Target::Path(path.into())))
    }

    fn for_target(target: Option<Target>) -> Self {
        let Some(target) = target else {
            debug!("no service manager socket, watchdog disabled");
            return Self::disabled();
        };

        let socket = UnixDatagram::unbound().and_then(|socket| {
            socket.set_nonblocking(true)?;
            Ok((socket, target.address()?))
        });
        match socket {
            Ok(socket) => Self {
                socket: Some(socket),
                warned: false,
            },
            Err(e) => {
                warn!(error = %e, ?target, "cannot set up service manager socket");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.socket.is_some()
    }

    /// Startup finished
    pub fn ready(&mut self) {
        self.notify("READY=1");
    }

    /// Main loop is still turning
    pub fn alive(&mut self) {
        self.notify("WATCHDOG=1");
    }

    /// Teardown started
    pub fn stopping(&mut self) {
        self.notify("STOPPING=1");
    }

    fn notify(&mut self, state: &str) {
        let Some((socket, addr)) = &self.socket else {
            return;
        };
        if let Err(e) = socket.send_to_addr(state.as_bytes(), addr) {
            // Once is enough; this runs every cycle
            if !self.warned {
                warn!(error = %e, state, "service manager notification failed");
                self.warned = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!(Target::parse(""), None);
        assert_eq!(
            Target::parse("/run/systemd/notify"),
            Some(Target::Path(PathBuf::from("/run/systemd/notify")))
        );
        assert_eq!(
            Target::parse("@spacedeck"),
            Some(Target::Abstract(b"spacedeck".to_vec()))
        );
    }

    #[test]
    fn test_disabled_is_silent() {
        let mut watchdog = Watchdog::disabled();
        assert!(!watchdog.is_enabled());
        watchdog.ready();
        watchdog.alive();
    }

    #[test]
    fn test_ready_then_alive() {
        let path = std::env::temp_dir().join(format!("spacedeck-notify-{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let listener = UnixDatagram::bind(&path).unwrap();

        let mut watchdog = Watchdog::at_path(&path);
        watchdog.ready();
        watchdog.alive();

        let mut buf = [0u8; 32];
        let n = listener.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"READY=1");
        let n = listener.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"WATCHDOG=1");
        std::fs::remove_file(path).unwrap();
    }
}

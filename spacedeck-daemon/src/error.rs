//! Daemon error types
//!
//! Each enum maps onto the shared [`ErrorKind`] taxonomy so the scheduler
//! can record why a session ended.

use std::io;
use std::time::Duration;

use thiserror::Error;

use spacedeck_core::state::ErrorKind;
use spacedeck_protocol::FrameError;

/// Controller link failures
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("cannot open serial device {path}: {source}")]
    Connection {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("serial I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("serial port busy for {0:?}")]
    GateTimeout(Duration),

    #[error("no response from controller within {0:?}")]
    Timeout(Duration),

    #[error("receive buffer overflowed before a frame terminator")]
    BufferOverflow,

    #[error("bad frame from controller: {0:?}")]
    Protocol(FrameError),

    #[error("LED index {0} is beyond the strip")]
    LedIndexOutOfRange(usize),
}

impl From<FrameError> for LinkError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::BufferOverflow => LinkError::BufferOverflow,
            other => LinkError::Protocol(other),
        }
    }
}

impl LinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LinkError::Connection { .. } | LinkError::Io(_) => ErrorKind::Connection,
            LinkError::GateTimeout(_) | LinkError::Timeout(_) => ErrorKind::Timeout,
            LinkError::BufferOverflow => ErrorKind::BufferOverflow,
            LinkError::Protocol(_) | LinkError::LedIndexOutOfRange(_) => ErrorKind::Protocol,
        }
    }
}

/// Coordinator session failures
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("cannot connect to coordinator at {addr}: {source}")]
    Connection {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("coordinator I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("coordinator closed the connection")]
    Closed,

    #[error("bad message from coordinator: {0}")]
    Protocol(String),

    #[error("coordinator stopped reading for {0:?}")]
    WriteStalled(Duration),

    #[error("coordinator session is not live")]
    SessionDead,

    #[error("sync client has not been started")]
    NotStarted,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Connection { .. } | SyncError::Io(_) => ErrorKind::Connection,
            SyncError::Protocol(_) => ErrorKind::Protocol,
            SyncError::Closed
            | SyncError::WriteStalled(_)
            | SyncError::SessionDead
            | SyncError::NotStarted => ErrorKind::SessionDead,
        }
    }
}

/// Fatal scheduler outcomes
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("controller did not answer after reset ({attempts} attempts)")]
    ResetFailed {
        attempts: u8,
        #[source]
        last: Option<LinkError>,
    },

    #[error("polling tasks did not complete a first pass within {0:?}")]
    WarmupTimeout(Duration),

    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("coordinator session died")]
    SessionDead,
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::ResetFailed { .. } | SchedulerError::WarmupTimeout(_) => {
                ErrorKind::Timeout
            }
            SchedulerError::Link(e) => e.kind(),
            SchedulerError::Sync(e) => e.kind(),
            SchedulerError::SessionDead => ErrorKind::SessionDead,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_mapping() {
        assert!(matches!(
            LinkError::from(FrameError::BufferOverflow),
            LinkError::BufferOverflow
        ));
        assert_eq!(
            LinkError::from(FrameError::UnexpectedOpcode(b'Q')).kind(),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn test_scheduler_kinds() {
        let err = SchedulerError::from(SyncError::SessionDead);
        assert_eq!(err.kind(), ErrorKind::SessionDead);

        let err = SchedulerError::ResetFailed {
            attempts: 5,
            last: None,
        };
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(
            err.to_string(),
            "controller did not answer after reset (5 attempts)"
        );
    }
}

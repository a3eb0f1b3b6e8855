//! Coordinator session
//!
//! The session owns two tasks. The writer drains an outbound channel onto
//! the socket, so `update` never waits on the network. A write that makes no
//! progress for the liveness threshold ends the writer. The receiver splits
//! inbound bytes into messages, refreshes liveness and queues instructions
//! for the main loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, trace, warn};

use spacedeck_core::config::SyncConfig;
use spacedeck_core::health::{HealthStatus, LivenessMonitor};
use spacedeck_core::sampler::CatalogEntry;
use spacedeck_core::state::ErrorKind;
use spacedeck_core::{Instruction, InstructionQueue, Value};

use super::codec::{self, MessageBuffer};
use super::messages::{Inbound, SyncMessage};
use crate::error::SyncError;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

const READ_CHUNK: usize = 4096;

/// Where and how strictly to talk to the coordinator
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// `host:port`
    pub addr: String,
    pub liveness_threshold: Duration,
}

impl From<&SyncConfig> for SyncOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            addr: format!("{}:{}", config.host, config.port),
            liveness_threshold: Duration::from_millis(config.liveness_threshold_ms as u64),
        }
    }
}

/// State shared with the receive task
struct Inbox {
    epoch: Instant,
    queue: Mutex<InstructionQueue>,
    liveness: Mutex<LivenessMonitor>,
}

impl Inbox {
    fn new(threshold: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            queue: Mutex::new(InstructionQueue::new()),
            liveness: Mutex::new(LivenessMonitor::new(threshold.as_millis() as u64)),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn refresh(&self) {
        let now = self.now_ms();
        if let Ok(mut liveness) = self.liveness.lock() {
            liveness.refresh(now);
        }
    }

    fn health(&self) -> HealthStatus {
        let now = self.now_ms();
        match self.liveness.lock() {
            Ok(liveness) => liveness.check(now),
            Err(_) => HealthStatus::Fault(ErrorKind::SessionDead),
        }
    }

    fn push(&self, instruction: Instruction) {
        let Ok(mut queue) = self.queue.lock() else {
            return;
        };
        if let Some(evicted) = queue.push(instruction) {
            warn!(?evicted, dropped = queue.dropped(), "instruction queue full, dropped oldest");
        }
    }

    fn pop(&self) -> Option<Instruction> {
        self.queue.lock().ok()?.pop()
    }

    /// Handle one complete message body
    fn dispatch(&self, body: &[u8]) {
        let message = match SyncMessage::from_json(body) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, len = body.len(), "skipping undecodable message");
                return;
            }
        };

        self.refresh();
        match message.inbound() {
            Inbound::Instruction(instruction) => {
                trace!(?instruction, "instruction received");
                self.push(instruction);
            }
            Inbound::KeepAlive => trace!("keep-alive"),
            Inbound::Malformed => {
                warn!(tag = %message.message, data = %message.data, "message payload unusable")
            }
            Inbound::Unknown => debug!(tag = %message.message, "ignoring unknown message"),
        }
    }
}

/// Live session with the coordinator
pub struct SyncClient {
    options: SyncOptions,
    stream: Option<(BoxedReader, BoxedWriter)>,
    inbox: Arc<Inbox>,
    outbound: Option<mpsc::UnboundedSender<Vec<u8>>>,
    shutdown: watch::Sender<bool>,
    receiver: Option<JoinHandle<Result<(), SyncError>>>,
    writer: Option<JoinHandle<Result<(), SyncError>>>,
}

impl SyncClient {
    /// A client that connects over TCP on [`start`](Self::start)
    pub fn new(options: SyncOptions) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inbox: Arc::new(Inbox::new(options.liveness_threshold)),
            options,
            stream: None,
            outbound: None,
            shutdown,
            receiver: None,
            writer: None,
        }
    }

    /// A client over an already connected byte stream
    pub fn with_stream<R, W>(reader: R, writer: W, options: SyncOptions) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let mut client = Self::new(options);
        client.stream = Some((Box::new(reader), Box::new(writer)));
        client
    }

    /// Connect, announce the catalog and start the session tasks
    pub async fn start(&mut self, catalog: &[CatalogEntry]) -> Result<(), SyncError> {
        let (reader, writer) = match self.stream.take() {
            Some(stream) => stream,
            None => self.connect().await?,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // Queued before the writer exists, so nothing can overtake it
        let announce = codec::encode(&SyncMessage::announce(catalog).to_json()?)?;
        tx.send(announce).map_err(|_| SyncError::SessionDead)?;
        info!(controls = catalog.len(), "announcing control catalog");

        self.inbox.refresh();
        self.outbound = Some(tx);
        self.writer = Some(tokio::spawn(send_loop(
            writer,
            rx,
            self.shutdown.subscribe(),
            self.options.liveness_threshold,
        )));
        self.receiver = Some(tokio::spawn(receive_loop(
            reader,
            Arc::clone(&self.inbox),
            self.shutdown.subscribe(),
        )));
        Ok(())
    }

    async fn connect(&self) -> Result<(BoxedReader, BoxedWriter), SyncError> {
        let stream = TcpStream::connect(&self.options.addr)
            .await
            .map_err(|source| SyncError::Connection {
                addr: self.options.addr.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            debug!(error = %e, "could not disable Nagle");
        }
        info!(addr = %self.options.addr, "connected to coordinator");
        let (reader, writer) = stream.into_split();
        Ok((Box::new(reader), Box::new(writer)))
    }

    /// Report a changed control; never waits on the socket
    pub fn update(&self, id: &str, value: &Value) -> Result<(), SyncError> {
        let outbound = self.outbound.as_ref().ok_or(SyncError::NotStarted)?;
        let bytes = codec::encode(&SyncMessage::set_state(id, value).to_json()?)?;
        outbound.send(bytes).map_err(|_| SyncError::SessionDead)
    }

    /// Oldest queued instruction, if any
    pub fn get_instruction(&self) -> Option<Instruction> {
        self.inbox.pop()
    }

    /// Both tasks alive and the coordinator heard from recently
    pub fn is_running(&self) -> bool {
        let alive = |task: &Option<JoinHandle<_>>| task.as_ref().is_some_and(|t| !t.is_finished());
        alive(&self.receiver) && alive(&self.writer) && self.inbox.health() == HealthStatus::Ok
    }

    /// Stop both tasks and close the socket
    ///
    /// Returns once the tasks have exited. Updates already queued are
    /// written before the socket closes unless the coordinator has stopped
    /// reading, in which case they are dropped.
    pub async fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        self.outbound = None;

        for (name, task) in [("receiver", self.receiver.take()), ("writer", self.writer.take())] {
            let Some(task) = task else { continue };
            match task.await {
                Ok(Ok(())) => debug!(task = name, "sync task stopped"),
                Ok(Err(e)) => warn!(task = name, error = %e, "sync task ended with error"),
                Err(e) => warn!(task = name, error = %e, "sync task panicked"),
            }
        }
        info!("coordinator session closed");
    }
}

async fn send_loop(
    mut writer: BoxedWriter,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    mut shutdown: watch::Receiver<bool>,
    stall_limit: Duration,
) -> Result<(), SyncError> {
    while let Some(bytes) = rx.recv().await {
        // Writes that complete straight away win, so a stop still flushes
        tokio::select! {
            biased;
            written = timeout(stall_limit, write_message(&mut writer, &bytes)) => match written {
                Ok(result) => result?,
                Err(_) => {
                    warn!(limit = ?stall_limit, "coordinator is not reading, abandoning writes");
                    return Err(SyncError::WriteStalled(stall_limit));
                }
            },
            _ = shutdown.changed() => {
                warn!("stopping with updates the coordinator never read");
                return Ok(());
            }
        }
    }
    // Best effort; the peer may already be gone
    if let Err(e) = timeout(stall_limit, writer.shutdown()).await.unwrap_or(Ok(())) {
        debug!(error = %e, "socket shutdown failed");
    }
    Ok(())
}

async fn write_message(writer: &mut BoxedWriter, bytes: &[u8]) -> Result<(), SyncError> {
    writer.write_all(bytes).await?;
    writer.flush().await?;
    Ok(())
}

async fn receive_loop(
    mut reader: BoxedReader,
    inbox: Arc<Inbox>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), SyncError> {
    let mut buffer = MessageBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            read = reader.read(&mut chunk) => read?,
        };
        if n == 0 {
            warn!("coordinator closed the connection");
            return Err(SyncError::Closed);
        }

        buffer.extend(&chunk[..n]);
        while let Some(body) = buffer.next_body()? {
            inbox.dispatch(&body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tokio::io::{duplex, DuplexStream};
    use tokio::time::sleep;

    fn options(threshold_ms: u64) -> SyncOptions {
        SyncOptions {
            addr: "unused:0".into(),
            liveness_threshold: Duration::from_millis(threshold_ms),
        }
    }

    fn client_pair(threshold_ms: u64) -> (SyncClient, DuplexStream) {
        let (local, remote) = duplex(8192);
        let (reader, writer) = tokio::io::split(local);
        (SyncClient::with_stream(reader, writer, options(threshold_ms)), remote)
    }

    fn catalog() -> Vec<CatalogEntry> {
        vec![CatalogEntry {
            id: "power".into(),
            state: "False".into(),
            actions: BTreeMap::new(),
        }]
    }

    fn wire(json: &str) -> Vec<u8> {
        codec::encode(json.as_bytes()).unwrap()
    }

    async fn read_messages(remote: &mut DuplexStream, count: usize) -> Vec<SyncMessage> {
        let mut buffer = MessageBuffer::new();
        let mut out = Vec::new();
        let mut chunk = [0u8; 512];
        while out.len() < count {
            let n = remote.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed early");
            buffer.extend(&chunk[..n]);
            while let Some(body) = buffer.next_body().unwrap() {
                out.push(SyncMessage::from_json(&body).unwrap());
            }
        }
        out
    }

    async fn next_instruction(client: &SyncClient) -> Instruction {
        timeout(Duration::from_secs(1), async {
            loop {
                if let Some(instruction) = client.get_instruction() {
                    return instruction;
                }
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("no instruction arrived")
    }

    #[tokio::test]
    async fn test_update_before_start() {
        let (client, _remote) = client_pair(1000);
        assert!(matches!(
            client.update("power", &Value::Bool(true)),
            Err(SyncError::NotStarted)
        ));
        assert!(!client.is_running());
    }

    #[tokio::test]
    async fn test_announce_precedes_updates() {
        let (mut client, mut remote) = client_pair(1000);
        client.start(&catalog()).await.unwrap();
        for level in 0..3 {
            client.update("dial", &Value::Int(level)).unwrap();
        }

        let messages = read_messages(&mut remote, 4).await;
        assert_eq!(messages[0].message, "announce");
        assert_eq!(messages[0].data["controls"][0]["id"], "power");
        for (i, msg) in messages[1..].iter().enumerate() {
            assert_eq!(msg.message, "set-state");
            assert_eq!(msg.data["state"], i.to_string());
        }
        client.stop().await;
    }

    #[tokio::test]
    async fn test_display_and_keepalive_in_one_read() {
        let (mut client, mut remote) = client_pair(1000);
        client.start(&catalog()).await.unwrap();

        let mut bytes = wire(r#"{"message":"set-display","data":{"message":"HELLO"}}"#);
        bytes.extend(wire(r#"{"message":"keep-alive","data":{}}"#));
        remote.write_all(&bytes).await.unwrap();

        assert_eq!(
            next_instruction(&client).await,
            Instruction::Display { text: "HELLO".into() }
        );
        sleep(Duration::from_millis(20)).await;
        assert_eq!(client.get_instruction(), None);
        assert!(client.is_running());
        client.stop().await;
    }

    #[tokio::test]
    async fn test_malformed_body_skipped() {
        let (mut client, mut remote) = client_pair(1000);
        client.start(&catalog()).await.unwrap();

        let mut bytes = wire("{not json");
        bytes.extend(wire(r#"{"message":"set-progress","data":{"value":75}}"#));
        remote.write_all(&bytes).await.unwrap();

        assert_eq!(
            next_instruction(&client).await,
            Instruction::Progress { value: 75.0 }
        );
        client.stop().await;
    }

    #[tokio::test]
    async fn test_liveness_lapses_and_recovers() {
        let (mut client, mut remote) = client_pair(50);
        client.start(&catalog()).await.unwrap();
        assert!(client.is_running());

        sleep(Duration::from_millis(80)).await;
        assert!(!client.is_running());

        remote
            .write_all(&wire(r#"{"message":"keep-alive","data":{}}"#))
            .await
            .unwrap();
        let revived = timeout(Duration::from_secs(1), async {
            while !client.is_running() {
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await;
        assert!(revived.is_ok());
        client.stop().await;
    }

    #[tokio::test]
    async fn test_stop_with_unread_backlog() {
        // Small pipe the remote never drains
        let (local, _remote) = duplex(64);
        let (reader, writer) = tokio::io::split(local);
        let mut client = SyncClient::with_stream(reader, writer, options(10_000));
        client.start(&catalog()).await.unwrap();
        for level in 0..50 {
            client.update("dial", &Value::Int(level)).unwrap();
        }

        let stopped = timeout(Duration::from_secs(2), client.stop()).await;
        assert!(stopped.is_ok(), "stop hung on a coordinator that never reads");
        assert!(!client.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_writer_ends_session() {
        let (local, _remote) = duplex(64);
        let (reader, writer) = tokio::io::split(local);
        let mut client = SyncClient::with_stream(reader, writer, options(500));
        client.start(&catalog()).await.unwrap();
        for level in 0..50 {
            client.update("dial", &Value::Int(level)).unwrap();
        }

        sleep(Duration::from_millis(600)).await;
        let writer = client.writer.take().unwrap();
        assert!(matches!(writer.await.unwrap(), Err(SyncError::WriteStalled(_))));
        client.stop().await;
    }

    #[tokio::test]
    async fn test_remote_close_ends_session() {
        let (mut client, remote) = client_pair(1000);
        client.start(&catalog()).await.unwrap();
        drop(remote);

        let ended = timeout(Duration::from_secs(1), async {
            while client.is_running() {
                sleep(Duration::from_millis(2)).await;
            }
        })
        .await;
        assert!(ended.is_ok());
        client.stop().await;
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut client = SyncClient::new(SyncOptions {
            addr: addr.to_string(),
            liveness_threshold: Duration::from_secs(1),
        });
        let err = client.start(&catalog()).await.unwrap_err();
        assert!(matches!(err, SyncError::Connection { .. }));
    }
}

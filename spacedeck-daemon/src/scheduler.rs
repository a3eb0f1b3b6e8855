//! Main sampling loop
//!
//! Drives the session from controller reset through announce and the
//! steady-state cycle, then tears everything down. Teardown runs on every
//! exit path, including errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use spacedeck_core::config::SchedulerConfig;
use spacedeck_core::state::{Event, Session, State};
use spacedeck_core::traits::FeedbackSink;
use spacedeck_core::{diff, Instruction, Snapshot, StateSampler};
use spacedeck_protocol::StateReport;

use crate::error::SchedulerError;
use crate::inputs::PinBank;
use crate::link::{ControllerLink, ResetLine};
use crate::outputs::OutputStage;
use crate::sync::SyncClient;
use crate::tasks::{spawn_poller, wait_until_warm, ControllerPoller, PollTask, PollerHandle, PollerOptions};
use crate::watchdog::Watchdog;

/// Shown once the controller answers after reset
pub const READY_TEXT: &str = "READY!";

/// Background music started after reset
pub const STARTUP_SOUND: &str = "ambient";

/// How often bounded start-up phases look at the stop flag
const STOP_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy)]
pub struct SchedulerOptions {
    pub cycle: Duration,
    pub reset_attempts: u8,
    pub reset_retry_delay: Duration,
    pub warmup_timeout: Duration,
    pub poller: PollerOptions,
}

impl From<&SchedulerConfig> for SchedulerOptions {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            cycle: Duration::from_millis(config.cycle_ms as u64),
            reset_attempts: config.reset_attempts,
            reset_retry_delay: Duration::from_millis(config.reset_retry_delay_ms as u64),
            warmup_timeout: Duration::from_millis(config.warmup_timeout_ms as u64),
            poller: PollerOptions::from(config),
        }
    }
}

/// Owns every long-lived piece of a console session
pub struct SchedulerLoop<P, R> {
    options: SchedulerOptions,
    session: Session,
    link: Arc<ControllerLink<P>>,
    reset_line: R,
    sampler: StateSampler,
    bank: Arc<PinBank>,
    stage: Arc<Mutex<OutputStage>>,
    /// `None` runs standalone, logging diffs instead of sending them
    sync: Option<SyncClient>,
    watchdog: Watchdog,
    stop: Arc<AtomicBool>,
}

impl<P, R> SchedulerLoop<P, R>
where
    P: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    R: ResetLine,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        options: SchedulerOptions,
        link: Arc<ControllerLink<P>>,
        reset_line: R,
        sampler: StateSampler,
        bank: Arc<PinBank>,
        stage: Arc<Mutex<OutputStage>>,
        sync: Option<SyncClient>,
        watchdog: Watchdog,
    ) -> Self {
        Self {
            options,
            session: Session::new(),
            link,
            reset_line,
            sampler,
            bank,
            stage,
            sync,
            watchdog,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that ends the loop at its next iteration
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn state(&self) -> State {
        self.session.state()
    }

    pub fn session(&self) -> Session {
        self.session
    }

    /// Run the whole session; returns after teardown
    pub async fn run<T: PollTask>(&mut self, panel: T) -> Result<(), SchedulerError> {
        let mut pollers = Vec::new();
        let result = self.run_session(panel, &mut pollers).await;

        match &result {
            Ok(()) => {
                self.session.apply(Event::StopRequested);
            }
            Err(e) => {
                error!(error = %e, state = ?self.session.state(), "session failed");
                self.session.apply(Event::Fault(e.kind()));
            }
        }

        self.teardown(pollers).await;
        result
    }

    async fn run_session<T: PollTask>(
        &mut self,
        panel: T,
        pollers: &mut Vec<PollerHandle>,
    ) -> Result<(), SchedulerError> {
        self.session.apply(Event::ResetRequested);
        if self.reset_controller().await?.is_none() {
            info!("stop requested during reset");
            return Ok(());
        }

        if let Ok(mut stage) = self.stage.lock() {
            stage.apply(
                Instruction::Display {
                    text: READY_TEXT.into(),
                },
                Instant::now(),
            );
            stage.play_sound(STARTUP_SOUND);
        }

        pollers.push(spawn_poller(
            ControllerPoller::new(Arc::clone(&self.link), Arc::clone(&self.stage)),
            self.options.poller,
        ));
        pollers.push(spawn_poller(panel, self.options.poller));
        let warm = tokio::select! {
            warm = wait_until_warm(pollers, self.options.warmup_timeout) => warm,
            _ = stop_signalled(&self.stop) => {
                info!("stop requested during warm-up");
                return Ok(());
            }
        };
        if let Err(cold) = warm {
            warn!(?cold, "pollers did not finish a first pass");
            return Err(SchedulerError::WarmupTimeout(self.options.warmup_timeout));
        }
        self.session.apply(Event::ControllerReady);

        let mut previous = self.sample();
        match self.sync.as_mut() {
            Some(sync) => sync.start(&self.sampler.catalog()).await?,
            None => {
                for entry in self.sampler.catalog() {
                    info!(id = %entry.id, state = %entry.state, "control");
                }
            }
        }

        self.watchdog.ready();
        self.session.apply(Event::LoopStarted);
        info!(controls = self.sampler.len(), networked = self.sync.is_some(), "console running");

        let mut ticker = interval(self.options.cycle);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        while !self.stop_requested() {
            ticker.tick().await;
            previous = self.cycle(previous)?;
        }
        info!("stop requested");
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Pulse reset, then probe until the controller answers
    ///
    /// Returns `None` when a stop arrives before the controller does.
    async fn reset_controller(&mut self) -> Result<Option<StateReport>, SchedulerError> {
        if let Err(e) = self.reset_line.pulse().await {
            warn!(error = %e, "reset pulse failed, relying on the reset command");
        }
        self.link.reset().await?;

        let attempts = self.options.reset_attempts;
        let mut last = None;
        for attempt in 1..=attempts {
            sleep(self.options.reset_retry_delay).await;
            if self.stop_requested() {
                return Ok(None);
            }
            match self.link.request_state().await {
                Ok(report) => {
                    info!(
                        attempt,
                        received = report.commands_received,
                        bad = report.bad_commands,
                        throttle = ?report.throttle,
                        "controller ready"
                    );
                    return Ok(Some(report));
                }
                Err(e) => {
                    warn!(attempt, error = %e, "controller probe failed");
                    last = Some(e);
                }
            }
        }
        Err(SchedulerError::ResetFailed { attempts, last })
    }

    fn sample(&mut self) -> Snapshot {
        match self.stage.lock() {
            Ok(mut stage) => self.sampler.generate(self.bank.as_ref(), &mut *stage),
            // A panicked poller poisoned the stage; keep sampling without feedback
            Err(poisoned) => self.sampler.generate(self.bank.as_ref(), &mut *poisoned.into_inner()),
        }
    }

    /// One steady-state iteration
    fn cycle(&mut self, previous: Snapshot) -> Result<Snapshot, SchedulerError> {
        let next = self.sample();
        let changes = diff(&previous, &next);

        match &self.sync {
            Some(sync) => {
                for (id, value) in &changes {
                    debug!(%id, %value, "state change");
                    sync.update(id, value)?;
                }
                if !sync.is_running() {
                    return Err(SchedulerError::SessionDead);
                }
                self.drain_instructions();
            }
            None => {
                for (id, value) in &changes {
                    info!(%id, %value, "state change");
                }
            }
        }

        self.watchdog.alive();
        Ok(next)
    }

    fn drain_instructions(&mut self) {
        let Some(sync) = &self.sync else { return };
        let now = Instant::now();
        while let Some(instruction) = sync.get_instruction() {
            debug!(?instruction, "applying instruction");
            if let Ok(mut stage) = self.stage.lock() {
                stage.apply(instruction, now);
            }
        }
    }

    async fn teardown(&mut self, pollers: Vec<PollerHandle>) {
        self.watchdog.stopping();
        if let Some(sync) = self.sync.as_mut() {
            sync.stop().await;
        }
        for poller in &pollers {
            poller.stop();
        }
        for poller in pollers {
            poller.join(self.options.warmup_timeout).await;
        }
        info!(commands_sent = self.link.commands_sent(), "controller link idle");
        self.session.apply(Event::TeardownComplete);
    }
}

/// Resolves once `stop` is set
async fn stop_signalled(stop: &AtomicBool) {
    while !stop.load(Ordering::Acquire) {
        sleep(STOP_POLL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt, DuplexStream};

    use spacedeck_core::config::{ControlConfig, OutputsConfig};
    use spacedeck_core::state::ErrorKind;
    use spacedeck_protocol::Command;

    use crate::link::{spawn_fake_controller, LinkOptions, NoResetLine};
    use crate::sync::codec::{self, MessageBuffer};
    use crate::sync::{SyncMessage, SyncOptions};

    struct Idle;

    impl PollTask for Idle {
        fn name(&self) -> &'static str {
            "idle"
        }

        async fn pass(&mut self) {}
    }

    struct CountingReset(Arc<AtomicBool>);

    impl ResetLine for CountingReset {
        async fn pulse(&mut self) -> io::Result<()> {
            self.0.store(true, Ordering::Release);
            Ok(())
        }
    }

    fn options() -> SchedulerOptions {
        SchedulerOptions {
            cycle: Duration::from_millis(5),
            reset_attempts: 3,
            reset_retry_delay: Duration::from_millis(5),
            warmup_timeout: Duration::from_millis(500),
            poller: PollerOptions {
                interval: Duration::from_millis(5),
                deadline: Duration::from_millis(30),
            },
        }
    }

    fn link(host: DuplexStream) -> Arc<ControllerLink<DuplexStream>> {
        Arc::new(ControllerLink::new(
            host,
            LinkOptions {
                gate_timeout: Duration::from_millis(200),
                read_timeout: Duration::from_millis(50),
                max_brightness: 255,
            },
        ))
    }

    fn build<R: ResetLine>(
        link: Arc<ControllerLink<DuplexStream>>,
        reset: R,
        bank: Arc<PinBank>,
        sync: Option<SyncClient>,
    ) -> SchedulerLoop<DuplexStream, R> {
        let mut power = ControlConfig::digital("power", "gpio", 4);
        power.light = Some(0);
        SchedulerLoop::new(
            options(),
            link,
            reset,
            StateSampler::from_config(&[power]),
            bank,
            Arc::new(Mutex::new(OutputStage::new(&OutputsConfig {
                array_chips: 0,
                ..OutputsConfig::default()
            }))),
            sync,
            Watchdog::disabled(),
        )
    }

    #[tokio::test]
    async fn test_reset_failure_is_fatal() {
        let (host, device) = duplex(4096);
        let _rx = spawn_fake_controller(device, None);
        let pulsed = Arc::new(AtomicBool::new(false));
        let mut scheduler = build(
            link(host),
            CountingReset(Arc::clone(&pulsed)),
            Arc::new(PinBank::new()),
            None,
        );

        let err = scheduler.run(Idle).await.unwrap_err();
        assert!(matches!(err, SchedulerError::ResetFailed { attempts: 3, .. }));
        assert!(pulsed.load(Ordering::Acquire));
        assert_eq!(scheduler.state(), State::Stopped);
        assert_eq!(scheduler.session().fault(), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_stop_during_reset_skips_state_requests() {
        let (host, device) = duplex(4096);
        let mut rx = spawn_fake_controller(device, None);
        let mut scheduler = build(link(host), NoResetLine, Arc::new(PinBank::new()), None);

        scheduler.stop_flag().store(true, Ordering::Release);
        scheduler.run(Idle).await.unwrap();
        assert_eq!(scheduler.state(), State::Stopped);
        assert_eq!(scheduler.session().fault(), None);

        sleep(Duration::from_millis(20)).await;
        let mut commands = Vec::new();
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }
        assert_eq!(commands, vec![Command::Reset]);
    }

    #[tokio::test]
    async fn test_stop_during_warmup() {
        struct Stuck;

        impl PollTask for Stuck {
            fn name(&self) -> &'static str {
                "stuck"
            }

            async fn pass(&mut self) {
                std::future::pending::<()>().await
            }
        }

        let (host, device) = duplex(4096);
        let _rx = spawn_fake_controller(device, Some(StateReport::default()));
        let mut scheduler = build(link(host), NoResetLine, Arc::new(PinBank::new()), None);

        let stop = scheduler.stop_flag();
        tokio::spawn(async move {
            sleep(Duration::from_millis(60)).await;
            stop.store(true, Ordering::Release);
        });
        // A stop, not a warm-up timeout, and teardown still finishes
        scheduler.run(Stuck).await.unwrap();
        assert_eq!(scheduler.state(), State::Stopped);
        assert_eq!(scheduler.session().fault(), None);
    }

    #[tokio::test]
    async fn test_local_mode_runs_until_stopped() {
        let (host, device) = duplex(4096);
        let mut rx = spawn_fake_controller(device, Some(StateReport::default()));
        let bank = Arc::new(PinBank::new());
        bank.set_digital("gpio", 4, true);
        let mut scheduler = build(link(host), NoResetLine, Arc::clone(&bank), None);

        let stop = scheduler.stop_flag();
        tokio::spawn(async move {
            sleep(Duration::from_millis(100)).await;
            stop.store(true, Ordering::Release);
        });
        scheduler.run(Idle).await.unwrap();
        assert_eq!(scheduler.state(), State::Stopped);
        assert_eq!(scheduler.session().fault(), None);

        let mut commands = Vec::new();
        while let Ok(command) = rx.try_recv() {
            commands.push(command);
        }
        assert_eq!(commands[0], Command::Reset);
        assert_eq!(commands[1], Command::GetState);
        // The lit power switch reached the controller through the stage
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::SetLedBatch { first: 0, colors } if colors.len() == 1
        )));
    }

    async fn read_messages(remote: &mut DuplexStream, count: usize) -> Vec<SyncMessage> {
        let mut buffer = MessageBuffer::new();
        let mut out = Vec::new();
        let mut chunk = [0u8; 512];
        while out.len() < count {
            let n = remote.read(&mut chunk).await.unwrap();
            assert!(n > 0);
            buffer.extend(&chunk[..n]);
            while let Some(body) = buffer.next_body().unwrap() {
                out.push(SyncMessage::from_json(&body).unwrap());
            }
        }
        out
    }

    #[tokio::test]
    async fn test_networked_session_announces_then_dies() {
        let (host, device) = duplex(4096);
        let _rx = spawn_fake_controller(device, Some(StateReport::default()));
        let bank = Arc::new(PinBank::new());
        bank.set_digital("gpio", 4, false);

        let (local, mut remote) = duplex(8192);
        let (reader, writer) = tokio::io::split(local);
        let sync = SyncClient::with_stream(
            reader,
            writer,
            SyncOptions {
                addr: "test".into(),
                liveness_threshold: Duration::from_millis(150),
            },
        );
        let mut scheduler = build(link(host), NoResetLine, Arc::clone(&bank), Some(sync));

        let coordinator = tokio::spawn(async move {
            let first = read_messages(&mut remote, 1).await;
            remote
                .write_all(&codec::encode(br#"{"message":"set-display","data":{"message":"GO"}}"#).unwrap())
                .await
                .unwrap();
            bank.set_digital("gpio", 4, true);
            let second = read_messages(&mut remote, 1).await;
            // Stay connected but silent until the session lapses
            let mut sink = Vec::new();
            let _ = remote.read_to_end(&mut sink).await;
            (first, second)
        });

        let err = scheduler.run(Idle).await.unwrap_err();
        assert!(matches!(err, SchedulerError::SessionDead));
        assert_eq!(scheduler.session().fault(), Some(ErrorKind::SessionDead));
        assert_eq!(scheduler.state(), State::Stopped);

        let (first, second) = coordinator.await.unwrap();
        assert_eq!(first[0].message, "announce");
        assert_eq!(first[0].data["controls"][0]["state"], "False");
        assert_eq!(second[0].message, "set-state");
        assert_eq!(second[0].data["id"], "power");
        assert_eq!(second[0].data["state"], "True");
    }
}

//! Fixed-cadence polling tasks
//!
//! A poller repeats one pass at a steady interval until told to stop. It
//! records when its first pass has finished so the scheduler does not
//! start sampling on empty readings, and it logs passes that overrun the
//! soft deadline without ever aborting them.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use spacedeck_core::config::SchedulerConfig;

/// One unit of periodic work
pub trait PollTask: Send + 'static {
    fn name(&self) -> &'static str;

    /// Run a single pass; failures are handled and logged inside
    fn pass(&mut self) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy)]
pub struct PollerOptions {
    pub interval: Duration,
    pub deadline: Duration,
}

impl From<&SchedulerConfig> for PollerOptions {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms as u64),
            deadline: Duration::from_millis(config.poll_deadline_ms as u64),
        }
    }
}

/// Running poller
pub struct PollerHandle {
    name: &'static str,
    first_pass: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True once a full pass has completed
    pub fn is_warm(&self) -> bool {
        self.first_pass.load(Ordering::Acquire)
    }

    /// Ask the poller to exit after its current pass
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    /// Wait for the poller to exit, aborting it if its current pass is
    /// still running after `grace`
    pub async fn join(mut self, grace: Duration) {
        match timeout(grace, &mut self.task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(task = self.name, error = %e, "poller panicked"),
            Err(_) => {
                warn!(task = self.name, grace_ms = grace.as_millis() as u64, "poller stuck, aborting");
                self.task.abort();
            }
        }
    }
}

/// Start `task` on the runtime
pub fn spawn_poller<T: PollTask>(mut task: T, options: PollerOptions) -> PollerHandle {
    let name = task.name();
    let first_pass = Arc::new(AtomicBool::new(false));
    let stop = Arc::new(AtomicBool::new(false));

    let handle = {
        let first_pass = Arc::clone(&first_pass);
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            debug!(task = name, "poller started");
            let mut ticker = interval(options.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while !stop.load(Ordering::Acquire) {
                ticker.tick().await;

                let started = Instant::now();
                task.pass().await;
                let elapsed = started.elapsed();
                if elapsed > options.deadline {
                    warn!(
                        task = name,
                        elapsed_ms = elapsed.as_millis() as u64,
                        deadline_ms = options.deadline.as_millis() as u64,
                        "poll pass overran its deadline"
                    );
                }
                first_pass.store(true, Ordering::Release);
            }
            debug!(task = name, "poller stopped");
        })
    };

    PollerHandle {
        name,
        first_pass,
        stop,
        task: handle,
    }
}

/// Wait until every poller has finished a pass, or `limit` elapses
///
/// Returns the names of pollers still cold at the deadline.
pub async fn wait_until_warm(pollers: &[PollerHandle], limit: Duration) -> Result<(), Vec<&'static str>> {
    let warm = timeout(limit, async {
        while !pollers.iter().all(PollerHandle::is_warm) {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await;

    match warm {
        Ok(()) => Ok(()),
        Err(_) => Err(pollers.iter().filter(|p| !p.is_warm()).map(|p| p.name).collect()),
    }
}

/// Event folding and timed publishing loop
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::aggregator::{ConditionsAggregator, StalenessGuard};
use crate::models::MeasurementEvent;
use crate::publish::Publisher;
use crate::utils::{format_datetime, truncate_for_log, Clock};

pub const DEFAULT_PUBLISH_INTERVAL: Duration = Duration::from_secs(60);
const LOGGED_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Draining,
    Stopped,
}

/// Result of one timer tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Snapshot too old; nothing was sent
    Stale,
    Published { succeeded: usize, failed: usize },
}

/// Single consumer of measurement events
///
/// Each loop iteration waits on exactly one of: cancellation, the next
/// event, or the publish timer. Cancellation is checked first. A publish
/// runs to completion inside its iteration, so nothing is in flight once
/// the loop has seen the cancellation.
pub struct PublishScheduler {
    aggregator: Arc<ConditionsAggregator>,
    publishers: Vec<Box<dyn Publisher>>,
    clock: Arc<dyn Clock>,
    guard: StalenessGuard,
    interval: Duration,
    state: SchedulerState,
}

impl PublishScheduler {
    pub fn new(
        aggregator: Arc<ConditionsAggregator>,
        publishers: Vec<Box<dyn Publisher>>,
        clock: Arc<dyn Clock>,
        guard: StalenessGuard,
        interval: Duration,
    ) -> Self {
        Self {
            aggregator,
            publishers,
            clock,
            guard,
            interval,
            state: SchedulerState::Running,
        }
    }

    /// Run until cancelled or the event channel closes
    ///
    /// A dropped cancellation sender counts as cancellation.
    pub async fn run(
        &mut self,
        mut events: UnboundedReceiver<MeasurementEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) -> SchedulerState {
        info!(
            "Publishing every {}s to {} sink(s), stale after {}s",
            self.interval.as_secs(),
            self.publishers.len(),
            self.guard.max_age().whole_seconds()
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.state == SchedulerState::Running {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    self.state = SchedulerState::Draining;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        debug!("Applying reading stamped {}", format_datetime(&event.timestamp()));
                        self.aggregator.apply(event);
                    }
                    None => {
                        warn!("Event channel closed");
                        self.state = SchedulerState::Draining;
                    }
                },
                _ = ticker.tick() => {
                    self.flush().await;
                }
            }
        }

        events.close();
        info!("Draining complete, scheduler stopped");
        self.state = SchedulerState::Stopped;
        self.state
    }

    /// Publish the current snapshot to every sink unless it is stale
    ///
    /// Never mutates the aggregator. Sink failures are logged and counted;
    /// the next tick tries again with whatever state is current then.
    pub async fn flush(&self) -> FlushOutcome {
        let snapshot = self.aggregator.snapshot();
        let now = self.clock.now();

        if self.guard.check(snapshot.timestamp, now) {
            match snapshot.timestamp {
                Some(ts) => warn!(
                    "Skipping publish: last reading at {} is older than {}s",
                    format_datetime(&ts),
                    self.guard.max_age().whole_seconds()
                ),
                None => warn!("Skipping publish: no readings received yet"),
            }
            return FlushOutcome::Stale;
        }

        let mut succeeded = 0;
        let mut failed = 0;
        for publisher in &self.publishers {
            match publisher.publish(&snapshot).await {
                Ok(resp) => {
                    succeeded += 1;
                    info!(
                        "[{}] {} {}",
                        publisher.name(),
                        resp.status,
                        truncate_for_log(resp.body.trim(), LOGGED_BODY_CHARS)
                    );
                }
                Err(e) => {
                    failed += 1;
                    error!("[{}] Publish failed: {}", publisher.name(), e);
                }
            }
        }

        FlushOutcome::Published { succeeded, failed }
    }
}

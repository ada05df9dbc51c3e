use crate::config::ManagerConfig;
use crate::engine::{BatchReport, Engine, Trigger};
use log::debug;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SchedulerCommand {
    EditObserved,
    Pause,
    Resume,
    Shutdown,
}

/// Timer bookkeeping for the three processing triggers
#[derive(Debug)]
struct ScheduleState {
    debounce: Duration,
    idle: Duration,
    debounce_deadline: Option<Instant>,
    idle_deadline: Option<Instant>,
    paused: bool,
}

impl ScheduleState {
    const fn new(debounce: Duration, idle: Duration) -> Self {
        Self {
            debounce,
            idle,
            debounce_deadline: None,
            idle_deadline: None,
            paused: false,
        }
    }

    /// Restart the debounce window and re-arm idle detection
    fn record_edit(&mut self, now: Instant) {
        self.debounce_deadline = Some(now + self.debounce);
        self.idle_deadline = Some(now + self.idle);
    }

    const fn debounce_pending(&self) -> bool {
        self.debounce_deadline.is_some()
    }

    fn next_debounce(&self) -> Option<Instant> {
        self.debounce_deadline
    }

    /// Idle fires once per edit burst, never while paused or mid-debounce
    fn next_idle(&self) -> Option<Instant> {
        if self.paused || self.debounce_pending() {
            return None;
        }
        self.idle_deadline
    }

    const fn tick_allowed(&self) -> bool {
        !self.paused && !self.debounce_pending()
    }

    fn take_debounce(&mut self) {
        self.debounce_deadline = None;
    }

    fn take_idle(&mut self) {
        self.idle_deadline = None;
    }
}

/// A running processing batch, polled by the scheduler loop itself so that
/// commands keep flowing while the analyzer works
type Batch = Pin<Box<dyn Future<Output = BatchReport> + Send>>;

pub(crate) fn spawn_scheduler(
    engine: Arc<Engine>,
    config: ManagerConfig,
    mut command_rx: mpsc::UnboundedReceiver<SchedulerCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut state = ScheduleState::new(config.edit_debounce(), config.idle_threshold());
        let period = config.processing_interval();
        let mut tick = time::interval_at(Instant::now() + period, period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut batch: Option<Batch> = None;
        // Debounce or idle trigger that fired while a batch was running
        let mut queued: Option<Trigger> = None;

        loop {
            let debounce_at = state.next_debounce();
            let idle_at = state.next_idle();

            tokio::select! {
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::EditObserved) => state.record_edit(Instant::now()),
                        Some(SchedulerCommand::Pause) => state.paused = true,
                        Some(SchedulerCommand::Resume) => {
                            state.paused = false;
                            tick.reset();
                        }
                        Some(SchedulerCommand::Shutdown) | None => break,
                    }
                }
                report = finish(&mut batch), if batch.is_some() => {
                    batch = None;
                    debug!(
                        "Scheduled batch done ({} processed, {} failed)",
                        report.processed, report.failed
                    );
                    // A pending debounce will fire on its own once typing stops.
                    if let Some(trigger) = queued.take() {
                        if !state.debounce_pending() {
                            batch = start_batch(&engine, trigger);
                        }
                    }
                }
                () = sleep_until(debounce_at), if debounce_at.is_some() => {
                    state.take_debounce();
                    dispatch(&engine, &mut batch, &mut queued, Trigger::Debounce);
                }
                () = sleep_until(idle_at), if idle_at.is_some() => {
                    state.take_idle();
                    dispatch(&engine, &mut batch, &mut queued, Trigger::Idle);
                }
                _ = tick.tick(), if state.tick_allowed() => {
                    if batch.is_none() {
                        batch = start_batch(&engine, Trigger::Tick);
                    }
                }
            }
        }
        debug!("Chunk scheduler stopped");
    })
}

async fn sleep_until(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        time::sleep_until(deadline).await;
    }
}

async fn finish(batch: &mut Option<Batch>) -> BatchReport {
    match batch {
        Some(running) => running.await,
        None => std::future::pending().await,
    }
}

/// Start a batch now, or queue the trigger behind the one already running
fn dispatch(
    engine: &Arc<Engine>,
    batch: &mut Option<Batch>,
    queued: &mut Option<Trigger>,
    trigger: Trigger,
) {
    if batch.is_some() {
        debug!("{trigger:?} trigger queued behind running batch");
        *queued = Some(trigger);
    } else {
        *batch = start_batch(engine, trigger);
    }
}

fn start_batch(engine: &Arc<Engine>, trigger: Trigger) -> Option<Batch> {
    if !engine.has_dirty() {
        return None;
    }
    debug!("Scheduler trigger fired: {trigger:?}");
    let engine = Arc::clone(engine);
    Some(Box::pin(async move {
        engine.process_dirty(trigger, None).await
    }))
}

#[cfg(test)]
mod tests {
    use super::ScheduleState;
    use std::time::Duration;
    use tokio::time::Instant;

    fn state() -> ScheduleState {
        ScheduleState::new(Duration::from_millis(100), Duration::from_millis(300))
    }

    #[test]
    fn edit_arms_debounce_and_idle() {
        let mut state = state();
        let now = Instant::now();
        state.record_edit(now);
        assert_eq!(state.next_debounce(), Some(now + Duration::from_millis(100)));
        assert!(state.next_idle().is_none(), "idle waits for the debounce");
        assert!(!state.tick_allowed());

        state.take_debounce();
        assert_eq!(state.next_idle(), Some(now + Duration::from_millis(300)));
        assert!(state.tick_allowed());
    }

    #[test]
    fn later_edit_restarts_debounce() {
        let mut state = state();
        let first = Instant::now();
        state.record_edit(first);
        let second = first + Duration::from_millis(50);
        state.record_edit(second);
        assert_eq!(state.next_debounce(), Some(second + Duration::from_millis(100)));
    }

    #[test]
    fn pause_blocks_idle_and_tick_only() {
        let mut state = state();
        state.record_edit(Instant::now());
        state.paused = true;
        assert!(state.next_debounce().is_some());
        state.take_debounce();
        assert!(state.next_idle().is_none());
        assert!(!state.tick_allowed());

        state.paused = false;
        assert!(state.next_idle().is_some());
        state.take_idle();
        assert!(state.next_idle().is_none());
    }
}

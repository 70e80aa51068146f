use super::state::{CountdownState, EmergencyStatus, TickOutcome};
use crate::config::CountdownConfig;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Callbacks fired by the countdown controller. Called outside of any lock.
pub trait CountdownObserver: Send + Sync {
    fn on_tick(&self, _remaining: u32) {}

    fn on_trigger(&self);

    fn on_cancel(&self);
}

/// Countdown callbacks as channel messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownSignal {
    Tick(u32),
    Triggered,
    Cancelled,
}

/// Observer that forwards every callback into an unbounded channel
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<CountdownSignal>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<CountdownSignal>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    fn forward(&self, signal: CountdownSignal) {
        if self.sender.send(signal).is_err() {
            debug!("Countdown signal {:?} dropped: receiver gone", signal);
        }
    }
}

impl CountdownObserver for ChannelObserver {
    fn on_tick(&self, remaining: u32) {
        self.forward(CountdownSignal::Tick(remaining));
    }

    fn on_trigger(&self) {
        self.forward(CountdownSignal::Triggered);
    }

    fn on_cancel(&self) {
        self.forward(CountdownSignal::Cancelled);
    }
}

/// Observable view of the countdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountdownSnapshot {
    pub status: EmergencyStatus,
    pub remaining: u32,
    pub duration: u32,
}

impl From<&CountdownState> for CountdownSnapshot {
    fn from(state: &CountdownState) -> Self {
        Self {
            status: state.status(),
            remaining: state.remaining(),
            duration: state.duration(),
        }
    }
}

struct Ticker {
    token: CancellationToken,
    _handle: JoinHandle<()>,
}

struct Shared {
    state: Mutex<CountdownState>,
    ticker: Mutex<Option<Ticker>>,
    last_outcome: Mutex<Option<EmergencyStatus>>,
    snapshots: watch::Sender<CountdownSnapshot>,
    observer: Arc<dyn CountdownObserver>,
    tick_period: Duration,
}

impl Shared {
    fn publish(&self, state: &CountdownState) {
        self.snapshots.send_replace(CountdownSnapshot::from(state));
    }

    fn clear_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().take() {
            ticker.token.cancel();
        }
    }

    fn finish(&self, outcome: EmergencyStatus) {
        *self.last_outcome.lock() = Some(outcome);

        match outcome {
            EmergencyStatus::Triggered => self.observer.on_trigger(),
            EmergencyStatus::Cancelled => self.observer.on_cancel(),
            _ => {}
        }

        let mut state = self.state.lock();
        state.reset();
        self.publish(&state);
    }
}

/// Abortable countdown driven by a single tokio interval.
///
/// `arm` starts ticking from the configured duration; reaching zero fires
/// `on_trigger` once, `cancel` fires `on_cancel` once. Either way the ticker is
/// cleared and the controller returns to idle.
pub struct CountdownController {
    shared: Arc<Shared>,
}

impl CountdownController {
    pub fn new(duration: u32, tick_period: Duration, observer: Arc<dyn CountdownObserver>) -> Self {
        let state = CountdownState::new(duration);
        let (snapshots, _) = watch::channel(CountdownSnapshot::from(&state));

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                ticker: Mutex::new(None),
                last_outcome: Mutex::new(None),
                snapshots,
                observer,
                tick_period,
            }),
        }
    }

    pub fn from_config(config: &CountdownConfig, observer: Arc<dyn CountdownObserver>) -> Self {
        Self::new(config.duration_seconds, config.tick_period(), observer)
    }

    /// Start the countdown. Returns false if one is already running.
    pub fn arm(&self) -> bool {
        let mut state = self.shared.state.lock();
        if !state.arm() {
            debug!("Countdown arm ignored: status is {}", state.status().as_str());
            return false;
        }
        self.shared.publish(&state);

        let token = CancellationToken::new();
        let shared = Arc::clone(&self.shared);
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            run_ticker(shared, task_token).await;
        });

        // Installed under the state lock so a racing cancel always finds it
        *self.shared.ticker.lock() = Some(Ticker {
            token,
            _handle: handle,
        });

        info!("Countdown armed for {} ticks", state.duration());
        true
    }

    /// Cancel an armed countdown. No-op when idle.
    pub fn cancel(&self) -> bool {
        {
            let mut state = self.shared.state.lock();
            if !state.cancel() {
                debug!("Countdown cancel ignored: not armed");
                return false;
            }
            self.shared.clear_ticker();
            self.shared.publish(&state);
            info!("Countdown cancelled with {} remaining", state.remaining());
        }

        self.shared.finish(EmergencyStatus::Cancelled);
        true
    }

    pub fn status(&self) -> EmergencyStatus {
        self.shared.state.lock().status()
    }

    pub fn remaining(&self) -> u32 {
        self.shared.state.lock().remaining()
    }

    pub fn duration(&self) -> u32 {
        self.shared.state.lock().duration()
    }

    pub fn snapshot(&self) -> CountdownSnapshot {
        CountdownSnapshot::from(&*self.shared.state.lock())
    }

    /// Outcome of the most recently finished countdown
    pub fn last_outcome(&self) -> Option<EmergencyStatus> {
        *self.shared.last_outcome.lock()
    }

    pub fn subscribe(&self) -> watch::Receiver<CountdownSnapshot> {
        self.shared.snapshots.subscribe()
    }

    pub fn has_active_ticker(&self) -> bool {
        self.shared.ticker.lock().is_some()
    }
}

impl Drop for CountdownController {
    fn drop(&mut self) {
        self.shared.clear_ticker();
    }
}

async fn run_ticker(shared: Arc<Shared>, token: CancellationToken) {
    let period = shared.tick_period;
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Countdown ticker stopped");
                break;
            }
            _ = interval.tick() => {
                let outcome = {
                    let mut state = shared.state.lock();
                    // cancel() flips the token under this lock before resetting
                    if token.is_cancelled() {
                        TickOutcome::Ignored
                    } else {
                        let outcome = state.tick();
                        shared.publish(&state);
                        outcome
                    }
                };

                match outcome {
                    TickOutcome::Continue(remaining) => {
                        debug!("Countdown tick: {} remaining", remaining);
                        shared.observer.on_tick(remaining);
                    }
                    TickOutcome::Fired => {
                        info!("Countdown reached zero");
                        shared.clear_ticker();
                        shared.finish(EmergencyStatus::Triggered);
                        break;
                    }
                    TickOutcome::Ignored => break,
                }
            }
        }
    }
}

use crate::config::PollSettings;
use crate::polling::AdaptiveInterval;
use crate::traits::*;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Events emitted by a [`PollingEngine`]
#[derive(Debug, Clone)]
pub enum PollEvent {
    /// A non-empty batch, in the order the source returned it
    Batch(Vec<NotificationMessage>),
    /// A cycle failed; the loop keeps going at the same interval
    Error(DeliveryError),
}

/// Polling metrics snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollMetrics {
    pub cycles: u64,
    pub batches: u64,
    pub messages: u64,
    pub failures: u64,
}

#[derive(Default)]
struct PollCounters {
    cycles: AtomicU64,
    batches: AtomicU64,
    messages: AtomicU64,
    failures: AtomicU64,
}

struct EngineShared {
    source: Arc<dyn PollSource>,
    interval: Mutex<AdaptiveInterval>,
    running: AtomicBool,
    counters: PollCounters,
    events: mpsc::UnboundedSender<PollEvent>,
}

impl EngineShared {
    fn emit(&self, event: PollEvent) {
        // Drop events produced after stop()
        if self.running.load(Ordering::Acquire) {
            let _ = self.events.send(event);
        }
    }
}

/// Periodic fetch loop against a [`PollSource`]
///
/// The first cycle runs as soon as the engine starts; later cycles wait for
/// the current [`AdaptiveInterval`]. Failures never stop the loop, only
/// `stop()` (or dropping the engine) does.
pub struct PollingEngine {
    shared: Arc<EngineShared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollingEngine {
    pub fn new(source: Arc<dyn PollSource>, settings: &PollSettings) -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let interval = AdaptiveInterval::new(
            settings.base_interval,
            settings.min_interval,
            settings.max_interval,
            settings.adaptive,
        );

        let engine = Self {
            shared: Arc::new(EngineShared {
                source,
                interval: Mutex::new(interval),
                running: AtomicBool::new(false),
                counters: PollCounters::default(),
                events,
            }),
            task: Mutex::new(None),
        };
        (engine, events_rx)
    }

    /// Start the loop. Does nothing if it is already running.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Polling started (interval {:?})", self.current_interval());
        *task = Some(tokio::spawn(poll_loop(Arc::clone(&self.shared))));
    }

    /// Stop the loop, cancelling the pending timer and any in-flight fetch
    pub fn stop(&self) {
        let handle = {
            let mut task = self.task.lock();
            self.shared.running.store(false, Ordering::Release);
            task.take()
        };

        if let Some(handle) = handle {
            handle.abort();
            info!("Polling stopped");
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Delay before the next cycle
    pub fn current_interval(&self) -> Duration {
        self.shared.interval.lock().current()
    }

    pub fn metrics(&self) -> PollMetrics {
        let counters = &self.shared.counters;
        PollMetrics {
            cycles: counters.cycles.load(Ordering::Relaxed),
            batches: counters.batches.load(Ordering::Relaxed),
            messages: counters.messages.load(Ordering::Relaxed),
            failures: counters.failures.load(Ordering::Relaxed),
        }
    }
}

impl Drop for PollingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop(shared: Arc<EngineShared>) {
    loop {
        run_cycle(&shared).await;

        let delay = shared.interval.lock().current();
        debug!("Next poll in {:?}", delay);
        tokio::time::sleep(delay).await;
    }
}

async fn run_cycle(shared: &EngineShared) {
    shared.counters.cycles.fetch_add(1, Ordering::Relaxed);

    match shared.source.fetch().await {
        Ok(batch) if batch.is_empty() => {
            shared.interval.lock().on_idle();
            debug!("Poll returned no notifications");
        }
        Ok(batch) => {
            shared.interval.lock().on_activity();
            shared.counters.batches.fetch_add(1, Ordering::Relaxed);
            shared
                .counters
                .messages
                .fetch_add(batch.len() as u64, Ordering::Relaxed);
            debug!("Poll returned {} notifications", batch.len());
            shared.emit(PollEvent::Batch(batch));
        }
        Err(e) => {
            shared.counters.failures.fetch_add(1, Ordering::Relaxed);
            warn!("Poll failed: {}", e);
            shared.emit(PollEvent::Error(e));
        }
    }
}

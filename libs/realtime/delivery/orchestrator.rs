use crate::config::{FallbackPolicy, TransportConfig};
use crate::connection::{ConnectionEvent, ConnectionManager, Metrics};
use crate::delivery::registry::{HandlerRegistry, Subscriber, Unsubscribe};
use crate::polling::{PollEvent, PollMetrics, PollingEngine};
use crate::traits::NotificationMessage;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Which transport is delivering notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionMode {
    #[default]
    Push,
    Poll,
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionMode::Push => write!(f, "push"),
            ConnectionMode::Poll => write!(f, "poll"),
        }
    }
}

/// Orchestrator lifecycle
///
/// ```text
/// Uninitialized -> Connecting -> Connected -> Polling
///                           \________________/
/// ```
///
/// `Polling` is terminal until `disconnect()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryState {
    #[default]
    Uninitialized,
    Connecting,
    Connected,
    Polling,
}

/// Point-in-time view of the delivery layer
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub mode: ConnectionMode,
    pub state: DeliveryState,
    pub subscribers: usize,
    pub heartbeat_active: bool,
    pub polling_active: bool,
    pub poll_interval: Option<Duration>,
    pub push_metrics: Option<Metrics>,
    pub poll_metrics: Option<PollMetrics>,
}

enum ActiveTransport {
    None,
    Push(Arc<ConnectionManager>),
    Poll(Arc<PollingEngine>),
}

impl ActiveTransport {
    fn shutdown(self) {
        match self {
            ActiveTransport::None => {}
            ActiveTransport::Push(manager) => manager.disconnect(),
            ActiveTransport::Poll(engine) => engine.stop(),
        }
    }
}

struct Inner {
    mode: ConnectionMode,
    state: DeliveryState,
    transport: ActiveTransport,
    pump: Option<JoinHandle<()>>,
    /// Bumped by every `initialize()` and `disconnect()`; stale work compares and bails
    generation: u64,
}

impl Inner {
    /// Stop the active transport and its event pump
    fn teardown(&mut self) {
        std::mem::replace(&mut self.transport, ActiveTransport::None).shutdown();
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

struct Shared {
    config: TransportConfig,
    registry: Arc<HandlerRegistry>,
    inner: Mutex<Inner>,
    /// Ticks whenever the state leaves `Connecting`; always sent with `inner` locked
    settled: watch::Sender<u64>,
}

impl Shared {
    fn settle(&self) {
        self.settled.send_modify(|n| *n = n.wrapping_add(1));
    }
}

/// What an `initialize()` call has to do, decided under the lock
enum Begin {
    Start {
        generation: u64,
        manager: Arc<ConnectionManager>,
        events: mpsc::UnboundedReceiver<ConnectionEvent>,
    },
    Wait(watch::Receiver<u64>),
    Done(ConnectionMode),
}

/// Rolls back a connect attempt whose `initialize()` future was dropped
struct PendingAttempt<'a> {
    shared: &'a Shared,
    generation: u64,
    armed: bool,
}

impl Drop for PendingAttempt<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.shared.inner.lock();
        if inner.generation == self.generation {
            debug!("Initialize was cancelled while connecting");
            inner.generation = inner.generation.wrapping_add(1);
            inner.teardown();
            inner.mode = ConnectionMode::Push;
            inner.state = DeliveryState::Uninitialized;
            self.shared.settle();
        }
    }
}

/// Single entry point for consumers of realtime notifications
///
/// Tries the push transport first and falls back to polling when push is
/// unavailable or drops. Subscribers receive every notification from
/// whichever transport is active and never learn which one it is.
///
/// At most one transport runs at a time. Clones share the same instance.
#[derive(Clone)]
pub struct DeliveryOrchestrator {
    shared: Arc<Shared>,
}

impl DeliveryOrchestrator {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                registry: Arc::new(HandlerRegistry::new()),
                inner: Mutex::new(Inner {
                    mode: ConnectionMode::Push,
                    state: DeliveryState::Uninitialized,
                    transport: ActiveTransport::None,
                    pump: None,
                    generation: 0,
                }),
                settled: watch::channel(0).0,
            }),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.shared.config
    }

    /// Connect push, or fall back to polling if that fails
    ///
    /// Never fails. Returns the mode that ended up active. When another call
    /// is already connecting, waits for it to settle and returns its outcome;
    /// once initialized, returns the current mode. If `disconnect()` is called
    /// while this is pending, nothing is started.
    pub async fn initialize(&self) -> ConnectionMode {
        let (generation, manager, events) = match self.begin() {
            Begin::Start {
                generation,
                manager,
                events,
            } => (generation, manager, events),
            Begin::Wait(mut settled) => {
                debug!("Initialize already in progress, waiting for it");
                let _ = settled.changed().await;
                return self.mode();
            }
            Begin::Done(mode) => return mode,
        };

        let mut pending = PendingAttempt {
            shared: &self.shared,
            generation,
            armed: true,
        };

        info!("Initializing realtime delivery");
        let result = manager.connect().await;

        pending.armed = false;
        let mut inner = self.shared.inner.lock();
        if inner.generation != generation {
            debug!("Delivery was disconnected while connecting");
            return inner.mode;
        }

        match result {
            Ok(()) => {
                inner.state = DeliveryState::Connected;
                inner.pump = Some(tokio::spawn(push_pump(
                    Arc::downgrade(&self.shared),
                    generation,
                    events,
                )));
                info!("Realtime delivery using push transport");
            }
            Err(e) => {
                warn!("Push transport unavailable ({}), falling back to polling", e);
                start_polling(&self.shared, &mut inner);
            }
        }
        self.shared.settle();
        inner.mode
    }

    fn begin(&self) -> Begin {
        let mut inner = self.shared.inner.lock();
        match inner.state {
            DeliveryState::Uninitialized => {}
            DeliveryState::Connecting => return Begin::Wait(self.shared.settled.subscribe()),
            DeliveryState::Connected | DeliveryState::Polling => return Begin::Done(inner.mode),
        }

        inner.generation = inner.generation.wrapping_add(1);
        inner.mode = ConnectionMode::Push;
        inner.state = DeliveryState::Connecting;

        let (manager, events) = ConnectionManager::new(
            Arc::clone(&self.shared.config.resolver),
            self.shared.config.push.clone(),
        );
        let manager = Arc::new(manager);
        inner.transport = ActiveTransport::Push(Arc::clone(&manager));
        Begin::Start {
            generation: inner.generation,
            manager,
            events,
        }
    }

    /// Register a handler for every future notification
    ///
    /// Registering the same `Arc` again has no effect.
    pub fn subscribe(&self, handler: Subscriber) -> Unsubscribe {
        self.shared.registry.add(Arc::clone(&handler));
        Unsubscribe::new(&self.shared.registry, handler)
    }

    /// Register a closure
    pub fn subscribe_fn<F>(&self, handler: F) -> Unsubscribe
    where
        F: Fn(&NotificationMessage) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(handler))
    }

    pub fn mode(&self) -> ConnectionMode {
        self.shared.inner.lock().mode
    }

    pub fn state(&self) -> DeliveryState {
        self.shared.inner.lock().state
    }

    /// Socket state in push mode, loop state in poll mode
    pub fn is_connected(&self) -> bool {
        match &self.shared.inner.lock().transport {
            ActiveTransport::None => false,
            ActiveTransport::Push(manager) => manager.is_connected(),
            ActiveTransport::Poll(engine) => engine.is_running(),
        }
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let inner = self.shared.inner.lock();
        let mut diagnostics = Diagnostics {
            mode: inner.mode,
            state: inner.state,
            subscribers: self.shared.registry.len(),
            heartbeat_active: false,
            polling_active: false,
            poll_interval: None,
            push_metrics: None,
            poll_metrics: None,
        };

        match &inner.transport {
            ActiveTransport::None => {}
            ActiveTransport::Push(manager) => {
                diagnostics.heartbeat_active = manager.heartbeat_active();
                diagnostics.push_metrics = Some(manager.metrics());
            }
            ActiveTransport::Poll(engine) => {
                diagnostics.polling_active = engine.is_running();
                diagnostics.poll_interval = Some(engine.current_interval());
                diagnostics.poll_metrics = Some(engine.metrics());
            }
        }
        diagnostics
    }

    /// Tear everything down and drop all subscribers
    ///
    /// Idempotent. Afterwards the orchestrator is back to `Uninitialized` and
    /// may be initialized again. No notification already fetched is handed to
    /// a subscriber once this returns, though a handler that is running at
    /// that moment finishes.
    pub fn disconnect(&self) {
        let was_active = {
            let mut inner = self.shared.inner.lock();
            let was_active = inner.state != DeliveryState::Uninitialized;

            inner.generation = inner.generation.wrapping_add(1);
            inner.teardown();
            self.shared.registry.clear();
            inner.mode = ConnectionMode::Push;
            inner.state = DeliveryState::Uninitialized;
            self.shared.settle();
            was_active
        };

        if was_active {
            info!("Realtime delivery disconnected");
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.inner.get_mut().teardown();
    }
}

/// Replace whatever transport is active with the polling engine
fn start_polling(shared: &Arc<Shared>, inner: &mut Inner) {
    inner.teardown();

    let (engine, events) = PollingEngine::new(Arc::clone(&shared.config.poll_source), &shared.config.poll);
    let engine = Arc::new(engine);
    engine.start();

    inner.transport = ActiveTransport::Poll(engine);
    inner.pump = Some(tokio::spawn(poll_pump(Arc::downgrade(shared), inner.generation, events)));
    inner.mode = ConnectionMode::Poll;
    inner.state = DeliveryState::Polling;
    shared.settle();
}

/// Switch to polling unless the session moved on or already switched
fn fallback_to_polling(shared: &Arc<Shared>, generation: u64) {
    let mut inner = shared.inner.lock();
    if inner.generation != generation || inner.mode != ConnectionMode::Push {
        return;
    }

    warn!("Push transport lost, falling back to polling");
    start_polling(shared, &mut inner);
}

fn is_current(shared: &Shared, generation: u64) -> bool {
    shared.inner.lock().generation == generation
}

fn set_state_if_current(shared: &Shared, generation: u64, state: DeliveryState) {
    let mut inner = shared.inner.lock();
    if inner.generation == generation && inner.mode == ConnectionMode::Push {
        inner.state = state;
        if state != DeliveryState::Connecting {
            shared.settle();
        }
    }
}

async fn push_pump(shared: Weak<Shared>, generation: u64, mut events: mpsc::UnboundedReceiver<ConnectionEvent>) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };

        match event {
            ConnectionEvent::Message(message) => {
                if !is_current(&shared, generation) {
                    return;
                }
                shared.registry.dispatch(&message);
            }
            ConnectionEvent::Disconnected(reason) => match shared.config.fallback {
                FallbackPolicy::Immediate => {
                    debug!("Push disconnected: {}", reason);
                    fallback_to_polling(&shared, generation);
                    return;
                }
                FallbackPolicy::AfterReconnectExhausted => {
                    set_state_if_current(&shared, generation, DeliveryState::Connecting);
                }
            },
            ConnectionEvent::Connected => {
                set_state_if_current(&shared, generation, DeliveryState::Connected);
            }
            ConnectionEvent::ReconnectFailed { attempts } => {
                debug!("Push reconnection gave up after {} attempts", attempts);
                fallback_to_polling(&shared, generation);
                return;
            }
            ConnectionEvent::Reconnecting(attempt) => {
                debug!("Push reconnect attempt {}", attempt);
            }
            ConnectionEvent::Error(e) => {
                debug!("Push transport error: {}", e);
            }
        }
    }
}

async fn poll_pump(shared: Weak<Shared>, generation: u64, mut events: mpsc::UnboundedReceiver<PollEvent>) {
    while let Some(event) = events.recv().await {
        let Some(shared) = shared.upgrade() else {
            return;
        };

        match event {
            PollEvent::Batch(batch) => {
                for message in &batch {
                    if !is_current(&shared, generation) {
                        return;
                    }
                    shared.registry.dispatch(message);
                }
            }
            PollEvent::Error(e) => {
                debug!("Poll cycle failed: {}", e);
            }
        }
    }
}

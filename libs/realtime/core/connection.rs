use crate::config::PushSettings;
use crate::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::frame::decode_notification;
use crate::heartbeat::spawn_heartbeat;
use crate::liveness::LivenessTracker;
use crate::traits::*;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Lifecycle and data events surfaced by a [`ConnectionManager`]
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The socket is open (initial connect or successful reconnect)
    Connected,
    /// A notification frame arrived
    Message(NotificationMessage),
    /// An open connection was lost
    Disconnected(String),
    /// Reconnecting (attempt number, 1-based)
    Reconnecting(usize),
    /// Reconnection budget spent; the manager is closed for good
    ReconnectFailed { attempts: usize },
    /// A failure that did not by itself end the session, or explains why it ended
    Error(DeliveryError),
}

/// Connection metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub frames_received: u64,
    pub notifications_received: u64,
    pub heartbeats_sent: u64,
    pub reconnect_count: u64,
    pub connection_state: ConnectionState,
}

/// Shared between the manager handle and its session task
struct SessionContext {
    resolver: Arc<dyn EndpointResolver>,
    settings: PushSettings,
    strategy: Box<dyn ReconnectionStrategy>,
    state: AtomicConnectionState,
    metrics: AtomicMetrics,
    heartbeat_active: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
}

impl SessionContext {
    fn emit(&self, event: ConnectionEvent) {
        // Nobody listening is fine
        let _ = self.events.send(event);
    }
}

#[derive(Default)]
struct SessionSlot {
    id: u64,
    shutdown: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

/// Owns one push transport connection
///
/// - Resolves the endpoint and opens the WebSocket on `connect()`
/// - Sends a keepalive frame every `heartbeat_interval` while open
/// - Forwards `"notification"` frames as [`ConnectionEvent::Message`]
/// - Reconnects on its own after a drop, within the configured budget
///
/// Events go out over the channel returned by [`ConnectionManager::new`].
/// Nothing here panics or returns errors across an event boundary; failures
/// become [`ConnectionEvent::Error`] and the manager degrades to closed.
pub struct ConnectionManager {
    ctx: Arc<SessionContext>,
    session: Mutex<SessionSlot>,
}

impl ConnectionManager {
    /// Create a manager and the receiving end of its event channel
    pub fn new(
        resolver: Arc<dyn EndpointResolver>,
        settings: PushSettings,
    ) -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let strategy = settings.reconnect_strategy();

        let ctx = Arc::new(SessionContext {
            resolver,
            settings,
            strategy,
            state: AtomicConnectionState::new(ConnectionState::Disconnected),
            metrics: AtomicMetrics::new(),
            heartbeat_active: Arc::new(AtomicBool::new(false)),
            events,
        });

        let manager = Self {
            ctx,
            session: Mutex::new(SessionSlot::default()),
        };
        (manager, events_rx)
    }

    /// Resolve the endpoint and open the connection
    ///
    /// Returns once the socket is open. Any previous session of this manager
    /// is torn down first.
    ///
    /// # Errors
    /// * `Resolution` - The endpoint resolver failed
    /// * `Connection` - The handshake failed, or `disconnect()` cancelled the attempt
    /// * `Timeout` - `connect_timeout` elapsed
    pub async fn connect(&self) -> Result<()> {
        let (session_id, mut shutdown_rx) = self.begin_session();
        self.ctx.state.set(ConnectionState::Connecting);

        let opened = tokio::select! {
            result = open_stream(&self.ctx) => result,
            _ = shutdown_signalled(&mut shutdown_rx) => Err(DeliveryError::Connection(
                "connect cancelled by disconnect".to_string(),
            )),
        };

        let ws = match opened {
            Ok(ws) => ws,
            Err(e) => {
                warn!("Push connect failed: {}", e);
                // disconnect() may already have closed the manager
                let _ = self
                    .ctx
                    .state
                    .compare_exchange(ConnectionState::Connecting, ConnectionState::Disconnected);
                self.ctx.emit(ConnectionEvent::Error(e.clone()));
                return Err(e);
            }
        };

        if shutdown_requested(&shutdown_rx)
            || self
                .ctx
                .state
                .compare_exchange(ConnectionState::Connecting, ConnectionState::Connected)
                .is_err()
        {
            debug!("Disconnect raced the open handshake, dropping socket");
            return Err(DeliveryError::Connection(
                "disconnected during connect".to_string(),
            ));
        }

        info!("Push transport connected");
        self.ctx.emit(ConnectionEvent::Connected);

        let handle = tokio::spawn(run_session(Arc::clone(&self.ctx), ws, shutdown_rx));

        let mut slot = self.session.lock();
        if slot.id == session_id && slot.shutdown.is_some() {
            slot.handle = Some(handle);
        }
        // Otherwise the session was superseded; its shutdown sender is gone
        // and the task exits on its own.
        Ok(())
    }

    /// Stop heartbeat and reconnection and close the socket
    ///
    /// Idempotent and safe from any state, including while `connect()` is
    /// still pending.
    pub fn disconnect(&self) {
        let (shutdown, handle) = {
            let mut slot = self.session.lock();
            (slot.shutdown.take(), slot.handle.take())
        };
        let was_active = shutdown.is_some() || handle.is_some();

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }
        self.ctx.heartbeat_active.store(false, Ordering::Release);
        self.ctx.state.set(ConnectionState::Closed);

        if let Some(handle) = handle {
            reap_session(handle, self.ctx.settings.close_grace);
        }

        if was_active {
            info!("Push transport disconnected");
        }
    }

    /// Get current connection state
    #[inline]
    pub fn connection_state(&self) -> ConnectionState {
        self.ctx.state.get()
    }

    /// Check if the socket is open
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.ctx.state.is_connected()
    }

    /// Whether a heartbeat timer is currently running
    #[inline]
    pub fn heartbeat_active(&self) -> bool {
        self.ctx.heartbeat_active.load(Ordering::Acquire)
    }

    /// Get current metrics
    pub fn metrics(&self) -> Metrics {
        Metrics {
            frames_received: self.ctx.metrics.frames_received(),
            notifications_received: self.ctx.metrics.notifications_received(),
            heartbeats_sent: self.ctx.metrics.heartbeats_sent(),
            reconnect_count: self.ctx.metrics.reconnect_count(),
            connection_state: self.ctx.state.get(),
        }
    }

    /// Replace any previous session with a fresh shutdown channel
    fn begin_session(&self) -> (u64, watch::Receiver<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut slot = self.session.lock();

        if let Some(previous) = slot.shutdown.take() {
            let _ = previous.send(true);
        }
        if let Some(handle) = slot.handle.take() {
            reap_session(handle, self.ctx.settings.close_grace);
        }

        slot.id = slot.id.wrapping_add(1);
        slot.shutdown = Some(shutdown_tx);
        (slot.id, shutdown_rx)
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Give a signalled session time to close gracefully, then abort it
fn reap_session(handle: JoinHandle<()>, close_grace: Duration) {
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            let abort = handle.abort_handle();
            runtime.spawn(async move {
                if tokio::time::timeout(close_grace * 2, handle).await.is_err() {
                    debug!("Push session did not exit in time, aborting");
                    abort.abort();
                }
            });
        }
        Err(_) => handle.abort(),
    }
}

/// Resolves when shutdown was requested or the manager dropped its sender
async fn shutdown_signalled(shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow_and_update() {
            return;
        }
        if shutdown_rx.changed().await.is_err() {
            return;
        }
    }
}

fn shutdown_requested(shutdown_rx: &watch::Receiver<bool>) -> bool {
    *shutdown_rx.borrow() || shutdown_rx.has_changed().is_err()
}

/// Resolve the endpoint and complete the open handshake
async fn open_stream(ctx: &SessionContext) -> Result<WsStream> {
    let attempt = async {
        let url = ctx.resolver.resolve().await.map_err(|e| match e {
            DeliveryError::Resolution(_) => e,
            other => DeliveryError::Resolution(other.to_string()),
        })?;

        debug!("Connecting to {}", url);
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| DeliveryError::Connection(e.to_string()))?;
        Ok(ws)
    };

    match ctx.settings.connect_timeout {
        Some(limit) => tokio::time::timeout(limit, attempt)
            .await
            .map_err(|_| DeliveryError::Timeout(limit))?,
        None => attempt.await,
    }
}

/// Why a connected session stopped
enum SessionEnd {
    /// `disconnect()` was called
    Shutdown,
    /// The transport closed or failed
    Closed(String),
}

/// Session task: drive the open socket, reconnect after drops
async fn run_session(ctx: Arc<SessionContext>, mut ws: WsStream, mut shutdown_rx: watch::Receiver<bool>) {
    loop {
        let reason = match drive_connection(&ctx, ws, &mut shutdown_rx).await {
            SessionEnd::Shutdown => {
                debug!("Push session shut down");
                return;
            }
            SessionEnd::Closed(reason) => reason,
        };

        if ctx
            .state
            .compare_exchange(ConnectionState::Connected, ConnectionState::Disconnected)
            .is_err()
        {
            // Closed by disconnect() while the socket was going down
            return;
        }

        warn!("Push connection lost: {}", reason);
        ctx.emit(ConnectionEvent::Disconnected(reason.clone()));

        ws = match reconnect(&ctx, &mut shutdown_rx, reason).await {
            Some(ws) => ws,
            None => return,
        };
    }

}

/// Retry the connection per the reconnection strategy
///
/// Returns `None` when shut down or when the budget is exhausted.
async fn reconnect(
    ctx: &SessionContext,
    shutdown_rx: &mut watch::Receiver<bool>,
    mut last_error: String,
) -> Option<WsStream> {
    let mut attempt = 0;

    loop {
        let Some(delay) = ctx.strategy.next_delay(attempt) else {
            let from = if attempt == 0 {
                ConnectionState::Disconnected
            } else {
                ConnectionState::Reconnecting
            };
            if ctx.state.compare_exchange(from, ConnectionState::Closed).is_ok() {
                warn!("Reconnection budget exhausted after {} attempts", attempt);
                ctx.emit(ConnectionEvent::Error(DeliveryError::ReconnectionFailed {
                    attempts: attempt,
                    reason: last_error,
                }));
                ctx.emit(ConnectionEvent::ReconnectFailed { attempts: attempt });
            }
            return None;
        };

        info!("Reconnecting in {:?} (attempt {})", delay, attempt + 1);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = shutdown_signalled(shutdown_rx) => return None,
        }

        attempt += 1;
        if attempt == 1
            && ctx
                .state
                .compare_exchange(ConnectionState::Disconnected, ConnectionState::Reconnecting)
                .is_err()
        {
            return None;
        }
        ctx.metrics.increment_reconnects();
        ctx.emit(ConnectionEvent::Reconnecting(attempt));

        let result = tokio::select! {
            result = open_stream(ctx) => result,
            _ = shutdown_signalled(shutdown_rx) => return None,
        };

        match result {
            Ok(ws) => {
                if shutdown_requested(shutdown_rx)
                    || ctx
                        .state
                        .compare_exchange(ConnectionState::Reconnecting, ConnectionState::Connected)
                        .is_err()
                {
                    return None;
                }
                info!("Push transport reconnected after {} attempts", attempt);
                ctx.emit(ConnectionEvent::Connected);
                return Some(ws);
            }
            Err(e) => {
                warn!("Reconnect attempt {} failed: {}", attempt, e);
                last_error = e.to_string();
                ctx.emit(ConnectionEvent::Error(e));
            }
        }
    }
}

/// Handle an open socket until it closes or shutdown is requested
async fn drive_connection(
    ctx: &SessionContext,
    ws: WsStream,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut write, mut read) = ws.split();

    let mut heartbeat = spawn_heartbeat(
        ctx.settings.heartbeat_interval,
        ctx.settings.heartbeat_payload.clone(),
        Arc::clone(&ctx.heartbeat_active),
    );
    let liveness = ctx.settings.heartbeat_timeout.map(LivenessTracker::new);

    loop {
        let deadline = liveness.as_ref().map(|tracker| tracker.deadline());

        tokio::select! {
            biased;

            _ = shutdown_signalled(shutdown_rx) => {
                debug!("Shutdown requested, closing push connection");
                let _ = tokio::time::timeout(ctx.settings.close_grace, write.close()).await;
                return SessionEnd::Shutdown;
            }

            frame = read.next() => {
                match frame {
                    Some(Ok(msg)) => {
                        ctx.metrics.increment_frames();
                        if let Some(ref tracker) = liveness {
                            tracker.record_inbound();
                        }

                        match msg {
                            Message::Text(text) => handle_text(ctx, &text),
                            Message::Binary(data) => match String::from_utf8(data) {
                                Ok(text) => handle_text(ctx, &text),
                                Err(_) => debug!("Ignoring non UTF-8 binary frame"),
                            },
                            Message::Close(close) => {
                                let reason = close
                                    .map(|f| format!("closed by server ({}): {}", u16::from(f.code), f.reason))
                                    .unwrap_or_else(|| "closed by server".to_string());
                                return SessionEnd::Closed(reason);
                            }
                            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                        }
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        ctx.emit(ConnectionEvent::Error(DeliveryError::Disconnected(e.to_string())));
                        return SessionEnd::Closed(e.to_string());
                    }
                    None => {
                        return SessionEnd::Closed("stream ended".to_string());
                    }
                }
            }

            Some(beat) = heartbeat.next() => {
                let send_timeout = ctx.settings.send_timeout;
                match tokio::time::timeout(send_timeout, write.send(Message::Text(beat))).await {
                    Ok(Ok(())) => {
                        ctx.metrics.increment_heartbeats();
                        debug!("Heartbeat sent");
                    }
                    Ok(Err(e)) => {
                        let reason = format!("heartbeat send failed: {}", e);
                        ctx.emit(ConnectionEvent::Error(DeliveryError::Disconnected(reason.clone())));
                        return SessionEnd::Closed(reason);
                    }
                    Err(_) => {
                        ctx.emit(ConnectionEvent::Error(DeliveryError::Timeout(send_timeout)));
                        return SessionEnd::Closed("heartbeat send timed out".to_string());
                    }
                }
            }

            _ = sleep_until(deadline) => {
                let timeout = ctx.settings.heartbeat_timeout.unwrap_or_default();
                warn!("No inbound frame for {:?}, treating push connection as dead", timeout);
                ctx.emit(ConnectionEvent::Error(DeliveryError::Timeout(timeout)));
                return SessionEnd::Closed("heartbeat timeout".to_string());
            }
        }
    }
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

fn handle_text(ctx: &SessionContext, text: &str) {
    match decode_notification(text) {
        Ok(Some(message)) => {
            ctx.metrics.increment_notifications();
            ctx.emit(ConnectionEvent::Message(message));
        }
        Ok(None) => debug!("Ignoring non-notification frame"),
        Err(e) => {
            warn!("Dropping malformed frame: {}", e);
            ctx.emit(ConnectionEvent::Error(e));
        }
    }
}

//! Common test utilities for realtime integration tests
//!
//! A scriptable mock WebSocket server, a scripted poll source and polling
//! helpers for asserting on asynchronous state.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use realtime::{NotificationMessage, PollSource, Result};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

#[derive(Debug, Clone)]
enum ServerCommand {
    Send(String),
    Close,
}

/// A mock push server
///
/// Records every text frame clients send, can push frames to every open
/// connection, and can drop connections while continuing to accept new ones.
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    commands: broadcast::Sender<ServerCommand>,
    connections: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
    received: Arc<Mutex<Vec<String>>>,
}

impl MockWsServer {
    /// Create and start a new mock WebSocket server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let (commands, _) = broadcast::channel(64);
        let connections = Arc::new(AtomicUsize::new(0));
        let open = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(Vec::new()));

        let server = Self {
            addr,
            shutdown,
            commands: commands.clone(),
            connections: connections.clone(),
            open: open.clone(),
            received: received.clone(),
        };

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let commands = commands.subscribe();
                                let shutdown = shutdown_rx.clone();
                                let (connections, open, received) =
                                    (connections.clone(), open.clone(), received.clone());
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, commands, shutdown, connections, open, received)
                                        .await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }
        });

        server
    }

    async fn handle_connection(
        stream: tokio::net::TcpStream,
        mut commands: broadcast::Receiver<ServerCommand>,
        mut shutdown: watch::Receiver<bool>,
        connections: Arc<AtomicUsize>,
        open: Arc<AtomicUsize>,
        received: Arc<Mutex<Vec<String>>>,
    ) {
        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };
        connections.fetch_add(1, Ordering::SeqCst);
        open.fetch_add(1, Ordering::SeqCst);

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => received.lock().push(text),
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    }
                }
                command = commands.recv() => {
                    match command {
                        Ok(ServerCommand::Send(text)) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Ok(ServerCommand::Close) | Err(_) => {
                            let _ = write.send(Message::Close(None)).await;
                            break;
                        }
                    }
                }
                _ = shutdown.changed() => {
                    let _ = write.send(Message::Close(None)).await;
                    break;
                }
            }
        }

        open.fetch_sub(1, Ordering::SeqCst);
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a raw text frame to every open connection
    pub fn send_raw(&self, text: impl Into<String>) {
        let _ = self.commands.send(ServerCommand::Send(text.into()));
    }

    /// Send a `notification` frame to every open connection
    pub fn push_notification(&self, payload: Value) {
        self.send_raw(json!({"type": "notification", "payload": payload}).to_string());
    }

    /// Close every open connection but keep accepting new ones
    pub fn drop_connections(&self) {
        let _ = self.commands.send(ServerCommand::Close);
    }

    /// Stop accepting and close every open connection
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Connections currently open
    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Text frames received from clients
    pub fn received(&self) -> Vec<String> {
        self.received.lock().clone()
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// An address nothing listens on
pub fn unused_ws_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}

/// Poll source that replays a script, then returns empty batches
pub struct ScriptedPollSource {
    script: Mutex<VecDeque<Result<Vec<NotificationMessage>>>>,
    calls: AtomicUsize,
}

impl ScriptedPollSource {
    pub fn new(script: Vec<Result<Vec<NotificationMessage>>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn empty() -> Arc<Self> {
        Self::new(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PollSource for ScriptedPollSource {
    async fn fetch(&self) -> Result<Vec<NotificationMessage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

pub fn notification(id: u64) -> NotificationMessage {
    NotificationMessage::new(json!({"id": id}))
}

/// Poll `condition` until it holds or `timeout` elapses
pub async fn wait_until<F>(timeout: Duration, condition: F) -> bool
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Receive the next event, or `None` on timeout
pub async fn recv_within<T>(rx: &mut mpsc::UnboundedReceiver<T>, timeout: Duration) -> Option<T> {
    tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
}

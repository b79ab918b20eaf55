//! Lock-free connection state and counters for the push transport

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Lifecycle state of a push connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    /// Not connected, no attempt in progress
    Disconnected = 0,
    /// First connection attempt in progress
    Connecting = 1,
    /// Socket open
    Connected = 2,
    /// Lost the socket, automatic reconnection in progress
    Reconnecting = 3,
    /// Terminal: disconnected explicitly or reconnect budget spent
    Closed = 4,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            4 => ConnectionState::Closed,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Atomic wrapper around [`ConnectionState`]
#[derive(Debug)]
pub struct AtomicConnectionState {
    inner: AtomicU8,
}

impl AtomicConnectionState {
    pub fn new(state: ConnectionState) -> Self {
        Self {
            inner: AtomicU8::new(state as u8),
        }
    }

    #[inline]
    pub fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    #[inline]
    pub fn set(&self, state: ConnectionState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    /// Transition only if the current state is `current`
    pub fn compare_exchange(
        &self,
        current: ConnectionState,
        new: ConnectionState,
    ) -> Result<ConnectionState, ConnectionState> {
        self.inner
            .compare_exchange(current as u8, new as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(ConnectionState::from_u8)
            .map_err(ConnectionState::from_u8)
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    /// Connecting or reconnecting
    #[inline]
    pub fn is_connecting(&self) -> bool {
        matches!(self.get(), ConnectionState::Connecting | ConnectionState::Reconnecting)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.get() == ConnectionState::Closed
    }
}

/// Counters for one push connection manager
#[derive(Debug, Default)]
pub struct AtomicMetrics {
    frames_received: AtomicU64,
    notifications_received: AtomicU64,
    heartbeats_sent: AtomicU64,
    reconnect_count: AtomicU64,
}

impl AtomicMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment_frames(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_notifications(&self) {
        self.notifications_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_heartbeats(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn increment_reconnects(&self) {
        self.reconnect_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn notifications_received(&self) -> u64 {
        self.notifications_received.load(Ordering::Relaxed)
    }

    pub fn heartbeats_sent(&self) -> u64 {
        self.heartbeats_sent.load(Ordering::Relaxed)
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnect_count.load(Ordering::Relaxed)
    }
}

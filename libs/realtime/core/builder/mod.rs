pub mod states;

use crate::config::{FallbackPolicy, PollSettings, PushSettings, ReconnectBackoff, TransportConfig};
use crate::traits::*;
use states::*;
use std::sync::Arc;
use std::time::Duration;

/// Type-state builder for [`TransportConfig`]
///
/// The endpoint resolver and the poll source are required; the builder's
/// type only exposes `build()` once both are set. Every other setting has a
/// default (see [`PushSettings::default`] and [`PollSettings::default`]).
pub struct TransportConfigBuilder<R, S>
where
    R: ResolverState,
    S: SourceState,
{
    _state: TypeState<R, S>,
    resolver: Option<Arc<dyn EndpointResolver>>,
    poll_source: Option<Arc<dyn PollSource>>,
    push: PushSettings,
    poll: PollSettings,
    fallback: FallbackPolicy,
}

impl TransportConfigBuilder<NoResolver, NoSource> {
    /// Create a new builder instance
    pub fn new() -> Self {
        Self {
            _state: TypeState::new(),
            resolver: None,
            poll_source: None,
            push: PushSettings::default(),
            poll: PollSettings::default(),
            fallback: FallbackPolicy::default(),
        }
    }
}

impl Default for TransportConfigBuilder<NoResolver, NoSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportConfig {
    /// Start building a transport configuration
    pub fn builder() -> TransportConfigBuilder<NoResolver, NoSource> {
        TransportConfigBuilder::new()
    }
}

// Resolver setting
impl<S> TransportConfigBuilder<NoResolver, S>
where
    S: SourceState,
{
    pub fn resolver(self, resolver: impl EndpointResolver + 'static) -> TransportConfigBuilder<HasResolver, S> {
        self.shared_resolver(Arc::new(resolver))
    }

    /// Use a resolver that is already shared elsewhere
    pub fn shared_resolver(self, resolver: Arc<dyn EndpointResolver>) -> TransportConfigBuilder<HasResolver, S> {
        TransportConfigBuilder {
            _state: TypeState::new(),
            resolver: Some(resolver),
            poll_source: self.poll_source,
            push: self.push,
            poll: self.poll,
            fallback: self.fallback,
        }
    }
}

// Poll source setting
impl<R> TransportConfigBuilder<R, NoSource>
where
    R: ResolverState,
{
    pub fn poll_source(self, source: impl PollSource + 'static) -> TransportConfigBuilder<R, HasSource> {
        self.shared_poll_source(Arc::new(source))
    }

    /// Use a poll source that is already shared elsewhere
    pub fn shared_poll_source(self, source: Arc<dyn PollSource>) -> TransportConfigBuilder<R, HasSource> {
        TransportConfigBuilder {
            _state: TypeState::new(),
            resolver: self.resolver,
            poll_source: Some(source),
            push: self.push,
            poll: self.poll,
            fallback: self.fallback,
        }
    }
}

// Optional configuration methods
impl<R, S> TransportConfigBuilder<R, S>
where
    R: ResolverState,
    S: SourceState,
{
    /// Replace all push settings at once
    pub fn push_settings(mut self, settings: PushSettings) -> Self {
        self.push = settings;
        self
    }

    /// Replace all poll settings at once
    pub fn poll_settings(mut self, settings: PollSettings) -> Self {
        self.poll = settings;
        self
    }

    pub fn heartbeat(mut self, interval: Duration, payload: impl Into<String>) -> Self {
        self.push.heartbeat_interval = interval;
        self.push.heartbeat_payload = payload.into();
        self
    }

    pub fn heartbeat_interval(mut self, interval: Duration) -> Self {
        self.push.heartbeat_interval = interval;
        self
    }

    /// Treat the socket as dead after this long without any inbound frame
    ///
    /// Recommended value: a few heartbeat intervals, and only against servers
    /// that answer the keepalive frame.
    pub fn heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.push.heartbeat_timeout = Some(timeout);
        self
    }

    pub fn reconnect_interval(mut self, interval: Duration) -> Self {
        self.push.reconnect_interval = interval;
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: usize) -> Self {
        self.push.max_reconnect_attempts = attempts;
        self
    }

    pub fn reconnect_backoff(mut self, backoff: ReconnectBackoff) -> Self {
        self.push.reconnect_backoff = backoff;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.push.connect_timeout = Some(timeout);
        self
    }

    /// Set the polling interval bounds
    ///
    /// `base` is clamped into `[min, max]` when the engine starts.
    pub fn poll_intervals(mut self, base: Duration, min: Duration, max: Duration) -> Self {
        self.poll.base_interval = base;
        self.poll.min_interval = min;
        self.poll.max_interval = max;
        self
    }

    pub fn adaptive_polling(mut self, adaptive: bool) -> Self {
        self.poll.adaptive = adaptive;
        self
    }

    pub fn fallback_policy(mut self, policy: FallbackPolicy) -> Self {
        self.fallback = policy;
        self
    }
}

// Build method - only available when all required fields are set
impl TransportConfigBuilder<HasResolver, HasSource> {
    pub fn build(self) -> Result<TransportConfig> {
        self.push.validate()?;
        self.poll.validate()?;

        let resolver = self
            .resolver
            .ok_or_else(|| DeliveryError::Configuration("endpoint resolver not set".to_string()))?;
        let poll_source = self
            .poll_source
            .ok_or_else(|| DeliveryError::Configuration("poll source not set".to_string()))?;

        Ok(TransportConfig {
            resolver,
            poll_source,
            push: self.push,
            poll: self.poll,
            fallback: self.fallback,
        })
    }
}

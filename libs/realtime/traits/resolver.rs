use crate::error::Result;
use async_trait::async_trait;
use std::future::Future;

/// Resolves the URL of the push transport
///
/// Endpoint discovery lives outside the delivery layer. Whatever does the
/// lookup is plugged in through this trait. A failure here is treated
/// exactly like a failed connection: push is unavailable, fall back.
///
/// # Example
///
/// ```ignore
/// struct DiscoveryResolver { client: reqwest::Client }
///
/// #[async_trait]
/// impl EndpointResolver for DiscoveryResolver {
///     async fn resolve(&self) -> Result<String> {
///         // Ask the discovery service for the current socket URL
///     }
/// }
/// ```
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    /// Resolve the push endpoint URL (`ws://` or `wss://`)
    async fn resolve(&self) -> Result<String>;
}

/// A fixed, already known endpoint
#[derive(Debug, Clone)]
pub struct StaticEndpoint {
    url: String,
}

impl StaticEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl EndpointResolver for StaticEndpoint {
    async fn resolve(&self) -> Result<String> {
        Ok(self.url.clone())
    }
}

/// Adapts an async closure into an [`EndpointResolver`]
///
/// ```ignore
/// let resolver = FnResolver::new(|| async { Ok("ws://localhost:9000".to_string()) });
/// ```
pub struct FnResolver<F> {
    resolve_fn: F,
}

impl<F> FnResolver<F> {
    pub fn new(resolve_fn: F) -> Self {
        Self { resolve_fn }
    }
}

#[async_trait]
impl<F, Fut> EndpointResolver for FnResolver<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send,
{
    async fn resolve(&self) -> Result<String> {
        (self.resolve_fn)().await
    }
}

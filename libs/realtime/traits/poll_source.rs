use crate::error::Result;
use crate::frame::NotificationMessage;
use async_trait::async_trait;

/// One pull of pending notifications
///
/// Implemented by the HTTP polling client, and by test doubles. Each call is
/// one request/response cycle returning a (possibly empty) batch.
#[async_trait]
pub trait PollSource: Send + Sync {
    /// Fetch the pending batch
    ///
    /// # Returns
    /// * `Ok(batch)` - Messages in the order the server returned them
    /// * `Err(Poll | Parse)` - The cycle failed; the engine keeps going
    async fn fetch(&self) -> Result<Vec<NotificationMessage>>;
}

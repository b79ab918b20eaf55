use crate::error::{DeliveryError, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Frame kind that carries a notification payload
pub const NOTIFICATION_FRAME: &str = "notification";

/// Opaque notification payload delivered to subscribers
///
/// The shape is owned by the backend. The delivery layer never looks inside,
/// it only routes. Cloning is cheap (shared, immutable).
#[derive(Clone, PartialEq)]
pub struct NotificationMessage(Arc<Value>);

impl NotificationMessage {
    pub fn new(payload: Value) -> Self {
        Self(Arc::new(payload))
    }

    /// Borrow the raw payload
    pub fn payload(&self) -> &Value {
        &self.0
    }
}

impl From<Value> for NotificationMessage {
    fn from(payload: Value) -> Self {
        Self::new(payload)
    }
}

impl fmt::Debug for NotificationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NotificationMessage").field(&*self.0).finish()
    }
}

impl fmt::Display for NotificationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for NotificationMessage {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(Self::new)
    }
}

/// A push transport frame
///
/// Frames carry a `type` discriminator. Only `"notification"` frames are
/// forwarded; every other kind is ignored so the server can extend the
/// protocol (typing indicators, acks) without breaking clients.
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, alias = "data")]
    pub payload: Option<Value>,
}

impl Frame {
    /// Decode a text frame
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| DeliveryError::Parse(e.to_string()))
    }

    pub fn is_notification(&self) -> bool {
        self.kind == NOTIFICATION_FRAME
    }

    /// Extract the notification carried by this frame
    ///
    /// # Returns
    /// * `Ok(Some(message))` - A notification frame with a payload
    /// * `Ok(None)` - Any other frame kind (ignored)
    /// * `Err(Parse)` - A notification frame without a payload
    pub fn into_notification(self) -> Result<Option<NotificationMessage>> {
        if !self.is_notification() {
            return Ok(None);
        }
        match self.payload {
            Some(payload) => Ok(Some(NotificationMessage::new(payload))),
            None => Err(DeliveryError::Parse(
                "notification frame without payload".to_string(),
            )),
        }
    }
}

/// Decode a text frame straight to the notification it carries, if any
pub fn decode_notification(text: &str) -> Result<Option<NotificationMessage>> {
    Frame::parse(text)?.into_notification()
}

//! Messaging transport seam and its numeric status codes.
//!
//! The codes follow the convention of common embedded MQTT clients so that
//! log lines stay comparable across node generations: negative values are
//! client-side conditions, positive values are CONNACK refusals.

use super::message_manager::InboundMessage;

pub const MQTT_CONNECTION_TIMEOUT: i32 = -4;
pub const MQTT_CONNECTION_LOST: i32 = -3;
pub const MQTT_CONNECT_FAILED: i32 = -2;
pub const MQTT_DISCONNECTED: i32 = -1;
pub const MQTT_CONNECTED: i32 = 0;
pub const MQTT_CONNECT_BAD_PROTOCOL: i32 = 1;
pub const MQTT_CONNECT_BAD_CLIENT_ID: i32 = 2;
pub const MQTT_CONNECT_UNAVAILABLE: i32 = 3;
pub const MQTT_CONNECT_BAD_CREDENTIALS: i32 = 4;
pub const MQTT_CONNECT_UNAUTHORIZED: i32 = 5;

/// Human-readable meaning of a transport status code.
pub fn describe_error_code(code: i32) -> &'static str {
    match code {
        MQTT_CONNECTION_TIMEOUT => "Connection timed out",
        MQTT_CONNECTION_LOST => "Connection lost",
        MQTT_CONNECT_FAILED => "Network connection failed",
        MQTT_DISCONNECTED => "Disconnected",
        MQTT_CONNECTED => "Connected",
        MQTT_CONNECT_BAD_PROTOCOL => "Unsupported protocol version",
        MQTT_CONNECT_BAD_CLIENT_ID => "Client identifier rejected",
        MQTT_CONNECT_UNAVAILABLE => "Server unavailable",
        MQTT_CONNECT_BAD_CREDENTIALS => "Bad username or password",
        MQTT_CONNECT_UNAUTHORIZED => "Not authorized",
        _ => "Unknown status code",
    }
}

/// Minimal MQTT client interface the broker session is written against.
///
/// Implementations must not retry internally: one `connect` call is one
/// attempt, and the outcome is reported through the return value and
/// [`MessagingTransport::last_error_code`].
#[allow(async_fn_in_trait)]
pub trait MessagingTransport {
    /// Opens a fresh session. Returns `true` once the broker accepted it.
    async fn connect(&mut self, client_id: &str) -> bool;

    async fn subscribe(&mut self, topic: &str) -> bool;

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> bool;

    /// Drives the client for one tick and returns messages that arrived on
    /// subscribed topics.
    async fn service(&mut self) -> Vec<InboundMessage>;

    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    fn last_error_code(&self) -> i32;
}

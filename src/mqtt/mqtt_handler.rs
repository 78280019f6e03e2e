//! rumqttc-backed implementation of [`MessagingTransport`].
//!
//! Every `connect` builds a fresh `AsyncClient`/`EventLoop` pair with a clean
//! session, so requests queued against a dead connection never leak into the
//! next one. The event loop is only driven from inside the trait methods,
//! which keeps the whole node on a single cooperative task.

use std::time::Duration;

use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use super::config::TopicConfig;
use super::message_manager::InboundMessage;
use super::transport::{
    MessagingTransport, MQTT_CONNECTED, MQTT_CONNECTION_LOST, MQTT_CONNECTION_TIMEOUT,
    MQTT_CONNECT_BAD_CLIENT_ID, MQTT_CONNECT_BAD_CREDENTIALS, MQTT_CONNECT_BAD_PROTOCOL,
    MQTT_CONNECT_FAILED, MQTT_CONNECT_UNAUTHORIZED, MQTT_CONNECT_UNAVAILABLE, MQTT_DISCONNECTED,
};

const REQUEST_CAPACITY: usize = 16;
const FLUSH_WINDOW: Duration = Duration::from_millis(50);

pub struct MqttHandler {
    address: String,
    port: u16,
    keep_alive: Duration,
    connect_timeout: Duration,
    service_window: Duration,
    client: Option<AsyncClient>,
    eventloop: Option<EventLoop>,
    connected: bool,
    last_error: i32,
    pending: Vec<InboundMessage>,
}

impl MqttHandler {
    pub fn new(config: &TopicConfig) -> Self {
        MqttHandler {
            address: config.address.clone(),
            port: config.port,
            keep_alive: config.keep_alive(),
            connect_timeout: config.connect_timeout(),
            service_window: config.service_window(),
            client: None,
            eventloop: None,
            connected: false,
            last_error: MQTT_DISCONNECTED,
            pending: Vec::new(),
        }
    }

    /// Polls the event loop until `window` elapses or the connection breaks.
    async fn drive(&mut self, window: Duration) {
        let Some(eventloop) = self.eventloop.as_mut() else {
            return;
        };
        let deadline = Instant::now() + window;

        loop {
            match timeout_at(deadline, eventloop.poll()).await {
                Err(_) => break,
                Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                    self.pending
                        .push(InboundMessage::new(publish.topic.clone(), publish.payload.to_vec()));
                }
                Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                    warn!("Broker sent DISCONNECT");
                    self.connected = false;
                    self.last_error = MQTT_DISCONNECTED;
                    break;
                }
                Ok(Ok(event)) => debug!("MQTT event: {:?}", event),
                Ok(Err(e)) => {
                    warn!("MQTT event loop error: {}", e);
                    self.connected = false;
                    self.last_error = connection_error_code(&e, false);
                    break;
                }
            }
        }
    }

    fn release(&mut self) {
        self.client = None;
        self.eventloop = None;
        self.connected = false;
    }
}

impl MessagingTransport for MqttHandler {
    async fn connect(&mut self, client_id: &str) -> bool {
        self.release();

        let mut mqtt_options = MqttOptions::new(client_id, self.address.clone(), self.port);
        mqtt_options
            .set_keep_alive(self.keep_alive)
            .set_clean_session(true);
        let (client, mut eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        let deadline = Instant::now() + self.connect_timeout;
        loop {
            match timeout_at(deadline, eventloop.poll()).await {
                Ok(Ok(Event::Incoming(Packet::ConnAck(connack)))) => {
                    let code = connack_code(connack.code);
                    if code != MQTT_CONNECTED {
                        self.last_error = code;
                        return false;
                    }
                    self.client = Some(client);
                    self.eventloop = Some(eventloop);
                    self.connected = true;
                    self.last_error = MQTT_CONNECTED;
                    return true;
                }
                Ok(Ok(event)) => debug!("MQTT event before CONNACK: {:?}", event),
                Ok(Err(e)) => {
                    debug!("MQTT connect error: {}", e);
                    self.last_error = connection_error_code(&e, true);
                    return false;
                }
                Err(_) => {
                    self.last_error = MQTT_CONNECTION_TIMEOUT;
                    return false;
                }
            }
        }
    }

    async fn subscribe(&mut self, topic: &str) -> bool {
        let Some(client) = self.client.as_ref() else {
            return false;
        };
        if let Err(e) = client.try_subscribe(topic, QoS::AtMostOnce) {
            warn!("Subscribe request for {} not queued: {}", topic, e);
            return false;
        }
        self.drive(FLUSH_WINDOW).await;
        self.connected
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        let Some(client) = self.client.as_ref() else {
            return false;
        };
        if let Err(e) = client.try_publish(topic, QoS::AtMostOnce, false, payload.to_vec()) {
            warn!("Publish request for {} not queued: {}", topic, e);
            return false;
        }
        self.drive(FLUSH_WINDOW).await;
        self.connected
    }

    async fn service(&mut self) -> Vec<InboundMessage> {
        self.drive(self.service_window).await;
        std::mem::take(&mut self.pending)
    }

    async fn disconnect(&mut self) {
        let queued = self
            .client
            .as_ref()
            .is_some_and(|client| client.try_disconnect().is_ok());
        if queued {
            self.drive(FLUSH_WINDOW).await;
        }
        self.release();
        self.last_error = MQTT_DISCONNECTED;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn last_error_code(&self) -> i32 {
        self.last_error
    }
}

fn connack_code(code: ConnectReturnCode) -> i32 {
    match code {
        ConnectReturnCode::Success => MQTT_CONNECTED,
        ConnectReturnCode::RefusedProtocolVersion => MQTT_CONNECT_BAD_PROTOCOL,
        ConnectReturnCode::BadClientId => MQTT_CONNECT_BAD_CLIENT_ID,
        ConnectReturnCode::ServiceUnavailable => MQTT_CONNECT_UNAVAILABLE,
        ConnectReturnCode::BadUserNamePassword => MQTT_CONNECT_BAD_CREDENTIALS,
        ConnectReturnCode::NotAuthorized => MQTT_CONNECT_UNAUTHORIZED,
    }
}

fn connection_error_code(error: &ConnectionError, connecting: bool) -> i32 {
    match error {
        ConnectionError::ConnectionRefused(code) => connack_code(*code),
        ConnectionError::NetworkTimeout | ConnectionError::FlushTimeout => MQTT_CONNECTION_TIMEOUT,
        _ if connecting => MQTT_CONNECT_FAILED,
        _ => MQTT_CONNECTION_LOST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connack_refusals_map_to_positive_codes() {
        assert_eq!(connack_code(ConnectReturnCode::Success), MQTT_CONNECTED);
        assert_eq!(
            connack_code(ConnectReturnCode::NotAuthorized),
            MQTT_CONNECT_UNAUTHORIZED
        );
        assert_eq!(
            connection_error_code(
                &ConnectionError::ConnectionRefused(ConnectReturnCode::BadClientId),
                true
            ),
            MQTT_CONNECT_BAD_CLIENT_ID
        );
    }

    #[test]
    fn network_errors_depend_on_phase() {
        let io = || ConnectionError::Io(std::io::Error::from(std::io::ErrorKind::ConnectionRefused));
        assert_eq!(connection_error_code(&io(), true), MQTT_CONNECT_FAILED);
        assert_eq!(connection_error_code(&io(), false), MQTT_CONNECTION_LOST);
        assert_eq!(
            connection_error_code(&ConnectionError::NetworkTimeout, false),
            MQTT_CONNECTION_TIMEOUT
        );
    }

    #[tokio::test]
    async fn unconnected_handler_refuses_requests() {
        let mut handler = MqttHandler::new(&TopicConfig::default());
        assert!(!handler.is_connected());
        assert!(!handler.subscribe("ynovbdxb2/meteo").await);
        assert!(!handler.publish("ynovbdxb2/meteo", b"{}").await);
        assert!(handler.service().await.is_empty());
        assert_eq!(handler.last_error_code(), MQTT_DISCONNECTED);
    }
}

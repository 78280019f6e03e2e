//! In-memory stand-ins for hardware and network collaborators.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::link::provisioning::{Provisioner, ProvisioningError, ResetInput};
use crate::mqtt::message_manager::{InboundMessage, MessageHandler};
use crate::mqtt::transport::{MessagingTransport, MQTT_CONNECTED, MQTT_CONNECT_FAILED, MQTT_CONNECTION_LOST, MQTT_DISCONNECTED};
use crate::mqtt::PublishError;
use crate::sensor::{SensorPort, SensorReading};
use crate::telemetry::TelemetrySink;

/// Transport that succeeds unless told otherwise.
pub struct MockTransport {
    /// Results for upcoming connect calls; `true` once exhausted
    pub connect_results: VecDeque<bool>,
    /// Time each connect spends before answering
    pub connect_delay: Duration,
    pub failure_code: i32,
    pub subscribe_ok: bool,
    pub publish_ok: bool,
    pub connected: bool,
    pub error_code: i32,
    pub connect_calls: usize,
    pub service_calls: usize,
    pub disconnect_calls: usize,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
    pub inbound: Vec<InboundMessage>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self {
            connect_results: VecDeque::new(),
            connect_delay: Duration::ZERO,
            failure_code: MQTT_CONNECT_FAILED,
            subscribe_ok: true,
            publish_ok: true,
            connected: false,
            error_code: MQTT_DISCONNECTED,
            connect_calls: 0,
            service_calls: 0,
            disconnect_calls: 0,
            subscriptions: Vec::new(),
            published: Vec::new(),
            inbound: Vec::new(),
        }
    }
}

impl MockTransport {
    pub fn drop_connection(&mut self) {
        self.connected = false;
        self.error_code = MQTT_CONNECTION_LOST;
    }
}

impl MessagingTransport for MockTransport {
    async fn connect(&mut self, _client_id: &str) -> bool {
        self.connect_calls += 1;
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        let ok = self.connect_results.pop_front().unwrap_or(true);
        self.connected = ok;
        self.error_code = if ok { MQTT_CONNECTED } else { self.failure_code };
        ok
    }

    async fn subscribe(&mut self, topic: &str) -> bool {
        self.subscriptions.push(topic.to_string());
        if !self.subscribe_ok {
            self.error_code = self.failure_code;
        }
        self.subscribe_ok
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        if self.publish_ok {
            self.published.push((topic.to_string(), payload.to_vec()));
        } else {
            self.error_code = self.failure_code;
        }
        self.publish_ok
    }

    async fn service(&mut self) -> Vec<InboundMessage> {
        self.service_calls += 1;
        std::mem::take(&mut self.inbound)
    }

    async fn disconnect(&mut self) {
        self.disconnect_calls += 1;
        self.connected = false;
        self.error_code = MQTT_DISCONNECTED;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn last_error_code(&self) -> i32 {
        self.error_code
    }
}

#[derive(Default)]
pub struct RecordingHandler {
    pub received: Rc<RefCell<Vec<InboundMessage>>>,
}

impl MessageHandler for RecordingHandler {
    fn on_message(&mut self, message: &InboundMessage) {
        self.received.borrow_mut().push(message.clone());
    }
}

pub struct MockProvisioner {
    pub connect_result: bool,
    pub link_up: bool,
    pub connect_calls: Vec<String>,
    pub reset_calls: usize,
    pub link_checks: usize,
}

impl Default for MockProvisioner {
    fn default() -> Self {
        Self {
            connect_result: true,
            link_up: true,
            connect_calls: Vec::new(),
            reset_calls: 0,
            link_checks: 0,
        }
    }
}

impl Provisioner for MockProvisioner {
    async fn auto_connect(&mut self, ap_name: &str) -> bool {
        self.connect_calls.push(ap_name.to_string());
        self.connect_result
    }

    async fn reset_stored_credentials(&mut self) -> Result<(), ProvisioningError> {
        self.reset_calls += 1;
        Ok(())
    }

    async fn link_up(&mut self) -> bool {
        self.link_checks += 1;
        self.link_up
    }
}

#[derive(Default)]
pub struct PressedReset {
    pub samples: usize,
}

impl ResetInput for PressedReset {
    fn is_asserted(&mut self) -> bool {
        self.samples += 1;
        true
    }
}

pub struct ScriptedSensors {
    reading: SensorReading,
    pub reads: usize,
}

impl ScriptedSensors {
    pub fn repeating(reading: SensorReading) -> Self {
        Self { reading, reads: 0 }
    }

    pub fn set(&mut self, reading: SensorReading) {
        self.reading = reading;
    }
}

impl SensorPort for ScriptedSensors {
    fn read(&mut self) -> SensorReading {
        self.reads += 1;
        self.reading
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub reject_with: Option<PublishError>,
    pub attempts: usize,
    pub published: Vec<(String, Vec<u8>)>,
}

impl TelemetrySink for RecordingSink {
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.attempts += 1;
        if let Some(error) = self.reject_with.clone() {
            return Err(error);
        }
        self.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }
}

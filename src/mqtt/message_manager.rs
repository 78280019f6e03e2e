use chrono::{DateTime, Local};
use std::fmt;
use tracing::info;

const PREVIEW_CHARS: usize = 64;

/// A message delivered by the broker on a subscribed topic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    topic: String,
    payload: Vec<u8>,
    received_at: DateTime<Local>,
}

impl InboundMessage {
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        InboundMessage {
            topic: topic.into(),
            payload: payload.into(),
            received_at: Local::now(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn preview(&self) -> String {
        let text = String::from_utf8_lossy(&self.payload);
        let mut preview: String = text.chars().take(PREVIEW_CHARS).collect();
        if text.chars().count() > PREVIEW_CHARS {
            preview.push('…');
        }
        preview
    }
}

impl fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} - {} => {}",
            self.received_at.format("%H:%M:%S%.3f"),
            self.topic,
            self.preview()
        )
    }
}

/// Receives inbound messages dispatched by the broker session.
pub trait MessageHandler {
    fn on_message(&mut self, message: &InboundMessage);
}

/// Echoes every inbound message to the log and does nothing else.
#[derive(Debug, Default)]
pub struct LoggingHandler;

impl MessageHandler for LoggingHandler {
    fn on_message(&mut self, message: &InboundMessage) {
        info!("Message received on {} => {}", message.topic(), message.preview());
    }
}

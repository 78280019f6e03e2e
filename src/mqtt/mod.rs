//! # MQTT Broker Session
//!
//! Everything between a serialized telemetry payload and the broker.
//!
//! ```text
//! mqtt/
//! ├── config.rs           - broker endpoint and topics (TopicConfig)
//! ├── backoff.rs          - retry delay policy for failed connects
//! ├── transport.rs        - MessagingTransport trait and status codes
//! ├── mqtt_handler.rs     - rumqttc implementation of the transport
//! ├── message_manager.rs  - inbound message record and handler trait
//! └── session.rs          - BrokerSession state machine
//! ```
//!
//! The session owns its transport and its inbound handler; nothing here is
//! global. The scheduler polls the session once per tick, and only while the
//! wireless link is up.

pub mod backoff;
pub mod config;
pub mod message_manager;
pub mod mqtt_handler;
pub mod session;
pub mod transport;

pub use backoff::BackoffPolicy;
pub use config::TopicConfig;
pub use message_manager::{InboundMessage, LoggingHandler, MessageHandler};
pub use mqtt_handler::MqttHandler;
pub use session::{BrokerSession, PublishError, SessionError, SessionState};
pub use transport::MessagingTransport;

//! Broker session state machine
//!
//! Layered on top of the wireless link: the session is only polled while the
//! link is up and is reset to `Idle` as soon as it goes down.
//!
//! ```text
//!            connect ok + subscribe
//!   Idle ─────────────────────────────► Subscribed
//!    │  ▲                                  │
//!    │  │ backoff deadline passed          │ link lost / transport lost
//!    ▼  │                                  ▼
//!  Failed(code) ◄── connect failed ──── Connecting ───► Idle
//! ```
//!
//! Every `poll` makes at most one connection attempt and never sleeps; the
//! retry delay is a deadline compared against the caller's monotonic clock.
//! The deadline counts from the moment the attempt failed, so time spent
//! inside a slow connect does not eat into the delay.

use chrono::{DateTime, Local};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::backoff::BackoffPolicy;
use super::config::TopicConfig;
use super::message_manager::MessageHandler;
use super::transport::{describe_error_code, MessagingTransport};

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Subscribed,
    /// Last connection attempt failed with the transport's status code
    Failed(i32),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("Broker session not connected (state {0:?})")]
    NotConnected(SessionState),

    #[error("Transport rejected publish to {topic} (code {code})")]
    Rejected { topic: String, code: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Broker unreachable after {attempts} attempts (last code {last_code})")]
    RetriesExhausted { attempts: u32, last_code: i32 },
}

/// Counters kept for diagnostics.
#[derive(Clone, Debug, Default)]
pub struct SessionStats {
    pub connect_attempts: usize,
    pub connect_failures: usize,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub publish_failures: usize,
    pub last_activity: Option<DateTime<Local>>,
}

pub struct BrokerSession<T: MessagingTransport> {
    transport: T,
    config: TopicConfig,
    backoff: BackoffPolicy,
    handler: Box<dyn MessageHandler>,
    state: SessionState,
    next_attempt_at: Option<Instant>,
    consecutive_failures: u32,
    stats: SessionStats,
}

impl<T: MessagingTransport> BrokerSession<T> {
    pub fn new(
        transport: T,
        config: TopicConfig,
        backoff: BackoffPolicy,
        handler: Box<dyn MessageHandler>,
    ) -> Self {
        Self {
            transport,
            config,
            backoff,
            handler,
            state: SessionState::Idle,
            next_attempt_at: None,
            consecutive_failures: 0,
            stats: SessionStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Advances the session by one step.
    ///
    /// Must only be called while the link is up. While subscribed this
    /// services the transport and dispatches inbound messages; otherwise it
    /// makes exactly one connection attempt, unless a backoff deadline is
    /// still pending.
    pub async fn poll(&mut self, now: Instant) -> Result<SessionState, SessionError> {
        if self.state == SessionState::Subscribed {
            self.dispatch_inbound().await;
            if self.transport.is_connected() {
                return Ok(self.state);
            }
            let code = self.transport.last_error_code();
            warn!(
                "Broker connection lost, code {} ({})",
                code,
                describe_error_code(code)
            );
            self.state = SessionState::Idle;
        }

        if let Some(deadline) = self.next_attempt_at {
            if now < deadline {
                debug!(
                    "Broker retry pending for another {:?}",
                    deadline.saturating_duration_since(now)
                );
                return Ok(self.state);
            }
            self.next_attempt_at = None;
            if let SessionState::Failed(_) = self.state {
                debug!("Backoff elapsed, broker session back to Idle");
                self.state = SessionState::Idle;
            }
        }

        self.attempt(now).await
    }

    async fn attempt(&mut self, now: Instant) -> Result<SessionState, SessionError> {
        let started = Instant::now();
        self.state = SessionState::Connecting;
        self.stats.connect_attempts += 1;
        info!(
            "Connecting to broker {}:{} as {}",
            self.config.address, self.config.port, self.config.client_id
        );

        if !self.transport.connect(&self.config.client_id).await {
            let code = self.transport.last_error_code();
            return self.fail(now + started.elapsed(), code);
        }

        // Broker-side subscriptions are not assumed to survive a dropped
        // session, so every successful connect subscribes again.
        if !self.transport.subscribe(&self.config.subscribe_topic).await {
            let code = self.transport.last_error_code();
            error!("Subscribe to {} failed", self.config.subscribe_topic);
            self.transport.disconnect().await;
            return self.fail(now + started.elapsed(), code);
        }

        info!(
            "Connected to broker, subscribed to {}",
            self.config.subscribe_topic
        );
        self.state = SessionState::Subscribed;
        self.consecutive_failures = 0;
        self.stats.last_activity = Some(Local::now());
        Ok(self.state)
    }

    fn fail(&mut self, failed_at: Instant, code: i32) -> Result<SessionState, SessionError> {
        self.consecutive_failures += 1;
        self.stats.connect_failures += 1;
        self.state = SessionState::Failed(code);

        if self.backoff.is_exhausted(self.consecutive_failures) {
            error!(
                "Broker connection failed, code {} ({}); giving up after {} attempts",
                code,
                describe_error_code(code),
                self.consecutive_failures
            );
            return Err(SessionError::RetriesExhausted {
                attempts: self.consecutive_failures,
                last_code: code,
            });
        }

        let delay = self.backoff.delay_for(self.consecutive_failures);
        self.next_attempt_at = Some(failed_at + delay);
        error!(
            "Broker connection failed, code {} ({}); retrying in {:?}",
            code,
            describe_error_code(code),
            delay
        );
        Ok(self.state)
    }

    async fn dispatch_inbound(&mut self) {
        let messages = self.transport.service().await;
        if messages.is_empty() {
            return;
        }
        self.stats.messages_received += messages.len();
        self.stats.last_activity = Some(Local::now());
        for message in &messages {
            self.handler.on_message(message);
        }
    }

    /// Resets the session after the link left `Connected`.
    ///
    /// A pending backoff deadline is kept, so a flapping link cannot be used
    /// to bypass the retry delay.
    pub async fn on_link_lost(&mut self) {
        if self.state == SessionState::Idle {
            return;
        }
        if matches!(
            self.state,
            SessionState::Subscribed | SessionState::Connecting
        ) {
            self.transport.disconnect().await;
        }
        info!("Link down, broker session reset to Idle");
        self.state = SessionState::Idle;
    }

    /// Publishes one message. Nothing is queued: when the session is not
    /// subscribed the payload is dropped and `NotConnected` is returned.
    pub async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        if self.state != SessionState::Subscribed || !self.transport.is_connected() {
            return Err(PublishError::NotConnected(self.state));
        }

        if self.transport.publish(topic, payload).await {
            self.stats.messages_sent += 1;
            self.stats.last_activity = Some(Local::now());
            Ok(())
        } else {
            self.stats.publish_failures += 1;
            Err(PublishError::Rejected {
                topic: topic.to_string(),
                code: self.transport.last_error_code(),
            })
        }
    }

    pub async fn shutdown(&mut self) {
        if self.state == SessionState::Subscribed {
            self.transport.disconnect().await;
        }
        self.state = SessionState::Idle;
        let last_activity = self
            .stats
            .last_activity
            .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "never".to_string());
        info!(
            "Broker session closed: attempts={} failures={} sent={} received={} publish_failures={} last_activity={}",
            self.stats.connect_attempts,
            self.stats.connect_failures,
            self.stats.messages_sent,
            self.stats.messages_received,
            self.stats.publish_failures,
            last_activity
        );
    }
}

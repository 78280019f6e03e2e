//! Fixed-period sample-and-publish cycle.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::payload::{PayloadError, TelemetryPayload};
use crate::mqtt::{BrokerSession, MessagingTransport, PublishError};
use crate::sensor::{ChannelSet, SensorPort};

/// Destination for serialized telemetry.
#[allow(async_fn_in_trait)]
pub trait TelemetrySink {
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError>;
}

impl<T: MessagingTransport> TelemetrySink for BrokerSession<T> {
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), PublishError> {
        BrokerSession::publish(self, topic, payload).await
    }
}

/// Monotonic last-fire timestamp plus a fixed period.
#[derive(Debug, Clone, Copy)]
pub struct PublishCycleTimer {
    period: Duration,
    last_fire: Instant,
}

impl PublishCycleTimer {
    /// The first cycle becomes due one period after `start`.
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            last_fire: start,
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_fire) >= self.period
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_fire = now;
    }
}

/// What a tick did, mostly for the scheduler's debug output and tests.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    NotDue,
    Published,
    Skipped(PayloadError),
    Dropped(PublishError),
}

pub struct TelemetryPublisher {
    timer: PublishCycleTimer,
    channels: ChannelSet,
    topic: String,
}

impl TelemetryPublisher {
    pub fn new(period: Duration, channels: ChannelSet, topic: impl Into<String>, start: Instant) -> Self {
        Self {
            timer: PublishCycleTimer::new(period, start),
            channels,
            topic: topic.into(),
        }
    }

    /// Runs one cycle if the period has elapsed.
    ///
    /// The timer is re-armed before anything can fail, so neither a sensor
    /// error nor a rejected publish makes the next tick retry immediately.
    pub async fn on_tick<S: SensorPort, K: TelemetrySink>(
        &mut self,
        now: Instant,
        sensors: &mut S,
        sink: &mut K,
    ) -> CycleOutcome {
        if !self.timer.is_due(now) {
            return CycleOutcome::NotDue;
        }
        self.timer.mark(now);

        let reading = sensors.read();
        let payload = match TelemetryPayload::from_reading(&reading, &self.channels) {
            Ok(payload) => payload,
            Err(e) => {
                error!("Sensor read error, cycle skipped: {}", e);
                return CycleOutcome::Skipped(e);
            }
        };

        if let Some(light) = reading.light {
            debug!("Light: raw={} lux={:.1}", light.raw, light.lux);
        }

        let wire = payload.to_wire();
        info!("Publishing to {}: {}", self.topic, wire);
        match sink.publish(&self.topic, wire.as_bytes()).await {
            Ok(()) => CycleOutcome::Published,
            Err(e) => {
                warn!("Telemetry dropped: {}", e);
                CycleOutcome::Dropped(e)
            }
        }
    }
}

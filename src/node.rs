//! Cooperative scheduler for one sensor node.
//!
//! Each tick advances the components strictly in order:
//!
//! ```text
//! LinkManager::poll ──► BrokerSession::poll ──► TelemetryPublisher::on_tick
//!   (always)             (link Connected)        (session Subscribed)
//! ```
//!
//! Nothing runs concurrently; a tick that blocks in a hardware call stalls the
//! whole node, which is the accepted failure mode.

use tokio::time::Instant;
use tracing::{debug, info};

use crate::link::{LinkError, LinkManager, LinkState, Provisioner};
use crate::mqtt::{BrokerSession, MessagingTransport, SessionError, SessionState};
use crate::sensor::SensorPort;
use crate::telemetry::{CycleOutcome, TelemetryPublisher};

/// Why the node has to be restarted. Each maps to a distinct process exit
/// code so the supervisor's journal shows the cause.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RestartReason {
    #[error(transparent)]
    Link(#[from] LinkError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl RestartReason {
    pub fn exit_code(&self) -> i32 {
        match self {
            RestartReason::Link(LinkError::CredentialsErased) => 3,
            RestartReason::Link(LinkError::ProvisioningFailed { .. }) => 4,
            RestartReason::Session(SessionError::RetriesExhausted { .. }) => 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub link: LinkState,
    pub session: SessionState,
    pub cycle: Option<CycleOutcome>,
}

pub struct Node<P: Provisioner, T: MessagingTransport, S: SensorPort> {
    link: LinkManager<P>,
    session: BrokerSession<T>,
    publisher: TelemetryPublisher,
    sensors: S,
}

impl<P: Provisioner, T: MessagingTransport, S: SensorPort> Node<P, T, S> {
    pub fn new(
        link: LinkManager<P>,
        session: BrokerSession<T>,
        publisher: TelemetryPublisher,
        sensors: S,
    ) -> Self {
        Self {
            link,
            session,
            publisher,
            sensors,
        }
    }

    pub fn link(&self) -> &LinkManager<P> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut LinkManager<P> {
        &mut self.link
    }

    pub fn session(&self) -> &BrokerSession<T> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut BrokerSession<T> {
        &mut self.session
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    pub async fn tick(&mut self, now: Instant) -> Result<TickReport, RestartReason> {
        let link = self.link.poll(now).await?;
        if link != LinkState::Connected {
            self.session.on_link_lost().await;
            return Ok(TickReport {
                link,
                session: self.session.state(),
                cycle: None,
            });
        }

        let session = self.session.poll(now).await?;
        let cycle = if session == SessionState::Subscribed {
            let outcome = self
                .publisher
                .on_tick(now, &mut self.sensors, &mut self.session)
                .await;
            if outcome != CycleOutcome::NotDue {
                debug!("Publish cycle: {:?}", outcome);
            }
            Some(outcome)
        } else {
            None
        };

        Ok(TickReport {
            link,
            session,
            cycle,
        })
    }

    pub async fn shutdown(&mut self) {
        info!("Shutting down node");
        self.session.shutdown().await;
    }
}

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::provisioning::{Provisioner, ResetInput};

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    ResetRequested,
}

/// Fatal link outcomes; both end in a device restart.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("Stored wireless credentials erased on request")]
    CredentialsErased,

    #[error("Wireless provisioning via {ap_name} failed")]
    ProvisioningFailed { ap_name: String },
}

/// Owns the wireless link state machine.
///
/// The reset input is read exactly once, when the manager is created. From
/// the core's point of view the link is binary: `Connected` or not.
///
/// Asking the provisioner whether the link is still up can be expensive, so
/// while connected it is only asked once per check interval.
pub struct LinkManager<P: Provisioner> {
    provisioner: P,
    ap_name: String,
    state: LinkState,
    check_interval: Duration,
    next_check_at: Option<Instant>,
}

impl<P: Provisioner> LinkManager<P> {
    pub fn new(provisioner: P, ap_name: impl Into<String>, reset_input: &mut impl ResetInput) -> Self {
        let state = if reset_input.is_asserted() {
            warn!("Credential reset requested at boot");
            LinkState::ResetRequested
        } else {
            LinkState::Disconnected
        };
        Self {
            provisioner,
            ap_name: ap_name.into(),
            state,
            check_interval: Duration::ZERO,
            next_check_at: None,
        }
    }

    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    pub fn provisioner_mut(&mut self) -> &mut P {
        &mut self.provisioner
    }

    fn transition(&mut self, next: LinkState) {
        if self.state != next {
            info!("Link state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Advances the link by one step.
    ///
    /// A lost link is reported as `Disconnected` for one tick before the
    /// next poll tries to re-establish it, so the broker session always
    /// observes the drop.
    pub async fn poll(&mut self, now: Instant) -> Result<LinkState, LinkError> {
        match self.state {
            LinkState::ResetRequested => {
                warn!("Erasing stored wireless credentials");
                if let Err(e) = self.provisioner.reset_stored_credentials().await {
                    error!("Credential erase incomplete: {}", e);
                }
                return Err(LinkError::CredentialsErased);
            }
            LinkState::Connected => {
                if self.next_check_at.is_some_and(|at| now < at) {
                    return Ok(LinkState::Connected);
                }
                if self.provisioner.link_up().await {
                    debug!("Wireless link check passed");
                    self.next_check_at = Some(now + self.check_interval);
                    return Ok(LinkState::Connected);
                }
                warn!("Wireless link lost");
                self.next_check_at = None;
                self.transition(LinkState::Disconnected);
                return Ok(self.state);
            }
            LinkState::Disconnected | LinkState::Connecting => {}
        }

        self.transition(LinkState::Connecting);
        if self.provisioner.auto_connect(&self.ap_name).await {
            info!("Wireless link established");
            self.next_check_at = Some(now + self.check_interval);
            self.transition(LinkState::Connected);
            Ok(self.state)
        } else {
            error!("Wireless link could not be established, restarting");
            self.transition(LinkState::Disconnected);
            Err(LinkError::ProvisioningFailed {
                ap_name: self.ap_name.clone(),
            })
        }
    }
}

//! 5GMM procedure handlers, one per downlink message type
//! (TS 24.501 section 5).

use tracing::{debug, info, warn};

use ransim_nas::messages::mm::{
    AuthenticationFailure, AuthenticationRequest, AuthenticationResponse,
    ConfigurationUpdateCommand, DlNasTransport, IdentityRequest, IdentityResponse,
    RegistrationAccept, SecurityModeCommand, SecurityModeComplete, SecurityModeReject,
};
use ransim_nas::{MmCause, MmMessage, SecurityError, SmMessage};

use crate::state::MmState;
use crate::task::UeTask;

impl UeTask {
    pub(crate) async fn handle_mm(&mut self, msg: MmMessage) {
        match msg {
            MmMessage::AuthenticationRequest(m) => self.on_authentication_request(m).await,
            MmMessage::SecurityModeCommand(m) => self.on_security_mode_command(m).await,
            MmMessage::RegistrationAccept(m) => self.on_registration_accept(m).await,
            MmMessage::ServiceAccept => self.on_service_accept().await,
            MmMessage::DeregistrationAccept => self.on_deregistration_accept().await,
            MmMessage::IdentityRequest(m) => self.on_identity_request(m).await,
            MmMessage::ConfigurationUpdateCommand(m) => {
                self.on_configuration_update(m).await
            }
            MmMessage::DlNasTransport(m) => self.on_dl_nas_transport(m).await,
            other => {
                warn!(supi = %self.creds.supi, message = ?other.message_type(),
                    "unexpected downlink 5GMM message, dropped");
            }
        }
    }

    /// Runs 5G-AKA against the received challenge. Success answers with
    /// RES* and enters REGISTERED-INITIATED; MAC or SQN failure answers
    /// with an Authentication Failure and leaves the 5GMM state
    /// untouched.
    async fn on_authentication_request(&mut self, m: AuthenticationRequest) {
        match self
            .ctx
            .run_aka(&mut self.creds, m.ngksi, &m.abba, &m.rand, &m.autn)
        {
            Ok(res_star) => {
                debug!(supi = %self.creds.supi, "authentication challenge accepted");
                self.send_mm(MmMessage::AuthenticationResponse(AuthenticationResponse {
                    res_star,
                }))
                .await;
                self.set_mm_state(MmState::RegisteredInitiated).await;
            }
            Err(SecurityError::MacFailure) => {
                warn!(supi = %self.creds.supi, "AUTN MAC failure, rejecting authentication");
                self.send_mm(MmMessage::AuthenticationFailure(AuthenticationFailure {
                    cause: MmCause::MacFailure,
                    auts: None,
                }))
                .await;
            }
            Err(SecurityError::SqnFailure { auts }) => {
                warn!(supi = %self.creds.supi, "SQN out of range, requesting re-synchronisation");
                self.send_mm(MmMessage::AuthenticationFailure(AuthenticationFailure {
                    cause: MmCause::SynchFailure,
                    auts: Some(auts),
                }))
                .await;
            }
            Err(e) => warn!(supi = %self.creds.supi, %e, "authentication aborted"),
        }
    }

    /// By the time this handler runs the secured codec has already
    /// adopted the commanded algorithms and derived the NAS keys; what
    /// is left is the capability replay check and the reply.
    async fn on_security_mode_command(&mut self, m: SecurityModeCommand) {
        let own = self.capabilities();
        let acceptable = m.replayed_capabilities == own
            && own.supports_ea(m.algorithms.ciphering)
            && own.supports_ia(m.algorithms.integrity);
        if !acceptable {
            warn!(supi = %self.creds.supi, "security mode command does not match advertised capabilities");
            self.send_mm(MmMessage::SecurityModeReject(SecurityModeReject {
                cause: MmCause::UeSecurityCapabilitiesMismatch,
            }))
            .await;
            return;
        }

        self.ctx.ngksi = m.ngksi & 0x07;
        let nas_container = self.registration_container.clone().unwrap_or_default();
        self.send_mm(MmMessage::SecurityModeComplete(SecurityModeComplete {
            nas_container,
        }))
        .await;
    }

    async fn on_registration_accept(&mut self, m: RegistrationAccept) {
        if self.mm_state != MmState::RegisteredInitiated {
            warn!(supi = %self.creds.supi, state = %self.mm_state, "unsolicited Registration Accept, dropped");
            return;
        }
        if m.tmsi.is_some() {
            self.tmsi = m.tmsi;
        }
        // The configured slice wins; the network's allowed slice fills
        // the gap when none is configured.
        self.allowed_slice = self.config.slice.or(m.allowed_slice);

        self.send_mm(MmMessage::RegistrationComplete).await;
        self.set_mm_state(MmState::Registered).await;
        info!(supi = %self.creds.supi, tmsi = ?self.tmsi, "registered");
    }

    async fn on_service_accept(&mut self) {
        if self.mm_state != MmState::ServiceRequestInitiated {
            warn!(supi = %self.creds.supi, state = %self.mm_state, "unsolicited Service Accept, dropped");
            return;
        }
        self.set_mm_state(MmState::Registered).await;
    }

    async fn on_deregistration_accept(&mut self) {
        if self.mm_state != MmState::DeregisteredInitiated {
            warn!(supi = %self.creds.supi, state = %self.mm_state, "unsolicited Deregistration Accept, dropped");
            return;
        }
        self.sessions.clear();
        self.set_mm_state(MmState::Deregistered).await;
    }

    async fn on_identity_request(&mut self, m: IdentityRequest) {
        debug!(supi = %self.creds.supi, identity_type = m.identity_type, "identity requested");
        let identity = self.creds.supi.clone();
        self.send_mm(MmMessage::IdentityResponse(IdentityResponse {
            mobile_identity: identity,
        }))
        .await;
    }

    async fn on_configuration_update(&mut self, m: ConfigurationUpdateCommand) {
        if let Some(tmsi) = m.tmsi {
            debug!(supi = %self.creds.supi, tmsi, "5G-TMSI reassigned");
            self.tmsi = Some(tmsi);
        }
        self.send_mm(MmMessage::ConfigurationUpdateComplete).await;
    }

    async fn on_dl_nas_transport(&mut self, m: DlNasTransport) {
        match SmMessage::decode_plain(&m.payload) {
            Ok(sm) => self.handle_sm(sm).await,
            Err(e) => {
                warn!(supi = %self.creds.supi, %e, "5GSM payload rejected, dropped")
            }
        }
    }
}

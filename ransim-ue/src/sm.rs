//! 5GSM procedure handlers (TS 24.501 section 6), entered through the
//! DL NAS Transport payload.

use std::time::Duration;

use tracing::{info, warn};

use ransim_nas::messages::sm::{
    PduSessionEstablishmentAccept, PduSessionEstablishmentReject, PduSessionReleaseCommand,
    PduSessionReleaseComplete,
};
use ransim_nas::SmMessage;

use crate::events::UeStateEvent;
use crate::state::{SmState, MAX_SESSION_RETRIES};
use crate::task::{UeMessage, UeTask};

impl UeTask {
    pub(crate) async fn handle_sm(&mut self, msg: SmMessage) {
        match msg {
            SmMessage::PduSessionEstablishmentAccept(m) => self.on_establishment_accept(m).await,
            SmMessage::PduSessionEstablishmentReject(m) => self.on_establishment_reject(m).await,
            SmMessage::PduSessionReleaseCommand(m) => self.on_release_command(m).await,
            other => {
                warn!(supi = %self.creds.supi, message = ?other.message_type(),
                    "unexpected downlink 5GSM message, dropped");
            }
        }
    }

    async fn on_establishment_accept(&mut self, m: PduSessionEstablishmentAccept) {
        let Some(session) = self.sessions.get_mut(m.pdu_session_id) else {
            warn!(supi = %self.creds.supi, pdu_session_id = m.pdu_session_id,
                "establishment accept for unknown session, dropped");
            return;
        };
        session.retries = 0;
        session.ue_address = Some(m.ue_address);
        session.qfi = Some(m.qfi);

        self.set_sm_state(m.pdu_session_id, SmState::Active).await;
        self.publish(UeStateEvent::SessionEstablished {
            pdu_session_id: m.pdu_session_id,
            ue_address: m.ue_address,
            qfi: m.qfi,
        })
        .await;
        info!(supi = %self.creds.supi, pdu_session_id = m.pdu_session_id,
            ue_address = %m.ue_address, "PDU session established");
    }

    /// Rejected establishments back off exponentially, 5^n seconds for
    /// the n-th retry, and give up for good past the cap.
    async fn on_establishment_reject(&mut self, m: PduSessionEstablishmentReject) {
        let Some(session) = self.sessions.get_mut(m.pdu_session_id) else {
            warn!(supi = %self.creds.supi, pdu_session_id = m.pdu_session_id,
                "establishment reject for unknown session, dropped");
            return;
        };
        if session.state != SmState::ActivePending {
            return;
        }

        if session.retries >= MAX_SESSION_RETRIES {
            warn!(supi = %self.creds.supi, pdu_session_id = m.pdu_session_id, cause = m.cause,
                "establishment rejected past the retry cap, abandoning session");
            self.sessions.release(m.pdu_session_id);
            self.publish(UeStateEvent::SessionAbandoned {
                pdu_session_id: m.pdu_session_id,
                cause: m.cause,
            })
            .await;
            return;
        }

        let delay = Duration::from_secs(5u64.pow(u32::from(session.retries)));
        session.retries += 1;
        warn!(supi = %self.creds.supi, pdu_session_id = m.pdu_session_id, cause = m.cause,
            retry_in = ?delay, "establishment rejected, backing off");

        let handle = self.handle.clone();
        let pdu_session_id = m.pdu_session_id;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = handle.send(UeMessage::SessionRetry { pdu_session_id }).await;
        });
    }

    async fn on_release_command(&mut self, m: PduSessionReleaseCommand) {
        let Some(session) = self.sessions.release(m.pdu_session_id) else {
            warn!(supi = %self.creds.supi, pdu_session_id = m.pdu_session_id,
                "release command for unknown session, dropped");
            return;
        };
        info!(supi = %self.creds.supi, pdu_session_id = m.pdu_session_id, cause = m.cause,
            "PDU session released by the network");
        self.publish(UeStateEvent::SessionTransition {
            pdu_session_id: m.pdu_session_id,
            from: session.state,
            to: SmState::Inactive,
        })
        .await;
        self.send_sm(SmMessage::PduSessionReleaseComplete(
            PduSessionReleaseComplete {
                pdu_session_id: m.pdu_session_id,
                pti: m.pti,
            },
        ))
        .await;
    }
}

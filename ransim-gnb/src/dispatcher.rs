//! NGAP procedure dispatch.
//!
//! One handler per (PDU kind, procedure code) pair the gNB consumes.
//! A handler failure aborts only that message; unknown or out-of-role
//! procedures are logged and skipped, and the dispatch loop never
//! stops.

use std::net::IpAddr;

use tracing::{debug, info, warn};

use ransim_common::{DownlinkMessage, UserPlaneInfo};
use ransim_ngap::procedures::context::{
    InitialContextSetupRequest, InitialContextSetupResponse, UeContextReleaseCommand,
    UeContextReleaseComplete,
};
use ransim_ngap::procedures::management::{
    AmfConfigurationUpdate, AmfConfigurationUpdateAcknowledge, AmfStatusIndication, Paging,
};
use ransim_ngap::procedures::nas_transport::DownlinkNasTransport;
use ransim_ngap::procedures::ng_setup::{NgSetupFailure, NgSetupResponse};
use ransim_ngap::procedures::session::{
    PduSessionResourceReleaseCommand, PduSessionResourceReleaseResponse,
    PduSessionResourceSetupRequest, PduSessionResourceSetupResponse, SessionSetupResponseItem,
};
use ransim_ngap::{
    Cause, InitiatingMessage, NgapPdu, SuccessfulOutcome, TransportCause, UnsuccessfulOutcome,
};

use crate::amf_pool::AmfAssociationState;
use crate::registry::{GnbPduSession, UeLifecycle};
use crate::task::GnbTask;

impl GnbTask {
    /// Dispatches one inbound NGAP PDU from the given association.
    pub(crate) async fn dispatch(&mut self, amf_id: i32, pdu: NgapPdu) {
        let code = pdu.procedure_code();
        match pdu {
            NgapPdu::Successful(SuccessfulOutcome::NgSetupResponse(m)) => {
                self.on_ng_setup_response(amf_id, m)
            }
            NgapPdu::Unsuccessful(UnsuccessfulOutcome::NgSetupFailure(m)) => {
                self.on_ng_setup_failure(amf_id, m)
            }
            NgapPdu::Initiating(InitiatingMessage::DownlinkNasTransport(m)) => {
                self.on_downlink_nas(m).await
            }
            NgapPdu::Initiating(InitiatingMessage::InitialContextSetupRequest(m)) => {
                self.on_initial_context_setup(amf_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::PduSessionResourceSetupRequest(m)) => {
                self.on_session_setup(amf_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::PduSessionResourceReleaseCommand(m)) => {
                self.on_session_release(amf_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::UeContextReleaseCommand(m)) => {
                self.on_context_release(amf_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::Paging(m)) => self.on_paging(m).await,
            NgapPdu::Initiating(InitiatingMessage::AmfConfigurationUpdate(m)) => {
                self.on_amf_configuration_update(amf_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::AmfStatusIndication(m)) => {
                self.on_amf_status_indication(amf_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::ErrorIndication(m)) => {
                warn!(
                    amf_id,
                    amf_ue_ngap_id = ?m.amf_ue_ngap_id,
                    ran_ue_ngap_id = ?m.ran_ue_ngap_id,
                    cause = %m.cause.map(|c| c.to_string()).unwrap_or_default(),
                    "Error Indication received"
                );
            }
            NgapPdu::Initiating(InitiatingMessage::HandoverRequest(m)) => {
                self.on_handover_request(amf_id, m).await
            }
            NgapPdu::Successful(SuccessfulOutcome::HandoverCommand(m)) => {
                self.on_handover_command(m).await
            }
            NgapPdu::Successful(SuccessfulOutcome::PathSwitchRequestAcknowledge(m)) => {
                self.on_path_switch_ack(m).await
            }
            other => {
                warn!(amf_id, kind = ?other.kind(), code = ?code, "unhandled NGAP procedure, skipped");
            }
        }
    }

    fn on_ng_setup_response(&mut self, amf_id: i32, resp: NgSetupResponse) {
        let Some(assoc) = self.pool.get_mut(amf_id) else {
            warn!(amf_id, "NG Setup Response for unknown association");
            return;
        };
        assoc.on_setup_response(&resp);
        info!(amf_id, amf_name = %resp.amf_name, capacity = resp.relative_amf_capacity,
              "NG Setup complete, association Active");
    }

    fn on_ng_setup_failure(&mut self, amf_id: i32, failure: NgSetupFailure) {
        warn!(amf_id, cause = %failure.cause, "NG Setup failed, association stays Inactive");
        if let Some(assoc) = self.pool.get_mut(amf_id) {
            assoc.state = AmfAssociationState::Inactive;
        }
    }

    async fn on_downlink_nas(&mut self, m: DownlinkNasTransport) {
        let entry = match self.registry.get_mut(m.ran_ue_ngap_id) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(%e, "downlink NAS dropped");
                return;
            }
        };
        entry.amf_ue_ngap_id.get_or_insert(m.amf_ue_ngap_id);
        let downlink = entry.downlink.clone();
        downlink.send(DownlinkMessage::Nas(m.nas_pdu)).await;
    }

    async fn on_initial_context_setup(&mut self, amf_id: i32, m: InitialContextSetupRequest) {
        let entry = match self.registry.get_mut(m.ran_ue_ngap_id) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(%e, "Initial Context Setup dropped");
                return;
            }
        };
        entry.amf_ue_ngap_id = Some(m.amf_ue_ngap_id);
        entry.state = UeLifecycle::Active;
        let downlink = entry.downlink.clone();
        if let Some(nas_pdu) = m.nas_pdu {
            downlink.send(DownlinkMessage::Nas(nas_pdu)).await;
        }
        self.send_to_amf(
            amf_id,
            NgapPdu::Successful(SuccessfulOutcome::InitialContextSetupResponse(
                InitialContextSetupResponse {
                    amf_ue_ngap_id: m.amf_ue_ngap_id,
                    ran_ue_ngap_id: m.ran_ue_ngap_id,
                },
            )),
        )
        .await;
    }

    async fn on_session_setup(&mut self, amf_id: i32, m: PduSessionResourceSetupRequest) {
        if self.registry.get(m.ran_ue_ngap_id).is_err() {
            warn!(ran_ue_ngap_id = m.ran_ue_ngap_id, "session setup for unknown UE dropped");
            return;
        }
        let gnb_address = match self.config.n3_address {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(_) => {
                warn!("IPv6 N3 address not supported, session setup dropped");
                return;
            }
        };

        let mut successful = Vec::new();
        let mut user_plane = Vec::new();
        let mut nas_pdus = Vec::new();
        if let Some(pdu) = m.nas_pdu {
            nas_pdus.push(pdu);
        }

        for item in m.items {
            let downlink_teid = self.registry.allocate_teid(m.ran_ue_ngap_id);
            // Lookup is infallible here, checked above and untouched since.
            if let Ok(entry) = self.registry.get_mut(m.ran_ue_ngap_id) {
                entry.sessions.insert(
                    item.pdu_session_id,
                    GnbPduSession {
                        psi: item.pdu_session_id,
                        qfi: item.qfi,
                        uplink_teid: item.uplink_teid,
                        downlink_teid,
                        upf_address: IpAddr::V4(item.upf_address),
                    },
                );
            }
            successful.push(SessionSetupResponseItem {
                pdu_session_id: item.pdu_session_id,
                downlink_teid,
                gnb_address,
            });
            user_plane.push(UserPlaneInfo {
                pdu_session_id: item.pdu_session_id,
                uplink_teid: item.uplink_teid,
                downlink_teid,
                upf_address: IpAddr::V4(item.upf_address),
                ue_address: None,
            });
            if let Some(pdu) = item.nas_pdu {
                nas_pdus.push(pdu);
            }
        }

        if let Ok(entry) = self.registry.get(m.ran_ue_ngap_id) {
            let downlink = entry.downlink.clone();
            for pdu in nas_pdus {
                downlink.send(DownlinkMessage::Nas(pdu)).await;
            }
            downlink
                .send(DownlinkMessage::UserPlane {
                    sessions: user_plane,
                    gnb_n3_address: self.config.n3_address,
                })
                .await;
        }

        self.send_to_amf(
            amf_id,
            NgapPdu::Successful(SuccessfulOutcome::PduSessionResourceSetupResponse(
                PduSessionResourceSetupResponse {
                    amf_ue_ngap_id: m.amf_ue_ngap_id,
                    ran_ue_ngap_id: m.ran_ue_ngap_id,
                    successful,
                    failed: Vec::new(),
                },
            )),
        )
        .await;
    }

    async fn on_session_release(&mut self, amf_id: i32, m: PduSessionResourceReleaseCommand) {
        let entry = match self.registry.get_mut(m.ran_ue_ngap_id) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(%e, "session release dropped");
                return;
            }
        };
        let mut released = Vec::new();
        for psi in &m.pdu_session_ids {
            if entry.sessions.remove(psi).is_some() {
                released.push(*psi);
            }
        }
        let downlink = entry.downlink.clone();
        if let Some(nas_pdu) = m.nas_pdu {
            downlink.send(DownlinkMessage::Nas(nas_pdu)).await;
        }
        self.send_to_amf(
            amf_id,
            NgapPdu::Successful(SuccessfulOutcome::PduSessionResourceReleaseResponse(
                PduSessionResourceReleaseResponse {
                    amf_ue_ngap_id: m.amf_ue_ngap_id,
                    ran_ue_ngap_id: m.ran_ue_ngap_id,
                    released,
                },
            )),
        )
        .await;
    }

    async fn on_context_release(&mut self, amf_id: i32, m: UeContextReleaseCommand) {
        let ran_ue_ngap_id = match m.ue_ngap_ids.ran_ue_ngap_id() {
            Some(id) => id,
            None => {
                // AMF only knows its own id; resolve through the registry.
                match self
                    .registry
                    .find_by_amf_ue_id(m.ue_ngap_ids.amf_ue_ngap_id())
                {
                    Some(entry) => entry.ran_ue_ngap_id,
                    None => {
                        warn!(
                            amf_ue_ngap_id = m.ue_ngap_ids.amf_ue_ngap_id(),
                            "release command for unknown UE dropped"
                        );
                        return;
                    }
                }
            }
        };
        debug!(ran_ue_ngap_id, cause = %m.cause, "releasing UE context");
        self.release_ue(ran_ue_ngap_id).await;
        self.send_to_amf(
            amf_id,
            NgapPdu::Successful(SuccessfulOutcome::UeContextReleaseComplete(
                UeContextReleaseComplete {
                    amf_ue_ngap_id: m.ue_ngap_ids.amf_ue_ngap_id(),
                    ran_ue_ngap_id,
                },
            )),
        )
        .await;
    }

    async fn on_paging(&mut self, m: Paging) {
        if !m.tai_list.iter().any(|t| *t == self.tai()) {
            debug!(tmsi = m.ue_paging_tmsi, "paging outside served TAs, ignored");
            return;
        }
        debug!(tmsi = m.ue_paging_tmsi, "UE paged");
        self.registry.paged.add(m.ue_paging_tmsi).await;
    }

    async fn on_amf_configuration_update(&mut self, amf_id: i32, m: AmfConfigurationUpdate) {
        let mut successful = Vec::new();
        let mut failed = Vec::new();

        // Adds and updates are both matched against already-dialled
        // endpoints; the transport dial itself is external.
        for item in m.to_add.iter().chain(m.to_update.iter()) {
            match self.pool.find_by_address(item.address) {
                Some(assoc) => {
                    assoc.tnla_weight = item.weight;
                    if let Some(name) = &m.amf_name {
                        assoc.name = Some(name.clone());
                    }
                    successful.push(item.address);
                }
                None => {
                    warn!(address = %item.address, "TNLA endpoint not dialled, update refused");
                    failed.push((
                        item.address,
                        Cause::Transport(TransportCause::TransportResourceUnavailable),
                    ));
                }
            }
        }

        for address in m.to_remove {
            match self.pool.find_by_address(address).map(|a| a.id) {
                Some(id) => {
                    self.pool.remove(id);
                    successful.push(address);
                    info!(%address, "TNLA association removed by configuration update");
                }
                None => failed.push((
                    address,
                    Cause::Transport(TransportCause::TransportResourceUnavailable),
                )),
            }
        }

        self.send_to_amf(
            amf_id,
            NgapPdu::Successful(SuccessfulOutcome::AmfConfigurationUpdateAcknowledge(
                AmfConfigurationUpdateAcknowledge { successful, failed },
            )),
        )
        .await;
    }

    async fn on_amf_status_indication(&mut self, amf_id: i32, m: AmfStatusIndication) {
        for item in m.unavailable_guami_list {
            let Some(failed) = self.pool.find_by_guami(&item.guami) else {
                debug!(guami = %item.guami, "status indication for unserved GUAMI");
                continue;
            };
            let failed_id = failed.id;
            let backup_name = item
                .backup_amf_name
                .or_else(|| failed.backup_amf_name.clone());

            let Some(backup_id) = backup_name
                .as_deref()
                .and_then(|name| self.pool.find_by_name(name))
                .map(|a| a.id)
                .filter(|id| *id != failed_id)
            else {
                warn!(guami = %item.guami, "no backup AMF for failed GUAMI, UEs stranded");
                continue;
            };

            let moved = self
                .registry
                .rebind_ues_from_association(failed_id, backup_id);
            self.pool.remove(failed_id);
            info!(
                amf_id,
                failed_id, backup_id, moved, "AMF failover complete, TNLA released"
            );
        }
    }
}

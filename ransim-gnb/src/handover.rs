//! Handover coordination, keyed on the stable PR id.
//!
//! Xn: the source gNB builds a fresh mailbox pair on the target's
//! admission channel, hands the UE side over through its old downlink,
//! and the target issues a Path Switch Request for the sessions it
//! re-admitted. N2: Handover Required goes to the AMF, the target
//! prepares a shadow context from the Handover Request's transparent
//! container, and the source migrates the mailbox once the Handover
//! Command arrives. Shadow contexts of an aborted preparation are not
//! torn down.

use std::net::IpAddr;

use tokio::sync::mpsc;
use tracing::{info, warn};

use ransim_common::{mailbox_pair, AdmissionRequest, DownlinkMessage, DownlinkSender, UserPlaneInfo};
use ransim_ngap::procedures::handover::{
    HandoverNotify, HandoverPreparationFailure, HandoverRequest, HandoverRequestAcknowledge,
    HandoverRequired, HandoverSessionItem, PathSwitchRequest, PathSwitchRequestAcknowledge,
    PathSwitchSessionItem, SourceToTargetContainer,
};
use ransim_ngap::{
    Cause, InitiatingMessage, NgapPdu, ProtocolCause, RadioNetworkCause, SuccessfulOutcome,
};

use crate::registry::{GnbPduSession, UeLifecycle};
use crate::task::GnbTask;

impl GnbTask {
    /// Source side of an Xn handover: migrate the mailbox directly and
    /// let the target path-switch.
    pub(crate) async fn start_xn_handover(&mut self, pr_id: i64, target_gnb_id: u32) {
        let Some(target) = self.peers.get(&target_gnb_id).cloned() else {
            warn!(pr_id, target_gnb_id, "no Xn link to target gNB");
            return;
        };
        let Some(ran_ue_ngap_id) = self.registry.find_by_pr_id(pr_id).map(|e| e.ran_ue_ngap_id)
        else {
            warn!(pr_id, "Xn handover for unknown UE");
            return;
        };
        self.migrate_ue(ran_ue_ngap_id, target).await;
    }

    /// Source side of an N2 handover: ask the AMF to prepare the target.
    pub(crate) async fn start_n2_handover(&mut self, pr_id: i64, target_gnb_id: u32) {
        let Some(entry) = self.registry.find_by_pr_id_mut(pr_id) else {
            warn!(pr_id, "N2 handover for unknown UE");
            return;
        };
        let Some(amf_ue_ngap_id) = entry.amf_ue_ngap_id else {
            warn!(pr_id, "N2 handover before context setup");
            return;
        };
        entry.handover_target = Some(target_gnb_id);
        let container = SourceToTargetContainer {
            pr_id,
            sessions: entry
                .sessions
                .values()
                .map(|s| HandoverSessionItem {
                    pdu_session_id: s.psi,
                    uplink_teid: s.uplink_teid,
                    upf_address: match s.upf_address {
                        IpAddr::V4(v4) => v4,
                        IpAddr::V6(_) => std::net::Ipv4Addr::UNSPECIFIED,
                    },
                })
                .collect(),
        };
        let ran_ue_ngap_id = entry.ran_ue_ngap_id;
        let amf_id = entry.amf_id;
        info!(pr_id, target_gnb_id, "sending Handover Required");
        self.send_to_amf(
            amf_id,
            NgapPdu::Initiating(InitiatingMessage::HandoverRequired(HandoverRequired {
                amf_ue_ngap_id,
                ran_ue_ngap_id,
                target_gnb_id,
                cause: Cause::RadioNetwork(RadioNetworkCause::HandoverDesirableForRadioReason),
                container: container.encode(),
            })),
        )
        .await;
    }

    /// Target side of an N2 handover: build a shadow context from the
    /// transparent container. A container that does not parse aborts
    /// the preparation; the UE stays at the source.
    pub(crate) async fn on_handover_request(&mut self, amf_id: i32, m: HandoverRequest) {
        let container = match SourceToTargetContainer::decode(&m.container) {
            Ok(container) => container,
            Err(e) => {
                warn!(amf_ue_ngap_id = m.amf_ue_ngap_id, %e, "handover preparation aborted");
                self.send_to_amf(
                    amf_id,
                    NgapPdu::Unsuccessful(
                        ransim_ngap::UnsuccessfulOutcome::HandoverPreparationFailure(
                            HandoverPreparationFailure {
                                amf_ue_ngap_id: m.amf_ue_ngap_id,
                                ran_ue_ngap_id: 0,
                                cause: Cause::Protocol(ProtocolCause::TransferSyntaxError),
                            },
                        ),
                    ),
                )
                .await;
                return;
            }
        };

        // Shadow entry with no mailbox yet; the admission that follows
        // the Handover Command attaches one.
        let (tx, _rx) = mpsc::channel(1);
        let placeholder = DownlinkSender::new(tx);
        placeholder.close().await;

        let ran_ue_ngap_id = {
            let entry = self
                .registry
                .admit_ue(placeholder, container.pr_id, None, amf_id);
            entry.amf_ue_ngap_id = Some(m.amf_ue_ngap_id);
            entry.ran_ue_ngap_id
        };
        for s in &container.sessions {
            let downlink_teid = self.registry.allocate_teid(ran_ue_ngap_id);
            if let Ok(entry) = self.registry.get_mut(ran_ue_ngap_id) {
                entry.sessions.insert(
                    s.pdu_session_id,
                    GnbPduSession {
                        psi: s.pdu_session_id,
                        qfi: 1,
                        uplink_teid: s.uplink_teid,
                        downlink_teid,
                        upf_address: IpAddr::V4(s.upf_address),
                    },
                );
            }
        }

        info!(pr_id = container.pr_id, ran_ue_ngap_id, "handover target prepared");
        self.send_to_amf(
            amf_id,
            NgapPdu::Successful(SuccessfulOutcome::HandoverRequestAcknowledge(
                HandoverRequestAcknowledge {
                    amf_ue_ngap_id: m.amf_ue_ngap_id,
                    ran_ue_ngap_id,
                    container: container.encode(),
                },
            )),
        )
        .await;
    }

    /// Source side: the AMF cleared the handover, migrate the mailbox.
    pub(crate) async fn on_handover_command(
        &mut self,
        m: ransim_ngap::procedures::handover::HandoverCommand,
    ) {
        let Ok(entry) = self.registry.get(m.ran_ue_ngap_id) else {
            warn!(ran_ue_ngap_id = m.ran_ue_ngap_id, "Handover Command for unknown UE");
            return;
        };
        let Some(target) = entry
            .handover_target
            .and_then(|gnb_id| self.peers.get(&gnb_id))
            .cloned()
        else {
            warn!(ran_ue_ngap_id = m.ran_ue_ngap_id, "Handover Command without a known target");
            return;
        };
        self.migrate_ue(m.ran_ue_ngap_id, target).await;
    }

    /// Hands the UE's mailbox to the target gNB and drops the local
    /// context. Used by both the Xn path and the N2 Handover Command.
    async fn migrate_ue(&mut self, ran_ue_ngap_id: i64, target: mpsc::Sender<AdmissionRequest>) {
        let (pr_id, paging_tmsi, amf_ue_ngap_id, sessions, old_downlink) = {
            let Ok(entry) = self.registry.get(ran_ue_ngap_id) else {
                warn!(ran_ue_ngap_id, "migration for unknown UE");
                return;
            };
            let sessions: Vec<UserPlaneInfo> = entry
                .sessions
                .values()
                .map(|s| UserPlaneInfo {
                    pdu_session_id: s.psi,
                    uplink_teid: s.uplink_teid,
                    // The target allocates its own downlink endpoint.
                    downlink_teid: 0,
                    upf_address: s.upf_address,
                    ue_address: None,
                })
                .collect();
            (
                entry.pr_id,
                entry.paging_tmsi,
                entry.amf_ue_ngap_id,
                sessions,
                entry.downlink.clone(),
            )
        };

        let (ue_mailbox, gnb_endpoint) = mailbox_pair(target.clone());
        let request = AdmissionRequest {
            endpoint: gnb_endpoint,
            pr_id,
            paging_tmsi,
            is_handover: true,
            sessions,
            amf_ue_ngap_id,
        };
        if target.send(request).await.is_err() {
            warn!(pr_id, "target admission channel closed, handover aborted");
            return;
        }
        old_downlink
            .send(DownlinkMessage::Handover(ue_mailbox))
            .await;
        old_downlink.close().await;
        let _ = self.registry.remove(ran_ue_ngap_id);
        info!(pr_id, ran_ue_ngap_id, "UE migrated to target gNB");
    }

    /// Target side: an admission tagged as handover, either attaching a
    /// mailbox to an N2 shadow context or re-homing an Xn arrival.
    pub(crate) async fn handle_handover_admission(&mut self, req: AdmissionRequest) {
        if self.registry.find_by_pr_id(req.pr_id).is_some() {
            self.attach_n2_arrival(req).await;
        } else {
            self.admit_xn_arrival(req).await;
        }
    }

    async fn attach_n2_arrival(&mut self, req: AdmissionRequest) {
        let (ran_ue_ngap_id, amf_id, amf_ue_ngap_id, user_plane) = {
            // Presence checked by the caller.
            let Some(entry) = self.registry.find_by_pr_id_mut(req.pr_id) else {
                return;
            };
            entry.downlink = req.endpoint.downlink_tx;
            entry.state = UeLifecycle::Active;
            if entry.paging_tmsi.is_none() {
                entry.paging_tmsi = req.paging_tmsi;
            }
            let user_plane: Vec<UserPlaneInfo> = entry
                .sessions
                .values()
                .map(|s| UserPlaneInfo {
                    pdu_session_id: s.psi,
                    uplink_teid: s.uplink_teid,
                    downlink_teid: s.downlink_teid,
                    upf_address: s.upf_address,
                    ue_address: None,
                })
                .collect();
            (
                entry.ran_ue_ngap_id,
                entry.amf_id,
                entry.amf_ue_ngap_id,
                user_plane,
            )
        };
        self.spawn_uplink_pump(ran_ue_ngap_id, req.endpoint.uplink_rx);

        if let Ok(entry) = self.registry.get(ran_ue_ngap_id) {
            let downlink = entry.downlink.clone();
            downlink
                .send(DownlinkMessage::UserPlane {
                    sessions: user_plane,
                    gnb_n3_address: self.config.n3_address,
                })
                .await;
        }

        if let Some(amf_ue_ngap_id) = amf_ue_ngap_id {
            let tai = self.tai();
            info!(pr_id = req.pr_id, ran_ue_ngap_id, "N2 handover complete, notifying AMF");
            self.send_to_amf(
                amf_id,
                NgapPdu::Initiating(InitiatingMessage::HandoverNotify(HandoverNotify {
                    amf_ue_ngap_id,
                    ran_ue_ngap_id,
                    user_location: tai,
                })),
            )
            .await;
        }
    }

    async fn admit_xn_arrival(&mut self, req: AdmissionRequest) {
        let amf_id = match self.pool.select() {
            Ok(assoc) => assoc.id,
            Err(e) => {
                warn!(pr_id = req.pr_id, %e, "Xn arrival rejected");
                req.endpoint.downlink_tx.close().await;
                return;
            }
        };
        let ran_ue_ngap_id = {
            let entry = self.registry.admit_ue(
                req.endpoint.downlink_tx,
                req.pr_id,
                req.paging_tmsi,
                amf_id,
            );
            entry.state = UeLifecycle::Active;
            entry.ran_ue_ngap_id
        };
        self.spawn_uplink_pump(ran_ue_ngap_id, req.endpoint.uplink_rx);

        let mut switch_items = Vec::new();
        for s in &req.sessions {
            let downlink_teid = self.registry.allocate_teid(ran_ue_ngap_id);
            if let Ok(entry) = self.registry.get_mut(ran_ue_ngap_id) {
                entry.sessions.insert(
                    s.pdu_session_id,
                    GnbPduSession {
                        psi: s.pdu_session_id,
                        qfi: 1,
                        uplink_teid: s.uplink_teid,
                        downlink_teid,
                        upf_address: s.upf_address,
                    },
                );
            }
            switch_items.push(PathSwitchSessionItem {
                pdu_session_id: s.pdu_session_id,
                downlink_teid,
                gnb_address: match self.config.n3_address {
                    IpAddr::V4(v4) => v4,
                    IpAddr::V6(_) => std::net::Ipv4Addr::UNSPECIFIED,
                },
            });
        }

        let Some(source_amf_ue_ngap_id) = req.amf_ue_ngap_id else {
            warn!(pr_id = req.pr_id, "Xn arrival without AMF UE id, path switch skipped");
            return;
        };
        let tai = self.tai();
        info!(pr_id = req.pr_id, ran_ue_ngap_id, "Xn arrival admitted, requesting path switch");
        self.send_to_amf(
            amf_id,
            NgapPdu::Initiating(InitiatingMessage::PathSwitchRequest(PathSwitchRequest {
                ran_ue_ngap_id,
                source_amf_ue_ngap_id,
                user_location: tai,
                sessions: switch_items,
            })),
        )
        .await;
    }

    /// Target side: the AMF switched the downlink path; adopt the
    /// re-homed uplink endpoints and hand the user plane outward.
    pub(crate) async fn on_path_switch_ack(&mut self, m: PathSwitchRequestAcknowledge) {
        let Ok(entry) = self.registry.get_mut(m.ran_ue_ngap_id) else {
            warn!(ran_ue_ngap_id = m.ran_ue_ngap_id, "Path Switch Acknowledge for unknown UE");
            return;
        };
        entry.amf_ue_ngap_id = Some(m.amf_ue_ngap_id);
        for item in &m.sessions {
            if let Some(session) = entry.sessions.get_mut(&item.pdu_session_id) {
                session.uplink_teid = item.uplink_teid;
                session.upf_address = IpAddr::V4(item.upf_address);
            }
        }
        let user_plane: Vec<UserPlaneInfo> = entry
            .sessions
            .values()
            .map(|s| UserPlaneInfo {
                pdu_session_id: s.psi,
                uplink_teid: s.uplink_teid,
                downlink_teid: s.downlink_teid,
                upf_address: s.upf_address,
                ue_address: None,
            })
            .collect();
        let downlink = entry.downlink.clone();
        downlink
            .send(DownlinkMessage::UserPlane {
                sessions: user_plane,
                gnb_n3_address: self.config.n3_address,
            })
            .await;
    }
}

//! Mock AMF for the integration scenarios.
//!
//! One task terminating the decoded-NGAP links of any number of gNBs.
//! It runs the real network side of every procedure the actors under
//! test initiate: NG Setup against its configured PLMN, 5G-AKA with
//! Milenage, the NAS security mode handshake over the secured codec,
//! session resource setup and release, UE context release, path switch
//! and N2 handover coordination. Scenario-visible milestones are
//! reported on an event channel.

use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use ransim_common::{
    Guami, Plmn, Snssai, Tai, TaskHandle, UeConfig, DEFAULT_CHANNEL_CAPACITY,
};
use ransim_crypto::{compute_opc, Milenage};
use ransim_gnb::GnbMessage;
use ransim_nas::messages::mm::{
    AuthenticationRequest, DlNasTransport, RegistrationAccept, SecurityModeCommand,
};
use ransim_nas::messages::sm::{
    PduSessionEstablishmentAccept, PduSessionEstablishmentReject, PduSessionReleaseCommand,
};
use ransim_nas::{
    decode, encode, select_algorithms, Direction, MmMessage, NasMessage, NasSecurityContext,
    SecurityHeaderType, SmMessage, UeCredentials, UeSecurityCapability,
};
use ransim_ngap::procedures::context::{
    InitialContextSetupRequest, UeContextReleaseCommand, UeContextReleaseRequest, UeNgapIds,
};
use ransim_ngap::procedures::handover::{
    HandoverCommand, HandoverNotify, HandoverRequest, HandoverRequestAcknowledge, HandoverRequired,
    PathSwitchAckSessionItem, PathSwitchRequest, PathSwitchRequestAcknowledge,
};
use ransim_ngap::procedures::management::{
    AmfConfigurationUpdate, AmfStatusIndication, Paging, UnavailableGuamiItem,
};
use ransim_ngap::procedures::nas_transport::{
    DownlinkNasTransport, InitialUeMessage, UplinkNasTransport,
};
use ransim_ngap::procedures::ng_setup::{
    NgSetupFailure, NgSetupRequest, NgSetupResponse, PlmnSupportItem, ServedGuamiItem,
};
use ransim_ngap::procedures::session::{
    PduSessionResourceReleaseCommand, PduSessionResourceSetupRequest, SessionSetupItem,
};
use ransim_ngap::{
    Cause, InitiatingMessage, MiscCause, NasCause, NgapPdu, SuccessfulOutcome, UnsuccessfulOutcome,
};

/// UPF N3 address every session tunnel points at.
const UPF_ADDRESS: Ipv4Addr = Ipv4Addr::new(10, 100, 0, 1);

/// Mock AMF parameters.
#[derive(Debug, Clone)]
pub struct MockAmfConfig {
    pub amf_name: String,
    /// Only this PLMN passes NG Setup.
    pub plmn: Plmn,
    pub guami: Guami,
    pub backup_amf_name: Option<String>,
    pub relative_capacity: u8,
    pub slices: Vec<Snssai>,
    /// When set, every establishment request is answered with this
    /// 5GSM reject cause instead of a resource setup.
    pub reject_sessions_with: Option<u8>,
}

impl Default for MockAmfConfig {
    fn default() -> Self {
        Self {
            amf_name: "mock-amf-1".into(),
            plmn: Plmn::new(1, 1, false),
            guami: Guami {
                plmn: Plmn::new(1, 1, false),
                region_id: 1,
                set_id: 1,
                pointer: 0,
            },
            backup_amf_name: None,
            relative_capacity: 100,
            slices: vec![Snssai::new(1)],
            reject_sessions_with: None,
        }
    }
}

/// Milestones the scenarios assert on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockAmfEvent {
    NgSetupRequested { gnb_id: u32, accepted: bool },
    UeRegistered { supi: String, amf_ue_ngap_id: i64 },
    UeWentIdle { supi: String },
    ServiceRestored { supi: String },
    UeDeregistered { supi: String },
    SessionSetupComplete { supi: String, pdu_session_id: u8 },
    SessionReleased { supi: String, pdu_session_id: u8 },
    PathSwitched { supi: String },
    HandoverComplete { supi: String },
    ConfigurationAcknowledged {
        successful: Vec<SocketAddr>,
        failed: Vec<SocketAddr>,
    },
}

enum AmfControl {
    Attach {
        gnb: TaskHandle<GnbMessage>,
        address: SocketAddr,
        weight: u8,
    },
    AddSubscriber(UeConfig),
    Ngap { link_id: i32, pdu: NgapPdu },
    Page { tmsi: u32, tai_list: Vec<Tai> },
    ReleaseSession { supi: String, pdu_session_id: u8 },
    AnnounceUnavailable { backup_amf_name: Option<String> },
    UpdateConfiguration(AmfConfigurationUpdate),
}

/// Handle to a running mock AMF.
#[derive(Clone)]
pub struct MockAmf {
    control: mpsc::Sender<AmfControl>,
}

impl MockAmf {
    /// Spawns the mock AMF task and returns its handle and event stream.
    pub fn start(config: MockAmfConfig) -> (Self, mpsc::Receiver<MockAmfEvent>) {
        let (control_tx, control_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let mut task = MockAmfTask {
            config,
            control_tx: control_tx.clone(),
            links: HashMap::new(),
            next_link_id: 1,
            subscribers: HashMap::new(),
            ues: HashMap::new(),
            next_amf_ue_id: 1000,
            next_tmsi: 0x0100_0000,
            next_teid: 0x4000,
            next_ue_octet: 2,
            events: events_tx,
        };
        tokio::spawn(async move { task.run(control_rx).await });
        (Self { control: control_tx }, events_rx)
    }

    /// Provisions a subscriber from the same configuration its UE runs.
    pub async fn add_subscriber(&self, config: UeConfig) {
        self.send(AmfControl::AddSubscriber(config)).await;
    }

    /// Brings up an NGAP association towards the given gNB.
    pub async fn attach(&self, gnb: &TaskHandle<GnbMessage>, address: SocketAddr, weight: u8) {
        self.send(AmfControl::Attach {
            gnb: gnb.clone(),
            address,
            weight,
        })
        .await;
    }

    /// Pages a 5G-S-TMSI over the listed tracking areas, on every link.
    pub async fn page(&self, tmsi: u32, tai_list: Vec<Tai>) {
        self.send(AmfControl::Page { tmsi, tai_list }).await;
    }

    /// Network-initiated release of one PDU session.
    pub async fn release_session(&self, supi: &str, pdu_session_id: u8) {
        self.send(AmfControl::ReleaseSession {
            supi: supi.into(),
            pdu_session_id,
        })
        .await;
    }

    /// Announces this AMF's GUAMI as unavailable, naming the backup.
    pub async fn announce_unavailable(&self, backup_amf_name: Option<String>) {
        self.send(AmfControl::AnnounceUnavailable { backup_amf_name })
            .await;
    }

    /// Sends an AMF Configuration Update on every link.
    pub async fn update_configuration(&self, update: AmfConfigurationUpdate) {
        self.send(AmfControl::UpdateConfiguration(update)).await;
    }

    async fn send(&self, msg: AmfControl) {
        self.control.send(msg).await.expect("mock AMF task gone");
    }
}

struct GnbLink {
    id: i32,
    address: SocketAddr,
    /// Learned from the NG Setup Request.
    gnb_id: Option<u32>,
    to_gnb: mpsc::Sender<NgapPdu>,
}

struct AmfSession {
    pti: u8,
    uplink_teid: u32,
    upf_address: Ipv4Addr,
}

struct PendingHandover {
    source_link_id: i32,
    source_ran_ue_ngap_id: i64,
    target_link_id: i32,
}

struct AmfUeContext {
    ran_ue_ngap_id: i64,
    link_id: i32,
    supi: String,
    ctx: NasSecurityContext,
    expected_res_star: Option<[u8; 16]>,
    capabilities: UeSecurityCapability,
    /// Plain Registration Request, checked against the Security Mode
    /// Complete NAS container.
    registration_request: Vec<u8>,
    tmsi: u32,
    sessions: HashMap<u8, AmfSession>,
    deregistering: bool,
    pending_handover: Option<PendingHandover>,
}

struct MockAmfTask {
    config: MockAmfConfig,
    control_tx: mpsc::Sender<AmfControl>,
    links: HashMap<i32, GnbLink>,
    next_link_id: i32,
    subscribers: HashMap<String, UeCredentials>,
    ues: HashMap<i64, AmfUeContext>,
    next_amf_ue_id: i64,
    next_tmsi: u32,
    next_teid: u32,
    next_ue_octet: u8,
    events: mpsc::Sender<MockAmfEvent>,
}

impl MockAmfTask {
    async fn run(&mut self, mut control_rx: mpsc::Receiver<AmfControl>) {
        info!(amf_name = %self.config.amf_name, "mock AMF started");
        while let Some(msg) = control_rx.recv().await {
            match msg {
                AmfControl::Attach {
                    gnb,
                    address,
                    weight,
                } => self.attach(gnb, address, weight).await,
                AmfControl::AddSubscriber(config) => self.add_subscriber(config),
                AmfControl::Ngap { link_id, pdu } => self.dispatch(link_id, pdu).await,
                AmfControl::Page { tmsi, tai_list } => {
                    self.broadcast(NgapPdu::Initiating(InitiatingMessage::Paging(Paging {
                        ue_paging_tmsi: tmsi,
                        tai_list,
                    })))
                    .await
                }
                AmfControl::ReleaseSession {
                    supi,
                    pdu_session_id,
                } => self.release_session(&supi, pdu_session_id).await,
                AmfControl::AnnounceUnavailable { backup_amf_name } => {
                    let indication = AmfStatusIndication {
                        unavailable_guami_list: vec![UnavailableGuamiItem {
                            guami: self.config.guami,
                            backup_amf_name,
                        }],
                    };
                    self.broadcast(NgapPdu::Initiating(InitiatingMessage::AmfStatusIndication(
                        indication,
                    )))
                    .await
                }
                AmfControl::UpdateConfiguration(update) => {
                    self.broadcast(NgapPdu::Initiating(
                        InitiatingMessage::AmfConfigurationUpdate(update),
                    ))
                    .await
                }
            }
        }
        info!(amf_name = %self.config.amf_name, "mock AMF stopped");
    }

    async fn attach(&mut self, gnb: TaskHandle<GnbMessage>, address: SocketAddr, weight: u8) {
        let link_id = self.next_link_id;
        self.next_link_id += 1;

        let (link_tx, mut link_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let control = self.control_tx.clone();
        tokio::spawn(async move {
            while let Some(pdu) = link_rx.recv().await {
                if control.send(AmfControl::Ngap { link_id, pdu }).await.is_err() {
                    break;
                }
            }
        });
        self.links.insert(
            link_id,
            GnbLink {
                id: link_id,
                address,
                gnb_id: None,
                to_gnb: inbound_tx,
            },
        );
        info!(amf_name = %self.config.amf_name, link_id, %address, "association towards gNB up");
        if gnb
            .send(GnbMessage::AmfUp {
                address,
                weight,
                link: link_tx,
                inbound: inbound_rx,
            })
            .await
            .is_err()
        {
            warn!(link_id, "gNB task gone, association dropped");
            self.links.remove(&link_id);
        }
    }

    fn add_subscriber(&mut self, config: UeConfig) {
        match subscriber_credentials(&config) {
            Ok(creds) => {
                debug!(supi = %creds.supi, "subscriber provisioned");
                self.subscribers.insert(creds.supi.clone(), creds);
            }
            Err(e) => warn!(%e, "subscriber rejected"),
        }
    }

    async fn send_pdu(&self, link_id: i32, pdu: NgapPdu) {
        match self.links.get(&link_id) {
            Some(link) => {
                if link.to_gnb.send(pdu).await.is_err() {
                    warn!(link_id, address = %link.address, "gNB side of the association is gone");
                }
            }
            None => warn!(link_id, "no such association, PDU dropped"),
        }
    }

    async fn broadcast(&self, pdu: NgapPdu) {
        for link in self.links.values() {
            if link.to_gnb.send(pdu.clone()).await.is_err() {
                warn!(link_id = link.id, "gNB side of the association is gone");
            }
        }
    }

    async fn send_dl_nas(&self, amf_ue_ngap_id: i64, nas_pdu: Vec<u8>) {
        let Some(ue) = self.ues.get(&amf_ue_ngap_id) else {
            return;
        };
        self.send_pdu(
            ue.link_id,
            NgapPdu::Initiating(InitiatingMessage::DownlinkNasTransport(
                DownlinkNasTransport {
                    amf_ue_ngap_id,
                    ran_ue_ngap_id: ue.ran_ue_ngap_id,
                    nas_pdu,
                },
            )),
        )
        .await;
    }

    async fn publish(&self, event: MockAmfEvent) {
        let _ = self.events.send(event).await;
    }

    async fn dispatch(&mut self, link_id: i32, pdu: NgapPdu) {
        match pdu {
            NgapPdu::Initiating(InitiatingMessage::NgSetupRequest(m)) => {
                self.on_ng_setup(link_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::InitialUeMessage(m)) => {
                self.on_initial_ue(link_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::UplinkNasTransport(m)) => {
                self.on_uplink_nas(m).await
            }
            NgapPdu::Initiating(InitiatingMessage::UeContextReleaseRequest(m)) => {
                self.on_release_request(link_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::PathSwitchRequest(m)) => {
                self.on_path_switch(link_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::HandoverRequired(m)) => {
                self.on_handover_required(link_id, m).await
            }
            NgapPdu::Initiating(InitiatingMessage::HandoverNotify(m)) => {
                self.on_handover_notify(m).await
            }
            NgapPdu::Initiating(InitiatingMessage::ErrorIndication(m)) => {
                warn!(link_id, cause = ?m.cause, "Error Indication from gNB");
            }
            NgapPdu::Successful(SuccessfulOutcome::InitialContextSetupResponse(m)) => {
                debug!(amf_ue_ngap_id = m.amf_ue_ngap_id, "initial context set up");
            }
            NgapPdu::Successful(SuccessfulOutcome::PduSessionResourceSetupResponse(m)) => {
                let supi = match self.ues.get(&m.amf_ue_ngap_id) {
                    Some(ue) => ue.supi.clone(),
                    None => return,
                };
                for item in &m.successful {
                    self.publish(MockAmfEvent::SessionSetupComplete {
                        supi: supi.clone(),
                        pdu_session_id: item.pdu_session_id,
                    })
                    .await;
                }
            }
            NgapPdu::Successful(SuccessfulOutcome::PduSessionResourceReleaseResponse(m)) => {
                debug!(amf_ue_ngap_id = m.amf_ue_ngap_id, released = ?m.released,
                    "session resources released");
            }
            NgapPdu::Successful(SuccessfulOutcome::UeContextReleaseComplete(m)) => {
                self.on_release_complete(m.amf_ue_ngap_id).await
            }
            NgapPdu::Successful(SuccessfulOutcome::AmfConfigurationUpdateAcknowledge(m)) => {
                self.publish(MockAmfEvent::ConfigurationAcknowledged {
                    successful: m.successful,
                    failed: m.failed.iter().map(|(addr, _)| *addr).collect(),
                })
                .await;
            }
            NgapPdu::Successful(SuccessfulOutcome::HandoverRequestAcknowledge(m)) => {
                self.on_handover_ack(m).await
            }
            NgapPdu::Unsuccessful(UnsuccessfulOutcome::HandoverPreparationFailure(m)) => {
                warn!(amf_ue_ngap_id = m.amf_ue_ngap_id, cause = %m.cause,
                    "handover preparation failed at the target");
            }
            other => {
                warn!(link_id, kind = ?other.kind(), code = ?other.procedure_code(),
                    "unhandled NGAP procedure at the mock AMF");
            }
        }
    }

    async fn on_ng_setup(&mut self, link_id: i32, m: NgSetupRequest) {
        let gnb_id = m.global_ran_node_id.gnb_id;
        let accepted = m
            .supported_ta_list
            .iter()
            .any(|ta| ta.broadcast_plmns.iter().any(|b| b.plmn == self.config.plmn));

        if let Some(link) = self.links.get_mut(&link_id) {
            link.gnb_id = Some(gnb_id);
        }

        let pdu = if accepted {
            info!(amf_name = %self.config.amf_name, gnb_id, "NG Setup accepted");
            NgapPdu::Successful(SuccessfulOutcome::NgSetupResponse(NgSetupResponse {
                amf_name: self.config.amf_name.clone(),
                served_guami_list: vec![ServedGuamiItem {
                    guami: self.config.guami,
                    backup_amf_name: self.config.backup_amf_name.clone(),
                }],
                relative_amf_capacity: self.config.relative_capacity,
                plmn_support_list: vec![PlmnSupportItem {
                    plmn: self.config.plmn,
                    slices: self.config.slices.clone(),
                }],
            }))
        } else {
            warn!(amf_name = %self.config.amf_name, gnb_id, "NG Setup refused, unknown PLMN");
            NgapPdu::Unsuccessful(UnsuccessfulOutcome::NgSetupFailure(NgSetupFailure {
                cause: Cause::Misc(MiscCause::UnknownPlmn),
            }))
        };
        self.send_pdu(link_id, pdu).await;
        self.publish(MockAmfEvent::NgSetupRequested { gnb_id, accepted })
            .await;
    }

    async fn on_initial_ue(&mut self, link_id: i32, m: InitialUeMessage) {
        if let Some(tmsi) = m.fiveg_s_tmsi {
            let known = self
                .ues
                .iter()
                .find(|(_, ue)| ue.tmsi == tmsi)
                .map(|(id, _)| *id);
            if let Some(amf_ue_ngap_id) = known {
                self.on_service_request(link_id, amf_ue_ngap_id, m).await;
                return;
            }
        }
        self.on_registration(link_id, m).await;
    }

    async fn on_registration(&mut self, link_id: i32, m: InitialUeMessage) {
        let request = match MmMessage::decode_plain(&m.nas_pdu) {
            Ok(MmMessage::RegistrationRequest(r)) => r,
            Ok(other) => {
                warn!(message = ?other.message_type(), "unexpected initial NAS message");
                return;
            }
            Err(e) => {
                warn!(%e, "initial NAS message rejected");
                return;
            }
        };
        let Some(subscriber) = self.subscribers.get_mut(&request.suci) else {
            warn!(suci = %request.suci, "unknown subscriber, registration ignored");
            return;
        };

        // Fresh challenge against the subscriber's next SQN; the mock
        // runs the same AKA computation to hold the resulting key chain.
        let rand: [u8; 16] = rand::random();
        let sqn = next_sqn(subscriber.sqn);
        let autn = build_autn(subscriber, &sqn, &rand);
        let mut creds = subscriber.clone();
        let mut ctx = NasSecurityContext::new();
        let res_star = match ctx.run_aka(&mut creds, 0, &[0, 0], &rand, &autn) {
            Ok(res_star) => res_star,
            Err(e) => {
                warn!(%e, suci = %request.suci, "challenge self-check failed");
                return;
            }
        };
        subscriber.sqn = creds.sqn;

        let amf_ue_ngap_id = self.next_amf_ue_id;
        self.next_amf_ue_id += 1;
        let tmsi = self.next_tmsi;
        self.next_tmsi += 1;
        info!(amf_name = %self.config.amf_name, supi = %request.suci, amf_ue_ngap_id,
            "registration started, challenging");
        self.ues.insert(
            amf_ue_ngap_id,
            AmfUeContext {
                ran_ue_ngap_id: m.ran_ue_ngap_id,
                link_id,
                supi: request.suci.clone(),
                ctx,
                expected_res_star: Some(res_star),
                capabilities: request.capabilities,
                registration_request: m.nas_pdu.clone(),
                tmsi,
                sessions: HashMap::new(),
                deregistering: false,
                pending_handover: None,
            },
        );

        let challenge = MmMessage::AuthenticationRequest(AuthenticationRequest {
            ngksi: 0,
            abba: vec![0, 0],
            rand,
            autn,
        });
        self.send_dl_nas(amf_ue_ngap_id, challenge.encode_plain())
            .await;
    }

    async fn on_service_request(
        &mut self,
        link_id: i32,
        amf_ue_ngap_id: i64,
        m: InitialUeMessage,
    ) {
        let (wire, ran_ue_ngap_id, supi) = {
            let Some(ue) = self.ues.get_mut(&amf_ue_ngap_id) else {
                return;
            };
            match decode(Some(&mut ue.ctx), &m.nas_pdu, Direction::Uplink) {
                Ok(NasMessage::Mm(MmMessage::ServiceRequest(_))) => {}
                Ok(_) => {
                    warn!(supi = %ue.supi, "expected a Service Request, dropped");
                    return;
                }
                Err(e) => {
                    warn!(supi = %ue.supi, %e, "service request rejected");
                    return;
                }
            }
            ue.link_id = link_id;
            ue.ran_ue_ngap_id = m.ran_ue_ngap_id;
            let wire = encode(
                Some(&mut ue.ctx),
                &NasMessage::Mm(MmMessage::ServiceAccept),
                SecurityHeaderType::IntegrityProtectedAndCiphered,
                Direction::Downlink,
            );
            (wire, ue.ran_ue_ngap_id, ue.supi.clone())
        };
        match wire {
            Ok(nas_pdu) => {
                info!(supi = %supi, "service request accepted");
                self.send_pdu(
                    link_id,
                    NgapPdu::Initiating(InitiatingMessage::InitialContextSetupRequest(
                        InitialContextSetupRequest {
                            amf_ue_ngap_id,
                            ran_ue_ngap_id,
                            ue_aggregate_max_bit_rate: Some(1_000_000_000),
                            nas_pdu: Some(nas_pdu),
                        },
                    )),
                )
                .await;
                self.publish(MockAmfEvent::ServiceRestored { supi }).await;
            }
            Err(e) => warn!(%e, "service accept encode failed"),
        }
    }

    async fn on_uplink_nas(&mut self, m: UplinkNasTransport) {
        let amf_ue_ngap_id = m.amf_ue_ngap_id;
        let decoded = {
            let Some(ue) = self.ues.get_mut(&amf_ue_ngap_id) else {
                warn!(amf_ue_ngap_id, "uplink NAS for unknown UE");
                return;
            };
            decode(Some(&mut ue.ctx), &m.nas_pdu, Direction::Uplink)
        };
        match decoded {
            Ok(NasMessage::Mm(mm)) => self.handle_mm(amf_ue_ngap_id, mm).await,
            Ok(NasMessage::Sm(_)) => warn!(amf_ue_ngap_id, "bare 5GSM message on N2, dropped"),
            Err(e) => warn!(amf_ue_ngap_id, %e, "uplink NAS rejected"),
        }
    }

    async fn handle_mm(&mut self, amf_ue_ngap_id: i64, msg: MmMessage) {
        match msg {
            MmMessage::AuthenticationResponse(r) => {
                self.on_authentication_response(amf_ue_ngap_id, r.res_star)
                    .await
            }
            MmMessage::AuthenticationFailure(f) => {
                warn!(amf_ue_ngap_id, cause = ?f.cause, "authentication failed at the UE");
            }
            MmMessage::SecurityModeComplete(c) => {
                self.on_security_mode_complete(amf_ue_ngap_id, c.nas_container)
                    .await
            }
            MmMessage::SecurityModeReject(r) => {
                warn!(amf_ue_ngap_id, cause = ?r.cause, "security mode rejected by the UE");
            }
            MmMessage::RegistrationComplete => {
                let Some(ue) = self.ues.get(&amf_ue_ngap_id) else {
                    return;
                };
                info!(supi = %ue.supi, amf_ue_ngap_id, "UE registered");
                let supi = ue.supi.clone();
                self.publish(MockAmfEvent::UeRegistered {
                    supi,
                    amf_ue_ngap_id,
                })
                .await;
            }
            MmMessage::DeregistrationRequest(_) => {
                self.on_deregistration(amf_ue_ngap_id).await
            }
            MmMessage::UlNasTransport(t) => self.on_ul_transport(amf_ue_ngap_id, t.payload).await,
            other => {
                warn!(amf_ue_ngap_id, message = ?other.message_type(),
                    "unexpected uplink 5GMM message at the mock AMF");
            }
        }
    }

    async fn on_authentication_response(&mut self, amf_ue_ngap_id: i64, res_star: [u8; 16]) {
        let wire = {
            let Some(ue) = self.ues.get_mut(&amf_ue_ngap_id) else {
                return;
            };
            match ue.expected_res_star.take() {
                Some(expected) if expected == res_star => {}
                Some(_) => {
                    warn!(supi = %ue.supi, "RES* mismatch, registration abandoned");
                    return;
                }
                None => {
                    warn!(supi = %ue.supi, "unsolicited Authentication Response");
                    return;
                }
            }
            ue.ctx.algorithms = select_algorithms(ue.capabilities);
            if let Err(e) = ue.ctx.derive_algorithm_keys() {
                warn!(supi = %ue.supi, %e, "NAS key derivation failed");
                return;
            }
            let smc = MmMessage::SecurityModeCommand(SecurityModeCommand {
                algorithms: ue.ctx.algorithms,
                ngksi: 0,
                replayed_capabilities: ue.capabilities,
            });
            encode(
                Some(&mut ue.ctx),
                &NasMessage::Mm(smc),
                SecurityHeaderType::IntegrityProtectedWithNewSecurityContext,
                Direction::Downlink,
            )
        };
        match wire {
            Ok(bytes) => self.send_dl_nas(amf_ue_ngap_id, bytes).await,
            Err(e) => warn!(%e, "Security Mode Command encode failed"),
        }
    }

    async fn on_security_mode_complete(&mut self, amf_ue_ngap_id: i64, nas_container: Vec<u8>) {
        let (wire, ran_ue_ngap_id, link_id) = {
            let allowed_slice = self.config.slices.first().copied();
            let Some(ue) = self.ues.get_mut(&amf_ue_ngap_id) else {
                return;
            };
            if nas_container != ue.registration_request {
                warn!(supi = %ue.supi, "NAS container does not replay the Registration Request");
            }
            let accept = MmMessage::RegistrationAccept(RegistrationAccept {
                tmsi: Some(ue.tmsi),
                allowed_slice,
            });
            let wire = encode(
                Some(&mut ue.ctx),
                &NasMessage::Mm(accept),
                SecurityHeaderType::IntegrityProtectedAndCiphered,
                Direction::Downlink,
            );
            (wire, ue.ran_ue_ngap_id, ue.link_id)
        };
        match wire {
            Ok(nas_pdu) => {
                self.send_pdu(
                    link_id,
                    NgapPdu::Initiating(InitiatingMessage::InitialContextSetupRequest(
                        InitialContextSetupRequest {
                            amf_ue_ngap_id,
                            ran_ue_ngap_id,
                            ue_aggregate_max_bit_rate: Some(1_000_000_000),
                            nas_pdu: Some(nas_pdu),
                        },
                    )),
                )
                .await;
            }
            Err(e) => warn!(%e, "Registration Accept encode failed"),
        }
    }

    async fn on_deregistration(&mut self, amf_ue_ngap_id: i64) {
        let (wire, ran_ue_ngap_id, link_id, supi) = {
            let Some(ue) = self.ues.get_mut(&amf_ue_ngap_id) else {
                return;
            };
            ue.deregistering = true;
            let wire = encode(
                Some(&mut ue.ctx),
                &NasMessage::Mm(MmMessage::DeregistrationAccept),
                SecurityHeaderType::IntegrityProtectedAndCiphered,
                Direction::Downlink,
            );
            (wire, ue.ran_ue_ngap_id, ue.link_id, ue.supi.clone())
        };
        match wire {
            Ok(bytes) => {
                info!(supi = %supi, "deregistration accepted, releasing context");
                self.send_dl_nas(amf_ue_ngap_id, bytes).await;
                self.send_pdu(
                    link_id,
                    NgapPdu::Initiating(InitiatingMessage::UeContextReleaseCommand(
                        UeContextReleaseCommand {
                            ue_ngap_ids: UeNgapIds::Pair {
                                amf_ue_ngap_id,
                                ran_ue_ngap_id,
                            },
                            cause: Cause::Nas(NasCause::Deregister),
                        },
                    )),
                )
                .await;
            }
            Err(e) => warn!(%e, "Deregistration Accept encode failed"),
        }
    }

    async fn on_ul_transport(&mut self, amf_ue_ngap_id: i64, payload: Vec<u8>) {
        match SmMessage::decode_plain(&payload) {
            Ok(SmMessage::PduSessionEstablishmentRequest(r)) => {
                self.on_establishment_request(amf_ue_ngap_id, r.pdu_session_id, r.pti)
                    .await
            }
            Ok(SmMessage::PduSessionReleaseComplete(c)) => {
                let Some(ue) = self.ues.get_mut(&amf_ue_ngap_id) else {
                    return;
                };
                ue.sessions.remove(&c.pdu_session_id);
                let supi = ue.supi.clone();
                self.publish(MockAmfEvent::SessionReleased {
                    supi,
                    pdu_session_id: c.pdu_session_id,
                })
                .await;
            }
            Ok(other) => {
                warn!(amf_ue_ngap_id, message = ?other.message_type(),
                    "unexpected 5GSM message at the mock AMF");
            }
            Err(e) => warn!(amf_ue_ngap_id, %e, "5GSM payload rejected"),
        }
    }

    async fn on_establishment_request(&mut self, amf_ue_ngap_id: i64, psi: u8, pti: u8) {
        if let Some(cause) = self.config.reject_sessions_with {
            let wire = {
                let Some(ue) = self.ues.get_mut(&amf_ue_ngap_id) else {
                    return;
                };
                debug!(supi = %ue.supi, pdu_session_id = psi, cause, "rejecting establishment");
                let reject = SmMessage::PduSessionEstablishmentReject(
                    PduSessionEstablishmentReject {
                        pdu_session_id: psi,
                        pti,
                        cause,
                    },
                );
                let transport = MmMessage::DlNasTransport(DlNasTransport {
                    pdu_session_id: Some(psi),
                    payload: reject.encode_plain(),
                });
                encode(
                    Some(&mut ue.ctx),
                    &NasMessage::Mm(transport),
                    SecurityHeaderType::IntegrityProtectedAndCiphered,
                    Direction::Downlink,
                )
            };
            match wire {
                Ok(bytes) => self.send_dl_nas(amf_ue_ngap_id, bytes).await,
                Err(e) => warn!(%e, "establishment reject encode failed"),
            }
            return;
        }

        let uplink_teid = self.next_teid;
        self.next_teid += 1;
        let ue_address = Ipv4Addr::new(10, 45, 0, self.next_ue_octet);
        self.next_ue_octet = self.next_ue_octet.wrapping_add(1);
        let snssai = self.config.slices.first().copied().unwrap_or(Snssai::new(1));

        let (wire, ran_ue_ngap_id, link_id) = {
            let Some(ue) = self.ues.get_mut(&amf_ue_ngap_id) else {
                return;
            };
            info!(supi = %ue.supi, pdu_session_id = psi, %ue_address, "setting up session");
            ue.sessions.insert(
                psi,
                AmfSession {
                    pti,
                    uplink_teid,
                    upf_address: UPF_ADDRESS,
                },
            );
            let accept = SmMessage::PduSessionEstablishmentAccept(PduSessionEstablishmentAccept {
                pdu_session_id: psi,
                pti,
                ue_address,
                qfi: 1,
            });
            let transport = MmMessage::DlNasTransport(DlNasTransport {
                pdu_session_id: Some(psi),
                payload: accept.encode_plain(),
            });
            let wire = encode(
                Some(&mut ue.ctx),
                &NasMessage::Mm(transport),
                SecurityHeaderType::IntegrityProtectedAndCiphered,
                Direction::Downlink,
            );
            (wire, ue.ran_ue_ngap_id, ue.link_id)
        };
        match wire {
            Ok(nas_pdu) => {
                self.send_pdu(
                    link_id,
                    NgapPdu::Initiating(InitiatingMessage::PduSessionResourceSetupRequest(
                        PduSessionResourceSetupRequest {
                            amf_ue_ngap_id,
                            ran_ue_ngap_id,
                            nas_pdu: None,
                            items: vec![SessionSetupItem {
                                pdu_session_id: psi,
                                snssai,
                                nas_pdu: Some(nas_pdu),
                                uplink_teid,
                                upf_address: UPF_ADDRESS,
                                qfi: 1,
                            }],
                        },
                    )),
                )
                .await;
            }
            Err(e) => warn!(%e, "establishment accept encode failed"),
        }
    }

    async fn release_session(&mut self, supi: &str, psi: u8) {
        let Some(amf_ue_ngap_id) = self
            .ues
            .iter()
            .find(|(_, ue)| ue.supi == supi)
            .map(|(id, _)| *id)
        else {
            warn!(supi, "release for unknown UE");
            return;
        };
        let (wire, ran_ue_ngap_id, link_id) = {
            let Some(ue) = self.ues.get_mut(&amf_ue_ngap_id) else {
                return;
            };
            let Some(session) = ue.sessions.get(&psi) else {
                warn!(supi = %ue.supi, pdu_session_id = psi, "release for unknown session");
                return;
            };
            let command = SmMessage::PduSessionReleaseCommand(PduSessionReleaseCommand {
                pdu_session_id: psi,
                pti: session.pti,
                // Regular deactivation.
                cause: 36,
            });
            let transport = MmMessage::DlNasTransport(DlNasTransport {
                pdu_session_id: Some(psi),
                payload: command.encode_plain(),
            });
            let wire = encode(
                Some(&mut ue.ctx),
                &NasMessage::Mm(transport),
                SecurityHeaderType::IntegrityProtectedAndCiphered,
                Direction::Downlink,
            );
            (wire, ue.ran_ue_ngap_id, ue.link_id)
        };
        match wire {
            Ok(nas_pdu) => {
                self.send_pdu(
                    link_id,
                    NgapPdu::Initiating(InitiatingMessage::PduSessionResourceReleaseCommand(
                        PduSessionResourceReleaseCommand {
                            amf_ue_ngap_id,
                            ran_ue_ngap_id,
                            nas_pdu: Some(nas_pdu),
                            pdu_session_ids: vec![psi],
                        },
                    )),
                )
                .await;
            }
            Err(e) => warn!(%e, "release command encode failed"),
        }
    }

    async fn on_release_request(&mut self, link_id: i32, m: UeContextReleaseRequest) {
        debug!(amf_ue_ngap_id = m.amf_ue_ngap_id, cause = %m.cause,
            "gNB requests context release");
        self.send_pdu(
            link_id,
            NgapPdu::Initiating(InitiatingMessage::UeContextReleaseCommand(
                UeContextReleaseCommand {
                    ue_ngap_ids: UeNgapIds::Pair {
                        amf_ue_ngap_id: m.amf_ue_ngap_id,
                        ran_ue_ngap_id: m.ran_ue_ngap_id,
                    },
                    cause: m.cause,
                },
            )),
        )
        .await;
    }

    async fn on_release_complete(&mut self, amf_ue_ngap_id: i64) {
        let Some(ue) = self.ues.get(&amf_ue_ngap_id) else {
            return;
        };
        let supi = ue.supi.clone();
        if ue.deregistering {
            self.ues.remove(&amf_ue_ngap_id);
            info!(supi = %supi, "UE deregistered, context gone");
            self.publish(MockAmfEvent::UeDeregistered { supi }).await;
        } else {
            info!(supi = %supi, "UE context released, UE idle");
            self.publish(MockAmfEvent::UeWentIdle { supi }).await;
        }
    }

    async fn on_path_switch(&mut self, link_id: i32, m: PathSwitchRequest) {
        let (sessions, supi) = {
            let Some(ue) = self.ues.get_mut(&m.source_amf_ue_ngap_id) else {
                warn!(amf_ue_ngap_id = m.source_amf_ue_ngap_id, "path switch for unknown UE");
                return;
            };
            ue.link_id = link_id;
            ue.ran_ue_ngap_id = m.ran_ue_ngap_id;
            let sessions: Vec<PathSwitchAckSessionItem> = m
                .sessions
                .iter()
                .filter_map(|item| {
                    ue.sessions
                        .get(&item.pdu_session_id)
                        .map(|s| PathSwitchAckSessionItem {
                            pdu_session_id: item.pdu_session_id,
                            uplink_teid: s.uplink_teid,
                            upf_address: s.upf_address,
                        })
                })
                .collect();
            (sessions, ue.supi.clone())
        };
        info!(supi = %supi, "downlink path switched to the new gNB");
        self.send_pdu(
            link_id,
            NgapPdu::Successful(SuccessfulOutcome::PathSwitchRequestAcknowledge(
                PathSwitchRequestAcknowledge {
                    amf_ue_ngap_id: m.source_amf_ue_ngap_id,
                    ran_ue_ngap_id: m.ran_ue_ngap_id,
                    sessions,
                },
            )),
        )
        .await;
        self.publish(MockAmfEvent::PathSwitched { supi }).await;
    }

    async fn on_handover_required(&mut self, link_id: i32, m: HandoverRequired) {
        let Some(target_link_id) = self
            .links
            .values()
            .find(|l| l.gnb_id == Some(m.target_gnb_id))
            .map(|l| l.id)
        else {
            warn!(target_gnb_id = m.target_gnb_id, "no association towards the target gNB");
            return;
        };
        {
            let Some(ue) = self.ues.get_mut(&m.amf_ue_ngap_id) else {
                warn!(amf_ue_ngap_id = m.amf_ue_ngap_id, "handover for unknown UE");
                return;
            };
            ue.pending_handover = Some(PendingHandover {
                source_link_id: link_id,
                source_ran_ue_ngap_id: m.ran_ue_ngap_id,
                target_link_id,
            });
            info!(supi = %ue.supi, target_gnb_id = m.target_gnb_id, "preparing handover");
        }
        self.send_pdu(
            target_link_id,
            NgapPdu::Initiating(InitiatingMessage::HandoverRequest(HandoverRequest {
                amf_ue_ngap_id: m.amf_ue_ngap_id,
                cause: m.cause,
                container: m.container,
            })),
        )
        .await;
    }

    async fn on_handover_ack(&mut self, m: HandoverRequestAcknowledge) {
        let (source_link_id, source_ran_ue_ngap_id) = {
            let Some(ue) = self.ues.get_mut(&m.amf_ue_ngap_id) else {
                return;
            };
            let Some(pending) = ue.pending_handover.take() else {
                warn!(supi = %ue.supi, "unsolicited Handover Request Acknowledge");
                return;
            };
            // Downlink traffic follows the target from here on.
            ue.link_id = pending.target_link_id;
            ue.ran_ue_ngap_id = m.ran_ue_ngap_id;
            (pending.source_link_id, pending.source_ran_ue_ngap_id)
        };
        self.send_pdu(
            source_link_id,
            NgapPdu::Successful(SuccessfulOutcome::HandoverCommand(HandoverCommand {
                amf_ue_ngap_id: m.amf_ue_ngap_id,
                ran_ue_ngap_id: source_ran_ue_ngap_id,
                container: m.container,
            })),
        )
        .await;
    }

    async fn on_handover_notify(&mut self, m: HandoverNotify) {
        let Some(ue) = self.ues.get_mut(&m.amf_ue_ngap_id) else {
            return;
        };
        ue.ran_ue_ngap_id = m.ran_ue_ngap_id;
        let supi = ue.supi.clone();
        info!(supi = %supi, "handover complete, UE at the target gNB");
        self.publish(MockAmfEvent::HandoverComplete { supi }).await;
    }
}

fn subscriber_credentials(config: &UeConfig) -> Result<UeCredentials, ransim_common::Error> {
    let k = config.key_bytes()?;
    let op = config.op_bytes()?;
    let opc = match config.op_type {
        ransim_common::OpType::Op => compute_opc(&k, &op),
        ransim_common::OpType::Opc => op,
    };
    Ok(UeCredentials {
        k,
        opc,
        amf_field: config.amf_field_bytes()?,
        sqn: config.sqn_bytes()?,
        supi: config.supi(),
        sn_name: config.plmn.serving_network_name(),
    })
}

fn next_sqn(sqn: [u8; 6]) -> [u8; 6] {
    let value = sqn.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b)) + 1;
    let bytes = value.to_be_bytes();
    [bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7]]
}

fn build_autn(creds: &UeCredentials, sqn: &[u8; 6], rand: &[u8; 16]) -> [u8; 16] {
    let milenage = Milenage::new(&creds.k, &creds.opc);
    let ak = milenage.f5(rand);
    let mac = milenage.f1(rand, sqn, &creds.amf_field);
    let mut autn = [0u8; 16];
    for i in 0..6 {
        autn[i] = sqn[i] ^ ak[i];
    }
    autn[6..8].copy_from_slice(&creds.amf_field);
    autn[8..16].copy_from_slice(&mac);
    autn
}

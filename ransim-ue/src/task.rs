//! The UE actor.
//!
//! One task per UE, select-looping over its control channel and, while
//! a radio connection exists, the downlink half of its gNB mailbox. All
//! NAS handling runs inside the actor; nothing is shared with the gNB
//! beyond the channel endpoints.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use ransim_common::{
    mailbox_pair, AdmissionRequest, DownlinkMessage, Error, OpType, Snssai, Task, TaskHandle,
    TaskMessage, UeConfig, UeMailbox, UplinkMessage, DEFAULT_CHANNEL_CAPACITY,
};
use ransim_crypto::compute_opc;
use ransim_nas::messages::mm::{
    DeregistrationRequest, RegistrationRequest, ServiceRequest, UlNasTransport,
};
use ransim_nas::messages::sm::PduSessionEstablishmentRequest;
use ransim_nas::{
    decode, encode, CipheringAlgorithm, Direction, IntegrityAlgorithm, MmMessage, NasMessage,
    NasSecurityContext, SecurityHeaderType, SmMessage, UeCredentials, UeSecurityCapability,
};

use crate::events::UeStateEvent;
use crate::state::{MmState, PduSession, SessionTable, SmState};

/// Control messages of the UE actor.
#[derive(Debug)]
pub enum UeMessage {
    /// Registers with the gNB behind this admission handle.
    Register {
        admission_tx: mpsc::Sender<AdmissionRequest>,
    },
    /// Requests establishment of a new PDU session.
    EstablishSession,
    /// Starts UE-originated deregistration.
    Deregister,
    /// Asks the network to release the signalling connection.
    GoIdle,
    /// Re-activates the connection from idle, answering a page or on
    /// its own initiative.
    ServiceRequest,
    /// Internal wake-up for a backed-off establishment retry.
    SessionRetry { pdu_session_id: u8 },
    /// Reports a snapshot of the UE's state.
    Status { reply: oneshot::Sender<UeStatus> },
}

/// Point-in-time snapshot of a UE, for scenario assertions.
#[derive(Debug, Clone)]
pub struct UeStatus {
    pub mm_state: MmState,
    pub tmsi: Option<u32>,
    pub allowed_slice: Option<Snssai>,
    pub sessions: Vec<PduSession>,
}

/// What the select loop produced in one turn.
enum Step {
    Control(Option<TaskMessage<UeMessage>>),
    Downlink(Option<DownlinkMessage>),
}

/// UE actor state.
pub struct UeTask {
    pub(crate) config: UeConfig,
    pub(crate) creds: UeCredentials,
    pub(crate) ctx: NasSecurityContext,
    pub(crate) pr_id: i64,
    pub(crate) mm_state: MmState,
    pub(crate) sessions: SessionTable,
    pub(crate) tmsi: Option<u32>,
    pub(crate) allowed_slice: Option<Snssai>,
    /// Plain encoding of the initial Registration Request, replayed as
    /// the NAS container of the Security Mode Complete.
    pub(crate) registration_container: Option<Vec<u8>>,
    mailbox: Option<UeMailbox>,
    admission_tx: Option<mpsc::Sender<AdmissionRequest>>,
    next_pti: u8,
    pub(crate) handle: TaskHandle<UeMessage>,
    events: mpsc::Sender<UeStateEvent>,
}

impl UeTask {
    /// Builds the actor from its configuration. Returns the task, its
    /// control receiver to pass to [`Task::run`], the control handle,
    /// and the state-event receiver.
    pub fn new(
        config: UeConfig,
        pr_id: i64,
    ) -> Result<
        (
            Self,
            mpsc::Receiver<TaskMessage<UeMessage>>,
            TaskHandle<UeMessage>,
            mpsc::Receiver<UeStateEvent>,
        ),
        Error,
    > {
        let k = config.key_bytes()?;
        let op = config.op_bytes()?;
        let opc = match config.op_type {
            OpType::Op => compute_opc(&k, &op),
            OpType::Opc => op,
        };
        let creds = UeCredentials {
            k,
            opc,
            amf_field: config.amf_field_bytes()?,
            sqn: config.sqn_bytes()?,
            supi: config.supi(),
            sn_name: config.plmn.serving_network_name(),
        };

        let (handle, rx) = TaskHandle::channel(DEFAULT_CHANNEL_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let task = Self {
            config,
            creds,
            ctx: NasSecurityContext::new(),
            pr_id,
            mm_state: MmState::Null,
            sessions: SessionTable::new(),
            tmsi: None,
            allowed_slice: None,
            registration_container: None,
            mailbox: None,
            admission_tx: None,
            next_pti: 1,
            handle: handle.clone(),
            events: events_tx,
        };
        Ok((task, rx, handle, events_rx))
    }

    /// Capability bitmap advertised in the Registration Request.
    pub(crate) fn capabilities(&self) -> UeSecurityCapability {
        let algs = self.config.algs;
        let mut cap = UeSecurityCapability::default();
        if algs.nea1 {
            cap.set_ea(CipheringAlgorithm::Nea1);
        }
        if algs.nea2 {
            cap.set_ea(CipheringAlgorithm::Nea2);
        }
        if algs.nea3 {
            cap.set_ea(CipheringAlgorithm::Nea3);
        }
        if algs.nia1 {
            cap.set_ia(IntegrityAlgorithm::Nia1);
        }
        if algs.nia2 {
            cap.set_ia(IntegrityAlgorithm::Nia2);
        }
        if algs.nia3 {
            cap.set_ia(IntegrityAlgorithm::Nia3);
        }
        cap
    }

    pub(crate) async fn publish(&self, event: UeStateEvent) {
        let _ = self.events.send(event).await;
    }

    pub(crate) async fn set_mm_state(&mut self, to: MmState) {
        if self.mm_state == to {
            return;
        }
        let from = std::mem::replace(&mut self.mm_state, to);
        info!(supi = %self.creds.supi, %from, %to, "5GMM state");
        self.publish(UeStateEvent::MmTransition { from, to }).await;
    }

    pub(crate) async fn set_sm_state(&mut self, pdu_session_id: u8, to: SmState) {
        let Some(session) = self.sessions.get_mut(pdu_session_id) else {
            return;
        };
        if session.state == to {
            return;
        }
        let from = std::mem::replace(&mut session.state, to);
        info!(supi = %self.creds.supi, pdu_session_id, %from, %to, "5GSM state");
        self.publish(UeStateEvent::SessionTransition {
            pdu_session_id,
            from,
            to,
        })
        .await;
    }

    async fn send_uplink(&self, msg: UplinkMessage) {
        match &self.mailbox {
            Some(mailbox) => {
                if mailbox.uplink_tx.send(msg).await.is_err() {
                    warn!(supi = %self.creds.supi, "uplink channel closed, message dropped");
                }
            }
            None => warn!(supi = %self.creds.supi, "no radio connection, uplink dropped"),
        }
    }

    /// Encodes and sends an uplink 5GMM message. Ciphered and integrity
    /// protected once NAS keys exist, plain before that.
    pub(crate) async fn send_mm(&mut self, msg: MmMessage) {
        self.send_mm_with(msg, SecurityHeaderType::IntegrityProtectedAndCiphered)
            .await;
    }

    pub(crate) async fn send_mm_with(&mut self, msg: MmMessage, sht: SecurityHeaderType) {
        match encode(
            Some(&mut self.ctx),
            &NasMessage::Mm(msg),
            sht,
            Direction::Uplink,
        ) {
            Ok(bytes) => self.send_uplink(UplinkMessage::Nas(bytes)).await,
            Err(e) => warn!(supi = %self.creds.supi, %e, "NAS encode failed"),
        }
    }

    /// Sends a 5GSM message nested in an UL NAS Transport.
    pub(crate) async fn send_sm(&mut self, msg: SmMessage) {
        let transport = MmMessage::UlNasTransport(UlNasTransport {
            pdu_session_id: msg.pdu_session_id(),
            payload: msg.encode_plain(),
        });
        self.send_mm(transport).await;
    }

    async fn register(&mut self, admission_tx: mpsc::Sender<AdmissionRequest>) {
        if !matches!(self.mm_state, MmState::Deregistered) {
            warn!(supi = %self.creds.supi, state = %self.mm_state, "registration refused in this state");
            return;
        }

        let (ue_mailbox, endpoint) = mailbox_pair(admission_tx.clone());
        let request = AdmissionRequest {
            endpoint,
            pr_id: self.pr_id,
            paging_tmsi: self.tmsi,
            is_handover: false,
            sessions: Vec::new(),
            amf_ue_ngap_id: None,
        };
        if admission_tx.send(request).await.is_err() {
            warn!(supi = %self.creds.supi, "gNB admission channel closed");
            return;
        }
        self.mailbox = Some(ue_mailbox);
        self.admission_tx = Some(admission_tx);

        let request = MmMessage::RegistrationRequest(RegistrationRequest {
            ngksi: self.ctx.ngksi,
            suci: self.creds.supi.clone(),
            capabilities: self.capabilities(),
            requested_slice: self.config.slice,
        });
        let bytes = request.encode_plain();
        self.registration_container = Some(bytes.clone());
        // Still DEREGISTERED: REGISTERED-INITIATED is entered only once
        // the network's authentication challenge checks out.
        self.send_uplink(UplinkMessage::InitialNas(bytes)).await;
    }

    async fn establish_session(&mut self) {
        if self.mm_state != MmState::Registered {
            warn!(supi = %self.creds.supi, state = %self.mm_state, "session establishment refused in this state");
            return;
        }
        let pti = self.next_pti;
        self.next_pti = self.next_pti.checked_add(1).unwrap_or(1);
        let pdu_session_id = match self.sessions.allocate(pti) {
            Ok(session) => session.pdu_session_id,
            Err(e) => {
                warn!(supi = %self.creds.supi, %e, "session establishment aborted");
                return;
            }
        };
        self.set_sm_state(pdu_session_id, SmState::ActivePending).await;
        self.send_sm(SmMessage::PduSessionEstablishmentRequest(
            PduSessionEstablishmentRequest {
                pdu_session_id,
                pti,
            },
        ))
        .await;
    }

    async fn session_retry(&mut self, pdu_session_id: u8) {
        let Some(session) = self.sessions.get(pdu_session_id) else {
            // Released or abandoned while the backoff timer ran.
            return;
        };
        if session.state != SmState::ActivePending {
            return;
        }
        let pti = session.pti;
        debug!(supi = %self.creds.supi, pdu_session_id, attempt = session.retries, "re-sending establishment request");
        self.send_sm(SmMessage::PduSessionEstablishmentRequest(
            PduSessionEstablishmentRequest {
                pdu_session_id,
                pti,
            },
        ))
        .await;
    }

    async fn deregister(&mut self) {
        if self.mm_state != MmState::Registered {
            warn!(supi = %self.creds.supi, state = %self.mm_state, "deregistration refused in this state");
            return;
        }
        let request = MmMessage::DeregistrationRequest(DeregistrationRequest {
            ngksi: self.ctx.ngksi,
            mobile_identity: self.creds.supi.clone(),
        });
        self.send_mm(request).await;
        self.set_mm_state(MmState::DeregisteredInitiated).await;
    }

    async fn go_idle(&mut self) {
        if self.mm_state != MmState::Registered {
            warn!(supi = %self.creds.supi, state = %self.mm_state, "idle request refused in this state");
            return;
        }
        self.send_uplink(UplinkMessage::Idle).await;
    }

    async fn service_request(&mut self) {
        if self.mm_state != MmState::Idle {
            warn!(supi = %self.creds.supi, state = %self.mm_state, "service request refused in this state");
            return;
        }
        let Some(tmsi) = self.tmsi else {
            warn!(supi = %self.creds.supi, "no 5G-TMSI, cannot request service");
            return;
        };
        let Some(admission_tx) = self.admission_tx.clone() else {
            warn!(supi = %self.creds.supi, "no gNB admission handle, cannot request service");
            return;
        };

        let (ue_mailbox, endpoint) = mailbox_pair(admission_tx.clone());
        let request = AdmissionRequest {
            endpoint,
            pr_id: self.pr_id,
            paging_tmsi: Some(tmsi),
            is_handover: false,
            sessions: Vec::new(),
            amf_ue_ngap_id: None,
        };
        if admission_tx.send(request).await.is_err() {
            warn!(supi = %self.creds.supi, "gNB admission channel closed");
            return;
        }
        self.mailbox = Some(ue_mailbox);

        let msg = NasMessage::Mm(MmMessage::ServiceRequest(ServiceRequest {
            ngksi: self.ctx.ngksi,
            tmsi,
        }));
        match encode(
            Some(&mut self.ctx),
            &msg,
            SecurityHeaderType::IntegrityProtected,
            Direction::Uplink,
        ) {
            Ok(bytes) => self.send_uplink(UplinkMessage::InitialNas(bytes)).await,
            Err(e) => {
                warn!(supi = %self.creds.supi, %e, "service request encode failed");
                return;
            }
        }
        self.set_mm_state(MmState::ServiceRequestInitiated).await;
    }

    fn status(&self) -> UeStatus {
        UeStatus {
            mm_state: self.mm_state,
            tmsi: self.tmsi,
            allowed_slice: self.allowed_slice,
            sessions: self.sessions.iter().cloned().collect(),
        }
    }

    async fn handle_control(&mut self, msg: UeMessage) {
        match msg {
            UeMessage::Register { admission_tx } => self.register(admission_tx).await,
            UeMessage::EstablishSession => self.establish_session().await,
            UeMessage::Deregister => self.deregister().await,
            UeMessage::GoIdle => self.go_idle().await,
            UeMessage::ServiceRequest => self.service_request().await,
            UeMessage::SessionRetry { pdu_session_id } => self.session_retry(pdu_session_id).await,
            UeMessage::Status { reply } => {
                let _ = reply.send(self.status());
            }
        }
    }

    async fn handle_downlink(&mut self, msg: DownlinkMessage) {
        match msg {
            DownlinkMessage::Nas(bytes) => {
                let decoded = decode(Some(&mut self.ctx), &bytes, Direction::Downlink);
                match decoded {
                    Ok(NasMessage::Mm(mm)) => self.handle_mm(mm).await,
                    Ok(NasMessage::Sm(_)) => {
                        warn!(supi = %self.creds.supi, "bare 5GSM message on the downlink, dropped")
                    }
                    Err(e) => {
                        warn!(supi = %self.creds.supi, %e, "downlink NAS rejected, dropped")
                    }
                }
            }
            DownlinkMessage::UserPlane { sessions, .. } => {
                for info in sessions {
                    match self.sessions.get_mut(info.pdu_session_id) {
                        Some(session) => session.user_plane = Some(info),
                        None => {
                            debug!(supi = %self.creds.supi, pdu_session_id = info.pdu_session_id,
                                "user-plane info for unknown session, dropped")
                        }
                    }
                }
            }
            DownlinkMessage::Handover(new_mailbox) => {
                info!(supi = %self.creds.supi, "handover: adopting new gNB mailbox");
                self.admission_tx = Some(new_mailbox.admission_tx.clone());
                self.mailbox = Some(new_mailbox);
            }
            DownlinkMessage::ConnectionReleased => {
                debug!(supi = %self.creds.supi, "signalling connection released");
                self.mailbox = None;
                match self.mm_state {
                    MmState::Deregistered | MmState::Null => {}
                    _ => self.set_mm_state(MmState::Idle).await,
                }
            }
        }
    }

    async fn on_downlink_closed(&mut self) {
        debug!(supi = %self.creds.supi, "downlink channel closed by the gNB");
        self.mailbox = None;
        match self.mm_state {
            MmState::Deregistered | MmState::Null | MmState::Idle => {}
            _ => self.set_mm_state(MmState::Idle).await,
        }
    }
}

#[async_trait::async_trait]
impl Task for UeTask {
    type Message = UeMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<UeMessage>>) {
        info!(supi = %self.creds.supi, pr_id = self.pr_id, "UE task started");
        self.set_mm_state(MmState::Deregistered).await;
        loop {
            // The select borrows the mailbox only until it yields, so
            // the handler below gets the whole actor back, including
            // the right to replace the mailbox.
            let step = match self.mailbox.as_mut() {
                Some(mailbox) => tokio::select! {
                    msg = rx.recv() => Step::Control(msg),
                    dl = mailbox.downlink_rx.recv() => Step::Downlink(dl),
                },
                None => Step::Control(rx.recv().await),
            };
            match step {
                Step::Control(Some(TaskMessage::Message(msg))) => self.handle_control(msg).await,
                Step::Control(Some(TaskMessage::Shutdown)) | Step::Control(None) => break,
                Step::Downlink(Some(msg)) => self.handle_downlink(msg).await,
                Step::Downlink(None) => self.on_downlink_closed().await,
            }
        }
        info!(supi = %self.creds.supi, "UE task stopped");
    }
}

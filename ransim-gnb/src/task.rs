//! The gNB actor.
//!
//! One task per gNB, select-looping over its control channel and its
//! admission channel. Every admitted UE gets a spawned pump that moves
//! uplink mailbox traffic onto the control channel, and every AMF
//! association gets a spawned reader doing the same for inbound NGAP,
//! so the actor itself owns all state without locks.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use ransim_common::{
    AdmissionRequest, DownlinkMessage, GnbConfig, Tai, Task, TaskHandle, TaskMessage,
    UplinkMessage, DEFAULT_CHANNEL_CAPACITY,
};
use ransim_ngap::procedures::context::UeContextReleaseRequest;
use ransim_ngap::procedures::nas_transport::{
    InitialUeMessage, RrcEstablishmentCause, UplinkNasTransport,
};
use ransim_ngap::procedures::ng_setup::{
    BroadcastPlmnItem, GlobalRanNodeId, NgSetupRequest, PagingDrx, SupportedTaItem,
};
use ransim_ngap::{Cause, InitiatingMessage, NgapPdu, RadioNetworkCause};

use crate::amf_pool::AmfPool;
use crate::registry::{GnbRegistry, UeLifecycle};

/// Control messages of the gNB actor.
#[derive(Debug)]
pub enum GnbMessage {
    /// A transport association towards an AMF came up. `link` carries
    /// gNB-to-AMF PDUs, `inbound` the reverse direction.
    AmfUp {
        address: SocketAddr,
        weight: u8,
        link: mpsc::Sender<NgapPdu>,
        inbound: mpsc::Receiver<NgapPdu>,
    },
    /// Inbound NGAP PDU from an association reader.
    Ngap { amf_id: i32, pdu: NgapPdu },
    /// Uplink mailbox traffic from an admitted UE.
    Uplink {
        ran_ue_ngap_id: i64,
        msg: UplinkMessage,
    },
    /// The UE's uplink channel closed; its context is gone.
    UplinkClosed { ran_ue_ngap_id: i64 },
    /// Registers the admission handle of a neighbour gNB (Xn link).
    AddPeer {
        gnb_id: u32,
        admission_tx: mpsc::Sender<AdmissionRequest>,
    },
    /// Starts an Xn handover of the UE with this PR id.
    XnHandover { pr_id: i64, target_gnb_id: u32 },
    /// Starts an N2 handover of the UE with this PR id.
    N2Handover { pr_id: i64, target_gnb_id: u32 },
    /// Queries the paged-identity cache.
    IsPaged {
        tmsi: u32,
        reply: oneshot::Sender<bool>,
    },
    /// Reports (RAN UE NGAP id, bound AMF association id) for a PR id.
    UeBinding {
        pr_id: i64,
        reply: oneshot::Sender<Option<(i64, i32)>>,
    },
}

/// gNB actor state.
pub struct GnbTask {
    pub(crate) config: GnbConfig,
    pub(crate) registry: GnbRegistry,
    pub(crate) pool: AmfPool,
    pub(crate) peers: HashMap<u32, mpsc::Sender<AdmissionRequest>>,
    admission_rx: mpsc::Receiver<AdmissionRequest>,
    pub(crate) handle: TaskHandle<GnbMessage>,
}

impl GnbTask {
    /// Builds the actor. Returns the task, its control receiver to pass
    /// to [`Task::run`], the control handle, and the admission sender
    /// UEs register through.
    pub fn new(
        config: GnbConfig,
    ) -> (
        Self,
        mpsc::Receiver<TaskMessage<GnbMessage>>,
        TaskHandle<GnbMessage>,
        mpsc::Sender<AdmissionRequest>,
    ) {
        let (handle, rx) = TaskHandle::channel(DEFAULT_CHANNEL_CAPACITY);
        let (admission_tx, admission_rx) = ransim_common::admission_channel();
        let task = Self {
            config,
            registry: GnbRegistry::new(),
            pool: AmfPool::new(),
            peers: HashMap::new(),
            admission_rx,
            handle: handle.clone(),
        };
        (task, rx, handle, admission_tx)
    }

    pub(crate) fn tai(&self) -> Tai {
        Tai {
            plmn: self.config.plmn,
            tac: self.config.tac,
        }
    }

    /// Sends a PDU towards the AMF association. A dead link is logged
    /// and dropped; only the affected association is lost.
    pub(crate) async fn send_to_amf(&self, amf_id: i32, pdu: NgapPdu) {
        match self.pool.get(amf_id) {
            Some(assoc) => {
                if assoc.link.send(pdu).await.is_err() {
                    warn!(amf_id, "AMF link closed, PDU dropped");
                }
            }
            None => warn!(amf_id, "no such AMF association, PDU dropped"),
        }
    }

    async fn handle_amf_up(
        &mut self,
        address: SocketAddr,
        weight: u8,
        link: mpsc::Sender<NgapPdu>,
        mut inbound: mpsc::Receiver<NgapPdu>,
    ) {
        let amf_id = self.pool.add(address, weight, link);

        // Association reader: one task per AMF link.
        let handle = self.handle.clone();
        tokio::spawn(async move {
            while let Some(pdu) = inbound.recv().await {
                if handle.send(GnbMessage::Ngap { amf_id, pdu }).await.is_err() {
                    break;
                }
            }
        });

        let request = NgSetupRequest {
            global_ran_node_id: GlobalRanNodeId {
                plmn: self.config.plmn,
                gnb_id: self.config.gnb_id,
                gnb_id_bit_length: 32,
            },
            ran_node_name: self.config.ran_node_name.clone(),
            supported_ta_list: vec![SupportedTaItem {
                tac: self.config.tac,
                broadcast_plmns: vec![BroadcastPlmnItem {
                    plmn: self.config.plmn,
                    slices: self.config.slices.clone(),
                }],
            }],
            default_paging_drx: PagingDrx::default(),
        };
        info!(amf_id, %address, "sending NG Setup Request");
        self.send_to_amf(
            amf_id,
            NgapPdu::Initiating(InitiatingMessage::NgSetupRequest(request)),
        )
        .await;
    }

    async fn handle_admission(&mut self, req: AdmissionRequest) {
        if req.is_handover {
            self.handle_handover_admission(req).await;
            return;
        }

        let amf_id = match self.pool.select() {
            Ok(assoc) => assoc.id,
            Err(e) => {
                warn!(pr_id = req.pr_id, %e, "admission rejected");
                req.endpoint.downlink_tx.close().await;
                return;
            }
        };
        let entry = self
            .registry
            .admit_ue(req.endpoint.downlink_tx, req.pr_id, req.paging_tmsi, amf_id);
        let ran_ue_ngap_id = entry.ran_ue_ngap_id;
        self.spawn_uplink_pump(ran_ue_ngap_id, req.endpoint.uplink_rx);
    }

    /// Forwards uplink mailbox traffic onto the control channel until
    /// the UE closes its side.
    pub(crate) fn spawn_uplink_pump(
        &self,
        ran_ue_ngap_id: i64,
        mut uplink_rx: mpsc::Receiver<UplinkMessage>,
    ) {
        let handle = self.handle.clone();
        tokio::spawn(async move {
            while let Some(msg) = uplink_rx.recv().await {
                if handle
                    .send(GnbMessage::Uplink { ran_ue_ngap_id, msg })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            let _ = handle
                .send(GnbMessage::UplinkClosed { ran_ue_ngap_id })
                .await;
        });
    }

    async fn handle_uplink(&mut self, ran_ue_ngap_id: i64, msg: UplinkMessage) {
        let entry = match self.registry.get(ran_ue_ngap_id) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(%e, "uplink from unknown UE dropped");
                return;
            }
        };
        let amf_id = entry.amf_id;
        match msg {
            UplinkMessage::InitialNas(nas_pdu) => {
                let pdu = NgapPdu::Initiating(InitiatingMessage::InitialUeMessage(
                    InitialUeMessage {
                        ran_ue_ngap_id,
                        nas_pdu,
                        user_location: self.tai(),
                        establishment_cause: if entry.paging_tmsi.is_some() {
                            RrcEstablishmentCause::MtAccess
                        } else {
                            RrcEstablishmentCause::MoSignalling
                        },
                        fiveg_s_tmsi: entry.paging_tmsi,
                    },
                ));
                self.send_to_amf(amf_id, pdu).await;
            }
            UplinkMessage::Nas(nas_pdu) => {
                let Some(amf_ue_ngap_id) = entry.amf_ue_ngap_id else {
                    warn!(ran_ue_ngap_id, "uplink NAS before AMF assigned an id, dropped");
                    return;
                };
                let pdu = NgapPdu::Initiating(InitiatingMessage::UplinkNasTransport(
                    UplinkNasTransport {
                        amf_ue_ngap_id,
                        ran_ue_ngap_id,
                        nas_pdu,
                        user_location: self.tai(),
                    },
                ));
                self.send_to_amf(amf_id, pdu).await;
            }
            UplinkMessage::Idle => {
                let Some(amf_ue_ngap_id) = entry.amf_ue_ngap_id else {
                    warn!(ran_ue_ngap_id, "idle request before context setup, dropped");
                    return;
                };
                if let Ok(entry) = self.registry.get_mut(ran_ue_ngap_id) {
                    entry.state = UeLifecycle::Releasing;
                }
                let pdu = NgapPdu::Initiating(InitiatingMessage::UeContextReleaseRequest(
                    UeContextReleaseRequest {
                        amf_ue_ngap_id,
                        ran_ue_ngap_id,
                        cause: Cause::RadioNetwork(RadioNetworkCause::UserInactivity),
                    },
                ));
                self.send_to_amf(amf_id, pdu).await;
            }
        }
    }

    async fn handle_uplink_closed(&mut self, ran_ue_ngap_id: i64) {
        // A UE that was handed over is already out of the registry.
        if let Ok(entry) = self.registry.remove(ran_ue_ngap_id) {
            debug!(ran_ue_ngap_id, pr_id = entry.pr_id, "UE uplink closed, context dropped");
            entry.downlink.close().await;
        }
    }

    async fn handle_message(&mut self, msg: GnbMessage) {
        match msg {
            GnbMessage::AmfUp {
                address,
                weight,
                link,
                inbound,
            } => self.handle_amf_up(address, weight, link, inbound).await,
            GnbMessage::Ngap { amf_id, pdu } => self.dispatch(amf_id, pdu).await,
            GnbMessage::Uplink { ran_ue_ngap_id, msg } => {
                self.handle_uplink(ran_ue_ngap_id, msg).await
            }
            GnbMessage::UplinkClosed { ran_ue_ngap_id } => {
                self.handle_uplink_closed(ran_ue_ngap_id).await
            }
            GnbMessage::AddPeer { gnb_id, admission_tx } => {
                self.peers.insert(gnb_id, admission_tx);
            }
            GnbMessage::XnHandover { pr_id, target_gnb_id } => {
                self.start_xn_handover(pr_id, target_gnb_id).await
            }
            GnbMessage::N2Handover { pr_id, target_gnb_id } => {
                self.start_n2_handover(pr_id, target_gnb_id).await
            }
            GnbMessage::IsPaged { tmsi, reply } => {
                let _ = reply.send(self.registry.paged.contains(tmsi).await);
            }
            GnbMessage::UeBinding { pr_id, reply } => {
                let binding = self
                    .registry
                    .find_by_pr_id(pr_id)
                    .map(|e| (e.ran_ue_ngap_id, e.amf_id));
                let _ = reply.send(binding);
            }
        }
    }

    /// Releases a UE locally: downlink notified and closed, entry gone.
    pub(crate) async fn release_ue(&mut self, ran_ue_ngap_id: i64) {
        if let Ok(entry) = self.registry.remove(ran_ue_ngap_id) {
            entry
                .downlink
                .send(DownlinkMessage::ConnectionReleased)
                .await;
            entry.downlink.close().await;
        }
    }
}

#[async_trait::async_trait]
impl Task for GnbTask {
    type Message = GnbMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<GnbMessage>>) {
        info!(gnb_id = self.config.gnb_id, "gNB task started");
        loop {
            tokio::select! {
                admission = self.admission_rx.recv() => match admission {
                    Some(req) => self.handle_admission(req).await,
                    None => break,
                },
                msg = rx.recv() => match msg {
                    Some(TaskMessage::Message(m)) => self.handle_message(m).await,
                    Some(TaskMessage::Shutdown) | None => break,
                },
            }
        }
        info!(gnb_id = self.config.gnb_id, "gNB task stopped");
    }
}

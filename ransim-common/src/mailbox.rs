//! UE ↔ gNB mailbox transport
//!
//! Each UE registers with a gNB by sending its channel endpoints plus
//! its stable cross-gNB PR id on the gNB's bounded admission channel
//! (capacity 1, a single admission in flight at a time). Downlink
//! delivery goes through a [`DownlinkSender`] whose closed state is
//! explicit: once the UE terminates, sends become silent no-ops instead
//! of blocking or panicking.

use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Capacity of a gNB's admission channel. A single admission is in
/// flight at any time.
pub const ADMISSION_CAPACITY: usize = 1;

/// Capacity of the per-UE uplink/downlink mailbox channels.
pub const MAILBOX_CAPACITY: usize = 16;

/// User-plane parameters handed off to the external GTP-U component
/// once a PDU session is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserPlaneInfo {
    /// PDU session id, 1..=16
    pub pdu_session_id: u8,
    /// Uplink tunnel endpoint at the UPF
    pub uplink_teid: u32,
    /// Downlink tunnel endpoint at the gNB
    pub downlink_teid: u32,
    /// UPF N3 address
    pub upf_address: IpAddr,
    /// Address assigned to the UE, once known
    pub ue_address: Option<IpAddr>,
}

/// Messages travelling UE → gNB.
#[derive(Debug)]
pub enum UplinkMessage {
    /// First NAS message of a connection (Registration or Service
    /// Request), triggering an Initial UE Message towards the AMF.
    InitialNas(Vec<u8>),
    /// Any subsequent uplink NAS PDU.
    Nas(Vec<u8>),
    /// The UE wants to move to idle; the gNB requests context release.
    Idle,
}

/// Messages travelling gNB → UE.
#[derive(Debug)]
pub enum DownlinkMessage {
    /// Downlink NAS PDU forwarded from the AMF.
    Nas(Vec<u8>),
    /// User-plane parameters for sessions that changed state.
    UserPlane {
        sessions: Vec<UserPlaneInfo>,
        gnb_n3_address: IpAddr,
    },
    /// Migrate to another gNB: the UE adopts the new mailbox and
    /// registers through the new admission handle.
    Handover(UeMailbox),
    /// The gNB released this UE's context.
    ConnectionReleased,
}

/// The UE-side endpoints of a mailbox, plus the admission handle of the
/// gNB the mailbox belongs to.
#[derive(Debug)]
pub struct UeMailbox {
    pub uplink_tx: mpsc::Sender<UplinkMessage>,
    pub downlink_rx: mpsc::Receiver<DownlinkMessage>,
    pub admission_tx: mpsc::Sender<AdmissionRequest>,
}

/// The gNB-side endpoints of a mailbox.
#[derive(Debug)]
pub struct GnbEndpoint {
    pub uplink_rx: mpsc::Receiver<UplinkMessage>,
    pub downlink_tx: DownlinkSender,
}

/// Creates a connected mailbox pair for one UE at one gNB.
pub fn mailbox_pair(admission_tx: mpsc::Sender<AdmissionRequest>) -> (UeMailbox, GnbEndpoint) {
    let (uplink_tx, uplink_rx) = mpsc::channel(MAILBOX_CAPACITY);
    let (downlink_tx, downlink_rx) = mpsc::channel(MAILBOX_CAPACITY);
    (
        UeMailbox {
            uplink_tx,
            downlink_rx,
            admission_tx,
        },
        GnbEndpoint {
            uplink_rx,
            downlink_tx: DownlinkSender::new(downlink_tx),
        },
    )
}

/// Admission request a UE (or a source gNB, during handover) places on
/// a gNB's admission channel.
#[derive(Debug)]
pub struct AdmissionRequest {
    /// gNB-side mailbox endpoints for the admitted UE.
    pub endpoint: GnbEndpoint,
    /// Stable cross-gNB identity of the UE.
    pub pr_id: i64,
    /// 5G-TMSI the UE answers paging with, if it has one.
    pub paging_tmsi: Option<u32>,
    /// True when this admission re-homes an existing UE (Xn or N2
    /// handover) instead of admitting a fresh one.
    pub is_handover: bool,
    /// PDU sessions to re-admit during handover.
    pub sessions: Vec<UserPlaneInfo>,
    /// AMF-side NGAP id of the UE, carried across an Xn handover so the
    /// target can issue a Path Switch Request.
    pub amf_ue_ngap_id: Option<i64>,
}

/// Creates a gNB admission channel.
pub fn admission_channel() -> (
    mpsc::Sender<AdmissionRequest>,
    mpsc::Receiver<AdmissionRequest>,
) {
    mpsc::channel(ADMISSION_CAPACITY)
}

/// Downlink sender whose closed state is explicit.
///
/// The sender handle itself sits behind a lock; closing takes it out,
/// and subsequent sends observe `None` and skip silently. Only the
/// handle needs mutual exclusion, never the protocol state around it.
#[derive(Debug, Clone)]
pub struct DownlinkSender {
    inner: Arc<Mutex<Option<mpsc::Sender<DownlinkMessage>>>>,
}

impl DownlinkSender {
    pub fn new(tx: mpsc::Sender<DownlinkMessage>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(tx))),
        }
    }

    /// Sends a downlink message to the UE. Returns true if the message
    /// was delivered, false if the channel is closed (a normal, silent
    /// outcome once the UE terminated).
    pub async fn send(&self, msg: DownlinkMessage) -> bool {
        let guard = self.inner.lock().await;
        match guard.as_ref() {
            Some(tx) => tx.send(msg).await.is_ok(),
            None => false,
        }
    }

    /// Closes the channel. Terminating a UE means closing its receive
    /// channel; every later send becomes a no-op.
    pub async fn close(&self) {
        let mut guard = self.inner.lock().await;
        guard.take();
    }

    /// Returns true if the sender has been closed.
    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.is_none()
    }
}

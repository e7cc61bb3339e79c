//! PDU Session Resource Setup and Release (TS 38.413 8.2).

use std::net::Ipv4Addr;

use ransim_common::Snssai;

use crate::cause::Cause;

/// One session to set up. The transfer IE carries the uplink tunnel
/// endpoint at the UPF; the per-session NAS PDU is the 5GSM accept for
/// the UE.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSetupItem {
    pub pdu_session_id: u8,
    pub snssai: Snssai,
    pub nas_pdu: Option<Vec<u8>>,
    pub uplink_teid: u32,
    pub upf_address: Ipv4Addr,
    /// QoS flow identifier of the default flow
    pub qfi: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PduSessionResourceSetupRequest {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    /// NAS PDU addressed to the UE as a whole, outside any session item
    pub nas_pdu: Option<Vec<u8>>,
    pub items: Vec<SessionSetupItem>,
}

/// Downlink tunnel endpoint allocated by the gNB for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSetupResponseItem {
    pub pdu_session_id: u8,
    pub downlink_teid: u32,
    pub gnb_address: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PduSessionResourceSetupResponse {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    pub successful: Vec<SessionSetupResponseItem>,
    pub failed: Vec<(u8, Cause)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PduSessionResourceReleaseCommand {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    /// Usually the 5GSM Release Command for the UE
    pub nas_pdu: Option<Vec<u8>>,
    pub pdu_session_ids: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceReleaseResponse {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    pub released: Vec<u8>,
}

//! NAS transport procedures (TS 38.413 8.6).

use ransim_common::Tai;

/// RRC establishment cause carried in the Initial UE Message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrcEstablishmentCause {
    MoSignalling,
    MoData,
    MtAccess,
}

/// Initial UE Message, the first uplink NAS PDU for a UE. Creates the
/// UE-associated logical connection on the AMF side.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialUeMessage {
    pub ran_ue_ngap_id: i64,
    pub nas_pdu: Vec<u8>,
    pub user_location: Tai,
    pub establishment_cause: RrcEstablishmentCause,
    /// 5G-S-TMSI when the UE answers paging or requests service
    pub fiveg_s_tmsi: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UplinkNasTransport {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    pub nas_pdu: Vec<u8>,
    pub user_location: Tai,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DownlinkNasTransport {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    pub nas_pdu: Vec<u8>,
}

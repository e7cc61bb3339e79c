//! Interface management procedures: Paging, AMF Configuration Update,
//! AMF Status Indication, Error Indication (TS 38.413 8.5, 8.7).

use std::net::SocketAddr;

use ransim_common::{Guami, Tai};

use crate::cause::Cause;

/// Paging for an idle UE, addressed by 5G-S-TMSI and broadcast over the
/// listed tracking areas.
#[derive(Debug, Clone, PartialEq)]
pub struct Paging {
    pub ue_paging_tmsi: u32,
    pub tai_list: Vec<Tai>,
}

/// One AMF TNL association endpoint with its weight factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmfTnlaItem {
    pub address: SocketAddr,
    /// TNLA weight factor, drives association selection
    pub weight: u8,
}

/// AMF Configuration Update. Add/remove/update lists are matched by
/// endpoint address on the gNB side.
#[derive(Debug, Clone, PartialEq)]
pub struct AmfConfigurationUpdate {
    pub amf_name: Option<String>,
    pub to_add: Vec<AmfTnlaItem>,
    pub to_remove: Vec<SocketAddr>,
    pub to_update: Vec<AmfTnlaItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmfConfigurationUpdateAcknowledge {
    pub successful: Vec<SocketAddr>,
    pub failed: Vec<(SocketAddr, Cause)>,
}

/// One GUAMI going unavailable, with the backup AMF taking over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnavailableGuamiItem {
    pub guami: Guami,
    pub backup_amf_name: Option<String>,
}

/// AMF Status Indication announcing unavailable GUAMIs. Triggers
/// failover rebinding on the gNB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmfStatusIndication {
    pub unavailable_guami_list: Vec<UnavailableGuamiItem>,
}

/// Error Indication; every IE is optional.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorIndication {
    pub amf_ue_ngap_id: Option<i64>,
    pub ran_ue_ngap_id: Option<i64>,
    pub cause: Option<Cause>,
}

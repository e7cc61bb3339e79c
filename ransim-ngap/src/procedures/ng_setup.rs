//! NG Setup procedure (TS 38.413 8.7.1).
//!
//! Exchanges the application-level data the gNB and the AMF need to
//! interoperate on the NG-C interface. The gNB sends its served tracking
//! areas and broadcast PLMNs; the AMF answers with its served GUAMIs and
//! relative capacity, or a failure carrying a cause.

use ransim_common::{Guami, Plmn, Snssai};

use crate::cause::Cause;

/// Paging DRX cycle length in radio frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagingDrx {
    V32,
    V64,
    #[default]
    V128,
    V256,
}

/// Global RAN node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalRanNodeId {
    pub plmn: Plmn,
    /// gNB ID value, 22 to 32 significant bits
    pub gnb_id: u32,
    pub gnb_id_bit_length: u8,
}

/// One broadcast PLMN with the slices it supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPlmnItem {
    pub plmn: Plmn,
    pub slices: Vec<Snssai>,
}

/// One served tracking area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedTaItem {
    /// Tracking Area Code, 24 bits
    pub tac: u32,
    pub broadcast_plmns: Vec<BroadcastPlmnItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgSetupRequest {
    pub global_ran_node_id: GlobalRanNodeId,
    pub ran_node_name: Option<String>,
    pub supported_ta_list: Vec<SupportedTaItem>,
    pub default_paging_drx: PagingDrx,
}

/// One GUAMI served by the AMF, with its backup AMF for failover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedGuamiItem {
    pub guami: Guami,
    pub backup_amf_name: Option<String>,
}

/// One PLMN the AMF supports with its slices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlmnSupportItem {
    pub plmn: Plmn,
    pub slices: Vec<Snssai>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgSetupResponse {
    pub amf_name: String,
    pub served_guami_list: Vec<ServedGuamiItem>,
    /// Relative AMF capacity, 0..=255, used as the TNLA weight factor
    pub relative_amf_capacity: u8,
    pub plmn_support_list: Vec<PlmnSupportItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NgSetupFailure {
    pub cause: Cause,
}

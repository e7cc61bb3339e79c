//! Initial Context Setup and UE Context Release (TS 38.413 8.3).

use crate::cause::Cause;

/// Initial Context Setup Request. The security key and UE capability
/// IEs of the full procedure are external collaborators; the simulator
/// carries the identifiers and the piggybacked NAS PDU.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialContextSetupRequest {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    /// Aggregate maximum bit rate in bits per second, downlink
    pub ue_aggregate_max_bit_rate: Option<u64>,
    /// Usually the Registration Accept
    pub nas_pdu: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContextSetupResponse {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
}

/// UE NGAP identifier pair. The AMF may only know its own identifier
/// when releasing a context it failed to set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UeNgapIds {
    Pair { amf_ue_ngap_id: i64, ran_ue_ngap_id: i64 },
    AmfOnly(i64),
}

impl UeNgapIds {
    pub fn amf_ue_ngap_id(&self) -> i64 {
        match *self {
            UeNgapIds::Pair { amf_ue_ngap_id, .. } => amf_ue_ngap_id,
            UeNgapIds::AmfOnly(id) => id,
        }
    }

    pub fn ran_ue_ngap_id(&self) -> Option<i64> {
        match *self {
            UeNgapIds::Pair { ran_ue_ngap_id, .. } => Some(ran_ue_ngap_id),
            UeNgapIds::AmfOnly(_) => None,
        }
    }
}

/// gNB-initiated request to release a UE context, typically on user
/// inactivity. The AMF answers with a UE Context Release Command.
#[derive(Debug, Clone, PartialEq)]
pub struct UeContextReleaseRequest {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UeContextReleaseCommand {
    pub ue_ngap_ids: UeNgapIds,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextReleaseComplete {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
}

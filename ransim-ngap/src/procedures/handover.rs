//! Handover procedures (TS 38.413 8.4) and Path Switch (TS 38.413 8.4.4).
//!
//! The N2 flow is Handover Required (source to AMF), Handover Request
//! (AMF to target), Handover Request Acknowledge, Handover Command (AMF
//! back to source), then Handover Notify from the target. The
//! source-to-target transparent container travels opaquely through the
//! AMF, so it is modelled as bytes with its own small codec; a container
//! that does not parse aborts the handover at the receiving node.

use std::net::Ipv4Addr;

use ransim_common::Tai;

use crate::cause::Cause;
use crate::pdu::NgapError;

/// One PDU session carried across a handover: the uplink tunnel the
/// target must keep pointing at the UPF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandoverSessionItem {
    pub pdu_session_id: u8,
    pub uplink_teid: u32,
    pub upf_address: Ipv4Addr,
}

/// Source-to-target transparent container. Carries the stable PR id so
/// the target can correlate the admission it receives over the radio
/// side with the N2 signalling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceToTargetContainer {
    pub pr_id: i64,
    pub sessions: Vec<HandoverSessionItem>,
}

impl SourceToTargetContainer {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(9 + self.sessions.len() * 9);
        out.extend_from_slice(&self.pr_id.to_be_bytes());
        out.push(self.sessions.len() as u8);
        for s in &self.sessions {
            out.push(s.pdu_session_id);
            out.extend_from_slice(&s.uplink_teid.to_be_bytes());
            out.extend_from_slice(&s.upf_address.octets());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, NgapError> {
        if bytes.len() < 9 {
            return Err(NgapError::MalformedContainer(format!(
                "{} bytes, need at least 9",
                bytes.len()
            )));
        }
        let mut pr_id_bytes = [0u8; 8];
        pr_id_bytes.copy_from_slice(&bytes[0..8]);
        let pr_id = i64::from_be_bytes(pr_id_bytes);
        let count = bytes[8] as usize;
        if bytes.len() != 9 + count * 9 {
            return Err(NgapError::MalformedContainer(format!(
                "{} sessions announced, {} bytes of body",
                count,
                bytes.len() - 9
            )));
        }
        let mut sessions = Vec::with_capacity(count);
        for chunk in bytes[9..].chunks_exact(9) {
            let mut teid = [0u8; 4];
            teid.copy_from_slice(&chunk[1..5]);
            let mut addr = [0u8; 4];
            addr.copy_from_slice(&chunk[5..9]);
            sessions.push(HandoverSessionItem {
                pdu_session_id: chunk[0],
                uplink_teid: u32::from_be_bytes(teid),
                upf_address: Ipv4Addr::from(addr),
            });
        }
        Ok(Self { pr_id, sessions })
    }
}

/// Handover Required, source gNB to AMF.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoverRequired {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    /// Global gNB ID of the requested target
    pub target_gnb_id: u32,
    pub cause: Cause,
    pub container: Vec<u8>,
}

/// Handover Request, AMF to target gNB.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoverRequest {
    pub amf_ue_ngap_id: i64,
    pub cause: Cause,
    pub container: Vec<u8>,
}

/// Handover Request Acknowledge, target gNB to AMF. The RAN UE NGAP id
/// is the one the target allocated for the shadow context.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoverRequestAcknowledge {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    /// Target-to-source transparent container
    pub container: Vec<u8>,
}

/// Handover Command, AMF to source gNB.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoverCommand {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    pub container: Vec<u8>,
}

/// Handover Notify, target gNB to AMF once the UE has arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoverNotify {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    pub user_location: Tai,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HandoverPreparationFailure {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    pub cause: Cause,
}

/// Downlink tunnel endpoint the new gNB announces for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSwitchSessionItem {
    pub pdu_session_id: u8,
    pub downlink_teid: u32,
    pub gnb_address: Ipv4Addr,
}

/// Path Switch Request, new gNB to AMF after an Xn handover.
#[derive(Debug, Clone, PartialEq)]
pub struct PathSwitchRequest {
    pub ran_ue_ngap_id: i64,
    /// AMF UE NGAP id the source gNB was using
    pub source_amf_ue_ngap_id: i64,
    pub user_location: Tai,
    pub sessions: Vec<PathSwitchSessionItem>,
}

/// Uplink tunnel endpoint confirmed or re-homed by the AMF for one
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathSwitchAckSessionItem {
    pub pdu_session_id: u8,
    pub uplink_teid: u32,
    pub upf_address: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathSwitchRequestAcknowledge {
    pub amf_ue_ngap_id: i64,
    pub ran_ue_ngap_id: i64,
    pub sessions: Vec<PathSwitchAckSessionItem>,
}

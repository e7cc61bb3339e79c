//! The decoded NGAP PDU model.
//!
//! An NGAP PDU is a tagged union over the three message kinds crossed
//! with a procedure code (TS 38.413 9.2). Bit-level APER encoding is an
//! external collaborator; this crate carries the decoded objects that
//! the gNB dispatcher and the test harness exchange.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::procedures::context::{
    InitialContextSetupRequest, InitialContextSetupResponse, UeContextReleaseCommand,
    UeContextReleaseComplete, UeContextReleaseRequest,
};
use crate::procedures::handover::{
    HandoverCommand, HandoverNotify, HandoverPreparationFailure, HandoverRequest,
    HandoverRequestAcknowledge, HandoverRequired, PathSwitchRequest, PathSwitchRequestAcknowledge,
};
use crate::procedures::management::{
    AmfConfigurationUpdate, AmfConfigurationUpdateAcknowledge, AmfStatusIndication,
    ErrorIndication, Paging,
};
use crate::procedures::nas_transport::{
    DownlinkNasTransport, InitialUeMessage, UplinkNasTransport,
};
use crate::procedures::ng_setup::{NgSetupFailure, NgSetupRequest, NgSetupResponse};
use crate::procedures::session::{
    PduSessionResourceReleaseCommand, PduSessionResourceReleaseResponse,
    PduSessionResourceSetupRequest, PduSessionResourceSetupResponse,
};

/// SCTP payload protocol identifier assigned to NGAP.
pub const NGAP_PPID: u32 = 60;

/// SCTP stream for non-UE-associated signalling.
pub const NON_UE_STREAM: u16 = 0;

/// SCTP stream for UE-associated signalling.
pub const UE_STREAM: u16 = 1;

/// NGAP procedure codes (TS 38.413 9.4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ProcedureCode {
    AmfConfigurationUpdate = 0,
    AmfStatusIndication = 1,
    DownlinkNasTransport = 4,
    ErrorIndication = 9,
    HandoverNotification = 11,
    HandoverPreparation = 12,
    HandoverResourceAllocation = 13,
    InitialContextSetup = 14,
    InitialUeMessage = 15,
    NgSetup = 21,
    Paging = 24,
    PathSwitchRequest = 25,
    PduSessionResourceRelease = 28,
    PduSessionResourceSetup = 29,
    UeContextRelease = 41,
    UeContextReleaseRequest = 42,
    UplinkNasTransport = 46,
}

/// NGAP message kind, the outer choice of the PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduKind {
    InitiatingMessage,
    SuccessfulOutcome,
    UnsuccessfulOutcome,
}

/// Errors raised while handling a decoded NGAP message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NgapError {
    #[error("missing mandatory IE: {0}")]
    MissingMandatoryIe(&'static str),

    #[error("invalid IE value: {0}")]
    InvalidIeValue(String),

    #[error("malformed transparent container: {0}")]
    MalformedContainer(String),

    #[error("unknown procedure code: {0}")]
    UnknownProcedureCode(u8),
}

/// An NGAP initiating message.
#[derive(Debug, Clone, PartialEq)]
pub enum InitiatingMessage {
    NgSetupRequest(NgSetupRequest),
    InitialUeMessage(InitialUeMessage),
    UplinkNasTransport(UplinkNasTransport),
    DownlinkNasTransport(DownlinkNasTransport),
    InitialContextSetupRequest(InitialContextSetupRequest),
    PduSessionResourceSetupRequest(PduSessionResourceSetupRequest),
    PduSessionResourceReleaseCommand(PduSessionResourceReleaseCommand),
    UeContextReleaseCommand(UeContextReleaseCommand),
    UeContextReleaseRequest(UeContextReleaseRequest),
    Paging(Paging),
    AmfConfigurationUpdate(AmfConfigurationUpdate),
    AmfStatusIndication(AmfStatusIndication),
    ErrorIndication(ErrorIndication),
    HandoverRequired(HandoverRequired),
    HandoverRequest(HandoverRequest),
    HandoverNotify(HandoverNotify),
    PathSwitchRequest(PathSwitchRequest),
}

impl InitiatingMessage {
    pub fn procedure_code(&self) -> ProcedureCode {
        match self {
            InitiatingMessage::NgSetupRequest(_) => ProcedureCode::NgSetup,
            InitiatingMessage::InitialUeMessage(_) => ProcedureCode::InitialUeMessage,
            InitiatingMessage::UplinkNasTransport(_) => ProcedureCode::UplinkNasTransport,
            InitiatingMessage::DownlinkNasTransport(_) => ProcedureCode::DownlinkNasTransport,
            InitiatingMessage::InitialContextSetupRequest(_) => ProcedureCode::InitialContextSetup,
            InitiatingMessage::PduSessionResourceSetupRequest(_) => {
                ProcedureCode::PduSessionResourceSetup
            }
            InitiatingMessage::PduSessionResourceReleaseCommand(_) => {
                ProcedureCode::PduSessionResourceRelease
            }
            InitiatingMessage::UeContextReleaseCommand(_) => ProcedureCode::UeContextRelease,
            InitiatingMessage::UeContextReleaseRequest(_) => {
                ProcedureCode::UeContextReleaseRequest
            }
            InitiatingMessage::Paging(_) => ProcedureCode::Paging,
            InitiatingMessage::AmfConfigurationUpdate(_) => ProcedureCode::AmfConfigurationUpdate,
            InitiatingMessage::AmfStatusIndication(_) => ProcedureCode::AmfStatusIndication,
            InitiatingMessage::ErrorIndication(_) => ProcedureCode::ErrorIndication,
            InitiatingMessage::HandoverRequired(_) => ProcedureCode::HandoverPreparation,
            InitiatingMessage::HandoverRequest(_) => ProcedureCode::HandoverResourceAllocation,
            InitiatingMessage::HandoverNotify(_) => ProcedureCode::HandoverNotification,
            InitiatingMessage::PathSwitchRequest(_) => ProcedureCode::PathSwitchRequest,
        }
    }
}

/// An NGAP successful outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum SuccessfulOutcome {
    NgSetupResponse(NgSetupResponse),
    InitialContextSetupResponse(InitialContextSetupResponse),
    PduSessionResourceSetupResponse(PduSessionResourceSetupResponse),
    PduSessionResourceReleaseResponse(PduSessionResourceReleaseResponse),
    UeContextReleaseComplete(UeContextReleaseComplete),
    AmfConfigurationUpdateAcknowledge(AmfConfigurationUpdateAcknowledge),
    HandoverRequestAcknowledge(HandoverRequestAcknowledge),
    HandoverCommand(HandoverCommand),
    PathSwitchRequestAcknowledge(PathSwitchRequestAcknowledge),
}

impl SuccessfulOutcome {
    pub fn procedure_code(&self) -> ProcedureCode {
        match self {
            SuccessfulOutcome::NgSetupResponse(_) => ProcedureCode::NgSetup,
            SuccessfulOutcome::InitialContextSetupResponse(_) => ProcedureCode::InitialContextSetup,
            SuccessfulOutcome::PduSessionResourceSetupResponse(_) => {
                ProcedureCode::PduSessionResourceSetup
            }
            SuccessfulOutcome::PduSessionResourceReleaseResponse(_) => {
                ProcedureCode::PduSessionResourceRelease
            }
            SuccessfulOutcome::UeContextReleaseComplete(_) => ProcedureCode::UeContextRelease,
            SuccessfulOutcome::AmfConfigurationUpdateAcknowledge(_) => {
                ProcedureCode::AmfConfigurationUpdate
            }
            SuccessfulOutcome::HandoverRequestAcknowledge(_) => {
                ProcedureCode::HandoverResourceAllocation
            }
            SuccessfulOutcome::HandoverCommand(_) => ProcedureCode::HandoverPreparation,
            SuccessfulOutcome::PathSwitchRequestAcknowledge(_) => ProcedureCode::PathSwitchRequest,
        }
    }
}

/// An NGAP unsuccessful outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum UnsuccessfulOutcome {
    NgSetupFailure(NgSetupFailure),
    HandoverPreparationFailure(HandoverPreparationFailure),
}

impl UnsuccessfulOutcome {
    pub fn procedure_code(&self) -> ProcedureCode {
        match self {
            UnsuccessfulOutcome::NgSetupFailure(_) => ProcedureCode::NgSetup,
            UnsuccessfulOutcome::HandoverPreparationFailure(_) => ProcedureCode::HandoverPreparation,
        }
    }
}

/// A decoded NGAP PDU.
#[derive(Debug, Clone, PartialEq)]
pub enum NgapPdu {
    Initiating(InitiatingMessage),
    Successful(SuccessfulOutcome),
    Unsuccessful(UnsuccessfulOutcome),
}

impl NgapPdu {
    pub fn kind(&self) -> PduKind {
        match self {
            NgapPdu::Initiating(_) => PduKind::InitiatingMessage,
            NgapPdu::Successful(_) => PduKind::SuccessfulOutcome,
            NgapPdu::Unsuccessful(_) => PduKind::UnsuccessfulOutcome,
        }
    }

    pub fn procedure_code(&self) -> ProcedureCode {
        match self {
            NgapPdu::Initiating(m) => m.procedure_code(),
            NgapPdu::Successful(m) => m.procedure_code(),
            NgapPdu::Unsuccessful(m) => m.procedure_code(),
        }
    }

    /// SCTP stream the PDU belongs on. UE-associated procedures ride
    /// stream 1, everything else stream 0.
    pub fn stream(&self) -> u16 {
        match self.procedure_code() {
            ProcedureCode::NgSetup
            | ProcedureCode::AmfConfigurationUpdate
            | ProcedureCode::AmfStatusIndication
            | ProcedureCode::ErrorIndication
            | ProcedureCode::Paging => NON_UE_STREAM,
            _ => UE_STREAM,
        }
    }
}

//! Decoded NGAP object model for the RAN simulator.
//!
//! Typed per-procedure messages under a tagged-union PDU, plus the
//! stream and payload-protocol constants of the NG-C interface. ASN.1
//! APER encoding is an external collaborator.

pub mod cause;
pub mod pdu;
pub mod procedures;

pub use cause::{Cause, MiscCause, NasCause, ProtocolCause, RadioNetworkCause, TransportCause};
pub use pdu::{
    InitiatingMessage, NgapError, NgapPdu, PduKind, ProcedureCode, SuccessfulOutcome,
    UnsuccessfulOutcome, NGAP_PPID, NON_UE_STREAM, UE_STREAM,
};

//! Observable UE state changes.
//!
//! Every 5GMM and 5GSM transition is published on the UE's event
//! channel, so scenario code can follow a UE without reaching into the
//! actor's state.

use std::net::Ipv4Addr;

use crate::state::{MmState, SmState};

/// One observable state change of a UE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UeStateEvent {
    /// The 5GMM machine moved between states.
    MmTransition { from: MmState, to: MmState },
    /// A PDU session moved between states.
    SessionTransition {
        pdu_session_id: u8,
        from: SmState,
        to: SmState,
    },
    /// A PDU session became usable, with the assigned address.
    SessionEstablished {
        pdu_session_id: u8,
        ue_address: Ipv4Addr,
        qfi: u8,
    },
    /// Establishment was rejected past the retry cap; the session is
    /// gone for good.
    SessionAbandoned { pdu_session_id: u8, cause: u8 },
}

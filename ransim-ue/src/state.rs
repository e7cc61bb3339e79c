//! UE state: the 5GMM machine states and the per-session 5GSM slots
//! (3GPP TS 24.501 sections 5.1.3 and 6.1.3).

use std::fmt;
use std::net::Ipv4Addr;

use ransim_common::{Error, UserPlaneInfo};

/// Highest PDU session identity; slots are indexed by id - 1.
pub const MAX_PDU_SESSIONS: usize = 16;

/// Establishment attempts before a session is abandoned for good.
pub const MAX_SESSION_RETRIES: u8 = 5;

/// Main 5GMM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MmState {
    /// 5GMM-NULL
    #[default]
    Null,
    /// 5GMM-DEREGISTERED
    Deregistered,
    /// 5GMM-REGISTERED-INITIATED
    RegisteredInitiated,
    /// 5GMM-REGISTERED
    Registered,
    /// 5GMM-SERVICE-REQUEST-INITIATED
    ServiceRequestInitiated,
    /// 5GMM-DEREGISTERED-INITIATED
    DeregisteredInitiated,
    /// Registered with no signalling connection (CM-IDLE)
    Idle,
}

impl fmt::Display for MmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MmState::Null => write!(f, "5GMM-NULL"),
            MmState::Deregistered => write!(f, "5GMM-DEREGISTERED"),
            MmState::RegisteredInitiated => write!(f, "5GMM-REGISTERED-INITIATED"),
            MmState::Registered => write!(f, "5GMM-REGISTERED"),
            MmState::ServiceRequestInitiated => write!(f, "5GMM-SERVICE-REQUEST-INITIATED"),
            MmState::DeregisteredInitiated => write!(f, "5GMM-DEREGISTERED-INITIATED"),
            MmState::Idle => write!(f, "5GMM-IDLE"),
        }
    }
}

/// Per-session 5GSM state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmState {
    /// PDU SESSION INACTIVE
    #[default]
    Inactive,
    /// PDU SESSION ACTIVE PENDING
    ActivePending,
    /// PDU SESSION ACTIVE
    Active,
}

impl fmt::Display for SmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmState::Inactive => write!(f, "PDU-SESSION-INACTIVE"),
            SmState::ActivePending => write!(f, "PDU-SESSION-ACTIVE-PENDING"),
            SmState::Active => write!(f, "PDU-SESSION-ACTIVE"),
        }
    }
}

/// One PDU session slot on the UE.
#[derive(Debug, Clone)]
pub struct PduSession {
    /// PDU session identity, 1..=16
    pub pdu_session_id: u8,
    /// Procedure transaction identity of the establishment run
    pub pti: u8,
    pub state: SmState,
    /// Establishment attempts answered with a reject so far
    pub retries: u8,
    /// Address assigned by the network once the session is active
    pub ue_address: Option<Ipv4Addr>,
    /// QoS flow identifier of the default flow
    pub qfi: Option<u8>,
    /// Tunnel parameters reported by the gNB for the user plane
    pub user_plane: Option<UserPlaneInfo>,
}

/// The sixteen PDU session slots of one UE.
#[derive(Debug, Default)]
pub struct SessionTable {
    slots: [Option<PduSession>; MAX_PDU_SESSIONS],
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the lowest free session identity.
    pub fn allocate(&mut self, pti: u8) -> Result<&mut PduSession, Error> {
        let index = self
            .slots
            .iter()
            .position(|s| s.is_none())
            .ok_or_else(|| Error::ResourceExhaustion("no free PDU session slot".into()))?;
        Ok(self.slots[index].insert(PduSession {
            pdu_session_id: index as u8 + 1,
            pti,
            state: SmState::Inactive,
            retries: 0,
            ue_address: None,
            qfi: None,
            user_plane: None,
        }))
    }

    pub fn get(&self, pdu_session_id: u8) -> Option<&PduSession> {
        match pdu_session_id {
            1..=16 => self.slots[pdu_session_id as usize - 1].as_ref(),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, pdu_session_id: u8) -> Option<&mut PduSession> {
        match pdu_session_id {
            1..=16 => self.slots[pdu_session_id as usize - 1].as_mut(),
            _ => None,
        }
    }

    /// Frees the slot, returning the session that occupied it.
    pub fn release(&mut self, pdu_session_id: u8) -> Option<PduSession> {
        match pdu_session_id {
            1..=16 => self.slots[pdu_session_id as usize - 1].take(),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PduSession> {
        self.slots.iter().filter_map(|s| s.as_ref())
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }
}

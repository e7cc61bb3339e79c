//! UE side of the RAN simulator.
//!
//! The UE actor drives the 5GMM and 5GSM state machines over a NAS
//! security context, talking to its serving gNB through the mailbox
//! fabric and reporting every state change on an event channel.

pub mod events;
mod mm;
mod sm;
pub mod state;
pub mod task;

pub use events::UeStateEvent;
pub use state::{MmState, PduSession, SessionTable, SmState, MAX_PDU_SESSIONS, MAX_SESSION_RETRIES};
pub use task::{UeMessage, UeStatus, UeTask};

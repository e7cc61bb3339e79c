//! gNB side of the RAN simulator.
//!
//! The gNB actor owns a UE registry and an AMF association pool,
//! dispatches inbound NGAP procedures, and coordinates Xn and N2
//! handovers over the mailbox fabric.

pub mod amf_pool;
mod dispatcher;
mod handover;
pub mod registry;
pub mod task;

pub use amf_pool::{AmfAssociation, AmfAssociationState, AmfPool};
pub use registry::{GnbPduSession, GnbRegistry, GnbUeEntry, PagedCache, UeLifecycle, PAGING_EXPIRY};
pub use task::{GnbMessage, GnbTask};

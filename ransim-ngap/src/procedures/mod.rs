//! Typed per-procedure NGAP messages.

pub mod context;
pub mod handover;
pub mod management;
pub mod nas_transport;
pub mod ng_setup;
pub mod session;

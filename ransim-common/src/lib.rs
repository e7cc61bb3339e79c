//! Common types and utilities for ransim
//!
//! Shared error taxonomy, configuration structures, core 5G types, and
//! the actor/mailbox fabric used across the ransim crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod mailbox;
pub mod tasks;
pub mod types;

pub use config::{AmfEndpoint, GnbConfig, OpType, SupportedAlgs, UeConfig};
pub use error::Error;
pub use logging::{format_hex_compact, init_logging, init_logging_with_filter, LogLevel};
pub use mailbox::{
    admission_channel, mailbox_pair, AdmissionRequest, DownlinkMessage, DownlinkSender,
    GnbEndpoint, UeMailbox, UplinkMessage, UserPlaneInfo, ADMISSION_CAPACITY,
};
pub use tasks::{Task, TaskHandle, TaskMessage, DEFAULT_CHANNEL_CAPACITY};
pub use types::{Guami, Plmn, Snssai, Tai};

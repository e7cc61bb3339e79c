//! Error types for ransim

use thiserror::Error;

/// Error types shared across the ransim workspace.
///
/// The taxonomy mirrors how failures are recovered: decode and lookup
/// errors are dropped at the procedure-handler boundary, security and
/// retryable errors become outbound protocol messages, resource and
/// transport errors are returned to the immediate caller.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or incomplete NGAP/NAS message. The offending message
    /// is dropped; the actor continues.
    #[error("Protocol decode error: {0}")]
    ProtocolDecode(String),

    /// MAC or SQN-freshness failure. Surfaced to the peer as a NAS
    /// Authentication Failure; UE state is unchanged.
    #[error("Security error: {0}")]
    Security(String),

    /// Lookup miss for a UE or AMF id.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// No free PDU-session slot, or no Active AMF association.
    #[error("Resource exhaustion: {0}")]
    ResourceExhaustion(String),

    /// PDU Session Establishment Reject; retried with backoff up to a
    /// cap, then permanently abandoned.
    #[error("Retryable session error: {0}")]
    RetryableSession(String),

    /// Association dial/accept failure. Terminates only the affected
    /// actor, never the whole process.
    #[error("Fatal transport error: {0}")]
    FatalTransport(String),

    /// Network I/O errors.
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// State machine errors.
    #[error("State machine error: {0}")]
    StateMachine(String),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for a [`Error::UnknownEntity`] over a numeric id.
    pub fn unknown_ue(ran_ue_id: i64) -> Self {
        Error::UnknownEntity(format!("no UE with RAN-UE-NGAP-ID {ran_ue_id}"))
    }
}

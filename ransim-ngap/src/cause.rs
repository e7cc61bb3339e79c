//! NGAP Cause (TS 38.413 9.3.1.2), the subset the simulator emits.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioNetworkCause {
    Unspecified,
    SuccessfulHandover,
    HandoverCancelled,
    HandoverDesirableForRadioReason,
    ReleaseDueToNgranGeneratedReason,
    UserInactivity,
    UnknownLocalUeNgapId,
    UnknownPduSessionId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCause {
    TransportResourceUnavailable,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NasCause {
    NormalRelease,
    AuthenticationFailure,
    Deregister,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolCause {
    TransferSyntaxError,
    SemanticError,
    MessageNotCompatibleWithReceiverState,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiscCause {
    ControlProcessingOverload,
    UnknownPlmn,
    Unspecified,
}

/// Grouped NGAP cause value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cause {
    RadioNetwork(RadioNetworkCause),
    Transport(TransportCause),
    Nas(NasCause),
    Protocol(ProtocolCause),
    Misc(MiscCause),
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::RadioNetwork(c) => write!(f, "radio network: {c:?}"),
            Cause::Transport(c) => write!(f, "transport: {c:?}"),
            Cause::Nas(c) => write!(f, "NAS: {c:?}"),
            Cause::Protocol(c) => write!(f, "protocol: {c:?}"),
            Cause::Misc(MiscCause::UnknownPlmn) => write!(f, "Unknown PLMN"),
            Cause::Misc(c) => write!(f, "misc: {c:?}"),
        }
    }
}

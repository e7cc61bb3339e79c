//! NAS protocol enumerations (3GPP TS 24.501).

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Extended Protocol Discriminator (TS 24.501 9.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ExtendedProtocolDiscriminator {
    /// 5GS Mobility Management messages
    MobilityManagement = 0x7E,
    /// 5GS Session Management messages
    SessionManagement = 0x2E,
}

/// Security Header Type (TS 24.501 9.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum SecurityHeaderType {
    /// Plain NAS message, not security protected
    #[default]
    NotProtected = 0x00,
    /// Integrity protected
    IntegrityProtected = 0x01,
    /// Integrity protected and ciphered
    IntegrityProtectedAndCiphered = 0x02,
    /// Integrity protected with new 5G NAS security context
    IntegrityProtectedWithNewSecurityContext = 0x03,
    /// Integrity protected and ciphered with new 5G NAS security context
    IntegrityProtectedAndCipheredWithNewSecurityContext = 0x04,
}

impl SecurityHeaderType {
    /// Returns true if the message is security protected.
    pub fn is_protected(&self) -> bool {
        !matches!(self, SecurityHeaderType::NotProtected)
    }

    /// Returns true if the payload is ciphered.
    pub fn is_ciphered(&self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtectedAndCiphered
                | SecurityHeaderType::IntegrityProtectedAndCipheredWithNewSecurityContext
        )
    }

    /// Returns true if this header signals a new security context.
    pub fn is_new_security_context(&self) -> bool {
        matches!(
            self,
            SecurityHeaderType::IntegrityProtectedWithNewSecurityContext
                | SecurityHeaderType::IntegrityProtectedAndCipheredWithNewSecurityContext
        )
    }
}

/// 5GMM message type (TS 24.501 9.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MmMessageType {
    RegistrationRequest = 0x41,
    RegistrationAccept = 0x42,
    RegistrationComplete = 0x43,

    DeregistrationRequestUeOriginating = 0x45,
    DeregistrationAcceptUeOriginating = 0x46,

    ServiceRequest = 0x4C,
    ServiceAccept = 0x4E,

    ConfigurationUpdateCommand = 0x54,
    ConfigurationUpdateComplete = 0x55,

    AuthenticationRequest = 0x56,
    AuthenticationResponse = 0x57,
    AuthenticationFailure = 0x59,

    IdentityRequest = 0x5B,
    IdentityResponse = 0x5C,

    SecurityModeCommand = 0x5D,
    SecurityModeComplete = 0x5E,
    SecurityModeReject = 0x5F,

    UlNasTransport = 0x67,
    DlNasTransport = 0x68,
}

/// 5GSM message type (TS 24.501 9.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SmMessageType {
    PduSessionEstablishmentRequest = 0xC1,
    PduSessionEstablishmentAccept = 0xC2,
    PduSessionEstablishmentReject = 0xC3,

    PduSessionReleaseCommand = 0xD3,
    PduSessionReleaseComplete = 0xD4,
}

/// 5GMM cause (TS 24.501 9.11.3.2), the subset the simulator emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MmCause {
    /// MAC failure during AUTN verification
    MacFailure = 20,
    /// SQN out of range, AUTS attached
    SynchFailure = 21,
    /// Selected algorithms not in the UE capability set
    UeSecurityCapabilitiesMismatch = 23,
    /// Catch-all protocol error
    UnspecifiedProtocolError = 111,
}

//! NAS protocol layer for the 5G RAN simulator.
//!
//! Plain 5GMM/5GSM message model, the UE security context with its
//! 5G-AKA run and key chain, and the secured NAS codec shared by the UE
//! and the network-side test fixtures.

pub mod algorithms;
pub mod codec;
pub mod count;
pub mod enums;
pub mod messages;
pub mod security;

pub use algorithms::{
    select_algorithms, CipheringAlgorithm, IntegrityAlgorithm, NasSecurityAlgorithms,
    UeSecurityCapability,
};
pub use codec::{decode, encode, NasError, SECURED_HEADER_LEN};
pub use count::NasCount;
pub use enums::{
    ExtendedProtocolDiscriminator, MmCause, MmMessageType, SecurityHeaderType, SmMessageType,
};
pub use messages::{CodecError, MmMessage, NasMessage, SmMessage};
pub use security::{
    Direction, NasSecurityContext, SecurityError, UeCredentials, NAS_BEARER, NGKSI_NO_KEY,
};

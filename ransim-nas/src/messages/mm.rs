//! 5GMM messages.

use ransim_common::Snssai;

use crate::algorithms::{NasSecurityAlgorithms, UeSecurityCapability};
use crate::enums::{ExtendedProtocolDiscriminator, MmCause, MmMessageType};

use super::{
    put_bytes, put_opt_snssai, put_opt_u32, put_string, read_opt_snssai, read_opt_u32, CodecError,
    Reader,
};

/// Registration Request, the first message of a registration run. The
/// capability bitmap is replayed back by the Security Mode Command.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationRequest {
    pub ngksi: u8,
    pub suci: String,
    pub capabilities: UeSecurityCapability,
    pub requested_slice: Option<Snssai>,
}

/// Authentication Request carrying the 5G-AKA challenge.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationRequest {
    pub ngksi: u8,
    pub abba: Vec<u8>,
    pub rand: [u8; 16],
    pub autn: [u8; 16],
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationResponse {
    pub res_star: [u8; 16],
}

/// Authentication Failure; carries AUTS only for the synch-failure cause.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticationFailure {
    pub cause: MmCause,
    pub auts: Option<[u8; 14]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityModeCommand {
    pub algorithms: NasSecurityAlgorithms,
    pub ngksi: u8,
    pub replayed_capabilities: UeSecurityCapability,
}

/// Security Mode Complete re-embedding the initial Registration Request
/// as the NAS container.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityModeComplete {
    pub nas_container: Vec<u8>,
}

/// Security Mode Reject, sent when the commanded algorithms or replayed
/// capabilities do not match what the UE advertised.
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityModeReject {
    pub cause: MmCause,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistrationAccept {
    pub tmsi: Option<u32>,
    pub allowed_slice: Option<Snssai>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeregistrationRequest {
    pub ngksi: u8,
    pub mobile_identity: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRequest {
    pub ngksi: u8,
    pub tmsi: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityRequest {
    /// Requested identity type; 1 = SUCI
    pub identity_type: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdentityResponse {
    pub mobile_identity: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationUpdateCommand {
    pub tmsi: Option<u32>,
}

/// Downlink NAS Transport carrying a nested 5GSM payload.
#[derive(Debug, Clone, PartialEq)]
pub struct DlNasTransport {
    pub pdu_session_id: Option<u8>,
    pub payload: Vec<u8>,
}

/// Uplink NAS Transport carrying a nested 5GSM payload.
#[derive(Debug, Clone, PartialEq)]
pub struct UlNasTransport {
    pub pdu_session_id: u8,
    pub payload: Vec<u8>,
}

/// A decoded plain 5GMM message.
#[derive(Debug, Clone, PartialEq)]
pub enum MmMessage {
    RegistrationRequest(RegistrationRequest),
    RegistrationAccept(RegistrationAccept),
    RegistrationComplete,
    DeregistrationRequest(DeregistrationRequest),
    DeregistrationAccept,
    ServiceRequest(ServiceRequest),
    ServiceAccept,
    ConfigurationUpdateCommand(ConfigurationUpdateCommand),
    ConfigurationUpdateComplete,
    AuthenticationRequest(AuthenticationRequest),
    AuthenticationResponse(AuthenticationResponse),
    AuthenticationFailure(AuthenticationFailure),
    IdentityRequest(IdentityRequest),
    IdentityResponse(IdentityResponse),
    SecurityModeCommand(SecurityModeCommand),
    SecurityModeComplete(SecurityModeComplete),
    SecurityModeReject(SecurityModeReject),
    UlNasTransport(UlNasTransport),
    DlNasTransport(DlNasTransport),
}

impl MmMessage {
    pub fn message_type(&self) -> MmMessageType {
        match self {
            MmMessage::RegistrationRequest(_) => MmMessageType::RegistrationRequest,
            MmMessage::RegistrationAccept(_) => MmMessageType::RegistrationAccept,
            MmMessage::RegistrationComplete => MmMessageType::RegistrationComplete,
            MmMessage::DeregistrationRequest(_) => {
                MmMessageType::DeregistrationRequestUeOriginating
            }
            MmMessage::DeregistrationAccept => MmMessageType::DeregistrationAcceptUeOriginating,
            MmMessage::ServiceRequest(_) => MmMessageType::ServiceRequest,
            MmMessage::ServiceAccept => MmMessageType::ServiceAccept,
            MmMessage::ConfigurationUpdateCommand(_) => MmMessageType::ConfigurationUpdateCommand,
            MmMessage::ConfigurationUpdateComplete => MmMessageType::ConfigurationUpdateComplete,
            MmMessage::AuthenticationRequest(_) => MmMessageType::AuthenticationRequest,
            MmMessage::AuthenticationResponse(_) => MmMessageType::AuthenticationResponse,
            MmMessage::AuthenticationFailure(_) => MmMessageType::AuthenticationFailure,
            MmMessage::IdentityRequest(_) => MmMessageType::IdentityRequest,
            MmMessage::IdentityResponse(_) => MmMessageType::IdentityResponse,
            MmMessage::SecurityModeCommand(_) => MmMessageType::SecurityModeCommand,
            MmMessage::SecurityModeComplete(_) => MmMessageType::SecurityModeComplete,
            MmMessage::SecurityModeReject(_) => MmMessageType::SecurityModeReject,
            MmMessage::UlNasTransport(_) => MmMessageType::UlNasTransport,
            MmMessage::DlNasTransport(_) => MmMessageType::DlNasTransport,
        }
    }

    /// Encode with the 3-byte plain 5GMM header.
    pub fn encode_plain(&self) -> Vec<u8> {
        let mut out = vec![
            u8::from(ExtendedProtocolDiscriminator::MobilityManagement),
            0x00,
            u8::from(self.message_type()),
        ];
        self.encode_body(&mut out);
        out
    }

    fn encode_body(&self, out: &mut Vec<u8>) {
        match self {
            MmMessage::RegistrationRequest(m) => {
                out.push(m.ngksi);
                put_string(out, &m.suci);
                out.push(m.capabilities.ea);
                out.push(m.capabilities.ia);
                put_opt_snssai(out, &m.requested_slice);
            }
            MmMessage::RegistrationAccept(m) => {
                put_opt_u32(out, m.tmsi);
                put_opt_snssai(out, &m.allowed_slice);
            }
            MmMessage::RegistrationComplete
            | MmMessage::DeregistrationAccept
            | MmMessage::ServiceAccept
            | MmMessage::ConfigurationUpdateComplete => {}
            MmMessage::DeregistrationRequest(m) => {
                out.push(m.ngksi);
                put_string(out, &m.mobile_identity);
            }
            MmMessage::ServiceRequest(m) => {
                out.push(m.ngksi);
                out.extend_from_slice(&m.tmsi.to_be_bytes());
            }
            MmMessage::ConfigurationUpdateCommand(m) => {
                put_opt_u32(out, m.tmsi);
            }
            MmMessage::AuthenticationRequest(m) => {
                out.push(m.ngksi);
                put_bytes(out, &m.abba);
                out.extend_from_slice(&m.rand);
                out.extend_from_slice(&m.autn);
            }
            MmMessage::AuthenticationResponse(m) => {
                out.extend_from_slice(&m.res_star);
            }
            MmMessage::AuthenticationFailure(m) => {
                out.push(u8::from(m.cause));
                match &m.auts {
                    Some(auts) => {
                        out.push(1);
                        out.extend_from_slice(auts);
                    }
                    None => out.push(0),
                }
            }
            MmMessage::IdentityRequest(m) => {
                out.push(m.identity_type);
            }
            MmMessage::IdentityResponse(m) => {
                put_string(out, &m.mobile_identity);
            }
            MmMessage::SecurityModeCommand(m) => {
                out.push(m.algorithms.encode());
                out.push(m.ngksi);
                out.push(m.replayed_capabilities.ea);
                out.push(m.replayed_capabilities.ia);
            }
            MmMessage::SecurityModeComplete(m) => {
                put_bytes(out, &m.nas_container);
            }
            MmMessage::SecurityModeReject(m) => {
                out.push(u8::from(m.cause));
            }
            MmMessage::UlNasTransport(m) => {
                out.push(m.pdu_session_id);
                put_bytes(out, &m.payload);
            }
            MmMessage::DlNasTransport(m) => {
                match m.pdu_session_id {
                    Some(id) => {
                        out.push(1);
                        out.push(id);
                    }
                    None => out.push(0),
                }
                put_bytes(out, &m.payload);
            }
        }
    }

    /// Decode a plain 5GMM message including its 3-byte header.
    pub fn decode_plain(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(bytes);
        let epd = r.u8()?;
        if epd != u8::from(ExtendedProtocolDiscriminator::MobilityManagement) {
            return Err(CodecError::InvalidEpd(epd));
        }
        let sht = r.u8()? & 0x0F;
        if sht != 0 {
            return Err(CodecError::InvalidValue(format!(
                "expected plain message, security header type 0x{sht:02X}"
            )));
        }
        let mt_byte = r.u8()?;
        let message_type =
            MmMessageType::try_from(mt_byte).map_err(|_| CodecError::InvalidMessageType(mt_byte))?;
        Self::decode_body(message_type, &mut r)
    }

    fn decode_body(message_type: MmMessageType, r: &mut Reader<'_>) -> Result<Self, CodecError> {
        Ok(match message_type {
            MmMessageType::RegistrationRequest => {
                MmMessage::RegistrationRequest(RegistrationRequest {
                    ngksi: r.u8()?,
                    suci: r.string()?,
                    capabilities: UeSecurityCapability {
                        ea: r.u8()?,
                        ia: r.u8()?,
                    },
                    requested_slice: read_opt_snssai(r)?,
                })
            }
            MmMessageType::RegistrationAccept => MmMessage::RegistrationAccept(RegistrationAccept {
                tmsi: read_opt_u32(r)?,
                allowed_slice: read_opt_snssai(r)?,
            }),
            MmMessageType::RegistrationComplete => MmMessage::RegistrationComplete,
            MmMessageType::DeregistrationRequestUeOriginating => {
                MmMessage::DeregistrationRequest(DeregistrationRequest {
                    ngksi: r.u8()?,
                    mobile_identity: r.string()?,
                })
            }
            MmMessageType::DeregistrationAcceptUeOriginating => MmMessage::DeregistrationAccept,
            MmMessageType::ServiceRequest => MmMessage::ServiceRequest(ServiceRequest {
                ngksi: r.u8()?,
                tmsi: r.u32()?,
            }),
            MmMessageType::ServiceAccept => MmMessage::ServiceAccept,
            MmMessageType::ConfigurationUpdateCommand => {
                MmMessage::ConfigurationUpdateCommand(ConfigurationUpdateCommand {
                    tmsi: read_opt_u32(r)?,
                })
            }
            MmMessageType::ConfigurationUpdateComplete => MmMessage::ConfigurationUpdateComplete,
            MmMessageType::AuthenticationRequest => {
                MmMessage::AuthenticationRequest(AuthenticationRequest {
                    ngksi: r.u8()?,
                    abba: r.bytes()?,
                    rand: r.fixed()?,
                    autn: r.fixed()?,
                })
            }
            MmMessageType::AuthenticationResponse => {
                MmMessage::AuthenticationResponse(AuthenticationResponse {
                    res_star: r.fixed()?,
                })
            }
            MmMessageType::AuthenticationFailure => {
                let cause_byte = r.u8()?;
                let cause = MmCause::try_from(cause_byte)
                    .map_err(|_| CodecError::InvalidValue(format!("bad 5GMM cause {cause_byte}")))?;
                let auts = match r.u8()? {
                    0 => None,
                    _ => Some(r.fixed()?),
                };
                MmMessage::AuthenticationFailure(AuthenticationFailure { cause, auts })
            }
            MmMessageType::IdentityRequest => MmMessage::IdentityRequest(IdentityRequest {
                identity_type: r.u8()?,
            }),
            MmMessageType::IdentityResponse => MmMessage::IdentityResponse(IdentityResponse {
                mobile_identity: r.string()?,
            }),
            MmMessageType::SecurityModeCommand => {
                let algorithms = NasSecurityAlgorithms::decode(r.u8()?)
                    .map_err(|e| CodecError::InvalidValue(e.to_string()))?;
                MmMessage::SecurityModeCommand(SecurityModeCommand {
                    algorithms,
                    ngksi: r.u8()?,
                    replayed_capabilities: UeSecurityCapability {
                        ea: r.u8()?,
                        ia: r.u8()?,
                    },
                })
            }
            MmMessageType::SecurityModeComplete => {
                MmMessage::SecurityModeComplete(SecurityModeComplete {
                    nas_container: r.bytes()?,
                })
            }
            MmMessageType::SecurityModeReject => {
                let cause_byte = r.u8()?;
                let cause = MmCause::try_from(cause_byte)
                    .map_err(|_| CodecError::InvalidValue(format!("bad 5GMM cause {cause_byte}")))?;
                MmMessage::SecurityModeReject(SecurityModeReject { cause })
            }
            MmMessageType::UlNasTransport => MmMessage::UlNasTransport(UlNasTransport {
                pdu_session_id: r.u8()?,
                payload: r.bytes()?,
            }),
            MmMessageType::DlNasTransport => {
                let pdu_session_id = match r.u8()? {
                    0 => None,
                    _ => Some(r.u8()?),
                };
                MmMessage::DlNasTransport(DlNasTransport {
                    pdu_session_id,
                    payload: r.bytes()?,
                })
            }
        })
    }
}

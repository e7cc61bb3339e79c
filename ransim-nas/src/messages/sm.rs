//! 5GSM messages.
//!
//! Every 5GSM message carries the PDU session identity and procedure
//! transaction identity octets after the EPD, so the header here is four
//! bytes instead of the 5GMM three.

use std::net::Ipv4Addr;

use crate::enums::{ExtendedProtocolDiscriminator, SmMessageType};

use super::{CodecError, Reader};

#[derive(Debug, Clone, PartialEq)]
pub struct PduSessionEstablishmentRequest {
    pub pdu_session_id: u8,
    pub pti: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PduSessionEstablishmentAccept {
    pub pdu_session_id: u8,
    pub pti: u8,
    /// UE address assigned for the session
    pub ue_address: Ipv4Addr,
    /// QoS flow identifier of the default flow
    pub qfi: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PduSessionEstablishmentReject {
    pub pdu_session_id: u8,
    pub pti: u8,
    /// 5GSM cause (TS 24.501 9.11.4.2)
    pub cause: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PduSessionReleaseCommand {
    pub pdu_session_id: u8,
    pub pti: u8,
    pub cause: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PduSessionReleaseComplete {
    pub pdu_session_id: u8,
    pub pti: u8,
}

/// A decoded plain 5GSM message.
#[derive(Debug, Clone, PartialEq)]
pub enum SmMessage {
    PduSessionEstablishmentRequest(PduSessionEstablishmentRequest),
    PduSessionEstablishmentAccept(PduSessionEstablishmentAccept),
    PduSessionEstablishmentReject(PduSessionEstablishmentReject),
    PduSessionReleaseCommand(PduSessionReleaseCommand),
    PduSessionReleaseComplete(PduSessionReleaseComplete),
}

impl SmMessage {
    pub fn message_type(&self) -> SmMessageType {
        match self {
            SmMessage::PduSessionEstablishmentRequest(_) => {
                SmMessageType::PduSessionEstablishmentRequest
            }
            SmMessage::PduSessionEstablishmentAccept(_) => {
                SmMessageType::PduSessionEstablishmentAccept
            }
            SmMessage::PduSessionEstablishmentReject(_) => {
                SmMessageType::PduSessionEstablishmentReject
            }
            SmMessage::PduSessionReleaseCommand(_) => SmMessageType::PduSessionReleaseCommand,
            SmMessage::PduSessionReleaseComplete(_) => SmMessageType::PduSessionReleaseComplete,
        }
    }

    pub fn pdu_session_id(&self) -> u8 {
        match self {
            SmMessage::PduSessionEstablishmentRequest(m) => m.pdu_session_id,
            SmMessage::PduSessionEstablishmentAccept(m) => m.pdu_session_id,
            SmMessage::PduSessionEstablishmentReject(m) => m.pdu_session_id,
            SmMessage::PduSessionReleaseCommand(m) => m.pdu_session_id,
            SmMessage::PduSessionReleaseComplete(m) => m.pdu_session_id,
        }
    }

    pub fn pti(&self) -> u8 {
        match self {
            SmMessage::PduSessionEstablishmentRequest(m) => m.pti,
            SmMessage::PduSessionEstablishmentAccept(m) => m.pti,
            SmMessage::PduSessionEstablishmentReject(m) => m.pti,
            SmMessage::PduSessionReleaseCommand(m) => m.pti,
            SmMessage::PduSessionReleaseComplete(m) => m.pti,
        }
    }

    /// Encode with the 4-byte plain 5GSM header.
    pub fn encode_plain(&self) -> Vec<u8> {
        let mut out = vec![
            u8::from(ExtendedProtocolDiscriminator::SessionManagement),
            self.pdu_session_id(),
            self.pti(),
            u8::from(self.message_type()),
        ];
        match self {
            SmMessage::PduSessionEstablishmentRequest(_)
            | SmMessage::PduSessionReleaseComplete(_) => {}
            SmMessage::PduSessionEstablishmentAccept(m) => {
                out.extend_from_slice(&m.ue_address.octets());
                out.push(m.qfi);
            }
            SmMessage::PduSessionEstablishmentReject(m) => out.push(m.cause),
            SmMessage::PduSessionReleaseCommand(m) => out.push(m.cause),
        }
        out
    }

    /// Decode a plain 5GSM message including its 4-byte header.
    pub fn decode_plain(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(bytes);
        let epd = r.u8()?;
        if epd != u8::from(ExtendedProtocolDiscriminator::SessionManagement) {
            return Err(CodecError::InvalidEpd(epd));
        }
        let pdu_session_id = r.u8()?;
        let pti = r.u8()?;
        let mt_byte = r.u8()?;
        let message_type =
            SmMessageType::try_from(mt_byte).map_err(|_| CodecError::InvalidMessageType(mt_byte))?;
        Ok(match message_type {
            SmMessageType::PduSessionEstablishmentRequest => {
                SmMessage::PduSessionEstablishmentRequest(PduSessionEstablishmentRequest {
                    pdu_session_id,
                    pti,
                })
            }
            SmMessageType::PduSessionEstablishmentAccept => {
                SmMessage::PduSessionEstablishmentAccept(PduSessionEstablishmentAccept {
                    pdu_session_id,
                    pti,
                    ue_address: Ipv4Addr::from(r.fixed::<4>()?),
                    qfi: r.u8()?,
                })
            }
            SmMessageType::PduSessionEstablishmentReject => {
                SmMessage::PduSessionEstablishmentReject(PduSessionEstablishmentReject {
                    pdu_session_id,
                    pti,
                    cause: r.u8()?,
                })
            }
            SmMessageType::PduSessionReleaseCommand => {
                SmMessage::PduSessionReleaseCommand(PduSessionReleaseCommand {
                    pdu_session_id,
                    pti,
                    cause: r.u8()?,
                })
            }
            SmMessageType::PduSessionReleaseComplete => {
                SmMessage::PduSessionReleaseComplete(PduSessionReleaseComplete {
                    pdu_session_id,
                    pti,
                })
            }
        })
    }
}

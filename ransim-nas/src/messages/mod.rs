//! Plain NAS message model.
//!
//! The bit-exact TS 24.501 TLV encoding is an external collaborator;
//! messages here use a compact deterministic byte layout that preserves
//! the standard headers (EPD, security header type, message type, and
//! the 5GSM PSI/PTI octets) and carries each message's semantic fields.

pub mod mm;
pub mod sm;

use ransim_common::Snssai;
use thiserror::Error;

use crate::enums::ExtendedProtocolDiscriminator;

pub use mm::MmMessage;
pub use sm::SmMessage;

/// Errors from plain NAS encode/decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("invalid extended protocol discriminator: 0x{0:02X}")]
    InvalidEpd(u8),

    #[error("invalid message type: 0x{0:02X}")]
    InvalidMessageType(u8),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

/// Checked sequential reader over a received byte buffer.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn need(&self, n: usize) -> Result<(), CodecError> {
        if self.buf.len() - self.pos < n {
            return Err(CodecError::BufferTooShort {
                expected: self.pos + n,
                actual: self.buf.len(),
            });
        }
        Ok(())
    }

    pub fn u8(&mut self) -> Result<u8, CodecError> {
        self.need(1)?;
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn u16(&mut self) -> Result<u16, CodecError> {
        self.need(2)?;
        let v = u16::from_be_bytes([self.buf[self.pos], self.buf[self.pos + 1]]);
        self.pos += 2;
        Ok(v)
    }

    pub fn u32(&mut self) -> Result<u32, CodecError> {
        self.need(4)?;
        let mut b = [0u8; 4];
        b.copy_from_slice(&self.buf[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(u32::from_be_bytes(b))
    }

    pub fn fixed<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        self.need(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    pub fn bytes(&mut self) -> Result<Vec<u8>, CodecError> {
        let len = self.u16()? as usize;
        self.need(len)?;
        let v = self.buf[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(v)
    }

    pub fn string(&mut self) -> Result<String, CodecError> {
        let raw = self.bytes()?;
        String::from_utf8(raw).map_err(|e| CodecError::InvalidValue(format!("bad utf-8: {e}")))
    }
}

pub(crate) fn put_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
}

pub(crate) fn put_string(out: &mut Vec<u8>, s: &str) {
    put_bytes(out, s.as_bytes());
}

pub(crate) fn put_opt_u32(out: &mut Vec<u8>, v: Option<u32>) {
    match v {
        Some(v) => {
            out.push(1);
            out.extend_from_slice(&v.to_be_bytes());
        }
        None => out.push(0),
    }
}

pub(crate) fn read_opt_u32(r: &mut Reader<'_>) -> Result<Option<u32>, CodecError> {
    Ok(match r.u8()? {
        0 => None,
        _ => Some(r.u32()?),
    })
}

pub(crate) fn put_snssai(out: &mut Vec<u8>, snssai: &Snssai) {
    out.push(snssai.sst);
    match snssai.sd {
        Some(sd) => {
            out.push(1);
            out.extend_from_slice(&sd.to_be_bytes());
        }
        None => out.push(0),
    }
}

pub(crate) fn read_snssai(r: &mut Reader<'_>) -> Result<Snssai, CodecError> {
    let sst = r.u8()?;
    Ok(match r.u8()? {
        0 => Snssai::new(sst),
        _ => Snssai::with_sd(sst, r.u32()?),
    })
}

pub(crate) fn put_opt_snssai(out: &mut Vec<u8>, snssai: &Option<Snssai>) {
    match snssai {
        Some(s) => {
            out.push(1);
            put_snssai(out, s);
        }
        None => out.push(0),
    }
}

pub(crate) fn read_opt_snssai(r: &mut Reader<'_>) -> Result<Option<Snssai>, CodecError> {
    Ok(match r.u8()? {
        0 => None,
        _ => Some(read_snssai(r)?),
    })
}

/// A decoded plain NAS message, 5GMM or 5GSM.
#[derive(Debug, Clone, PartialEq)]
pub enum NasMessage {
    Mm(MmMessage),
    Sm(SmMessage),
}

impl NasMessage {
    /// Encode as a plain (unprotected) NAS message.
    pub fn encode_plain(&self) -> Vec<u8> {
        match self {
            NasMessage::Mm(msg) => msg.encode_plain(),
            NasMessage::Sm(msg) => msg.encode_plain(),
        }
    }

    /// Decode a plain NAS message, dispatching on the EPD octet.
    pub fn decode_plain(bytes: &[u8]) -> Result<Self, CodecError> {
        let epd = *bytes.first().ok_or(CodecError::BufferTooShort {
            expected: 1,
            actual: 0,
        })?;
        match ExtendedProtocolDiscriminator::try_from(epd) {
            Ok(ExtendedProtocolDiscriminator::MobilityManagement) => {
                Ok(NasMessage::Mm(MmMessage::decode_plain(bytes)?))
            }
            Ok(ExtendedProtocolDiscriminator::SessionManagement) => {
                Ok(NasMessage::Sm(SmMessage::decode_plain(bytes)?))
            }
            Err(_) => Err(CodecError::InvalidEpd(epd)),
        }
    }
}

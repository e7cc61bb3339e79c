//! Secured NAS encode/decode (TS 24.501 4.4).
//!
//! A secured NAS message wraps a plain one:
//!
//! ```text
//! octet 0      EPD (0x7E)
//! octet 1      security header type
//! octets 2..6  MAC
//! octet 6      sequence number (low byte of the sender's NAS COUNT)
//! octets 7..   plain message, ciphered when the header type says so
//! ```
//!
//! Encryption happens before integrity protection; the MAC covers the
//! sequence number and the ciphered payload. Each side keeps separate
//! uplink and downlink counts, so the codec is parameterised on the
//! direction the message travels and both peers can share it.

use tracing::debug;

use crate::count::NasCount;
use crate::enums::{ExtendedProtocolDiscriminator, SecurityHeaderType};
use crate::messages::{CodecError, MmMessage, NasMessage};
use crate::security::{constant_time_eq, Direction, NasSecurityContext, SecurityError};

/// Length of the secured NAS header up to and including the sequence
/// number octet.
pub const SECURED_HEADER_LEN: usize = 7;

/// Errors from the secured NAS codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NasError {
    #[error("NAS codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("NAS security error: {0}")]
    Security(#[from] SecurityError),
}

fn send_count(ctx: &mut NasSecurityContext, direction: Direction) -> &mut NasCount {
    match direction {
        Direction::Uplink => &mut ctx.ul_count,
        Direction::Downlink => &mut ctx.dl_count,
    }
}

/// Encode a NAS message for sending in the given direction.
///
/// Falls back to the plain encoding when there is no usable security
/// context or the caller asks for an unprotected message. A new-context
/// header type resets both NAS counts before encoding.
pub fn encode(
    ctx: Option<&mut NasSecurityContext>,
    msg: &NasMessage,
    sht: SecurityHeaderType,
    direction: Direction,
) -> Result<Vec<u8>, NasError> {
    let ctx = match ctx {
        Some(ctx) if ctx.has_keys() && sht.is_protected() => ctx,
        _ => return Ok(msg.encode_plain()),
    };

    if sht.is_new_security_context() {
        ctx.reset_counts();
    }

    let count = send_count(ctx, direction);
    let count_value = count.as_u32();
    let seq = count.sqn;

    let mut payload = msg.encode_plain();
    if sht.is_ciphered() {
        ctx.apply_cipher(count_value, direction, &mut payload)?;
    }

    let mut mac_input = Vec::with_capacity(1 + payload.len());
    mac_input.push(seq);
    mac_input.extend_from_slice(&payload);
    let mac = ctx.compute_mac(count_value, direction, &mac_input)?;

    let mut out = Vec::with_capacity(SECURED_HEADER_LEN + payload.len());
    out.push(u8::from(ExtendedProtocolDiscriminator::MobilityManagement));
    out.push(u8::from(sht));
    out.extend_from_slice(&mac);
    out.push(seq);
    out.extend_from_slice(&payload);

    send_count(ctx, direction).increment();
    Ok(out)
}

/// Decode a received NAS message sent in the given direction.
///
/// Plain messages pass straight through. For secured messages the
/// receive count adopts the carried sequence number, the MAC is
/// verified, and the payload is deciphered when the header type says
/// so. A new-context header carries a Security Mode Command; the codec
/// resets the counts, adopts the commanded algorithms and derives the
/// NAS keys before checking the MAC.
pub fn decode(
    ctx: Option<&mut NasSecurityContext>,
    bytes: &[u8],
    direction: Direction,
) -> Result<NasMessage, NasError> {
    let epd = *bytes.first().ok_or(CodecError::BufferTooShort {
        expected: 1,
        actual: 0,
    })?;
    if epd != u8::from(ExtendedProtocolDiscriminator::MobilityManagement) {
        return Ok(NasMessage::decode_plain(bytes)?);
    }
    let sht_byte = *bytes.get(1).ok_or(CodecError::BufferTooShort {
        expected: 2,
        actual: bytes.len(),
    })? & 0x0F;
    let sht = SecurityHeaderType::try_from(sht_byte)
        .map_err(|_| CodecError::InvalidValue(format!("bad security header type {sht_byte}")))?;
    if !sht.is_protected() {
        return Ok(NasMessage::decode_plain(bytes)?);
    }

    let ctx = ctx.ok_or(SecurityError::NoSecurityContext)?;
    if bytes.len() < SECURED_HEADER_LEN {
        return Err(CodecError::BufferTooShort {
            expected: SECURED_HEADER_LEN,
            actual: bytes.len(),
        }
        .into());
    }
    let mac_received = &bytes[2..6];
    let seq = bytes[6];
    let payload = &bytes[SECURED_HEADER_LEN..];

    if sht.is_new_security_context() {
        return decode_new_context(ctx, sht, bytes, direction);
    }

    let count = recv_count(ctx, direction);
    count.adopt_received(seq);
    let count_value = count.as_u32();

    let mac = ctx.compute_mac(count_value, direction, &bytes[6..])?;
    if !constant_time_eq(&mac, mac_received) {
        debug!(seq, "NAS MAC mismatch");
        return Err(SecurityError::MacVerificationFailed.into());
    }

    let plain = if sht.is_ciphered() {
        let mut deciphered = payload.to_vec();
        ctx.apply_cipher(count_value, direction, &mut deciphered)?;
        NasMessage::decode_plain(&deciphered)?
    } else {
        NasMessage::decode_plain(payload)?
    };
    Ok(plain)
}

fn recv_count(ctx: &mut NasSecurityContext, direction: Direction) -> &mut NasCount {
    match direction {
        Direction::Uplink => &mut ctx.ul_count,
        Direction::Downlink => &mut ctx.dl_count,
    }
}

/// A new-context message takes a fresh security context into use. The
/// only message sent this way is the Security Mode Command, integrity
/// protected but not ciphered, so the commanded algorithms can be read
/// before the keys that depend on them exist.
fn decode_new_context(
    ctx: &mut NasSecurityContext,
    sht: SecurityHeaderType,
    bytes: &[u8],
    direction: Direction,
) -> Result<NasMessage, NasError> {
    if sht.is_ciphered() {
        return Err(CodecError::InvalidValue(
            "ciphered new-security-context message".into(),
        )
        .into());
    }

    let payload = &bytes[SECURED_HEADER_LEN..];
    let inner = NasMessage::decode_plain(payload)?;
    let smc = match &inner {
        NasMessage::Mm(MmMessage::SecurityModeCommand(smc)) => smc,
        _ => {
            return Err(CodecError::InvalidValue(
                "new-security-context header on a message other than Security Mode Command".into(),
            )
            .into())
        }
    };

    ctx.reset_counts();
    ctx.algorithms = smc.algorithms;
    ctx.derive_algorithm_keys()?;

    let count = recv_count(ctx, direction);
    count.adopt_received(bytes[6]);
    let count_value = count.as_u32();

    let mac = ctx.compute_mac(count_value, direction, &bytes[6..])?;
    if !constant_time_eq(&mac, &bytes[2..6]) {
        return Err(SecurityError::MacVerificationFailed.into());
    }
    Ok(inner)
}

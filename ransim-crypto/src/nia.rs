//! NIA2 (128-EIA2) NAS integrity, AES-128 CMAC.
//!
//! NIA0 (null integrity) yields an all-zero MAC and is handled at the
//! NAS layer.

use aes::Aes128;
use cmac::{Cmac, Mac};

/// Key size in bytes (128 bits)
pub const KEY_SIZE: usize = 16;

/// MAC size in bytes (32 bits)
pub const MAC_SIZE: usize = 4;

/// Compute the NIA2 MAC over `data`.
///
/// The CMAC input is COUNT (32 bits) || BEARER (5 bits) ||
/// DIRECTION (1 bit) || 26 zero bits || MESSAGE; the MAC is the first
/// 32 bits of the CMAC output.
pub fn nia2_compute_mac(
    count: u32,
    bearer: u8,
    direction: u8,
    key: &[u8; KEY_SIZE],
    data: &[u8],
) -> [u8; MAC_SIZE] {
    let mut input = Vec::with_capacity(8 + data.len());
    input.extend_from_slice(&count.to_be_bytes());
    input.push(((bearer & 0x1F) << 3) | ((direction & 0x01) << 2));
    input.extend_from_slice(&[0, 0, 0]);
    input.extend_from_slice(data);

    // CMAC accepts any 16-byte key
    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("AES-128 CMAC key is always 16 bytes"));
    mac.update(&input);
    let full = mac.finalize().into_bytes();

    let mut out = [0u8; MAC_SIZE];
    out.copy_from_slice(&full[..MAC_SIZE]);
    out
}

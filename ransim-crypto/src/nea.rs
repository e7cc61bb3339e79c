//! NEA2 (128-EEA2) NAS ciphering, AES-128 in CTR mode.
//!
//! NEA0 (null ciphering) is handled at the NAS layer by leaving the
//! payload untouched; only the AES-based algorithm lives here.

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};

/// Key size in bytes (128 bits)
pub const KEY_SIZE: usize = 16;

/// IV size for AES-CTR in bytes
pub const IV_SIZE: usize = 16;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// Apply the NEA2 keystream to `data` in place.
///
/// Encryption and decryption are the same XOR operation. The IV is
/// COUNT (32 bits) || BEARER (5 bits) || DIRECTION (1 bit) || zeros.
pub fn nea2_apply(count: u32, bearer: u8, direction: u8, key: &[u8; KEY_SIZE], data: &mut [u8]) {
    let iv = build_iv(count, bearer, direction);
    let mut cipher = Aes128Ctr::new(key.into(), &iv.into());
    cipher.apply_keystream(data);
}

fn build_iv(count: u32, bearer: u8, direction: u8) -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    iv[0..4].copy_from_slice(&count.to_be_bytes());
    iv[4] = ((bearer & 0x1F) << 3) | ((direction & 0x01) << 2);
    iv
}

//! 5G key derivation (3GPP TS 33.501 Annex A).
//!
//! Implements the key chain the UE walks after a successful AKA run:
//! CK/IK -> Kausf -> Kseaf -> Kamf -> Knas_enc/Knas_int, plus RES*
//! for the 5G-AKA response.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use unicode_normalization::UnicodeNormalization;

/// HMAC-SHA256 output size in bytes
pub const HMAC_SHA256_SIZE: usize = 32;

/// 256-bit key size in bytes
pub const KEY_256_SIZE: usize = 32;

/// 128-bit key size in bytes
pub const KEY_128_SIZE: usize = 16;

/// FC values from TS 33.501 Annex A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FcValue {
    /// A.2: Kausf from CK || IK
    Kausf = 0x6A,
    /// A.4: RES* from CK || IK
    ResStar = 0x6B,
    /// A.6: Kseaf from Kausf
    Kseaf = 0x6C,
    /// A.7: Kamf from Kseaf
    Kamf = 0x6D,
    /// A.8: Knas_int / Knas_enc from Kamf
    KnasIntEnc = 0x69,
}

/// Algorithm type distinguisher for the A.8 derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlgorithmTypeDistinguisher {
    /// NAS encryption algorithm
    NasEnc = 0x01,
    /// NAS integrity algorithm
    NasInt = 0x02,
}

/// HMAC-SHA256 of `input` under `key`.
pub fn hmac_sha256(key: &[u8], input: &[u8]) -> [u8; HMAC_SHA256_SIZE] {
    // HMAC-SHA256 accepts keys of any size
    let mut mac = Hmac::<Sha256>::new_from_slice(key)
        .unwrap_or_else(|_| unreachable!("HMAC-SHA256 accepts keys of any size"));
    mac.update(input);
    let mut out = [0u8; HMAC_SHA256_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// Generic KDF from TS 33.220: HMAC-SHA256 over
/// S = FC || P0 || L0 || ... || Pn || Ln, lengths as 2-byte big-endian.
pub fn calculate_kdf_key(
    key: &[u8; KEY_256_SIZE],
    fc: FcValue,
    parameters: &[&[u8]],
) -> [u8; KEY_256_SIZE] {
    let mut s = Vec::with_capacity(1 + parameters.iter().map(|p| p.len() + 2).sum::<usize>());
    s.push(fc as u8);
    for param in parameters {
        s.extend_from_slice(param);
        s.extend_from_slice(&(param.len() as u16).to_be_bytes());
    }
    hmac_sha256(key, &s)
}

/// Kausf = KDF(CK || IK, 0x6A, SN name, SQN xor AK)
pub fn derive_kausf(
    ck: &[u8; KEY_128_SIZE],
    ik: &[u8; KEY_128_SIZE],
    sn_name: &[u8],
    sqn_xor_ak: &[u8; 6],
) -> [u8; KEY_256_SIZE] {
    let mut key = [0u8; KEY_256_SIZE];
    key[..KEY_128_SIZE].copy_from_slice(ck);
    key[KEY_128_SIZE..].copy_from_slice(ik);
    calculate_kdf_key(&key, FcValue::Kausf, &[sn_name, sqn_xor_ak])
}

/// Kseaf = KDF(Kausf, 0x6C, SN name)
pub fn derive_kseaf(kausf: &[u8; KEY_256_SIZE], sn_name: &[u8]) -> [u8; KEY_256_SIZE] {
    calculate_kdf_key(kausf, FcValue::Kseaf, &[sn_name])
}

/// Kamf = KDF(Kseaf, 0x6D, SUPI, ABBA)
pub fn derive_kamf(kseaf: &[u8; KEY_256_SIZE], supi: &[u8], abba: &[u8]) -> [u8; KEY_256_SIZE] {
    calculate_kdf_key(kseaf, FcValue::Kamf, &[supi, abba])
}

/// NAS key = lower 128 bits of KDF(Kamf, 0x69, type, algorithm id).
pub fn derive_nas_key(
    kamf: &[u8; KEY_256_SIZE],
    algorithm_type: AlgorithmTypeDistinguisher,
    algorithm_id: u8,
) -> [u8; KEY_128_SIZE] {
    let out = calculate_kdf_key(
        kamf,
        FcValue::KnasIntEnc,
        &[&[algorithm_type as u8], &[algorithm_id]],
    );
    let mut key = [0u8; KEY_128_SIZE];
    key.copy_from_slice(&out[KEY_128_SIZE..]);
    key
}

/// NAS encryption key for the given ciphering algorithm id.
pub fn derive_knas_enc(kamf: &[u8; KEY_256_SIZE], algorithm_id: u8) -> [u8; KEY_128_SIZE] {
    derive_nas_key(kamf, AlgorithmTypeDistinguisher::NasEnc, algorithm_id)
}

/// NAS integrity key for the given integrity algorithm id.
pub fn derive_knas_int(kamf: &[u8; KEY_256_SIZE], algorithm_id: u8) -> [u8; KEY_128_SIZE] {
    derive_nas_key(kamf, AlgorithmTypeDistinguisher::NasInt, algorithm_id)
}

/// RES* = lower 128 bits of KDF(CK || IK, 0x6B, SN name, RAND, RES).
pub fn derive_res_star(
    ck: &[u8; KEY_128_SIZE],
    ik: &[u8; KEY_128_SIZE],
    sn_name: &[u8],
    rand: &[u8; KEY_128_SIZE],
    res: &[u8],
) -> [u8; KEY_128_SIZE] {
    let mut key = [0u8; KEY_256_SIZE];
    key[..KEY_128_SIZE].copy_from_slice(ck);
    key[KEY_128_SIZE..].copy_from_slice(ik);

    let out = calculate_kdf_key(&key, FcValue::ResStar, &[sn_name, rand, res]);
    let mut result = [0u8; KEY_128_SIZE];
    result.copy_from_slice(&out[KEY_128_SIZE..]);
    result
}

/// Encode a character string for KDF input (TS 33.501 Annex B.2.1.2):
/// NFKC normalization followed by UTF-8 encoding.
pub fn encode_kdf_string(s: &str) -> Vec<u8> {
    s.nfkc().collect::<String>().into_bytes()
}

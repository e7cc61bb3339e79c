//! UE NAS security context: AKA run, key chain, and the per-message
//! integrity/ciphering operations.

use ransim_crypto::kdf::{
    derive_kamf, derive_kausf, derive_knas_enc, derive_knas_int, derive_kseaf, derive_res_star,
    encode_kdf_string, KEY_128_SIZE, KEY_256_SIZE,
};
use ransim_crypto::milenage::{Milenage, AUTS_SIZE};
use ransim_crypto::{nea2_apply, nia2_compute_mac};

use crate::algorithms::{CipheringAlgorithm, IntegrityAlgorithm, NasSecurityAlgorithms};
use crate::count::NasCount;

/// NAS connection identifier used as the BEARER input for 3GPP access
/// (TS 33.501 D.3.1).
pub const NAS_BEARER: u8 = 0x01;

/// ngKSI value meaning no key is available.
pub const NGKSI_NO_KEY: u8 = 0x07;

/// Direction bit for the integrity and ciphering inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    Uplink = 0,
    Downlink = 1,
}

/// Security-related errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    /// AUTN MAC did not verify against the subscriber key
    #[error("AUTN MAC failure")]
    MacFailure,
    /// Network SQN outside the acceptance window; AUTS attached for
    /// re-synchronization
    #[error("SQN synchronisation failure")]
    SqnFailure { auts: [u8; AUTS_SIZE] },
    /// Integrity check of a secured NAS message failed
    #[error("NAS MAC verification failed")]
    MacVerificationFailed,
    /// Invalid ciphering algorithm identifier
    #[error("invalid ciphering algorithm: 0x{0:02X}")]
    InvalidCipheringAlgorithm(u8),
    /// Invalid integrity algorithm identifier
    #[error("invalid integrity algorithm: 0x{0:02X}")]
    InvalidIntegrityAlgorithm(u8),
    /// Algorithm identifier is valid but this build does not carry it
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(&'static str),
    /// Operation requires keys that have not been derived
    #[error("no security context established")]
    NoSecurityContext,
}

/// Long-term subscriber credentials plus the identifiers the key chain
/// is bound to.
#[derive(Debug, Clone)]
pub struct UeCredentials {
    /// Subscriber key K
    pub k: [u8; 16],
    /// Derived operator key OPc
    pub opc: [u8; 16],
    /// Authentication management field
    pub amf_field: [u8; 2],
    /// Highest accepted sequence number, updated on each AKA success
    pub sqn: [u8; 6],
    /// SUPI in IMSI format
    pub supi: String,
    /// Serving network name for the key derivations
    pub sn_name: String,
}

fn sqn_value(sqn: &[u8; 6]) -> u64 {
    sqn.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Constant-time equality for MAC comparisons.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// NAS security context.
///
/// Holds the derived key chain, negotiated algorithms, and the UL/DL
/// NAS counts. Created empty (ngKSI 7, no keys); populated by the
/// authentication and security mode procedures.
#[derive(Debug, Clone, Default)]
pub struct NasSecurityContext {
    /// NAS key set identifier, 7 = no key available
    pub ngksi: u8,
    /// Negotiated algorithms
    pub algorithms: NasSecurityAlgorithms,
    /// Uplink NAS COUNT
    pub ul_count: NasCount,
    /// Downlink NAS COUNT
    pub dl_count: NasCount,
    kamf: Option<[u8; KEY_256_SIZE]>,
    knas_enc: Option<[u8; KEY_128_SIZE]>,
    knas_int: Option<[u8; KEY_128_SIZE]>,
}

impl NasSecurityContext {
    pub fn new() -> Self {
        Self {
            ngksi: NGKSI_NO_KEY,
            ..Self::default()
        }
    }

    /// True once NAS keys have been derived and secured messaging can
    /// be used.
    pub fn has_keys(&self) -> bool {
        self.knas_enc.is_some() && self.knas_int.is_some()
    }

    pub fn kamf(&self) -> Option<&[u8; KEY_256_SIZE]> {
        self.kamf.as_ref()
    }

    /// Install a Kamf derived elsewhere. The network side of a test
    /// harness builds its context this way.
    pub fn set_kamf(&mut self, kamf: [u8; KEY_256_SIZE]) {
        self.kamf = Some(kamf);
    }

    /// Run 5G-AKA against a received RAND/AUTN pair.
    ///
    /// Verifies the AUTN MAC, checks SQN freshness, and on success
    /// stores the network SQN, derives the Kausf/Kseaf/Kamf chain, and
    /// returns RES* for the Authentication Response.
    ///
    /// A MAC mismatch returns [`SecurityError::MacFailure`] with no
    /// output. A stale SQN returns [`SecurityError::SqnFailure`]
    /// carrying the AUTS re-synchronization token; RES* is never
    /// produced alongside an error.
    pub fn run_aka(
        &mut self,
        creds: &mut UeCredentials,
        ngksi: u8,
        abba: &[u8],
        rand: &[u8; 16],
        autn: &[u8; 16],
    ) -> Result<[u8; 16], SecurityError> {
        let milenage = Milenage::new(&creds.k, &creds.opc);

        let ak = milenage.f5(rand);
        let mut network_sqn = [0u8; 6];
        for i in 0..6 {
            network_sqn[i] = autn[i] ^ ak[i];
        }
        let amf_field: [u8; 2] = [autn[6], autn[7]];
        let expected_mac = milenage.f1(rand, &network_sqn, &amf_field);
        if !constant_time_eq(&expected_mac, &autn[8..16]) {
            return Err(SecurityError::MacFailure);
        }

        if sqn_value(&creds.sqn) > sqn_value(&network_sqn) {
            let auts = milenage.generate_auts(&creds.sqn, rand);
            return Err(SecurityError::SqnFailure { auts });
        }
        creds.sqn = network_sqn;

        let res = milenage.f2(rand);
        let ck = milenage.f3(rand);
        let ik = milenage.f4(rand);

        let sn_name = encode_kdf_string(&creds.sn_name);
        let sqn_xor_ak: [u8; 6] = [autn[0], autn[1], autn[2], autn[3], autn[4], autn[5]];

        let res_star = derive_res_star(&ck, &ik, &sn_name, rand, &res);
        let kausf = derive_kausf(&ck, &ik, &sn_name, &sqn_xor_ak);
        let kseaf = derive_kseaf(&kausf, &sn_name);
        self.kamf = Some(derive_kamf(&kseaf, creds.supi.as_bytes(), abba));
        self.ngksi = ngksi & 0x07;

        Ok(res_star)
    }

    /// Derive Knas-enc/Knas-int from Kamf for the negotiated algorithms.
    pub fn derive_algorithm_keys(&mut self) -> Result<(), SecurityError> {
        let kamf = self.kamf.ok_or(SecurityError::NoSecurityContext)?;
        self.knas_enc = Some(derive_knas_enc(&kamf, self.algorithms.ciphering as u8));
        self.knas_int = Some(derive_knas_int(&kamf, self.algorithms.integrity as u8));
        Ok(())
    }

    /// Reset both NAS counts, taking a new security context into use.
    pub fn reset_counts(&mut self) {
        self.ul_count.reset();
        self.dl_count.reset();
    }

    /// Compute the NAS MAC for `data` under the negotiated integrity
    /// algorithm.
    pub fn compute_mac(
        &self,
        count: u32,
        direction: Direction,
        data: &[u8],
    ) -> Result<[u8; 4], SecurityError> {
        match self.algorithms.integrity {
            IntegrityAlgorithm::Nia0 => Ok([0u8; 4]),
            IntegrityAlgorithm::Nia2 => {
                let key = self.knas_int.ok_or(SecurityError::NoSecurityContext)?;
                Ok(nia2_compute_mac(
                    count,
                    NAS_BEARER,
                    direction as u8,
                    &key,
                    data,
                ))
            }
            IntegrityAlgorithm::Nia1 => Err(SecurityError::UnsupportedAlgorithm("NIA1")),
            IntegrityAlgorithm::Nia3 => Err(SecurityError::UnsupportedAlgorithm("NIA3")),
        }
    }

    /// Apply the negotiated ciphering algorithm to `data` in place.
    /// NEA0 leaves the payload untouched.
    pub fn apply_cipher(
        &self,
        count: u32,
        direction: Direction,
        data: &mut [u8],
    ) -> Result<(), SecurityError> {
        match self.algorithms.ciphering {
            CipheringAlgorithm::Nea0 => Ok(()),
            CipheringAlgorithm::Nea2 => {
                let key = self.knas_enc.ok_or(SecurityError::NoSecurityContext)?;
                nea2_apply(count, NAS_BEARER, direction as u8, &key, data);
                Ok(())
            }
            CipheringAlgorithm::Nea1 => Err(SecurityError::UnsupportedAlgorithm("NEA1")),
            CipheringAlgorithm::Nea3 => Err(SecurityError::UnsupportedAlgorithm("NEA3")),
        }
    }
}

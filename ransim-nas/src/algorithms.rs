//! NAS security algorithm identifiers, capability bitmaps, and the
//! network-side selection rule.

use crate::security::SecurityError;

/// 5G NAS ciphering algorithm (TS 24.501 9.11.3.34).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum CipheringAlgorithm {
    /// 5G-EA0, null ciphering
    #[default]
    Nea0 = 0x00,
    /// 128-5G-EA1, SNOW3G based
    Nea1 = 0x01,
    /// 128-5G-EA2, AES based
    Nea2 = 0x02,
    /// 128-5G-EA3, ZUC based
    Nea3 = 0x03,
}

impl TryFrom<u8> for CipheringAlgorithm {
    type Error = SecurityError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(CipheringAlgorithm::Nea0),
            0x01 => Ok(CipheringAlgorithm::Nea1),
            0x02 => Ok(CipheringAlgorithm::Nea2),
            0x03 => Ok(CipheringAlgorithm::Nea3),
            _ => Err(SecurityError::InvalidCipheringAlgorithm(value)),
        }
    }
}

/// 5G NAS integrity algorithm (TS 24.501 9.11.3.34).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum IntegrityAlgorithm {
    /// 5G-IA0, null integrity
    #[default]
    Nia0 = 0x00,
    /// 128-5G-IA1, SNOW3G based
    Nia1 = 0x01,
    /// 128-5G-IA2, AES based
    Nia2 = 0x02,
    /// 128-5G-IA3, ZUC based
    Nia3 = 0x03,
}

impl TryFrom<u8> for IntegrityAlgorithm {
    type Error = SecurityError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x00 => Ok(IntegrityAlgorithm::Nia0),
            0x01 => Ok(IntegrityAlgorithm::Nia1),
            0x02 => Ok(IntegrityAlgorithm::Nia2),
            0x03 => Ok(IntegrityAlgorithm::Nia3),
            _ => Err(SecurityError::InvalidIntegrityAlgorithm(value)),
        }
    }
}

/// Selected NAS security algorithms, one octet on the wire: ciphering in
/// the high nibble, integrity in the low nibble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NasSecurityAlgorithms {
    pub ciphering: CipheringAlgorithm,
    pub integrity: IntegrityAlgorithm,
}

impl NasSecurityAlgorithms {
    pub fn new(ciphering: CipheringAlgorithm, integrity: IntegrityAlgorithm) -> Self {
        Self {
            ciphering,
            integrity,
        }
    }

    pub fn encode(&self) -> u8 {
        ((self.ciphering as u8) << 4) | (self.integrity as u8)
    }

    pub fn decode(value: u8) -> Result<Self, SecurityError> {
        Ok(Self {
            ciphering: CipheringAlgorithm::try_from((value >> 4) & 0x0F)?,
            integrity: IntegrityAlgorithm::try_from(value & 0x0F)?,
        })
    }
}

/// UE security capability bitmap (TS 24.501 9.11.3.54), two octets:
/// EA0..EA7 in the first, IA0..IA7 in the second, MSB first.
///
/// The null algorithms are always usable and not advertised here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UeSecurityCapability {
    pub ea: u8,
    pub ia: u8,
}

impl UeSecurityCapability {
    fn bit(id: u8) -> u8 {
        0x80 >> id
    }

    pub fn set_ea(&mut self, alg: CipheringAlgorithm) {
        self.ea |= Self::bit(alg as u8);
    }

    pub fn set_ia(&mut self, alg: IntegrityAlgorithm) {
        self.ia |= Self::bit(alg as u8);
    }

    pub fn supports_ea(&self, alg: CipheringAlgorithm) -> bool {
        alg == CipheringAlgorithm::Nea0 || self.ea & Self::bit(alg as u8) != 0
    }

    pub fn supports_ia(&self, alg: IntegrityAlgorithm) -> bool {
        alg == IntegrityAlgorithm::Nia0 || self.ia & Self::bit(alg as u8) != 0
    }
}

/// Network-side algorithm selection over a UE capability bitmap:
/// first advertised integrity algorithm in id order, then first
/// advertised ciphering algorithm; null when nothing is advertised.
pub fn select_algorithms(cap: UeSecurityCapability) -> NasSecurityAlgorithms {
    let integrity = [
        IntegrityAlgorithm::Nia1,
        IntegrityAlgorithm::Nia2,
        IntegrityAlgorithm::Nia3,
    ]
    .into_iter()
    .find(|&a| cap.ia & UeSecurityCapability::bit(a as u8) != 0)
    .unwrap_or(IntegrityAlgorithm::Nia0);

    let ciphering = [
        CipheringAlgorithm::Nea1,
        CipheringAlgorithm::Nea2,
        CipheringAlgorithm::Nea3,
    ]
    .into_iter()
    .find(|&a| cap.ea & UeSecurityCapability::bit(a as u8) != 0)
    .unwrap_or(CipheringAlgorithm::Nea0);

    NasSecurityAlgorithms::new(ciphering, integrity)
}

//! Core 5G identifiers: PLMN, S-NSSAI, TAI, GUAMI.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Public Land Mobile Network identifier.
///
/// MCC is always 3 decimal digits; MNC is 2 or 3 digits, distinguished
/// by `long_mnc`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Plmn {
    /// Mobile Country Code (3 digits)
    pub mcc: u16,
    /// Mobile Network Code (2-3 digits)
    pub mnc: u16,
    /// True if MNC is 3 digits
    #[serde(default)]
    pub long_mnc: bool,
}

impl Plmn {
    pub const fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// Encodes the PLMN to the 3GPP TS 24.008 BCD format (3 bytes).
    ///
    /// - Byte 0: MCC digit 2 (high nibble) | MCC digit 1 (low nibble)
    /// - Byte 1: MNC digit 3 or 0xF (high nibble) | MCC digit 3 (low nibble)
    /// - Byte 2: MNC digit 2 (high nibble) | MNC digit 1 (low nibble)
    pub fn encode(&self) -> [u8; 3] {
        let mcc3 = (self.mcc % 10) as u8;
        let mcc2 = ((self.mcc % 100) / 10) as u8;
        let mcc1 = ((self.mcc % 1000) / 100) as u8;

        let mnc = self.mnc;
        let (mnc1, mnc2, mnc3) = if self.long_mnc {
            (
                ((mnc % 1000) / 100) as u8,
                ((mnc % 100) / 10) as u8,
                (mnc % 10) as u8,
            )
        } else {
            (((mnc % 100) / 10) as u8, (mnc % 10) as u8, 0x0F)
        };

        [(mcc2 << 4) | mcc1, (mnc3 << 4) | mcc3, (mnc2 << 4) | mnc1]
    }

    /// Decodes a PLMN from the 3-byte BCD format.
    pub fn decode(bytes: [u8; 3]) -> Self {
        let mcc1 = (bytes[0] & 0x0F) as u16;
        let mcc2 = ((bytes[0] >> 4) & 0x0F) as u16;
        let mcc3 = (bytes[1] & 0x0F) as u16;
        let mcc = 100 * mcc1 + 10 * mcc2 + mcc3;

        let mnc3 = (bytes[1] >> 4) & 0x0F;
        let mnc1 = (bytes[2] & 0x0F) as u16;
        let mnc2 = ((bytes[2] >> 4) & 0x0F) as u16;

        let (mnc, long_mnc) = if mnc3 != 0x0F {
            (10 * (10 * mnc1 + mnc2) + mnc3 as u16, true)
        } else {
            (10 * mnc1 + mnc2, false)
        };

        Self { mcc, mnc, long_mnc }
    }

    /// Serving network name used by the AKA key derivations, e.g.
    /// `5G:mnc001.mcc001.3gppnetwork.org`.
    pub fn serving_network_name(&self) -> String {
        format!(
            "5G:mnc{:03}.mcc{:03}.3gppnetwork.org",
            self.mnc, self.mcc
        )
    }
}

impl fmt::Debug for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "Plmn({:03}-{:03})", self.mcc, self.mnc)
        } else {
            write!(f, "Plmn({:03}-{:02})", self.mcc, self.mnc)
        }
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "{:03}{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}{:02}", self.mcc, self.mnc)
        }
    }
}

impl Default for Plmn {
    fn default() -> Self {
        Self {
            mcc: 0,
            mnc: 0,
            long_mnc: false,
        }
    }
}

/// Single Network Slice Selection Assistance Information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snssai {
    /// Slice/Service Type
    pub sst: u8,
    /// Slice Differentiator, 24 bits
    #[serde(default)]
    pub sd: Option<u32>,
}

impl Snssai {
    pub const fn new(sst: u8) -> Self {
        Self { sst, sd: None }
    }

    pub const fn with_sd(sst: u8, sd: u32) -> Self {
        Self { sst, sd: Some(sd) }
    }
}

impl fmt::Display for Snssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd {
            Some(sd) => write!(f, "sst={},sd={:06x}", self.sst, sd),
            None => write!(f, "sst={}", self.sst),
        }
    }
}

/// Tracking Area Identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tai {
    pub plmn: Plmn,
    /// Tracking Area Code, 24 bits
    pub tac: u32,
}

/// Globally Unique AMF Identifier, used for failover matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Guami {
    pub plmn: Plmn,
    /// AMF Region ID (8 bits)
    pub region_id: u8,
    /// AMF Set ID (10 bits)
    pub set_id: u16,
    /// AMF Pointer (6 bits)
    pub pointer: u8,
}

impl fmt::Display for Guami {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{:02x}/{:03x}/{:02x}",
            self.plmn, self.region_id, self.set_id, self.pointer
        )
    }
}

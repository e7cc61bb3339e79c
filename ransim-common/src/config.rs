//! Configuration structures for gNB and UE
//!
//! Configuration is loaded from YAML; long-term key material is given as
//! hex strings and parsed into fixed-size buffers at load time.

use std::net::IpAddr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{Plmn, Snssai};

/// Connection parameters for one AMF endpoint the gNB dials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmfEndpoint {
    /// IP address of the AMF
    pub address: IpAddr,
    /// SCTP port of the AMF (typically 38412)
    #[serde(default = "default_amf_port")]
    pub port: u16,
}

fn default_amf_port() -> u16 {
    38412
}

/// gNB configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnbConfig {
    /// gNB identifier (22-32 bit value)
    pub gnb_id: u32,
    /// Human-readable RAN node name
    #[serde(default)]
    pub ran_node_name: Option<String>,
    /// Public Land Mobile Network identifier
    pub plmn: Plmn,
    /// Tracking Area Code (24-bit)
    pub tac: u32,
    /// Supported network slices
    pub slices: Vec<Snssai>,
    /// AMF endpoints to dial at startup
    pub amfs: Vec<AmfEndpoint>,
    /// IP address for the NGAP interface
    pub n2_address: IpAddr,
    /// IP address advertised for GTP-U downlink tunnels
    pub n3_address: IpAddr,
}

/// Operator key type for authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OpType {
    /// Operator key (OP), converted to OPc before use
    Op,
    /// Derived operator key (OPc), used directly
    #[default]
    Opc,
}

/// NAS security algorithms the UE advertises.
///
/// NEA0/NIA0 (null) are always available and not listed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedAlgs {
    /// NIA1 (SNOW3G-based integrity)
    pub nia1: bool,
    /// NIA2 (AES-based integrity)
    pub nia2: bool,
    /// NIA3 (ZUC-based integrity)
    pub nia3: bool,
    /// NEA1 (SNOW3G-based ciphering)
    pub nea1: bool,
    /// NEA2 (AES-based ciphering)
    pub nea2: bool,
    /// NEA3 (ZUC-based ciphering)
    pub nea3: bool,
}

impl Default for SupportedAlgs {
    fn default() -> Self {
        Self {
            nia1: false,
            nia2: true,
            nia3: false,
            nea1: false,
            nea2: true,
            nea3: false,
        }
    }
}

/// UE configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UeConfig {
    /// MSIN part of the subscriber identity (decimal digits)
    pub msin: String,
    /// Home network PLMN
    pub plmn: Plmn,
    /// Subscriber key K, 32 hex digits
    pub k: String,
    /// Operator key (OP or OPc), 32 hex digits
    pub op: String,
    /// Whether `op` is OP or OPc
    #[serde(default)]
    pub op_type: OpType,
    /// Authentication Management Field, 4 hex digits
    pub amf_field: String,
    /// Initial sequence number, 12 hex digits
    pub sqn: String,
    /// Configured network slice, if any
    #[serde(default)]
    pub slice: Option<Snssai>,
    /// Advertised security algorithms
    #[serde(default)]
    pub algs: SupportedAlgs,
}

impl UeConfig {
    /// Full SUPI in IMSI format: `imsi-<mcc><mnc><msin>`.
    pub fn supi(&self) -> String {
        format!("imsi-{}{}", self.plmn, self.msin)
    }

    /// Parses the subscriber key into a fixed buffer.
    pub fn key_bytes(&self) -> Result<[u8; 16], Error> {
        parse_hex_fixed(&self.k, "k")
    }

    /// Parses the operator key into a fixed buffer.
    pub fn op_bytes(&self) -> Result<[u8; 16], Error> {
        parse_hex_fixed(&self.op, "op")
    }

    /// Parses the AMF authentication field.
    pub fn amf_field_bytes(&self) -> Result<[u8; 2], Error> {
        parse_hex_fixed(&self.amf_field, "amf_field")
    }

    /// Parses the initial SQN.
    pub fn sqn_bytes(&self) -> Result<[u8; 6], Error> {
        parse_hex_fixed(&self.sqn, "sqn")
    }
}

fn parse_hex_fixed<const N: usize>(s: &str, field: &str) -> Result<[u8; N], Error> {
    let bytes = hex::decode(s)
        .map_err(|e| Error::Config(format!("{field}: invalid hex: {e}")))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| Error::Config(format!("{field}: expected {N} bytes, got {}", bytes.len())))
}

/// Loads a YAML configuration file.
pub fn load_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Error> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&text)?)
}

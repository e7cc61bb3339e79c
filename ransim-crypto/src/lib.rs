//! 5G security primitives: Milenage AKA, the TS 33.501 key derivation
//! chain, and the AES-based NAS algorithms NEA2/NIA2.

pub mod aes;
pub mod kdf;
pub mod milenage;
pub mod nea;
pub mod nia;

pub use kdf::{
    derive_kamf, derive_kausf, derive_knas_enc, derive_knas_int, derive_kseaf, derive_res_star,
    encode_kdf_string,
};
pub use milenage::{compute_opc, Milenage};
pub use nea::nea2_apply;
pub use nia::nia2_compute_mac;

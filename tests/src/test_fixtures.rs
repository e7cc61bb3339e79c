//! Common fixtures: one test PLMN, shared subscriber key material, and
//! configuration builders for the actors under test.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use ransim_common::{GnbConfig, Guami, OpType, Plmn, Snssai, SupportedAlgs, UeConfig};

/// PLMN every fixture lives in (MCC 001, MNC 01).
pub const TEST_PLMN: Plmn = Plmn::new(1, 1, false);

/// Subscriber key K shared by all test subscribers.
pub const TEST_K: &str = "465b5ce8b199b49faa5f0a2ee238a6bc";

/// Operator key, already in OPc form.
pub const TEST_OPC: &str = "cdc202d5123e20f62b6d676ac72cb318";

/// Tracking area code served by fixture gNBs.
pub const TEST_TAC: u32 = 1;

/// UE configuration for subscriber number `n` (MSIN 0000000000 + n).
pub fn ue_config(n: u32) -> UeConfig {
    UeConfig {
        msin: format!("{n:010}"),
        plmn: TEST_PLMN,
        k: TEST_K.into(),
        op: TEST_OPC.into(),
        op_type: OpType::Opc,
        amf_field: "8000".into(),
        sqn: "000000000000".into(),
        slice: Some(Snssai::new(1)),
        algs: SupportedAlgs::default(),
    }
}

/// gNB configuration with the given id, serving [`TEST_PLMN`].
pub fn gnb_config(gnb_id: u32) -> GnbConfig {
    GnbConfig {
        gnb_id,
        ran_node_name: Some(format!("gnb-{gnb_id}")),
        plmn: TEST_PLMN,
        tac: TEST_TAC,
        slices: vec![Snssai::new(1)],
        amfs: Vec::new(),
        n2_address: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
        n3_address: IpAddr::V4(Ipv4Addr::new(10, 0, 2, gnb_id as u8)),
    }
}

/// Endpoint address for the `n`-th mock AMF.
pub fn amf_address(n: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 1, n], 38412))
}

/// GUAMI in [`TEST_PLMN`], distinguished by region id.
pub fn test_guami(region_id: u8) -> Guami {
    Guami {
        plmn: TEST_PLMN,
        region_id,
        set_id: 1,
        pointer: 0,
    }
}

//! Milenage authentication and key generation (3GPP TS 35.206).
//!
//! Provides the subscriber-side AKA functions:
//! - f1 (MAC-A) and f1* (MAC-S) for network authentication and resync
//! - f2 (RES), f3 (CK), f4 (IK), f5 (AK), f5* (AK for AUTS)
//! - AUTS construction for SQN re-synchronization (TS 33.102 6.3.3)

use crate::aes::{xor_block, Aes128Block, BLOCK_SIZE};

/// Subscriber key size in bytes (128 bits)
pub const KEY_SIZE: usize = 16;

/// OP/OPc size in bytes (128 bits)
pub const OP_SIZE: usize = 16;

/// RAND size in bytes (128 bits)
pub const RAND_SIZE: usize = 16;

/// SQN size in bytes (48 bits)
pub const SQN_SIZE: usize = 6;

/// AMF size in bytes (16 bits)
pub const AMF_SIZE: usize = 2;

/// MAC-A/MAC-S size in bytes (64 bits)
pub const MAC_SIZE: usize = 8;

/// RES size in bytes (64 bits)
pub const RES_SIZE: usize = 8;

/// CK/IK size in bytes (128 bits)
pub const CK_SIZE: usize = 16;

/// AK size in bytes (48 bits)
pub const AK_SIZE: usize = 6;

/// AUTS size in bytes: (SQNms xor AK*) || MAC-S
pub const AUTS_SIZE: usize = SQN_SIZE + MAC_SIZE;

/// Per-output constants c2..c5 differ from zero only in the last byte;
/// paired with the rotation amounts r2..r5 from TS 35.206.
const OUT_PARAMS: [(u8, usize); 4] = [
    (0x01, 0),  // out2: c2, r2
    (0x02, 32), // out3: c3, r3
    (0x04, 64), // out4: c4, r4
    (0x08, 96), // out5: c5, r5
];

/// r1 for the f1/f1* branch; c1 is all zeros.
const R1: usize = 64;

/// Rotate a 128-bit block left by `bits` positions.
fn rotate_left(block: &[u8; BLOCK_SIZE], bits: usize) -> [u8; BLOCK_SIZE] {
    if bits == 0 || bits >= 128 {
        return *block;
    }
    let byte_shift = bits / 8;
    let bit_shift = bits % 8;
    let mut out = [0u8; BLOCK_SIZE];
    for i in 0..BLOCK_SIZE {
        let src = (i + byte_shift) % BLOCK_SIZE;
        let next = (i + byte_shift + 1) % BLOCK_SIZE;
        out[i] = if bit_shift == 0 {
            block[src]
        } else {
            (block[src] << bit_shift) | (block[next] >> (8 - bit_shift))
        };
    }
    out
}

/// Compute OPc = OP xor E_K(OP).
pub fn compute_opc(k: &[u8; KEY_SIZE], op: &[u8; OP_SIZE]) -> [u8; OP_SIZE] {
    let mut opc = Aes128Block::new(k).encrypt_block_copy(op);
    xor_block(&mut opc, op);
    opc
}

/// Milenage context holding the keyed cipher and OPc.
pub struct Milenage {
    cipher: Aes128Block,
    opc: [u8; OP_SIZE],
}

impl Milenage {
    /// Create a context from K and a pre-computed OPc.
    pub fn new(k: &[u8; KEY_SIZE], opc: &[u8; OP_SIZE]) -> Self {
        Self {
            cipher: Aes128Block::new(k),
            opc: *opc,
        }
    }

    /// Create a context from K and OP, computing OPc internally.
    pub fn new_with_op(k: &[u8; KEY_SIZE], op: &[u8; OP_SIZE]) -> Self {
        let opc = compute_opc(k, op);
        Self::new(k, &opc)
    }

    /// TEMP = E_K(RAND xor OPc)
    fn temp(&self, rand: &[u8; RAND_SIZE]) -> [u8; BLOCK_SIZE] {
        let mut t = *rand;
        xor_block(&mut t, &self.opc);
        self.cipher.encrypt_block(&mut t);
        t
    }

    /// OUT1 = E_K(TEMP xor rot(IN1 xor OPc, r1) xor c1) xor OPc
    /// where IN1 = SQN || AMF || SQN || AMF and c1 is zero.
    fn out1(
        &self,
        rand: &[u8; RAND_SIZE],
        sqn: &[u8; SQN_SIZE],
        amf: &[u8; AMF_SIZE],
    ) -> [u8; BLOCK_SIZE] {
        let temp = self.temp(rand);

        let mut in1 = [0u8; BLOCK_SIZE];
        in1[0..6].copy_from_slice(sqn);
        in1[6..8].copy_from_slice(amf);
        in1[8..14].copy_from_slice(sqn);
        in1[14..16].copy_from_slice(amf);
        xor_block(&mut in1, &self.opc);

        let mut block = rotate_left(&in1, R1);
        xor_block(&mut block, &temp);
        self.cipher.encrypt_block(&mut block);
        xor_block(&mut block, &self.opc);
        block
    }

    /// OUTn = E_K(rot(TEMP xor OPc, rn) xor cn) xor OPc for n in 2..=5.
    fn out_n(&self, rand: &[u8; RAND_SIZE], n: usize) -> [u8; BLOCK_SIZE] {
        let (c_last, r) = OUT_PARAMS[n - 2];
        let mut block = self.temp(rand);
        xor_block(&mut block, &self.opc);
        let mut block = rotate_left(&block, r);
        block[BLOCK_SIZE - 1] ^= c_last;
        self.cipher.encrypt_block(&mut block);
        xor_block(&mut block, &self.opc);
        block
    }

    /// f1: network authentication code MAC-A.
    pub fn f1(
        &self,
        rand: &[u8; RAND_SIZE],
        sqn: &[u8; SQN_SIZE],
        amf: &[u8; AMF_SIZE],
    ) -> [u8; MAC_SIZE] {
        let out1 = self.out1(rand, sqn, amf);
        let mut mac = [0u8; MAC_SIZE];
        mac.copy_from_slice(&out1[0..8]);
        mac
    }

    /// f1*: re-synchronization authentication code MAC-S.
    pub fn f1_star(
        &self,
        rand: &[u8; RAND_SIZE],
        sqn: &[u8; SQN_SIZE],
        amf: &[u8; AMF_SIZE],
    ) -> [u8; MAC_SIZE] {
        let out1 = self.out1(rand, sqn, amf);
        let mut mac = [0u8; MAC_SIZE];
        mac.copy_from_slice(&out1[8..16]);
        mac
    }

    /// f2: user response RES.
    pub fn f2(&self, rand: &[u8; RAND_SIZE]) -> [u8; RES_SIZE] {
        let out2 = self.out_n(rand, 2);
        let mut res = [0u8; RES_SIZE];
        res.copy_from_slice(&out2[8..16]);
        res
    }

    /// f3: cipher key CK.
    pub fn f3(&self, rand: &[u8; RAND_SIZE]) -> [u8; CK_SIZE] {
        self.out_n(rand, 3)
    }

    /// f4: integrity key IK.
    pub fn f4(&self, rand: &[u8; RAND_SIZE]) -> [u8; CK_SIZE] {
        self.out_n(rand, 4)
    }

    /// f5: anonymity key AK.
    pub fn f5(&self, rand: &[u8; RAND_SIZE]) -> [u8; AK_SIZE] {
        let out2 = self.out_n(rand, 2);
        let mut ak = [0u8; AK_SIZE];
        ak.copy_from_slice(&out2[0..6]);
        ak
    }

    /// f5*: anonymity key for re-synchronization.
    pub fn f5_star(&self, rand: &[u8; RAND_SIZE]) -> [u8; AK_SIZE] {
        let out5 = self.out_n(rand, 5);
        let mut ak = [0u8; AK_SIZE];
        ak.copy_from_slice(&out5[0..6]);
        ak
    }

    /// Compute (MAC-A, RES, CK, IK, AK) in one call.
    #[allow(clippy::type_complexity)]
    pub fn compute_all(
        &self,
        rand: &[u8; RAND_SIZE],
        sqn: &[u8; SQN_SIZE],
        amf: &[u8; AMF_SIZE],
    ) -> (
        [u8; MAC_SIZE],
        [u8; RES_SIZE],
        [u8; CK_SIZE],
        [u8; CK_SIZE],
        [u8; AK_SIZE],
    ) {
        (
            self.f1(rand, sqn, amf),
            self.f2(rand),
            self.f3(rand),
            self.f4(rand),
            self.f5(rand),
        )
    }

    /// Build the AUTS parameter answering an authentication request whose
    /// SQN fell outside the acceptance window.
    ///
    /// AUTS = (SQNms xor AK*) || MAC-S, with MAC-S computed over the UE's
    /// own SQN and the all-zero resync AMF (TS 33.102 6.3.3).
    pub fn generate_auts(&self, sqn_ms: &[u8; SQN_SIZE], rand: &[u8; RAND_SIZE]) -> [u8; AUTS_SIZE] {
        let amf_resync = [0u8; AMF_SIZE];
        let ak = self.f5_star(rand);
        let mac_s = self.f1_star(rand, sqn_ms, &amf_resync);

        let mut auts = [0u8; AUTS_SIZE];
        for i in 0..SQN_SIZE {
            auts[i] = sqn_ms[i] ^ ak[i];
        }
        auts[SQN_SIZE..].copy_from_slice(&mac_s);
        auts
    }
}

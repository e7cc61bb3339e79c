//! NAS COUNT (TS 24.501 4.4.3.1).
//!
//! A NAS COUNT is a 24-bit value: 16-bit overflow counter plus the
//! 8-bit sequence number carried on the wire. The receiver reconstructs
//! the full count from the received sequence number, bumping the
//! overflow counter when the sequence number wraps.

/// Uplink or downlink NAS COUNT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NasCount {
    /// Overflow counter, incremented on sequence-number wraparound
    pub overflow: u16,
    /// Sequence number, the low byte carried in the secured header
    pub sqn: u8,
}

impl NasCount {
    pub fn new(overflow: u16, sqn: u8) -> Self {
        Self { overflow, sqn }
    }

    /// Full 24-bit count as used by the integrity and ciphering inputs.
    pub fn as_u32(&self) -> u32 {
        ((self.overflow as u32) << 8) | (self.sqn as u32)
    }

    /// Advance the count by one after a secured encode.
    pub fn increment(&mut self) {
        let (sqn, wrapped) = self.sqn.overflowing_add(1);
        self.sqn = sqn;
        if wrapped {
            self.overflow = self.overflow.wrapping_add(1);
        }
    }

    /// Adopt a received sequence number. A received value below the last
    /// seen one means the 8-bit counter wrapped, so the overflow counter
    /// advances.
    pub fn adopt_received(&mut self, received_sqn: u8) {
        if self.sqn > received_sqn {
            self.overflow = self.overflow.wrapping_add(1);
        }
        self.sqn = received_sqn;
    }

    /// Reset to zero, used when a new security context is taken into use.
    pub fn reset(&mut self) {
        self.overflow = 0;
        self.sqn = 0;
    }
}

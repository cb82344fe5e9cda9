//! Fletcher-16 over 8-bit modular sums.
//!
//! Both running sums wrap at 256 (not the textbook 255), matching the
//! checksum carried on the wire.

/// Streaming Fletcher-16 state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Fletcher16 {
    sum1: u8,
    sum2: u8,
}

impl Fletcher16 {
    pub const fn new() -> Self {
        Self { sum1: 0, sum2: 0 }
    }

    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.sum1 = self.sum1.wrapping_add(byte);
        self.sum2 = self.sum2.wrapping_add(self.sum1);
    }

    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.update(byte);
        }
    }

    /// The two running sums, in wire order `(sum1, sum2)`.
    pub fn sums(&self) -> (u8, u8) {
        (self.sum1, self.sum2)
    }

    /// Packed checksum: `sum2` in the high byte, `sum1` in the low byte.
    pub fn value(&self) -> u16 {
        u16::from_le_bytes([self.sum1, self.sum2])
    }
}

/// Checksum of a complete buffer.
pub fn fletcher16(bytes: &[u8]) -> u16 {
    let mut sum = Fletcher16::new();
    sum.update_slice(bytes);
    sum.value()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        let mut sum = Fletcher16::new();
        sum.update_slice(&[1, 2, 3, 4, 5]);
        assert_eq!(sum.sums(), (0x0F, 0x23));
        assert_eq!(sum.value(), 0x230F);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(fletcher16(&[]), 0);
    }

    #[test]
    fn sums_wrap_at_256() {
        // sum1: 0xFF, 0xFE; sum2: 0xFF, 0xFD
        assert_eq!(fletcher16(&[0xFF, 0xFF]), 0xFDFE);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let data: Vec<u8> = (0..=255u8).collect();
        let mut sum = Fletcher16::new();
        for chunk in data.chunks(7) {
            sum.update_slice(chunk);
        }
        assert_eq!(sum.value(), fletcher16(&data));
    }

    #[test]
    fn order_sensitive() {
        assert_ne!(fletcher16(&[1, 2]), fletcher16(&[2, 1]));
    }
}

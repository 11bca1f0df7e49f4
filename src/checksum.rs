use crc::{Crc, Digest, CRC_8_SMBUS};

/// CRC-8 with polynomial 0x07, zero init, no reflection and no final XOR.
static CRC8: Crc<u8> = Crc::<u8>::new(&CRC_8_SMBUS);

/// Calculates the 8-bit CRC trailing every request and response frame.
pub struct Checksum {
    digest: Digest<'static, u8>,
}

impl Checksum {
    /// Creates a new `Checksum` instance, initialized to 0.
    #[inline]
    pub fn new() -> Checksum {
        Checksum {
            digest: CRC8.digest(),
        }
    }

    /// Includes a slice of bytes in the checksum calculation.
    #[inline]
    pub fn push_slice(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    /// Returns the calculated checksum value.
    #[inline]
    pub fn checksum(self) -> u8 {
        self.digest.finalize()
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot CRC-8 over `data`.
#[inline]
pub fn crc8(data: &[u8]) -> u8 {
    CRC8.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crc8_matches_request_vectors() {
        assert_eq!(crc8(&[0x5D, 0x20, 0, 0, 0]), 0xC0);
        assert_eq!(crc8(&[0x5D, 0x31, 0, 0, 0]), 0xB1);
        assert_eq!(crc8(&[0x5D, 0x52, 0, 0, 0]), 0xDE);
        assert_eq!(crc8(&[0x5D, 0x73, 0, 0, 0]), 0x06);
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut checksum = Checksum::new();
        checksum.push_slice(&[0x5D]);
        checksum.push_slice(&[0xCE, 0x01, 0x72, 0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(checksum.checksum(), 0x7C);
    }

    #[test]
    fn empty_input_is_zero() {
        assert_eq!(crc8(&[]), 0x00);
    }
}

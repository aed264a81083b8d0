use alloc::vec;
use alloc::vec::Vec;

/// Fixed-length bit set, bit `n` at byte `n / 8`, LSB first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bitmap {
    bytes: Vec<u8>,
    len_bits: usize,
}

impl Bitmap {
    /// All-zero bitmap covering `len_bits` bits.
    pub fn new(len_bits: usize) -> Self {
        Self {
            bytes: vec![0u8; len_bits.div_ceil(8)],
            len_bits,
        }
    }

    pub fn len_bits(&self) -> usize {
        self.len_bits
    }

    /// Find first zero bit in `[start_bit, len_bits)`.
    ///
    /// Skips whole `0xFF` bytes, then scans bit by bit.
    pub fn first_zero(&self, start_bit: usize) -> Option<usize> {
        let mut bit = start_bit;
        while bit < self.len_bits {
            let byte_idx = bit / 8;
            let bit_in_byte = bit % 8;
            let byte = self.bytes[byte_idx];

            if bit_in_byte == 0 && byte == 0xFF {
                bit += 8;
                continue;
            }

            for local_bit in bit_in_byte..8 {
                let candidate = byte_idx * 8 + local_bit;
                if candidate >= self.len_bits {
                    return None;
                }
                if byte & (1 << local_bit) == 0 {
                    return Some(candidate);
                }
            }
            bit = (byte_idx + 1) * 8;
        }
        None
    }

    /// Set `bit`; returns the previous value.
    pub fn set(&mut self, bit: usize) -> bool {
        let was = self.get(bit);
        self.bytes[bit / 8] |= 1 << (bit % 8);
        was
    }

    /// Clear `bit`; returns the previous value.
    pub fn clear(&mut self, bit: usize) -> bool {
        let was = self.get(bit);
        self.bytes[bit / 8] &= !(1 << (bit % 8));
        was
    }

    pub fn get(&self, bit: usize) -> bool {
        self.bytes[bit / 8] & (1 << (bit % 8)) != 0
    }

    pub fn count_zeros(&self) -> usize {
        let ones: usize = self.bytes.iter().map(|b| b.count_ones() as usize).sum();
        // Padding bits past len_bits are never set.
        self.len_bits - ones
    }
}

//! Contract ABI words
//!
//! Every static value occupies one 32-byte word: numbers right-aligned
//! big-endian, fixed byte strings left-aligned. [`Packed`] builds the
//! tightly packed form hashed into registry identifiers.

use alloy_primitives::{keccak256, Address, B256, U256};

pub const WORD: usize = 32;

/// Right-align a number in a word
pub fn uint_word(value: U256) -> [u8; WORD] {
    value.to_be_bytes::<WORD>()
}

/// Left-align up to 32 bytes in a word
pub fn left_aligned_word(bytes: &[u8]) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    let n = bytes.len().min(WORD);
    word[..n].copy_from_slice(&bytes[..n]);
    word
}

pub fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(address.as_slice());
    word
}

pub fn bool_word(value: bool) -> [u8; WORD] {
    uint_word(U256::from(value as u8))
}

/// Borrow the `index`-th word of `data`, `None` when out of range
pub fn word_at(data: &[u8], index: usize) -> Option<&[u8]> {
    let start = index.checked_mul(WORD)?;
    let end = start.checked_add(WORD)?;
    data.get(start..end)
}

/// `abi.encodePacked` builder: values are concatenated at their natural width
#[derive(Debug, Default)]
pub struct Packed {
    buf: Vec<u8>,
}

impl Packed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u16(mut self, value: u16) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u32(mut self, value: u32) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn u64(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn address(mut self, value: &Address) -> Self {
        self.buf.extend_from_slice(value.as_slice());
        self
    }

    pub fn bool(mut self, value: bool) -> Self {
        self.buf.push(value as u8);
        self
    }

    pub fn bytes(mut self, value: &[u8]) -> Self {
        self.buf.extend_from_slice(value);
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub fn keccak(self) -> B256 {
        keccak256(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_alignment() {
        assert_eq!(uint_word(U256::from(1))[31], 1);
        assert_eq!(&left_aligned_word(b"ab")[..2], b"ab");
        assert!(left_aligned_word(b"ab")[2..].iter().all(|b| *b == 0));
        assert_eq!(&address_word(&Address::repeat_byte(0x11))[12..], &[0x11; 20]);
        assert_eq!(bool_word(true)[31], 1);
    }

    #[test]
    fn test_word_at_bounds() {
        let data = [uint_word(U256::from(7)), uint_word(U256::from(9))].concat();
        assert_eq!(word_at(&data, 1).map(U256::from_be_slice), Some(U256::from(9)));
        assert_eq!(word_at(&data, 2), None);
        assert_eq!(word_at(&data[..40], 1), None);
    }

    #[test]
    fn test_word_at_huge_index_is_none() {
        let data = [0u8; 64];
        assert_eq!(word_at(&data, usize::MAX), None);
        assert_eq!(word_at(&data, usize::MAX / WORD), None);
        assert_eq!(word_at(&data, (u64::MAX as usize - 15) / WORD), None);
    }

    #[test]
    fn test_packed_widths() {
        let packed = Packed::new().u16(1).address(&Address::ZERO).bool(true).u32(0).finish();
        assert_eq!(packed.len(), 2 + 20 + 1 + 4);
        assert_eq!(packed[1], 1);
        assert_eq!(packed[22], 1);
    }
}

//! Locates storage words per Solidity's storage-layout rules.
//!
//! A mapping entry lives at `keccak256(pad32(key) ++ pad32(base))`, key
//! first, base slot second. Both orders hash to equally plausible 32-byte
//! values, so a swapped implementation fails only at runtime against a real
//! contract; the fixed-vector tests below pin the correct order.

use ethereum_types::{Address, H256, U256};
use keccak_hash::keccak;
use thiserror::Error;

/// The 256-bit key identifying one storage word of a contract.
pub type StorageSlot = U256;

/// An error type for values that do not fit Solidity's short in-place
/// storage form.
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
#[error("value of {len} bytes exceeds the 31-byte short-form limit")]
pub struct UnsupportedLengthError {
    /// Byte length of the offending value.
    pub len: usize,
}

fn hash_two_words(first: U256, second: U256) -> StorageSlot {
    let mut buf = [0u8; 64];
    first.to_big_endian(&mut buf[..32]);
    second.to_big_endian(&mut buf[32..]);
    U256::from_big_endian(keccak(buf).as_bytes())
}

/// Slot of `mapping(uint256 => ...)` entry `key` rooted at `base`.
pub fn mapping_slot_uint(base: StorageSlot, key: U256) -> StorageSlot {
    hash_two_words(key, base)
}

/// Slot of `mapping(address => ...)` entry `key` rooted at `base`. The
/// address is left-padded to a full word, as the ABI does.
pub fn mapping_slot_address(base: StorageSlot, key: Address) -> StorageSlot {
    hash_two_words(U256::from_big_endian(key.as_bytes()), base)
}

/// Slot of `mapping(bytes32 => ...)` entry `key` rooted at `base`.
pub fn mapping_slot_b256(base: StorageSlot, key: H256) -> StorageSlot {
    hash_two_words(U256::from_big_endian(key.as_bytes()), base)
}

/// Slot of element `index` of the dynamic array whose length counter sits
/// at `base`, with each element occupying `item_word_size` consecutive
/// words.
///
/// The element region starts at `keccak256(pad32(base))`; the offset wraps
/// modulo 2^256 like the EVM's own arithmetic.
pub fn dynamic_array_element_slot(
    base: StorageSlot,
    index: u64,
    item_word_size: u64,
) -> StorageSlot {
    let mut buf = [0u8; 32];
    base.to_big_endian(&mut buf);
    let region = U256::from_big_endian(keccak(buf).as_bytes());
    let (slot, _) = region.overflowing_add(U256::from(index) * U256::from(item_word_size));
    slot
}

/// Packs a string of at most 31 bytes into Solidity's short-string storage
/// word: bytes left-aligned, `2 * len` in the low byte.
pub fn packed_short_string(value: &str) -> Result<U256, UnsupportedLengthError> {
    packed_short_bytes(value.as_bytes())
}

/// Packs a byte string of at most 31 bytes into the short in-place form
/// shared by `string` and `bytes` storage variables.
pub fn packed_short_bytes(value: &[u8]) -> Result<U256, UnsupportedLengthError> {
    if value.len() > 31 {
        return Err(UnsupportedLengthError { len: value.len() });
    }
    let mut word = [0u8; 32];
    word[..value.len()].copy_from_slice(value);
    word[31] = (value.len() * 2) as u8;
    Ok(U256::from_big_endian(&word))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    fn slot(bytes: [u8; 32]) -> StorageSlot {
        U256::from_big_endian(&bytes)
    }

    // Reference vectors: keccak256 of the 64-byte (key ++ base) buffer.
    #[test]
    fn mapping_slot_uint_vectors() {
        let cases = [
            (
                0u64,
                U256::zero(),
                hex!("ad3228b676f7d3cd4284a5443f17f1962b36e491b30a40b2405849e597ba5fb5"),
            ),
            (
                2,
                U256::from(100),
                hex!("7673bcbb3401a7cbae68f81d40eea2cf35afdaf7ecd016ebf3f02857fcc1260a"),
            ),
            (
                7,
                U256::from(42),
                hex!("c4250a0f26818bb2f4c50553605e6aa5374a022de55e294b0c5f6716bcaddbf8"),
            ),
        ];
        for (base, key, expected) in cases {
            assert_eq!(
                mapping_slot_uint(U256::from(base), key),
                slot(expected),
                "base {base}"
            );
        }
    }

    #[test]
    fn mapping_slot_address_vector() {
        let key = Address::from(hex!("ec568fffba86c094cf06b22134b23074dfe2252c"));
        assert_eq!(
            mapping_slot_address(U256::from(4), key),
            slot(hex!(
                "cc5b314710b1a259cf881579ee8192f8ef2ad2ab463cc8e46b7ff381f860c07c"
            ))
        );
    }

    #[test]
    fn mapping_slot_b256_vector() {
        let key = H256::from([0xab; 32]);
        assert_eq!(
            mapping_slot_b256(U256::from(9), key),
            slot(hex!(
                "0375108530fa8bce9d89c1a5accf7f0b8603539301a16f78407c4911e6960622"
            ))
        );
    }

    #[test]
    fn key_and_base_order_is_not_symmetric() {
        assert_ne!(
            mapping_slot_uint(U256::from(1), U256::from(2)),
            mapping_slot_uint(U256::from(2), U256::from(1)),
        );
    }

    #[test]
    fn array_element_slots() {
        let region = slot(hex!(
            "c2575a0e9e593c00f959f8c92f12db2869c3395a3b0502d05e2516446f71f85b"
        ));
        assert_eq!(dynamic_array_element_slot(U256::from(3), 0, 4), region);
        assert_eq!(
            dynamic_array_element_slot(U256::from(3), 2, 4),
            region + U256::from(8)
        );
    }

    #[test]
    fn short_string_packing() {
        assert_eq!(
            packed_short_string("execute()").unwrap(),
            slot(hex!(
                "6578656375746528290000000000000000000000000000000000000000000012"
            ))
        );
        assert_eq!(
            packed_short_string("MKR").unwrap(),
            slot(hex!(
                "4d4b520000000000000000000000000000000000000000000000000000000006"
            ))
        );
        assert_eq!(packed_short_string("").unwrap(), U256::zero());
    }

    #[test]
    fn short_string_rejects_32_bytes() {
        let long = "a".repeat(32);
        assert_eq!(
            packed_short_string(&long),
            Err(UnsupportedLengthError { len: 32 })
        );
        assert_eq!(
            packed_short_bytes(&[0u8; 40]),
            Err(UnsupportedLengthError { len: 40 })
        );
    }
}

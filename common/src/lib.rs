use ethereum_types::{H256, U256};

/// The storage word a Solidity `bool` in the `true` state occupies.
pub const TRUE_WORD: H256 = H256([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    1,
]);

/// Renders a 256-bit word as a decimal string.
///
/// Snapshots and diff reports carry large words this way so that JSON
/// consumers never round them through a float.
pub fn word_to_decimal(word: U256) -> String {
    word.to_string()
}

/// Parses a decimal string produced by [`word_to_decimal`].
pub fn decimal_to_word(s: &str) -> Option<U256> {
    U256::from_dec_str(s).ok()
}

/// Converts a word to its 32-byte big-endian storage representation.
pub fn word_to_h256(word: U256) -> H256 {
    let mut out = H256::zero();
    word.to_big_endian(out.as_bytes_mut());
    out
}

/// Reads a 32-byte storage word back into a [`U256`].
pub fn h256_to_word(h: H256) -> U256 {
    U256::from_big_endian(h.as_bytes())
}

#[test]
fn test_true_word() {
    assert_eq!(h256_to_word(TRUE_WORD), U256::one());
}

#[test]
fn test_decimal_round_trip() {
    let word = U256::MAX - U256::from(5);
    assert_eq!(decimal_to_word(&word_to_decimal(word)), Some(word));
    assert_eq!(decimal_to_word("not a number"), None);
}

#[test]
fn test_word_h256_round_trip() {
    let word = U256::from(0x1234_5678_u64);
    assert_eq!(h256_to_word(word_to_h256(word)), word);
    assert_eq!(word_to_h256(U256::one()), H256::from_low_u64_be(1));
}

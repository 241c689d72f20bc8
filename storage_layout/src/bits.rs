//! Get/set operations over bit ranges of a 256-bit word, plus bitmap
//! helpers.
//!
//! The two range operations deliberately disagree on their upper bound:
//! [`get_bits_inclusive`] treats `end` as the last bit read, while
//! [`set_bits_half_open`] treats it as one past the last bit written.
//! Packed-layout tooling in the wild relies on the exact masks each
//! produces, so the pair is kept as-is rather than unified. [`PackedField`]
//! is the safe bridge: it owns one inclusive range and translates for the
//! setter.

use ethereum_types::U256;
use thiserror::Error;

/// Stores the result of bit-range operations. Returns a [`BitRangeError`]
/// upon failure.
pub type BitRangeResult<T> = Result<T, BitRangeError>;

/// An error type for bit-range construction and reads.
#[derive(Clone, Copy, Debug, Eq, Error, Hash, PartialEq)]
pub enum BitRangeError {
    /// The range start sits past its end, which is a usage error rather
    /// than something to silently normalize.
    #[error("bit range start ({start}) exceeds end ({end})")]
    StartAfterEnd {
        /// Requested start bit.
        start: u16,
        /// Requested end bit.
        end: u16,
    },

    /// The range end does not fit the 256-bit word the operation targets.
    #[error("bit range end ({end}) exceeds the width of a 256-bit word")]
    EndOutOfBounds {
        /// Requested end bit.
        end: u16,
    },
}

/// A bit range within a 256-bit word, inclusive on both ends.
///
/// `end` may be at most 256: the extra position exists solely so that
/// [`set_bits_half_open`], whose upper bound is exclusive, can cover bit
/// 255. [`get_bits_inclusive`] rejects ranges ending past 255.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct BitRange {
    start: u16,
    end: u16,
}

impl BitRange {
    /// Validates and builds a range. `start > end` and `end > 256` are
    /// rejected.
    pub fn new(start: u16, end: u16) -> BitRangeResult<Self> {
        if start > end {
            return Err(BitRangeError::StartAfterEnd { start, end });
        }
        if end > 256 {
            return Err(BitRangeError::EndOutOfBounds { end });
        }
        Ok(Self { start, end })
    }

    /// First bit of the range.
    pub const fn start(self) -> u16 {
        self.start
    }

    /// Last bit of the range (inclusive reading) or one past it (half-open
    /// reading); which one applies is the operation's contract, not the
    /// range's.
    pub const fn end(self) -> u16 {
        self.end
    }
}

/// A mask with the low `width` bits set.
fn low_mask(width: u16) -> U256 {
    match width {
        0 => U256::zero(),
        256.. => U256::MAX,
        w => (U256::one() << w) - 1,
    }
}

/// Extracts `value[range.start() ..= range.end()]`, shifted down to the low
/// bits.
///
/// When `end` reaches past the minimal binary representation of `value`, it
/// is clamped down to `bit_length(value) - 1` before the mask is computed.
/// The clamp can collapse the range to nothing (clamped end below `start`),
/// in which case the result is zero, consistent with every bit there being
/// zero. Ranges ending past bit 255 are rejected.
pub fn get_bits_inclusive(value: U256, range: BitRange) -> BitRangeResult<U256> {
    if range.end() > 255 {
        return Err(BitRangeError::EndOutOfBounds { end: range.end() });
    }
    let bit_len = value.bits() as u16;
    let end = if bit_len > 0 && range.end() >= bit_len {
        bit_len - 1
    } else {
        range.end()
    };
    if end < range.start() {
        return Ok(U256::zero());
    }
    let width = end - range.start() + 1;
    Ok((value >> range.start()) & low_mask(width))
}

/// Replaces `base[range.start() .. range.end())` with `replacement`. The
/// upper bound is exclusive.
///
/// Bits of `replacement` beyond the range width are not masked off: they
/// bleed into the word above the range. Callers own keeping replacements
/// within the field width.
pub fn set_bits_half_open(base: U256, range: BitRange, replacement: U256) -> U256 {
    if range.start() >= 256 {
        return base;
    }
    let width = range.end() - range.start();
    let mask = low_mask(width) << range.start();
    (base & !mask) | (replacement << range.start())
}

/// Ascending positions of the set bits of `bitmap`.
///
/// Walks the word with a `bit & 1` test and a right shift, stopping as soon
/// as the remainder is zero. [`indexes_to_bitmap`] is its inverse.
pub fn bitmap_to_indexes(bitmap: U256) -> Vec<u8> {
    let mut indexes = Vec::new();
    let mut rest = bitmap;
    let mut position = 0u16;
    while !rest.is_zero() {
        if rest & U256::one() == U256::one() {
            indexes.push(position as u8);
        }
        rest = rest >> 1;
        position += 1;
    }
    indexes
}

/// Rebuilds a bitmap from set-bit positions.
pub fn indexes_to_bitmap(indexes: impl IntoIterator<Item = u8>) -> U256 {
    indexes
        .into_iter()
        .fold(U256::zero(), |acc, i| acc | (U256::one() << i))
}

/// One named field of a packed storage word, defined by an inclusive bit
/// range with `end <= 255`.
///
/// `get` reads with the inclusive convention and `set` writes the same bits
/// through the half-open setter, so a field defined once cannot suffer the
/// off-by-one the raw operations invite.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct PackedField {
    start: u16,
    end: u16,
}

impl PackedField {
    /// Defines a field over `[start, end]` inclusive. Bounds are static
    /// layout knowledge, so violations abort at construction.
    pub const fn new(start: u16, end: u16) -> Self {
        assert!(start <= end && end <= 255);
        Self { start, end }
    }

    /// Reads the field out of `word`.
    pub fn get(self, word: U256) -> U256 {
        let range = BitRange {
            start: self.start,
            end: self.end,
        };
        // Infallible: construction capped `end` at 255.
        get_bits_inclusive(word, range).unwrap_or_default()
    }

    /// Writes `value` into the field of `word`, leaving every other bit of
    /// the word untouched. `value` must fit the field width.
    pub fn set(self, word: U256, value: U256) -> U256 {
        let range = BitRange {
            start: self.start,
            end: self.end + 1,
        };
        set_bits_half_open(word, range, value)
    }

    /// Field width in bits.
    pub const fn width(self) -> u16 {
        self.end - self.start + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: u16, end: u16) -> BitRange {
        BitRange::new(start, end).unwrap()
    }

    #[test]
    fn rejects_inverted_range() {
        assert_eq!(
            BitRange::new(5, 3),
            Err(BitRangeError::StartAfterEnd { start: 5, end: 3 })
        );
        assert_eq!(
            BitRange::new(0, 257),
            Err(BitRangeError::EndOutOfBounds { end: 257 })
        );
    }

    #[test]
    fn getter_rejects_end_past_255() {
        assert_eq!(
            get_bits_inclusive(U256::MAX, range(0, 256)),
            Err(BitRangeError::EndOutOfBounds { end: 256 })
        );
    }

    #[test]
    fn get_set_worked_example() {
        // setBits(0b0111, [1, 3), 0) == 0b0001; getBits(0b0001, [0, 3]) == 1.
        let set = set_bits_half_open(U256::from(0b0111), range(1, 3), U256::zero());
        assert_eq!(set, U256::from(0b0001));
        assert_eq!(
            get_bits_inclusive(set, range(0, 3)).unwrap(),
            U256::one()
        );
    }

    #[test]
    fn getter_clamps_end_to_value_bit_length() {
        // 0b1011 has bit length 4; an end of 200 clamps to 3.
        let value = U256::from(0b1011);
        assert_eq!(
            get_bits_inclusive(value, range(1, 200)).unwrap(),
            U256::from(0b101)
        );
        // Clamp collapsing the range below `start` reads zero.
        assert_eq!(
            get_bits_inclusive(value, range(10, 200)).unwrap(),
            U256::zero()
        );
        assert_eq!(
            get_bits_inclusive(U256::zero(), range(0, 255)).unwrap(),
            U256::zero()
        );
    }

    #[test]
    fn setter_upper_bound_is_exclusive() {
        // Writing ones over [0, 8) touches exactly the low byte.
        let base = U256::MAX;
        let out = set_bits_half_open(base, range(0, 8), U256::zero());
        assert_eq!(out, U256::MAX - U256::from(0xffu64));
    }

    #[test]
    fn setter_covers_top_bit_via_end_256() {
        let out = set_bits_half_open(U256::zero(), range(255, 256), U256::one());
        assert_eq!(out, U256::one() << 255);
    }

    #[test]
    fn setter_lets_oversized_replacement_bleed() {
        // An 8-bit field written with a 9-bit value corrupts bit 8. Kept
        // behavior; PackedField callers must size their values.
        let out = set_bits_half_open(U256::zero(), range(0, 8), U256::from(0x1ffu64));
        assert_eq!(out, U256::from(0x1ffu64));
    }

    #[test]
    fn set_then_get_round_trips_truncated() {
        for (start, end) in [(0u16, 1u16), (3, 11), (40, 104), (200, 256)] {
            let replacement = U256::from(0x5a5a_5a5a_5a5au64);
            let width = end - start;
            let written = set_bits_half_open(U256::zero(), range(start, end), replacement);
            let read =
                get_bits_inclusive(written, range(start, end - 1)).unwrap();
            let truncated = if width >= 256 {
                replacement
            } else {
                replacement & ((U256::one() << width) - 1)
            };
            assert_eq!(read, truncated, "range [{start}, {end})");
        }
    }

    #[test]
    fn bitmap_round_trip() {
        for bitmap in [
            U256::zero(),
            U256::one(),
            U256::from(0b1010_0110),
            U256::MAX,
            U256::one() << 255,
        ] {
            let indexes = bitmap_to_indexes(bitmap);
            assert!(indexes.windows(2).all(|w| w[0] < w[1]));
            assert_eq!(indexes_to_bitmap(indexes), bitmap);
        }
    }

    #[test]
    fn packed_field_isolates_its_bits() {
        const STATE: PackedField = PackedField::new(168, 175);
        const QUEUED_AT: PackedField = PackedField::new(216, 255);

        let word = U256::MAX;
        let rewritten = STATE.set(word, U256::from(2));
        assert_eq!(STATE.get(rewritten), U256::from(2));
        // Neighbouring bits survive.
        assert_eq!(QUEUED_AT.get(rewritten), QUEUED_AT.get(word));
        assert_eq!(
            rewritten | (U256::from(0xff) << 168),
            word,
            "only the state byte changed"
        );

        let stamped = QUEUED_AT.set(rewritten, U256::from(1_699_990_000u64));
        assert_eq!(QUEUED_AT.get(stamped), U256::from(1_699_990_000u64));
        assert_eq!(STATE.get(stamped), U256::from(2));
    }
}

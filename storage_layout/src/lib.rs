//! Bit-level codecs and storage-slot derivation for contracts that pack
//! several fields into single 256-bit storage words.
//!
//! Two layers live here:
//! - [`bits`] reads and writes sub-word bit ranges and converts between
//!   bitmaps and index lists.
//! - [`slots`] locates the storage word a mapping entry, dynamic-array
//!   element or short string occupies, following Solidity's storage-layout
//!   rules.
//!
//! Both are pure functions over caller-supplied words. Nothing in this crate
//! talks to a node; callers read the words, we tell them where to look and
//! how to take them apart.

#![deny(rustdoc::broken_intra_doc_links)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]

pub mod bits;
pub mod slots;

pub use bits::{
    bitmap_to_indexes, get_bits_inclusive, indexes_to_bitmap, set_bits_half_open, BitRange,
    BitRangeError, PackedField,
};
pub use slots::{
    dynamic_array_element_slot, mapping_slot_address, mapping_slot_b256, mapping_slot_uint,
    packed_short_bytes, packed_short_string, StorageSlot, UnsupportedLengthError,
};

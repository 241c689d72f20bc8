//! RLP encodings consumed by on-chain proof verifiers.
//!
//! A contract verifying a storage proof on another chain needs two byte
//! strings whose shape is a bit-exact contract: the RLP block header (whose
//! keccak must equal the trusted block hash) and the proof nodes nested as
//! a list of lists. Neither format tolerates a missing, reordered or
//! re-wrapped field, and the failure mode is a hash that silently never
//! matches rather than a crash. Both encoders live here behind fixed-vector
//! tests.

#![deny(rustdoc::broken_intra_doc_links)]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]

mod header;
mod proof;

pub use header::{encode_block_header, header_hash, BlockHeader};
pub use proof::{
    encode_account_proof, encode_proof_nodes, encode_storage_proofs, AccountProof, StorageProof,
};

use thiserror::Error;

/// Stores the result of proof encoding operations. Returns a
/// [`ProofCodecError`] upon failure.
pub type ProofCodecResult<T> = Result<T, ProofCodecError>;

/// An error type for proof and header encoding.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum ProofCodecError {
    /// The header lacks a field the fixed 17-field post-merge shape
    /// requires. Encoding a shorter list would produce a header whose hash
    /// can never match, so the gap is rejected instead.
    #[error("header is missing post-merge field `{0}`; refusing to encode a short field list")]
    PreMergeHeader(&'static str),

    /// A proof node is not itself a well-formed RLP list.
    #[error("proof node {index} is not a well-formed RLP list: {reason}")]
    MalformedNode {
        /// Position of the node in the supplied proof.
        index: usize,
        /// Decoder diagnostic.
        reason: String,
    },
}

/// Serde helpers for `0x`-prefixed hex byte strings.
pub(crate) mod hex_prefixed {
    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(data)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(D::Error::custom)
    }
}

/// Serde helpers for sequences of `0x`-prefixed hex byte strings, the shape
/// `eth_getProof` returns proof nodes in.
pub(crate) mod hex_prefixed_seq {
    use serde::{de::Error as _, Deserialize as _, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(data.iter().map(|node| format!("0x{}", hex::encode(node))))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Vec<u8>>, D::Error> {
        let strings = Vec::<String>::deserialize(deserializer)?;
        strings
            .into_iter()
            .map(|s| hex::decode(s.strip_prefix("0x").unwrap_or(&s)).map_err(D::Error::custom))
            .collect()
    }
}

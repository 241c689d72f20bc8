use ethereum_types::{Address, Bloom, H256, H64, U256};
use keccak_hash::keccak;
use rlp::RlpStream;
use serde::{Deserialize, Serialize};

use crate::{ProofCodecError, ProofCodecResult};

/// A block header in the fixed 17-field post-merge shape on-chain
/// verifiers hash.
///
/// The difficulty slot is not represented: post-merge it is always encoded
/// empty, and a caller-supplied value could only make the hash wrong.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Hash of the parent block.
    pub parent_hash: H256,
    /// Hash of the (empty, post-merge) ommers list.
    pub ommers_hash: H256,
    /// Fee recipient.
    pub miner: Address,
    /// Root of the state trie after this block.
    pub state_root: H256,
    /// Root of the transactions trie.
    pub transactions_root: H256,
    /// Root of the receipts trie.
    pub receipts_root: H256,
    /// Aggregate log bloom.
    pub logs_bloom: Bloom,
    /// Block number.
    pub number: u64,
    /// Gas limit.
    pub gas_limit: U256,
    /// Gas used.
    pub gas_used: U256,
    /// Timestamp in seconds.
    pub timestamp: u64,
    /// Arbitrary extra data.
    #[serde(with = "crate::hex_prefixed")]
    pub extra_data: Vec<u8>,
    /// Post-merge randomness beacon (`prevRandao`).
    pub mix_hash: H256,
    /// Proof-of-work nonce, zero post-merge but still part of the hash.
    pub nonce: H64,
    /// EIP-1559 base fee. `None` marks a pre-merge header, which is
    /// rejected at encoding time.
    pub base_fee_per_gas: Option<U256>,
    /// EIP-4895 withdrawals root. `None` marks a pre-Shanghai header,
    /// rejected at encoding time.
    pub withdrawals_root: Option<H256>,
}

/// RLP-encodes `header` in verifier field order.
///
/// Field order and count are the contract: a reordered or missing field
/// yields a header whose keccak simply never matches the on-chain block
/// hash. Headers predating the base-fee or withdrawals forks are rejected
/// with [`ProofCodecError::PreMergeHeader`] rather than encoded short.
pub fn encode_block_header(header: &BlockHeader) -> ProofCodecResult<Vec<u8>> {
    let base_fee = header
        .base_fee_per_gas
        .ok_or(ProofCodecError::PreMergeHeader("baseFeePerGas"))?;
    let withdrawals_root = header
        .withdrawals_root
        .ok_or(ProofCodecError::PreMergeHeader("withdrawalsRoot"))?;

    let mut stream = RlpStream::new_list(17);
    stream.append(&header.parent_hash);
    stream.append(&header.ommers_hash);
    stream.append(&header.miner);
    stream.append(&header.state_root);
    stream.append(&header.transactions_root);
    stream.append(&header.receipts_root);
    stream.append(&header.logs_bloom);
    stream.append_empty_data(); // difficulty, hardcoded empty post-merge
    stream.append(&header.number);
    stream.append(&header.gas_limit);
    stream.append(&header.gas_used);
    stream.append(&header.timestamp);
    stream.append(&header.extra_data);
    stream.append(&header.mix_hash);
    stream.append(&header.nonce);
    stream.append(&base_fee);
    stream.append(&withdrawals_root);
    Ok(stream.out().to_vec())
}

/// Keccak of the encoded header; must equal the block hash the remote
/// verifier trusts.
pub fn header_hash(header: &BlockHeader) -> ProofCodecResult<H256> {
    Ok(keccak(encode_block_header(header)?))
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            parent_hash: H256::from_low_u64_be(0x11),
            ommers_hash: H256::from(hex!(
                "1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347"
            )),
            miner: Address::from(hex!("2222222222222222222222222222222222222222")),
            state_root: H256::from_low_u64_be(0x33),
            transactions_root: H256::from_low_u64_be(0x44),
            receipts_root: H256::from_low_u64_be(0x55),
            logs_bloom: Bloom::zero(),
            number: 18_500_000,
            gas_limit: U256::from(30_000_000u64),
            gas_used: U256::from(12_345_678u64),
            timestamp: 1_700_000_000,
            extra_data: hex!("d883010d05846765746888676f312e32312e33856c696e7578").to_vec(),
            mix_hash: H256::from_low_u64_be(0x66),
            nonce: H64::zero(),
            base_fee_per_gas: Some(U256::from(7_000_000_000u64)),
            withdrawals_root: Some(H256::from_low_u64_be(0x77)),
        }
    }

    #[test]
    fn encodes_fixed_vector() {
        let encoded = encode_block_header(&sample_header()).unwrap();
        assert_eq!(encoded.len(), 575);
        // Reference encoding: 17 fields, empty difficulty slot.
        assert_eq!(
            hex::encode(&encoded[..4]),
            "f9023ca0",
            "list prefix and first field start"
        );
        assert_eq!(
            header_hash(&sample_header()).unwrap(),
            H256::from(hex!(
                "f261066d1e94da0e560e824a171734aea06d8958a92aab6b0b6e30f92e64f1d6"
            ))
        );
    }

    #[test]
    fn difficulty_slot_is_the_empty_string() {
        let encoded = encode_block_header(&sample_header()).unwrap();
        // The byte following the bloom (256 bytes + b9 0100 prefix) is the
        // empty-string difficulty marker.
        let bloom_start = encoded
            .windows(3)
            .position(|w| w == [0xb9, 0x01, 0x00])
            .unwrap();
        assert_eq!(encoded[bloom_start + 3 + 256], 0x80);
    }

    #[test]
    fn pre_merge_headers_are_rejected() {
        let mut header = sample_header();
        header.withdrawals_root = None;
        assert_eq!(
            encode_block_header(&header),
            Err(ProofCodecError::PreMergeHeader("withdrawalsRoot"))
        );

        let mut header = sample_header();
        header.base_fee_per_gas = None;
        assert_eq!(
            encode_block_header(&header),
            Err(ProofCodecError::PreMergeHeader("baseFeePerGas"))
        );
    }
}

//! Conversions between the alloy primitives the RPC layer speaks and the
//! `ethereum-types` primitives the library crates are written against.

use alloy::primitives::{Address as RpcAddress, B256};
use alloy::rpc::types::Header as RpcHeader;
use anyhow::Context;
use ethereum_types::{Address, Bloom, H256, H64, U256};
use proof_codec::BlockHeader;

pub fn to_rpc_address(address: Address) -> RpcAddress {
    RpcAddress::from_slice(address.as_bytes())
}

pub fn to_rpc_word(word: H256) -> B256 {
    B256::from_slice(word.as_bytes())
}

pub fn from_rpc_word(word: B256) -> H256 {
    H256::from_slice(word.as_slice())
}

pub fn from_rpc_word_u256(word: B256) -> U256 {
    U256::from_big_endian(word.as_slice())
}

/// Reshapes an RPC block header into the fixed post-merge record the proof
/// encoder hashes. Pre-merge gaps (`mixHash`, `nonce`) are surfaced here;
/// missing base fee or withdrawals root stay `None` so the encoder can
/// reject them with its own diagnostic.
pub fn header_record(header: &RpcHeader) -> anyhow::Result<BlockHeader> {
    Ok(BlockHeader {
        parent_hash: from_rpc_word(header.parent_hash),
        ommers_hash: from_rpc_word(header.uncles_hash),
        miner: Address::from_slice(header.miner.as_slice()),
        state_root: from_rpc_word(header.state_root),
        transactions_root: from_rpc_word(header.transactions_root),
        receipts_root: from_rpc_word(header.receipts_root),
        logs_bloom: Bloom::from_slice(header.logs_bloom.as_slice()),
        number: header.number,
        gas_limit: U256::from(header.gas_limit),
        gas_used: U256::from(header.gas_used),
        timestamp: header.timestamp,
        extra_data: header.extra_data.to_vec(),
        mix_hash: from_rpc_word(
            header
                .mix_hash
                .context("block header is missing field `mixHash`")?,
        ),
        nonce: H64::from_slice(
            header
                .nonce
                .context("block header is missing field `nonce`")?
                .as_slice(),
        ),
        base_fee_per_gas: header.base_fee_per_gas.map(U256::from),
        withdrawals_root: header.withdrawals_root.map(from_rpc_word),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_word_round_trips() {
        let word = H256::repeat_byte(0xab);
        assert_eq!(from_rpc_word(to_rpc_word(word)), word);
        assert_eq!(
            from_rpc_word_u256(to_rpc_word(word)),
            U256::from_big_endian(word.as_bytes())
        );
    }
}

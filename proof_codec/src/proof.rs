use ethereum_types::{Address, H256, U256};
use rlp::{Rlp, RlpStream};
use serde::{Deserialize, Serialize};

use crate::{ProofCodecError, ProofCodecResult};

/// One storage-slot proof out of an `eth_getProof` response.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProof {
    /// The storage slot being proven.
    pub key: H256,
    /// The word the proof attests to.
    pub value: U256,
    /// RLP-encoded trie nodes from the storage root down to the slot.
    #[serde(with = "crate::hex_prefixed_seq")]
    pub proof: Vec<Vec<u8>>,
}

/// An account proof plus its storage proofs, as returned by a trusted RPC
/// endpoint at a specific block. Ownership is transient: produced from one
/// RPC read and consumed immediately by the encoders below.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProof {
    /// The account the proof covers.
    pub address: Address,
    /// Hash of the block the proof was taken at.
    pub block_hash: H256,
    /// RLP-encoded trie nodes from the state root down to the account.
    #[serde(with = "crate::hex_prefixed_seq")]
    pub account_proof: Vec<Vec<u8>>,
    /// Proofs for the requested storage slots.
    pub storage_proofs: Vec<StorageProof>,
}

/// Re-serializes already-RLP-encoded trie nodes as one RLP list of lists.
///
/// Verifiers expect each node nested as the list it decodes to, not as an
/// opaque byte string, so every node is decoded (and thereby validated)
/// before being re-emitted in place.
pub fn encode_proof_nodes(nodes: &[Vec<u8>]) -> ProofCodecResult<Vec<u8>> {
    let mut stream = RlpStream::new_list(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
        let decoded = Rlp::new(node);
        if !decoded.is_list() {
            return Err(ProofCodecError::MalformedNode {
                index,
                reason: "node payload is not a list".into(),
            });
        }
        let info = decoded
            .payload_info()
            .map_err(|e| ProofCodecError::MalformedNode {
                index,
                reason: e.to_string(),
            })?;
        if info.header_len + info.value_len != node.len() {
            return Err(ProofCodecError::MalformedNode {
                index,
                reason: "trailing bytes after node payload".into(),
            });
        }
        stream.append_raw(node, 1);
    }
    Ok(stream.out().to_vec())
}

/// Encodes the account branch of `proof` for the on-chain verifier.
pub fn encode_account_proof(proof: &AccountProof) -> ProofCodecResult<Vec<u8>> {
    encode_proof_nodes(&proof.account_proof)
}

/// Encodes every storage branch of `proof`, in request order.
pub fn encode_storage_proofs(proof: &AccountProof) -> ProofCodecResult<Vec<Vec<u8>>> {
    proof
        .storage_proofs
        .iter()
        .map(|sp| encode_proof_nodes(&sp.proof))
        .collect()
}

#[cfg(test)]
mod tests {
    use hex_literal::hex;

    use super::*;

    #[test]
    fn nests_nodes_as_a_list_of_lists() {
        let node_a = hex!("c482010280").to_vec();
        let node_b =
            hex!("f84aa00000000000000000000000000000000000000000000000000000000000000099a8aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")
                .to_vec();
        let nested = encode_proof_nodes(&[node_a.clone(), node_b.clone()]).unwrap();
        let mut expected = hex!("f851").to_vec();
        expected.extend(node_a);
        expected.extend(node_b);
        assert_eq!(nested, expected);
    }

    #[test]
    fn empty_proof_is_the_empty_list() {
        assert_eq!(encode_proof_nodes(&[]).unwrap(), vec![0xc0]);
    }

    #[test]
    fn rejects_non_list_nodes() {
        // 0x820102 is the RLP *string* "0102", not a node.
        let err = encode_proof_nodes(&[hex!("820102").to_vec()]).unwrap_err();
        assert!(matches!(
            err,
            ProofCodecError::MalformedNode { index: 0, .. }
        ));
    }

    #[test]
    fn proof_records_round_trip_through_hex_json() {
        let proof = AccountProof {
            address: Address::from_low_u64_be(0xaa),
            block_hash: H256::from_low_u64_be(0xbb),
            account_proof: vec![hex!("c482010280").to_vec()],
            storage_proofs: vec![StorageProof {
                key: H256::from_low_u64_be(1),
                value: U256::from(99),
                proof: vec![hex!("c482010280").to_vec()],
            }],
        };
        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(json["accountProof"][0], "0xc482010280");
        let back: AccountProof = serde_json::from_value(json).unwrap();
        assert_eq!(back, proof);
    }
}

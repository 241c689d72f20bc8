use std::collections::BTreeMap;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use alloy::primitives::{BlockHash, B256};
use alloy::rpc::types::{Block, BlockId, BlockTransactionsKind};
use alloy::{providers::Provider, transports::Transport};
use anyhow::Context;
use ethereum_types::{Address, H256, U256};
use override_gen::{Payload, Proposal};
use proof_codec::{AccountProof, StorageProof};
use serde::Deserialize;
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};
use tracing::debug;

use crate::compat;

const CACHE_SIZE: usize = 1024;
const MAX_NUMBER_OF_PARALLEL_REQUESTS: usize = 128;

/// Read access to raw storage words, the seam simulation preparation is
/// written against so tests can feed synthetic chain state.
#[cfg_attr(test, mockall::automock)]
pub trait StorageReader {
    fn storage_word(
        &self,
        contract: Address,
        slot: U256,
        block_number: u64,
    ) -> impl Future<Output = anyhow::Result<U256>> + Send;
}

/// Wrapper around an alloy provider that caches blocks, storage words and
/// settled governance records.
pub struct CachedProvider<ProviderT, TransportT> {
    provider: Arc<ProviderT>,
    // `Alloy` provider is using `Reqwest` http client under the hood. It has an unbounded
    // connection pool. We need to limit the number of parallel connections by ourselves, so we
    // use semaphore to count the number of parallel RPC requests happening at any moment with
    // CachedProvider.
    semaphore: Arc<Semaphore>,
    blocks_by_number: Arc<Mutex<lru::LruCache<u64, Block>>>,
    blocks_by_hash: Arc<Mutex<lru::LruCache<BlockHash, u64>>>,
    storage_words: Arc<Mutex<lru::LruCache<(Address, U256, u64), U256>>>,
    // Records in a final state can never change again, so they are kept
    // for the lifetime of the process rather than in an LRU.
    final_payloads: Arc<Mutex<BTreeMap<(Address, u64), Payload>>>,
    final_proposals: Arc<Mutex<BTreeMap<(Address, u64), Proposal>>>,
    _phantom: std::marker::PhantomData<TransportT>,
}

pub struct ProviderGuard<'a, ProviderT> {
    provider: Arc<ProviderT>,
    _permit: SemaphorePermit<'a>,
}

impl<'a, ProviderT> Deref for ProviderGuard<'a, ProviderT> {
    type Target = Arc<ProviderT>;

    fn deref(&self) -> &Self::Target {
        &self.provider
    }
}

impl<ProviderT> DerefMut for ProviderGuard<'_, ProviderT> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.provider
    }
}

/// `eth_getProof` response shape, before the hex strings are decoded into
/// the proof record types.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcAccountProof {
    account_proof: Vec<String>,
    storage_proof: Vec<RpcStorageProof>,
}

#[derive(Deserialize)]
struct RpcStorageProof {
    key: String,
    value: String,
    proof: Vec<String>,
}

fn decode_hex(s: &str) -> anyhow::Result<Vec<u8>> {
    let stripped = s.strip_prefix("0x").unwrap_or(s);
    // Quantities come back with odd nibble counts.
    if stripped.len() % 2 == 1 {
        hex::decode(format!("0{stripped}"))
    } else {
        hex::decode(stripped)
    }
    .with_context(|| format!("invalid hex string `{s}`"))
}

fn decode_word(s: &str) -> anyhow::Result<U256> {
    let bytes = decode_hex(s)?;
    anyhow::ensure!(bytes.len() <= 32, "quantity `{s}` exceeds 256 bits");
    Ok(U256::from_big_endian(&bytes))
}

fn decode_slot_key(s: &str) -> anyhow::Result<H256> {
    let mut word = [0u8; 32];
    let bytes = decode_hex(s)?;
    anyhow::ensure!(bytes.len() <= 32, "slot key `{s}` exceeds 32 bytes");
    word[32 - bytes.len()..].copy_from_slice(&bytes);
    Ok(H256::from(word))
}

impl<ProviderT, TransportT> CachedProvider<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    pub fn new(provider: ProviderT) -> Self {
        Self {
            provider: provider.into(),
            semaphore: Arc::new(Semaphore::new(MAX_NUMBER_OF_PARALLEL_REQUESTS)),
            blocks_by_number: Arc::new(Mutex::new(lru::LruCache::new(
                std::num::NonZero::new(CACHE_SIZE).unwrap(),
            ))),
            blocks_by_hash: Arc::new(Mutex::new(lru::LruCache::new(
                std::num::NonZero::new(CACHE_SIZE).unwrap(),
            ))),
            storage_words: Arc::new(Mutex::new(lru::LruCache::new(
                std::num::NonZero::new(CACHE_SIZE).unwrap(),
            ))),
            final_payloads: Arc::new(Mutex::new(BTreeMap::new())),
            final_proposals: Arc::new(Mutex::new(BTreeMap::new())),
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn get_provider(&self) -> Result<ProviderGuard<ProviderT>, anyhow::Error> {
        Ok(ProviderGuard {
            provider: self.provider.clone(),
            _permit: self.semaphore.acquire().await?,
        })
    }

    /// Retrieves block by number or hash, caching it if it's not already
    /// cached.
    pub async fn get_block(
        &self,
        id: BlockId,
        kind: BlockTransactionsKind,
    ) -> anyhow::Result<Block> {
        let cached_block = match id {
            BlockId::Hash(hash) => {
                let block_num = self
                    .blocks_by_hash
                    .lock()
                    .await
                    .get(&hash.block_hash)
                    .copied();
                if let Some(block_num) = block_num {
                    self.blocks_by_number.lock().await.get(&block_num).cloned()
                } else {
                    None
                }
            }
            BlockId::Number(alloy::rpc::types::BlockNumberOrTag::Number(number)) => {
                self.blocks_by_number.lock().await.get(&number).cloned()
            }
            _ => None,
        };

        if let Some(block) = cached_block {
            Ok(block)
        } else {
            let block = self
                .get_provider()
                .await?
                .get_block(id, kind)
                .await?
                .context(format!("target block {:?} does not exist", id))?;

            self.blocks_by_number
                .lock()
                .await
                .put(block.header.number, block.clone());
            self.blocks_by_hash
                .lock()
                .await
                .put(block.header.hash, block.header.number);

            Ok(block)
        }
    }

    pub async fn latest_block_number(&self) -> anyhow::Result<u64> {
        Ok(self.get_provider().await?.get_block_number().await?)
    }

    /// Reads one storage word at a fixed block, caching it. Storage at a
    /// settled block never changes, so cached words are served without
    /// revalidation.
    pub async fn get_storage_word(
        &self,
        contract: Address,
        slot: U256,
        block_number: u64,
    ) -> anyhow::Result<U256> {
        let key = (contract, slot, block_number);
        if let Some(word) = self.storage_words.lock().await.get(&key).copied() {
            return Ok(word);
        }

        let word: B256 = self
            .get_provider()
            .await?
            .raw_request(
                "eth_getStorageAt".into(),
                (
                    compat::to_rpc_address(contract),
                    compat::to_rpc_word(govsim_common::word_to_h256(slot)),
                    format!("{block_number:#x}"),
                ),
            )
            .await
            .with_context(|| {
                format!("eth_getStorageAt failed for {contract:?} at block {block_number}")
            })?;

        let word = compat::from_rpc_word_u256(word);
        self.storage_words.lock().await.put(key, word);
        Ok(word)
    }

    /// Fetches a Merkle proof for `slots` of `contract` at `block_number`
    /// and reshapes it into the record the proof encoders consume.
    pub async fn get_account_proof(
        &self,
        contract: Address,
        slots: &[H256],
        block_number: u64,
    ) -> anyhow::Result<AccountProof> {
        let block = self
            .get_block(block_number.into(), BlockTransactionsKind::Hashes)
            .await?;

        let keys: Vec<B256> = slots.iter().copied().map(compat::to_rpc_word).collect();
        let raw: serde_json::Value = self
            .get_provider()
            .await?
            .raw_request(
                "eth_getProof".into(),
                (
                    compat::to_rpc_address(contract),
                    keys,
                    format!("{block_number:#x}"),
                ),
            )
            .await
            .with_context(|| {
                format!("eth_getProof failed for {contract:?} at block {block_number}")
            })?;
        if raw.is_null() {
            anyhow::bail!("proof unavailable for {contract:?} at block {block_number}");
        }

        let response: RpcAccountProof = serde_path_to_error::deserialize(raw)
            .context("malformed eth_getProof response")?;

        let account_proof = response
            .account_proof
            .iter()
            .map(|node| decode_hex(node))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let storage_proofs = response
            .storage_proof
            .iter()
            .map(|sp| {
                Ok(StorageProof {
                    key: decode_slot_key(&sp.key)?,
                    value: decode_word(&sp.value)?,
                    proof: sp
                        .proof
                        .iter()
                        .map(|node| decode_hex(node))
                        .collect::<anyhow::Result<Vec<_>>>()?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        debug!(
            ?contract,
            block_number,
            slots = storage_proofs.len(),
            "fetched account proof"
        );
        Ok(AccountProof {
            address: contract,
            block_hash: compat::from_rpc_word(block.header.hash),
            account_proof,
            storage_proofs,
        })
    }

    /// Remembers a payload record if its state can never change again.
    /// Returns whether the record was kept.
    pub async fn remember_payload(&self, controller: Address, payload: &Payload) -> bool {
        if !payload.state.is_final() {
            return false;
        }
        self.final_payloads
            .lock()
            .await
            .insert((controller, payload.id), payload.clone());
        true
    }

    pub async fn final_payload(&self, controller: Address, id: u64) -> Option<Payload> {
        self.final_payloads.lock().await.get(&(controller, id)).cloned()
    }

    /// Remembers a proposal record if its state can never change again.
    /// Returns whether the record was kept.
    pub async fn remember_proposal(&self, governance: Address, proposal: &Proposal) -> bool {
        if !proposal.state.is_final() {
            return false;
        }
        self.final_proposals
            .lock()
            .await
            .insert((governance, proposal.id), proposal.clone());
        true
    }

    pub async fn final_proposal(&self, governance: Address, id: u64) -> Option<Proposal> {
        self.final_proposals
            .lock()
            .await
            .get(&(governance, id))
            .cloned()
    }
}

impl<ProviderT, TransportT> StorageReader for CachedProvider<ProviderT, TransportT>
where
    ProviderT: Provider<TransportT>,
    TransportT: Transport + Clone,
{
    async fn storage_word(
        &self,
        contract: Address,
        slot: U256,
        block_number: u64,
    ) -> anyhow::Result<U256> {
        self.get_storage_word(contract, slot, block_number).await
    }
}

/// Reads and unpacks both packed words of a payload record.
pub async fn read_packed_payload(
    reader: &impl StorageReader,
    layout: &override_gen::ControllerLayout,
    controller: Address,
    id: u64,
    block_number: u64,
) -> anyhow::Result<(override_gen::PayloadWord0, override_gen::PayloadTimings)> {
    let base = layout.payload_base_slot(id);
    let word0 = reader.storage_word(controller, base, block_number).await?;
    let word1 = reader
        .storage_word(controller, base + U256::from(1), block_number)
        .await?;
    Ok((
        layout.decode_payload_word0(word0),
        layout.decode_payload_timings(word1),
    ))
}

/// Reads the controller's payload counter.
pub async fn read_payload_count(
    reader: &impl StorageReader,
    layout: &override_gen::ControllerLayout,
    controller: Address,
    block_number: u64,
) -> anyhow::Result<u64> {
    let word = reader
        .storage_word(controller, layout.payloads_count_slot, block_number)
        .await?;
    anyhow::ensure!(word.bits() <= 64, "payload counter exceeds 64 bits");
    Ok(word.low_u64())
}

use std::path::{Path, PathBuf};

use alloy::rpc::types::BlockTransactionsKind;
use anyhow::Context;
use clap::{Parser, Subcommand, ValueHint};
use ethereum_types::{Address, H256};
use govsim::compat;
use govsim::provider::read_payload_count;
use govsim::registry::{ChainRegistry, HttpCachedProvider, RegistryConfig};
use govsim::report::{render_diff, render_outcome};
use govsim::simulator::SimulatorClient;
use govsim::snapshot::{diff_snapshots, Snapshot};
use override_gen::{
    force_payload_execution, force_proposal_execution, LayoutRegistry, Payload, PayloadState,
    Proposal, ProposalState, SimulationContext,
};
use proof_codec::{encode_account_proof, encode_block_header, encode_storage_proofs, header_hash};
use tracing::info;
use url::Url;

const MAINNET_GOVERNANCE: &str = "0x9aee0b04504cef83a65ac3f0e838d0593bcb2bc7";
const MAINNET_CONTROLLER: &str = "0xdabad81af85554e9ae636395611c58f7ec1aaec5";

#[derive(Parser)]
#[command(version = govsim::version(), propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Structurally compares two configuration snapshots.
    DiffSnapshots {
        /// Snapshot taken before the change.
        #[arg(value_hint = ValueHint::FilePath)]
        pre: PathBuf,
        /// Snapshot taken after the change.
        #[arg(value_hint = ValueHint::FilePath)]
        post: PathBuf,
        /// Keep equal sibling values as context instead of dropping them.
        #[arg(long)]
        keep_unchanged: bool,
    },
    /// Forces a proposal into executable state and simulates its execution.
    SimulateProposal {
        /// JSON file with per-chain RPC endpoints.
        #[arg(short, long, env = "GOVSIM_CHAIN_CONFIG", value_hint = ValueHint::FilePath)]
        chain_config: PathBuf,
        /// Base URL of the execution simulator.
        #[arg(long, env = "GOVSIM_SIMULATOR_URL", value_hint = ValueHint::Url)]
        simulator_url: Url,
        #[arg(long, env = "GOVSIM_CHAIN_ID", default_value_t = 1)]
        chain_id: u64,
        /// JSON record of the proposal, as exported by the indexer.
        #[arg(long, value_hint = ValueHint::FilePath)]
        record: PathBuf,
        /// Governance core address.
        #[arg(long, value_parser = address_arg, default_value = MAINNET_GOVERNANCE)]
        governance: Address,
        /// Sender of the simulated call.
        #[arg(long, value_parser = address_arg, default_value = "0x0000000000000000000000000000000000000001")]
        sender: Address,
    },
    /// Forces a payload into executable state and simulates its execution.
    SimulatePayload {
        /// JSON file with per-chain RPC endpoints.
        #[arg(short, long, env = "GOVSIM_CHAIN_CONFIG", value_hint = ValueHint::FilePath)]
        chain_config: PathBuf,
        /// Base URL of the execution simulator.
        #[arg(long, env = "GOVSIM_SIMULATOR_URL", value_hint = ValueHint::Url)]
        simulator_url: Url,
        #[arg(long, env = "GOVSIM_CHAIN_ID", default_value_t = 1)]
        chain_id: u64,
        /// JSON record of the payload, as exported by the indexer.
        #[arg(long, value_hint = ValueHint::FilePath)]
        record: PathBuf,
        /// Payloads controller address.
        #[arg(long, value_parser = address_arg, default_value = MAINNET_CONTROLLER)]
        controller: Address,
        /// Sender of the simulated call.
        #[arg(long, value_parser = address_arg, default_value = "0x0000000000000000000000000000000000000001")]
        sender: Address,
    },
    /// Re-encodes a storage proof (and optionally the block header) for an
    /// on-chain verifier.
    EncodeProof {
        /// JSON file with per-chain RPC endpoints.
        #[arg(short, long, env = "GOVSIM_CHAIN_CONFIG", value_hint = ValueHint::FilePath)]
        chain_config: PathBuf,
        #[arg(long, env = "GOVSIM_CHAIN_ID", default_value_t = 1)]
        chain_id: u64,
        /// Contract whose storage to prove.
        #[arg(long, value_parser = address_arg)]
        contract: Address,
        /// Storage slots to prove; repeatable.
        #[arg(long = "slot", value_parser = slot_arg, required = true)]
        slots: Vec<H256>,
        /// Block number to prove at; defaults to the latest block.
        #[arg(long)]
        block: Option<u64>,
        /// Also emit the RLP header and its hash for the same block.
        #[arg(long)]
        with_header: bool,
    },
}

fn address_arg(s: &str) -> Result<Address, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|e| e.to_string())?;
    if bytes.len() != 20 {
        return Err(format!("expected 20 bytes, got {}", bytes.len()));
    }
    Ok(Address::from_slice(&bytes))
}

fn slot_arg(s: &str) -> Result<H256, String> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    if digits.len() > 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("expected a hex slot of at most 32 bytes".into());
    }
    let padded = format!("{digits:0>64}");
    let bytes = hex::decode(padded).map_err(|e| e.to_string())?;
    Ok(H256::from_slice(&bytes))
}

fn load_record<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {what} record {}", path.display()))?;
    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    serde_path_to_error::deserialize(&mut deserializer)
        .with_context(|| format!("malformed {what} record {}", path.display()))
}

/// Latest block number and timestamp, the anchor the simulated execution
/// pretends to run at.
async fn simulation_context(
    provider: &HttpCachedProvider,
    sender: Address,
) -> anyhow::Result<SimulationContext> {
    let number = provider.latest_block_number().await?;
    let block = provider
        .get_block(number.into(), BlockTransactionsKind::Hashes)
        .await?;
    Ok(SimulationContext {
        block_number: number,
        timestamp: block.header.timestamp,
        sender,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    govsim::tracing::init();
    let args = Cli::parse();

    match args.command {
        Command::DiffSnapshots {
            pre,
            post,
            keep_unchanged,
        } => {
            let pre = Snapshot::load(&pre)?;
            let post = Snapshot::load(&post)?;
            let node = diff_snapshots(&pre, &post, !keep_unchanged)?;
            print!("{}", render_diff(&node));
        }
        Command::SimulateProposal {
            chain_config,
            simulator_url,
            chain_id,
            record,
            governance,
            sender,
        } => {
            let registry = ChainRegistry::from_config(&RegistryConfig::load(&chain_config)?);
            let provider = registry.provider(chain_id)?;
            let layouts = LayoutRegistry::mainnet();
            let proposal: Proposal = load_record(&record, "proposal")?;
            info!(id = proposal.id, state = %proposal.state, "simulating proposal");

            let ctx = simulation_context(&provider, sender).await?;
            let current_word = match proposal.state {
                ProposalState::Queued => {
                    let layout = layouts
                        .governance(governance)
                        .with_context(|| format!("no layout registered for {governance:?}"))?;
                    Some(
                        provider
                            .get_storage_word(
                                governance,
                                layout.proposal_base_slot(proposal.id),
                                ctx.block_number,
                            )
                            .await?,
                    )
                }
                _ => None,
            };

            let bundle =
                force_proposal_execution(&proposal, governance, &layouts, &ctx, current_word)?;
            let outcome = SimulatorClient::new(simulator_url)
                .simulate(chain_id, &bundle)
                .await?;
            provider.remember_proposal(governance, &proposal).await;
            print!("{}", render_outcome(&outcome));
        }
        Command::SimulatePayload {
            chain_config,
            simulator_url,
            chain_id,
            record,
            controller,
            sender,
        } => {
            let registry = ChainRegistry::from_config(&RegistryConfig::load(&chain_config)?);
            let provider = registry.provider(chain_id)?;
            let layouts = LayoutRegistry::mainnet();
            let payload: Payload = load_record(&record, "payload")?;
            info!(id = payload.id, state = %payload.state, "simulating payload");

            let ctx = simulation_context(&provider, sender).await?;
            let layout = layouts
                .controller(controller)
                .with_context(|| format!("no layout registered for {controller:?}"))?;
            let current_word = match payload.state {
                PayloadState::Queued => Some(
                    provider
                        .get_storage_word(
                            controller,
                            layout.payload_base_slot(payload.id),
                            ctx.block_number,
                        )
                        .await?,
                ),
                _ => None,
            };
            let payload_count = match payload.state {
                PayloadState::Created => {
                    read_payload_count(provider.as_ref(), layout, controller, ctx.block_number)
                        .await?
                }
                _ => 0,
            };

            let bundle = force_payload_execution(
                &payload,
                controller,
                &layouts,
                &ctx,
                current_word,
                payload_count,
            )?;
            let outcome = SimulatorClient::new(simulator_url)
                .simulate(chain_id, &bundle)
                .await?;
            provider.remember_payload(controller, &payload).await;
            print!("{}", render_outcome(&outcome));
        }
        Command::EncodeProof {
            chain_config,
            chain_id,
            contract,
            slots,
            block,
            with_header,
        } => {
            let registry = ChainRegistry::from_config(&RegistryConfig::load(&chain_config)?);
            let provider = registry.provider(chain_id)?;
            let block_number = match block {
                Some(number) => number,
                None => provider.latest_block_number().await?,
            };

            let proof = provider
                .get_account_proof(contract, &slots, block_number)
                .await?;
            println!("blockHash: {:#x}", proof.block_hash);
            println!("accountProof: 0x{}", hex::encode(encode_account_proof(&proof)?));
            for (record, encoded) in proof
                .storage_proofs
                .iter()
                .zip(encode_storage_proofs(&proof)?)
            {
                println!(
                    "storageProof {:#x} (value {}): 0x{}",
                    record.key,
                    record.value,
                    hex::encode(encoded)
                );
            }

            if with_header {
                let rpc_block = provider
                    .get_block(block_number.into(), BlockTransactionsKind::Hashes)
                    .await?;
                let header = compat::header_record(&rpc_block.header)?;
                println!("header: 0x{}", hex::encode(encode_block_header(&header)?));
                println!("headerHash: {:#x}", header_hash(&header)?);
            }
        }
    }

    Ok(())
}

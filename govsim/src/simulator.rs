use std::collections::BTreeMap;

use anyhow::Context;
use override_gen::OverrideBundle;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

/// REST client for the external bytecode simulator.
#[derive(Clone, Debug)]
pub struct SimulatorClient {
    http: reqwest::Client,
    base_url: Url,
}

/// Request body of the simulator's `simulate` endpoint.
#[derive(Debug, Eq, PartialEq, Serialize)]
pub(crate) struct SimulationRequest {
    network_id: String,
    from: String,
    to: String,
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_header: Option<HeaderOverride>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    state_objects: BTreeMap<String, StateObject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_hash: Option<String>,
}

#[derive(Debug, Eq, PartialEq, Serialize)]
struct HeaderOverride {
    number: String,
    timestamp: String,
}

#[derive(Debug, Eq, PartialEq, Serialize)]
struct StateObject {
    storage: BTreeMap<String, String>,
}

impl SimulationRequest {
    pub(crate) fn from_bundle(network_id: u64, bundle: &OverrideBundle) -> Self {
        Self {
            network_id: network_id.to_string(),
            from: format!("{:#x}", bundle.from),
            to: format!("{:#x}", bundle.target),
            input: format!("0x{}", hex::encode(&bundle.call_data)),
            block_number: bundle.block.as_ref().map(|b| b.number),
            block_header: bundle.block.as_ref().map(|b| HeaderOverride {
                number: format!("{:#x}", b.number),
                timestamp: format!("{:#x}", b.timestamp),
            }),
            state_objects: bundle
                .state
                .iter()
                .map(|(contract, slots)| {
                    (
                        format!("{contract:#x}"),
                        StateObject {
                            storage: slots
                                .iter()
                                .map(|(slot, word)| {
                                    (format!("{slot:#x}"), format!("{word:#x}"))
                                })
                                .collect(),
                        },
                    )
                })
                .collect(),
            transaction_hash: bundle.replay.map(|hash| format!("{hash:#x}")),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimulationResponse {
    simulation: RawSimulation,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSimulation {
    status: bool,
    #[serde(default)]
    gas_used: u64,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    state_diff: Option<serde_json::Value>,
}

/// What one simulation run produced. A revert is an outcome, not an
/// error: the tooling's whole point is to report it.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationOutcome {
    pub success: bool,
    pub gas_used: u64,
    /// Human-readable revert reason, when the call reverted.
    pub revert_reason: Option<String>,
    /// Simulator-reported storage diff, passed through untyped.
    pub state_diff: Option<serde_json::Value>,
}

impl SimulatorClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
        }
    }

    /// Submits `bundle` for chain `network_id` and parses the outcome.
    ///
    /// Transport and protocol failures are errors; an execution revert
    /// comes back as `Ok` with `success == false`.
    pub async fn simulate(
        &self,
        network_id: u64,
        bundle: &OverrideBundle,
    ) -> anyhow::Result<SimulationOutcome> {
        let request = SimulationRequest::from_bundle(network_id, bundle);
        debug!(network_id, to = %request.to, "submitting simulation");

        let url = self
            .base_url
            .join("simulate")
            .context("malformed simulator base URL")?;
        let response = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .context("simulator request failed")?;
        anyhow::ensure!(
            response.status().is_success(),
            "simulator returned HTTP {}",
            response.status()
        );

        let raw: serde_json::Value = response
            .json()
            .await
            .context("simulator response is not JSON")?;
        let parsed: SimulationResponse =
            serde_path_to_error::deserialize(raw).context("malformed simulator response")?;

        if !parsed.simulation.status {
            warn!(
                reason = parsed.simulation.error_message.as_deref().unwrap_or("unknown"),
                "simulated execution reverted"
            );
        }
        Ok(SimulationOutcome {
            success: parsed.simulation.status,
            gas_used: parsed.simulation.gas_used,
            revert_reason: parsed.simulation.error_message,
            state_diff: parsed.simulation.state_diff,
        })
    }
}

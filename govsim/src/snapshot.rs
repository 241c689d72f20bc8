//! Loading, schema validation and normalisation of protocol configuration
//! snapshots.
//!
//! Snapshots arrive as JSON dumps of the lending pool's configuration
//! (reserves, interest strategies, efficiency-mode categories, pool-wide
//! settings). Before two of them are structurally diffed they are
//! normalised so the diff engine only ever compares like with like:
//! 256-bit hex quantities become decimal strings, and category bitmaps are
//! expanded into the index lists a reviewer can actually read. Anything
//! that fails validation is rejected here, before the diff engine runs.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use ethereum_types::U256;
use govsim_common::{decimal_to_word, word_to_decimal};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snapshot_diff::{diff, DiffNode};
use storage_layout::bitmap_to_indexes;
use tracing::debug;

/// A protocol configuration snapshot, section by section. Unknown
/// top-level sections are a schema violation.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Snapshot {
    /// Per-asset reserve configuration, keyed by asset address or symbol.
    #[serde(default)]
    pub reserves: BTreeMap<String, Map<String, Value>>,
    /// Interest rate strategies, keyed by strategy address.
    #[serde(default)]
    pub strategies: BTreeMap<String, Map<String, Value>>,
    /// Efficiency-mode categories, keyed by category id.
    #[serde(default)]
    pub e_modes: BTreeMap<String, Map<String, Value>>,
    /// Pool-wide configuration values.
    #[serde(default)]
    pub pool_config: Map<String, Value>,
}

impl Snapshot {
    /// Parses a snapshot, reporting the JSON path of the first schema
    /// violation.
    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize(&mut deserializer)
            .context("snapshot does not match the expected schema")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read snapshot {}", path.display()))?;
        let snapshot = Self::from_json_str(&raw)
            .with_context(|| format!("invalid snapshot {}", path.display()))?;
        debug!(
            path = %path.display(),
            reserves = snapshot.reserves.len(),
            "loaded snapshot"
        );
        Ok(snapshot)
    }

    /// The diff-ready value tree: every hex word rewritten as a decimal
    /// string, every `…Bitmap` field expanded to its set-bit indexes.
    pub fn normalized(&self) -> anyhow::Result<Value> {
        let mut value = serde_json::to_value(self).context("snapshot is not serializable")?;
        normalize_in_place(&mut value, "$")?;
        Ok(value)
    }
}

/// Structural diff of two snapshots after normalisation.
pub fn diff_snapshots(
    pre: &Snapshot,
    post: &Snapshot,
    drop_unchanged: bool,
) -> anyhow::Result<DiffNode> {
    let pre = pre.normalized()?;
    let post = post.normalized()?;
    diff(&pre, &post, drop_unchanged).context("snapshot diff failed")
}

fn parse_hex_word(s: &str) -> Option<U256> {
    let digits = s.strip_prefix("0x")?;
    if digits.is_empty() || digits.len() > 64 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let padded = if digits.len() % 2 == 1 {
        format!("0{digits}")
    } else {
        digits.to_owned()
    };
    // Hex digits only, checked above.
    let bytes = hex::decode(padded).ok()?;
    Some(U256::from_big_endian(&bytes))
}

fn normalize_in_place(value: &mut Value, path: &str) -> anyhow::Result<()> {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                let child_path = format!("{path}.{key}");
                if key.ends_with("Bitmap") {
                    let word = match child {
                        Value::String(s) => parse_hex_word(s).or_else(|| decimal_to_word(s)),
                        Value::Number(n) => n.as_u64().map(U256::from),
                        _ => None,
                    }
                    .with_context(|| {
                        format!("{child_path}: bitmap field is not a 256-bit quantity")
                    })?;
                    *child = Value::Array(
                        bitmap_to_indexes(word)
                            .into_iter()
                            .map(|i| Value::from(u64::from(i)))
                            .collect(),
                    );
                } else {
                    normalize_in_place(child, &child_path)?;
                }
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter_mut().enumerate() {
                normalize_in_place(item, &format!("{path}[{index}]"))?;
            }
        }
        Value::String(s) => {
            if let Some(word) = parse_hex_word(s) {
                *value = Value::String(word_to_decimal(word));
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_sections_are_schema_violations() {
        let err = Snapshot::from_json_str(r#"{"reserves":{},"surprise":{}}"#).unwrap_err();
        assert!(format!("{err:#}").contains("surprise"), "{err:#}");
    }

    #[test]
    fn hex_words_normalize_to_decimal_strings() {
        let snapshot = Snapshot::from_json_str(
            r#"{"reserves":{"DAI":{"ltv":"0x1d4c","supplyCap":"0x0","symbol":"DAI"}}}"#,
        )
        .unwrap();
        let normalized = snapshot.normalized().unwrap();
        assert_eq!(normalized["reserves"]["DAI"]["ltv"], "7500");
        assert_eq!(normalized["reserves"]["DAI"]["supplyCap"], "0");
        // Non-hex strings pass through untouched.
        assert_eq!(normalized["reserves"]["DAI"]["symbol"], "DAI");
    }

    #[test]
    fn bitmap_fields_expand_to_indexes() {
        let snapshot = Snapshot::from_json_str(
            r#"{"eModes":{"1":{"collateralBitmap":"0x5","label":"stable"}}}"#,
        )
        .unwrap();
        let normalized = snapshot.normalized().unwrap();
        assert_eq!(
            normalized["eModes"]["1"]["collateralBitmap"],
            serde_json::json!([0, 2])
        );

        // Decimal-string bitmaps are accepted too.
        let snapshot =
            Snapshot::from_json_str(r#"{"eModes":{"2":{"borrowableBitmap":"6"}}}"#).unwrap();
        let normalized = snapshot.normalized().unwrap();
        assert_eq!(
            normalized["eModes"]["2"]["borrowableBitmap"],
            serde_json::json!([1, 2])
        );
    }

    #[test]
    fn malformed_bitmap_is_rejected_with_its_path() {
        let snapshot = Snapshot::from_json_str(
            r#"{"eModes":{"1":{"collateralBitmap":"not-a-number"}}}"#,
        )
        .unwrap();
        let err = snapshot.normalized().unwrap_err();
        assert!(format!("{err:#}").contains("$.eModes.1.collateralBitmap"));
    }

    #[test]
    fn changed_reserve_shows_up_as_a_leaf() {
        let pre = Snapshot::from_json_str(
            r#"{"reserves":{"DAI":{"ltv":"0x1d4c","borrowCap":"0x64"}}}"#,
        )
        .unwrap();
        let post = Snapshot::from_json_str(
            r#"{"reserves":{"DAI":{"ltv":"0x1e14","borrowCap":"0x64"}}}"#,
        )
        .unwrap();
        let node = diff_snapshots(&pre, &post, true).unwrap();
        let rendered = serde_json::to_value(&node).unwrap();
        assert_eq!(
            rendered["reserves"]["DAI"]["ltv"],
            serde_json::json!({"from": "7500", "to": "7700"})
        );
        // The untouched cap is dropped entirely.
        assert!(rendered["reserves"]["DAI"].get("borrowCap").is_none());
    }
}

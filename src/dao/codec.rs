//! Pure encoder/decoder for the persisted balances document.
//!
//! The document is a single top-level `balances` mapping from textual UUIDs
//! to non-negative integers. Decoding is deliberately permissive: a damaged
//! document degrades to an empty ledger and a damaged entry is skipped, so a
//! bad file on disk can never take the engine down.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

use crate::dao::storage::{StorageError, StorageResult};

/// Top-level key holding the identity→balance mapping.
const BALANCES_KEY: &str = "balances";

/// Encode a sorted snapshot as a pretty-printed document, one entry per line.
pub fn encode(snapshot: &BTreeMap<Uuid, i64>) -> StorageResult<String> {
    let mut balances = Map::with_capacity(snapshot.len());
    for (id, balance) in snapshot {
        balances.insert(id.to_string(), Value::from(*balance));
    }

    let mut root = Map::with_capacity(1);
    root.insert(BALANCES_KEY.into(), Value::Object(balances));

    let mut document =
        serde_json::to_string_pretty(&Value::Object(root)).map_err(StorageError::Encode)?;
    document.push('\n');
    Ok(document)
}

/// Decode a persisted document back into an identity→balance mapping.
///
/// Never fails: malformed roots fall back to an empty mapping and malformed
/// entries are skipped, each with a warning. Decoded balances are clamped to
/// be non-negative.
pub fn decode(contents: &str) -> HashMap<Uuid, i64> {
    let mut balances = HashMap::new();

    if contents.trim().is_empty() {
        return balances;
    }

    let root: Value = match serde_json::from_str(contents) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "balances document is malformed, starting fresh");
            return balances;
        }
    };

    let Some(entries) = root.get(BALANCES_KEY).and_then(Value::as_object) else {
        warn!("balances document has no `balances` mapping, starting fresh");
        return balances;
    };

    for (key, value) in entries {
        let Ok(id) = Uuid::parse_str(key) else {
            warn!(key = %key, "skipping malformed balance entry: invalid identity");
            continue;
        };
        let Some(amount) = decode_amount(value) else {
            warn!(key = %key, value = %value, "skipping malformed balance entry: not an integer");
            continue;
        };
        balances.insert(id, amount.max(0));
    }

    balances
}

/// Accept both the integer and the decimal-string renderings of a balance.
fn decode_amount(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

//! Unspent output tracking per wallet address
//!
//! The manager is the sole source of spendable funds for the transaction
//! builder. Each `update` call replaces the known set for one address (full
//! refresh semantics — callers fetch the complete current UTXO set before
//! updating, there is no incremental merge). Reads return snapshot copies
//! so concurrent build attempts never observe a half-applied refresh;
//! writes are serialized behind a single lock.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::constants::MIN_SPENDABLE_BLOCK_ID;
use crate::types::{Address, ScriptUnspentOutput, UnspentOutput};

#[derive(Debug)]
pub struct UnspentOutputManager {
    outputs: RwLock<HashMap<String, Vec<ScriptUnspentOutput>>>,
    /// Outputs with `block_id` at or below this are excluded from spend
    /// candidates. The upstream data source reports mempool-only funds
    /// with a sentinel block id of 1.
    min_block_id: u64,
}

impl UnspentOutputManager {
    pub fn new() -> Self {
        Self {
            outputs: RwLock::new(HashMap::new()),
            min_block_id: MIN_SPENDABLE_BLOCK_ID,
        }
    }

    /// Override the confirmation threshold (a block id filter, not a
    /// confirmation count — see the data source contract).
    pub fn with_min_block_id(mut self, min_block_id: u64) -> Self {
        self.min_block_id = min_block_id;
        self
    }

    /// Replace the known UTXO set for `address`.
    pub fn update(&self, address: &Address, outputs: Vec<UnspentOutput>) {
        let entries: Vec<ScriptUnspentOutput> = outputs
            .into_iter()
            .map(|output| ScriptUnspentOutput {
                output,
                script: address.locking_script.clone(),
            })
            .collect();

        tracing::debug!(
            address = %address.value,
            count = entries.len(),
            "refreshed unspent outputs"
        );

        let mut map = self.outputs.write().expect("unspent output lock poisoned");
        map.insert(address.value.clone(), entries);
    }

    /// Snapshot of the spend candidates for `address`: confirmed outputs
    /// only, in the order they were supplied by the data source.
    pub fn spendable_outputs(&self, address: &str) -> Vec<ScriptUnspentOutput> {
        let map = self.outputs.read().expect("unspent output lock poisoned");
        resolve_address_entry(&map, address)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|entry| entry.output.block_id > self.min_block_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Snapshot of every tracked output, unfiltered. Balance display, not
    /// spend selection.
    pub fn available_outputs(&self) -> Vec<ScriptUnspentOutput> {
        let map = self.outputs.read().expect("unspent output lock poisoned");
        let mut addresses: Vec<&String> = map.keys().collect();
        addresses.sort();
        addresses
            .into_iter()
            .flat_map(|address| map[address].iter().cloned())
            .collect()
    }

    /// Remove outputs consumed by a sent transaction, identified by
    /// `(transaction_hash, index)`.
    pub fn mark_spent(&self, spent: &[(String, u32)]) {
        let mut map = self.outputs.write().expect("unspent output lock poisoned");
        for entries in map.values_mut() {
            entries.retain(|entry| {
                !spent.iter().any(|(hash, index)| {
                    entry.output.transaction_hash == *hash && entry.output.index == *index
                })
            });
        }
    }
}

impl Default for UnspentOutputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Look up `address` in a response map: exact match first, then the
/// case-normalized form. Returns `None` when neither is present instead of
/// falling back to the whole response.
pub fn resolve_address_entry<'a, V>(data: &'a HashMap<String, V>, address: &str) -> Option<&'a V> {
    data.get(address)
        .or_else(|| data.get(&address.to_lowercase()))
}

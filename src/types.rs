//! Core data model for UTXO transaction construction

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Hash type: 256-bit hash
pub type Hash = [u8; 32];

/// Reference to a previous transaction output.
///
/// `hash` is stored in wire order (little-endian), i.e. the byte-reversed
/// form of the hex txid reported by data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, std::hash::Hash)]
pub struct OutPoint {
    pub hash: Hash,
    pub index: u32,
}

/// Transaction input as serialized on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInput {
    pub prevout: OutPoint,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
}

/// Transaction output as serialized on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionOutput {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

/// Wire-level transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
    pub lock_time: u32,
}

impl Transaction {
    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }
}

/// Unspent output as reported by an external data source.
///
/// Identity is `(transaction_hash, index)`. `transaction_hash` is the
/// display-order hex txid; `block_id` is the height of the containing block,
/// with values at or below the spendability threshold marking mempool-only
/// funds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnspentOutput {
    pub block_id: u64,
    pub transaction_hash: String,
    pub index: u32,
    pub amount: u64,
}

impl UnspentOutput {
    /// Txid bytes in wire order (reversed display hex).
    pub fn wire_hash(&self) -> Result<Hash> {
        let bytes = hex::decode(&self.transaction_hash)
            .map_err(|e| EngineError::DecodingError(format!("invalid txid hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(EngineError::DecodingError(format!(
                "txid must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        let mut hash = [0u8; 32];
        for (i, byte) in bytes.iter().rev().enumerate() {
            hash[i] = *byte;
        }
        Ok(hash)
    }

    pub fn outpoint(&self) -> Result<OutPoint> {
        Ok(OutPoint {
            hash: self.wire_hash()?,
            index: self.index,
        })
    }
}

/// Script pattern recognized by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptType {
    P2pkh,
    P2wpkh,
    P2sh,
    Multisig,
    Unknown,
}

/// Key material needed to spend a locking script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Spendable {
    None,
    PublicKey(Vec<u8>),
    Multisig {
        pubkeys: Vec<Vec<u8>>,
        threshold: usize,
    },
}

/// A locking script together with its classification and spend key material
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockingScript {
    pub data: Vec<u8>,
    pub kind: ScriptType,
    pub spendable: Spendable,
}

/// An unspent output paired with the locking script it is held under
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUnspentOutput {
    pub output: UnspentOutput,
    pub script: LockingScript,
}

/// A wallet address with its derived locking script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub value: String,
    pub locking_script: LockingScript,
}

/// Caller intent: send `amount` from `source_address` to
/// `destination_address`, paying `fee`. All values in satoshi.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub amount: u64,
    pub fee: u64,
    pub source_address: String,
    pub destination_address: String,
    pub change_address: String,
}

/// Output of a pre-image transaction, tagged by role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreImageOutput {
    Destination { script: LockingScript, value: u64 },
    Change { script: LockingScript, value: u64 },
}

impl PreImageOutput {
    pub fn value(&self) -> u64 {
        match self {
            PreImageOutput::Destination { value, .. } => *value,
            PreImageOutput::Change { value, .. } => *value,
        }
    }

    pub fn script(&self) -> &LockingScript {
        match self {
            PreImageOutput::Destination { script, .. } => script,
            PreImageOutput::Change { script, .. } => script,
        }
    }
}

/// Concrete inputs/outputs chosen to satisfy a [`TransferRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreImageTransaction {
    pub inputs: Vec<ScriptUnspentOutput>,
    pub outputs: Vec<PreImageOutput>,
    pub fee: u64,
}

/// A raw signature produced by an external signer.
///
/// `signature` is 64 bytes of r‖s; `hash` is the 32-byte digest that was
/// signed. The engine never produces these itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureInfo {
    pub signature: Vec<u8>,
    pub public_key: Vec<u8>,
    pub hash: Vec<u8>,
}

/// Request to sign one transaction input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignInput {
    pub index: usize,
}

/// Input/output ordering applied before signing and serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortType {
    #[default]
    None,
    Bip69,
}

//! Protocol constants shared across the engine

/// Satoshis per BTC
pub const SATOSHIS_PER_BTC: u64 = 100_000_000;

/// Default transaction version emitted by the builder
pub const TX_VERSION: u32 = 1;

/// SIGHASH_ALL, the only sighash type the engine produces
pub const SIGHASH_ALL: u32 = 0x0000_0001;

/// Sequence number for final transaction
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Sequence number for RBF
pub const SEQUENCE_RBF: u32 = 0xffff_fffe;

/// Outputs at or below this value are not worth creating
pub const DUST_LIMIT: u64 = 546;

/// Outputs whose containing block id is at or below this are not yet
/// spendable (mempool-only sentinel in the upstream data source)
pub const MIN_SPENDABLE_BLOCK_ID: u64 = 1;

/// PSBT container magic: "psbt" followed by 0xff
pub const PSBT_MAGIC: [u8; 5] = [0x70, 0x73, 0x62, 0x74, 0xff];

/// PSBT global key type: raw unsigned transaction
pub const PSBT_GLOBAL_UNSIGNED_TX: u8 = 0x00;

/// PSBT input key type: witness UTXO (value + scriptPubKey of the spent output)
pub const PSBT_IN_WITNESS_UTXO: u8 = 0x01;

/// PSBT input key type: partial signature, removed on finalization
pub const PSBT_IN_PARTIAL_SIG: u8 = 0x02;

/// PSBT input key type: finalized scriptSig
pub const PSBT_IN_FINAL_SCRIPTSIG: u8 = 0x07;

/// PSBT input key type: finalized witness stack
pub const PSBT_IN_FINAL_SCRIPTWITNESS: u8 = 0x08;

/// Segwit serialization marker and flag bytes
pub const SEGWIT_MARKER: u8 = 0x00;
pub const SEGWIT_FLAG: u8 = 0x01;

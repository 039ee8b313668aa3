//! # UTXO Engine
//!
//! UTXO-based transaction construction and signing engine: turns a logical
//! "send value V to address D" intent into fully serialized, network-valid
//! transaction bytes, across legacy P2PKH, segwit v0 P2WPKH and multisig
//! spends, and consumes/produces PSBT containers for external signing
//! flows.
//!
//! The engine owns unspent-output tracking per address, fee-aware input
//! selection, per-input sighash computation (legacy and BIP-143),
//! signature assembly (DER encoding with low-S normalization), BIP-69
//! canonical ordering, and the binary (de)serialization of transactions
//! and PSBT key-value maps.
//!
//! It deliberately does **not** fetch balances or fees, talk to signing
//! hardware, or hold keys: UTXO sets, fee rates and raw `r‖s` signatures
//! are supplied by the surrounding application, and the engine hands back
//! digests to sign and final bytes to broadcast.
//!
//! ## Design principles
//!
//! 1. **Pure computation**: every build either completes deterministically
//!    or fails with a typed error before any shared state is touched.
//! 2. **Stable ordering**: inputs, outputs and signatures travel in
//!    ordered sequences end to end — a sighash computed during
//!    `build_for_sign` digests exactly the bytes `build_for_send`
//!    serializes.
//! 3. **Exact version pinning** for consensus-critical cryptography
//!    dependencies.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use utxo_engine::{SortType, TransactionBuilder, TransferRequest, UnspentOutputManager};
//!
//! let manager = Arc::new(UnspentOutputManager::new());
//! let builder = TransactionBuilder::new(Arc::clone(&manager));
//!
//! let request = TransferRequest {
//!     amount: 100_000,
//!     fee: 4_641,
//!     source_address: "bc1qxzdqcmh6pknevm2ugtw94y50dwhsu3l0p5tg63".to_string(),
//!     destination_address: "bc1qxzdqcmh6pknevm2ugtw94y50dwhsu3l0p5tg63".to_string(),
//!     change_address: String::new(),
//! };
//!
//! // No UTXOs tracked yet, so selection fails with a typed error.
//! let result = builder.build_for_sign(&request, 0xffff_fffa, SortType::None);
//! assert!(result.is_err());
//! ```

pub mod address;
pub mod builder;
pub mod constants;
pub mod encode;
pub mod error;
pub mod fee;
pub mod psbt;
pub mod script;
pub mod serializer;
pub mod sighash;
pub mod types;
pub mod unspent;

// Re-export the engine surface
pub use builder::TransactionBuilder;
pub use constants::*;
pub use error::{EngineError, Result};
pub use fee::{FeeEstimate, FeeRate};
pub use psbt::{PsbtKeyValueMap, PsbtSigningBuilder};
pub use serializer::TransactionSerializer;
pub use sighash::{SegwitSighashParts, SpentOutput};
pub use types::*;
pub use unspent::UnspentOutputManager;

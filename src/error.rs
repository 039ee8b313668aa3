//! Error types for the transaction engine

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EngineError {
    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("Malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("Malformed PSBT: {0}")]
    MalformedPsbt(String),

    #[error("Unsupported script type: {0}")]
    UnsupportedScriptType(String),

    #[error("Signature count mismatch: expected {expected}, got {actual}")]
    SignatureCountMismatch { expected: usize, actual: usize },

    #[error("Insufficient funds: required {required} satoshi, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

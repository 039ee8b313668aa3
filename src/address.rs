//! Address parsing: derive locking scripts from address strings
//!
//! Supports bech32/bech32m segwit addresses and base58check legacy
//! addresses. Only script derivation lives here; key management and
//! address books belong to the surrounding wallet layer.

use bech32::{Fe32, Hrp};

use crate::error::{EngineError, Result};
use crate::script;
use crate::types::{Address, LockingScript, ScriptType, Spendable};

/// Base58 version bytes accepted for legacy addresses
const P2PKH_VERSIONS: [u8; 2] = [0x00, 0x6f];
const P2SH_VERSIONS: [u8; 2] = [0x05, 0xc4];

/// Derive the locking script for an address string.
///
/// The script carries no spend key material (`Spendable::None`); this is
/// the form used for destination and change outputs.
pub fn script_for_address(address: &str) -> Result<LockingScript> {
    if let Ok((_hrp, version, program)) = bech32::segwit::decode(address) {
        let data = script::p2wpkh(version.to_u8(), &program)?;
        let kind = script::classify(&data);
        return Ok(LockingScript {
            data,
            kind,
            spendable: Spendable::None,
        });
    }

    let decoded = bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|_| EngineError::DecodingError(format!("unrecognized address: {address}")))?;
    if decoded.len() != 21 {
        return Err(EngineError::DecodingError(format!(
            "base58 payload must be 21 bytes, got {}",
            decoded.len()
        )));
    }
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&decoded[1..21]);

    let version = decoded[0];
    if P2PKH_VERSIONS.contains(&version) {
        Ok(LockingScript {
            data: script::p2pkh(&hash),
            kind: ScriptType::P2pkh,
            spendable: Spendable::None,
        })
    } else if P2SH_VERSIONS.contains(&version) {
        Ok(LockingScript {
            data: script::p2sh(&hash),
            kind: ScriptType::P2sh,
            spendable: Spendable::None,
        })
    } else {
        Err(EngineError::UnsupportedScriptType(format!(
            "base58 version byte 0x{version:02x}"
        )))
    }
}

/// P2WPKH address for a compressed public key.
pub fn p2wpkh_address(public_key: &[u8], hrp: &str) -> Result<Address> {
    let program = script::hash160(public_key);
    let hrp = Hrp::parse(hrp)
        .map_err(|e| EngineError::DecodingError(format!("invalid bech32 hrp: {e}")))?;
    let value = bech32::segwit::encode(hrp, Fe32::Q, &program)
        .map_err(|e| EngineError::DecodingError(format!("bech32 encoding failed: {e}")))?;
    Ok(Address {
        value,
        locking_script: LockingScript {
            data: script::p2wpkh(0, &program)?,
            kind: ScriptType::P2wpkh,
            spendable: Spendable::PublicKey(public_key.to_vec()),
        },
    })
}

/// P2PKH address for a public key under the given version byte.
pub fn p2pkh_address(public_key: &[u8], version: u8) -> Address {
    let hash = script::hash160(public_key);
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(&hash);
    let value = bs58::encode(payload).with_check().into_string();
    Address {
        value,
        locking_script: LockingScript {
            data: script::p2pkh(&hash),
            kind: ScriptType::P2pkh,
            spendable: Spendable::PublicKey(public_key.to_vec()),
        },
    }
}

/// P2SH-wrapped multisig address over the given public keys.
pub fn multisig_address(pubkeys: &[Vec<u8>], threshold: usize, version: u8) -> Result<Address> {
    let redeem = script::multisig(pubkeys, threshold)?;
    let hash = script::hash160(&redeem);
    let mut payload = Vec::with_capacity(21);
    payload.push(version);
    payload.extend_from_slice(&hash);
    let value = bs58::encode(payload).with_check().into_string();
    Ok(Address {
        value,
        locking_script: LockingScript {
            data: script::p2sh(&hash),
            kind: ScriptType::P2sh,
            spendable: Spendable::Multisig {
                pubkeys: pubkeys.to_vec(),
                threshold,
            },
        },
    })
}

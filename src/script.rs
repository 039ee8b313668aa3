//! Locking script construction and classification
//!
//! Pure functions over raw script bytes. Builders produce the canonical
//! byte patterns for the supported script kinds; `classify` is the inverse,
//! total over [`ScriptType`] with unrecognized patterns mapping to
//! `ScriptType::Unknown` rather than failing.

use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

use crate::error::{EngineError, Result};
use crate::types::ScriptType;

pub const OP_0: u8 = 0x00;
pub const OP_PUSHDATA1: u8 = 0x4c;
pub const OP_PUSHDATA2: u8 = 0x4d;
pub const OP_PUSHDATA4: u8 = 0x4e;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Append `data` to `script` with the smallest valid push prefix.
pub fn push_data(script: &mut Vec<u8>, data: &[u8]) {
    match data.len() {
        n if n < usize::from(OP_PUSHDATA1) => script.push(n as u8),
        n if n <= 0xff => {
            script.push(OP_PUSHDATA1);
            script.push(n as u8);
        }
        n if n <= 0xffff => {
            script.push(OP_PUSHDATA2);
            script.extend((n as u16).to_le_bytes());
        }
        n => {
            script.push(OP_PUSHDATA4);
            script.extend((n as u32).to_le_bytes());
        }
    }
    script.extend_from_slice(data);
}

/// OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG
pub fn p2pkh(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = vec![OP_DUP, OP_HASH160];
    push_data(&mut script, pubkey_hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// OP_HASH160 <20-byte hash> OP_EQUAL
pub fn p2sh(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = vec![OP_HASH160];
    push_data(&mut script, script_hash);
    script.push(OP_EQUAL);
    script
}

/// Witness program: version opcode followed by the pushed program bytes.
///
/// Version 0 with a 20-byte program is P2WPKH; other version/length
/// combinations are emitted as-is (P2WSH, future versions).
pub fn p2wpkh(version: u8, program: &[u8]) -> Result<Vec<u8>> {
    if version > 16 {
        return Err(EngineError::UnsupportedScriptType(format!(
            "witness version {version} out of range"
        )));
    }
    if program.len() < 2 || program.len() > 40 {
        return Err(EngineError::UnsupportedScriptType(format!(
            "witness program length {} out of range",
            program.len()
        )));
    }
    let mut script = Vec::with_capacity(2 + program.len());
    script.push(if version == 0 {
        OP_0
    } else {
        OP_1 + version - 1
    });
    push_data(&mut script, program);
    Ok(script)
}

/// m-of-n multisig: <m> <pubkey>... <n> OP_CHECKMULTISIG
///
/// Public keys are ordered lexicographically by their serialized bytes so
/// that independent parties assemble byte-identical scripts.
pub fn multisig(pubkeys: &[Vec<u8>], threshold: usize) -> Result<Vec<u8>> {
    if pubkeys.is_empty() || pubkeys.len() > 16 {
        return Err(EngineError::UnsupportedScriptType(format!(
            "multisig key count {} out of range",
            pubkeys.len()
        )));
    }
    if threshold == 0 || threshold > pubkeys.len() {
        return Err(EngineError::UnsupportedScriptType(format!(
            "multisig threshold {} out of range for {} keys",
            threshold,
            pubkeys.len()
        )));
    }

    let mut sorted: Vec<&Vec<u8>> = pubkeys.iter().collect();
    sorted.sort();

    let mut script = vec![OP_1 + threshold as u8 - 1];
    for pubkey in sorted {
        push_data(&mut script, pubkey);
    }
    script.push(OP_1 + pubkeys.len() as u8 - 1);
    script.push(OP_CHECKMULTISIG);
    Ok(script)
}

/// Classify raw script bytes into the closed [`ScriptType`] set.
pub fn classify(script: &[u8]) -> ScriptType {
    if is_p2pkh(script) {
        ScriptType::P2pkh
    } else if is_p2wpkh(script) {
        ScriptType::P2wpkh
    } else if is_p2sh(script) {
        ScriptType::P2sh
    } else if is_multisig(script) {
        ScriptType::Multisig
    } else {
        ScriptType::Unknown
    }
}

fn is_p2pkh(script: &[u8]) -> bool {
    script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == 20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
}

fn is_p2wpkh(script: &[u8]) -> bool {
    script.len() == 22 && script[0] == OP_0 && script[1] == 20
}

fn is_p2sh(script: &[u8]) -> bool {
    script.len() == 23 && script[0] == OP_HASH160 && script[1] == 20 && script[22] == OP_EQUAL
}

fn is_multisig(script: &[u8]) -> bool {
    if script.len() < 3 {
        return false;
    }
    let m = script[0];
    let n = script[script.len() - 2];
    if !(OP_1..=OP_16).contains(&m) || !(OP_1..=OP_16).contains(&n) || m > n {
        return false;
    }
    if script[script.len() - 1] != OP_CHECKMULTISIG {
        return false;
    }
    // Between m and n there must be exactly the pushed public keys.
    let mut offset = 1;
    let mut keys = 0usize;
    while offset < script.len() - 2 {
        let push = script[offset] as usize;
        if push == 0 || push >= usize::from(OP_PUSHDATA1) {
            return false;
        }
        offset += 1 + push;
        keys += 1;
    }
    offset == script.len() - 2 && keys == usize::from(n - OP_1 + 1)
}

/// The 20-byte program of a P2WPKH script, if the script is one.
pub fn witness_program(script: &[u8]) -> Option<&[u8]> {
    if is_p2wpkh(script) {
        Some(&script[2..22])
    } else {
        None
    }
}

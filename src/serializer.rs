//! Wire serialization and final transaction assembly
//!
//! Owns the byte layout of transactions (legacy and segwit), signature
//! DER encoding with mandatory low-S normalization, canonical BIP-69
//! ordering, and the compiler that merges a pre-image transaction with
//! externally produced signatures into broadcastable bytes.

use secp256k1::ecdsa::Signature;

use crate::constants::{SEGWIT_FLAG, SEGWIT_MARKER, SIGHASH_ALL};
use crate::encode::{decode_varint, encode_varint, read_u32_le, read_u64_le, take};
use crate::error::{EngineError, Result};
use crate::script;
use crate::types::{
    OutPoint, PreImageTransaction, ScriptType, SignatureInfo, SortType, Spendable, Transaction,
    TransactionInput, TransactionOutput,
};

/// Serialize a transaction. The segwit layout (marker, flag, witness
/// stacks) is used whenever any input carries witness data.
pub fn serialize_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend(tx.version.to_le_bytes());

    let segwit = tx.has_witness();
    if segwit {
        buf.push(SEGWIT_MARKER);
        buf.push(SEGWIT_FLAG);
    }

    buf.extend(encode_varint(tx.inputs.len() as u64));
    for input in &tx.inputs {
        serialize_input(&mut buf, input);
    }

    buf.extend(encode_varint(tx.outputs.len() as u64));
    for output in &tx.outputs {
        serialize_output(&mut buf, output);
    }

    if segwit {
        for input in &tx.inputs {
            buf.extend(serialize_witness(&input.witness));
        }
    }

    buf.extend(tx.lock_time.to_le_bytes());
    buf
}

/// Serialize without witness data. This layout feeds legacy sighash
/// computation and txid hashing.
pub fn serialize_transaction_no_witness(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend(tx.version.to_le_bytes());
    buf.extend(encode_varint(tx.inputs.len() as u64));
    for input in &tx.inputs {
        serialize_input(&mut buf, input);
    }
    buf.extend(encode_varint(tx.outputs.len() as u64));
    for output in &tx.outputs {
        serialize_output(&mut buf, output);
    }
    buf.extend(tx.lock_time.to_le_bytes());
    buf
}

fn serialize_input(buf: &mut Vec<u8>, input: &TransactionInput) {
    buf.extend(input.prevout.hash);
    buf.extend(input.prevout.index.to_le_bytes());
    buf.extend(encode_varint(input.script_sig.len() as u64));
    buf.extend(&input.script_sig);
    buf.extend(input.sequence.to_le_bytes());
}

/// Serialize a single output (value + scriptPubKey). Also the value layout
/// of a PSBT witness UTXO.
pub fn serialize_output_bytes(output: &TransactionOutput) -> Vec<u8> {
    let mut buf = Vec::new();
    serialize_output(&mut buf, output);
    buf
}

fn serialize_output(buf: &mut Vec<u8>, output: &TransactionOutput) {
    buf.extend(output.value.to_le_bytes());
    buf.extend(encode_varint(output.script_pubkey.len() as u64));
    buf.extend(&output.script_pubkey);
}

/// Witness stack: item count, then each item length-prefixed.
pub fn serialize_witness(witness: &[Vec<u8>]) -> Vec<u8> {
    let mut buf = encode_varint(witness.len() as u64);
    for item in witness {
        buf.extend(encode_varint(item.len() as u64));
        buf.extend(item);
    }
    buf
}

fn tx_malformed(err: EngineError) -> EngineError {
    match err {
        EngineError::MalformedEncoding(msg) => EngineError::MalformedTransaction(msg),
        other => other,
    }
}

/// Parse transaction bytes, accepting both legacy and segwit layouts.
/// The input must contain exactly one transaction.
pub fn deserialize_transaction(data: &[u8]) -> Result<Transaction> {
    let (tx, consumed) = deserialize_transaction_at(data, 0)?;
    if consumed != data.len() {
        return Err(EngineError::MalformedTransaction(format!(
            "{} trailing bytes after transaction",
            data.len() - consumed
        )));
    }
    Ok(tx)
}

fn deserialize_transaction_at(data: &[u8], start: usize) -> Result<(Transaction, usize)> {
    let mut offset = start;

    let (version, n) = read_u32_le(data, offset).map_err(tx_malformed)?;
    offset += n;

    let (mut input_count, n) = decode_varint(data, offset).map_err(tx_malformed)?;
    let mut segwit = false;
    if input_count == 0 {
        // Legacy transactions cannot have zero inputs; this is the segwit
        // marker followed by the flag byte.
        let flag = take(data, offset + 1, 1).map_err(tx_malformed)?[0];
        if flag != SEGWIT_FLAG {
            return Err(EngineError::MalformedTransaction(format!(
                "invalid segwit flag 0x{flag:02x}"
            )));
        }
        segwit = true;
        offset += 2;
        let (count, n) = decode_varint(data, offset).map_err(tx_malformed)?;
        input_count = count;
        offset += n;
    } else {
        offset += n;
    }

    let mut inputs = Vec::with_capacity(input_count as usize);
    for _ in 0..input_count {
        let hash_bytes = take(data, offset, 32).map_err(tx_malformed)?;
        let mut hash = [0u8; 32];
        hash.copy_from_slice(hash_bytes);
        offset += 32;

        let (index, n) = read_u32_le(data, offset).map_err(tx_malformed)?;
        offset += n;

        let (script_len, n) = decode_varint(data, offset).map_err(tx_malformed)?;
        offset += n;
        let script_sig = take(data, offset, script_len as usize)
            .map_err(tx_malformed)?
            .to_vec();
        offset += script_len as usize;

        let (sequence, n) = read_u32_le(data, offset).map_err(tx_malformed)?;
        offset += n;

        inputs.push(TransactionInput {
            prevout: OutPoint { hash, index },
            script_sig,
            sequence,
            witness: Vec::new(),
        });
    }

    let (output_count, n) = decode_varint(data, offset).map_err(tx_malformed)?;
    offset += n;
    let mut outputs = Vec::with_capacity(output_count as usize);
    for _ in 0..output_count {
        let (value, n) = read_u64_le(data, offset).map_err(tx_malformed)?;
        offset += n;
        let (script_len, n) = decode_varint(data, offset).map_err(tx_malformed)?;
        offset += n;
        let script_pubkey = take(data, offset, script_len as usize)
            .map_err(tx_malformed)?
            .to_vec();
        offset += script_len as usize;
        outputs.push(TransactionOutput {
            value,
            script_pubkey,
        });
    }

    if segwit {
        for input in &mut inputs {
            let (witness, consumed) = deserialize_witness_at(data, offset)?;
            input.witness = witness;
            offset += consumed;
        }
    }

    let (lock_time, n) = read_u32_le(data, offset).map_err(tx_malformed)?;
    offset += n;

    Ok((
        Transaction {
            version,
            inputs,
            outputs,
            lock_time,
        },
        offset - start,
    ))
}

/// Parse a serialized witness stack. The input must contain exactly one
/// stack.
pub fn deserialize_witness(data: &[u8]) -> Result<Vec<Vec<u8>>> {
    let (witness, consumed) = deserialize_witness_at(data, 0)?;
    if consumed != data.len() {
        return Err(EngineError::MalformedTransaction(format!(
            "{} trailing bytes after witness stack",
            data.len() - consumed
        )));
    }
    Ok(witness)
}

fn deserialize_witness_at(data: &[u8], start: usize) -> Result<(Vec<Vec<u8>>, usize)> {
    let mut offset = start;
    let (count, n) = decode_varint(data, offset).map_err(tx_malformed)?;
    offset += n;
    let mut items = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let (len, n) = decode_varint(data, offset).map_err(tx_malformed)?;
        offset += n;
        items.push(take(data, offset, len as usize).map_err(tx_malformed)?.to_vec());
        offset += len as usize;
    }
    Ok((items, offset - start))
}

/// DER-encode a 64-byte r‖s signature with low-S enforced.
///
/// High-S values are negated to `n - s` before encoding; this is required
/// for standardness, not optional.
pub fn der_signature(compact: &[u8]) -> Result<Vec<u8>> {
    let mut signature = Signature::from_compact(compact)
        .map_err(|e| EngineError::DecodingError(format!("invalid compact signature: {e}")))?;
    signature.normalize_s();
    Ok(signature.serialize_der().to_vec())
}

/// Reorder a pre-image transaction in place according to `sort_type`.
///
/// BIP-69 is a total order: inputs by (txid ascending in display byte
/// order, then output index), outputs by (value ascending, then
/// scriptPubKey bytes). The result is independent of arrival order.
pub fn apply_sort(pre_image: &mut PreImageTransaction, sort_type: SortType) {
    match sort_type {
        SortType::None => {}
        SortType::Bip69 => {
            pre_image.inputs.sort_by(|a, b| {
                a.output
                    .transaction_hash
                    .to_lowercase()
                    .cmp(&b.output.transaction_hash.to_lowercase())
                    .then(a.output.index.cmp(&b.output.index))
            });
            pre_image.outputs.sort_by(|a, b| {
                a.value()
                    .cmp(&b.value())
                    .then_with(|| a.script().data.cmp(&b.script().data))
            });
        }
    }
}

/// Assembles final transaction bytes from a pre-image and external
/// signatures. `sequence` is applied to every input; `sighash_type` is
/// appended to each encoded signature.
#[derive(Debug, Clone)]
pub struct TransactionSerializer {
    pub version: u32,
    pub sequence: u32,
    pub sighash_type: u32,
}

impl TransactionSerializer {
    pub fn new(version: u32, sequence: u32) -> Self {
        Self {
            version,
            sequence,
            sighash_type: SIGHASH_ALL,
        }
    }

    /// The unsigned wire transaction for a pre-image: empty scriptSigs,
    /// no witness data. Input order is taken from the pre-image as-is.
    pub fn unsigned_transaction(&self, pre_image: &PreImageTransaction) -> Result<Transaction> {
        let mut inputs = Vec::with_capacity(pre_image.inputs.len());
        for input in &pre_image.inputs {
            inputs.push(TransactionInput {
                prevout: input.output.outpoint()?,
                script_sig: Vec::new(),
                sequence: self.sequence,
                witness: Vec::new(),
            });
        }
        let outputs = pre_image
            .outputs
            .iter()
            .map(|output| TransactionOutput {
                value: output.value(),
                script_pubkey: output.script().data.clone(),
            })
            .collect();
        Ok(Transaction {
            version: self.version,
            inputs,
            outputs,
            lock_time: 0,
        })
    }

    /// Merge signatures into the pre-image and serialize.
    ///
    /// Signature `i` is matched to input `i`; the count must equal the
    /// input count exactly. Placement (scriptSig vs witness stack) follows
    /// each input's own script type, so mixed-type spends are supported.
    pub fn compile(
        &self,
        pre_image: &PreImageTransaction,
        signatures: &[SignatureInfo],
    ) -> Result<Vec<u8>> {
        if signatures.len() != pre_image.inputs.len() {
            return Err(EngineError::SignatureCountMismatch {
                expected: pre_image.inputs.len(),
                actual: signatures.len(),
            });
        }

        let mut tx = self.unsigned_transaction(pre_image)?;
        for (index, (input, signature)) in
            pre_image.inputs.iter().zip(signatures.iter()).enumerate()
        {
            let mut encoded = der_signature(&signature.signature)?;
            encoded.push(self.sighash_type as u8);

            let script = &input.script;
            match (script.kind, &script.spendable) {
                (ScriptType::P2wpkh, _) => {
                    tx.inputs[index].witness =
                        vec![encoded, signature.public_key.clone()];
                }
                (ScriptType::P2pkh, _) => {
                    let mut script_sig = Vec::new();
                    script::push_data(&mut script_sig, &encoded);
                    script::push_data(&mut script_sig, &signature.public_key);
                    tx.inputs[index].script_sig = script_sig;
                }
                (ScriptType::Multisig, _) => {
                    let mut script_sig = vec![script::OP_0];
                    script::push_data(&mut script_sig, &encoded);
                    tx.inputs[index].script_sig = script_sig;
                }
                (ScriptType::P2sh, Spendable::Multisig { pubkeys, threshold }) => {
                    let redeem = script::multisig(pubkeys, *threshold)?;
                    let mut script_sig = vec![script::OP_0];
                    script::push_data(&mut script_sig, &encoded);
                    script::push_data(&mut script_sig, &redeem);
                    tx.inputs[index].script_sig = script_sig;
                }
                (kind, _) => {
                    return Err(EngineError::UnsupportedScriptType(format!(
                        "cannot place signature for input {index} of type {kind:?}"
                    )));
                }
            }
        }

        Ok(serialize_transaction(&tx))
    }
}

//! Signature hash computation
//!
//! Two algorithms, selected by the script type of the input being signed.
//!
//! Legacy (P2PKH, bare/P2SH multisig):
//! 1. Copy the unsigned transaction
//! 2. Substitute the target input's scriptSig with the script code;
//!    empty scriptSig for every other input
//! 3. Serialize without witness data
//! 4. Append the 4-byte little-endian sighash type
//! 5. Double-SHA256
//!
//! The copy is rebuilt freshly per input — each input digests a different
//! modified transaction.
//!
//! Segwit v0 (P2WPKH, BIP-143): the preimage is
//! version, hashPrevouts, hashSequence, outpoint, scriptCode (with
//! compact-size length), amount (8 bytes LE), sequence, hashOutputs,
//! locktime, sighash type — double-SHA256 of the whole. The three inner
//! hashes cover all prevouts/sequences/outputs and are computed once per
//! transaction, then reused for every input.

use crate::constants::SIGHASH_ALL;
use crate::encode::{double_sha256, encode_varint};
use crate::error::{EngineError, Result};
use crate::script;
use crate::serializer::serialize_transaction_no_witness;
use crate::types::{
    Hash, LockingScript, ScriptType, SignInput, Spendable, Transaction,
};

/// The previous output being spent by one input: its value and locking
/// script, as tracked by the unspent output manager or carried in a PSBT
/// witness UTXO entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpentOutput {
    pub value: u64,
    pub script: LockingScript,
}

/// Legacy SIGHASH_ALL digest for one input.
pub fn legacy_sighash_all(
    tx: &Transaction,
    input_index: usize,
    script_code: &[u8],
) -> Result<Hash> {
    if input_index >= tx.inputs.len() {
        return Err(EngineError::MalformedTransaction(format!(
            "sign input index {} out of range for {} inputs",
            input_index,
            tx.inputs.len()
        )));
    }

    let mut copy = tx.clone();
    for (i, input) in copy.inputs.iter_mut().enumerate() {
        input.script_sig = if i == input_index {
            script_code.to_vec()
        } else {
            Vec::new()
        };
        input.witness.clear();
    }

    let mut preimage = serialize_transaction_no_witness(&copy);
    preimage.extend(SIGHASH_ALL.to_le_bytes());
    Ok(double_sha256(&preimage))
}

/// The per-transaction hashes of the BIP-143 preimage, computed once and
/// shared across all inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegwitSighashParts {
    pub hash_prevouts: Hash,
    pub hash_sequence: Hash,
    pub hash_outputs: Hash,
}

impl SegwitSighashParts {
    pub fn new(tx: &Transaction) -> Self {
        let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
        for input in &tx.inputs {
            prevouts.extend(input.prevout.hash);
            prevouts.extend(input.prevout.index.to_le_bytes());
        }

        let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
        for input in &tx.inputs {
            sequences.extend(input.sequence.to_le_bytes());
        }

        let mut outputs = Vec::new();
        for output in &tx.outputs {
            outputs.extend(output.value.to_le_bytes());
            outputs.extend(encode_varint(output.script_pubkey.len() as u64));
            outputs.extend(&output.script_pubkey);
        }

        Self {
            hash_prevouts: double_sha256(&prevouts),
            hash_sequence: double_sha256(&sequences),
            hash_outputs: double_sha256(&outputs),
        }
    }
}

/// BIP-143 SIGHASH_ALL digest for one segwit v0 input. `value` is the
/// amount of the output being spent.
pub fn segwit_v0_sighash_all(
    tx: &Transaction,
    parts: &SegwitSighashParts,
    input_index: usize,
    script_code: &[u8],
    value: u64,
) -> Result<Hash> {
    let input = tx.inputs.get(input_index).ok_or_else(|| {
        EngineError::MalformedTransaction(format!(
            "sign input index {} out of range for {} inputs",
            input_index,
            tx.inputs.len()
        ))
    })?;

    let mut preimage = Vec::new();
    preimage.extend(tx.version.to_le_bytes());
    preimage.extend(parts.hash_prevouts);
    preimage.extend(parts.hash_sequence);
    preimage.extend(input.prevout.hash);
    preimage.extend(input.prevout.index.to_le_bytes());
    preimage.extend(encode_varint(script_code.len() as u64));
    preimage.extend(script_code);
    preimage.extend(value.to_le_bytes());
    preimage.extend(input.sequence.to_le_bytes());
    preimage.extend(parts.hash_outputs);
    preimage.extend(tx.lock_time.to_le_bytes());
    preimage.extend(SIGHASH_ALL.to_le_bytes());

    Ok(double_sha256(&preimage))
}

/// The script code digested when signing a spend of `script`.
pub fn script_code_for(script: &LockingScript) -> Result<Vec<u8>> {
    match (script.kind, &script.spendable) {
        (ScriptType::P2wpkh, _) => {
            let program = script::witness_program(&script.data).ok_or_else(|| {
                EngineError::UnsupportedScriptType("malformed p2wpkh script".to_string())
            })?;
            let mut hash = [0u8; 20];
            hash.copy_from_slice(program);
            Ok(script::p2pkh(&hash))
        }
        (ScriptType::P2pkh, _) | (ScriptType::Multisig, _) => Ok(script.data.clone()),
        (ScriptType::P2sh, Spendable::Multisig { pubkeys, threshold }) => {
            script::multisig(pubkeys, *threshold)
        }
        (kind, _) => Err(EngineError::UnsupportedScriptType(format!(
            "no script code for input of type {kind:?}"
        ))),
    }
}

/// Digests for the requested sign inputs, in `sign_inputs` order.
///
/// `spent` must hold one entry per transaction input; entries are only
/// consulted for the inputs actually being signed.
pub fn hashes_to_sign(
    tx: &Transaction,
    spent: &[Option<SpentOutput>],
    sign_inputs: &[SignInput],
) -> Result<Vec<Hash>> {
    if spent.len() != tx.inputs.len() {
        return Err(EngineError::MalformedTransaction(format!(
            "{} spent outputs supplied for {} inputs",
            spent.len(),
            tx.inputs.len()
        )));
    }

    let parts = SegwitSighashParts::new(tx);
    let mut hashes = Vec::with_capacity(sign_inputs.len());
    for sign_input in sign_inputs {
        let index = sign_input.index;
        if index >= tx.inputs.len() {
            return Err(EngineError::MalformedTransaction(format!(
                "sign input index {} out of range for {} inputs",
                index,
                tx.inputs.len()
            )));
        }
        let spent_output = spent[index].as_ref().ok_or_else(|| {
            EngineError::MalformedTransaction(format!(
                "missing spent output data for input {index}"
            ))
        })?;

        let script_code = script_code_for(&spent_output.script)?;
        let digest = match spent_output.script.kind {
            ScriptType::P2wpkh => {
                segwit_v0_sighash_all(tx, &parts, index, &script_code, spent_output.value)?
            }
            _ => legacy_sighash_all(tx, index, &script_code)?,
        };
        hashes.push(digest);
    }
    Ok(hashes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OutPoint, TransactionInput, TransactionOutput};

    fn two_input_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![
                TransactionInput {
                    prevout: OutPoint {
                        hash: [0xaa; 32],
                        index: 0,
                    },
                    script_sig: vec![],
                    sequence: 0xffff_ffff,
                    witness: vec![],
                },
                TransactionInput {
                    prevout: OutPoint {
                        hash: [0xbb; 32],
                        index: 1,
                    },
                    script_sig: vec![],
                    sequence: 0xffff_ffff,
                    witness: vec![],
                },
            ],
            outputs: vec![TransactionOutput {
                value: 90_000,
                script_pubkey: crate::script::p2pkh(&[0x33; 20]),
            }],
            lock_time: 0,
        }
    }

    fn p2wpkh_spent(value: u64) -> SpentOutput {
        SpentOutput {
            value,
            script: LockingScript {
                data: crate::script::p2wpkh(0, &[0x42; 20]).unwrap(),
                kind: ScriptType::P2wpkh,
                spendable: Spendable::PublicKey(vec![0x02; 33]),
            },
        }
    }

    fn p2pkh_spent(value: u64) -> SpentOutput {
        SpentOutput {
            value,
            script: LockingScript {
                data: crate::script::p2pkh(&[0x42; 20]),
                kind: ScriptType::P2pkh,
                spendable: Spendable::PublicKey(vec![0x02; 33]),
            },
        }
    }

    #[test]
    fn test_legacy_digest_differs_per_input() {
        let tx = two_input_tx();
        let script_code = crate::script::p2pkh(&[0x42; 20]);
        let first = legacy_sighash_all(&tx, 0, &script_code).unwrap();
        let second = legacy_sighash_all(&tx, 1, &script_code).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_legacy_digest_is_deterministic() {
        let tx = two_input_tx();
        let script_code = crate::script::p2pkh(&[0x42; 20]);
        assert_eq!(
            legacy_sighash_all(&tx, 0, &script_code).unwrap(),
            legacy_sighash_all(&tx, 0, &script_code).unwrap()
        );
    }

    #[test]
    fn test_legacy_digest_matches_manual_preimage() {
        let tx = two_input_tx();
        let script_code = crate::script::p2pkh(&[0x42; 20]);
        let digest = legacy_sighash_all(&tx, 0, &script_code).unwrap();

        let mut copy = tx.clone();
        copy.inputs[0].script_sig = script_code;
        let mut preimage = serialize_transaction_no_witness(&copy);
        preimage.extend([0x01, 0x00, 0x00, 0x00]);
        assert_eq!(digest, double_sha256(&preimage));
    }

    #[test]
    fn test_legacy_out_of_range_index() {
        let tx = two_input_tx();
        assert!(matches!(
            legacy_sighash_all(&tx, 2, &[]),
            Err(EngineError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_segwit_parts_are_shared_across_inputs() {
        let tx = two_input_tx();
        let parts = SegwitSighashParts::new(&tx);
        let script_code = crate::script::p2pkh(&[0x42; 20]);

        let first = segwit_v0_sighash_all(&tx, &parts, 0, &script_code, 120_000).unwrap();
        let second = segwit_v0_sighash_all(&tx, &parts, 1, &script_code, 120_000).unwrap();
        assert_ne!(first, second);

        // Rebuilding the parts changes nothing: they are per-transaction
        let fresh = SegwitSighashParts::new(&tx);
        assert_eq!(parts, fresh);
        assert_eq!(
            segwit_v0_sighash_all(&tx, &fresh, 0, &script_code, 120_000).unwrap(),
            first
        );
    }

    #[test]
    fn test_segwit_digest_depends_on_value() {
        let tx = two_input_tx();
        let parts = SegwitSighashParts::new(&tx);
        let script_code = crate::script::p2pkh(&[0x42; 20]);

        let a = segwit_v0_sighash_all(&tx, &parts, 0, &script_code, 120_000).unwrap();
        let b = segwit_v0_sighash_all(&tx, &parts, 0, &script_code, 120_001).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_segwit_preimage_layout() {
        let tx = two_input_tx();
        let parts = SegwitSighashParts::new(&tx);
        let script_code = crate::script::p2pkh(&[0x42; 20]);
        let value = 120_000u64;

        let mut preimage = Vec::new();
        preimage.extend(1u32.to_le_bytes());
        preimage.extend(parts.hash_prevouts);
        preimage.extend(parts.hash_sequence);
        preimage.extend([0xaa; 32]);
        preimage.extend(0u32.to_le_bytes());
        preimage.extend(encode_varint(script_code.len() as u64));
        preimage.extend(&script_code);
        preimage.extend(value.to_le_bytes());
        preimage.extend(0xffff_ffffu32.to_le_bytes());
        preimage.extend(parts.hash_outputs);
        preimage.extend(0u32.to_le_bytes());
        preimage.extend(1u32.to_le_bytes());

        assert_eq!(
            segwit_v0_sighash_all(&tx, &parts, 0, &script_code, value).unwrap(),
            double_sha256(&preimage)
        );
    }

    #[test]
    fn test_hashes_to_sign_follows_request_order() {
        let tx = two_input_tx();
        let spent = vec![Some(p2wpkh_spent(100_000)), Some(p2pkh_spent(50_000))];

        let forward = hashes_to_sign(
            &tx,
            &spent,
            &[SignInput { index: 0 }, SignInput { index: 1 }],
        )
        .unwrap();
        let backward = hashes_to_sign(
            &tx,
            &spent,
            &[SignInput { index: 1 }, SignInput { index: 0 }],
        )
        .unwrap();

        assert_eq!(forward.len(), 2);
        assert_eq!(forward[0], backward[1]);
        assert_eq!(forward[1], backward[0]);
        assert_ne!(forward[0], forward[1]);
    }

    #[test]
    fn test_hashes_to_sign_mixed_types_branch_correctly() {
        let tx = two_input_tx();
        let spent = vec![Some(p2wpkh_spent(100_000)), Some(p2pkh_spent(50_000))];
        let hashes = hashes_to_sign(
            &tx,
            &spent,
            &[SignInput { index: 0 }, SignInput { index: 1 }],
        )
        .unwrap();

        let parts = SegwitSighashParts::new(&tx);
        let segwit_code = script_code_for(&spent[0].as_ref().unwrap().script).unwrap();
        let expected_segwit =
            segwit_v0_sighash_all(&tx, &parts, 0, &segwit_code, 100_000).unwrap();
        let legacy_code = script_code_for(&spent[1].as_ref().unwrap().script).unwrap();
        let expected_legacy = legacy_sighash_all(&tx, 1, &legacy_code).unwrap();

        assert_eq!(hashes, vec![expected_segwit, expected_legacy]);
    }

    #[test]
    fn test_hashes_to_sign_index_out_of_range() {
        let tx = two_input_tx();
        let spent = vec![Some(p2wpkh_spent(100_000)), Some(p2pkh_spent(50_000))];
        assert!(matches!(
            hashes_to_sign(&tx, &spent, &[SignInput { index: 2 }]),
            Err(EngineError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_hashes_to_sign_missing_spent_output() {
        let tx = two_input_tx();
        let spent = vec![Some(p2wpkh_spent(100_000)), None];
        assert!(matches!(
            hashes_to_sign(&tx, &spent, &[SignInput { index: 1 }]),
            Err(EngineError::MalformedTransaction(_))
        ));
    }

    #[test]
    fn test_script_code_for_p2wpkh_is_p2pkh_of_program() {
        let spent = p2wpkh_spent(1);
        let code = script_code_for(&spent.script).unwrap();
        assert_eq!(code, crate::script::p2pkh(&[0x42; 20]));
    }

    #[test]
    fn test_script_code_for_p2sh_multisig_is_redeem_script() {
        let pubkeys = vec![vec![0x02; 33], vec![0x03; 33]];
        let script = LockingScript {
            data: crate::script::p2sh(&[0x42; 20]),
            kind: ScriptType::P2sh,
            spendable: Spendable::Multisig {
                pubkeys: pubkeys.clone(),
                threshold: 1,
            },
        };
        assert_eq!(
            script_code_for(&script).unwrap(),
            crate::script::multisig(&pubkeys, 1).unwrap()
        );
    }

    #[test]
    fn test_script_code_for_bare_p2sh_rejected() {
        let script = LockingScript {
            data: crate::script::p2sh(&[0x42; 20]),
            kind: ScriptType::P2sh,
            spendable: Spendable::None,
        };
        assert!(matches!(
            script_code_for(&script),
            Err(EngineError::UnsupportedScriptType(_))
        ));
    }
}

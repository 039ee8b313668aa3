//! PSBT key-value-map container codec and signing flow
//!
//! The container is parsed positionally: the 5-byte magic, one global map,
//! then exactly `input_count` input maps and `output_count` output maps,
//! each terminated by a zero-length key. The counts come from the unsigned
//! transaction embedded in the global map — the codec itself never guesses
//! them, so [`PsbtKeyValueMap::parse`] takes them as arguments and
//! [`parse_psbt`] reads the global map first to recover them.
//!
//! Maps that are not touched by signing round-trip byte-for-byte.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

use crate::constants::{
    PSBT_GLOBAL_UNSIGNED_TX, PSBT_IN_FINAL_SCRIPTSIG, PSBT_IN_FINAL_SCRIPTWITNESS,
    PSBT_IN_PARTIAL_SIG, PSBT_IN_WITNESS_UTXO, PSBT_MAGIC,
};
use crate::encode::{decode_varint, encode_varint, read_u64_le, take};
use crate::error::{EngineError, Result};
use crate::script;
use crate::serializer::{
    der_signature, deserialize_transaction, deserialize_witness, serialize_transaction,
    serialize_witness,
};
use crate::sighash::{self, SpentOutput};
use crate::types::{
    Hash, LockingScript, ScriptType, SignatureInfo, SignInput, Spendable, Transaction,
    TransactionOutput,
};

/// Ordered key→value byte pairs of one PSBT map section
pub type KeyValuePairs = Vec<(Vec<u8>, Vec<u8>)>;

fn psbt_malformed(err: EngineError) -> EngineError {
    match err {
        EngineError::MalformedEncoding(msg) => EngineError::MalformedPsbt(msg),
        other => other,
    }
}

/// The three map sections of a PSBT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PsbtKeyValueMap {
    pub global_map: KeyValuePairs,
    pub input_maps: Vec<KeyValuePairs>,
    pub output_maps: Vec<KeyValuePairs>,
}

impl PsbtKeyValueMap {
    /// Parse a PSBT with caller-supplied section counts (derived from the
    /// embedded unsigned transaction; a mismatched count is a caller
    /// error and surfaces as a malformed container).
    pub fn parse(data: &[u8], input_count: usize, output_count: usize) -> Result<Self> {
        let magic = take(data, 0, PSBT_MAGIC.len()).map_err(psbt_malformed)?;
        if magic != PSBT_MAGIC {
            return Err(EngineError::MalformedPsbt(format!(
                "invalid magic {}",
                hex::encode(magic)
            )));
        }

        let mut offset = PSBT_MAGIC.len();
        let global_map = parse_map(data, &mut offset)?;

        let mut input_maps = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            input_maps.push(parse_map(data, &mut offset)?);
        }
        let mut output_maps = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            output_maps.push(parse_map(data, &mut offset)?);
        }

        if offset != data.len() {
            return Err(EngineError::MalformedPsbt(format!(
                "{} trailing bytes after output maps",
                data.len() - offset
            )));
        }

        Ok(Self {
            global_map,
            input_maps,
            output_maps,
        })
    }

    /// Re-serialize, preserving the order of every untouched pair.
    pub fn serialize(&self) -> Vec<u8> {
        let mut data = PSBT_MAGIC.to_vec();
        serialize_map(&mut data, &self.global_map);
        for map in &self.input_maps {
            serialize_map(&mut data, map);
        }
        for map in &self.output_maps {
            serialize_map(&mut data, map);
        }
        data
    }

    /// The raw unsigned transaction from the global map.
    pub fn unsigned_transaction(&self) -> Result<&[u8]> {
        self.global_map
            .iter()
            .find(|(key, _)| key.first() == Some(&PSBT_GLOBAL_UNSIGNED_TX))
            .map(|(_, value)| value.as_slice())
            .ok_or_else(|| {
                EngineError::MalformedPsbt("global map has no unsigned transaction".to_string())
            })
    }

    /// The witness UTXO of one input map, if present.
    pub fn witness_utxo(&self, input_index: usize) -> Result<Option<TransactionOutput>> {
        let map = self.input_maps.get(input_index).ok_or_else(|| {
            EngineError::MalformedPsbt(format!("no input map at index {input_index}"))
        })?;
        let Some((_, value)) = map
            .iter()
            .find(|(key, _)| key.first() == Some(&PSBT_IN_WITNESS_UTXO))
        else {
            return Ok(None);
        };

        let (amount, consumed) = read_u64_le(value, 0).map_err(psbt_malformed)?;
        let (script_len, n) = decode_varint(value, consumed).map_err(psbt_malformed)?;
        let script_start = consumed + n;
        let script_pubkey = take(value, script_start, script_len as usize)
            .map_err(psbt_malformed)?
            .to_vec();
        if script_start + script_len as usize != value.len() {
            return Err(EngineError::MalformedPsbt(
                "trailing bytes in witness utxo".to_string(),
            ));
        }
        Ok(Some(TransactionOutput {
            value: amount,
            script_pubkey,
        }))
    }

    fn insert_input_entry(&mut self, input_index: usize, key: Vec<u8>, value: Vec<u8>) {
        self.input_maps[input_index].push((key, value));
    }

    fn remove_input_entries(&mut self, input_index: usize, key_type: u8) {
        self.input_maps[input_index].retain(|(key, _)| key.first() != Some(&key_type));
    }
}

fn parse_map(data: &[u8], offset: &mut usize) -> Result<KeyValuePairs> {
    let mut pairs = Vec::new();
    loop {
        let (key_len, n) = decode_varint(data, *offset).map_err(psbt_malformed)?;
        *offset += n;
        if key_len == 0 {
            return Ok(pairs);
        }
        let key = take(data, *offset, key_len as usize)
            .map_err(psbt_malformed)?
            .to_vec();
        *offset += key_len as usize;

        let (value_len, n) = decode_varint(data, *offset).map_err(psbt_malformed)?;
        *offset += n;
        let value = take(data, *offset, value_len as usize)
            .map_err(psbt_malformed)?
            .to_vec();
        *offset += value_len as usize;

        pairs.push((key, value));
    }
}

fn serialize_map(data: &mut Vec<u8>, map: &KeyValuePairs) {
    for (key, value) in map {
        data.extend(encode_varint(key.len() as u64));
        data.extend(key);
        data.extend(encode_varint(value.len() as u64));
        data.extend(value);
    }
    data.push(0x00);
}

/// Parse a full PSBT: the global map is read first to recover the unsigned
/// transaction and its input/output counts, then the whole container is
/// parsed against those counts.
pub fn parse_psbt(data: &[u8]) -> Result<(PsbtKeyValueMap, Transaction)> {
    let magic = take(data, 0, PSBT_MAGIC.len()).map_err(psbt_malformed)?;
    if magic != PSBT_MAGIC {
        return Err(EngineError::MalformedPsbt(format!(
            "invalid magic {}",
            hex::encode(magic)
        )));
    }
    let mut offset = PSBT_MAGIC.len();
    let global_map = parse_map(data, &mut offset)?;
    let raw_tx = global_map
        .iter()
        .find(|(key, _)| key.first() == Some(&PSBT_GLOBAL_UNSIGNED_TX))
        .map(|(_, value)| value.as_slice())
        .ok_or_else(|| {
            EngineError::MalformedPsbt("global map has no unsigned transaction".to_string())
        })?;
    let tx = deserialize_transaction(raw_tx)?;

    let maps = PsbtKeyValueMap::parse(data, tx.inputs.len(), tx.outputs.len())?;
    Ok((maps, tx))
}

/// Rebuild the fully signed wire transaction from a finalized PSBT.
pub fn extract_transaction(maps: &PsbtKeyValueMap) -> Result<Vec<u8>> {
    let mut tx = deserialize_transaction(maps.unsigned_transaction()?)?;
    for (index, map) in maps.input_maps.iter().enumerate() {
        for (key, value) in map {
            match key.first() {
                Some(&PSBT_IN_FINAL_SCRIPTSIG) => {
                    tx.inputs[index].script_sig = value.clone();
                }
                Some(&PSBT_IN_FINAL_SCRIPTWITNESS) => {
                    tx.inputs[index].witness = deserialize_witness(value)?;
                }
                _ => {}
            }
        }
    }
    Ok(serialize_transaction(&tx))
}

/// Signing entry point for externally supplied PSBTs: computes the digests
/// an external signer must produce, then folds the returned signatures
/// back into a finalized container.
pub struct PsbtSigningBuilder;

impl PsbtSigningBuilder {
    /// Digests for the requested inputs, in request order.
    pub fn hashes_to_sign(psbt_base64: &str, sign_inputs: &[SignInput]) -> Result<Vec<Hash>> {
        let data = BASE64
            .decode(psbt_base64)
            .map_err(|e| EngineError::DecodingError(format!("invalid base64: {e}")))?;
        let (maps, tx) = parse_psbt(&data)?;

        let mut spent = Vec::with_capacity(tx.inputs.len());
        for index in 0..tx.inputs.len() {
            spent.push(maps.witness_utxo(index)?.map(spent_output));
        }

        sighash::hashes_to_sign(&tx, &spent, sign_inputs)
    }

    /// Fold external signatures into the PSBT as finalized scriptSig or
    /// witness entries, drop partial-signature keys, and re-encode.
    pub fn apply_signatures_and_finalize(
        psbt_base64: &str,
        sign_inputs: &[SignInput],
        signatures: &[SignatureInfo],
        public_key: &[u8],
    ) -> Result<String> {
        if signatures.len() != sign_inputs.len() {
            return Err(EngineError::SignatureCountMismatch {
                expected: sign_inputs.len(),
                actual: signatures.len(),
            });
        }

        let data = BASE64
            .decode(psbt_base64)
            .map_err(|e| EngineError::DecodingError(format!("invalid base64: {e}")))?;
        let (mut maps, tx) = parse_psbt(&data)?;

        for (sign_input, signature) in sign_inputs.iter().zip(signatures.iter()) {
            let index = sign_input.index;
            if index >= tx.inputs.len() {
                return Err(EngineError::MalformedPsbt(format!(
                    "sign input index {} out of range for {} inputs",
                    index,
                    tx.inputs.len()
                )));
            }
            let utxo = maps.witness_utxo(index)?.ok_or_else(|| {
                EngineError::MalformedPsbt(format!("input {index} has no witness utxo"))
            })?;

            let mut encoded = der_signature(&signature.signature)?;
            encoded.push(0x01);

            match script::classify(&utxo.script_pubkey) {
                ScriptType::P2wpkh => {
                    let witness = serialize_witness(&[encoded, public_key.to_vec()]);
                    maps.insert_input_entry(index, vec![PSBT_IN_FINAL_SCRIPTWITNESS], witness);
                }
                ScriptType::P2pkh => {
                    let mut script_sig = Vec::new();
                    script::push_data(&mut script_sig, &encoded);
                    script::push_data(&mut script_sig, public_key);
                    maps.insert_input_entry(index, vec![PSBT_IN_FINAL_SCRIPTSIG], script_sig);
                }
                kind => {
                    return Err(EngineError::UnsupportedScriptType(format!(
                        "cannot finalize input {index} of type {kind:?}"
                    )));
                }
            }
            maps.remove_input_entries(index, PSBT_IN_PARTIAL_SIG);
        }

        Ok(BASE64.encode(maps.serialize()))
    }
}

fn spent_output(utxo: TransactionOutput) -> SpentOutput {
    let kind = script::classify(&utxo.script_pubkey);
    SpentOutput {
        value: utxo.value,
        script: LockingScript {
            data: utxo.script_pubkey,
            kind,
            spendable: Spendable::None,
        },
    }
}

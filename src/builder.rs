//! Transaction builder façade
//!
//! Orchestrates the engine: pulls spend candidates from the unspent output
//! manager, selects inputs, shapes outputs, applies canonical ordering,
//! and drives the sighash builder (`build_for_sign`) and the serializer
//! (`build_for_send`).
//!
//! Both entry points derive the same pre-image from the same UTXO
//! snapshot, so a sign/send pair over an unchanged set selects identical
//! inputs and outputs in identical order — the digests produced by
//! `build_for_sign` are digests of exactly the bytes `build_for_send`
//! serializes. Nothing here mutates the manager; a failed build leaves no
//! trace.

use std::sync::Arc;

use crate::address::script_for_address;
use crate::constants::{DUST_LIMIT, TX_VERSION};
use crate::error::{EngineError, Result};
use crate::serializer::{apply_sort, TransactionSerializer};
use crate::sighash::{self, SpentOutput};
use crate::types::{
    Hash, PreImageOutput, PreImageTransaction, ScriptUnspentOutput, SignInput, SignatureInfo,
    SortType, TransferRequest,
};
use crate::unspent::UnspentOutputManager;

pub struct TransactionBuilder {
    manager: Arc<UnspentOutputManager>,
    /// Wallet addresses to draw spend candidates from, in priority order.
    /// When empty, only the request's source address is consulted.
    wallet_addresses: Vec<String>,
    version: u32,
    dust_limit: u64,
}

impl TransactionBuilder {
    pub fn new(manager: Arc<UnspentOutputManager>) -> Self {
        Self {
            manager,
            wallet_addresses: Vec::new(),
            version: TX_VERSION,
            dust_limit: DUST_LIMIT,
        }
    }

    pub fn with_wallet_addresses(mut self, addresses: Vec<String>) -> Self {
        self.wallet_addresses = addresses;
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_dust_limit(mut self, dust_limit: u64) -> Self {
        self.dust_limit = dust_limit;
        self
    }

    fn spend_candidates(&self, request: &TransferRequest) -> Vec<ScriptUnspentOutput> {
        if self.wallet_addresses.is_empty() {
            return self.manager.spendable_outputs(&request.source_address);
        }
        self.wallet_addresses
            .iter()
            .flat_map(|address| self.manager.spendable_outputs(address))
            .collect()
    }

    /// Deterministic input selection and output shaping for a transfer.
    ///
    /// Greedy accumulation over the spendable snapshot in stored order
    /// until the selected amount covers `amount + fee`. Change below the
    /// dust limit is absorbed into the fee instead of creating an output.
    pub fn pre_image(
        &self,
        request: &TransferRequest,
        sort_type: SortType,
    ) -> Result<PreImageTransaction> {
        let candidates = self.spend_candidates(request);
        let target = request.amount.checked_add(request.fee).ok_or(
            EngineError::InsufficientFunds {
                required: u64::MAX,
                available: 0,
            },
        )?;

        let mut selected: Vec<ScriptUnspentOutput> = Vec::new();
        let mut selected_amount = 0u64;
        for candidate in &candidates {
            if selected_amount >= target {
                break;
            }
            selected_amount += candidate.output.amount;
            selected.push(candidate.clone());
        }
        if selected_amount < target {
            let available = candidates.iter().map(|c| c.output.amount).sum();
            return Err(EngineError::InsufficientFunds {
                required: target,
                available,
            });
        }

        let destination_script = script_for_address(&request.destination_address)?;
        let mut outputs = vec![PreImageOutput::Destination {
            script: destination_script,
            value: request.amount,
        }];

        let change = selected_amount - target;
        let mut fee = request.fee;
        if change > self.dust_limit {
            let change_address = if request.change_address.is_empty() {
                &request.source_address
            } else {
                &request.change_address
            };
            outputs.push(PreImageOutput::Change {
                script: script_for_address(change_address)?,
                value: change,
            });
        } else {
            fee += change;
        }

        tracing::debug!(
            inputs = selected.len(),
            selected_amount,
            change,
            fee,
            "selected transaction pre-image"
        );

        let mut pre_image = PreImageTransaction {
            inputs: selected,
            outputs,
            fee,
        };
        apply_sort(&mut pre_image, sort_type);
        Ok(pre_image)
    }

    /// Digests for an external signer, one per selected input, in final
    /// input order.
    pub fn build_for_sign(
        &self,
        request: &TransferRequest,
        sequence: u32,
        sort_type: SortType,
    ) -> Result<Vec<Hash>> {
        let pre_image = self.pre_image(request, sort_type)?;
        let serializer = TransactionSerializer::new(self.version, sequence);
        let tx = serializer.unsigned_transaction(&pre_image)?;

        let spent: Vec<Option<SpentOutput>> = pre_image
            .inputs
            .iter()
            .map(|input| {
                Some(SpentOutput {
                    value: input.output.amount,
                    script: input.script.clone(),
                })
            })
            .collect();
        let sign_inputs: Vec<SignInput> = (0..tx.inputs.len())
            .map(|index| SignInput { index })
            .collect();

        sighash::hashes_to_sign(&tx, &spent, &sign_inputs)
    }

    /// Final transaction bytes, ready for broadcast. Repeats the selection
    /// of `build_for_sign` and merges in the returned signatures.
    pub fn build_for_send(
        &self,
        request: &TransferRequest,
        signatures: &[SignatureInfo],
        sequence: u32,
        sort_type: SortType,
    ) -> Result<Vec<u8>> {
        let pre_image = self.pre_image(request, sort_type)?;
        let serializer = TransactionSerializer::new(self.version, sequence);
        serializer.compile(&pre_image, signatures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::p2wpkh_address;
    use crate::types::{Address, UnspentOutput};

    const DESTINATION: &str = "bc1q67dmfccnax59247kshfkxcq6qr53wmwqfa4s28cupktj2amf5jus2j6qvt";

    fn wallet_address() -> Address {
        p2wpkh_address(&[0x02; 33], "bc").unwrap()
    }

    fn utxo(block_id: u64, hash: &str, index: u32, amount: u64) -> UnspentOutput {
        UnspentOutput {
            block_id,
            transaction_hash: hash.to_string(),
            index,
            amount,
        }
    }

    fn request(source: &str, amount: u64, fee: u64) -> TransferRequest {
        TransferRequest {
            amount,
            fee,
            source_address: source.to_string(),
            destination_address: DESTINATION.to_string(),
            change_address: String::new(),
        }
    }

    const TXID_A: &str = "8b907ad6ee8c6b1d25375ce9696089fec400851ca46260927d04892ec88807ef";
    const TXID_B: &str = "cffea3f46c73d61c6ed1296494b3c85e9f498629a32d67367a0d9e1bafdd05df";

    fn builder_with(outputs: Vec<UnspentOutput>) -> (TransactionBuilder, Address) {
        let address = wallet_address();
        let manager = Arc::new(UnspentOutputManager::new());
        manager.update(&address, outputs);
        (TransactionBuilder::new(manager), address)
    }

    #[test]
    fn test_greedy_selection_stops_when_covered() {
        let (builder, address) = builder_with(vec![
            utxo(700_000, TXID_A, 0, 50_000),
            utxo(700_001, TXID_B, 1, 80_000),
        ]);
        let pre_image = builder
            .pre_image(&request(&address.value, 30_000, 5_000), SortType::None)
            .unwrap();

        assert_eq!(pre_image.inputs.len(), 1);
        assert_eq!(pre_image.inputs[0].output.transaction_hash, TXID_A);
        // 50_000 - 35_000 = 15_000 change
        assert_eq!(pre_image.outputs.len(), 2);
        assert_eq!(pre_image.outputs[1].value(), 15_000);
        assert_eq!(pre_image.fee, 5_000);
    }

    #[test]
    fn test_insufficient_funds() {
        let (builder, address) = builder_with(vec![utxo(700_000, TXID_A, 0, 50_000)]);
        let result = builder.pre_image(&request(&address.value, 60_000, 1_000), SortType::None);
        assert_eq!(
            result,
            Err(EngineError::InsufficientFunds {
                required: 61_000,
                available: 50_000
            })
        );
    }

    #[test]
    fn test_unconfirmed_utxo_never_selected() {
        // A mempool-only output (block id 1) is excluded even though its
        // amount would cover the transfer
        let (builder, address) = builder_with(vec![
            utxo(1, TXID_A, 0, 1_000_000),
            utxo(700_000, TXID_B, 1, 40_000),
        ]);

        let pre_image = builder
            .pre_image(&request(&address.value, 30_000, 1_000), SortType::None)
            .unwrap();
        assert_eq!(pre_image.inputs.len(), 1);
        assert_eq!(pre_image.inputs[0].output.transaction_hash, TXID_B);

        let result = builder.pre_image(&request(&address.value, 100_000, 1_000), SortType::None);
        assert_eq!(
            result,
            Err(EngineError::InsufficientFunds {
                required: 101_000,
                available: 40_000
            })
        );
    }

    #[test]
    fn test_dust_change_absorbed_into_fee() {
        let (builder, address) = builder_with(vec![utxo(700_000, TXID_A, 0, 50_000)]);
        // Change would be 400 sat, below the dust limit
        let pre_image = builder
            .pre_image(&request(&address.value, 45_000, 4_600), SortType::None)
            .unwrap();

        assert_eq!(pre_image.outputs.len(), 1);
        assert_eq!(pre_image.fee, 5_000);
    }

    #[test]
    fn test_change_goes_to_change_address_when_set() {
        let (builder, address) = builder_with(vec![utxo(700_000, TXID_A, 0, 100_000)]);
        let mut req = request(&address.value, 30_000, 5_000);
        req.change_address = address.value.clone();

        let pre_image = builder.pre_image(&req, SortType::None).unwrap();
        assert_eq!(pre_image.outputs.len(), 2);
        assert_eq!(
            pre_image.outputs[1].script().data,
            address.locking_script.data
        );
    }

    #[test]
    fn test_sign_inputs_match_selection_count() {
        let (builder, address) = builder_with(vec![
            utxo(700_000, TXID_A, 0, 50_000),
            utxo(700_001, TXID_B, 1, 80_000),
        ]);
        let hashes = builder
            .build_for_sign(&request(&address.value, 100_000, 5_000), 0xffff_fffa, SortType::None)
            .unwrap();
        assert_eq!(hashes.len(), 2);
        assert_ne!(hashes[0], hashes[1]);
    }

    #[test]
    fn test_build_for_sign_is_deterministic() {
        let (builder, address) = builder_with(vec![
            utxo(700_000, TXID_A, 0, 50_000),
            utxo(700_001, TXID_B, 1, 80_000),
        ]);
        let req = request(&address.value, 100_000, 5_000);

        let first = builder
            .build_for_sign(&req, 0xffff_fffa, SortType::Bip69)
            .unwrap();
        let second = builder
            .build_for_sign(&req, 0xffff_fffa, SortType::Bip69)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_sort_changes_digests() {
        let (builder, address) = builder_with(vec![
            utxo(700_000, TXID_B, 1, 50_000),
            utxo(700_001, TXID_A, 0, 80_000),
        ]);
        let req = request(&address.value, 100_000, 5_000);

        let unsorted = builder
            .build_for_sign(&req, 0xffff_fffa, SortType::None)
            .unwrap();
        let sorted = builder
            .build_for_sign(&req, 0xffff_fffa, SortType::Bip69)
            .unwrap();
        assert_ne!(unsorted, sorted);
    }

    #[test]
    fn test_build_for_send_signature_count_checked() {
        let (builder, address) = builder_with(vec![
            utxo(700_000, TXID_A, 0, 50_000),
            utxo(700_001, TXID_B, 1, 80_000),
        ]);
        let req = request(&address.value, 100_000, 5_000);
        let one_signature = vec![SignatureInfo {
            signature: vec![0x20; 64],
            public_key: vec![0x02; 33],
            hash: vec![0x00; 32],
        }];

        assert_eq!(
            builder.build_for_send(&req, &one_signature, 0xffff_fffa, SortType::None),
            Err(EngineError::SignatureCountMismatch {
                expected: 2,
                actual: 1
            })
        );
    }
}

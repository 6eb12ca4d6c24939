// Copyright 2022. The Tari Project
//
// Redistribution and use in source and binary forms, with or without modification, are permitted provided that the
// following conditions are met:
//
// 1. Redistributions of source code must retain the above copyright notice, this list of conditions and the following
// disclaimer.
//
// 2. Redistributions in binary form must reproduce the above copyright notice, this list of conditions and the
// following disclaimer in the documentation and/or other materials provided with the distribution.
//
// 3. Neither the name of the copyright holder nor the names of its contributors may be used to endorse or promote
// products derived from this software without specific prior written permission.
//
// THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS" AND ANY EXPRESS OR IMPLIED WARRANTIES,
// INCLUDING, BUT NOT LIMITED TO, THE IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
// DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE FOR ANY DIRECT, INDIRECT, INCIDENTAL,
// SPECIAL, EXEMPLARY, OR CONSEQUENTIAL DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
// SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER CAUSED AND ON ANY THEORY OF LIABILITY,
// WHETHER IN CONTRACT, STRICT LIABILITY, OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE
// USE OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.

use std::collections::HashMap;

use mosaic_common_types::{
    chain_index::GroupIndex,
    epoch_time::EpochTime,
    types::{TokenId, U256},
};
use mosaic_storage::KeyValStore;

use crate::{
    consensus::ConsensusManager,
    proof_of_work::Target,
    state::CachedWorldState,
    transactions::{output_key, Amount, AssetOutput, AssetOutputRef, LockScript, Transaction, TxOutput},
    validation::TxValidationError,
    vm::{Address, StatefulVm, TxEnv},
};

/// Validates and applies one non-coinbase transaction against a group view: input resolution,
/// unlock scripts, time locks, optional script execution, and the per-token balance rule.
pub struct TxValidator {
    rules: ConsensusManager,
}

impl TxValidator {
    pub fn new(rules: ConsensusManager) -> Self {
        Self { rules }
    }

    /// On success the view reflects the transaction (inputs spent, group-local outputs added) and
    /// the gas fee is returned for coinbase accounting.
    pub fn validate_and_apply<S: KeyValStore + Clone>(
        &self,
        tx: &Transaction,
        view: &mut CachedWorldState<S>,
        view_group: GroupIndex,
        block_ts: EpochTime,
        block_target: Target,
    ) -> Result<Amount, TxValidationError> {
        let constants = self.rules.consensus_constants();
        if tx.gas_amount() < constants.minimal_gas {
            return Err(TxValidationError::InvalidGasAmount);
        }

        // Resolve and spend the inputs
        let mut input_outputs: Vec<AssetOutput> = Vec::with_capacity(tx.inputs().len());
        let mut input_addresses: Vec<Address> = Vec::with_capacity(tx.inputs().len());
        for (index, input) in tx.inputs().iter().enumerate() {
            let output = view
                .use_asset(&input.output_ref)
                .map_err(|_| TxValidationError::NonExistentInput)?;
            if output.lock_time > block_ts {
                return Err(TxValidationError::TimeLockedOutput);
            }
            let key_hash = match &output.lock_script {
                LockScript::P2pkh(hash) => *hash,
                LockScript::P2c(_) => return Err(TxValidationError::NonExistentInput),
            };
            tx.verify_input_unlock(index, &key_hash)?;
            input_addresses.push(Address::Asset(key_hash));
            input_outputs.push(output);
        }

        // Execute the script, if any, against the same view
        let mut generated = tx.generated_outputs.clone();
        let mut contract_inputs = Vec::new();
        if let Some(script) = &tx.unsigned.script {
            let env = TxEnv {
                tx_id: tx.id(),
                block_ts,
                block_target,
                network_id: self.rules.network().wire_id(),
                groups: constants.groups,
                dust_utxo_amount: constants.dust_utxo_amount,
                fixed_output_count: tx.fixed_outputs().len(),
                input_addresses,
                input_outputs: input_outputs.clone(),
            };
            let result = StatefulVm::execute(view, &env, script, tx.gas_amount().0)
                .map_err(TxValidationError::TxScriptExeFailed)?;
            generated = result.generated_outputs;
            contract_inputs = result.contract_inputs;
        }

        self.check_balance(tx, &input_outputs, &contract_inputs, &generated)?;

        // Group-local outputs become spendable within the remainder of the block
        let groups = constants.groups;
        let tx_id = tx.id();
        for (index, output) in tx.fixed_outputs().iter().enumerate() {
            if output.group_index(groups) == view_group {
                let output_ref = AssetOutputRef::new(view_group, output_key(&tx_id, index as u32));
                view.add_asset(output_ref, output.clone());
            }
        }
        for (offset, output) in generated.iter().enumerate() {
            if let TxOutput::Asset(output) = output {
                if output.group_index(groups) == view_group {
                    let index = (tx.fixed_outputs().len() + offset) as u32;
                    let output_ref = AssetOutputRef::new(view_group, output_key(&tx_id, index));
                    view.add_asset(output_ref, output.clone());
                }
            }
        }

        Ok(tx.gas_fee())
    }

    /// Inputs must cover outputs plus the gas fee for the native coin, and cover outputs exactly
    /// per token.
    fn check_balance(
        &self,
        tx: &Transaction,
        input_outputs: &[AssetOutput],
        contract_inputs: &[(crate::transactions::ContractOutputRef, crate::transactions::ContractOutput)],
        generated: &[TxOutput],
    ) -> Result<(), TxValidationError> {
        let mut coin_in = U256::zero();
        let mut tokens_in: HashMap<TokenId, U256> = HashMap::new();
        for output in input_outputs {
            coin_in = coin_in.saturating_add(output.amount.0);
            for (token, amount) in &output.tokens {
                let entry = tokens_in.entry(*token).or_insert_with(U256::zero);
                *entry = entry.saturating_add(amount.0);
            }
        }
        for (_, output) in contract_inputs {
            coin_in = coin_in.saturating_add(output.amount.0);
            for (token, amount) in &output.tokens {
                let entry = tokens_in.entry(*token).or_insert_with(U256::zero);
                *entry = entry.saturating_add(amount.0);
            }
        }

        let mut coin_out = tx.gas_fee().0;
        let mut tokens_out: HashMap<TokenId, U256> = HashMap::new();
        let mut tally = |amount: Amount, tokens: &[(TokenId, Amount)]| {
            coin_out = coin_out.saturating_add(amount.0);
            for (token, token_amount) in tokens {
                let entry = tokens_out.entry(*token).or_insert_with(U256::zero);
                *entry = entry.saturating_add(token_amount.0);
            }
        };
        for output in tx.fixed_outputs() {
            tally(output.amount, &output.tokens);
        }
        for output in generated {
            match output {
                TxOutput::Asset(output) => tally(output.amount, &output.tokens),
                TxOutput::Contract(output) => tally(output.amount, &output.tokens),
            }
        }
        drop(tally);

        if coin_in < coin_out {
            return Err(TxValidationError::InvalidBalance);
        }
        for (token, amount_out) in &tokens_out {
            let amount_in = tokens_in.get(token).copied().unwrap_or_default();
            if amount_in < *amount_out {
                return Err(TxValidationError::InvalidTokenBalance);
            }
        }
        Ok(())
    }
}

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

use std::collections::HashSet;

use log::*;
use mosaic_common_types::chain_index::ChainIndex;
use mosaic_storage::KeyValStore;

use crate::{
    blocks::Block,
    consensus::ConsensusManager,
    state::CachedWorldState,
    transactions::{Amount, AssetOutputRef, Transaction},
    validation::{TxValidator, ValidationError},
};

const LOG_TARGET: &str = "c::val::block";

/// The full-block validation pipeline: group, shape, gas ordering, Merkle root, block-flow
/// conflicts, per-transaction checks and the coinbase contract.
pub struct BlockValidator {
    rules: ConsensusManager,
    tx_validator: TxValidator,
}

impl BlockValidator {
    pub fn new(rules: ConsensusManager) -> Self {
        let tx_validator = TxValidator::new(rules.clone());
        Self { rules, tx_validator }
    }

    pub fn tx_validator(&self) -> &TxValidator {
        &self.tx_validator
    }

    /// Validate `block` and apply its transactions to `view`. `flow_spent` is the set of outputs
    /// spent by blocks reachable through this block's deps. Returns the total gas fee.
    pub fn check_block<S: KeyValStore + Clone>(
        &self,
        block: &Block,
        chain_index: ChainIndex,
        height: u64,
        view: &mut CachedWorldState<S>,
        flow_spent: &HashSet<AssetOutputRef>,
    ) -> Result<Amount, ValidationError> {
        let constants = self.rules.consensus_constants();

        self.check_group(chain_index)?;
        self.check_non_empty_transactions(block)?;
        self.check_tx_number(block)?;
        self.check_gas_price_decreasing(block)?;
        self.check_total_gas(block)?;
        self.check_merkle_root(block)?;
        self.check_flow(block, flow_spent)?;

        // Within-block double spends across all non-coinbase transactions
        let mut seen: HashSet<AssetOutputRef> = HashSet::new();
        for tx in block.non_coinbase() {
            for input in tx.inputs() {
                if !seen.insert(input.output_ref) {
                    return Err(ValidationError::BlockDoubleSpending);
                }
            }
        }

        // Non-coinbase transactions execute in the header-derived pseudo-random order so the gas
        // fee and post-state are identical on every honest node
        let mut total_fee = Amount::zero();
        let order = block.non_coinbase_execution_order();
        let non_coinbase = block.non_coinbase();
        for index in order {
            let tx = &non_coinbase[index];
            let fee = self
                .tx_validator
                .validate_and_apply(tx, view, chain_index.from, block.header.timestamp, block.header.target)
                .map_err(ValidationError::ExistInvalidTx)?;
            total_fee = total_fee.saturating_add(fee);
        }

        let coinbase = block.coinbase().ok_or(ValidationError::EmptyTransactionList)?;
        self.check_coinbase(coinbase, block, chain_index, height, total_fee)?;

        // The miner's output joins the view when it pays into this group; other groups pick it up
        // when they fold this block through their in-deps
        let coinbase_id = coinbase.id();
        for (index, output) in coinbase.fixed_outputs().iter().enumerate() {
            if output.group_index(constants.groups) == chain_index.from {
                let output_ref = crate::transactions::AssetOutputRef::new(
                    chain_index.from,
                    crate::transactions::output_key(&coinbase_id, index as u32),
                );
                view.add_asset(output_ref, output.clone());
            }
        }

        debug!(
            target: LOG_TARGET,
            "Block {} validated: {} txs, total fee {}",
            block.hash(),
            block.transactions.len(),
            total_fee
        );
        Ok(total_fee)
    }

    fn check_group(&self, chain_index: ChainIndex) -> Result<(), ValidationError> {
        let broker = self.rules.consensus_constants().broker_info();
        if !broker.contains_group(chain_index.from) {
            return Err(ValidationError::InvalidGroup);
        }
        Ok(())
    }

    fn check_non_empty_transactions(&self, block: &Block) -> Result<(), ValidationError> {
        if block.transactions.is_empty() {
            return Err(ValidationError::EmptyTransactionList);
        }
        Ok(())
    }

    fn check_tx_number(&self, block: &Block) -> Result<(), ValidationError> {
        if block.transactions.len() > self.rules.consensus_constants().max_txs_per_block {
            return Err(ValidationError::TooManyTransactions);
        }
        Ok(())
    }

    /// Scanning first to last, gas prices must never increase; the coinbase is exempt.
    fn check_gas_price_decreasing(&self, block: &Block) -> Result<(), ValidationError> {
        let prices: Vec<_> = block.non_coinbase().iter().map(Transaction::gas_price).collect();
        for pair in prices.windows(2) {
            if pair[0] < pair[1] {
                return Err(ValidationError::TxGasPriceNonDecreasing);
            }
        }
        Ok(())
    }

    fn check_total_gas(&self, block: &Block) -> Result<(), ValidationError> {
        if block.total_gas() > self.rules.consensus_constants().max_gas_per_block {
            return Err(ValidationError::TooManyGasUsed);
        }
        Ok(())
    }

    fn check_merkle_root(&self, block: &Block) -> Result<(), ValidationError> {
        if block.merkle_root() != block.header.txs_hash {
            return Err(ValidationError::InvalidTxsMerkleRoot);
        }
        Ok(())
    }

    /// No input of this block may be spent by a block reachable through its deps.
    fn check_flow(&self, block: &Block, flow_spent: &HashSet<AssetOutputRef>) -> Result<(), ValidationError> {
        for tx in block.non_coinbase() {
            for input in tx.inputs() {
                if flow_spent.contains(&input.output_ref) {
                    return Err(ValidationError::InvalidFlowTxs);
                }
            }
        }
        Ok(())
    }

    fn check_coinbase(
        &self,
        coinbase: &Transaction,
        block: &Block,
        chain_index: ChainIndex,
        height: u64,
        total_fee: Amount,
    ) -> Result<(), ValidationError> {
        let constants = self.rules.consensus_constants();

        // One fixed output pays the miner (PoW); two add the burn sink (PoLW)
        let outputs = coinbase.fixed_outputs();
        let shape_is_valid = coinbase.unsigned.script.is_none() &&
            coinbase.gas_amount() == constants.minimal_gas &&
            coinbase.gas_price() == constants.minimal_gas_price &&
            coinbase.inputs().is_empty() &&
            (outputs.len() == 1 || outputs.len() == 2) &&
            outputs.iter().all(|output| output.tokens.is_empty()) &&
            coinbase.contract_inputs.is_empty() &&
            coinbase.generated_outputs.is_empty() &&
            coinbase.input_signatures.is_empty() &&
            coinbase.contract_signatures.is_empty();
        if !shape_is_valid {
            return Err(ValidationError::InvalidCoinbaseFormat);
        }

        let data = coinbase.coinbase_data().ok_or(ValidationError::InvalidCoinbaseData)?;
        if data.from_group != chain_index.from.0 ||
            data.to_group != chain_index.to.0 ||
            data.block_ts != block.header.timestamp
        {
            return Err(ValidationError::InvalidCoinbaseData);
        }

        let miner_output = &outputs[0];
        if outputs.iter().any(|output| output.amount.is_zero()) {
            return Err(ValidationError::InvalidCoinbaseLockedAmount);
        }
        // Miner and burn-sink outputs together mint exactly the total reward
        let paid: Amount = outputs.iter().map(|output| output.amount).sum();
        let expected = self.rules.total_reward(total_fee, height);
        if paid != expected {
            return Err(ValidationError::InvalidCoinbaseReward);
        }
        if miner_output.lock_time != block.header.timestamp + constants.coinbase_lockup_period {
            return Err(ValidationError::InvalidCoinbaseLockupPeriod);
        }
        Ok(())
    }
}

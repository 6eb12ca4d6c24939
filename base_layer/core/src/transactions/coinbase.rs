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

use borsh::{BorshDeserialize, BorshSerialize};
use mosaic_common_types::{chain_index::ChainIndex, epoch_time::EpochTime};
use serde::{Deserialize, Serialize};

use crate::transactions::{
    transaction::{GasBox, GasPrice, Transaction, UnsignedTransaction},
    transaction_output::{AssetOutput, LockScript},
    Amount,
};

/// Self-describing payload carried in the first output of every coinbase; validators check it
/// against the enclosing block's chain index and timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CoinbaseData {
    pub from_group: u32,
    pub to_group: u32,
    pub block_ts: EpochTime,
}

impl Transaction {
    /// The deterministic miner-payout transaction placed last in every block. The miner output is
    /// time-locked for the coinbase lockup period and tagged with the chain and timestamp of the
    /// block it pays for.
    pub fn coinbase(
        chain_index: ChainIndex,
        total_reward: Amount,
        miner_lock_script: LockScript,
        block_ts: EpochTime,
        coinbase_lockup_period: u64,
        minimal_gas: GasBox,
        minimal_gas_price: GasPrice,
    ) -> Self {
        Self::coinbase_inner(
            chain_index,
            total_reward,
            miner_lock_script,
            None,
            block_ts,
            coinbase_lockup_period,
            minimal_gas,
            minimal_gas_price,
        )
    }

    /// The proof-of-less-work coinbase: `burn_amount` of the total reward is paid into the burn
    /// sink as a second fixed output, the miner keeps the rest.
    #[allow(clippy::too_many_arguments)]
    pub fn coinbase_polw(
        chain_index: ChainIndex,
        total_reward: Amount,
        burn_amount: Amount,
        miner_lock_script: LockScript,
        burn_lock_script: LockScript,
        block_ts: EpochTime,
        coinbase_lockup_period: u64,
        minimal_gas: GasBox,
        minimal_gas_price: GasPrice,
    ) -> Self {
        Self::coinbase_inner(
            chain_index,
            total_reward,
            miner_lock_script,
            Some((burn_amount, burn_lock_script)),
            block_ts,
            coinbase_lockup_period,
            minimal_gas,
            minimal_gas_price,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn coinbase_inner(
        chain_index: ChainIndex,
        total_reward: Amount,
        miner_lock_script: LockScript,
        burn: Option<(Amount, LockScript)>,
        block_ts: EpochTime,
        coinbase_lockup_period: u64,
        minimal_gas: GasBox,
        minimal_gas_price: GasPrice,
    ) -> Self {
        let data = CoinbaseData {
            from_group: chain_index.from.0,
            to_group: chain_index.to.0,
            block_ts,
        };
        let additional_data =
            borsh::to_vec(&data).expect("borsh serialization of an in-memory value cannot fail");
        let miner_amount = match &burn {
            Some((burn_amount, _)) => total_reward.checked_sub(*burn_amount).unwrap_or_else(Amount::zero),
            None => total_reward,
        };
        let mut fixed_outputs = vec![AssetOutput::new(miner_amount, miner_lock_script)
            .with_lock_time(block_ts + coinbase_lockup_period)
            .with_additional_data(additional_data)];
        if let Some((burn_amount, burn_lock_script)) = burn {
            fixed_outputs.push(AssetOutput::new(burn_amount, burn_lock_script));
        }
        let unsigned = UnsignedTransaction {
            script: None,
            gas_amount: minimal_gas,
            gas_price: minimal_gas_price,
            inputs: Vec::new(),
            fixed_outputs,
        };
        Transaction::from_unsigned(unsigned, Vec::new())
    }

    /// Decode the coinbase payload of this transaction, if well-formed.
    pub fn coinbase_data(&self) -> Option<CoinbaseData> {
        let output = self.unsigned.fixed_outputs.first()?;
        borsh::from_slice(&output.additional_data).ok()
    }
}

#[cfg(test)]
mod tests {
    use mosaic_common_types::types::FixedHash;

    use super::*;

    #[test]
    fn coinbase_data_round_trips() {
        let chain_index = ChainIndex::unchecked(1, 2);
        let ts = EpochTime::from_millis(1_000_000);
        let coinbase = Transaction::coinbase(
            chain_index,
            Amount::from_u64(5_000),
            LockScript::P2pkh(FixedHash::from([7u8; 32])),
            ts,
            600_000,
            GasBox(20_000),
            GasPrice(Amount::from_u64(1)),
        );
        let data = coinbase.coinbase_data().unwrap();
        assert_eq!(data.from_group, 1);
        assert_eq!(data.to_group, 2);
        assert_eq!(data.block_ts, ts);
        assert_eq!(coinbase.fixed_outputs().len(), 1);
        assert_eq!(coinbase.fixed_outputs()[0].lock_time, ts + 600_000);
        assert!(coinbase.inputs().is_empty());
        assert!(coinbase.unsigned.script.is_none());
    }

    #[test]
    fn polw_coinbase_splits_the_reward_into_miner_and_burn_outputs() {
        let chain_index = ChainIndex::unchecked(0, 1);
        let ts = EpochTime::from_millis(2_000_000);
        let coinbase = Transaction::coinbase_polw(
            chain_index,
            Amount::from_u64(5_000),
            Amount::from_u64(1_500),
            LockScript::P2pkh(FixedHash::from([7u8; 32])),
            LockScript::P2pkh(FixedHash::zero()),
            ts,
            600_000,
            GasBox(20_000),
            GasPrice(Amount::from_u64(1)),
        );
        let outputs = coinbase.fixed_outputs();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].amount, Amount::from_u64(3_500));
        assert_eq!(outputs[1].amount, Amount::from_u64(1_500));
        // Only the miner output is time-locked and carries the coinbase payload
        assert_eq!(outputs[0].lock_time, ts + 600_000);
        assert_eq!(outputs[1].lock_time, EpochTime::from_millis(0));
        assert!(outputs[1].additional_data.is_empty());
        let data = coinbase.coinbase_data().unwrap();
        assert_eq!(data.from_group, 0);
        assert_eq!(data.to_group, 1);
    }
}

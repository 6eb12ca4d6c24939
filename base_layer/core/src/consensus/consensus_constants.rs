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

use mosaic_common_types::{chain_index::BrokerInfo, epoch_time::EpochTime, types::U256};

use crate::{
    consensus::Network,
    proof_of_work::{RetargetParams, Target},
    transactions::{Amount, GasBox, GasPrice},
};

/// Every consensus-critical parameter of a network, plus the node's broker assignment and the
/// capacities of the in-core caches and pools.
#[derive(Clone, Debug)]
pub struct ConsensusConstants {
    pub groups: u32,
    pub broker_num: u32,
    pub broker_id: u32,

    /// Ideal block interval per chain, in milliseconds
    pub block_target_time: u64,
    /// Number of blocks averaged by the difficulty window
    pub pow_averaging_window: u64,
    pub max_mining_target: Target,
    pub window_time_span_min: u64,
    pub window_time_span_max: u64,

    pub max_txs_per_block: usize,
    pub max_gas_per_block: u64,
    pub minimal_gas: GasBox,
    pub minimal_gas_price: GasPrice,
    pub coinbase_lockup_period: u64,
    pub dust_utxo_amount: Amount,

    pub genesis_timestamp: EpochTime,

    pub block_cache_capacity_per_chain: usize,
    pub header_cache_capacity: usize,
    pub state_cache_capacity: usize,
    pub mempool_shared_capacity: usize,
    pub mempool_pending_capacity: usize,
    pub orphan_pool_capacity: usize,
    pub max_sync_hashes: usize,

    // Exported to the network collaborator; unused by the core itself
    pub max_outbound_connections_per_group: usize,
    pub max_inbound_connections_per_group: usize,
}

impl ConsensusConstants {
    /// The ideal duration of `pow_averaging_window + 1` consecutive blocks.
    pub fn expected_window_time_span(&self) -> u64 {
        (self.pow_averaging_window + 1) * self.block_target_time
    }

    pub fn retarget_params(&self) -> RetargetParams {
        RetargetParams {
            expected_window_time_span: self.expected_window_time_span(),
            window_time_span_min: self.window_time_span_min,
            window_time_span_max: self.window_time_span_max,
            max_mining_target: self.max_mining_target,
        }
    }

    pub fn broker_info(&self) -> BrokerInfo {
        BrokerInfo {
            broker_id: self.broker_id,
            broker_num: self.broker_num,
            groups: self.groups,
        }
    }
}

/// Builder for [`ConsensusConstants`] starting from per-network defaults; tests override the
/// handful of parameters they exercise.
pub struct ConsensusConstantsBuilder {
    constants: ConsensusConstants,
}

impl ConsensusConstantsBuilder {
    pub fn new(network: Network) -> Self {
        let max_mining_target = match network {
            Network::MainNet => Target(U256::MAX >> 18),
            Network::TestNet => Target(U256::MAX >> 10),
            Network::LocalNet => Target::max(),
        };
        let block_target_time = 64_000;
        let pow_averaging_window = 17;
        let expected = (pow_averaging_window + 1) * block_target_time;
        Self {
            constants: ConsensusConstants {
                groups: 4,
                broker_num: 1,
                broker_id: 0,
                block_target_time,
                pow_averaging_window,
                max_mining_target,
                window_time_span_min: expected * 9 / 10,
                window_time_span_max: expected * 11 / 10,
                max_txs_per_block: 1000,
                max_gas_per_block: 10_000_000,
                minimal_gas: GasBox(20_000),
                minimal_gas_price: GasPrice(Amount::from_u64(100)),
                coinbase_lockup_period: 500 * 60 * 1000,
                dust_utxo_amount: Amount::from_u64(1_000),
                genesis_timestamp: EpochTime::from_millis(1_231_006_505_000),
                block_cache_capacity_per_chain: 128,
                header_cache_capacity: 4096,
                state_cache_capacity: 1024,
                mempool_shared_capacity: 1024,
                mempool_pending_capacity: 256,
                orphan_pool_capacity: 256,
                max_sync_hashes: 1000,
                max_outbound_connections_per_group: 16,
                max_inbound_connections_per_group: 32,
            },
        }
    }

    pub fn with_groups(mut self, groups: u32) -> Self {
        self.constants.groups = groups;
        self
    }

    pub fn with_broker(mut self, broker_id: u32, broker_num: u32) -> Self {
        self.constants.broker_id = broker_id;
        self.constants.broker_num = broker_num;
        self
    }

    pub fn with_block_target_time(mut self, millis: u64) -> Self {
        self.constants.block_target_time = millis;
        let expected = (self.constants.pow_averaging_window + 1) * millis;
        self.constants.window_time_span_min = expected * 9 / 10;
        self.constants.window_time_span_max = expected * 11 / 10;
        self
    }

    pub fn with_pow_averaging_window(mut self, window: u64) -> Self {
        self.constants.pow_averaging_window = window;
        let expected = (window + 1) * self.constants.block_target_time;
        self.constants.window_time_span_min = expected * 9 / 10;
        self.constants.window_time_span_max = expected * 11 / 10;
        self
    }

    pub fn with_max_txs_per_block(mut self, max: usize) -> Self {
        self.constants.max_txs_per_block = max;
        self
    }

    pub fn with_max_gas_per_block(mut self, max: u64) -> Self {
        self.constants.max_gas_per_block = max;
        self
    }

    pub fn with_mempool_capacities(mut self, shared: usize, pending: usize) -> Self {
        self.constants.mempool_shared_capacity = shared;
        self.constants.mempool_pending_capacity = pending;
        self
    }

    pub fn build(self) -> ConsensusConstants {
        self.constants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds_follow_target_time() {
        let constants = ConsensusConstantsBuilder::new(Network::LocalNet)
            .with_block_target_time(1_000)
            .with_pow_averaging_window(9)
            .build();
        assert_eq!(constants.expected_window_time_span(), 10_000);
        assert_eq!(constants.window_time_span_min, 9_000);
        assert_eq!(constants.window_time_span_max, 11_000);
    }

    #[test]
    fn broker_info_reflects_constants() {
        let constants = ConsensusConstantsBuilder::new(Network::LocalNet)
            .with_groups(4)
            .with_broker(1, 2)
            .build();
        let broker = constants.broker_info();
        assert_eq!(broker.groups_per_broker(), 2);
        assert!(broker.contains_group(mosaic_common_types::chain_index::GroupIndex(2)));
    }
}

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

use std::sync::Arc;

use mosaic_common_types::chain_index::ChainIndex;
use once_cell::sync::OnceCell;

use crate::{
    blocks::{genesis_block, Block},
    consensus::{ConsensusConstants, ConsensusConstantsBuilder, EmissionSchedule, Network},
    transactions::Amount,
};

/// Owns the consensus rules of a network: constants, the emission schedule and the per-chain
/// genesis blocks. Cheap to clone and share.
#[derive(Clone)]
pub struct ConsensusManager {
    inner: Arc<ConsensusManagerInner>,
}

struct ConsensusManagerInner {
    network: Network,
    constants: ConsensusConstants,
    emission: EmissionSchedule,
    /// Row-major grid of genesis blocks, built on first use
    genesis_blocks: OnceCell<Vec<Block>>,
}

impl ConsensusManager {
    pub fn builder(network: Network) -> ConsensusManagerBuilder {
        ConsensusManagerBuilder::new(network)
    }

    pub fn network(&self) -> Network {
        self.inner.network
    }

    pub fn consensus_constants(&self) -> &ConsensusConstants {
        &self.inner.constants
    }

    pub fn emission_schedule(&self) -> &EmissionSchedule {
        &self.inner.emission
    }

    pub fn genesis_block(&self, chain_index: ChainIndex) -> Block {
        let groups = self.inner.constants.groups;
        let blocks = self.inner.genesis_blocks.get_or_init(|| {
            (0..groups)
                .flat_map(|from| {
                    (0..groups).map(move |to| ChainIndex::unchecked(from, to))
                })
                .map(|chain_index| genesis_block(chain_index, &self.inner.constants))
                .collect()
        });
        blocks[chain_index.flat_index(groups) as usize].clone()
    }

    pub fn miner_reward(&self, height: u64) -> Amount {
        self.inner.emission.miner_reward(height)
    }

    pub fn total_reward(&self, gas_fee: Amount, height: u64) -> Amount {
        let miner_reward = self.miner_reward(height);
        self.inner.emission.total_reward(gas_fee, miner_reward)
    }
}

pub struct ConsensusManagerBuilder {
    network: Network,
    constants: Option<ConsensusConstants>,
    emission: Option<EmissionSchedule>,
}

impl ConsensusManagerBuilder {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            constants: None,
            emission: None,
        }
    }

    pub fn with_consensus_constants(mut self, constants: ConsensusConstants) -> Self {
        self.constants = Some(constants);
        self
    }

    pub fn with_emission_schedule(mut self, emission: EmissionSchedule) -> Self {
        self.emission = Some(emission);
        self
    }

    pub fn build(self) -> ConsensusManager {
        let constants = self
            .constants
            .unwrap_or_else(|| ConsensusConstantsBuilder::new(self.network).build());
        let emission = self
            .emission
            .unwrap_or_else(|| EmissionSchedule::new(Amount::from_u64(5_000_000_000), 2_100_000));
        ConsensusManager {
            inner: Arc::new(ConsensusManagerInner {
                network: self.network,
                constants,
                emission,
                genesis_blocks: OnceCell::new(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_blocks_differ_per_chain() {
        let manager = ConsensusManager::builder(Network::LocalNet).build();
        let a = manager.genesis_block(ChainIndex::unchecked(0, 0));
        let b = manager.genesis_block(ChainIndex::unchecked(0, 1));
        assert_ne!(a.hash(), b.hash());
        // Deterministic per chain
        assert_eq!(a.hash(), manager.genesis_block(ChainIndex::unchecked(0, 0)).hash());
    }
}

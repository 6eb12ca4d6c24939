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

#[allow(dead_code)]
mod helpers;

use mosaic_common_types::{chain_index::ChainIndex, epoch_time::EpochTime, types::BlockHash};
use mosaic_core::{
    blocks::{Block, BlockDeps, BlockHeader},
    chain_storage::ChainTree,
    consensus::{ConsensusConstantsBuilder, ConsensusManager, Network},
    proof_of_work::{digi_shield_retarget, Target, Weight},
    validation::HeaderValidator,
};
use mosaic_storage::MemoryStore;

fn short_window_rules() -> ConsensusManager {
    let constants = ConsensusConstantsBuilder::new(Network::TestNet)
        .with_groups(1)
        .with_block_target_time(1_000)
        .with_pow_averaging_window(3)
        .build();
    ConsensusManager::builder(Network::TestNet)
        .with_consensus_constants(constants)
        .build()
}

fn make_block(parent: BlockHash, timestamp: EpochTime, target: Target, nonce: u64) -> Block {
    Block::new(
        BlockHeader {
            deps: BlockDeps::build(vec![], vec![parent], 1).unwrap(),
            dep_state_hash: Default::default(),
            txs_hash: Default::default(),
            timestamp,
            target,
            nonce,
        },
        vec![],
    )
}

/// Grow a chain whose every block carries the target the validator expects, with a fixed block
/// spacing. Returns the tree and the last block's hash.
fn grow_chain(rules: &ConsensusManager, spacing_ms: u64, blocks: u64) -> (ChainTree<MemoryStore>, BlockHash) {
    let chain_index = ChainIndex::unchecked(0, 0);
    let genesis = rules.genesis_block(chain_index);
    let genesis_ts = genesis.header.timestamp;
    let mut tree = ChainTree::new(MemoryStore::new(), chain_index, 1, genesis).unwrap();
    let validator = HeaderValidator::new(rules.clone());

    let mut parent = tree.genesis_hash();
    for i in 1..=blocks {
        let target = validator.expected_target(&parent, &tree).unwrap();
        let block = make_block(parent, genesis_ts + i * spacing_ms, target, i);
        tree.add(&block, target.to_weight()).unwrap();
        parent = block.hash();
    }
    (tree, parent)
}

#[test]
fn below_the_window_the_target_is_kept() {
    let rules = short_window_rules();
    let max_target = rules.consensus_constants().max_mining_target;
    let validator = HeaderValidator::new(rules.clone());

    // Window is 3, so children at heights 1..=4 keep the genesis target regardless of timing
    let (tree, tip) = grow_chain(&rules, 50, 3);
    assert_eq!(validator.expected_target(&tip, &tree).unwrap(), max_target);
}

#[test]
fn fast_blocks_tighten_the_target() {
    let rules = short_window_rules();
    let constants = rules.consensus_constants();
    let validator = HeaderValidator::new(rules.clone());

    // Blocks every 100ms against a 1000ms ideal; the first retarget sees a 400ms window span
    let (tree, tip) = grow_chain(&rules, 100, 4);
    let expected = validator.expected_target(&tip, &tree).unwrap();
    let reference = digi_shield_retarget(constants.max_mining_target, 400, &constants.retarget_params());
    assert_eq!(expected, reference);
    // The damped swing is clamped to the window minimum: 90% of the ideal span
    assert!(expected.0 < constants.max_mining_target.0);
    assert!(expected.0 > constants.max_mining_target.0 / 2);
}

#[test]
fn slow_blocks_never_push_past_the_cap() {
    let rules = short_window_rules();
    let constants = rules.consensus_constants();
    let validator = HeaderValidator::new(rules.clone());

    // Ten-second spacing wants to raise the target, but the chain already sits at the cap
    let (tree, tip) = grow_chain(&rules, 10_000, 6);
    let expected = validator.expected_target(&tip, &tree).unwrap();
    assert_eq!(expected, constants.max_mining_target);
}

#[test]
fn retarget_applies_at_every_block_past_the_window() {
    let rules = short_window_rules();
    let validator = HeaderValidator::new(rules.clone());

    // Fast spacing sustained past the first retarget keeps tightening the target
    let (tree, tip) = grow_chain(&rules, 100, 8);
    let tighter = validator.expected_target(&tip, &tree).unwrap();
    let (tree_short, tip_short) = grow_chain(&rules, 100, 5);
    let earlier = validator.expected_target(&tip_short, &tree_short).unwrap();
    assert!(tighter.0 < earlier.0);
}

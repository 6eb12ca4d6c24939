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

use std::sync::Arc;

use helpers::block_builders::{build_block, create_block_flow, grind_into_block, key_for_group};
use mosaic_common_types::{chain_index::{ChainIndex, GroupIndex}, types::FixedHash};
use mosaic_core::{
    base_node::{
        comms_interface::{InboundNodeCommsHandlers, NodeCommsResponse},
        BlockEvent,
    },
    block_flow::TxStatus,
    blocks::{BlockDeps, BlockHeader, BlockTemplate},
    chain_storage::BlockAddResult,
    mempool::{Mempool, MempoolConfig},
    proof_of_work::Target,
    validation::ValidationError,
};
use tokio::sync::broadcast;

#[test]
fn cross_group_outputs_arrive_through_in_deps() {
    let flow = create_block_flow(2);
    let constants = flow.rules().consensus_constants().clone();
    let miner_g1 = key_for_group(GroupIndex(1), 2);
    let miner_g0 = key_for_group(GroupIndex(0), 2);

    // A block on chain (0, 1) pays its miner in group 1
    let t1 = constants.genesis_timestamp + 1_000;
    let block_01 = build_block(&flow, ChainIndex::unchecked(0, 1), vec![], miner_g1.lock_script(), t1);
    let (result, _) = flow.add_block(&block_01, t1).unwrap();
    assert_eq!(result, BlockAddResult::Ok);

    // Group 1 has not folded the reward yet: its intra chain still sits on genesis state
    let (total, _) = flow.balance(&miner_g1.lock_script(), 10).unwrap();
    assert!(total.is_zero());

    // The next block on (1, 1) takes (0, 1)'s tip as its in-dep and folds the reward in
    let t2 = t1 + 1_000;
    let block_11 = build_block(&flow, ChainIndex::unchecked(1, 1), vec![], miner_g0.lock_script(), t2);
    assert_eq!(
        block_11.header.deps.in_dep(GroupIndex(1), GroupIndex(0)),
        block_01.hash()
    );
    let (result, _) = flow.add_block(&block_11, t2).unwrap();
    assert_eq!(result, BlockAddResult::Ok);

    let reward = block_01.coinbase().unwrap().fixed_outputs()[0].amount;
    let (total, utxos) = flow.balance(&miner_g1.lock_script(), 10).unwrap();
    assert_eq!(total, reward);
    assert_eq!(utxos.len(), 1);
}

#[test]
fn unknown_deps_park_the_block() {
    let flow = create_block_flow(2);
    let constants = flow.rules().consensus_constants().clone();
    let miner = key_for_group(GroupIndex(1), 2);

    let t1 = constants.genesis_timestamp + 1_000;
    let block1 = build_block(&flow, ChainIndex::unchecked(0, 1), vec![], miner.lock_script(), t1);
    flow.add_block(&block1, t1).unwrap();
    let t2 = t1 + 1_000;
    let block2 = build_block(&flow, ChainIndex::unchecked(0, 1), vec![], miner.lock_script(), t2);

    // A fresh node that has never seen block1 cannot take block2
    let fresh = create_block_flow(2);
    let err = fresh.add_block(&block2, t2).unwrap_err();
    match err {
        ValidationError::MissingDeps(missing) => assert!(missing.contains(&block1.hash())),
        other => panic!("expected missing deps, got {}", other),
    }

    // Supplying the parent first makes the same block addable
    fresh.add_block(&block1, t1).unwrap();
    let (result, _) = fresh.add_block(&block2, t2).unwrap();
    assert_eq!(result, BlockAddResult::Ok);
}

#[test]
fn regressing_deps_violate_the_flow_rule() {
    let flow = create_block_flow(2);
    let constants = flow.rules().consensus_constants().clone();
    let miner_g1 = key_for_group(GroupIndex(1), 2);
    let miner_g0 = key_for_group(GroupIndex(0), 2);

    let t1 = constants.genesis_timestamp + 1_000;
    let block_01 = build_block(&flow, ChainIndex::unchecked(0, 1), vec![], miner_g1.lock_script(), t1);
    flow.add_block(&block_01, t1).unwrap();
    let t2 = t1 + 1_000;
    let block_11 = build_block(&flow, ChainIndex::unchecked(1, 1), vec![], miner_g0.lock_script(), t2);
    flow.add_block(&block_11, t2).unwrap();

    // A child of block_11 whose in-dep for group 0 regresses back to (0, 1)'s genesis
    let chain = ChainIndex::unchecked(1, 1);
    let genesis_01 = flow.with_tree(ChainIndex::unchecked(0, 1), |tree| tree.genesis_hash());
    let tip_10 = flow.with_tree(ChainIndex::unchecked(1, 0), |tree| tree.canonical_tip());
    let deps = BlockDeps::build(vec![genesis_01], vec![tip_10, block_11.hash()], 2).unwrap();
    let header = BlockHeader {
        deps,
        dep_state_hash: FixedHash::zero(),
        txs_hash: FixedHash::zero(),
        timestamp: t2 + 1_000,
        target: Target::max(),
        nonce: 0,
    };
    let block = grind_into_block(
        BlockTemplate {
            chain_index: chain,
            height: 2,
            header,
            transactions: vec![],
            target: Target::max(),
        },
        2,
    );

    let err = flow.add_block(&block, t2 + 1_000).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidFlowTxs));
}

#[tokio::test]
async fn handlers_park_and_retry_out_of_order_blocks() {
    let flow = Arc::new(create_block_flow(1));
    let constants = flow.rules().consensus_constants().clone();
    let miner = key_for_group(GroupIndex(0), 1);
    let chain = ChainIndex::unchecked(0, 0);

    let t1 = constants.genesis_timestamp + 1_000;
    let block1 = build_block(&flow, chain, vec![], miner.lock_script(), t1);
    flow.add_block(&block1, t1).unwrap();
    let t2 = t1 + 1_000;
    let block2 = build_block(&flow, chain, vec![], miner.lock_script(), t2);

    // A fresh node receives block2 before block1
    let fresh = Arc::new(create_block_flow(1));
    let mempool = Mempool::new(constants.broker_info(), MempoolConfig::from_consensus(&constants));
    let (event_sender, mut events) = broadcast::channel(32);
    let handlers = InboundNodeCommsHandlers::new(event_sender, fresh.clone(), mempool);

    let response = handlers.handle_block(block2.clone(), None).await.unwrap();
    match response {
        NodeCommsResponse::BlockParked { missing } => assert!(missing.contains(&block1.hash())),
        other => panic!("expected the block to park, got {:?}", other),
    }
    assert!(!fresh.contains_block(&block2.hash()));

    // The missing parent arrives; both blocks land and tips are announced
    let response = handlers.handle_block(block1.clone(), None).await.unwrap();
    assert!(matches!(response, NodeCommsResponse::BlockAdded(BlockAddResult::Ok)));
    assert!(fresh.contains_block(&block1.hash()));
    assert!(fresh.contains_block(&block2.hash()));

    let mut new_tips = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let BlockEvent::NewTip { hash, .. } = &*event {
            new_tips.push(*hash);
        }
    }
    assert_eq!(new_tips, vec![block1.hash(), block2.hash()]);
}

#[test]
fn tx_status_reports_confirmed_transactions() {
    let flow = create_block_flow(1);
    let constants = flow.rules().consensus_constants().clone();
    let miner = key_for_group(GroupIndex(0), 1);
    let chain = ChainIndex::unchecked(0, 0);

    let t1 = constants.genesis_timestamp + 1_000;
    let block1 = build_block(&flow, chain, vec![], miner.lock_script(), t1);
    flow.add_block(&block1, t1).unwrap();

    let coinbase_id = block1.coinbase().unwrap().id();
    assert_eq!(
        flow.tx_status(&coinbase_id),
        TxStatus::Confirmed {
            block_hash: block1.hash(),
            chain_index: chain
        }
    );
    assert_eq!(flow.tx_status(&FixedHash::from([5u8; 32])), TxStatus::NotFound);
}

#[test]
fn sync_data_walks_the_canonical_chain() {
    let flow = create_block_flow(1);
    let constants = flow.rules().consensus_constants().clone();
    let miner = key_for_group(GroupIndex(0), 1);
    let chain = ChainIndex::unchecked(0, 0);

    let mut hashes = Vec::new();
    let mut ts = constants.genesis_timestamp;
    for _ in 0..3 {
        ts = ts + 1_000;
        let block = build_block(&flow, chain, vec![], miner.lock_script(), ts);
        flow.add_block(&block, ts).unwrap();
        hashes.push(block.hash());
    }

    let genesis = flow.with_tree(chain, |tree| tree.genesis_hash());
    let result = flow.sync_data(chain, &[genesis]).unwrap();
    assert_eq!(result, hashes);
    let result = flow.sync_data(chain, &[hashes[1]]).unwrap();
    assert_eq!(result, hashes[2..].to_vec());
}

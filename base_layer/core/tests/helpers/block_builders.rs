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

#![allow(dead_code)]

use k256::ecdsa::{signature::hazmat::PrehashSigner, Signature, SigningKey};
use mosaic_common_types::{
    chain_index::{ChainIndex, GroupIndex},
    epoch_time::EpochTime,
    types::{BlockHash, FixedHash},
};
use mosaic_core::{
    block_flow::BlockFlow,
    blocks::{merkle_root, Block, BlockDeps, BlockHeader, BlockTemplate},
    chain_storage::ChainTree,
    consensus::{ConsensusConstantsBuilder, ConsensusManager, Network},
    hashing,
    transactions::{
        Amount,
        AssetOutput,
        AssetOutputRef,
        LockScript,
        Transaction,
        TxInput,
        UnlockScript,
        UnsignedTransaction,
    },
};
use mosaic_storage::MemoryStore;
use rand::rngs::OsRng;

pub fn localnet_rules(groups: u32) -> ConsensusManager {
    let constants = ConsensusConstantsBuilder::new(Network::LocalNet)
        .with_groups(groups)
        .build();
    ConsensusManager::builder(Network::LocalNet)
        .with_consensus_constants(constants)
        .build()
}

pub fn create_block_flow(groups: u32) -> BlockFlow<MemoryStore> {
    BlockFlow::new(localnet_rules(groups), MemoryStore::new()).unwrap()
}

/// A single-chain tree for exercising the per-chain DAG in isolation.
pub fn create_single_chain_tree() -> ChainTree<MemoryStore> {
    let rules = localnet_rules(1);
    let chain_index = ChainIndex::unchecked(0, 0);
    let genesis = rules.genesis_block(chain_index);
    ChainTree::new(MemoryStore::new(), chain_index, 1, genesis).unwrap()
}

/// A bare child block for single-chain tree tests; the tree takes the weight explicitly.
pub fn child_block(parent: BlockHash, timestamp: u64, nonce: u64) -> Block {
    let deps = BlockDeps::build(vec![], vec![parent], 1).unwrap();
    let header = BlockHeader {
        deps,
        dep_state_hash: FixedHash::zero(),
        txs_hash: FixedHash::zero(),
        timestamp: EpochTime::from_millis(timestamp),
        target: mosaic_core::proof_of_work::Target::max(),
        nonce,
    };
    Block::new(header, vec![])
}

pub struct TestKey {
    pub signing_key: SigningKey,
    pub public_key: Vec<u8>,
    pub key_hash: FixedHash,
}

impl TestKey {
    pub fn lock_script(&self) -> LockScript {
        LockScript::P2pkh(self.key_hash)
    }
}

/// A key whose pay-to-key-hash output lands in the requested group.
pub fn key_for_group(group: GroupIndex, groups: u32) -> TestKey {
    loop {
        let signing_key = SigningKey::random(&mut OsRng);
        let public_key = signing_key.verifying_key().to_encoded_point(true).as_bytes().to_vec();
        let key_hash = hashing::hash_bytes(&public_key);
        if LockScript::P2pkh(key_hash).group_index(groups) == group {
            return TestKey {
                signing_key,
                public_key,
                key_hash,
            };
        }
    }
}

/// Spend `amount_in` from an output owned by `key`, paying `receiver` everything less the fee.
pub fn spend_tx(
    key: &TestKey,
    output_ref: AssetOutputRef,
    amount_in: Amount,
    receiver: LockScript,
    rules: &ConsensusManager,
) -> Transaction {
    let constants = rules.consensus_constants();
    let gas_fee = Amount(constants.minimal_gas_price.0 .0 * constants.minimal_gas.0);
    let unsigned = UnsignedTransaction {
        script: None,
        gas_amount: constants.minimal_gas,
        gas_price: constants.minimal_gas_price,
        inputs: vec![TxInput {
            output_ref,
            unlock_script: UnlockScript::P2pkh(key.public_key.clone()),
        }],
        fixed_outputs: vec![AssetOutput::new(
            amount_in.checked_sub(gas_fee).unwrap(),
            receiver,
        )],
    };
    let signature: Signature = key.signing_key.sign_prehash(unsigned.id().as_slice()).unwrap();
    Transaction::from_unsigned(unsigned, vec![signature.to_vec()])
}

/// Grind the template nonce until the block hash lands on the template's chain.
pub fn grind_into_block(template: BlockTemplate, groups: u32) -> Block {
    let chain_index = template.chain_index;
    for nonce in 0..1_000_000u64 {
        let block = template.clone().into_block(nonce);
        if block.chain_index(groups) == chain_index && block.header.pow_is_valid() {
            return block;
        }
    }
    panic!("could not find a nonce for chain {}", chain_index);
}

/// Assemble a block with full control over the transaction list: best deps, the matching dep
/// state root, a correct coinbase for the given fees, and a ground nonce.
pub fn build_block(
    flow: &BlockFlow<MemoryStore>,
    chain_index: ChainIndex,
    txs: Vec<Transaction>,
    miner: LockScript,
    now: EpochTime,
) -> Block {
    let rules = flow.rules().clone();
    let constants = rules.consensus_constants();
    let groups = constants.groups;

    let deps = flow.compute_best_deps(chain_index).unwrap();
    let parent = deps.parent(chain_index);
    let height = flow.with_tree(chain_index, |tree| tree.height_of(&parent).unwrap()) + 1;
    let (_, _, pre_root) = flow.mutable_group_view(chain_index, &deps).unwrap();

    let total_fee: Amount = txs.iter().map(Transaction::gas_fee).sum();
    let coinbase = Transaction::coinbase(
        chain_index,
        rules.total_reward(total_fee, height),
        miner,
        now,
        constants.coinbase_lockup_period,
        constants.minimal_gas,
        constants.minimal_gas_price,
    );
    let mut transactions = txs;
    transactions.push(coinbase);

    let target = flow.with_tree(chain_index, |tree| {
        mosaic_core::validation::HeaderValidator::new(rules.clone())
            .expected_target(&parent, tree)
            .unwrap()
    });
    let header = BlockHeader {
        deps,
        dep_state_hash: pre_root,
        txs_hash: merkle_root(&transactions),
        timestamp: now,
        target,
        nonce: 0,
    };
    grind_into_block(
        BlockTemplate {
            chain_index,
            height,
            header,
            transactions,
            target,
        },
        groups,
    )
}

/// Re-seal a tampered transaction list: fix the Merkle root and grind a fresh nonce onto the
/// intended chain.
pub fn reseal(mut block: Block, chain_index: ChainIndex, groups: u32) -> Block {
    block.header.txs_hash = merkle_root(&block.transactions);
    let template = BlockTemplate {
        chain_index,
        height: 0,
        header: block.header.clone(),
        transactions: block.transactions,
        target: block.header.target,
    };
    grind_into_block(template, groups)
}

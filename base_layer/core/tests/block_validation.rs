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

use helpers::block_builders::{build_block, create_block_flow, grind_into_block, key_for_group, reseal, spend_tx};
use mosaic_common_types::{
    chain_index::{ChainIndex, GroupIndex},
    types::FixedHash,
};
use mosaic_core::{
    blocks::BlockTemplate,
    chain_storage::BlockAddResult,
    mempool::{Mempool, MempoolConfig},
    transactions::{
        output_key,
        Amount,
        AssetOutput,
        AssetOutputRef,
        GasBox,
        GasPrice,
        LockScript,
        Transaction,
        UnsignedTransaction,
    },
    validation::{TxValidationError, ValidationError},
};

const CHAIN: ChainIndex = ChainIndex::unchecked(0, 0);

#[test]
fn a_mined_chain_with_a_spend_is_accepted() {
    let flow = create_block_flow(1);
    let rules = flow.rules().clone();
    let constants = rules.consensus_constants();
    let miner = key_for_group(GroupIndex(0), 1);
    let receiver = key_for_group(GroupIndex(0), 1);

    let t1 = constants.genesis_timestamp + 1_000;
    let block1 = build_block(&flow, CHAIN, vec![], miner.lock_script(), t1);
    let (result, _) = flow.add_block(&block1, t1).unwrap();
    assert_eq!(result, BlockAddResult::Ok);

    let coinbase = block1.coinbase().unwrap();
    let reward = coinbase.fixed_outputs()[0].amount;
    let coinbase_ref = AssetOutputRef::new(GroupIndex(0), output_key(&coinbase.id(), 0));

    // The coinbase unlocks only after the lockup period
    let t2 = t1 + constants.coinbase_lockup_period + 1_000;
    let tx = spend_tx(&miner, coinbase_ref, reward, receiver.lock_script(), &rules);
    let expected_payout = tx.fixed_outputs()[0].amount;
    let block2 = build_block(&flow, CHAIN, vec![tx], miner.lock_script(), t2);
    let (result, confirmed) = flow.add_block(&block2, t2).unwrap();
    assert_eq!(result, BlockAddResult::Ok);
    assert_eq!(confirmed.len(), 1);

    let (total, utxos) = flow.balance(&receiver.lock_script(), 10).unwrap();
    assert_eq!(total, expected_payout);
    assert_eq!(utxos.len(), 1);

    // Replays are idempotent
    let (result, _) = flow.add_block(&block2, t2).unwrap();
    assert_eq!(result, BlockAddResult::BlockExists);
}

#[test]
fn spending_a_locked_coinbase_is_rejected() {
    let flow = create_block_flow(1);
    let rules = flow.rules().clone();
    let constants = rules.consensus_constants();
    let miner = key_for_group(GroupIndex(0), 1);

    let t1 = constants.genesis_timestamp + 1_000;
    let block1 = build_block(&flow, CHAIN, vec![], miner.lock_script(), t1);
    flow.add_block(&block1, t1).unwrap();

    let coinbase = block1.coinbase().unwrap();
    let coinbase_ref = AssetOutputRef::new(GroupIndex(0), output_key(&coinbase.id(), 0));
    let tx = spend_tx(
        &miner,
        coinbase_ref,
        coinbase.fixed_outputs()[0].amount,
        miner.lock_script(),
        &rules,
    );

    // Well before the lockup expires
    let t2 = t1 + 2_000;
    let block2 = build_block(&flow, CHAIN, vec![tx], miner.lock_script(), t2);
    let err = flow.add_block(&block2, t2).unwrap_err();
    assert!(matches!(
        err,
        ValidationError::ExistInvalidTx(TxValidationError::TimeLockedOutput)
    ));
}

#[test]
fn coinbase_with_wrong_gas_price_is_rejected() {
    let flow = create_block_flow(1);
    let constants = flow.rules().consensus_constants().clone();
    let miner = key_for_group(GroupIndex(0), 1);

    let t1 = constants.genesis_timestamp + 1_000;
    let mut block = build_block(&flow, CHAIN, vec![], miner.lock_script(), t1);
    let coinbase = block.transactions.last_mut().unwrap();
    coinbase.unsigned.gas_price = GasPrice(Amount::from_u64(1));
    let block = reseal(block, CHAIN, 1);

    let err = flow.add_block(&block, t1).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidCoinbaseFormat));
}

#[test]
fn a_polw_coinbase_with_a_burn_sink_is_accepted() {
    let flow = create_block_flow(1);
    let rules = flow.rules().clone();
    let constants = rules.consensus_constants();
    let miner = key_for_group(GroupIndex(0), 1);

    let t1 = constants.genesis_timestamp + 1_000;
    let mut block = build_block(&flow, CHAIN, vec![], miner.lock_script(), t1);
    let reward = rules.total_reward(Amount::zero(), 1);
    let polw = Transaction::coinbase_polw(
        CHAIN,
        reward,
        Amount::from_u64(1_000_000),
        miner.lock_script(),
        LockScript::P2pkh(FixedHash::zero()),
        t1,
        constants.coinbase_lockup_period,
        constants.minimal_gas,
        constants.minimal_gas_price,
    );
    assert_eq!(polw.fixed_outputs().len(), 2);
    *block.transactions.last_mut().unwrap() = polw;
    let block = reseal(block, CHAIN, 1);

    let (result, _) = flow.add_block(&block, t1).unwrap();
    assert_eq!(result, BlockAddResult::Ok);
}

#[test]
fn a_polw_coinbase_minting_more_than_the_reward_is_rejected() {
    let flow = create_block_flow(1);
    let rules = flow.rules().clone();
    let constants = rules.consensus_constants();
    let miner = key_for_group(GroupIndex(0), 1);

    let t1 = constants.genesis_timestamp + 1_000;
    let mut block = build_block(&flow, CHAIN, vec![], miner.lock_script(), t1);
    // The burn sink inflates the total: miner + sink exceed the expected reward
    let reward = rules.total_reward(Amount::zero(), 1);
    let polw = Transaction::coinbase_polw(
        CHAIN,
        reward.saturating_add(Amount::from_u64(5)),
        Amount::from_u64(1_000_000),
        miner.lock_script(),
        LockScript::P2pkh(FixedHash::zero()),
        t1,
        constants.coinbase_lockup_period,
        constants.minimal_gas,
        constants.minimal_gas_price,
    );
    *block.transactions.last_mut().unwrap() = polw;
    let block = reseal(block, CHAIN, 1);

    let err = flow.add_block(&block, t1).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidCoinbaseReward));
}

#[test]
fn coinbase_with_wrong_group_data_is_rejected() {
    let flow = create_block_flow(1);
    let rules = flow.rules().clone();
    let constants = rules.consensus_constants();
    let miner = key_for_group(GroupIndex(0), 1);

    let t1 = constants.genesis_timestamp + 1_000;
    let mut block = build_block(&flow, CHAIN, vec![], miner.lock_script(), t1);
    // A coinbase declaring a different from-group than the block's chain
    let bogus = Transaction::coinbase(
        ChainIndex::unchecked(1, 0),
        rules.total_reward(Amount::zero(), 1),
        miner.lock_script(),
        t1,
        constants.coinbase_lockup_period,
        constants.minimal_gas,
        constants.minimal_gas_price,
    );
    *block.transactions.last_mut().unwrap() = bogus;
    let block = reseal(block, CHAIN, 1);

    let err = flow.add_block(&block, t1).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidCoinbaseData));
}

#[test]
fn double_spend_within_a_block_is_rejected() {
    let flow = create_block_flow(1);
    let rules = flow.rules().clone();
    let constants = rules.consensus_constants();
    let miner = key_for_group(GroupIndex(0), 1);
    let receiver_a = key_for_group(GroupIndex(0), 1);
    let receiver_b = key_for_group(GroupIndex(0), 1);

    let t1 = constants.genesis_timestamp + 1_000;
    let block1 = build_block(&flow, CHAIN, vec![], miner.lock_script(), t1);
    flow.add_block(&block1, t1).unwrap();

    let coinbase = block1.coinbase().unwrap();
    let reward = coinbase.fixed_outputs()[0].amount;
    let coinbase_ref = AssetOutputRef::new(GroupIndex(0), output_key(&coinbase.id(), 0));

    let t2 = t1 + constants.coinbase_lockup_period + 1_000;
    let tx_a = spend_tx(&miner, coinbase_ref, reward, receiver_a.lock_script(), &rules);
    let tx_b = spend_tx(&miner, coinbase_ref, reward, receiver_b.lock_script(), &rules);
    assert_ne!(tx_a.id(), tx_b.id());

    let block2 = build_block(&flow, CHAIN, vec![tx_a, tx_b], miner.lock_script(), t2);
    let err = flow.add_block(&block2, t2).unwrap_err();
    assert!(matches!(err, ValidationError::BlockDoubleSpending));
}

#[test]
fn increasing_gas_prices_are_rejected() {
    let flow = create_block_flow(1);
    let constants = flow.rules().consensus_constants().clone();
    let miner = key_for_group(GroupIndex(0), 1);

    let cheap_then_dear: Vec<Transaction> = [100u64, 200]
        .iter()
        .map(|price| {
            Transaction::from_unsigned(
                UnsignedTransaction {
                    script: None,
                    gas_amount: GasBox(constants.minimal_gas.0),
                    gas_price: GasPrice(Amount::from_u64(*price)),
                    inputs: vec![],
                    fixed_outputs: vec![AssetOutput::new(
                        Amount::from_u64(1),
                        LockScript::P2pkh(FixedHash::zero()),
                    )],
                },
                vec![],
            )
        })
        .collect();

    let t1 = constants.genesis_timestamp + 1_000;
    let block = build_block(&flow, CHAIN, cheap_then_dear, miner.lock_script(), t1);
    let err = flow.add_block(&block, t1).unwrap_err();
    assert!(matches!(err, ValidationError::TxGasPriceNonDecreasing));
}

#[test]
fn a_tampered_merkle_root_is_rejected() {
    let flow = create_block_flow(1);
    let constants = flow.rules().consensus_constants().clone();
    let miner = key_for_group(GroupIndex(0), 1);

    let t1 = constants.genesis_timestamp + 1_000;
    let block = build_block(&flow, CHAIN, vec![], miner.lock_script(), t1);
    let mut header = block.header.clone();
    header.txs_hash = FixedHash::from([9u8; 32]);
    let tampered = grind_into_block(
        BlockTemplate {
            chain_index: CHAIN,
            height: 1,
            header: header.clone(),
            transactions: block.transactions,
            target: header.target,
        },
        1,
    );

    let err = flow.add_block(&tampered, t1).unwrap_err();
    assert!(matches!(err, ValidationError::InvalidTxsMerkleRoot));
}

#[test]
fn the_template_builder_produces_addable_blocks() {
    let flow = create_block_flow(1);
    let rules = flow.rules().clone();
    let constants = rules.consensus_constants();
    let miner = key_for_group(GroupIndex(0), 1);
    let receiver = key_for_group(GroupIndex(0), 1);
    let mempool = Mempool::new(constants.broker_info(), MempoolConfig::from_consensus(constants));

    let t1 = constants.genesis_timestamp + 1_000;
    let block1 = build_block(&flow, CHAIN, vec![], miner.lock_script(), t1);
    flow.add_block(&block1, t1).unwrap();

    let coinbase = block1.coinbase().unwrap();
    let coinbase_ref = AssetOutputRef::new(GroupIndex(0), output_key(&coinbase.id(), 0));
    let tx = spend_tx(
        &miner,
        coinbase_ref,
        coinbase.fixed_outputs()[0].amount,
        receiver.lock_script(),
        &rules,
    );
    let tx_id = tx.id();
    let t2 = t1 + constants.coinbase_lockup_period + 1_000;
    let available = flow.inputs_available(&tx).unwrap();
    assert!(available);
    mempool.add(tx, available, t2).unwrap();

    let template = flow
        .prepare_block_template(CHAIN, miner.lock_script(), &mempool, t2)
        .unwrap();
    assert_eq!(template.height, 2);
    assert_eq!(template.transactions.len(), 2);
    assert_eq!(template.transactions[0].id(), tx_id);

    let block2 = grind_into_block(template, 1);
    let (result, confirmed) = flow.add_block(&block2, t2).unwrap();
    assert_eq!(result, BlockAddResult::Ok);
    assert_eq!(confirmed, vec![tx_id]);
}

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

use mosaic_common_types::{
    chain_index::{BrokerInfo, GroupIndex},
    epoch_time::EpochTime,
    types::FixedHash,
};
use mosaic_core::{
    mempool::{Mempool, MempoolConfig, MempoolError, TxAddResult},
    transactions::{
        Amount,
        AssetOutput,
        AssetOutputRef,
        GasBox,
        GasPrice,
        LockScript,
        Transaction,
        TxInput,
        UnlockScript,
        UnsignedTransaction,
    },
};

fn tx(group: u32, gas_price: u64, marker: u8) -> Transaction {
    Transaction::from_unsigned(
        UnsignedTransaction {
            script: None,
            gas_amount: GasBox(20_000),
            gas_price: GasPrice(Amount::from_u64(gas_price)),
            inputs: vec![TxInput {
                output_ref: AssetOutputRef::new(GroupIndex(group), FixedHash::from([marker; 32])),
                unlock_script: UnlockScript::P2pkh(vec![marker]),
            }],
            fixed_outputs: vec![AssetOutput::new(
                Amount::from_u64(100),
                LockScript::P2pkh(FixedHash::zero()),
            )],
        },
        vec![],
    )
}

fn small_mempool(shared: usize, pending: usize) -> Mempool {
    let broker = BrokerInfo::new(0, 1, 2).unwrap();
    Mempool::new(broker, MempoolConfig {
        shared_capacity: shared,
        pending_capacity: pending,
        tx_max_age_ms: 60_000,
    })
}

#[test]
fn collection_is_in_fee_order() {
    let mempool = small_mempool(16, 16);
    let now = EpochTime::from_millis(0);
    for (price, marker) in [(5u64, 1u8), (20, 2), (10, 3), (20, 4)] {
        mempool.add(tx(0, price, marker), true, now).unwrap();
    }

    let collected = mempool.collect(GroupIndex(0), 10).unwrap();
    let prices: Vec<u64> = collected
        .iter()
        .map(|tx| tx.gas_price().0 .0.low_u64())
        .collect();
    assert_eq!(prices, vec![20, 20, 10, 5]);
    // The cap limits the answer
    assert_eq!(mempool.collect(GroupIndex(0), 2).unwrap().len(), 2);
}

#[test]
fn groups_are_isolated() {
    let mempool = small_mempool(16, 16);
    let now = EpochTime::from_millis(0);
    mempool.add(tx(0, 5, 1), true, now).unwrap();
    mempool.add(tx(1, 9, 2), true, now).unwrap();

    assert_eq!(mempool.collect(GroupIndex(0), 10).unwrap().len(), 1);
    assert_eq!(mempool.collect(GroupIndex(1), 10).unwrap().len(), 1);
    assert_eq!(mempool.stats(GroupIndex(0)), (1, 0));
}

#[test]
fn out_of_broker_transactions_are_refused() {
    let broker = BrokerInfo::new(0, 2, 4).unwrap();
    let mempool = Mempool::new(broker, MempoolConfig::default());
    // Group 3 belongs to broker 1
    let err = mempool
        .add(tx(3, 5, 1), true, EpochTime::from_millis(0))
        .unwrap_err();
    assert_eq!(err, MempoolError::WrongGroup);
}

#[test]
fn pending_transactions_promote_once_inputs_appear() {
    let mempool = small_mempool(16, 16);
    let now = EpochTime::from_millis(0);
    let parked = tx(0, 5, 1);
    let parked_id = parked.id();
    assert_eq!(mempool.add(parked, false, now).unwrap(), TxAddResult::Pending);
    assert_eq!(mempool.collect(GroupIndex(0), 10).unwrap().len(), 0);

    let promoted = mempool.promote(GroupIndex(0), now, |_| true).unwrap();
    assert_eq!(promoted, 1);
    let collected = mempool.collect(GroupIndex(0), 10).unwrap();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].id(), parked_id);
}

#[test]
fn capacity_is_bounded_and_eviction_prefers_the_cheapest() {
    let mempool = small_mempool(2, 2);
    let now = EpochTime::from_millis(0);
    let cheap = tx(0, 1, 1);
    let cheap_id = cheap.id();
    mempool.add(cheap, true, now).unwrap();
    mempool.add(tx(0, 5, 2), true, now).unwrap();
    let result = mempool.add(tx(0, 9, 3), true, now).unwrap();
    assert_eq!(result, TxAddResult::SharedEvicted(cheap_id));
    let (shared, _) = mempool.stats(GroupIndex(0));
    assert_eq!(shared, 2);
}

#[test]
fn confirmed_transactions_are_removed() {
    let mempool = small_mempool(16, 16);
    let now = EpochTime::from_millis(0);
    let confirmed = tx(0, 5, 1);
    let confirmed_id = confirmed.id();
    mempool.add(confirmed, true, now).unwrap();
    mempool.add(tx(0, 6, 2), true, now).unwrap();

    mempool.remove(GroupIndex(0), &[confirmed_id]).unwrap();
    assert!(!mempool.contains(GroupIndex(0), &confirmed_id));
    assert_eq!(mempool.stats(GroupIndex(0)), (1, 0));
}

#[test]
fn cleaning_drops_aged_transactions() {
    let mempool = small_mempool(16, 16);
    mempool.add(tx(0, 5, 1), true, EpochTime::from_millis(100)).unwrap();
    mempool.add(tx(0, 6, 2), false, EpochTime::from_millis(150)).unwrap();
    mempool.add(tx(0, 7, 3), true, EpochTime::from_millis(9_000)).unwrap();

    let dropped = mempool.clean(EpochTime::from_millis(5_000)).unwrap();
    assert_eq!(dropped, 2);
    assert_eq!(mempool.stats(GroupIndex(0)), (1, 0));
}

#[test]
fn duplicates_are_rejected_across_pools() {
    let mempool = small_mempool(16, 16);
    let now = EpochTime::from_millis(0);
    let tx = tx(0, 5, 1);
    mempool.add(tx.clone(), true, now).unwrap();
    assert_eq!(mempool.add(tx, false, now).unwrap_err(), MempoolError::AlreadyKnown);
}

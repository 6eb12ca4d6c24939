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

use std::{
    cmp::Ordering,
    collections::{BTreeMap, HashMap},
};

use mosaic_common_types::{epoch_time::EpochTime, types::TxId};

use crate::{
    mempool::MempoolError,
    transactions::{GasPrice, Transaction},
};

/// Orders the pool by gas price descending, then arrival ascending; BTreeMap iteration therefore
/// yields the fee-priority order directly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PoolKey {
    gas_price: GasPrice,
    seq: u64,
}

impl Ord for PoolKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .gas_price
            .cmp(&self.gas_price)
            .then(self.seq.cmp(&other.seq))
    }
}

impl PartialOrd for PoolKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Transactions ready for inclusion and broadcast, iterated in non-increasing gas-price order.
/// At capacity, the oldest arrival within the lowest-price tier is evicted.
pub struct SharedPool {
    capacity: usize,
    txs: BTreeMap<PoolKey, Transaction>,
    by_id: HashMap<TxId, (PoolKey, EpochTime)>,
    seq: u64,
}

impl SharedPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            txs: BTreeMap::new(),
            by_id: HashMap::new(),
            seq: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn contains(&self, tx_id: &TxId) -> bool {
        self.by_id.contains_key(tx_id)
    }

    pub fn insert(&mut self, tx: Transaction, now: EpochTime) -> Result<Option<TxId>, MempoolError> {
        let tx_id = tx.id();
        if self.contains(&tx_id) {
            return Err(MempoolError::AlreadyKnown);
        }
        let key = PoolKey {
            gas_price: tx.gas_price(),
            seq: self.seq,
        };
        self.seq += 1;
        self.txs.insert(key, tx);
        self.by_id.insert(tx_id, (key, now));

        if self.txs.len() <= self.capacity {
            return Ok(None);
        }
        // Evict the oldest arrival in the lowest-price tier
        let min_price = self
            .txs
            .keys()
            .next_back()
            .map(|key| key.gas_price)
            .expect("pool is non-empty");
        let evict_key = self
            .txs
            .keys()
            .find(|key| key.gas_price == min_price)
            .copied()
            .expect("tier is non-empty");
        let evicted = self.txs.remove(&evict_key).expect("key exists");
        let evicted_id = evicted.id();
        self.by_id.remove(&evicted_id);
        Ok(Some(evicted_id))
    }

    pub fn remove(&mut self, tx_id: &TxId) -> Option<Transaction> {
        let (key, _) = self.by_id.remove(tx_id)?;
        self.txs.remove(&key)
    }

    /// The first `max` transactions in fee-priority order.
    pub fn collect(&self, max: usize) -> Vec<Transaction> {
        self.txs.values().take(max).cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.txs.values()
    }

    /// Drop everything that arrived before `cutoff`; returns the dropped ids.
    pub fn clean(&mut self, cutoff: EpochTime) -> Vec<TxId> {
        let stale: Vec<TxId> = self
            .by_id
            .iter()
            .filter(|(_, (_, arrived))| *arrived < cutoff)
            .map(|(id, _)| *id)
            .collect();
        for tx_id in &stale {
            self.remove(tx_id);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use mosaic_common_types::types::FixedHash;

    use super::*;
    use crate::transactions::{Amount, AssetOutput, GasBox, LockScript, UnsignedTransaction};

    fn tx(gas_price: u64, marker: u64) -> Transaction {
        Transaction::from_unsigned(
            UnsignedTransaction {
                script: None,
                gas_amount: GasBox(20_000 + marker),
                gas_price: GasPrice(Amount::from_u64(gas_price)),
                inputs: vec![],
                fixed_outputs: vec![AssetOutput::new(
                    Amount::from_u64(marker),
                    LockScript::P2pkh(FixedHash::zero()),
                )],
            },
            vec![],
        )
    }

    #[test]
    fn iteration_is_fee_priority_order() {
        let mut pool = SharedPool::new(16);
        pool.insert(tx(5, 0), EpochTime::from_millis(0)).unwrap();
        pool.insert(tx(9, 1), EpochTime::from_millis(1)).unwrap();
        pool.insert(tx(7, 2), EpochTime::from_millis(2)).unwrap();
        pool.insert(tx(9, 3), EpochTime::from_millis(3)).unwrap();

        let prices: Vec<u64> = pool
            .iter()
            .map(|tx| tx.gas_price().0 .0.low_u64())
            .collect();
        assert_eq!(prices, vec![9, 9, 7, 5]);
        // Same price keeps arrival order
        let markers: Vec<u64> = pool.iter().take(2).map(|tx| tx.gas_amount().0 - 20_000).collect();
        assert_eq!(markers, vec![1, 3]);
    }

    #[test]
    fn eviction_hits_the_oldest_of_the_lowest_tier() {
        let mut pool = SharedPool::new(3);
        let low_old = tx(1, 0);
        let low_new = tx(1, 1);
        pool.insert(low_old.clone(), EpochTime::from_millis(0)).unwrap();
        pool.insert(low_new.clone(), EpochTime::from_millis(1)).unwrap();
        pool.insert(tx(8, 2), EpochTime::from_millis(2)).unwrap();
        let evicted = pool.insert(tx(9, 3), EpochTime::from_millis(3)).unwrap();
        assert_eq!(evicted, Some(low_old.id()));
        assert!(pool.contains(&low_new.id()));
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut pool = SharedPool::new(4);
        let tx = tx(3, 0);
        pool.insert(tx.clone(), EpochTime::from_millis(0)).unwrap();
        assert_eq!(
            pool.insert(tx, EpochTime::from_millis(1)),
            Err(MempoolError::AlreadyKnown)
        );
    }

    #[test]
    fn clean_removes_stale_entries() {
        let mut pool = SharedPool::new(8);
        let old = tx(3, 0);
        let new = tx(4, 1);
        pool.insert(old.clone(), EpochTime::from_millis(100)).unwrap();
        pool.insert(new.clone(), EpochTime::from_millis(900)).unwrap();
        let dropped = pool.clean(EpochTime::from_millis(500));
        assert_eq!(dropped, vec![old.id()]);
        assert!(pool.contains(&new.id()));
    }
}

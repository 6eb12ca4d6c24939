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

use std::collections::{HashMap, VecDeque};

use mosaic_common_types::{epoch_time::EpochTime, types::TxId};

use crate::{mempool::MempoolError, transactions::Transaction};

/// Transactions whose inputs are not yet known; first-in-first-out eviction at capacity.
pub struct PendingPool {
    capacity: usize,
    order: VecDeque<TxId>,
    txs: HashMap<TxId, (Transaction, EpochTime)>,
}

impl PendingPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            txs: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    pub fn contains(&self, tx_id: &TxId) -> bool {
        self.txs.contains_key(tx_id)
    }

    pub fn insert(&mut self, tx: Transaction, now: EpochTime) -> Result<Option<TxId>, MempoolError> {
        let tx_id = tx.id();
        if self.contains(&tx_id) {
            return Err(MempoolError::AlreadyKnown);
        }
        self.order.push_back(tx_id);
        self.txs.insert(tx_id, (tx, now));

        if self.txs.len() <= self.capacity {
            return Ok(None);
        }
        let evicted = self.order.pop_front().expect("pool is non-empty");
        self.txs.remove(&evicted);
        Ok(Some(evicted))
    }

    pub fn remove(&mut self, tx_id: &TxId) -> Option<Transaction> {
        let (tx, _) = self.txs.remove(tx_id)?;
        self.order.retain(|id| id != tx_id);
        Some(tx)
    }

    /// Remove and return every transaction `ready` accepts, preserving arrival order.
    pub fn drain_ready(&mut self, mut ready: impl FnMut(&Transaction) -> bool) -> Vec<Transaction> {
        let candidates: Vec<TxId> = self
            .order
            .iter()
            .filter(|id| {
                self.txs
                    .get(*id)
                    .map(|(tx, _)| ready(tx))
                    .unwrap_or(false)
            })
            .copied()
            .collect();
        candidates
            .iter()
            .filter_map(|id| self.remove(id))
            .collect()
    }

    pub fn clean(&mut self, cutoff: EpochTime) -> Vec<TxId> {
        let stale: Vec<TxId> = self
            .txs
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
    use crate::transactions::{Amount, AssetOutput, GasBox, GasPrice, LockScript, UnsignedTransaction};

    fn tx(marker: u64) -> Transaction {
        Transaction::from_unsigned(
            UnsignedTransaction {
                script: None,
                gas_amount: GasBox(20_000 + marker),
                gas_price: GasPrice(Amount::from_u64(1)),
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
    fn fifo_eviction_at_capacity() {
        let mut pool = PendingPool::new(2);
        let first = tx(1);
        pool.insert(first.clone(), EpochTime::from_millis(0)).unwrap();
        pool.insert(tx(2), EpochTime::from_millis(1)).unwrap();
        let evicted = pool.insert(tx(3), EpochTime::from_millis(2)).unwrap();
        assert_eq!(evicted, Some(first.id()));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn drain_ready_keeps_arrival_order() {
        let mut pool = PendingPool::new(8);
        for marker in 1..=4 {
            pool.insert(tx(marker), EpochTime::from_millis(marker)).unwrap();
        }
        let ready = pool.drain_ready(|tx| tx.gas_amount().0 % 2 == 0);
        let markers: Vec<u64> = ready.iter().map(|tx| tx.gas_amount().0 - 20_000).collect();
        assert_eq!(markers, vec![2, 4]);
        assert_eq!(pool.len(), 2);
    }
}

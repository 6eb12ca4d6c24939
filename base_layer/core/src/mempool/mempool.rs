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
    collections::HashMap,
    sync::{Arc, RwLock},
};

use log::*;
use mosaic_common_types::{
    chain_index::{BrokerInfo, GroupIndex},
    epoch_time::EpochTime,
    types::TxId,
};

use crate::{
    mempool::{MempoolConfig, MempoolError, PendingPool, SharedPool},
    transactions::Transaction,
};

const LOG_TARGET: &str = "c::mp::mempool";

/// Outcome of [`Mempool::add`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxAddResult {
    /// Ready to broadcast and mine
    Shared,
    /// Parked until its inputs appear
    Pending,
    /// A transaction was displaced to make room
    SharedEvicted(TxId),
    PendingEvicted(TxId),
}

struct GroupPools {
    shared: SharedPool,
    pending: PendingPool,
}

/// Per-broker mempool: one shared (ready) pool and one pending pool per in-broker group. Cheap to
/// clone and share across tasks.
#[derive(Clone)]
pub struct Mempool {
    inner: Arc<RwLock<HashMap<GroupIndex, GroupPools>>>,
    broker: BrokerInfo,
}

impl Mempool {
    pub fn new(broker: BrokerInfo, config: MempoolConfig) -> Self {
        let mut pools = HashMap::new();
        let start = broker.broker_id * broker.groups_per_broker();
        for group in start..start + broker.groups_per_broker() {
            pools.insert(
                GroupIndex(group),
                GroupPools {
                    shared: SharedPool::new(config.shared_capacity),
                    pending: PendingPool::new(config.pending_capacity),
                },
            );
        }
        Self {
            inner: Arc::new(RwLock::new(pools)),
            broker,
        }
    }

    /// The "from" group a transaction belongs to, derived from its first input.
    pub fn tx_group(tx: &Transaction) -> Option<GroupIndex> {
        tx.inputs().first().map(|input| input.output_ref.group())
    }

    /// `inputs_available` reflects the group view at submission time and decides the pool.
    pub fn add(
        &self,
        tx: Transaction,
        inputs_available: bool,
        now: EpochTime,
    ) -> Result<TxAddResult, MempoolError> {
        let group = Self::tx_group(&tx).ok_or(MempoolError::WrongGroup)?;
        if !self.broker.contains_group(group) {
            return Err(MempoolError::WrongGroup);
        }
        let mut pools = self.inner.write().map_err(|_| MempoolError::PoisonedAccess)?;
        let pools = pools.get_mut(&group).ok_or(MempoolError::WrongGroup)?;
        if pools.shared.contains(&tx.id()) || pools.pending.contains(&tx.id()) {
            return Err(MempoolError::AlreadyKnown);
        }
        if inputs_available {
            match pools.shared.insert(tx, now)? {
                Some(evicted) => Ok(TxAddResult::SharedEvicted(evicted)),
                None => Ok(TxAddResult::Shared),
            }
        } else {
            match pools.pending.insert(tx, now)? {
                Some(evicted) => Ok(TxAddResult::PendingEvicted(evicted)),
                None => Ok(TxAddResult::Pending),
            }
        }
    }

    pub fn contains(&self, group: GroupIndex, tx_id: &TxId) -> bool {
        self.inner
            .read()
            .ok()
            .and_then(|pools| {
                pools
                    .get(&group)
                    .map(|p| p.shared.contains(tx_id) || p.pending.contains(tx_id))
            })
            .unwrap_or(false)
    }

    /// Remove confirmed transactions, typically after a block lands.
    pub fn remove(&self, group: GroupIndex, tx_ids: &[TxId]) -> Result<(), MempoolError> {
        let mut pools = self.inner.write().map_err(|_| MempoolError::PoisonedAccess)?;
        if let Some(pools) = pools.get_mut(&group) {
            for tx_id in tx_ids {
                pools.shared.remove(tx_id);
                pools.pending.remove(tx_id);
            }
        }
        Ok(())
    }

    /// The best `max` ready transactions of a group in non-increasing gas-price order.
    pub fn collect(&self, group: GroupIndex, max: usize) -> Result<Vec<Transaction>, MempoolError> {
        let pools = self.inner.read().map_err(|_| MempoolError::PoisonedAccess)?;
        Ok(pools
            .get(&group)
            .map(|p| p.shared.collect(max))
            .unwrap_or_default())
    }

    /// Move pending transactions whose inputs became available into the shared pool.
    pub fn promote(
        &self,
        group: GroupIndex,
        now: EpochTime,
        ready: impl FnMut(&Transaction) -> bool,
    ) -> Result<usize, MempoolError> {
        let mut pools = self.inner.write().map_err(|_| MempoolError::PoisonedAccess)?;
        let pools = match pools.get_mut(&group) {
            Some(pools) => pools,
            None => return Ok(0),
        };
        let promoted = pools.pending.drain_ready(ready);
        let count = promoted.len();
        for tx in promoted {
            // Capacity eviction may drop the lowest-fee entry, which is acceptable on promotion
            let _ = pools.shared.insert(tx, now);
        }
        Ok(count)
    }

    /// Drop transactions older than the configured age from every pool.
    pub fn clean(&self, cutoff: EpochTime) -> Result<usize, MempoolError> {
        let mut pools = self.inner.write().map_err(|_| MempoolError::PoisonedAccess)?;
        let mut dropped = 0;
        for (group, pools) in pools.iter_mut() {
            let stale_shared = pools.shared.clean(cutoff);
            let stale_pending = pools.pending.clean(cutoff);
            dropped += stale_shared.len() + stale_pending.len();
            if !stale_shared.is_empty() || !stale_pending.is_empty() {
                debug!(
                    target: LOG_TARGET,
                    "Cleaned {} stale txs from group {} pools",
                    stale_shared.len() + stale_pending.len(),
                    group
                );
            }
        }
        Ok(dropped)
    }

    pub fn stats(&self, group: GroupIndex) -> (usize, usize) {
        self.inner
            .read()
            .ok()
            .and_then(|pools| pools.get(&group).map(|p| (p.shared.len(), p.pending.len())))
            .unwrap_or((0, 0))
    }
}

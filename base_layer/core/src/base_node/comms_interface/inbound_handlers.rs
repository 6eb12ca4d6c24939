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

use log::*;
use mosaic_common_types::epoch_time::EpochTime;
use mosaic_storage::KeyValStore;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;

use crate::{
    base_node::{
        comms_interface::{CommsInterfaceError, NodeCommsRequest, NodeCommsResponse, TxLocation},
        BlockEvent,
        BlockEventSender,
        MisbehaviorKind,
        OrphanPool,
    },
    block_flow::{BlockFlow, TxStatus},
    blocks::Block,
    chain_storage::BlockAddResult,
    mempool::Mempool,
    transactions::Transaction,
    validation::ValidationError,
};

const LOG_TARGET: &str = "c::bn::comms_interface::inbound_handler";

/// The order per-broker relays are attempted in. Purely a fairness heuristic, not part of the
/// protocol; any fair-enough order would do.
pub fn relay_order(broker_count: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..broker_count).collect();
    order.shuffle(&mut rand::thread_rng());
    order
}

/// Handles all inbound requests from remote peers and local services: block and transaction
/// submission, template building, balance and status queries.
pub struct InboundNodeCommsHandlers<S> {
    block_event_sender: BlockEventSender,
    block_flow: Arc<BlockFlow<S>>,
    mempool: Mempool,
    orphan_pool: Arc<RwLock<OrphanPool>>,
}

impl<S: KeyValStore + Clone> InboundNodeCommsHandlers<S> {
    pub fn new(block_event_sender: BlockEventSender, block_flow: Arc<BlockFlow<S>>, mempool: Mempool) -> Self {
        let capacity = block_flow.rules().consensus_constants().orphan_pool_capacity;
        Self {
            block_event_sender,
            block_flow,
            mempool,
            orphan_pool: Arc::new(RwLock::new(OrphanPool::new(capacity))),
        }
    }

    /// Handle inbound node comms requests from remote nodes and local services.
    pub async fn handle_request(&self, request: NodeCommsRequest) -> Result<NodeCommsResponse, CommsInterfaceError> {
        debug!(target: LOG_TARGET, "Handling request {}", request);
        match request {
            NodeCommsRequest::AddBlock { block, origin } => self.handle_block(*block, origin).await,
            NodeCommsRequest::AddTx(tx) => self.handle_tx(*tx).await,
            NodeCommsRequest::GetTemplate {
                chain_index,
                miner_lock_script,
            } => {
                let template = self.block_flow.prepare_block_template(
                    chain_index,
                    miner_lock_script,
                    &self.mempool,
                    EpochTime::now(),
                )?;
                Ok(NodeCommsResponse::Template(Box::new(template)))
            },
            NodeCommsRequest::GetBalance {
                lock_script,
                utxos_limit,
            } => {
                let (total, utxos) = self.block_flow.balance(&lock_script, utxos_limit)?;
                Ok(NodeCommsResponse::Balance { total, utxos })
            },
            NodeCommsRequest::GetTxStatus { tx_id, chain_index } => {
                let location = match self.block_flow.tx_status(&tx_id) {
                    TxStatus::Confirmed {
                        block_hash,
                        chain_index,
                    } => TxLocation::Confirmed {
                        block_hash,
                        chain_index,
                    },
                    TxStatus::NotFound if self.mempool.contains(chain_index.from, &tx_id) => TxLocation::Mempool,
                    TxStatus::NotFound => TxLocation::NotFound,
                };
                Ok(NodeCommsResponse::TxStatus(location))
            },
            NodeCommsRequest::GetSyncData { chain_index, locators } => {
                let hashes = self.block_flow.sync_data(chain_index, &locators)?;
                Ok(NodeCommsResponse::SyncData(hashes))
            },
        }
    }

    /// Each incoming block is one task, processed to completion (validation, commit, tip update)
    /// before the next block of its chain.
    pub async fn handle_block(
        &self,
        block: Block,
        origin: Option<String>,
    ) -> Result<NodeCommsResponse, CommsInterfaceError> {
        let now = EpochTime::now();
        match self.try_add(&block, now, origin.clone()) {
            Ok(result) => {
                // Blocks parked on this hash may now be addable; keep draining until quiescent
                let mut ready = self.orphan_pool.write().await.take_ready(&block.hash());
                while let Some(parked) = ready.pop() {
                    let parked_hash = parked.hash();
                    match self.try_add(&parked, now, None) {
                        Ok(_) => {
                            ready.extend(self.orphan_pool.write().await.take_ready(&parked_hash));
                        },
                        Err(CommsInterfaceError::Validation(ValidationError::MissingDeps(missing))) => {
                            self.orphan_pool.write().await.park(parked, missing[0]);
                        },
                        Err(e) => {
                            warn!(target: LOG_TARGET, "Parked block {} failed on retry: {}", parked_hash, e);
                        },
                    }
                }
                Ok(NodeCommsResponse::BlockAdded(result))
            },
            Err(CommsInterfaceError::Validation(ValidationError::MissingDeps(missing))) => {
                debug!(
                    target: LOG_TARGET,
                    "Parking block {}: {} deps missing",
                    block.hash(),
                    missing.len()
                );
                self.orphan_pool.write().await.park(block, missing[0]);
                Ok(NodeCommsResponse::BlockParked { missing })
            },
            Err(e) => Err(e),
        }
    }

    fn try_add(
        &self,
        block: &Block,
        now: EpochTime,
        origin: Option<String>,
    ) -> Result<BlockAddResult, CommsInterfaceError> {
        let groups = self.block_flow.rules().consensus_constants().groups;
        let chain_index = block.chain_index(groups);
        let (result, confirmed) = self.block_flow.add_block(block, now).map_err(|e| {
            if let (Some(peer), false) = (origin.as_ref(), matches!(e, ValidationError::MissingDeps(_))) {
                let _ = self.block_event_sender.send(Arc::new(BlockEvent::PeerMisbehavior {
                    kind: MisbehaviorKind::InvalidBlock,
                    peer: peer.clone(),
                }));
            }
            CommsInterfaceError::Validation(e)
        })?;

        if !confirmed.is_empty() {
            let _ = self.mempool.remove(chain_index.from, &confirmed);
        }
        let hash = block.hash();
        match &result {
            BlockAddResult::Ok | BlockAddResult::SideChain | BlockAddResult::ChainReorg { .. } => {
                if let BlockAddResult::ChainReorg { removed, added } = &result {
                    let _ = self.block_event_sender.send(Arc::new(BlockEvent::Reorg {
                        chain_index,
                        removed: removed.clone(),
                        added: added.clone(),
                    }));
                }
                if !matches!(result, BlockAddResult::SideChain) {
                    let weight = self
                        .block_flow
                        .with_tree(chain_index, |tree| tree.chain_weight_of(&hash))?;
                    let _ = self.block_event_sender.send(Arc::new(BlockEvent::NewTip {
                        chain_index,
                        hash,
                        weight,
                    }));
                }
                let _ = self.block_event_sender.send(Arc::new(BlockEvent::BroadcastBlock {
                    block: Arc::new(block.clone()),
                    origin,
                }));
            },
            BlockAddResult::BlockExists => {},
        }
        Ok(result)
    }

    async fn handle_tx(&self, tx: Transaction) -> Result<NodeCommsResponse, CommsInterfaceError> {
        let inputs_available = self.block_flow.inputs_available(&tx)?;
        let tx_id = tx.id();
        let result = self.mempool.add(tx, inputs_available, EpochTime::now())?;
        let _ = self
            .block_event_sender
            .send(Arc::new(BlockEvent::BroadcastTx(vec![tx_id])));
        Ok(NodeCommsResponse::TxAdded(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_order_is_a_permutation() {
        let order = relay_order(10);
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }
}

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

use std::collections::{BTreeMap, HashMap, VecDeque};

use borsh::{BorshDeserialize, BorshSerialize};
use log::*;
use mosaic_common_types::{
    chain_index::ChainIndex,
    epoch_time::EpochTime,
    types::BlockHash,
};
use mosaic_storage::{ColumnFamily, KeyValStore, WriteBatch};
use serde::{Deserialize, Serialize};

use crate::{
    blocks::{Block, BlockHeader},
    chain_storage::ChainStorageError,
    proof_of_work::Weight,
    transactions::Transaction,
};

const LOG_TARGET: &str = "c::cs::chain_tree";

/// Per-hash bookkeeping persisted alongside each block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BlockHashState {
    pub height: u64,
    /// This block's own weight contribution
    pub weight: Weight,
    /// Cumulative weight from genesis
    pub chain_weight: Weight,
    pub timestamp: EpochTime,
    pub is_canonical: bool,
}

/// Outcome of [`ChainTree::add`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockAddResult {
    /// The block extended the canonical tip
    Ok,
    /// The block was already stored
    BlockExists,
    /// The block landed on a side chain without displacing the canonical tip
    SideChain,
    /// The block caused a reorganisation. `removed` is tip-first, `added` is oldest-first.
    ChainReorg {
        removed: Vec<BlockHash>,
        added: Vec<BlockHash>,
    },
}

/// The append-only DAG of one chain: headers and bodies persisted through the store, with
/// in-memory height/ancestry indexes and weight-based canonical-tip selection.
///
/// Mutation is not internally synchronised; the owning block-flow serialises writes per chain.
pub struct ChainTree<S> {
    chain_index: ChainIndex,
    flat_index: u32,
    genesis_hash: BlockHash,
    store: S,
    state: HashMap<BlockHash, BlockHashState>,
    parents: HashMap<BlockHash, BlockHash>,
    children: HashMap<BlockHash, Vec<BlockHash>>,
    /// Height -> hashes at that height; the head is the canonical hash
    height_index: BTreeMap<u64, Vec<BlockHash>>,
    /// Insertion-ordered tip set
    tips: Vec<BlockHash>,
    canonical_tip: BlockHash,
    max_chain_weight: Weight,
}

impl<S: KeyValStore> ChainTree<S> {
    /// Create a tree rooted at `genesis`, persisting it as the canonical height-0 block.
    pub fn new(store: S, chain_index: ChainIndex, groups: u32, genesis: Block) -> Result<Self, ChainStorageError> {
        let genesis_hash = genesis.hash();
        let genesis_state = BlockHashState {
            height: 0,
            weight: Weight::zero(),
            chain_weight: Weight::zero(),
            timestamp: genesis.header.timestamp,
            is_canonical: true,
        };

        let mut tree = Self {
            chain_index,
            flat_index: chain_index.flat_index(groups),
            genesis_hash,
            store,
            state: HashMap::new(),
            parents: HashMap::new(),
            children: HashMap::new(),
            height_index: BTreeMap::new(),
            tips: vec![genesis_hash],
            canonical_tip: genesis_hash,
            max_chain_weight: Weight::zero(),
        };

        let mut batch = WriteBatch::new();
        tree.persist_block(&mut batch, &genesis, &genesis_state)?;
        tree.persist_height_row(&mut batch, 0, &[genesis_hash])?;
        tree.persist_tip(&mut batch, genesis_hash)?;
        tree.store.write(batch)?;

        tree.state.insert(genesis_hash, genesis_state);
        tree.height_index.insert(0, vec![genesis_hash]);
        Ok(tree)
    }

    pub fn chain_index(&self) -> ChainIndex {
        self.chain_index
    }

    pub fn genesis_hash(&self) -> BlockHash {
        self.genesis_hash
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.state.contains_key(hash)
    }

    pub fn max_chain_weight(&self) -> Weight {
        self.max_chain_weight
    }

    pub fn max_height(&self) -> u64 {
        self.state
            .get(&self.canonical_tip)
            .map(|s| s.height)
            .unwrap_or_default()
    }

    pub fn canonical_tip(&self) -> BlockHash {
        self.canonical_tip
    }

    /// Append a block whose parent is already stored. Persists header, body and state in one
    /// batch, then reorganises if the new cumulative weight strictly exceeds the incumbent's.
    pub fn add(&mut self, block: &Block, weight: Weight) -> Result<BlockAddResult, ChainStorageError> {
        let hash = block.hash();
        if self.contains(&hash) {
            return Ok(BlockAddResult::BlockExists);
        }
        let parent = block.header.parent(self.chain_index);
        let parent_state = *self
            .state
            .get(&parent)
            .ok_or(ChainStorageError::OrphanParent(hash))?;

        let state = BlockHashState {
            height: parent_state.height + 1,
            weight,
            chain_weight: parent_state
                .chain_weight
                .checked_add(weight)
                .map_err(|_| ChainStorageError::InvariantViolation("chain weight overflow".to_string()))?,
            timestamp: block.header.timestamp,
            is_canonical: false,
        };

        self.state.insert(hash, state);
        self.parents.insert(hash, parent);
        self.children.entry(parent).or_default().push(hash);
        self.height_index.entry(state.height).or_default().push(hash);
        self.tips.retain(|tip| *tip != parent);
        self.tips.push(hash);

        let mut batch = WriteBatch::new();
        self.persist_block(&mut batch, block, &state)?;

        let result = if state.chain_weight > self.max_chain_weight {
            let (removed, added) = self.reorg_to(hash, &mut batch)?;
            self.max_chain_weight = state.chain_weight;
            self.canonical_tip = hash;
            self.persist_tip(&mut batch, hash)?;
            if removed.is_empty() {
                BlockAddResult::Ok
            } else {
                debug!(
                    target: LOG_TARGET,
                    "Chain {} reorg: {} removed, {} added, new tip {}",
                    self.chain_index,
                    removed.len(),
                    added.len(),
                    hash
                );
                BlockAddResult::ChainReorg { removed, added }
            }
        } else {
            let row = self.height_index.get(&state.height).cloned().unwrap_or_default();
            self.persist_height_row(&mut batch, state.height, &row)?;
            BlockAddResult::SideChain
        };

        self.store.write(batch)?;
        Ok(result)
    }

    /// Re-point the canonical path at `new_tip`. Walks the new ancestry until it meets the old
    /// canonical path, flips flags on both branches and moves the new ancestors to the head of
    /// their height rows.
    fn reorg_to(
        &mut self,
        new_tip: BlockHash,
        batch: &mut WriteBatch,
    ) -> Result<(Vec<BlockHash>, Vec<BlockHash>), ChainStorageError> {
        let mut added = Vec::new();
        let mut cursor = new_tip;
        while !self.state_of(&cursor)?.is_canonical {
            added.push(cursor);
            cursor = self.parent_of(&cursor)?;
        }
        let fork = cursor;

        let mut removed = Vec::new();
        let mut cursor = self.canonical_tip;
        while cursor != fork {
            removed.push(cursor);
            let state = self
                .state
                .get_mut(&cursor)
                .ok_or_else(|| ChainStorageError::not_found("chain state", cursor))?;
            state.is_canonical = false;
            self.persist_state(batch, &cursor)?;
            cursor = self.parent_of(&cursor)?;
        }

        added.reverse();
        for hash in &added {
            let state = self
                .state
                .get_mut(hash)
                .ok_or_else(|| ChainStorageError::not_found("chain state", *hash))?;
            state.is_canonical = true;
            let height = state.height;
            self.persist_state(batch, hash)?;

            let row = self
                .height_index
                .get_mut(&height)
                .ok_or_else(|| ChainStorageError::InvariantViolation(format!("no height row {}", height)))?;
            if let Some(pos) = row.iter().position(|h| h == hash) {
                row.remove(pos);
            }
            row.insert(0, *hash);
            let row = row.clone();
            self.persist_height_row(batch, height, &row)?;
        }
        Ok((removed, added))
    }

    pub fn fetch_header(&self, hash: &BlockHash) -> Result<BlockHeader, ChainStorageError> {
        let bytes = self
            .store
            .get(ColumnFamily::Headers, hash.as_slice())?
            .ok_or_else(|| ChainStorageError::not_found("header", *hash))?;
        borsh::from_slice(&bytes).map_err(|e| ChainStorageError::Corruption(format!("header {}: {}", hash, e)))
    }

    pub fn fetch_block(&self, hash: &BlockHash) -> Result<Block, ChainStorageError> {
        let header = self.fetch_header(hash)?;
        let bytes = self
            .store
            .get(ColumnFamily::Bodies, hash.as_slice())?
            .ok_or_else(|| ChainStorageError::not_found("body", *hash))?;
        let transactions: Vec<Transaction> = borsh::from_slice(&bytes)
            .map_err(|e| ChainStorageError::Corruption(format!("body {}: {}", hash, e)))?;
        Ok(Block::new(header, transactions))
    }

    fn state_of(&self, hash: &BlockHash) -> Result<&BlockHashState, ChainStorageError> {
        self.state
            .get(hash)
            .ok_or_else(|| ChainStorageError::not_found("chain state", *hash))
    }

    fn parent_of(&self, hash: &BlockHash) -> Result<BlockHash, ChainStorageError> {
        if *hash == self.genesis_hash {
            return Err(ChainStorageError::InvariantViolation(
                "walked past the genesis block".to_string(),
            ));
        }
        self.parents
            .get(hash)
            .copied()
            .ok_or_else(|| ChainStorageError::not_found("parent", *hash))
    }

    pub fn height_of(&self, hash: &BlockHash) -> Result<u64, ChainStorageError> {
        Ok(self.state_of(hash)?.height)
    }

    pub fn weight_of(&self, hash: &BlockHash) -> Result<Weight, ChainStorageError> {
        Ok(self.state_of(hash)?.weight)
    }

    pub fn chain_weight_of(&self, hash: &BlockHash) -> Result<Weight, ChainStorageError> {
        Ok(self.state_of(hash)?.chain_weight)
    }

    pub fn timestamp_of(&self, hash: &BlockHash) -> Result<EpochTime, ChainStorageError> {
        Ok(self.state_of(hash)?.timestamp)
    }

    pub fn is_canonical(&self, hash: &BlockHash) -> Result<bool, ChainStorageError> {
        Ok(self.state_of(hash)?.is_canonical)
    }

    pub fn is_tip(&self, hash: &BlockHash) -> bool {
        self.tips.contains(hash)
    }

    pub fn all_tips(&self) -> Vec<BlockHash> {
        self.tips.clone()
    }

    /// The tip of maximum cumulative weight; first-inserted wins a tie. "Unsafe" because the
    /// answer is stale the moment a concurrent add commits.
    pub fn best_tip_unsafe(&self) -> Result<BlockHash, ChainStorageError> {
        let mut best: Option<(BlockHash, Weight)> = None;
        for tip in &self.tips {
            let weight = self.chain_weight_of(tip)?;
            match best {
                Some((_, best_weight)) if weight <= best_weight => {},
                _ => best = Some((*tip, weight)),
            }
        }
        best.map(|(hash, _)| hash)
            .ok_or_else(|| ChainStorageError::InvariantViolation("chain has no tips".to_string()))
    }

    /// The hashes stored at `height`; the head is the canonical one.
    pub fn hashes_at_height(&self, height: u64) -> Vec<BlockHash> {
        self.height_index.get(&height).cloned().unwrap_or_default()
    }

    /// Ancestors of `hash` (inclusive) down to height `height_until + 1`, oldest first.
    pub fn chain_back(&self, hash: &BlockHash, height_until: u64) -> Result<Vec<BlockHash>, ChainStorageError> {
        let mut result = Vec::new();
        let mut cursor = *hash;
        while self.state_of(&cursor)?.height > height_until {
            result.push(cursor);
            if cursor == self.genesis_hash {
                break;
            }
            cursor = self.parent_of(&cursor)?;
        }
        result.reverse();
        Ok(result)
    }

    /// The ancestor of `hash` at exactly `height`.
    pub fn ancestor_at(&self, hash: &BlockHash, height: u64) -> Result<BlockHash, ChainStorageError> {
        let mut cursor = *hash;
        let mut current = self.state_of(&cursor)?.height;
        if height > current {
            return Err(ChainStorageError::InvalidQuery(format!(
                "{} has no ancestor at height {}",
                hash, height
            )));
        }
        while current > height {
            cursor = self.parent_of(&cursor)?;
            current -= 1;
        }
        Ok(cursor)
    }

    /// The full path from genesis to `hash`, inclusive on both ends.
    pub fn block_hash_slice(&self, hash: &BlockHash) -> Result<Vec<BlockHash>, ChainStorageError> {
        let mut result = vec![*hash];
        let mut cursor = *hash;
        while cursor != self.genesis_hash {
            cursor = self.parent_of(&cursor)?;
            result.push(cursor);
        }
        result.reverse();
        Ok(result)
    }

    /// All stored descendants of `hash`, parents before children.
    pub fn hashes_after(&self, hash: &BlockHash) -> Result<Vec<BlockHash>, ChainStorageError> {
        self.state_of(hash)?;
        let mut result = Vec::new();
        let mut queue = VecDeque::from([*hash]);
        while let Some(current) = queue.pop_front() {
            if let Some(children) = self.children.get(&current) {
                for child in children {
                    result.push(*child);
                    queue.push_back(*child);
                }
            }
        }
        Ok(result)
    }

    /// True iff `ancestor` is a proper ancestor of `descendant`.
    pub fn is_before(&self, ancestor: &BlockHash, descendant: &BlockHash) -> Result<bool, ChainStorageError> {
        if ancestor == descendant {
            return Ok(false);
        }
        let target_height = self.state_of(ancestor)?.height;
        let mut cursor = *descendant;
        while self.state_of(&cursor)?.height > target_height {
            cursor = self.parent_of(&cursor)?;
        }
        Ok(cursor == *ancestor)
    }

    /// The path `older -> newer`, exclusive of `older`, oldest first. Fails unless `older` is an
    /// ancestor of `newer`.
    pub fn block_hashes_between(
        &self,
        newer: &BlockHash,
        older: &BlockHash,
    ) -> Result<Vec<BlockHash>, ChainStorageError> {
        let older_height = self.state_of(older)?.height;
        let mut result = Vec::new();
        let mut cursor = *newer;
        while self.state_of(&cursor)?.height > older_height {
            result.push(cursor);
            cursor = self.parent_of(&cursor)?;
        }
        if cursor != *older {
            return Err(ChainStorageError::InvalidQuery(format!(
                "{} is not an ancestor of {}",
                older, newer
            )));
        }
        result.reverse();
        Ok(result)
    }

    /// The difference between two tips via their lowest common ancestor: `(to_remove, to_add)`
    /// where `to_remove` walks `older`'s branch tip-first and `to_add` walks `newer`'s branch
    /// oldest-first. Either side may be empty.
    pub fn cal_hash_diff(
        &self,
        newer: &BlockHash,
        older: &BlockHash,
    ) -> Result<(Vec<BlockHash>, Vec<BlockHash>), ChainStorageError> {
        let mut to_remove = Vec::new();
        let mut to_add = Vec::new();
        let mut a = *older;
        let mut b = *newer;
        let mut height_a = self.state_of(&a)?.height;
        let mut height_b = self.state_of(&b)?.height;
        while height_a > height_b {
            to_remove.push(a);
            a = self.parent_of(&a)?;
            height_a -= 1;
        }
        while height_b > height_a {
            to_add.push(b);
            b = self.parent_of(&b)?;
            height_b -= 1;
        }
        while a != b {
            to_remove.push(a);
            to_add.push(b);
            a = self.parent_of(&a)?;
            b = self.parent_of(&b)?;
        }
        to_add.reverse();
        Ok((to_remove, to_add))
    }

    /// Sync support: given locator hashes ordered most-recent-first, return up to `max` canonical
    /// hashes following the most recent locator that is still canonical. Unknown or reorged-out
    /// locators are skipped; with no usable locator the walk starts after genesis.
    pub fn get_sync_data(&self, locators: &[BlockHash], max: usize) -> Result<Vec<BlockHash>, ChainStorageError> {
        let start_height = locators
            .iter()
            .find(|hash| self.state.get(hash).map(|s| s.is_canonical).unwrap_or(false))
            .map(|hash| self.state[hash].height)
            .unwrap_or(0);

        let tip_height = self.max_height();
        let mut result = Vec::new();
        for height in (start_height + 1)..=tip_height {
            if result.len() >= max {
                break;
            }
            if let Some(row) = self.height_index.get(&height) {
                if let Some(head) = row.first() {
                    result.push(*head);
                }
            }
        }
        Ok(result)
    }

    fn persist_block(
        &self,
        batch: &mut WriteBatch,
        block: &Block,
        state: &BlockHashState,
    ) -> Result<(), ChainStorageError> {
        let hash = block.hash();
        batch.put(
            ColumnFamily::Headers,
            hash.to_vec(),
            borsh::to_vec(&block.header).map_err(|e| ChainStorageError::Corruption(e.to_string()))?,
        );
        batch.put(
            ColumnFamily::Bodies,
            hash.to_vec(),
            borsh::to_vec(&block.transactions).map_err(|e| ChainStorageError::Corruption(e.to_string()))?,
        );
        batch.put(
            ColumnFamily::ChainState,
            hash.to_vec(),
            borsh::to_vec(state).map_err(|e| ChainStorageError::Corruption(e.to_string()))?,
        );
        Ok(())
    }

    fn persist_state(&self, batch: &mut WriteBatch, hash: &BlockHash) -> Result<(), ChainStorageError> {
        let state = self.state_of(hash)?;
        batch.put(
            ColumnFamily::ChainState,
            hash.to_vec(),
            borsh::to_vec(state).map_err(|e| ChainStorageError::Corruption(e.to_string()))?,
        );
        Ok(())
    }

    fn persist_height_row(
        &self,
        batch: &mut WriteBatch,
        height: u64,
        row: &[BlockHash],
    ) -> Result<(), ChainStorageError> {
        let key = borsh::to_vec(&(self.flat_index, height))
            .map_err(|e| ChainStorageError::Corruption(e.to_string()))?;
        batch.put(
            ColumnFamily::HeightIndex,
            key,
            borsh::to_vec(&row.to_vec()).map_err(|e| ChainStorageError::Corruption(e.to_string()))?,
        );
        Ok(())
    }

    fn persist_tip(&self, batch: &mut WriteBatch, tip: BlockHash) -> Result<(), ChainStorageError> {
        let key = borsh::to_vec(&("tip", self.flat_index))
            .map_err(|e| ChainStorageError::Corruption(e.to_string()))?;
        batch.put(ColumnFamily::NodeState, key, tip.to_vec());
        Ok(())
    }
}

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
    collections::{HashMap, HashSet},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::*;
use mosaic_common_types::{
    chain_index::{ChainIndex, GroupIndex},
    epoch_time::EpochTime,
    types::{BlockHash, FixedHash, TxId},
};
use mosaic_storage::{KeyValStore, WriteBatch};

use crate::{
    blocks::{merkle_root, Block, BlockDeps, BlockHeader, BlockTemplate},
    chain_storage::{BlockAddResult, ChainStorageError, ChainTree, FlowCache},
    consensus::ConsensusManager,
    mempool::Mempool,
    state::{CachedWorldState, WorldState},
    transactions::{output_key, Amount, AssetOutput, AssetOutputRef, LockScript, Transaction, TxOutput},
    validation::{BlockValidator, HeaderValidator, ValidationError},
};

const LOG_TARGET: &str = "c::bf::flow";

/// Where a transaction currently lives, as far as the ledger knows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed { block_hash: BlockHash, chain_index: ChainIndex },
    NotFound,
}

/// The `G × G` cross-chain view: one [`ChainTree`] per chain behind its own lock (per-chain
/// mutation is serialised, cross-chain reads are shared), the flow cache, per-block state roots
/// and the validation pipelines.
pub struct BlockFlow<S> {
    rules: ConsensusManager,
    store: S,
    trees: Vec<RwLock<ChainTree<S>>>,
    cache: Arc<FlowCache>,
    header_validator: HeaderValidator,
    block_validator: BlockValidator,
    /// World-state root after executing each block, keyed by block hash
    block_roots: RwLock<HashMap<BlockHash, FixedHash>>,
    tx_index: RwLock<HashMap<TxId, (BlockHash, ChainIndex)>>,
}

impl<S: KeyValStore + Clone> BlockFlow<S> {
    pub fn new(rules: ConsensusManager, store: S) -> Result<Self, ChainStorageError> {
        let constants = rules.consensus_constants();
        let groups = constants.groups;
        let mut trees = Vec::with_capacity((groups * groups) as usize);
        let mut block_roots = HashMap::new();
        for from in 0..groups {
            for to in 0..groups {
                let chain_index = ChainIndex::unchecked(from, to);
                let genesis = rules.genesis_block(chain_index);
                block_roots.insert(genesis.hash(), FixedHash::zero());
                trees.push(RwLock::new(ChainTree::new(
                    store.clone(),
                    chain_index,
                    groups,
                    genesis,
                )?));
            }
        }
        let cache = Arc::new(FlowCache::new(
            constants.block_cache_capacity_per_chain,
            constants.header_cache_capacity,
            constants.state_cache_capacity,
        ));
        Ok(Self {
            header_validator: HeaderValidator::new(rules.clone()),
            block_validator: BlockValidator::new(rules.clone()),
            rules,
            store,
            trees,
            cache,
            block_roots: RwLock::new(block_roots),
            tx_index: RwLock::new(HashMap::new()),
        })
    }

    pub fn rules(&self) -> &ConsensusManager {
        &self.rules
    }

    pub fn cache(&self) -> &FlowCache {
        &self.cache
    }

    fn groups(&self) -> u32 {
        self.rules.consensus_constants().groups
    }

    fn tree(&self, chain_index: ChainIndex) -> RwLockReadGuard<'_, ChainTree<S>> {
        let flat = chain_index.flat_index(self.groups()) as usize;
        match self.trees[flat].read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn tree_mut(&self, chain_index: ChainIndex) -> RwLockWriteGuard<'_, ChainTree<S>> {
        let flat = chain_index.flat_index(self.groups()) as usize;
        match self.trees[flat].write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Run `f` under the read lock of one chain's tree.
    pub fn with_tree<R>(&self, chain_index: ChainIndex, f: impl FnOnce(&ChainTree<S>) -> R) -> R {
        f(&self.tree(chain_index))
    }

    pub fn contains_block(&self, hash: &BlockHash) -> bool {
        let chain_index = ChainIndex::from_hash(hash, self.groups());
        self.tree(chain_index).contains(hash)
    }

    pub fn fetch_block(&self, hash: &BlockHash) -> Result<Block, ChainStorageError> {
        let chain_index = ChainIndex::from_hash(hash, self.groups());
        let flat = chain_index.flat_index(self.groups());
        if let Some(block) = self.cache.get_block(flat, hash) {
            return Ok((*block).clone());
        }
        let block = self.tree(chain_index).fetch_block(hash)?;
        self.cache.put_block(flat, Arc::new(block.clone()));
        Ok(block)
    }

    fn block_root(&self, hash: &BlockHash) -> Result<FixedHash, ChainStorageError> {
        if let Some(root) = self.cache.get_state_root(hash) {
            return Ok(root);
        }
        let roots = match self.block_roots.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        roots
            .get(hash)
            .copied()
            .ok_or_else(|| ChainStorageError::not_found("state root", *hash))
    }

    /// Every dep must name a block of the right chain that we already store; the deps must also
    /// extend the parent's view (monotone per slot).
    pub fn check_deps(&self, block: &Block, chain_index: ChainIndex) -> Result<(), ValidationError> {
        let groups = self.groups();
        let deps = &block.header.deps;
        let own = chain_index.from;

        let mut missing = Vec::new();
        for to in 0..groups {
            let dep = deps.out_dep(GroupIndex(to));
            if !self.tree(ChainIndex::unchecked(own.0, to)).contains(&dep) {
                missing.push(dep);
            }
        }
        for foreign in (0..groups).filter(|g| *g != own.0) {
            let dep = deps.in_dep(own, GroupIndex(foreign));
            if !self.tree(ChainIndex::unchecked(foreign, own.0)).contains(&dep) {
                missing.push(dep);
            }
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingDeps(missing));
        }

        let parent = deps.parent(chain_index);
        let parent_header = self.tree(chain_index).fetch_header(&parent)?;
        if parent_header.is_genesis() {
            return Ok(());
        }
        for to in 0..groups {
            let old = parent_header.deps.out_dep(GroupIndex(to));
            let new = deps.out_dep(GroupIndex(to));
            let tree = self.tree(ChainIndex::unchecked(own.0, to));
            if old != new && !tree.is_before(&old, &new)? {
                return Err(ValidationError::InvalidFlowTxs);
            }
        }
        for foreign in (0..groups).filter(|g| *g != own.0) {
            let old = parent_header.deps.in_dep(own, GroupIndex(foreign));
            let new = deps.in_dep(own, GroupIndex(foreign));
            let tree = self.tree(ChainIndex::unchecked(foreign, own.0));
            if old != new && !tree.is_before(&old, &new)? {
                return Err(ValidationError::InvalidFlowTxs);
            }
        }
        Ok(())
    }

    /// The copy-on-write group view a block executes against: the parent's committed root plus
    /// the replayed outputs of every dep-reachable block not yet folded into that root. Also
    /// returns the outputs those blocks spent (for the block-flow double-spend check) and the
    /// view's committed root, which the header must carry as `dep_state_hash`.
    pub fn mutable_group_view(
        &self,
        chain_index: ChainIndex,
        deps: &BlockDeps,
    ) -> Result<(CachedWorldState<S>, HashSet<AssetOutputRef>, FixedHash), ValidationError> {
        let groups = self.groups();
        let own = chain_index.from;
        let parent = deps.parent(chain_index);
        let parent_root = self.block_root(&parent)?;
        let parent_header = self.tree(chain_index).fetch_header(&parent)?;
        let parent_deps = if parent_header.is_genesis() {
            None
        } else {
            Some(parent_header.deps)
        };

        let mut view = WorldState::new(self.store.clone(), parent_root).cached();
        let mut flow_spent = HashSet::new();

        // Sibling chains (own, k): their blocks spend group-local outputs and create new ones
        for to in (0..groups).filter(|k| *k != chain_index.to.0) {
            let sibling = ChainIndex::unchecked(own.0, to);
            let tree = self.tree(sibling);
            let old = parent_deps
                .as_ref()
                .map(|d| d.out_dep(GroupIndex(to)))
                .unwrap_or_else(|| tree.genesis_hash());
            let new = deps.out_dep(GroupIndex(to));
            let window = tree
                .block_hashes_between(&new, &old)
                .map_err(|_| ValidationError::InvalidFlowTxs)?;
            for hash in window {
                let block = tree.fetch_block(&hash)?;
                self.fold_block(&mut view, &block, own, true, &mut flow_spent)?;
            }
        }

        // Incoming chains (g, own): only their outputs land in this group
        for foreign in (0..groups).filter(|g| *g != own.0) {
            let incoming = ChainIndex::unchecked(foreign, own.0);
            let tree = self.tree(incoming);
            let old = parent_deps
                .as_ref()
                .map(|d| d.in_dep(own, GroupIndex(foreign)))
                .unwrap_or_else(|| tree.genesis_hash());
            let new = deps.in_dep(own, GroupIndex(foreign));
            let window = tree
                .block_hashes_between(&new, &old)
                .map_err(|_| ValidationError::InvalidFlowTxs)?;
            for hash in window {
                let block = tree.fetch_block(&hash)?;
                self.fold_block(&mut view, &block, own, false, &mut flow_spent)?;
            }
        }

        let mut batch = WriteBatch::new();
        let pre_root = view.commit(&mut batch)?;
        self.store.write(batch).map_err(ChainStorageError::Io)?;
        let view = WorldState::new(self.store.clone(), pre_root).cached();
        Ok((view, flow_spent, pre_root))
    }

    /// Replay one dep-reachable block's effect on a group view. `spend` is set for sibling-chain
    /// blocks, whose inputs are group-local.
    fn fold_block(
        &self,
        view: &mut CachedWorldState<S>,
        block: &Block,
        group: GroupIndex,
        spend: bool,
        flow_spent: &mut HashSet<AssetOutputRef>,
    ) -> Result<(), ValidationError> {
        let groups = self.groups();
        for tx in &block.transactions {
            if spend {
                for input in tx.inputs() {
                    flow_spent.insert(input.output_ref);
                    // The output may predate this view's lineage; spent-ness is what matters
                    let _ = view.use_asset(&input.output_ref);
                }
            }
            let tx_id = tx.id();
            for (index, output) in tx.fixed_outputs().iter().enumerate() {
                if output.group_index(groups) == group {
                    let output_ref = AssetOutputRef::new(group, output_key(&tx_id, index as u32));
                    view.add_asset(output_ref, output.clone());
                }
            }
            for (offset, output) in tx.generated_outputs.iter().enumerate() {
                if let TxOutput::Asset(output) = output {
                    if output.group_index(groups) == group {
                        let index = (tx.fixed_outputs().len() + offset) as u32;
                        let output_ref = AssetOutputRef::new(group, output_key(&tx_id, index));
                        view.add_asset(output_ref, output.clone());
                    }
                }
            }
        }
        Ok(())
    }

    /// No input of `block` may already be spent by a block reachable through its deps.
    pub fn check_flow_txs(&self, block: &Block) -> Result<bool, ValidationError> {
        let chain_index = block.chain_index(self.groups());
        let (_, flow_spent, _) = self.mutable_group_view(chain_index, &block.header.deps)?;
        Ok(block
            .non_coinbase()
            .iter()
            .flat_map(|tx| tx.inputs())
            .all(|input| !flow_spent.contains(&input.output_ref)))
    }

    /// Validate and commit one block end to end. Idempotent: a known block returns
    /// `BlockExists` untouched. Also returns the confirmed transaction ids so the caller can
    /// clear its mempool.
    pub fn add_block(&self, block: &Block, now: EpochTime) -> Result<(BlockAddResult, Vec<TxId>), ValidationError> {
        let groups = self.groups();
        let hash = block.hash();
        let chain_index = block.chain_index(groups);

        if self.tree(chain_index).contains(&hash) {
            return Ok((BlockAddResult::BlockExists, Vec::new()));
        }

        self.check_deps(block, chain_index)?;
        {
            let tree = self.tree(chain_index);
            self.header_validator.validate(&block.header, &tree, now)?;
        }

        let (mut view, flow_spent, pre_root) = self.mutable_group_view(chain_index, &block.header.deps)?;
        if block.header.dep_state_hash != pre_root {
            return Err(ValidationError::InvalidDepStateHash);
        }

        let parent = block.header.parent(chain_index);
        let height = self.tree(chain_index).height_of(&parent)? + 1;
        self.block_validator
            .check_block(block, chain_index, height, &mut view, &flow_spent)?;

        // Commit the post-state, then the block itself, under the owning chain's write lock
        let mut batch = WriteBatch::new();
        let post_root = view.commit(&mut batch)?;
        self.store.write(batch).map_err(ChainStorageError::Io)?;

        let weight = block.header.target.to_weight();
        let result = self.tree_mut(chain_index).add(block, weight)?;

        {
            let mut roots = match self.block_roots.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            roots.insert(hash, post_root);
        }
        self.cache.put_state_root(hash, block.header.timestamp, post_root);
        self.cache.put_header(Arc::new(block.header.clone()));
        self.cache
            .put_block(chain_index.flat_index(groups), Arc::new(block.clone()));

        let confirmed: Vec<TxId> = block.non_coinbase().iter().map(Transaction::id).collect();
        {
            let mut index = match self.tx_index.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            for tx in &block.transactions {
                index.insert(tx.id(), (hash, chain_index));
            }
        }

        info!(
            target: LOG_TARGET,
            "Added block {} to chain {} at height {} ({:?})",
            hash,
            chain_index,
            height,
            match &result {
                BlockAddResult::ChainReorg { removed, added } => format!("reorg -{}/+{}", removed.len(), added.len()),
                other => format!("{:?}", other),
            }
        );
        Ok((result, confirmed))
    }

    /// The deps a freshly mined block on `chain_index` should carry: the current best tips of
    /// every related chain.
    pub fn compute_best_deps(&self, chain_index: ChainIndex) -> Result<BlockDeps, ChainStorageError> {
        let groups = self.groups();
        let own = chain_index.from;
        let mut in_deps = Vec::with_capacity(groups as usize - 1);
        for foreign in (0..groups).filter(|g| *g != own.0) {
            in_deps.push(self.tree(ChainIndex::unchecked(foreign, own.0)).best_tip_unsafe()?);
        }
        let mut out_deps = Vec::with_capacity(groups as usize);
        for to in 0..groups {
            out_deps.push(self.tree(ChainIndex::unchecked(own.0, to)).best_tip_unsafe()?);
        }
        BlockDeps::build(in_deps, out_deps, groups)
            .map_err(|e| ChainStorageError::InvariantViolation(e.to_string()))
    }

    /// Assemble a candidate block: best deps, mempool transactions in non-increasing gas-price
    /// order under the block caps, and the deterministic coinbase.
    pub fn prepare_block_template(
        &self,
        chain_index: ChainIndex,
        miner_lock_script: LockScript,
        mempool: &Mempool,
        now: EpochTime,
    ) -> Result<BlockTemplate, ValidationError> {
        let constants = self.rules.consensus_constants();
        let deps = self.compute_best_deps(chain_index)?;
        let parent = deps.parent(chain_index);
        let (height, target) = {
            let tree = self.tree(chain_index);
            let height = tree.height_of(&parent)? + 1;
            let target = self.header_validator.expected_target(&parent, &tree)?;
            (height, target)
        };

        let (mut view, _, pre_root) = self.mutable_group_view(chain_index, &deps)?;

        let max_txs = constants.max_txs_per_block.saturating_sub(1);
        let candidates = mempool
            .collect(chain_index.from, max_txs)
            .map_err(|e| ChainStorageError::InvariantViolation(e.to_string()))?;

        let mut transactions = Vec::new();
        let mut total_fee = Amount::zero();
        let mut total_gas = constants.minimal_gas.0;
        for tx in candidates {
            if total_gas.saturating_add(tx.gas_amount().0) > constants.max_gas_per_block {
                continue;
            }
            // A transaction that no longer applies (spent inputs, failing script) is skipped
            match self
                .block_validator
                .tx_validator()
                .validate_and_apply(&tx, &mut view, chain_index.from, now, target)
            {
                Ok(fee) => {
                    total_gas += tx.gas_amount().0;
                    total_fee = total_fee.saturating_add(fee);
                    transactions.push(tx);
                },
                Err(e) => {
                    debug!(target: LOG_TARGET, "Skipping mempool tx during template build: {}", e);
                },
            }
        }

        let reward = self.rules.total_reward(total_fee, height);
        let coinbase = Transaction::coinbase(
            chain_index,
            reward,
            miner_lock_script,
            now,
            constants.coinbase_lockup_period,
            constants.minimal_gas,
            constants.minimal_gas_price,
        );
        transactions.push(coinbase);

        let header = BlockHeader {
            deps,
            dep_state_hash: pre_root,
            txs_hash: merkle_root(&transactions),
            timestamp: now,
            target,
            nonce: 0,
        };
        Ok(BlockTemplate {
            chain_index,
            height,
            header,
            transactions,
            target,
        })
    }

    /// Canonical successor hashes for a sync peer, per chain.
    pub fn sync_data(&self, chain_index: ChainIndex, locators: &[BlockHash]) -> Result<Vec<BlockHash>, ChainStorageError> {
        let max = self.rules.consensus_constants().max_sync_hashes;
        self.tree(chain_index).get_sync_data(locators, max)
    }

    /// UTXOs locked to `lock_script`, read from the canonical tip state of the owning group's
    /// intra-group chain.
    pub fn balance(
        &self,
        lock_script: &LockScript,
        utxos_limit: usize,
    ) -> Result<(Amount, Vec<(AssetOutputRef, AssetOutput)>), ValidationError> {
        let groups = self.groups();
        let group = lock_script.group_index(groups);
        let intra = ChainIndex::unchecked(group.0, group.0);
        let tip = self.tree(intra).canonical_tip();
        let root = self.block_root(&tip)?;
        let world = WorldState::new(self.store.clone(), root);

        let mut utxos = Vec::new();
        let mut total = Amount::zero();
        world.for_each_asset(&mut |output_ref, output| {
            if output.lock_script == *lock_script {
                total = total.saturating_add(output.amount);
                utxos.push((output_ref, output));
                if utxos.len() >= utxos_limit {
                    return Ok(false);
                }
            }
            Ok(true)
        })?;
        Ok((total, utxos))
    }

    /// Whether every input of `tx` is currently unspent in its group's canonical tip state.
    pub fn inputs_available(&self, tx: &Transaction) -> Result<bool, ValidationError> {
        let group = match Mempool::tx_group(tx) {
            Some(group) => group,
            None => return Ok(false),
        };
        let intra = ChainIndex::unchecked(group.0, group.0);
        let tip = self.tree(intra).canonical_tip();
        let root = self.block_root(&tip)?;
        let world = WorldState::new(self.store.clone(), root);
        for input in tx.inputs() {
            if world.get_asset(&input.output_ref)?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn tx_status(&self, tx_id: &TxId) -> TxStatus {
        let index = match self.tx_index.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match index.get(tx_id) {
            Some((block_hash, chain_index)) => TxStatus::Confirmed {
                block_hash: *block_hash,
                chain_index: *chain_index,
            },
            None => TxStatus::NotFound,
        }
    }
}

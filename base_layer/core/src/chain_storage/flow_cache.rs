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
    collections::{HashMap, VecDeque},
    sync::{Arc, RwLock},
};

use mosaic_common_types::{
    epoch_time::EpochTime,
    types::{BlockHash, FixedHash},
};

use crate::blocks::{Block, BlockHeader};

#[derive(Default)]
struct ChainBlockCache {
    order: VecDeque<BlockHash>,
    blocks: HashMap<BlockHash, Arc<Block>>,
}

#[derive(Default)]
struct FlowCacheInner {
    blocks_per_chain: HashMap<u32, ChainBlockCache>,
    headers: HashMap<BlockHash, (EpochTime, Arc<BlockHeader>)>,
    state_roots: HashMap<BlockHash, (EpochTime, FixedHash)>,
}

/// Cache of hot blocks, headers and per-block state roots. The block cache is bounded per chain
/// and evicts the oldest insertion in that chain; the header and state caches are bounded
/// globally and evict the entry with the smallest timestamp. All access goes through one
/// read-write lock: reads share, writes exclude.
pub struct FlowCache {
    inner: RwLock<FlowCacheInner>,
    block_capacity_per_chain: usize,
    header_capacity: usize,
    state_capacity: usize,
}

impl FlowCache {
    pub fn new(block_capacity_per_chain: usize, header_capacity: usize, state_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(FlowCacheInner::default()),
            block_capacity_per_chain: block_capacity_per_chain.max(1),
            header_capacity: header_capacity.max(1),
            state_capacity: state_capacity.max(1),
        }
    }

    pub fn put_block(&self, chain: u32, block: Arc<Block>) {
        let hash = block.hash();
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let cache = inner.blocks_per_chain.entry(chain).or_default();
        if cache.blocks.contains_key(&hash) {
            return;
        }
        if cache.order.len() >= self.block_capacity_per_chain {
            if let Some(evicted) = cache.order.pop_front() {
                cache.blocks.remove(&evicted);
            }
        }
        cache.order.push_back(hash);
        cache.blocks.insert(hash, block);
    }

    pub fn get_block(&self, chain: u32, hash: &BlockHash) -> Option<Arc<Block>> {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner
            .blocks_per_chain
            .get(&chain)
            .and_then(|cache| cache.blocks.get(hash))
            .cloned()
    }

    pub fn put_header(&self, header: Arc<BlockHeader>) {
        let hash = header.hash();
        let timestamp = header.timestamp;
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.headers.contains_key(&hash) {
            return;
        }
        if inner.headers.len() >= self.header_capacity {
            if let Some(oldest) = inner
                .headers
                .iter()
                .min_by_key(|(_, (ts, _))| *ts)
                .map(|(hash, _)| *hash)
            {
                inner.headers.remove(&oldest);
            }
        }
        inner.headers.insert(hash, (timestamp, header));
    }

    pub fn get_header(&self, hash: &BlockHash) -> Option<Arc<BlockHeader>> {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.headers.get(hash).map(|(_, header)| header.clone())
    }

    /// Read-through header lookup: on a miss, `fetch` supplies the value and the cache keeps it.
    pub fn get_or_fetch_header<E>(
        &self,
        hash: &BlockHash,
        fetch: impl FnOnce() -> Result<BlockHeader, E>,
    ) -> Result<Arc<BlockHeader>, E> {
        if let Some(header) = self.get_header(hash) {
            return Ok(header);
        }
        let header = Arc::new(fetch()?);
        self.put_header(header.clone());
        Ok(header)
    }

    pub fn put_state_root(&self, block_hash: BlockHash, timestamp: EpochTime, root: FixedHash) {
        let mut inner = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if inner.state_roots.contains_key(&block_hash) {
            return;
        }
        if inner.state_roots.len() >= self.state_capacity {
            if let Some(oldest) = inner
                .state_roots
                .iter()
                .min_by_key(|(_, (ts, _))| *ts)
                .map(|(hash, _)| *hash)
            {
                inner.state_roots.remove(&oldest);
            }
        }
        inner.state_roots.insert(block_hash, (timestamp, root));
    }

    pub fn get_state_root(&self, block_hash: &BlockHash) -> Option<FixedHash> {
        let inner = match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        inner.state_roots.get(block_hash).map(|(_, root)| *root)
    }
}

#[cfg(test)]
mod tests {
    use mosaic_common_types::types::U256;

    use super::*;
    use crate::{blocks::BlockDeps, proof_of_work::Target};

    fn block(nonce: u64, ts: u64) -> Arc<Block> {
        Arc::new(Block::new(
            BlockHeader {
                deps: BlockDeps::genesis(2),
                dep_state_hash: FixedHash::zero(),
                txs_hash: FixedHash::zero(),
                timestamp: EpochTime::from_millis(ts),
                target: Target(U256::MAX),
                nonce,
            },
            vec![],
        ))
    }

    #[test]
    fn put_then_get_until_eviction() {
        let cache = FlowCache::new(2, 8, 8);
        let a = block(1, 10);
        let b = block(2, 20);
        let c = block(3, 30);
        cache.put_block(0, a.clone());
        cache.put_block(0, b.clone());
        assert!(cache.get_block(0, &a.hash()).is_some());
        cache.put_block(0, c.clone());
        // Oldest-in-chain is evicted; the last `capacity` insertions survive
        assert!(cache.get_block(0, &a.hash()).is_none());
        assert!(cache.get_block(0, &b.hash()).is_some());
        assert!(cache.get_block(0, &c.hash()).is_some());
    }

    #[test]
    fn chains_have_independent_capacity() {
        let cache = FlowCache::new(1, 8, 8);
        let a = block(1, 10);
        let b = block(2, 20);
        cache.put_block(0, a.clone());
        cache.put_block(1, b.clone());
        assert!(cache.get_block(0, &a.hash()).is_some());
        assert!(cache.get_block(1, &b.hash()).is_some());
    }

    #[test]
    fn header_cache_evicts_min_timestamp() {
        let cache = FlowCache::new(2, 2, 2);
        let old = block(1, 10);
        let mid = block(2, 20);
        let new = block(3, 30);
        cache.put_header(Arc::new(mid.header.clone()));
        cache.put_header(Arc::new(old.header.clone()));
        cache.put_header(Arc::new(new.header.clone()));
        assert!(cache.get_header(&old.hash()).is_none());
        assert!(cache.get_header(&mid.hash()).is_some());
        assert!(cache.get_header(&new.hash()).is_some());
    }

    #[test]
    fn read_through_populates_the_cache() {
        let cache = FlowCache::new(2, 4, 4);
        let block = block(7, 70);
        let hash = block.hash();
        let header = cache
            .get_or_fetch_header::<()>(&hash, || Ok(block.header.clone()))
            .unwrap();
        assert_eq!(header.hash(), hash);
        // Second lookup must not call fetch again
        let header = cache
            .get_or_fetch_header::<()>(&hash, || panic!("fetch on a warm cache"))
            .unwrap();
        assert_eq!(header.hash(), hash);
    }

    #[test]
    fn state_roots_round_trip() {
        let cache = FlowCache::new(2, 4, 4);
        let hash = BlockHash::from([1u8; 32]);
        let root = FixedHash::from([2u8; 32]);
        cache.put_state_root(hash, EpochTime::from_millis(5), root);
        assert_eq!(cache.get_state_root(&hash), Some(root));
        assert_eq!(cache.get_state_root(&BlockHash::from([9u8; 32])), None);
    }
}

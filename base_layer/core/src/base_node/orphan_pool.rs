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

use mosaic_common_types::types::BlockHash;

use crate::blocks::Block;

/// Blocks whose dependencies have not arrived yet, keyed by the dep they wait for. Bounded;
/// the oldest parked block is dropped at capacity.
pub struct OrphanPool {
    capacity: usize,
    by_missing: HashMap<BlockHash, Vec<Block>>,
    arrival: VecDeque<BlockHash>,
    count: usize,
}

impl OrphanPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            by_missing: HashMap::new(),
            arrival: VecDeque::new(),
            count: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.by_missing
            .values()
            .any(|blocks| blocks.iter().any(|b| b.hash() == *hash))
    }

    /// Park `block` until `missing_dep` arrives.
    pub fn park(&mut self, block: Block, missing_dep: BlockHash) {
        let hash = block.hash();
        if self.contains(&hash) {
            return;
        }
        if self.count >= self.capacity {
            self.evict_oldest();
        }
        self.by_missing.entry(missing_dep).or_default().push(block);
        self.arrival.push_back(hash);
        self.count += 1;
    }

    /// Blocks that were waiting on `arrived`; they may still be missing other deps and get
    /// re-parked by the caller.
    pub fn take_ready(&mut self, arrived: &BlockHash) -> Vec<Block> {
        let ready = self.by_missing.remove(arrived).unwrap_or_default();
        for block in &ready {
            let hash = block.hash();
            self.arrival.retain(|h| *h != hash);
        }
        self.count -= ready.len();
        ready
    }

    fn evict_oldest(&mut self) {
        let oldest = match self.arrival.pop_front() {
            Some(hash) => hash,
            None => return,
        };
        for blocks in self.by_missing.values_mut() {
            if let Some(pos) = blocks.iter().position(|b| b.hash() == oldest) {
                blocks.remove(pos);
                self.count -= 1;
                break;
            }
        }
        self.by_missing.retain(|_, blocks| !blocks.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use mosaic_common_types::{epoch_time::EpochTime, types::FixedHash};

    use super::*;
    use crate::{
        blocks::{BlockDeps, BlockHeader},
        proof_of_work::Target,
    };

    fn block(nonce: u64) -> Block {
        Block::new(
            BlockHeader {
                deps: BlockDeps::genesis(2),
                dep_state_hash: FixedHash::zero(),
                txs_hash: FixedHash::zero(),
                timestamp: EpochTime::from_millis(nonce),
                target: Target(primitive_types::U256::MAX),
                nonce,
            },
            vec![],
        )
    }

    #[test]
    fn parked_blocks_are_released_by_their_dep() {
        let mut pool = OrphanPool::new(8);
        let dep = FixedHash::from([1u8; 32]);
        let a = block(1);
        let b = block(2);
        pool.park(a.clone(), dep);
        pool.park(b.clone(), FixedHash::from([9u8; 32]));
        assert_eq!(pool.len(), 2);

        let ready = pool.take_ready(&dep);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].hash(), a.hash());
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&b.hash()));
    }

    #[test]
    fn capacity_evicts_the_oldest() {
        let mut pool = OrphanPool::new(2);
        let dep = FixedHash::from([1u8; 32]);
        let a = block(1);
        pool.park(a.clone(), dep);
        pool.park(block(2), dep);
        pool.park(block(3), dep);
        assert_eq!(pool.len(), 2);
        assert!(!pool.contains(&a.hash()));
    }
}

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

use borsh::{BorshDeserialize, BorshSerialize};
use mosaic_common_types::{
    chain_index::{ChainIndex, GroupIndex},
    types::BlockHash,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockDepsError {
    #[error("Expected {expected} dependency hashes, got {actual}")]
    WrongLength { expected: usize, actual: usize },
}

/// The `2·G − 1` predecessor hashes committed in a block header. The first `G − 1` entries are
/// the in-deps, one per foreign group in ascending group order; the last `G` entries are the
/// out-deps, the tips of the block's own `(from, k)` chains in ascending `k` order. The out-dep
/// for the block's own `to` group is its chain parent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BlockDeps {
    deps: Vec<BlockHash>,
}

impl BlockDeps {
    pub fn build(in_deps: Vec<BlockHash>, out_deps: Vec<BlockHash>, groups: u32) -> Result<Self, BlockDepsError> {
        if in_deps.len() != groups as usize - 1 || out_deps.len() != groups as usize {
            return Err(BlockDepsError::WrongLength {
                expected: 2 * groups as usize - 1,
                actual: in_deps.len() + out_deps.len(),
            });
        }
        let mut deps = in_deps;
        deps.extend(out_deps);
        Ok(Self { deps })
    }

    /// All-zero deps marking a genesis header.
    pub fn genesis(groups: u32) -> Self {
        Self {
            deps: vec![BlockHash::zero(); 2 * groups as usize - 1],
        }
    }

    pub fn groups(&self) -> u32 {
        ((self.deps.len() + 1) / 2) as u32
    }

    pub fn len(&self) -> usize {
        self.deps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deps.is_empty()
    }

    pub fn as_slice(&self) -> &[BlockHash] {
        &self.deps
    }

    pub fn in_deps(&self) -> &[BlockHash] {
        &self.deps[..self.groups() as usize - 1]
    }

    pub fn out_deps(&self) -> &[BlockHash] {
        &self.deps[self.groups() as usize - 1..]
    }

    /// The chain parent: the out-dep for the block's own `to` group.
    pub fn parent(&self, chain_index: ChainIndex) -> BlockHash {
        self.out_dep(chain_index.to)
    }

    pub fn out_dep(&self, to: GroupIndex) -> BlockHash {
        self.deps[self.groups() as usize - 1 + to.0 as usize]
    }

    /// The in-dep representing `foreign` group's view, for a block whose own group is `own`.
    pub fn in_dep(&self, own: GroupIndex, foreign: GroupIndex) -> BlockHash {
        debug_assert_ne!(own, foreign);
        let index = if foreign.0 < own.0 { foreign.0 } else { foreign.0 - 1 };
        self.deps[index as usize]
    }

    pub fn is_genesis(&self) -> bool {
        self.deps.iter().all(BlockHash::is_zero)
    }
}

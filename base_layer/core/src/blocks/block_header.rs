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
    fmt,
    fmt::{Display, Formatter},
};

use borsh::{BorshDeserialize, BorshSerialize};
use mosaic_common_types::{
    chain_index::ChainIndex,
    epoch_time::EpochTime,
    types::{BlockHash, FixedHash},
};
use serde::{Deserialize, Serialize};

use crate::{blocks::BlockDeps, hashing, proof_of_work::Target};

/// A block header. The header hash commits to every field, including the full deps vector and
/// the world-state root the block's transactions were executed against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BlockHeader {
    pub deps: BlockDeps,
    /// Root of the group world-state derived from `deps`, before this block's transactions
    pub dep_state_hash: FixedHash,
    /// Merkle root of the block's transaction ids
    pub txs_hash: FixedHash,
    pub timestamp: EpochTime,
    pub target: Target,
    pub nonce: u64,
}

impl BlockHeader {
    pub fn hash(&self) -> BlockHash {
        hashing::hash_borsh(self)
    }

    pub fn is_genesis(&self) -> bool {
        self.deps.is_genesis()
    }

    pub fn parent(&self, chain_index: ChainIndex) -> BlockHash {
        self.deps.parent(chain_index)
    }

    /// The chain this header belongs to, derived from its hash.
    pub fn chain_index(&self, groups: u32) -> ChainIndex {
        ChainIndex::from_hash(&self.hash(), groups)
    }

    pub fn pow_is_valid(&self) -> bool {
        self.target.is_met_by(&self.hash())
    }
}

impl Display for BlockHeader {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "header {} (ts {}, target {})",
            self.hash(),
            self.timestamp,
            self.target
        )
    }
}

#[cfg(test)]
mod tests {
    use mosaic_common_types::types::U256;

    use super::*;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            deps: BlockDeps::genesis(2),
            dep_state_hash: FixedHash::zero(),
            txs_hash: FixedHash::zero(),
            timestamp: EpochTime::from_millis(42),
            target: Target(U256::MAX >> 1),
            nonce: 7,
        }
    }

    #[test]
    fn hash_commits_to_every_field() {
        let header = sample_header();
        let mut changed = header.clone();
        changed.nonce += 1;
        assert_ne!(header.hash(), changed.hash());

        let mut changed = header.clone();
        changed.timestamp = EpochTime::from_millis(43);
        assert_ne!(header.hash(), changed.hash());

        let mut changed = header.clone();
        changed.dep_state_hash = FixedHash::from([1u8; 32]);
        assert_ne!(header.hash(), changed.hash());
    }

    #[test]
    fn genesis_detection() {
        assert!(sample_header().is_genesis());
    }

    #[test]
    fn borsh_round_trip() {
        let header = sample_header();
        let bytes = borsh::to_vec(&header).unwrap();
        let back: BlockHeader = borsh::from_slice(&bytes).unwrap();
        assert_eq!(back, header);
    }
}

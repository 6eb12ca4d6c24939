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
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::FixedHash;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainIndexError {
    #[error("Group index {0} is out of range for {1} groups")]
    GroupOutOfRange(u32, u32),
    #[error("Broker {broker_id} is out of range for {broker_num} brokers")]
    BrokerOutOfRange { broker_id: u32, broker_num: u32 },
}

/// One of the `G` address partitions of the network.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct GroupIndex(pub u32);

impl GroupIndex {
    pub const fn value(self) -> u32 {
        self.0
    }
}

impl Display for GroupIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies one of the `G × G` chains. Chain `(i, j)` carries transactions moving value from
/// group `i` to group `j`.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    BorshSerialize,
    BorshDeserialize,
)]
pub struct ChainIndex {
    pub from: GroupIndex,
    pub to: GroupIndex,
}

impl ChainIndex {
    pub fn new(from: u32, to: u32, groups: u32) -> Result<Self, ChainIndexError> {
        if from >= groups {
            return Err(ChainIndexError::GroupOutOfRange(from, groups));
        }
        if to >= groups {
            return Err(ChainIndexError::GroupOutOfRange(to, groups));
        }
        Ok(Self {
            from: GroupIndex(from),
            to: GroupIndex(to),
        })
    }

    pub const fn unchecked(from: u32, to: u32) -> Self {
        Self {
            from: GroupIndex(from),
            to: GroupIndex(to),
        }
    }

    /// The chain a hash belongs to: the low-order two bytes interpreted big-endian, modulo `G²`.
    pub fn from_hash(hash: &FixedHash, groups: u32) -> Self {
        let bytes = hash.as_slice();
        let low = u32::from(bytes[30]) << 8 | u32::from(bytes[31]);
        let flat = low % (groups * groups);
        Self {
            from: GroupIndex(flat / groups),
            to: GroupIndex(flat % groups),
        }
    }

    /// Position of this chain in a row-major `G × G` grid.
    pub const fn flat_index(self, groups: u32) -> u32 {
        self.from.0 * groups + self.to.0
    }

    pub const fn is_intra_group(self) -> bool {
        self.from.0 == self.to.0
    }
}

impl Display for ChainIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.from, self.to)
    }
}

/// Identifies the node's broker and the contiguous range of "from" groups it serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BrokerInfo {
    pub broker_id: u32,
    pub broker_num: u32,
    pub groups: u32,
}

impl BrokerInfo {
    pub fn new(broker_id: u32, broker_num: u32, groups: u32) -> Result<Self, ChainIndexError> {
        if broker_id >= broker_num {
            return Err(ChainIndexError::BrokerOutOfRange { broker_id, broker_num });
        }
        Ok(Self {
            broker_id,
            broker_num,
            groups,
        })
    }

    pub fn groups_per_broker(&self) -> u32 {
        self.groups / self.broker_num
    }

    /// True if this broker serves chains whose "from" side is `group`.
    pub fn contains_group(&self, group: GroupIndex) -> bool {
        let start = self.broker_id * self.groups_per_broker();
        let end = start + self.groups_per_broker();
        (start..end).contains(&group.0)
    }

    pub fn contains_chain(&self, chain_index: ChainIndex) -> bool {
        self.contains_group(chain_index.from)
    }

    /// All chains with an in-broker "from" group, row-major.
    pub fn chain_indexes(&self) -> Vec<ChainIndex> {
        let start = self.broker_id * self.groups_per_broker();
        let end = start + self.groups_per_broker();
        (start..end)
            .flat_map(|from| (0..self.groups).map(move |to| ChainIndex::unchecked(from, to)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_index_from_hash_is_stable() {
        let mut bytes = [0u8; 32];
        bytes[30] = 0;
        bytes[31] = 7;
        let hash = FixedHash::from(bytes);
        // 7 % 16 = 7 -> from 1, to 3 in a 4-group grid
        let index = ChainIndex::from_hash(&hash, 4);
        assert_eq!(index, ChainIndex::unchecked(1, 3));
        assert_eq!(index.flat_index(4), 7);
    }

    #[test]
    fn chain_index_rejects_out_of_range_groups() {
        assert!(ChainIndex::new(0, 3, 4).is_ok());
        assert_eq!(
            ChainIndex::new(4, 0, 4),
            Err(ChainIndexError::GroupOutOfRange(4, 4))
        );
    }

    #[test]
    fn broker_covers_a_contiguous_range() {
        let broker = BrokerInfo::new(1, 2, 4).unwrap();
        assert!(!broker.contains_group(GroupIndex(0)));
        assert!(!broker.contains_group(GroupIndex(1)));
        assert!(broker.contains_group(GroupIndex(2)));
        assert!(broker.contains_group(GroupIndex(3)));
        assert_eq!(broker.chain_indexes().len(), 8);
    }

    #[test]
    fn single_broker_covers_everything() {
        let broker = BrokerInfo::new(0, 1, 3).unwrap();
        for g in 0..3 {
            assert!(broker.contains_group(GroupIndex(g)));
        }
        assert_eq!(broker.chain_indexes().len(), 9);
    }
}

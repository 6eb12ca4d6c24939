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
    chain_index::ChainIndex,
    types::{BlockHash, FixedHash},
};
use serde::{Deserialize, Serialize};

use crate::{
    blocks::BlockHeader,
    hashing,
    proof_of_work::Target,
    transactions::Transaction,
};

/// Merkle root of a transaction list: pair-wise blake2b over transaction ids, the odd leaf
/// duplicated. An empty list hashes to the zero hash.
pub fn merkle_root(transactions: &[Transaction]) -> FixedHash {
    let mut layer: Vec<FixedHash> = transactions.iter().map(Transaction::id).collect();
    if layer.is_empty() {
        return FixedHash::zero();
    }
    while layer.len() > 1 {
        let mut next = Vec::with_capacity((layer.len() + 1) / 2);
        for pair in layer.chunks(2) {
            let right = pair.get(1).unwrap_or(&pair[0]);
            next.push(hashing::hash_pair(&pair[0], right));
        }
        layer = next;
    }
    layer[0]
}

/// A block: header plus transaction list, the coinbase last.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self { header, transactions }
    }

    pub fn hash(&self) -> BlockHash {
        self.header.hash()
    }

    pub fn chain_index(&self, groups: u32) -> ChainIndex {
        self.header.chain_index(groups)
    }

    pub fn is_genesis(&self) -> bool {
        self.header.is_genesis()
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.last()
    }

    pub fn non_coinbase(&self) -> &[Transaction] {
        match self.transactions.len() {
            0 => &[],
            n => &self.transactions[..n - 1],
        }
    }

    pub fn total_gas(&self) -> u64 {
        self.transactions
            .iter()
            .fold(0u64, |acc, tx| acc.saturating_add(tx.gas_amount().0))
    }

    pub fn merkle_root(&self) -> FixedHash {
        merkle_root(&self.transactions)
    }

    /// The order non-coinbase transactions execute in: a permutation drawn deterministically from
    /// the header hash, so honest nodes agree but transaction authors cannot position themselves.
    pub fn non_coinbase_execution_order(&self) -> Vec<usize> {
        let count = self.non_coinbase().len();
        let mut order: Vec<usize> = (0..count).collect();
        let seed_bytes = self.hash();
        let mut seed = u64::from_be_bytes(
            seed_bytes.as_slice()[..8].try_into().expect("hash is 32 bytes"),
        ) | 1;
        for i in (1..count).rev() {
            // xorshift64*
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let j = (seed % (i as u64 + 1)) as usize;
            order.swap(i, j);
        }
        order
    }
}

/// A candidate block handed to external miners: everything but the winning nonce.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct BlockTemplate {
    pub chain_index: ChainIndex,
    pub height: u64,
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub target: Target,
}

impl BlockTemplate {
    /// Finish the template into a block with the supplied nonce.
    pub fn into_block(self, nonce: u64) -> Block {
        let mut header = self.header;
        header.nonce = nonce;
        Block::new(header, self.transactions)
    }
}

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

use crate::error::StoreError;

/// The column families of the chain store. Keys are canonical-serialized identifiers, values are
/// canonical-serialized entities; the chain layer owns both codecs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColumnFamily {
    /// Block header by block hash
    Headers,
    /// Block body (transaction list) by block hash
    Bodies,
    /// Per-hash chain state (height, weight, canonical flag) by block hash
    ChainState,
    /// Height -> hashes index, keyed by (chain, height)
    HeightIndex,
    /// World-state trie nodes by node hash
    TrieNodes,
    /// Node-local bookkeeping (tips, per-block state roots)
    NodeState,
}

impl ColumnFamily {
    pub const ALL: [ColumnFamily; 6] = [
        ColumnFamily::Headers,
        ColumnFamily::Bodies,
        ColumnFamily::ChainState,
        ColumnFamily::HeightIndex,
        ColumnFamily::TrieNodes,
        ColumnFamily::NodeState,
    ];
}

#[derive(Clone, Debug)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// An ordered set of writes applied atomically by [`KeyValStore::write`]. A batch is the unit of
/// crash-safe commit: either every operation is visible or none is.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<(ColumnFamily, BatchOp)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn put(&mut self, cf: ColumnFamily, key: Vec<u8>, value: Vec<u8>) -> &mut Self {
        self.ops.push((cf, BatchOp::Put { key, value }));
        self
    }

    pub fn delete(&mut self, cf: ColumnFamily, key: Vec<u8>) -> &mut Self {
        self.ops.push((cf, BatchOp::Delete { key }));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn into_ops(self) -> Vec<(ColumnFamily, BatchOp)> {
        self.ops
    }

    pub fn ops(&self) -> &[(ColumnFamily, BatchOp)] {
        &self.ops
    }
}

/// A column-family keyed byte store. Implementations must apply [`WriteBatch`]es atomically with
/// respect to readers and to crashes.
pub trait KeyValStore: Send + Sync {
    fn get(&self, cf: ColumnFamily, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;

    fn exists(&self, cf: ColumnFamily, key: &[u8]) -> Result<bool, StoreError>;

    fn put(&self, cf: ColumnFamily, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.put(cf, key, value);
        self.write(batch)
    }

    fn delete(&self, cf: ColumnFamily, key: &[u8]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new();
        batch.delete(cf, key.to_vec());
        self.write(batch)
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Visit every `(key, value)` pair of a column family. Iteration order is unspecified.
    fn for_each(
        &self,
        cf: ColumnFamily,
        f: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}

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

//! The authenticated map backing the world-state: a persistent 16-ary radix trie over the
//! blake2b image of each key. Nodes are immutable and content-addressed, so every root ever
//! committed remains readable until its nodes are pruned; the empty trie is the zero root.
//!
//! The trie shape is a function of the key set alone: branches exist exactly along shared path
//! prefixes, and deletion collapses a lone leaf back into its parent. Two executors applying the
//! same updates therefore agree on the root byte for byte.

use std::collections::HashMap;

use borsh::{BorshDeserialize, BorshSerialize};
use mosaic_common_types::types::FixedHash;
use mosaic_storage::{ColumnFamily, KeyValStore, WriteBatch};

use crate::{hashing, state::StateError};

const NIBBLES: usize = 64;

fn key_path(key: &[u8]) -> Vec<u8> {
    let image = hashing::hash_bytes(key);
    let mut path = Vec::with_capacity(NIBBLES);
    for byte in image.as_slice() {
        path.push(byte >> 4);
        path.push(byte & 0x0f);
    }
    path
}

#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
enum TrieNode {
    Leaf {
        /// Nibbles of the key image below this node
        path: Vec<u8>,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Branch {
        children: [Option<FixedHash>; 16],
    },
}

impl TrieNode {
    fn hash(&self) -> FixedHash {
        hashing::hash_borsh(self)
    }
}

/// Read handle over the trie nodes of a store.
#[derive(Clone)]
pub struct Trie<S> {
    store: S,
}

impl<S: KeyValStore> Trie<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn fetch_node(&self, hash: &FixedHash) -> Result<TrieNode, StateError> {
        let bytes = self
            .store
            .get(ColumnFamily::TrieNodes, hash.as_slice())?
            .ok_or_else(|| StateError::Corruption(format!("missing trie node {}", hash)))?;
        borsh::from_slice(&bytes).map_err(|e| StateError::Corruption(format!("trie node {}: {}", hash, e)))
    }

    pub fn get(&self, root: &FixedHash, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        if root.is_zero() {
            return Ok(None);
        }
        let path = key_path(key);
        let mut node = self.fetch_node(root)?;
        let mut depth = 0;
        loop {
            match node {
                TrieNode::Leaf { path: leaf_path, value, .. } => {
                    return if leaf_path == path[depth..] {
                        Ok(Some(value))
                    } else {
                        Ok(None)
                    };
                },
                TrieNode::Branch { children } => {
                    match children[path[depth] as usize] {
                        Some(child) => {
                            node = self.fetch_node(&child)?;
                            depth += 1;
                        },
                        None => return Ok(None),
                    }
                },
            }
        }
    }

    /// Visit every `(key, value)` leaf under `root`. Traversal order follows the hashed key
    /// space, so it is deterministic but unrelated to key order.
    pub fn for_each_leaf(
        &self,
        root: &FixedHash,
        f: &mut dyn FnMut(&[u8], &[u8]) -> Result<bool, StateError>,
    ) -> Result<(), StateError> {
        if root.is_zero() {
            return Ok(());
        }
        self.walk(root, f)?;
        Ok(())
    }

    fn walk(
        &self,
        node_hash: &FixedHash,
        f: &mut dyn FnMut(&[u8], &[u8]) -> Result<bool, StateError>,
    ) -> Result<bool, StateError> {
        match self.fetch_node(node_hash)? {
            TrieNode::Leaf { key, value, .. } => f(&key, &value),
            TrieNode::Branch { children } => {
                for child in children.iter().flatten() {
                    if !self.walk(child, f)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            },
        }
    }

    pub fn updater(&self, root: FixedHash) -> TrieUpdater<'_, S> {
        TrieUpdater {
            trie: self,
            root,
            pending: HashMap::new(),
        }
    }
}

/// Accumulates trie mutations against a starting root. New nodes stay in memory until
/// [`TrieUpdater::into_batch`] moves them into a storage batch; dropping the updater discards
/// every change.
pub struct TrieUpdater<'a, S> {
    trie: &'a Trie<S>,
    root: FixedHash,
    pending: HashMap<FixedHash, TrieNode>,
}

impl<'a, S: KeyValStore> TrieUpdater<'a, S> {
    pub fn root(&self) -> FixedHash {
        self.root
    }

    fn node(&self, hash: &FixedHash) -> Result<TrieNode, StateError> {
        if let Some(node) = self.pending.get(hash) {
            return Ok(node.clone());
        }
        self.trie.fetch_node(hash)
    }

    fn store_node(&mut self, node: TrieNode) -> FixedHash {
        let hash = node.hash();
        self.pending.insert(hash, node);
        hash
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError> {
        if self.root.is_zero() {
            return Ok(None);
        }
        let path = key_path(key);
        let root = self.root;
        let mut node = self.node(&root)?;
        let mut depth = 0;
        loop {
            match node {
                TrieNode::Leaf { path: leaf_path, value, .. } => {
                    return if leaf_path == path[depth..] {
                        Ok(Some(value))
                    } else {
                        Ok(None)
                    };
                },
                TrieNode::Branch { children } => match children[path[depth] as usize] {
                    Some(child) => {
                        node = self.node(&child)?;
                        depth += 1;
                    },
                    None => return Ok(None),
                },
            }
        }
    }

    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<(), StateError> {
        let path = key_path(key);
        let root = if self.root.is_zero() { None } else { Some(self.root) };
        self.root = self.insert_at(root, &path, key, value)?;
        Ok(())
    }

    fn insert_at(
        &mut self,
        node: Option<FixedHash>,
        path: &[u8],
        key: &[u8],
        value: &[u8],
    ) -> Result<FixedHash, StateError> {
        let node_hash = match node {
            None => {
                return Ok(self.store_node(TrieNode::Leaf {
                    path: path.to_vec(),
                    key: key.to_vec(),
                    value: value.to_vec(),
                }));
            },
            Some(hash) => hash,
        };
        match self.node(&node_hash)? {
            TrieNode::Leaf {
                path: leaf_path,
                key: leaf_key,
                value: leaf_value,
            } => {
                if leaf_path == path {
                    return Ok(self.store_node(TrieNode::Leaf {
                        path: path.to_vec(),
                        key: key.to_vec(),
                        value: value.to_vec(),
                    }));
                }
                // Push the resident leaf one level down, then insert into the fresh branch
                let mut children: [Option<FixedHash>; 16] = Default::default();
                let moved = self.store_node(TrieNode::Leaf {
                    path: leaf_path[1..].to_vec(),
                    key: leaf_key,
                    value: leaf_value,
                });
                children[leaf_path[0] as usize] = Some(moved);
                let slot = path[0] as usize;
                let child = children[slot];
                children[slot] = Some(self.insert_at(child, &path[1..], key, value)?);
                Ok(self.store_node(TrieNode::Branch { children }))
            },
            TrieNode::Branch { mut children } => {
                let slot = path[0] as usize;
                let child = children[slot];
                children[slot] = Some(self.insert_at(child, &path[1..], key, value)?);
                Ok(self.store_node(TrieNode::Branch { children }))
            },
        }
    }

    /// Remove `key`; returns whether it was present.
    pub fn remove(&mut self, key: &[u8]) -> Result<bool, StateError> {
        if self.root.is_zero() {
            return Ok(false);
        }
        let path = key_path(key);
        match self.remove_at(self.root, &path)? {
            None => Ok(false),
            Some(new_root) => {
                self.root = new_root.unwrap_or_else(FixedHash::zero);
                Ok(true)
            },
        }
    }

    /// `Ok(None)` = key absent; `Ok(Some(child))` = key removed, `child` is the replacement node.
    fn remove_at(&mut self, node_hash: FixedHash, path: &[u8]) -> Result<Option<Option<FixedHash>>, StateError> {
        match self.node(&node_hash)? {
            TrieNode::Leaf { path: leaf_path, .. } => {
                if leaf_path == path {
                    Ok(Some(None))
                } else {
                    Ok(None)
                }
            },
            TrieNode::Branch { mut children } => {
                let slot = path[0] as usize;
                let child = match children[slot] {
                    Some(child) => child,
                    None => return Ok(None),
                };
                match self.remove_at(child, &path[1..])? {
                    None => Ok(None),
                    Some(new_child) => {
                        children[slot] = new_child;
                        Ok(Some(Some(self.normalize_branch(children)?)))
                    },
                }
            },
        }
    }

    /// Restore the canonical shape after a removal: a branch left with a single leaf child
    /// collapses into a leaf with the child's path re-extended by its slot nibble.
    fn normalize_branch(&mut self, children: [Option<FixedHash>; 16]) -> Result<FixedHash, StateError> {
        let live: Vec<(usize, FixedHash)> = children
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|hash| (i, hash)))
            .collect();
        if live.len() == 1 {
            let (slot, child_hash) = live[0];
            if let TrieNode::Leaf { path, key, value } = self.node(&child_hash)? {
                let mut extended = Vec::with_capacity(path.len() + 1);
                extended.push(slot as u8);
                extended.extend(path);
                return Ok(self.store_node(TrieNode::Leaf {
                    path: extended,
                    key,
                    value,
                }));
            }
        }
        Ok(self.store_node(TrieNode::Branch { children }))
    }

    /// Append every new node to `batch` and return the final root.
    pub fn into_batch(self, batch: &mut WriteBatch) -> Result<FixedHash, StateError> {
        for (hash, node) in self.pending {
            batch.put(
                ColumnFamily::TrieNodes,
                hash.to_vec(),
                borsh::to_vec(&node).map_err(|e| StateError::Corruption(e.to_string()))?,
            );
        }
        Ok(self.root)
    }
}

#[cfg(test)]
mod tests {
    use mosaic_storage::MemoryStore;

    use super::*;

    fn committed_insert<S: KeyValStore>(trie: &Trie<S>, root: FixedHash, pairs: &[(&[u8], &[u8])]) -> FixedHash
    where
        S: Clone,
    {
        let mut updater = trie.updater(root);
        for (k, v) in pairs {
            updater.insert(k, v).unwrap();
        }
        let mut batch = WriteBatch::new();
        let root = updater.into_batch(&mut batch).unwrap();
        trie.store.write(batch).unwrap();
        root
    }

    #[test]
    fn insert_then_get() {
        let trie = Trie::new(MemoryStore::new());
        let root = committed_insert(&trie, FixedHash::zero(), &[(b"alpha", b"1"), (b"beta", b"2"), (b"gamma", b"3")]);
        assert_eq!(trie.get(&root, b"alpha").unwrap(), Some(b"1".to_vec()));
        assert_eq!(trie.get(&root, b"beta").unwrap(), Some(b"2".to_vec()));
        assert_eq!(trie.get(&root, b"delta").unwrap(), None);
    }

    #[test]
    fn root_is_independent_of_insertion_order() {
        let trie = Trie::new(MemoryStore::new());
        let root_a = committed_insert(&trie, FixedHash::zero(), &[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
        let root_b = committed_insert(&trie, FixedHash::zero(), &[(b"c", b"3"), (b"a", b"1"), (b"b", b"2")]);
        assert_eq!(root_a, root_b);
    }

    #[test]
    fn removal_restores_the_previous_root() {
        let trie = Trie::new(MemoryStore::new());
        let root_one = committed_insert(&trie, FixedHash::zero(), &[(b"a", b"1")]);
        let root_two = committed_insert(&trie, root_one, &[(b"b", b"2")]);

        let mut updater = trie.updater(root_two);
        assert!(updater.remove(b"b").unwrap());
        let mut batch = WriteBatch::new();
        let root = updater.into_batch(&mut batch).unwrap();
        trie.store.write(batch).unwrap();
        assert_eq!(root, root_one);
    }

    #[test]
    fn removing_the_last_key_empties_the_trie() {
        let trie = Trie::new(MemoryStore::new());
        let root = committed_insert(&trie, FixedHash::zero(), &[(b"only", b"1")]);
        let mut updater = trie.updater(root);
        assert!(updater.remove(b"only").unwrap());
        assert!(!updater.remove(b"only").unwrap());
        assert!(updater.root().is_zero());
    }

    #[test]
    fn old_roots_remain_readable() {
        let trie = Trie::new(MemoryStore::new());
        let root_one = committed_insert(&trie, FixedHash::zero(), &[(b"k", b"old")]);
        let root_two = committed_insert(&trie, root_one, &[(b"k", b"new")]);
        assert_eq!(trie.get(&root_one, b"k").unwrap(), Some(b"old".to_vec()));
        assert_eq!(trie.get(&root_two, b"k").unwrap(), Some(b"new".to_vec()));
    }

    #[test]
    fn leaf_walk_visits_every_entry() {
        let trie = Trie::new(MemoryStore::new());
        let root = committed_insert(&trie, FixedHash::zero(), &[(b"a", b"1"), (b"b", b"2"), (b"c", b"3")]);
        let mut seen = Vec::new();
        trie.for_each_leaf(&root, &mut |key, value| {
            seen.push((key.to_vec(), value.to_vec()));
            Ok(true)
        })
        .unwrap();
        seen.sort();
        assert_eq!(
            seen,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec()),
                (b"c".to_vec(), b"3".to_vec())
            ]
        );
    }

    #[test]
    fn uncommitted_updates_are_invisible() {
        let trie = Trie::new(MemoryStore::new());
        let mut updater = trie.updater(FixedHash::zero());
        updater.insert(b"ghost", b"1").unwrap();
        let root = updater.root();
        drop(updater);
        // Nodes were never committed; reading through the store must fail
        assert!(trie.get(&root, b"ghost").is_err());
    }
}

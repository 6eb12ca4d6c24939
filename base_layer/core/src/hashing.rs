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

//! Blake2b-256 is the domain hash for every on-chain identity: block hashes, transaction ids,
//! output keys and trie nodes.

use blake2::Blake2b;
use borsh::BorshSerialize;
use digest::{consts::U32, Digest};
use mosaic_common_types::types::FixedHash;

pub type DomainHasher = Blake2b<U32>;

pub fn hash_bytes(bytes: &[u8]) -> FixedHash {
    let output = DomainHasher::digest(bytes);
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&output);
    FixedHash::from(buf)
}

/// Hash the canonical (borsh) encoding of an entity.
pub fn hash_borsh<T: BorshSerialize>(val: &T) -> FixedHash {
    let bytes = borsh::to_vec(val).expect("borsh serialization of an in-memory value cannot fail");
    hash_bytes(&bytes)
}

/// Hash the concatenation of two hashes; used for Merkle tree nodes and derived identities.
pub fn hash_pair(left: &FixedHash, right: &FixedHash) -> FixedHash {
    let mut hasher = DomainHasher::new();
    hasher.update(left.as_slice());
    hasher.update(right.as_slice());
    let output = hasher.finalize();
    let mut buf = [0u8; 32];
    buf.copy_from_slice(&output);
    FixedHash::from(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        assert_eq!(hash_bytes(b"mosaic"), hash_bytes(b"mosaic"));
        assert_ne!(hash_bytes(b"mosaic"), hash_bytes(b"mosaik"));
    }

    #[test]
    fn pair_hash_is_order_sensitive() {
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }
}

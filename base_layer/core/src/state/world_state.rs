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
use mosaic_common_types::types::FixedHash;
use mosaic_storage::KeyValStore;
use serde::{Deserialize, Serialize};

use crate::{
    state::{CachedWorldState, StateError, Trie},
    transactions::{AssetOutput, AssetOutputRef, ContractId, ContractOutput, ContractOutputRef},
    vm::{StatefulContract, Val},
};

const DOMAIN_ASSET: u8 = 0;
const DOMAIN_CONTRACT: u8 = 1;
const DOMAIN_CONTRACT_OUTPUT: u8 = 2;
const DOMAIN_CODE: u8 = 3;

fn domain_key<T: BorshSerialize>(domain: u8, key: &T) -> Result<Vec<u8>, StateError> {
    let mut bytes = vec![domain];
    borsh::to_writer(&mut bytes, key).map_err(|e| StateError::Corruption(e.to_string()))?;
    Ok(bytes)
}

/// Mutable state of a live contract: its field values, the hash of its code and a pointer to the
/// asset output holding its balance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ContractState {
    pub fields: Vec<Val>,
    pub code_hash: FixedHash,
    pub asset_ref: ContractOutputRef,
}

/// A group's ledger state at one root: the UTXO set, contract states and contract outputs, all
/// held in one authenticated trie under domain-prefixed keys. A `WorldState` is a cheap value;
/// any historical root the store still holds can be read through it.
#[derive(Clone)]
pub struct WorldState<S> {
    trie: Trie<S>,
    root: FixedHash,
}

impl<S: KeyValStore + Clone> WorldState<S> {
    pub fn new(store: S, root: FixedHash) -> Self {
        Self {
            trie: Trie::new(store),
            root,
        }
    }

    pub fn root(&self) -> FixedHash {
        self.root
    }

    pub fn trie(&self) -> &Trie<S> {
        &self.trie
    }

    pub fn get_asset(&self, output_ref: &AssetOutputRef) -> Result<Option<AssetOutput>, StateError> {
        let key = domain_key(DOMAIN_ASSET, output_ref)?;
        match self.trie.get(&self.root, &key)? {
            Some(bytes) => Ok(Some(
                borsh::from_slice(&bytes).map_err(|e| StateError::Corruption(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn get_contract(&self, id: &ContractId) -> Result<Option<ContractState>, StateError> {
        let key = domain_key(DOMAIN_CONTRACT, id)?;
        match self.trie.get(&self.root, &key)? {
            Some(bytes) => Ok(Some(
                borsh::from_slice(&bytes).map_err(|e| StateError::Corruption(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    pub fn get_contract_output(&self, output_ref: &ContractOutputRef) -> Result<Option<ContractOutput>, StateError> {
        let key = domain_key(DOMAIN_CONTRACT_OUTPUT, output_ref)?;
        match self.trie.get(&self.root, &key)? {
            Some(bytes) => Ok(Some(
                borsh::from_slice(&bytes).map_err(|e| StateError::Corruption(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Contract code, stored immutably under its own hash.
    pub fn get_code(&self, code_hash: &FixedHash) -> Result<Option<StatefulContract>, StateError> {
        let key = domain_key(DOMAIN_CODE, code_hash)?;
        match self.trie.get(&self.root, &key)? {
            Some(bytes) => Ok(Some(
                borsh::from_slice(&bytes).map_err(|e| StateError::Corruption(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Visit every UTXO at this root until `f` returns `false`.
    pub fn for_each_asset(
        &self,
        f: &mut dyn FnMut(AssetOutputRef, AssetOutput) -> Result<bool, StateError>,
    ) -> Result<(), StateError> {
        self.trie.for_each_leaf(&self.root, &mut |key, value| {
            if key.first() != Some(&DOMAIN_ASSET) {
                return Ok(true);
            }
            let output_ref: AssetOutputRef =
                borsh::from_slice(&key[1..]).map_err(|e| StateError::Corruption(e.to_string()))?;
            let output: AssetOutput =
                borsh::from_slice(value).map_err(|e| StateError::Corruption(e.to_string()))?;
            f(output_ref, output)
        })
    }

    /// Start a copy-on-write overlay for executing a block's transactions against this root.
    pub fn cached(&self) -> CachedWorldState<S> {
        CachedWorldState::new(self.clone())
    }

    pub(crate) fn asset_key(output_ref: &AssetOutputRef) -> Result<Vec<u8>, StateError> {
        domain_key(DOMAIN_ASSET, output_ref)
    }

    pub(crate) fn contract_key(id: &ContractId) -> Result<Vec<u8>, StateError> {
        domain_key(DOMAIN_CONTRACT, id)
    }

    pub(crate) fn contract_output_key(output_ref: &ContractOutputRef) -> Result<Vec<u8>, StateError> {
        domain_key(DOMAIN_CONTRACT_OUTPUT, output_ref)
    }

    pub(crate) fn code_key(code_hash: &FixedHash) -> Result<Vec<u8>, StateError> {
        domain_key(DOMAIN_CODE, code_hash)
    }
}

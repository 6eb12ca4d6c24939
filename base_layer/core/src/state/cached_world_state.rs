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

use std::collections::HashMap;

use mosaic_common_types::types::FixedHash;
use mosaic_storage::{KeyValStore, WriteBatch};

use crate::{
    state::{world_state::ContractState, StateError, WorldState},
    transactions::{AssetOutput, AssetOutputRef, ContractId, ContractOutput, ContractOutputRef},
    vm::StatefulContract,
};

#[derive(Clone, Debug)]
enum Modified<T> {
    Updated(T),
    Removed,
}

/// Copy-on-write overlay over a [`WorldState`] root. Transaction execution mutates the overlay
/// only; [`CachedWorldState::commit`] folds the changes into a storage batch and a new root,
/// while dropping the overlay discards every change with no side effect.
pub struct CachedWorldState<S> {
    base: WorldState<S>,
    assets: HashMap<AssetOutputRef, Modified<AssetOutput>>,
    contracts: HashMap<ContractId, Modified<ContractState>>,
    contract_outputs: HashMap<ContractOutputRef, Modified<ContractOutput>>,
    codes: HashMap<FixedHash, StatefulContract>,
}

impl<S: KeyValStore + Clone> CachedWorldState<S> {
    pub fn new(base: WorldState<S>) -> Self {
        Self {
            base,
            assets: HashMap::new(),
            contracts: HashMap::new(),
            contract_outputs: HashMap::new(),
            codes: HashMap::new(),
        }
    }

    pub fn base_root(&self) -> FixedHash {
        self.base.root()
    }

    pub fn get_asset(&self, output_ref: &AssetOutputRef) -> Result<Option<AssetOutput>, StateError> {
        match self.assets.get(output_ref) {
            Some(Modified::Updated(output)) => Ok(Some(output.clone())),
            Some(Modified::Removed) => Ok(None),
            None => self.base.get_asset(output_ref),
        }
    }

    pub fn exists_asset(&self, output_ref: &AssetOutputRef) -> Result<bool, StateError> {
        Ok(self.get_asset(output_ref)?.is_some())
    }

    pub fn add_asset(&mut self, output_ref: AssetOutputRef, output: AssetOutput) {
        self.assets.insert(output_ref, Modified::Updated(output));
    }

    /// Spend an asset output: the output is returned and marked removed.
    pub fn use_asset(&mut self, output_ref: &AssetOutputRef) -> Result<AssetOutput, StateError> {
        let output = self.get_asset(output_ref)?.ok_or(StateError::NotFound)?;
        self.assets.insert(*output_ref, Modified::Removed);
        Ok(output)
    }

    pub fn get_contract(&self, id: &ContractId) -> Result<Option<ContractState>, StateError> {
        match self.contracts.get(id) {
            Some(Modified::Updated(state)) => Ok(Some(state.clone())),
            Some(Modified::Removed) => Ok(None),
            None => self.base.get_contract(id),
        }
    }

    pub fn create_contract(
        &mut self,
        id: ContractId,
        state: ContractState,
        output: ContractOutput,
    ) {
        self.contract_outputs.insert(state.asset_ref, Modified::Updated(output));
        self.contracts.insert(id, Modified::Updated(state));
    }

    pub fn update_contract_fields(&mut self, id: &ContractId, fields: Vec<crate::vm::Val>) -> Result<(), StateError> {
        let mut state = self.get_contract(id)?.ok_or(StateError::NotFound)?;
        state.fields = fields;
        self.contracts.insert(*id, Modified::Updated(state));
        Ok(())
    }

    /// Repoint a contract's asset output, replacing the old one.
    pub fn update_contract_asset(
        &mut self,
        id: &ContractId,
        new_ref: ContractOutputRef,
        output: ContractOutput,
    ) -> Result<(), StateError> {
        let mut state = self.get_contract(id)?.ok_or(StateError::NotFound)?;
        self.contract_outputs.insert(state.asset_ref, Modified::Removed);
        state.asset_ref = new_ref;
        self.contract_outputs.insert(new_ref, Modified::Updated(output));
        self.contracts.insert(*id, Modified::Updated(state));
        Ok(())
    }

    /// Remove a contract and its asset output (self-destruction).
    pub fn remove_contract(&mut self, id: &ContractId) -> Result<(), StateError> {
        let state = self.get_contract(id)?.ok_or(StateError::NotFound)?;
        self.contract_outputs.insert(state.asset_ref, Modified::Removed);
        self.contracts.insert(*id, Modified::Removed);
        Ok(())
    }

    /// Detach a contract's asset output, e.g. when its balance is pulled into an executing frame.
    pub fn take_contract_output(&mut self, output_ref: &ContractOutputRef) -> Result<ContractOutput, StateError> {
        let output = self.get_contract_output(output_ref)?.ok_or(StateError::NotFound)?;
        self.contract_outputs.insert(*output_ref, Modified::Removed);
        Ok(output)
    }

    /// Contract code is immutable; destroyed contracts leave their code behind for copies.
    pub fn add_code(&mut self, code: StatefulContract) {
        self.codes.insert(code.code_hash(), code);
    }

    pub fn get_code(&self, code_hash: &FixedHash) -> Result<Option<StatefulContract>, StateError> {
        if let Some(code) = self.codes.get(code_hash) {
            return Ok(Some(code.clone()));
        }
        self.base.get_code(code_hash)
    }

    pub fn get_contract_output(&self, output_ref: &ContractOutputRef) -> Result<Option<ContractOutput>, StateError> {
        match self.contract_outputs.get(output_ref) {
            Some(Modified::Updated(output)) => Ok(Some(output.clone())),
            Some(Modified::Removed) => Ok(None),
            None => self.base.get_contract_output(output_ref),
        }
    }

    /// Fold the overlay into `batch` and return the new state root. The base state is untouched;
    /// the caller decides when the batch reaches the store.
    pub fn commit(self, batch: &mut WriteBatch) -> Result<FixedHash, StateError> {
        let mut updater = self.base.trie().updater(self.base.root());
        for (output_ref, modified) in &self.assets {
            let key = WorldState::<S>::asset_key(output_ref)?;
            match modified {
                Modified::Updated(output) => {
                    let value = borsh::to_vec(output).map_err(|e| StateError::Corruption(e.to_string()))?;
                    updater.insert(&key, &value)?;
                },
                Modified::Removed => {
                    updater.remove(&key)?;
                },
            }
        }
        for (id, modified) in &self.contracts {
            let key = WorldState::<S>::contract_key(id)?;
            match modified {
                Modified::Updated(state) => {
                    let value = borsh::to_vec(state).map_err(|e| StateError::Corruption(e.to_string()))?;
                    updater.insert(&key, &value)?;
                },
                Modified::Removed => {
                    updater.remove(&key)?;
                },
            }
        }
        for (output_ref, modified) in &self.contract_outputs {
            let key = WorldState::<S>::contract_output_key(output_ref)?;
            match modified {
                Modified::Updated(output) => {
                    let value = borsh::to_vec(output).map_err(|e| StateError::Corruption(e.to_string()))?;
                    updater.insert(&key, &value)?;
                },
                Modified::Removed => {
                    updater.remove(&key)?;
                },
            }
        }
        for (code_hash, code) in &self.codes {
            let key = WorldState::<S>::code_key(code_hash)?;
            let value = borsh::to_vec(code).map_err(|e| StateError::Corruption(e.to_string()))?;
            updater.insert(&key, &value)?;
        }
        updater.into_batch(batch)
    }
}

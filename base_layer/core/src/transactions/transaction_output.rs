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
    chain_index::GroupIndex,
    epoch_time::EpochTime,
    types::{FixedHash, TokenId, TxId},
};
use serde::{Deserialize, Serialize};

use crate::{hashing, transactions::Amount};

/// A contract's identity, assigned at creation from the creating transaction.
pub type ContractId = FixedHash;

/// Spend predicate attached to an output.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum LockScript {
    /// Pay to the blake2b hash of a public key
    P2pkh(FixedHash),
    /// Owned by a contract
    P2c(ContractId),
}

impl LockScript {
    /// The group an output belongs to, derived from the lockup identity.
    pub fn group_index(&self, groups: u32) -> GroupIndex {
        let hash = match self {
            LockScript::P2pkh(hash) => hash,
            LockScript::P2c(id) => id,
        };
        GroupIndex(u32::from(hash.as_slice()[31]) % groups)
    }
}

/// Witness satisfying a [`LockScript`]; carried on the spending input.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum UnlockScript {
    /// Reveal the public key whose hash is the lockup; the matching signature is carried in the
    /// transaction's signature list.
    P2pkh(Vec<u8>),
}

/// Reference to a spendable asset output: a group-tagged hint plus the output key.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct AssetOutputRef {
    pub hint: u32,
    pub key: FixedHash,
}

impl AssetOutputRef {
    pub const ASSET_TAG: u32 = 1;

    pub fn new(group: GroupIndex, key: FixedHash) -> Self {
        Self {
            hint: group.0 << 1 | Self::ASSET_TAG,
            key,
        }
    }

    pub fn group(&self) -> GroupIndex {
        GroupIndex(self.hint >> 1)
    }
}

/// Reference to a contract's asset output. Distinguished from [`AssetOutputRef`] by the hint tag.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct ContractOutputRef {
    pub hint: u32,
    pub key: FixedHash,
}

impl ContractOutputRef {
    pub fn new(group: GroupIndex, key: FixedHash) -> Self {
        Self { hint: group.0 << 1, key }
    }

    pub fn group(&self) -> GroupIndex {
        GroupIndex(self.hint >> 1)
    }
}

/// Either kind of output reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum TxOutputRef {
    Asset(AssetOutputRef),
    Contract(ContractOutputRef),
}

/// The key of the `index`-th output of transaction `tx_id`.
pub fn output_key(tx_id: &TxId, index: u32) -> FixedHash {
    hashing::hash_borsh(&(tx_id, index))
}

/// A spendable UTXO.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct AssetOutput {
    pub amount: Amount,
    pub lock_script: LockScript,
    /// Absolute time lock; zero means spendable immediately
    pub lock_time: EpochTime,
    pub tokens: Vec<(TokenId, Amount)>,
    pub additional_data: Vec<u8>,
}

impl AssetOutput {
    pub fn new(amount: Amount, lock_script: LockScript) -> Self {
        Self {
            amount,
            lock_script,
            lock_time: EpochTime::from_millis(0),
            tokens: Vec::new(),
            additional_data: Vec::new(),
        }
    }

    pub fn with_lock_time(mut self, lock_time: EpochTime) -> Self {
        self.lock_time = lock_time;
        self
    }

    pub fn with_tokens(mut self, tokens: Vec<(TokenId, Amount)>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn with_additional_data(mut self, data: Vec<u8>) -> Self {
        self.additional_data = data;
        self
    }

    pub fn group_index(&self, groups: u32) -> GroupIndex {
        self.lock_script.group_index(groups)
    }
}

/// The asset holdings of a live contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ContractOutput {
    pub amount: Amount,
    pub lock_script: LockScript,
    pub tokens: Vec<(TokenId, Amount)>,
}

impl ContractOutput {
    pub fn new(amount: Amount, contract_id: ContractId) -> Self {
        Self {
            amount,
            lock_script: LockScript::P2c(contract_id),
            tokens: Vec::new(),
        }
    }
}

/// An output produced by transaction execution; fixed outputs are always assets, generated
/// outputs may be either kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum TxOutput {
    Asset(AssetOutput),
    Contract(ContractOutput),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ref_hints_distinguish_asset_from_contract() {
        let key = FixedHash::from([9u8; 32]);
        let asset = AssetOutputRef::new(GroupIndex(2), key);
        let contract = ContractOutputRef::new(GroupIndex(2), key);
        assert_ne!(asset.hint, contract.hint);
        assert_eq!(asset.group(), GroupIndex(2));
        assert_eq!(contract.group(), GroupIndex(2));
    }

    #[test]
    fn output_group_follows_lock_script() {
        let mut bytes = [0u8; 32];
        bytes[31] = 5;
        let lock = LockScript::P2pkh(FixedHash::from(bytes));
        assert_eq!(lock.group_index(4), GroupIndex(1));
        assert_eq!(lock.group_index(3), GroupIndex(2));
    }

    #[test]
    fn output_keys_are_unique_per_index() {
        let tx_id = FixedHash::from([1u8; 32]);
        assert_ne!(output_key(&tx_id, 0), output_key(&tx_id, 1));
    }
}

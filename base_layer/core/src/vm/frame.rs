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

use std::collections::BTreeMap;

use mosaic_common_types::types::{FixedHash, TokenId, U256};

use crate::{
    transactions::ContractId,
    vm::{Address, Method, Val, VmError},
};

/// Coin and token balances a frame may spend, keyed by owning address. Ordered maps keep every
/// drain and iteration deterministic across executors.
#[derive(Clone, Debug, Default)]
pub(crate) struct BalancePool {
    coin: BTreeMap<Address, U256>,
    tokens: BTreeMap<(Address, TokenId), U256>,
}

impl BalancePool {
    pub fn add_coin(&mut self, address: Address, amount: U256) {
        let entry = self.coin.entry(address).or_insert_with(U256::zero);
        *entry = entry.saturating_add(amount);
    }

    pub fn sub_coin(&mut self, address: &Address, amount: U256) -> Result<(), VmError> {
        let entry = self.coin.get_mut(address).ok_or(VmError::NotEnoughBalance)?;
        *entry = entry.checked_sub(amount).ok_or(VmError::NotEnoughBalance)?;
        if entry.is_zero() {
            self.coin.remove(address);
        }
        Ok(())
    }

    pub fn coin_of(&self, address: &Address) -> U256 {
        self.coin.get(address).copied().unwrap_or_default()
    }

    pub fn add_token(&mut self, address: Address, token: TokenId, amount: U256) {
        let entry = self.tokens.entry((address, token)).or_insert_with(U256::zero);
        *entry = entry.saturating_add(amount);
    }

    pub fn sub_token(&mut self, address: &Address, token: &TokenId, amount: U256) -> Result<(), VmError> {
        let entry = self
            .tokens
            .get_mut(&(*address, *token))
            .ok_or(VmError::NotEnoughBalance)?;
        *entry = entry.checked_sub(amount).ok_or(VmError::NotEnoughBalance)?;
        if entry.is_zero() {
            self.tokens.remove(&(*address, *token));
        }
        Ok(())
    }

    pub fn merge(&mut self, other: BalancePool) {
        for (address, amount) in other.coin {
            self.add_coin(address, amount);
        }
        for ((address, token), amount) in other.tokens {
            self.add_token(address, token, amount);
        }
    }

    /// Remove and return everything held for `address`.
    pub fn drain_address(&mut self, address: &Address) -> (U256, Vec<(TokenId, U256)>) {
        let coin = self.coin.remove(address).unwrap_or_default();
        let mut tokens = Vec::new();
        let keys: Vec<_> = self
            .tokens
            .keys()
            .filter(|(a, _)| a == address)
            .copied()
            .collect();
        for key in keys {
            if let Some(amount) = self.tokens.remove(&key) {
                tokens.push((key.1, amount));
            }
        }
        (coin, tokens)
    }

    pub fn addresses(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.coin.keys().copied().collect();
        for (address, _) in self.tokens.keys() {
            if !addresses.contains(address) {
                addresses.push(*address);
            }
        }
        addresses.sort();
        addresses
    }

    pub fn is_empty(&self) -> bool {
        self.coin.is_empty() && self.tokens.is_empty()
    }
}

/// What a frame is executing on behalf of.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum FrameObj {
    Script,
    Contract(ContractId),
}

/// One method activation: code position, locals, and the assets this activation may spend.
/// `staged` holds approvals destined for the next call.
#[derive(Debug)]
pub(crate) struct Frame {
    pub obj: FrameObj,
    pub method: Method,
    pub pc: usize,
    pub locals: Vec<Val>,
    /// Operand stack depth at entry; the stack is truncated back to this on return
    pub stack_base: usize,
    pub balance: BalancePool,
    pub staged: BalancePool,
    /// Hash of a contract's fields and code at frame entry; `None` for script frames
    pub initial_state_hash: Option<FixedHash>,
}

impl Frame {
    pub fn contract_id(&self) -> Result<ContractId, VmError> {
        match &self.obj {
            FrameObj::Contract(id) => Ok(*id),
            FrameObj::Script => Err(VmError::ExpectedContractFrame),
        }
    }

    pub fn is_script(&self) -> bool {
        self.obj == FrameObj::Script
    }

    pub fn local(&self, index: u16) -> Result<Val, VmError> {
        self.locals
            .get(index as usize)
            .cloned()
            .ok_or(VmError::InvalidLocalIndex)
    }

    pub fn set_local(&mut self, index: u16, val: Val) -> Result<(), VmError> {
        let slot = self
            .locals
            .get_mut(index as usize)
            .ok_or(VmError::InvalidLocalIndex)?;
        *slot = val;
        Ok(())
    }
}

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

use std::{collections::HashSet, mem};

use digest::Digest;
use ed25519_dalek::Verifier;
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use mosaic_common_types::{
    epoch_time::EpochTime,
    types::{FixedHash, TokenId, TxId, I256, U256},
};
use mosaic_storage::KeyValStore;

use crate::{
    hashing,
    proof_of_work::Target,
    state::{CachedWorldState, ContractState, StateError},
    transactions::{
        output_key,
        Amount,
        AssetOutput,
        ContractId,
        ContractOutput,
        ContractOutputRef,
        LockScript,
        TxOutput,
    },
    vm::{
        frame::{BalancePool, Frame, FrameObj},
        gas::{
            GasCounter,
            GAS_BASE,
            GAS_CALL,
            GAS_CONTRACT_CREATE,
            GAS_CONTRACT_DESTROY,
            GAS_HASH,
            GAS_SIGNATURE,
            GAS_STATE_ACCESS,
        },
        Address,
        Instr,
        Method,
        Stack,
        StatefulContract,
        StatefulScript,
        Val,
        VmError,
        FRAME_STACK_MAX_SIZE,
        OPERAND_STACK_MAX_SIZE,
    },
};

/// The transaction-level facts the VM can observe.
#[derive(Clone, Debug)]
pub struct TxEnv {
    pub tx_id: TxId,
    pub block_ts: EpochTime,
    pub block_target: Target,
    pub network_id: u8,
    pub groups: u32,
    pub dust_utxo_amount: Amount,
    /// Number of fixed outputs the transaction carries; generated output keys continue after them
    pub fixed_output_count: usize,
    /// Owning address of each transaction input, aligned with the input list
    pub input_addresses: Vec<Address>,
    /// The resolved outputs each input spends, aligned with the input list
    pub input_outputs: Vec<AssetOutput>,
}

/// What a successful execution produced. `contract_inputs` are the contract asset outputs the
/// script consumed; they count on the input side of the balance rule.
#[derive(Clone, Debug)]
pub struct VmOutput {
    pub generated_outputs: Vec<TxOutput>,
    pub contract_inputs: Vec<(ContractOutputRef, ContractOutput)>,
    pub gas_used: u64,
}

fn state_err(e: StateError) -> VmError {
    VmError::StateFailure(e.to_string())
}

fn instr_cost(instr: &Instr) -> u64 {
    match instr {
        Instr::Blake2b | Instr::Keccak256 | Instr::Sha256 | Instr::Sha3 => GAS_HASH,
        Instr::VerifySecP256K1 | Instr::VerifyEd25519 => GAS_SIGNATURE,
        Instr::CreateContract | Instr::CopyCreateContract => GAS_CONTRACT_CREATE,
        Instr::DestroySelf => GAS_CONTRACT_DESTROY,
        Instr::LoadField(_) | Instr::StoreField(_) => GAS_STATE_ACCESS,
        Instr::CallLocal(_) | Instr::CallExternal(_) => GAS_CALL,
        _ => GAS_BASE,
    }
}

/// The stateful VM. One instance executes one transaction script to completion against a cached
/// world-state overlay; any error leaves the overlay to be discarded by the caller.
pub struct StatefulVm<'a, S> {
    state: &'a mut CachedWorldState<S>,
    env: &'a TxEnv,
    script: &'a StatefulScript,
    gas: GasCounter,
    stack: Stack<Val>,
    frames: Vec<Frame>,
    /// Balances explicitly transferred to addresses; becomes outputs at the end
    credits: BalancePool,
    /// Balances left unspent when frames unwind
    residual: BalancePool,
    generated_outputs: Vec<TxOutput>,
    contract_inputs: Vec<(ContractOutputRef, ContractOutput)>,
    /// Contracts whose asset output has been pulled into the execution
    pulled: HashSet<ContractId>,
    destroyed: HashSet<ContractId>,
    creation_count: u32,
}

impl<'a, S: KeyValStore + Clone> StatefulVm<'a, S> {
    /// Run `script` to completion. Gas is charged per instruction; every failure is deterministic.
    pub fn execute(
        state: &'a mut CachedWorldState<S>,
        env: &'a TxEnv,
        script: &'a StatefulScript,
        gas_budget: u64,
    ) -> Result<VmOutput, VmError> {
        let mut vm = Self {
            state,
            env,
            script,
            gas: GasCounter::new(gas_budget),
            stack: Stack::new(OPERAND_STACK_MAX_SIZE),
            frames: Vec::new(),
            credits: BalancePool::default(),
            residual: BalancePool::default(),
            generated_outputs: Vec::new(),
            contract_inputs: Vec::new(),
            pulled: HashSet::new(),
            destroyed: HashSet::new(),
            creation_count: 0,
        };

        let entry = script.methods.first().ok_or(VmError::InvalidMethodIndex)?.clone();
        vm.push_frame(FrameObj::Script, entry, true)?;
        vm.run()?;
        vm.finish()
    }

    fn run(&mut self) -> Result<(), VmError> {
        while let Some(frame) = self.frames.last_mut() {
            if frame.pc >= frame.method.instrs.len() {
                self.do_return()?;
                continue;
            }
            let instr = frame.method.instrs[frame.pc].clone();
            frame.pc += 1;
            self.gas.charge(instr_cost(&instr))?;
            self.step(instr)?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<VmOutput, VmError> {
        // Explicit transfers become outputs; unwound leftovers only matter for contracts, whose
        // coins must never silently vanish. Asset-address leftovers stay accounted by the
        // transaction's fixed outputs.
        for address in self.residual.addresses() {
            if let Address::Contract(_) = address {
                let (coin, tokens) = self.residual.drain_address(&address);
                self.credits.add_coin(address, coin);
                for (token, amount) in tokens {
                    self.credits.add_token(address, token, amount);
                }
            }
        }

        for address in self.credits.addresses() {
            let (coin, tokens) = self.credits.drain_address(&address);
            match address {
                Address::Asset(key_hash) => {
                    if coin.is_zero() && tokens.is_empty() {
                        continue;
                    }
                    let output = AssetOutput::new(Amount(coin), LockScript::P2pkh(key_hash))
                        .with_tokens(tokens.into_iter().map(|(t, a)| (t, Amount(a))).collect());
                    self.generated_outputs.push(TxOutput::Asset(output));
                },
                Address::Contract(id) => {
                    if self.destroyed.contains(&id) {
                        continue;
                    }
                    if self.state.get_contract(&id).map_err(state_err)?.is_none() {
                        return Err(VmError::ContractNotFound);
                    }
                    if coin.is_zero() {
                        return Err(VmError::EmptyContractAsset);
                    }
                    let output_index = (self.env.fixed_output_count + self.generated_outputs.len()) as u32;
                    let group = LockScript::P2c(id).group_index(self.env.groups);
                    let new_ref = ContractOutputRef::new(group, output_key(&self.env.tx_id, output_index));
                    let output = ContractOutput {
                        amount: Amount(coin),
                        lock_script: LockScript::P2c(id),
                        tokens: tokens.into_iter().map(|(t, a)| (t, Amount(a))).collect(),
                    };
                    self.state
                        .update_contract_asset(&id, new_ref, output.clone())
                        .map_err(state_err)?;
                    self.generated_outputs.push(TxOutput::Contract(output));
                },
            }
        }

        // Every contract whose balance was pulled must either be destroyed or hold assets again
        for id in &self.pulled {
            if self.destroyed.contains(id) {
                continue;
            }
            if let Some(state) = self.state.get_contract(id).map_err(state_err)? {
                if self
                    .state
                    .get_contract_output(&state.asset_ref)
                    .map_err(state_err)?
                    .is_none()
                {
                    return Err(VmError::EmptyContractAsset);
                }
            }
        }

        Ok(VmOutput {
            generated_outputs: self.generated_outputs,
            contract_inputs: self.contract_inputs,
            gas_used: self.gas.used(),
        })
    }

    fn push_frame(&mut self, obj: FrameObj, method: Method, is_entry: bool) -> Result<(), VmError> {
        if self.frames.len() >= FRAME_STACK_MAX_SIZE {
            return Err(VmError::StackOverflow);
        }

        let mut args = Vec::with_capacity(method.arg_count as usize);
        for _ in 0..method.arg_count {
            args.push(self.stack.pop()?);
        }
        args.reverse();
        let mut locals = args;
        locals.resize(method.local_count as usize, Val::Bool(false));

        let mut balance = if is_entry {
            let mut pool = BalancePool::default();
            if method.is_payable {
                for (address, output) in self.env.input_addresses.iter().zip(&self.env.input_outputs) {
                    pool.add_coin(*address, output.amount.0);
                    for (token, amount) in &output.tokens {
                        pool.add_token(*address, *token, amount.0);
                    }
                }
            }
            pool
        } else {
            let caller = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
            mem::take(&mut caller.staged)
        };

        let mut initial_state_hash = None;
        if let FrameObj::Contract(id) = &obj {
            let contract = self
                .state
                .get_contract(id)
                .map_err(state_err)?
                .ok_or(VmError::ContractNotFound)?;
            initial_state_hash = Some(hashing::hash_borsh(&(&contract.fields, contract.code_hash)));
            if method.is_payable && !self.pulled.contains(id) {
                let output = self
                    .state
                    .take_contract_output(&contract.asset_ref)
                    .map_err(|_| VmError::ContractOutputNotFound)?;
                self.pulled.insert(*id);
                let address = Address::Contract(*id);
                balance.add_coin(address, output.amount.0);
                for (token, amount) in &output.tokens {
                    balance.add_token(address, *token, amount.0);
                }
                self.contract_inputs.push((contract.asset_ref, output));
            }
        }

        self.frames.push(Frame {
            obj,
            method,
            pc: 0,
            locals,
            stack_base: self.stack.len(),
            balance,
            staged: BalancePool::default(),
            initial_state_hash,
        });
        Ok(())
    }

    fn do_return(&mut self) -> Result<(), VmError> {
        let frame = self.frames.pop().ok_or(VmError::StackUnderflow)?;
        let mut returns = Vec::with_capacity(frame.method.return_count as usize);
        for _ in 0..frame.method.return_count {
            returns.push(self.stack.pop()?);
        }
        self.stack.truncate(frame.stack_base);
        for val in returns.into_iter().rev() {
            self.stack.push(val)?;
        }

        let mut leftovers = frame.balance;
        leftovers.merge(frame.staged);
        match self.frames.last_mut() {
            Some(caller) => caller.balance.merge(leftovers),
            None => self.residual.merge(leftovers),
        }
        Ok(())
    }

    fn cur(&self) -> Result<&Frame, VmError> {
        self.frames.last().ok_or(VmError::StackUnderflow)
    }

    fn pop_bool(&mut self) -> Result<bool, VmError> {
        self.stack.pop()?.as_bool()
    }

    fn pop_u256(&mut self) -> Result<U256, VmError> {
        self.stack.pop()?.as_u256()
    }

    fn pop_i256(&mut self) -> Result<I256, VmError> {
        self.stack.pop()?.as_i256()
    }

    fn pop_bytes(&mut self) -> Result<Vec<u8>, VmError> {
        self.stack.pop()?.as_byte_vec()
    }

    fn pop_address(&mut self) -> Result<Address, VmError> {
        self.stack.pop()?.as_address()
    }

    fn pop_hash(&mut self) -> Result<FixedHash, VmError> {
        let bytes = self.pop_bytes()?;
        FixedHash::try_from(bytes.as_slice()).map_err(|_| VmError::InvalidType)
    }

    fn pop_token_id(&mut self) -> Result<TokenId, VmError> {
        self.pop_hash()
    }

    fn binary_u256(&mut self, op: impl Fn(U256, U256) -> Option<U256>) -> Result<(), VmError> {
        let b = self.pop_u256()?;
        let a = self.pop_u256()?;
        let result = op(a, b).ok_or(VmError::ArithmeticError)?;
        self.stack.push(Val::U256(result))
    }

    fn binary_i256(&mut self, op: impl Fn(I256, I256) -> Option<I256>) -> Result<(), VmError> {
        let b = self.pop_i256()?;
        let a = self.pop_i256()?;
        let result = op(a, b).ok_or(VmError::ArithmeticError)?;
        self.stack.push(Val::I256(result))
    }

    fn compare_u256(&mut self, op: impl Fn(&U256, &U256) -> bool) -> Result<(), VmError> {
        let b = self.pop_u256()?;
        let a = self.pop_u256()?;
        self.stack.push(Val::Bool(op(&a, &b)))
    }

    fn compare_i256(&mut self, op: impl Fn(&I256, &I256) -> bool) -> Result<(), VmError> {
        let b = self.pop_i256()?;
        let a = self.pop_i256()?;
        self.stack.push(Val::Bool(op(&a, &b)))
    }

    fn jump_to(&mut self, offset: i32) -> Result<(), VmError> {
        let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
        let target = frame.pc as i64 + i64::from(offset);
        if target < 0 || target as usize > frame.method.instrs.len() {
            return Err(VmError::InvalidInstrOffset);
        }
        frame.pc = target as usize;
        Ok(())
    }

    fn hash_top(&mut self, hash: impl Fn(&[u8]) -> Vec<u8>) -> Result<(), VmError> {
        let bytes = self.pop_bytes()?;
        self.stack.push(Val::ByteVec(hash(&bytes)))
    }

    fn require_payable(&self) -> Result<(), VmError> {
        if !self.cur()?.method.is_payable {
            return Err(VmError::NonPayableMethod);
        }
        Ok(())
    }

    fn self_address(&self) -> Result<Address, VmError> {
        match &self.cur()?.obj {
            FrameObj::Contract(id) => Ok(Address::Contract(*id)),
            FrameObj::Script => self
                .env
                .input_addresses
                .first()
                .copied()
                .ok_or(VmError::InvalidTxInputIndex),
        }
    }

    fn caller_frame(&self) -> Result<&Frame, VmError> {
        if self.frames.len() < 2 {
            return Err(VmError::ExpectedContractFrame);
        }
        Ok(&self.frames[self.frames.len() - 2])
    }

    fn resolve_contract_method(&self, id: &ContractId, index: u16) -> Result<Method, VmError> {
        let contract = self
            .state
            .get_contract(id)
            .map_err(state_err)?
            .ok_or(VmError::ContractNotFound)?;
        let code = self
            .state
            .get_code(&contract.code_hash)
            .map_err(state_err)?
            .ok_or(VmError::ContractNotFound)?;
        code.methods
            .get(index as usize)
            .cloned()
            .ok_or(VmError::InvalidMethodIndex)
    }

    #[allow(clippy::too_many_lines)]
    fn step(&mut self, instr: Instr) -> Result<(), VmError> {
        match instr {
            Instr::ConstVal(val) => self.stack.push(val)?,
            Instr::Pop => {
                self.stack.pop()?;
            },
            Instr::Dup => self.stack.dup()?,
            Instr::Swap => self.stack.swap()?,
            Instr::LoadLocal(index) => {
                let val = self.cur()?.local(index)?;
                self.stack.push(val)?;
            },
            Instr::StoreLocal(index) => {
                let val = self.stack.pop()?;
                self.frames
                    .last_mut()
                    .ok_or(VmError::StackUnderflow)?
                    .set_local(index, val)?;
            },

            Instr::U256Add => self.binary_u256(|a, b| a.checked_add(b))?,
            Instr::U256Sub => self.binary_u256(|a, b| a.checked_sub(b))?,
            Instr::U256Mul => self.binary_u256(|a, b| a.checked_mul(b))?,
            Instr::U256Div => self.binary_u256(|a, b| a.checked_div(b))?,
            Instr::U256Mod => self.binary_u256(|a, b| a.checked_rem(b))?,
            Instr::U256ModAdd => self.binary_u256(|a, b| Some(a.overflowing_add(b).0))?,
            Instr::U256ModSub => self.binary_u256(|a, b| Some(a.overflowing_sub(b).0))?,
            Instr::U256ModMul => self.binary_u256(|a, b| Some(a.overflowing_mul(b).0))?,

            Instr::I256Add => self.binary_i256(|a, b| a.checked_add(b))?,
            Instr::I256Sub => self.binary_i256(|a, b| a.checked_sub(b))?,
            Instr::I256Mul => self.binary_i256(|a, b| a.checked_mul(b))?,
            Instr::I256Div => self.binary_i256(|a, b| a.checked_div(b))?,
            Instr::I256Mod => self.binary_i256(|a, b| a.checked_rem(b))?,

            Instr::U256BitAnd => self.binary_u256(|a, b| Some(a & b))?,
            Instr::U256BitOr => self.binary_u256(|a, b| Some(a | b))?,
            Instr::U256Xor => self.binary_u256(|a, b| Some(a ^ b))?,
            Instr::U256Shl => self.binary_u256(|a, b| {
                Some(if b >= U256::from(256u64) {
                    U256::zero()
                } else {
                    a << b.as_usize()
                })
            })?,
            Instr::U256Shr => self.binary_u256(|a, b| {
                Some(if b >= U256::from(256u64) {
                    U256::zero()
                } else {
                    a >> b.as_usize()
                })
            })?,

            Instr::ValEq | Instr::ValNeq => {
                let b = self.stack.pop()?;
                let a = self.stack.pop()?;
                if mem::discriminant(&a) != mem::discriminant(&b) {
                    return Err(VmError::InvalidType);
                }
                let eq = a == b;
                self.stack
                    .push(Val::Bool(if matches!(instr, Instr::ValEq) { eq } else { !eq }))?;
            },
            Instr::U256Lt => self.compare_u256(|a, b| a < b)?,
            Instr::U256Le => self.compare_u256(|a, b| a <= b)?,
            Instr::U256Gt => self.compare_u256(|a, b| a > b)?,
            Instr::U256Ge => self.compare_u256(|a, b| a >= b)?,
            Instr::I256Lt => self.compare_i256(|a, b| a < b)?,
            Instr::I256Le => self.compare_i256(|a, b| a <= b)?,
            Instr::I256Gt => self.compare_i256(|a, b| a > b)?,
            Instr::I256Ge => self.compare_i256(|a, b| a >= b)?,

            Instr::BoolNot => {
                let v = self.pop_bool()?;
                self.stack.push(Val::Bool(!v))?;
            },
            Instr::BoolAnd => {
                let b = self.pop_bool()?;
                let a = self.pop_bool()?;
                self.stack.push(Val::Bool(a && b))?;
            },
            Instr::BoolOr => {
                let b = self.pop_bool()?;
                let a = self.pop_bool()?;
                self.stack.push(Val::Bool(a || b))?;
            },

            Instr::U256ToI256 => {
                let v = self.pop_u256()?;
                if v.bit(255) {
                    return Err(VmError::ArithmeticError);
                }
                self.stack.push(Val::I256(I256::from_raw(v)))?;
            },
            Instr::I256ToU256 => {
                let v = self.pop_i256()?;
                if v.is_negative() {
                    return Err(VmError::ArithmeticError);
                }
                self.stack.push(Val::U256(v.to_raw()))?;
            },

            Instr::Jump(offset) => self.jump_to(offset)?,
            Instr::IfFalse(offset) => {
                let cond = self.pop_bool()?;
                if !cond {
                    self.jump_to(offset)?;
                }
            },
            Instr::Assert => {
                let cond = self.pop_bool()?;
                if !cond {
                    return Err(VmError::AssertionFailed);
                }
            },
            Instr::Return => self.do_return()?,

            Instr::CallLocal(index) => {
                let obj = self.cur()?.obj.clone();
                let method = match &obj {
                    FrameObj::Script => self
                        .script
                        .methods
                        .get(index as usize)
                        .cloned()
                        .ok_or(VmError::InvalidMethodIndex)?,
                    FrameObj::Contract(id) => self.resolve_contract_method(id, index)?,
                };
                self.push_frame(obj, method, false)?;
            },
            Instr::CallExternal(index) => {
                let id = self.pop_hash()?;
                let method = self.resolve_contract_method(&id, index)?;
                if !method.is_public {
                    return Err(VmError::ExternalPrivateMethodCall);
                }
                self.push_frame(FrameObj::Contract(id), method, false)?;
            },

            Instr::LoadField(index) => {
                let id = self.cur()?.contract_id()?;
                let contract = self
                    .state
                    .get_contract(&id)
                    .map_err(state_err)?
                    .ok_or(VmError::ContractNotFound)?;
                let val = contract
                    .fields
                    .get(index as usize)
                    .cloned()
                    .ok_or(VmError::InvalidFieldIndex)?;
                self.stack.push(val)?;
            },
            Instr::StoreField(index) => {
                let val = self.stack.pop()?;
                let id = self.cur()?.contract_id()?;
                let contract = self
                    .state
                    .get_contract(&id)
                    .map_err(state_err)?
                    .ok_or(VmError::ContractNotFound)?;
                let mut fields = contract.fields;
                if index as usize >= fields.len() {
                    return Err(VmError::InvalidFieldIndex);
                }
                fields[index as usize] = val;
                self.state.update_contract_fields(&id, fields).map_err(state_err)?;
            },

            Instr::ApproveAlf => {
                self.require_payable()?;
                let amount = self.pop_u256()?;
                let from = self.pop_address()?;
                let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
                frame.balance.sub_coin(&from, amount)?;
                frame.staged.add_coin(from, amount);
            },
            Instr::ApproveToken => {
                self.require_payable()?;
                let amount = self.pop_u256()?;
                let token = self.pop_token_id()?;
                let from = self.pop_address()?;
                let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
                frame.balance.sub_token(&from, &token, amount)?;
                frame.staged.add_token(from, token, amount);
            },
            Instr::TransferAlf => {
                self.require_payable()?;
                let amount = self.pop_u256()?;
                let to = self.pop_address()?;
                let from = self.pop_address()?;
                self.transfer_coin(from, to, amount)?;
            },
            Instr::TransferAlfFromSelf => {
                self.require_payable()?;
                let amount = self.pop_u256()?;
                let to = self.pop_address()?;
                let from = self.self_address()?;
                self.transfer_coin(from, to, amount)?;
            },
            Instr::TransferAlfToSelf => {
                self.require_payable()?;
                let amount = self.pop_u256()?;
                let from = self.pop_address()?;
                let to = self.self_address()?;
                self.transfer_coin(from, to, amount)?;
            },
            Instr::TransferToken => {
                self.require_payable()?;
                let amount = self.pop_u256()?;
                let token = self.pop_token_id()?;
                let to = self.pop_address()?;
                let from = self.pop_address()?;
                self.transfer_token(from, to, token, amount)?;
            },
            Instr::TransferTokenFromSelf => {
                self.require_payable()?;
                let amount = self.pop_u256()?;
                let token = self.pop_token_id()?;
                let to = self.pop_address()?;
                let from = self.self_address()?;
                self.transfer_token(from, to, token, amount)?;
            },
            Instr::TransferTokenToSelf => {
                self.require_payable()?;
                let amount = self.pop_u256()?;
                let token = self.pop_token_id()?;
                let from = self.pop_address()?;
                let to = self.self_address()?;
                self.transfer_token(from, to, token, amount)?;
            },

            Instr::BlockTimestamp => self.stack.push(Val::U256(U256::from(self.env.block_ts.as_millis())))?,
            Instr::BlockTarget => self.stack.push(Val::U256(self.env.block_target.0))?,
            Instr::NetworkId => self.stack.push(Val::u256(u64::from(self.env.network_id)))?,
            Instr::TxId => self.stack.push(Val::ByteVec(self.env.tx_id.to_vec()))?,
            Instr::TxInputAddress => {
                let index = self.pop_u256()?;
                if index > U256::from(usize::MAX as u64) {
                    return Err(VmError::InvalidTxInputIndex);
                }
                let address = self
                    .env
                    .input_addresses
                    .get(index.as_usize())
                    .copied()
                    .ok_or(VmError::InvalidTxInputIndex)?;
                self.stack.push(Val::Address(address))?;
            },
            Instr::CallerContractId => {
                let id = self.caller_frame()?.contract_id()?;
                self.stack.push(Val::ByteVec(id.to_vec()))?;
            },
            Instr::CallerAddress => {
                let address = match self.frames.len() {
                    0 | 1 => self
                        .env
                        .input_addresses
                        .first()
                        .copied()
                        .ok_or(VmError::InvalidTxInputIndex)?,
                    _ => match &self.caller_frame()?.obj {
                        FrameObj::Contract(id) => Address::Contract(*id),
                        FrameObj::Script => self
                            .env
                            .input_addresses
                            .first()
                            .copied()
                            .ok_or(VmError::InvalidTxInputIndex)?,
                    },
                };
                self.stack.push(Val::Address(address))?;
            },
            Instr::CallerInitialStateHash => {
                let hash = self
                    .caller_frame()?
                    .initial_state_hash
                    .ok_or(VmError::ExpectedContractFrame)?;
                self.stack.push(Val::ByteVec(hash.to_vec()))?;
            },
            Instr::IsCalledFromTxScript => {
                let from_script = self.frames.len() >= 2 && self.caller_frame()?.is_script();
                self.stack.push(Val::Bool(from_script))?;
            },
            Instr::SelfAddress => {
                let address = self.self_address()?;
                self.stack.push(Val::Address(address))?;
            },
            Instr::SelfContractId => {
                let id = self.cur()?.contract_id()?;
                self.stack.push(Val::ByteVec(id.to_vec()))?;
            },

            Instr::Blake2b => self.hash_top(|b| hashing::hash_bytes(b).to_vec())?,
            Instr::Keccak256 => self.hash_top(|b| sha3::Keccak256::digest(b).to_vec())?,
            Instr::Sha256 => self.hash_top(|b| sha2::Sha256::digest(b).to_vec())?,
            Instr::Sha3 => self.hash_top(|b| sha3::Sha3_256::digest(b).to_vec())?,

            Instr::VerifySecP256K1 => {
                let signature = self.pop_bytes()?;
                let public_key = self.pop_bytes()?;
                let msg_hash = self.pop_bytes()?;
                let key = k256::ecdsa::VerifyingKey::from_sec1_bytes(&public_key)
                    .map_err(|_| VmError::InvalidSignature)?;
                let signature = k256::ecdsa::Signature::from_slice(&signature)
                    .map_err(|_| VmError::InvalidSignature)?;
                key.verify_prehash(&msg_hash, &signature)
                    .map_err(|_| VmError::InvalidSignature)?;
            },
            Instr::VerifyEd25519 => {
                let signature = self.pop_bytes()?;
                let public_key = self.pop_bytes()?;
                let msg = self.pop_bytes()?;
                let key_bytes: [u8; 32] = public_key.try_into().map_err(|_| VmError::InvalidSignature)?;
                let key = ed25519_dalek::VerifyingKey::from_bytes(&key_bytes)
                    .map_err(|_| VmError::InvalidSignature)?;
                let signature = ed25519_dalek::Signature::from_slice(&signature)
                    .map_err(|_| VmError::InvalidSignature)?;
                key.verify(&msg, &signature).map_err(|_| VmError::InvalidSignature)?;
            },

            Instr::VerifyAbsoluteLocktime => {
                let lock = self.pop_u256()?;
                if U256::from(self.env.block_ts.as_millis()) < lock {
                    return Err(VmError::AbsoluteLockTimeVerificationFailed);
                }
            },
            Instr::VerifyRelativeLocktime => {
                let duration = self.pop_u256()?;
                let index = self.pop_u256()?;
                if index > U256::from(usize::MAX as u64) {
                    return Err(VmError::InvalidTxInputIndex);
                }
                let output = self
                    .env
                    .input_outputs
                    .get(index.as_usize())
                    .ok_or(VmError::InvalidTxInputIndex)?;
                let unlock_at = U256::from(output.lock_time.as_millis()).saturating_add(duration);
                if U256::from(self.env.block_ts.as_millis()) < unlock_at {
                    return Err(VmError::RelativeLockTimeVerificationFailed);
                }
            },

            Instr::CreateContract => {
                let code_bytes = self.pop_bytes()?;
                let code: StatefulContract =
                    borsh::from_slice(&code_bytes).map_err(|_| VmError::InvalidType)?;
                let fields = self.pop_fields()?;
                self.create_contract_from(code, fields)?;
            },
            Instr::CopyCreateContract => {
                let source_id = self.pop_hash()?;
                let source = self
                    .state
                    .get_contract(&source_id)
                    .map_err(state_err)?
                    .ok_or(VmError::ContractNotFound)?;
                let code = self
                    .state
                    .get_code(&source.code_hash)
                    .map_err(state_err)?
                    .ok_or(VmError::ContractNotFound)?;
                let fields = self.pop_fields()?;
                self.create_contract_from(code, fields)?;
            },
            Instr::DestroySelf => {
                let target = self.pop_address()?;
                self.destroy_self(target)?;
            },
        }
        Ok(())
    }

    fn transfer_coin(&mut self, from: Address, to: Address, amount: U256) -> Result<(), VmError> {
        let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
        frame.balance.sub_coin(&from, amount)?;
        self.credits.add_coin(to, amount);
        Ok(())
    }

    fn transfer_token(&mut self, from: Address, to: Address, token: TokenId, amount: U256) -> Result<(), VmError> {
        let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
        frame.balance.sub_token(&from, &token, amount)?;
        self.credits.add_token(to, token, amount);
        Ok(())
    }

    /// Pop `[fields.., field_count]`, deepest field first.
    fn pop_fields(&mut self) -> Result<Vec<Val>, VmError> {
        let count = self.pop_u256()?;
        if count > U256::from(u64::from(u16::MAX)) {
            return Err(VmError::InvalidFieldLength);
        }
        let mut fields = Vec::with_capacity(count.as_usize());
        for _ in 0..count.as_usize() {
            fields.push(self.stack.pop()?);
        }
        fields.reverse();
        Ok(fields)
    }

    fn create_contract_from(&mut self, code: StatefulContract, fields: Vec<Val>) -> Result<(), VmError> {
        if fields.len() != code.field_count as usize {
            return Err(VmError::InvalidFieldLength);
        }

        // The creation deposit comes out of the frame's spendable pool
        let dust = self.env.dust_utxo_amount.0;
        let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
        let funder = frame
            .balance
            .addresses()
            .into_iter()
            .find(|address| frame.balance.coin_of(address) >= dust)
            .ok_or(VmError::NotEnoughBalance)?;
        frame.balance.sub_coin(&funder, dust)?;

        let id: ContractId = hashing::hash_borsh(&(self.env.tx_id, self.creation_count));
        self.creation_count += 1;

        let output_index = (self.env.fixed_output_count + self.generated_outputs.len()) as u32;
        let group = LockScript::P2c(id).group_index(self.env.groups);
        let asset_ref = ContractOutputRef::new(group, output_key(&self.env.tx_id, output_index));
        let output = ContractOutput {
            amount: Amount(dust),
            lock_script: LockScript::P2c(id),
            tokens: Vec::new(),
        };

        let state = ContractState {
            fields,
            code_hash: code.code_hash(),
            asset_ref,
        };
        self.state.add_code(code);
        self.state.create_contract(id, state, output.clone());
        self.generated_outputs.push(TxOutput::Contract(output));
        self.stack.push(Val::ByteVec(id.to_vec()))
    }

    fn destroy_self(&mut self, target: Address) -> Result<(), VmError> {
        let target_hash = match target {
            Address::Asset(hash) => hash,
            Address::Contract(_) => return Err(VmError::InvalidAddressTypeInContractDestroy),
        };
        let id = self.cur()?.contract_id()?;
        let contract = self
            .state
            .get_contract(&id)
            .map_err(state_err)?
            .ok_or(VmError::ContractOutputNotFound)?;

        // The contract's assets are either still in its output or already pulled into this frame
        let mut coin = U256::zero();
        let mut tokens: Vec<(TokenId, U256)> = Vec::new();
        match self.state.get_contract_output(&contract.asset_ref).map_err(state_err)? {
            Some(output) => {
                self.state
                    .take_contract_output(&contract.asset_ref)
                    .map_err(|_| VmError::ContractOutputNotFound)?;
                coin = output.amount.0;
                tokens = output.tokens.iter().map(|(t, a)| (*t, a.0)).collect();
                self.contract_inputs.push((contract.asset_ref, output));
            },
            None => {
                if !self.pulled.contains(&id) {
                    return Err(VmError::ContractOutputNotFound);
                }
            },
        }

        let self_address = Address::Contract(id);
        let frame = self.frames.last_mut().ok_or(VmError::StackUnderflow)?;
        let (frame_coin, frame_tokens) = frame.balance.drain_address(&self_address);
        coin = coin.saturating_add(frame_coin);
        for (token, amount) in frame_tokens {
            match tokens.iter_mut().find(|(t, _)| *t == token) {
                Some((_, existing)) => *existing = existing.saturating_add(amount),
                None => tokens.push((token, amount)),
            }
        }

        self.state.remove_contract(&id).map_err(state_err)?;
        self.destroyed.insert(id);

        let output = AssetOutput::new(Amount(coin), LockScript::P2pkh(target_hash))
            .with_tokens(tokens.into_iter().map(|(t, a)| (t, Amount(a))).collect());
        self.generated_outputs.push(TxOutput::Asset(output));
        Ok(())
    }
}

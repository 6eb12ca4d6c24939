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
use serde::{Deserialize, Serialize};

use crate::vm::Val;

/// The fixed instruction set of the stateful VM. Stack effects are noted as `[inputs] -> [outputs]`,
/// deepest operand first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum Instr {
    // Constants and stack manipulation
    /// `[] -> [val]`
    ConstVal(Val),
    /// `[a] -> []`
    Pop,
    /// `[a] -> [a, a]`
    Dup,
    /// `[a, b] -> [b, a]`
    Swap,
    /// `[] -> [local]`
    LoadLocal(u16),
    /// `[val] -> []`
    StoreLocal(u16),

    // Checked U256 arithmetic; overflow and division by zero abort
    U256Add,
    U256Sub,
    U256Mul,
    U256Div,
    U256Mod,
    // Modular U256 arithmetic, reducing modulo 2^256
    U256ModAdd,
    U256ModSub,
    U256ModMul,

    // Checked I256 arithmetic
    I256Add,
    I256Sub,
    I256Mul,
    I256Div,
    I256Mod,

    // Bitwise on U256
    U256BitAnd,
    U256BitOr,
    U256Xor,
    U256Shl,
    U256Shr,

    // Comparisons
    /// Structural equality on any two values of the same type
    ValEq,
    ValNeq,
    U256Lt,
    U256Le,
    U256Gt,
    U256Ge,
    I256Lt,
    I256Le,
    I256Gt,
    I256Ge,

    // Boolean
    BoolNot,
    BoolAnd,
    BoolOr,

    // Conversions
    U256ToI256,
    I256ToU256,

    // Control flow; offsets are relative to the next instruction
    Jump(i32),
    /// `[cond] -> []`, jumps when `cond` is false
    IfFalse(i32),
    /// `[cond] -> []`, aborts with `AssertionFailed` when false
    Assert,
    Return,

    // Calls
    /// Call a method of the current object; arguments are popped into the callee's locals
    CallLocal(u16),
    /// `[.., contract_id] -> [..]`, call a public method of another contract
    CallExternal(u16),

    // Contract state
    /// `[] -> [field]`
    LoadField(u16),
    /// `[val] -> []`
    StoreField(u16),

    // Asset approval and transfer
    /// `[from, amount] -> []`, stage coin for the next call
    ApproveAlf,
    /// `[from, token_id, amount] -> []`
    ApproveToken,
    /// `[from, to, amount] -> []`
    TransferAlf,
    /// `[to, amount] -> []`, from the executing contract
    TransferAlfFromSelf,
    /// `[from, amount] -> []`, to the executing contract
    TransferAlfToSelf,
    /// `[from, to, token_id, amount] -> []`
    TransferToken,
    /// `[to, token_id, amount] -> []`
    TransferTokenFromSelf,
    /// `[from, token_id, amount] -> []`
    TransferTokenToSelf,

    // Environment
    BlockTimestamp,
    BlockTarget,
    NetworkId,
    TxId,
    /// `[index] -> [address]`, the address of the n-th transaction input
    TxInputAddress,
    CallerContractId,
    CallerAddress,
    CallerInitialStateHash,
    IsCalledFromTxScript,
    SelfAddress,
    SelfContractId,

    // Hashing; `[bytes] -> [hash_bytes]`
    Blake2b,
    Keccak256,
    Sha256,
    Sha3,

    // Signatures; `[msg_hash, public_key, signature] -> []`, aborts on failure
    VerifySecP256K1,
    VerifyEd25519,

    // Time locks
    /// `[timestamp] -> []`, aborts unless the block timestamp has reached `timestamp`
    VerifyAbsoluteLocktime,
    /// `[input_index, duration] -> []`, aborts unless the spent output's lock plus `duration` has passed
    VerifyRelativeLocktime,

    // Contract lifecycle
    /// `[fields.., field_count, code_bytes] -> [contract_id_bytes]`
    CreateContract,
    /// `[fields.., field_count, contract_id_bytes] -> [contract_id_bytes]`
    CopyCreateContract,
    /// `[target_address] -> []`, destroy the executing contract and pay out its assets
    DestroySelf,
}

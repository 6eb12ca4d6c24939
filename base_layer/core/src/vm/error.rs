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

use thiserror::Error;

/// Deterministic execution failures. Any of these aborts the transaction script; the enclosing
/// block is rejected with the failure kind attached.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Out of gas")]
    OutOfGas,
    #[error("Assertion failed")]
    AssertionFailed,
    #[error("Signature verification failed")]
    InvalidSignature,
    #[error("Absolute lock time verification failed")]
    AbsoluteLockTimeVerificationFailed,
    #[error("Relative lock time verification failed")]
    RelativeLockTimeVerificationFailed,
    #[error("Transaction input index out of range")]
    InvalidTxInputIndex,
    #[error("Contract would be left with an empty asset output")]
    EmptyContractAsset,
    #[error("Initial field count does not match the contract's declared fields")]
    InvalidFieldLength,
    #[error("Contract destruction target must be an asset address")]
    InvalidAddressTypeInContractDestroy,
    #[error("External call into a private method")]
    ExternalPrivateMethodCall,
    #[error("Operand has the wrong type")]
    InvalidType,
    #[error("Method index out of range")]
    InvalidMethodIndex,
    #[error("Jump offset out of range")]
    InvalidInstrOffset,
    #[error("Local variable index out of range")]
    InvalidLocalIndex,
    #[error("Contract field index out of range")]
    InvalidFieldIndex,
    #[error("Arithmetic operation has no value")]
    ArithmeticError,
    #[error("contract output not found")]
    ContractOutputNotFound,
    #[error("Contract not found in the world state")]
    ContractNotFound,
    #[error("Asset operation in a non-payable method")]
    NonPayableMethod,
    #[error("Not enough balance approved for the operation")]
    NotEnoughBalance,
    #[error("Expected the frame to be a contract frame")]
    ExpectedContractFrame,
    #[error("World state failure during execution: {0}")]
    StateFailure(String),
}

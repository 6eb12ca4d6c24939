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

use mosaic_common_types::types::BlockHash;
use thiserror::Error;

use crate::{chain_storage::ChainStorageError, state::StateError, transactions::TransactionError, vm::VmError};

/// Why one transaction inside a block is invalid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxValidationError {
    #[error("Input refers to a non-existent or already spent output")]
    NonExistentInput,
    #[error("Gas budget is below the minimal gas")]
    InvalidGasAmount,
    #[error("Unlock script rejected: {0}")]
    InvalidUnlockScript(#[from] TransactionError),
    #[error("Spent output is still time-locked")]
    TimeLockedOutput,
    #[error("Inputs do not cover outputs plus gas fee")]
    InvalidBalance,
    #[error("Token inputs do not cover token outputs")]
    InvalidTokenBalance,
    #[error("Script execution failed: {0}")]
    TxScriptExeFailed(VmError),
}

/// Validation rejections. The block is dropped, nothing is committed and the sending peer is
/// penalised; the `MissingDeps` case instead parks the block until its dependencies arrive.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Block group is outside this broker's range")]
    InvalidGroup,
    #[error("Block has no transactions")]
    EmptyTransactionList,
    #[error("Block has too many transactions")]
    TooManyTransactions,
    #[error("Transaction gas prices are not non-increasing")]
    TxGasPriceNonDecreasing,
    #[error("Block exceeds the gas limit")]
    TooManyGasUsed,
    #[error("Header Merkle root does not match the transaction list")]
    InvalidTxsMerkleRoot,
    #[error("Block dependencies are inconsistent or spend the same outputs")]
    InvalidFlowTxs,
    #[error("Coinbase transaction is malformed")]
    InvalidCoinbaseFormat,
    #[error("Coinbase data does not match the block")]
    InvalidCoinbaseData,
    #[error("Coinbase pays the wrong reward")]
    InvalidCoinbaseReward,
    #[error("Coinbase locked amount is invalid")]
    InvalidCoinbaseLockedAmount,
    #[error("Coinbase lockup period is invalid")]
    InvalidCoinbaseLockupPeriod,
    #[error("Two transactions in the block spend the same output")]
    BlockDoubleSpending,
    #[error("Block contains an invalid transaction: {0}")]
    ExistInvalidTx(TxValidationError),
    #[error("Proof of work does not meet the target")]
    InvalidPoW,
    #[error("Header target does not match the difficulty adjustment")]
    InvalidTarget,
    #[error("Header timestamp is too far in the future")]
    TimestampTooFarInFuture,
    #[error("Header state root does not match the dependency view")]
    InvalidDepStateHash,
    #[error("Block dependencies are not yet known")]
    MissingDeps(Vec<BlockHash>),
    #[error("Chain storage failure during validation: {0}")]
    ChainStorage(#[from] ChainStorageError),
    #[error("World state failure during validation: {0}")]
    State(#[from] StateError),
}

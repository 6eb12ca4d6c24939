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
use mosaic_storage::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainStorageError {
    #[error("The requested {entity} was not found: {hash}")]
    NotFound { entity: &'static str, hash: BlockHash },
    #[error("Storage failure: {0}")]
    Io(#[from] StoreError),
    #[error("Stored data is corrupt: {0}")]
    Corruption(String),
    #[error("Chain invariant violated: {0}")]
    InvariantViolation(String),
    #[error("Cannot add block {0}: its parent is not stored")]
    OrphanParent(BlockHash),
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl ChainStorageError {
    pub fn not_found(entity: &'static str, hash: BlockHash) -> Self {
        ChainStorageError::NotFound { entity, hash }
    }
}

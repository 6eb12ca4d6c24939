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

use mosaic_common_types::{
    chain_index::ChainIndex,
    types::BlockHash,
};

use crate::{
    blocks::BlockTemplate,
    chain_storage::BlockAddResult,
    mempool::TxAddResult,
    transactions::{Amount, AssetOutput, AssetOutputRef},
};

/// Where a queried transaction was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxLocation {
    Mempool,
    Confirmed {
        block_hash: BlockHash,
        chain_index: ChainIndex,
    },
    NotFound,
}

/// Replies to [`super::NodeCommsRequest`], mirrored one to one.
#[derive(Clone, Debug)]
pub enum NodeCommsResponse {
    BlockAdded(BlockAddResult),
    /// The block is parked until the listed deps arrive; a fetch has been requested
    BlockParked {
        missing: Vec<BlockHash>,
    },
    TxAdded(TxAddResult),
    Template(Box<BlockTemplate>),
    Balance {
        total: Amount,
        utxos: Vec<(AssetOutputRef, AssetOutput)>,
    },
    TxStatus(TxLocation),
    SyncData(Vec<BlockHash>),
}

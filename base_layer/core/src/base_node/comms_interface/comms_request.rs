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

use std::fmt::{self, Display, Formatter};

use mosaic_common_types::{
    chain_index::ChainIndex,
    types::{BlockHash, TxId},
};

use crate::{blocks::Block, transactions::{LockScript, Transaction}};

/// Commands the core consumes from its collaborators.
#[derive(Clone, Debug)]
pub enum NodeCommsRequest {
    AddBlock {
        block: Box<Block>,
        origin: Option<String>,
    },
    AddTx(Box<Transaction>),
    GetTemplate {
        chain_index: ChainIndex,
        miner_lock_script: LockScript,
    },
    GetBalance {
        lock_script: LockScript,
        utxos_limit: usize,
    },
    GetTxStatus {
        tx_id: TxId,
        chain_index: ChainIndex,
    },
    GetSyncData {
        chain_index: ChainIndex,
        locators: Vec<BlockHash>,
    },
}

impl Display for NodeCommsRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NodeCommsRequest::AddBlock { block, .. } => write!(f, "AddBlock({})", block.hash()),
            NodeCommsRequest::AddTx(tx) => write!(f, "AddTx({})", tx.id()),
            NodeCommsRequest::GetTemplate { chain_index, .. } => write!(f, "GetTemplate({})", chain_index),
            NodeCommsRequest::GetBalance { utxos_limit, .. } => write!(f, "GetBalance(limit {})", utxos_limit),
            NodeCommsRequest::GetTxStatus { tx_id, .. } => write!(f, "GetTxStatus({})", tx_id),
            NodeCommsRequest::GetSyncData { chain_index, locators } => {
                write!(f, "GetSyncData({}, {} locators)", chain_index, locators.len())
            },
        }
    }
}

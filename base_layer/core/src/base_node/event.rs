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

use std::sync::Arc;

use mosaic_common_types::{
    chain_index::ChainIndex,
    types::{BlockHash, TxId},
};
use strum_macros::Display;
use tokio::sync::broadcast;

use crate::{blocks::Block, proof_of_work::Weight};

/// Events published on the validated-block event stream for the node's collaborators (network,
/// RPC, miners).
#[derive(Clone, Debug, Display)]
pub enum BlockEvent {
    NewTip {
        chain_index: ChainIndex,
        hash: BlockHash,
        weight: Weight,
    },
    Reorg {
        chain_index: ChainIndex,
        removed: Vec<BlockHash>,
        added: Vec<BlockHash>,
    },
    SyncedStatus(bool),
    PeerMisbehavior {
        kind: MisbehaviorKind,
        peer: String,
    },
    BroadcastBlock {
        block: Arc<Block>,
        origin: Option<String>,
    },
    BroadcastTx(Vec<TxId>),
}

#[derive(Clone, Copy, Debug, Display, PartialEq, Eq)]
pub enum MisbehaviorKind {
    WrongWireVersion,
    InvalidBlock,
    InvalidTx,
}

pub type BlockEventSender = broadcast::Sender<Arc<BlockEvent>>;
pub type BlockEventReceiver = broadcast::Receiver<Arc<BlockEvent>>;

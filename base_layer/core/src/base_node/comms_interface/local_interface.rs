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
use mosaic_storage::KeyValStore;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{
    base_node::comms_interface::{
        CommsInterfaceError,
        InboundNodeCommsHandlers,
        NodeCommsRequest,
        NodeCommsResponse,
    },
    blocks::Block,
    transactions::{LockScript, Transaction},
};

type Reply = oneshot::Sender<Result<NodeCommsResponse, CommsInterfaceError>>;
pub type RequestReceiver = mpsc::Receiver<(NodeCommsRequest, Reply)>;

/// Typed request/reply handle local services use to reach the core. Clone freely; all clones
/// feed the same serial request handler.
#[derive(Clone)]
pub struct LocalNodeCommsInterface {
    sender: mpsc::Sender<(NodeCommsRequest, Reply)>,
}

impl LocalNodeCommsInterface {
    pub fn new(capacity: usize) -> (Self, RequestReceiver) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    pub async fn request(&self, request: NodeCommsRequest) -> Result<NodeCommsResponse, CommsInterfaceError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send((request, reply))
            .await
            .map_err(|_| CommsInterfaceError::RequestChannelClosed)?;
        response.await.map_err(|_| CommsInterfaceError::RequestChannelClosed)?
    }

    pub async fn add_block(
        &self,
        block: Block,
        origin: Option<String>,
    ) -> Result<NodeCommsResponse, CommsInterfaceError> {
        self.request(NodeCommsRequest::AddBlock {
            block: Box::new(block),
            origin,
        })
        .await
    }

    pub async fn add_tx(&self, tx: Transaction) -> Result<NodeCommsResponse, CommsInterfaceError> {
        self.request(NodeCommsRequest::AddTx(Box::new(tx))).await
    }

    pub async fn get_template(
        &self,
        chain_index: ChainIndex,
        miner_lock_script: LockScript,
    ) -> Result<NodeCommsResponse, CommsInterfaceError> {
        self.request(NodeCommsRequest::GetTemplate {
            chain_index,
            miner_lock_script,
        })
        .await
    }

    pub async fn get_balance(
        &self,
        lock_script: LockScript,
        utxos_limit: usize,
    ) -> Result<NodeCommsResponse, CommsInterfaceError> {
        self.request(NodeCommsRequest::GetBalance {
            lock_script,
            utxos_limit,
        })
        .await
    }

    pub async fn get_tx_status(
        &self,
        tx_id: TxId,
        chain_index: ChainIndex,
    ) -> Result<NodeCommsResponse, CommsInterfaceError> {
        self.request(NodeCommsRequest::GetTxStatus { tx_id, chain_index }).await
    }

    pub async fn get_sync_data(
        &self,
        chain_index: ChainIndex,
        locators: Vec<BlockHash>,
    ) -> Result<NodeCommsResponse, CommsInterfaceError> {
        self.request(NodeCommsRequest::GetSyncData { chain_index, locators })
            .await
    }
}

/// Drain the request channel, processing each command to completion in arrival order.
pub fn spawn_request_handler<S>(
    mut receiver: RequestReceiver,
    handlers: Arc<InboundNodeCommsHandlers<S>>,
) -> JoinHandle<()>
where
    S: KeyValStore + Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        while let Some((request, reply)) = receiver.recv().await {
            let response = handlers.handle_request(request).await;
            let _ = reply.send(response);
        }
    })
}

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

use mosaic_common_types::{chain_index::ChainIndex, types::FixedHash};

use crate::{
    blocks::{Block, BlockDeps, BlockHeader},
    consensus::ConsensusConstants,
};

/// The genesis block of one chain. Genesis headers carry all-zero deps and an empty transaction
/// list; the nonce encodes the chain position so every chain starts from a distinct hash.
pub fn genesis_block(chain_index: ChainIndex, constants: &ConsensusConstants) -> Block {
    let header = BlockHeader {
        deps: BlockDeps::genesis(constants.groups),
        dep_state_hash: FixedHash::zero(),
        txs_hash: FixedHash::zero(),
        timestamp: constants.genesis_timestamp,
        target: constants.max_mining_target,
        nonce: u64::from(chain_index.flat_index(constants.groups)),
    };
    Block::new(header, Vec::new())
}

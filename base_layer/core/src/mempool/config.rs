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

use crate::consensus::ConsensusConstants;

#[derive(Clone, Copy, Debug)]
pub struct MempoolConfig {
    pub shared_capacity: usize,
    pub pending_capacity: usize,
    /// Transactions older than this are dropped by [`crate::mempool::Mempool::clean`]
    pub tx_max_age_ms: u64,
}

impl MempoolConfig {
    pub fn from_consensus(constants: &ConsensusConstants) -> Self {
        Self {
            shared_capacity: constants.mempool_shared_capacity,
            pending_capacity: constants.mempool_pending_capacity,
            tx_max_age_ms: 30 * 60 * 1000,
        }
    }
}

impl Default for MempoolConfig {
    fn default() -> Self {
        Self {
            shared_capacity: 1024,
            pending_capacity: 256,
            tx_max_age_ms: 30 * 60 * 1000,
        }
    }
}

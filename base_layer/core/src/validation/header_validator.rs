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

use mosaic_common_types::epoch_time::EpochTime;
use mosaic_storage::KeyValStore;

use crate::{
    blocks::BlockHeader,
    chain_storage::ChainTree,
    consensus::ConsensusManager,
    proof_of_work::{digi_shield_retarget, Target},
    validation::ValidationError,
};

/// How far ahead of local time a header timestamp may run.
const MAX_FUTURE_DRIFT_MS: u64 = 15 * 60 * 1000;

/// Stateless-plus-ancestry header checks: proof of work, timestamp sanity, and the DigiShield
/// target expectation derived from the parent's window.
pub struct HeaderValidator {
    rules: ConsensusManager,
}

impl HeaderValidator {
    pub fn new(rules: ConsensusManager) -> Self {
        Self { rules }
    }

    pub fn validate<S: KeyValStore>(
        &self,
        header: &BlockHeader,
        tree: &ChainTree<S>,
        now: EpochTime,
    ) -> Result<(), ValidationError> {
        if !header.pow_is_valid() {
            return Err(ValidationError::InvalidPoW);
        }
        if header.timestamp.as_millis() > now.as_millis() + MAX_FUTURE_DRIFT_MS {
            return Err(ValidationError::TimestampTooFarInFuture);
        }
        let parent = header.parent(tree.chain_index());
        let expected = self.expected_target(&parent, tree)?;
        if header.target != expected {
            return Err(ValidationError::InvalidTarget);
        }
        Ok(())
    }

    /// The target a child of `parent` must carry. Below the averaging window the parent target is
    /// kept; from there on, the window time span ending at the parent drives the retarget.
    pub fn expected_target<S: KeyValStore>(
        &self,
        parent: &mosaic_common_types::types::BlockHash,
        tree: &ChainTree<S>,
    ) -> Result<Target, ValidationError> {
        let constants = self.rules.consensus_constants();
        let window = constants.pow_averaging_window;
        let parent_header = tree.fetch_header(parent)?;
        let parent_height = tree.height_of(parent)?;
        let child_height = parent_height + 1;

        if child_height < window + 2 {
            return Ok(parent_header.target);
        }

        let window_start_height = child_height - (window + 2);
        let window_start = tree.ancestor_at(parent, window_start_height)?;
        let time_span = tree.timestamp_of(parent)?.saturating_sub(tree.timestamp_of(&window_start)?);
        Ok(digi_shield_retarget(
            parent_header.target,
            time_span,
            &constants.retarget_params(),
        ))
    }
}

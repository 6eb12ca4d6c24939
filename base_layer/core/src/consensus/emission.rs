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

use mosaic_common_types::types::U256;

use crate::transactions::Amount;

/// Epoch-halving emission: the block reward halves every `halving_interval` blocks. Half of the
/// block's gas fees are added on top, with the total capped at twice the epoch reward so fee
/// spikes cannot mint unbounded coins.
#[derive(Clone, Debug)]
pub struct EmissionSchedule {
    initial_reward: Amount,
    halving_interval: u64,
}

impl EmissionSchedule {
    pub fn new(initial_reward: Amount, halving_interval: u64) -> Self {
        Self {
            initial_reward,
            halving_interval,
        }
    }

    pub fn miner_reward(&self, height: u64) -> Amount {
        let halvings = (height / self.halving_interval).min(255);
        Amount(self.initial_reward.0 >> halvings)
    }

    pub fn total_reward(&self, gas_fee: Amount, miner_reward: Amount) -> Amount {
        let cap = Amount(miner_reward.0.saturating_mul(U256::from(2u64)));
        miner_reward.saturating_add(Amount(gas_fee.0 / 2)).min(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reward_halves_on_schedule() {
        let schedule = EmissionSchedule::new(Amount::from_u64(1_000_000), 100);
        assert_eq!(schedule.miner_reward(0), Amount::from_u64(1_000_000));
        assert_eq!(schedule.miner_reward(99), Amount::from_u64(1_000_000));
        assert_eq!(schedule.miner_reward(100), Amount::from_u64(500_000));
        assert_eq!(schedule.miner_reward(250), Amount::from_u64(250_000));
    }

    #[test]
    fn fees_are_shared_and_capped() {
        let schedule = EmissionSchedule::new(Amount::from_u64(1_000), 100);
        let reward = schedule.miner_reward(0);
        assert_eq!(
            schedule.total_reward(Amount::from_u64(100), reward),
            Amount::from_u64(1_050)
        );
        // A fee spike cannot push the payout above twice the epoch reward
        assert_eq!(
            schedule.total_reward(Amount::from_u64(1_000_000), reward),
            Amount::from_u64(2_000)
        );
    }
}

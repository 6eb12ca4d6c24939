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

use primitive_types::{U256, U512};

use crate::proof_of_work::Target;

/// Window parameters for the DigiShield-style retarget. `expected_window_time_span` is the ideal
/// duration of `pow_averaging_window + 1` blocks; the min/max bounds damp the per-block swing.
#[derive(Clone, Copy, Debug)]
pub struct RetargetParams {
    pub expected_window_time_span: u64,
    pub window_time_span_min: u64,
    pub window_time_span_max: u64,
    pub max_mining_target: Target,
}

/// DigiShield variant: the observed window time span is blended one quarter of the way toward the
/// ideal span, clamped, and applied proportionally to the current target. Applied at every block
/// once the chain is at least a full averaging window past genesis; below the window the caller
/// keeps the current target.
pub fn digi_shield_retarget(current: Target, actual_time_span: u64, params: &RetargetParams) -> Target {
    let expected = params.expected_window_time_span;
    let clipped = i128::from(expected) + (i128::from(actual_time_span) - i128::from(expected)) / 4;
    let clamped = clipped
        .max(i128::from(params.window_time_span_min))
        .min(i128::from(params.window_time_span_max)) as u64;

    let scaled = current.0.full_mul(U256::from(clamped)) / U512::from(expected);
    let next = U256::try_from(scaled).unwrap_or(U256::MAX);
    Target(next.min(params.max_mining_target.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> RetargetParams {
        RetargetParams {
            expected_window_time_span: 18 * 64_000,
            window_time_span_min: 18 * 64_000 * 9 / 10,
            window_time_span_max: 18 * 64_000 * 11 / 10,
            max_mining_target: Target(U256::MAX >> 8),
        }
    }

    #[test]
    fn on_schedule_keeps_target() {
        let params = params();
        let current = Target(U256::from(1u64) << 200);
        let next = digi_shield_retarget(current, params.expected_window_time_span, &params);
        assert_eq!(next, current);
    }

    #[test]
    fn slow_blocks_raise_target() {
        let params = params();
        let current = Target(U256::from(1u64) << 200);
        let next = digi_shield_retarget(current, params.expected_window_time_span * 3, &params);
        assert!(next.0 > current.0);
        // Swing is clamped to the window maximum
        let expected = current.0 * U256::from(params.window_time_span_max) /
            U256::from(params.expected_window_time_span);
        assert_eq!(next.0, expected);
    }

    #[test]
    fn fast_blocks_lower_target() {
        let params = params();
        let current = Target(U256::from(1u64) << 200);
        let next = digi_shield_retarget(current, 0, &params);
        assert!(next.0 < current.0);
        let expected = current.0 * U256::from(params.window_time_span_min) /
            U256::from(params.expected_window_time_span);
        assert_eq!(next.0, expected);
    }

    #[test]
    fn never_exceeds_the_mining_cap() {
        let params = params();
        let current = params.max_mining_target;
        let next = digi_shield_retarget(current, u64::MAX / 2, &params);
        assert_eq!(next, params.max_mining_target);
    }
}

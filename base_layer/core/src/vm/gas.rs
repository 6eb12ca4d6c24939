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

use crate::vm::VmError;

pub const GAS_BASE: u64 = 2;
pub const GAS_HASH: u64 = 30;
pub const GAS_SIGNATURE: u64 = 2_000;
pub const GAS_STATE_ACCESS: u64 = 50;
pub const GAS_CONTRACT_CREATE: u64 = 8_000;
pub const GAS_CONTRACT_DESTROY: u64 = 2_000;
pub const GAS_CALL: u64 = 200;

/// The per-transaction gas budget. Every instruction charges before executing; the counter
/// underflowing is the deterministic abort honest executors agree on.
#[derive(Debug, Clone, Copy)]
pub struct GasCounter {
    initial: u64,
    remaining: u64,
}

impl GasCounter {
    pub fn new(budget: u64) -> Self {
        Self {
            initial: budget,
            remaining: budget,
        }
    }

    pub fn charge(&mut self, amount: u64) -> Result<(), VmError> {
        self.remaining = self.remaining.checked_sub(amount).ok_or(VmError::OutOfGas)?;
        Ok(())
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn used(&self) -> u64 {
        self.initial - self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn charges_until_exhausted() {
        let mut gas = GasCounter::new(5);
        gas.charge(GAS_BASE).unwrap();
        gas.charge(GAS_BASE).unwrap();
        assert_eq!(gas.used(), 4);
        assert_eq!(gas.charge(GAS_BASE), Err(VmError::OutOfGas));
        // A failed charge leaves the counter untouched
        assert_eq!(gas.remaining(), 1);
    }
}

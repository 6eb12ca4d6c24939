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

use std::{
    fmt,
    fmt::{Display, Formatter},
    io,
    ops::Add,
};

use borsh::{BorshDeserialize, BorshSerialize};
use mosaic_common_types::types::{FixedHash, U256};
use serde::{Deserialize, Serialize};

use crate::proof_of_work::PowError;

/// The proof-of-work bound: a block hash, interpreted as a big-endian 256-bit integer, must not
/// exceed its header's target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Target(pub U256);

impl Target {
    pub fn max() -> Self {
        Self(U256::MAX)
    }

    pub fn is_met_by(&self, hash: &FixedHash) -> bool {
        U256::from_big_endian(hash.as_slice()) <= self.0
    }

    /// Compact 4-byte representation: one exponent byte followed by a 3-byte big-endian mantissa,
    /// the scheme used by every bitcoin-derived chain.
    pub fn to_compact(&self) -> u32 {
        let mut size = (self.0.bits() + 7) / 8;
        let mut mantissa = if size <= 3 {
            self.0.low_u64() << (8 * (3 - size))
        } else {
            (self.0 >> (8 * (size - 3))).low_u64()
        };
        // A mantissa with the high bit set would read back as negative; shift one byte out
        if mantissa & 0x0080_0000 != 0 {
            mantissa >>= 8;
            size += 1;
        }
        (mantissa as u32) | ((size as u32) << 24)
    }

    pub fn from_compact(compact: u32) -> Result<Self, PowError> {
        let size = (compact >> 24) as usize;
        let mantissa = U256::from(compact & 0x007f_ffff);
        if compact & 0x0080_0000 != 0 {
            return Err(PowError::InvalidCompactTarget);
        }
        if size > 34 {
            return Err(PowError::InvalidCompactTarget);
        }
        let value = if size <= 3 {
            mantissa >> (8 * (3 - size))
        } else {
            let shift = 8 * (size - 3);
            if shift >= 256 || (mantissa << shift) >> shift != mantissa {
                return Err(PowError::InvalidCompactTarget);
            }
            mantissa << shift
        };
        Ok(Self(value))
    }

    /// The expected number of hash attempts this target represents. Easier targets contribute
    /// less weight, the hardest targets the most.
    pub fn to_weight(&self) -> Weight {
        // 2^256 / (target + 1), computed without 512-bit arithmetic as (!t / (t + 1)) + 1
        if self.0 == U256::MAX {
            return Weight(U256::one());
        }
        let (incremented, _) = self.0.overflowing_add(U256::one());
        Weight((!self.0 / incremented) + U256::one())
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl BorshSerialize for Target {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut buf = [0u8; 32];
        self.0.to_big_endian(&mut buf);
        writer.write_all(&buf)
    }
}

impl BorshDeserialize for Target {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 32];
        reader.read_exact(&mut buf)?;
        Ok(Self(U256::from_big_endian(&buf)))
    }
}

/// Cumulative difficulty along a chain path; the primary ordering key for canonicality.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Weight(pub U256);

impl Weight {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn from_u64(weight: u64) -> Self {
        Self(U256::from(weight))
    }

    pub fn checked_add(self, other: Weight) -> Result<Weight, PowError> {
        self.0
            .checked_add(other.0)
            .map(Weight)
            .ok_or(PowError::WeightOverflow)
    }
}

impl Add for Weight {
    type Output = Weight;

    fn add(self, other: Weight) -> Weight {
        Weight(self.0 + other.0)
    }
}

impl Display for Weight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl BorshSerialize for Weight {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut buf = [0u8; 32];
        self.0.to_big_endian(&mut buf);
        writer.write_all(&buf)
    }
}

impl BorshDeserialize for Weight {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 32];
        reader.read_exact(&mut buf)?;
        Ok(Self(U256::from_big_endian(&buf)))
    }
}

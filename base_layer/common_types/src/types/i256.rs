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
    cmp::Ordering,
    fmt,
    fmt::{Display, Formatter},
    io,
};

use borsh::{BorshDeserialize, BorshSerialize};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Signed 256-bit integer in two's complement representation.
///
/// Checked operations return `None` on overflow and on division by zero; the wrapping variants
/// reduce modulo 2^256.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct I256(U256);

impl I256 {
    pub const MAX: I256 = I256(U256([u64::MAX, u64::MAX, u64::MAX, i64::MAX as u64]));
    pub const MIN: I256 = I256(U256([0, 0, 0, 0x8000_0000_0000_0000]));
    pub const ONE: I256 = I256(U256([1, 0, 0, 0]));
    pub const ZERO: I256 = I256(U256([0, 0, 0, 0]));

    pub const fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub const fn to_raw(self) -> U256 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0.bit(255)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The absolute value as an unsigned integer. Well-defined for `I256::MIN` too, whose
    /// magnitude (2^255) does not fit in an `I256` but fits comfortably in a `U256`.
    pub fn magnitude(&self) -> U256 {
        if self.is_negative() {
            (!self.0).overflowing_add(U256::one()).0
        } else {
            self.0
        }
    }

    fn from_sign_magnitude(negative: bool, magnitude: U256) -> Option<Self> {
        if negative {
            if magnitude > I256::MIN.magnitude() {
                return None;
            }
            Some(Self((!magnitude).overflowing_add(U256::one()).0))
        } else {
            if magnitude > I256::MAX.0 {
                return None;
            }
            Some(Self(magnitude))
        }
    }

    pub fn checked_neg(self) -> Option<Self> {
        if self == I256::MIN {
            return None;
        }
        Some(Self((!self.0).overflowing_add(U256::one()).0))
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let (raw, _) = self.0.overflowing_add(rhs.0);
        let result = Self(raw);
        if self.is_negative() == rhs.is_negative() && result.is_negative() != self.is_negative() {
            return None;
        }
        Some(result)
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        let (raw, _) = self.0.overflowing_sub(rhs.0);
        let result = Self(raw);
        if self.is_negative() != rhs.is_negative() && result.is_negative() != self.is_negative() {
            return None;
        }
        Some(result)
    }

    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        let magnitude = self.magnitude().checked_mul(rhs.magnitude())?;
        let negative = self.is_negative() != rhs.is_negative() && !magnitude.is_zero();
        Self::from_sign_magnitude(negative, magnitude)
    }

    /// Truncating division. `None` when `rhs` is zero or for `I256::MIN / -1`.
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        let magnitude = self.magnitude() / rhs.magnitude();
        let negative = self.is_negative() != rhs.is_negative() && !magnitude.is_zero();
        Self::from_sign_magnitude(negative, magnitude)
    }

    /// Remainder with the sign of the dividend. `None` when `rhs` is zero.
    pub fn checked_rem(self, rhs: Self) -> Option<Self> {
        if rhs.is_zero() {
            return None;
        }
        let magnitude = self.magnitude() % rhs.magnitude();
        let negative = self.is_negative() && !magnitude.is_zero();
        Self::from_sign_magnitude(negative, magnitude)
    }

    pub fn wrapping_add(self, rhs: Self) -> Self {
        Self(self.0.overflowing_add(rhs.0).0)
    }

    pub fn wrapping_sub(self, rhs: Self) -> Self {
        Self(self.0.overflowing_sub(rhs.0).0)
    }

    pub fn wrapping_mul(self, rhs: Self) -> Self {
        // Two's complement multiplication agrees with unsigned multiplication modulo 2^256
        Self(self.0.overflowing_mul(rhs.0).0)
    }

    pub fn to_i64(self) -> Option<i64> {
        if self >= I256::from(i64::MIN) && self <= I256::from(i64::MAX) {
            let low = self.0.low_u64();
            Some(low as i64)
        } else {
            None
        }
    }
}

impl From<i64> for I256 {
    fn from(v: i64) -> Self {
        if v < 0 {
            I256::from_sign_magnitude(true, U256::from(v.unsigned_abs())).expect("magnitude fits")
        } else {
            I256(U256::from(v as u64))
        }
    }
}

impl From<u64> for I256 {
    fn from(v: u64) -> Self {
        I256(U256::from(v))
    }
}

impl PartialOrd for I256 {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for I256 {
    fn cmp(&self, other: &Self) -> Ordering {
        // Flipping the sign bit maps the signed order onto the unsigned one
        let sign_bit = U256::one() << 255;
        (self.0 ^ sign_bit).cmp(&(other.0 ^ sign_bit))
    }
}

impl Display for I256 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_negative() {
            write!(f, "-{}", self.magnitude())
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl BorshSerialize for I256 {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut buf = [0u8; 32];
        self.0.to_big_endian(&mut buf);
        writer.write_all(&buf)
    }
}

impl BorshDeserialize for I256 {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 32];
        reader.read_exact(&mut buf)?;
        Ok(Self(U256::from_big_endian(&buf)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_magnitude() {
        assert!(!I256::ZERO.is_negative());
        assert!(I256::from(-1i64).is_negative());
        assert_eq!(I256::from(-42i64).magnitude(), U256::from(42));
        assert_eq!(I256::MIN.magnitude(), U256::one() << 255);
    }

    #[test]
    fn checked_add_overflows_at_bounds() {
        assert_eq!(I256::MAX.checked_add(I256::ONE), None);
        assert_eq!(I256::MIN.checked_sub(I256::ONE), None);
        assert_eq!(I256::from(2i64).checked_add(I256::from(3i64)), Some(I256::from(5i64)));
        assert_eq!(I256::from(-2i64).checked_add(I256::from(3i64)), Some(I256::ONE));
    }

    #[test]
    fn division_by_zero_has_no_value() {
        assert_eq!(I256::from(10i64).checked_div(I256::ZERO), None);
        assert_eq!(I256::from(10i64).checked_rem(I256::ZERO), None);
        assert_eq!(I256::MIN.checked_div(I256::from(-1i64)), None);
        assert_eq!(I256::from(-7i64).checked_div(I256::from(2i64)), Some(I256::from(-3i64)));
        assert_eq!(I256::from(-7i64).checked_rem(I256::from(2i64)), Some(I256::from(-1i64)));
    }

    #[test]
    fn wrapping_matches_two_complement() {
        assert_eq!(I256::MAX.wrapping_add(I256::ONE), I256::MIN);
        assert_eq!(I256::MIN.wrapping_sub(I256::ONE), I256::MAX);
        assert_eq!(I256::from(-3i64).wrapping_mul(I256::from(4i64)), I256::from(-12i64));
    }

    #[test]
    fn ordering_respects_sign() {
        assert!(I256::from(-1i64) < I256::ZERO);
        assert!(I256::MIN < I256::from(-1i64));
        assert!(I256::MAX > I256::from(1i64));
        assert_eq!(I256::from(-5i64).to_string(), "-5");
    }

    #[test]
    fn borsh_round_trip() {
        for v in [I256::MIN, I256::from(-1i64), I256::ZERO, I256::from(12345i64), I256::MAX] {
            let bytes = borsh::to_vec(&v).unwrap();
            assert_eq!(bytes.len(), 32);
            let back: I256 = borsh::from_slice(&bytes).unwrap();
            assert_eq!(back, v);
        }
    }
}

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

use std::io;

use borsh::{BorshDeserialize, BorshSerialize};
use mosaic_common_types::types::{FixedHash, I256, U256};
use serde::{Deserialize, Serialize};

use crate::{transactions::ContractId, vm::VmError};

/// An address as seen by the VM: either a key-hash (asset) address or a contract.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub enum Address {
    Asset(FixedHash),
    Contract(ContractId),
}

impl Address {
    pub fn is_asset(&self) -> bool {
        matches!(self, Address::Asset(_))
    }
}

/// A VM operand or contract field value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Val {
    Bool(bool),
    I256(I256),
    U256(U256),
    ByteVec(Vec<u8>),
    Address(Address),
}

impl Val {
    pub fn as_bool(self) -> Result<bool, VmError> {
        match self {
            Val::Bool(v) => Ok(v),
            _ => Err(VmError::InvalidType),
        }
    }

    pub fn as_u256(self) -> Result<U256, VmError> {
        match self {
            Val::U256(v) => Ok(v),
            _ => Err(VmError::InvalidType),
        }
    }

    pub fn as_i256(self) -> Result<I256, VmError> {
        match self {
            Val::I256(v) => Ok(v),
            _ => Err(VmError::InvalidType),
        }
    }

    pub fn as_byte_vec(self) -> Result<Vec<u8>, VmError> {
        match self {
            Val::ByteVec(v) => Ok(v),
            _ => Err(VmError::InvalidType),
        }
    }

    pub fn as_address(self) -> Result<Address, VmError> {
        match self {
            Val::Address(v) => Ok(v),
            _ => Err(VmError::InvalidType),
        }
    }

    pub fn u256(v: u64) -> Val {
        Val::U256(U256::from(v))
    }
}

const TAG_BOOL: u8 = 0;
const TAG_I256: u8 = 1;
const TAG_U256: u8 = 2;
const TAG_BYTE_VEC: u8 = 3;
const TAG_ADDRESS: u8 = 4;

impl BorshSerialize for Val {
    fn serialize<W: io::Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Val::Bool(v) => {
                BorshSerialize::serialize(&TAG_BOOL, writer)?;
                BorshSerialize::serialize(v, writer)
            },
            Val::I256(v) => {
                BorshSerialize::serialize(&TAG_I256, writer)?;
                BorshSerialize::serialize(v, writer)
            },
            Val::U256(v) => {
                BorshSerialize::serialize(&TAG_U256, writer)?;
                let mut buf = [0u8; 32];
                v.to_big_endian(&mut buf);
                writer.write_all(&buf)
            },
            Val::ByteVec(v) => {
                BorshSerialize::serialize(&TAG_BYTE_VEC, writer)?;
                BorshSerialize::serialize(v, writer)
            },
            Val::Address(v) => {
                BorshSerialize::serialize(&TAG_ADDRESS, writer)?;
                BorshSerialize::serialize(v, writer)
            },
        }
    }
}

impl BorshDeserialize for Val {
    fn deserialize_reader<R: io::Read>(reader: &mut R) -> io::Result<Self> {
        let tag = u8::deserialize_reader(reader)?;
        match tag {
            TAG_BOOL => Ok(Val::Bool(bool::deserialize_reader(reader)?)),
            TAG_I256 => Ok(Val::I256(I256::deserialize_reader(reader)?)),
            TAG_U256 => {
                let mut buf = [0u8; 32];
                reader.read_exact(&mut buf)?;
                Ok(Val::U256(U256::from_big_endian(&buf)))
            },
            TAG_BYTE_VEC => Ok(Val::ByteVec(Vec::<u8>::deserialize_reader(reader)?)),
            TAG_ADDRESS => Ok(Val::Address(Address::deserialize_reader(reader)?)),
            _ => Err(io::Error::new(io::ErrorKind::InvalidData, "unknown Val tag")),
        }
    }
}

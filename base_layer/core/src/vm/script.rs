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

use borsh::{BorshDeserialize, BorshSerialize};
use mosaic_common_types::types::FixedHash;
use serde::{Deserialize, Serialize};

use crate::{hashing, vm::Instr};

/// One callable unit of a script or contract. `local_count` includes the `arg_count` argument
/// slots; external callers may only enter public methods, and only payable methods may touch
/// assets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Method {
    pub is_public: bool,
    pub is_payable: bool,
    pub arg_count: u16,
    pub local_count: u16,
    pub return_count: u16,
    pub instrs: Vec<Instr>,
}

impl Method {
    /// A public non-payable method with no locals; the common test fixture shape.
    pub fn simple(instrs: Vec<Instr>) -> Self {
        Self {
            is_public: true,
            is_payable: false,
            arg_count: 0,
            local_count: 0,
            return_count: 0,
            instrs,
        }
    }
}

/// A transaction script: method 0 is the entry point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StatefulScript {
    pub methods: Vec<Method>,
}

impl StatefulScript {
    pub fn from_methods(methods: Vec<Method>) -> Self {
        Self { methods }
    }
}

/// Deployable contract code: a declared field count plus methods. The code hash identifies the
/// code in the world-state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct StatefulContract {
    pub field_count: u16,
    pub methods: Vec<Method>,
}

impl StatefulContract {
    pub fn code_hash(&self) -> FixedHash {
        hashing::hash_borsh(self)
    }
}

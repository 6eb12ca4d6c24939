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

//! The stateful virtual machine: a bounded stack machine with a fixed instruction set, frame
//! stack, gas metering and an approved-asset pool, executing transaction scripts and contract
//! methods against a group's cached world-state.

mod error;
mod frame;
mod gas;
mod instruction;
mod runtime;
mod script;
mod stack;
mod value;

pub use error::VmError;
pub use gas::GasCounter;
pub use instruction::Instr;
pub use runtime::{StatefulVm, TxEnv, VmOutput};
pub use script::{Method, StatefulContract, StatefulScript};
pub use stack::Stack;
pub use value::{Address, Val};

/// Operand stack bound; exceeding it fails the script deterministically.
pub const OPERAND_STACK_MAX_SIZE: usize = 1024;
/// Method activation bound; recursion to this depth fails deterministically.
pub const FRAME_STACK_MAX_SIZE: usize = 16;

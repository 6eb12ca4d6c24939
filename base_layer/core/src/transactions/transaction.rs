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
use k256::ecdsa::{
    signature::hazmat::PrehashVerifier,
    Signature as SecpSignature,
    VerifyingKey,
};
use mosaic_common_types::types::{TxId, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    hashing,
    transactions::{
        transaction_output::{output_key, AssetOutput, AssetOutputRef, ContractOutputRef, TxOutput, UnlockScript},
        Amount,
    },
    vm::StatefulScript,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Unlock script public key does not hash to the output lockup")]
    WrongPublicKey,
    #[error("Unlock script public key is malformed")]
    InvalidPublicKey,
    #[error("Input signature is malformed")]
    MalformedSignature,
    #[error("Input signature does not verify")]
    InvalidSignature,
    #[error("Input {0} has no matching signature")]
    MissingSignature(usize),
}

/// Execution budget of a transaction, in gas units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct GasBox(pub u64);

/// Price per gas unit, in base coin units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize,
)]
pub struct GasPrice(pub Amount);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TxInput {
    pub output_ref: AssetOutputRef,
    pub unlock_script: UnlockScript,
}

/// The signed-over part of a transaction. Its hash is the transaction id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct UnsignedTransaction {
    pub script: Option<StatefulScript>,
    pub gas_amount: GasBox,
    pub gas_price: GasPrice,
    pub inputs: Vec<TxInput>,
    pub fixed_outputs: Vec<AssetOutput>,
}

impl UnsignedTransaction {
    pub fn id(&self) -> TxId {
        hashing::hash_borsh(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Transaction {
    pub unsigned: UnsignedTransaction,
    pub contract_inputs: Vec<ContractOutputRef>,
    pub generated_outputs: Vec<TxOutput>,
    pub input_signatures: Vec<Vec<u8>>,
    pub contract_signatures: Vec<Vec<u8>>,
}

impl Transaction {
    pub fn from_unsigned(unsigned: UnsignedTransaction, input_signatures: Vec<Vec<u8>>) -> Self {
        Self {
            unsigned,
            contract_inputs: Vec::new(),
            generated_outputs: Vec::new(),
            input_signatures,
            contract_signatures: Vec::new(),
        }
    }

    pub fn id(&self) -> TxId {
        self.unsigned.id()
    }

    pub fn gas_amount(&self) -> GasBox {
        self.unsigned.gas_amount
    }

    pub fn gas_price(&self) -> GasPrice {
        self.unsigned.gas_price
    }

    pub fn gas_fee(&self) -> Amount {
        Amount(
            self.unsigned
                .gas_price
                .0
                 .0
                .saturating_mul(U256::from(self.unsigned.gas_amount.0)),
        )
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.unsigned.inputs
    }

    pub fn fixed_outputs(&self) -> &[AssetOutput] {
        &self.unsigned.fixed_outputs
    }

    /// References to the fixed outputs this transaction produces, in output order.
    pub fn fixed_output_refs(&self, groups: u32) -> Vec<AssetOutputRef> {
        let tx_id = self.id();
        self.unsigned
            .fixed_outputs
            .iter()
            .enumerate()
            .map(|(index, output)| {
                AssetOutputRef::new(output.group_index(groups), output_key(&tx_id, index as u32))
            })
            .collect()
    }

    /// The signature a spender of input `index` must have provided, verified against the revealed
    /// public key and the transaction id.
    pub fn verify_input_unlock(&self, index: usize, expected_key_hash: &mosaic_common_types::types::FixedHash) -> Result<(), TransactionError> {
        let input = &self.unsigned.inputs[index];
        let UnlockScript::P2pkh(pub_key_bytes) = &input.unlock_script;
        if hashing::hash_bytes(pub_key_bytes) != *expected_key_hash {
            return Err(TransactionError::WrongPublicKey);
        }
        let signature_bytes = self
            .input_signatures
            .get(index)
            .ok_or(TransactionError::MissingSignature(index))?;
        let key =
            VerifyingKey::from_sec1_bytes(pub_key_bytes).map_err(|_| TransactionError::InvalidPublicKey)?;
        let signature = SecpSignature::from_slice(signature_bytes)
            .map_err(|_| TransactionError::MalformedSignature)?;
        key.verify_prehash(self.id().as_slice(), &signature)
            .map_err(|_| TransactionError::InvalidSignature)
    }
}

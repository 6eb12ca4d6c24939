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

use mosaic_common_types::{
    epoch_time::EpochTime,
    types::{FixedHash, U256},
};
use mosaic_core::{
    hashing,
    proof_of_work::Target,
    state::{CachedWorldState, WorldState},
    transactions::{Amount, AssetOutput, ContractId, LockScript, TxOutput},
    vm::{
        Address,
        Instr,
        Method,
        StatefulContract,
        StatefulScript,
        StatefulVm,
        TxEnv,
        Val,
        VmError,
        FRAME_STACK_MAX_SIZE,
    },
};
use mosaic_storage::MemoryStore;

const USER: Address = Address::Asset(FixedHash::zero());
const GAS_BUDGET: u64 = 1_000_000;

fn fresh_view() -> CachedWorldState<MemoryStore> {
    WorldState::new(MemoryStore::new(), FixedHash::zero()).cached()
}

fn env_with_funds(amount: u64) -> TxEnv {
    let user_hash = match USER {
        Address::Asset(hash) => hash,
        Address::Contract(_) => unreachable!(),
    };
    TxEnv {
        tx_id: FixedHash::from([1u8; 32]),
        block_ts: EpochTime::from_millis(100_000),
        block_target: Target::max(),
        network_id: 2,
        groups: 1,
        dust_utxo_amount: Amount::from_u64(1_000),
        fixed_output_count: 0,
        input_addresses: vec![USER],
        input_outputs: vec![AssetOutput::new(Amount::from_u64(amount), LockScript::P2pkh(user_hash))],
    }
}

fn payable_entry(instrs: Vec<Instr>) -> StatefulScript {
    StatefulScript::from_methods(vec![Method {
        is_public: true,
        is_payable: true,
        arg_count: 0,
        local_count: 0,
        return_count: 0,
        instrs,
    }])
}

fn run(script: &StatefulScript) -> Result<(), VmError> {
    let mut view = fresh_view();
    let env = env_with_funds(10_000);
    StatefulVm::execute(&mut view, &env, script, GAS_BUDGET).map(|_| ())
}

/// The contract id assigned to the n-th creation of the test transaction.
fn created_contract_id(env: &TxEnv, n: u32) -> ContractId {
    hashing::hash_borsh(&(env.tx_id, n))
}

fn destroying_contract() -> StatefulContract {
    StatefulContract {
        field_count: 0,
        methods: vec![
            // Method 0: destroy once, paying everything to the user address
            Method {
                is_public: true,
                is_payable: true,
                arg_count: 0,
                local_count: 0,
                return_count: 0,
                instrs: vec![Instr::ConstVal(Val::Address(USER)), Instr::DestroySelf, Instr::Return],
            },
            // Method 1: destroy twice in the same activation
            Method {
                is_public: true,
                is_payable: true,
                arg_count: 0,
                local_count: 0,
                return_count: 0,
                instrs: vec![
                    Instr::ConstVal(Val::Address(USER)),
                    Instr::DestroySelf,
                    Instr::ConstVal(Val::Address(USER)),
                    Instr::DestroySelf,
                    Instr::Return,
                ],
            },
            // Method 2: destroy into a contract address, which is forbidden
            Method {
                is_public: true,
                is_payable: true,
                arg_count: 0,
                local_count: 0,
                return_count: 0,
                instrs: vec![
                    Instr::ConstVal(Val::Address(Address::Contract(FixedHash::from([9u8; 32])))),
                    Instr::DestroySelf,
                    Instr::Return,
                ],
            },
        ],
    }
}

fn create_and_call(method: u16) -> StatefulScript {
    let code_bytes = borsh::to_vec(&destroying_contract()).unwrap();
    payable_entry(vec![
        Instr::ConstVal(Val::U256(U256::zero())),
        Instr::ConstVal(Val::ByteVec(code_bytes)),
        Instr::CreateContract,
        Instr::CallExternal(method),
        Instr::Return,
    ])
}

#[test]
fn checked_arithmetic_and_assertions() {
    let script = StatefulScript::from_methods(vec![Method::simple(vec![
        Instr::ConstVal(Val::u256(2)),
        Instr::ConstVal(Val::u256(3)),
        Instr::U256Mul,
        Instr::ConstVal(Val::u256(6)),
        Instr::ValEq,
        Instr::Assert,
        Instr::Return,
    ])]);
    run(&script).unwrap();

    let failing = StatefulScript::from_methods(vec![Method::simple(vec![
        Instr::ConstVal(Val::u256(1)),
        Instr::ConstVal(Val::u256(2)),
        Instr::ValEq,
        Instr::Assert,
    ])]);
    assert_eq!(run(&failing), Err(VmError::AssertionFailed));

    let overflowing = StatefulScript::from_methods(vec![Method::simple(vec![
        Instr::ConstVal(Val::U256(U256::MAX)),
        Instr::ConstVal(Val::u256(1)),
        Instr::U256Add,
    ])]);
    assert_eq!(run(&overflowing), Err(VmError::ArithmeticError));

    // Modular arithmetic wraps instead
    let wrapping = StatefulScript::from_methods(vec![Method::simple(vec![
        Instr::ConstVal(Val::U256(U256::MAX)),
        Instr::ConstVal(Val::u256(1)),
        Instr::U256ModAdd,
        Instr::ConstVal(Val::u256(0)),
        Instr::ValEq,
        Instr::Assert,
        Instr::Return,
    ])]);
    run(&wrapping).unwrap();
}

#[test]
fn hash_instructions_agree_with_the_domain_hash() {
    let expected = hashing::hash_bytes(b"mosaic").to_vec();
    let script = StatefulScript::from_methods(vec![Method::simple(vec![
        Instr::ConstVal(Val::ByteVec(b"mosaic".to_vec())),
        Instr::Blake2b,
        Instr::ConstVal(Val::ByteVec(expected)),
        Instr::ValEq,
        Instr::Assert,
        Instr::Return,
    ])]);
    run(&script).unwrap();
}

#[test]
fn absolute_lock_time_verification() {
    // Block timestamp in the env is 100_000
    let satisfied = StatefulScript::from_methods(vec![Method::simple(vec![
        Instr::ConstVal(Val::u256(50_000)),
        Instr::VerifyAbsoluteLocktime,
        Instr::Return,
    ])]);
    run(&satisfied).unwrap();

    let premature = StatefulScript::from_methods(vec![Method::simple(vec![
        Instr::ConstVal(Val::u256(200_000)),
        Instr::VerifyAbsoluteLocktime,
        Instr::Return,
    ])]);
    assert_eq!(run(&premature), Err(VmError::AbsoluteLockTimeVerificationFailed));
}

fn recursion_script(depth: u64) -> StatefulScript {
    StatefulScript::from_methods(vec![
        Method {
            is_public: true,
            is_payable: false,
            arg_count: 0,
            local_count: 0,
            return_count: 0,
            instrs: vec![
                Instr::ConstVal(Val::U256(U256::from(depth))),
                Instr::CallLocal(1),
                Instr::Return,
            ],
        },
        Method {
            is_public: false,
            is_payable: false,
            arg_count: 1,
            local_count: 1,
            return_count: 0,
            instrs: vec![
                Instr::LoadLocal(0),
                Instr::ConstVal(Val::u256(0)),
                Instr::ValEq,
                Instr::IfFalse(1),
                Instr::Return,
                Instr::LoadLocal(0),
                Instr::ConstVal(Val::u256(1)),
                Instr::U256Sub,
                Instr::CallLocal(1),
                Instr::Return,
            ],
        },
    ])
}

#[test]
fn recursion_to_the_frame_bound_fails_deterministically() {
    // The entry frame plus the first call occupy two slots; counting down from `n` adds `n` more
    let deepest_allowed = (FRAME_STACK_MAX_SIZE - 2) as u64;
    run(&recursion_script(deepest_allowed)).unwrap();
    assert_eq!(
        run(&recursion_script(deepest_allowed + 1)),
        Err(VmError::StackOverflow)
    );
}

#[test]
fn contract_creation_and_destruction() {
    let mut view = fresh_view();
    let env = env_with_funds(10_000);
    let script = create_and_call(0);
    let output = StatefulVm::execute(&mut view, &env, &script, GAS_BUDGET).unwrap();

    // The contract and its asset output are gone from the world state
    let id = created_contract_id(&env, 0);
    assert!(view.get_contract(&id).unwrap().is_none());

    // The creation deposit came back to the user when the contract destroyed itself
    let paid_out: Vec<&AssetOutput> = output
        .generated_outputs
        .iter()
        .filter_map(|out| match out {
            TxOutput::Asset(asset) => Some(asset),
            TxOutput::Contract(_) => None,
        })
        .collect();
    assert_eq!(paid_out.len(), 1);
    assert_eq!(paid_out[0].amount, Amount::from_u64(1_000));
}

#[test]
fn a_second_destruction_in_the_same_tx_fails() {
    let mut view = fresh_view();
    let env = env_with_funds(10_000);
    let script = create_and_call(1);
    let err = StatefulVm::execute(&mut view, &env, &script, GAS_BUDGET).unwrap_err();
    assert_eq!(err, VmError::ContractOutputNotFound);
    assert_eq!(err.to_string(), "contract output not found");
}

#[test]
fn destruction_target_must_be_an_asset_address() {
    let mut view = fresh_view();
    let env = env_with_funds(10_000);
    let script = create_and_call(2);
    let err = StatefulVm::execute(&mut view, &env, &script, GAS_BUDGET).unwrap_err();
    assert_eq!(err, VmError::InvalidAddressTypeInContractDestroy);
}

#[test]
fn field_count_mismatch_is_rejected() {
    let code_bytes = borsh::to_vec(&destroying_contract()).unwrap();
    // The contract declares zero fields but two are supplied
    let script = payable_entry(vec![
        Instr::ConstVal(Val::u256(7)),
        Instr::ConstVal(Val::u256(8)),
        Instr::ConstVal(Val::u256(2)),
        Instr::ConstVal(Val::ByteVec(code_bytes)),
        Instr::CreateContract,
    ]);
    assert_eq!(run(&script), Err(VmError::InvalidFieldLength));
}

#[test]
fn private_methods_reject_external_calls() {
    let code = StatefulContract {
        field_count: 0,
        methods: vec![
            Method {
                is_public: true,
                is_payable: false,
                arg_count: 0,
                local_count: 0,
                return_count: 0,
                instrs: vec![Instr::Return],
            },
            Method {
                is_public: false,
                is_payable: false,
                arg_count: 0,
                local_count: 0,
                return_count: 0,
                instrs: vec![Instr::Return],
            },
        ],
    };
    let code_bytes = borsh::to_vec(&code).unwrap();
    let script = payable_entry(vec![
        Instr::ConstVal(Val::u256(0)),
        Instr::ConstVal(Val::ByteVec(code_bytes)),
        Instr::CreateContract,
        Instr::CallExternal(1),
    ]);
    assert_eq!(run(&script), Err(VmError::ExternalPrivateMethodCall));
}

#[test]
fn gas_is_metered_and_deterministic() {
    let run_once = || {
        let mut view = fresh_view();
        let env = env_with_funds(10_000);
        StatefulVm::execute(&mut view, &env, &create_and_call(0), GAS_BUDGET)
            .unwrap()
            .gas_used
    };
    let first = run_once();
    let second = run_once();
    assert_eq!(first, second);
    assert!(first > 0);

    // Starving the same script of gas aborts it deterministically
    let mut view = fresh_view();
    let env = env_with_funds(10_000);
    let err = StatefulVm::execute(&mut view, &env, &create_and_call(0), first - 1).unwrap_err();
    assert_eq!(err, VmError::OutOfGas);
}

#[test]
fn out_of_gas_leaves_no_partial_state_behind() {
    let store = MemoryStore::new();
    let mut view = WorldState::new(store.clone(), FixedHash::zero()).cached();
    let env = env_with_funds(10_000);
    let err = StatefulVm::execute(&mut view, &env, &create_and_call(0), 10).unwrap_err();
    assert_eq!(err, VmError::OutOfGas);
    drop(view);
    // The overlay was never committed, so the store never saw a write
    assert_eq!(store.len(mosaic_storage::ColumnFamily::TrieNodes).unwrap(), 0);
}

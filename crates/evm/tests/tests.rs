#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use bytes::Bytes;
use kestrel_common::{Account, Address, Fork, U256, utils::address_to_word};
use kestrel_evm::{
    environment::Environment,
    errors::{ExceptionalHalt, ExecutionReport, TxResult},
    operations::{Operation, ops_to_bytecode},
    vm::CallRequest,
    {Host, InMemoryHost, Vm},
};

fn sender() -> Address {
    Address::from_low_u64_be(0x100)
}

fn contract_address() -> Address {
    Address::from_low_u64_be(0x4242)
}

fn host_with_contract(code: &[Operation]) -> InMemoryHost {
    let mut host = InMemoryHost::new();
    host.add_account(
        sender(),
        Account::with_balance(U256::from(10).pow(U256::from(18))),
    );
    host.add_account(
        contract_address(),
        Account::with_code(ops_to_bytecode(code)),
    );
    host
}

fn execute(host: &mut InMemoryHost, gas_limit: u64) -> ExecutionReport {
    execute_on(host, gas_limit, Fork::Cancun)
}

fn execute_on(host: &mut InMemoryHost, gas_limit: u64, fork: Fork) -> ExecutionReport {
    let env = Environment {
        fork,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, host);
    vm.execute(CallRequest::transaction(
        sender(),
        contract_address(),
        gas_limit,
        Bytes::new(),
    ))
    .unwrap()
}

/// Wrap `ops` so the value they leave on top of the stack becomes the
/// transaction output.
fn return_top(ops: &[Operation]) -> Vec<Operation> {
    let mut program = ops.to_vec();
    program.extend([
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(32))),
        Operation::Push((1, U256::zero())),
        Operation::Return,
    ]);
    program
}

fn run_and_return_top(ops: &[Operation]) -> U256 {
    let mut host = host_with_contract(&return_top(ops));
    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success, "report: {report:?}");
    U256::from_big_endian(report.output.as_ref())
}

// ==================== Arithmetic ====================

#[test]
fn add_wraps_modulo_2_256() {
    let result = run_and_return_top(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((1, U256::from(2))),
        Operation::Add,
    ]);
    assert_eq!(result, U256::one());
}

#[test]
fn div_and_mod_by_zero_are_zero() {
    let result = run_and_return_top(&[
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::from(10))),
        Operation::Div,
    ]);
    assert_eq!(result, U256::zero());

    let result = run_and_return_top(&[
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::from(10))),
        Operation::Mod,
    ]);
    assert_eq!(result, U256::zero());
}

#[test]
fn sdiv_negative_operands() {
    // -2 / -1 == 2
    let result = run_and_return_top(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((32, U256::MAX - 1)),
        Operation::Sdiv,
    ]);
    assert_eq!(result, U256::from(2));
}

#[test]
fn smod_sign_follows_dividend() {
    // -8 % -3 == -2 in two's complement.
    let minus_eight =
        U256::MAX - U256::from(7);
    let minus_three = U256::MAX - U256::from(2);
    let minus_two = U256::MAX - U256::one();
    let result = run_and_return_top(&[
        Operation::Push((32, minus_three)),
        Operation::Push((32, minus_eight)),
        Operation::SMod,
    ]);
    assert_eq!(result, minus_two);
}

#[test]
fn addmod_and_mulmod_use_wide_intermediates() {
    let result = run_and_return_top(&[
        Operation::Push((1, U256::from(8))),
        Operation::Push((1, U256::from(10))),
        Operation::Push((1, U256::from(10))),
        Operation::Addmod,
    ]);
    assert_eq!(result, U256::from(4));

    let result = run_and_return_top(&[
        Operation::Push((1, U256::from(12))),
        Operation::Push((32, U256::MAX)),
        Operation::Push((32, U256::MAX)),
        Operation::Mulmod,
    ]);
    assert_eq!(result, U256::from(9));
}

#[test]
fn exp_charges_per_exponent_byte() {
    let mut host = host_with_contract(&return_top(&[
        Operation::Push((2, U256::from(0x101))),
        Operation::Push((1, U256::from(2))),
        Operation::Exp,
    ]));
    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    // Static: 3 + 3 + 10 (EXP) + return wrapper 3+3+3+3 = 28, dynamic EXP
    // 2 bytes * 50 = 100, memory expansion 3.
    assert_eq!(report.gas_used, 131);
    assert_eq!(
        U256::from_big_endian(report.output.as_ref()),
        U256::from(2).overflowing_pow(U256::from(0x101)).0
    );
}

#[test]
fn signextend_from_byte_zero() {
    let result = run_and_return_top(&[
        Operation::Push((1, U256::from(0xFF))),
        Operation::Push((1, U256::zero())),
        Operation::SignExtend,
    ]);
    assert_eq!(result, U256::MAX);
}

// ==================== Comparison and bitwise ====================

#[test]
fn comparisons_push_boolean_words() {
    let result = run_and_return_top(&[
        Operation::Push((1, U256::from(10))),
        Operation::Push((1, U256::from(9))),
        Operation::Lt,
    ]);
    assert_eq!(result, U256::one());

    let result = run_and_return_top(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((1, U256::zero())),
        Operation::Sgt,
    ]);
    assert_eq!(result, U256::one());
}

#[test]
fn shifts_beyond_word_width() {
    let result = run_and_return_top(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((2, U256::from(256))),
        Operation::Shr,
    ]);
    assert_eq!(result, U256::zero());

    // Arithmetic shift of a negative value fills with ones.
    let result = run_and_return_top(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((2, U256::from(300))),
        Operation::Sar,
    ]);
    assert_eq!(result, U256::MAX);
}

#[test]
fn byte_indexes_big_endian() {
    let result = run_and_return_top(&[
        Operation::Push((2, U256::from(0xAABBu64))),
        Operation::Push((1, U256::from(31))),
        Operation::Byte,
    ]);
    assert_eq!(result, U256::from(0xBB));
}

// ==================== KECCAK256 ====================

#[test]
fn keccak256_of_stored_word() {
    let value = U256::from(0xdeadbeefu64);
    let result = run_and_return_top(&[
        Operation::Push((32, value)),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(32))),
        Operation::Push((1, U256::zero())),
        Operation::Keccak256,
    ]);
    let raw = value.to_big_endian();
    let expected = keccak_hash::keccak(raw);
    assert_eq!(result, U256::from_big_endian(expected.as_bytes()));
}

// ==================== Literal bytecode programs ====================

#[test]
fn scenario_simple_addition() {
    // PUSH1 10, PUSH1 20, ADD, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, RETURN
    let code = hex::decode("600A60140160005260206000F3").unwrap();
    let mut host = InMemoryHost::new();
    host.add_account(contract_address(), Account::with_code(code.into()));
    let report = execute(&mut host, 100_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(
        U256::from_big_endian(report.output.as_ref()),
        U256::from(30)
    );
    // 21 static + 3 memory expansion.
    assert_eq!(report.gas_used, 24);
}

#[test]
fn scenario_static_jump_skips_invalid() {
    // PUSH1 4, JUMP, INVALID, JUMPDEST, PUSH1 0xAA, STOP
    let code = hex::decode("600456FE5B60AA00").unwrap();
    let mut host = InMemoryHost::new();
    host.add_account(contract_address(), Account::with_code(code.into()));
    let report = execute(&mut host, 100_000);
    assert_eq!(report.result, TxResult::Success);
    // Block with PUSH+JUMP (11) plus jump target block JUMPDEST+PUSH+STOP (4).
    assert_eq!(report.gas_used, 15);
}

#[test]
fn scenario_invalid_jump_consumes_all_gas() {
    // PUSH1 4, JUMP: target is a STOP byte, not a JUMPDEST.
    let code = hex::decode("6004560000").unwrap();
    let mut host = InMemoryHost::new();
    host.add_account(contract_address(), Account::with_code(code.into()));
    let report = execute(&mut host, 100_000);
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::InvalidJump));
    assert_eq!(report.gas_used, 100_000);
}

#[test]
fn scenario_revert_returns_data_and_remaining_gas() {
    // PUSH1 0x42, PUSH1 0, MSTORE, PUSH1 32, PUSH1 0, REVERT
    let code = hex::decode("604260005260206000FD").unwrap();
    let mut host = InMemoryHost::new();
    host.add_account(contract_address(), Account::with_code(code.into()));
    let report = execute(&mut host, 100_000);
    assert_eq!(report.result, TxResult::Revert);
    assert_eq!(
        U256::from_big_endian(report.output.as_ref()),
        U256::from(0x42)
    );
    assert!(report.gas_used < 100_000);
    assert_eq!(report.gas_used, 18);
}

#[test]
fn scenario_out_of_gas_in_memory_extension() {
    // PUSH2 0xFFFF, PUSH1 0, MSTORE with a 10 gas budget.
    let code = hex::decode("61FFFF60005200").unwrap();
    let mut host = InMemoryHost::new();
    host.add_account(contract_address(), Account::with_code(code.into()));
    let report = execute(&mut host, 10);
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::OutOfGas));
    assert_eq!(report.gas_used, 10);
}

// ==================== Storage ====================

#[test]
fn sstore_and_sload_roundtrip() {
    let result = run_and_return_top(&[
        Operation::Push((1, U256::from(7))),
        Operation::Push((1, U256::from(3))),
        Operation::Sstore,
        Operation::Push((1, U256::from(3))),
        Operation::Sload,
    ]);
    assert_eq!(result, U256::from(7));
}

#[test]
fn sstore_writes_reach_the_host() {
    let mut host = host_with_contract(&[
        Operation::Push((1, U256::from(9))),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Stop,
    ]);
    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(
        host.storage_value(contract_address(), U256::zero()),
        U256::from(9)
    );
}

#[test]
fn sstore_clear_earns_a_capped_refund() {
    let mut host = host_with_contract(&[
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Stop,
    ]);
    host.set_storage(contract_address(), U256::zero(), U256::one());
    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    // 6 static + 2900 reset + 2100 cold = 5006 used; refund 4800 capped to
    // used / 5.
    assert_eq!(report.gas_used, 5006);
    assert_eq!(report.gas_refunded, 1001);
}

#[test]
fn sstore_sentry_rejects_low_gas() {
    let mut host = host_with_contract(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Stop,
    ]);
    let report = execute(&mut host, 2306);
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::OutOfGas));
    assert_eq!(report.gas_used, 2306);
}

#[test]
fn transient_storage_is_separate_from_persistent() {
    let result = run_and_return_top(&[
        Operation::Push((1, U256::from(5))),
        Operation::Push((1, U256::zero())),
        Operation::Tstore,
        Operation::Push((1, U256::zero())),
        Operation::Tload,
        Operation::Push((1, U256::zero())),
        Operation::Sload,
        Operation::Add,
    ]);
    // Persistent slot reads zero, transient reads the stored 5.
    assert_eq!(result, U256::from(5));
}

// ==================== Memory ====================

#[test]
fn mstore_mload_roundtrip_and_msize() {
    let result = run_and_return_top(&[
        Operation::Push((32, U256::MAX)),
        Operation::Push((1, U256::from(64))),
        Operation::Mstore,
        Operation::Push((1, U256::from(64))),
        Operation::Mload,
    ]);
    assert_eq!(result, U256::MAX);

    let result = run_and_return_top(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::from(95))),
        Operation::Mstore8,
        Operation::Msize,
    ]);
    assert_eq!(result, U256::from(96));
}

#[test]
fn mcopy_moves_within_memory() {
    let result = run_and_return_top(&[
        Operation::Push((1, U256::from(0x77))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(32))), // size
        Operation::Push((1, U256::zero())),   // src
        Operation::Push((1, U256::from(64))), // dst
        Operation::Mcopy,
        Operation::Push((1, U256::from(64))),
        Operation::Mload,
    ]);
    assert_eq!(result, U256::from(0x77));
}

// ==================== Gas introspection ====================

#[test]
fn gas_opcode_accounts_for_block_precharge() {
    let gas_limit = 50_000;
    let result_ops = return_top(&[Operation::Gas]);
    let mut host = host_with_contract(&result_ops);
    let report = execute(&mut host, gas_limit);
    assert_eq!(report.result, TxResult::Success);
    // GAS must observe only its own 2 gas spent, regardless of the
    // block-level pre-charge of the following instructions.
    assert_eq!(
        U256::from_big_endian(report.output.as_ref()),
        U256::from(gas_limit - 2)
    );
}

// ==================== Calls ====================

/// Code that returns one 32-byte word taken from its own storage slot 0.
fn callee_return_slot0() -> Vec<Operation> {
    return_top(&[Operation::Push((1, U256::zero())), Operation::Sload])
}

fn add_contract(host: &mut InMemoryHost, address: Address, code: &[Operation]) {
    host.add_account(address, Account::with_code(ops_to_bytecode(code)));
}

/// retSize, retOffset, argsSize, argsOffset, (value,) address, gas pushed in
/// call order for the given call operation.
fn call_sequence(target: Address, with_value: Option<U256>, op: Operation) -> Vec<Operation> {
    let mut ops = vec![
        Operation::Push((1, U256::from(32))), // ret size
        Operation::Push((1, U256::zero())),   // ret offset
        Operation::Push((1, U256::zero())),   // args size
        Operation::Push((1, U256::zero())),   // args offset
    ];
    if let Some(value) = with_value {
        ops.push(Operation::Push((32, value)));
    }
    ops.push(Operation::Push((20, address_to_word(target))));
    ops.push(Operation::Push((3, U256::from(0xFFFFF))));
    ops.push(op);
    ops
}

#[test]
fn call_reads_callee_storage_and_returns_data() {
    let callee = Address::from_low_u64_be(0xBEEF);
    let mut outer = call_sequence(callee, Some(U256::zero()), Operation::Call);
    // Return the call's output (copied to memory 0..32) only if it
    // succeeded; otherwise return the success flag itself.
    outer.extend([
        Operation::Pop,
        Operation::Push((1, U256::from(32))),
        Operation::Push((1, U256::zero())),
        Operation::Return,
    ]);
    let mut host = host_with_contract(&outer);
    add_contract(&mut host, callee, &callee_return_slot0());
    host.set_storage(callee, U256::zero(), U256::from(1234));

    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(
        U256::from_big_endian(report.output.as_ref()),
        U256::from(1234)
    );
}

#[test]
fn call_with_value_transfers_balance() {
    let callee = Address::from_low_u64_be(0xBEEF);
    let mut outer = call_sequence(callee, Some(U256::from(500)), Operation::Call);
    outer.push(Operation::Stop);
    let mut host = host_with_contract(&outer);
    host.add_account(
        contract_address(),
        Account {
            balance: U256::from(1000),
            nonce: 0,
            code: ops_to_bytecode(&outer),
        },
    );

    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(host.account(callee).unwrap().balance, U256::from(500));
    assert_eq!(
        host.account(contract_address()).unwrap().balance,
        U256::from(500)
    );
}

#[test]
fn call_to_reverting_callee_undoes_its_state() {
    let callee = Address::from_low_u64_be(0xBEEF);
    // Callee writes storage then reverts.
    let callee_code = [
        Operation::Push((1, U256::from(7))),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Revert,
    ];
    let outer = return_top(&call_sequence(callee, Some(U256::zero()), Operation::Call));
    let mut host = host_with_contract(&outer);
    add_contract(&mut host, callee, &callee_code);

    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    // The CALL pushed 0 and the write is gone.
    assert_eq!(U256::from_big_endian(report.output.as_ref()), U256::zero());
    assert_eq!(host.storage_value(callee, U256::zero()), U256::zero());
}

#[test]
fn delegatecall_writes_to_the_callers_storage() {
    let library = Address::from_low_u64_be(0x11B);
    let library_code = [
        Operation::Push((1, U256::from(77))),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Stop,
    ];
    let mut outer = call_sequence(library, None, Operation::DelegateCall);
    outer.push(Operation::Stop);
    let mut host = host_with_contract(&outer);
    add_contract(&mut host, library, &library_code);

    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(
        host.storage_value(contract_address(), U256::zero()),
        U256::from(77)
    );
    assert_eq!(host.storage_value(library, U256::zero()), U256::zero());
}

#[test]
fn staticcall_blocks_storage_writes() {
    let writer = Address::from_low_u64_be(0x57A);
    // PUSH1 1, PUSH1 0, SSTORE, STOP
    let writer_code = [
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Stop,
    ];
    host_static_violation_check(writer, &writer_code);
}

fn host_static_violation_check(writer: Address, writer_code: &[Operation]) {
    let outer = return_top(&call_sequence(writer, None, Operation::StaticCall));
    let mut host = host_with_contract(&outer);
    add_contract(&mut host, writer, writer_code);
    host.set_storage(writer, U256::zero(), U256::from(55));

    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    // The inner frame halted: 0 on the stack, no state change.
    assert_eq!(U256::from_big_endian(report.output.as_ref()), U256::zero());
    assert_eq!(host.storage_value(writer, U256::zero()), U256::from(55));
}

#[test]
fn static_context_propagates_through_nested_calls() {
    let middle = Address::from_low_u64_be(0x3333);
    let writer = Address::from_low_u64_be(0x57A);
    let writer_code = [
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::zero())),
        Operation::Sstore,
        Operation::Stop,
    ];
    // middle CALLs writer (a plain CALL, but inside a static subtree).
    let mut middle_code = call_sequence(writer, Some(U256::zero()), Operation::Call);
    middle_code = return_top(&middle_code);
    let outer = return_top(&call_sequence(middle, None, Operation::StaticCall));

    let mut host = host_with_contract(&outer);
    add_contract(&mut host, middle, &middle_code);
    add_contract(&mut host, writer, &writer_code);

    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(host.storage_value(writer, U256::zero()), U256::zero());
}

#[test]
fn recursive_calls_bottom_out_via_the_63_64_rule() {
    // A contract that calls itself with all available gas. The 63/64 rule
    // shrinks the forwarded gas until the bottom frame cannot pay for its
    // first block; every level above it still completes successfully and
    // the retained slivers come back up.
    let mut code = call_sequence(contract_address(), Some(U256::zero()), Operation::Call);
    code.push(Operation::Stop);
    let mut host = host_with_contract(&code);
    let report = execute(&mut host, 300_000);
    assert_eq!(report.result, TxResult::Success);
    assert!(report.gas_used > 20_000, "per-level overhead adds up");
    assert!(report.gas_used < 300_000, "retained gas is returned");
}

// ==================== Create ====================

/// Init code that deploys `runtime` (up to 32 bytes) by storing it in
/// memory and returning it.
fn deploy_ops(runtime: &[u8]) -> Vec<Operation> {
    let mut padded = [0u8; 32];
    padded[..runtime.len()].copy_from_slice(runtime);
    vec![
        Operation::Push((32, U256::from_big_endian(&padded))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(runtime.len() as u64))),
        Operation::Push((1, U256::zero())),
        Operation::Return,
    ]
}

#[test]
fn create_request_deploys_runtime_code() {
    let runtime = [0x60, 0x2A, 0x60, 0x00, 0x52, 0x60, 0x20, 0x60, 0x00, 0xF3];
    let init_code = ops_to_bytecode(&deploy_ops(&runtime));

    let mut host = InMemoryHost::new();
    host.add_account(sender(), Account::with_balance(U256::from(1_000_000)));
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let report = vm
        .execute(CallRequest::create(sender(), 1_000_000, init_code))
        .unwrap();

    assert_eq!(report.result, TxResult::Success);
    let created = report.address_created.unwrap();
    assert_eq!(report.output.as_ref(), &runtime);
    assert_eq!(host.account(created).unwrap().code.as_ref(), &runtime);
    assert_eq!(host.account(created).unwrap().nonce, 1);
    // Creator nonce bumped.
    assert_eq!(host.account(sender()).unwrap().nonce, 1);
}

#[test]
fn create_opcode_returns_address_and_create2_is_deterministic() {
    // The contract stores a 5-byte init blob (deploys an empty contract)
    // and CREATE2s it with salt 9, returning the created address.
    // PUSH1 0 (size), PUSH1 0 (offset), RETURN
    let init = Bytes::from_static(&[0x60, 0x00, 0x60, 0x00, 0xF3]);
    let mut init_word = [0u8; 32];
    init_word[..init.len()].copy_from_slice(init.as_ref());

    let ops = return_top(&[
        Operation::Push((32, U256::from_big_endian(&init_word))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((1, U256::from(9))),               // salt
        Operation::Push((1, U256::from(init.len() as u64))), // size
        Operation::Push((1, U256::zero())),                // offset
        Operation::Push((1, U256::zero())),                // value
        Operation::Create2,
    ]);
    let mut host = host_with_contract(&ops);
    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);

    let expected = kestrel_evm::utils::create2_address(
        contract_address(),
        U256::from(9),
        keccak_hash::keccak(init.as_ref()),
    );
    assert_eq!(
        U256::from_big_endian(report.output.as_ref()),
        address_to_word(expected)
    );
    assert!(host.account(expected).is_some());
}

#[test]
fn value_call_with_insufficient_balance_halts_and_consumes_gas() {
    let callee = Address::from_low_u64_be(0xBEEF);
    let mut host = InMemoryHost::new();
    host.add_account(sender(), Account::with_balance(U256::from(10)));
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let mut request = CallRequest::transaction(sender(), callee, 60_000, Bytes::new());
    request.value = U256::from(11);
    let report = vm.execute(request).unwrap();
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::BalanceTooLow)
    );
    assert_eq!(report.gas_used, 60_000);
    assert_eq!(report.gas_refunded, 0);
    assert_eq!(host.balance(callee), U256::zero());
}

#[test]
fn create_with_insufficient_balance_halts_and_consumes_gas() {
    let mut host = InMemoryHost::new();
    host.add_account(sender(), Account::with_balance(U256::from(10)));
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let mut request = CallRequest::create(sender(), 60_000, Bytes::from_static(&[0x00]));
    request.value = U256::from(11);
    let report = vm.execute(request).unwrap();
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::BalanceTooLow)
    );
    assert_eq!(report.gas_used, 60_000);
    assert!(report.address_created.is_none());
    // The failed create never bumped the creator's nonce.
    assert_eq!(host.account(sender()).unwrap().nonce, 0);
}

#[test]
fn create_collision_fails_without_running_init_code() {
    let init_code = ops_to_bytecode(&deploy_ops(&[0x00]));
    let mut host = InMemoryHost::new();
    host.add_account(sender(), Account::with_balance(U256::from(1_000_000)));
    // Occupy the to-be-derived address (sender nonce 0).
    let derived = kestrel_evm::utils::create_address(sender(), 0);
    host.add_account(derived, Account::new(U256::zero(), 7, Bytes::new()));

    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let report = vm
        .execute(CallRequest::create(sender(), 500_000, init_code))
        .unwrap();
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::CreateCollision)
    );
    assert!(report.address_created.is_none());
}

#[test]
fn create_rejects_oversized_deployments() {
    // Init code that returns 24577 zero bytes.
    let init = [
        Operation::Push((3, U256::from(24_577u64))),
        Operation::Push((1, U256::zero())),
        Operation::Return,
    ];
    let mut host = InMemoryHost::new();
    host.add_account(sender(), Account::with_balance(U256::from(1_000_000)));
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let report = vm
        .execute(CallRequest::create(
            sender(),
            10_000_000,
            ops_to_bytecode(&init),
        ))
        .unwrap();
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::CodeSizeExceeded)
    );
}

#[test]
fn create_rejects_ef_prefixed_code() {
    let init = ops_to_bytecode(&deploy_ops(&[0xEF, 0x00]));
    let mut host = InMemoryHost::new();
    host.add_account(sender(), Account::with_balance(U256::from(1_000_000)));
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let report = vm
        .execute(CallRequest::create(sender(), 1_000_000, init))
        .unwrap();
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::InvalidCodePrefix)
    );
}

// ==================== Logs ====================

#[test]
fn log_emits_topics_and_data() {
    let mut host = host_with_contract(&[
        Operation::Push((1, U256::from(0x99))),
        Operation::Push((1, U256::zero())),
        Operation::Mstore,
        Operation::Push((2, U256::from(0xC0DE))), // topic
        Operation::Push((1, U256::from(32))),     // size
        Operation::Push((1, U256::zero())),       // offset
        Operation::Log(1),
        Operation::Stop,
    ]);
    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(host.logs().len(), 1);
    let log = &host.logs()[0];
    assert_eq!(log.address, contract_address());
    assert_eq!(log.topics.len(), 1);
    assert_eq!(
        U256::from_big_endian(log.topics[0].as_bytes()),
        U256::from(0xC0DE)
    );
    assert_eq!(
        U256::from_big_endian(log.data.as_ref()),
        U256::from(0x99)
    );
}

#[test]
fn reverted_subcall_logs_are_dropped() {
    let noisy = Address::from_low_u64_be(0x10F);
    let noisy_code = [
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Log(0),
        Operation::Push((1, U256::zero())),
        Operation::Push((1, U256::zero())),
        Operation::Revert,
    ];
    let mut outer = call_sequence(noisy, Some(U256::zero()), Operation::Call);
    outer.push(Operation::Stop);
    let mut host = host_with_contract(&outer);
    add_contract(&mut host, noisy, &noisy_code);

    let report = execute(&mut host, 1_000_000);
    assert_eq!(report.result, TxResult::Success);
    assert!(host.logs().is_empty());
}

// ==================== Stack validation ====================

#[test]
fn stack_overflow_detected_at_block_entry() {
    let mut ops = vec![Operation::Push0; 1025];
    ops.push(Operation::Stop);
    let mut host = host_with_contract(&ops);
    let report = execute(&mut host, 10_000_000);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::StackOverflow)
    );
    assert_eq!(report.gas_used, 10_000_000);
}

#[test]
fn stack_underflow_detected_at_block_entry() {
    let mut host = host_with_contract(&[Operation::Pop, Operation::Stop]);
    let report = execute(&mut host, 100_000);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::StackUnderflow)
    );
    assert_eq!(report.gas_used, 100_000);
}

#[test]
fn exactly_1024_items_is_legal() {
    let mut ops = vec![Operation::Push0; 1024];
    ops.push(Operation::Stop);
    let mut host = host_with_contract(&ops);
    let report = execute(&mut host, 10_000_000);
    assert_eq!(report.result, TxResult::Success);
}

// ==================== Environment readers ====================

#[test]
fn environment_opcodes_read_the_env() {
    let mut host = host_with_contract(&return_top(&[Operation::ChainId]));
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        chain_id: U256::from(1337),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let report = vm
        .execute(CallRequest::transaction(
            sender(),
            contract_address(),
            100_000,
            Bytes::new(),
        ))
        .unwrap();
    assert_eq!(
        U256::from_big_endian(report.output.as_ref()),
        U256::from(1337)
    );
}

#[test]
fn blockhash_serves_only_the_recent_window() {
    use kestrel_common::H256;

    let mut host = host_with_contract(&return_top(&[
        Operation::Push((1, U256::from(99))),
        Operation::BlockHash,
    ]));
    let hash = H256::from_low_u64_be(0xABCD);
    host.set_block_hash(99, hash);
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        block_number: U256::from(100),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let report = vm
        .execute(CallRequest::transaction(
            sender(),
            contract_address(),
            100_000,
            Bytes::new(),
        ))
        .unwrap();
    assert_eq!(
        U256::from_big_endian(report.output.as_ref()),
        U256::from(0xABCD)
    );

    // Out of the 256-block window: zero.
    let mut host = host_with_contract(&return_top(&[
        Operation::Push((1, U256::from(99))),
        Operation::BlockHash,
    ]));
    host.set_block_hash(99, hash);
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        block_number: U256::from(500),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let report = vm
        .execute(CallRequest::transaction(
            sender(),
            contract_address(),
            100_000,
            Bytes::new(),
        ))
        .unwrap();
    assert_eq!(U256::from_big_endian(report.output.as_ref()), U256::zero());
}

#[test]
fn calldata_opcodes() {
    let ops = return_top(&[
        Operation::Push((1, U256::zero())),
        Operation::CallDataLoad,
    ]);
    let mut host = host_with_contract(&ops);
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let calldata = Bytes::from(vec![0xAB; 32]);
    let report = vm
        .execute(CallRequest::transaction(
            sender(),
            contract_address(),
            100_000,
            calldata,
        ))
        .unwrap();
    assert_eq!(
        report.output.as_ref(),
        &[0xAB; 32],
        "CALLDATALOAD must read the input"
    );
}

#[test]
fn balance_and_selfbalance() {
    let mut host = host_with_contract(&return_top(&[Operation::SelfBalance]));
    host.add_account(
        contract_address(),
        Account {
            balance: U256::from(777),
            nonce: 0,
            code: host.account(contract_address()).unwrap().code.clone(),
        },
    );
    let report = execute(&mut host, 100_000);
    assert_eq!(
        U256::from_big_endian(report.output.as_ref()),
        U256::from(777)
    );
}

// ==================== Precompile boundary ====================

#[test]
fn identity_precompile_echoes_through_the_call_path() {
    let mut host = InMemoryHost::new();
    host.add_account(sender(), Account::with_balance(U256::from(1_000_000)));
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let input = Bytes::from_static(b"echo me");
    let report = vm
        .execute(CallRequest::transaction(
            sender(),
            Address::from_low_u64_be(4),
            100_000,
            input.clone(),
        ))
        .unwrap();
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(report.output, input);
    assert_eq!(report.gas_used, 18);
}

#[test]
fn sha256_precompile_hashes_through_the_call_path() {
    let mut host = InMemoryHost::new();
    host.add_account(sender(), Account::with_balance(U256::from(1_000_000)));
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    let report = vm
        .execute(CallRequest::transaction(
            sender(),
            Address::from_low_u64_be(2),
            100_000,
            Bytes::new(),
        ))
        .unwrap();
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(
        hex::encode(report.output.as_ref()),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn registered_precompile_is_callable_like_any_other() {
    use kestrel_evm::precompiles::{PrecompileError, Precompiles};

    fn forty_two(_input: &[u8], gas: u64) -> Result<(Bytes, u64), PrecompileError> {
        if gas < 25 {
            return Err(PrecompileError::OutOfGas);
        }
        let mut word = [0u8; 32];
        word[31] = 42;
        Ok((Bytes::copy_from_slice(&word), 25))
    }

    let oracle = Address::from_low_u64_be(0x100_00);
    let mut table = Precompiles::for_fork(Fork::Cancun);
    table.register(oracle, forty_two);

    let mut host = InMemoryHost::new();
    host.add_account(sender(), Account::with_balance(U256::from(1_000_000)));
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host).with_precompiles(table);
    let report = vm
        .execute(CallRequest::transaction(
            sender(),
            oracle,
            100_000,
            Bytes::new(),
        ))
        .unwrap();
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(U256::from_big_endian(report.output.as_ref()), U256::from(42));
    assert_eq!(report.gas_used, 25);
}

// ==================== Selfdestruct ====================

#[test]
fn selfdestruct_moves_balance_and_marks_destruction_pre_cancun() {
    let heir = Address::from_low_u64_be(0xDEAD);
    let ops = [
        Operation::Push((20, address_to_word(heir))),
        Operation::SelfDestruct,
    ];
    let mut host = host_with_contract(&ops);
    host.add_account(
        contract_address(),
        Account {
            balance: U256::from(888),
            nonce: 0,
            code: ops_to_bytecode(&ops),
        },
    );
    let report = execute_on(&mut host, 1_000_000, Fork::London);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(host.account(heir).unwrap().balance, U256::from(888));
    assert!(host.is_destructed(contract_address()));
}

#[test]
fn selfdestruct_after_cancun_only_sweeps_pre_existing_accounts() {
    let heir = Address::from_low_u64_be(0xDEAD);
    let ops = [
        Operation::Push((20, address_to_word(heir))),
        Operation::SelfDestruct,
    ];
    let mut host = host_with_contract(&ops);
    host.add_account(
        contract_address(),
        Account {
            balance: U256::from(888),
            nonce: 0,
            code: ops_to_bytecode(&ops),
        },
    );
    let report = execute_on(&mut host, 1_000_000, Fork::Cancun);
    assert_eq!(report.result, TxResult::Success);
    assert_eq!(host.account(heir).unwrap().balance, U256::from(888));
    // EIP-6780: the account was not created in this transaction.
    assert!(!host.is_destructed(contract_address()));
}

// ==================== Tracer ====================

#[test]
fn tracer_sees_every_step_with_bounded_snapshots() {
    use kestrel_evm::tracing::{FrameOutcome, SnapshotCaps, StepInfo, StepResult, Tracer};
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Counter {
        steps: Rc<Cell<usize>>,
        finalized: Rc<Cell<usize>>,
        max_stack_seen: Rc<Cell<usize>>,
    }
    impl Tracer for Counter {
        fn caps(&self) -> SnapshotCaps {
            SnapshotCaps {
                max_stack_items: 2,
                max_memory_bytes: 8,
            }
        }
        fn pre_step(&mut self, _info: &StepInfo) {
            self.steps.set(self.steps.get() + 1);
        }
        fn post_step(&mut self, result: &StepResult) {
            self.max_stack_seen
                .set(self.max_stack_seen.get().max(result.stack.len()));
            assert!(result.memory.len() <= 8, "memory snapshot exceeds cap");
        }
        fn finalize(&mut self, outcome: &FrameOutcome) {
            assert!(!outcome.failed);
            self.finalized.set(self.finalized.get() + 1);
        }
    }

    let counter = Counter::default();
    let steps = Rc::clone(&counter.steps);
    let finalized = Rc::clone(&counter.finalized);
    let max_stack_seen = Rc::clone(&counter.max_stack_seen);

    let mut host = host_with_contract(&[
        Operation::Push((1, U256::one())),
        Operation::Push((1, U256::from(2))),
        Operation::Push((1, U256::from(3))),
        Operation::Add,
        Operation::Stop,
    ]);
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host).with_tracer(Box::new(counter));
    vm.execute(CallRequest::transaction(
        sender(),
        contract_address(),
        100_000,
        Bytes::new(),
    ))
    .unwrap();

    assert_eq!(steps.get(), 5);
    assert_eq!(finalized.get(), 1);
    // The snapshot cap bounded the copy even though 3 values were live.
    assert_eq!(max_stack_seen.get(), 2);
}

// ==================== Reports ====================

#[test]
fn reports_serialize_to_json() {
    let mut host = host_with_contract(&[Operation::Stop]);
    let report = execute(&mut host, 100_000);
    let encoded = serde_json::to_string(&report).unwrap();
    assert!(encoded.contains("\"Success\""));
}

#[test]
fn instruction_budget_raises_out_of_gas() {
    // An infinite loop: JUMPDEST, PUSH1 0, JUMP.
    let ops = [
        Operation::Jumpdest,
        Operation::Push((1, U256::zero())),
        Operation::Jump,
    ];
    let mut host = host_with_contract(&ops);
    let env = Environment {
        fork: Fork::Cancun,
        origin: sender(),
        ..Default::default()
    };
    let mut vm = Vm::new(env, &mut host);
    vm.set_instruction_budget(1_000);
    let report = vm
        .execute(CallRequest::transaction(
            sender(),
            contract_address(),
            u64::MAX / 2,
            Bytes::new(),
        ))
        .unwrap();
    assert_eq!(report.result, TxResult::Halt(ExceptionalHalt::OutOfGas));
}

#[test]
fn unknown_opcode_is_invalid() {
    let code = Bytes::from_static(&[0x0C]);
    let mut host = InMemoryHost::new();
    host.add_account(contract_address(), Account::with_code(code));
    let report = execute(&mut host, 50_000);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::InvalidOpcode)
    );
    assert_eq!(report.gas_used, 50_000);
}

#[test]
fn push0_is_rejected_before_shanghai() {
    let code = Bytes::from_static(&[0x5F, 0x00]);
    let mut host = InMemoryHost::new();
    host.add_account(contract_address(), Account::with_code(code));
    let report = execute_on(&mut host, 50_000, Fork::London);
    assert_eq!(
        report.result,
        TxResult::Halt(ExceptionalHalt::InvalidOpcode)
    );

    let mut host = InMemoryHost::new();
    host.add_account(
        contract_address(),
        Account::with_code(Bytes::from_static(&[0x5F, 0x00])),
    );
    let report = execute_on(&mut host, 50_000, Fork::Shanghai);
    assert_eq!(report.result, TxResult::Success);
}

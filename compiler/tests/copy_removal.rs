// Integration tests for redundant copy removal.

mod common;

use aiec::builder::Builder;
use aiec::copy_removal::remove_redundant_copies;
use aiec::ir::{MemoryEffect, Module, OpKind, Type};
use common::{buf, count, function};

fn is_copy(k: &OpKind) -> bool {
    matches!(k, OpKind::Copy)
}

/// func f() -> memref { %a = alloc; write %a; %b = alloc; copy(%a, %b);
/// dealloc %a; return %b }
fn alloc_write_copy_return() -> Module {
    let mut m = Module::new();
    let body = function(&mut m, "f", vec![buf()]);
    let mut b = Builder::at_end(&mut m, body);
    let a = b.alloc(buf());
    b.generic("test.fill", MemoryEffect::Write, vec![a], vec![]);
    let bb = b.alloc(buf());
    b.copy(a, bb);
    b.dealloc(a);
    b.ret(vec![bb]);
    m
}

#[test]
fn copy_into_fresh_buffer_is_removed() {
    let mut m = alloc_write_copy_return();
    let result = remove_redundant_copies(&mut m);
    assert_eq!(result.reused_source, 1);
    assert_eq!(result.removed(), 1);

    let body = m.entry_block(m.lookup_symbol("f").unwrap(), 0).unwrap();
    let ops = m.block(body).ops.clone();
    let kinds: Vec<&str> = ops.iter().map(|&op| m.kind(op).mnemonic()).collect();
    assert_eq!(kinds, vec!["memref.alloc", "test.fill", "return"]);

    let a = m.result(ops[0], 0);
    assert_eq!(m.operand(ops[1], 0), a);
    assert_eq!(m.operand(ops[2], 0), a);
    assert!(m.verify().is_ok());
}

#[test]
fn second_run_is_a_no_op() {
    let mut m = alloc_write_copy_return();
    remove_redundant_copies(&mut m);
    let once = m.to_string();
    let again = remove_redundant_copies(&mut m);
    assert_eq!(again.removed(), 0);
    assert_eq!(m.to_string(), once);
}

#[test]
fn call_between_copy_and_dealloc_blocks_removal() {
    let mut m = Module::new();
    let body = function(&mut m, "f", vec![buf()]);
    let mut b = Builder::at_end(&mut m, body);
    let a = b.alloc(buf());
    let bb = b.alloc(buf());
    b.copy(a, bb);
    b.call("opaque", vec![], vec![]);
    b.dealloc(a);
    b.ret(vec![bb]);
    let before = m.to_string();

    let result = remove_redundant_copies(&mut m);
    assert_eq!(result.removed(), 0);
    assert_eq!(m.to_string(), before);
}

#[test]
fn nested_write_between_copy_and_dealloc_blocks_removal() {
    let mut m = Module::new();
    let body = function(&mut m, "f", vec![buf()]);
    let mut b = Builder::at_end(&mut m, body);
    let other = b.alloc(buf());
    let a = b.alloc(buf());
    let bb = b.alloc(buf());
    b.copy(a, bb);
    let (_, inner) = b.insert_with_body(
        OpKind::Generic {
            name: "scf.execute_region".into(),
            effect: MemoryEffect::Pure,
        },
        vec![],
        vec![],
    );
    b.dealloc(a);
    b.ret(vec![bb]);
    Builder::at_end(&mut m, inner).generic("test.fill", MemoryEffect::Write, vec![other], vec![]);

    assert_eq!(remove_redundant_copies(&mut m).removed(), 0);
    assert_eq!(count(&m, is_copy), 1);
}

#[test]
fn source_used_after_copy_blocks_removal() {
    let mut m = Module::new();
    let body = function(&mut m, "f", vec![buf()]);
    let mut b = Builder::at_end(&mut m, body);
    let a = b.alloc(buf());
    let bb = b.alloc(buf());
    b.copy(a, bb);
    let i = b.constant(0, Type::Index);
    b.load(a, vec![i], Type::I32);
    b.dealloc(a);
    b.ret(vec![bb]);

    assert_eq!(remove_redundant_copies(&mut m).removed(), 0);
}

#[test]
fn chained_copies_resolve_to_first_buffer() {
    // %a -> %b -> %c, each source freed right after its copy.
    let mut m = Module::new();
    let body = function(&mut m, "f", vec![buf()]);
    let mut b = Builder::at_end(&mut m, body);
    let a = b.alloc(buf());
    b.generic("test.fill", MemoryEffect::Write, vec![a], vec![]);
    let bb = b.alloc(buf());
    b.copy(a, bb);
    b.dealloc(a);
    let c = b.alloc(buf());
    b.copy(bb, c);
    b.dealloc(bb);
    let ret = b.ret(vec![c]);

    let result = remove_redundant_copies(&mut m);
    assert_eq!(result.removed(), 2);
    assert_eq!(count(&m, is_copy), 0);
    assert_eq!(count(&m, |k| matches!(k, OpKind::Alloc)), 1);
    assert_eq!(m.operand(ret, 0), a);
    assert!(m.verify().is_ok());
}

#[test]
fn copies_in_separate_functions_are_independent() {
    let mut m = alloc_write_copy_return();
    let body = function(&mut m, "g", vec![]);
    let mut b = Builder::at_end(&mut m, body);
    let x = b.alloc(buf());
    let y = b.alloc(buf());
    b.copy(x, y);
    b.call("opaque", vec![], vec![]);
    b.dealloc(x);
    b.ret(vec![]);

    let result = remove_redundant_copies(&mut m);
    assert_eq!(result.removed(), 1);
    assert_eq!(count(&m, is_copy), 1);
}

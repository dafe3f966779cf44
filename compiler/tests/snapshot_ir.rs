// Snapshot tests of printed IR after each pass.
//
// Inline snapshots: run `cargo insta review` after an intentional change to
// the printer or to a pass's output shape.

mod common;

use aiec::arch::{AieDevice, LockAction};
use aiec::builder::Builder;
use aiec::copy_removal::remove_redundant_copies;
use aiec::ir::{MemoryEffect, Module, Type};
use aiec::lower::{core_to_standard, CoreToStandardOptions};
use common::{buf, design, function};

#[test]
fn snapshot_lowered_core_with_buffer_and_locks() {
    let mut d = design(AieDevice::Xcvc1902);
    let t = d.tile(1, 1);
    let a = d.builder().buffer(t, "a", buf());
    let lock = d.builder().lock(t, 3, 0);
    d.core(t, |b| {
        b.use_lock(lock, LockAction::AcquireGreaterEqual, 1);
        let i = b.constant(0, Type::Index);
        let v = b.load(a, vec![i], Type::I32);
        b.debug(v);
        b.use_lock(lock, LockAction::Release, 0);
    });

    let result = core_to_standard(&mut d.module, &CoreToStandardOptions::default());
    assert!(result.cert.all_pass());

    insta::assert_snapshot!(d.module.to_string(), @r###"
module attributes {target_triple = "aie"} {
  memref.global "public" @a : memref<16xi32>
  func.func private @debug_i32(i32)
  func.func private @llvm.aie.event0()
  func.func private @llvm.aie.event1()
  func.func private @llvm.aie.put.ms(i32, i32)
  func.func private @llvm.aie.put.wms(i32, i128)
  func.func private @llvm.aie.put.fms(i32, f32)
  func.func private @llvm.aie.get.ss(i32) -> i32
  func.func private @llvm.aie.get.wss(i32) -> i128
  func.func private @llvm.aie.get.fss(i32) -> f32
  func.func private @llvm.aie.put.mcd(i384)
  func.func private @llvm.aie.get.scd() -> i384
  func.func private @llvm.aie.lock.acquire.reg(i32, i32)
  func.func private @llvm.aie.lock.release.reg(i32, i32)
  func.func private @llvm.aie2.acquire(i32, i32)
  func.func private @llvm.aie2.release(i32, i32)
  func.func @core_1_1() {
    %0 = arith.constant {value = 3} : i32
    %1 = arith.constant {value = -1} : i32
    func.call @llvm.aie.lock.acquire.reg(%0, %1)
    %2 = arith.constant {value = 0} : index
    %3 = memref.get_global @a : memref<16xi32>
    memref.assume_alignment(%3) {alignment = 32}
    %4 = memref.load(%3, %2) : i32
    func.call @debug_i32(%4)
    %5 = arith.constant {value = 3} : i32
    %6 = arith.constant {value = 0} : i32
    func.call @llvm.aie.lock.release.reg(%5, %6)
    return
  }
}
"###);
}

#[test]
fn snapshot_copy_removed() {
    let mut m = Module::new();
    let body = function(&mut m, "f", vec![buf()]);
    let mut b = Builder::at_end(&mut m, body);
    let a = b.alloc(buf());
    b.generic("test.fill", MemoryEffect::Write, vec![a], vec![]);
    let target = b.alloc(buf());
    b.copy(a, target);
    b.dealloc(a);
    b.ret(vec![target]);

    remove_redundant_copies(&mut m);

    insta::assert_snapshot!(m.to_string(), @r###"
module {
  func.func @f() -> memref<16xi32> {
    %0 = memref.alloc : memref<16xi32>
    test.fill(%0)
    return(%0)
  }
}
"###);
}

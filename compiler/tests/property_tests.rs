// Property-based tests for pass invariants.
//
// Three categories:
// 1. Lock naming and value encoding are pure functions of their inputs
// 2. Core selection: exactly the matching cores are outlined
// 3. Copy removal is idempotent and keeps generated functions well formed
//
// Uses proptest with explicit configuration to prevent CI flakiness.

mod common;

use aiec::arch::{lock_intrinsic_name, AieArch, AieDevice, LockAction};
use aiec::builder::Builder;
use aiec::copy_removal::remove_redundant_copies;
use aiec::ir::{MemoryEffect, Module, Type};
use aiec::lower::{core_to_standard, CoreToStandardOptions, TileSelector};
use aiec::topology::TileCoord;
use common::{buf, design, function, function_names};
use proptest::prelude::*;

fn arb_action() -> impl Strategy<Value = LockAction> {
    prop_oneof![
        Just(LockAction::Acquire),
        Just(LockAction::AcquireGreaterEqual),
        Just(LockAction::Release),
    ]
}

fn arb_arch() -> impl Strategy<Value = AieArch> {
    prop_oneof![Just(AieArch::Aie1), Just(AieArch::Aie2)]
}

// ── Lock encoding ───────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 100,
        .. ProptestConfig::default()
    })]

    #[test]
    fn acquire_ge_encodes_negation(value in any::<i32>()) {
        prop_assert_eq!(
            LockAction::AcquireGreaterEqual.encode_value(value),
            value.wrapping_neg()
        );
        prop_assert_eq!(LockAction::Acquire.encode_value(value), value);
        prop_assert_eq!(LockAction::Release.encode_value(value), value);
    }

    #[test]
    fn lock_name_depends_only_on_arch_and_direction(arch in arb_arch(), action in arb_action()) {
        let name = lock_intrinsic_name(arch, action);
        prop_assert_eq!(&name, &lock_intrinsic_name(arch, action));
        prop_assert_eq!(name.ends_with(".reg"), arch == AieArch::Aie1);
        prop_assert_eq!(name.contains("acquire"), action.is_acquire());
        prop_assert_eq!(name.contains("release"), !action.is_acquire());
    }
}

// ── Core selection ──────────────────────────────────────────────────────────

fn arb_coords() -> impl Strategy<Value = Vec<(i32, i32)>> {
    prop::collection::btree_set((0i32..4, 0i32..4), 1..6)
        .prop_map(|set| set.into_iter().collect())
}

fn arb_selector() -> impl Strategy<Value = TileSelector> {
    (-1i32..4, -1i32..4).prop_map(|(col, row)| TileSelector::new(col, row))
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn exactly_matching_cores_are_outlined(coords in arb_coords(), selector in arb_selector()) {
        let mut d = design(AieDevice::Xcvc1902);
        for &(col, row) in &coords {
            let t = d.tile(col, row);
            d.core(t, |b| {
                let v = b.constant(i64::from(col), Type::I32);
                b.debug(v);
            });
        }
        let options = CoreToStandardOptions { tile: selector, ..CoreToStandardOptions::default() };
        let result = core_to_standard(&mut d.module, &options);
        prop_assert!(!result.has_errors());

        let expected: Vec<String> = coords
            .iter()
            .filter(|&&(col, row)| selector.matches(TileCoord::new(col, row)))
            .map(|(col, row)| format!("core_{}_{}", col, row))
            .collect();
        prop_assert_eq!(function_names(&d.module), expected);
        prop_assert_eq!(result.stats.cores_outlined + result.stats.cores_discarded, coords.len());
        prop_assert!(result.cert.all_pass());
    }
}

// ── Copy removal ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Step {
    /// Allocate a fresh buffer.
    Alloc,
    /// Copy buffer i into buffer j.
    Copy(usize, usize),
    /// Free buffer i.
    Dealloc(usize),
    /// Write buffer i.
    Write(usize),
    /// Opaque call.
    Call,
}

fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    let step = prop_oneof![
        3 => Just(Step::Alloc),
        3 => (0usize..6, 0usize..6).prop_map(|(i, j)| Step::Copy(i, j)),
        2 => (0usize..6).prop_map(Step::Dealloc),
        2 => (0usize..6).prop_map(Step::Write),
        1 => Just(Step::Call),
    ];
    prop::collection::vec(step, 1..20)
}

/// Build a straight-line function from `steps`. Indices are taken modulo the
/// buffers allocated so far; a buffer is freed at most once.
fn build(steps: &[Step]) -> Module {
    let mut m = Module::new();
    let body = function(&mut m, "f", vec![]);
    let mut b = Builder::at_end(&mut m, body);
    let mut live = Vec::new();
    let mut freed = std::collections::HashSet::new();
    for step in steps {
        match *step {
            Step::Alloc => live.push(b.alloc(buf())),
            Step::Copy(i, j) if !live.is_empty() => {
                let (s, t) = (live[i % live.len()], live[j % live.len()]);
                if s != t {
                    b.copy(s, t);
                }
            }
            Step::Dealloc(i) if !live.is_empty() => {
                let v = live[i % live.len()];
                if freed.insert(v) {
                    b.dealloc(v);
                }
            }
            Step::Write(i) if !live.is_empty() => {
                let v = live[i % live.len()];
                b.generic("test.fill", MemoryEffect::Write, vec![v], vec![]);
            }
            Step::Call => {
                b.call("opaque", vec![], vec![]);
            }
            _ => {}
        }
    }
    b.ret(vec![]);
    m
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 200,
        .. ProptestConfig::default()
    })]

    #[test]
    fn copy_removal_is_idempotent(steps in arb_steps()) {
        let mut m = build(&steps);
        remove_redundant_copies(&mut m);
        let once = m.to_string();
        let again = remove_redundant_copies(&mut m);
        prop_assert_eq!(again.removed(), 0);
        prop_assert_eq!(m.to_string(), once);
    }

    #[test]
    fn copy_removal_leaves_no_dangling_operands(steps in arb_steps()) {
        let mut m = build(&steps);
        prop_assert!(m.verify().is_ok());
        remove_redundant_copies(&mut m);
        prop_assert!(m.verify().is_ok());
    }

    #[test]
    fn each_removed_copy_erases_three_operations(steps in arb_steps()) {
        let mut m = build(&steps);
        let before = m.walk().len();
        let result = remove_redundant_copies(&mut m);
        prop_assert_eq!(m.walk().len(), before - 3 * result.removed());
    }
}

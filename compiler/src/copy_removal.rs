// copy_removal.rs — Redundant allocation/copy/deallocation elimination
//
// Bufferization leaves sequences where a fresh buffer is allocated only to
// receive a copy of another buffer that is freed right after. Each `memref.copy`
// is matched against two rewrites, in order:
//
//   (a) reuse source as target: the target's allocation, the copy and the
//       source's deallocation go away; uses of the target become the source.
//   (b) reuse target as source: the source's allocation, the copy and the
//       source's deallocation go away; uses of the source become the target.
//
// Preconditions: none.
// Postconditions: every match of a round was computed before that round
//   mutated anything; a second run finds nothing new.
// Failure modes: none. An unmatched copy is left as is.
// Side effects: mutates the module in place.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::id::{BlockId, OpId, ValueId};
use crate::ir::{MemoryEffect, Module, OpKind, UseMap};

/// Counts of copies removed by each rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyRemovalResult {
    pub reused_source: usize,
    pub reused_target: usize,
}

impl CopyRemovalResult {
    pub fn removed(&self) -> usize {
        self.reused_source + self.reused_target
    }
}

/// Eliminate redundant copies in the whole module.
///
/// Each round detects on an unmodified snapshot and then applies. A match
/// rejected for overlapping an earlier one in the same round can become valid
/// once that round is applied, so rounds repeat until a walk finds nothing.
pub fn remove_redundant_copies(module: &mut Module) -> CopyRemovalResult {
    let mut result = CopyRemovalResult::default();
    let mut rounds = 0usize;
    loop {
        let plan = CopyRemovalPlan::detect(module);
        if plan.stats.removed() == 0 {
            break;
        }
        rounds += 1;
        result.reused_source += plan.stats.reused_source;
        result.reused_target += plan.stats.reused_target;
        plan.apply(module);
    }
    info!(
        reused_source = result.reused_source,
        reused_target = result.reused_target,
        rounds,
        "copy removal finished"
    );
    result
}

// ── Detection ───────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct CopyRemovalPlan {
    /// (from, to): uses of `from` become `to`.
    replacements: Vec<(ValueId, ValueId)>,
    /// In scheduling order.
    erase: Vec<OpId>,
    scheduled: HashSet<OpId>,
    stats: CopyRemovalResult,
}

/// One matched copy.
struct Match {
    from: ValueId,
    to: ValueId,
    erase: [OpId; 3],
}

impl CopyRemovalPlan {
    fn detect(module: &Module) -> Self {
        let mut plan = CopyRemovalPlan::default();
        let uses = UseMap::build(module);
        for copy in module.walk_kind(|k| matches!(k, OpKind::Copy)) {
            if plan.scheduled.contains(&copy) {
                continue;
            }
            if let Some(m) = reuse_source_as_target(module, &uses, copy) {
                if plan.schedule(m) {
                    plan.stats.reused_source += 1;
                    debug!(%copy, "copy removed, source reused as target");
                    continue;
                }
            }
            if let Some(m) = reuse_target_as_source(module, &uses, copy) {
                if plan.schedule(m) {
                    plan.stats.reused_target += 1;
                    debug!(%copy, "copy removed, target reused as source");
                }
            }
        }
        plan
    }

    /// Record a match unless it would remove an operation twice.
    fn schedule(&mut self, m: Match) -> bool {
        if m.erase.iter().any(|op| self.scheduled.contains(op)) {
            return false;
        }
        self.replacements.push((m.from, m.to));
        for op in m.erase {
            self.scheduled.insert(op);
            self.erase.push(op);
        }
        true
    }

    fn apply(self, module: &mut Module) {
        let map: HashMap<ValueId, ValueId> = self.replacements.iter().copied().collect();
        for &(from, _) in &self.replacements {
            module.replace_all_uses(from, resolve(from, &map));
        }
        for op in self.erase {
            if module.is_live(op) {
                module.erase_op(op);
            }
        }
    }
}

/// Follow the replacement chain from `v` to its final value.
fn resolve(v: ValueId, map: &HashMap<ValueId, ValueId>) -> ValueId {
    let mut current = v;
    // Each step visits a distinct key unless the chain cycles.
    for _ in 0..=map.len() {
        match map.get(&current) {
            Some(&next) if next != current => current = next,
            _ => break,
        }
    }
    current
}

// ── Block-local queries ─────────────────────────────────────────────────────

fn copy_operands(module: &Module, copy: OpId) -> Option<(ValueId, ValueId)> {
    match module.op(copy).operands.as_slice() {
        [source, target, ..] => Some((*source, *target)),
        _ => None,
    }
}

/// The allocation defining `v`, if it sits directly in `block`.
fn allocation_in_block(module: &Module, v: ValueId, block: BlockId) -> Option<OpId> {
    let op = module.defining_op(v)?;
    (module.parent_block(op) == Some(block)
        && module.kind(op).memory_effect() == MemoryEffect::Allocate)
        .then_some(op)
}

/// The first deallocation of `v` directly in `block`.
fn deallocation_in_block(
    module: &Module,
    uses: &UseMap,
    v: ValueId,
    block: BlockId,
) -> Option<OpId> {
    uses.users(v).iter().map(|&(op, _)| op).find(|&op| {
        module.parent_block(op) == Some(block)
            && module.kind(op).memory_effect() == MemoryEffect::Free
    })
}

/// True if `v` is used strictly between `start` and `end` in their block.
/// A use nested in an operation's regions counts at that operation.
fn has_users_between(
    module: &Module,
    uses: &UseMap,
    v: ValueId,
    start: OpId,
    end: OpId,
) -> bool {
    let Some(block) = module.parent_block(start) else {
        return false;
    };
    uses.users(v).iter().any(|&(user, _)| {
        module
            .ancestor_in_block(user, block)
            .map(|at| module.is_before_in_block(start, at) && module.is_before_in_block(at, end))
            .unwrap_or(false)
    })
}

fn clobbers(module: &Module, op: OpId) -> bool {
    module.kind(op).memory_effect().may_clobber()
        || module
            .walk_nested(op)
            .into_iter()
            .any(|inner| module.kind(inner).memory_effect().may_clobber())
}

/// True if an operation strictly between `start` and `end` may write or free
/// memory.
fn has_clobber_between(module: &Module, start: OpId, end: OpId) -> bool {
    let (Some(block), Some(from), Some(to)) = (
        module.parent_block(start),
        module.position_in_block(start),
        module.position_in_block(end),
    ) else {
        return true;
    };
    if from >= to {
        return true;
    }
    module.block(block).ops[from + 1..to]
        .iter()
        .any(|&op| clobbers(module, op))
}

// ── Rules ───────────────────────────────────────────────────────────────────

fn reuse_source_as_target(module: &Module, uses: &UseMap, copy: OpId) -> Option<Match> {
    let (from, to) = copy_operands(module, copy)?;
    let block = module.parent_block(copy)?;
    let to_alloc = allocation_in_block(module, to, block)?;
    let from_free = deallocation_in_block(module, uses, from, block)?;
    if !module.is_before_in_block(copy, from_free)
        || has_users_between(module, uses, to, to_alloc, copy)
        || has_users_between(module, uses, from, copy, from_free)
        || has_clobber_between(module, copy, from_free)
    {
        return None;
    }
    Some(Match {
        from: to,
        to: from,
        erase: [copy, to_alloc, from_free],
    })
}

fn reuse_target_as_source(module: &Module, uses: &UseMap, copy: OpId) -> Option<Match> {
    let (from, to) = copy_operands(module, copy)?;
    let block = module.parent_block(copy)?;
    let from_alloc = allocation_in_block(module, from, block)?;
    let from_free = deallocation_in_block(module, uses, from, block)?;
    if !module.is_before_in_block(copy, from_free)
        || !defined_before(module, to, from_alloc)
        || has_users_between(module, uses, to, from_alloc, copy)
        || has_users_between(module, uses, from, copy, from_free)
        || has_clobber_between(module, copy, from_free)
    {
        return None;
    }
    Some(Match {
        from,
        to,
        erase: [copy, from_alloc, from_free],
    })
}

/// True if `v` is available at `op`: a block argument, defined in another
/// (enclosing) block, or defined earlier in `op`'s block.
fn defined_before(module: &Module, v: ValueId, op: OpId) -> bool {
    match module.defining_op(v) {
        None => true,
        Some(def) if module.parent_block(def) == module.parent_block(op) => {
            module.is_before_in_block(def, op)
        }
        Some(_) => true,
    }
}

// lower.rs — Hardware-to-host lowering (core-to-standard)
//
// Rewrites every hardware-dialect instruction into a call to a declared
// intrinsic, a module-level global, or an outlined function, then strips the
// declarative scaffolding. Runs in a fixed order:
//
//   0. check there is exactly one device, set the target triple, declare the
//      intrinsic catalogue, index the topology
//   1. rewrite leaf hardware instructions (stop at the first failure)
//   2. outline selected cores into `core_<col>_<row>` functions, discard the rest
//   3. hoist functions and globals out of the device
//   4. report residual hardware instructions, erase the container catalogue
//
// Preconditions: none; a malformed module is reported, not assumed.
// Postconditions: on success the module holds only functions, globals and
//   architecture-neutral instructions (plus any reported residue), and the
//   target triple names the device's generation.
// Failure modes: E0100 (device count), E0101 (missing intrinsic), E0102 (lock
//   use outside a device), E0103 (dangling operand after lowering). Earlier
//   rewrites are not rolled back.
// Side effects: mutates the module in place.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::arch::{lock_intrinsic_name, AieArch, AieDevice, LockAction};
use crate::builder::Builder;
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::id::{OpId, ValueId};
use crate::intrinsics::{
    event_name, get_stream_name, put_stream_name, IntrinsicCatalogue, DEBUG_I32, GET_CASCADE,
    PUT_CASCADE,
};
use crate::ir::{FuncType, InsertPoint, Module, OpKind, StreamKind, Type, UseMap};
use crate::topology::{TileCoord, TopologyIndex};

/// Alignment promised for every promoted buffer.
pub const BUFFER_ALIGNMENT: u32 = 32;

// ── Options ─────────────────────────────────────────────────────────────────

/// Which cores to outline. `-1` in a coordinate matches any value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSelector {
    pub col: i32,
    pub row: i32,
}

impl TileSelector {
    pub const ALL: TileSelector = TileSelector { col: -1, row: -1 };

    pub fn new(col: i32, row: i32) -> Self {
        Self { col, row }
    }

    pub fn matches(&self, coord: TileCoord) -> bool {
        (self.col == -1 || self.col == coord.col) && (self.row == -1 || self.row == coord.row)
    }
}

impl Default for TileSelector {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoreToStandardOptions {
    pub tile: TileSelector,
    /// Declarations bootstrapped before rewriting.
    pub catalogue: IntrinsicCatalogue,
}

// ── Output types ────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LowerError {
    #[error("expected exactly one aie.device, found {count}")]
    Structural { count: usize },
    #[error("intrinsic `{name}` required by {op} is not declared")]
    MissingIntrinsic { name: String, op: OpId },
    #[error("lock use {op} has no enclosing aie.device")]
    UnresolvedParent { op: OpId },
}

impl LowerError {
    pub fn code(&self) -> DiagCode {
        match self {
            LowerError::Structural { .. } => codes::E0100,
            LowerError::MissingIntrinsic { .. } => codes::E0101,
            LowerError::UnresolvedParent { .. } => codes::E0102,
        }
    }

    pub fn op(&self) -> Option<OpId> {
        match self {
            LowerError::Structural { .. } => None,
            LowerError::MissingIntrinsic { op, .. } | LowerError::UnresolvedParent { op } => {
                Some(*op)
            }
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.op(), self.to_string()).with_code(self.code());
        match self {
            LowerError::Structural { .. } => {
                diag.with_hint("a compilation unit must hold one aie.device")
            }
            LowerError::MissingIntrinsic { .. } => {
                diag.with_hint("add the intrinsic to the catalogue passed to the pass")
            }
            LowerError::UnresolvedParent { .. } => diag,
        }
    }
}

/// Counters describing what the pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LowerStats {
    pub intrinsics_declared: usize,
    pub calls_emitted: usize,
    pub buffers_promoted: usize,
    pub cores_outlined: usize,
    pub cores_discarded: usize,
    pub containers_erased: usize,
}

/// Machine-checkable evidence for the C1-C5 obligations on the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cert {
    /// C1: The target triple is set.
    pub c1_triple_set: bool,
    /// C2: No device remains.
    pub c2_no_device: bool,
    /// C3: Every selected core produced a function.
    pub c3_cores_outlined: bool,
    /// C4: No hardware instruction remains.
    pub c4_no_hardware: bool,
    /// C5: The module verifies structurally.
    pub c5_verifies: bool,
}

impl Cert {
    pub fn all_pass(&self) -> bool {
        self.c1_triple_set
            && self.c2_no_device
            && self.c3_cores_outlined
            && self.c4_no_hardware
            && self.c5_verifies
    }
}

pub struct LowerResult {
    pub cert: Cert,
    pub stats: LowerStats,
    pub diagnostics: Vec<Diagnostic>,
}

impl LowerResult {
    pub fn has_errors(&self) -> bool {
        crate::diag::has_errors(&self.diagnostics)
    }
}

// ── Per-kind planning ───────────────────────────────────────────────────────

/// Hardware leaf instructions with a rewrite rule.
#[derive(Debug, Clone, PartialEq)]
enum HwOp {
    Debug { value: ValueId },
    PutStream { channel: ValueId, value: ValueId },
    GetStream { channel: ValueId, result: ValueId },
    PutCascade { value: ValueId },
    GetCascade { result: ValueId },
    UseLock { lock: ValueId, action: LockAction, value: i32 },
    Event { id: i32 },
    Buffer { name: String, result: ValueId },
}

impl HwOp {
    fn classify(module: &Module, op: OpId) -> Option<HwOp> {
        let operation = module.op(op);
        let operand = |i: usize| operation.operands.get(i).copied();
        let result = || operation.results.first().copied();
        match &operation.kind {
            OpKind::Debug => Some(HwOp::Debug { value: operand(0)? }),
            OpKind::PutStream => Some(HwOp::PutStream {
                channel: operand(0)?,
                value: operand(1)?,
            }),
            OpKind::GetStream => Some(HwOp::GetStream {
                channel: operand(0)?,
                result: result()?,
            }),
            OpKind::PutCascade => Some(HwOp::PutCascade { value: operand(0)? }),
            OpKind::GetCascade => Some(HwOp::GetCascade { result: result()? }),
            OpKind::UseLock { action, value } => Some(HwOp::UseLock {
                lock: operand(0)?,
                action: *action,
                value: *value,
            }),
            OpKind::Event { id } => Some(HwOp::Event { id: *id }),
            OpKind::Buffer { name } => Some(HwOp::Buffer {
                name: name.clone(),
                result: result()?,
            }),
            _ => None,
        }
    }
}

/// How a call argument is materialized.
#[derive(Debug, Clone, PartialEq)]
enum ArgSpec {
    Value(ValueId),
    ConstI32(i32),
    /// `arith.index_cast` of the value to `i32`.
    IndexCast(ValueId),
}

#[derive(Debug, Clone, PartialEq)]
enum Rewrite {
    Erase,
    Call {
        callee: String,
        args: Vec<ArgSpec>,
        /// Original result and the call's result type.
        result: Option<(ValueId, Type)>,
    },
    PromoteBuffer {
        name: String,
        ty: Type,
        uses: Vec<(OpId, usize)>,
    },
}

fn require(module: &Module, name: &str, op: OpId) -> Result<String, LowerError> {
    match module.lookup_symbol(name) {
        Some(_) => Ok(name.to_string()),
        None => Err(LowerError::MissingIntrinsic {
            name: name.to_string(),
            op,
        }),
    }
}

fn is_device(kind: &OpKind) -> bool {
    matches!(kind, OpKind::Device { .. })
}

/// Decide the rewrite for one instruction without touching the module.
fn plan_rewrite(
    module: &Module,
    uses: &UseMap,
    op: OpId,
    hw: &HwOp,
) -> Result<Rewrite, LowerError> {
    let call = |name: &str,
                args: Vec<ArgSpec>,
                result: Option<(ValueId, Type)>|
     -> Result<Rewrite, LowerError> {
        Ok(Rewrite::Call {
            callee: require(module, name, op)?,
            args,
            result,
        })
    };
    match hw {
        HwOp::Debug { value } => call(DEBUG_I32, vec![ArgSpec::Value(*value)], None),
        HwOp::PutStream { channel, value } => {
            let kind = StreamKind::of_type(module.value_type(*value));
            call(
                put_stream_name(kind),
                vec![ArgSpec::Value(*channel), ArgSpec::Value(*value)],
                None,
            )
        }
        HwOp::GetStream { channel, result } => {
            let kind = StreamKind::of_type(module.value_type(*result));
            call(
                get_stream_name(kind),
                vec![ArgSpec::Value(*channel)],
                Some((*result, kind.value_type())),
            )
        }
        HwOp::PutCascade { value } => call(PUT_CASCADE, vec![ArgSpec::Value(*value)], None),
        HwOp::GetCascade { result } => call(GET_CASCADE, vec![], Some((*result, Type::I384))),
        HwOp::Event { id } => call(&event_name(*id), vec![], None),
        HwOp::UseLock {
            lock,
            action,
            value,
        } => {
            if module.parent_op(op).map(|p| is_device(module.kind(p))) == Some(true) {
                return Ok(Rewrite::Erase);
            }
            let device = module
                .enclosing(op, is_device)
                .ok_or(LowerError::UnresolvedParent { op })?;
            let arch = match module.kind(device) {
                OpKind::Device { part } => part.arch(),
                _ => return Err(LowerError::UnresolvedParent { op }),
            };
            let lock_id = match module.defining_op(*lock).map(|d| module.kind(d)) {
                Some(OpKind::Lock { id, .. }) => ArgSpec::ConstI32(*id),
                _ => ArgSpec::IndexCast(*lock),
            };
            call(
                &lock_intrinsic_name(arch, *action),
                vec![lock_id, ArgSpec::ConstI32(action.encode_value(*value))],
                None,
            )
        }
        HwOp::Buffer { name, result } => Ok(Rewrite::PromoteBuffer {
            name: name.clone(),
            ty: module.value_type(*result).clone(),
            uses: uses.users(*result).to_vec(),
        }),
    }
}

/// Containers and declarations erased in the final sweep.
fn is_erasable(kind: &OpKind) -> bool {
    match kind {
        OpKind::Device { .. }
        | OpKind::Tile { .. }
        | OpKind::Flow { .. }
        | OpKind::Mem
        | OpKind::ShimDma
        | OpKind::ShimMux
        | OpKind::ShimDmaAllocation { .. }
        | OpKind::Switchbox
        | OpKind::Lock { .. }
        | OpKind::Buffer { .. }
        | OpKind::ExternalBuffer { .. } => true,
        OpKind::Core
        | OpKind::Connect { .. }
        | OpKind::PacketFlow { .. }
        | OpKind::ObjectFifo { .. }
        | OpKind::DmaStart { .. }
        | OpKind::DmaBd { .. }
        | OpKind::NextBd
        | OpKind::End
        | OpKind::UseLock { .. }
        | OpKind::PutStream
        | OpKind::GetStream
        | OpKind::PutCascade
        | OpKind::GetCascade
        | OpKind::Debug
        | OpKind::Event { .. }
        | OpKind::Func { .. }
        | OpKind::Return
        | OpKind::Call { .. }
        | OpKind::Global { .. }
        | OpKind::GetGlobal { .. }
        | OpKind::AssumeAlignment { .. }
        | OpKind::Constant { .. }
        | OpKind::IndexCast
        | OpKind::Alloc
        | OpKind::Dealloc
        | OpKind::Copy
        | OpKind::Load
        | OpKind::Store
        | OpKind::Generic { .. } => false,
    }
}

pub fn core_function_name(coord: TileCoord) -> String {
    format!("core_{}_{}", coord.col, coord.row)
}

// ── Public entry point ──────────────────────────────────────────────────────

/// Lower the hardware dialect in `module` to architecture-neutral form.
pub fn core_to_standard(module: &mut Module, options: &CoreToStandardOptions) -> LowerResult {
    let mut engine = LowerEngine {
        module,
        options,
        stats: LowerStats::default(),
        diagnostics: Vec::new(),
        selected: Vec::new(),
    };

    if let Err(err) = engine.run() {
        engine.diagnostics.push(err.to_diagnostic());
    }
    let cert = engine.verify_obligations();

    info!(
        calls = engine.stats.calls_emitted,
        buffers = engine.stats.buffers_promoted,
        cores_outlined = engine.stats.cores_outlined,
        cores_discarded = engine.stats.cores_discarded,
        erased = engine.stats.containers_erased,
        ok = cert.all_pass(),
        "core-to-standard finished"
    );

    LowerResult {
        cert,
        stats: engine.stats,
        diagnostics: engine.diagnostics,
    }
}

// ── Lowering engine ─────────────────────────────────────────────────────────

struct LowerEngine<'a> {
    module: &'a mut Module,
    options: &'a CoreToStandardOptions,
    stats: LowerStats,
    diagnostics: Vec<Diagnostic>,
    /// Cores the selector picked, by coordinate.
    selected: Vec<TileCoord>,
}

impl<'a> LowerEngine<'a> {
    fn run(&mut self) -> Result<(), LowerError> {
        let (device, part) = self.single_device()?;
        let arch = part.arch();
        self.module.target_triple = Some(arch.triple().to_string());
        self.stats.intrinsics_declared = self.options.catalogue.declare_all(self.module);
        debug!(
            %arch,
            declared = self.stats.intrinsics_declared,
            "intrinsic catalogue declared"
        );

        let index = TopologyIndex::build(self.module, device);
        for &coord in index.duplicates() {
            let tile = index.tile(coord);
            self.diagnostics.push(
                Diagnostic::warning(tile, format!("tile {} is declared more than once", coord))
                    .with_code(codes::W0101)
                    .with_related(device, "in this device"),
            );
        }

        self.rewrite_leaf_ops()?;
        self.outline_cores(device, &index, arch);
        self.hoist_symbols(device);
        self.erase_scaffolding();
        Ok(())
    }

    fn single_device(&self) -> Result<(OpId, AieDevice), LowerError> {
        let devices = self.module.walk_kind(is_device);
        match (devices.as_slice(), devices.first().map(|&d| self.module.kind(d))) {
            ([device], Some(OpKind::Device { part })) => Ok((*device, *part)),
            _ => Err(LowerError::Structural {
                count: devices.len(),
            }),
        }
    }

    // ── Phase 1: leaf instructions ──────────────────────────────────────

    fn rewrite_leaf_ops(&mut self) -> Result<(), LowerError> {
        let candidates: Vec<OpId> = self.module.walk();
        let mut uses = UseMap::build(self.module);
        for op in candidates {
            if !self.module.is_live(op) {
                continue;
            }
            let Some(hw) = HwOp::classify(self.module, op) else {
                continue;
            };
            let rewrite = plan_rewrite(self.module, &uses, op, &hw)?;
            self.apply(&mut uses, op, rewrite);
        }
        Ok(())
    }

    /// Perform `rewrite` and keep `uses` in step with every operand change.
    fn apply(&mut self, uses: &mut UseMap, op: OpId, rewrite: Rewrite) {
        match rewrite {
            Rewrite::Erase => {
                debug!(%op, "lock use at device scope erased");
            }
            Rewrite::Call {
                callee,
                args,
                result,
            } => {
                let mut b = Builder::new(self.module, InsertPoint::Before(op));
                let mut casts = Vec::new();
                let values: Vec<ValueId> = args
                    .into_iter()
                    .map(|arg| match arg {
                        ArgSpec::Value(v) => v,
                        ArgSpec::ConstI32(c) => b.constant(i64::from(c), Type::I32),
                        ArgSpec::IndexCast(v) => {
                            let cast = b.index_cast(v, Type::I32);
                            casts.push(cast);
                            cast
                        }
                    })
                    .collect();
                let result_types = result.iter().map(|(_, ty)| ty.clone()).collect();
                let call = b.call(&callee, values, result_types);
                for cast in casts {
                    if let Some(def) = self.module.defining_op(cast) {
                        uses.record(self.module, def);
                    }
                }
                uses.record(self.module, call);
                if let Some((old, _)) = result {
                    let new = self.module.result(call, 0);
                    self.module.replace_all_uses(old, new);
                    uses.replace_all_uses(old, new);
                }
                self.stats.calls_emitted += 1;
                debug!(%op, %callee, "rewritten to intrinsic call");
            }
            Rewrite::PromoteBuffer {
                name,
                ty,
                uses: users,
            } => {
                let body = self.module.body();
                Builder::new(self.module, InsertPoint::BlockStart(body)).global(&name, ty.clone());
                for &(user, index) in &users {
                    let mut b = Builder::new(self.module, InsertPoint::Before(user));
                    let global = b.get_global(&name, ty.clone());
                    let align = b.assume_alignment(global, BUFFER_ALIGNMENT);
                    uses.record(self.module, align);
                    uses.forget(self.module, user);
                    self.module.set_operand(user, index, global);
                    uses.record(self.module, user);
                }
                self.stats.buffers_promoted += 1;
                debug!(%op, %name, uses = users.len(), "buffer promoted to global");
            }
        }
        uses.forget(self.module, op);
        self.module.erase_op(op);
    }

    // ── Phase 2: cores ──────────────────────────────────────────────────

    fn outline_cores(&mut self, device: OpId, index: &TopologyIndex, arch: AieArch) {
        let mut anchor = device;
        for (coord, core) in index.cores() {
            if !self.module.is_live(core) {
                continue;
            }
            if !self.options.tile.matches(coord) {
                debug!(%coord, "core discarded");
                self.module.erase_op(core);
                self.stats.cores_discarded += 1;
                continue;
            }
            self.selected.push(coord);
            anchor = self.outline_core(core, coord, anchor);
            self.stats.cores_outlined += 1;
            debug!(%coord, %arch, "core outlined");
        }
    }

    /// Clone the core body into a fresh function placed after `anchor`;
    /// returns the function.
    fn outline_core(&mut self, core: OpId, coord: TileCoord, anchor: OpId) -> OpId {
        let func = self.module.create_op(
            OpKind::Func {
                name: core_function_name(coord),
                ty: FuncType::new(vec![], vec![]),
                private: false,
            },
            vec![],
            vec![],
            1,
        );
        self.module.insert_op(func, InsertPoint::After(anchor));

        let dst = self.module.op(func).regions[0];
        if let Some(&src) = self.module.op(core).regions.first() {
            let mut mapper = HashMap::new();
            self.module.clone_region_into(src, dst, &mut mapper);
        }

        let ends: Vec<OpId> = self
            .module
            .walk_nested(func)
            .into_iter()
            .filter(|&op| matches!(self.module.kind(op), OpKind::End))
            .collect();
        for end in ends {
            Builder::new(self.module, InsertPoint::Before(end)).ret(vec![]);
            self.module.erase_op(end);
        }

        self.module.erase_op(core);
        func
    }

    // ── Phase 3: hoisting ───────────────────────────────────────────────

    fn hoist_symbols(&mut self, device: OpId) {
        let Some(body) = self.module.entry_block(device, 0) else {
            return;
        };
        let symbols: Vec<OpId> = self
            .module
            .block(body)
            .ops
            .iter()
            .copied()
            .filter(|&op| self.module.kind(op).defines_symbol())
            .collect();
        for op in symbols {
            self.module.move_before(op, device);
        }
    }

    // ── Phase 4: scaffolding ────────────────────────────────────────────

    /// A hardware instruction is residual if no erasable container other than
    /// the device would take it away.
    fn is_residual(&self, op: OpId) -> bool {
        let kind = self.module.kind(op);
        kind.is_hardware()
            && !is_erasable(kind)
            && self
                .module
                .enclosing(op, |k| is_erasable(k) && !is_device(k))
                .is_none()
    }

    fn erase_scaffolding(&mut self) {
        let residual: Vec<OpId> = self
            .module
            .walk()
            .into_iter()
            .filter(|&op| self.is_residual(op))
            .collect();
        for op in residual {
            let mnemonic = self.module.kind(op).mnemonic().to_string();
            let inside_device = self.module.enclosing(op, is_device).is_some();
            warn!(%op, %mnemonic, inside_device, "hardware instruction has no lowering rule");
            let message = if inside_device {
                format!("`{}` has no lowering rule and is dropped with its device", mnemonic)
            } else {
                format!("`{}` has no lowering rule and is left in place", mnemonic)
            };
            self.diagnostics
                .push(Diagnostic::warning(Some(op), message).with_code(codes::W0100));
        }

        for op in self.module.walk_kind(is_erasable) {
            if self.module.is_live(op) {
                self.module.erase_op(op);
                self.stats.containers_erased += 1;
            }
        }
    }

    // ── Obligations ─────────────────────────────────────────────────────

    fn verify_obligations(&mut self) -> Cert {
        let c1 = self.module.target_triple.is_some();
        let c2 = self.module.walk_kind(is_device).is_empty();
        let c3 = self
            .selected
            .iter()
            .all(|&coord| self.module.lookup_symbol(&core_function_name(coord)).is_some());
        let c4 = self
            .module
            .walk()
            .into_iter()
            .all(|op| !self.module.kind(op).is_hardware());
        let c5 = match self.module.verify() {
            Ok(()) => true,
            Err(err) => {
                if !crate::diag::has_errors(&self.diagnostics) {
                    self.diagnostics.push(
                        Diagnostic::error(None, format!("lowered module is malformed: {}", err))
                            .with_code(codes::E0103),
                    );
                }
                false
            }
        };
        Cert {
            c1_triple_set: c1,
            c2_no_device: c2,
            c3_cores_outlined: c3,
            c4_no_hardware: c4,
            c5_verifies: c5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(m: &Module, op: OpId, hw: &HwOp) -> Result<Rewrite, LowerError> {
        plan_rewrite(m, &UseMap::build(m), op, hw)
    }

    fn device_module(part: AieDevice) -> (Module, OpId, crate::id::BlockId) {
        let mut m = Module::new();
        let (device, body) = Builder::at_module_end(&mut m).device(part);
        (m, device, body)
    }

    #[test]
    fn selector_wildcards_are_per_coordinate() {
        let c = TileCoord::new(2, 3);
        assert!(TileSelector::ALL.matches(c));
        assert!(TileSelector::new(2, -1).matches(c));
        assert!(TileSelector::new(-1, 3).matches(c));
        assert!(TileSelector::new(2, 3).matches(c));
        assert!(!TileSelector::new(2, 4).matches(c));
        assert!(!TileSelector::new(1, -1).matches(c));
    }

    #[test]
    fn lock_plan_negates_acquire_ge() {
        let (mut m, _, body) = device_module(AieDevice::Xcvc1902);
        IntrinsicCatalogue::standard().declare_all(&mut m);
        let mut b = Builder::at_end(&mut m, body);
        let tile = b.tile(1, 1);
        let lock = b.lock(tile, 5, 0);
        let (_, core_body) = b.core(tile);
        let use_lock =
            Builder::at_end(&mut m, core_body).use_lock(lock, LockAction::AcquireGreaterEqual, 2);

        let hw = HwOp::classify(&m, use_lock).unwrap();
        let plan = plan(&m, use_lock, &hw).unwrap();
        assert_eq!(
            plan,
            Rewrite::Call {
                callee: "llvm.aie.lock.acquire.reg".into(),
                args: vec![ArgSpec::ConstI32(5), ArgSpec::ConstI32(-2)],
                result: None,
            }
        );
    }

    #[test]
    fn lock_use_at_device_scope_is_erased() {
        let (mut m, _, body) = device_module(AieDevice::Npu);
        let mut b = Builder::at_end(&mut m, body);
        let tile = b.tile(0, 2);
        let lock = b.lock(tile, 0, 1);
        let use_lock = b.use_lock(lock, LockAction::Release, 1);
        let hw = HwOp::classify(&m, use_lock).unwrap();
        assert_eq!(plan(&m, use_lock, &hw), Ok(Rewrite::Erase));
    }

    #[test]
    fn lock_use_outside_device_is_unresolved() {
        let mut m = Module::new();
        let mut b = Builder::at_module_end(&mut m);
        let tile = b.tile(0, 2);
        let lock = b.lock(tile, 0, 1);
        let (_, fbody) = b.func("f", FuncType::new(vec![], vec![]));
        let use_lock = Builder::at_end(&mut m, fbody).use_lock(lock, LockAction::Acquire, 1);
        let hw = HwOp::classify(&m, use_lock).unwrap();
        assert_eq!(
            plan(&m, use_lock, &hw),
            Err(LowerError::UnresolvedParent { op: use_lock })
        );
    }

    #[test]
    fn stream_kind_selects_intrinsic() {
        let (mut m, _, body) = device_module(AieDevice::Xcvc1902);
        IntrinsicCatalogue::standard().declare_all(&mut m);
        let mut b = Builder::at_end(&mut m, body);
        let ch = b.constant(0, Type::I32);
        let wide = b.get_stream(ch, Type::I128);
        let float = b.constant(1, Type::F32);
        let put = b.put_stream(ch, float);
        let get = m.defining_op(wide).unwrap();

        let get_plan = plan(&m, get, &HwOp::classify(&m, get).unwrap()).unwrap();
        assert!(matches!(get_plan, Rewrite::Call { ref callee, .. } if callee == "llvm.aie.get.wss"));
        let put_plan = plan(&m, put, &HwOp::classify(&m, put).unwrap()).unwrap();
        assert!(matches!(put_plan, Rewrite::Call { ref callee, .. } if callee == "llvm.aie.put.fms"));
    }

    #[test]
    fn undeclared_event_is_missing() {
        let (mut m, _, body) = device_module(AieDevice::Xcvc1902);
        IntrinsicCatalogue::standard().declare_all(&mut m);
        let ev = Builder::at_end(&mut m, body).event(2);
        let err = plan(&m, ev, &HwOp::Event { id: 2 }).unwrap_err();
        assert_eq!(err.code(), codes::E0101);
        assert_eq!(err.op(), Some(ev));
    }

    #[test]
    fn erasable_catalogue() {
        assert!(is_erasable(&OpKind::Switchbox));
        assert!(is_erasable(&OpKind::ShimDmaAllocation { name: "s".into() }));
        assert!(!is_erasable(&OpKind::Core));
        assert!(!is_erasable(&OpKind::PacketFlow { id: 0 }));
    }

    #[test]
    fn structural_error_diagnostic() {
        let d = LowerError::Structural { count: 2 }.to_diagnostic();
        assert_eq!(d.code, Some(codes::E0100));
        assert!(d.op.is_none());
        assert!(d.message.contains("found 2"));
    }
}

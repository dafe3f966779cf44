// ir.rs — Program representation shared by the aiec passes
//
// An arena-based, MLIR-shaped IR: a module owns one top-level block; operations
// own regions, regions own blocks, blocks own an ordered list of operations and
// their block arguments. SSA values are operation results or block arguments.
//
// The module provides exactly the primitives the passes consume: create at an
// insertion point, erase (recursive), replace-all-uses, clone-region with a
// value mapping, symbol lookup, pre-order walks, move-before, user queries and
// in-block ordering. Both passes take `&mut Module` for their whole run.
//
// Invariants:
//   - A live operation appears in exactly one block's op list (or is detached
//     between `create_op` and `insert_op`).
//   - Erasing an operation tombstones it and everything nested in it; ids are
//     never reused.
//   - `verify` reports operands that refer to erased definitions.
//   - `from_json` only returns modules whose ids are in range and whose
//     containment links agree, so accessors never see a foreign id.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::arch::{AieDevice, LockAction};
use crate::id::{BlockId, OpId, RegionId, ValueId};

// ── Types ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    I1,
    I32,
    I128,
    I384,
    F32,
    Index,
    MemRef { shape: Vec<i64>, elem: Box<Type> },
    /// `!aie.tile`
    Tile,
    /// `!aie.lock`
    Lock,
}

impl Type {
    pub fn memref(shape: &[i64], elem: Type) -> Type {
        Type::MemRef {
            shape: shape.to_vec(),
            elem: Box::new(elem),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::I1 => write!(f, "i1"),
            Type::I32 => write!(f, "i32"),
            Type::I128 => write!(f, "i128"),
            Type::I384 => write!(f, "i384"),
            Type::F32 => write!(f, "f32"),
            Type::Index => write!(f, "index"),
            Type::MemRef { shape, elem } => {
                write!(f, "memref<")?;
                for dim in shape {
                    write!(f, "{}x", dim)?;
                }
                write!(f, "{}>", elem)
            }
            Type::Tile => write!(f, "!aie.tile"),
            Type::Lock => write!(f, "!aie.lock"),
        }
    }
}

/// Function signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncType {
    pub inputs: Vec<Type>,
    pub results: Vec<Type>,
}

impl FuncType {
    pub fn new(inputs: Vec<Type>, results: Vec<Type>) -> Self {
        Self { inputs, results }
    }
}

/// Value kind carried by a stream channel, derived from the value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    /// 32-bit integer stream.
    Narrow,
    /// 128-bit integer stream.
    Wide,
    /// 32-bit float stream.
    Float,
}

impl StreamKind {
    /// Wide for `i128`, float for `f32`, narrow otherwise.
    pub fn of_type(ty: &Type) -> StreamKind {
        match ty {
            Type::I128 => StreamKind::Wide,
            Type::F32 => StreamKind::Float,
            _ => StreamKind::Narrow,
        }
    }

    pub fn value_type(self) -> Type {
        match self {
            StreamKind::Narrow => Type::I32,
            StreamKind::Wide => Type::I128,
            StreamKind::Float => Type::F32,
        }
    }
}

// ── Memory effects ──────────────────────────────────────────────────────────

/// Memory effect an operation has, as seen by local memory reasoning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryEffect {
    Pure,
    Allocate,
    Free,
    Read,
    Write,
    /// May read, write, allocate or free anything.
    Unknown,
}

impl MemoryEffect {
    /// Effects that may change memory another value aliases.
    pub fn may_clobber(self) -> bool {
        matches!(
            self,
            MemoryEffect::Write | MemoryEffect::Free | MemoryEffect::Unknown
        )
    }
}

// ── Operation kinds ─────────────────────────────────────────────────────────

/// A (source|dest) port of a switchbox connection or flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub bundle: String,
    pub channel: i32,
}

/// Closed set of operation kinds. Operand conventions are listed per variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OpKind {
    // ── hardware dialect: declarative ──
    /// One region holding the whole design.
    Device { part: AieDevice },
    /// Result: `!aie.tile`.
    Tile { col: i32, row: i32 },
    /// Operand: tile. One region: the core program, ending in `End`.
    Core,
    /// Operand: tile. One region of DMA descriptors.
    Mem,
    /// Operand: tile. One region of DMA descriptors.
    ShimDma,
    /// Operand: tile. One region of connections.
    ShimMux,
    ShimDmaAllocation { name: String },
    /// Operand: tile. One region of connections.
    Switchbox,
    Connect { source: Port, dest: Port },
    /// Operands: source tile, dest tile.
    Flow { source: Port, dest: Port },
    /// Operands: source tile, dest tiles.
    PacketFlow { id: i32 },
    /// Operand: tile. Result: `!aie.lock`.
    Lock { id: i32, init: i32 },
    /// Operand: tile. Result: memref.
    Buffer { name: String },
    /// Result: memref.
    ExternalBuffer { name: String },
    /// Operands: producer tile, consumer tiles.
    ObjectFifo { name: String, depth: i32 },
    DmaStart { channel: i32 },
    /// Operand: buffer.
    DmaBd { offset: i32, len: i32 },
    NextBd,
    /// End marker of a core or descriptor region.
    End,

    // ── hardware dialect: executable ──
    /// Operand: lock.
    UseLock { action: LockAction, value: i32 },
    /// Operands: channel, value.
    PutStream,
    /// Operand: channel. Result: stream value.
    GetStream,
    /// Operand: value.
    PutCascade,
    /// Result: `i384`.
    GetCascade,
    /// Operand: value.
    Debug,
    Event { id: i32 },

    // ── architecture-neutral ──
    /// One region; empty for declarations.
    Func {
        name: String,
        ty: FuncType,
        private: bool,
    },
    Return,
    Call { callee: String },
    Global {
        name: String,
        ty: Type,
        public: bool,
    },
    GetGlobal { name: String },
    /// Operand: memref.
    AssumeAlignment { alignment: u32 },
    Constant { value: i64 },
    IndexCast,
    Alloc,
    /// Operand: memref.
    Dealloc,
    /// Operands: source, target.
    Copy,
    /// Operand: memref (+ indices).
    Load,
    /// Operands: value, memref (+ indices).
    Store,
    /// Any other instruction, identified by name, with a declared effect.
    Generic { name: String, effect: MemoryEffect },
}

impl OpKind {
    pub fn mnemonic(&self) -> &str {
        match self {
            OpKind::Device { .. } => "aie.device",
            OpKind::Tile { .. } => "aie.tile",
            OpKind::Core => "aie.core",
            OpKind::Mem => "aie.mem",
            OpKind::ShimDma => "aie.shim_dma",
            OpKind::ShimMux => "aie.shim_mux",
            OpKind::ShimDmaAllocation { .. } => "aie.shim_dma_allocation",
            OpKind::Switchbox => "aie.switchbox",
            OpKind::Connect { .. } => "aie.connect",
            OpKind::Flow { .. } => "aie.flow",
            OpKind::PacketFlow { .. } => "aie.packet_flow",
            OpKind::Lock { .. } => "aie.lock",
            OpKind::Buffer { .. } => "aie.buffer",
            OpKind::ExternalBuffer { .. } => "aie.external_buffer",
            OpKind::ObjectFifo { .. } => "aie.objectfifo",
            OpKind::DmaStart { .. } => "aie.dma_start",
            OpKind::DmaBd { .. } => "aie.dma_bd",
            OpKind::NextBd => "aie.next_bd",
            OpKind::End => "aie.end",
            OpKind::UseLock { .. } => "aie.use_lock",
            OpKind::PutStream => "aie.put_stream",
            OpKind::GetStream => "aie.get_stream",
            OpKind::PutCascade => "aie.put_cascade",
            OpKind::GetCascade => "aie.get_cascade",
            OpKind::Debug => "aie.debug",
            OpKind::Event { .. } => "aie.event",
            OpKind::Func { .. } => "func.func",
            OpKind::Return => "return",
            OpKind::Call { .. } => "func.call",
            OpKind::Global { .. } => "memref.global",
            OpKind::GetGlobal { .. } => "memref.get_global",
            OpKind::AssumeAlignment { .. } => "memref.assume_alignment",
            OpKind::Constant { .. } => "arith.constant",
            OpKind::IndexCast => "arith.index_cast",
            OpKind::Alloc => "memref.alloc",
            OpKind::Dealloc => "memref.dealloc",
            OpKind::Copy => "memref.copy",
            OpKind::Load => "memref.load",
            OpKind::Store => "memref.store",
            OpKind::Generic { name, .. } => name,
        }
    }

    /// True for every operation of the hardware dialect.
    pub fn is_hardware(&self) -> bool {
        match self {
            OpKind::Device { .. }
            | OpKind::Tile { .. }
            | OpKind::Core
            | OpKind::Mem
            | OpKind::ShimDma
            | OpKind::ShimMux
            | OpKind::ShimDmaAllocation { .. }
            | OpKind::Switchbox
            | OpKind::Connect { .. }
            | OpKind::Flow { .. }
            | OpKind::PacketFlow { .. }
            | OpKind::Lock { .. }
            | OpKind::Buffer { .. }
            | OpKind::ExternalBuffer { .. }
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
            | OpKind::Event { .. } => true,
            OpKind::Func { .. }
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

    /// The operation's own memory effect (nested regions not included).
    pub fn memory_effect(&self) -> MemoryEffect {
        match self {
            OpKind::Alloc => MemoryEffect::Allocate,
            OpKind::Dealloc => MemoryEffect::Free,
            OpKind::Load => MemoryEffect::Read,
            OpKind::Store | OpKind::Copy => MemoryEffect::Write,
            OpKind::Call { .. }
            | OpKind::UseLock { .. }
            | OpKind::PutStream
            | OpKind::GetStream
            | OpKind::PutCascade
            | OpKind::GetCascade
            | OpKind::Debug
            | OpKind::Event { .. } => MemoryEffect::Unknown,
            OpKind::Generic { effect, .. } => *effect,
            _ => MemoryEffect::Pure,
        }
    }

    /// Symbol this operation defines or references, if any.
    pub fn symbol(&self) -> Option<&str> {
        match self {
            OpKind::Func { name, .. }
            | OpKind::Global { name, .. }
            | OpKind::GetGlobal { name }
            | OpKind::Buffer { name }
            | OpKind::ExternalBuffer { name }
            | OpKind::ObjectFifo { name, .. }
            | OpKind::ShimDmaAllocation { name } => Some(name),
            OpKind::Call { callee } => Some(callee),
            _ => None,
        }
    }

    /// True for operations that define a module-level symbol.
    pub fn defines_symbol(&self) -> bool {
        matches!(self, OpKind::Func { .. } | OpKind::Global { .. })
    }
}

// ── Arena entities ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    pub kind: OpKind,
    pub operands: Vec<ValueId>,
    pub results: Vec<ValueId>,
    pub regions: Vec<RegionId>,
    pub parent: Option<BlockId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub ops: Vec<OpId>,
    pub args: Vec<ValueId>,
    pub parent: Option<RegionId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Region {
    pub blocks: Vec<BlockId>,
    pub parent: Option<OpId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueDef {
    OpResult { op: OpId, index: usize },
    BlockArg { block: BlockId, index: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueInfo {
    pub ty: Type,
    pub def: ValueDef,
}

/// Where `insert_op` places an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPoint {
    BlockStart(BlockId),
    BlockEnd(BlockId),
    Before(OpId),
    After(OpId),
}

#[derive(Debug, Error)]
pub enum IrError {
    #[error("operand {index} of {op} refers to an erased definition")]
    DanglingOperand { op: OpId, index: usize },
    #[error("{op} is live but its parent block is detached")]
    DetachedOperation { op: OpId },
    #[error("malformed module JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed module: {0}")]
    Malformed(String),
}

// ── Module ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    ops: Vec<Option<Operation>>,
    blocks: Vec<Block>,
    regions: Vec<Region>,
    values: Vec<ValueInfo>,
    body: BlockId,
    pub target_triple: Option<String>,
}

impl Default for Module {
    fn default() -> Self {
        Self::new()
    }
}

impl Module {
    pub fn new() -> Self {
        Module {
            ops: Vec::new(),
            blocks: vec![Block::default()],
            regions: Vec::new(),
            values: Vec::new(),
            body: BlockId(0),
            target_triple: None,
        }
    }

    /// Decode a module and check it before any accessor can see it: ids in
    /// range, containment links consistent, operands live.
    pub fn from_json(text: &str) -> Result<Module, IrError> {
        let module: Module = serde_json::from_str(text)?;
        module.check_structure()?;
        module.verify()?;
        Ok(module)
    }

    pub fn to_json(&self) -> Result<String, IrError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The top-level block.
    pub fn body(&self) -> BlockId {
        self.body
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn get_op(&self, id: OpId) -> Option<&Operation> {
        self.ops.get(id.index()).and_then(|slot| slot.as_ref())
    }

    pub fn is_live(&self, id: OpId) -> bool {
        self.get_op(id).is_some()
    }

    /// Access a live operation. Accessing an erased id is a pass bug.
    pub fn op(&self, id: OpId) -> &Operation {
        match self.get_op(id) {
            Some(op) => op,
            None => panic!("access to erased operation {}", id),
        }
    }

    pub fn op_mut(&mut self, id: OpId) -> &mut Operation {
        match self.ops.get_mut(id.index()).and_then(|slot| slot.as_mut()) {
            Some(op) => op,
            None => panic!("access to erased operation {}", id),
        }
    }

    pub fn kind(&self, id: OpId) -> &OpKind {
        &self.op(id).kind
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn region(&self, id: RegionId) -> &Region {
        &self.regions[id.index()]
    }

    pub fn value_type(&self, v: ValueId) -> &Type {
        &self.values[v.index()].ty
    }

    pub fn value_def(&self, v: ValueId) -> ValueDef {
        self.values[v.index()].def
    }

    pub fn defining_op(&self, v: ValueId) -> Option<OpId> {
        match self.value_def(v) {
            ValueDef::OpResult { op, .. } => Some(op),
            ValueDef::BlockArg { .. } => None,
        }
    }

    pub fn result(&self, op: OpId, index: usize) -> ValueId {
        self.op(op).results[index]
    }

    pub fn operand(&self, op: OpId, index: usize) -> ValueId {
        self.op(op).operands[index]
    }

    /// First block of the operation's `index`-th region.
    pub fn entry_block(&self, op: OpId, index: usize) -> Option<BlockId> {
        let region = *self.op(op).regions.get(index)?;
        self.region(region).blocks.first().copied()
    }

    pub fn parent_block(&self, op: OpId) -> Option<BlockId> {
        self.op(op).parent
    }

    /// The operation whose region contains `op`; `None` at module level.
    pub fn parent_op(&self, op: OpId) -> Option<OpId> {
        let block = self.parent_block(op)?;
        self.block_parent_op(block)
    }

    pub fn block_parent_op(&self, block: BlockId) -> Option<OpId> {
        let region = self.block(block).parent?;
        self.region(region).parent
    }

    /// First strict ancestor of `op` satisfying `pred`.
    pub fn enclosing(&self, op: OpId, pred: impl Fn(&OpKind) -> bool) -> Option<OpId> {
        let mut cur = self.parent_op(op);
        while let Some(p) = cur {
            if pred(self.kind(p)) {
                return Some(p);
            }
            cur = self.parent_op(p);
        }
        None
    }

    /// Ancestor of `op` (or `op` itself) whose parent block is `block`.
    pub fn ancestor_in_block(&self, op: OpId, block: BlockId) -> Option<OpId> {
        let mut cur = Some(op);
        while let Some(o) = cur {
            if self.parent_block(o) == Some(block) {
                return Some(o);
            }
            cur = self.parent_op(o);
        }
        None
    }

    pub fn position_in_block(&self, op: OpId) -> Option<usize> {
        let block = self.parent_block(op)?;
        self.block(block).ops.iter().position(|&o| o == op)
    }

    /// True when `a` and `b` share a block and `a` comes strictly first.
    pub fn is_before_in_block(&self, a: OpId, b: OpId) -> bool {
        if self.parent_block(a).is_none() || self.parent_block(a) != self.parent_block(b) {
            return false;
        }
        match (self.position_in_block(a), self.position_in_block(b)) {
            (Some(pa), Some(pb)) => pa < pb,
            _ => false,
        }
    }

    /// Live operations directly in the top-level block.
    pub fn top_level_ops(&self) -> Vec<OpId> {
        self.block(self.body).ops.clone()
    }

    /// Module-level function or global named `name`.
    pub fn lookup_symbol(&self, name: &str) -> Option<OpId> {
        self.block(self.body).ops.iter().copied().find(|&op| {
            let kind = self.kind(op);
            kind.defines_symbol() && kind.symbol() == Some(name)
        })
    }

    // ── Walks ───────────────────────────────────────────────────────────

    /// All live operations in pre-order.
    pub fn walk(&self) -> Vec<OpId> {
        let mut out = Vec::new();
        self.walk_block(self.body, &mut out);
        out
    }

    /// Operations nested in `op`'s regions, in pre-order (excluding `op`).
    pub fn walk_nested(&self, op: OpId) -> Vec<OpId> {
        let mut out = Vec::new();
        for &region in &self.op(op).regions {
            for &block in &self.region(region).blocks {
                self.walk_block(block, &mut out);
            }
        }
        out
    }

    /// Live operations satisfying `pred`, in pre-order.
    pub fn walk_kind(&self, pred: impl Fn(&OpKind) -> bool) -> Vec<OpId> {
        self.walk()
            .into_iter()
            .filter(|&op| pred(self.kind(op)))
            .collect()
    }

    fn walk_block(&self, block: BlockId, out: &mut Vec<OpId>) {
        for &op in &self.block(block).ops {
            out.push(op);
            for &region in &self.op(op).regions {
                for &inner in &self.region(region).blocks {
                    self.walk_block(inner, out);
                }
            }
        }
    }

    // ── Construction ────────────────────────────────────────────────────

    /// Create a detached operation with fresh result values and `num_regions`
    /// empty regions.
    pub fn create_op(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        result_types: Vec<Type>,
        num_regions: usize,
    ) -> OpId {
        let id = OpId(self.ops.len() as u32);
        let results = result_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.new_value(ty, ValueDef::OpResult { op: id, index }))
            .collect();
        let regions = (0..num_regions)
            .map(|_| {
                let rid = RegionId(self.regions.len() as u32);
                self.regions.push(Region {
                    blocks: Vec::new(),
                    parent: Some(id),
                });
                rid
            })
            .collect();
        self.ops.push(Some(Operation {
            kind,
            operands,
            results,
            regions,
            parent: None,
        }));
        id
    }

    fn new_value(&mut self, ty: Type, def: ValueDef) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueInfo { ty, def });
        id
    }

    /// Append a new block with arguments of `arg_types` to `region`.
    pub fn add_block(&mut self, region: RegionId, arg_types: Vec<Type>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block {
            ops: Vec::new(),
            args: Vec::new(),
            parent: Some(region),
        });
        let args = arg_types
            .into_iter()
            .enumerate()
            .map(|(index, ty)| self.new_value(ty, ValueDef::BlockArg { block: id, index }))
            .collect();
        self.blocks[id.index()].args = args;
        self.regions[region.index()].blocks.push(id);
        id
    }

    /// Attach a detached operation at `point`.
    pub fn insert_op(&mut self, op: OpId, point: InsertPoint) {
        let (block, pos) = match point {
            InsertPoint::BlockStart(b) => (b, 0),
            InsertPoint::BlockEnd(b) => (b, self.block(b).ops.len()),
            InsertPoint::Before(anchor) | InsertPoint::After(anchor) => {
                let block = self
                    .parent_block(anchor)
                    .unwrap_or_else(|| panic!("insertion anchor {} is detached", anchor));
                let pos = self.position_in_block(anchor).unwrap_or(0);
                let pos = if matches!(point, InsertPoint::After(_)) {
                    pos + 1
                } else {
                    pos
                };
                (block, pos)
            }
        };
        self.blocks[block.index()].ops.insert(pos, op);
        self.op_mut(op).parent = Some(block);
    }

    fn detach(&mut self, op: OpId) {
        if let Some(block) = self.op(op).parent {
            self.blocks[block.index()].ops.retain(|&o| o != op);
            self.op_mut(op).parent = None;
        }
    }

    /// Move `op` to just before `anchor`.
    pub fn move_before(&mut self, op: OpId, anchor: OpId) {
        self.detach(op);
        self.insert_op(op, InsertPoint::Before(anchor));
    }

    /// Erase `op` and everything nested in it. Remaining uses of its results
    /// become dangling; callers replace them first when that matters.
    pub fn erase_op(&mut self, op: OpId) {
        self.detach(op);
        let nested = self.walk_nested(op);
        for inner in nested {
            self.ops[inner.index()] = None;
        }
        self.ops[op.index()] = None;
    }

    pub fn set_operand(&mut self, op: OpId, index: usize, v: ValueId) {
        self.op_mut(op).operands[index] = v;
    }

    /// Redirect every use of `from` to `to`.
    pub fn replace_all_uses(&mut self, from: ValueId, to: ValueId) {
        for slot in self.ops.iter_mut().flatten() {
            for operand in slot.operands.iter_mut() {
                if *operand == from {
                    *operand = to;
                }
            }
        }
    }

    /// Clone every block of `src` (with nested operations) onto the end of
    /// `dst`. `mapper` maps original values to their clones; operands with no
    /// mapping are kept as-is. The mapper is extended with every cloned value.
    pub fn clone_region_into(
        &mut self,
        src: RegionId,
        dst: RegionId,
        mapper: &mut HashMap<ValueId, ValueId>,
    ) {
        let src_blocks = self.region(src).blocks.clone();
        let mut new_blocks = Vec::with_capacity(src_blocks.len());
        for &block in &src_blocks {
            let arg_types: Vec<Type> = self
                .block(block)
                .args
                .iter()
                .map(|&a| self.value_type(a).clone())
                .collect();
            let new_block = self.add_block(dst, arg_types);
            let old_args = self.block(block).args.clone();
            let new_args = self.block(new_block).args.clone();
            for (old, new) in old_args.into_iter().zip(new_args) {
                mapper.insert(old, new);
            }
            new_blocks.push(new_block);
        }
        for (&block, &new_block) in src_blocks.iter().zip(&new_blocks) {
            for op in self.block(block).ops.clone() {
                let cloned = self.clone_op(op, mapper);
                self.insert_op(cloned, InsertPoint::BlockEnd(new_block));
            }
        }
    }

    fn clone_op(&mut self, op: OpId, mapper: &mut HashMap<ValueId, ValueId>) -> OpId {
        let original = self.op(op).clone();
        let operands = original
            .operands
            .iter()
            .map(|v| *mapper.get(v).unwrap_or(v))
            .collect();
        let result_types = original
            .results
            .iter()
            .map(|&r| self.value_type(r).clone())
            .collect();
        let cloned = self.create_op(
            original.kind.clone(),
            operands,
            result_types,
            original.regions.len(),
        );
        let new_results = self.op(cloned).results.clone();
        for (old, new) in original.results.iter().zip(new_results) {
            mapper.insert(*old, new);
        }
        let new_regions = self.op(cloned).regions.clone();
        for (src, dst) in original.regions.into_iter().zip(new_regions) {
            self.clone_region_into(src, dst, mapper);
        }
        cloned
    }

    // ── Loading ─────────────────────────────────────────────────────────

    /// Id-level consistency of a deserialized arena. Every id is in range,
    /// every live operation is reachable from the body exactly once, and
    /// parent links agree with the lists that contain them.
    fn check_structure(&self) -> Result<(), IrError> {
        fn malformed(msg: String) -> Result<(), IrError> {
            Err(IrError::Malformed(msg))
        }
        let (n_ops, n_blocks, n_regions, n_values) = (
            self.ops.len(),
            self.blocks.len(),
            self.regions.len(),
            self.values.len(),
        );
        let op_ok = |op: OpId| op.index() < n_ops;
        let block_ok = |b: BlockId| b.index() < n_blocks;
        let region_ok = |r: RegionId| r.index() < n_regions;
        let value_ok = |v: ValueId| v.index() < n_values;

        // Ranges first, so the reachability walk below can index freely.
        if !block_ok(self.body) {
            return malformed(format!("body block {} does not exist", self.body.0));
        }
        for (i, info) in self.values.iter().enumerate() {
            let in_range = match info.def {
                ValueDef::OpResult { op, .. } => op_ok(op),
                ValueDef::BlockArg { block, .. } => block_ok(block),
            };
            if !in_range {
                return malformed(format!("value %{} is defined by a missing entity", i));
            }
        }
        for (i, region) in self.regions.iter().enumerate() {
            if !region.blocks.iter().all(|&b| block_ok(b)) || !region.parent.map_or(true, op_ok) {
                return malformed(format!("region {} refers to a missing entity", i));
            }
        }
        for (i, block) in self.blocks.iter().enumerate() {
            if !block.ops.iter().all(|&op| op_ok(op))
                || !block.args.iter().all(|&v| value_ok(v))
                || !block.parent.map_or(true, region_ok)
            {
                return malformed(format!("block {} refers to a missing entity", i));
            }
        }
        for (i, slot) in self.ops.iter().enumerate() {
            let Some(operation) = slot else {
                continue;
            };
            if !operation.operands.iter().all(|&v| value_ok(v))
                || !operation.results.iter().all(|&v| value_ok(v))
                || !operation.regions.iter().all(|&r| region_ok(r))
                || !operation.parent.map_or(true, block_ok)
            {
                return malformed(format!("{} refers to a missing entity", OpId(i as u32)));
            }
        }

        // Containment is a tree rooted at the body.
        if self.blocks[self.body.index()].parent.is_some() {
            return malformed("body block has a parent region".to_string());
        }
        let mut seen_ops = vec![false; n_ops];
        let mut seen_blocks = vec![false; n_blocks];
        seen_blocks[self.body.index()] = true;
        let mut pending = vec![self.body];
        while let Some(block) = pending.pop() {
            for (index, &arg) in self.blocks[block.index()].args.iter().enumerate() {
                if self.values[arg.index()].def != (ValueDef::BlockArg { block, index }) {
                    return malformed(format!("argument {} of block {} is misattributed", index, block.0));
                }
            }
            for &op in &self.blocks[block.index()].ops {
                let Some(operation) = self.get_op(op) else {
                    return malformed(format!("block {} lists erased {}", block.0, op));
                };
                if std::mem::replace(&mut seen_ops[op.index()], true) {
                    return malformed(format!("{} is listed twice", op));
                }
                if operation.parent != Some(block) {
                    return malformed(format!("{} does not name block {} as parent", op, block.0));
                }
                for (index, &r) in operation.results.iter().enumerate() {
                    if self.values[r.index()].def != (ValueDef::OpResult { op, index }) {
                        return malformed(format!("result {} of {} is misattributed", index, op));
                    }
                }
                for &region in &operation.regions {
                    if self.regions[region.index()].parent != Some(op) {
                        return malformed(format!("region {} does not name {} as parent", region.0, op));
                    }
                    for &inner in &self.regions[region.index()].blocks {
                        if self.blocks[inner.index()].parent != Some(region) {
                            return malformed(format!(
                                "block {} does not name region {} as parent",
                                inner.0, region.0
                            ));
                        }
                        if std::mem::replace(&mut seen_blocks[inner.index()], true) {
                            return malformed(format!("block {} is listed twice", inner.0));
                        }
                        pending.push(inner);
                    }
                }
            }
        }
        if let Some(i) = (0..n_ops).find(|&i| self.ops[i].is_some() && !seen_ops[i]) {
            return malformed(format!("{} is live but unreachable", OpId(i as u32)));
        }
        Ok(())
    }

    // ── Verification ────────────────────────────────────────────────────

    fn block_is_live(&self, block: BlockId) -> bool {
        if block == self.body {
            return true;
        }
        match self.block_parent_op(block) {
            Some(op) => match self.get_op(op) {
                Some(operation) => match operation.parent {
                    Some(parent) => self.block_is_live(parent),
                    None => false,
                },
                None => false,
            },
            None => false,
        }
    }

    /// True if `v`'s definition is still attached to the module.
    pub fn value_is_live(&self, v: ValueId) -> bool {
        match self.value_def(v) {
            ValueDef::OpResult { op, .. } => match self.get_op(op) {
                Some(operation) => operation
                    .parent
                    .map(|b| self.block_is_live(b))
                    .unwrap_or(false),
                None => false,
            },
            ValueDef::BlockArg { block, .. } => self.block_is_live(block),
        }
    }

    /// Structural check: every reachable operand refers to a live definition.
    pub fn verify(&self) -> Result<(), IrError> {
        for op in self.walk() {
            let operation = self.op(op);
            match operation.parent {
                Some(block) if self.block_is_live(block) => {}
                _ => return Err(IrError::DetachedOperation { op }),
            }
            for (index, &operand) in operation.operands.iter().enumerate() {
                if !self.value_is_live(operand) {
                    return Err(IrError::DanglingOperand { op, index });
                }
            }
        }
        Ok(())
    }
}

// ── Use map ─────────────────────────────────────────────────────────────────

/// Every (user, operand index) of every value, collected in one pre-order
/// walk. The map is a snapshot: a caller that mutates the module keeps it in
/// step with `record` and `forget`.
#[derive(Debug, Clone, Default)]
pub struct UseMap {
    uses: HashMap<ValueId, Vec<(OpId, usize)>>,
}

impl UseMap {
    pub fn build(module: &Module) -> Self {
        let mut map = UseMap::default();
        for op in module.walk() {
            map.record(module, op);
        }
        map
    }

    /// Users of `v`, in pre-order for a freshly built map.
    pub fn users(&self, v: ValueId) -> &[(OpId, usize)] {
        self.uses.get(&v).map_or(&[], Vec::as_slice)
    }

    /// Add the operands of `op`.
    pub fn record(&mut self, module: &Module, op: OpId) {
        for (index, &v) in module.op(op).operands.iter().enumerate() {
            self.uses.entry(v).or_default().push((op, index));
        }
    }

    /// Drop the operands of `op`. Call before erasing or rewriting it.
    pub fn forget(&mut self, module: &Module, op: OpId) {
        for v in &module.op(op).operands {
            if let Some(list) = self.uses.get_mut(v) {
                list.retain(|&(user, _)| user != op);
            }
        }
    }

    /// Mirror of `Module::replace_all_uses`.
    pub fn replace_all_uses(&mut self, from: ValueId, to: ValueId) {
        if let Some(moved) = self.uses.remove(&from) {
            self.uses.entry(to).or_default().extend(moved);
        }
    }
}

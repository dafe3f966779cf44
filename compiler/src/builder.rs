//! IR builder utilities
//!
//! `Builder` keeps an insertion point into a `Module` and offers typed
//! constructors for the operations the passes and tests create. Inserting
//! at a block start or after an operation advances the point, so a sequence
//! of `insert` calls always lands in program order.

use crate::arch::{AieDevice, LockAction};
use crate::id::{BlockId, OpId, ValueId};
use crate::ir::{FuncType, InsertPoint, MemoryEffect, Module, OpKind, Port, Type};

/// Builder for constructing operations at an insertion point
pub struct Builder<'m> {
    module: &'m mut Module,
    point: InsertPoint,
}

impl<'m> Builder<'m> {
    pub fn new(module: &'m mut Module, point: InsertPoint) -> Self {
        Self { module, point }
    }

    /// Builder appending to the module's top-level block
    pub fn at_module_end(module: &'m mut Module) -> Self {
        let body = module.body();
        Self::new(module, InsertPoint::BlockEnd(body))
    }

    pub fn at_end(module: &'m mut Module, block: BlockId) -> Self {
        Self::new(module, InsertPoint::BlockEnd(block))
    }

    pub fn module(&mut self) -> &mut Module {
        self.module
    }

    pub fn set_insertion_point(&mut self, point: InsertPoint) {
        self.point = point;
    }

    pub fn insertion_point(&self) -> InsertPoint {
        self.point
    }

    /// Create and insert an operation at the current point
    pub fn insert(&mut self, kind: OpKind, operands: Vec<ValueId>, results: Vec<Type>) -> OpId {
        self.insert_with_regions(kind, operands, results, 0)
    }

    pub fn insert_with_regions(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        results: Vec<Type>,
        num_regions: usize,
    ) -> OpId {
        let op = self.module.create_op(kind, operands, results, num_regions);
        self.module.insert_op(op, self.point);
        match self.point {
            InsertPoint::BlockStart(_) | InsertPoint::After(_) => {
                self.point = InsertPoint::After(op);
            }
            InsertPoint::BlockEnd(_) | InsertPoint::Before(_) => {}
        }
        op
    }

    /// Insert an operation owning one region with a single empty block;
    /// returns the operation and that block.
    pub fn insert_with_body(
        &mut self,
        kind: OpKind,
        operands: Vec<ValueId>,
        results: Vec<Type>,
    ) -> (OpId, BlockId) {
        let op = self.insert_with_regions(kind, operands, results, 1);
        let region = self.module.op(op).regions[0];
        let block = self.module.add_block(region, vec![]);
        (op, block)
    }

    fn single_result(&mut self, kind: OpKind, operands: Vec<ValueId>, ty: Type) -> ValueId {
        let op = self.insert(kind, operands, vec![ty]);
        self.module.result(op, 0)
    }

    // ── Hardware dialect ────────────────────────────────────────────────

    pub fn device(&mut self, part: AieDevice) -> (OpId, BlockId) {
        self.insert_with_body(OpKind::Device { part }, vec![], vec![])
    }

    pub fn tile(&mut self, col: i32, row: i32) -> ValueId {
        self.single_result(OpKind::Tile { col, row }, vec![], Type::Tile)
    }

    pub fn core(&mut self, tile: ValueId) -> (OpId, BlockId) {
        self.insert_with_body(OpKind::Core, vec![tile], vec![])
    }

    pub fn mem(&mut self, tile: ValueId) -> (OpId, BlockId) {
        self.insert_with_body(OpKind::Mem, vec![tile], vec![])
    }

    pub fn switchbox(&mut self, tile: ValueId) -> (OpId, BlockId) {
        self.insert_with_body(OpKind::Switchbox, vec![tile], vec![])
    }

    pub fn connect(&mut self, source: Port, dest: Port) -> OpId {
        self.insert(OpKind::Connect { source, dest }, vec![], vec![])
    }

    pub fn flow(&mut self, src: ValueId, source: Port, dst: ValueId, dest: Port) -> OpId {
        self.insert(OpKind::Flow { source, dest }, vec![src, dst], vec![])
    }

    pub fn lock(&mut self, tile: ValueId, id: i32, init: i32) -> ValueId {
        self.single_result(OpKind::Lock { id, init }, vec![tile], Type::Lock)
    }

    pub fn buffer(&mut self, tile: ValueId, name: &str, ty: Type) -> ValueId {
        self.single_result(
            OpKind::Buffer {
                name: name.to_string(),
            },
            vec![tile],
            ty,
        )
    }

    pub fn use_lock(&mut self, lock: ValueId, action: LockAction, value: i32) -> OpId {
        self.insert(OpKind::UseLock { action, value }, vec![lock], vec![])
    }

    pub fn put_stream(&mut self, channel: ValueId, value: ValueId) -> OpId {
        self.insert(OpKind::PutStream, vec![channel, value], vec![])
    }

    pub fn get_stream(&mut self, channel: ValueId, ty: Type) -> ValueId {
        self.single_result(OpKind::GetStream, vec![channel], ty)
    }

    pub fn put_cascade(&mut self, value: ValueId) -> OpId {
        self.insert(OpKind::PutCascade, vec![value], vec![])
    }

    pub fn get_cascade(&mut self) -> ValueId {
        self.single_result(OpKind::GetCascade, vec![], Type::I384)
    }

    pub fn debug(&mut self, value: ValueId) -> OpId {
        self.insert(OpKind::Debug, vec![value], vec![])
    }

    pub fn event(&mut self, id: i32) -> OpId {
        self.insert(OpKind::Event { id }, vec![], vec![])
    }

    pub fn end(&mut self) -> OpId {
        self.insert(OpKind::End, vec![], vec![])
    }

    // ── Architecture-neutral ────────────────────────────────────────────

    pub fn func(&mut self, name: &str, ty: FuncType) -> (OpId, BlockId) {
        let kind = OpKind::Func {
            name: name.to_string(),
            ty,
            private: false,
        };
        self.insert_with_body(kind, vec![], vec![])
    }

    /// Private function declaration with no body.
    pub fn declare_func(&mut self, name: &str, ty: FuncType) -> OpId {
        let kind = OpKind::Func {
            name: name.to_string(),
            ty,
            private: true,
        };
        self.insert_with_regions(kind, vec![], vec![], 1)
    }

    pub fn call(&mut self, callee: &str, args: Vec<ValueId>, results: Vec<Type>) -> OpId {
        let kind = OpKind::Call {
            callee: callee.to_string(),
        };
        self.insert(kind, args, results)
    }

    pub fn ret(&mut self, values: Vec<ValueId>) -> OpId {
        self.insert(OpKind::Return, values, vec![])
    }

    pub fn constant(&mut self, value: i64, ty: Type) -> ValueId {
        self.single_result(OpKind::Constant { value }, vec![], ty)
    }

    pub fn index_cast(&mut self, value: ValueId, ty: Type) -> ValueId {
        self.single_result(OpKind::IndexCast, vec![value], ty)
    }

    pub fn global(&mut self, name: &str, ty: Type) -> OpId {
        let kind = OpKind::Global {
            name: name.to_string(),
            ty,
            public: true,
        };
        self.insert(kind, vec![], vec![])
    }

    pub fn get_global(&mut self, name: &str, ty: Type) -> ValueId {
        let kind = OpKind::GetGlobal {
            name: name.to_string(),
        };
        self.single_result(kind, vec![], ty)
    }

    pub fn assume_alignment(&mut self, memref: ValueId, alignment: u32) -> OpId {
        self.insert(OpKind::AssumeAlignment { alignment }, vec![memref], vec![])
    }

    pub fn alloc(&mut self, ty: Type) -> ValueId {
        self.single_result(OpKind::Alloc, vec![], ty)
    }

    pub fn dealloc(&mut self, memref: ValueId) -> OpId {
        self.insert(OpKind::Dealloc, vec![memref], vec![])
    }

    pub fn copy(&mut self, source: ValueId, target: ValueId) -> OpId {
        self.insert(OpKind::Copy, vec![source, target], vec![])
    }

    pub fn load(&mut self, memref: ValueId, indices: Vec<ValueId>, ty: Type) -> ValueId {
        let mut operands = vec![memref];
        operands.extend(indices);
        self.single_result(OpKind::Load, operands, ty)
    }

    pub fn store(&mut self, value: ValueId, memref: ValueId, indices: Vec<ValueId>) -> OpId {
        let mut operands = vec![value, memref];
        operands.extend(indices);
        self.insert(OpKind::Store, operands, vec![])
    }

    pub fn generic(
        &mut self,
        name: &str,
        effect: MemoryEffect,
        operands: Vec<ValueId>,
        results: Vec<Type>,
    ) -> OpId {
        let kind = OpKind::Generic {
            name: name.to_string(),
            effect,
        };
        self.insert(kind, operands, results)
    }
}

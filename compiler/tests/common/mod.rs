// Shared fixtures for the integration tests.
#![allow(dead_code)]

use aiec::arch::AieDevice;
use aiec::builder::Builder;
use aiec::id::{BlockId, OpId, ValueId};
use aiec::ir::{FuncType, Module, OpKind, Type};

/// A module holding one empty device.
pub struct Design {
    pub module: Module,
    pub device: OpId,
    pub body: BlockId,
}

pub fn design(part: AieDevice) -> Design {
    let mut module = Module::new();
    let (device, body) = Builder::at_module_end(&mut module).device(part);
    Design {
        module,
        device,
        body,
    }
}

impl Design {
    pub fn builder(&mut self) -> Builder<'_> {
        Builder::at_end(&mut self.module, self.body)
    }

    pub fn tile(&mut self, col: i32, row: i32) -> ValueId {
        self.builder().tile(col, row)
    }

    /// A core on `tile` whose body is filled by `fill` and closed with `aie.end`.
    pub fn core(&mut self, tile: ValueId, fill: impl FnOnce(&mut Builder<'_>)) -> OpId {
        let (core, body) = self.builder().core(tile);
        let mut b = Builder::at_end(&mut self.module, body);
        fill(&mut b);
        b.end();
        core
    }
}

pub fn buf() -> Type {
    Type::memref(&[16], Type::I32)
}

/// `func @name() -> results` with an empty entry block.
pub fn function(m: &mut Module, name: &str, results: Vec<Type>) -> BlockId {
    let (_, body) = Builder::at_module_end(m).func(name, FuncType::new(vec![], results));
    body
}

pub fn calls(m: &Module) -> Vec<String> {
    m.walk()
        .into_iter()
        .filter_map(|op| match m.kind(op) {
            OpKind::Call { callee } => Some(callee.clone()),
            _ => None,
        })
        .collect()
}

pub fn count(m: &Module, pred: impl Fn(&OpKind) -> bool) -> usize {
    m.walk_kind(pred).len()
}

/// Integer value of the constant defining `v`.
pub fn const_value(m: &Module, v: ValueId) -> Option<i64> {
    match m.kind(m.defining_op(v)?) {
        OpKind::Constant { value } => Some(*value),
        _ => None,
    }
}

/// Top-level function names in module order.
pub fn function_names(m: &Module) -> Vec<String> {
    m.top_level_ops()
        .into_iter()
        .filter_map(|op| match m.kind(op) {
            OpKind::Func { name, private, .. } if !private => Some(name.clone()),
            _ => None,
        })
        .collect()
}

// intrinsics.rs — Target primitive declarations
//
// The lowering pass turns hardware instructions into calls to external
// functions. This module names those functions and holds the catalogue the
// pass declares up front. Not every entry is valid for a given design; an
// unused declaration is harmless, a missing one fails the rewrite that needs
// it.

use tracing::debug;

use crate::arch::{lock_intrinsic_name, AieArch, LockAction};
use crate::builder::Builder;
use crate::ir::{FuncType, InsertPoint, Module, StreamKind, Type};

pub const DEBUG_I32: &str = "debug_i32";
pub const PUT_CASCADE: &str = "llvm.aie.put.mcd";
pub const GET_CASCADE: &str = "llvm.aie.get.scd";

/// Event ids with a declared intrinsic.
pub const DECLARED_EVENTS: [i32; 2] = [0, 1];

pub fn put_stream_name(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Narrow => "llvm.aie.put.ms",
        StreamKind::Wide => "llvm.aie.put.wms",
        StreamKind::Float => "llvm.aie.put.fms",
    }
}

pub fn get_stream_name(kind: StreamKind) -> &'static str {
    match kind {
        StreamKind::Narrow => "llvm.aie.get.ss",
        StreamKind::Wide => "llvm.aie.get.wss",
        StreamKind::Float => "llvm.aie.get.fss",
    }
}

pub fn event_name(id: i32) -> String {
    format!("llvm.aie.event{}", id)
}

/// One external callable stub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrinsicDecl {
    pub name: String,
    pub ty: FuncType,
}

impl IntrinsicDecl {
    pub fn new(name: impl Into<String>, inputs: Vec<Type>, results: Vec<Type>) -> Self {
        Self {
            name: name.into(),
            ty: FuncType::new(inputs, results),
        }
    }
}

/// Ordered set of intrinsic declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntrinsicCatalogue {
    decls: Vec<IntrinsicDecl>,
}

impl Default for IntrinsicCatalogue {
    fn default() -> Self {
        Self::standard()
    }
}

impl IntrinsicCatalogue {
    /// Every primitive either architecture generation may need.
    pub fn standard() -> Self {
        let i32t = || Type::I32;
        let mut decls = vec![IntrinsicDecl::new(DEBUG_I32, vec![i32t()], vec![])];
        for id in DECLARED_EVENTS {
            decls.push(IntrinsicDecl::new(event_name(id), vec![], vec![]));
        }
        for kind in [StreamKind::Narrow, StreamKind::Wide, StreamKind::Float] {
            decls.push(IntrinsicDecl::new(
                put_stream_name(kind),
                vec![i32t(), kind.value_type()],
                vec![],
            ));
        }
        for kind in [StreamKind::Narrow, StreamKind::Wide, StreamKind::Float] {
            decls.push(IntrinsicDecl::new(
                get_stream_name(kind),
                vec![i32t()],
                vec![kind.value_type()],
            ));
        }
        decls.push(IntrinsicDecl::new(PUT_CASCADE, vec![Type::I384], vec![]));
        decls.push(IntrinsicDecl::new(GET_CASCADE, vec![], vec![Type::I384]));
        for arch in AieArch::ALL {
            for action in [LockAction::Acquire, LockAction::Release] {
                decls.push(IntrinsicDecl::new(
                    lock_intrinsic_name(arch, action),
                    vec![i32t(), i32t()],
                    vec![],
                ));
            }
        }
        Self { decls }
    }

    pub fn empty() -> Self {
        Self { decls: Vec::new() }
    }

    /// The catalogue with `name` removed.
    pub fn without(mut self, name: &str) -> Self {
        self.decls.retain(|d| d.name != name);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.decls.iter().any(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IntrinsicDecl> {
        self.decls.iter()
    }

    /// Declare every catalogue entry as a private function at the start of
    /// the module, in catalogue order. Names already defined in the module are
    /// skipped. Returns the number of declarations created.
    pub fn declare_all(&self, module: &mut Module) -> usize {
        let body = module.body();
        let mut builder = Builder::new(module, InsertPoint::BlockStart(body));
        let mut created = 0;
        for decl in &self.decls {
            if builder.module().lookup_symbol(&decl.name).is_some() {
                debug!(name = %decl.name, "intrinsic already declared");
                continue;
            }
            builder.declare_func(&decl.name, decl.ty.clone());
            created += 1;
        }
        created
    }
}

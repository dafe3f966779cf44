// print.rs — Deterministic textual form of a Module
//
// MLIR-flavoured, one operation per line, two-space indentation per nesting
// level. Values are numbered %0, %1, ... in definition order, block arguments
// included. Used for snapshots and the driver's `--emit ir`; there is no
// parser for this text.

use std::collections::HashMap;
use std::fmt::{self, Write};

use crate::id::{BlockId, OpId, ValueId};
use crate::ir::{Module, OpKind, Port};

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut printer = Printer {
            module: self,
            names: HashMap::new(),
            out: String::new(),
        };
        printer.print_module()?;
        f.write_str(&printer.out)
    }
}

struct Printer<'a> {
    module: &'a Module,
    names: HashMap<ValueId, usize>,
    out: String,
}

impl<'a> Printer<'a> {
    fn print_module(&mut self) -> fmt::Result {
        match &self.module.target_triple {
            Some(triple) => writeln!(
                self.out,
                "module attributes {{target_triple = \"{}\"}} {{",
                triple
            )?,
            None => writeln!(self.out, "module {{")?,
        }
        self.print_block_ops(self.module.body(), 1)?;
        writeln!(self.out, "}}")
    }

    fn name(&mut self, v: ValueId) -> String {
        let next = self.names.len();
        let n = *self.names.entry(v).or_insert(next);
        format!("%{}", n)
    }

    fn lookup(&self, v: ValueId) -> String {
        match self.names.get(&v) {
            Some(n) => format!("%{}", n),
            None => format!("%<v{}>", v.0),
        }
    }

    fn print_block_ops(&mut self, block: BlockId, depth: usize) -> fmt::Result {
        for op in self.module.block(block).ops.clone() {
            self.print_op(op, depth)?;
        }
        Ok(())
    }

    fn print_op(&mut self, op: OpId, depth: usize) -> fmt::Result {
        let indent = "  ".repeat(depth);
        let module = self.module;
        let operation = module.op(op);
        let mut line = String::new();

        if !operation.results.is_empty() {
            let names: Vec<String> = operation.results.iter().map(|&r| self.name(r)).collect();
            write!(line, "{} = ", names.join(", "))?;
        }

        match &operation.kind {
            OpKind::Func { name, ty, private } => {
                let vis = if *private { "private " } else { "" };
                let inputs: Vec<String> = ty.inputs.iter().map(|t| t.to_string()).collect();
                write!(line, "func.func {}@{}({})", vis, name, inputs.join(", "))?;
                if !ty.results.is_empty() {
                    let results: Vec<String> = ty.results.iter().map(|t| t.to_string()).collect();
                    write!(line, " -> {}", results.join(", "))?;
                }
            }
            OpKind::Global { name, ty, public } => {
                let vis = if *public { "public" } else { "private" };
                write!(line, "memref.global \"{}\" @{} : {}", vis, name, ty)?;
            }
            kind => {
                line.push_str(kind.mnemonic());
                if let Some(sym) = symbol_ref(kind) {
                    write!(line, " @{}", sym)?;
                }
                if !operation.operands.is_empty() {
                    let args: Vec<String> =
                        operation.operands.iter().map(|&v| self.lookup(v)).collect();
                    write!(line, "({})", args.join(", "))?;
                }
                let attrs = attributes(kind);
                if !attrs.is_empty() {
                    write!(line, " {{{}}}", attrs.join(", "))?;
                }
                if !operation.results.is_empty() {
                    let types: Vec<String> = operation
                        .results
                        .iter()
                        .map(|&r| module.value_type(r).to_string())
                        .collect();
                    write!(line, " : {}", types.join(", "))?;
                }
            }
        }

        let regions = operation.regions.clone();
        let has_body = regions
            .iter()
            .any(|&r| !self.module.region(r).blocks.is_empty());
        if !has_body {
            return writeln!(self.out, "{}{}", indent, line);
        }

        writeln!(self.out, "{}{} {{", indent, line)?;
        for region in regions {
            let blocks = self.module.region(region).blocks.clone();
            let labelled = blocks.len() > 1;
            for (i, block) in blocks.into_iter().enumerate() {
                let args = self.module.block(block).args.clone();
                if labelled || !args.is_empty() {
                    let params: Vec<String> = args
                        .iter()
                        .map(|&a| format!("{}: {}", self.name(a), self.module.value_type(a)))
                        .collect();
                    if params.is_empty() {
                        writeln!(self.out, "{}^bb{}:", indent, i)?;
                    } else {
                        writeln!(self.out, "{}^bb{}({}):", indent, i, params.join(", "))?;
                    }
                }
                self.print_block_ops(block, depth + 1)?;
            }
        }
        writeln!(self.out, "{}}}", indent)
    }
}

fn symbol_ref(kind: &OpKind) -> Option<&str> {
    match kind {
        OpKind::Call { callee } => Some(callee),
        OpKind::GetGlobal { name } => Some(name),
        _ => None,
    }
}

fn port(p: &Port) -> String {
    format!("{}:{}", p.bundle, p.channel)
}

fn attributes(kind: &OpKind) -> Vec<String> {
    match kind {
        OpKind::Device { part } => vec![format!("part = {}", part.name())],
        OpKind::Tile { col, row } => vec![format!("col = {}", col), format!("row = {}", row)],
        OpKind::ShimDmaAllocation { name } => vec![format!("sym_name = \"{}\"", name)],
        OpKind::Connect { source, dest } | OpKind::Flow { source, dest } => {
            vec![format!("source = {}", port(source)), format!("dest = {}", port(dest))]
        }
        OpKind::PacketFlow { id } => vec![format!("id = {}", id)],
        OpKind::Lock { id, init } => vec![format!("id = {}", id), format!("init = {}", init)],
        OpKind::Buffer { name } | OpKind::ExternalBuffer { name } => {
            vec![format!("sym_name = \"{}\"", name)]
        }
        OpKind::ObjectFifo { name, depth } => {
            vec![format!("sym_name = \"{}\"", name), format!("depth = {}", depth)]
        }
        OpKind::DmaStart { channel } => vec![format!("channel = {}", channel)],
        OpKind::DmaBd { offset, len } => {
            vec![format!("offset = {}", offset), format!("len = {}", len)]
        }
        OpKind::UseLock { action, value } => {
            vec![format!("action = {}", action.mnemonic()), format!("value = {}", value)]
        }
        OpKind::Event { id } => vec![format!("id = {}", id)],
        OpKind::AssumeAlignment { alignment } => vec![format!("alignment = {}", alignment)],
        OpKind::Constant { value } => vec![format!("value = {}", value)],
        _ => Vec::new(),
    }
}

// pass.rs — Pass descriptors
//
// Declares the two transformation passes, their command-line names and the
// postconditions each one promises. The pipeline runner looks passes up here
// for logging and for `--pass` parsing.

use std::fmt;

// ── Pass identifiers ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassId {
    CoreToStandard,
    CopyRemoval,
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a pass.
pub struct PassDescriptor {
    /// Name accepted by `--pass` and shown in logs.
    pub name: &'static str,
    pub summary: &'static str,
    /// Postconditions (documentation only).
    pub invariants: &'static str,
}

/// Return the static descriptor for a given pass.
pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::CoreToStandard => PassDescriptor {
            name: "aie-standard-lowering",
            summary: "lower the hardware dialect to functions, globals and intrinsic calls",
            invariants: "C1-C5: triple set, no device, selected cores outlined, \
                         no hardware instruction, module verifies",
        },
        PassId::CopyRemoval => PassDescriptor {
            name: "copy-removal",
            summary: "remove redundant alloc/copy/dealloc triples within a block",
            invariants: "idempotent; only same-block matches",
        },
    }
}

/// All pass IDs in declaration order.
pub const ALL_PASSES: [PassId; 2] = [PassId::CoreToStandard, PassId::CopyRemoval];

impl PassId {
    pub fn from_name(name: &str) -> Option<PassId> {
        ALL_PASSES
            .iter()
            .copied()
            .find(|&id| descriptor(id).name == name)
    }

    pub fn name(self) -> &'static str {
        descriptor(self).name
    }
}

impl fmt::Display for PassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for pass in ALL_PASSES {
            assert_eq!(PassId::from_name(pass.name()), Some(pass));
        }
        assert_eq!(PassId::from_name("canonicalize"), None);
    }

    #[test]
    fn names_are_unique() {
        let mut names: Vec<_> = ALL_PASSES.iter().map(|p| p.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ALL_PASSES.len());
    }

    #[test]
    fn all_descriptors_document_invariants() {
        for pass in &ALL_PASSES {
            let desc = descriptor(*pass);
            assert!(!desc.invariants.is_empty(), "pass {:?} has no invariants", pass);
            assert!(!desc.summary.is_empty());
        }
    }
}

// diag.rs — Unified diagnostics model
//
// Provides the shared diagnostic types used by every aiec pass. A diagnostic
// is anchored at the operation that caused it rather than at source text;
// there is no source text at this level of the toolchain.
//
// Preconditions: none (types only).
// Postconditions: none (types only).
// Failure modes: none.
// Side effects: none.

use std::fmt;

use crate::id::OpId;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0100`, `W0100`).
///
/// Once assigned, a code must never be reassigned to a different semantic
/// meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub mod codes {
    use super::DiagCode;

    /// Module does not contain exactly one device.
    pub const E0100: DiagCode = DiagCode("E0100");
    /// Intrinsic required by a rewrite is not declared.
    pub const E0101: DiagCode = DiagCode("E0101");
    /// Lock use has no enclosing device.
    pub const E0102: DiagCode = DiagCode("E0102");
    /// Lowered module failed structural verification.
    pub const E0103: DiagCode = DiagCode("E0103");
    /// Hardware operation survived lowering without a rule.
    pub const W0100: DiagCode = DiagCode("W0100");
    /// Two tiles share one (col, row).
    pub const W0101: DiagCode = DiagCode("W0101");
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related operation ────────────────────────────────────────────────────

/// A secondary operation providing context for a diagnostic.
#[derive(Debug, Clone)]
pub struct RelatedOp {
    pub op: OpId,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A diagnostic emitted by any pass.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    /// Offending operation; `None` for module-level problems.
    pub op: Option<OpId>,
    pub message: String,
    pub hint: Option<String>,
    pub related: Vec<RelatedOp>,
}

impl Diagnostic {
    /// Create a new diagnostic with no code, hint or related operations.
    pub fn new(level: DiagLevel, op: Option<OpId>, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            op,
            message: message.into(),
            hint: None,
            related: Vec::new(),
        }
    }

    pub fn error(op: Option<OpId>, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, op, message)
    }

    pub fn warning(op: Option<OpId>, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, op, message)
    }

    /// Attach a stable diagnostic code.
    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Attach a related operation.
    pub fn with_related(mut self, op: OpId, label: impl Into<String>) -> Self {
        self.related.push(RelatedOp {
            op,
            label: label.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        if let Some(code) = &self.code {
            write!(f, "{}[{}]: {}", level, code, self.message)?;
        } else {
            write!(f, "{}: {}", level, self.message)?;
        }
        if let Some(op) = self.op {
            write!(f, "\n  at: {}", op)?;
        }
        for related in &self.related {
            write!(f, "\n  note: {} ({})", related.label, related.op)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

/// True if any diagnostic is error-level.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_without_code() {
        let d = Diagnostic::new(DiagLevel::Error, None, "something failed");
        assert_eq!(format!("{d}"), "error: something failed");
    }

    #[test]
    fn display_with_code_and_location() {
        let d = Diagnostic::warning(Some(OpId(4)), "hardware op left behind")
            .with_code(codes::W0100);
        assert_eq!(
            format!("{d}"),
            "warning[W0100]: hardware op left behind\n  at: op#4"
        );
    }

    #[test]
    fn builder_chain() {
        let d = Diagnostic::error(Some(OpId(1)), "missing intrinsic")
            .with_code(codes::E0101)
            .with_hint("declare the intrinsic before lowering")
            .with_related(OpId(0), "device declared here");

        assert_eq!(d.code, Some(codes::E0101));
        assert_eq!(d.hint.as_deref(), Some("declare the intrinsic before lowering"));
        assert_eq!(d.related.len(), 1);
        assert!(has_errors(&[d]));
    }
}

// pipeline.rs — Pass orchestration and provenance
//
// Runs an ordered list of passes over one module, fingerprints the module
// before and after each pass, and stops at the first pass that reports an
// error diagnostic.
//
// Preconditions: none.
// Postconditions: on Ok, every requested pass ran; on Err, passes after the
//   failing one did not run and the module is in whatever state the failing
//   pass left it.
// Failure modes: any pass emitting error-level diagnostics; a module that
//   cannot be serialized for its fingerprint.
// Side effects: calls on_pass_complete after each pass for immediate display.

use std::fmt;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::copy_removal::{remove_redundant_copies, CopyRemovalResult};
use crate::diag::{has_errors, Diagnostic};
use crate::ir::Module;
use crate::lower::{core_to_standard, Cert, CoreToStandardOptions, LowerStats};
use crate::pass::PassId;

// ── Options ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    pub lower: CoreToStandardOptions,
    /// Report per-pass timing at info level instead of debug.
    pub verbose: bool,
}

// ── Provenance ─────────────────────────────────────────────────────────────

/// SHA-256 of a module's canonical compact JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn of(module: &Module) -> Result<Self, serde_json::Error> {
        let canonical = serde_json::to_vec(module)?;
        let digest = Sha256::digest(&canonical);
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&digest);
        Ok(Fingerprint(hash))
    }

    /// 64-character lowercase hex.
    pub fn hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for b in &self.0 {
            use std::fmt::Write;
            let _ = write!(s, "{:02x}", b);
        }
        s
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.hex())
    }
}

/// What one pass did to the module.
#[derive(Debug, Clone)]
pub struct PassRecord {
    pub pass: PassId,
    pub before: Fingerprint,
    pub after: Fingerprint,
    pub elapsed: Duration,
}

impl PassRecord {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

// ── Outcome ────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub diagnostics: Vec<Diagnostic>,
    pub records: Vec<PassRecord>,
    pub cert: Option<Cert>,
    pub lower_stats: Option<LowerStats>,
    pub copy_stats: Option<CopyRemovalResult>,
}

/// Why a pass stopped the pipeline.
#[derive(Debug, Error)]
pub enum PassFailure {
    #[error("error diagnostics reported")]
    Diagnostics,
    #[error("module fingerprint unavailable: {0}")]
    Fingerprint(#[from] serde_json::Error),
}

/// A pass failed. Everything gathered up to and including the failing pass
/// is kept in `outcome`.
#[derive(Debug, Error)]
#[error("pass `{failing_pass}` failed: {cause}")]
pub struct PipelineError {
    pub failing_pass: PassId,
    #[source]
    pub cause: PassFailure,
    pub outcome: PipelineOutcome,
}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Per-pass post-processing: callback, accumulate, timing log, error check.
fn finish_pass(
    outcome: &mut PipelineOutcome,
    record: PassRecord,
    diags: Vec<Diagnostic>,
    verbose: bool,
    on_pass_complete: &mut impl FnMut(PassId, &[Diagnostic]),
) -> bool {
    on_pass_complete(record.pass, &diags);
    let ms = record.elapsed.as_secs_f64() * 1000.0;
    if verbose {
        info!(pass = %record.pass, ms, changed = record.changed(), "pass complete");
    } else {
        debug!(pass = %record.pass, ms, changed = record.changed(), "pass complete");
    }
    let failed = has_errors(&diags);
    outcome.diagnostics.extend(diags);
    outcome.records.push(record);
    failed
}

fn fingerprint_failure(
    pass: PassId,
    err: serde_json::Error,
    outcome: PipelineOutcome,
) -> PipelineError {
    warn!(%pass, error = %err, "module could not be fingerprinted");
    PipelineError {
        failing_pass: pass,
        cause: err.into(),
        outcome,
    }
}

/// Run `passes` over `module` in order.
pub fn run_pipeline(
    module: &mut Module,
    passes: &[PassId],
    options: &PipelineOptions,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<PipelineOutcome, PipelineError> {
    let mut outcome = PipelineOutcome::default();

    for &pass in passes {
        let before = match Fingerprint::of(module) {
            Ok(fp) => fp,
            Err(e) => return Err(fingerprint_failure(pass, e, outcome)),
        };
        let t = Instant::now();
        let diags = match pass {
            PassId::CoreToStandard => {
                let result = core_to_standard(module, &options.lower);
                if !result.has_errors() && !result.cert.all_pass() {
                    warn!(cert = ?result.cert, "lowering obligations not all met");
                }
                outcome.cert = Some(result.cert);
                outcome.lower_stats = Some(result.stats);
                result.diagnostics
            }
            PassId::CopyRemoval => {
                outcome.copy_stats = Some(remove_redundant_copies(module));
                Vec::new()
            }
        };
        let elapsed = t.elapsed();
        let after = match Fingerprint::of(module) {
            Ok(fp) => fp,
            Err(e) => return Err(fingerprint_failure(pass, e, outcome)),
        };
        let record = PassRecord {
            pass,
            before,
            after,
            elapsed,
        };
        if finish_pass(
            &mut outcome,
            record,
            diags,
            options.verbose,
            &mut on_pass_complete,
        ) {
            return Err(PipelineError {
                failing_pass: pass,
                cause: PassFailure::Diagnostics,
                outcome,
            });
        }
    }

    Ok(outcome)
}

// compose.rs — Composition pipeline driver
//
// Runs the full analysis over one compilation unit: effect inference,
// instantiation, elaboration, binding, verification. Each phase consumes
// the output of the previous one; diagnostics are collected per phase and
// returned together. Also computes a provenance digest of the unit so
// build systems can key caches on analysis input.
//
// Preconditions: `unit` was produced by a type-checking frontend.
// Postconditions: an error-free result means the unit satisfies all
//                 composition guarantees.
// Failure modes: none (violations are diagnostics).
// Side effects: phase timing on stderr when `verbose` is set.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::access::{infer_effects, EffectTable};
use crate::ast::Program;
use crate::bind::bind;
use crate::diag::Diagnostic;
use crate::elaborate::elaborate;
use crate::graph::Composer;
use crate::instantiate::instantiate;
use crate::layout::Layout;
use crate::verify::{verify, VerifyResult};

/// What the frontend hands the composition core: the typed program plus
/// the layout it assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationUnit {
    pub program: Program,
    pub layout: Layout,
}

/// Everything the pipeline produced for one unit.
#[derive(Debug)]
pub struct ComposeResult {
    pub composer: Composer,
    pub effects: EffectTable,
    pub verify: VerifyResult,
}

impl ComposeResult {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.verify.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        self.verify.has_errors()
    }
}

/// Run the full composition analysis over `unit`.
pub fn compose(unit: &CompilationUnit, verbose: bool) -> ComposeResult {
    let mut timer = PhaseTimer::new(verbose);

    let effects = infer_effects(&unit.program);
    timer.mark("effects");

    let mut composer = instantiate(&unit.program, &unit.layout);
    timer.mark("instantiate");

    elaborate(&unit.program, &unit.layout, &effects, &mut composer);
    timer.mark("elaborate");

    bind(&unit.program, &unit.layout, &effects, &mut composer);
    timer.mark("bind");

    let verified = verify(&composer);
    timer.mark("verify");

    ComposeResult {
        composer,
        effects,
        verify: verified,
    }
}

struct PhaseTimer {
    verbose: bool,
    last: Instant,
}

impl PhaseTimer {
    fn new(verbose: bool) -> Self {
        PhaseTimer {
            verbose,
            last: Instant::now(),
        }
    }

    fn mark(&mut self, phase: &str) {
        if self.verbose {
            let elapsed = self.last.elapsed();
            eprintln!("rcc: {phase} complete ({:.2}ms)", elapsed.as_secs_f64() * 1e3);
        }
        self.last = Instant::now();
    }
}

// ── Provenance ──────────────────────────────────────────────────────────────

/// Content digest of a compilation unit's serialized form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    digest: [u8; 32],
}

impl Provenance {
    pub fn hex(&self) -> String {
        let mut s = String::with_capacity(64);
        for byte in &self.digest {
            s.push_str(&format!("{byte:02x}"));
        }
        s
    }
}

/// Digest the unit's canonical JSON form. Serialization of an in-memory
/// unit cannot fail, so the result is total.
pub fn compute_provenance(unit: &CompilationUnit) -> Provenance {
    let json = serde_json::to_string(unit).unwrap_or_else(|e| {
        unreachable!("compilation unit failed to serialize: {e}")
    });
    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Provenance {
        digest: hasher.finalize().into(),
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

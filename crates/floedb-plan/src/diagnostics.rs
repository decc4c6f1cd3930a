//! Public, read-only diagnostics for plan compilation.
//!
//! Diagnostics contract:
//! - trace events are deterministic for equivalent inputs;
//! - events are observational only, never a correctness surface;
//! - nothing here influences the plan being built.

use crate::{
    plan::PlanFingerprint,
    types::{IndexId, SpecId, SubqueryId},
};

///
/// CompilePhase
///
/// The assembler's per-block pipeline states, in order.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompilePhase {
    ScopeEntered,
    SourcesBound,
    PredicatesClassified,
    ShapeChosen,
    AccessSpecsBuilt,
    SubplansAttached,
    Finished,
}

///
/// CompileTraceEvent
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompileTraceEvent {
    /// One block entered the given pipeline phase.
    Phase { phase: CompilePhase },
    /// An index choice failed key coercion and the source fell back to a
    /// sequential scan.
    IndexDegraded { spec: SpecId, index: IndexId },
    /// A subquery with an already-compiled identity reused its plan.
    SubplanCacheHit { id: SubqueryId },
    /// The chosen index already produces ordered rows; the explicit sort
    /// step was suppressed.
    SortSuppressed { spec: SpecId },
}

///
/// CompileDiagnostics
///
/// Read-only compilation diagnostics returned alongside a finished plan.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompileDiagnostics {
    pub fingerprint: PlanFingerprint,
    pub events: Vec<CompileTraceEvent>,
}

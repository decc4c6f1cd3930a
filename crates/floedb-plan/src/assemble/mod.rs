//! Plan assembly: the top-level driver walking a query tree, pushing and
//! popping scopes, invoking codegen and classification, and stitching the
//! finished plan together. Module wiring, the optimizer hint surface, the
//! statement entry points, and the DML wrappers; the per-block pipeline
//! lives in `block`, set operations in `setop`.

mod block;
mod setop;

#[cfg(test)]
mod tests;

use crate::{
    context::{CompilationContext, CompileLimits},
    diagnostics::CompileDiagnostics,
    error::CompileError,
    model::Catalog,
    plan::{self, CompiledStatement, DmlBody, PlanBody, PlanNode},
    syntax::{QueryExpr, Statement},
    types::{AttributeId, SpecId, TableId},
};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

pub use crate::access::IndexChoice;

///
/// PlanHints
///
/// The consumed optimizer interface: per-source access choices plus the
/// per-block ordering hint. Exactly one choice (or none) arrives per
/// source; this compiler never re-ranks candidates.
///

#[derive(Clone, Debug, Default)]
pub struct PlanHints {
    /// Chosen index per source spec; absent means sequential.
    pub access: BTreeMap<SpecId, IndexChoice>,
    /// Blocks (named by their first source's spec) whose chosen index
    /// already produces rows in ORDER BY order.
    pub order_covered: BTreeSet<SpecId>,
}

///
/// compile_statement
///
/// Compile one SELECT-shaped statement into a finished plan plus side
/// tables. The compilation context lives and dies inside this call.
///

pub fn compile_statement(
    catalog: &dyn Catalog,
    statement: &Statement,
    hints: &PlanHints,
    parameter_domains: Vec<Option<crate::domain::ValueDomain>>,
    limits: CompileLimits,
) -> Result<CompiledStatement, CompileError> {
    let mut ctx = CompilationContext::new(limits);
    ctx.bind_parameter_domains(parameter_domains);

    let mut root = compile_query(&mut ctx, catalog, hints, &statement.query)?;
    root.is_root = true;

    finish(ctx, root)
}

///
/// DmlStatement
///
/// A DML statement's compiler-facing shape: the target table, the
/// assignment map (attribute written from a select-list position), and the
/// SELECT-shaped core producing the driving rows.
///

#[derive(Clone, Debug)]
pub struct DmlStatement {
    pub target: TableId,
    pub assignments: Vec<(AttributeId, usize)>,
    pub query: QueryExpr,
}

/// Compile an INSERT wrapper around its SELECT-shaped core.
pub fn compile_insert(
    catalog: &dyn Catalog,
    statement: &DmlStatement,
    hints: &PlanHints,
    limits: CompileLimits,
) -> Result<CompiledStatement, CompileError> {
    compile_dml(catalog, statement, hints, limits, DmlKind::Insert)
}

/// Compile an UPDATE wrapper around its SELECT-shaped core.
pub fn compile_update(
    catalog: &dyn Catalog,
    statement: &DmlStatement,
    hints: &PlanHints,
    limits: CompileLimits,
) -> Result<CompiledStatement, CompileError> {
    compile_dml(catalog, statement, hints, limits, DmlKind::Update)
}

/// Compile a DELETE wrapper around its SELECT-shaped core.
pub fn compile_delete(
    catalog: &dyn Catalog,
    statement: &DmlStatement,
    hints: &PlanHints,
    limits: CompileLimits,
) -> Result<CompiledStatement, CompileError> {
    compile_dml(catalog, statement, hints, limits, DmlKind::Delete)
}

#[derive(Clone, Copy, Debug)]
enum DmlKind {
    Insert,
    Update,
    Delete,
}

// The wrapper owns the compiled core through its access-pointer list: the
// driving rows materialize once, then the side effect applies per row.
// Triggers and authorization stay with the statement orchestrator.
fn compile_dml(
    catalog: &dyn Catalog,
    statement: &DmlStatement,
    hints: &PlanHints,
    limits: CompileLimits,
    kind: DmlKind,
) -> Result<CompiledStatement, CompileError> {
    let mut ctx = CompilationContext::new(limits);

    let core = compile_query(&mut ctx, catalog, hints, &statement.query)?;
    let core = Rc::new(core);
    ctx.note_table(statement.target);

    let mut assignments = Vec::with_capacity(statement.assignments.len());
    for (attribute, position) in &statement.assignments {
        let operand = core.output.get(*position).cloned().ok_or_else(|| {
            crate::error::InternalError::assemble_invariant(format!(
                "assignment reads select position {position} beyond the core output"
            ))
        })?;
        assignments.push((*attribute, operand));
    }

    let body = DmlBody {
        table: statement.target,
        assignments,
        savepoint: ctx.next_savepoint_name(),
    };
    let body = match kind {
        DmlKind::Insert => PlanBody::Insert(body),
        DmlKind::Update => PlanBody::Update(body),
        DmlKind::Delete => PlanBody::Delete(body),
    };

    let spec = ctx.alloc_internal_spec();
    let mut root = PlanNode::new(spec, body);
    root.access_pointers.push(core);
    root.is_root = true;

    finish(ctx, root)
}

/// Compile one query expression (block or set operation).
pub(crate) fn compile_query(
    ctx: &mut CompilationContext,
    catalog: &dyn Catalog,
    hints: &PlanHints,
    query: &QueryExpr,
) -> Result<PlanNode, CompileError> {
    match query {
        QueryExpr::Block(block) => block::compile_block(ctx, catalog, hints, block),
        QueryExpr::SetOp(setop) => setop::compile_setop(ctx, catalog, hints, setop),
    }
}

/// Compile a nested subquery to a shared plan handle.
pub(crate) fn compile_subquery(
    ctx: &mut CompilationContext,
    catalog: &dyn Catalog,
    hints: &PlanHints,
    query: &QueryExpr,
) -> Result<Rc<PlanNode>, CompileError> {
    Ok(Rc::new(compile_query(ctx, catalog, hints, query)?))
}

// Validate, fingerprint, and package the finished plan with its side
// tables; the context is consumed and dropped here.
fn finish(mut ctx: CompilationContext, root: PlanNode) -> Result<CompiledStatement, CompileError> {
    let root = Rc::new(root);
    plan::validate_plan(&root)?;

    let fingerprint = plan::fingerprint(&root);
    let diagnostics = CompileDiagnostics {
        fingerprint,
        events: ctx.take_events(),
    };

    Ok(CompiledStatement {
        referenced_tables: ctx.referenced_tables(),
        max_parameter_index: ctx.max_parameter(),
        root,
        diagnostics,
    })
}

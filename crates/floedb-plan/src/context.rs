use crate::{
    MAX_KEY_PARTS, MAX_LIST_KEY_ELEMENTS, MAX_NESTING_DEPTH,
    diagnostics::CompileTraceEvent,
    domain::ValueDomain,
    error::{ErrorOrigin, InternalError},
    plan::PlanNode,
    scope::{ColumnBinding, ResolvedColumn, Scope, ScopeFrame, ScopeKind, ScopeStack},
    syntax::{ColumnRefExpr, PseudoColumnKind},
    types::{CellId, ParameterIndex, SpecId, SubqueryId, TableId},
};
use std::{cell::Cell, collections::BTreeMap, collections::BTreeSet, rc::Rc};

///
/// CompileLimits
///
/// Explicit resource bounds for one compilation. Blowing a limit is a
/// resource-class fault, fatal to the current compilation only.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CompileLimits {
    pub max_nesting_depth: u32,
    pub max_key_parts: usize,
    pub max_list_key_elements: usize,
}

impl Default for CompileLimits {
    fn default() -> Self {
        Self {
            max_nesting_depth: MAX_NESTING_DEPTH,
            max_key_parts: MAX_KEY_PARTS,
            max_list_key_elements: MAX_LIST_KEY_ELEMENTS,
        }
    }
}

///
/// PseudoCell
///
/// Shared mutable cell backing one pseudo column (row number, order
/// position, group position). Contract: the executor is the single writer;
/// every operand referencing the cell is a reader. Identity (and therefore
/// plan equality) is the arena-local id, never the runtime contents.
///

#[derive(Clone, Debug)]
pub struct PseudoCell {
    id: CellId,
    slot: Rc<Cell<Option<u64>>>,
}

impl PseudoCell {
    #[must_use]
    pub(crate) fn new(id: CellId) -> Self {
        Self {
            id,
            slot: Rc::new(Cell::new(None)),
        }
    }

    #[must_use]
    pub const fn id(&self) -> CellId {
        self.id
    }

    /// The shared slot handed to the execution engine.
    #[must_use]
    pub fn slot(&self) -> Rc<Cell<Option<u64>>> {
        Rc::clone(&self.slot)
    }
}

impl PartialEq for PseudoCell {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PseudoCell {}

///
/// BlockCells
///
/// The three pseudo-column cells of one query block, allocated once per
/// block and shared by every operand referencing them within it. Usage is
/// tracked so the finished node only wires the cells something reads.
///

#[derive(Clone, Debug)]
pub(crate) struct BlockCells {
    pub(crate) row_number: PseudoCell,
    pub(crate) order_position: PseudoCell,
    pub(crate) group_position: PseudoCell,
    pub(crate) row_number_used: Cell<bool>,
    pub(crate) order_position_used: Cell<bool>,
    pub(crate) group_position_used: Cell<bool>,
}

impl BlockCells {
    /// Cell for one pseudo-column kind, marking it referenced.
    pub(crate) fn cell_for(&self, kind: PseudoColumnKind) -> PseudoCell {
        match kind {
            PseudoColumnKind::RowNumber => {
                self.row_number_used.set(true);
                self.row_number.clone()
            }
            PseudoColumnKind::OrderPosition => {
                self.order_position_used.set(true);
                self.order_position.clone()
            }
            PseudoColumnKind::GroupPosition => {
                self.group_position_used.set(true);
                self.group_position.clone()
            }
        }
    }

    /// Cell for one kind only if something referenced it.
    pub(crate) fn cell_if_used(&self, kind: PseudoColumnKind) -> Option<PseudoCell> {
        let (cell, used) = match kind {
            PseudoColumnKind::RowNumber => (&self.row_number, &self.row_number_used),
            PseudoColumnKind::OrderPosition => (&self.order_position, &self.order_position_used),
            PseudoColumnKind::GroupPosition => (&self.group_position, &self.group_position_used),
        };

        used.get().then(|| cell.clone())
    }
}

///
/// CachedSubplan
///
/// A subquery already compiled within this statement; identical subquery
/// identities reuse it instead of recompiling.
///

#[derive(Clone, Debug)]
pub(crate) struct CachedSubplan {
    pub plan: Rc<PlanNode>,
    pub level: u32,
    pub binding_specs: BTreeSet<SpecId>,
    pub single_row: bool,
}

///
/// SubqueryRecord
///
/// Pending placement work for one compiled subquery: filled by expression
/// lowering, consumed by the correlation analyzer during block assembly.
///

#[derive(Clone, Debug)]
pub(crate) struct SubqueryRecord {
    /// Stable subquery identity; absent for internal fetch subplans.
    pub id: Option<SubqueryId>,
    pub plan: Rc<PlanNode>,
    pub level: u32,
    /// Sources the subquery references at distance one, if any.
    pub binding_specs: BTreeSet<SpecId>,
}

// Per-subquery correlation bookkeeping while its body compiles.
#[derive(Debug)]
struct ActiveSubquery {
    /// Frame depth at the subquery's defining point; bindings at a frame
    /// index below this are free references.
    base_depth: usize,
    min_distance: Option<u32>,
    binding_specs: BTreeSet<SpecId>,
}

///
/// CompilationContext
///
/// The per-statement arena. Owns every structure with compilation lifetime:
/// the scope stack, pseudo cells, the subplan cache, sequence counters, and
/// the trace buffer. Dropped wholesale on success or failure; the finished
/// plan tree is the only survivor.
///

#[derive(Debug)]
pub struct CompilationContext {
    pub(crate) limits: CompileLimits,
    pub(crate) scopes: ScopeStack,
    next_cell: u32,
    next_internal_spec: u32,
    savepoint_seq: u32,
    parameter_domains: Vec<Option<ValueDomain>>,
    max_parameter: Option<ParameterIndex>,
    referenced_tables: Vec<TableId>,
    subplans: BTreeMap<SubqueryId, CachedSubplan>,
    pending_subqueries: Vec<SubqueryRecord>,
    active_subqueries: Vec<ActiveSubquery>,
    events: Vec<CompileTraceEvent>,
}

impl CompilationContext {
    #[must_use]
    pub fn new(limits: CompileLimits) -> Self {
        Self {
            limits,
            scopes: ScopeStack::default(),
            next_cell: 0,
            next_internal_spec: 1 << 31,
            savepoint_seq: 0,
            parameter_domains: Vec::new(),
            max_parameter: None,
            referenced_tables: Vec::new(),
            subplans: BTreeMap::new(),
            pending_subqueries: Vec::new(),
            active_subqueries: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Domains of already-bound runtime parameter values, in index order.
    pub fn bind_parameter_domains(&mut self, domains: Vec<Option<ValueDomain>>) {
        self.parameter_domains = domains;
    }

    #[must_use]
    pub(crate) fn parameter_domain(&self, index: ParameterIndex) -> Option<ValueDomain> {
        self.parameter_domains
            .get(index.0 as usize)
            .copied()
            .flatten()
    }

    pub(crate) fn note_parameter(&mut self, index: ParameterIndex) {
        let max = self.max_parameter.map_or(index, |prev| prev.max(index));
        self.max_parameter = Some(max);
    }

    #[must_use]
    pub(crate) const fn max_parameter(&self) -> Option<ParameterIndex> {
        self.max_parameter
    }

    /// Record a base-table reference, keeping first-reference order.
    pub(crate) fn note_table(&mut self, table: TableId) {
        if !self.referenced_tables.contains(&table) {
            self.referenced_tables.push(table);
        }
    }

    #[must_use]
    pub(crate) fn referenced_tables(&self) -> Vec<TableId> {
        self.referenced_tables.clone()
    }

    pub(crate) fn alloc_cell(&mut self) -> PseudoCell {
        let cell = PseudoCell::new(CellId(self.next_cell));
        self.next_cell += 1;

        cell
    }

    /// Allocate a spec id for a compiler-internal row source (path fetch
    /// output). Internal ids live in the upper half of the id space, away
    /// from resolver-assigned specs.
    pub(crate) fn alloc_internal_spec(&mut self) -> SpecId {
        let spec = SpecId(self.next_internal_spec);
        self.next_internal_spec += 1;

        spec
    }

    /// Allocate the pseudo-column cells shared by one query block.
    pub(crate) fn alloc_block_cells(&mut self) -> BlockCells {
        BlockCells {
            row_number: self.alloc_cell(),
            order_position: self.alloc_cell(),
            group_position: self.alloc_cell(),
            row_number_used: Cell::new(false),
            order_position_used: Cell::new(false),
            group_position_used: Cell::new(false),
        }
    }

    /// Next savepoint label for DML wrappers; instance-scoped, never a
    /// process-wide counter.
    pub(crate) fn next_savepoint_name(&mut self) -> String {
        self.savepoint_seq += 1;

        format!("sp-{}", self.savepoint_seq)
    }

    pub(crate) fn trace(&mut self, event: CompileTraceEvent) {
        self.events.push(event);
    }

    #[must_use]
    pub(crate) fn take_events(&mut self) -> Vec<CompileTraceEvent> {
        std::mem::take(&mut self.events)
    }

    ///
    /// Scope discipline
    ///

    /// Enter one query-block frame, enforcing the nesting bound.
    pub(crate) fn enter_block(&mut self) -> Result<(), InternalError> {
        let depth = u32::try_from(self.scopes.depth()).unwrap_or(u32::MAX);
        if depth >= self.limits.max_nesting_depth {
            return Err(InternalError::resource(
                ErrorOrigin::Assemble,
                format!(
                    "query nesting exceeds {} blocks",
                    self.limits.max_nesting_depth
                ),
            ));
        }
        self.scopes.push_frame();

        Ok(())
    }

    pub(crate) fn leave_block(&mut self) -> Result<ScopeFrame, InternalError> {
        self.scopes
            .pop_frame()
            .ok_or_else(|| InternalError::assemble_invariant("scope pop without matching push"))
    }

    pub(crate) fn register_scope(&mut self, scope: Scope) {
        self.scopes.add_scope(scope);
    }

    /// Resolve a bound column reference against the scope stack,
    /// innermost-first, updating correlation bookkeeping on the way out.
    pub(crate) fn resolve_column(
        &mut self,
        column: &ColumnRefExpr,
    ) -> Result<ResolvedColumn, InternalError> {
        let Some((frame_index, scope)) = self.scopes.find_spec(column.spec) else {
            // The resolver guarantees every name is bound; a miss is an
            // upstream contract violation, not a user error.
            return Err(InternalError::expression_invariant(format!(
                "unresolvable name '{}' bound to unknown spec {}",
                column.name, column.spec
            )));
        };

        let binding = match (scope.kind, column.attribute) {
            (ScopeKind::RowSource, Some(attribute)) => ColumnBinding::Attribute {
                spec: column.spec,
                attribute,
            },
            _ => {
                let Some(position) = scope.slot(&column.name) else {
                    return Err(InternalError::expression_invariant(format!(
                        "name '{}' missing from scope '{}' (spec {})",
                        column.name, scope.exposed_name, column.spec
                    )));
                };
                let position = u32::try_from(position).unwrap_or(u32::MAX);
                ColumnBinding::TupleSlot {
                    spec: column.spec,
                    position,
                }
            }
        };

        let innermost = self.scopes.depth().saturating_sub(1);
        let resolved = ResolvedColumn {
            binding,
            domain: column.domain,
        };

        if frame_index < innermost {
            self.scopes.mark_correlated_path(frame_index, column.spec);
        }

        // Every active subquery whose body sits below the binding frame has
        // just observed a free reference.
        for active in &mut self.active_subqueries {
            if frame_index < active.base_depth {
                let distance = u32::try_from(active.base_depth - frame_index).unwrap_or(u32::MAX);
                let min = active.min_distance.map_or(distance, |d| d.min(distance));
                active.min_distance = Some(min);
                if distance == 1 {
                    active.binding_specs.insert(column.spec);
                }
            }
        }

        Ok(resolved)
    }

    ///
    /// Subquery bookkeeping
    ///

    pub(crate) fn begin_subquery(&mut self) {
        self.active_subqueries.push(ActiveSubquery {
            base_depth: self.scopes.depth(),
            min_distance: None,
            binding_specs: BTreeSet::new(),
        });
    }

    /// Close the innermost active subquery and return its correlation
    /// level plus its distance-one binding specs.
    pub(crate) fn end_subquery(&mut self) -> Result<(u32, BTreeSet<SpecId>), InternalError> {
        let Some(active) = self.active_subqueries.pop() else {
            return Err(InternalError::correlation_invariant(
                "subquery close without matching open",
            ));
        };

        Ok((active.min_distance.unwrap_or(0), active.binding_specs))
    }

    pub(crate) fn lookup_subplan(&self, id: SubqueryId) -> Option<CachedSubplan> {
        self.subplans.get(&id).cloned()
    }

    pub(crate) fn store_subplan(&mut self, id: SubqueryId, cached: CachedSubplan) {
        self.subplans.insert(id, cached);
    }

    /// Watermark for the pending-placement list; block assembly drains
    /// everything recorded at or after its own watermark.
    #[must_use]
    pub(crate) const fn subquery_watermark(&self) -> usize {
        self.pending_subqueries.len()
    }

    pub(crate) fn record_subquery(&mut self, record: SubqueryRecord) {
        self.pending_subqueries.push(record);
    }

    pub(crate) fn drain_subqueries(&mut self, watermark: usize) -> Vec<SubqueryRecord> {
        self.pending_subqueries.split_off(watermark)
    }
}

impl Default for CompilationContext {
    fn default() -> Self {
        Self::new(CompileLimits::default())
    }
}

///
/// TESTS
///

//! Shared fixtures for unit tests: a small in-memory catalog and terse
//! input-tree builders. Test-only code; nothing here ships.

pub(crate) mod tree {
    use crate::{
        domain::ValueDomain,
        syntax::{
            AggregateExpr, AggregateKind, BetweenExpr, BinaryExpr, BinaryOp, ColumnRefExpr,
            InListExpr, LiteralExpr, ParameterExpr, PseudoColumnKind, PseudoExpr, QueryExpr,
            SubqueryExpr, SyntaxNode, UnaryExpr, UnaryOp,
        },
        types::{AggregateCallId, AttributeId, ParameterIndex, SourceLocation, SpecId, SubqueryId},
        value::Value,
    };
    use std::cell::Cell;

    pub(crate) fn int(value: i64) -> SyntaxNode {
        SyntaxNode::Literal(LiteralExpr {
            value: Value::Int(value),
            domain: ValueDomain::bigint(),
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn text(value: &str) -> SyntaxNode {
        SyntaxNode::Literal(LiteralExpr {
            value: Value::text(value),
            domain: ValueDomain::varchar(64),
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn param(index: u32) -> SyntaxNode {
        SyntaxNode::Parameter(ParameterExpr {
            index: ParameterIndex(index),
            cast: None,
            declared: ValueDomain::generic(),
            location: SourceLocation::default(),
        })
    }

    /// Column reference without a catalog attribute (positional sources
    /// and pure syntax tests).
    pub(crate) fn column_n(spec: u32, name: &str) -> SyntaxNode {
        SyntaxNode::ColumnRef(ColumnRefExpr {
            spec: SpecId(spec),
            name: name.to_string(),
            attribute: None,
            domain: ValueDomain::int(),
            location: SourceLocation::default(),
        })
    }

    /// Column reference resolved to a catalog attribute.
    pub(crate) fn column(spec: u32, name: &str, attribute: u32, domain: ValueDomain) -> SyntaxNode {
        SyntaxNode::ColumnRef(ColumnRefExpr {
            spec: SpecId(spec),
            name: name.to_string(),
            attribute: Some(AttributeId(attribute)),
            domain,
            location: SourceLocation::default(),
        })
    }

    fn binary(op: BinaryOp, left: SyntaxNode, right: SyntaxNode) -> SyntaxNode {
        SyntaxNode::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
            domain: ValueDomain::boolean(),
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn eq(left: SyntaxNode, right: SyntaxNode) -> SyntaxNode {
        binary(BinaryOp::Eq, left, right)
    }

    pub(crate) fn lt(left: SyntaxNode, right: SyntaxNode) -> SyntaxNode {
        binary(BinaryOp::Lt, left, right)
    }

    pub(crate) fn gt(left: SyntaxNode, right: SyntaxNode) -> SyntaxNode {
        binary(BinaryOp::Gt, left, right)
    }

    pub(crate) fn and(left: SyntaxNode, right: SyntaxNode) -> SyntaxNode {
        binary(BinaryOp::And, left, right)
    }

    pub(crate) fn or(left: SyntaxNode, right: SyntaxNode) -> SyntaxNode {
        binary(BinaryOp::Or, left, right)
    }

    pub(crate) fn not(inner: SyntaxNode) -> SyntaxNode {
        SyntaxNode::Unary(UnaryExpr {
            op: UnaryOp::Not,
            arg: Box::new(inner),
            domain: ValueDomain::boolean(),
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn exists(subquery: SyntaxNode) -> SyntaxNode {
        SyntaxNode::Unary(UnaryExpr {
            op: UnaryOp::Exists,
            arg: Box::new(subquery),
            domain: ValueDomain::boolean(),
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn between(subject: SyntaxNode, lower: SyntaxNode, upper: SyntaxNode) -> SyntaxNode {
        SyntaxNode::Between(BetweenExpr {
            subject: Box::new(subject),
            lower: Box::new(lower),
            upper: Box::new(upper),
            negated: false,
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn not_between(
        subject: SyntaxNode,
        lower: SyntaxNode,
        upper: SyntaxNode,
    ) -> SyntaxNode {
        SyntaxNode::Between(BetweenExpr {
            subject: Box::new(subject),
            lower: Box::new(lower),
            upper: Box::new(upper),
            negated: true,
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn in_list(subject: SyntaxNode, elements: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode::InList(InListExpr {
            subject: Box::new(subject),
            elements,
            negated: false,
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn row_number() -> SyntaxNode {
        SyntaxNode::Pseudo(PseudoExpr {
            kind: PseudoColumnKind::RowNumber,
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn group_position() -> SyntaxNode {
        SyntaxNode::Pseudo(PseudoExpr {
            kind: PseudoColumnKind::GroupPosition,
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn count_star(call: u32) -> SyntaxNode {
        SyntaxNode::Aggregate(AggregateExpr {
            call: AggregateCallId(call),
            kind: AggregateKind::CountStar,
            distinct: false,
            arg: None,
            domain: ValueDomain::bigint(),
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn aggregate(call: u32, kind: AggregateKind, arg: SyntaxNode) -> SyntaxNode {
        SyntaxNode::Aggregate(AggregateExpr {
            call: AggregateCallId(call),
            kind,
            distinct: false,
            arg: Some(Box::new(arg)),
            domain: ValueDomain::bigint(),
            location: SourceLocation::default(),
        })
    }

    pub(crate) fn subquery(id: u64, query: QueryExpr) -> SyntaxNode {
        SyntaxNode::Subquery(SubqueryExpr {
            id: SubqueryId(id),
            query: Box::new(query),
            result_domain: ValueDomain::int(),
            correlation: Cell::new(None),
            location: SourceLocation::default(),
        })
    }
}

pub(crate) mod harness {
    use crate::{
        assemble::PlanHints,
        context::{BlockCells, CompilationContext},
        model::TableModel,
        operand::ExprLowerer,
        scope::{Scope, ScopeKind},
        syntax::SourceAttribute,
        test_support::fixtures::FixtureCatalog,
        types::SpecId,
    };

    ///
    /// Harness
    ///
    /// A compilation context with one open frame, ready for lowering
    /// expressions against fixture scopes.
    ///

    pub(crate) struct Harness {
        pub catalog: FixtureCatalog,
        pub hints: PlanHints,
        pub ctx: CompilationContext,
        pub cells: BlockCells,
    }

    impl Harness {
        pub(crate) fn new(catalog: FixtureCatalog) -> Self {
            let mut ctx = CompilationContext::default();
            let cells = ctx.alloc_block_cells();
            ctx.enter_block().expect("first frame fits");

            Self {
                catalog,
                hints: PlanHints::default(),
                ctx,
                cells,
            }
        }

        /// Register a row-source scope over a fixture table.
        pub(crate) fn scope_table(&mut self, spec: u32, table: &TableModel) {
            let attributes = table
                .attributes
                .iter()
                .map(|attr| SourceAttribute {
                    name: attr.name.clone(),
                    attribute: Some(attr.id),
                    domain: attr.domain,
                })
                .collect();
            self.ctx.register_scope(Scope::new(
                SpecId(spec),
                table.name.clone(),
                ScopeKind::RowSource,
                attributes,
            ));
        }

        pub(crate) fn lowerer(&mut self) -> ExprLowerer<'_> {
            ExprLowerer {
                ctx: &mut self.ctx,
                catalog: &self.catalog,
                hints: &self.hints,
                aggregates: None,
                cells: &self.cells,
            }
        }
    }
}

pub(crate) mod fixtures {
    use crate::{
        domain::ValueDomain,
        model::{AttributeModel, Catalog, CatalogError, IndexModel, TableModel},
        syntax::{
            OrderItem, QueryBlock, QueryExpr, SourceAttribute, SourceDecl, SourceKind, Statement,
            SyntaxNode,
        },
        types::{AttributeId, IndexId, SourceLocation, SpecId, TableId},
    };
    use std::collections::BTreeMap;

    ///
    /// FixtureCatalog
    ///

    #[derive(Debug, Default)]
    pub(crate) struct FixtureCatalog {
        tables: BTreeMap<TableId, TableModel>,
    }

    impl FixtureCatalog {
        pub(crate) fn with_table(mut self, table: TableModel) -> Self {
            self.tables.insert(table.id, table);
            self
        }
    }

    impl Catalog for FixtureCatalog {
        fn table(&self, id: TableId) -> Result<&TableModel, CatalogError> {
            self.tables
                .get(&id)
                .ok_or(CatalogError::UnknownTable { table: id })
        }
    }

    fn attr(id: u32, name: &str, domain: ValueDomain, position: u32) -> AttributeModel {
        AttributeModel {
            id: AttributeId(id),
            name: name.to_string(),
            domain,
            position,
        }
    }

    /// Table `t`: a, k, z, c1, c2, name; single-column index on `k`,
    /// composite index on `(c1, c2)`.
    pub(crate) fn table_t() -> TableModel {
        TableModel {
            id: TableId(1),
            name: "t".to_string(),
            attributes: vec![
                attr(1, "a", ValueDomain::int(), 0),
                attr(2, "k", ValueDomain::int(), 1),
                attr(3, "z", ValueDomain::int(), 2),
                attr(4, "c1", ValueDomain::int(), 3),
                attr(5, "c2", ValueDomain::int(), 4),
                attr(6, "name", ValueDomain::varchar(32), 5),
            ],
            indexes: vec![
                IndexModel {
                    id: IndexId(1),
                    name: "idx_k".to_string(),
                    table: TableId(1),
                    attributes: vec![AttributeId(2)],
                    unique: false,
                },
                IndexModel {
                    id: IndexId(2),
                    name: "idx_c1_c2".to_string(),
                    table: TableId(1),
                    attributes: vec![AttributeId(4), AttributeId(5)],
                    unique: false,
                },
            ],
            partitions: None,
        }
    }

    /// Table `s`: x, y; no indexes.
    pub(crate) fn table_s() -> TableModel {
        TableModel {
            id: TableId(2),
            name: "s".to_string(),
            attributes: vec![
                attr(11, "x", ValueDomain::int(), 0),
                attr(12, "y", ValueDomain::int(), 1),
            ],
            indexes: Vec::new(),
            partitions: None,
        }
    }

    pub(crate) fn catalog() -> FixtureCatalog {
        FixtureCatalog::default()
            .with_table(table_t())
            .with_table(table_s())
    }

    /// Source declaration over a fixture table, exposing every attribute.
    pub(crate) fn table_source(spec: u32, table: &TableModel) -> SourceDecl {
        SourceDecl {
            spec: SpecId(spec),
            name: table.name.clone(),
            kind: SourceKind::Table(table.id),
            attributes: table
                .attributes
                .iter()
                .map(|attr| SourceAttribute {
                    name: attr.name.clone(),
                    attribute: Some(attr.id),
                    domain: attr.domain,
                })
                .collect(),
            location: SourceLocation::default(),
        }
    }

    pub(crate) fn block(
        sources: Vec<SourceDecl>,
        filter: Option<SyntaxNode>,
        select: Vec<SyntaxNode>,
    ) -> QueryBlock {
        QueryBlock {
            sources,
            filter,
            select,
            group_by: Vec::new(),
            having: None,
            order_by: Vec::new(),
            distinct: false,
            location: SourceLocation::default(),
        }
    }

    pub(crate) fn grouped_block(
        sources: Vec<SourceDecl>,
        filter: Option<SyntaxNode>,
        select: Vec<SyntaxNode>,
        group_by: Vec<SyntaxNode>,
        having: Option<SyntaxNode>,
    ) -> QueryBlock {
        QueryBlock {
            sources,
            filter,
            select,
            group_by,
            having,
            order_by: Vec::new(),
            distinct: false,
            location: SourceLocation::default(),
        }
    }

    pub(crate) fn ordered_block(
        sources: Vec<SourceDecl>,
        select: Vec<SyntaxNode>,
        order_by: Vec<OrderItem>,
    ) -> QueryBlock {
        QueryBlock {
            sources,
            filter: None,
            select,
            group_by: Vec::new(),
            having: None,
            order_by,
            distinct: false,
            location: SourceLocation::default(),
        }
    }

    pub(crate) fn statement(block: QueryBlock) -> Statement {
        Statement {
            query: QueryExpr::Block(block),
        }
    }
}

//! Deterministic, serializable projection of a finished plan, consumed by
//! diagnostics and by the plan fingerprint. Arena-local cell identities
//! are deliberately absent so equivalent compilations explain alike.

use crate::{
    access::{AccessMethod, AccessSource, AccessSpec},
    key::KeyRange,
    operand::{ArithOp, Operand},
    plan::{OrderDirection, PlanBody, PlanNode},
    predicate::{ComparisonOp, PredicateExpression},
};
use serde::Serialize;
use std::fmt::Write as _;

///
/// ExplainNode
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExplainNode {
    pub kind: String,
    pub output: Vec<String>,
    pub distinct: bool,
    pub access: Vec<ExplainAccess>,
    pub scan_chain: Vec<ExplainNode>,
    pub access_pointers: Vec<ExplainNode>,
    pub dependent_pointers: Vec<ExplainNode>,
    pub children: Vec<ExplainNode>,
    pub order: Vec<String>,
    pub group: Vec<String>,
    pub aggregates: Vec<String>,
    pub activations: Vec<String>,
}

///
/// ExplainAccess
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ExplainAccess {
    pub source: String,
    pub method: String,
    pub ranges: Vec<String>,
    pub key_filter: Option<String>,
    pub access_filter: Option<String>,
    pub residual_filter: Option<String>,
    pub key_columns: Vec<u32>,
    pub filter_columns: Vec<u32>,
    pub rest_columns: Vec<u32>,
}

///
/// explain
///

#[must_use]
pub fn explain(node: &PlanNode) -> ExplainNode {
    let (kind, children) = match &node.body {
        PlanBody::Scan => ("scan".to_string(), Vec::new()),
        PlanBody::BuildList => ("build-list".to_string(), Vec::new()),
        PlanBody::BuildValue => ("build-value".to_string(), Vec::new()),
        PlanBody::SetOp(setop) => (
            format!(
                "set-op:{:?}{}",
                setop.op,
                if setop.all { ":all" } else { "" }
            )
            .to_lowercase(),
            vec![explain(&setop.left), explain(&setop.right)],
        ),
        PlanBody::MergeList(merge) => (
            "merge-list".to_string(),
            vec![explain(&merge.left), explain(&merge.right)],
        ),
        PlanBody::Fetch(fetch) => (format!("fetch:{}", fetch.table), Vec::new()),
        PlanBody::Insert(dml) => (format!("insert:{}", dml.table), Vec::new()),
        PlanBody::Update(dml) => (format!("update:{}", dml.table), Vec::new()),
        PlanBody::Delete(dml) => (format!("delete:{}", dml.table), Vec::new()),
    };

    let mut activations = Vec::new();
    for (label, activation) in [
        ("row", &node.row_activation),
        ("order", &node.order_activation),
        ("group", &node.group_activation),
    ] {
        if let Some(activation) = activation {
            activations.push(format!(
                "{label}{}: {}",
                if activation.scan_continue { "+continue" } else { "" },
                render_predicate(&activation.pred)
            ));
        }
    }

    ExplainNode {
        kind,
        output: node.output.iter().map(render_operand).collect(),
        distinct: node.distinct,
        access: node.access.iter().map(explain_access).collect(),
        scan_chain: node.scan_chain.iter().map(explain).collect(),
        access_pointers: node.access_pointers.iter().map(|p| explain(p)).collect(),
        dependent_pointers: node.dependent_pointers.iter().map(|p| explain(p)).collect(),
        children,
        order: node.order.as_ref().map_or_else(Vec::new, |order| {
            order.keys.iter().map(|key| render_sort_key(key.position, key.direction)).collect()
        }),
        group: node.group.as_ref().map_or_else(Vec::new, |group| {
            group.keys.iter().map(|key| render_sort_key(key.position, key.direction)).collect()
        }),
        aggregates: node
            .aggregates
            .iter()
            .map(|spec| {
                format!(
                    "{:?}:{:?}@{}{}",
                    spec.kind,
                    spec.option,
                    spec.output_position,
                    spec.index_hint
                        .map_or_else(String::new, |hint| format!(" via {hint}"))
                )
            })
            .collect(),
        activations,
    }
}

fn explain_access(spec: &AccessSpec) -> ExplainAccess {
    let source = match &spec.source {
        AccessSource::Table { table, .. } => format!("table:{table}"),
        AccessSource::Intermediate { .. } => "intermediate".to_string(),
        AccessSource::SetExpr { .. } => "set-expr".to_string(),
        AccessSource::ExternalCall { signature, .. } => format!("call:{}", signature.name),
    };
    let (method, ranges) = match &spec.method {
        AccessMethod::Sequential => ("sequential".to_string(), Vec::new()),
        AccessMethod::Indexed { index, key } => (
            format!(
                "indexed:{index}{}{}",
                if key.is_composite { ":composite" } else { "" },
                if key.is_constant { ":constant" } else { "" }
            ),
            key.ranges.iter().map(render_range).collect(),
        ),
    };

    ExplainAccess {
        source,
        method,
        ranges,
        key_filter: spec.key_filter.as_ref().map(render_predicate),
        access_filter: spec.access_filter.as_ref().map(render_predicate),
        residual_filter: spec.residual_filter.as_ref().map(render_predicate),
        key_columns: spec.key_columns.iter().map(|id| id.0).collect(),
        filter_columns: spec.filter_columns.iter().map(|id| id.0).collect(),
        rest_columns: spec.rest_columns.iter().map(|id| id.0).collect(),
    }
}

fn render_sort_key(position: u32, direction: OrderDirection) -> String {
    match direction {
        OrderDirection::Asc => format!("{position} asc"),
        OrderDirection::Desc => format!("{position} desc"),
    }
}

fn render_range(range: &KeyRange) -> String {
    let mut out = format!("{:?}", range.kind);
    if let Some(lower) = &range.lower {
        let _ = write!(out, " lower={}", render_operand(lower));
    }
    if let Some(upper) = &range.upper {
        let _ = write!(out, " upper={}", render_operand(upper));
    }

    out
}

pub(crate) fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Constant(constant) => format!("const({:?})", constant.value),
        Operand::TupleSlot(slot) => format!("slot({},{})", slot.spec, slot.position),
        Operand::Attribute(attr) => format!("attr({},{})", attr.spec, attr.attribute),
        Operand::Parameter(param) => format!("?{}", param.index),
        Operand::Arith(arith) => {
            let args: Vec<String> = arith.args.iter().map(render_operand).collect();
            let pred = arith
                .pred
                .as_deref()
                .map_or_else(String::new, |pred| format!(" if {}", render_predicate(pred)));

            format!("{}({}){pred}", arith_label(arith.op), args.join(","))
        }
        Operand::Function(function) => {
            let args: Vec<String> = function.args.iter().map(render_operand).collect();

            format!("{:?}({})", function.kind, args.join(","))
        }
        Operand::SubqueryResult(subquery) => {
            format!(
                "subquery({}, {:?})",
                if subquery.single_row { "row" } else { "set" },
                subquery.unbox
            )
        }
        Operand::Pseudo(pseudo) => format!("pseudo:{:?}", pseudo.kind),
    }
}

pub(crate) fn render_predicate(pred: &PredicateExpression) -> String {
    match pred {
        PredicateExpression::And(left, right) => {
            format!("({} AND {})", render_predicate(left), render_predicate(right))
        }
        PredicateExpression::Or(left, right) => {
            format!("({} OR {})", render_predicate(left), render_predicate(right))
        }
        PredicateExpression::Not(inner) => format!("NOT {}", render_predicate(inner)),
        PredicateExpression::Comparison(cmp) => match (&cmp.rhs, cmp.op) {
            (None, ComparisonOp::IsNull) => format!("{} IS NULL", render_operand(&cmp.lhs)),
            (None, ComparisonOp::Exists) => format!("EXISTS {}", render_operand(&cmp.lhs)),
            (Some(rhs), op) => format!(
                "{} {} {}",
                render_operand(&cmp.lhs),
                comparison_label(op),
                render_operand(rhs)
            ),
            (None, op) => format!("{} {}", render_operand(&cmp.lhs), comparison_label(op)),
        },
        PredicateExpression::Quantified(quantified) => format!(
            "{} {} {:?} {}",
            render_operand(&quantified.elem),
            comparison_label(quantified.op),
            quantified.quantifier,
            render_operand(&quantified.set)
        ),
        PredicateExpression::PatternMatch(pattern) => format!(
            "{} LIKE {}{}",
            render_operand(&pattern.subject),
            render_operand(&pattern.pattern),
            pattern
                .escape
                .map_or_else(String::new, |escape| format!(" ESCAPE '{escape}'"))
        ),
    }
}

const fn arith_label(op: ArithOp) -> &'static str {
    match op {
        ArithOp::Add => "add",
        ArithOp::Sub => "sub",
        ArithOp::Mul => "mul",
        ArithOp::Div => "div",
        ArithOp::Mod => "mod",
        ArithOp::Neg => "neg",
        ArithOp::Concat => "concat",
        ArithOp::Case => "case",
    }
}

const fn comparison_label(op: ComparisonOp) -> &'static str {
    match op {
        ComparisonOp::Eq => "=",
        ComparisonOp::Ne => "<>",
        ComparisonOp::Lt => "<",
        ComparisonOp::Le => "<=",
        ComparisonOp::Gt => ">",
        ComparisonOp::Ge => ">=",
        ComparisonOp::IsNull => "IS NULL",
        ComparisonOp::Exists => "EXISTS",
    }
}

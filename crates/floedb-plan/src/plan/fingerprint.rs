//! Plan fingerprinting: a SHA-256 digest over the canonical explain
//! projection. Stable across fresh compilations of the same input; plans
//! that explain alike fingerprint alike.

use crate::plan::{ExplainAccess, ExplainNode, PlanNode, explain};
use sha2::{Digest, Sha256};
use std::fmt;

///
/// PlanFingerprint
///

#[derive(Clone, Copy, Eq, Hash, PartialEq)]
pub struct PlanFingerprint([u8; 32]);

impl PlanFingerprint {
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PlanFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }

        Ok(())
    }
}

impl fmt::Debug for PlanFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PlanFingerprint({self})")
    }
}

///
/// fingerprint
///

#[must_use]
pub fn fingerprint(node: &PlanNode) -> PlanFingerprint {
    let projection = explain(node);
    let mut canon = String::new();
    feed_node(&projection, &mut canon);

    let mut hasher = Sha256::new();
    hasher.update(canon.as_bytes());

    PlanFingerprint(hasher.finalize().into())
}

// Field order here is the canonical form; changing it changes every
// fingerprint.
fn feed_node(node: &ExplainNode, out: &mut String) {
    out.push_str("node{");
    out.push_str(&node.kind);
    out.push(';');
    feed_list(&node.output, out);
    out.push(if node.distinct { 'D' } else { 'd' });
    for access in &node.access {
        feed_access(access, out);
    }
    for child in &node.scan_chain {
        out.push_str("chain:");
        feed_node(child, out);
    }
    for child in &node.access_pointers {
        out.push_str("aptr:");
        feed_node(child, out);
    }
    for child in &node.dependent_pointers {
        out.push_str("dptr:");
        feed_node(child, out);
    }
    for child in &node.children {
        out.push_str("child:");
        feed_node(child, out);
    }
    feed_list(&node.order, out);
    feed_list(&node.group, out);
    feed_list(&node.aggregates, out);
    feed_list(&node.activations, out);
    out.push('}');
}

fn feed_access(access: &ExplainAccess, out: &mut String) {
    out.push_str("access{");
    out.push_str(&access.source);
    out.push(';');
    out.push_str(&access.method);
    out.push(';');
    feed_list(&access.ranges, out);
    for filter in [
        &access.key_filter,
        &access.access_filter,
        &access.residual_filter,
    ] {
        match filter {
            Some(filter) => {
                out.push_str(filter);
                out.push(';');
            }
            None => out.push(';'),
        }
    }
    for columns in [
        &access.key_columns,
        &access.filter_columns,
        &access.rest_columns,
    ] {
        for column in columns {
            out.push_str(&column.to_string());
            out.push(',');
        }
        out.push(';');
    }
    out.push('}');
}

fn feed_list(items: &[String], out: &mut String) {
    out.push('[');
    for item in items {
        out.push_str(item);
        out.push(',');
    }
    out.push(']');
}

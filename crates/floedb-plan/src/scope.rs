use crate::{
    domain::ValueDomain,
    syntax::SourceAttribute,
    types::{AttributeId, SpecId},
};

///
/// Scope machinery
///
/// One frame per query block, one scope per row source; frames form a
/// stack. Enclosing frames are reached by index only (never by reference),
/// so correlation analysis can look outward without dangling once a frame
/// is popped.
///

///
/// ScopeKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ScopeKind {
    /// Live row source: references read attributes in place.
    RowSource,
    /// Materialized intermediate: references read positional tuple slots.
    Intermediate,
}

///
/// Scope
///

#[derive(Clone, Debug)]
pub(crate) struct Scope {
    pub spec: SpecId,
    pub exposed_name: String,
    pub kind: ScopeKind,
    /// Ordered attribute list; slot positions are indexes into it.
    pub attributes: Vec<SourceAttribute>,
    /// Set once an inner scope resolves a name against this scope.
    pub correlated: bool,
}

impl Scope {
    pub(crate) fn new(
        spec: SpecId,
        exposed_name: impl Into<String>,
        kind: ScopeKind,
        attributes: Vec<SourceAttribute>,
    ) -> Self {
        Self {
            spec,
            exposed_name: exposed_name.into(),
            kind,
            attributes,
            correlated: false,
        }
    }

    /// Slot position of a named attribute within this scope.
    pub(crate) fn slot(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|attr| attr.name == name)
    }
}

///
/// ScopeFrame
///

#[derive(Clone, Debug, Default)]
pub(crate) struct ScopeFrame {
    pub scopes: Vec<Scope>,
}

///
/// ColumnBinding
///
/// How a resolved column reference reads its value.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ColumnBinding {
    Attribute { spec: SpecId, attribute: AttributeId },
    TupleSlot { spec: SpecId, position: u32 },
}

///
/// ResolvedColumn
///

#[derive(Clone, Debug)]
pub(crate) struct ResolvedColumn {
    pub binding: ColumnBinding,
    pub domain: ValueDomain,
}

///
/// ScopeStack
///

#[derive(Debug, Default)]
pub(crate) struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub(crate) const fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push_frame(&mut self) {
        self.frames.push(ScopeFrame::default());
    }

    /// Pop the innermost frame. Push/pop discipline is the assembler's;
    /// popping an empty stack is a caller bug surfaced by the Option.
    pub(crate) fn pop_frame(&mut self) -> Option<ScopeFrame> {
        self.frames.pop()
    }

    pub(crate) fn add_scope(&mut self, scope: Scope) {
        if let Some(frame) = self.frames.last_mut() {
            frame.scopes.push(scope);
        }
    }

    /// Locate the frame a spec id is registered in, innermost-first.
    pub(crate) fn find_spec(&self, spec: SpecId) -> Option<(usize, &Scope)> {
        for (frame_index, frame) in self.frames.iter().enumerate().rev() {
            if let Some(scope) = frame.scopes.iter().find(|scope| scope.spec == spec) {
                return Some((frame_index, scope));
            }
        }

        None
    }

    /// Mark the scope an outward resolution bound against as correlated.
    pub(crate) fn mark_correlated_path(&mut self, binding_frame: usize, spec: SpecId) {
        if let Some(frame) = self.frames.get_mut(binding_frame)
            && let Some(scope) = frame.scopes.iter_mut().find(|scope| scope.spec == spec)
        {
            scope.correlated = true;
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(name: &str) -> SourceAttribute {
        SourceAttribute {
            name: name.to_string(),
            attribute: None,
            domain: ValueDomain::int(),
        }
    }

    #[test]
    fn resolution_is_innermost_first() {
        let mut stack = ScopeStack::default();
        stack.push_frame();
        stack.add_scope(Scope::new(SpecId(1), "t", ScopeKind::RowSource, vec![attr("a")]));
        stack.push_frame();
        stack.add_scope(Scope::new(SpecId(2), "s", ScopeKind::RowSource, vec![attr("a")]));

        let (frame, scope) = stack.find_spec(SpecId(2)).expect("inner spec");
        assert_eq!(frame, 1);
        assert_eq!(scope.spec, SpecId(2));

        let (frame, _) = stack.find_spec(SpecId(1)).expect("outer spec");
        assert_eq!(frame, 0);
    }

    #[test]
    fn correlated_path_marks_binding_scope() {
        let mut stack = ScopeStack::default();
        stack.push_frame();
        stack.add_scope(Scope::new(SpecId(1), "t", ScopeKind::RowSource, vec![attr("a")]));
        stack.push_frame();

        stack.mark_correlated_path(0, SpecId(1));

        let (_, scope) = stack.find_spec(SpecId(1)).expect("spec");
        assert!(scope.correlated);
    }
}

//! Parent/child resolution over symbol line spans.
//!
//! Symbols are visited in `(start_line asc, end_line desc)` order with a
//! stack of currently open spans. Each symbol pops every span that ended
//! before it starts; whatever remains on top is its parent. Every symbol is
//! pushed and popped at most once, so the pass is linear after the sort.
//!
//! The sort is stable: symbols with identical spans keep the order the
//! adapter reported them in.

/// A line span, 1-indexed and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start_line: u32,
    pub end_line: u32,
}

impl Span {
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }

    /// `other` lies inside `self` and the two spans are not identical.
    pub fn strictly_contains(&self, other: &Span) -> bool {
        self.start_line <= other.start_line
            && other.end_line <= self.end_line
            && self != other
    }
}

/// Containment edges plus the number of rejected pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    /// `(parent, child)` as indices into the caller's slice.
    pub edges: Vec<(usize, usize)>,
    pub violations: usize,
}

/// Resolve direct parent/child pairs for `spans`.
pub fn resolve(spans: &[Span]) -> Hierarchy {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by(|&a, &b| {
        spans[a]
            .start_line
            .cmp(&spans[b].start_line)
            .then(spans[b].end_line.cmp(&spans[a].end_line))
    });

    let mut hierarchy = Hierarchy::default();
    let mut stack: Vec<usize> = Vec::new();

    for &current in &order {
        let span = spans[current];
        while let Some(&top) = stack.last() {
            if spans[top].end_line < span.start_line {
                stack.pop();
            } else {
                break;
            }
        }

        if let Some(&parent) = stack.last() {
            if spans[parent].strictly_contains(&span) {
                hierarchy.edges.push((parent, current));
            } else {
                hierarchy.violations += 1;
                tracing::warn!(
                    parent = parent,
                    child = current,
                    parent_span = ?(spans[parent].start_line, spans[parent].end_line),
                    child_span = ?(span.start_line, span.end_line),
                    "HierarchyInvariantViolation: spans are not strictly nested, edge dropped"
                );
            }
        }

        stack.push(current);
    }

    hierarchy
}

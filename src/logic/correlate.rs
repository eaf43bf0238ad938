//! Tree correlation used to decide whether an inferred definition changed.
//!
//! Correlation walks the previous and candidate trees together from their
//! roots. Children of a matched pair are paired in three passes, candidate
//! children in successor order, each taking the first unpaired previous
//! child (in successor order) that satisfies the pass:
//!
//! 1. same vertex identity and structurally equal subtree;
//! 2. structurally equal subtree;
//! 3. same vertex identity and same meaning/properties;
//! 4. same meaning/properties only.
//!
//! Identity never overrides structure: a structurally equal pairing is always
//! preferred, so two structurally equal trees correlate as unchanged whatever
//! identities they carry.
//!
//! Paired candidate vertices inherit the identity of their previous
//! counterpart, so an unchanged subtree keeps its identity across versions.
//! The trees are equal when every child on both sides is paired and every
//! pair is recursively equal.

use super::expression::{subtree_equal, vertex_equivalent, LogicalExpression};
use super::graph::VertexId;
use super::LogicError;

/// Result of [`correlate`].
#[derive(Clone, Debug)]
pub struct Correlation {
    /// Candidate tree carrying the identities of matched previous vertices.
    pub merged: LogicalExpression,
    /// Whether the candidate differs structurally from the previous tree.
    pub changed: bool,
}

pub fn correlate(
    previous: &LogicalExpression,
    candidate: &LogicalExpression,
) -> Result<Correlation, LogicError> {
    let mut identities = vec![None; candidate.tree().len()];
    let previous_root = previous.tree().root();
    let candidate_root = candidate.tree().root();
    let equal = vertex_equivalent(previous, previous_root, candidate, candidate_root)
        && correlate_vertex(
            previous,
            previous_root,
            candidate,
            candidate_root,
            &mut identities,
        );
    let merged = LogicalExpression::new(candidate.tree().with_vertex_ids(&identities))?;
    Ok(Correlation {
        merged,
        changed: !equal,
    })
}

fn correlate_vertex(
    previous: &LogicalExpression,
    previous_index: usize,
    candidate: &LogicalExpression,
    candidate_index: usize,
    identities: &mut [Option<VertexId>],
) -> bool {
    if let (Some(vertex), Some(slot)) = (
        previous.vertex(previous_index),
        identities.get_mut(candidate_index),
    ) {
        *slot = Some(vertex.vertex_id());
    }

    let previous_children = previous.successors(previous_index);
    let candidate_children = candidate.successors(candidate_index);
    let mut taken = vec![false; previous_children.len()];
    let mut pairing: Vec<Option<usize>> = vec![None; candidate_children.len()];

    let same_id = |p: usize, c: usize| {
        previous.vertex(p).map(|v| v.vertex_id()) == candidate.vertex(c).map(|v| v.vertex_id())
    };
    let structural = |p: usize, c: usize| subtree_equal(previous, p, candidate, c);
    let shallow = |p: usize, c: usize| vertex_equivalent(previous, p, candidate, c);
    let identical = |p: usize, c: usize| same_id(p, c) && structural(p, c);
    let renamed = |p: usize, c: usize| same_id(p, c) && shallow(p, c);
    let passes: [&dyn Fn(usize, usize) -> bool; 4] = [&identical, &structural, &renamed, &shallow];

    for pass in passes {
        for (slot, &candidate_child) in candidate_children.iter().enumerate() {
            if pairing[slot].is_some() {
                continue;
            }
            let found = (0..previous_children.len()).find(|&position| {
                !taken[position] && pass(previous_children[position], candidate_child)
            });
            if let Some(position) = found {
                taken[position] = true;
                pairing[slot] = Some(position);
            }
        }
    }

    let mut equal = taken.iter().all(|t| *t) && pairing.iter().all(Option::is_some);
    for (slot, paired) in pairing.iter().enumerate() {
        if let Some(position) = paired {
            let child_equal = correlate_vertex(
                previous,
                previous_children[*position],
                candidate,
                candidate_children[slot],
                identities,
            );
            equal = equal && child_equal;
        }
    }
    equal
}

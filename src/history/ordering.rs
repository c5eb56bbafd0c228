//! Ordering, garbage collection and integrity checks over operation lists
//!
//! A history is kept as `(index, skip)` pairs. `skip = N` means the entry
//! supersedes the N indices right before it. Garbage collection drops the
//! superseded entries; what remains must cover `0, 1, 2, ...` without gaps
//! or overlaps.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::operation::{OpIndex, Operation, OperationIndex};
use super::scope::{PerScope, Scope};
use crate::error::{DocumentError, Result};

/// Stable sort by index, keeping skip order among equal indices
pub fn sort_operations<T: OperationIndex>(mut operations: Vec<T>) -> Vec<T> {
    operations.sort_by_key(|op| op.skip());
    operations.sort_by_key(|op| op.index());
    operations
}

/// Reduce a sorted history to the entries still in effect after every skip
pub fn garbage_collect<T: OperationIndex + Clone>(sorted: &[T]) -> Vec<T> {
    let mut kept = Vec::new();
    let mut cursor = sorted.len();

    while cursor > 0 {
        let op = &sorted[cursor - 1];
        kept.push(op.clone());
        let skip_until = op.covered_from() - 1;

        cursor -= 1;
        while cursor > 0 && sorted[cursor - 1].index() as i64 > skip_until {
            cursor -= 1;
        }
    }

    kept.reverse();
    kept
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntegrityCategory {
    MissingIndex,
    DuplicatedIndex,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityIssue {
    pub operation: OpIndex,
    pub category: IntegrityCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Scope>,
    pub message: String,
}

impl IntegrityIssue {
    pub fn in_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Some(scope) => write!(f, "[{}] {:?}: {}", scope, self.category, self.message),
            None => write!(f, "{:?}: {}", self.category, self.message),
        }
    }
}

/// Walk a cleaned, sorted history and report every gap or overlap
pub fn check_cleaned_operations_integrity<T: OperationIndex>(sorted: &[T]) -> Vec<IntegrityIssue> {
    let mut issues = Vec::new();
    let mut current_index: i64 = -1;

    for op in sorted {
        let next_index = op.covered_from();
        if next_index != current_index + 1 {
            let category = if next_index > current_index + 1 {
                IntegrityCategory::MissingIndex
            } else {
                IntegrityCategory::DuplicatedIndex
            };
            issues.push(IntegrityIssue {
                operation: OpIndex::of(op),
                category,
                scope: None,
                message: format!(
                    "Expected index {} with skip 0 or equivalent, got index {} with skip {}",
                    current_index + 1,
                    op.index(),
                    op.skip()
                ),
            });
        }
        current_index = op.index() as i64;
    }

    issues
}

/// Sort, garbage collect and check a raw history
pub fn check_operations_integrity<T: OperationIndex + Clone>(operations: &[T]) -> Vec<IntegrityIssue> {
    let sorted = sort_operations(operations.to_vec());
    check_cleaned_operations_integrity(&garbage_collect(&sorted))
}

/// Skip an undo entry appended after `sorted` must carry, or `-1` when
/// nothing is left to undo.
///
/// ```text
/// []                     -> -1
/// [0:0]                  -> -1
/// [0:0 1:0]              -> 1
/// [0:0 1:1]              -> -1
/// [0:0 1:0 2:0 2:1]      -> 2
/// [0:0 1:1 2:0]          -> 2
/// [0:0 1:1 2:0 3:1]      -> 3
/// ```
pub fn next_skip_number<T: OperationIndex + Clone>(sorted: &[T]) -> i64 {
    if sorted.is_empty() {
        return -1;
    }

    let cleaned = garbage_collect(sorted);
    let Some(last) = cleaned.last() else {
        return -1;
    };

    let mut next_skip = last.skip() as i64 + 1;
    if cleaned.len() > 1 {
        next_skip += cleaned[cleaned.len() - 2].skip() as i64;
    }

    // index 0 counts as nothing to undo
    let last_index = match last.index() {
        0 => -1,
        index => index as i64,
    };

    if last_index < next_skip {
        -1
    } else {
        next_skip
    }
}

/// Entries of `a` whose index does not appear in `b`
pub fn diff_operations<T: OperationIndex + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    a.iter()
        .filter(|op_a| !b.iter().any(|op_b| op_a.index() == op_b.index()))
        .cloned()
        .collect()
}

/// Drop the entries a skip entry at `index` (default: next free index)
/// would supersede, then garbage collect what is left
pub fn skip_header_operations(
    operations: &[Operation],
    skip: u32,
    index: Option<u64>,
) -> Result<Vec<Operation>> {
    let sorted = sort_operations(operations.to_vec());
    let last_index = sorted.last().map(|op| op.index as i64).unwrap_or(-1);
    let header_index = index.map(|i| i as i64).unwrap_or(last_index + 1);

    if header_index < last_index {
        return Err(DocumentError::InvalidSkipHeader {
            index: header_index.max(0) as u64,
            last_index: last_index.max(0) as u64,
        });
    }

    let skip_until = header_index - skip as i64 - 1;
    let remaining: Vec<Operation> = sorted
        .into_iter()
        .filter(|op| op.index as i64 <= skip_until)
        .collect();

    Ok(garbage_collect(&remaining))
}

pub fn garbage_collect_document_operations(
    operations: &PerScope<Vec<Operation>>,
) -> PerScope<Vec<Operation>> {
    operations.map(|_, ops| garbage_collect(&sort_operations(ops.clone())))
}

pub fn group_operations_by_scope(operations: Vec<Operation>) -> PerScope<Vec<Operation>> {
    let mut grouped: PerScope<Vec<Operation>> = PerScope::default();
    for op in operations {
        grouped.get_mut(op.scope()).push(op);
    }
    grouped
}

/// Copy of the operations without their resulting-state checkpoints
pub fn filter_document_operations_resulting_state(
    operations: &PerScope<Vec<Operation>>,
) -> PerScope<Vec<Operation>> {
    operations.map(|_, ops| {
        ops.iter()
            .cloned()
            .map(|mut op| {
                op.resulting_state = None;
                op
            })
            .collect()
    })
}

/// Incoming operations that are not already part of `history`.
///
/// A NOOP with skip 0 is dropped whenever its index is taken.
pub fn remove_existing_operations(
    new_operations: Vec<Operation>,
    history: &[Operation],
) -> Vec<Operation> {
    new_operations
        .into_iter()
        .filter(|new_op| {
            !history.iter().any(|existing| {
                (new_op.is_noop() && new_op.skip == 0 && new_op.index == existing.index)
                    || (new_op.index == existing.index
                        && new_op.skip == existing.skip
                        && new_op.scope() == existing.scope()
                        && new_op.hash == existing.hash
                        && new_op.action_type() == existing.action_type())
            })
        })
        .collect()
}

/// Incoming operations sorted into what can be applied and what cannot
#[derive(Clone, Debug, Default)]
pub struct PreparedOperations {
    pub valid: Vec<Operation>,
    /// At or after the first missing index
    pub invalid: Vec<Operation>,
    pub duplicated: Vec<Operation>,
    pub integrity_issues: Vec<IntegrityIssue>,
}

/// Classify `new_operations` against an existing history of the same scope
pub fn prepare_operations(history: &[Operation], new_operations: &[Operation]) -> PreparedOperations {
    let sorted_history = sort_operations(history.to_vec());
    let sorted_new = sort_operations(new_operations.to_vec());

    let combined: Vec<OpIndex> = sorted_history
        .iter()
        .chain(sorted_new.iter())
        .map(OpIndex::of)
        .collect();
    let issues = check_cleaned_operations_integrity(&combined);

    let first_missing = issues
        .iter()
        .filter(|issue| issue.category == IntegrityCategory::MissingIndex)
        .map(|issue| issue.operation.index)
        .min();

    let mut prepared = PreparedOperations::default();
    for op in sorted_new {
        if first_missing.is_some_and(|missing| op.index >= missing) {
            prepared.invalid.push(op);
            continue;
        }

        let duplicated = issues.iter().any(|issue| {
            issue.category == IntegrityCategory::DuplicatedIndex
                && issue.operation.index == op.index
                && issue.operation.skip == op.skip
        });
        if duplicated {
            prepared.duplicated.push(op);
        } else {
            prepared.valid.push(op);
        }
    }

    prepared.integrity_issues = issues;
    prepared
}

//! Branch reconciliation
//!
//! Two replicas that edited the same scope offline end up with histories
//! sharing a common prefix. `merge` keeps that prefix and reindexes both
//! divergent tails into one sequence; `attach_branch` handles the simpler
//! case of a branch that starts inside the trunk.

use std::collections::VecDeque;

use super::operation::{OpIndex, Operation};
use super::ordering::{garbage_collect, sort_operations};

/// Same position and same intent. Ids, timestamps and hashes are ignored.
pub fn operations_are_equal(a: &Operation, b: &Operation) -> bool {
    a.index == b.index
        && a.skip == b.skip
        && a.action.action_type == b.action.action_type
        && a.action.scope == b.action.scope
        && a.action.input == b.action.input
}

/// Whether `a` sits strictly before `b` in history
pub fn precedes(a: &Operation, b: &Operation) -> bool {
    a.index < b.index || (a.index == b.index && a.id == b.id && a.skip < b.skip)
}

/// Result of walking two histories side by side
#[derive(Clone, Debug, Default)]
pub struct Split {
    pub common: Vec<Operation>,
    pub target_diff: Vec<Operation>,
    pub merge_diff: Vec<Operation>,
}

/// Pairwise walk: equal entries are common until the first divergence,
/// everything after it goes to the side it came from
pub fn split(sorted_target: &[Operation], sorted_merge: &[Operation]) -> Split {
    let mut result = Split::default();
    let mut diverged = false;

    for i in 0..sorted_target.len().max(sorted_merge.len()) {
        match (sorted_target.get(i), sorted_merge.get(i)) {
            (Some(target), Some(merge)) => {
                if !diverged && operations_are_equal(target, merge) {
                    result.common.push(target.clone());
                } else {
                    diverged = true;
                    result.target_diff.push(target.clone());
                    result.merge_diff.push(merge.clone());
                }
            }
            (Some(target), None) => result.target_diff.push(target.clone()),
            (None, Some(merge)) => result.merge_diff.push(merge.clone()),
            (None, None) => break,
        }
    }

    result
}

/// Drop merge-side operations whose id already exists on the target side.
/// Operations without an id are always kept.
pub fn filter_duplicated_operations(
    merge_operations: Vec<Operation>,
    target_operations: &[Operation],
) -> Vec<Operation> {
    merge_operations
        .into_iter()
        .filter(|op| match &op.id {
            Some(id) => !target_operations
                .iter()
                .any(|target| target.id.as_ref() == Some(id)),
            None => true,
        })
        .collect()
}

/// Policy for interleaving two divergent tails
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Reshuffle {
    /// Wall-clock order only
    #[default]
    ByTimestamp,
    /// Wall-clock order, ties broken by original index
    ByTimestampAndIndex,
}

impl Reshuffle {
    pub fn apply(self, start: OpIndex, a: Vec<Operation>, b: Vec<Operation>) -> Vec<Operation> {
        match self {
            Reshuffle::ByTimestamp => reshuffle_by_timestamp(start, a, b),
            Reshuffle::ByTimestampAndIndex => reshuffle_by_timestamp_and_index(start, a, b),
        }
    }
}

pub fn reshuffle_by_timestamp(start: OpIndex, a: Vec<Operation>, b: Vec<Operation>) -> Vec<Operation> {
    let mut operations: Vec<Operation> = a.into_iter().chain(b).collect();
    operations.sort_by(|x, y| x.timestamp_utc_ms.cmp(&y.timestamp_utc_ms));
    reindex(start, operations)
}

pub fn reshuffle_by_timestamp_and_index(
    start: OpIndex,
    a: Vec<Operation>,
    b: Vec<Operation>,
) -> Vec<Operation> {
    let mut operations: Vec<Operation> = a.into_iter().chain(b).collect();
    operations.sort_by(|x, y| {
        x.timestamp_utc_ms
            .cmp(&y.timestamp_utc_ms)
            .then(x.index.cmp(&y.index))
    });
    reindex(start, operations)
}

// Reindexed operations no longer sit on the state their hash was taken
// from, so the hash is cleared and recomputed on replay.
fn reindex(start: OpIndex, operations: Vec<Operation>) -> Vec<Operation> {
    operations
        .into_iter()
        .enumerate()
        .map(|(i, mut op)| {
            op.index = start.index + i as u64;
            op.skip = if i == 0 { start.skip } else { 0 };
            op.hash.clear();
            op.resulting_state = None;
            op
        })
        .collect()
}

fn max_index(sorted: &[Operation]) -> i64 {
    sorted.last().map(|op| op.index as i64).unwrap_or(-1)
}

/// Reconcile two divergent histories of one scope.
///
/// The reshuffled tail starts after the highest index either side has
/// used, with a skip covering every index past the common prefix, so the
/// result still passes the integrity check.
pub fn merge(
    sorted_target: &[Operation],
    sorted_merge: &[Operation],
    reshuffle: Reshuffle,
) -> Vec<Operation> {
    let target = garbage_collect(sorted_target);
    let incoming = garbage_collect(sorted_merge);

    let Split {
        common,
        target_diff,
        merge_diff,
    } = split(&target, &incoming);

    let max_common = max_index(&common);
    let next_index = 1 + max_common.max(max_index(&target)).max(max_index(&incoming));
    let filtered = filter_duplicated_operations(merge_diff, &target_diff);

    log::debug!(
        "merging {} common, {} target and {} incoming operations from index {}",
        common.len(),
        target_diff.len(),
        filtered.len(),
        next_index
    );

    let start = OpIndex::new(next_index as u64, (next_index - (max_common + 1)) as u32);
    let mut merged = common;
    merged.extend(reshuffle.apply(start, target_diff, filtered));
    merged
}

/// Attach a branch that starts inside the trunk.
///
/// Returns the combined history and whatever part of the trunk the branch
/// replaced.
pub fn attach_branch(trunk: &[Operation], branch: &[Operation]) -> (Vec<Operation>, Vec<Operation>) {
    let mut trunk: VecDeque<Operation> =
        garbage_collect(&sort_operations(trunk.to_vec())).into();
    let mut branch: VecDeque<Operation> =
        garbage_collect(&sort_operations(branch.to_vec())).into();

    if trunk.is_empty() {
        return (branch.into(), Vec::new());
    }

    let mut result = Vec::new();
    let mut entered_branch = false;

    while let Some(candidate) = branch.front().cloned() {
        let mut next_trunk = trunk.pop_front();
        while let Some(op) = next_trunk.take() {
            if precedes(&op, &candidate) {
                result.push(op);
                next_trunk = trunk.pop_front();
            } else {
                next_trunk = Some(op);
                break;
            }
        }

        match next_trunk {
            None => entered_branch = true,
            Some(op) if !entered_branch => {
                if operations_are_equal(&op, &candidate) {
                    branch.pop_front();
                    result.push(op);
                } else {
                    trunk.push_front(op);
                    entered_branch = true;
                }
            }
            Some(op) => trunk.push_front(op),
        }

        if entered_branch {
            result.extend(branch.drain(..));
            break;
        }
    }

    if !entered_branch {
        result.extend(trunk.drain(..));
    }

    (garbage_collect(&result), trunk.into())
}

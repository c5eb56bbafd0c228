//! Undo, redo and prune
//!
//! Undo never deletes history: it appends a NOOP whose skip covers the
//! undone operations, then garbage collects and rebuilds the document.
//! Undone operations go to the clipboard, where REDO picks them up and
//! dispatches their actions again.

use chrono::Utc;
use std::mem;

use super::document::{Document, ScopeState};
use super::reducer::{dispatch, DispatchOptions, StateReducer};
use super::replay::{rebuild, replay_document};
use super::signal::SignalHandler;
use crate::error::{DocumentError, RedoError, Result, UndoError};
use crate::history::action;
use crate::history::{
    check_cleaned_operations_integrity, diff_operations, garbage_collect, next_skip_number,
    sort_operations, Action, LoadStatePayload, OpIndex, Operation, OperationIndex, PruneInput,
    Scope,
};

/// Undo the last `count` operations of `scope`
pub fn undo<G, L, R>(
    document: &Document<G, L>,
    count: u32,
    scope: Scope,
    reducer: &R,
) -> Result<Document<G, L>>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    dispatch(
        document,
        action::undo(count, scope),
        reducer,
        None,
        &DispatchOptions::default(),
    )
}

/// Re-apply the most recently undone operation of `scope`
pub fn redo<G, L, R>(
    document: &Document<G, L>,
    scope: Scope,
    reducer: &R,
) -> Result<Document<G, L>>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    dispatch(
        document,
        action::redo(1, scope),
        reducer,
        None,
        &DispatchOptions::default(),
    )
}

/// Collapse operations `start..end` of `scope` into a single LOAD_STATE
pub fn prune<G, L, R>(
    document: &Document<G, L>,
    start: Option<usize>,
    end: Option<usize>,
    scope: Scope,
    reducer: &R,
) -> Result<Document<G, L>>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    dispatch(
        document,
        action::prune(start, end, scope),
        reducer,
        None,
        &DispatchOptions::default(),
    )
}

pub(crate) fn apply_undo<G, L, R>(
    document: &mut Document<G, L>,
    action: &Action,
    skip: u32,
    reducer: &R,
    signals: Option<&dyn SignalHandler>,
    options: &DispatchOptions,
) -> Result<()>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    if skip > 0 {
        return Err(DocumentError::UndoUnderflow(UndoError::SkipHeld(skip)));
    }
    let count: u32 = action.parse_input()?;
    if count == 0 {
        return Err(DocumentError::UndoUnderflow(UndoError::ZeroCount));
    }

    let scope = action.scope;
    let before = garbage_collect(&sort_operations(document.operations.get(scope).clone()));
    for _ in 0..count {
        push_undo_step(document, action, scope)?;
    }
    let after = garbage_collect(&sort_operations(document.operations.get(scope).clone()));

    let undone: Vec<Operation> = diff_operations(&before, &after)
        .into_iter()
        .filter(|op| !op.is_noop())
        .collect();
    log::debug!("Undo in {} scope moved {} operations to the clipboard", scope, undone.len());

    let mut clipboard = mem::take(&mut document.clipboard);
    clipboard.extend(undone);
    let mut clipboard = sort_operations(clipboard);
    clipboard.reverse();
    document.clipboard = clipboard;

    *document = rebuild(document, reducer, signals, &options.replay_options())?;
    Ok(())
}

/// Append one NOOP superseding the next operation still in effect.
///
/// A trailing NOOP that already skips is followed by another NOOP at the
/// same index with a larger skip.
fn push_undo_step<G, L>(document: &mut Document<G, L>, action: &Action, scope: Scope) -> Result<()>
where
    G: ScopeState,
    L: ScopeState,
{
    let mut history = sort_operations(mem::take(document.operations.get_mut(scope)));
    let (index, reuse_index) = match history.last() {
        Some(last) if last.is_noop() && last.skip > 0 => (last.index, true),
        Some(last) => (last.index + 1, false),
        None => return Err(DocumentError::UndoUnderflow(UndoError::HistoryExhausted)),
    };

    let mut candidate: Vec<OpIndex> = history.iter().map(OpIndex::of).collect();
    if !reuse_index {
        candidate.push(OpIndex::new(index, 0));
    }
    let skip = next_skip_number(&candidate);
    if skip < 1 {
        return Err(DocumentError::UndoUnderflow(UndoError::HistoryExhausted));
    }

    let mut noop = action::noop(scope);
    noop.timestamp_utc_ms = action.timestamp_utc_ms;
    let mut operation = Operation::new(noop, index, skip as u32);
    operation.timestamp_utc_ms = action.timestamp_utc_ms;

    history.push(operation);
    *document.operations.get_mut(scope) = history;
    document.refresh_revision(scope);
    Ok(())
}

/// Take the clipboard entry a REDO re-applies and return its action
pub(crate) fn take_redo<G, L>(
    document: &mut Document<G, L>,
    action: &Action,
    skip: u32,
) -> Result<Action>
where
    G: ScopeState,
    L: ScopeState,
{
    if skip > 0 {
        return Err(DocumentError::RedoUnavailable(RedoError::SkipHeld(skip)));
    }
    let count: u32 = action.parse_input()?;
    if count > 1 {
        return Err(DocumentError::RedoUnavailable(RedoError::BatchUnsupported(count)));
    }
    if document.clipboard.is_empty() {
        return Err(DocumentError::RedoUnavailable(RedoError::EmptyClipboard));
    }

    let position = document
        .clipboard
        .iter()
        .rposition(|op| op.scope() == action.scope)
        .ok_or(DocumentError::RedoUnavailable(RedoError::NoMatchingScope(action.scope)))?;
    let entry = document.clipboard.remove(position);
    log::debug!("Redoing {} from {} scope", entry.action_type(), action.scope);

    let mut redone = entry.action;
    redone.timestamp_utc_ms = Utc::now();
    Ok(redone)
}

pub(crate) fn apply_prune<G, L, R>(
    document: &mut Document<G, L>,
    action: &Action,
    reducer: &R,
    signals: Option<&dyn SignalHandler>,
    options: &DispatchOptions,
) -> Result<()>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    let input: PruneInput = action.parse_input()?;
    let scope = action.scope;
    let history = garbage_collect(&sort_operations(document.operations.get(scope).clone()));
    let issues = check_cleaned_operations_integrity(&history);
    if !issues.is_empty() {
        return Err(DocumentError::IntegrityViolation(
            issues.into_iter().map(|issue| issue.in_scope(scope)).collect(),
        ));
    }
    let len = history.len();
    let start = input.start.unwrap_or(0);
    let end = input.end.unwrap_or(len);
    if start > end || end > len {
        return Err(DocumentError::InvalidPruneRange { start, end, len });
    }
    if start == end {
        log::debug!("Empty prune range {}..{} in {} scope", start, end, scope);
        return Ok(());
    }

    let replay_options = options.replay_options();
    let mut partial_history = document.operations.clone();
    *partial_history.get_mut(scope) = history[..end].to_vec();
    let partial = replay_document(
        &document.initial_state,
        &partial_history,
        reducer,
        &document.header,
        signals,
        &replay_options,
    )?;

    let payload = LoadStatePayload {
        name: partial.header.name.clone(),
        global: partial.state.scope_value(Scope::Global)?,
        local: partial.state.scope_value(Scope::Local)?,
    };

    let head = &history[..start];
    let tail = &history[end..];
    let timestamp = head
        .last()
        .or_else(|| tail.first())
        .map(|op| op.timestamp_utc_ms)
        .unwrap_or_else(Utc::now);

    let load_index = head.last().map(|op| op.index + 1).unwrap_or(0);
    let mut load = action::load_state(payload, end - start, scope);
    load.timestamp_utc_ms = timestamp;
    let mut load_operation = Operation::new(load, load_index, 0);
    load_operation.timestamp_utc_ms = timestamp;
    load_operation.hash = partial.hash_scope(scope)?;

    // one shift for the whole tail keeps every skip on the same predecessors
    let shift = tail
        .first()
        .map(|op| (op.covered_from() - load_index as i64 - 1) as u64)
        .unwrap_or(0);
    let mut pruned = head.to_vec();
    pruned.push(load_operation);
    pruned.extend(tail.iter().cloned().map(|mut op| {
        op.index -= shift;
        op
    }));
    log::debug!(
        "Pruned {} operations of {} scope into one LOAD_STATE",
        end - start,
        scope
    );

    *document.operations.get_mut(scope) = pruned;
    *document = rebuild(document, reducer, signals, &replay_options)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{create_document, DocumentState};
    use crate::error::ReducerError;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    #[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        count: i64,
    }

    type CounterDocument = Document<Counter, Value>;

    fn counter_reducer(
        state: &mut DocumentState<Counter, Value>,
        action: &Action,
        _signals: Option<&dyn SignalHandler>,
    ) -> std::result::Result<(), ReducerError> {
        match action.action_type.as_str() {
            "INCREMENT" => state.global.count += 1,
            "SELECT" => state.local = action.input.clone(),
            _ => {}
        }
        Ok(())
    }

    fn increments(n: usize) -> CounterDocument {
        let mut doc = create_document("test/counter", DocumentState::new(Counter::default(), json!(null)));
        for _ in 0..n {
            let increment = Action::new("INCREMENT", Value::Null, Scope::Global).unwrap();
            doc = dispatch(&doc, increment, &counter_reducer, None, &DispatchOptions::default())
                .unwrap();
        }
        doc
    }

    fn positions(doc: &CounterDocument, scope: Scope) -> Vec<(u64, u32)> {
        doc.operations(scope).iter().map(|op| (op.index, op.skip)).collect()
    }

    #[test]
    fn test_undo_appends_noop() {
        let doc = undo(&increments(5), 1, Scope::Global, &counter_reducer).unwrap();

        assert_eq!(doc.state.global.count, 4);
        assert_eq!(
            positions(&doc, Scope::Global),
            vec![(0, 0), (1, 0), (2, 0), (3, 0), (5, 1)]
        );
        assert!(doc.operations(Scope::Global)[4].is_noop());
        assert_eq!(doc.revision(Scope::Global), 6);
        assert_eq!(doc.clipboard.len(), 1);
        assert_eq!(doc.clipboard[0].index, 4);
    }

    #[test]
    fn test_consecutive_undos_share_index() {
        let doc = increments(5);
        let doc = undo(&doc, 1, Scope::Global, &counter_reducer).unwrap();
        let doc = undo(&doc, 1, Scope::Global, &counter_reducer).unwrap();

        assert_eq!(doc.state.global.count, 3);
        assert_eq!(
            positions(&doc, Scope::Global),
            vec![(0, 0), (1, 0), (2, 0), (5, 2)]
        );
        let clipboard: Vec<u64> = doc.clipboard.iter().map(|op| op.index).collect();
        assert_eq!(clipboard, vec![4, 3]);

        let doc = undo(&doc, 1, Scope::Global, &counter_reducer).unwrap();
        assert_eq!(positions(&doc, Scope::Global), vec![(0, 0), (1, 0), (5, 3)]);
    }

    #[test]
    fn test_undo_count() {
        let doc = undo(&increments(5), 3, Scope::Global, &counter_reducer).unwrap();
        assert_eq!(doc.state.global.count, 2);
        assert_eq!(positions(&doc, Scope::Global), vec![(0, 0), (1, 0), (5, 3)]);

        let err = undo(&increments(2), 0, Scope::Global, &counter_reducer).unwrap_err();
        assert!(matches!(err, DocumentError::UndoUnderflow(UndoError::ZeroCount)));
    }

    #[test]
    fn test_undo_past_history() {
        let doc = undo(&increments(1), 1, Scope::Global, &counter_reducer).unwrap();
        assert_eq!(doc.state.global.count, 0);

        let err = undo(&doc, 1, Scope::Global, &counter_reducer).unwrap_err();
        assert!(matches!(err, DocumentError::UndoUnderflow(UndoError::HistoryExhausted)));

        let err = undo(&increments(0), 1, Scope::Global, &counter_reducer).unwrap_err();
        assert!(matches!(err, DocumentError::UndoUnderflow(UndoError::HistoryExhausted)));
    }

    #[test]
    fn test_undo_with_held_skip() {
        let options = DispatchOptions::default().with_skip(1);
        let err = dispatch(
            &increments(3),
            action::undo(1, Scope::Global),
            &counter_reducer,
            None,
            &options,
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::UndoUnderflow(UndoError::SkipHeld(1))));
    }

    #[test]
    fn test_redo_restores_state() {
        let original = increments(3);
        let undone = undo(&original, 1, Scope::Global, &counter_reducer).unwrap();
        let redone = redo(&undone, Scope::Global, &counter_reducer).unwrap();

        assert_eq!(redone.state, original.state);
        assert!(redone.clipboard.is_empty());
        let last = redone.operations(Scope::Global).last().unwrap();
        assert_eq!(last.action_type(), "INCREMENT");
        assert_eq!(last.index, 4);
    }

    #[test]
    fn test_redo_errors() {
        let doc = increments(2);
        let err = redo(&doc, Scope::Global, &counter_reducer).unwrap_err();
        assert!(matches!(err, DocumentError::RedoUnavailable(RedoError::EmptyClipboard)));

        let undone = undo(&doc, 1, Scope::Global, &counter_reducer).unwrap();
        let err = redo(&undone, Scope::Local, &counter_reducer).unwrap_err();
        assert!(matches!(
            err,
            DocumentError::RedoUnavailable(RedoError::NoMatchingScope(Scope::Local))
        ));

        let err = dispatch(
            &undone,
            action::redo(2, Scope::Global),
            &counter_reducer,
            None,
            &DispatchOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::RedoUnavailable(RedoError::BatchUnsupported(2))));
    }

    #[test]
    fn test_new_action_clears_clipboard() {
        let undone = undo(&increments(3), 1, Scope::Global, &counter_reducer).unwrap();
        assert_eq!(undone.clipboard.len(), 1);

        let increment = Action::new("INCREMENT", Value::Null, Scope::Global).unwrap();
        let doc = dispatch(&undone, increment, &counter_reducer, None, &DispatchOptions::default())
            .unwrap();
        assert!(doc.clipboard.is_empty());
    }

    #[test]
    fn test_prune_keeps_state() {
        let doc = dispatch(
            &increments(5),
            action::set_name("pruned"),
            &counter_reducer,
            None,
            &DispatchOptions::default(),
        )
        .unwrap();
        let pruned = prune(&doc, Some(1), Some(4), Scope::Global, &counter_reducer).unwrap();

        assert_eq!(pruned.state, doc.state);
        assert_eq!(pruned.name(), "pruned");

        let ops = pruned.operations(Scope::Global);
        let types: Vec<&str> = ops.iter().map(|op| op.action_type()).collect();
        assert_eq!(types, vec!["INCREMENT", "LOAD_STATE", "INCREMENT", "SET_NAME"]);
        assert_eq!(positions(&pruned, Scope::Global), vec![(0, 0), (1, 0), (2, 0), (3, 0)]);
        assert_eq!(ops[1].timestamp_utc_ms, doc.operations(Scope::Global)[0].timestamp_utc_ms);
        assert_eq!(pruned.revision(Scope::Global), 4);
    }

    #[test]
    fn test_prune_whole_history() {
        let doc = increments(3);
        let pruned = prune(&doc, None, None, Scope::Global, &counter_reducer).unwrap();

        assert_eq!(pruned.state.global.count, 3);
        let ops = pruned.operations(Scope::Global);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].action_type(), "LOAD_STATE");
        assert_eq!(ops[0].hash, doc.operations(Scope::Global)[2].hash);
    }

    #[test]
    fn test_prune_after_undo_keeps_state() {
        let doc = undo(&increments(4), 1, Scope::Global, &counter_reducer).unwrap();
        assert_eq!(positions(&doc, Scope::Global), vec![(0, 0), (1, 0), (2, 0), (4, 1)]);

        let pruned = prune(&doc, Some(0), Some(1), Scope::Global, &counter_reducer).unwrap();
        assert_eq!(pruned.state, doc.state);
        assert_eq!(positions(&pruned, Scope::Global), vec![(0, 0), (1, 0), (2, 0), (4, 1)]);

        let pruned = prune(&doc, Some(1), Some(3), Scope::Global, &counter_reducer).unwrap();
        assert_eq!(pruned.state.global.count, 3);
        assert_eq!(positions(&pruned, Scope::Global), vec![(0, 0), (1, 0), (3, 1)]);
        assert!(check_cleaned_operations_integrity(pruned.operations(Scope::Global)).is_empty());

        // undoing the LOAD_STATE goes back to before the pruned range
        let next = undo(&pruned, 1, Scope::Global, &counter_reducer).unwrap();
        assert_eq!(next.state.global.count, 1);
        assert_eq!(positions(&next, Scope::Global), vec![(0, 0), (3, 2)]);
    }

    #[test]
    fn test_prune_range_counts_operations_in_effect() {
        let doc = increments(5);
        let doc = undo(&doc, 2, Scope::Global, &counter_reducer).unwrap();
        assert_eq!(doc.operations(Scope::Global).len(), 4);

        let err = prune(&doc, None, Some(5), Scope::Global, &counter_reducer).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidPruneRange { len: 4, .. }));

        let pruned = prune(&doc, Some(2), None, Scope::Global, &counter_reducer).unwrap();
        assert_eq!(pruned.state.global.count, 3);
        assert_eq!(positions(&pruned, Scope::Global), vec![(0, 0), (1, 0), (2, 0)]);
    }

    #[test]
    fn test_prune_invalid_range() {
        let err = prune(&increments(2), Some(2), Some(1), Scope::Global, &counter_reducer).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidPruneRange { start: 2, end: 1, len: 2 }));

        let err = prune(&increments(2), None, Some(5), Scope::Global, &counter_reducer).unwrap_err();
        assert!(matches!(err, DocumentError::InvalidPruneRange { .. }));
    }
}

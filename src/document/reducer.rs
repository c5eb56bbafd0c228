//! The dispatch pipeline
//!
//! Every mutation of a document goes through [`dispatch`]: control actions
//! are handled by the engine, everything else by the model's
//! [`StateReducer`]. The result is a new document with the action recorded
//! as an operation in its scope history.

use std::mem;

use super::document::{Document, DocumentState, ScopeState};
use super::replay::{replay_scope, ReplayOptions};
use super::signal::SignalHandler;
use super::undo;
use crate::error::{DocumentError, ReducerError, Result};
use crate::history::action::{LOAD_STATE, PRUNE, REDO, SET_NAME, UNDO};
use crate::history::{
    check_cleaned_operations_integrity, garbage_collect_document_operations,
    skip_header_operations, sort_operations, Action, LoadStateInput, OpIndex, Operation, Scope,
};

/// Model-specific state transition.
///
/// Called once per non-control action with the whole document state; a
/// reducer is expected to touch only `action.scope`. Returning `Err` leaves
/// the state as it was and records the message on the operation.
pub trait StateReducer<G, L> {
    fn reduce(
        &self,
        state: &mut DocumentState<G, L>,
        action: &Action,
        signals: Option<&dyn SignalHandler>,
    ) -> std::result::Result<(), ReducerError>;
}

impl<G, L, F> StateReducer<G, L> for F
where
    F: Fn(
        &mut DocumentState<G, L>,
        &Action,
        Option<&dyn SignalHandler>,
    ) -> std::result::Result<(), ReducerError>,
{
    fn reduce(
        &self,
        state: &mut DocumentState<G, L>,
        action: &Action,
        signals: Option<&dyn SignalHandler>,
    ) -> std::result::Result<(), ReducerError> {
        self(state, action, signals)
    }
}

#[derive(Clone, Debug)]
pub struct DispatchOptions {
    /// Number of preceding operations the new one supersedes
    pub skip: Option<u32>,
    /// Record the skip without recomputing the scope state
    pub ignore_skip_operations: bool,
    /// Store the resulting scope state on the operation and seed from
    /// stored states when recomputing
    pub reuse_operation_resulting_state: bool,
    /// Recompute and compare the hash of a replayed operation instead of
    /// trusting it
    pub check_hashes: bool,
    /// Garbage collect the history after a skip has been processed
    pub prune_on_skip: bool,
    /// Recorded operation being re-applied
    pub replay: Option<Operation>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            skip: None,
            ignore_skip_operations: false,
            reuse_operation_resulting_state: false,
            check_hashes: true,
            prune_on_skip: true,
            replay: None,
        }
    }
}

impl DispatchOptions {
    pub fn with_skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn ignore_skip_operations(mut self, ignore: bool) -> Self {
        self.ignore_skip_operations = ignore;
        self
    }

    pub fn reuse_resulting_state(mut self, reuse: bool) -> Self {
        self.reuse_operation_resulting_state = reuse;
        self
    }

    pub fn check_hashes(mut self, check: bool) -> Self {
        self.check_hashes = check;
        self
    }

    pub fn prune_on_skip(mut self, prune: bool) -> Self {
        self.prune_on_skip = prune;
        self
    }

    pub fn replaying(mut self, operation: Operation) -> Self {
        self.replay = Some(operation);
        self
    }

    pub(crate) fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            check_hashes: self.check_hashes,
            reuse_operation_resulting_state: self.reuse_operation_resulting_state,
        }
    }
}

/// Apply an action, returning the updated document.
///
/// Reducer failures are recorded on the new operation, not returned.
/// Engine failures (undo past the start of history, hash mismatch on a
/// replayed operation, ...) leave `document` untouched and are returned.
pub fn dispatch<G, L, R>(
    document: &Document<G, L>,
    action: Action,
    reducer: &R,
    signals: Option<&dyn SignalHandler>,
    options: &DispatchOptions,
) -> Result<Document<G, L>>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    let mut next = document.clone();
    apply(&mut next, action, reducer, signals, options)?;
    Ok(next)
}

/// In-place dispatch; `document` may be partially updated on error
pub(crate) fn apply<G, L, R>(
    document: &mut Document<G, L>,
    action: Action,
    reducer: &R,
    signals: Option<&dyn SignalHandler>,
    options: &DispatchOptions,
) -> Result<()>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    let skip = options
        .skip
        .or_else(|| options.replay.as_ref().map(|op| op.skip))
        .unwrap_or(0);
    let process_skip = !options.ignore_skip_operations && skip > 0;

    let action = match action.action_type.as_str() {
        UNDO => return undo::apply_undo(document, &action, skip, reducer, signals, options),
        REDO => undo::take_redo(document, &action, skip)?,
        _ => {
            if !document.clipboard.is_empty() {
                log::debug!("Clearing {} redo entries", document.clipboard.len());
                document.clipboard.clear();
            }
            action
        }
    };
    let scope = action.scope;

    match action.action_type.as_str() {
        SET_NAME => document.header.name = action.parse_input::<String>()?,
        PRUNE => return undo::apply_prune(document, &action, reducer, signals, options),
        LOAD_STATE => {
            let input: LoadStateInput = action.parse_input()?;
            if scope == Scope::Global {
                document.header.name = input.state.name.clone();
            }
            document
                .state
                .replace_scope(scope, input.state.scope(scope).clone())?;
        }
        _ => {}
    }

    let mut operation = position_operation(document, &action, skip, options.replay.as_ref())?;

    let before_skip = if process_skip {
        let snapshot = (document.state.clone(), document.operations.clone());
        let kept = skip_header_operations(document.operations.get(scope), skip, Some(operation.index))?;
        let mut positions: Vec<OpIndex> = kept.iter().map(OpIndex::of).collect();
        positions.push(OpIndex::of(&operation));
        let issues = check_cleaned_operations_integrity(&positions);
        if !issues.is_empty() {
            log::warn!(
                "Rejected skip {} at {}:{}: {} integrity issues",
                skip,
                scope,
                operation.index,
                issues.len()
            );
            return Err(DocumentError::IntegrityViolation(
                issues.into_iter().map(|issue| issue.in_scope(scope)).collect(),
            ));
        }
        log::debug!(
            "Processing skip {} at {}:{}, {} operations kept",
            skip,
            scope,
            operation.index,
            kept.len()
        );
        let recomputed = replay_scope(
            &document.initial_state.state,
            scope,
            &kept,
            reducer,
            signals,
            &document.header,
            &options.replay_options(),
        )?;
        document.state.copy_scope_from(scope, &recomputed);
        Some(snapshot)
    } else {
        None
    };

    if !action.is_control() {
        let previous = document.state.clone();
        if let Err(err) = reducer.reduce(&mut document.state, &action, signals) {
            log::warn!(
                "Reducer rejected {} at {}:{}: {}",
                action.action_type,
                scope,
                operation.index,
                err
            );
            operation.error = Some(err.message().to_string());
            operation.skip = 0;
            match before_skip {
                Some((state, operations)) => {
                    document.state = state;
                    document.operations = operations;
                }
                None => document.state = previous,
            }
        }
    }

    operation.hash = resolve_hash(document, scope, options)?;
    if options.reuse_operation_resulting_state {
        let state = document.state.scope_value(scope)?;
        operation.resulting_state = Some(serde_json::to_string(&state)?);
    }

    if !action.is_control() && operation.error.is_none() {
        for input in &action.attachments {
            document
                .attachments
                .insert(input.reference(), input.attachment.clone());
        }
    }

    let superseding = operation.skip > 0;
    document.operations.get_mut(scope).push(operation);
    if process_skip && superseding && options.prune_on_skip {
        document.operations = garbage_collect_document_operations(&document.operations);
    }
    document.refresh_revision(scope);
    Ok(())
}

/// Build the history entry for `action`, checking that a replayed
/// operation follows on from the scope's history
pub(crate) fn position_operation<G, L>(
    document: &mut Document<G, L>,
    action: &Action,
    skip: u32,
    replay: Option<&Operation>,
) -> Result<Operation>
where
    G: ScopeState,
    L: ScopeState,
{
    let scope = action.scope;
    let history = mem::take(document.operations.get_mut(scope));
    let history = sort_operations(history);
    let next_index = history.last().map(|op| op.index + 1).unwrap_or(0);
    *document.operations.get_mut(scope) = history;

    let operation = match replay {
        Some(recorded) => {
            if recorded.index as i64 - skip as i64 > next_index as i64 {
                return Err(DocumentError::MissingOperations {
                    expected: next_index,
                    index: recorded.index,
                    skip,
                });
            }
            let mut operation = recorded.clone();
            operation.action = action.clone();
            operation.skip = skip;
            operation.error = None;
            operation
        }
        None => {
            let mut operation = Operation::new(action.clone(), next_index, skip);
            operation.timestamp_utc_ms = action.timestamp_utc_ms;
            operation
        }
    };
    Ok(operation)
}

fn resolve_hash<G, L>(
    document: &Document<G, L>,
    scope: Scope,
    options: &DispatchOptions,
) -> Result<String>
where
    G: ScopeState,
    L: ScopeState,
{
    let recorded = options
        .replay
        .as_ref()
        .map(|op| op.hash.as_str())
        .filter(|hash| !hash.is_empty());

    match recorded {
        Some(recorded) if !options.check_hashes => Ok(recorded.to_string()),
        Some(recorded) => {
            let actual = document.hash_scope(scope)?;
            if actual != recorded {
                return Err(DocumentError::HashMismatch {
                    scope,
                    expected: recorded.to_string(),
                    actual,
                });
            }
            Ok(actual)
        }
        None => document.hash_scope(scope),
    }
}

//! Rebuilding documents from their history

use std::collections::BTreeMap;

use super::document::{Document, DocumentState, Header, InitialState, ScopeState};
use super::reducer::{apply, DispatchOptions, StateReducer};
use super::signal::SignalHandler;
use crate::error::{DocumentError, Result};
use crate::history::{garbage_collect, sort_operations, Operation, PerScope, Scope};

#[derive(Clone, Copy, Debug)]
pub struct ReplayOptions {
    /// Recompute every operation's hash and compare it with the recorded
    /// one. When off, recorded hashes are trusted and only the final hash
    /// of each scope is verified.
    pub check_hashes: bool,
    /// Seed each scope from its last stored resulting state and replay
    /// only what follows it
    pub reuse_operation_resulting_state: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            check_hashes: true,
            reuse_operation_resulting_state: false,
        }
    }
}

impl ReplayOptions {
    pub fn check_hashes(mut self, check: bool) -> Self {
        self.check_hashes = check;
        self
    }

    pub fn reuse_resulting_state(mut self, reuse: bool) -> Self {
        self.reuse_operation_resulting_state = reuse;
        self
    }
}

/// Rebuild a document by re-applying `operations` over `initial_state`.
///
/// Each scope history is sorted and garbage collected first. The header
/// supplies identity and hash settings; its revision is recomputed.
pub fn replay_document<G, L, R>(
    initial_state: &InitialState<G, L>,
    operations: &PerScope<Vec<Operation>>,
    reducer: &R,
    header: &Header,
    signals: Option<&dyn SignalHandler>,
    options: &ReplayOptions,
) -> Result<Document<G, L>>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    let mut document = Document {
        header: header.clone(),
        state: initial_state.state.clone(),
        initial_state: initial_state.clone(),
        operations: PerScope::default(),
        clipboard: Vec::new(),
        attachments: BTreeMap::new(),
    };
    document.header.name = initial_state.name.clone();
    document.header.revision = PerScope::default();

    let dispatch_options = DispatchOptions {
        skip: None,
        ignore_skip_operations: true,
        reuse_operation_resulting_state: options.reuse_operation_resulting_state,
        check_hashes: options.check_hashes,
        prune_on_skip: false,
        replay: None,
    };

    for scope in Scope::ALL {
        let history = garbage_collect(&sort_operations(operations.get(scope).clone()));
        let start = if options.reuse_operation_resulting_state {
            seed_from_checkpoint(&mut document, scope, &history)
        } else {
            0
        };
        if start > 0 && scope == Scope::Global {
            document.header.name = header.name.clone();
        }

        let pending = &history[start..];
        for operation in pending {
            let replaying = DispatchOptions {
                replay: Some(operation.clone()),
                ..dispatch_options.clone()
            };
            apply(
                &mut document,
                operation.action.clone(),
                reducer,
                signals,
                &replaying,
            )?;
        }

        if !options.check_hashes {
            if let Some(last) = pending.last() {
                verify_final_hash(&document, scope, &last.hash)?;
            }
        }
    }

    for scope in Scope::ALL {
        document.refresh_revision(scope);
    }
    Ok(document)
}

/// Seed `scope` from the last operation carrying a resulting state.
///
/// Returns how many leading operations the checkpoint covers, or 0 when
/// the scope has to be replayed from the start.
fn seed_from_checkpoint<G, L>(
    document: &mut Document<G, L>,
    scope: Scope,
    history: &[Operation],
) -> usize
where
    G: ScopeState,
    L: ScopeState,
{
    let Some(position) = history.iter().rposition(|op| op.resulting_state.is_some()) else {
        return 0;
    };
    let checkpoint = &history[position];
    let stored = checkpoint.resulting_state.as_deref().unwrap_or_default();

    let seeded = serde_json::from_str(stored)
        .map_err(DocumentError::from)
        .and_then(|value| document.state.replace_scope(scope, value));
    match seeded {
        Ok(()) => {
            log::debug!(
                "Seeding {} scope from resulting state at index {}",
                scope,
                checkpoint.index
            );
            *document.operations.get_mut(scope) = history[..=position].to_vec();
            position + 1
        }
        Err(err) => {
            log::warn!(
                "Unreadable resulting state at {}:{}, replaying the whole scope: {}",
                scope,
                checkpoint.index,
                err
            );
            0
        }
    }
}

fn verify_final_hash<G, L>(document: &Document<G, L>, scope: Scope, expected: &str) -> Result<()>
where
    G: ScopeState,
    L: ScopeState,
{
    if expected.is_empty() {
        return Ok(());
    }
    let actual = document.hash_scope(scope)?;
    if actual != expected {
        return Err(DocumentError::HashMismatch {
            scope,
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// State of one scope after replaying `operations` over `initial`
pub(crate) fn replay_scope<G, L, R>(
    initial: &DocumentState<G, L>,
    scope: Scope,
    operations: &[Operation],
    reducer: &R,
    signals: Option<&dyn SignalHandler>,
    header: &Header,
    options: &ReplayOptions,
) -> Result<DocumentState<G, L>>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    let initial_state = InitialState {
        name: header.name.clone(),
        state: initial.clone(),
    };
    let mut history = PerScope::<Vec<Operation>>::default();
    *history.get_mut(scope) = operations.to_vec();

    let replayed = replay_document(&initial_state, &history, reducer, header, signals, options)?;
    Ok(replayed.state)
}

/// Replay a document's own history, keeping its clipboard and attachments
pub(crate) fn rebuild<G, L, R>(
    document: &Document<G, L>,
    reducer: &R,
    signals: Option<&dyn SignalHandler>,
    options: &ReplayOptions,
) -> Result<Document<G, L>>
where
    G: ScopeState,
    L: ScopeState,
    R: StateReducer<G, L> + ?Sized,
{
    let mut rebuilt = replay_document(
        &document.initial_state,
        &document.operations,
        reducer,
        &document.header,
        signals,
        options,
    )?;
    rebuilt.clipboard = document.clipboard.clone();
    for (reference, attachment) in &document.attachments {
        rebuilt
            .attachments
            .entry(reference.clone())
            .or_insert_with(|| attachment.clone());
    }
    Ok(rebuilt)
}

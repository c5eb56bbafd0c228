//! Documents and the engine that evolves them
//!
//! A document is only ever changed by dispatching actions. Undo, redo and
//! prune are actions too; replay rebuilds a document from its history.

mod document;
mod hash;
mod reducer;
mod replay;
mod signal;
mod undo;

pub use document::{
    create_document, Document, DocumentState, Header, HeaderSignature, InitialState, ScopeState,
};
pub use hash::{stable_stringify, HashAlgorithm, HashConfig, HashEncoding};
pub use reducer::{dispatch, DispatchOptions, StateReducer};
pub use replay::{replay_document, ReplayOptions};
pub use signal::{Signal, SignalHandler};
pub use undo::{prune, redo, undo};

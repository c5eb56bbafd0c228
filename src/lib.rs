// Opledger - Event-Sourced Document Versioning

pub mod document;
pub mod error;
pub mod history;
pub mod models;
pub mod signing;
pub mod storage;

pub use document::{
    create_document, dispatch, prune, redo, replay_document, undo, DispatchOptions, Document,
    DocumentState, ReplayOptions, StateReducer,
};
pub use error::{DocumentError, ReducerError, Result};
pub use history::{Action, Operation, Scope};

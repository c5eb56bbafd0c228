//! Document persistence
//!
//! A document is stored as a set of named entries (see [`container`]) in a
//! [`ContainerBackend`]. Loading checks the history before replaying it.

mod backend;
pub mod container;
mod local_dir;
mod memory;

pub use backend::ContainerBackend;
pub use container::{load_document, save_document, AttachmentEntry, DocumentContainer};
pub use local_dir::LocalDirectoryBackend;
pub use memory::MemoryBackend;

//! Document models built on the engine

pub mod inventory;

pub use inventory::{InventoryDocument, InventoryReducer};

//! Random colors, a uniqueness-by-color selection, and named color lists
//! persisted under one store key.

pub mod app;
pub mod collections;
pub mod color;
pub mod config;
pub mod model;
pub mod selection;
pub mod storage;

pub use collections::{CollectionStore, StoreError};
pub use model::{Collection, Item, StorageRecord, Swatch};
pub use selection::SelectionSet;

//! Pending entries: model, admission validation and the shared store.

pub mod model;
pub mod store;
pub mod validation;

pub use model::{
    Coordinate, DeliveryRecord, Entry, EntryEvent, NewEntry, QuarantineInfo, ValidatedEntry,
};
pub use store::{DispatchClaim, EntryStore, NotFound};
pub use validation::{validate, ValidationError};

//! Snapshot Module
//!
//! The heart of the monitor - detecting what changed in the database.
//! This module provides:
//! - Row values with a total order
//! - Database snapshots (point-in-time captures of every table and view)
//! - The inclusion filter deciding which entities are watched
//! - Bounded snapshot history
//! - The diff engine comparing consecutive snapshots

pub mod value;
pub mod model;
pub mod filter;
pub mod store;
pub mod diff;

pub use diff::{ChangeEvent, DiffEngine, DiffSummary, FieldChange};
pub use filter::InclusionFilter;
pub use model::{DatabaseSnapshot, EntityKind, RowContent, TableSnapshot};
pub use store::SnapshotHistory;
pub use value::{FieldValue, Row};

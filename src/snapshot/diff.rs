//! Snapshot Diff Engine
//!
//! Compares two database snapshots and produces an ordered list of change
//! events. Rendering lives in `crate::report`; nothing here formats output.
//!
//! Row content is compared positionally. Rows are sorted before capture, so
//! walking both sequences index by index approximates a sorted-set diff
//! cheaply, but it is not a minimal edit script: a row inserted in the middle
//! of a table shifts every later position and shows up as a run of
//! `RowModified` events followed by one `RowAdded`.

use super::filter::InclusionFilter;
use super::model::{DatabaseSnapshot, EntityKind, RowContent};
use super::value::{FieldValue, Row};
use serde::{Deserialize, Serialize};

/// Difference in one field of a modified row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub index: usize,
    pub old: FieldValue,
    pub new: FieldValue,
}

/// A single change detected between two snapshots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// Informational only, does not affect the per-entity diff
    TableSetSizeChanged {
        kind: EntityKind,
        old_count: usize,
        new_count: usize,
    },
    EntityDeleted {
        name: String,
    },
    RecordCountChanged {
        name: String,
        old_count: Option<i64>,
        new_count: Option<i64>,
    },
    /// Whole-value difference used when a structured diff is not possible
    OpaqueContentChanged {
        name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        row_index: Option<usize>,
        old: String,
        new: String,
    },
    RowModified {
        name: String,
        index: usize,
        old: Row,
        new: Row,
        fields: Vec<FieldChange>,
    },
    RowDeleted {
        name: String,
        row: Row,
    },
    RowAdded {
        name: String,
        row: Row,
    },
    EntityCreated {
        name: String,
    },
}

impl ChangeEvent {
    /// Entity the event belongs to; `None` for snapshot-wide notes
    pub fn entity(&self) -> Option<&str> {
        match self {
            ChangeEvent::TableSetSizeChanged { .. } => None,
            ChangeEvent::EntityDeleted { name }
            | ChangeEvent::RecordCountChanged { name, .. }
            | ChangeEvent::OpaqueContentChanged { name, .. }
            | ChangeEvent::RowModified { name, .. }
            | ChangeEvent::RowDeleted { name, .. }
            | ChangeEvent::RowAdded { name, .. }
            | ChangeEvent::EntityCreated { name } => Some(name.as_str()),
        }
    }
}

/// Summary statistics for one comparison
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummary {
    pub entities_created: usize,
    pub entities_deleted: usize,
    pub entities_changed: usize,
    pub rows_added: usize,
    pub rows_deleted: usize,
    pub rows_modified: usize,
    pub opaque_changes: usize,
    pub total_changes: usize,
}

impl DiffSummary {
    pub fn from_events(events: &[ChangeEvent]) -> Self {
        let mut summary = DiffSummary {
            total_changes: events.len(),
            ..Default::default()
        };

        let mut changed: Vec<&str> = Vec::new();

        for event in events {
            match event {
                ChangeEvent::TableSetSizeChanged { .. } | ChangeEvent::RecordCountChanged { .. } => {}
                ChangeEvent::EntityCreated { .. } => {
                    summary.entities_created += 1;
                    continue;
                }
                ChangeEvent::EntityDeleted { .. } => {
                    summary.entities_deleted += 1;
                    continue;
                }
                ChangeEvent::OpaqueContentChanged { .. } => summary.opaque_changes += 1,
                ChangeEvent::RowModified { .. } => summary.rows_modified += 1,
                ChangeEvent::RowDeleted { .. } => summary.rows_deleted += 1,
                ChangeEvent::RowAdded { .. } => summary.rows_added += 1,
            }

            if let Some(name) = event.entity() {
                changed.push(name);
            }
        }

        changed.sort_unstable();
        changed.dedup();
        summary.entities_changed = changed.len();
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.total_changes == 0
    }
}

/// The diff engine that compares database snapshots
pub struct DiffEngine;

impl DiffEngine {
    /// Compare `older` against `newer`, reporting only entities the filter includes
    pub fn diff(older: &DatabaseSnapshot, newer: &DatabaseSnapshot, filter: &InclusionFilter) -> Vec<ChangeEvent> {
        let mut events = Vec::new();

        for kind in [EntityKind::Table, EntityKind::View] {
            let (old_count, new_count) = (older.entity_count(kind), newer.entity_count(kind));
            if old_count != new_count {
                events.push(ChangeEvent::TableSetSizeChanged {
                    kind,
                    old_count,
                    new_count,
                });
            }
        }

        for old_entity in older.entities() {
            let name = &old_entity.name;
            if !filter.is_included(name) {
                continue;
            }

            let Some(new_entity) = newer.find_entity(name) else {
                events.push(ChangeEvent::EntityDeleted { name: name.clone() });
                continue;
            };

            if old_entity.declared_count != new_entity.declared_count {
                events.push(ChangeEvent::RecordCountChanged {
                    name: name.clone(),
                    old_count: old_entity.declared_count,
                    new_count: new_entity.declared_count,
                });
            }

            if old_entity.rows == new_entity.rows {
                continue;
            }

            match (&old_entity.rows, &new_entity.rows) {
                (RowContent::Rows(old_rows), RowContent::Rows(new_rows)) => {
                    Self::diff_rows(name, old_rows, new_rows, &mut events);
                }
                (old, new) => events.push(ChangeEvent::OpaqueContentChanged {
                    name: name.clone(),
                    row_index: None,
                    old: old.to_string(),
                    new: new.to_string(),
                }),
            }
        }

        for new_entity in newer.entities() {
            let name = &new_entity.name;
            if filter.is_included(name) && older.find_entity(name).is_none() {
                events.push(ChangeEvent::EntityCreated { name: name.clone() });
            }
        }

        events
    }

    /// Positional walk over two sorted row sequences
    fn diff_rows(name: &str, old_rows: &[Row], new_rows: &[Row], events: &mut Vec<ChangeEvent>) {
        let common = old_rows.len().min(new_rows.len());

        for (index, (old, new)) in old_rows.iter().zip(new_rows).enumerate() {
            if old == new {
                continue;
            }

            if old.arity() != new.arity() {
                events.push(ChangeEvent::OpaqueContentChanged {
                    name: name.to_string(),
                    row_index: Some(index),
                    old: old.to_string(),
                    new: new.to_string(),
                });
                continue;
            }

            events.push(ChangeEvent::RowModified {
                name: name.to_string(),
                index,
                old: old.clone(),
                new: new.clone(),
                fields: Self::diff_fields(old, new),
            });
        }

        for row in &old_rows[common..] {
            events.push(ChangeEvent::RowDeleted {
                name: name.to_string(),
                row: row.clone(),
            });
        }

        for row in &new_rows[common..] {
            events.push(ChangeEvent::RowAdded {
                name: name.to_string(),
                row: row.clone(),
            });
        }
    }

    /// Field-level changes between two rows of equal arity
    fn diff_fields(old: &Row, new: &Row) -> Vec<FieldChange> {
        old.fields()
            .iter()
            .zip(new.fields())
            .enumerate()
            .filter(|(_, (a, b))| a != b)
            .map(|(index, (a, b))| FieldChange {
                index,
                old: a.clone(),
                new: b.clone(),
            })
            .collect()
    }
}

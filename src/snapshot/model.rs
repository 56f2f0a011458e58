//! Snapshot Data Model
//!
//! Point-in-time captures of every table and view in the target database.

use super::value::Row;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Tables and views are captured and compared the same way
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Table,
    View,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Table => "table",
            EntityKind::View => "view",
        }
    }
}

/// Content captured for one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "data", rename_all = "camelCase")]
pub enum RowContent {
    /// Entity was outside the inclusion filter, nothing was read
    Excluded,
    /// Rows sorted ascending by their natural order
    Rows(Vec<Row>),
    /// Reading failed; holds the error text
    Unreadable(String),
}

impl RowContent {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            RowContent::Rows(rows) => Some(rows),
            _ => None,
        }
    }

    /// Whether a flush would have anything to write for this content
    pub fn has_content(&self) -> bool {
        match self {
            RowContent::Excluded => false,
            RowContent::Rows(rows) => !rows.is_empty(),
            RowContent::Unreadable(message) => !message.is_empty(),
        }
    }
}

impl fmt::Display for RowContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowContent::Excluded => write!(f, "None"),
            RowContent::Unreadable(message) => write!(f, "{}", message),
            RowContent::Rows(rows) => {
                write!(f, "[")?;
                for (i, row) in rows.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", row)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// One table or view at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub name: String,
    /// Result of `count(*)`; `None` when the count itself could not be read
    pub declared_count: Option<i64>,
    pub rows: RowContent,
}

impl TableSnapshot {
    pub fn new(name: impl Into<String>, declared_count: Option<i64>, rows: RowContent) -> Self {
        Self {
            name: name.into(),
            declared_count,
            rows,
        }
    }

    /// Convenience constructor for a readable entity whose count matches its rows
    pub fn with_rows(name: impl Into<String>, mut rows: Vec<Row>) -> Self {
        rows.sort();
        let count = i64::try_from(rows.len()).unwrap_or(i64::MAX);
        Self::new(name, Some(count), RowContent::Rows(rows))
    }
}

/// All tables and views captured at one instant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSnapshot {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub tables: Vec<TableSnapshot>,
    pub views: Vec<TableSnapshot>,
    pub checksum: String,
}

impl DatabaseSnapshot {
    pub fn new(captured_at: DateTime<Utc>, tables: Vec<TableSnapshot>, views: Vec<TableSnapshot>) -> Self {
        let checksum = Self::compute_checksum(&tables, &views);
        Self {
            id: Uuid::new_v4(),
            captured_at,
            tables,
            views,
            checksum,
        }
    }

    /// Compute checksum over names, counts and content in capture order
    pub fn compute_checksum(tables: &[TableSnapshot], views: &[TableSnapshot]) -> String {
        let mut hasher = Sha256::new();

        for (kind, entities) in [(EntityKind::Table, tables), (EntityKind::View, views)] {
            for entity in entities {
                hasher.update(format!("{}:{}:{:?}\n", kind.as_str(), entity.name, entity.declared_count).as_bytes());
                match &entity.rows {
                    RowContent::Excluded => hasher.update(b"excluded\n"),
                    RowContent::Unreadable(message) => {
                        hasher.update(b"unreadable:");
                        hasher.update(message.as_bytes());
                        hasher.update(b"\n");
                    }
                    RowContent::Rows(rows) => {
                        // Debug keeps the value kind and every float bit pattern apart
                        for row in rows {
                            hasher.update(format!("{:?}\n", row).as_bytes());
                        }
                    }
                }
            }
            hasher.update(b"--\n");
        }

        format!("{:x}", hasher.finalize())
    }

    /// Tables followed by views, in capture order
    pub fn entities(&self) -> impl Iterator<Item = &TableSnapshot> {
        self.tables.iter().chain(self.views.iter())
    }

    /// Look an entity up by name across tables then views; first match wins
    pub fn find_entity(&self, name: &str) -> Option<&TableSnapshot> {
        self.entities().find(|entity| entity.name == name)
    }

    pub fn entity_count(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Table => self.tables.len(),
            EntityKind::View => self.views.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::snapshot::value::FieldValue;

    #[test]
    fn test_checksum_consistency() {
        let tables = vec![TableSnapshot::with_rows("users", vec![row![1, "ada"]])];

        let checksum1 = DatabaseSnapshot::compute_checksum(&tables, &[]);
        let checksum2 = DatabaseSnapshot::compute_checksum(&tables, &[]);

        assert_eq!(checksum1, checksum2);
    }

    #[test]
    fn test_checksum_tracks_value_kind() {
        let ints = vec![TableSnapshot::with_rows("t", vec![row![1]])];
        let texts = vec![TableSnapshot::with_rows("t", vec![row!["1"]])];

        assert_ne!(
            DatabaseSnapshot::compute_checksum(&ints, &[]),
            DatabaseSnapshot::compute_checksum(&texts, &[])
        );
    }

    #[test]
    fn test_checksum_tracks_non_finite_floats() {
        let checksum = |value: f64| {
            let tables = vec![TableSnapshot::with_rows("t", vec![row![1, FieldValue::Float(value)]])];
            DatabaseSnapshot::compute_checksum(&tables, &[])
        };

        assert_ne!(checksum(f64::INFINITY), checksum(f64::NEG_INFINITY));
        assert_ne!(checksum(f64::NAN), checksum(f64::INFINITY));
    }

    #[test]
    fn test_find_entity_prefers_tables() {
        let snapshot = DatabaseSnapshot::new(
            Utc::now(),
            vec![TableSnapshot::with_rows("shared", vec![row![1]])],
            vec![TableSnapshot::with_rows("shared", vec![row![2]]), TableSnapshot::with_rows("v", vec![])],
        );

        let found = snapshot.find_entity("shared").unwrap();
        assert_eq!(found.rows, RowContent::Rows(vec![row![1]]));
        assert!(snapshot.find_entity("v").is_some());
        assert!(snapshot.find_entity("missing").is_none());
    }

    #[test]
    fn test_with_rows_sorts_and_counts() {
        let table = TableSnapshot::with_rows("t", vec![row![3], row![1], row![2]]);
        assert_eq!(table.declared_count, Some(3));
        assert_eq!(table.rows.rows().unwrap()[0], row![1]);
    }

    #[test]
    fn test_has_content() {
        assert!(!RowContent::Excluded.has_content());
        assert!(!RowContent::Rows(vec![]).has_content());
        assert!(RowContent::Rows(vec![row![1]]).has_content());
        assert!(RowContent::Unreadable("permission denied".to_string()).has_content());
    }
}

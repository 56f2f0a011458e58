//! Change Reporting
//!
//! Renders change events for the operator. The diff engine only produces
//! events; everything about presentation lives here.

use crate::snapshot::{ChangeEvent, DiffSummary, EntityKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use tracing::{info, warn};

/// Consumes the ordered change events of one cycle
pub trait Reporter {
    fn report(&mut self, captured_at: DateTime<Utc>, events: &[ChangeEvent]);
}

fn count_or_unknown(count: Option<i64>) -> String {
    count.map_or_else(|| "?".to_string(), |c| c.to_string())
}

/// Plain-text lines for one event; row modifications get one extra line per field
pub fn render_event(event: &ChangeEvent) -> Vec<String> {
    match event {
        ChangeEvent::TableSetSizeChanged { kind, old_count, new_count } => {
            let label = match kind {
                EntityKind::Table => "Table",
                EntityKind::View => "View",
            };
            vec![format!("{} count: {} -> {}", label, old_count, new_count)]
        }
        ChangeEvent::EntityDeleted { name } => vec![format!("Table deleted: {}", name)],
        ChangeEvent::EntityCreated { name } => vec![format!("Table created: {}", name)],
        ChangeEvent::RecordCountChanged { name, old_count, new_count } => vec![format!(
            "{} has different records count: {} -> {}",
            name,
            count_or_unknown(*old_count),
            count_or_unknown(*new_count)
        )],
        ChangeEvent::OpaqueContentChanged { name, row_index, old, new } => match row_index {
            Some(index) => vec![format!("{} row {} changed shape: {} -> {}", name, index, old, new)],
            None => vec![format!("{} has different records content: {} -> {}", name, old, new)],
        },
        ChangeEvent::RowModified { name, index, old, new, fields } => {
            let mut lines = vec![format!("{} row {} modified: {} -> {}", name, index, old, new)];
            lines.extend(
                fields
                    .iter()
                    .map(|field| format!("    field {}: {} -> {}", field.index, field.old, field.new)),
            );
            lines
        }
        ChangeEvent::RowDeleted { name, row } => vec![format!("{} row deleted: {}", name, row)],
        ChangeEvent::RowAdded { name, row } => vec![format!("{} row added: {}", name, row)],
    }
}

/// One-line summary of a comparison
pub fn render_summary(summary: &DiffSummary) -> String {
    format!(
        "{} changes: {} created, {} deleted, {} changed ({} rows added, {} deleted, {} modified)",
        summary.total_changes,
        summary.entities_created,
        summary.entities_deleted,
        summary.entities_changed,
        summary.rows_added,
        summary.rows_deleted,
        summary.rows_modified
    )
}

/// Writes rendered events through `tracing`
#[derive(Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&mut self, captured_at: DateTime<Utc>, events: &[ChangeEvent]) {
        if events.is_empty() {
            return;
        }

        for event in events {
            for line in render_event(event) {
                info!("{}", line);
            }
        }

        let summary = DiffSummary::from_events(events);
        info!("Snapshot {}: {}", captured_at.format("%Y-%m-%d %H:%M:%S"), render_summary(&summary));
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonLine<'a> {
    captured_at: DateTime<Utc>,
    #[serde(flatten)]
    event: &'a ChangeEvent,
}

/// Writes one JSON object per event to the given writer
pub struct JsonReporter<W: Write> {
    out: W,
}

impl<W: Write> JsonReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write_event(&mut self, captured_at: DateTime<Utc>, event: &ChangeEvent) -> std::io::Result<()> {
        let line = JsonLine { captured_at, event };
        serde_json::to_writer(&mut self.out, &line)?;
        self.out.write_all(b"\n")
    }
}

impl<W: Write> Reporter for JsonReporter<W> {
    fn report(&mut self, captured_at: DateTime<Utc>, events: &[ChangeEvent]) {
        for event in events {
            if let Err(e) = self.write_event(captured_at, event) {
                warn!("Failed to write change event: {}", e);
                return;
            }
        }
        if let Err(e) = self.out.flush() {
            warn!("Failed to flush change events: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::snapshot::{FieldChange, FieldValue};
    use chrono::TimeZone;

    #[test]
    fn test_render_row_modified_lists_fields() {
        let event = ChangeEvent::RowModified {
            name: "users".to_string(),
            index: 0,
            old: row![1, "a", 3],
            new: row![1, "b", 3],
            fields: vec![FieldChange {
                index: 1,
                old: FieldValue::Text("a".to_string()),
                new: FieldValue::Text("b".to_string()),
            }],
        };

        assert_eq!(
            render_event(&event),
            vec![
                "users row 0 modified: (1, 'a', 3) -> (1, 'b', 3)".to_string(),
                "    field 1: 'a' -> 'b'".to_string(),
            ]
        );
    }

    #[test]
    fn test_render_counts() {
        let event = ChangeEvent::RecordCountChanged {
            name: "T".to_string(),
            old_count: Some(2),
            new_count: None,
        };
        assert_eq!(render_event(&event), vec!["T has different records count: 2 -> ?".to_string()]);

        let event = ChangeEvent::TableSetSizeChanged {
            kind: EntityKind::View,
            old_count: 1,
            new_count: 0,
        };
        assert_eq!(render_event(&event), vec!["View count: 1 -> 0".to_string()]);
    }

    #[test]
    fn test_json_reporter_writes_one_line_per_event() {
        let captured_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let events = vec![
            ChangeEvent::EntityCreated { name: "c".to_string() },
            ChangeEvent::RowAdded {
                name: "t".to_string(),
                row: row![3],
            },
        ];

        let mut buffer = Vec::new();
        JsonReporter::new(&mut buffer).report(captured_at, &events);

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<_> = output.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "entity_created");
        assert_eq!(first["name"], "c");
        assert!(first["capturedAt"].as_str().unwrap().starts_with("2024-03-01T12:00:00"));

        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["row"][0]["type"], "int");
        assert_eq!(second["row"][0]["value"], 3);
    }

    #[test]
    fn test_summary_line() {
        let summary = DiffSummary {
            total_changes: 3,
            entities_created: 1,
            rows_added: 2,
            entities_changed: 1,
            ..Default::default()
        };
        assert_eq!(
            render_summary(&summary),
            "3 changes: 1 created, 0 deleted, 1 changed (2 rows added, 0 deleted, 0 modified)"
        );
    }
}

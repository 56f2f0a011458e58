//! Snapshot flush: dumps each captured entity to a text file.

use crate::error::AppResult;
use crate::snapshot::{DatabaseSnapshot, RowContent, TableSnapshot};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Write `snapshot` under `root/pg_<timestamp>/`, one `<entity>.txt` per entity with content.
///
/// Returns the directory written to.
pub fn flush_snapshot(root: &Path, snapshot: &DatabaseSnapshot) -> AppResult<PathBuf> {
    let dir = root.join(format!("pg_{}", snapshot.captured_at.format("%Y-%m-%d-%H-%M-%S")));
    fs::create_dir_all(&dir)?;

    let mut written = 0;
    for entity in snapshot.entities() {
        if !entity.rows.has_content() {
            continue;
        }
        fs::write(dir.join(file_name(&entity.name)), dump(entity))?;
        written += 1;
    }

    info!("Wrote {} entity dumps to: {}", written, dir.display());
    Ok(dir)
}

/// Entity names may contain characters that are not valid in file names
fn file_name(entity: &str) -> String {
    let safe: String = entity
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect();
    format!("{}.txt", safe)
}

fn dump(entity: &TableSnapshot) -> String {
    match &entity.rows {
        RowContent::Rows(rows) => rows.iter().map(|row| format!("{}\n", row)).collect(),
        RowContent::Unreadable(message) => format!("{}\n", message),
        RowContent::Excluded => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_flush_writes_only_entities_with_content() {
        let root = tempfile::tempdir().unwrap();
        let snapshot = DatabaseSnapshot::new(
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(),
            vec![
                TableSnapshot::with_rows("users", vec![row![2, "bob"], row![1, "ada"]]),
                TableSnapshot::with_rows("empty", vec![]),
                TableSnapshot::new("secret", Some(3), RowContent::Excluded),
                TableSnapshot::new("locked", None, RowContent::Unreadable("permission denied".to_string())),
            ],
            vec![TableSnapshot::with_rows("odd/name", vec![row![1]])],
        );

        let dir = flush_snapshot(root.path(), &snapshot).unwrap();

        assert_eq!(dir, root.path().join("pg_2024-01-02-03-04-05"));
        assert_eq!(
            fs::read_to_string(dir.join("users.txt")).unwrap(),
            "(1, 'ada')\n(2, 'bob')\n"
        );
        assert_eq!(fs::read_to_string(dir.join("locked.txt")).unwrap(), "permission denied\n");
        assert!(dir.join("odd_name.txt").exists());
        assert!(!dir.join("empty.txt").exists());
        assert!(!dir.join("secret.txt").exists());
    }
}

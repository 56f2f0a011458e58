//! Monitor Loop
//!
//! Runs one capture/compare/report cycle per interval until cancelled.
//! A failing cycle is logged and retried after the interval; it never ends
//! the process.

use crate::capture::{capture_snapshot, PostgresSource};
use crate::config::{Settings, SettingsLoader};
use crate::connection::{ConnectionManager, ConnectionParams};
use crate::error::{AppError, AppResult};
use crate::flush::flush_snapshot;
use crate::report::Reporter;
use crate::snapshot::{DatabaseSnapshot, DiffEngine, InclusionFilter, SnapshotHistory};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub struct Monitor {
    loader: SettingsLoader,
    connections: ConnectionManager,
    history: SnapshotHistory,
    reporter: Box<dyn Reporter>,
}

impl Monitor {
    pub fn new(loader: SettingsLoader, reporter: Box<dyn Reporter>) -> Self {
        Self {
            loader,
            connections: ConnectionManager::new(),
            history: SnapshotHistory::new(),
            reporter,
        }
    }

    /// Loop until `cancel` fires, or after one cycle when `once` is set
    pub async fn run(&mut self, cancel: &CancellationToken, once: bool) {
        info!(
            "Monitoring started (settings: {}, keeping up to {} snapshots)",
            self.loader.path().display(),
            self.history.capacity()
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let settings = self.loader.reload();

            match self.run_cycle(&settings, cancel).await {
                Ok(()) => debug!("Cycle complete, {} snapshots in history", self.history.len()),
                Err(AppError::Cancelled) => break,
                Err(e) => error!("Error: {}", e),
            }

            if once {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(settings.interval) => {}
            }
        }

        info!("Monitoring stopped");
    }

    async fn run_cycle(&mut self, settings: &Settings, cancel: &CancellationToken) -> AppResult<()> {
        let filter = settings.filter();
        let params = ConnectionParams::from(&settings.database);

        let client = match self.connections.client(&params).await {
            Ok(client) => client,
            Err(e) => {
                self.connections.reset();
                return Err(e);
            }
        };

        let snapshot = {
            let source = PostgresSource::new(client);
            capture_snapshot(&source, &filter, cancel).await?
        };

        self.record(snapshot, settings, &filter);
        Ok(())
    }

    /// Flush, compare against the previous snapshot, report, then keep it.
    ///
    /// The comparison runs before the snapshot is appended so a history
    /// collapse never costs a cycle its report.
    fn record(&mut self, snapshot: DatabaseSnapshot, settings: &Settings, filter: &InclusionFilter) {
        if let Some(dir) = &settings.flush_dir {
            if let Err(e) = flush_snapshot(dir, &snapshot) {
                warn!("Failed to flush snapshot: {}", e);
            }
        }

        if let Some(previous) = self.history.latest() {
            let events = DiffEngine::diff(previous, &snapshot, filter);
            self.reporter.report(snapshot.captured_at, &events);
        }

        self.history.append(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;
    use crate::snapshot::{ChangeEvent, TableSnapshot};
    use chrono::Utc;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct RecordingReporter {
        cycles: Rc<RefCell<Vec<Vec<ChangeEvent>>>>,
    }

    impl Reporter for RecordingReporter {
        fn report(&mut self, _captured_at: chrono::DateTime<Utc>, events: &[ChangeEvent]) {
            self.cycles.borrow_mut().push(events.to_vec());
        }
    }

    fn monitor() -> (Monitor, RecordingReporter) {
        let reporter = RecordingReporter::default();
        let monitor = Monitor::new(SettingsLoader::new("settings.json"), Box::new(reporter.clone()));
        (monitor, reporter)
    }

    fn snapshot(rows: Vec<crate::snapshot::Row>) -> DatabaseSnapshot {
        DatabaseSnapshot::new(Utc::now(), vec![TableSnapshot::with_rows("T", rows)], vec![])
    }

    #[test]
    fn test_first_cycle_reports_nothing() {
        let (mut monitor, reporter) = monitor();
        let settings = Settings::default();

        monitor.record(snapshot(vec![row![1]]), &settings, &settings.filter());

        assert!(reporter.cycles.borrow().is_empty());
        assert_eq!(monitor.history.len(), 1);
    }

    #[test]
    fn test_consecutive_cycles_are_compared() {
        let (mut monitor, reporter) = monitor();
        let settings = Settings::default();
        let filter = settings.filter();

        monitor.record(snapshot(vec![row![1], row![2]]), &settings, &filter);
        monitor.record(snapshot(vec![row![1], row![2], row![3]]), &settings, &filter);
        monitor.record(snapshot(vec![row![1], row![2], row![3]]), &settings, &filter);

        let cycles = reporter.cycles.borrow();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].len(), 2);
        assert!(matches!(cycles[0][1], ChangeEvent::RowAdded { .. }));
        assert!(cycles[1].is_empty());
    }

    #[test]
    fn test_collapse_keeps_comparison() {
        let (mut monitor, reporter) = monitor();
        let settings = Settings::default();
        let filter = settings.filter();

        for _ in 0..100 {
            monitor.record(snapshot(vec![row![1]]), &settings, &filter);
        }
        monitor.record(snapshot(vec![row![1], row![2]]), &settings, &filter);

        assert_eq!(monitor.history.len(), 1);
        let cycles = reporter.cycles.borrow();
        assert_eq!(cycles.len(), 100);
        assert!(cycles.last().unwrap().iter().any(|e| matches!(e, ChangeEvent::RowAdded { .. })));
    }

    #[test]
    fn test_flush_dir_is_written() {
        let (mut monitor, _reporter) = monitor();
        let root = tempfile::tempdir().unwrap();
        let settings = Settings {
            flush_dir: Some(root.path().to_path_buf()),
            ..Settings::default()
        };

        monitor.record(snapshot(vec![row![1]]), &settings, &settings.filter());

        let entries: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_loop_exits_before_connecting() {
        let (mut monitor, reporter) = monitor();
        let cancel = CancellationToken::new();
        cancel.cancel();

        monitor.run(&cancel, false).await;

        assert!(monitor.history.is_empty());
        assert!(reporter.cycles.borrow().is_empty());
    }
}

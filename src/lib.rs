//! pg-change-monitor - watches a PostgreSQL database for data changes
//!
//! Every interval the monitor snapshots the full content of every table and
//! view, compares the snapshot with the previous one and reports:
//! - tables and views created or dropped
//! - record count changes
//! - rows added, removed or modified, down to the changed fields
//!
//! Detection is a brute-force comparison of consecutive snapshots, not
//! change data capture.

pub mod capture;
pub mod config;
pub mod connection;
pub mod error;
pub mod flush;
pub mod monitor;
pub mod report;
pub mod snapshot;

//! # rolling-snapshots
//!
//! Watches folders of source files and keeps a bounded, numbered history of
//! zip snapshots for each matching file.
//!
//! ## Features
//!
//! - **Numbered Snapshots**: `20220215_59_MyFile.docx_bak.zip`, numbers never reused
//! - **Change Driven**: A file is snapshotted again once it has been modified
//!   at least `interval` after its latest snapshot
//! - **Retention**: At most `max_backups - 1` snapshots per file after every pass
//! - **Independent Targets**: One worker per target; a failing target never
//!   stops the others
//! - **Graceful Shutdown**: A file that has started processing is always finished
//!
//! ## Quick Start
//!
//! ```no_run
//! use rolling_snapshots::backup::backup_config::BackupConfig;
//! use rolling_snapshots::backup::scheduler::run_all;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! // Load configuration from YAML file
//! let config = BackupConfig::from_path("config.yml")?;
//!
//! // Run every target until the token is cancelled
//! let cancel = CancellationToken::new();
//! let results = run_all(&config, cancel.clone()).await;
//! # Ok(())
//! # }
//! ```

pub mod backup;

//! One sweep over the files of a target.
//!
//! For every matching source file: list its snapshots, decide whether a new one
//! is due, create it, then prune down to the retention limit. Cancellation is
//! honoured at two checkpoints per file. Once the second checkpoint is passed
//! the file is carried through archiving and pruning regardless of
//! cancellation, so a pass can be abandoned between files without leaving a
//! file half processed.

use crate::backup::archiver::create_snapshot;
use crate::backup::function_path;
use crate::backup::naming::SnapshotPattern;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use crate::backup::retention::prune;
use crate::backup::snapshot::{is_due, latest, list_snapshots, modified_utc, next_sequence};
use crate::backup::target::TargetDefinition;
use chrono::{Local, TimeDelta};
use function_name::named;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub files: usize,
    pub created: usize,
    pub pruned: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassOutcome {
    /// The source folder does not exist; nothing was touched.
    SourceMissing,
    Completed(PassSummary),
    /// Cancellation was observed before starting a file. Files handled
    /// earlier in the pass are complete.
    Cancelled(PassSummary),
}

/// Per-file progress notifications, mostly useful to tests.
pub trait PassObserver {
    /// Snapshots of `file` have been listed; the point of no return is next.
    fn inventory_read(&mut self, _file: &Path) {}
    /// `file` passed the point of no return.
    fn committed(&mut self, _file: &Path) {}
    fn file_completed(&mut self, _file: &Path) {}
}

pub struct NoopObserver;

impl PassObserver for NoopObserver {}

impl TargetDefinition {
    pub fn run_pass(&self, cancel: &CancellationToken) -> Result<PassOutcome> {
        self.run_pass_observed(cancel, &mut NoopObserver)
    }

    #[named]
    pub fn run_pass_observed<O: PassObserver>(
        &self,
        cancel: &CancellationToken,
        observer: &mut O,
    ) -> Result<PassOutcome> {
        info!("Processing {}", self.display_path());

        if !self.source_dir().is_dir() {
            debug!("Source folder {:?} not found, skipping pass", self.source_dir());
            return Ok(PassOutcome::SourceMissing);
        }

        if !self.backup_dir().is_dir() {
            info!("Creating backup folder {:?}", self.backup_dir());
            std::fs::create_dir_all(self.backup_dir())
                .map_err(Error::from)
                .with_msg(format!("Creating backup folder {:?} failed", self.backup_dir()))?;
        }

        let interval = TimeDelta::from_std(self.interval())?;
        let files = self
            .matching_files()
            .with_debug_object_and_fn_name(self.clone(), function_path!())?;

        let mut summary = PassSummary::default();
        let mut prune_errors = Vec::new();
        for file in files {
            if cancel.is_cancelled() {
                info!("Cancelled before {:?}", file);
                return convert_error_vec(prune_errors).map(|_| PassOutcome::Cancelled(summary));
            }

            match self.process_file(&file, interval, cancel, observer, &mut summary) {
                Ok(FileStep::Done) => {}
                Ok(FileStep::PruneFailed(e)) => prune_errors.push(e),
                Ok(FileStep::Cancelled) => {
                    info!("Cancelled before {:?}", file);
                    return convert_error_vec(prune_errors)
                        .map(|_| PassOutcome::Cancelled(summary));
                }
                Err(e) => return Err(with_pending(e, prune_errors)),
            }
        }

        convert_error_vec(prune_errors).map(|_| PassOutcome::Completed(summary))
    }

    fn process_file<O: PassObserver>(
        &self,
        file: &Path,
        interval: TimeDelta,
        cancel: &CancellationToken,
        observer: &mut O,
        summary: &mut PassSummary,
    ) -> Result<FileStep> {
        let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
            warn!("Skipping {:?}, file name is not valid UTF-8", file);
            return Ok(FileStep::Done);
        };
        let pattern = SnapshotPattern::for_source_file(file_name)?;
        let inventory = list_snapshots(self.backup_dir(), &pattern)?;
        observer.inventory_read(file);

        if cancel.is_cancelled() {
            return Ok(FileStep::Cancelled);
        }
        observer.committed(file);
        summary.files += 1;

        let source_modified = modified_utc(file)?;
        let inventory = if is_due(latest(&inventory), source_modified, interval) {
            let sequence = next_sequence(&inventory)?;
            let snapshot = create_snapshot(
                file,
                self.backup_dir(),
                sequence,
                Local::now().date_naive(),
            )?;
            info!("Created snapshot {:?}", snapshot);
            summary.created += 1;
            list_snapshots(self.backup_dir(), &pattern)?
        } else {
            debug!("No snapshot due for {:?}", file);
            inventory
        };

        let step = match prune(inventory, self.max_backups()) {
            Ok(deleted) => {
                summary.pruned += deleted.len();
                FileStep::Done
            }
            Err(e) => FileStep::PruneFailed(e),
        };
        observer.file_completed(file);
        Ok(step)
    }
}

/// How the handling of one source file ended, short of a hard failure.
enum FileStep {
    Done,
    /// Archiving went through but some deletions did not. Reported at the end
    /// of the pass.
    PruneFailed(Error),
    /// Cancellation was seen before the point of no return.
    Cancelled,
}

/// `error`, followed by deletion failures collected earlier in the pass.
fn with_pending(error: Error, pending: Vec<Error>) -> Error {
    if pending.is_empty() {
        error
    } else {
        error.chain(Error::from(pending))
    }
}

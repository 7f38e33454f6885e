use crate::backup::naming::SnapshotPattern;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use chrono::{DateTime, TimeDelta, Utc};
use getset::{CopyGetters, Getters};
use std::fs::read_dir;
use std::path::{Path, PathBuf};

/// One snapshot file found in a backup folder.
///
/// Rebuilt from the folder listing on every pass; never cached.
#[derive(Clone, Debug, PartialEq, Eq, Getters, CopyGetters)]
pub struct SnapshotRecord {
    #[getset(get_copy = "pub")]
    sequence: u64,
    #[getset(get = "pub")]
    path: PathBuf,
    #[getset(get_copy = "pub")]
    modified: DateTime<Utc>,
}

impl SnapshotRecord {
    pub fn new<P: Into<PathBuf>>(sequence: u64, path: P, modified: DateTime<Utc>) -> Self {
        Self {
            sequence,
            path: path.into(),
            modified,
        }
    }
}

/// Last modification time of `path` in UTC.
pub fn modified_utc<P: AsRef<Path>>(path: P) -> Result<DateTime<Utc>> {
    let path = path.as_ref();
    std::fs::metadata(path)
        .and_then(|md| md.modified())
        .map(DateTime::<Utc>::from)
        .map_err(Error::from)
        .with_msg(format!("Reading modification time of {path:?} failed"))
}

/// Lists the snapshots of one source file inside `backup_dir`.
///
/// Entries that only share a substring with the base name are ignored. The
/// result is unordered.
pub fn list_snapshots<P: AsRef<Path>>(
    backup_dir: P,
    pattern: &SnapshotPattern,
) -> Result<Vec<SnapshotRecord>> {
    let backup_dir = backup_dir.as_ref();
    let mut records = Vec::new();
    for entry in read_dir(backup_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if !pattern.may_match(file_name) {
            continue;
        }
        match pattern.decode(file_name) {
            Some(sequence) => {
                let path = entry.path();
                let modified = modified_utc(&path)?;
                records.push(SnapshotRecord::new(sequence, path, modified));
            }
            None => tracing::trace!("Skipping {:?}, not a snapshot name", file_name),
        }
    }

    tracing::debug!(
        "Found {} snapshots of {} in {:?}",
        records.len(),
        pattern.base_name(),
        backup_dir
    );
    Ok(records)
}

/// Snapshot with the highest sequence number.
pub fn latest(records: &[SnapshotRecord]) -> Option<&SnapshotRecord> {
    records.iter().max_by_key(|r| r.sequence)
}

/// Sequence number the next snapshot receives.
///
/// Fails once the latest snapshot already holds `u64::MAX`; numbers are never
/// wrapped or reused.
pub fn next_sequence(records: &[SnapshotRecord]) -> Result<u64> {
    match latest(records) {
        None => Ok(1),
        Some(latest) => latest
            .sequence
            .checked_add(1)
            .ok_or(Error::SequenceExhausted(latest.sequence))
            .with_msg(format!("Numbering the snapshot after {:?} failed", latest.path)),
    }
}

/// Whether a new snapshot of a source file last modified at `source_modified` is due.
///
/// Compares the source modification time with the modification time of the
/// latest snapshot file itself; the boundary is inclusive.
pub fn is_due(
    latest: Option<&SnapshotRecord>,
    source_modified: DateTime<Utc>,
    interval: TimeDelta,
) -> bool {
    match latest {
        None => true,
        Some(latest) => source_modified.signed_duration_since(latest.modified) >= interval,
    }
}

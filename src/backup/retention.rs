use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::WithMsg;
use crate::backup::snapshot::SnapshotRecord;
use itertools::Itertools;
use std::cmp::Reverse;
use tracing::info;

/// Snapshots that have to go so that one more snapshot still fits under `max_backups`.
///
/// Keeps the `max_backups - 1` highest sequence numbers.
pub fn select_for_deletion<I>(inventory: I, max_backups: u32) -> Vec<SnapshotRecord>
where
    I: IntoIterator<Item = SnapshotRecord>,
{
    let inventory = inventory.into_iter().collect_vec();
    if inventory.len() < max_backups as usize {
        return Vec::new();
    }

    inventory
        .into_iter()
        .sorted_unstable_by_key(|r| Reverse(r.sequence()))
        .skip(max_backups.saturating_sub(1) as usize)
        .collect()
}

/// Deletes the snapshots selected by [`select_for_deletion`].
///
/// Every deletion is attempted; failures are collected and returned together.
/// Returns the deleted records.
pub fn prune<I>(inventory: I, max_backups: u32) -> Result<Vec<SnapshotRecord>>
where
    I: IntoIterator<Item = SnapshotRecord>,
{
    let mut deleted = Vec::new();
    let mut errors = Vec::new();
    for record in select_for_deletion(inventory, max_backups) {
        match std::fs::remove_file(record.path()) {
            Ok(_) => {
                info!("Removing out of retention snapshot {:?}", record.path());
                deleted.push(record);
            }
            Err(e) => errors.push(
                Error::from(e).with_msg(format!("Removing snapshot {:?} failed", record.path())),
            ),
        }
    }

    convert_error_vec(errors).map(|_| deleted)
}

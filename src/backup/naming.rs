//! Snapshot file naming.
//!
//! A snapshot of `MyFile.docx` taken on 15 Feb 2022 with sequence number 59 is
//! called `20220215_59_MyFile.docx_bak.zip`. The `MyFile.docx_bak` part is the
//! base name; it groups all snapshots of one source file inside a backup folder.

use crate::backup::result_error::result::Result;
use chrono::NaiveDate;
use getset::Getters;
use regex::Regex;

static BASE_NAME_SUFFIX: &str = "_bak";
static DATE_FORMAT: &str = "%Y%m%d";
static ARCHIVE_EXT: &str = "zip";

/// Base name shared by every snapshot of `source_file_name`.
pub fn base_name(source_file_name: &str) -> String {
    format!("{source_file_name}{BASE_NAME_SUFFIX}")
}

/// File name of snapshot number `sequence`, created on `today` (local calendar date).
pub fn encode(sequence: u64, base_name: &str, today: NaiveDate) -> String {
    format!(
        "{}_{}_{}.{}",
        today.format(DATE_FORMAT),
        sequence,
        base_name,
        ARCHIVE_EXT
    )
}

/// Matches snapshot file names belonging to one base name.
///
/// The base name is escaped before being embedded in the pattern, and the
/// pattern is anchored to the whole file name, so `report(final).docx_bak`
/// only ever matches itself.
#[derive(Clone, Debug, Getters)]
pub struct SnapshotPattern {
    #[getset(get = "pub")]
    base_name: String,
    regex: Regex,
}

impl SnapshotPattern {
    pub fn new<S: Into<String>>(base_name: S) -> Result<Self> {
        let base_name = base_name.into();
        let regex = Regex::new(&format!(
            r"^\d+_(\d+)_{}\.{}$",
            regex::escape(&base_name),
            ARCHIVE_EXT
        ))?;
        Ok(Self { base_name, regex })
    }

    pub fn for_source_file(source_file_name: &str) -> Result<Self> {
        Self::new(base_name(source_file_name))
    }

    /// Cheap prefilter used before attempting a full decode.
    pub fn may_match(&self, candidate: &str) -> bool {
        candidate.contains(self.base_name.as_str())
    }

    /// Sequence number of `candidate`, or `None` when it is not a snapshot of this base name.
    pub fn decode(&self, candidate: &str) -> Option<u64> {
        self.regex
            .captures(candidate)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    pub fn encode(&self, sequence: u64, today: NaiveDate) -> String {
        encode(sequence, &self.base_name, today)
    }
}

/// One-shot decode; prefer [`SnapshotPattern`] when decoding many names.
pub fn try_decode(candidate: &str, base_name: &str) -> Option<u64> {
    SnapshotPattern::new(base_name)
        .ok()
        .and_then(|p| p.decode(candidate))
}

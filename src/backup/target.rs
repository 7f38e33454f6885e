use crate::backup::result_error::result::Result;
use crate::backup::validate::{validate_dir_or_absent, validate_interval};

use bon::Builder;
use derive_more::{Display, From};
use getset::{CopyGetters, Getters};
use globset::{Glob, GlobBuilder, GlobMatcher};
use serde::de::Visitor;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::result;
use std::time::Duration;
use validator::Validate;
use tracing::warn;
use walkdir::WalkDir;

/// One folder of source files and the folder their snapshots go to.
///
/// Each target is driven by its own worker. Two targets sharing a backup
/// folder are not coordinated in any way.
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct TargetDefinition {
    /// Folder the source files live in. May be missing, the pass is then a no-op.
    #[builder(into)]
    #[getset(get = "pub")]
    source_dir: PathBuf,
    /// Selects source files by file name, e.g. `*.sav`.
    #[builder(into)]
    #[getset(get = "pub")]
    glob: TargetGlob,
    #[validate(custom(function = validate_dir_or_absent))]
    #[builder(into)]
    #[getset(get = "pub")]
    backup_dir: PathBuf,
    /// A modified file is not snapshotted again while its modification time is
    /// less than `interval` past the latest snapshot.
    #[validate(custom(function = validate_interval))]
    #[serde(with = "humantime_serde")]
    #[getset(get_copy = "pub")]
    interval: Duration,
    /// Snapshots kept per source file, counting the one about to be taken.
    #[validate(range(min = 1))]
    #[getset(get_copy = "pub")]
    max_backups: u32,
}

impl TargetDefinition {
    /// `<source_dir>/<glob>`, used to tell targets apart in logs.
    pub fn display_path(&self) -> String {
        self.source_dir.join(self.glob.to_string()).display().to_string()
    }

    /// Files directly inside `source_dir` whose name matches the glob, sorted by name.
    ///
    /// Symlinks are followed. A dangling link is skipped with a warning, so is
    /// any other entry the glob would not select anyway.
    pub fn matching_files(&self) -> Result<Vec<PathBuf>> {
        let matcher = self.glob.matcher();
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.source_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_skippable(&e, &matcher) => {
                    warn!("Skipping unreadable entry: {e}");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if !entry.file_type().is_file() {
                tracing::trace!("Skipping {:?} not a file", entry.path());
                continue;
            }
            if matcher.is_match(Path::new(entry.file_name())) {
                files.push(entry.into_path());
            } else {
                tracing::trace!("Skipping {:?}, glob not match", entry.path());
            }
        }

        Ok(files)
    }
}

/// Walk errors on an entry below the root that either is a dangling symlink or
/// does not match the glob.
fn is_skippable(error: &walkdir::Error, matcher: &GlobMatcher) -> bool {
    let Some(path) = error.path() else {
        return false;
    };
    if error.depth() == 0 {
        return false;
    }
    let selected = path
        .file_name()
        .is_some_and(|name| matcher.is_match(Path::new(name)));
    let dangling = path
        .symlink_metadata()
        .is_ok_and(|md| md.file_type().is_symlink())
        && !path.exists();
    !selected || dangling
}

/// A single glob pattern matched against file names.
#[derive(Clone, Debug, From, Display, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct TargetGlob {
    glob: Glob,
}

impl TargetGlob {
    pub fn new(pattern: &str) -> result::Result<Self, globset::Error> {
        GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map(Self::from)
    }

    pub fn matcher(&self) -> GlobMatcher {
        self.glob.compile_matcher()
    }
}

struct TargetGlobVisitor;

impl Visitor<'_> for TargetGlobVisitor {
    type Value = TargetGlob;

    fn expecting(&self, formatter: &mut Formatter) -> std::fmt::Result {
        formatter.write_str("a glob pattern")
    }

    fn visit_str<E>(self, v: &str) -> result::Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        TargetGlob::new(v).map_err(serde::de::Error::custom)
    }
}

impl<'de> Deserialize<'de> for TargetGlob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> result::Result<Self, D::Error> {
        deserializer.deserialize_str(TargetGlobVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;
    use tempfile::TempDir;

    fn target(source_dir: &Path, glob: &str) -> TargetDefinition {
        TargetDefinition::builder()
            .source_dir(source_dir)
            .glob(TargetGlob::new(glob).unwrap())
            .backup_dir(source_dir.join("Backup"))
            .interval(Duration::from_secs(3600))
            .max_backups(10)
            .build()
    }

    fn file_names(files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().into_owned())
            .collect_vec()
    }

    #[test]
    fn test_target_glob_deserialization() {
        let glob: TargetGlob = serde_json::from_str("\"*.sav\"").unwrap();
        assert_eq!(glob.to_string(), "*.sav");
        assert!(glob.matcher().is_match("save5.sav"));
        assert!(!glob.matcher().is_match("save5.txt"));
    }

    #[test]
    fn test_target_glob_invalid_pattern() {
        assert!(serde_json::from_str::<TargetGlob>("\"[invalid\"").is_err());
    }

    #[test]
    fn test_deserialize_target_definition() {
        let yaml = r#"
source_dir: /games/SaveData
glob: save5
backup_dir: /games/SaveData/Backup
interval: 1h
max_backups: 10
"#;
        let target: TargetDefinition = serde_yml::from_str(yaml).unwrap();
        assert_eq!(target.source_dir(), Path::new("/games/SaveData"));
        assert_eq!(target.glob().to_string(), "save5");
        assert_eq!(target.interval(), Duration::from_secs(3600));
        assert_eq!(target.max_backups(), 10);
        assert_eq!(target.display_path(), "/games/SaveData/save5");
    }

    #[test]
    fn test_deserialize_target_definition_rejects_unknown_fields() {
        let yaml = r#"
source_dir: /a
glob: "*"
backup_dir: /b
interval: 1h
max_backups: 10
cron: "* * * * *"
"#;
        assert!(serde_yml::from_str::<TargetDefinition>(yaml).is_err());
    }

    #[test]
    fn test_validation() {
        let temp_dir = TempDir::new().unwrap();
        assert!(target(temp_dir.path(), "*").validate().is_ok());

        let mut zero_backups = target(temp_dir.path(), "*");
        zero_backups.max_backups = 0;
        assert!(zero_backups.validate().is_err());

        let mut backup_dir_is_file = target(temp_dir.path(), "*");
        std::fs::write(temp_dir.path().join("Backup"), b"").unwrap();
        backup_dir_is_file.backup_dir = temp_dir.path().join("Backup");
        assert!(backup_dir_is_file.validate().is_err());

        let mut huge_interval = target(temp_dir.path(), "*");
        huge_interval.interval = Duration::MAX;
        assert!(huge_interval.validate().is_err());
    }

    #[test]
    fn test_validation_allows_missing_source_dir() {
        let temp_dir = TempDir::new().unwrap();
        assert!(target(&temp_dir.path().join("missing"), "*").validate().is_ok());
    }

    #[test]
    fn test_matching_files_is_flat_and_sorted() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::create_dir_all(dir.join("Backup")).unwrap();
        std::fs::create_dir_all(dir.join("nested.sav")).unwrap();
        for name in ["b.sav", "a.sav", "c.txt", "Backup/d.sav"] {
            std::fs::write(dir.join(name), b"").unwrap();
        }

        let files = target(dir, "*.sav").matching_files().unwrap();
        assert_eq!(file_names(&files), vec!["a.sav", "b.sav"]);
    }

    #[test]
    fn test_matching_files_exact_name() {
        let temp_dir = TempDir::new().unwrap();
        for name in ["save5", "save55", "save24"] {
            std::fs::write(temp_dir.path().join(name), b"").unwrap();
        }

        let files = target(temp_dir.path(), "save5").matching_files().unwrap();
        assert_eq!(file_names(&files), vec!["save5"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_matching_files_skips_dangling_symlinks() {
        use std::os::unix::fs::symlink;

        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::write(dir.join("a.sav"), b"a").unwrap();
        std::fs::write(dir.join("real.sav"), b"real").unwrap();
        symlink(dir.join("nowhere"), dir.join("zz_old.lnk")).unwrap();
        symlink(dir.join("nowhere"), dir.join("b.sav")).unwrap();
        symlink(dir.join("real.sav"), dir.join("c.sav")).unwrap();

        let files = target(dir, "*.sav").matching_files().unwrap();
        assert_eq!(file_names(&files), vec!["a.sav", "c.sav", "real.sav"]);
    }
}

use crate::backup::function_path;
use crate::backup::naming::SnapshotPattern;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{WithDebugObjectAndFnName, WithMsg};
use chrono::{DateTime, Datelike, Local, NaiveDate, Timelike};
use function_name::named;
use std::fs::File;
use std::io::{BufWriter, IntoInnerError};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate level 1, the fastest setting.
static COMPRESSION_LEVEL: i64 = 1;

/// Writes snapshot number `sequence` of `source` into `backup_dir`.
///
/// The archive holds a single entry named after the source file. There is no
/// temporary file: the archive is written in place. A failed write removes
/// what was written so far.
#[named]
pub fn create_snapshot<P1: AsRef<Path>, P2: AsRef<Path>>(
    source: P1,
    backup_dir: P2,
    sequence: u64,
    today: NaiveDate,
) -> Result<PathBuf> {
    let source = source.as_ref();
    let entry_name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| std::io::Error::other("source file name is not valid UTF-8"))
        .map_err(Error::from)
        .with_debug_object_and_fn_name(source.to_path_buf(), function_path!())?;
    let pattern = SnapshotPattern::for_source_file(entry_name)?;
    let snapshot_path = backup_dir.as_ref().join(pattern.encode(sequence, today));

    let file = File::create(&snapshot_path)
        .map_err(Error::from)
        .with_msg(format!("Creating snapshot {snapshot_path:?} failed"))?;

    write_single_entry(file, source, entry_name)
        .map_err(|mut e| {
            if let Err(e2) = std::fs::remove_file(&snapshot_path) {
                e = e.chain(e2.into())
            }
            e
        })
        .with_debug_object_and_fn_name(snapshot_path.clone(), function_path!())?;

    Ok(snapshot_path)
}

fn write_single_entry(file: File, source: &Path, entry_name: &str) -> Result<()> {
    let mut options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));
    if let Some(modified) = entry_timestamp(source) {
        options = options.last_modified_time(modified);
    }

    let mut writer = ZipWriter::new(BufWriter::new(file));
    writer.start_file(entry_name, options)?;
    std::io::copy(&mut File::open(source)?, &mut writer)?;
    writer
        .finish()?
        .into_inner()
        .map_err(IntoInnerError::into_error)?
        .sync_all()?;

    Ok(())
}

/// Local modification time of `source` as a zip timestamp, when representable.
fn entry_timestamp(source: &Path) -> Option<zip::DateTime> {
    let modified = DateTime::<Local>::from(std::fs::metadata(source).ok()?.modified().ok()?);
    zip::DateTime::from_date_and_time(
        u16::try_from(modified.year()).ok()?,
        modified.month() as u8,
        modified.day() as u8,
        modified.hour() as u8,
        modified.minute() as u8,
        modified.second() as u8,
    )
    .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;
    use zip::ZipArchive;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn test_create_snapshot_contains_source_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("save5");
        let content = b"campaign state ".repeat(1000);
        std::fs::write(&source, &content).unwrap();

        let path = create_snapshot(&source, temp_dir.path(), 7, today()).unwrap();
        assert_eq!(path, temp_dir.path().join("20240309_7_save5_bak.zip"));

        let mut archive = ZipArchive::new(File::open(&path).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "save5");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut read_back = Vec::new();
        entry.read_to_end(&mut read_back).unwrap();
        assert_eq!(read_back, content);
    }

    #[test]
    fn test_create_snapshot_overwrites_existing_name() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("save5");
        std::fs::write(&source, b"new").unwrap();
        std::fs::write(temp_dir.path().join("20240309_2_save5_bak.zip"), b"garbage").unwrap();

        let path = create_snapshot(&source, temp_dir.path(), 2, today()).unwrap();
        assert!(ZipArchive::new(File::open(path).unwrap()).is_ok());
    }

    #[test]
    fn test_create_snapshot_missing_source_leaves_nothing_behind() {
        let temp_dir = TempDir::new().unwrap();
        let backup_dir = temp_dir.path().join("backup");
        std::fs::create_dir(&backup_dir).unwrap();

        let result = create_snapshot(temp_dir.path().join("gone"), &backup_dir, 1, today());
        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(&backup_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_create_snapshot_missing_backup_dir_fails() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("save5");
        std::fs::write(&source, b"data").unwrap();

        let error =
            create_snapshot(&source, temp_dir.path().join("missing"), 1, today()).unwrap_err();
        assert!(error.to_string().contains("Creating snapshot"));
    }
}

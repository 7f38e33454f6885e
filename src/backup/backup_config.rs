use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::scheduler::DEFAULT_POLL_INTERVAL;
use crate::backup::target::TargetDefinition;
use crate::backup::validate::validate_poll_interval;
use bon::Builder;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;
use validator::Validate;

/// Contents of the YAML configuration file.
///
/// ```yaml
/// poll_interval: 5s
/// targets:
///   - source_dir: /home/me/SaveData
///     glob: "*.sav"
///     backup_dir: /home/me/SaveData/Backup
///     interval: 1h
///     max_backups: 10
/// ```
#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct BackupConfig {
    /// Pause between two passes over the same target.
    #[serde(default = "default_poll_interval", with = "humantime_serde")]
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    #[validate(custom(function = validate_poll_interval))]
    #[getset(get_copy = "pub")]
    poll_interval: Duration,
    #[validate(length(min = 1), nested)]
    #[getset(get = "pub")]
    targets: Vec<TargetDefinition>,
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

impl BackupConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        File::open(path)
            .map_err(Error::from)
            .with_msg(format!("Open config failed: {:?}", path))
            .and_then(|f| {
                serde_yml::from_reader::<_, BackupConfig>(f)
                    .map_err(Error::from)
                    .with_msg(format!("Parse YAML config failed: {:?}", path))
            })
            .and_then(|bc| {
                bc.validate()
                    .map_err(Error::from)
                    .map(|_| bc)
                    .with_msg(format!("Config validation failed: {:?}", path))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    static CONFIG: &str = r#"
targets:
  - source_dir: /games/SaveData
    glob: save5
    backup_dir: /games/SaveData/Backup
    interval: 60m
    max_backups: 10
  - source_dir: /games/SaveData
    glob: save24
    backup_dir: /games/SaveData/Backup24
    interval: 1h
    max_backups: 20
"#;

    #[test]
    fn test_parse_config_defaults_poll_interval() {
        let config: BackupConfig = serde_yml::from_str(CONFIG).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.targets().len(), 2);
        assert_eq!(config.targets()[1].max_backups(), 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config_poll_interval() {
        let yaml = format!("poll_interval: 250ms\n{CONFIG}");
        let config: BackupConfig = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_validation_rejects_empty_targets() {
        let config = BackupConfig::builder().targets(vec![]).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_is_nested() {
        let yaml = CONFIG.replace("max_backups: 20", "max_backups: 0");
        let config: BackupConfig = serde_yml::from_str(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yml");
        std::fs::write(&path, CONFIG).unwrap();

        let config = BackupConfig::from_path(&path).unwrap();
        assert_eq!(config.targets()[0].glob().to_string(), "save5");
    }

    #[test]
    fn test_from_path_reports_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yml");
        std::fs::write(&path, "poll_interval: 0s\n".to_string() + CONFIG).unwrap();

        let error = BackupConfig::from_path(&path).unwrap_err();
        assert!(error.to_string().starts_with("Config validation failed"));

        let error = BackupConfig::from_path(temp_dir.path().join("missing.yml")).unwrap_err();
        assert!(error.to_string().starts_with("Open config failed"));
    }
}

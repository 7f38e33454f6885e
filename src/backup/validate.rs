//! Validation functions for configuration values.

use chrono::TimeDelta;
use std::path::Path;
use std::time::Duration;
use validator::ValidationError;

/// Rejects a path that exists but is not a directory. A missing path is fine,
/// it gets created on first use.
pub fn validate_dir_or_absent<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() && !dir.is_dir() {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} is not a directory", dir).into()));
    }

    Ok(())
}

pub fn validate_interval(interval: &Duration) -> Result<(), ValidationError> {
    if TimeDelta::from_std(*interval).is_err() {
        return Err(ValidationError::new("InvalidInterval")
            .with_message(format!("interval {interval:?} is out of range").into()));
    }

    Ok(())
}

pub fn validate_poll_interval(interval: &Duration) -> Result<(), ValidationError> {
    if interval.is_zero() {
        return Err(ValidationError::new("InvalidPollInterval")
            .with_message("poll_interval must be greater than zero".into()));
    }

    Ok(())
}

use crate::backup::backup_config::BackupConfig;
use crate::backup::pass::PassOutcome;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::WithMsg;
use crate::backup::target::TargetDefinition;
use itertools::Itertools;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument, Span};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

impl TargetDefinition {
    /// Runs a pass every `poll_interval` until `cancel` fires.
    ///
    /// Returns `Ok` on cancellation. Any other failure ends the loop for good
    /// and is returned; the target is not retried.
    pub async fn run_until_cancelled(
        self,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Result<()> {
        let span = info_span!("target", path = %self.display_path());
        let target = Arc::new(self);

        async move {
            loop {
                let pass_target = target.clone();
                let pass_cancel = cancel.clone();
                let pass_span = Span::current();
                let outcome = tokio::task::spawn_blocking(move || {
                    pass_span.in_scope(|| pass_target.run_pass(&pass_cancel))
                })
                .await
                .map_err(Error::from)
                .and_then(|r| r);

                match outcome {
                    Ok(PassOutcome::Cancelled(summary)) => {
                        info!("Cancelled - {} ({summary:?})", target.display_path());
                        return Ok(());
                    }
                    Ok(outcome) => debug!("Pass finished: {outcome:?}"),
                    Err(e) => {
                        error!(
                            "Error - {}, backups of this target are stopped until restart ({} errors):\n{e}",
                            target.display_path(),
                            e.count()
                        );
                        return Err(e.with_msg(format!(
                            "Backups of {} stopped",
                            target.display_path()
                        )));
                    }
                }

                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Cancelled - {}", target.display_path());
                        return Ok(());
                    }
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }
        .instrument(span)
        .await
    }
}

/// Starts one worker per target and waits for all of them.
///
/// Results come back in configuration order: `Ok` for a worker that stopped on
/// cancellation, `Err` for one that stopped on a failure.
pub async fn run_all(config: &BackupConfig, cancel: CancellationToken) -> Vec<Result<()>> {
    info!("Starting {} backup workers", config.targets().len());
    let handles = config
        .targets()
        .iter()
        .cloned()
        .map(|target| {
            tokio::spawn(target.run_until_cancelled(config.poll_interval(), cancel.clone()))
        })
        .collect_vec();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.map_err(Error::from).and_then(|r| r));
    }

    info!(
        "All backup workers stopped, {} failed",
        results.iter().filter(|r| r.is_err()).count()
    );
    results
}

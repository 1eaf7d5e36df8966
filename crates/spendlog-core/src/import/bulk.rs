//! Batched, rate-limit aware persistence of validated records.

use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{PersistenceError, SpendlogError};
use crate::models::config::ImportConfig;
use crate::models::expense::{ExpenseRecord, ImportOutcome};

/// Coordinator progress, reported to an observer on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportState {
    Idle,
    /// Persisting batch `batch` (0-based) of `size` records concurrently.
    Running { batch: usize, size: usize },
    /// The batch hit a rate limit; backing off.
    Throttled { batch: usize },
    /// Re-sending the failed items of the batch one at a time.
    RetryingIndividually { batch: usize, pending: usize },
}

type Observer = Box<dyn Fn(ImportState) + Send + Sync>;

/// Drives persistence of many records in throttled batches.
pub struct BulkImportCoordinator {
    batch_size: usize,
    batch_delay: Duration,
    throttle_delay: Duration,
    retry_delay: Duration,
    strict: bool,
    observer: Option<Observer>,
}

impl BulkImportCoordinator {
    pub fn new() -> Self {
        Self::from_config(&ImportConfig::default())
    }

    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_millis(config.batch_delay_ms),
            throttle_delay: Duration::from_millis(config.throttle_delay_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            strict: config.strict,
            observer: None,
        }
    }

    /// Set the number of records persisted concurrently.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Fail with [`SpendlogError::ImportFailed`] when any record fails.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Receive every state transition.
    pub fn with_observer(mut self, observer: impl Fn(ImportState) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    fn transition(&self, state: ImportState) {
        debug!("Import state: {:?}", state);
        if let Some(observer) = &self.observer {
            observer(state);
        }
    }

    /// Persist every record, aggregating per-item results.
    ///
    /// Records in a batch are persisted concurrently; batches run one after another
    /// with a pause in between. When a batch reports a rate limit the coordinator backs
    /// off, then retries the items of that batch that did not persist, one at a time.
    /// Every record is counted exactly once, as a success or a failure, and error row
    /// indexes are 1-based positions in `records`.
    pub async fn import_all<F, Fut>(
        &self,
        records: Vec<ExpenseRecord>,
        persist: F,
    ) -> Result<ImportOutcome, SpendlogError>
    where
        F: Fn(ExpenseRecord) -> Fut,
        Fut: Future<Output = Result<(), PersistenceError>>,
    {
        let rows = (1..=records.len()).collect();
        self.import_numbered(records, rows, persist).await
    }

    /// Same as [`import_all`](Self::import_all), but a failure of `records[i]` is
    /// reported as row `rows[i]`, usually the source row the record was read from.
    pub async fn import_numbered<F, Fut>(
        &self,
        records: Vec<ExpenseRecord>,
        rows: Vec<usize>,
        persist: F,
    ) -> Result<ImportOutcome, SpendlogError>
    where
        F: Fn(ExpenseRecord) -> Fut,
        Fut: Future<Output = Result<(), PersistenceError>>,
    {
        let row_of = |position: usize| rows.get(position).copied().unwrap_or(position + 1);
        let mut outcome = ImportOutcome::new();
        let total = records.len();
        let batch_count = total.div_ceil(self.batch_size);

        info!(
            "Importing {} records in {} batches of up to {}",
            total, batch_count, self.batch_size
        );

        for (batch, chunk) in records.chunks(self.batch_size).enumerate() {
            if batch > 0 {
                tokio::time::sleep(self.batch_delay).await;
            }
            let offset = batch * self.batch_size;

            self.transition(ImportState::Running {
                batch,
                size: chunk.len(),
            });

            let results = join_all(chunk.iter().cloned().map(&persist)).await;

            let mut failed: Vec<(usize, PersistenceError)> = Vec::new();
            for (i, result) in results.into_iter().enumerate() {
                match result {
                    Ok(()) => outcome.record_success(),
                    Err(e) => failed.push((offset + i, e)),
                }
            }

            if failed.iter().any(|(_, e)| e.is_rate_limited()) {
                warn!(
                    "Batch {} was rate limited, retrying {} records individually",
                    batch + 1,
                    failed.len()
                );
                self.transition(ImportState::Throttled { batch });
                tokio::time::sleep(self.throttle_delay).await;

                self.transition(ImportState::RetryingIndividually {
                    batch,
                    pending: failed.len(),
                });
                for (n, (position, _)) in failed.into_iter().enumerate() {
                    if n > 0 {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                    match persist(records[position].clone()).await {
                        Ok(()) => outcome.record_success(),
                        Err(e) => outcome.record_persistence_failure(row_of(position), &e),
                    }
                }
            } else {
                for (position, e) in failed {
                    outcome.record_persistence_failure(row_of(position), &e);
                }
            }
        }

        self.transition(ImportState::Idle);
        info!(
            "Import finished: {} succeeded, {} failed",
            outcome.success_count, outcome.failed_count
        );

        if self.strict && outcome.failed_count > 0 {
            return Err(SpendlogError::ImportFailed(Box::new(outcome)));
        }
        Ok(outcome)
    }
}

impl Default for BulkImportCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

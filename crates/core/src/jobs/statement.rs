//! Statement ingestion job: drop directory, processor, then return matching.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info, warn};

use super::error::JobError;
use super::runner::ScheduledJob;
use crate::bank::{BankOperationProcessor, ProcessingError, StatementDirectory, parse_statement};
use crate::events::{CoreEvent, EventPublisher};
use crate::payment::{DeferredReturnMatcher, MatchingReport};

/// Counts from one statement job run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatementJobReport {
    /// Files moved to `processed/`.
    pub processed: usize,
    /// Files moved to `failed/`.
    pub rejected: usize,
    /// Files left in place for the next run.
    pub retained: usize,
    /// Result of the matching pass that follows the batch.
    pub matching: MatchingReport,
}

/// Processes every statement in the drop directory, then matches queued
/// returns.
pub struct StatementJob {
    directory: StatementDirectory,
    processor: BankOperationProcessor,
    matcher: DeferredReturnMatcher,
    events: Arc<dyn EventPublisher>,
}

impl StatementJob {
    /// Lock name of the job.
    pub const NAME: &'static str = "bank-statement-processing";

    /// Creates the job.
    #[must_use]
    pub fn new(
        directory: StatementDirectory,
        processor: BankOperationProcessor,
        matcher: DeferredReturnMatcher,
        events: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            directory,
            processor,
            matcher,
            events,
        }
    }

    /// Runs one batch.
    ///
    /// Unparseable files and statements for unknown accounts are moved to
    /// `failed/`. Files that hit a transient failure stay in place.
    ///
    /// # Errors
    ///
    /// Directory I/O failures and ledger balance violations.
    pub async fn run_once(&self) -> Result<StatementJobReport, JobError> {
        let files = self.directory.drain().await?;
        let mut report = StatementJobReport::default();

        for file in &files {
            let statement = match parse_statement(&file.contents) {
                Ok(statement) => statement,
                Err(err) => {
                    warn!(
                        file = %file.name,
                        code = err.error_code(),
                        error = %err,
                        "Rejected unparseable statement"
                    );
                    self.directory.mark_failed(file).await?;
                    report.rejected += 1;
                    continue;
                }
            };

            match self.processor.process(&statement).await {
                Ok(processed) => {
                    self.directory.mark_processed(file).await?;
                    report.processed += 1;
                    self.events.publish(CoreEvent::StatementProcessed {
                        statement_id: processed.statement_id,
                        account_iban: processed.account_iban,
                        posted: processed.posted,
                        duplicates: processed.duplicates,
                        manual_review: processed.manual_review.len(),
                    });
                }
                Err(err) if err.is_fatal() => {
                    error!(
                        file = %file.name,
                        statement_id = %statement.statement_id,
                        error = %err,
                        "Statement processing aborted"
                    );
                    return Err(err.into());
                }
                Err(err @ ProcessingError::UnknownAccount(_)) => {
                    warn!(
                        file = %file.name,
                        statement_id = %statement.statement_id,
                        error = %err,
                        "Rejected statement for unknown account"
                    );
                    self.directory.mark_failed(file).await?;
                    report.rejected += 1;
                }
                Err(err) => {
                    warn!(
                        file = %file.name,
                        statement_id = %statement.statement_id,
                        code = err.error_code(),
                        error = %err,
                        "Statement processing failed, will retry"
                    );
                    report.retained += 1;
                }
            }
        }

        report.matching = self.matcher.run().await?;
        info!(
            files = files.len(),
            processed = report.processed,
            rejected = report.rejected,
            retained = report.retained,
            "Statement job completed"
        );
        Ok(report)
    }
}

#[async_trait]
impl ScheduledJob for StatementJob {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn run(&self) -> Result<(), JobError> {
        self.run_once().await.map(|_| ())
    }
}

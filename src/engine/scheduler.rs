//! Cycle scheduler.
//!
//! Fires a scan → evaluate → acquire cycle at a fixed interval. Every
//! cycle runs in its own task, so a slow cycle does not delay the next
//! tick unless the single-flight guard is enabled. Inside a cycle all
//! candidates are driven concurrently; a shared semaphore caps how many
//! candidate pipelines are in flight across all cycles.

use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::evaluator::Evaluator;
use super::executor::Executor;
use super::scanner::Scanner;
use crate::types::{Candidate, CandidateOutcome, CycleReport, Verdict};

/// Scheduler knobs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub max_concurrent: usize,
    pub single_flight: bool,
}

/// Everything one cycle needs. Immutable after construction and shared by
/// every cycle task.
pub struct Pipeline {
    scanner: Scanner,
    evaluator: Evaluator,
    executor: Executor,
    permits: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(
        scanner: Scanner,
        evaluator: Evaluator,
        executor: Executor,
        max_concurrent: usize,
    ) -> Self {
        Self {
            scanner,
            evaluator,
            executor,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Run one full cycle. Always settles: a scan failure yields a report
    /// flagged `scan_failed`, candidate failures are counted, never raised.
    pub async fn run_cycle(&self, cycle_number: u64) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::new(cycle_number);

        info!(cycle = cycle_number, "Starting cycle");

        let candidates = match self.scanner.scan().await {
            Ok(candidates) => candidates,
            Err(e) => {
                error!(cycle = cycle_number, error = %e, "Scan failed, skipping cycle");
                report.scan_failed = true;
                report.elapsed = started.elapsed();
                return report;
            }
        };
        report.candidates_scanned = candidates.len();

        let outcomes = join_all(candidates.into_iter().map(|c| self.process_candidate(c))).await;
        for outcome in &outcomes {
            report.record(outcome);
        }

        report.elapsed = started.elapsed();
        report
    }

    /// Gate then, on a full pass, acquire. Errors become a `Failed` outcome
    /// here so they never reach sibling candidates.
    async fn process_candidate(&self, candidate: Candidate) -> CandidateOutcome {
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return CandidateOutcome::Failed {
                    candidate,
                    error: e.to_string(),
                }
            }
        };

        let evaluation = match self.evaluator.evaluate(&candidate).await {
            Ok(evaluation) => evaluation,
            Err(e) => {
                warn!(
                    issuer = %candidate.issuer,
                    currency = %candidate.currency,
                    error = %e,
                    "Evaluation failed, skipping candidate"
                );
                return CandidateOutcome::Failed {
                    candidate,
                    error: e.to_string(),
                };
            }
        };

        if let Verdict::Rejected { stage, .. } = evaluation.verdict {
            return CandidateOutcome::Rejected { candidate, stage };
        }

        match self.executor.acquire(&candidate).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    issuer = %candidate.issuer,
                    currency = %candidate.currency,
                    error = %e,
                    "Acquisition failed"
                );
                CandidateOutcome::Failed {
                    candidate,
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Periodic driver around a shared [`Pipeline`].
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, config: SchedulerConfig) -> Self {
        Self { pipeline, config }
    }

    /// Tick until `shutdown` resolves, then wait for in-flight cycles.
    /// Returns the number of cycles started.
    pub async fn run<F>(&self, shutdown: F) -> u64
    where
        F: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut cycle_number = 0u64;

        info!(
            interval_secs = self.config.interval.as_secs_f64(),
            max_concurrent = self.config.max_concurrent,
            single_flight = self.config.single_flight,
            "Entering main loop. Press Ctrl+C to stop."
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    while let Some(joined) = in_flight.try_join_next() {
                        settle(joined);
                    }

                    if self.config.single_flight && !in_flight.is_empty() {
                        warn!(running = in_flight.len(), "Previous cycle still running, skipping tick");
                        continue;
                    }

                    cycle_number += 1;
                    let pipeline = Arc::clone(&self.pipeline);
                    let n = cycle_number;
                    in_flight.spawn(async move {
                        let report = pipeline.run_cycle(n).await;
                        log_cycle_report(&report);
                    });
                }
                _ = &mut shutdown => {
                    info!(in_flight = in_flight.len(), "Shutdown signal received.");
                    break;
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            settle(joined);
        }

        cycle_number
    }
}

fn settle(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Cycle task aborted");
    }
}

/// Log a human-readable cycle summary.
fn log_cycle_report(report: &CycleReport) {
    info!(
        cycle = report.cycle_number,
        scanned = report.candidates_scanned,
        rejected_control = report.rejected_issuer_control,
        rejected_liquidity = report.rejected_liquidity,
        rejected_cap = report.rejected_market_cap,
        acquired = report.acquired.len(),
        dry_run = report.dry_run_matches,
        failed = report.failed,
        scan_failed = report.scan_failed,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Cycle complete"
    );
}

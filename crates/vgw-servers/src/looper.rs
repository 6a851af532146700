//! Periodic Update Looper
//!
//! Runs an update cycle for every configured provider, on a period,
//! on demand, or both. Providers are updated concurrently and
//! independently: one provider failing or timing out never blocks or
//! rolls back another.

use crate::provider::{Provider, ProviderDescriptor};
use crate::store::CatalogStore;
use crate::updater::{UpdateError, UpdateOutcome, Updater};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Looper timing
#[derive(Debug, Clone, Default)]
pub struct LooperConfig {
    /// Time between cycles; `None` runs only on trigger
    pub period: Option<Duration>,
    /// Deadline of each provider update
    pub cycle_timeout: Option<Duration>,
}

/// Outcomes of one cycle, ordered by provider
#[derive(Debug)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub outcomes: Vec<UpdateOutcome>,
}

impl CycleReport {
    pub fn committed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_committed()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.committed()
    }

    /// Providers whose update did not commit, in provider order
    pub fn failed_providers(&self) -> Vec<Provider> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(UpdateError::provider))
            .collect()
    }
}

/// Requests an immediate cycle from a running looper
#[derive(Clone)]
pub struct LooperHandle {
    trigger: Arc<Notify>,
}

impl LooperHandle {
    /// Run a cycle as soon as the current one (if any) finishes
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }
}

/// Drives [`Updater`] cycles
pub struct UpdateLooper {
    updater: Arc<Updater>,
    descriptors: Vec<ProviderDescriptor>,
    config: LooperConfig,
    trigger: Arc<Notify>,
}

impl UpdateLooper {
    pub fn new(updater: Arc<Updater>, descriptors: Vec<ProviderDescriptor>, config: LooperConfig) -> Self {
        Self {
            updater,
            descriptors,
            config,
            trigger: Arc::new(Notify::new()),
        }
    }

    /// Store the cycles commit to
    pub fn store(&self) -> &Arc<CatalogStore> {
        self.updater.store()
    }

    pub fn handle(&self) -> LooperHandle {
        LooperHandle {
            trigger: self.trigger.clone(),
        }
    }

    /// Update every provider once, concurrently
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> CycleReport {
        let started_at = Utc::now();
        let mut tasks = JoinSet::new();

        for descriptor in self.descriptors.iter().cloned() {
            let updater = self.updater.clone();
            let parent = cancel.clone();
            let timeout = self.config.cycle_timeout;

            tasks.spawn(async move {
                let child = parent.child_token();
                let deadline = timeout.map(|timeout| {
                    let child = child.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(timeout).await;
                        child.cancel();
                    })
                });

                let mut outcome = updater.update(&descriptor, &child).await;

                if let Some(deadline) = deadline {
                    deadline.abort();
                }
                if let (Some(timeout), Err(e)) = (timeout, &outcome.result) {
                    if e.is_cancelled() && !parent.is_cancelled() {
                        outcome.result = Err(UpdateError::DeadlineExceeded {
                            provider: descriptor.provider,
                            timeout,
                        });
                    }
                }
                outcome
            });
        }

        let mut outcomes = Vec::with_capacity(self.descriptors.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => error!("Provider update task failed: {}", e),
            }
        }
        outcomes.sort_by_key(|o| o.provider);

        let report = CycleReport {
            started_at,
            outcomes,
        };
        info!(
            "Update cycle started at {} done in {}ms: {} committed, {} failed",
            report.started_at.format("%H:%M:%S"),
            (Utc::now() - report.started_at).num_milliseconds(),
            report.committed(),
            report.failed()
        );
        report
    }

    /// Run cycles until `cancel` fires, sending each report to `reports`
    pub async fn run(self, cancel: CancellationToken, reports: mpsc::Sender<CycleReport>) {
        let mut interval = self.config.period.map(|period| {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        info!(
            "Update looper started for {} providers (period: {:?})",
            self.descriptors.len(),
            self.config.period
        );

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.trigger.notified() => debug!("Update cycle triggered"),
                _ = async {
                    match interval.as_mut() {
                        Some(interval) => {
                            interval.tick().await;
                        }
                        None => std::future::pending::<()>().await,
                    }
                } => debug!("Update cycle due"),
            }

            let report = self.run_cycle(&cancel).await;
            if reports.send(report).await.is_err() {
                debug!("Report receiver dropped, stopping looper");
                break;
            }
        }

        info!("Update looper stopped");
    }
}

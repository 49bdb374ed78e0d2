// src/ingest/scheduler.rs
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metrics::counter;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ingest::orchestrator::{Orchestrator, RunSummary};

/// Result of asking for a run. Failures during the run only show up in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TriggerStatus {
    Started,
    AlreadyRunning,
}

/// Process-scoped ingestion context: what to run, and whether a run is in flight.
struct Inner {
    orchestrator: Orchestrator,
    keywords: Vec<String>,
    running: AtomicBool,
    last_run: Mutex<Option<RunSummary>>,
}

/// Single-flight gate in front of the orchestrator (Idle <-> Running).
/// Timer ticks and manual triggers both go through [`Scheduler::trigger`];
/// a request that arrives while Running is dropped, never queued.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

/// Holding this means the scheduler is Running. Dropping it returns to Idle,
/// including when the run task panics.
struct RunGuard(Arc<Inner>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
    }
}

impl Scheduler {
    pub fn new(orchestrator: Orchestrator, keywords: Vec<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                keywords,
                running: AtomicBool::new(false),
                last_run: Mutex::new(None),
            }),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    pub fn keywords(&self) -> &[String] {
        &self.inner.keywords
    }

    pub fn platforms(&self) -> Vec<String> {
        self.inner.orchestrator.platforms()
    }

    pub fn last_run(&self) -> Option<RunSummary> {
        self.inner
            .last_run
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn try_begin(&self) -> Option<RunGuard> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(self.inner.clone()))
    }

    /// Start a run in the background and return immediately.
    pub fn trigger(&self) -> TriggerStatus {
        let Some(guard) = self.try_begin() else {
            counter!("ingest_runs_skipped_total").increment(1);
            tracing::info!(target: "ingest", "run already in flight, trigger dropped");
            return TriggerStatus::AlreadyRunning;
        };
        let inner = self.inner.clone();
        tokio::spawn(async move {
            let _guard = guard;
            execute(&inner).await;
        });
        TriggerStatus::Started
    }

    /// Run in the caller's task. `None` if another run was already in flight.
    pub async fn run_now(&self) -> Option<RunSummary> {
        let _guard = self.try_begin()?;
        Some(execute(&self.inner).await)
    }

    /// Spawn the periodic loop. The first tick fires immediately, so a run
    /// happens at startup; later ticks that land on a busy scheduler are dropped.
    pub fn spawn(&self, interval: Duration) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let status = this.trigger();
                tracing::debug!(target: "ingest", ?status, "scheduler tick");
            }
        })
    }
}

async fn execute(inner: &Inner) -> RunSummary {
    tracing::info!(target: "ingest", keywords = inner.keywords.len(), "run starting");
    let summary = inner.orchestrator.run_once(&inner.keywords).await;
    *inner.last_run.lock().unwrap_or_else(|p| p.into_inner()) = Some(summary.clone());
    summary
}

//! Per-source polling.
//!
//! Each source runs its own loop: `Idle -> Fetching -> (Succeeded | Failed) -> Idle`.
//! A fetch is awaited before the next tick is taken, so one source never has
//! two requests in flight and responses can't be applied out of order.
//! Ticks missed while a slow fetch is outstanding are skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::adapters::backend::DashboardBackend;
use crate::core::domain::{LiveClusterRecord, NodePoolConfig, TelemetryMap};
use crate::error::FetchError;

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    NodePools,
    LiveClusters,
    GpuTelemetry,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [
        SourceKind::NodePools,
        SourceKind::LiveClusters,
        SourceKind::GpuTelemetry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::NodePools => "node_pools",
            SourceKind::LiveClusters => "live_clusters",
            SourceKind::GpuTelemetry => "gpu_telemetry",
        }
    }

    async fn fetch(&self, backend: &dyn DashboardBackend) -> Result<SourceValue, FetchError> {
        match self {
            SourceKind::NodePools => backend.fetch_node_pools().await.map(SourceValue::NodePools),
            SourceKind::LiveClusters => backend.fetch_live_clusters().await.map(SourceValue::LiveClusters),
            SourceKind::GpuTelemetry => backend.fetch_gpu_telemetry().await.map(SourceValue::GpuTelemetry),
        }
    }
}

/// A successfully fetched value. Replaces the previous value of its source wholesale.
#[derive(Debug, Clone)]
pub enum SourceValue {
    NodePools(Vec<NodePoolConfig>),
    LiveClusters(Vec<LiveClusterRecord>),
    GpuTelemetry(TelemetryMap),
}

#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourcePhase {
    Idle,
    Fetching,
    Succeeded,
    Failed,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct SourceHealth {
    pub source: SourceKind,
    pub phase: SourcePhase,
    pub consecutive_failures: u32,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl SourceHealth {
    pub fn new(source: SourceKind) -> Self {
        Self {
            source,
            phase: SourcePhase::Idle,
            consecutive_failures: 0,
            last_success_at: None,
            last_error: None,
        }
    }
}

/// Outcome of one completed fetch, sent to the reconciler.
#[derive(Debug)]
pub struct SourceEvent {
    pub health: SourceHealth,
    /// `None` when the fetch failed; the reconciler keeps the last good value.
    pub value: Option<SourceValue>,
}

/// Per-source state machine. Only its own poll loop mutates it.
#[derive(Debug)]
pub struct SourceMachine {
    health: SourceHealth,
}

impl SourceMachine {
    pub fn new(source: SourceKind) -> Self {
        Self { health: SourceHealth::new(source) }
    }

    pub fn phase(&self) -> SourcePhase {
        self.health.phase
    }

    /// Idle -> Fetching. Returns false if a fetch is already outstanding.
    pub fn begin(&mut self) -> bool {
        if self.health.phase != SourcePhase::Idle {
            return false;
        }
        self.health.phase = SourcePhase::Fetching;
        true
    }

    pub fn succeed(&mut self) -> &SourceHealth {
        self.health.phase = SourcePhase::Succeeded;
        self.health.consecutive_failures = 0;
        self.health.last_success_at = Some(Utc::now());
        self.health.last_error = None;
        &self.health
    }

    pub fn fail(&mut self, err: &FetchError) -> &SourceHealth {
        self.health.phase = SourcePhase::Failed;
        self.health.consecutive_failures = self.health.consecutive_failures.saturating_add(1);
        self.health.last_error = Some(err.to_string());
        &self.health
    }

    /// Succeeded | Failed -> Idle.
    pub fn settle(&mut self) {
        if matches!(self.health.phase, SourcePhase::Succeeded | SourcePhase::Failed) {
            self.health.phase = SourcePhase::Idle;
        }
    }
}

/// Polls one source until shutdown or until the reconciler goes away.
/// An in-flight fetch is dropped when shutdown fires.
pub async fn run_source(
    kind: SourceKind,
    every: Duration,
    backend: Arc<dyn DashboardBackend>,
    tx: mpsc::Sender<SourceEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut machine = SourceMachine::new(kind);
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(event = "SOURCE_POLL_START", source = kind.as_str(), interval_ms = every.as_millis() as u64, "Source polling started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.wait_for(|stop| *stop) => break,
        }

        // The loop awaits each fetch before the next tick, so the machine is
        // always Idle here; it tracks phase, it does not prevent overlap.
        let started = machine.begin();
        debug_assert!(started, "poll loop took a tick with a fetch outstanding");

        let outcome = tokio::select! {
            res = kind.fetch(backend.as_ref()) => res,
            _ = shutdown.wait_for(|stop| *stop) => break,
        };

        let event = match outcome {
            Ok(value) => SourceEvent {
                health: machine.succeed().clone(),
                value: Some(value),
            },
            Err(e) => {
                let health = machine.fail(&e).clone();
                if health.consecutive_failures <= 3 {
                    warn!(event = "SOURCE_FETCH_FAILED", source = kind.as_str(), error = %e, consecutive_failures = health.consecutive_failures, "Fetch failed, keeping last good value");
                } else {
                    error!(event = "SOURCE_FETCH_FAILED", source = kind.as_str(), error = %e, consecutive_failures = health.consecutive_failures, "Fetch failing repeatedly, keeping last good value");
                }
                SourceEvent { health, value: None }
            }
        };

        if tx.send(event).await.is_err() {
            break;
        }
        machine.settle();
    }

    info!(event = "SOURCE_POLL_STOP", source = kind.as_str(), "Source polling stopped");
}

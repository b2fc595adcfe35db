//! Refresh coordinator.
//!
//! Three poll tasks (one per source) feed a single reconciliation task over
//! an mpsc channel. The reconciliation task is the only reader of the
//! latest-value slots and the only writer of the published snapshot, so no
//! locks are involved. Every published snapshot is built from one complete
//! `ReconcileInputs` triple.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::adapters::backend::DashboardBackend;
use crate::config::AppConfig;
use crate::core::domain::{LiveClusterRecord, NodePoolConfig, PoolView, TelemetryMap};
use crate::core::pool_view::ReconcileInputs;
use crate::refresh::source::{run_source, SourceEvent, SourceHealth, SourceKind, SourceValue};

#[derive(Debug, Clone, Copy)]
pub struct RefreshIntervals {
    pub node_pools: Duration,
    pub live_clusters: Duration,
    pub gpu_telemetry: Duration,
}

impl RefreshIntervals {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            node_pools: cfg.node_pools_interval,
            live_clusters: cfg.live_status_interval,
            gpu_telemetry: cfg.gpu_telemetry_interval,
        }
    }

    fn for_kind(&self, kind: SourceKind) -> Duration {
        match kind {
            SourceKind::NodePools => self.node_pools,
            SourceKind::LiveClusters => self.live_clusters,
            SourceKind::GpuTelemetry => self.gpu_telemetry,
        }
    }
}

/// What subscribers see. Immutable once published.
#[derive(Serialize, Clone, Debug)]
pub struct DashboardSnapshot {
    /// Number of reconciliation passes so far.
    pub revision: u64,
    /// True until every source has succeeded at least once.
    pub loading: bool,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub pools: Vec<PoolView>,
    #[serde(skip)]
    pub inputs: Option<Arc<ReconcileInputs>>,
    pub sources: Vec<SourceHealth>,
}

impl DashboardSnapshot {
    fn loading(sources: Vec<SourceHealth>) -> Self {
        Self {
            revision: 0,
            loading: true,
            refreshed_at: None,
            pools: Vec::new(),
            inputs: None,
            sources,
        }
    }

    /// Pools as seen by `user`, rebuilt from this snapshot's inputs.
    pub fn pools_for(&self, user: Option<&str>) -> Vec<PoolView> {
        match &self.inputs {
            Some(inputs) => inputs.build_views(user),
            None => Vec::new(),
        }
    }
}

pub struct CoordinatorHandle {
    snapshot_rx: watch::Receiver<Arc<DashboardSnapshot>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl CoordinatorHandle {
    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.snapshot_rx.clone()
    }

    /// Stops every poll task (dropping in-flight fetches) and the reconciler,
    /// and waits for them to exit.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!(event = "COORDINATOR_STOPPED", "Refresh coordinator stopped");
    }
}

impl Drop for CoordinatorHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Spawns the three poll tasks and the reconciliation task.
pub fn spawn(
    backend: Arc<dyn DashboardBackend>,
    intervals: RefreshIntervals,
    current_user: Option<String>,
) -> CoordinatorHandle {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (event_tx, event_rx) = mpsc::channel::<SourceEvent>(16);

    let reconciler = Reconciler::new(current_user);
    let snapshot_rx = reconciler.out.subscribe();

    let mut tasks = Vec::with_capacity(SourceKind::ALL.len() + 1);
    for kind in SourceKind::ALL {
        tasks.push(tokio::spawn(run_source(
            kind,
            intervals.for_kind(kind),
            backend.clone(),
            event_tx.clone(),
            shutdown_rx.clone(),
        )));
    }
    drop(event_tx);
    tasks.push(tokio::spawn(reconciler.run(event_rx, shutdown_rx)));

    info!(
        event = "COORDINATOR_STARTED",
        node_pools_ms = intervals.node_pools.as_millis() as u64,
        live_clusters_ms = intervals.live_clusters.as_millis() as u64,
        gpu_telemetry_ms = intervals.gpu_telemetry.as_millis() as u64,
        "Refresh coordinator started"
    );

    CoordinatorHandle { snapshot_rx, shutdown_tx, tasks }
}

/// Owns the latest good value of every source.
struct Reconciler {
    current_user: Option<String>,
    node_pools: Option<Vec<NodePoolConfig>>,
    live_clusters: Option<Vec<LiveClusterRecord>>,
    telemetry: Option<TelemetryMap>,
    health: BTreeMap<SourceKind, SourceHealth>,
    revision: u64,
    out: watch::Sender<Arc<DashboardSnapshot>>,
}

impl Reconciler {
    fn new(current_user: Option<String>) -> Self {
        let health: BTreeMap<_, _> = SourceKind::ALL
            .iter()
            .map(|k| (*k, SourceHealth::new(*k)))
            .collect();
        let initial = DashboardSnapshot::loading(health.values().cloned().collect());
        let (out, _) = watch::channel(Arc::new(initial));
        Self {
            current_user,
            node_pools: None,
            live_clusters: None,
            telemetry: None,
            health,
            revision: 0,
            out,
        }
    }

    async fn run(mut self, mut events: mpsc::Receiver<SourceEvent>, mut shutdown: watch::Receiver<bool>) {
        loop {
            let first = tokio::select! {
                ev = events.recv() => match ev {
                    Some(ev) => ev,
                    None => break,
                },
                _ = shutdown.wait_for(|stop| *stop) => break,
            };

            // Fold everything already queued into one pass.
            let mut updated = self.apply(first);
            while let Ok(ev) = events.try_recv() {
                updated |= self.apply(ev);
            }
            self.publish(updated);
        }
    }

    /// Returns true when a source value changed.
    fn apply(&mut self, event: SourceEvent) -> bool {
        self.health.insert(event.health.source, event.health);
        match event.value {
            Some(SourceValue::NodePools(v)) => self.node_pools = Some(v),
            Some(SourceValue::LiveClusters(v)) => self.live_clusters = Some(v),
            Some(SourceValue::GpuTelemetry(v)) => self.telemetry = Some(v),
            None => return false,
        }
        true
    }

    fn inputs(&self) -> Option<ReconcileInputs> {
        Some(ReconcileInputs {
            node_pools: self.node_pools.clone()?,
            live_clusters: self.live_clusters.clone()?,
            telemetry: self.telemetry.clone()?,
        })
    }

    fn publish(&mut self, updated: bool) {
        let sources: Vec<SourceHealth> = self.health.values().cloned().collect();

        if !updated {
            // Only health changed; keep serving the previous pools.
            let mut snapshot = DashboardSnapshot::clone(&self.out.borrow());
            snapshot.sources = sources;
            self.out.send_replace(Arc::new(snapshot));
            return;
        }

        let snapshot = match self.inputs() {
            Some(inputs) => {
                self.revision += 1;
                let pools = inputs.build_views(self.current_user.as_deref());
                debug!(event = "RECONCILED", revision = self.revision, pools = pools.len(), "Pool views rebuilt");
                DashboardSnapshot {
                    revision: self.revision,
                    loading: false,
                    refreshed_at: Some(Utc::now()),
                    pools,
                    inputs: Some(Arc::new(inputs)),
                    sources,
                }
            }
            None => DashboardSnapshot::loading(sources),
        };
        self.out.send_replace(Arc::new(snapshot));
    }
}

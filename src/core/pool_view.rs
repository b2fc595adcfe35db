//! Composes resolver, ordering and capacity into one `PoolView` per
//! configured pool.

use serde::Serialize;

use crate::core::capacity;
use crate::core::domain::{
    GpuCapacity, LiveClusterRecord, NodePoolConfig, PoolState, PoolView, TelemetryMap,
};
use crate::core::ordering;
use crate::core::resolver;
use crate::core::telemetry;

/// One consistent triple of source values. Views are only ever built from
/// a whole `ReconcileInputs`, never from pieces taken at different times.
#[derive(Serialize, Clone, Debug, Default)]
pub struct ReconcileInputs {
    pub node_pools: Vec<NodePoolConfig>,
    pub live_clusters: Vec<LiveClusterRecord>,
    pub telemetry: TelemetryMap,
}

impl ReconcileInputs {
    pub fn build_views(&self, current_user: Option<&str>) -> Vec<PoolView> {
        self.node_pools
            .iter()
            .map(|pool| build_pool_view(pool, &self.live_clusters, &self.telemetry, current_user))
            .collect()
    }
}

pub fn build_pool_view(
    pool: &NodePoolConfig,
    live: &[LiveClusterRecord],
    telemetry: &TelemetryMap,
    current_user: Option<&str>,
) -> PoolView {
    let state = if !pool.is_configured {
        PoolState::NotConfigured
    } else if pool.hosts.is_empty() {
        PoolState::Empty
    } else {
        PoolState::Ready
    };

    if state != PoolState::Ready {
        return PoolView {
            pool_id: pool.pool_id(),
            display_name: pool.display_name().to_string(),
            provider: pool.provider,
            state,
            max_instances: pool.max_instances,
            nodes: Vec::new(),
            gpu: GpuCapacity::default(),
            capacity_percent: 0,
            assigned_to_current_user_count: 0,
        };
    }

    let mut nodes = resolver::resolve_nodes(pool, live);
    for node in &mut nodes {
        if let Some(samples) = telemetry.get(&node.address) {
            node.gpu = telemetry::parse_node(samples);
        }
    }
    ordering::sort_nodes(&mut nodes, current_user);
    let cap = capacity::aggregate(&nodes);

    let assigned_to_current_user_count = match current_user {
        Some(me) => nodes.iter().filter(|n| n.owner.as_deref() == Some(me)).count(),
        None => 0,
    };

    PoolView {
        pool_id: pool.pool_id(),
        display_name: pool.display_name().to_string(),
        provider: pool.provider,
        state,
        max_instances: pool.max_instances,
        nodes,
        gpu: cap.gpu,
        capacity_percent: cap.percent,
        assigned_to_current_user_count,
    }
}

use crate::core::domain::{GpuCapacity, NodeStatus, ResolvedNode};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCapacity {
    pub gpu: GpuCapacity,
    pub percent: u8,
}

/// Pool utilization. Uses GPU totals when any telemetry exists, otherwise
/// the share of active nodes.
pub fn aggregate(nodes: &[ResolvedNode]) -> PoolCapacity {
    let gpu: GpuCapacity = nodes.iter().map(|n| n.gpu).sum();
    let active = nodes.iter().filter(|n| n.status == NodeStatus::Active).count();

    let percent = if gpu.total > 0 {
        percent_of(gpu.used() as u64, gpu.total as u64)
    } else {
        percent_of(active as u64, nodes.len() as u64)
    };

    PoolCapacity { gpu, percent }
}

/// `round(part / whole * 100)` bounded to 0..=100; 0 when `whole` is 0.
pub fn percent_of(part: u64, whole: u64) -> u8 {
    if whole == 0 {
        return 0;
    }
    let pct = (part.min(whole) as f64 / whole as f64 * 100.0).round();
    pct.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::NodeType;
    use proptest::prelude::*;

    fn node(status: NodeStatus, total: u32, free: u32) -> ResolvedNode {
        ResolvedNode {
            id: "direct/p/h".into(),
            pool_id: "direct/p".into(),
            address: "h".into(),
            node_type: NodeType::Dedicated,
            status,
            owner: None,
            job_name: None,
            gpu: GpuCapacity { total, free },
        }
    }

    #[test]
    fn uses_gpu_totals_when_present() {
        let nodes = vec![node(NodeStatus::Active, 2, 1), node(NodeStatus::Active, 0, 0)];
        let cap = aggregate(&nodes);
        assert_eq!(cap.gpu, GpuCapacity { total: 2, free: 1 });
        assert_eq!(cap.percent, 50);
    }

    #[test]
    fn falls_back_to_active_node_share() {
        let nodes = vec![
            node(NodeStatus::Active, 0, 0),
            node(NodeStatus::Inactive, 0, 0),
            node(NodeStatus::Inactive, 0, 0),
        ];
        assert_eq!(aggregate(&nodes).percent, 33);

        let idle = vec![node(NodeStatus::Inactive, 0, 0), node(NodeStatus::Inactive, 0, 0)];
        assert_eq!(aggregate(&idle).percent, 0);
    }

    #[test]
    fn empty_pool_is_zero() {
        assert_eq!(aggregate(&[]), PoolCapacity::default());
    }

    #[test]
    fn rounds_half_up() {
        assert_eq!(percent_of(1, 8), 13);
        assert_eq!(percent_of(2, 3), 67);
    }

    proptest! {
        #[test]
        fn percent_is_bounded(total in 0u32..100_000, pick in 0u32..100_000) {
            let free = if total == 0 { 0 } else { pick % (total + 1) };
            let cap = aggregate(&[node(NodeStatus::Inactive, total, free)]);
            prop_assert!(cap.percent <= 100);
            if total == 0 {
                prop_assert_eq!(cap.percent, 0);
            }
        }
    }
}

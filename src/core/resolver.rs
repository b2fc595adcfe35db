//! Node status resolution.
//!
//! Config is the source of truth for which nodes exist: live records that
//! match no configured host are ignored and never fabricate nodes.
//!
//! Direct pools follow the pool-level reservation policy. One live record
//! (UP or INIT) against the pool marks every host active, and all hosts take
//! their owner and job from the first such record. Hosted-cloud pools match
//! each host to a live record by exact display name and never attach an owner.

use std::collections::HashSet;

use crate::core::domain::{
    GpuCapacity, Host, LiveClusterRecord, NodePoolConfig, NodeStatus, NodeType, ResolvedNode,
};

/// Owner and job shared by every host of a reserved direct pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReservation {
    pub owner: Option<String>,
    pub job_name: Option<String>,
}

impl PoolReservation {
    pub fn find(pool: &NodePoolConfig, live: &[LiveClusterRecord]) -> Option<Self> {
        live.iter()
            .find(|rec| targets_pool(rec, &pool.name) && rec.status.is_live())
            .map(|rec| PoolReservation {
                owner: rec.user.clone(),
                job_name: rec.job_name.clone(),
            })
    }
}

fn targets_pool(rec: &LiveClusterRecord, pool_name: &str) -> bool {
    match &rec.pool {
        Some(pool) => pool == pool_name,
        None => rec.name == pool_name,
    }
}

/// Resolves every configured host of `pool`. GPU capacity is left at zero
/// for the view builder to fill in.
pub fn resolve_nodes(pool: &NodePoolConfig, live: &[LiveClusterRecord]) -> Vec<ResolvedNode> {
    let pool_id = pool.pool_id();
    let hosts = unique_hosts(&pool.hosts);

    if pool.provider.is_hosted_cloud() {
        return hosts
            .into_iter()
            .map(|host| {
                let status = if hosted_host_is_live(host, live) {
                    NodeStatus::Active
                } else {
                    NodeStatus::Inactive
                };
                node(&pool_id, host, NodeType::OnDemand, status, None, None)
            })
            .collect();
    }

    let reservation = PoolReservation::find(pool, live);
    hosts
        .into_iter()
        .map(|host| match &reservation {
            Some(r) => node(
                &pool_id,
                host,
                NodeType::Dedicated,
                NodeStatus::Active,
                r.owner.clone(),
                r.job_name.clone(),
            ),
            None => node(&pool_id, host, NodeType::Dedicated, NodeStatus::Inactive, None, None),
        })
        .collect()
}

fn hosted_host_is_live(host: &Host, live: &[LiveClusterRecord]) -> bool {
    let name = host.display_name();
    live.iter().any(|rec| rec.name == name && rec.status.is_live())
}

/// Drops repeated addresses, keeping the first entry.
fn unique_hosts(hosts: &[Host]) -> Vec<&Host> {
    let mut seen = HashSet::new();
    hosts
        .iter()
        .filter(|h| seen.insert(h.address.as_str()))
        .collect()
}

fn node(
    pool_id: &str,
    host: &Host,
    node_type: NodeType,
    status: NodeStatus,
    owner: Option<String>,
    job_name: Option<String>,
) -> ResolvedNode {
    ResolvedNode {
        id: format!("{}/{}", pool_id, host.address),
        pool_id: pool_id.to_string(),
        address: host.address.clone(),
        node_type,
        status,
        owner,
        job_name,
        gpu: GpuCapacity::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::{ClusterStatus, Provider};
    use proptest::prelude::*;

    fn host(address: &str) -> Host {
        Host {
            address: address.into(),
            name: None,
            user: None,
            identity_file: None,
            resources: None,
        }
    }

    fn pool(provider: Provider, name: &str, hosts: &[&str]) -> NodePoolConfig {
        NodePoolConfig {
            provider,
            name: name.into(),
            display_name: None,
            hosts: hosts.iter().map(|h| host(h)).collect(),
            max_instances: 0,
            is_configured: true,
        }
    }

    fn record(name: &str, status: ClusterStatus, user: Option<&str>) -> LiveClusterRecord {
        LiveClusterRecord {
            name: name.into(),
            status,
            pool: None,
            user: user.map(String::from),
            job_name: Some(format!("{name}-job")),
        }
    }

    #[test]
    fn direct_pool_reservation_covers_every_host() {
        let p = pool(Provider::Direct, "p1", &["h1", "h2"]);
        let live = vec![record("p1", ClusterStatus::Up, Some("alice"))];
        let nodes = resolve_nodes(&p, &live);

        assert_eq!(nodes.len(), 2);
        for n in &nodes {
            assert_eq!(n.status, NodeStatus::Active);
            assert_eq!(n.owner.as_deref(), Some("alice"));
            assert_eq!(n.job_name.as_deref(), Some("p1-job"));
            assert_eq!(n.node_type, NodeType::Dedicated);
        }
        assert_eq!(nodes[0].id, "direct/p1/h1");
    }

    #[test]
    fn first_live_record_wins() {
        let p = pool(Provider::Direct, "p1", &["h1"]);
        let live = vec![
            record("p1", ClusterStatus::Stopped, Some("carol")),
            record("p1", ClusterStatus::Init, Some("bob")),
            record("p1", ClusterStatus::Up, Some("alice")),
        ];
        let nodes = resolve_nodes(&p, &live);
        assert_eq!(nodes[0].owner.as_deref(), Some("bob"));
    }

    #[test]
    fn direct_pool_without_live_records_is_inactive() {
        let p = pool(Provider::Direct, "p1", &["h1", "h2"]);
        let live = vec![record("p1", ClusterStatus::Stopped, Some("alice"))];
        for n in resolve_nodes(&p, &live) {
            assert_eq!(n.status, NodeStatus::Inactive);
            assert_eq!(n.owner, None);
            assert_eq!(n.job_name, None);
        }
    }

    #[test]
    fn explicit_pool_field_takes_precedence() {
        let p = pool(Provider::Direct, "p1", &["h1"]);
        let mut rec = record("training-run", ClusterStatus::Up, Some("alice"));
        rec.pool = Some("p1".into());
        assert_eq!(resolve_nodes(&p, &[rec])[0].status, NodeStatus::Active);

        let mut elsewhere = record("p1", ClusterStatus::Up, Some("alice"));
        elsewhere.pool = Some("p2".into());
        assert_eq!(resolve_nodes(&p, &[elsewhere])[0].status, NodeStatus::Inactive);
    }

    #[test]
    fn hosted_cloud_matches_by_name_without_owner() {
        let mut p = pool(Provider::Runpod, "rp", &["10.0.0.1", "10.0.0.2"]);
        p.hosts[0].name = Some("train-a".into());
        let live = vec![
            record("train-a", ClusterStatus::Up, Some("alice")),
            record("10.0.0.2", ClusterStatus::Other("TERMINATING".into()), None),
        ];
        let nodes = resolve_nodes(&p, &live);

        assert_eq!(nodes[0].status, NodeStatus::Active);
        assert_eq!(nodes[0].owner, None);
        assert_eq!(nodes[0].node_type, NodeType::OnDemand);
        assert_eq!(nodes[1].status, NodeStatus::Inactive);
    }

    #[test]
    fn unmatched_live_records_do_not_fabricate_nodes() {
        let p = pool(Provider::Azure, "az", &["vm-1"]);
        let live = vec![record("ghost", ClusterStatus::Up, None)];
        let nodes = resolve_nodes(&p, &live);
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].address, "vm-1");
        assert_eq!(nodes[0].status, NodeStatus::Inactive);
    }

    #[test]
    fn duplicate_addresses_collapse() {
        let p = pool(Provider::Direct, "p1", &["h1", "h1", "h2"]);
        let nodes = resolve_nodes(&p, &[]);
        let addrs: Vec<_> = nodes.iter().map(|n| n.address.as_str()).collect();
        assert_eq!(addrs, vec!["h1", "h2"]);
    }

    proptest! {
        #[test]
        fn resolution_is_pure(
            hosts in proptest::collection::vec("[a-d]", 0..6),
            live in proptest::collection::vec(("[a-d]|p1", prop_oneof![Just("UP"), Just("INIT"), Just("STOPPED")], proptest::option::of("[xy]")), 0..6),
            hosted in any::<bool>(),
        ) {
            let provider = if hosted { Provider::Azure } else { Provider::Direct };
            let hosts: Vec<&str> = hosts.iter().map(String::as_str).collect();
            let p = pool(provider, "p1", &hosts);
            let live: Vec<LiveClusterRecord> = live
                .into_iter()
                .map(|(name, status, user)| record(&name, ClusterStatus::from(status.to_string()), user.as_deref()))
                .collect();

            let first = serde_json::to_vec(&resolve_nodes(&p, &live)).unwrap();
            let second = serde_json::to_vec(&resolve_nodes(&p, &live)).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}

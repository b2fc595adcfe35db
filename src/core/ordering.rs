use crate::core::domain::{NodeStatus, NodeType, ResolvedNode};

/// Lower keys sort first: own nodes, then dedicated, then healthier status.
pub fn priority_key(node: &ResolvedNode, current_user: Option<&str>) -> u32 {
    let ownership = match (node.owner.as_deref(), current_user) {
        (Some(owner), Some(me)) if owner == me => 1,
        _ => 2,
    };
    let node_type = match node.node_type {
        NodeType::Dedicated => 1,
        NodeType::OnDemand => 2,
    };
    let status = match node.status {
        NodeStatus::Active => 1,
        NodeStatus::Inactive => 2,
        NodeStatus::Unhealthy => 3,
    };
    ownership * 100 + node_type * 10 + status
}

/// Stable sort; equal keys keep their input order.
pub fn sort_nodes(nodes: &mut [ResolvedNode], current_user: Option<&str>) {
    nodes.sort_by_key(|n| priority_key(n, current_user));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::domain::GpuCapacity;
    use proptest::prelude::*;

    fn node(addr: &str, node_type: NodeType, status: NodeStatus, owner: Option<&str>) -> ResolvedNode {
        ResolvedNode {
            id: format!("direct/p/{addr}"),
            pool_id: "direct/p".into(),
            address: addr.into(),
            node_type,
            status,
            owner: owner.map(String::from),
            job_name: None,
            gpu: GpuCapacity::default(),
        }
    }

    fn addresses(nodes: &[ResolvedNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.address.as_str()).collect()
    }

    #[test]
    fn ownership_dominates_type_and_status() {
        let mut nodes = vec![
            node("a", NodeType::Dedicated, NodeStatus::Active, Some("bob")),
            node("b", NodeType::OnDemand, NodeStatus::Unhealthy, Some("alice")),
            node("c", NodeType::Dedicated, NodeStatus::Inactive, None),
            node("d", NodeType::OnDemand, NodeStatus::Active, None),
        ];
        sort_nodes(&mut nodes, Some("alice"));
        assert_eq!(addresses(&nodes), vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn status_breaks_ties_within_type() {
        let mut nodes = vec![
            node("u", NodeType::Dedicated, NodeStatus::Unhealthy, None),
            node("i", NodeType::Dedicated, NodeStatus::Inactive, None),
            node("a", NodeType::Dedicated, NodeStatus::Active, None),
        ];
        sort_nodes(&mut nodes, None);
        assert_eq!(addresses(&nodes), vec!["a", "i", "u"]);
    }

    #[test]
    fn keys_match_weights() {
        let n = node("x", NodeType::Dedicated, NodeStatus::Active, Some("alice"));
        assert_eq!(priority_key(&n, Some("alice")), 111);
        assert_eq!(priority_key(&n, None), 211);
        let n = node("y", NodeType::OnDemand, NodeStatus::Unhealthy, None);
        assert_eq!(priority_key(&n, Some("alice")), 223);
    }

    fn arb_node() -> impl Strategy<Value = (NodeType, NodeStatus, Option<&'static str>)> {
        (
            prop_oneof![Just(NodeType::Dedicated), Just(NodeType::OnDemand)],
            prop_oneof![Just(NodeStatus::Active), Just(NodeStatus::Inactive), Just(NodeStatus::Unhealthy)],
            prop_oneof![Just(None), Just(Some("alice")), Just(Some("bob"))],
        )
    }

    proptest! {
        #[test]
        fn sort_is_idempotent_and_stable(specs in proptest::collection::vec(arb_node(), 0..12)) {
            let nodes: Vec<ResolvedNode> = specs
                .iter()
                .enumerate()
                .map(|(i, (t, s, o))| node(&i.to_string(), *t, *s, *o))
                .collect();

            let mut once = nodes.clone();
            sort_nodes(&mut once, Some("alice"));
            let mut twice = once.clone();
            sort_nodes(&mut twice, Some("alice"));
            prop_assert_eq!(&once, &twice);

            // equal keys keep input order
            for pair in once.windows(2) {
                let (ka, kb) = (priority_key(&pair[0], Some("alice")), priority_key(&pair[1], Some("alice")));
                prop_assert!(ka <= kb);
                if ka == kb {
                    let ia: usize = pair[0].address.parse().unwrap();
                    let ib: usize = pair[1].address.parse().unwrap();
                    prop_assert!(ia < ib);
                }
            }
        }
    }
}

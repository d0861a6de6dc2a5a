use k8s_openapi::api::core::v1::{Node, Pod};
use kube::ResourceExt;
use owo_colors::OwoColorize;
use std::collections::BTreeMap;

use crate::quantity;

/// Sums `requests` element-wise across all of the pod's containers.
/// Resources a container does not request contribute zero. Values are
/// milli-units keyed by resource name (`cpu`, `memory`, `nvidia.com/gpu`, …).
pub fn pod_resource_requests(pod: &Pod) -> BTreeMap<String, i128> {
    let mut requests: BTreeMap<String, i128> = BTreeMap::new();
    let Some(spec) = pod.spec.as_ref() else {
        return requests;
    };
    for container in &spec.containers {
        let Some(container_requests) = container
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref())
        else {
            continue;
        };
        for (name, value) in container_requests {
            match quantity::parse_millis(&value.0) {
                Ok(millis) => *requests.entry(name.clone()).or_insert(0) += millis,
                // Quantities are validated server-side; an unparseable one
                // is dropped rather than poisoning the whole pod.
                Err(e) => eprintln!(
                    "{}",
                    format!(
                        "Ignoring request '{}' on pod '{}': {}",
                        name,
                        pod.name_any(),
                        e
                    )
                    .yellow()
                ),
            }
        }
    }
    requests
}

/// A node fits iff every requested resource exists in its allocatable set
/// with at least the requested amount. Allocatable resources the pod does
/// not request are ignored.
pub fn node_fits(requests: &BTreeMap<String, i128>, node: &Node) -> bool {
    let allocatable = node.status.as_ref().and_then(|s| s.allocatable.as_ref());
    for (name, requested) in requests {
        let Some(available) = allocatable
            .and_then(|a| a.get(name))
            .and_then(|q| quantity::parse_millis(&q.0).ok())
        else {
            return false;
        };
        if *requested > available {
            return false;
        }
    }
    true
}

/// Predicate stage: keeps the nodes whose allocatable capacity covers the
/// pod's aggregate requests.
pub fn filter_nodes(pod: &Pod, nodes: Vec<Node>) -> Vec<Node> {
    let requests = pod_resource_requests(pod);
    nodes
        .into_iter()
        .filter(|node| node_fits(&requests, node))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{Container, NodeStatus, PodSpec, ResourceRequirements};
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use kube::api::ObjectMeta;

    fn node(name: &str, allocatable: &[(&str, &str)]) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                allocatable: Some(
                    allocatable
                        .iter()
                        .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
                        .collect(),
                ),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn pod(containers: &[&[(&str, &str)]]) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some("worker".to_string()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: containers
                    .iter()
                    .map(|requests| Container {
                        name: "worker".to_string(),
                        resources: Some(ResourceRequirements {
                            requests: Some(
                                requests
                                    .iter()
                                    .map(|(k, v)| (k.to_string(), Quantity(v.to_string())))
                                    .collect(),
                            ),
                            ..Default::default()
                        }),
                        ..Default::default()
                    })
                    .collect(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn oversized_pod_only_fits_the_big_node() {
        let pod = pod(&[&[("cpu", "8")]]);
        let nodes = vec![
            node("small", &[("cpu", "4"), ("memory", "16Gi")]),
            node("big", &[("cpu", "16"), ("memory", "64Gi")]),
        ];
        let viable = filter_nodes(&pod, nodes);
        assert_eq!(viable.len(), 1);
        assert_eq!(viable[0].metadata.name.as_deref(), Some("big"));
    }

    #[test]
    fn requests_sum_across_containers() {
        let pod = pod(&[&[("cpu", "500m")], &[("cpu", "500m")]]);
        let requests = pod_resource_requests(&pod);
        assert_eq!(requests.get("cpu"), Some(&1000));

        // Exactly 1 CPU allocatable still fits; anything less does not.
        assert!(node_fits(&requests, &node("exact", &[("cpu", "1")])));
        assert!(!node_fits(&requests, &node("short", &[("cpu", "900m")])));
    }

    #[test]
    fn missing_resource_disqualifies_the_node() {
        let pod = pod(&[&[("cpu", "1"), ("nvidia.com/gpu", "1")]]);
        let nodes = vec![
            node("cpu-only", &[("cpu", "32")]),
            node("gpu", &[("cpu", "32"), ("nvidia.com/gpu", "4")]),
        ];
        let viable = filter_nodes(&pod, nodes);
        assert_eq!(viable.len(), 1);
        assert_eq!(viable[0].metadata.name.as_deref(), Some("gpu"));
    }

    #[test]
    fn pod_without_requests_passes_every_node() {
        let pod = pod(&[&[]]);
        let nodes = vec![node("a", &[("cpu", "1")]), node("b", &[])];
        assert_eq!(filter_nodes(&pod, nodes).len(), 2);
    }

    #[test]
    fn extra_allocatable_resources_are_ignored() {
        let pod = pod(&[&[("memory", "1Gi")]]);
        let n = node(
            "fancy",
            &[("memory", "8Gi"), ("hugepages-2Mi", "0"), ("pods", "110")],
        );
        assert!(node_fits(&pod_resource_requests(&pod), &n));
    }
}

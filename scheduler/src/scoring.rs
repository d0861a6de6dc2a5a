use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;
use owo_colors::OwoColorize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::telemetry::{MetricsSource, NodeMetrics};

/// Sentinel assigned when a node's agent cannot be reached. Far below any
/// healthy score, so telemetry-dark nodes rank last but stay bindable.
pub const METRICS_PENALTY: f64 = -1000.0;

/// Per-pod spreading penalty, subtracted uniformly.
pub const SPREAD_PENALTY: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoringPolicy {
    /// Prefer low CPU/mem usage.
    LeastLoaded,
    /// Prefer tighter packing.
    BinPack,
    /// Fallback for unrecognized policy names: CPU idleness only.
    CpuIdle,
}

impl fmt::Display for ScoringPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoringPolicy::LeastLoaded => write!(f, "leastLoaded"),
            ScoringPolicy::BinPack => write!(f, "binPack"),
            ScoringPolicy::CpuIdle => write!(f, "cpuIdle"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Candidate {
    pub node: Node,
    pub score: f64,
}

/// Priority stage: ranks filtered nodes by live telemetry under the
/// configured policy.
pub struct Scorer {
    source: Arc<dyn MetricsSource>,
    policy: ScoringPolicy,
}

impl Scorer {
    pub fn new(source: Arc<dyn MetricsSource>, policy: ScoringPolicy) -> Self {
        Self { source, policy }
    }

    /// Returns candidates sorted by descending score. The sort is stable:
    /// nodes with equal scores keep their input order.
    pub async fn score_nodes(
        &self,
        nodes: Vec<Node>,
        pods_on_node: &HashMap<String, usize>,
    ) -> Vec<Candidate> {
        let mut candidates = Vec::with_capacity(nodes.len());

        for node in nodes {
            let name = node.name_any();
            let Some(ip) = internal_ip(&node) else {
                eprintln!(
                    "{}",
                    format!("Node '{name}' has no InternalIP, skipping").yellow()
                );
                continue;
            };

            let mut score = match self.source.get(&ip).await {
                Ok(metrics) => policy_score(self.policy, &metrics),
                Err(e) => {
                    // Keep the node as a last resort rather than dropping it;
                    // a telemetry-dark fleet must still schedule.
                    eprintln!(
                        "{}",
                        format!(
                            "Failed to get metrics for node '{name}' ({ip}): {e}. Assigning penalty score."
                        )
                        .yellow()
                    );
                    METRICS_PENALTY
                }
            };

            score -= SPREAD_PENALTY * pods_on_node.get(&name).copied().unwrap_or(0) as f64;
            candidates.push(Candidate { node, score });
        }

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        candidates
    }
}

fn policy_score(policy: ScoringPolicy, metrics: &NodeMetrics) -> f64 {
    match policy {
        ScoringPolicy::LeastLoaded => {
            (100.0 - metrics.cpu_usage_pct) + (100.0 - metrics.mem_usage_pct)
        }
        ScoringPolicy::BinPack => metrics.cpu_usage_pct + metrics.mem_usage_pct,
        ScoringPolicy::CpuIdle => 100.0 - metrics.cpu_usage_pct,
    }
}

/// First address of type InternalIP, if any.
pub fn internal_ip(node: &Node) -> Option<String> {
    node.status
        .as_ref()?
        .addresses
        .as_ref()?
        .iter()
        .find(|addr| addr.type_ == "InternalIP")
        .map(|addr| addr.address.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::TelemetryError;
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::{NodeAddress, NodeStatus};
    use kube::api::ObjectMeta;

    /// Serves canned metrics by IP; unknown IPs fail like a dead agent.
    struct FakeAgents {
        by_ip: HashMap<String, NodeMetrics>,
    }

    impl FakeAgents {
        fn new(entries: &[(&str, f64, f64)]) -> Arc<Self> {
            Arc::new(Self {
                by_ip: entries
                    .iter()
                    .map(|(ip, cpu, mem)| {
                        (
                            ip.to_string(),
                            NodeMetrics {
                                node_name: ip.to_string(),
                                cpu_usage_pct: *cpu,
                                mem_usage_pct: *mem,
                                gpus: Vec::new(),
                            },
                        )
                    })
                    .collect(),
            })
        }
    }

    #[async_trait]
    impl MetricsSource for FakeAgents {
        async fn get(&self, node_ip: &str) -> Result<NodeMetrics, TelemetryError> {
            self.by_ip
                .get(node_ip)
                .cloned()
                .ok_or(TelemetryError::Status(503))
        }
    }

    fn node(name: &str, ip: Option<&str>) -> Node {
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            status: Some(NodeStatus {
                addresses: ip.map(|ip| {
                    vec![NodeAddress {
                        type_: "InternalIP".to_string(),
                        address: ip.to_string(),
                    }]
                }),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn names(candidates: &[Candidate]) -> Vec<String> {
        candidates.iter().map(|c| c.node.name_any()).collect()
    }

    #[tokio::test]
    async fn least_loaded_prefers_the_idle_node() {
        let agents = FakeAgents::new(&[("10.0.0.1", 10.0, 10.0), ("10.0.0.2", 80.0, 80.0)]);
        let scorer = Scorer::new(agents, ScoringPolicy::LeastLoaded);
        let ranked = scorer
            .score_nodes(
                vec![node("a", Some("10.0.0.1")), node("b", Some("10.0.0.2"))],
                &HashMap::new(),
            )
            .await;
        assert_eq!(names(&ranked), ["a", "b"]);
        assert_eq!(ranked[0].score, 180.0);
        assert_eq!(ranked[1].score, 40.0);
    }

    #[tokio::test]
    async fn bin_pack_prefers_the_busy_node() {
        let agents = FakeAgents::new(&[("10.0.0.1", 10.0, 10.0), ("10.0.0.2", 80.0, 80.0)]);
        let scorer = Scorer::new(agents, ScoringPolicy::BinPack);
        let ranked = scorer
            .score_nodes(
                vec![node("a", Some("10.0.0.1")), node("b", Some("10.0.0.2"))],
                &HashMap::new(),
            )
            .await;
        assert_eq!(names(&ranked), ["b", "a"]);
        assert_eq!(ranked[0].score, 160.0);
        assert_eq!(ranked[1].score, 20.0);
    }

    #[tokio::test]
    async fn spread_penalty_breaks_the_tie() {
        let agents = FakeAgents::new(&[("10.0.0.1", 50.0, 50.0), ("10.0.0.2", 50.0, 50.0)]);
        let scorer = Scorer::new(agents, ScoringPolicy::LeastLoaded);
        let pods_on_node = HashMap::from([("a".to_string(), 2)]);
        let ranked = scorer
            .score_nodes(
                vec![node("a", Some("10.0.0.1")), node("b", Some("10.0.0.2"))],
                &pods_on_node,
            )
            .await;
        assert_eq!(names(&ranked), ["b", "a"]);
        assert_eq!(ranked[0].score, 100.0);
        assert_eq!(ranked[1].score, 90.0);
    }

    #[tokio::test]
    async fn metric_outage_penalizes_but_keeps_the_node() {
        // Node "a" has no agent entry; its fetch fails.
        let agents = FakeAgents::new(&[("10.0.0.2", 90.0, 90.0)]);
        let scorer = Scorer::new(agents, ScoringPolicy::LeastLoaded);
        let ranked = scorer
            .score_nodes(
                vec![node("a", Some("10.0.0.1")), node("b", Some("10.0.0.2"))],
                &HashMap::new(),
            )
            .await;
        assert_eq!(names(&ranked), ["b", "a"]);
        assert_eq!(ranked[0].score, 20.0);
        assert_eq!(ranked[1].score, METRICS_PENALTY);
    }

    #[tokio::test]
    async fn equal_scores_keep_input_order() {
        let agents = FakeAgents::new(&[("10.0.0.1", 30.0, 30.0), ("10.0.0.2", 30.0, 30.0)]);
        let scorer = Scorer::new(agents, ScoringPolicy::LeastLoaded);
        let ranked = scorer
            .score_nodes(
                vec![node("z", Some("10.0.0.1")), node("a", Some("10.0.0.2"))],
                &HashMap::new(),
            )
            .await;
        assert_eq!(names(&ranked), ["z", "a"]);
    }

    #[tokio::test]
    async fn nodes_without_internal_ip_are_skipped() {
        let agents = FakeAgents::new(&[("10.0.0.1", 10.0, 10.0)]);
        let scorer = Scorer::new(agents, ScoringPolicy::LeastLoaded);
        let ranked = scorer
            .score_nodes(
                vec![node("a", Some("10.0.0.1")), node("no-ip", None)],
                &HashMap::new(),
            )
            .await;
        assert_eq!(names(&ranked), ["a"]);
    }

    #[tokio::test]
    async fn unknown_policy_scores_cpu_idleness_only() {
        let agents = FakeAgents::new(&[("10.0.0.1", 25.0, 95.0)]);
        let scorer = Scorer::new(agents, ScoringPolicy::CpuIdle);
        let ranked = scorer
            .score_nodes(vec![node("a", Some("10.0.0.1"))], &HashMap::new())
            .await;
        assert_eq!(ranked[0].score, 75.0);
    }
}

use futures::StreamExt;
use hyperion_common::labels;
use k8s_openapi::api::core::v1::{Binding, Node, ObjectReference, Pod};
use kube::{
    Api, ResourceExt,
    api::{ListParams, ObjectMeta, PostParams},
    client::Client,
    runtime::{WatchStreamExt, watcher},
};
use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::pin::pin;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::filter;
use crate::scoring::Scorer;

/// Watches Pending pods that request this scheduler and binds each one to
/// the best-ranked node.
pub struct Scheduler {
    client: Client,
    scorer: Scorer,
    name: String,
}

impl Scheduler {
    pub fn new(client: Client, name: String, scorer: Scorer) -> Self {
        Self {
            client,
            scorer,
            name,
        }
    }

    /// Consumes the pending-pod watch until cancellation. A failed
    /// schedule is a log line; the pod stays Pending and resurfaces on
    /// the next resync.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), Error> {
        let pods: Api<Pod> = Api::all(self.client.clone());
        let config = watcher::Config::default()
            .labels(&format!("{}={}", labels::SCHEDULER, self.name))
            .fields("status.phase=Pending");
        let mut stream = pin!(watcher(pods, config).default_backoff().applied_objects());

        println!("{}", format!("🚀 {} running...", self.name).green());
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                event = stream.next() => match event {
                    Some(Ok(pod)) => {
                        if !self.wants(&pod) {
                            continue;
                        }
                        if let Err(e) = self.schedule_one(&pod).await {
                            eprintln!(
                                "{}",
                                format!(
                                    "schedule failed for {}/{}: {}",
                                    pod.namespace().unwrap_or_default(),
                                    pod.name_any(),
                                    e
                                )
                                .red()
                            );
                        }
                    }
                    Some(Err(e)) => {
                        eprintln!("{}", format!("pod watch error: {e}").red());
                    }
                    None => return Ok(()),
                },
            }
        }
    }

    /// Only pods that explicitly request this scheduler by name and have
    /// not been assigned a node yet are ours.
    fn wants(&self, pod: &Pod) -> bool {
        let Some(spec) = pod.spec.as_ref() else {
            return false;
        };
        spec.scheduler_name.as_deref() == Some(self.name.as_str())
            && spec.node_name.as_deref().unwrap_or("").is_empty()
    }

    async fn schedule_one(&self, pod: &Pod) -> Result<(), Error> {
        let nodes = self.list_schedulable_nodes().await?;
        if nodes.is_empty() {
            return Err(Error::NoNodes);
        }

        // Predicate stage: drop nodes that cannot hold the pod.
        let viable = filter::filter_nodes(pod, nodes);
        if viable.is_empty() {
            return Err(Error::NoFitNodes);
        }

        // Priority stage: rank survivors by telemetry and packing count.
        let pods_on_node = self.pods_on_node().await;
        let ranked = self.scorer.score_nodes(viable, &pods_on_node).await;
        let Some(best) = ranked.first() else {
            return Err(Error::NoViableNodes);
        };

        let target = best.node.name_any();
        println!(
            "{}",
            format!(
                "binding {}/{} -> node {} (score={:.2})",
                pod.namespace().unwrap_or_default(),
                pod.name_any(),
                target,
                best.score
            )
            .green()
        );
        self.bind(pod, &target).await
    }

    async fn list_schedulable_nodes(&self) -> Result<Vec<Node>, Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        let list = api.list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .filter(|node| {
                !node
                    .spec
                    .as_ref()
                    .and_then(|s| s.unschedulable)
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Cluster-wide count of pods per node, for the spread penalty. A
    /// failed census costs only the penalty, never the schedule.
    async fn pods_on_node(&self) -> HashMap<String, usize> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let mut counts = HashMap::new();
        let Ok(list) = api.list(&ListParams::default()).await else {
            return counts;
        };
        for pod in list.items {
            if let Some(node) = pod.spec.as_ref().and_then(|s| s.node_name.as_deref())
                && !node.is_empty()
            {
                *counts.entry(node.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Commits the decision through the pod's `binding` sub-resource.
    /// The API server's answer is final; no client-side verification.
    async fn bind(&self, pod: &Pod, node_name: &str) -> Result<(), Error> {
        let namespace = pod
            .namespace()
            .ok_or_else(|| Error::MissingNamespace(pod.name_any()))?;
        let binding = Binding {
            metadata: ObjectMeta {
                name: Some(pod.name_any()),
                namespace: Some(namespace.clone()),
                uid: pod.uid(),
                ..Default::default()
            },
            target: ObjectReference {
                kind: Some("Node".to_string()),
                name: Some(node_name.to_string()),
                ..Default::default()
            },
        };
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &namespace);
        api.create_subresource::<Binding, serde_json::Value>(
            "binding",
            &pod.name_any(),
            &PostParams::default(),
            &binding,
        )
        .await?;
        Ok(())
    }
}

use futures::stream::{self, StreamExt};
use hyperion_types::HyperionCluster;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use k8s_openapi::jiff::Timestamp;
use kube::{
    Api, Config, ResourceExt,
    api::{ListParams, Patch, PatchParams},
    client::Client,
    config::{KubeConfigOptions, Kubeconfig},
};
use owo_colors::OwoColorize;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::registry::{ClusterState, Registry};

pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(10);
pub const STATUS_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on concurrent connect attempts per sweep, so a large fleet
/// cannot stampede the secret store or the remote API servers.
pub const MAX_CONCURRENT_CONNECTS: usize = 8;

/// Key inside the referenced secret that must hold a kubeconfig document.
pub const KUBECONFIG_KEY: &str = "kubeconfig";

/// Reconciles HyperionCluster registrations on the management cluster and
/// keeps the connection registry current.
pub struct Controller {
    client: Client,
    registry: Registry,
}

impl Controller {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            registry: Registry::new(),
        }
    }

    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        println!("{}", "⚙️ Cluster controller starting...".green());
        self.reconcile().await;

        let start = tokio::time::Instant::now();
        let mut reconcile_tick =
            tokio::time::interval_at(start + RECONCILE_INTERVAL, RECONCILE_INTERVAL);
        let mut status_tick = tokio::time::interval_at(start + STATUS_INTERVAL, STATUS_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = reconcile_tick.tick() => self.reconcile().await,
                _ = status_tick.tick() => self.registry.print_status().await,
            }
        }
    }

    /// Attempts to connect to every registered cluster. The sweep runs in
    /// a detached task so status printing keeps its cadence; the registry
    /// is last-writer-wins if sweeps ever overlap.
    async fn reconcile(&self) {
        println!("{}", "🔄 Reconciling all HyperionClusters...".green());
        let api: Api<HyperionCluster> = Api::all(self.client.clone());
        let list = match api.list(&ListParams::default()).await {
            Ok(list) => list,
            Err(e) => {
                eprintln!("{}", format!("Failed to list HyperionClusters: {e}").red());
                return;
            }
        };

        let client = self.client.clone();
        let registry = self.registry.clone();
        tokio::spawn(async move {
            stream::iter(list.items)
                .for_each_concurrent(MAX_CONCURRENT_CONNECTS, |cluster| {
                    let client = client.clone();
                    let registry = registry.clone();
                    async move {
                        connect_cluster(client, registry, cluster).await;
                    }
                })
                .await;
        });
    }
}

async fn connect_cluster(mgmt: Client, registry: Registry, cluster: HyperionCluster) {
    let name = cluster.name_any();
    let previous = registry.get(&name).await.map(|info| info.state);
    let (state, remote) = establish(&mgmt, &cluster).await;

    // Announce transitions only; steady state is covered by the table.
    if previous.as_ref() != Some(&state) {
        if state.is_online() {
            println!(
                "{}",
                format!("✅ Successfully connected to cluster: {name}").green()
            );
        } else {
            println!("{}", format!("Cluster '{name}' is now: {state}").yellow());
        }
    }
    record_status(&mgmt, &cluster, &state).await;
    registry.update(&name, state, remote).await;
}

/// Walks the secret → kubeconfig → client → probe chain, mapping each
/// failure to the cluster state it should surface as.
async fn establish(mgmt: &Client, cluster: &HyperionCluster) -> (ClusterState, Option<Client>) {
    let name = cluster.name_any();
    let secret_ref = &cluster.spec.kubeconfig_secret_ref;

    let secrets: Api<Secret> = Api::namespaced(mgmt.clone(), &secret_ref.namespace);
    let secret = match secrets.get(&secret_ref.name).await {
        Ok(secret) => secret,
        Err(e) => {
            eprintln!(
                "{}",
                format!(
                    "Failed to get secret {}/{} for cluster {}: {}",
                    secret_ref.namespace, secret_ref.name, name, e
                )
                .yellow()
            );
            return (ClusterState::SecretNotFound, None);
        }
    };

    let Some(raw) = kubeconfig_bytes(&secret) else {
        eprintln!(
            "{}",
            format!(
                "Secret {}/{} for cluster {} is missing '{}' data",
                secret_ref.namespace, secret_ref.name, name, KUBECONFIG_KEY
            )
            .yellow()
        );
        return (ClusterState::InvalidSecret, None);
    };

    let kubeconfig = match std::str::from_utf8(raw)
        .map_err(anyhow::Error::from)
        .and_then(|text| Kubeconfig::from_yaml(text).map_err(anyhow::Error::from))
    {
        Ok(kubeconfig) => kubeconfig,
        Err(e) => {
            eprintln!(
                "{}",
                format!("Failed to parse kubeconfig for cluster {name}: {e}").yellow()
            );
            return (ClusterState::KubeconfigParse, None);
        }
    };
    let config = match Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
    {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "{}",
                format!("Failed to resolve kubeconfig for cluster {name}: {e}").yellow()
            );
            return (ClusterState::KubeconfigParse, None);
        }
    };

    let remote = match Client::try_from(config) {
        Ok(remote) => remote,
        Err(e) => {
            eprintln!(
                "{}",
                format!("Failed to create client for cluster {name}: {e}").yellow()
            );
            return (ClusterState::ClientCreationFailed, None);
        }
    };

    // A version probe is the cheapest end-to-end liveness check.
    if let Err(e) = remote.apiserver_version().await {
        eprintln!(
            "{}",
            format!("Failed to get server version for cluster {name}: {e}").yellow()
        );
        return (ClusterState::Offline, None);
    }

    (ClusterState::Online, Some(remote))
}

fn kubeconfig_bytes(secret: &Secret) -> Option<&[u8]> {
    secret
        .data
        .as_ref()?
        .get(KUBECONFIG_KEY)
        .map(|bytes| bytes.0.as_slice())
}

/// Mirrors the observed state onto the resource so `kubectl get
/// hyperionclusters` tells the truth. Heartbeat advances only when the
/// probe succeeded; the merge patch leaves the old heartbeat alone
/// otherwise. Never fatal.
async fn record_status(mgmt: &Client, cluster: &HyperionCluster, state: &ClusterState) {
    let name = cluster.name_any();
    let Some(namespace) = cluster.namespace() else {
        return;
    };
    let status = if state.is_online() {
        serde_json::json!({
            "phase": state.to_string(),
            "lastHeartbeatTime": Time::from(Timestamp::now()),
        })
    } else {
        serde_json::json!({ "phase": state.to_string() })
    };
    let api: Api<HyperionCluster> = Api::namespaced(mgmt.clone(), &namespace);
    let patch = Patch::Merge(serde_json::json!({ "status": status }));
    if let Err(e) = api
        .patch_status(&name, &PatchParams::default(), &patch)
        .await
    {
        eprintln!(
            "{}",
            format!("Failed to update status for cluster {name}: {e}").yellow()
        );
    }
}

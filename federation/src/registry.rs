use kube::client::Client;
use owo_colors::OwoColorize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Observable connection state of one member cluster.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClusterState {
    Online,
    Offline,
    SecretNotFound,
    InvalidSecret,
    KubeconfigParse,
    ClientCreationFailed,
}

impl ClusterState {
    pub fn is_online(&self) -> bool {
        matches!(self, ClusterState::Online)
    }
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterState::Online => write!(f, "Online"),
            ClusterState::Offline => write!(f, "Offline"),
            ClusterState::SecretNotFound => write!(f, "Error: SecretNotFound"),
            ClusterState::InvalidSecret => write!(f, "Error: InvalidSecret"),
            ClusterState::KubeconfigParse => write!(f, "Error: KubeconfigParse"),
            ClusterState::ClientCreationFailed => write!(f, "Error: ClientCreationFailed"),
        }
    }
}

#[derive(Clone)]
pub struct ClusterInfo {
    pub state: ClusterState,
    /// Handle for downstream placement logic; present only when Online.
    pub client: Option<Client>,
}

/// Live map of member clusters. The single source of truth for "can we
/// reach cluster X"; readers clone entries out of the critical section.
#[derive(Clone, Default)]
pub struct Registry {
    clusters: Arc<RwLock<HashMap<String, ClusterInfo>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, name: &str, state: ClusterState, client: Option<Client>) {
        let mut clusters = self.clusters.write().await;
        clusters.insert(name.to_string(), ClusterInfo { state, client });
    }

    pub async fn get(&self, name: &str) -> Option<ClusterInfo> {
        self.clusters.read().await.get(name).cloned()
    }

    /// Snapshot of (name, state) pairs, sorted by name for stable output.
    pub async fn states(&self) -> Vec<(String, ClusterState)> {
        let clusters = self.clusters.read().await;
        let mut out: Vec<_> = clusters
            .iter()
            .map(|(name, info)| (name.clone(), info.state.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub async fn print_status(&self) {
        let states = self.states().await;
        println!("\n{}", "--- CLUSTER CONNECTION STATUS ---".bold());
        if states.is_empty() {
            println!("No clusters registered or connected yet.");
        }
        for (name, state) in &states {
            if state.is_online() {
                println!("- {}: {}", name, state.green());
            } else {
                println!("- {}: {}", name, state.red());
            }
        }
        println!("{}", "-------------------------------".bold());
    }
}

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Port the node-side agent listens on.
pub const AGENT_PORT: u16 = 9090;

/// Hard deadline for a single agent fetch. Scheduling latency is bounded
/// by this even when an agent hangs.
pub const FETCH_TIMEOUT: Duration = Duration::from_millis(600);

/// How long a fetched sample stays servable. Must exceed one scheduling
/// decision (so a decision sees one consistent snapshot per node) and stay
/// under the load churn period.
pub const CACHE_TTL: Duration = Duration::from_secs(5);

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct GpuMetrics {
    pub uuid: String,
    pub name: String,
    pub utilization_pct: u32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
    pub temperature_c: u32,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct NodeMetrics {
    pub node_name: String,
    pub cpu_usage_pct: f64,
    pub mem_usage_pct: f64,
    #[serde(default)]
    pub gpus: Vec<GpuMetrics>,
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("agent request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    #[error("agent returned non-200 status: {0}")]
    Status(u16),

    #[error("failed to decode metrics payload: {source}")]
    Decode {
        #[from]
        source: serde_json::Error,
    },
}

/// Seam between the scorer and wherever metrics come from.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn get(&self, node_ip: &str) -> Result<NodeMetrics, TelemetryError>;
}

struct CacheEntry {
    metrics: NodeMetrics,
    fetched_at: Instant,
}

/// Fetches per-node metrics from the node agents, with a TTL cache in
/// front. Concurrent callers for the same key may race to fetch; the
/// cache write is last-writer-wins.
pub struct Client {
    http: reqwest::Client,
    cache: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl Client {
    pub fn new() -> Result<Self, TelemetryError> {
        Self::with_ttl(CACHE_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Result<Self, TelemetryError> {
        let http = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;
        Ok(Self {
            http,
            cache: RwLock::new(HashMap::new()),
            ttl,
        })
    }

    /// Retrieves metrics for a node, serving from the cache while the
    /// entry is younger than the TTL. Fetch errors leave the cache
    /// untouched; stale entries age out naturally.
    pub async fn get(&self, node_ip: &str) -> Result<NodeMetrics, TelemetryError> {
        if let Some(metrics) = self.cached(node_ip).await {
            return Ok(metrics);
        }

        let metrics = self.fetch(node_ip).await?;

        let mut cache = self.cache.write().await;
        cache.insert(
            node_ip.to_string(),
            CacheEntry {
                metrics: metrics.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(metrics)
    }

    async fn cached(&self, node_ip: &str) -> Option<NodeMetrics> {
        let cache = self.cache.read().await;
        let entry = cache.get(node_ip)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.metrics.clone())
        } else {
            None
        }
    }

    async fn fetch(&self, node_ip: &str) -> Result<NodeMetrics, TelemetryError> {
        let url = format!("http://{node_ip}:{AGENT_PORT}/metrics");
        let response = self.http.get(&url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(TelemetryError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    #[cfg(test)]
    async fn prime_at(&self, node_ip: &str, metrics: NodeMetrics, fetched_at: Instant) {
        let mut cache = self.cache.write().await;
        cache.insert(
            node_ip.to_string(),
            CacheEntry {
                metrics,
                fetched_at,
            },
        );
    }
}

#[async_trait]
impl MetricsSource for Client {
    async fn get(&self, node_ip: &str) -> Result<NodeMetrics, TelemetryError> {
        Client::get(self, node_ip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(name: &str, cpu: f64, mem: f64) -> NodeMetrics {
        NodeMetrics {
            node_name: name.to_string(),
            cpu_usage_pct: cpu,
            mem_usage_pct: mem,
            gpus: vec![GpuMetrics {
                uuid: "GPU-7f3a".to_string(),
                name: "NVIDIA A100".to_string(),
                utilization_pct: 42,
                memory_used_mb: 10_240,
                memory_total_mb: 40_960,
                temperature_c: 61,
            }],
        }
    }

    #[test]
    fn metrics_round_trip_is_lossless() {
        let metrics = sample("gpu-node-1", 37.5, 81.25);
        let encoded = serde_json::to_string(&metrics).expect("encode");
        let decoded: NodeMetrics = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, metrics);
    }

    #[test]
    fn decodes_agent_wire_format() {
        let body = r#"{
            "node_name": "node-a",
            "cpu_usage_pct": 12.0,
            "mem_usage_pct": 34.5,
            "gpus": [{
                "uuid": "GPU-1",
                "name": "NVIDIA H100",
                "utilization_pct": 90,
                "memory_used_mb": 70000,
                "memory_total_mb": 81920,
                "temperature_c": 74
            }]
        }"#;
        let metrics: NodeMetrics = serde_json::from_str(body).expect("decode");
        assert_eq!(metrics.node_name, "node-a");
        assert_eq!(metrics.gpus.len(), 1);
        assert_eq!(metrics.gpus[0].memory_total_mb, 81_920);
    }

    #[test]
    fn gpu_list_defaults_to_empty() {
        let body = r#"{"node_name": "cpu-only", "cpu_usage_pct": 5.0, "mem_usage_pct": 9.0}"#;
        let metrics: NodeMetrics = serde_json::from_str(body).expect("decode");
        assert!(metrics.gpus.is_empty());
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let err = serde_json::from_str::<NodeMetrics>("{\"node_name\": 3}")
            .map_err(TelemetryError::from)
            .unwrap_err();
        assert!(matches!(err, TelemetryError::Decode { .. }));
    }

    #[tokio::test]
    async fn fresh_entries_are_served_without_io() {
        let client = Client::with_ttl(Duration::from_secs(60)).expect("client");
        let metrics = sample("node-a", 10.0, 20.0);
        client
            .prime_at("10.0.0.1", metrics.clone(), Instant::now())
            .await;
        // The primed IP is unroutable; a hit never touches the network.
        let got = client.get("10.0.0.1").await.expect("cache hit");
        assert_eq!(got, metrics);
    }

    #[tokio::test]
    async fn expired_entries_are_treated_as_absent() {
        let client = Client::with_ttl(Duration::from_secs(5)).expect("client");
        let stale = Instant::now()
            .checked_sub(Duration::from_secs(30))
            .expect("clock");
        client.prime_at("10.0.0.1", sample("node-a", 1.0, 1.0), stale).await;
        assert!(client.cached("10.0.0.1").await.is_none());
    }
}

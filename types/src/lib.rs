use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, str::FromStr};

/// Resource block for a single worker replica. CPU and memory are
/// Kubernetes quantity strings; the GPU count maps to `nvidia.com/gpu`.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct WorkerResources {
    #[serde(default)]
    pub cpu: String,
    #[serde(default)]
    pub memory: String,
    #[serde(rename = "nvidiaGpu")]
    pub nvidia_gpu: Option<i32>,
}

fn default_parallelism() -> i32 {
    1
}

#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "hyperion.ai",
    version = "v1alpha1",
    kind = "AIJob",
    plural = "aijobs",
    derive = "PartialEq",
    status = "AIJobStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.phase\", \"name\": \"PHASE\", \"type\": \"string\" }"
)]
#[kube(
    printcolumn = "{\"jsonPath\": \".spec.parallelism\", \"name\": \"PARALLELISM\", \"type\": \"integer\" }"
)]
pub struct AIJobSpec {
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub resources: WorkerResources,
    #[serde(default = "default_parallelism")]
    pub parallelism: i32,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct AIJobStatus {
    pub phase: JobPhase,
    #[serde(rename = "runningPods")]
    pub running_pods: i32,
    #[serde(rename = "succeededPods")]
    pub succeeded_pods: i32,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, JsonSchema, Default)]
pub enum JobPhase {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobPhase {
    /// Succeeded and Failed are terminal: the controller never creates
    /// replicas for, or downgrades, a job in these phases.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Succeeded | JobPhase::Failed)
    }
}

impl FromStr for JobPhase {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(JobPhase::Pending),
            "Running" => Ok(JobPhase::Running),
            "Succeeded" => Ok(JobPhase::Succeeded),
            "Failed" => Ok(JobPhase::Failed),
            _ => Err(()),
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobPhase::Pending => write!(f, "Pending"),
            JobPhase::Running => write!(f, "Running"),
            JobPhase::Succeeded => write!(f, "Succeeded"),
            JobPhase::Failed => write!(f, "Failed"),
        }
    }
}

/// Reference to the Secret holding a member cluster's kubeconfig.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct KubeconfigSecretRef {
    pub name: String,
    pub namespace: String,
}

#[derive(CustomResource, Serialize, Deserialize, Default, Debug, PartialEq, Clone, JsonSchema)]
#[kube(
    group = "hyperion.ai",
    version = "v1alpha1",
    kind = "HyperionCluster",
    plural = "hyperionclusters",
    derive = "PartialEq",
    status = "HyperionClusterStatus",
    namespaced
)]
#[kube(derive = "Default")]
#[kube(
    printcolumn = "{\"jsonPath\": \".status.phase\", \"name\": \"PHASE\", \"type\": \"string\" }"
)]
#[kube(
    printcolumn = "{\"jsonPath\": \".spec.region\", \"name\": \"REGION\", \"type\": \"string\" }"
)]
pub struct HyperionClusterSpec {
    pub provider: String,
    pub region: String,
    #[serde(rename = "apiEndpoint")]
    pub api_endpoint: String,
    #[serde(rename = "kubeconfigSecretRef")]
    pub kubeconfig_secret_ref: KubeconfigSecretRef,
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Default, JsonSchema)]
pub struct HyperionClusterStatus {
    #[serde(default)]
    pub phase: String,
    #[serde(rename = "lastHeartbeatTime")]
    pub last_heartbeat_time: Option<Time>,
}

use hyperion_common::labels;
use hyperion_types::{AIJob, AIJobStatus, JobPhase};
use k8s_openapi::api::core::v1::Pod;
use kube::{
    Api, ResourceExt,
    api::{ListParams, PostParams},
    client::Client,
};
use owo_colors::OwoColorize;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::podspec;
use crate::status;

/// One full sweep over every AIJob in every namespace per tick.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(2);

pub struct Controller {
    client: Client,
}

impl Controller {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Drives reconcile sweeps until cancellation. Sweeps are serialized;
    /// a failed sweep is a log line and the next tick retries implicitly.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), Error> {
        println!("{}", "⚙️ Starting AIJob controller...".green());
        let mut tick = tokio::time::interval(RECONCILE_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return Ok(()),
                _ = tick.tick() => {
                    if let Err(e) = self.reconcile_all().await {
                        eprintln!("{}", format!("Reconciliation sweep failed: {e}").red());
                    }
                }
            }
        }
    }

    async fn reconcile_all(&self) -> Result<(), Error> {
        let jobs: Api<AIJob> = Api::all(self.client.clone());
        let list = jobs.list(&ListParams::default()).await?;
        for job in list.items {
            if let Err(e) = self.reconcile_one(&job).await {
                eprintln!(
                    "{}",
                    format!(
                        "Failed to reconcile {}/{}: {}",
                        job.namespace().unwrap_or_default(),
                        job.name_any(),
                        e
                    )
                    .red()
                );
            }
        }
        Ok(())
    }

    async fn reconcile_one(&self, job: &AIJob) -> Result<(), Error> {
        let namespace = job.namespace().ok_or_else(|| {
            Error::UserInput(
                "Expected AIJob resource to be namespaced. Can't reconcile without a namespace."
                    .to_owned(),
            )
        })?;
        let name = job.name_any();

        // Census of the workers this job owns, by label.
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), &namespace);
        let selector = format!("{}={}", labels::AIJOB, name);
        let existing = pods
            .list(&ListParams::default().labels(&selector))
            .await?;
        let census = PodCensus::of(&existing.items);

        let observed = job.status.clone().unwrap_or_default();
        let derived = derive_status(&observed, &census, job.spec.parallelism);

        // Deep equality gates the write; unchanged status costs no API call.
        if derived != observed {
            println!(
                "{}",
                format!(
                    "Updating status for AIJob {}/{}: Phase={}, Running={}, Succeeded={}",
                    namespace, name, derived.phase, derived.running_pods, derived.succeeded_pods
                )
                .green()
            );
            status::patch_status(self.client.clone(), job, &derived).await?;
        }

        // Terminal jobs never grow new replicas.
        if derived.phase.is_terminal() {
            return Ok(());
        }

        let have = existing.items.len() as i32;
        let need = job.spec.parallelism;
        if have < need {
            println!(
                "{}",
                format!(
                    "AIJob {namespace}/{name} needs {need} pods, has {have}. Creating one..."
                )
                .green()
            );
            // One create per tick smooths API load; full parallelism is
            // reached after `need` ticks.
            let pod = podspec::build_pod(job, have);
            match pods.create(&PostParams::default(), &pod).await {
                Ok(_) => {}
                Err(kube::Error::Api(ae)) if ae.code == 409 => {
                    println!(
                        "{}",
                        format!("Pod '{}' already exists", pod.name_any()).yellow()
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

/// Pod counts by phase for one job's workers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PodCensus {
    pub running: i32,
    pub succeeded: i32,
    pub failed: i32,
}

impl PodCensus {
    pub fn of(pods: &[Pod]) -> Self {
        let mut census = Self::default();
        for pod in pods {
            match pod.status.as_ref().and_then(|s| s.phase.as_deref()) {
                Some("Running") => census.running += 1,
                Some("Succeeded") => census.succeeded += 1,
                Some("Failed") => census.failed += 1,
                _ => {}
            }
        }
        census
    }
}

/// Derives the job status from the worker census. Terminal phases are
/// sticky: once Succeeded or Failed is observed, the status is retained
/// verbatim even if the backing pods are garbage-collected later.
pub fn derive_status(observed: &AIJobStatus, census: &PodCensus, parallelism: i32) -> AIJobStatus {
    if observed.phase.is_terminal() {
        return observed.clone();
    }
    let phase = if census.failed > 0 {
        JobPhase::Failed
    } else if census.succeeded == parallelism {
        JobPhase::Succeeded
    } else if census.running > 0 {
        JobPhase::Running
    } else {
        JobPhase::Pending
    };
    AIJobStatus {
        phase,
        running_pods: census.running,
        succeeded_pods: census.succeeded,
    }
}

use hyperion_common::{DEFAULT_SCHEDULER_NAME, labels};
use hyperion_types::AIJob;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::{
    ResourceExt,
    api::{ObjectMeta, Resource},
};
use std::collections::BTreeMap;

/// Builds the `idx`-th worker pod for a job. A single-replica job reuses
/// the job name; parallel jobs get an index suffix so replica names are
/// deterministic and duplicate creates collide by name.
pub fn build_pod(job: &AIJob, idx: i32) -> Pod {
    let name = if job.spec.parallelism > 1 {
        format!("{}-{}", job.name_any(), idx)
    } else {
        job.name_any()
    };

    Pod {
        metadata: ObjectMeta {
            name: Some(name),
            namespace: job.namespace(),
            labels: Some(BTreeMap::from([
                (labels::APP.to_string(), labels::APP_VALUE.to_string()),
                (
                    labels::SCHEDULER.to_string(),
                    DEFAULT_SCHEDULER_NAME.to_string(),
                ),
                (labels::AIJOB.to_string(), job.name_any()),
            ])),
            annotations: if job.spec.annotations.is_empty() {
                None
            } else {
                Some(job.spec.annotations.clone())
            },
            owner_references: job.controller_owner_ref(&()).map(|r| vec![r]),
            ..Default::default()
        },
        spec: Some(PodSpec {
            scheduler_name: Some(DEFAULT_SCHEDULER_NAME.to_string()),
            restart_policy: Some("Never".to_string()),
            containers: vec![Container {
                name: "worker".to_string(),
                image: Some(job.spec.image.clone()),
                command: (!job.spec.command.is_empty()).then(|| job.spec.command.clone()),
                resources: Some(ResourceRequirements {
                    requests: Some(resource_list(job)),
                    limits: Some(resource_list(job)),
                    ..Default::default()
                }),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: None,
    }
}

fn resource_list(job: &AIJob) -> BTreeMap<String, Quantity> {
    let mut list = BTreeMap::new();
    let resources = &job.spec.resources;
    if !resources.cpu.is_empty() {
        list.insert("cpu".to_string(), Quantity(resources.cpu.clone()));
    }
    if !resources.memory.is_empty() {
        list.insert("memory".to_string(), Quantity(resources.memory.clone()));
    }
    if let Some(gpus) = resources.nvidia_gpu
        && gpus > 0
    {
        list.insert("nvidia.com/gpu".to_string(), Quantity(gpus.to_string()));
    }
    list
}

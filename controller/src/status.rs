use hyperion_types::{AIJob, AIJobStatus};
use kube::{
    Api, Client,
    api::{Patch, PatchParams, Resource},
};

use crate::error::Error;

/// Merge-patches just the status branch through the status sub-resource.
/// Anything another writer put elsewhere in status survives, and no
/// re-fetch is needed before the write.
pub async fn patch_status(client: Client, job: &AIJob, status: &AIJobStatus) -> Result<(), Error> {
    let name = job
        .meta()
        .name
        .as_deref()
        .ok_or_else(|| Error::UserInput("AIJob is missing metadata.name".to_string()))?;
    let namespace = job
        .meta()
        .namespace
        .as_deref()
        .ok_or_else(|| Error::UserInput("AIJob is missing metadata.namespace".to_string()))?;
    let api: Api<AIJob> = Api::namespaced(client, namespace);
    let patch = Patch::Merge(serde_json::json!({ "status": status }));
    api.patch_status(name, &PatchParams::default(), &patch)
        .await?;
    Ok(())
}

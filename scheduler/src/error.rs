#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    Kube {
        #[from]
        source: kube::Error,
    },

    #[error("no nodes available")]
    NoNodes,

    #[error("no nodes can satisfy the pod's resource requests")]
    NoFitNodes,

    #[error("no viable nodes after scoring")]
    NoViableNodes,

    #[error("Pod '{0}' is missing metadata.namespace")]
    MissingNamespace(String),

    #[error("Json error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

use hyperion_types::HyperionCluster;
use kube::CustomResourceExt;
use std::fs;

fn main() {
    let _ = fs::create_dir("../crds");
    fs::write(
        "../crds/hyperion.ai_hyperionclusters.yaml",
        serde_yaml::to_string(&HyperionCluster::crd()).unwrap(),
    )
    .unwrap();
}

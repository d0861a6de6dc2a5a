use hyperion_types::AIJob;
use kube::CustomResourceExt;
use std::fs;

fn main() {
    let _ = fs::create_dir("../crds");
    fs::write(
        "../crds/hyperion.ai_aijobs.yaml",
        serde_yaml::to_string(&AIJob::crd()).unwrap(),
    )
    .unwrap();
}

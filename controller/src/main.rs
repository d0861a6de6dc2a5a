use anyhow::Result;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

mod error;
mod podspec;
mod reconcile;
mod status;

use reconcile::Controller;

#[tokio::main]
async fn main() -> Result<()> {
    hyperion_common::init();
    println!("{}", "🌱 Starting Hyperion controller...".green());

    // KUBECONFIG if set, in-cluster service account otherwise.
    let client = kube::Client::try_default().await?;
    let controller = Controller::new(client);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        hyperion_common::shutdown::shutdown_signal().await;
        signal.cancel();
    });

    controller.run(shutdown).await?;
    println!("{}", "Controller shut down gracefully.".green());
    Ok(())
}

use anyhow::Result;
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

mod reconcile;
mod registry;

use reconcile::Controller;

#[tokio::main]
async fn main() -> Result<()> {
    hyperion_common::init();
    println!("{}", "🌐 Starting Hyperion federation manager...".green());

    // This controller runs on the management cluster; its kubeconfig (or
    // in-cluster service account) points there.
    let client = kube::Client::try_default().await?;
    let controller = Controller::new(client);

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        hyperion_common::shutdown::shutdown_signal().await;
        signal.cancel();
    });

    controller.run(shutdown).await?;
    println!("{}", "Federation manager shut down gracefully.".green());
    Ok(())
}

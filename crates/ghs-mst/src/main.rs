//! `ghs-node`: run one process of the distributed spanning tree computation.

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;

use ghs_mst::config::USAGE;
use ghs_mst::{logging, Node, NodeConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(config) = NodeConfig::from_env_and_args()? else {
        print!("{USAGE}");
        return Ok(());
    };
    logging::init(config.log_file.as_deref())?;

    let node = Node::from_config(config).context("startup failed")?;
    info!(
        process = %node.id(),
        initiator = node.is_initiator(),
        "starting"
    );

    // Only the two core processes stop on their own; the rest run until
    // interrupted.
    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop.send(true);
        }
    });

    let outcome = node.run(shutdown).await?;
    if outcome.halted {
        info!("spanning tree complete");
    }
    Ok(())
}

//! Event log setup.
//!
//! Every process writes a textual log of sent and received messages and state
//! transitions. Verbosity follows `RUST_LOG`, defaulting to `info` with
//! message traffic from the protocol crates at `debug`.

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{NodeError, Result};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,ghs_mst_core=debug,ghs_mst_net=info";

/// Install the global subscriber, writing to `log_file` if given, else stderr.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)
                .map_err(|e| NodeError::Logging(format!("{}: {e}", path.display())))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|e| NodeError::Logging(e.to_string()))
}

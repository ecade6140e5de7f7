//! Resolving this process's identity.
//!
//! An explicit id wins; otherwise the id is the last octet of the process's
//! own IPv4 address, taken from the configuration or from `hostname -i`.

use std::net::Ipv4Addr;
use std::process::Command;

use ghs_mst_core::ProcessId;
use tracing::debug;

use crate::config::NodeConfig;
use crate::error::ConfigError;

/// Determine the identity of this process.
pub fn resolve_identity(config: &NodeConfig) -> Result<ProcessId, ConfigError> {
    if let Some(id) = config.id {
        return Ok(id);
    }
    if let Some(ip) = config.ip {
        return Ok(ProcessId::from_ipv4(ip));
    }
    let ip = host_ipv4()?;
    debug!(%ip, "resolved host address");
    Ok(ProcessId::from_ipv4(ip))
}

fn host_ipv4() -> Result<Ipv4Addr, ConfigError> {
    let output = Command::new("hostname")
        .arg("-i")
        .output()
        .map_err(|e| ConfigError::Identity(format!("hostname -i: {e}")))?;
    if !output.status.success() {
        return Err(ConfigError::Identity(format!(
            "hostname -i exited with {}",
            output.status
        )));
    }
    first_ipv4(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| ConfigError::Identity("hostname -i printed no IPv4 address".into()))
}

/// First IPv4 address in whitespace-separated `hostname -i` output.
fn first_ipv4(output: &str) -> Option<Ipv4Addr> {
    output.split_whitespace().find_map(|s| s.parse().ok())
}

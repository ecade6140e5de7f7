//! Configuration.
//!
//! Two sources: the shared topology file, identical on every process, and
//! per-process runtime settings from command-line flags with `GHS_*`
//! environment fallbacks.
//!
//! Topology file format:
//!
//! ```text
//! 1          # id of the process that wakes up spontaneously
//! 1 2 5      # source destination weight, one undirected edge per line
//! 1 3 3
//! 2 3 7
//! ```

use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ghs_mst_core::{Link, Links, ProcessId, Weight};
use ghs_mst_net::address::{DEFAULT_PORT, DEFAULT_SUBNET};
use ghs_mst_net::transport::tcp;
use ghs_mst_net::Addressing;

use crate::error::ConfigError;

/// One undirected edge of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeSpec {
    pub a: ProcessId,
    pub b: ProcessId,
    pub weight: Weight,
}

/// The static graph every process starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    initiator: ProcessId,
    edges: Vec<EdgeSpec>,
}

impl Topology {
    /// Build a topology directly, applying the same checks as [`Topology::parse`].
    pub fn new(initiator: ProcessId, edges: Vec<EdgeSpec>) -> Result<Self, ConfigError> {
        let mut topology = Topology {
            initiator,
            edges: Vec::with_capacity(edges.len()),
        };
        for (i, edge) in edges.into_iter().enumerate() {
            topology.push(i + 1, edge)?;
        }
        Ok(topology)
    }

    /// Parse the topology text format.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, raw)| (i + 1, strip_comment(raw)))
            .filter(|(_, line)| !line.is_empty());

        let (line, first) = lines
            .next()
            .ok_or(ConfigError::MissingInitiator { line: 1 })?;
        let initiator = first
            .parse::<u32>()
            .map(ProcessId)
            .map_err(|_| ConfigError::MissingInitiator { line })?;

        let mut topology = Topology {
            initiator,
            edges: Vec::new(),
        };
        for (line, text) in lines {
            let edge = parse_edge(line, text)?;
            topology.push(line, edge)?;
        }
        Ok(topology)
    }

    /// Read and parse a topology file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    fn push(&mut self, line: usize, edge: EdgeSpec) -> Result<(), ConfigError> {
        if edge.a == edge.b {
            return Err(ConfigError::SelfLoop { line, id: edge.a });
        }
        if edge.weight.is_infinite() {
            return Err(ConfigError::ReservedWeight {
                line,
                weight: edge.weight,
            });
        }
        for existing in &self.edges {
            let same_pair = (existing.a == edge.a && existing.b == edge.b)
                || (existing.a == edge.b && existing.b == edge.a);
            if same_pair {
                return Err(ConfigError::DuplicateEdge {
                    line,
                    a: edge.a,
                    b: edge.b,
                });
            }
            if existing.weight == edge.weight {
                return Err(ConfigError::DuplicateWeight {
                    line,
                    weight: edge.weight,
                });
            }
        }
        self.edges.push(edge);
        Ok(())
    }

    /// The process that wakes up on its own.
    pub fn initiator(&self) -> ProcessId {
        self.initiator
    }

    pub fn edges(&self) -> &[EdgeSpec] {
        &self.edges
    }

    /// Every process mentioned by an edge.
    pub fn processes(&self) -> BTreeSet<ProcessId> {
        self.edges.iter().flat_map(|e| [e.a, e.b]).collect()
    }

    /// The links of `id`, all `Basic`, sorted ascending by weight.
    pub fn links_for(&self, id: ProcessId) -> Links {
        let links = self
            .edges
            .iter()
            .filter_map(|e| {
                if e.a == id {
                    Some(Link::new(e.b, e.weight))
                } else if e.b == id {
                    Some(Link::new(e.a, e.weight))
                } else {
                    None
                }
            })
            .collect();
        // Duplicate pairs are rejected while parsing, so neighbours are unique.
        Links::new(links).unwrap_or_default()
    }

    /// Whether every process can reach every other one.
    pub fn is_connected(&self) -> bool {
        let processes = self.processes();
        let Some(&start) = processes.iter().next() else {
            return false;
        };
        let mut seen = HashSet::from([start]);
        let mut stack = vec![start];
        while let Some(p) = stack.pop() {
            for e in &self.edges {
                let next = if e.a == p {
                    e.b
                } else if e.b == p {
                    e.a
                } else {
                    continue;
                };
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen.len() == processes.len()
    }
}

fn strip_comment(raw: &str) -> &str {
    match raw.find('#') {
        Some(pos) => raw[..pos].trim(),
        None => raw.trim(),
    }
}

fn parse_edge(line: usize, text: &str) -> Result<EdgeSpec, ConfigError> {
    let malformed = || ConfigError::MalformedEdge {
        line,
        text: text.to_string(),
    };
    let fields: Vec<&str> = text.split_whitespace().collect();
    let [a, b, w] = fields.as_slice() else {
        return Err(malformed());
    };
    Ok(EdgeSpec {
        a: ProcessId(a.parse().map_err(|_| malformed())?),
        b: ProcessId(b.parse().map_err(|_| malformed())?),
        weight: Weight(w.parse().map_err(|_| malformed())?),
    })
}

/// Default size of the incoming queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default topology file name.
pub const DEFAULT_TOPOLOGY_PATH: &str = "ghs.conf";

/// Runtime configuration of one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    /// Explicit identity.
    pub id: Option<ProcessId>,
    /// Own IPv4 address, used to derive the identity when `id` is unset.
    pub ip: Option<Ipv4Addr>,
    /// Topology file.
    pub topology_path: PathBuf,
    /// How ids map to addresses.
    pub addressing: Addressing,
    /// Capacity of the incoming queue.
    pub queue_capacity: usize,
    /// Deadline for an inbound connection to deliver its message.
    pub read_timeout: Duration,
    /// Write the event log here instead of stderr.
    pub log_file: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: None,
            ip: None,
            topology_path: PathBuf::from(DEFAULT_TOPOLOGY_PATH),
            addressing: Addressing::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_timeout: tcp::DEFAULT_READ_TIMEOUT,
            log_file: None,
        }
    }
}

/// Usage text for the binary.
pub const USAGE: &str = "\
Usage: ghs-node [OPTIONS]

Options:
  --id <N>              process id (env GHS_NODE_ID)
  --ip <A.B.C.D>        own address; id is its last octet (env GHS_NODE_IP)
  --topology <PATH>     topology file (env GHS_TOPOLOGY, default ghs.conf)
  --subnet <A.B.C>      subnet prefix for peers (env GHS_SUBNET, default 172.17.0)
  --port <N>            listening port (env GHS_PORT, default 7575)
  --loopback <PORT>     all processes on 127.0.0.1, process i on PORT+i (env GHS_LOOPBACK_BASE)
  --queue <N>           incoming queue capacity (env GHS_QUEUE_CAPACITY, default 10)
  --read-timeout-ms <N> drop inbound connections idle this long (env GHS_READ_TIMEOUT_MS, default 2000)
  --log-file <PATH>     write the event log to PATH (env GHS_LOG_FILE)
  -h, --help            print this help
";

impl NodeConfig {
    /// Parse from the process arguments and environment.
    ///
    /// Returns `Ok(None)` when help was requested.
    pub fn from_env_and_args() -> Result<Option<Self>, ConfigError> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Parse from explicit arguments (without the program name) and an
    /// environment lookup. Flags take precedence over the environment.
    pub fn from_sources(
        args: &[String],
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Option<Self>, ConfigError> {
        let mut flags = std::collections::HashMap::new();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "-h" | "--help" => return Ok(None),
                "--id" | "--ip" | "--topology" | "--subnet" | "--port" | "--loopback"
                | "--queue" | "--read-timeout-ms" | "--log-file" => {
                    let value = iter.next().ok_or_else(|| ConfigError::InvalidArgument {
                        name: arg.clone(),
                        reason: "missing value".into(),
                    })?;
                    flags.insert(arg.trim_start_matches("--").to_string(), value.clone());
                }
                other => {
                    return Err(ConfigError::InvalidArgument {
                        name: other.to_string(),
                        reason: "unknown flag".into(),
                    })
                }
            }
        }

        let lookup = |flag: &str, var: &str| flags.get(flag).cloned().or_else(|| env(var));
        let mut config = NodeConfig::default();

        if let Some(v) = lookup("id", "GHS_NODE_ID") {
            config.id = Some(ProcessId(parse_value("--id", &v)?));
        }
        if let Some(v) = lookup("ip", "GHS_NODE_IP") {
            config.ip = Some(parse_value("--ip", &v)?);
        }
        if let Some(v) = lookup("topology", "GHS_TOPOLOGY") {
            config.topology_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("queue", "GHS_QUEUE_CAPACITY") {
            let capacity: usize = parse_value("--queue", &v)?;
            if capacity == 0 {
                return Err(ConfigError::InvalidArgument {
                    name: "--queue".into(),
                    reason: "capacity must be positive".into(),
                });
            }
            config.queue_capacity = capacity;
        }
        if let Some(v) = lookup("read-timeout-ms", "GHS_READ_TIMEOUT_MS") {
            let millis: u64 = parse_value("--read-timeout-ms", &v)?;
            if millis == 0 {
                return Err(ConfigError::InvalidArgument {
                    name: "--read-timeout-ms".into(),
                    reason: "timeout must be positive".into(),
                });
            }
            config.read_timeout = Duration::from_millis(millis);
        }
        if let Some(v) = lookup("log-file", "GHS_LOG_FILE") {
            config.log_file = Some(PathBuf::from(v));
        }

        config.addressing = match lookup("loopback", "GHS_LOOPBACK_BASE") {
            Some(v) => Addressing::Loopback {
                base_port: parse_value("--loopback", &v)?,
            },
            None => {
                let prefix = match lookup("subnet", "GHS_SUBNET") {
                    Some(v) => parse_subnet(&v)?,
                    None => DEFAULT_SUBNET,
                };
                let port = match lookup("port", "GHS_PORT") {
                    Some(v) => parse_value("--port", &v)?,
                    None => DEFAULT_PORT,
                };
                Addressing::Subnet { prefix, port }
            }
        };

        Ok(Some(config))
    }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidArgument {
            name: name.to_string(),
            reason: format!("{value:?}: {e}"),
        })
}

fn parse_subnet(value: &str) -> Result<[u8; 3], ConfigError> {
    let octets: Vec<u8> = value
        .trim()
        .trim_end_matches('.')
        .split('.')
        .map(|o| parse_value("--subnet", o))
        .collect::<Result<_, _>>()?;
    octets
        .try_into()
        .map_err(|_| ConfigError::InvalidArgument {
            name: "--subnet".into(),
            reason: format!("{value:?}: expected three octets"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ghs_mst_core::EdgeState;

    const TRIANGLE: &str = "1\n1 2 5\n1 3 3\n2 3 7\n";

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_triangle() {
        let topology = Topology::parse(TRIANGLE).unwrap();
        assert_eq!(topology.initiator(), ProcessId(1));
        assert_eq!(topology.edges().len(), 3);
        assert!(topology.is_connected());
        assert_eq!(
            topology.processes().into_iter().collect::<Vec<_>>(),
            vec![ProcessId(1), ProcessId(2), ProcessId(3)]
        );
    }

    #[test]
    fn test_links_for_filters_and_sorts() {
        let topology = Topology::parse(TRIANGLE).unwrap();
        let links = topology.links_for(ProcessId(1));
        let found: Vec<_> = links
            .iter()
            .map(|(_, l)| (l.neighbor(), l.weight(), l.state()))
            .collect();
        assert_eq!(
            found,
            vec![
                (ProcessId(3), Weight(3), EdgeState::Basic),
                (ProcessId(2), Weight(5), EdgeState::Basic),
            ]
        );
        assert!(topology.links_for(ProcessId(9)).is_empty());
    }

    #[test]
    fn test_comments_and_blank_lines_ignored() {
        let text = "# triangle\n\n2   # starts\n1 2 5\n\n1 3 3 # cheapest\n";
        let topology = Topology::parse(text).unwrap();
        assert_eq!(topology.initiator(), ProcessId(2));
        assert_eq!(topology.edges().len(), 2);
    }

    #[test]
    fn test_parse_errors_report_line() {
        assert!(matches!(
            Topology::parse(""),
            Err(ConfigError::MissingInitiator { line: 1 })
        ));
        assert!(matches!(
            Topology::parse("one\n1 2 3"),
            Err(ConfigError::MissingInitiator { line: 1 })
        ));
        assert!(matches!(
            Topology::parse("1\n1 2 3\n2 x 4"),
            Err(ConfigError::MalformedEdge { line: 3, .. })
        ));
        assert!(matches!(
            Topology::parse("1\n1 2"),
            Err(ConfigError::MalformedEdge { line: 2, .. })
        ));
        assert!(matches!(
            Topology::parse("1\n1 1 3"),
            Err(ConfigError::SelfLoop { line: 2, .. })
        ));
        assert!(matches!(
            Topology::parse("1\n1 2 3\n2 1 4"),
            Err(ConfigError::DuplicateEdge { line: 3, .. })
        ));
        assert!(matches!(
            Topology::parse("1\n1 2 3\n2 3 3"),
            Err(ConfigError::DuplicateWeight { line: 3, .. })
        ));
        assert!(matches!(
            Topology::parse(&format!("1\n1 2 {}", u64::MAX)),
            Err(ConfigError::ReservedWeight { line: 2, .. })
        ));
    }

    #[test]
    fn test_disconnected_topology_detected() {
        let topology = Topology::parse("1\n1 2 1\n3 4 2\n").unwrap();
        assert!(!topology.is_connected());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ghs.conf");
        std::fs::write(&path, TRIANGLE).unwrap();

        let topology = Topology::load(&path).unwrap();
        assert_eq!(topology.edges().len(), 3);

        let missing = Topology::load(dir.path().join("missing.conf"));
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_node_config_defaults() {
        let config = NodeConfig::from_sources(&[], |_| None).unwrap().unwrap();
        assert_eq!(config, NodeConfig::default());
        assert_eq!(config.queue_capacity, 10);
        assert_eq!(config.topology_path, PathBuf::from("ghs.conf"));
    }

    #[test]
    fn test_node_config_flags_override_env() {
        let env = |key: &str| match key {
            "GHS_NODE_ID" => Some("4".to_string()),
            "GHS_PORT" => Some("9000".to_string()),
            _ => None,
        };
        let config = NodeConfig::from_sources(
            &args(&["--id", "7", "--subnet", "10.0.3", "--log-file", "n7.log"]),
            env,
        )
        .unwrap()
        .unwrap();

        assert_eq!(config.id, Some(ProcessId(7)));
        assert_eq!(
            config.addressing,
            Addressing::Subnet {
                prefix: [10, 0, 3],
                port: 9000
            }
        );
        assert_eq!(config.log_file, Some(PathBuf::from("n7.log")));
        assert_eq!(config.read_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_node_config_read_timeout() {
        let env = |key: &str| (key == "GHS_READ_TIMEOUT_MS").then(|| "750".to_string());
        let config = NodeConfig::from_sources(&[], env).unwrap().unwrap();
        assert_eq!(config.read_timeout, Duration::from_millis(750));

        let config = NodeConfig::from_sources(&args(&["--read-timeout-ms", "40"]), env)
            .unwrap()
            .unwrap();
        assert_eq!(config.read_timeout, Duration::from_millis(40));
    }

    #[test]
    fn test_node_config_loopback() {
        let config = NodeConfig::from_sources(&args(&["--loopback", "41000"]), |_| None)
            .unwrap()
            .unwrap();
        assert_eq!(config.addressing, Addressing::Loopback { base_port: 41000 });
    }

    #[test]
    fn test_node_config_errors() {
        assert!(NodeConfig::from_sources(&args(&["--id"]), |_| None).is_err());
        assert!(NodeConfig::from_sources(&args(&["--id", "x"]), |_| None).is_err());
        assert!(NodeConfig::from_sources(&args(&["--bogus"]), |_| None).is_err());
        assert!(NodeConfig::from_sources(&args(&["--queue", "0"]), |_| None).is_err());
        assert!(NodeConfig::from_sources(&args(&["--read-timeout-ms", "0"]), |_| None).is_err());
        assert!(NodeConfig::from_sources(&args(&["--subnet", "10.0"]), |_| None).is_err());
        assert!(NodeConfig::from_sources(&args(&["--help"]), |_| None)
            .unwrap()
            .is_none());
    }
}

//! Configuration (spec §6's table, SPEC_FULL.md §10.3). Grounded on the
//! teacher's `config/definitions.rs` `ConfigurationSet` shape — a single
//! struct with `serde::Deserialize` and compile-time defaults — simplified
//! down from its TLS/BGSAVE/snapshot variant sprawl to the keys Gibson
//! actually recognizes. Loaded from a single YAML file via `serde_yaml`,
//! matching the crate actually vendored in `server/Cargo.toml` (the
//! `toml`-based `config/feedback.rs` reader elsewhere in the teacher's
//! tree belongs to a different, inconsistent generation and isn't used).

use serde::Deserialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use crate::util::error::{GibsonError, GibsonResult};

fn default_address() -> IpAddr {
    "127.0.0.1".parse().unwrap()
}
fn default_port() -> u16 {
    2004
}
fn default_max_idletime() -> u64 {
    600
}
fn default_max_clients() -> usize {
    50_000
}
fn default_max_request_size() -> u32 {
    4 * 1024 * 1024
}
fn default_max_response_size() -> u32 {
    16 * 1024 * 1024
}
fn default_max_key_size() -> u32 {
    1024
}
fn default_max_value_size() -> u32 {
    4 * 1024 * 1024
}
fn default_max_memory() -> u64 {
    256 * 1024 * 1024
}
fn default_max_item_ttl() -> u64 {
    0
}
fn default_compression() -> usize {
    64
}
fn default_cron_period() -> u64 {
    100
}
fn default_gc_ratio() -> u64 {
    300
}
fn default_loglevel() -> String {
    "info".into()
}

/// Mirrors spec §6's configuration table. Process-lifecycle keys
/// (`daemonize`, `pidfile`, `logfile`, `logflushrate`) are parsed so a
/// stray config file doesn't fail to load, but — per spec §1's
/// out-of-scope list — nothing in this crate acts on them; only
/// `loglevel` has an effect, bridging to `GIBSON_LOG` (SPEC_FULL.md §10.1).
#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub unix_socket: Option<PathBuf>,
    #[serde(default = "default_address")]
    pub address: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_idletime")]
    pub max_idletime: u64,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    #[serde(default = "default_max_request_size")]
    pub max_request_size: u32,
    #[serde(default = "default_max_response_size")]
    pub max_response_size: u32,
    #[serde(default = "default_max_key_size")]
    pub max_key_size: u32,
    #[serde(default = "default_max_value_size")]
    pub max_value_size: u32,
    #[serde(default = "default_max_memory")]
    pub max_memory: u64,
    #[serde(default = "default_max_item_ttl")]
    pub max_item_ttl: u64,
    #[serde(default = "default_compression")]
    pub compression: usize,
    #[serde(default = "default_cron_period")]
    pub cron_period: u64,
    #[serde(default = "default_gc_ratio")]
    pub gc_ratio: u64,

    // process-lifecycle keys: parsed, never acted on here (spec §1 Out of scope)
    #[serde(default)]
    pub daemonize: bool,
    pub pidfile: Option<PathBuf>,
    pub logfile: Option<PathBuf>,
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    #[serde(default)]
    pub logflushrate: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            unix_socket: None,
            address: default_address(),
            port: default_port(),
            max_idletime: default_max_idletime(),
            max_clients: default_max_clients(),
            max_request_size: default_max_request_size(),
            max_response_size: default_max_response_size(),
            max_key_size: default_max_key_size(),
            max_value_size: default_max_value_size(),
            max_memory: default_max_memory(),
            max_item_ttl: default_max_item_ttl(),
            compression: default_compression(),
            cron_period: default_cron_period(),
            gc_ratio: default_gc_ratio(),
            daemonize: false,
            pidfile: None,
            logfile: None,
            loglevel: default_loglevel(),
            logflushrate: 0,
        }
    }
}

impl Config {
    /// Loads and parses a YAML config file (spec §6's CLI: `-c|--config FILE`).
    pub fn load(path: &Path) -> GibsonResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| GibsonError::io_extra(e, format!("reading config file {}", path.display())))?;
        serde_yaml::from_str(&raw).map_err(|e| GibsonError::config(format!("parsing {}: {e}", path.display())))
    }

    /// Clamps `max_memory` to what `util::os::zmem_available` reports is
    /// actually free, if that's lower (spec §4.1).
    pub fn clamp_to_available_memory(&mut self) {
        if let Some(avail) = crate::util::os::zmem_available() {
            if self.max_memory > avail {
                self.max_memory = avail;
            }
        }
    }

    pub fn max_item_ttl_or_unbounded(&self) -> u64 {
        self.max_item_ttl
    }
}

/// Parsed command-line invocation (spec §6: `server [-h|--help] [-c|--config FILE]`).
/// Hand-rolled rather than via `clap` — the teacher's `server/Cargo.toml`
/// never depends on `clap` (only the separate `skysh` CLI crate does),
/// and a two-flag surface doesn't earn a parser dependency of its own.
pub enum CliAction {
    Help,
    Run { config_path: Option<PathBuf> },
}

pub fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliAction, String> {
    let mut args = args.into_iter();
    let mut config_path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(CliAction::Help),
            "-c" | "--config" => {
                let path = args.next().ok_or_else(|| "missing argument to -c/--config".to_string())?;
                config_path = Some(PathBuf::from(path));
            }
            other => return Err(format!("unrecognized argument: {other}")),
        }
    }
    Ok(CliAction::Run { config_path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 2004);
        assert_eq!(cfg.max_clients, 50_000);
        assert!(cfg.unix_socket.is_none());
    }

    #[test]
    fn parses_minimal_yaml_overrides() {
        let yaml = "port: 9999\nmax_clients: 10\n";
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.port, 9999);
        assert_eq!(cfg.max_clients, 10);
        assert_eq!(cfg.max_memory, default_max_memory());
    }

    #[test]
    fn parse_args_recognizes_help() {
        let action = parse_args(vec!["--help".to_string()]).unwrap();
        assert!(matches!(action, CliAction::Help));
    }

    #[test]
    fn parse_args_rejects_unknown_flags() {
        assert!(parse_args(vec!["--bogus".to_string()]).is_err());
    }

    #[test]
    fn parse_args_reads_config_path() {
        let action = parse_args(vec!["-c".to_string(), "gibson.yaml".to_string()]).unwrap();
        match action {
            CliAction::Run { config_path } => assert_eq!(config_path, Some(PathBuf::from("gibson.yaml"))),
            _ => panic!("expected Run"),
        }
    }
}

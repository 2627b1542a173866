//! Process configuration: environment variables, with CLI flags as the
//! same mechanism the base codebase's `main.rs` used for `--mount` etc.
//! Mirrors spec §6's table of `CHORD_*` environment variables.

use clap::Parser;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "chorddfs", about = "A Chord-ring distributed file store node")]
pub struct Args {
    /// Host this node listens on.
    #[arg(long, env = "CHORD_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port this node listens on.
    #[arg(long, env = "CHORD_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address of an existing ring member to join. Omit to bootstrap alone.
    #[arg(long, env = "CHORD_BOOTSTRAP_HOST")]
    pub bootstrap_host: Option<String>,

    /// Port of the bootstrap node. Required if `bootstrap_host` is set.
    #[arg(long, env = "CHORD_BOOTSTRAP_PORT")]
    pub bootstrap_port: Option<u16>,

    /// Directory backing this node's file storage.
    #[arg(long, env = "CHORD_STORAGE_PATH", default_value = "./chord-data")]
    pub storage_path: String,

    /// Identifier-space bit width; ring size is `2^m`.
    #[arg(long = "m", env = "CHORD_M", default_value_t = 10)]
    pub m: u32,

    /// Seconds between stabilization cycles.
    #[arg(long, env = "CHORD_STABILIZE_PERIOD", default_value_t = 2)]
    pub stabilize_period_secs: u64,

    /// Seconds before an RPC call is abandoned.
    #[arg(long, env = "CHORD_RPC_TIMEOUT", default_value_t = 5)]
    pub rpc_timeout_secs: u64,
}

impl Args {
    pub fn self_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn bootstrap_address(&self) -> Option<String> {
        match (&self.bootstrap_host, self.bootstrap_port) {
            (Some(host), Some(port)) => Some(format!("{host}:{port}")),
            _ => None,
        }
    }

    pub fn stabilize_period(&self) -> Duration {
        Duration::from_secs(self.stabilize_period_secs)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// The hop cap for iterative routing; the reference configuration ties
    /// it to `M` (spec §4.6.3: "capped at MAX_HOPS = M").
    pub fn max_hops(&self) -> u32 {
        self.m
    }
}

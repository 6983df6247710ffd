use clap::Parser;
use std::str::FromStr;
use strum_macros::Display;
use tokio::time::Duration;

use crate::codec::DEFAULT_MAX_FRAME_SIZE;

pub const PORT: u16 = 6379;
pub const SWEEP_INTERVAL_MS: u64 = 200;

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Config {
    /// The port to listen on
    #[arg(short, long, default_value_t = PORT)]
    pub port: u16,

    /// Run as a replica of the given master, written as "<host> <port>"
    #[arg(long)]
    pub replicaof: Option<ReplicaOf>,

    /// How often, in milliseconds, expired keys are swept from memory
    #[arg(
        long,
        default_value_t = SWEEP_INTERVAL_MS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub sweep_interval_ms: u64,

    /// Largest request, in bytes, a client may send
    #[arg(long, env = "MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    pub max_frame_size: usize,
}

impl Config {
    pub fn role(&self) -> Role {
        match self.replicaof {
            Some(_) => Role::Slave,
            None => Role::Master,
        }
    }

    /// Never zero, even for a `Config` built by hand.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: PORT,
            replicaof: None,
            sweep_interval_ms: SWEEP_INTERVAL_MS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaOf {
    pub host: String,
    pub port: u16,
}

impl FromStr for ReplicaOf {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();

        let (Some(host), Some(port), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("expected \"<host> <port>\", got {s:?}"));
        };

        let port = port
            .parse::<u16>()
            .map_err(|e| format!("invalid port {port:?}: {e}"))?;

        Ok(ReplicaOf {
            host: host.to_string(),
            port,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Master,
    Slave,
}

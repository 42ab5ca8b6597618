//! Startup configuration read from environment variables.
//!
//! | Variable                  | Default        |
//! |---------------------------|----------------|
//! | `EXPORTER_MODE`           | `container`    |
//! | `POLL_INTERVAL_SECONDS`   | `10`           |
//! | `LISTEN_ADDR`             | `0.0.0.0:8000` |
//! | `STATIC_DIR`              | `./static`     |
//! | `DOCKER_CONNECT_RETRIES`  | `5`            |
//! | `DOCKER_RETRY_BACKOFF_MS` | `500`          |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::runtime::RetryPolicy;

const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 10;
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_STATIC_DIR: &str = "./static";
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid value `{value}` for environment variable `{name}`: {reason}")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Which kind of runtime the exporter observes. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Standalone engine, one entity per container.
    #[default]
    Container,
    /// Swarm manager, one entity per service with its tasks.
    Service,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "container" | "docker" | "standalone" => Ok(Self::Container),
            "service" | "swarm" | "cluster" => Ok(Self::Service),
            _ => Err("expected `container` or `service`".to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub poll_interval: Duration,
    pub listen_addr: SocketAddr,
    pub static_dir: PathBuf,
    pub retry: RetryPolicy,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidValue`] naming the first variable that is set
    /// but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mode = parse_var(&lookup, "EXPORTER_MODE", Mode::default(), |s| s.parse::<Mode>())?;

        let poll_interval = parse_var(
            &lookup,
            "POLL_INTERVAL_SECONDS",
            DEFAULT_POLL_INTERVAL_SECONDS,
            parse_positive,
        )
        .map(Duration::from_secs)?;

        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(value) => parse_addr("LISTEN_ADDR", value)?,
            None => parse_addr("LISTEN_ADDR", DEFAULT_LISTEN_ADDR.to_owned())?,
        };

        let static_dir = lookup("STATIC_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

        let defaults = RetryPolicy::default();
        let max_attempts = parse_var(
            &lookup,
            "DOCKER_CONNECT_RETRIES",
            u64::from(defaults.max_attempts),
            parse_positive,
        )?;
        let initial_backoff = parse_var(
            &lookup,
            "DOCKER_RETRY_BACKOFF_MS",
            u64::try_from(defaults.initial_backoff.as_millis()).unwrap_or(u64::MAX),
            parse_positive,
        )
        .map(Duration::from_millis)?;

        Ok(Self {
            mode,
            poll_interval,
            listen_addr,
            static_dir,
            retry: RetryPolicy {
                max_attempts: u32::try_from(max_attempts).unwrap_or(u32::MAX),
                initial_backoff: initial_backoff.min(MAX_RETRY_BACKOFF),
                max_backoff: MAX_RETRY_BACKOFF,
            },
        })
    }
}

fn parse_var<T, E: ToString>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
    parse: impl Fn(&str) -> std::result::Result<T, E>,
) -> Result<T> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => parse(value.trim()).map_err(|err| Error::InvalidValue {
            name,
            reason: err.to_string(),
            value,
        }),
    }
}

fn parse_positive(value: &str) -> std::result::Result<u64, String> {
    match value.parse::<u64>() {
        Ok(0) => Err("must be greater than zero".to_owned()),
        Ok(n) => Ok(n),
        Err(err) => Err(err.to_string()),
    }
}

fn parse_addr(name: &'static str, value: String) -> Result<SocketAddr> {
    value
        .trim()
        .parse::<SocketAddr>()
        .map_err(|err| Error::InvalidValue {
            name,
            reason: err.to_string(),
            value,
        })
}

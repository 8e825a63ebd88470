//! Statsd sink configuration
//!
//! Configuration comes from the environment so that a host process can be
//! instrumented without code changes. All values are optional; malformed
//! values fall back to the defaults with a warning rather than failing,
//! since configuration problems must never abort the host process.

use tracing::warn;

/// Environment variable naming the statsd host.
pub const ENV_HOST: &str = "PYTHON_POPCONTEST_STATSD_HOST";
/// Environment variable naming the statsd UDP port.
pub const ENV_PORT: &str = "PYTHON_POPCONTEST_STATSD_PORT";
/// Environment variable naming the metric prefix.
pub const ENV_PREFIX: &str = "PYTHON_POPCONTEST_STATSD_PREFIX";

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8125;
const DEFAULT_PREFIX: &str = "python_popcon";

/// Where and how usage counters are sent.
///
/// Counters are emitted under `<prefix>.library_used.<name>` plus a single
/// `<prefix>.reports` counter per report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsdConfig {
    /// Statsd hostname (default `localhost`)
    pub host: String,
    /// Statsd UDP port (default `8125`)
    pub port: u16,
    /// Metric name prefix (default `python_popcon`)
    pub prefix: String,
}

impl Default for StatsdConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl StatsdConfig {
    /// Read the sink configuration from `PYTHON_POPCONTEST_STATSD_*`
    /// environment variables, falling back to defaults for anything unset
    /// or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let host = std::env::var(ENV_HOST).unwrap_or(defaults.host);
        let prefix = std::env::var(ENV_PREFIX).unwrap_or(defaults.prefix);
        let port = match std::env::var(ENV_PORT) {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = %raw, "invalid statsd port, using default");
                defaults.port
            }),
            Err(_) => defaults.port,
        };

        Self { host, port, prefix }
    }
}

//! Popcon - report which installed Python distributions a process imported
//!
//! In interactive computing installations, knowing which libraries are
//! actually in use is extremely helpful in managing environments for users.
//! This library snapshots the set of loaded modules at registration time and,
//! when the process exits, resolves every module imported after that point to
//! the installed distribution that provides it, emitting one statsd counter
//! per distribution plus a `reports` counter.
//!
//! The two collaborators the pipeline needs are trait seams: a
//! [`ModuleRegistry`] supplies the set of currently loaded module names, and
//! a [`DistributionProvider`] supplies the installed distributions with the
//! files they own. [`DistInfoProvider`] is the built-in provider that scans
//! site-packages style directories for `*.dist-info` metadata.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::HashSet;
//! use popcon::{setup_reporter, DistInfoProvider};
//!
//! let registry: HashSet<String> = ["json".to_string()].into_iter().collect();
//! let provider = DistInfoProvider::new(vec!["/usr/lib/python3/site-packages".into()]);
//!
//! // Captures the baseline now; the report fires at process exit.
//! let ctx = setup_reporter(None, registry, provider)?;
//! # let _ = ctx;
//! # Ok::<(), popcon::SetupError>(())
//! ```

pub mod config;
pub mod delta;
pub mod distribution;
pub mod hook;
pub mod index;
pub mod reporter;
pub mod statsd;

pub use config::StatsdConfig;
pub use delta::{resolve_delta, ModuleRegistry};
pub use distribution::{DistInfoProvider, Distribution, DistributionProvider, MetadataError};
pub use hook::{setup_reporter, ReporterContext, SetupError};
pub use index::PackageIndex;
pub use reporter::{used_libraries, Reporter, UsageReport};
pub use statsd::{Pipeline, StatsClient};

//! Usage reporter
//!
//! Joins the module delta against the distribution index and emits one
//! `library_used.<name>` counter per distinct distribution, batched into a
//! single pipeline flush, plus an unbuffered `reports` counter. This runs
//! just before a process exits, so it must be as fast as possible and must
//! never let a failure escape: transport and configuration problems are
//! logged and swallowed.

use std::collections::{BTreeSet, HashSet};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::StatsdConfig;
use crate::delta::resolve_delta;
use crate::distribution::DistributionProvider;
use crate::index::PackageIndex;
use crate::statsd::StatsClient;

/// Summary of one report, logged at debug level before emission.
#[derive(Debug, Clone, Serialize)]
pub struct UsageReport {
    /// Modules imported since the baseline snapshot
    pub modules_imported: usize,
    /// Distinct distributions those modules resolved to
    pub libraries: BTreeSet<String>,
}

/// The usage set: distinct distribution names providing the delta modules.
///
/// Modules absent from the index (stdlib imported lazily, local unpackaged
/// code) are silently skipped. The result is a set, so a distribution
/// reached through several of its modules is counted once.
pub fn used_libraries(delta: &HashSet<String>, index: &PackageIndex) -> BTreeSet<String> {
    let mut libraries = BTreeSet::new();
    for module in delta {
        if let Some(providers) = index.lookup(module) {
            for distribution in providers {
                libraries.insert(distribution.name.clone());
            }
        }
    }
    libraries
}

/// Emits usage counters for the modules imported since a baseline snapshot.
#[derive(Debug, Clone)]
pub struct Reporter {
    config: StatsdConfig,
}

impl Reporter {
    pub fn new(config: StatsdConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline: build the index, resolve the delta, emit the
    /// counters. Infallible by design; this is called during process
    /// shutdown, where nothing may propagate.
    pub fn report(
        &self,
        baseline: &HashSet<String>,
        current: &HashSet<String>,
        provider: &dyn DistributionProvider,
    ) {
        let index = PackageIndex::build(provider);
        let delta = resolve_delta(baseline, current);
        let report = UsageReport {
            modules_imported: delta.len(),
            libraries: used_libraries(&delta, &index),
        };

        if let Ok(summary) = serde_json::to_string(&report) {
            debug!(report = %summary, "sending usage report");
        }

        if let Err(error) = self.emit(&report.libraries) {
            warn!(error = %format!("{error:#}"), "failed to deliver usage report");
        }
    }

    fn emit(&self, libraries: &BTreeSet<String>) -> Result<()> {
        let client = StatsClient::new(&self.config).with_context(|| {
            format!(
                "connecting to statsd at {}:{}",
                self.config.host, self.config.port
            )
        })?;

        let mut pipe = client.pipeline();
        for library in libraries {
            pipe.incr(&format!("library_used.{library}"), 1);
        }
        pipe.send().context("flushing usage counters")?;
        drop(pipe);

        // Sent outside the batch: counts report invocations, not libraries.
        client.incr("reports", 1).context("sending report counter")?;
        Ok(())
    }
}

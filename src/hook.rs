//! Process-exit lifecycle hook
//!
//! [`setup_reporter`] captures the baseline module snapshot, bundles it with
//! the collaborators into an explicit [`ReporterContext`], installs that
//! context into a process-wide slot, and schedules the report to run once at
//! normal process termination via `atexit`. Abnormal termination (a fatal
//! signal) skips the hook entirely; reporting is best effort.
//!
//! Double registration is rejected: the first installed context wins and
//! later calls get [`SetupError::AlreadyInstalled`], so a process can never
//! schedule two reports with diverging baselines. Hosts without a usable
//! exit hook can skip installation and call
//! [`ReporterContext::report_now`] themselves at shutdown.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::OnceLock;

use thiserror::Error;
use tracing::warn;

use crate::config::StatsdConfig;
use crate::delta::ModuleRegistry;
use crate::distribution::DistributionProvider;
use crate::reporter::Reporter;

/// The single installed context. Written once by `setup_reporter`, read
/// once by the exit callback; effectively immutable after installation.
static INSTALLED: OnceLock<ReporterContext> = OnceLock::new();

#[derive(Error, Debug)]
pub enum SetupError {
    /// A reporter context is already installed; first registration wins.
    #[error("usage reporter already installed for this process")]
    AlreadyInstalled,
}

/// Everything the exit-time report needs, captured at registration.
pub struct ReporterContext {
    baseline: HashSet<String>,
    reporter: Reporter,
    registry: Box<dyn ModuleRegistry + Send + Sync>,
    provider: Box<dyn DistributionProvider + Send + Sync>,
}

impl ReporterContext {
    /// The baseline snapshot this context was registered with.
    pub fn baseline(&self) -> &HashSet<String> {
        &self.baseline
    }

    /// Run the report against the modules loaded right now.
    ///
    /// This is what the exit callback invokes; it is public so hosts without
    /// an exit hook can finalize explicitly. Never fails: everything inside
    /// the reporter is swallowed and logged.
    pub fn report_now(&self) {
        let current = self.registry.loaded_modules();
        self.reporter
            .report(&self.baseline, &current, self.provider.as_ref());
    }
}

/// Capture the baseline and schedule the exit-time report.
///
/// If `baseline` is `None`, the registry's current module set is captured as
/// the baseline, so everything already loaded counts as infrastructure and
/// is never reported. Sink configuration is read from the environment at
/// registration time.
///
/// Returns the installed context, or [`SetupError::AlreadyInstalled`] if a
/// previous call already registered one.
pub fn setup_reporter<R, P>(
    baseline: Option<HashSet<String>>,
    registry: R,
    provider: P,
) -> Result<&'static ReporterContext, SetupError>
where
    R: ModuleRegistry + Send + Sync + 'static,
    P: DistributionProvider + Send + Sync + 'static,
{
    let baseline = baseline.unwrap_or_else(|| registry.loaded_modules());
    let context = ReporterContext {
        baseline,
        reporter: Reporter::new(StatsdConfig::from_env()),
        registry: Box::new(registry),
        provider: Box::new(provider),
    };

    let mut installed_now = false;
    let installed = INSTALLED.get_or_init(|| {
        installed_now = true;
        context
    });
    if !installed_now {
        return Err(SetupError::AlreadyInstalled);
    }

    // SAFETY: report_at_exit is a plain extern "C" fn that catches every
    // unwind before it reaches the C runtime.
    let rc = unsafe { libc::atexit(report_at_exit) };
    if rc != 0 {
        warn!("atexit registration failed; report will not fire automatically");
    }

    Ok(installed)
}

/// Exit callback: runs the installed context's report exactly once, during
/// normal termination. A panic here must not cross the extern "C" boundary
/// or it would abort the teardown it is trying to observe.
extern "C" fn report_at_exit() {
    let Some(context) = INSTALLED.get() else {
        return;
    };
    if panic::catch_unwind(AssertUnwindSafe(|| context.report_now())).is_err() {
        warn!("usage report panicked during process exit");
    }
}

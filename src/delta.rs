//! Module delta resolution
//!
//! The delta is a plain set difference: everything loaded now that was not
//! loaded when the baseline snapshot was captured. Standard-library modules
//! are not filtered by name here; they are excluded implicitly because they
//! are already loaded (and therefore in the baseline) by the time a caller
//! registers the reporter. Stdlib modules lazily imported after the baseline
//! still drop out later, at index resolution, since the standard library has
//! no installed-distribution metadata.

use std::collections::HashSet;

/// Supplies the set of currently loaded module names.
///
/// Backed by the host runtime's import machinery (the equivalent of
/// `sys.modules` keys). Membership is by exact dotted name: `statsd.client`
/// and `statsd` are distinct modules.
pub trait ModuleRegistry {
    fn loaded_modules(&self) -> HashSet<String>;
}

/// Fixture-friendly registry: a frozen set of module names.
impl ModuleRegistry for HashSet<String> {
    fn loaded_modules(&self) -> HashSet<String> {
        self.clone()
    }
}

/// Module names present in `current` but not in `baseline`.
pub fn resolve_delta(
    baseline: &HashSet<String>,
    current: &HashSet<String>,
) -> HashSet<String> {
    current.difference(baseline).cloned().collect()
}

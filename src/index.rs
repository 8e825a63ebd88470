//! Distribution index builder
//!
//! Maps every importable package name to the installed distribution(s) that
//! provide it, by classifying each file a distribution owns:
//!
//! - `__init__.py` marker: the parent directory path, with `/` replaced by
//!   `.`, is a package (so `statsd/client/__init__.py` yields
//!   `statsd.client`).
//! - a `.py` file sitting directly at the install root is a single-file
//!   module (`escapism.py` yields `escapism`).
//! - everything else (metadata, `__pycache__` artifacts, data files) is
//!   ignored.
//!
//! A package name can be provided by more than one distribution when
//! installs conflict or overlap, so the index is a one-to-many mapping. The
//! index is built fresh for every report rather than cached: installed
//! packages change between invocations.

use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::Arc;

use crate::distribution::{Distribution, DistributionProvider};

/// Filename marking its parent directory as an importable package.
pub const PACKAGE_MARKER: &str = "__init__.py";
/// Source suffix for single-file top-level modules.
pub const MODULE_SUFFIX: &str = ".py";

/// Mapping from importable package name to its providing distribution(s).
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    packages: HashMap<String, Vec<Arc<Distribution>>>,
}

impl PackageIndex {
    /// Build the index over everything the provider currently lists.
    ///
    /// Pure and idempotent: building twice over an unchanged installation
    /// yields an equal mapping. Cost is proportional to the total number of
    /// installed files.
    pub fn build(provider: &dyn DistributionProvider) -> Self {
        let mut packages: HashMap<String, Vec<Arc<Distribution>>> = HashMap::new();
        for distribution in provider.list_distributions() {
            let distribution = Arc::new(distribution);
            for file in &distribution.files {
                if let Some(package) = classify(file) {
                    packages
                        .entry(package)
                        .or_default()
                        .push(Arc::clone(&distribution));
                }
            }
        }
        Self { packages }
    }

    /// Distributions providing `module`, if any. Lookup is by exact dotted
    /// name: `statsd.client` and `statsd` are distinct entries.
    pub fn lookup(&self, module: &str) -> Option<&[Arc<Distribution>]> {
        self.packages.get(module).map(Vec::as_slice)
    }

    /// All indexed package names.
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Classify one owned file path as the package name it makes importable.
///
/// Returns `None` for anything that is not a package marker or a top-level
/// module file; arbitrary data files are not package indicators.
fn classify(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;

    if file_name == PACKAGE_MARKER {
        let parent = path.parent()?;
        if parent.as_os_str().is_empty() {
            // An __init__.py directly at the root names no package.
            return None;
        }
        let mut parts = Vec::new();
        for component in parent.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                // Paths escaping the install root (scripts, ../ entries)
                // never name an importable package.
                _ => return None,
            }
        }
        return Some(parts.join("."));
    }

    // A module file directly at the install root: path equals its own
    // base name and carries the source suffix.
    if path.components().count() == 1 {
        return file_name.strip_suffix(MODULE_SUFFIX).map(str::to_string);
    }

    None
}

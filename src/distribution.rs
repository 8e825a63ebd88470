//! Installed distribution enumeration
//!
//! A [`Distribution`] is one installed package: its name plus the list of
//! file paths it owns, relative to its install root. The pipeline only needs
//! a read-only query for "what is installed", expressed as the
//! [`DistributionProvider`] trait so that tests and embedders can substitute
//! fixtures.
//!
//! [`DistInfoProvider`] is the filesystem implementation: it scans
//! site-packages style directories for `*.dist-info` metadata directories,
//! taking the distribution name from the `Name:` header of `METADATA` and
//! the owned files from `RECORD`. A distribution with unreadable or
//! incomplete metadata is skipped with a warning; one bad entry must never
//! abort a report.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::warn;

/// One installed distribution and the files it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Distribution {
    /// Distribution name as declared in its metadata (e.g. `statsd`)
    pub name: String,
    /// Files owned by this distribution, relative to its install root
    pub files: Vec<PathBuf>,
}

/// Read-only query for the set of installed distributions.
///
/// Implementations are expected to enumerate afresh on every call: installed
/// packages can change between invocations, so nothing is cached here.
pub trait DistributionProvider {
    fn list_distributions(&self) -> Vec<Distribution>;
}

/// Fixture-friendly provider: a plain list of distributions.
impl DistributionProvider for Vec<Distribution> {
    fn list_distributions(&self) -> Vec<Distribution> {
        self.clone()
    }
}

/// Why a single `*.dist-info` directory could not be loaded.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no Name field in {0}")]
    MissingName(PathBuf),
}

/// Enumerates installed distributions from `*.dist-info` directories.
///
/// Warning: this walks every metadata directory under every root on each
/// call, so it can be expensive with many packages on a slow filesystem
/// (like NFS). Callers should expect it to dominate report latency.
#[derive(Debug, Clone)]
pub struct DistInfoProvider {
    roots: Vec<PathBuf>,
}

impl DistInfoProvider {
    /// Create a provider scanning the given site-packages style roots.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    fn read_dist_info(dir: &Path) -> Result<Distribution, MetadataError> {
        let metadata_path = dir.join("METADATA");
        let metadata = fs::read_to_string(&metadata_path).map_err(|source| MetadataError::Io {
            path: metadata_path.clone(),
            source,
        })?;
        let name = metadata
            .lines()
            .find_map(|line| line.strip_prefix("Name:"))
            .map(|value| value.trim().to_string())
            .ok_or(MetadataError::MissingName(metadata_path))?;

        let record_path = dir.join("RECORD");
        let record = fs::read_to_string(&record_path).map_err(|source| MetadataError::Io {
            path: record_path,
            source,
        })?;
        // RECORD is CSV: path,hash,size. Only the path column matters here.
        let files = record
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| line.split(',').next())
            .map(PathBuf::from)
            .collect();

        Ok(Distribution { name, files })
    }
}

impl DistributionProvider for DistInfoProvider {
    fn list_distributions(&self) -> Vec<Distribution> {
        let mut distributions = Vec::new();
        for root in &self.roots {
            let entries = match fs::read_dir(root) {
                Ok(entries) => entries,
                Err(error) => {
                    warn!(root = %root.display(), %error, "skipping unreadable packages root");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                let is_dist_info = path.is_dir()
                    && path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .is_some_and(|name| name.ends_with(".dist-info"));
                if !is_dist_info {
                    continue;
                }
                match Self::read_dist_info(&path) {
                    Ok(distribution) => distributions.push(distribution),
                    Err(error) => {
                        warn!(dist_info = %path.display(), %error, "skipping distribution");
                    }
                }
            }
        }
        distributions
    }
}

//! Source snapshot loading with builder pattern and fallback chains.
//!
//! Upstream loaders dump what they fetched as snapshot files, each holding a
//! partial [`SourceBundle`]. [`SourceLoader`] reads them back and
//! concatenates them into the bundle handed to the engine.
//!
//! # Loading patterns
//!
//! ```no_run
//! use catalog_merge_db::SourceLoader;
//!
//! // Load every snapshot in a directory
//! let loader = SourceLoader::from_dir("snapshots/").unwrap();
//! println!("{} records", loader.bundle().len());
//!
//! // Load a single bundle file
//! let loader = SourceLoader::from_bundle("snapshot.json.gz").unwrap();
//!
//! // Use the builder for a fallback chain
//! let loader = SourceLoader::builder()
//!     .from_dir("snapshots/")
//!     .from_bundle("last-known-good.json")
//!     .build()
//!     .unwrap();
//! ```
//!
//! Supported formats are picked by extension: `.json`, `.yaml`/`.yml` and
//! gzip-compressed `.json.gz`. Directory contents are parsed in parallel and
//! concatenated in file-name order.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use catalog_merge_core::SourceBundle;
use flate2::read::GzDecoder;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{LoadError, Result};

/// On-disk encoding of a snapshot file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Yaml,
    GzipJson,
}

impl SnapshotFormat {
    /// Picks the format from a file name, or `None` for unrelated files.
    ///
    /// # Examples
    ///
    /// ```
    /// use catalog_merge_db::SnapshotFormat;
    ///
    /// assert_eq!(SnapshotFormat::from_path("rmc.json.gz"), Some(SnapshotFormat::GzipJson));
    /// assert_eq!(SnapshotFormat::from_path("catalog.yml"), Some(SnapshotFormat::Yaml));
    /// assert_eq!(SnapshotFormat::from_path("README.md"), None);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let name = path.as_ref().file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".json.gz") {
            Some(SnapshotFormat::GzipJson)
        } else if name.ends_with(".json") {
            Some(SnapshotFormat::Json)
        } else if name.ends_with(".yaml") || name.ends_with(".yml") {
            Some(SnapshotFormat::Yaml)
        } else {
            None
        }
    }
}

/// Describes where a [`SourceLoader`] was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoaderSource {
    /// Every snapshot file in a directory.
    Directory(PathBuf),
    /// A single snapshot file.
    Bundle(PathBuf),
    /// Several explicit inputs, concatenated.
    Paths(Vec<PathBuf>),
    /// Loaded via a fallback chain of multiple sources.
    Multiple(Vec<LoaderSource>),
}

/// Source records read from snapshot files.
#[derive(Debug)]
pub struct SourceLoader {
    bundle: SourceBundle,
    files: Vec<PathBuf>,
    source: LoaderSource,
}

fn read_snapshot(path: &Path) -> Result<SourceBundle> {
    let format = SnapshotFormat::from_path(path).ok_or_else(|| LoadError::InvalidSnapshot {
        path: path.to_path_buf(),
        message: "unsupported file extension".to_string(),
    })?;
    let invalid = |message: String| LoadError::InvalidSnapshot {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path)?;
    let bundle = match format {
        SnapshotFormat::Json => serde_json::from_reader(BufReader::new(file))
            .map_err(|e| invalid(e.to_string()))?,
        SnapshotFormat::Yaml => serde_yaml::from_reader(BufReader::new(file))
            .map_err(|e| invalid(e.to_string()))?,
        SnapshotFormat::GzipJson => {
            let mut json = String::new();
            GzDecoder::new(BufReader::new(file))
                .read_to_string(&mut json)
                .map_err(|e| LoadError::CompressionError(format!("{}: {e}", path.display())))?;
            serde_json::from_str(&json).map_err(|e| invalid(e.to_string()))?
        }
    };
    debug!(path = %path.display(), ?format, "read snapshot");
    Ok(bundle)
}

/// Parses `files` in parallel and concatenates them in the given order.
fn read_all(files: &[PathBuf]) -> Result<SourceBundle> {
    let parts: Vec<SourceBundle> = files
        .par_iter()
        .map(|path| read_snapshot(path))
        .collect::<Result<_>>()?;

    let mut bundle = SourceBundle::default();
    for part in parts {
        bundle.extend(part);
    }
    Ok(bundle)
}

fn snapshot_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && SnapshotFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

impl SourceLoader {
    /// Returns a new [`LoaderBuilder`] for configuring a fallback chain.
    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::new()
    }

    /// Loads every snapshot file in a directory.
    ///
    /// Files with other extensions and subdirectories are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::IoError`] if the directory cannot be read,
    /// [`LoadError::InvalidSnapshot`] if any file fails to parse, or
    /// [`LoadError::CompressionError`] for a corrupt gzip file.
    pub fn from_dir(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let files = snapshot_files(path)?;
        if files.is_empty() {
            warn!(dir = %path.display(), "no snapshot files found");
        }
        let bundle = read_all(&files)?;
        info!(dir = %path.display(), files = files.len(), records = bundle.len(), "loaded snapshots");

        Ok(Self {
            bundle,
            files,
            source: LoaderSource::Directory(path.to_path_buf()),
        })
    }

    /// Loads a single snapshot file.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::IoError`] if the file cannot be read, or
    /// [`LoadError::InvalidSnapshot`] if parsing fails.
    pub fn from_bundle(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bundle = read_snapshot(path)?;

        Ok(Self {
            bundle,
            files: vec![path.to_path_buf()],
            source: LoaderSource::Bundle(path.to_path_buf()),
        })
    }

    /// Loads several inputs, each a directory or a single file, and
    /// concatenates them in argument order.
    ///
    /// # Errors
    ///
    /// Fails on the first input that cannot be listed or parsed.
    pub fn from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let mut files = Vec::new();
        for path in paths {
            let path = path.as_ref();
            if path.is_dir() {
                files.extend(snapshot_files(path)?);
            } else {
                files.push(path.to_path_buf());
            }
        }
        let bundle = read_all(&files)?;
        info!(files = files.len(), records = bundle.len(), "loaded snapshots");

        Ok(Self {
            bundle,
            files,
            source: LoaderSource::Paths(paths.iter().map(|p| p.as_ref().to_path_buf()).collect()),
        })
    }

    pub fn bundle(&self) -> &SourceBundle {
        &self.bundle
    }

    pub fn into_bundle(self) -> SourceBundle {
        self.bundle
    }

    /// Snapshot files that contributed to the bundle, in load order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Returns a reference to the source metadata.
    pub fn source(&self) -> &LoaderSource {
        &self.source
    }
}

/// Builder for constructing a [`SourceLoader`] with a fallback chain.
///
/// Sources are tried in the order they are added. The first successful load
/// wins; if all fail, [`LoadError::NoSourcesAvailable`] is returned.
///
/// # Example
///
/// ```no_run
/// use catalog_merge_db::SourceLoader;
///
/// let loader = SourceLoader::builder()
///     .from_dir("/var/lib/catalog-merge/snapshots/")
///     .from_bundle("/var/lib/catalog-merge/fallback.json")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Default)]
pub struct LoaderBuilder {
    sources: Vec<LoaderSource>,
}

impl LoaderBuilder {
    /// Creates a new builder with no sources.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory of snapshot files as a source.
    pub fn from_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(LoaderSource::Directory(path.into()));
        self
    }

    /// Adds a single snapshot file as a source.
    pub fn from_bundle(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(LoaderSource::Bundle(path.into()));
        self
    }

    /// Attempts to load from configured sources in order.
    ///
    /// Returns the first successfully loaded snapshot set. If all sources
    /// fail, returns [`LoadError::NoSourcesAvailable`].
    pub fn build(self) -> Result<SourceLoader> {
        let all_sources = self.sources.clone();

        for source in &self.sources {
            let result = match source {
                LoaderSource::Directory(path) => SourceLoader::from_dir(path),
                LoaderSource::Bundle(path) => SourceLoader::from_bundle(path),
                LoaderSource::Paths(paths) => SourceLoader::from_paths(paths),
                LoaderSource::Multiple(_) => continue,
            };

            match result {
                Ok(mut loader) => {
                    loader.source = LoaderSource::Multiple(all_sources);
                    return Ok(loader);
                }
                Err(err) => debug!(?source, %err, "snapshot source failed, trying next"),
            }
        }

        Err(LoadError::NoSourcesAvailable)
    }
}

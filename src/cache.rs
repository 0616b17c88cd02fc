//! Deployment cache
//!
//! Each cluster keeps one cache file (`.kr8_cache` in its output directory)
//! recording what every component was generated from:
//!
//! - the cluster fingerprint: the raw `_kr8_spec` and `_cluster` JSON text
//! - per component: the raw evaluated params, the SHA-256 of every input
//!   file, and a hash of the fleet-wide bindings when the component uses them
//!
//! A component is skipped only if the cluster fingerprint still matches and
//! its own entry matches exactly. There is no partial state: any difference
//! regenerates the whole component.
//!
//! Raw JSON text is compared byte for byte, so a reformatted evaluator
//! output counts as a change. File hashes cover content only; touching a
//! file without editing it keeps the cache valid.
//!
//! Loading never fails. A missing, unreadable or corrupt cache file is an
//! empty cache, which regenerates everything. A run that cannot commit a
//! new cache discards the old one instead of leaving it behind.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use sha2::{Digest, Sha256};

use crate::config::{CLUSTER_KEY, KR8_SPEC_KEY};
use crate::error::{Error, Result};

/// Input file path -> SHA-256 hex digest of its content
pub type FileHashes = BTreeMap<String, String>;

/// Top-level sections of an evaluated document, as raw JSON text
pub type RawSections = BTreeMap<String, Box<RawValue>>;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const STREAM_BUF_SIZE: usize = 64 * 1024;

/// Split evaluator output into its top-level sections without re-serializing
/// them, so fingerprints see exactly what the evaluator produced.
pub fn split_sections(json_text: &str) -> Result<RawSections> {
    Ok(serde_json::from_str(json_text)?)
}

/// Raw text of `_kr8_spec` and `_cluster`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterFingerprint {
    pub kr8_spec: String,
    pub cluster: String,
}

impl ClusterFingerprint {
    /// Capture the fingerprint of an evaluated cluster document. Absent
    /// sections fingerprint as empty text.
    pub fn capture(sections: &RawSections) -> Self {
        let raw = |key: &str| {
            sections
                .get(key)
                .map(|value| value.get().to_string())
                .unwrap_or_default()
        };
        Self {
            kr8_spec: raw(KR8_SPEC_KEY),
            cluster: raw(CLUSTER_KEY),
        }
    }
}

/// Cached state of one component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentCache {
    /// Evaluated params at the last successful generation
    pub raw_config: String,
    /// Every input file read while generating, with its content hash
    pub file_hashes: FileHashes,
    /// Hash of `kr8_allparams`/`kr8_allclusters` when the component binds them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_hash: Option<String>,
}

/// Cached state of one cluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentCache {
    #[serde(default)]
    pub cluster_fingerprint: Option<ClusterFingerprint>,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentCache>,
}

/// Whether the persisted cluster fingerprint matches the current one.
pub fn check_cluster_cache(persisted: &DeploymentCache, current: &ClusterFingerprint) -> bool {
    persisted.cluster_fingerprint.as_ref() == Some(current)
}

/// Whether a component can be skipped.
///
/// Always false while the cluster is invalid. Otherwise the raw params must
/// be identical, the tracked file set must have the same members, every hash
/// must match, and so must the context hash.
pub fn check_component_cache(
    persisted: &DeploymentCache,
    cluster_valid: bool,
    name: &str,
    raw_config: &str,
    current_hashes: &FileHashes,
    context_hash: Option<&str>,
) -> bool {
    if !cluster_valid {
        return false;
    }
    let Some(entry) = persisted.components.get(name) else {
        return false;
    };
    if entry.raw_config != raw_config {
        debug!("{}: params changed", name);
        return false;
    }
    if entry.file_hashes.len() != current_hashes.len() {
        debug!("{}: tracked file set changed", name);
        return false;
    }
    for (path, hash) in current_hashes {
        if entry.file_hashes.get(path) != Some(hash) {
            debug!("{}: {} changed", name, path);
            return false;
        }
    }
    entry.context_hash.as_deref() == context_hash
}

/// SHA-256 hex digest of a byte slice
pub fn hash_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// SHA-256 hex digest of a file's content
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path).map_err(|e| Error::Cache {
        message: format!("cannot open {}: {}", path.display(), e),
    })?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; STREAM_BUF_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::Cache {
            message: format!("read error {}: {}", path.display(), e),
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash every file, keyed by its display path.
pub fn hash_files<'a, I>(paths: I) -> Result<FileHashes>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    paths
        .into_iter()
        .map(|path| Ok((path.display().to_string(), hash_file(path)?)))
        .collect()
}

/// Load a cache file, degrading to an empty cache on any problem.
pub fn load_cache(path: &Path) -> DeploymentCache {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("No cache at {}", path.display());
            return DeploymentCache::default();
        }
        Err(e) => {
            warn!("Ignoring unreadable cache {}: {}", path.display(), e);
            return DeploymentCache::default();
        }
    };

    let json = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decompressed = Vec::new();
        if let Err(e) = GzDecoder::new(bytes.as_slice()).read_to_end(&mut decompressed) {
            warn!("Ignoring corrupt compressed cache {}: {}", path.display(), e);
            return DeploymentCache::default();
        }
        decompressed
    } else {
        bytes
    };

    match serde_json::from_slice(&json) {
        Ok(cache) => cache,
        Err(e) => {
            warn!("Ignoring corrupt cache {}: {}", path.display(), e);
            DeploymentCache::default()
        }
    }
}

/// Persist a cache file atomically (temp file + rename), optionally gzipped.
pub fn save_cache(path: &Path, cache: &DeploymentCache, compress: bool) -> Result<()> {
    let json = serde_json::to_vec(cache)?;
    let bytes = if compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&json)?;
        encoder.finish()?
    } else {
        json
    };

    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;
    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(&bytes)?;
    temp.persist(path).map_err(|e| Error::Cache {
        message: format!("cannot write {}: {}", path.display(), e.error),
    })?;
    Ok(())
}

/// Drop a persisted cache so the next run regenerates the whole cluster.
///
/// Used when a run changed outputs without committing a cache describing
/// them. A missing file is fine.
pub fn discard_cache(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Discarded cache {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Cache {
            message: format!("cannot remove {}: {}", path.display(), e),
        }),
    }
}

/// One cluster run's view of its cache.
///
/// The previous cache is read-only. Component tasks run concurrently and
/// record their entries into `next` under a mutex. Nothing reaches disk
/// until the cluster run hands the finished cache to `save_cache`.
#[derive(Debug)]
pub struct CacheSession {
    previous: DeploymentCache,
    fingerprint: ClusterFingerprint,
    cluster_valid: bool,
    next: Mutex<BTreeMap<String, ComponentCache>>,
}

impl CacheSession {
    pub fn new(previous: DeploymentCache, fingerprint: ClusterFingerprint) -> Self {
        let cluster_valid = check_cluster_cache(&previous, &fingerprint);
        Self {
            previous,
            fingerprint,
            cluster_valid,
            next: Mutex::new(BTreeMap::new()),
        }
    }

    /// A session that never hits, for runs with the cache turned off
    pub fn disabled(fingerprint: ClusterFingerprint) -> Self {
        Self::new(DeploymentCache::default(), fingerprint)
    }

    pub fn cluster_valid(&self) -> bool {
        self.cluster_valid
    }

    /// Cache decision for one component; `disable_cache` always misses.
    pub fn is_component_valid(
        &self,
        name: &str,
        raw_config: &str,
        current_hashes: &FileHashes,
        context_hash: Option<&str>,
        disable_cache: bool,
    ) -> bool {
        !disable_cache
            && check_component_cache(
                &self.previous,
                self.cluster_valid,
                name,
                raw_config,
                current_hashes,
                context_hash,
            )
    }

    /// Record a freshly generated component
    pub fn record(&self, name: &str, entry: ComponentCache) -> Result<()> {
        self.next
            .lock()
            .map_err(|_| Error::LockPoisoned {
                context: "component cache map".to_string(),
            })?
            .insert(name.to_string(), entry);
        Ok(())
    }

    /// Keep the previous entry of a component that was not regenerated.
    ///
    /// Entries are only carried while the cluster fingerprint matches;
    /// otherwise they would be revalidated against a new fingerprint.
    pub fn carry_forward(&self, name: &str) -> Result<()> {
        if !self.cluster_valid {
            return Ok(());
        }
        if let Some(entry) = self.previous.components.get(name) {
            self.record(name, entry.clone())?;
        }
        Ok(())
    }

    /// Finish the session, producing the cache to persist.
    pub fn into_cache(self) -> Result<DeploymentCache> {
        let components = self.next.into_inner().map_err(|_| Error::LockPoisoned {
            context: "component cache map".to_string(),
        })?;
        Ok(DeploymentCache {
            cluster_fingerprint: Some(self.fingerprint),
            components,
        })
    }
}

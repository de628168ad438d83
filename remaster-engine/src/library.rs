//! Track resolution seam
//!
//! The engine never performs its own file discovery, tagging, or metadata
//! extraction; those belong to the catalog. This module defines the
//! resolution interface the engine consumes plus a minimal directory-backed
//! implementation used by the binary: tracks are registered explicitly and
//! resolved by id.

use crate::audio::decoder::SymphoniaDecoder;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::info;
use uuid::Uuid;

/// Resolved track metadata, immutable once returned.
#[derive(Debug, Clone)]
pub struct TrackInfo {
    /// Opaque track identifier
    pub track_id: Uuid,

    /// Source file backing the track
    pub path: PathBuf,

    /// Source sample rate
    pub sample_rate: u32,

    /// Channel count
    pub channels: u8,

    /// Total frames in the track
    pub duration_samples: u64,

    /// Signature of the source file (length + mtime). Part of every cache
    /// key, so edits to the file invalidate stale cached chunks.
    pub source_signature: u64,
}

impl TrackInfo {
    /// Track duration in seconds
    pub fn duration_s(&self) -> f64 {
        self.duration_samples as f64 / self.sample_rate as f64
    }
}

/// Catalog seam: given an id, produce the decode handle for a track.
pub trait TrackResolver: Send + Sync {
    fn resolve(&self, track_id: Uuid) -> Result<TrackInfo>;
}

/// Signature of a source file derived from its length and mtime.
pub fn source_signature(path: &Path) -> Result<u64> {
    let meta = std::fs::metadata(path)?;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    meta.len().hash(&mut hasher);
    if let Ok(mtime) = meta.modified() {
        if let Ok(elapsed) = mtime.duration_since(std::time::UNIX_EPOCH) {
            elapsed.as_nanos().hash(&mut hasher);
        }
    }
    Ok(hasher.finish())
}

/// Directory-backed resolver: tracks registered under a root folder.
pub struct FileLibrary {
    root: PathBuf,
    tracks: RwLock<HashMap<Uuid, TrackInfo>>,
}

impl FileLibrary {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            tracks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a file (relative to the library root) and probe its format.
    pub fn register(&self, relative_path: &Path) -> Result<TrackInfo> {
        let path = self.root.join(relative_path);
        let canonical = path
            .canonicalize()
            .map_err(|e| Error::NotFound(format!("{}: {}", path.display(), e)))?;
        let root = self
            .root
            .canonicalize()
            .map_err(|e| Error::Config(format!("library root: {}", e)))?;
        if !canonical.starts_with(&root) {
            return Err(Error::NotFound(format!(
                "{} is outside the library root",
                relative_path.display()
            )));
        }

        let (sample_rate, channels, duration_samples) = SymphoniaDecoder::probe_file(&canonical)?;
        let info = TrackInfo {
            track_id: Uuid::new_v4(),
            path: canonical,
            sample_rate,
            channels,
            duration_samples,
            source_signature: source_signature(&path)?,
        };

        info!(
            "registered track {} ({} Hz, {} ch, {} frames): {}",
            info.track_id, sample_rate, channels, duration_samples, path.display()
        );

        self.tracks
            .write()
            .expect("library lock poisoned")
            .insert(info.track_id, info.clone());
        Ok(info)
    }

    /// All registered tracks
    pub fn list(&self) -> Vec<TrackInfo> {
        self.tracks
            .read()
            .expect("library lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

impl TrackResolver for FileLibrary {
    fn resolve(&self, track_id: Uuid) -> Result<TrackInfo> {
        let mut info = self
            .tracks
            .read()
            .expect("library lock poisoned")
            .get(&track_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("track {}", track_id)))?;
        // Re-read the signature each resolve so file edits change cache keys
        info.source_signature = source_signature(&info.path)?;
        Ok(info)
    }
}

//! Crawl state checkpointing
//!
//! A checkpoint is a single JSON document holding the queued frontier, the
//! dedup fingerprints, and a counters snapshot. Writes go to a temp file in
//! the checkpoint directory and are renamed into place, so a crash never
//! leaves a torn checkpoint behind.

use crate::engine::{DedupSet, Frontier, Stats, StatsSnapshot};
use crate::url::Fingerprint;
use crate::{KumoError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default checkpoint directory, relative to the working directory
pub const DEFAULT_CHECKPOINT_DIR: &str = ".crawler_checkpoints";

const CHECKPOINT_FILE: &str = "checkpoint.json";
const CHECKPOINT_TMP: &str = "checkpoint.tmp";

/// One queued request as persisted in the checkpoint file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRequest {
    pub url: String,
    pub depth: u32,
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_url: Option<String>,
}

/// The serialized crawl state
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointData {
    pub timestamp: DateTime<Utc>,
    pub frontier_urls: Vec<CheckpointRequest>,
    pub seen_hashes: Vec<String>,
    pub stats: StatsSnapshot,
}

/// Saves and loads crawl state in a fixed directory
pub struct Checkpointer {
    dir: PathBuf,
}

impl Checkpointer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    /// Serializes the current crawl state to disk atomically
    ///
    /// The frontier is snapshotted non-destructively, so saving is safe
    /// while the crawl is running.
    pub fn save(&self, frontier: &Frontier, dedup: &DedupSet, stats: &Stats) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;

        let frontier_urls = frontier
            .snapshot()
            .into_iter()
            .map(|req| CheckpointRequest {
                url: req.url.to_string(),
                depth: req.depth,
                priority: req.priority,
                parent_url: req.parent_url,
            })
            .collect();

        let data = CheckpointData {
            timestamp: Utc::now(),
            frontier_urls,
            seen_hashes: dedup.export().iter().map(hex::encode).collect(),
            stats: stats.snapshot(),
        };

        let tmp_path = self.dir.join(CHECKPOINT_TMP);
        let file = std::fs::File::create(&tmp_path)?;
        serde_json::to_writer_pretty(file, &data)?;
        std::fs::rename(&tmp_path, self.file_path())?;

        Ok(())
    }

    /// Reads the checkpoint from disk
    ///
    /// Returns `Ok(None)` when no checkpoint exists.
    pub fn load(&self) -> Result<Option<CheckpointData>> {
        let path = self.file_path();
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let data: CheckpointData = serde_json::from_str(&content)
            .map_err(|e| KumoError::Checkpoint(format!("malformed checkpoint: {}", e)))?;
        Ok(Some(data))
    }

    /// Returns true if a checkpoint file exists
    pub fn has_checkpoint(&self) -> bool {
        self.file_path().exists()
    }

    /// Removes the checkpoint file, if present
    pub fn clean(&self) -> Result<()> {
        match std::fs::remove_file(self.file_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Path to the checkpoint directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Decodes a hex fingerprint from a checkpoint's `seen_hashes` entry
pub fn decode_fingerprint(hash: &str) -> Option<Fingerprint> {
    let bytes = hex::decode(hash).ok()?;
    bytes.try_into().ok()
}

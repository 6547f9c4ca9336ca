//! Short-hash generation and the flat-file note index.
//!
//! Every accepted note gets a deterministic short hash derived from its
//! recording id and timestamp: the SHA-256 of `"{id}-{timestamp}"`,
//! truncated to 7 hex chars and prefixed with `p-` (e.g. `p-a1b2c3d`).
//! Collisions are possible at that length but accepted as negligible for a
//! human-shareable reference.
//!
//! The index is an in-memory map keyed by hash, reconstructed from a JSON
//! file on startup and rewritten in full on every mutation. Storing an
//! existing hash overwrites the entry, never duplicates it.

use anyhow::{Context, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::{Bucket, Note, NoteMeta};

/// Hash prefix marking a memo reference.
const HASH_PREFIX: &str = "p-";
/// Hex chars kept from the full digest.
const HASH_LEN: usize = 7;
/// Max summary length stored in the index.
const SUMMARY_LEN: usize = 200;

/// Deterministic short hash for a `(recording_id, timestamp)` pair.
pub fn short_hash(recording_id: &str, timestamp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}-{}", recording_id, timestamp).as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}{}", HASH_PREFIX, &digest[..HASH_LEN])
}

/// Flat-file backed note index.
pub struct NoteIndex {
    path: PathBuf,
    entries: HashMap<String, NoteMeta>,
}

impl NoteIndex {
    /// Load the index from disk, or start empty if the file does not exist.
    pub fn load(path: &Path) -> Result<NoteIndex> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read note index: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse note index: {}", path.display()))?
        } else {
            HashMap::new()
        };

        Ok(NoteIndex {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a note's metadata. Idempotent per hash: re-storing overwrites.
    /// The full index is flushed to disk on every call.
    pub fn store(&mut self, note: &Note, bucket: Bucket) -> Result<NoteMeta> {
        let mut summary = note.summary.clone();
        if summary.len() > SUMMARY_LEN {
            summary = summary.chars().take(SUMMARY_LEN).collect();
        }

        let meta = NoteMeta {
            hash: note.hash.clone(),
            recording_id: note.recording_id.clone(),
            timestamp: note.timestamp,
            bucket,
            summary,
            created_at: Utc::now(),
        };

        self.entries.insert(meta.hash.clone(), meta.clone());
        self.flush()?;
        Ok(meta)
    }

    pub fn lookup(&self, hash: &str) -> Option<&NoteMeta> {
        self.entries.get(hash)
    }

    /// Case-insensitive substring search over summary and recording id,
    /// newest first.
    pub fn search(&self, query: &str, bucket: Option<Bucket>) -> Vec<NoteMeta> {
        let q = query.to_lowercase();
        let mut results: Vec<NoteMeta> = self
            .entries
            .values()
            .filter(|m| bucket.map_or(true, |b| m.bucket == b))
            .filter(|m| {
                m.summary.to_lowercase().contains(&q)
                    || m.recording_id.to_lowercase().contains(&q)
            })
            .cloned()
            .collect();

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results
    }

    /// Most recent notes, optionally filtered by bucket.
    pub fn recent(&self, limit: usize, bucket: Option<Bucket>) -> Vec<NoteMeta> {
        let mut results: Vec<NoteMeta> = self
            .entries
            .values()
            .filter(|m| bucket.map_or(true, |b| m.bucket == b))
            .cloned()
            .collect();

        results.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        results.truncate(limit);
        results
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to save note index: {}", self.path.display()))?;
        Ok(())
    }
}

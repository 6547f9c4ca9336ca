//! Manual review queue for unmatched notes.
//!
//! When a COMCAST note cannot be resolved to a CRM contact, the ingress
//! layer parks it here with a reason and a ranked list of suggested business
//! matches. An operator later assigns the note to a business or dismisses
//! it; both transitions are terminal. Entries are never auto-deleted.
//!
//! The queue persists as a JSON array rewritten in full on every mutation,
//! matching the posture of the note index.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::models::{
    Assignment, BusinessMatchCandidate, Note, ReviewEntry, ReviewReason, ReviewStatus, Visit,
};

/// Match-score weights. Additive; a candidate with score 0 is excluded.
const FULL_NAME_SCORE: u32 = 10;
const NAME_WORD_SCORE: u32 = 2;
const ZIP_SCORE: u32 = 3;
const ADDRESS_WORD_SCORE: u32 = 1;
/// Words this short are treated as stopwords when matching name/address.
const MIN_WORD_LEN: usize = 3;
/// Suggested matches are capped to the top N by score.
const MAX_SUGGESTIONS: usize = 5;

/// Counts by status, as returned by [`ReviewQueue::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub total: usize,
    pub pending: usize,
    pub assigned: usize,
    pub dismissed: usize,
}

/// Flat-file backed review queue.
pub struct ReviewQueue {
    path: PathBuf,
    entries: Vec<ReviewEntry>,
}

impl ReviewQueue {
    /// Load the queue from disk, or start empty if the file does not exist.
    pub fn load(path: &Path) -> Result<ReviewQueue> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read review queue: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse review queue: {}", path.display()))?
        } else {
            Vec::new()
        };

        Ok(ReviewQueue {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Enqueue a note for manual review with status `pending`.
    pub fn enqueue(
        &mut self,
        note: &Note,
        bucket: crate::models::Bucket,
        reason: ReviewReason,
        suggested_matches: Vec<BusinessMatchCandidate>,
    ) -> Result<ReviewEntry> {
        let entry = ReviewEntry {
            id: format!("review-{}", Uuid::new_v4()),
            hash: note.hash.clone(),
            recording_id: note.recording_id.clone(),
            timestamp: note.timestamp,
            summary: note.summary.clone(),
            transcription: note.transcription.clone(),
            bucket,
            reason,
            status: ReviewStatus::Pending,
            suggested_matches,
            assigned_to: None,
            assigned_at: None,
            created_at: Utc::now(),
        };

        self.entries.push(entry.clone());
        self.flush()?;

        println!("Added to review queue: {} ({:?})", entry.id, reason);
        Ok(entry)
    }

    /// Pending entries, oldest first.
    pub fn pending(&self) -> Vec<ReviewEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == ReviewStatus::Pending)
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&ReviewEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Does the note already have an open (pending) review entry?
    pub fn has_open_entry(&self, hash: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.hash == hash && e.status == ReviewStatus::Pending)
    }

    /// Assign a review entry to a business. Returns `None` for an unknown
    /// id. Re-assigning an already-resolved entry overwrites the assignment.
    pub fn assign(
        &mut self,
        review_id: &str,
        visit_id: &str,
        business_name: &str,
    ) -> Result<Option<ReviewEntry>> {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == review_id) else {
            return Ok(None);
        };

        entry.status = ReviewStatus::Assigned;
        entry.assigned_to = Some(Assignment {
            visit_id: visit_id.to_string(),
            business_name: business_name.to_string(),
        });
        entry.assigned_at = Some(Utc::now());

        let snapshot = entry.clone();
        self.flush()?;

        println!("Assigned note {} to {}", snapshot.hash, business_name);
        Ok(Some(snapshot))
    }

    /// Dismiss a review entry. Returns `None` for an unknown id.
    pub fn dismiss(&mut self, review_id: &str) -> Result<Option<ReviewEntry>> {
        let Some(entry) = self.entries.iter_mut().find(|e| e.id == review_id) else {
            return Ok(None);
        };

        entry.status = ReviewStatus::Dismissed;
        entry.assigned_at = Some(Utc::now());

        let snapshot = entry.clone();
        self.flush()?;

        println!("Dismissed review {}", review_id);
        Ok(Some(snapshot))
    }

    /// Entries assigned to a business, matched case-insensitively.
    /// `business` must already be lowercased.
    pub fn assigned_to_business(&self, business: &str) -> Vec<&ReviewEntry> {
        self.entries
            .iter()
            .filter(|e| {
                e.assigned_to
                    .as_ref()
                    .is_some_and(|a| a.business_name.to_lowercase() == business)
            })
            .collect()
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            total: self.entries.len(),
            pending: self.count(ReviewStatus::Pending),
            assigned: self.count(ReviewStatus::Assigned),
            dismissed: self.count(ReviewStatus::Dismissed),
        }
    }

    fn count(&self, status: ReviewStatus) -> usize {
        self.entries.iter().filter(|e| e.status == status).count()
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("Failed to save review queue: {}", self.path.display()))?;
        Ok(())
    }
}

/// Score visit candidates against a note's text.
///
/// Additive scoring: +10 for a full business-name substring match, +2 per
/// business-name word longer than 3 chars, +3 for a zip substring match,
/// +1 per address word longer than 3 chars. Zero-score candidates are
/// excluded; results are sorted descending and capped to the top 5.
pub fn find_matches(note: &Note, visits: &[Visit]) -> Vec<BusinessMatchCandidate> {
    let note_text = note.combined_text().to_lowercase();
    let mut matches = Vec::new();

    for visit in visits {
        if visit.business_name.is_empty() {
            continue;
        }

        let biz_name = visit.business_name.to_lowercase();
        let mut score = 0u32;
        let mut matched_fields = Vec::new();

        if note_text.contains(&biz_name) {
            score += FULL_NAME_SCORE;
            matched_fields.push("business_name".to_string());
        }

        for word in biz_name.split_whitespace().filter(|w| w.len() > MIN_WORD_LEN) {
            if note_text.contains(word) {
                score += NAME_WORD_SCORE;
                matched_fields.push(format!("name_word:{}", word));
            }
        }

        if let Some(zip) = &visit.zip {
            if !zip.is_empty() && note_text.contains(zip.as_str()) {
                score += ZIP_SCORE;
                matched_fields.push("zip".to_string());
            }
        }

        if let Some(address) = &visit.address {
            let addr = address.to_lowercase();
            for word in addr.split_whitespace().filter(|w| w.len() > MIN_WORD_LEN) {
                if note_text.contains(word) {
                    score += ADDRESS_WORD_SCORE;
                    matched_fields.push(format!("address_word:{}", word));
                }
            }
        }

        if score > 0 {
            matches.push(BusinessMatchCandidate {
                visit_id: visit.id.clone(),
                business_name: visit.business_name.clone(),
                address: visit.address.clone(),
                zip: visit.zip.clone(),
                score,
                matched_fields,
                crm_url: visit.crm_url.clone(),
            });
        }
    }

    matches.sort_by(|a, b| b.score.cmp(&a.score));
    matches.truncate(MAX_SUGGESTIONS);
    matches
}

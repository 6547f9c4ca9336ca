//! Core data models used throughout Memo Router.
//!
//! These types represent the notes, review entries, and action outcomes that
//! flow through the classification and routing pipeline. Wire and flat-file
//! representations use camelCase field names for compatibility with the
//! dashboards that read the persisted JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification outcome. Declaration order is significant: the classifier
/// iterates buckets in this order at every tier, so ties resolve to the
/// earlier-declared bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bucket {
    #[serde(rename = "PERSONAL")]
    Personal,
    #[serde(rename = "TTL")]
    Ttl,
    #[serde(rename = "COMCAST")]
    Comcast,
}

impl Bucket {
    /// All buckets in classification priority order.
    pub const ALL: [Bucket; 3] = [Bucket::Personal, Bucket::Ttl, Bucket::Comcast];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Personal => "PERSONAL",
            Bucket::Ttl => "TTL",
            Bucket::Comcast => "COMCAST",
        }
    }

    pub fn parse(s: &str) -> Option<Bucket> {
        match s.to_ascii_uppercase().as_str() {
            "PERSONAL" => Some(Bucket::Personal),
            "TTL" => Some(Bucket::Ttl),
            "COMCAST" => Some(Bucket::Comcast),
            _ => None,
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized voice-memo note, built from a webhook payload.
///
/// Immutable once the hash is computed; the hash is derived from
/// `(recording_id, timestamp)` so re-delivery of the same event maps to the
/// same index slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub recording_id: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub transcription: String,
    pub hash: String,
    pub source: String,
}

impl Note {
    /// Summary and transcription joined with a single space, the text every
    /// classifier tier and extractor operates on.
    pub fn combined_text(&self) -> String {
        format!("{} {}", self.summary, self.transcription)
    }
}

/// Index record persisted for each stored note.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMeta {
    pub hash: String,
    pub recording_id: String,
    pub timestamp: DateTime<Utc>,
    pub bucket: Bucket,
    /// First 200 chars of the summary.
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Why a note landed in the review queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewReason {
    NoMatch,
    LowConfidence,
    MultipleMatches,
    Error,
}

/// Review lifecycle. `Assigned` and `Dismissed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewStatus {
    Pending,
    Assigned,
    Dismissed,
}

/// Manual assignment of a review entry to a business.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub visit_id: String,
    pub business_name: String,
}

/// A queued note that could not be matched to a CRM record automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEntry {
    pub id: String,
    pub hash: String,
    pub recording_id: String,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub transcription: String,
    pub bucket: Bucket,
    pub reason: ReviewReason,
    pub status: ReviewStatus,
    pub suggested_matches: Vec<BusinessMatchCandidate>,
    pub assigned_to: Option<Assignment>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A prior territory visit, used as the candidate pool for fuzzy business
/// matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visit {
    pub id: String,
    pub business_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub crm_url: Option<String>,
}

/// A scored business match for a review entry. Ephemeral: computed per
/// review, persisted only as part of the owning [`ReviewEntry`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessMatchCandidate {
    pub visit_id: String,
    pub business_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    pub score: u32,
    pub matched_fields: Vec<String>,
    #[serde(default)]
    pub crm_url: Option<String>,
}

/// A CRM contact reference returned by a contact search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRef {
    pub id: String,
    pub name: String,
}

/// Interest tier detected in COMCAST content. Tiers are mutually exclusive;
/// the first matching tier wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterestLevel {
    #[serde(rename = "Hot Lead")]
    Hot,
    #[serde(rename = "Warm Lead")]
    Warm,
    #[serde(rename = "Cold Lead")]
    Cold,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl InterestLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestLevel::Hot => "Hot Lead",
            InterestLevel::Warm => "Warm Lead",
            InterestLevel::Cold => "Cold Lead",
            InterestLevel::Unknown => "Unknown",
        }
    }
}

/// Outcome of a single attempted side effect. Each effect succeeds or fails
/// independently; a failed effect never fails the whole request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectOutcome {
    pub effect: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EffectOutcome {
    pub fn ok(effect: &str, detail: impl Into<String>) -> Self {
        EffectOutcome {
            effect: effect.to_string(),
            success: true,
            detail: Some(detail.into()),
            error: None,
        }
    }

    pub fn failed(effect: &str, error: impl Into<String>) -> Self {
        EffectOutcome {
            effect: effect.to_string(),
            success: false,
            detail: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate outcome of a bucket handler. Partial success is the normal
/// terminal state: callers inspect `effects` per side effect rather than a
/// single boolean.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub bucket: Bucket,
    pub effects: Vec<EffectOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactRef>,
    /// Set by the COMCAST handler when no CRM contact matched; the ingress
    /// layer reacts by enqueueing a review entry.
    #[serde(default)]
    pub needs_review: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headline: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub packages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interest: Option<InterestLevel>,
}

impl ActionResult {
    pub fn new(bucket: Bucket) -> Self {
        ActionResult {
            bucket,
            effects: Vec::new(),
            contact: None,
            needs_review: false,
            headline: None,
            client_name: None,
            business_name: None,
            address: None,
            packages: Vec::new(),
            interest: None,
        }
    }

    /// Labels of the effects that succeeded, in attempt order.
    pub fn completed_effects(&self) -> Vec<String> {
        self.effects
            .iter()
            .filter(|e| e.success)
            .map(|e| e.effect.clone())
            .collect()
    }
}

//! PERSONAL bucket handler.
//!
//! Extracts an actionable headline from the memo text, then raises a
//! reminder and a notification message through the [`Notifier`] port and
//! appends the note to the daily journal.
//!
//! [`Notifier`]: crate::notify::Notifier

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{ActionResult, Bucket, EffectOutcome, Note};

use super::{truncate, HandlerContext};

/// Ordered action-phrase patterns. The first match of the first matching
/// pattern becomes the headline; reordering changes output.
static ACTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(remind me to|remember to|don't forget to|need to|should|must)\s+(.+?)(?:\.|\n|$)",
        r"\b(call|text|email|message|reach out to)\s+(.+?)(?:\.|\n|$)",
        r"\b(buy|get|pick up|order)\s+(.+?)(?:\.|\n|$)",
        r"\b(schedule|book|make an? appointment|set up)\s+(.+?)(?:\.|\n|$)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// Default headline when no action phrase matches.
const DEFAULT_HEADLINE: &str = "Review voice memo";

/// Extract the actionable headline from the combined text: the first match
/// across the ordered pattern list, or the default.
pub fn extract_actionable(summary: &str, transcription: &str) -> String {
    let combined = format!("{} {}", summary, transcription).to_lowercase();

    for pattern in ACTION_PATTERNS.iter() {
        if let Some(m) = pattern.find(&combined) {
            let action = m.as_str().trim().trim_end_matches('.').trim();
            if !action.is_empty() {
                return action.to_string();
            }
        }
    }

    DEFAULT_HEADLINE.to_string()
}

pub async fn handle(ctx: &HandlerContext, note: &Note) -> ActionResult {
    let mut result = ActionResult::new(Bucket::Personal);

    let headline = extract_actionable(&note.summary, &note.transcription);
    result.headline = Some(headline.clone());

    let body = if note.summary.is_empty() {
        &note.transcription
    } else {
        &note.summary
    };
    let reminder_notes = format!("From recording ({}):\n\n{}", note.recording_id, body);

    match ctx.notifier.create_reminder(&headline, &reminder_notes).await {
        Ok(detail) => result.effects.push(EffectOutcome::ok("reminder", detail)),
        Err(e) => {
            eprintln!("Failed to create reminder: {:#}", e);
            result
                .effects
                .push(EffectOutcome::failed("reminder", e.to_string()));
        }
    }

    let target = ctx
        .config
        .notify
        .target
        .clone()
        .unwrap_or_else(|| "operator".to_string());
    let message = format!("Voice Memo: {}\n\n{}", headline, truncate(body, 200));

    match ctx.notifier.send_message(&target, &message).await {
        Ok(detail) => result.effects.push(EffectOutcome::ok("message", detail)),
        Err(e) => {
            eprintln!("Failed to send message: {:#}", e);
            result
                .effects
                .push(EffectOutcome::failed("message", e.to_string()));
        }
    }

    let actions: Vec<String> = std::iter::once("Processed via PERSONAL bucket".to_string())
        .chain(result.completed_effects().into_iter().map(|e| match e.as_str() {
            "reminder" => "Created reminder".to_string(),
            "message" => "Sent notification".to_string(),
            other => other.to_string(),
        }))
        .collect();

    match ctx.journal.append(Bucket::Personal, note, &[], &actions) {
        Ok(path) => result
            .effects
            .push(EffectOutcome::ok("journal", path.display().to_string())),
        Err(e) => {
            eprintln!("Failed to write journal: {:#}", e);
            result
                .effects
                .push(EffectOutcome::failed("journal", e.to_string()));
        }
    }

    result
}

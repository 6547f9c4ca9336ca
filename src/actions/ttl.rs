//! TTL bucket handler (consulting business operations).
//!
//! Decides whether the memo is actionable, extracts the client name and a
//! due date, then attaches a note to the matching CRM contact and creates a
//! follow-up task when actionable.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::crm::TaskSpec;
use crate::models::{ActionResult, Bucket, EffectOutcome, Note};

use super::{crm_note_body, truncate, HandlerContext};

/// Any match makes the memo actionable.
static ACTION_TRIGGERS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\b(follow up|followup|follow-up)\b",
        r"(?i)\b(call|email|text|reach out|contact)\s+(back|them|client|trina)",
        r"(?i)\b(schedule|book|set up|arrange)\s+(a?\s?meeting|call|appointment)",
        r"(?i)\b(send|draft|prepare|create)\s+(proposal|contract|invoice|email)",
        r"(?i)\b(need to|should|must|have to)\s+\w+",
        r"(?i)\b(don't forget|remember to|remind me)\b",
        r"(?i)\b(urgent|asap|priority|important)\b",
        r"(?i)\b(today|tomorrow|this week|by|deadline|due)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

/// "with/from/about/for <Capitalized Name>", one or two capitalized words.
static CLIENT_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:with|from|about|for)\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)?)").unwrap()
});

static DUE_TODAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\btoday\b").unwrap());
static DUE_TOMORROW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\btomorrow\b").unwrap());
static DUE_THIS_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bthis week\b").unwrap());
static DUE_BY_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:by|on|before)\s+(monday|tuesday|wednesday|thursday|friday|saturday|sunday|\d{1,2}[/-]\d{1,2})",
    )
    .unwrap()
});

/// Whether the memo content warrants a follow-up task.
pub fn is_actionable(summary: &str, transcription: &str) -> bool {
    let combined = format!("{} {}", summary, transcription).to_lowercase();
    ACTION_TRIGGERS.iter().any(|p| p.is_match(&combined))
}

/// Extract the client name: the capture of the with/from/about/for pattern,
/// with a configured literal override checked afterwards.
pub fn extract_client_name(
    summary: &str,
    transcription: &str,
    override_first: Option<&str>,
    override_full: Option<&str>,
) -> Option<String> {
    let combined = format!("{} {}", summary, transcription);

    if let Some(caps) = CLIENT_NAME.captures(&combined) {
        return Some(caps[1].to_string());
    }

    if let (Some(first), Some(full)) = (override_first, override_full) {
        let pattern = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(first))).ok()?;
        if pattern.is_match(&combined) {
            return Some(full.to_string());
        }
    }

    None
}

/// Compute a due date from content keywords.
///
/// today → +0d, tomorrow → +1d, "this week" → the Friday of the current
/// week, "by/on/before <weekday-or-date>" → a fixed +2d, otherwise +3d.
pub fn extract_due_date(summary: &str, transcription: &str, now: DateTime<Utc>) -> NaiveDate {
    let combined = format!("{} {}", summary, transcription).to_lowercase();
    let today = now.date_naive();

    if DUE_TODAY.is_match(&combined) {
        return today;
    }

    if DUE_TOMORROW.is_match(&combined) {
        return today + Duration::days(1);
    }

    if DUE_THIS_WEEK.is_match(&combined) {
        // Friday of the current week, counting from Sunday.
        let offset = 5 - today.weekday().num_days_from_sunday() as i64;
        return today + Duration::days(offset);
    }

    if DUE_BY_DATE.is_match(&combined) {
        // TODO: resolve the matched weekday/date token to a real date
        // instead of this fixed two-day offset.
        return today + Duration::days(2);
    }

    today + Duration::days(3)
}

pub async fn handle(ctx: &HandlerContext, note: &Note) -> ActionResult {
    let mut result = ActionResult::new(Bucket::Ttl);

    let over = ctx.config.handlers.ttl_client_override.as_ref();
    let client_name = extract_client_name(
        &note.summary,
        &note.transcription,
        over.map(|o| o.first_name.as_str()),
        over.map(|o| o.full_name.as_str()),
    );
    println!("Detected client: {}", client_name.as_deref().unwrap_or("Unknown"));
    result.client_name = client_name.clone();

    // Search for the named client, falling back to the configured contact.
    let mut contact = None;
    if let Some(name) = &client_name {
        match ctx.crm.search_contact(name).await {
            Ok(found) => contact = found,
            Err(e) => eprintln!("CRM search failed: {:#}", e),
        }
    }
    if contact.is_none() {
        match ctx
            .crm
            .search_contact(&ctx.config.handlers.ttl_fallback_contact)
            .await
        {
            Ok(found) => contact = found,
            Err(e) => eprintln!("CRM fallback search failed: {:#}", e),
        }
    }

    if let Some(contact) = &contact {
        result.effects.push(EffectOutcome::ok("contact_search", contact.name.clone()));

        match ctx.crm.add_note(&contact.id, &crm_note_body(note, &[])).await {
            Ok(()) => result.effects.push(EffectOutcome::ok("crm_note", &contact.id)),
            Err(e) => {
                eprintln!("Failed to add CRM note: {:#}", e);
                result
                    .effects
                    .push(EffectOutcome::failed("crm_note", e.to_string()));
            }
        }

        if is_actionable(&note.summary, &note.transcription) {
            let due_date = extract_due_date(&note.summary, &note.transcription, Utc::now());
            let title = if note.summary.trim().is_empty() {
                "Follow up on voice memo".to_string()
            } else {
                truncate(&note.summary, 100)
            };
            let task = TaskSpec {
                title,
                description: format!(
                    "From recording: {}\n\n{}",
                    note.recording_id, note.summary
                ),
                due_date,
                priority: None,
            };

            match ctx.crm.create_task(&contact.id, &task).await {
                Ok(task_id) => result.effects.push(EffectOutcome::ok("crm_task", task_id)),
                Err(e) => {
                    eprintln!("Failed to create CRM task: {:#}", e);
                    result
                        .effects
                        .push(EffectOutcome::failed("crm_task", e.to_string()));
                }
            }
        } else {
            println!("Content not actionable, skipping task creation");
        }
    } else {
        println!("No contact found - note will need manual entry");
        result
            .effects
            .push(EffectOutcome::failed("contact_search", "no contact found"));
    }

    result.contact = contact;

    let mut actions = vec!["Processed via TTL bucket".to_string()];
    if result.effects.iter().any(|e| e.effect == "crm_note" && e.success) {
        actions.push("Added note to CRM".to_string());
    }
    if result.effects.iter().any(|e| e.effect == "crm_task" && e.success) {
        actions.push("Created follow-up task".to_string());
    }

    match ctx.journal.append(Bucket::Ttl, note, &[], &actions) {
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

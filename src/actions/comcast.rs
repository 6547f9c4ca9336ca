//! COMCAST bucket handler (sales territory work).
//!
//! Extracts the business name and address, classifies package interest,
//! then attaches a note to the matching CRM contact and creates a
//! priority-scaled follow-up task unless the lead is cold. When no contact
//! matches, the handler reports `needs_review` and the ingress layer takes
//! over (candidate matching + review queue); the handler itself never
//! enqueues.

use chrono::{Duration, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::crm::TaskSpec;
use crate::models::{ActionResult, Bucket, EffectOutcome, InterestLevel, Note};

use super::{crm_note_body, HandlerContext};

/// Package-type patterns. Unlike interest tiers, multiple tags may co-occur.
static PACKAGE_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("Triple Play", r"(?i)\b(triple play|all three|internet.*tv.*phone|bundle)\b"),
        ("Double Play", r"(?i)\b(double play|internet.*tv|tv.*internet|two services)\b"),
        ("Internet Only", r"(?i)\b(just internet|internet only|single play|only internet)\b"),
        ("TV Only", r"(?i)\b(just tv|tv only|television only|cable only)\b"),
        ("Phone Only", r"(?i)\b(just phone|phone only|voice only|business phone)\b"),
        ("Gigabit", r"(?i)\b(gigabit|gig|1gb|high speed|fast internet)\b"),
        ("Business Internet", r"(?i)\b(business internet|b2b internet|commercial internet)\b"),
    ]
    .iter()
    .map(|(name, p)| (*name, Regex::new(p).unwrap()))
    .collect()
});

/// Interest tiers, mutually exclusive, first match wins.
static INTEREST_TIERS: LazyLock<Vec<(InterestLevel, Regex)>> = LazyLock::new(|| {
    [
        (
            InterestLevel::Hot,
            r"(?i)\b(interested|want|ready|sign up|yes|definitely|absolutely|lets do it)\b",
        ),
        (
            InterestLevel::Warm,
            r"(?i)\b(considering|thinking about|maybe|possibly|price|cost|how much)\b",
        ),
        (
            InterestLevel::Cold,
            r"(?i)\b(not interested|no|already have|under contract|maybe later)\b",
        ),
    ]
    .iter()
    .map(|(level, p)| (*level, Regex::new(p).unwrap()))
    .collect()
});

/// Ordered business-name extractors; the first capture wins. The leading
/// verb matches case-insensitively so a sentence-initial "Visited" still
/// yields the bare business name instead of a verb-prefixed capture from a
/// later pattern.
static BUSINESS_NAME_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i:at|visited|stopped by|saw)\s+([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*(?:\s+(?:Pizza|Cafe|Restaurant|Shop|Store|Salon|Dental|Auto|Repair|LLC|Inc|Co)))",
        r"\b([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*\s+(?:on|at|near)\s+\d+(?:th|st|nd|rd)?\s+(?:Ave|St|Blvd|Way|Dr))\b",
        r"\b([A-Z][a-zA-Z]+(?:\s+[A-Z][a-zA-Z]+)*(?:\s+Pizza|\s+Cafe|\s+Restaurant|\s+Shop))\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static STREET_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+\s+[A-Za-z]+(?:\s+[A-Za-z]+)*\s+(?:Ave|St|Blvd|Way|Dr|Rd|Ln|Ct))\b")
        .unwrap()
});

static CROSS_STREET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(corner of|intersection of)\s+([A-Za-z]+\s+(?:and|&)\s+[A-Za-z]+)").unwrap()
});

/// Detected package mentions plus the interest tier.
#[derive(Debug, Clone)]
pub struct PackageInfo {
    pub packages: Vec<String>,
    pub interest: InterestLevel,
}

pub fn extract_package_mentions(summary: &str, transcription: &str) -> PackageInfo {
    let combined = format!("{} {}", summary, transcription).to_lowercase();

    let packages = PACKAGE_PATTERNS
        .iter()
        .filter(|(_, p)| p.is_match(&combined))
        .map(|(name, _)| name.to_string())
        .collect();

    let interest = INTEREST_TIERS
        .iter()
        .find(|(_, p)| p.is_match(&combined))
        .map(|(level, _)| *level)
        .unwrap_or(InterestLevel::Unknown);

    PackageInfo { packages, interest }
}

pub fn extract_business_name(summary: &str, transcription: &str) -> Option<String> {
    let combined = format!("{} {}", summary, transcription);
    BUSINESS_NAME_PATTERNS
        .iter()
        .find_map(|p| p.captures(&combined))
        .map(|caps| caps[1].trim().to_string())
}

pub fn extract_address(summary: &str, transcription: &str) -> Option<String> {
    let combined = format!("{} {}", summary, transcription);

    if let Some(caps) = STREET_ADDRESS.captures(&combined) {
        return Some(caps[1].to_string());
    }

    CROSS_STREET
        .captures(&combined)
        .map(|caps| caps[0].to_string())
}

pub async fn handle(ctx: &HandlerContext, note: &Note) -> ActionResult {
    let mut result = ActionResult::new(Bucket::Comcast);

    let business_name = extract_business_name(&note.summary, &note.transcription);
    let address = extract_address(&note.summary, &note.transcription);
    println!("Business: {}", business_name.as_deref().unwrap_or("Unknown"));
    println!("Address: {}", address.as_deref().unwrap_or("Unknown"));

    let package_info = extract_package_mentions(&note.summary, &note.transcription);
    println!(
        "Packages: {} | Interest: {}",
        package_info.packages.join(", "),
        package_info.interest.as_str()
    );

    result.business_name = business_name.clone();
    result.address = address.clone();
    result.packages = package_info.packages.clone();
    result.interest = Some(package_info.interest);

    // Search by business name, falling back to the address.
    let query = business_name.as_deref().or(address.as_deref());
    let mut contact = None;
    if let Some(query) = query {
        match ctx.crm.search_contact(query).await {
            Ok(found) => contact = found,
            Err(e) => eprintln!("CRM search failed: {:#}", e),
        }
    }

    if let Some(contact) = &contact {
        result
            .effects
            .push(EffectOutcome::ok("contact_search", contact.name.clone()));

        let extra = vec![
            (
                "Packages Mentioned".to_string(),
                if package_info.packages.is_empty() {
                    "None".to_string()
                } else {
                    package_info.packages.join(", ")
                },
            ),
            (
                "Interest Level".to_string(),
                package_info.interest.as_str().to_string(),
            ),
        ];

        match ctx.crm.add_note(&contact.id, &crm_note_body(note, &extra)).await {
            Ok(()) => result.effects.push(EffectOutcome::ok("crm_note", &contact.id)),
            Err(e) => {
                eprintln!("Failed to add CRM note: {:#}", e);
                result
                    .effects
                    .push(EffectOutcome::failed("crm_note", e.to_string()));
            }
        }

        if package_info.interest != InterestLevel::Cold {
            let (priority, due_days) = if package_info.interest == InterestLevel::Hot {
                ("high", 1)
            } else {
                ("medium", 3)
            };

            let task = TaskSpec {
                title: format!(
                    "[Comcast] Follow up - {}",
                    if package_info.packages.is_empty() {
                        "General inquiry".to_string()
                    } else {
                        package_info.packages.join(", ")
                    }
                ),
                description: format!(
                    "From recording: {}\n\n**Summary:**\n{}\n\n**Packages Mentioned:** {}\n**Interest Level:** {}",
                    note.recording_id,
                    if note.summary.trim().is_empty() { "N/A" } else { &note.summary },
                    if package_info.packages.is_empty() {
                        "None".to_string()
                    } else {
                        package_info.packages.join(", ")
                    },
                    package_info.interest.as_str(),
                ),
                due_date: Utc::now().date_naive() + Duration::days(due_days),
                priority: Some(priority.to_string()),
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
            println!("Cold lead, skipping follow-up task");
        }
    } else {
        println!("No contact found - flagging for review");
        result
            .effects
            .push(EffectOutcome::failed("contact_search", "no contact found"));
        result.needs_review = true;
    }

    result.contact = contact;

    let mut extra = Vec::new();
    extra.push((
        "Business".to_string(),
        result.business_name.clone().unwrap_or_else(|| "Unknown".to_string()),
    ));
    extra.push((
        "Address".to_string(),
        result.address.clone().unwrap_or_else(|| "Unknown".to_string()),
    ));
    extra.push((
        "Packages Mentioned".to_string(),
        if result.packages.is_empty() {
            "None".to_string()
        } else {
            result.packages.join(", ")
        },
    ));
    extra.push((
        "Interest Level".to_string(),
        package_info.interest.as_str().to_string(),
    ));

    let mut actions = vec!["Processed via COMCAST bucket".to_string()];
    if result.effects.iter().any(|e| e.effect == "crm_note" && e.success) {
        actions.push("Added note to CRM".to_string());
    }
    if result.effects.iter().any(|e| e.effect == "crm_task" && e.success) {
        actions.push("Created follow-up task".to_string());
    }

    match ctx.journal.append(Bucket::Comcast, note, &extra, &actions) {
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

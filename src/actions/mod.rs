//! Bucket action handlers.
//!
//! Each bucket has a handler consuming a classified [`Note`] and producing
//! an [`ActionResult`]: a list of independently attempted side effects.
//! Handlers never fail the request; a downstream error (CRM, notifier,
//! journal) is caught at the call site and recorded as a failed effect.
//!
//! | Bucket | Side effects |
//! |--------|--------------|
//! | PERSONAL | reminder, message, journal |
//! | TTL | CRM note, conditional CRM task, journal |
//! | COMCAST | CRM note, priority-scaled CRM task, journal; no-match is signalled to the ingress |

pub mod comcast;
pub mod personal;
pub mod ttl;

use std::sync::Arc;

use crate::config::Config;
use crate::crm::CrmClient;
use crate::journal::Journal;
use crate::models::{ActionResult, Bucket, Note};
use crate::notify::Notifier;

/// Shared dependencies injected into every handler.
pub struct HandlerContext {
    pub config: Arc<Config>,
    pub crm: Arc<dyn CrmClient>,
    pub notifier: Arc<dyn Notifier>,
    pub journal: Journal,
}

impl HandlerContext {
    /// Build the context from config, wiring the configured CRM and
    /// notifier backends.
    pub fn from_config(config: Arc<Config>) -> anyhow::Result<HandlerContext> {
        let crm = crate::crm::build_crm(&config)?;
        let notifier = crate::notify::build_notifier(&config)?;
        let journal = Journal::new(&config.journal.dir);
        Ok(HandlerContext {
            config,
            crm,
            notifier,
            journal,
        })
    }

    /// Build a context with explicit ports. Used by tests and the CLI
    /// testers.
    pub fn with_ports(
        config: Arc<Config>,
        crm: Arc<dyn CrmClient>,
        notifier: Arc<dyn Notifier>,
        journal: Journal,
    ) -> HandlerContext {
        HandlerContext {
            config,
            crm,
            notifier,
            journal,
        }
    }
}

/// Route a classified note to its bucket handler.
pub async fn dispatch(ctx: &HandlerContext, bucket: Bucket, note: &Note) -> ActionResult {
    println!("Processing {} bucket...", bucket);
    match bucket {
        Bucket::Personal => personal::handle(ctx, note).await,
        Bucket::Ttl => ttl::handle(ctx, note).await,
        Bucket::Comcast => comcast::handle(ctx, note).await,
    }
}

/// CRM note body shared by the TTL and COMCAST handlers: summary, truncated
/// transcription, and recording metadata, with optional extra rows.
pub(crate) fn crm_note_body(note: &Note, extra: &[(String, String)]) -> String {
    let transcription = if note.transcription.trim().is_empty() {
        "N/A".to_string()
    } else if note.transcription.len() > 2000 {
        let head: String = note.transcription.chars().take(2000).collect();
        format!("{}...", head)
    } else {
        note.transcription.clone()
    };

    let mut body = format!(
        "**Voice Memo**\n\n**Summary:**\n{}\n\n**Transcription:**\n{}\n\n",
        if note.summary.trim().is_empty() {
            "N/A"
        } else {
            &note.summary
        },
        transcription
    );

    for (key, value) in extra {
        body.push_str(&format!("**{}:** {}\n", key, value));
    }

    body.push_str(&format!(
        "\n**Recording ID:** {}\n**Timestamp:** {}\n\n---\n*Added automatically via memo integration*",
        note.recording_id,
        note.timestamp.to_rfc3339()
    ));

    body
}

/// Truncate to a char limit with an ellipsis marker.
pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

//! Notification port.
//!
//! The PERSONAL handler raises two host-visible side effects: a reminder
//! and a message. The concrete delivery mechanism is host-specific, so both
//! run through the [`Notifier`] port with three backends:
//!
//! - `log` — prints the payload; the default and the dry-run backend.
//! - `command` — spawns a configured program with positional arguments
//!   (`reminder <title> <notes>` / `message <target> <body>`).
//! - `webhook` — POSTs a JSON body to a configured endpoint.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use crate::config::Config;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Create a reminder. Returns a short human-readable confirmation.
    async fn create_reminder(&self, title: &str, notes: &str) -> Result<String>;

    /// Send a message to a recipient.
    async fn send_message(&self, target: &str, message: &str) -> Result<String>;
}

/// Prints notifications instead of delivering them.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn create_reminder(&self, title: &str, notes: &str) -> Result<String> {
        println!("Reminder: {}", title);
        if !notes.is_empty() {
            println!("  {}", notes.lines().next().unwrap_or(""));
        }
        Ok("logged".to_string())
    }

    async fn send_message(&self, target: &str, message: &str) -> Result<String> {
        println!("Message to {}: {}", target, message.lines().next().unwrap_or(""));
        Ok("logged".to_string())
    }
}

/// Spawns a configured program per notification. The program's exit status
/// decides success; stdout is returned as the confirmation.
pub struct CommandNotifier {
    program: String,
}

impl CommandNotifier {
    pub fn new(program: String) -> CommandNotifier {
        CommandNotifier { program }
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .output()
            .await
            .with_context(|| format!("Failed to spawn notifier command: {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "notifier command exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[async_trait]
impl Notifier for CommandNotifier {
    async fn create_reminder(&self, title: &str, notes: &str) -> Result<String> {
        self.run(&["reminder", title, notes]).await
    }

    async fn send_message(&self, target: &str, message: &str) -> Result<String> {
        self.run(&["message", target, message]).await
    }
}

/// POSTs notifications to an HTTP endpoint (push relay, chat bridge).
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout_secs: u64) -> Result<WebhookNotifier> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build notifier HTTP client")?;
        Ok(WebhookNotifier { client, url })
    }

    async fn post(&self, body: serde_json::Value) -> Result<String> {
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .context("Notification request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("notification endpoint returned {}", response.status());
        }

        Ok("delivered".to_string())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn create_reminder(&self, title: &str, notes: &str) -> Result<String> {
        self.post(json!({ "kind": "reminder", "title": title, "notes": notes }))
            .await
    }

    async fn send_message(&self, target: &str, message: &str) -> Result<String> {
        self.post(json!({ "kind": "message", "target": target, "message": message }))
            .await
    }
}

pub fn build_notifier(config: &Config) -> Result<std::sync::Arc<dyn Notifier>> {
    match config.notify.backend.as_str() {
        "log" => Ok(std::sync::Arc::new(LogNotifier)),
        "command" => {
            let program = config
                .notify
                .command
                .clone()
                .context("notify.command must be set for the command backend")?;
            Ok(std::sync::Arc::new(CommandNotifier::new(program)))
        }
        "webhook" => {
            let url = config
                .notify
                .url
                .clone()
                .context("notify.url must be set for the webhook backend")?;
            Ok(std::sync::Arc::new(WebhookNotifier::new(
                url,
                config.crm.timeout_secs,
            )?))
        }
        other => anyhow::bail!("Unknown notify backend: '{}'", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        let n = LogNotifier;
        assert_eq!(n.create_reminder("Call dentist", "notes").await.unwrap(), "logged");
        assert_eq!(n.send_message("+15550001111", "hi").await.unwrap(), "logged");
    }

    #[tokio::test]
    async fn command_notifier_reports_spawn_failure() {
        let n = CommandNotifier::new("/nonexistent/notifier".to_string());
        let err = n.create_reminder("t", "n").await.unwrap_err();
        assert!(err.to_string().contains("Failed to spawn"));
    }
}

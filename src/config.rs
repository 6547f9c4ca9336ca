use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub data: DataConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub crm: CrmConfig,
    #[serde(default)]
    pub visits: VisitsConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub journal: JournalConfig,
    #[serde(default)]
    pub handlers: HandlersConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Directory holding the note index and review queue flat files.
    pub dir: PathBuf,
}

impl DataConfig {
    pub fn index_file(&self) -> PathBuf {
        self.dir.join("note-index.json")
    }

    pub fn queue_file(&self) -> PathBuf {
        self.dir.join("review-queue.json")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
    /// Shared secret checked against the `x-webhook-secret` header.
    /// When unset, all requests pass.
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_rate_limit_requests")]
    pub rate_limit_requests: usize,
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
}

fn default_rate_limit_requests() -> usize {
    10
}
fn default_rate_limit_window_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrmConfig {
    #[serde(default = "default_crm_base_url")]
    pub base_url: String,
    /// API token. Falls back to the `MEMO_CRM_TOKEN` environment variable.
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub location_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// When true, CRM calls are not sent; side effects resolve as logged
    /// no-ops. Used by the CLI testers and offline setups.
    #[serde(default)]
    pub disabled: bool,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            base_url: default_crm_base_url(),
            token: None,
            location_id: None,
            timeout_secs: default_timeout_secs(),
            disabled: true,
        }
    }
}

fn default_crm_base_url() -> String {
    "https://services.leadconnectorhq.com".to_string()
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct VisitsConfig {
    /// JSON file holding the visit candidate pool.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// HTTP endpoint returning the candidate pool; takes precedence over
    /// `path` when both are set.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    /// Backend: `log`, `command`, or `webhook`.
    #[serde(default = "default_notify_backend")]
    pub backend: String,
    /// Program invoked by the command backend, e.g. an osascript wrapper.
    #[serde(default)]
    pub command: Option<String>,
    /// Endpoint for the webhook backend.
    #[serde(default)]
    pub url: Option<String>,
    /// Message recipient passed through to the backend.
    #[serde(default)]
    pub target: Option<String>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            backend: default_notify_backend(),
            command: None,
            url: None,
            target: None,
        }
    }
}

fn default_notify_backend() -> String {
    "log".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct JournalConfig {
    #[serde(default = "default_journal_dir")]
    pub dir: PathBuf,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            dir: default_journal_dir(),
        }
    }
}

fn default_journal_dir() -> PathBuf {
    PathBuf::from("./journal")
}

#[derive(Debug, Deserialize, Clone)]
pub struct HandlersConfig {
    /// Contact searched when the TTL handler finds no client name match.
    #[serde(default = "default_fallback_contact")]
    pub ttl_fallback_contact: String,
    /// Literal client-name override: when this first name appears in the
    /// text, the full name is used as the client.
    #[serde(default)]
    pub ttl_client_override: Option<ClientOverride>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClientOverride {
    pub first_name: String,
    pub full_name: String,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            ttl_fallback_contact: default_fallback_contact(),
            ttl_client_override: Some(ClientOverride {
                first_name: "Trina".to_string(),
                full_name: "Trina Fallardo".to_string(),
            }),
        }
    }
}

fn default_fallback_contact() -> String {
    "Trina".to_string()
}

impl Config {
    /// Minimal in-memory config for one-shot CLI commands that never touch
    /// the network.
    pub fn minimal() -> Config {
        Config {
            data: DataConfig {
                dir: PathBuf::from("./data"),
            },
            server: ServerConfig {
                bind: "127.0.0.1:7410".to_string(),
                webhook_secret: None,
                rate_limit_requests: default_rate_limit_requests(),
                rate_limit_window_secs: default_rate_limit_window_secs(),
            },
            crm: CrmConfig::default(),
            visits: VisitsConfig::default(),
            notify: NotifyConfig::default(),
            journal: JournalConfig::default(),
            handlers: HandlersConfig::default(),
        }
    }

    /// Resolved CRM token: config value first, then `MEMO_CRM_TOKEN`.
    pub fn crm_token(&self) -> Option<String> {
        self.crm
            .token
            .clone()
            .or_else(|| std::env::var("MEMO_CRM_TOKEN").ok())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.server.rate_limit_requests == 0 {
        anyhow::bail!("server.rate_limit_requests must be > 0");
    }

    if config.server.rate_limit_window_secs == 0 {
        anyhow::bail!("server.rate_limit_window_secs must be > 0");
    }

    if config.crm.timeout_secs == 0 {
        anyhow::bail!("crm.timeout_secs must be > 0");
    }

    match config.notify.backend.as_str() {
        "log" => {}
        "command" => {
            if config.notify.command.is_none() {
                anyhow::bail!("notify.command must be set when backend is 'command'");
            }
        }
        "webhook" => {
            if config.notify.url.is_none() {
                anyhow::bail!("notify.url must be set when backend is 'webhook'");
            }
        }
        other => anyhow::bail!(
            "Unknown notify backend: '{}'. Must be log, command, or webhook.",
            other
        ),
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("memo.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (tmp, path)
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let (_tmp, path) = write_config(
            r#"
[data]
dir = "./data"

[server]
bind = "127.0.0.1:7410"
"#,
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.server.rate_limit_requests, 10);
        assert_eq!(cfg.server.rate_limit_window_secs, 60);
        assert_eq!(cfg.notify.backend, "log");
        assert!(cfg.crm.disabled);
        assert_eq!(cfg.handlers.ttl_fallback_contact, "Trina");
    }

    #[test]
    fn command_backend_requires_command() {
        let (_tmp, path) = write_config(
            r#"
[data]
dir = "./data"

[server]
bind = "127.0.0.1:7410"

[notify]
backend = "command"
"#,
        );
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("notify.command"));
    }

    #[test]
    fn unknown_notify_backend_rejected() {
        let (_tmp, path) = write_config(
            r#"
[data]
dir = "./data"

[server]
bind = "127.0.0.1:7410"

[notify]
backend = "carrier-pigeon"
"#,
        );
        assert!(load_config(&path).is_err());
    }
}

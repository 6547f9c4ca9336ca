//! CRM and visit-store ports.
//!
//! The bucket handlers never talk to an external system directly; they go
//! through [`CrmClient`] (contact search, note attach, task creation) and
//! the ingress goes through [`VisitStore`] (the candidate pool for fuzzy
//! business matching). Both are `async_trait` ports injected as
//! `Arc<dyn ...>`, so tests and the one-shot CLI testers can swap in
//! in-memory doubles.
//!
//! The HTTP client targets a LeadConnector-shaped API: `POST
//! /contacts/search`, `POST /contacts/{id}/notes`, `POST /tasks`. Every
//! outbound call carries the configured timeout; there are no retries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::models::{ContactRef, Visit};

/// A follow-up task to create against a CRM contact.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub priority: Option<String>,
}

#[async_trait]
pub trait CrmClient: Send + Sync {
    /// Search for a contact by free-text query. Returns the first match.
    async fn search_contact(&self, query: &str) -> Result<Option<ContactRef>>;

    /// Attach a note to a contact.
    async fn add_note(&self, contact_id: &str, body: &str) -> Result<()>;

    /// Create a follow-up task. Returns the created task id.
    async fn create_task(&self, contact_id: &str, task: &TaskSpec) -> Result<String>;
}

#[async_trait]
pub trait VisitStore: Send + Sync {
    /// Fetch the current visit candidate pool.
    async fn fetch(&self) -> Result<Vec<Visit>>;
}

// ============ HTTP CRM client ============

pub struct HttpCrm {
    client: reqwest::Client,
    base_url: String,
    token: String,
    location_id: Option<String>,
}

impl HttpCrm {
    pub fn new(config: &Config) -> Result<HttpCrm> {
        let token = config
            .crm_token()
            .context("CRM token missing: set crm.token or MEMO_CRM_TOKEN")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.crm.timeout_secs))
            .build()
            .context("Failed to build CRM HTTP client")?;

        Ok(HttpCrm {
            client,
            base_url: config.crm.base_url.trim_end_matches('/').to_string(),
            token,
            location_id: config.crm.location_id.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .header("Version", "2021-07-28")
    }
}

#[async_trait]
impl CrmClient for HttpCrm {
    async fn search_contact(&self, query: &str) -> Result<Option<ContactRef>> {
        println!("Searching CRM for: \"{}\"", query);

        let response = self
            .request(reqwest::Method::POST, "/contacts/search")
            .json(&json!({
                "locationId": self.location_id,
                "query": query,
                "pageLimit": 5,
            }))
            .send()
            .await
            .context("CRM contact search request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("CRM contact search failed: {}", response.status());
        }

        let body: Value = response
            .json()
            .await
            .context("CRM contact search returned invalid JSON")?;

        let contact = body
            .get("contacts")
            .and_then(Value::as_array)
            .and_then(|contacts| contacts.first())
            .map(|c| ContactRef {
                id: c
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                name: c
                    .get("contactName")
                    .or_else(|| c.get("name"))
                    .or_else(|| c.get("businessName"))
                    .and_then(Value::as_str)
                    .unwrap_or(query)
                    .to_string(),
            });

        Ok(contact)
    }

    async fn add_note(&self, contact_id: &str, body: &str) -> Result<()> {
        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/contacts/{}/notes", contact_id),
            )
            .json(&json!({ "body": body }))
            .send()
            .await
            .context("CRM add-note request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("CRM add note failed: {}", response.status());
        }

        Ok(())
    }

    async fn create_task(&self, contact_id: &str, task: &TaskSpec) -> Result<String> {
        let response = self
            .request(reqwest::Method::POST, "/tasks")
            .json(&json!({
                "contactId": contact_id,
                "title": task.title,
                "description": task.description,
                "dueDate": task.due_date.to_string(),
                "locationId": self.location_id,
                "status": "incomplete",
            }))
            .send()
            .await
            .context("CRM create-task request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("CRM create task failed: {}", response.status());
        }

        let body: Value = response
            .json()
            .await
            .context("CRM create-task returned invalid JSON")?;

        Ok(body
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }
}

// ============ Offline doubles ============

/// CRM client used when the integration is disabled: searches find nothing,
/// so handlers skip note and task effects instead of failing the request.
pub struct DisabledCrm;

#[async_trait]
impl CrmClient for DisabledCrm {
    async fn search_contact(&self, query: &str) -> Result<Option<ContactRef>> {
        println!("CRM disabled, search for \"{}\" skipped", query);
        Ok(None)
    }

    async fn add_note(&self, _contact_id: &str, _body: &str) -> Result<()> {
        anyhow::bail!("CRM integration is disabled")
    }

    async fn create_task(&self, _contact_id: &str, _task: &TaskSpec) -> Result<String> {
        anyhow::bail!("CRM integration is disabled")
    }
}

/// In-memory CRM with a fixed contact list. Matches by case-insensitive
/// substring in either direction. Used by the CLI testers and in tests.
pub struct StaticCrm {
    pub contacts: Vec<ContactRef>,
}

#[async_trait]
impl CrmClient for StaticCrm {
    async fn search_contact(&self, query: &str) -> Result<Option<ContactRef>> {
        let q = query.to_lowercase();
        Ok(self
            .contacts
            .iter()
            .find(|c| {
                let name = c.name.to_lowercase();
                name.contains(&q) || q.contains(&name)
            })
            .cloned())
    }

    async fn add_note(&self, contact_id: &str, _body: &str) -> Result<()> {
        println!("Note recorded for contact {}", contact_id);
        Ok(())
    }

    async fn create_task(&self, contact_id: &str, task: &TaskSpec) -> Result<String> {
        println!(
            "Task recorded for contact {}: \"{}\" due {}",
            contact_id, task.title, task.due_date
        );
        Ok(format!("task-{}", contact_id))
    }
}

// ============ Visit stores ============

/// Candidate pool read from a JSON file on every fetch, so edits to the
/// file are picked up without a restart.
pub struct FileVisitStore {
    path: PathBuf,
}

impl FileVisitStore {
    pub fn new(path: PathBuf) -> FileVisitStore {
        FileVisitStore { path }
    }
}

#[async_trait]
impl VisitStore for FileVisitStore {
    async fn fetch(&self) -> Result<Vec<Visit>> {
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read visit pool: {}", self.path.display()))?;
        let visits: Vec<Visit> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse visit pool: {}", self.path.display()))?;
        Ok(visits)
    }
}

/// Candidate pool fetched from an HTTP endpoint returning a JSON array.
pub struct HttpVisitStore {
    client: reqwest::Client,
    url: String,
}

impl HttpVisitStore {
    pub fn new(url: String, timeout_secs: u64) -> Result<HttpVisitStore> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("Failed to build visit-store HTTP client")?;
        Ok(HttpVisitStore { client, url })
    }
}

#[async_trait]
impl VisitStore for HttpVisitStore {
    async fn fetch(&self) -> Result<Vec<Visit>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Visit pool request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Visit pool fetch failed: {}", response.status());
        }

        response
            .json()
            .await
            .context("Visit pool returned invalid JSON")
    }
}

/// Fixed in-memory candidate pool. The default when no visit source is
/// configured, and the double used in tests.
pub struct StaticVisitStore {
    pub visits: Vec<Visit>,
}

#[async_trait]
impl VisitStore for StaticVisitStore {
    async fn fetch(&self) -> Result<Vec<Visit>> {
        Ok(self.visits.clone())
    }
}

// ============ Builders ============

pub fn build_crm(config: &Config) -> Result<std::sync::Arc<dyn CrmClient>> {
    if config.crm.disabled {
        return Ok(std::sync::Arc::new(DisabledCrm));
    }
    Ok(std::sync::Arc::new(HttpCrm::new(config)?))
}

pub fn build_visit_store(config: &Config) -> Result<std::sync::Arc<dyn VisitStore>> {
    if let Some(url) = &config.visits.url {
        return Ok(std::sync::Arc::new(HttpVisitStore::new(
            url.clone(),
            config.crm.timeout_secs,
        )?));
    }
    if let Some(path) = &config.visits.path {
        return Ok(std::sync::Arc::new(FileVisitStore::new(path.clone())));
    }
    Ok(std::sync::Arc::new(StaticVisitStore { visits: Vec::new() }))
}

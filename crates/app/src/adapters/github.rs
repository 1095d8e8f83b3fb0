use anyhow::{Context, Result};
use gitpulse_core::domain::{parse_timestamp, Event, EventId, RepoId};
use gitpulse_core::error::SourceError;
use gitpulse_core::ports::{EventPage, EventSource};
use reqwest::blocking::{Client, Response};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;

const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

/// GitHub adapter that implements EventSource over the REST events API
pub struct GitHubEventSource {
    client: Client,
    api_url: Url,
    per_page: u32,
    max_pages: u32,
    token: Option<String>,
}

impl GitHubEventSource {
    pub fn new(config: &SourceConfig, token: Option<String>) -> Result<Self> {
        let api_url = Url::parse(&config.api_url)
            .with_context(|| format!("Invalid event source URL: {}", config.api_url))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("gitpulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_url,
            per_page: config.per_page,
            max_pages: config.max_pages,
            token,
        })
    }

    /// Build the adapter, picking up the API token from the configured
    /// token file or the `GITHUB_TOKEN` environment variable
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let token = load_token(config.token_file.as_deref());
        if token.is_none() {
            warn!("No GitHub token configured, continuing in anonymous mode");
        }
        Self::new(config, token)
    }

    fn events_url(&self, repo: &RepoId, page: u32) -> Result<Url, SourceError> {
        let mut url = self.api_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SourceError::Transport(format!("Unusable API URL: {}", self.api_url)))?;
            segments.pop_if_empty().push("repos");
            segments.extend(repo.as_str().split('/').filter(|part| !part.is_empty()));
            segments.push("events");
        }
        url.query_pairs_mut()
            .append_pair("per_page", &self.per_page.to_string())
            .append_pair("page", &page.to_string());
        Ok(url)
    }
}

impl EventSource for GitHubEventSource {
    fn fetch_page(&self, repo: &RepoId, page: u32) -> Result<EventPage, SourceError> {
        let url = self.events_url(repo, page)?;
        debug!("Requesting {}", url);

        let mut request = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        check_status(&response)?;

        let records: Vec<Value> = response
            .json()
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        let received = records.len();

        let events: Vec<Event> = records
            .into_iter()
            .filter_map(|record| {
                let event = decode_event(&record);
                if event.is_none() {
                    debug!("Skipping malformed event record for {}: {}", repo, record);
                }
                event
            })
            .collect();

        let next_page = if received < self.per_page as usize || page >= self.max_pages {
            None
        } else {
            Some(page + 1)
        };

        Ok(EventPage { events, next_page })
    }
}

/// Read the API token, preferring the token file over the environment
pub fn load_token(token_file: Option<&Path>) -> Option<String> {
    if let Some(path) = token_file {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let token = contents.trim();
                if !token.is_empty() {
                    info!("Using GitHub token from {}", path.display());
                    return Some(token.to_string());
                }
                warn!("Token file {} is empty", path.display());
            }
            Err(e) => warn!("Failed to read token file {}: {}", path.display(), e),
        }
    }

    std::env::var(TOKEN_ENV_VAR)
        .ok()
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn check_status(response: &Response) -> Result<(), SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let quota_exhausted = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|value| value.to_str().ok())
        .map(|remaining| remaining.trim() == "0")
        .unwrap_or(false);

    Err(match status {
        StatusCode::NOT_FOUND => SourceError::NotFound,
        StatusCode::UNAUTHORIZED => SourceError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimited,
        StatusCode::FORBIDDEN if quota_exhausted => SourceError::RateLimited,
        other => SourceError::Status(other.as_u16()),
    })
}

/// Decode one API record. Records without an id are dropped; an unusable
/// timestamp is treated as absent.
fn decode_event(record: &Value) -> Option<Event> {
    let id = match record.get("id")? {
        Value::String(id) if !id.is_empty() => id.clone(),
        Value::Number(id) => id.to_string(),
        _ => return None,
    };

    let kind = record
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string);

    let created_at = record
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(parse_timestamp);

    Some(Event {
        id: EventId(id),
        kind,
        created_at,
    })
}

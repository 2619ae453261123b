//! Job definitions: the base URL, schema and cookies of one run
//!
//! A job is a JSON document keyed by a job identifier, served either by a
//! config server (`GET {server-url}/config/{job-id}`) or read from
//! `{directory}/{job-id}.json`.

use super::compile::compile;
use super::node::Group;
use crate::config::JobConfig;
use crate::TrawlError;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Deserialize)]
struct RawJob {
    base_url: String,
    structure: Value,
    #[serde(default)]
    cookies: Map<String, Value>,
}

/// A compiled job, immutable for the duration of a run
#[derive(Debug, Clone)]
pub struct JobDefinition {
    /// Identifier the job was loaded under
    pub job_id: String,

    /// First document to fetch
    pub base_url: Url,

    /// Root of the schema tree applied to `base_url`
    pub schema: Arc<Group>,

    /// Cookies sent with every request
    pub cookies: Vec<(String, String)>,

    /// Hex-encoded SHA-256 of the job text
    pub digest: String,
}

impl JobDefinition {
    /// Parses and compiles a job from its JSON text
    ///
    /// # Examples
    ///
    /// ```
    /// use trawl::schema::JobDefinition;
    ///
    /// let job = JobDefinition::parse(
    ///     "demo",
    ///     r#"{"base_url": "https://example.com/", "structure": {"title": "h1::text"}}"#,
    /// )
    /// .unwrap();
    /// assert_eq!(job.base_url.as_str(), "https://example.com/");
    /// ```
    pub fn parse(job_id: &str, text: &str) -> Result<Self, TrawlError> {
        let raw: RawJob = serde_json::from_str(text)?;

        let base_url = Url::parse(&raw.base_url).map_err(|e| TrawlError::Job {
            job_id: job_id.to_string(),
            message: format!("invalid base_url '{}': {}", raw.base_url, e),
        })?;

        let schema = compile(&raw.structure)?;

        let cookies = raw
            .cookies
            .into_iter()
            .map(|(name, value)| match value {
                Value::String(s) => (name, s),
                other => (name, other.to_string()),
            })
            .collect();

        Ok(Self {
            job_id: job_id.to_string(),
            base_url,
            schema,
            cookies,
            digest: digest(text),
        })
    }
}

/// Loads a job from the configured source
pub async fn load_job(source: &JobConfig, job_id: &str) -> Result<JobDefinition, TrawlError> {
    let text = if let Some(server_url) = &source.server_url {
        fetch_job_text(server_url, job_id).await?
    } else if let Some(directory) = &source.directory {
        read_job_text(Path::new(directory), job_id)?
    } else {
        return Err(TrawlError::Job {
            job_id: job_id.to_string(),
            message: "no job source configured".to_string(),
        });
    };

    JobDefinition::parse(job_id, &text)
}

async fn fetch_job_text(server_url: &str, job_id: &str) -> Result<String, TrawlError> {
    let url = format!("{}/config/{}", server_url.trim_end_matches('/'), job_id);
    tracing::debug!("Fetching job definition from {}", url);

    let response = reqwest::get(&url)
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| TrawlError::Job {
            job_id: job_id.to_string(),
            message: format!("request to {} failed: {}", url, e),
        })?;

    Ok(response.text().await?)
}

fn read_job_text(directory: &Path, job_id: &str) -> Result<String, TrawlError> {
    let path = directory.join(format!("{}.json", job_id));
    tracing::debug!("Reading job definition from {}", path.display());

    std::fs::read_to_string(&path).map_err(|e| TrawlError::Job {
        job_id: job_id.to_string(),
        message: format!("cannot read {}: {}", path.display(), e),
    })
}

fn digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

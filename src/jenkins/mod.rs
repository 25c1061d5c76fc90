//! Jenkins server access: the JSON API client, its record types and the
//! URL grammar used to address jobs, builds and views.

mod client;
#[cfg(test)]
pub(crate) mod fake;
mod types;
mod urls;

pub use client::{ClientSettings, JenkinsClient};
pub use types::{
    Action, Artifact, BuildInfo, BuildLink, Cause, JobInfo, JobSummary, LastBuildLink,
    ParameterValue, QueueItem, QueueTask,
};
pub use urls::{
    build_url, job_path, parse_build_url, parse_view_url, BuildLocator, BuildSelector, ViewLocator,
};

use async_trait::async_trait;

use crate::error::Result;

/// Operations the resolver needs from a Jenkins server.
///
/// `JenkinsClient` talks HTTP; tests substitute an in-memory server.
/// Implementations report a missing resource as `JinnyError::NotFound` and
/// other rejected requests as `JinnyError::Api`, separately from transport
/// failures.
#[async_trait]
pub trait JenkinsApi: Send + Sync {
    /// Server root, without a trailing slash.
    fn server_url(&self) -> &str;

    async fn job_info(&self, job: &str) -> Result<JobInfo>;

    async fn build_info(&self, job: &str, number: u64) -> Result<BuildInfo>;

    /// Full console log as plain text.
    async fn console_text(&self, job: &str, number: u64) -> Result<String>;

    async fn view_jobs(&self, view: &str) -> Result<Vec<JobSummary>>;

    async fn queue_items(&self) -> Result<Vec<QueueItem>>;

    /// Raw bytes of an archived artifact, addressed by its relative path.
    async fn artifact(&self, job: &str, number: u64, relative_path: &str) -> Result<Vec<u8>>;
}

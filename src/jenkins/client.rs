use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::auth::Credentials;
use crate::error::{JinnyError, Result};

use super::types::{BuildInfo, JobInfo, JobSummary, QueueInfo, QueueItem, ViewInfo};
use super::urls::job_path;
use super::JenkinsApi;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_SECONDS: u64 = 2;

/// Transport settings shared by every client created during a run.
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            credentials: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECONDS),
        }
    }
}

/// Jenkins JSON API client bound to one server.
pub struct JenkinsClient {
    client: Client,
    server: Url,
    server_display: String,
    credentials: Option<Credentials>,
    max_retries: u32,
    retry_delay: Duration,
}

impl JenkinsClient {
    pub fn new(server: &str, settings: &ClientSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("jenkins-jinny/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|e| JinnyError::Config(format!("Failed to create HTTP client: {e}")))?;

        let server_display = server.trim().trim_end_matches('/').to_string();
        // Url::join only keeps the last path segment when it ends with a slash
        let server = Url::parse(&format!("{server_display}/"))
            .map_err(|e| JinnyError::Config(format!("Invalid server URL '{server_display}': {e}")))?;

        Ok(Self {
            client,
            server,
            server_display,
            credentials: settings.credentials.clone(),
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay,
        })
    }

    fn auth_request(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(creds) = &self.credentials {
            request.basic_auth(&creds.user, Some(creds.token.as_str()))
        } else {
            request
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.server
            .join(path)
            .map_err(|e| JinnyError::Config(format!("Invalid API URL '{path}': {e}")))
    }

    fn build_endpoint(&self, job: &str, number: u64, suffix: &str) -> Result<Url> {
        self.endpoint(&format!("{}/{number}/{suffix}", job_path(job, true)))
    }

    /// Issues a GET with retry on transport failures, rate limiting and 5xx.
    async fn get(&self, url: Url) -> Result<Response> {
        let mut retry_count = 0;
        loop {
            debug!("GET {url}");
            let request = self.auth_request(self.client.get(url.clone()));

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_connect() || e.is_timeout() => {
                    if retry_count >= self.max_retries {
                        return Err(e.into());
                    }
                    warn!(
                        "Network error ({}), retrying in {}s ({}/{})...",
                        e,
                        self.retry_delay.as_secs(),
                        retry_count + 1,
                        self.max_retries
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    retry_count += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= self.max_retries {
                    return Err(JinnyError::ApiErrorAfterRetries {
                        status: status.as_u16(),
                        retries: self.max_retries,
                    });
                }
                warn!(
                    "Jenkins API error (status {status}). Waiting {}s before retry {}/{}...",
                    self.retry_delay.as_secs(),
                    retry_count + 1,
                    self.max_retries
                );
                tokio::time::sleep(self.retry_delay).await;
                retry_count += 1;
                continue;
            }

            if status == StatusCode::NOT_FOUND {
                return Err(JinnyError::NotFound(url.to_string()));
            }

            if !status.is_success() {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unable to read error response".to_string());
                return Err(JinnyError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            return Ok(response);
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let body = self.get(url).await?.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl JenkinsApi for JenkinsClient {
    fn server_url(&self) -> &str {
        &self.server_display
    }

    async fn job_info(&self, job: &str) -> Result<JobInfo> {
        let url = self.endpoint(&format!("{}/api/json", job_path(job, true)))?;
        self.get_json(url).await
    }

    async fn build_info(&self, job: &str, number: u64) -> Result<BuildInfo> {
        let url = self.build_endpoint(job, number, "api/json")?;
        self.get_json(url).await
    }

    async fn console_text(&self, job: &str, number: u64) -> Result<String> {
        let url = self.build_endpoint(job, number, "consoleText")?;
        Ok(self.get(url).await?.text().await?)
    }

    async fn view_jobs(&self, view: &str) -> Result<Vec<JobSummary>> {
        let mut url = self.endpoint(&format!("view/{}/api/json", urlencoding::encode(view)))?;
        url.query_pairs_mut()
            .append_pair("tree", "jobs[name,url,color]");
        let info: ViewInfo = self.get_json(url).await?;
        Ok(info.jobs)
    }

    async fn queue_items(&self) -> Result<Vec<QueueItem>> {
        let url = self.endpoint("queue/api/json")?;
        let info: QueueInfo = self.get_json(url).await?;
        Ok(info.items)
    }

    async fn artifact(&self, job: &str, number: u64, relative_path: &str) -> Result<Vec<u8>> {
        let encoded = relative_path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = self.build_endpoint(job, number, &format!("artifact/{encoded}"))?;
        Ok(self.get(url).await?.bytes().await?.to_vec())
    }
}

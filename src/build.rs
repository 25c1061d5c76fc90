use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::error::{JinnyError, Result};
use crate::jenkins::{
    build_url, parse_build_url, BuildInfo, BuildLocator, BuildSelector, ClientSettings,
    JenkinsApi, JenkinsClient, LastBuildLink,
};
use crate::params::ParameterSet;

/// Status reported for a job that has a pending queue entry.
pub const STATUS_IN_QUEUE: &str = "IN_QUEUE";
/// Status reported while the build is still running.
pub const STATUS_BUILDING: &str = "BUILDING";
/// Status reported when a finished build carries no result code.
pub const STATUS_UNKNOWN: &str = "UNKNOWN";

/// One build of a Jenkins job.
///
/// Identity (`job_name`, `number`) is fixed at construction; a "last build"
/// marker is resolved to a concrete number before the value exists. Metadata
/// is fetched on first access and cached for the lifetime of the value, as are
/// the parent and children discovered by the resolver. Caches are never
/// invalidated: re-query the server with a fresh `Build` for current data.
///
/// Builds derived from this one (parent, children, previous) share its
/// `JenkinsApi` endpoint.
pub struct Build {
    client: Arc<dyn JenkinsApi>,
    job_name: String,
    number: u64,
    info: OnceCell<BuildInfo>,
    status: OnceCell<String>,
    parameters: OnceCell<ParameterSet>,
    pub(crate) parent: OnceCell<Option<Arc<Build>>>,
    pub(crate) children: OnceCell<Vec<Arc<Build>>>,
}

impl Build {
    /// References a build without contacting the server.
    pub fn new(client: Arc<dyn JenkinsApi>, job_name: impl Into<String>, number: u64) -> Self {
        Self {
            client,
            job_name: job_name.into(),
            number,
            info: OnceCell::new(),
            status: OnceCell::new(),
            parameters: OnceCell::new(),
            parent: OnceCell::new(),
            children: OnceCell::new(),
        }
    }

    /// Resolves one of the job's last-build pointers to a concrete build.
    ///
    /// # Errors
    ///
    /// Returns `NoBuilds` when the job has never produced a build matching `link`.
    pub async fn latest(
        client: Arc<dyn JenkinsApi>,
        job_name: &str,
        link: LastBuildLink,
    ) -> Result<Self> {
        let info = client.job_info(job_name).await?;
        let number = info
            .link(link)
            .map(|build| build.number)
            .ok_or_else(|| JinnyError::NoBuilds {
                job: job_name.to_string(),
                link: link.to_string(),
            })?;
        debug!("Resolved {job_name} {link} to #{number}");
        Ok(Self::new(client, job_name, number))
    }

    /// The `link` build of every job listed in `view`, in view order.
    ///
    /// Jobs that never produced such a build are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Fails when the view cannot be listed or a job lookup fails for any
    /// reason other than `NoBuilds`.
    pub async fn latest_in_view(
        client: Arc<dyn JenkinsApi>,
        view: &str,
        link: LastBuildLink,
    ) -> Result<Vec<Self>> {
        let jobs = client.view_jobs(view).await?;
        info!("View '{view}' has {} jobs", jobs.len());

        let mut builds = Vec::with_capacity(jobs.len());
        for job in jobs {
            match Self::latest(Arc::clone(&client), &job.name, link).await {
                Ok(build) => builds.push(build),
                Err(e @ JinnyError::NoBuilds { .. }) => warn!("Skipping {}: {e}", job.name),
                Err(e) => return Err(e),
            }
        }
        Ok(builds)
    }

    /// Builds a reference from a build URL or a job URL.
    ///
    /// A job URL resolves to `default_link`. A new client is created for the
    /// server named in the URL.
    ///
    /// # Errors
    ///
    /// Returns `MalformedUrl` when the URL matches neither
    /// `{server}/job/{name}/{number}` nor `{server}/job/{name}`.
    pub async fn from_url(
        url: &str,
        settings: &ClientSettings,
        default_link: LastBuildLink,
    ) -> Result<Self> {
        let locator = parse_build_url(url)?;
        let client: Arc<dyn JenkinsApi> = Arc::new(JenkinsClient::new(&locator.server, settings)?);
        Self::from_locator(client, &locator, default_link).await
    }

    pub async fn from_locator(
        client: Arc<dyn JenkinsApi>,
        locator: &BuildLocator,
        default_link: LastBuildLink,
    ) -> Result<Self> {
        match locator.selector {
            Some(BuildSelector::Number(number)) => {
                Ok(Self::new(client, locator.job_name.clone(), number))
            }
            Some(BuildSelector::Link(link)) => Self::latest(client, &locator.job_name, link).await,
            None => Self::latest(client, &locator.job_name, default_link).await,
        }
    }

    /// Another build on the same server.
    pub(crate) fn sibling(&self, job_name: impl Into<String>, number: u64) -> Self {
        Self::new(Arc::clone(&self.client), job_name, number)
    }

    pub fn client(&self) -> &Arc<dyn JenkinsApi> {
        &self.client
    }

    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    /// Stable `job#number` identifier.
    pub fn id(&self) -> String {
        self.to_string()
    }

    pub fn url(&self) -> String {
        build_url(self.client.server_url(), &self.job_name, self.number)
    }

    /// Raw build metadata, fetched once.
    pub async fn info(&self) -> Result<&BuildInfo> {
        self.info
            .get_or_try_init(|| self.client.build_info(&self.job_name, self.number))
            .await
    }

    /// `IN_QUEUE` while the job has a queue entry, `BUILDING` while running,
    /// otherwise the server's result code verbatim.
    pub async fn status(&self) -> Result<&str> {
        self.status
            .get_or_try_init(|| self.resolve_status())
            .await
            .map(String::as_str)
    }

    async fn resolve_status(&self) -> Result<String> {
        if self.is_in_queue().await? {
            return Ok(STATUS_IN_QUEUE.to_string());
        }
        let info = self.info().await?;
        if info.building {
            return Ok(STATUS_BUILDING.to_string());
        }
        Ok(info
            .result
            .clone()
            .unwrap_or_else(|| STATUS_UNKNOWN.to_string()))
    }

    /// True when the queue holds an entry for this build's job.
    pub async fn is_in_queue(&self) -> Result<bool> {
        let leaf = self.job_name.rsplit('/').next().unwrap_or(&self.job_name);
        let items = self.client.queue_items().await?;
        Ok(items
            .iter()
            .any(|item| item.task.name == self.job_name || item.task.name == leaf))
    }

    pub async fn display_name(&self) -> Result<Option<&str>> {
        Ok(self.info().await?.display_name.as_deref())
    }

    pub async fn description(&self) -> Result<Option<&str>> {
        Ok(self.info().await?.description.as_deref())
    }

    pub async fn start_time(&self) -> Result<Option<DateTime<Utc>>> {
        let timestamp = self.info().await?.timestamp;
        Ok(timestamp.and_then(|ms| DateTime::<Utc>::from_timestamp(ms / 1000, 0)))
    }

    pub async fn duration(&self) -> Result<Option<Duration>> {
        let duration = self.info().await?.duration;
        Ok(duration.map(|ms| Duration::from_secs(ms / 1000)))
    }

    /// Build parameters in server order.
    pub async fn parameters(&self) -> Result<&ParameterSet> {
        self.parameters
            .get_or_try_init(|| self.load_parameters())
            .await
    }

    async fn load_parameters(&self) -> Result<ParameterSet> {
        let info = self.info().await?;
        Ok(ParameterSet::from_values(info.parameters()))
    }

    /// Console log split into lines, oldest first unless `read_from_end`.
    pub async fn console_lines(&self, read_from_end: bool) -> Result<Vec<String>> {
        let text = self.client.console_text(&self.job_name, self.number).await?;
        let mut lines: Vec<String> = text.lines().map(str::to_owned).collect();
        if read_from_end {
            lines.reverse();
        }
        Ok(lines)
    }

    /// Downloads the first archived artifact whose relative path contains
    /// `pattern`, returning that path with the content.
    pub async fn artifact(&self, pattern: &str) -> Result<(String, Vec<u8>)> {
        let path = self
            .info()
            .await?
            .artifacts
            .iter()
            .find(|artifact| artifact.relative_path.contains(pattern))
            .map(|artifact| artifact.relative_path.clone())
            .ok_or_else(|| {
                JinnyError::NotFound(format!("artifact matching '{pattern}' in {self}"))
            })?;
        let bytes = self
            .client
            .artifact(&self.job_name, self.number, &path)
            .await?;
        Ok((path, bytes))
    }

    /// The build that ran before this one in the same job.
    ///
    /// # Errors
    ///
    /// Returns `NoPreviousBuild` when the server reports no earlier build.
    pub async fn previous(&self) -> Result<Self> {
        let link = self
            .info()
            .await?
            .previous_build
            .as_ref()
            .ok_or_else(|| JinnyError::NoPreviousBuild(self.to_string()))?;
        Ok(self.sibling(self.job_name.clone(), link.number))
    }

    /// Starting new builds is out of scope.
    pub fn trigger(&self) -> Result<()> {
        Err(JinnyError::NotSupported("triggering builds"))
    }

    /// Pipeline stage data is out of scope.
    pub fn stages(&self) -> Result<()> {
        Err(JinnyError::NotSupported("pipeline stage data"))
    }
}

impl fmt::Display for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.job_name, self.number)
    }
}

impl fmt::Debug for Build {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Build")
            .field("server", &self.client.server_url())
            .field("job_name", &self.job_name)
            .field("number", &self.number)
            .finish_non_exhaustive()
    }
}

//! In-memory Jenkins used by resolver, graph and history tests.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{JinnyError, Result};

use super::types::{BuildInfo, JobInfo, JobSummary, QueueItem, QueueTask};
use super::JenkinsApi;

pub const FAKE_SERVER: &str = "https://ci.test";

#[derive(Default)]
pub struct FakeJenkins {
    jobs: HashMap<String, Value>,
    builds: HashMap<(String, u64), Value>,
    consoles: HashMap<(String, u64), String>,
    views: HashMap<String, Vec<JobSummary>>,
    artifacts: HashMap<(String, u64, String), Vec<u8>>,
    queue: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeJenkins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(mut self, job: &str, info: Value) -> Self {
        self.jobs.insert(job.to_string(), info);
        self
    }

    pub fn with_build(mut self, job: &str, number: u64, info: Value) -> Self {
        self.builds.insert((job.to_string(), number), info);
        self
    }

    /// Finished build with no causes, parameters or console trigger lines.
    pub fn with_plain_build(self, job: &str, number: u64) -> Self {
        self.with_build(job, number, json!({"number": number, "result": "SUCCESS"}))
    }

    /// Finished build whose cause action points at `upstream`.
    pub fn with_triggered_build(self, job: &str, number: u64, upstream: (&str, u64)) -> Self {
        self.with_build(
            job,
            number,
            json!({
                "number": number,
                "result": "SUCCESS",
                "actions": [upstream_cause_action(upstream.0, upstream.1)]
            }),
        )
    }

    pub fn with_console(mut self, job: &str, number: u64, text: &str) -> Self {
        self.consoles.insert((job.to_string(), number), text.to_string());
        self
    }

    pub fn with_view(mut self, view: &str, jobs: Vec<JobSummary>) -> Self {
        self.views.insert(view.to_string(), jobs);
        self
    }

    pub fn with_artifact(mut self, job: &str, number: u64, path: &str, bytes: &[u8]) -> Self {
        self.artifacts
            .insert((job.to_string(), number, path.to_string()), bytes.to_vec());
        self
    }

    pub fn with_queued(mut self, job: &str) -> Self {
        self.queue.push(job.to_string());
        self
    }

    /// Number of recorded calls whose description starts with `prefix`.
    pub fn calls(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub fn upstream_cause_action(job: &str, number: u64) -> Value {
    json!({
        "_class": "hudson.model.CauseAction",
        "causes": [{
            "_class": "hudson.model.Cause$UpstreamCause",
            "shortDescription": format!("Started by upstream project \"{job}\" build number {number}"),
            "upstreamProject": job,
            "upstreamBuild": number,
            "upstreamUrl": format!("job/{job}/")
        }]
    })
}

pub fn parameters_action(params: &[(&str, &str)]) -> Value {
    let parameters: Vec<Value> = params
        .iter()
        .map(|(name, value)| json!({"name": name, "value": value}))
        .collect();
    json!({"_class": "hudson.model.ParametersAction", "parameters": parameters})
}

#[async_trait]
impl JenkinsApi for FakeJenkins {
    fn server_url(&self) -> &str {
        FAKE_SERVER
    }

    async fn job_info(&self, job: &str) -> Result<JobInfo> {
        self.record(format!("job_info {job}"));
        let info = self
            .jobs
            .get(job)
            .ok_or_else(|| JinnyError::NotFound(format!("job {job}")))?;
        Ok(serde_json::from_value(info.clone())?)
    }

    async fn build_info(&self, job: &str, number: u64) -> Result<BuildInfo> {
        self.record(format!("build_info {job}#{number}"));
        let info = self
            .builds
            .get(&(job.to_string(), number))
            .ok_or_else(|| JinnyError::NotFound(format!("{job}#{number}")))?;
        Ok(serde_json::from_value(info.clone())?)
    }

    async fn console_text(&self, job: &str, number: u64) -> Result<String> {
        self.record(format!("console_text {job}#{number}"));
        if let Some(text) = self.consoles.get(&(job.to_string(), number)) {
            return Ok(text.clone());
        }
        if self.builds.contains_key(&(job.to_string(), number)) {
            return Ok(String::from("Finished: SUCCESS\n"));
        }
        Err(JinnyError::NotFound(format!("{job}#{number} console")))
    }

    async fn view_jobs(&self, view: &str) -> Result<Vec<JobSummary>> {
        self.record(format!("view_jobs {view}"));
        self.views
            .get(view)
            .cloned()
            .ok_or_else(|| JinnyError::NotFound(format!("view {view}")))
    }

    async fn queue_items(&self) -> Result<Vec<QueueItem>> {
        self.record("queue_items".to_string());
        Ok(self
            .queue
            .iter()
            .enumerate()
            .map(|(id, name)| QueueItem {
                id: id as u64,
                task: QueueTask {
                    name: name.clone(),
                    url: None,
                },
                why: None,
            })
            .collect())
    }

    async fn artifact(&self, job: &str, number: u64, relative_path: &str) -> Result<Vec<u8>> {
        self.record(format!("artifact {job}#{number} {relative_path}"));
        self.artifacts
            .get(&(job.to_string(), number, relative_path.to_string()))
            .cloned()
            .ok_or_else(|| JinnyError::NotFound(relative_path.to_string()))
    }
}

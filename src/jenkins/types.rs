use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::JinnyError;

/// Job-level pointers Jenkins keeps to its most recent builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LastBuildLink {
    #[default]
    LastBuild,
    LastCompleted,
    LastFailed,
    LastSuccessful,
    LastUnsuccessful,
}

impl LastBuildLink {
    pub const ALL: [Self; 5] = [
        Self::LastBuild,
        Self::LastCompleted,
        Self::LastFailed,
        Self::LastSuccessful,
        Self::LastUnsuccessful,
    ];

    /// Name of the link as it appears in job JSON and in build URLs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LastBuild => "lastBuild",
            Self::LastCompleted => "lastCompletedBuild",
            Self::LastFailed => "lastFailedBuild",
            Self::LastSuccessful => "lastSuccessfulBuild",
            Self::LastUnsuccessful => "lastUnsuccessfulBuild",
        }
    }
}

impl fmt::Display for LastBuildLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LastBuildLink {
    type Err = JinnyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|link| link.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                JinnyError::Config(format!(
                    "unknown build link '{s}', expected one of: {}",
                    Self::ALL.map(Self::as_str).join(", ")
                ))
            })
    }
}

/// Reference to another build as embedded in job and build JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildLink {
    pub number: u64,
    #[serde(default)]
    pub url: Option<String>,
}

/// `GET /job/<name>/api/json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    pub last_build: Option<BuildLink>,
    pub last_completed_build: Option<BuildLink>,
    pub last_failed_build: Option<BuildLink>,
    pub last_successful_build: Option<BuildLink>,
    pub last_unsuccessful_build: Option<BuildLink>,
}

impl JobInfo {
    pub fn link(&self, link: LastBuildLink) -> Option<&BuildLink> {
        match link {
            LastBuildLink::LastBuild => self.last_build.as_ref(),
            LastBuildLink::LastCompleted => self.last_completed_build.as_ref(),
            LastBuildLink::LastFailed => self.last_failed_build.as_ref(),
            LastBuildLink::LastSuccessful => self.last_successful_build.as_ref(),
            LastBuildLink::LastUnsuccessful => self.last_unsuccessful_build.as_ref(),
        }
    }
}

/// `GET /job/<name>/<number>/api/json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    #[serde(default)]
    pub number: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub building: bool,
    pub result: Option<String>,
    pub display_name: Option<String>,
    pub description: Option<String>,
    /// Start time, milliseconds since the epoch.
    pub timestamp: Option<i64>,
    /// Milliseconds.
    pub duration: Option<u64>,
    #[serde(default, deserialize_with = "skip_nulls")]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    pub previous_build: Option<BuildLink>,
}

impl BuildInfo {
    /// Causes of the first action that records any, in server order.
    pub fn causes(&self) -> &[Cause] {
        self.actions
            .iter()
            .find_map(|action| action.causes.as_deref())
            .unwrap_or_default()
    }

    /// Parameters of the first action that records any.
    pub fn parameters(&self) -> &[ParameterValue] {
        self.actions
            .iter()
            .find_map(|action| action.parameters.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
    #[serde(default)]
    pub causes: Option<Vec<Cause>>,
    #[serde(default)]
    pub parameters: Option<Vec<ParameterValue>>,
}

/// One entry of an action's `causes` list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cause {
    #[serde(rename = "_class", default)]
    pub class: Option<String>,
    pub short_description: Option<String>,
    pub upstream_project: Option<String>,
    pub upstream_build: Option<u64>,
    pub upstream_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterValue {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

impl ParameterValue {
    /// Value coerced to the string form used for display and comparison.
    pub fn value_string(&self) -> String {
        match &self.value {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default)]
    pub file_name: String,
    pub relative_path: String,
}

/// `GET /queue/api/json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueInfo {
    #[serde(default)]
    pub items: Vec<QueueItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueItem {
    #[serde(default)]
    pub id: u64,
    #[serde(default)]
    pub task: QueueTask,
    pub why: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueTask {
    #[serde(default)]
    pub name: String,
    pub url: Option<String>,
}

/// `GET /view/<name>/api/json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewInfo {
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub color: Option<String>,
}

// Jenkins pads `actions` with nulls for actions it cannot export.
fn skip_nulls<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items: Option<Vec<Option<T>>> = Option::deserialize(deserializer)?;
    Ok(items.unwrap_or_default().into_iter().flatten().collect())
}

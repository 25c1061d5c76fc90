use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::auth::Credentials;
use crate::jenkins::ClientSettings;

const CANDIDATES: [&str; 4] = ["jinny.toml", "jinny.json", "jinny.yaml", "jinny.yml"];

/// Settings file for jenkins-jinny.
///
/// Holds the credentials and transport settings used for every Jenkins
/// server a run talks to, plus output defaults. Command-line flags and
/// environment variables take precedence over anything loaded here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub jenkins: JenkinsConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JenkinsConfig {
    /// Jenkins user name for basic auth
    pub user: Option<String>,

    /// Jenkins API token for basic auth
    pub token: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for connection failures, 429 and 5xx responses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay between retries
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Where `diff-job-params --to-html` writes its table
    #[serde(default = "default_html_path")]
    pub html_path: PathBuf,

    /// Format template used when `-f` is not given
    pub template: Option<String>,
}

impl Default for JenkinsConfig {
    fn default() -> Self {
        Self {
            user: None,
            token: None,
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            html_path: default_html_path(),
            template: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_secs() -> u64 {
    2
}

fn default_html_path() -> PathBuf {
    PathBuf::from("diff.html")
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./jinny.toml, ./jinny.json, ./jinny.yaml, ./jinny.yml
    /// 3. `<config dir>/jenkins-jinny/config.toml`
    ///
    /// Returns default configuration if no file is found. An explicit path
    /// that does not exist is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let user_dir = dirs::config_dir().map(|dir| dir.join("jenkins-jinny"));
        match discover(Path::new("."), user_dir.as_deref()) {
            Some(found) => Self::load_from_path(&found),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }

    /// Transport settings for every client created in this run.
    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            credentials: Credentials::from_parts(
                self.jenkins.user.as_deref(),
                self.jenkins.token.as_deref(),
            ),
            timeout: Duration::from_secs(self.jenkins.timeout_secs),
            max_retries: self.jenkins.max_retries,
            retry_delay: Duration::from_secs(self.jenkins.retry_delay_secs),
        }
    }
}

/// First existing candidate in `base`, then `config.toml` in `user_dir`.
fn discover(base: &Path, user_dir: Option<&Path>) -> Option<PathBuf> {
    CANDIDATES
        .iter()
        .map(|candidate| base.join(candidate))
        .chain(user_dir.map(|dir| dir.join("config.toml")))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.jenkins.timeout_secs, 30);
        assert_eq!(config.jenkins.max_retries, 3);
        assert_eq!(config.jenkins.retry_delay_secs, 2);
        assert_eq!(config.output.html_path, PathBuf::from("diff.html"));
        assert!(config.output.template.is_none());
        assert!(config.client_settings().credentials.is_none());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[jenkins]
user = "alice"
token = "11aa22bb"
timeout-secs = 5
max-retries = 0

[output]
html-path = "/tmp/params.html"
template = "{url} {status}"
"#;
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.jenkins.user.as_deref(), Some("alice"));
        assert_eq!(config.jenkins.timeout_secs, 5);
        assert_eq!(config.jenkins.max_retries, 0);
        assert_eq!(config.jenkins.retry_delay_secs, 2);
        assert_eq!(config.output.html_path, PathBuf::from("/tmp/params.html"));
        assert_eq!(config.output.template.as_deref(), Some("{url} {status}"));

        let settings = config.client_settings();
        assert_eq!(settings.timeout, Duration::from_secs(5));
        assert_eq!(
            settings.credentials,
            Some(Credentials::new("alice", "11aa22bb"))
        );
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "jenkins": {
    "user": "bob",
    "retry-delay-secs": 7
  }
}"#;
        write!(temp_file, "{}", json_content).unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.jenkins.user.as_deref(), Some("bob"));
        assert_eq!(config.jenkins.retry_delay_secs, 7);
        // a user without a token sends no credentials
        assert!(config.client_settings().credentials.is_none());
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yml").unwrap();
        write!(temp_file, "output:\n  template: \"{{name}}\"\n").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.output.template.as_deref(), Some("{name}"));
        assert_eq!(config.jenkins.max_retries, 3);
    }

    #[test]
    fn test_explicit_missing_path_is_an_error() {
        assert!(Config::load(Some(Path::new("definitely-missing-jinny.toml"))).is_err());
    }

    #[test]
    fn test_discover_prefers_local_candidates() {
        let local = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        std::fs::write(user.path().join("config.toml"), "").unwrap();

        assert_eq!(
            discover(local.path(), Some(user.path())),
            Some(user.path().join("config.toml"))
        );

        std::fs::write(local.path().join("jinny.yaml"), "").unwrap();
        std::fs::write(local.path().join("jinny.json"), "{}").unwrap();
        assert_eq!(
            discover(local.path(), Some(user.path())),
            Some(local.path().join("jinny.json"))
        );
    }

    #[test]
    fn test_discover_finds_nothing() {
        let empty = tempfile::tempdir().unwrap();
        assert_eq!(discover(empty.path(), None), None);
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JinnyError {
    #[error("Malformed Jenkins URL: {0} (expected <server>/job/<name>[/<number>] or <server>/view/<name>)")]
    MalformedUrl(String),

    #[error("Lookup for {build} failed: {source}")]
    UpstreamLookup {
        build: String,
        #[source]
        source: Box<JinnyError>,
    },

    #[error("Condition clause '{0}' must look like PARAM=VALUE or PARAM>VALUE")]
    MissingConditionOperand(String),

    #[error("{0} has no previous build")]
    NoPreviousBuild(String),

    #[error("Job '{job}' has no {link} build")]
    NoBuilds { job: String, link: String },

    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Jenkins API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Jenkins API error (status {status}) after {retries} retries")]
    ApiErrorAfterRetries { status: u16, retries: u32 },

    #[error("Invalid format template: {0}")]
    Template(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl JinnyError {
    /// Wraps a failed resolver request with the build it was made for.
    pub fn upstream_lookup(build: impl ToString, source: JinnyError) -> Self {
        Self::UpstreamLookup {
            build: build.to_string(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, JinnyError>;

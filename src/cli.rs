use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::warn;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::build::Build;
use crate::config::Config;
use crate::flow::BuildFlow;
use crate::history::{self, Condition};
use crate::jenkins::{parse_view_url, ClientSettings, JenkinsApi, JenkinsClient, LastBuildLink};
use crate::output::{self, bright_green, cyan, dim, WalkProgress};
use crate::params;
use crate::resolver::find_root;
use crate::template::{self, Template};

const FORMAT_HELP: &str = "Format template, e.g. \"{url} {status} {param.BRANCH}\". \
Fields: duration, display_name, url, name, number, status, start_time, param.NAME";

#[derive(Parser)]
#[command(name = "jenkins-jinny")]
#[command(author, version, about = "Jenkins build relationship inspector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ./jinny.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true, env = "JENKINS_USER")]
    user: Option<String>,

    #[arg(long, global = true, env = "JENKINS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Retries for connection failures, 429 and 5xx responses
    #[arg(long, global = true)]
    retries: Option<u32>,

    /// Build a job URL without a number resolves to
    #[arg(long, global = true, default_value_t = LastBuildLink::LastBuild)]
    last: LastBuildLink,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare parameters of several builds side by side
    DiffJobParams {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Only show parameters whose values differ
        #[arg(long = "diff")]
        diff_only: bool,

        /// Write an HTML table instead of printing
        #[arg(long)]
        to_html: bool,

        /// Where --to-html writes (default from config, else diff.html)
        #[arg(long)]
        html_path: Option<PathBuf>,

        /// Column header template
        #[arg(short = 'f', long = "format", help = FORMAT_HELP)]
        format: Option<String>,
    },

    /// Print the whole trigger tree a build belongs to
    BuildFlow {
        url: String,

        #[arg(short = 'f', long = "format", help = FORMAT_HELP)]
        format: Option<String>,

        /// Only list triggered builds whose job name contains this text
        #[arg(long)]
        job: Option<String>,
    },

    /// Show what triggered each of the last builds of a job
    ShowPossibleUpstreams {
        url: String,

        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Search job history for builds whose parameters match a condition
    ///
    /// CONDITION looks like START_TESTS=true,JENKINS_AGENT>python where `=`
    /// is exact equality, `>` a substring check and `,` separates clauses.
    SearchBuild {
        url: String,

        condition: String,

        #[arg(long, default_value_t = 50)]
        limit: usize,

        #[arg(short = 'f', long = "format", help = FORMAT_HELP)]
        format: Option<String>,
    },

    /// Show parameter values across job history
    ShowParam {
        url: String,

        /// Comma-separated parameter names
        params: String,

        #[arg(long, default_value_t = 50)]
        limit: usize,

        /// Build column template
        #[arg(short = 'f', long = "format", help = FORMAT_HELP)]
        format: Option<String>,
    },

    /// List the latest build of every job in a view
    JobsInView {
        view_url: String,

        #[arg(short = 'f', long = "format", help = FORMAT_HELP)]
        format: Option<String>,
    },

    /// Dump build metadata as JSON, with the computed status
    Inspect { url: String },

    /// Download an archived artifact whose path contains PATTERN
    Artifact {
        url: String,

        pattern: String,

        /// Output file (default: the artifact's file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Everything a subcommand needs from the global options and config file.
struct Session {
    config: Config,
    settings: ClientSettings,
    last: LastBuildLink,
}

impl Session {
    async fn build(&self, url: &str) -> Result<Build> {
        Build::from_url(url, &self.settings, self.last)
            .await
            .with_context(|| format!("Failed to resolve build {url}"))
    }

    fn template(&self, flag: Option<&str>) -> Result<Template> {
        let source = flag.or(self.config.output.template.as_deref()).unwrap_or("");
        Template::parse(source).with_context(|| format!("Invalid format template \"{source}\""))
    }
}

impl Cli {
    fn session(&self) -> Result<Session> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(user) = &self.user {
            config.jenkins.user = Some(user.clone());
        }
        if let Some(token) = &self.token {
            config.jenkins.token = Some(token.clone());
        }
        if let Some(timeout) = self.timeout {
            config.jenkins.timeout_secs = timeout;
        }
        if let Some(retries) = self.retries {
            config.jenkins.max_retries = retries;
        }

        let settings = config.client_settings();
        Ok(Session {
            config,
            settings,
            last: self.last,
        })
    }

    pub async fn execute(&self) -> Result<()> {
        let session = self.session()?;

        match &self.command {
            Commands::DiffJobParams {
                urls,
                diff_only,
                to_html,
                html_path,
                format,
            } => {
                let path = html_path
                    .as_deref()
                    .unwrap_or(&session.config.output.html_path);
                diff_job_params(&session, urls, *diff_only, to_html.then_some(path), format.as_deref())
                    .await
            }
            Commands::BuildFlow { url, format, job } => {
                build_flow(&session, url, format.as_deref(), job.as_deref()).await
            }
            Commands::ShowPossibleUpstreams { url, limit } => {
                show_possible_upstreams(&session, url, *limit).await
            }
            Commands::SearchBuild {
                url,
                condition,
                limit,
                format,
            } => search_build(&session, url, condition, *limit, format.as_deref()).await,
            Commands::ShowParam {
                url,
                params,
                limit,
                format,
            } => show_param(&session, url, params, *limit, format.as_deref()).await,
            Commands::JobsInView { view_url, format } => {
                jobs_in_view(&session, view_url, format.as_deref()).await
            }
            Commands::Inspect { url } => inspect(&session, url).await,
            Commands::Artifact {
                url,
                pattern,
                output,
            } => artifact(&session, url, pattern, output.as_deref()).await,
        }
    }
}

/// Renders `build`, falling back to its identifier when metadata is unavailable.
async fn render_or_id(template: &Template, build: &Build) -> String {
    match template.render(build).await {
        Ok(line) => line,
        Err(e) => {
            warn!("Cannot format {build}: {e}");
            build.to_string()
        }
    }
}

async fn summary_or_id(build: &Build) -> String {
    match template::summary_line(build).await {
        Ok(line) => line,
        Err(e) => {
            warn!("Cannot summarize {build}: {e}");
            build.to_string()
        }
    }
}

async fn diff_job_params(
    session: &Session,
    urls: &[String],
    diff_only: bool,
    html_path: Option<&Path>,
    format: Option<&str>,
) -> Result<()> {
    let template = session.template(format)?;

    let mut builds = Vec::with_capacity(urls.len());
    for url in urls {
        builds.push(session.build(url).await?);
    }

    let mut table = params::compare(&builds).await?;
    if !template.is_default() {
        let mut columns = Vec::with_capacity(builds.len());
        for build in &builds {
            columns.push(render_or_id(&template, build).await);
        }
        table.columns = columns;
    }
    if diff_only {
        table = table.differing_only();
    }

    match html_path {
        Some(path) => {
            output::write_html(&table, path)?;
            let shown = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
            println!("Saved to file://{}", shown.display());
        }
        None if table.is_empty() => eprintln!("{}", dim("No parameters to show")),
        None => println!("{}", output::parameter_table(&table)),
    }
    Ok(())
}

async fn build_flow(
    session: &Session,
    url: &str,
    format: Option<&str>,
    job: Option<&str>,
) -> Result<()> {
    let template = session.template(format)?;
    let build = Arc::new(session.build(url).await?);

    let progress = WalkProgress::start(format!("Looking for the build that started {build}"));
    let root = find_root(build).await;

    if let Some(pattern) = job {
        progress.update(format!("Collecting builds triggered by {root}"));
        let matching = root.children_matching(pattern).await;
        progress.finish(format!("{} triggered builds match '{pattern}'", matching.len()));
        for child in &matching {
            println!("{}", render_or_id(&template, child).await);
        }
        return Ok(());
    }

    progress.update(format!("Collecting builds triggered by {root}"));
    let flow = BuildFlow::assemble(root).await;
    progress.finish(format!("Found {} builds", flow.len()));

    for entry in flow.traversal() {
        let line = render_or_id(&template, &entry.build).await;
        println!("{}{}", "  ".repeat(entry.depth), line);
    }
    Ok(())
}

async fn show_possible_upstreams(session: &Session, url: &str, limit: usize) -> Result<()> {
    let start = session.build(url).await?;

    let progress = WalkProgress::start(format!("Walking {limit} builds back from {start}"));
    let rows = history::possible_upstreams(start, limit).await?;
    progress.clear();

    for row in rows {
        match row.parent {
            Some(parent) => println!("{} was triggered by {}", row.build, cyan(parent)),
            None => println!("{} was triggered by {}", row.build, dim("nothing")),
        }
    }
    Ok(())
}

async fn search_build(
    session: &Session,
    url: &str,
    condition: &str,
    limit: usize,
    format: Option<&str>,
) -> Result<()> {
    let condition = Condition::parse(condition)?;
    let template = session.template(format)?;
    let start = session.build(url).await?;

    let progress = WalkProgress::start(format!("Searching {limit} builds for {condition}"));
    let found = history::search(start, &condition, limit).await?;
    progress.finish(format!("{} builds matched", found.len()));

    for build in &found {
        let line = if template.is_default() {
            summary_or_id(build).await
        } else {
            render_or_id(&template, build).await
        };
        println!("{line}");
    }
    Ok(())
}

async fn show_param(
    session: &Session,
    url: &str,
    params: &str,
    limit: usize,
    format: Option<&str>,
) -> Result<()> {
    let names: Vec<String> = params
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    anyhow::ensure!(!names.is_empty(), "No parameter names given in '{params}'");
    let template = session.template(format)?;

    let start = session.build(url).await?;

    let progress = WalkProgress::start(format!("Reading {limit} builds back from {start}"));
    let rows = history::param_history(start, &names, limit).await?;
    progress.clear();

    let mut labels = Vec::with_capacity(rows.len());
    for row in &rows {
        labels.push(render_or_id(&template, &row.build).await);
    }
    println!("{}", output::param_history_table(&names, &rows, &labels));
    Ok(())
}

async fn jobs_in_view(session: &Session, view_url: &str, format: Option<&str>) -> Result<()> {
    let template = session.template(format)?;
    let locator = parse_view_url(view_url)?;
    let client: Arc<dyn JenkinsApi> = Arc::new(JenkinsClient::new(&locator.server, &session.settings)?);

    let builds = Build::latest_in_view(client, &locator.name, session.last)
        .await
        .with_context(|| format!("Failed to list builds in view '{}'", locator.name))?;

    for build in &builds {
        println!("{}", render_or_id(&template, build).await);
    }
    Ok(())
}

async fn inspect(session: &Session, url: &str) -> Result<()> {
    let build = session.build(url).await?;
    let status = build.status().await?;
    let info = build.info().await?;

    let document = json!({
        "build": build.id(),
        "url": build.url(),
        "status": status,
        "info": info,
    });
    output::export_json(&document, true, &mut std::io::stdout().lock())
}

async fn artifact(session: &Session, url: &str, pattern: &str, output: Option<&Path>) -> Result<()> {
    let build = session.build(url).await?;
    let (relative_path, bytes) = build.artifact(pattern).await?;

    let target = match output {
        Some(path) => path.to_path_buf(),
        None => Path::new(&relative_path)
            .file_name()
            .map(PathBuf::from)
            .with_context(|| format!("Artifact path '{relative_path}' has no file name"))?,
    };
    std::fs::write(&target, &bytes)
        .with_context(|| format!("Failed to write {}", target.display()))?;

    eprintln!(
        "{} {} ({} bytes) to {}",
        bright_green("Saved"),
        relative_path,
        bytes.len(),
        target.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_subcommands_with_defaults() {
        let cli = Cli::try_parse_from([
            "jenkins-jinny",
            "search-build",
            "https://ci.example.com/job/deploy/",
            "BRANCH=main",
        ])
        .unwrap();

        assert_eq!(cli.last, LastBuildLink::LastBuild);
        match cli.command {
            Commands::SearchBuild {
                condition, limit, format, ..
            } => {
                assert_eq!(condition, "BRANCH=main");
                assert_eq!(limit, 50);
                assert!(format.is_none());
            }
            _ => panic!("expected search-build"),
        }
    }

    #[test]
    fn parses_global_options_after_subcommand() {
        let cli = Cli::try_parse_from([
            "jenkins-jinny",
            "build-flow",
            "https://ci.example.com/job/deploy/3",
            "--last",
            "lastSuccessfulBuild",
            "-f",
            "{url} {status}",
        ])
        .unwrap();

        assert_eq!(cli.last, LastBuildLink::LastSuccessful);
        assert!(matches!(
            cli.command,
            Commands::BuildFlow { format: Some(ref f), .. } if f == "{url} {status}"
        ));
    }

    #[test]
    fn show_param_accepts_build_column_format() {
        let cli = Cli::try_parse_from([
            "jenkins-jinny",
            "show-param",
            "https://ci.example.com/job/deploy/",
            "BRANCH,DRY_RUN",
            "-f",
            "{number} {status}",
        ])
        .unwrap();

        match cli.command {
            Commands::ShowParam {
                params, limit, format, ..
            } => {
                assert_eq!(params, "BRANCH,DRY_RUN");
                assert_eq!(limit, 50);
                assert_eq!(format.as_deref(), Some("{number} {status}"));
            }
            _ => panic!("expected show-param"),
        }
    }

    #[test]
    fn diff_requires_at_least_one_url() {
        assert!(Cli::try_parse_from(["jenkins-jinny", "diff-job-params"]).is_err());
    }

    #[test]
    fn rejects_unknown_build_link() {
        assert!(Cli::try_parse_from([
            "jenkins-jinny",
            "inspect",
            "https://ci.example.com/job/deploy/",
            "--last",
            "firstBuild",
        ])
        .is_err());
    }

    #[test]
    fn session_template_prefers_flag_over_config() {
        let mut config = Config::default();
        config.output.template = Some("{name}".to_string());
        let session = Session {
            settings: config.client_settings(),
            config,
            last: LastBuildLink::LastBuild,
        };

        assert_eq!(session.template(None).unwrap(), Template::parse("{name}").unwrap());
        assert_eq!(
            session.template(Some("{number}")).unwrap(),
            Template::parse("{number}").unwrap()
        );
        assert!(session.template(Some("{nope}")).is_err());
    }
}

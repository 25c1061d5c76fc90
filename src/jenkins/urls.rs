//! Parsing of the Jenkins web URLs users paste on the command line, and the
//! reverse mapping from job names back to web URLs.

use url::Url;

use crate::error::{JinnyError, Result};

use super::types::LastBuildLink;

/// Which build of a job a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSelector {
    Number(u64),
    Link(LastBuildLink),
}

/// A parsed `{server}/job/{name}[/{build}]` URL.
///
/// Folder jobs (`{server}/job/a/job/b/7`) collapse into the job name `a/b`,
/// the same form Jenkins reports in upstream causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLocator {
    pub server: String,
    pub job_name: String,
    /// `None` for a job URL.
    pub selector: Option<BuildSelector>,
}

/// A parsed `{server}/view/{name}` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewLocator {
    pub server: String,
    pub name: String,
}

pub fn parse_build_url(raw: &str) -> Result<BuildLocator> {
    let malformed = || JinnyError::MalformedUrl(raw.to_string());
    let trimmed = raw.trim().trim_end_matches('/');

    let (server, rest) = trimmed.split_once("/job/").ok_or_else(malformed)?;
    validate_server(server).map_err(|()| malformed())?;

    let mut segments = rest.split('/');
    let mut names = vec![decode(segments.next().ok_or_else(malformed)?).ok_or_else(malformed)?];
    let mut selector = None;

    while let Some(segment) = segments.next() {
        if selector.is_some() {
            return Err(malformed());
        }
        if segment == "job" {
            let name = segments.next().and_then(decode).ok_or_else(malformed)?;
            names.push(name);
        } else {
            selector = Some(parse_selector(segment).ok_or_else(malformed)?);
        }
    }

    Ok(BuildLocator {
        server: server.to_string(),
        job_name: names.join("/"),
        selector,
    })
}

pub fn parse_view_url(raw: &str) -> Result<ViewLocator> {
    let malformed = || JinnyError::MalformedUrl(raw.to_string());
    let trimmed = raw.trim().trim_end_matches('/');

    let (server, name) = trimmed.split_once("/view/").ok_or_else(malformed)?;
    validate_server(server).map_err(|()| malformed())?;
    if name.contains('/') {
        return Err(malformed());
    }
    let name = decode(name).ok_or_else(malformed)?;

    Ok(ViewLocator {
        server: server.to_string(),
        name,
    })
}

/// Relative path of a job below the server root, e.g. `job/a/job/b`.
///
/// Segments are percent-encoded when `encode` is set, which is what the
/// API client needs; display URLs keep the plain names.
pub fn job_path(job_name: &str, encode: bool) -> String {
    job_name
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            if encode {
                format!("job/{}", urlencoding::encode(segment))
            } else {
                format!("job/{segment}")
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Web URL of a build, the form `parse_build_url` accepts back.
pub fn build_url(server: &str, job_name: &str, number: u64) -> String {
    format!(
        "{}/{}/{number}",
        server.trim_end_matches('/'),
        job_path(job_name, false)
    )
}

fn validate_server(server: &str) -> std::result::Result<(), ()> {
    let url = Url::parse(server).map_err(|_| ())?;
    if url.host_str().is_none() || !matches!(url.scheme(), "http" | "https") {
        return Err(());
    }
    Ok(())
}

fn parse_selector(segment: &str) -> Option<BuildSelector> {
    if let Ok(number) = segment.parse::<u64>() {
        return Some(BuildSelector::Number(number));
    }
    segment.parse::<LastBuildLink>().ok().map(BuildSelector::Link)
}

fn decode(segment: &str) -> Option<String> {
    if segment.is_empty() {
        return None;
    }
    urlencoding::decode(segment).ok().map(|s| s.into_owned())
}

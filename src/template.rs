//! User-supplied output templates such as `"{url} {status} {param.BRANCH}"`.
//!
//! Placeholders: `name`, `number`, `url`, `status`, `duration`,
//! `display_name`, `start_time` and `param.<NAME>`. `{{` and `}}` are literal
//! braces, and `{field:N}` pads the value to N columns (`{field:>N}` pads on
//! the left). An empty template renders a build as `job#number`.

use std::fmt::Write as _;
use std::str::FromStr;
use std::time::Duration;

use crate::build::Build;
use crate::error::{JinnyError, Result};

/// Rendered for attributes the server did not report.
pub const ABSENT: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Field {
    Name,
    Number,
    Url,
    Status,
    Duration,
    DisplayName,
    StartTime,
    Param(String),
}

impl FromStr for Field {
    type Err = JinnyError;

    fn from_str(s: &str) -> Result<Self> {
        let field = match s {
            "name" => Self::Name,
            "number" => Self::Number,
            "url" => Self::Url,
            "status" => Self::Status,
            "duration" => Self::Duration,
            "display_name" => Self::DisplayName,
            "start_time" => Self::StartTime,
            other => match other.strip_prefix("param.") {
                Some(param) if !param.is_empty() => Self::Param(param.to_string()),
                _ => return Err(JinnyError::Template(format!("unknown field '{other}'"))),
            },
        };
        Ok(field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field {
        field: Field,
        width: Option<(Align, usize)>,
    },
}

/// A parsed output template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut placeholder = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => placeholder.push(c),
                            None => {
                                return Err(JinnyError::Template(format!(
                                    "unclosed '{{' in \"{source}\""
                                )))
                            }
                        }
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(parse_placeholder(&placeholder)?);
                }
                '}' => {
                    return Err(JinnyError::Template(format!(
                        "single '}}' in \"{source}\" (use '}}}}' for a literal brace)"
                    )))
                }
                c => literal.push(c),
            }
        }

        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Ok(Self { segments })
    }

    /// True for the empty template, which renders `job#number`.
    pub fn is_default(&self) -> bool {
        self.segments.is_empty()
    }

    /// Renders `build`, fetching only the metadata the template refers to.
    ///
    /// # Errors
    ///
    /// Propagates metadata lookup failures for `status`, `duration`,
    /// `display_name`, `start_time` and parameters.
    pub async fn render(&self, build: &Build) -> Result<String> {
        if self.is_default() {
            return Ok(build.to_string());
        }

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { field, width } => {
                    let value = resolve(field, build).await?;
                    pad_into(&mut out, &value, *width);
                }
            }
        }
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = JinnyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_placeholder(placeholder: &str) -> Result<Segment> {
    let (name, width_spec) = match placeholder.split_once(':') {
        Some((name, width_spec)) => (name.trim(), Some(width_spec.trim())),
        None => (placeholder.trim(), None),
    };

    let width = width_spec
        .map(|width_spec| {
            let (align, digits) = match width_spec.strip_prefix('>') {
                Some(rest) => (Align::Right, rest),
                None => (Align::Left, width_spec.strip_prefix('<').unwrap_or(width_spec)),
            };
            digits
                .parse::<usize>()
                .map(|n| (align, n))
                .map_err(|_| JinnyError::Template(format!("bad width '{width_spec}' for '{name}'")))
        })
        .transpose()?;

    Ok(Segment::Field {
        field: name.parse()?,
        width,
    })
}

async fn resolve(field: &Field, build: &Build) -> Result<String> {
    let value = match field {
        Field::Name => build.job_name().to_string(),
        Field::Number => build.number().to_string(),
        Field::Url => build.url(),
        Field::Status => build.status().await?.to_string(),
        Field::Duration => build
            .duration()
            .await?
            .map_or_else(|| ABSENT.to_string(), format_duration),
        Field::DisplayName => build.display_name().await?.unwrap_or(ABSENT).to_string(),
        Field::StartTime => build.start_time().await?.map_or_else(
            || ABSENT.to_string(),
            |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
        ),
        Field::Param(name) => build.parameters().await?.get_or_placeholder(name).to_string(),
    };
    Ok(value)
}

fn pad_into(out: &mut String, value: &str, width: Option<(Align, usize)>) {
    // Writing to a String cannot fail.
    let _ = match width {
        Some((Align::Left, n)) => write!(out, "{value:<n$}"),
        Some((Align::Right, n)) => write!(out, "{value:>n$}"),
        None => write!(out, "{value}"),
    };
}

/// `job#number`, duration, status and URL on one line, used for search hits
/// when no template is given.
pub async fn summary_line(build: &Build) -> Result<String> {
    let duration = build
        .duration()
        .await?
        .map_or_else(|| ABSENT.to_string(), format_duration);
    let status = build.status().await?;
    Ok(format!("{:40} {duration} {status:12} {}", build.id(), build.url()))
}

/// `H:MM:SS`, the way build durations read in the Jenkins UI tooltips.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jenkins::fake::{parameters_action, FakeJenkins, FAKE_SERVER};
    use serde_json::json;
    use std::sync::Arc;

    fn sample_build() -> Build {
        let fake = FakeJenkins::new().with_build(
            "deploy",
            7,
            json!({
                "number": 7,
                "result": "FAILURE",
                "displayName": "#7 hotfix",
                "timestamp": 1_700_000_000_000_i64,
                "duration": 3_725_000,
                "actions": [parameters_action(&[("BRANCH", "release/1.2")])]
            }),
        );
        Build::new(Arc::new(fake), "deploy", 7)
    }

    mod parse {
        use super::*;

        #[test]
        fn empty_template_is_default() {
            assert!(Template::parse("").unwrap().is_default());
            assert!(!Template::parse("{name}").unwrap().is_default());
        }

        #[test]
        fn rejects_unknown_fields() {
            let err = Template::parse("{colour}").unwrap_err();
            assert!(matches!(err, JinnyError::Template(_)));
            assert!(Template::parse("{param.}").is_err());
        }

        #[test]
        fn rejects_unbalanced_braces() {
            assert!(Template::parse("{name").is_err());
            assert!(Template::parse("name}").is_err());
        }

        #[test]
        fn rejects_bad_width() {
            assert!(Template::parse("{name:wide}").is_err());
        }
    }

    #[tokio::test]
    async fn renders_all_fields() {
        let build = sample_build();
        let template = Template::parse(
            "{name} {number} {status} {duration} {display_name} {start_time} {param.BRANCH} {url}",
        )
        .unwrap();

        let rendered = template.render(&build).await.unwrap();

        assert_eq!(
            rendered,
            format!(
                "deploy 7 FAILURE 1:02:05 #7 hotfix 2023-11-14 22:13:20 release/1.2 {FAKE_SERVER}/job/deploy/7"
            )
        );
    }

    #[tokio::test]
    async fn summary_line_pads_identifier_and_status() {
        let line = summary_line(&sample_build()).await.unwrap();

        assert_eq!(
            line,
            format!("{:40} 1:02:05 {:12} {FAKE_SERVER}/job/deploy/7", "deploy#7", "FAILURE")
        );
    }

    #[tokio::test]
    async fn missing_parameter_renders_placeholder() {
        let build = sample_build();
        let template = Template::parse("{param.NOPE}").unwrap();
        assert_eq!(template.render(&build).await.unwrap(), "noitem");
    }

    #[tokio::test]
    async fn default_template_renders_identifier_without_fetching() {
        let build = Build::new(Arc::new(FakeJenkins::new()), "offline", 2);
        assert_eq!(Template::default().render(&build).await.unwrap(), "offline#2");
    }

    #[tokio::test]
    async fn escapes_and_widths() {
        let build = sample_build();
        let template = Template::parse("{{{name:8}|{number:>4}}}").unwrap();
        assert_eq!(template.render(&build).await.unwrap(), "{deploy  |   7}");
    }

    #[tokio::test]
    async fn literal_only_template_needs_no_metadata() {
        let build = Build::new(Arc::new(FakeJenkins::new()), "offline", 2);
        let template = Template::parse("{name}#{number}").unwrap();
        assert_eq!(template.render(&build).await.unwrap(), "offline#2");
    }

    #[test]
    fn formats_durations_as_hours_minutes_seconds() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00:00");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
        assert_eq!(format_duration(Duration::from_secs(90_000)), "25:00:00");
    }
}

//! Walks a job's history through `previousBuild` links.
//!
//! Search conditions are comma-separated clauses: `PARAM=VALUE` matches
//! exactly and `PARAM>VALUE` matches a substring, e.g.
//! `START_TESTS=true,AGENT>linux`.

use log::{debug, info};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::build::Build;
use crate::error::{JinnyError, Result};
use crate::params::{ParameterSet, NOT_DEFINED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Equals,
    /// `>`
    Contains,
}

impl Operator {
    fn symbol(self) -> char {
        match self {
            Self::Equals => '=',
            Self::Contains => '>',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub param: String,
    pub operator: Operator,
    pub value: String,
}

impl Clause {
    /// A build lacking the parameter never matches.
    pub fn matches(&self, params: &ParameterSet) -> bool {
        match (params.get(&self.param), self.operator) {
            (Some(actual), Operator::Equals) => actual == self.value,
            (Some(actual), Operator::Contains) => actual.contains(self.value.as_str()),
            (None, _) => false,
        }
    }
}

impl FromStr for Clause {
    type Err = JinnyError;

    fn from_str(raw: &str) -> Result<Self> {
        let missing = || JinnyError::MissingConditionOperand(raw.trim().to_string());

        let (at, operator) = raw
            .char_indices()
            .find_map(|(at, c)| match c {
                '=' => Some((at, Operator::Equals)),
                '>' => Some((at, Operator::Contains)),
                _ => None,
            })
            .ok_or_else(missing)?;

        let param = raw[..at].trim();
        if param.is_empty() {
            return Err(missing());
        }

        Ok(Self {
            param: param.to_string(),
            operator,
            value: raw[at + 1..].trim().to_string(),
        })
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.param, self.operator.symbol(), self.value)
    }
}

/// Conjunction of clauses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    clauses: Vec<Clause>,
}

impl Condition {
    pub fn parse(raw: &str) -> Result<Self> {
        let clauses = raw
            .split(',')
            .map(str::parse)
            .collect::<Result<Vec<Clause>>>()?;
        Ok(Self { clauses })
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn matches(&self, params: &ParameterSet) -> bool {
        self.clauses.iter().all(|clause| clause.matches(params))
    }
}

impl FromStr for Condition {
    type Err = JinnyError;

    fn from_str(raw: &str) -> Result<Self> {
        Self::parse(raw)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.clauses.iter().map(Clause::to_string).collect();
        f.write_str(&rendered.join(","))
    }
}

#[derive(Default)]
enum Step {
    Start(Arc<Build>),
    After(Arc<Build>),
    #[default]
    Done,
}

/// Builds of one job, newest first, starting from a given build.
///
/// Yields at most `limit` builds. Reaching a build without a previous build
/// ends the walk quietly; any other lookup failure is returned.
pub struct History {
    step: Step,
    remaining: usize,
}

impl History {
    pub fn new(start: Build, limit: usize) -> Self {
        Self {
            step: Step::Start(Arc::new(start)),
            remaining: limit,
        }
    }

    pub async fn next(&mut self) -> Result<Option<Arc<Build>>> {
        if self.remaining == 0 {
            return Ok(None);
        }

        let build = match std::mem::take(&mut self.step) {
            Step::Start(build) => build,
            Step::After(last) => match last.previous().await {
                Ok(previous) => Arc::new(previous),
                Err(JinnyError::NoPreviousBuild(id)) => {
                    info!("Can't get build before {id}, history ends there");
                    return Ok(None);
                }
                Err(err) => return Err(err),
            },
            Step::Done => return Ok(None),
        };

        self.remaining -= 1;
        self.step = Step::After(Arc::clone(&build));
        Ok(Some(build))
    }
}

/// Builds within the first `limit` of history whose parameters satisfy
/// `condition`, newest first.
pub async fn search(start: Build, condition: &Condition, limit: usize) -> Result<Vec<Arc<Build>>> {
    info!("Searching {limit} builds back from {start} for {condition}");

    let mut history = History::new(start, limit);
    let mut found = Vec::new();
    while let Some(build) = history.next().await? {
        if condition.matches(build.parameters().await?) {
            debug!("{build} matches");
            found.push(build);
        }
    }
    Ok(found)
}

/// One row of a parameter history listing.
#[derive(Debug, Clone)]
pub struct ParamHistoryRow {
    pub build: Arc<Build>,
    /// One value per requested name, [`NOT_DEFINED`] where missing.
    pub values: Vec<String>,
}

/// Values of `names` across the first `limit` builds of history.
pub async fn param_history(
    start: Build,
    names: &[String],
    limit: usize,
) -> Result<Vec<ParamHistoryRow>> {
    let mut history = History::new(start, limit);
    let mut rows = Vec::new();
    while let Some(build) = history.next().await? {
        let params = build.parameters().await?;
        let values = names
            .iter()
            .map(|name| params.get(name).unwrap_or(NOT_DEFINED).to_string())
            .collect();
        rows.push(ParamHistoryRow { build, values });
    }
    Ok(rows)
}

/// A build of the history and what triggered it, if anything.
#[derive(Debug, Clone)]
pub struct UpstreamRow {
    pub build: Arc<Build>,
    pub parent: Option<Arc<Build>>,
}

/// Each of the first `limit` builds of history paired with its parent.
pub async fn possible_upstreams(start: Build, limit: usize) -> Result<Vec<UpstreamRow>> {
    let mut history = History::new(start, limit);
    let mut rows = Vec::new();
    while let Some(build) = history.next().await? {
        let parent = build.parent().await;
        rows.push(UpstreamRow { build, parent });
    }
    Ok(rows)
}

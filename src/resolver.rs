//! Trigger relationships between builds.
//!
//! The parent of a build comes from the upstream cause Jenkins records in its
//! metadata. Children are only visible in the console log, where the
//! parameterized-trigger convention prints `Starting building: <job> #<n>` for
//! every build it schedules. Lookups that fail are logged and treated as "no
//! parent" or "no children" so that one unreachable build cannot abort a walk.

use log::{debug, info, warn};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use crate::build::Build;
use crate::error::{JinnyError, Result};
use crate::jenkins::{BuildInfo, Cause};

const BUILD_UPSTREAM_CAUSE: &str = "BuildUpstreamCause";
const UPSTREAM_CAUSE: &str = "hudson.model.Cause$UpstreamCause";

fn trigger_line() -> &'static Regex {
    static TRIGGER_LINE: OnceLock<Regex> = OnceLock::new();
    TRIGGER_LINE.get_or_init(|| {
        Regex::new(r"Starting building: (?P<job>.+?) #(?P<number>\d+)")
            .expect("trigger line pattern is a valid regex")
    })
}

/// The build that triggered another one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamCause {
    pub job: String,
    pub number: u64,
}

/// Upstream causes in server order.
///
/// Causes recorded by the parameterized-trigger plugin (`BuildUpstreamCause`)
/// take precedence; plain `Cause$UpstreamCause` entries are used only when
/// there are none.
pub fn upstream_causes(info: &BuildInfo) -> Vec<UpstreamCause> {
    let causes = info.causes();
    let of_class = |marker: &str| -> Vec<UpstreamCause> {
        causes
            .iter()
            .filter(|cause| cause.class.as_deref().is_some_and(|c| c.contains(marker)))
            .filter_map(to_upstream)
            .collect()
    };

    let preferred = of_class(BUILD_UPSTREAM_CAUSE);
    if preferred.is_empty() {
        of_class(UPSTREAM_CAUSE)
    } else {
        preferred
    }
}

fn to_upstream(cause: &Cause) -> Option<UpstreamCause> {
    Some(UpstreamCause {
        job: cause.upstream_project.clone()?,
        number: cause.upstream_build?,
    })
}

/// Every `Starting building: <job> #<n>` marker in `console`, in log order.
///
/// Repeated markers are kept.
pub fn parse_trigger_lines(console: &str) -> Vec<(String, u64)> {
    console
        .lines()
        .filter(|line| line.contains("Starting building:"))
        .flat_map(|line| trigger_line().captures_iter(line))
        .filter_map(|caps| {
            let number = caps["number"].parse().ok()?;
            Some((caps["job"].trim().to_string(), number))
        })
        .collect()
}

impl Build {
    /// The build that triggered this one, if any.
    ///
    /// With several upstream causes the first in server order is used and
    /// the ambiguity is logged.
    pub async fn parent(&self) -> Option<Arc<Build>> {
        match self.parent.get_or_try_init(|| self.discover_parent()).await {
            Ok(parent) => parent.clone(),
            Err(e) => {
                warn!("{}", JinnyError::upstream_lookup(self, e));
                None
            }
        }
    }

    async fn discover_parent(&self) -> Result<Option<Arc<Build>>> {
        let causes = upstream_causes(self.info().await?);
        if causes.len() > 1 {
            warn!(
                "{} has {} upstream causes, using the first: {:?}",
                self.url(),
                causes.len(),
                causes
            );
        }
        Ok(causes
            .into_iter()
            .next()
            .map(|cause| Arc::new(self.sibling(cause.job, cause.number))))
    }

    /// Builds this one started, in console-log order.
    ///
    /// Only triggers that print the `Starting building:` marker are found;
    /// the list is not deduplicated.
    pub async fn children(&self) -> &[Arc<Build>] {
        match self
            .children
            .get_or_try_init(|| self.discover_children())
            .await
        {
            Ok(children) => children.as_slice(),
            Err(e) => {
                warn!("{}", JinnyError::upstream_lookup(self, e));
                &[]
            }
        }
    }

    async fn discover_children(&self) -> Result<Vec<Arc<Build>>> {
        let console = self
            .client()
            .console_text(self.job_name(), self.number())
            .await?;
        let children: Vec<Arc<Build>> = parse_trigger_lines(&console)
            .into_iter()
            .map(|(job, number)| Arc::new(self.sibling(job, number)))
            .collect();
        debug!("{self} triggered {} builds", children.len());
        Ok(children)
    }
}

/// Follows parents until a build without one.
///
/// A cycle in the trigger metadata stops the walk at the last build before
/// the repeat.
pub async fn find_root(build: Arc<Build>) -> Arc<Build> {
    let mut visited = HashSet::from([build.id()]);
    let mut current = build;

    loop {
        let Some(parent) = current.parent().await else {
            break;
        };
        if !visited.insert(parent.id()) {
            warn!("Trigger cycle at {parent}, stopping the upstream walk at {current}");
            break;
        }
        current = parent;
    }

    info!("Found root {current}");
    current
}

impl Build {
    /// All builds transitively triggered by this one, in depth-first pre-order.
    ///
    /// Each build appears once even when several console lines mention it.
    pub async fn descendants(&self) -> Vec<Arc<Build>> {
        let mut visited = HashSet::from([self.id()]);
        let mut stack: Vec<Arc<Build>> = self.children().await.iter().rev().cloned().collect();
        let mut result = Vec::new();

        while let Some(next) = stack.pop() {
            if !visited.insert(next.id()) {
                continue;
            }
            stack.extend(next.children().await.iter().rev().cloned());
            result.push(next);
        }

        result
    }

    /// Descendants whose job name contains `pattern`.
    pub async fn children_matching(&self, pattern: &str) -> Vec<Arc<Build>> {
        self.descendants()
            .await
            .into_iter()
            .filter(|child| child.job_name().contains(pattern))
            .collect()
    }
}

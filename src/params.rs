//! Build parameters and the cross-build parameter comparison.

use futures::future::join_all;
use indexmap::IndexMap;
use log::info;
use std::collections::BTreeSet;
use std::fmt;

use crate::build::Build;
use crate::error::Result;
use crate::jenkins::ParameterValue;

/// Returned by `ParameterSet::get_or_placeholder` for parameters a build does not define.
pub const MISSING_PARAMETER: &str = "noitem";

/// Cell value in a comparison table for a build that lacks the parameter.
pub const NOT_DEFINED: &str = "n/d";

/// Parameter name to string value, in the order the server reported them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterSet(IndexMap<String, String>);

impl ParameterSet {
    pub fn from_values(values: &[ParameterValue]) -> Self {
        values
            .iter()
            .map(|param| (param.name.clone(), param.value_string()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Value of `name`, or [`MISSING_PARAMETER`] when absent.
    pub fn get_or_placeholder(&self, name: &str) -> &str {
        self.get(name).unwrap_or(MISSING_PARAMETER)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.iter().map(|(k, v)| format!("{k}={v}")).collect();
        f.write_str(&rendered.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterRow {
    pub name: String,
    /// One value per column, [`NOT_DEFINED`] where the build lacks the parameter.
    pub values: Vec<String>,
}

impl ParameterRow {
    /// True when some value differs from the first column's.
    pub fn differs(&self) -> bool {
        match self.values.split_first() {
            Some((first, rest)) => rest.iter().any(|value| value != first),
            None => false,
        }
    }
}

/// Parameters of several builds side by side.
///
/// Rows are the sorted union of parameter names; columns follow the order in
/// which the builds were given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterTable {
    pub columns: Vec<String>,
    pub rows: Vec<ParameterRow>,
}

impl ParameterTable {
    pub fn from_sets(columns: Vec<String>, sets: &[ParameterSet]) -> Self {
        let names: BTreeSet<&str> = sets.iter().flat_map(ParameterSet::names).collect();

        let rows = names
            .into_iter()
            .map(|name| ParameterRow {
                name: name.to_string(),
                values: sets
                    .iter()
                    .map(|set| set.get(name).unwrap_or(NOT_DEFINED).to_string())
                    .collect(),
            })
            .collect();

        Self { columns, rows }
    }

    /// Keeps only rows where at least one build disagrees with the first.
    #[must_use]
    pub fn differing_only(mut self) -> Self {
        self.rows.retain(ParameterRow::differs);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fetches every build's parameters concurrently and tabulates them.
///
/// # Errors
///
/// Fails on the first build whose metadata cannot be fetched.
pub async fn compare(builds: &[Build]) -> Result<ParameterTable> {
    info!("Comparing parameters of {} builds", builds.len());

    let fetched = join_all(builds.iter().map(Build::parameters)).await;
    let sets = fetched
        .into_iter()
        .map(|result| result.cloned())
        .collect::<Result<Vec<_>>>()?;

    let columns = builds.iter().map(Build::id).collect();
    Ok(ParameterTable::from_sets(columns, &sets))
}

//! Inspect how Jenkins builds relate to each other: which build triggered
//! which, how their parameters differ, and what a job's history looks like.

pub mod auth;
pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod flow;
pub mod history;
pub mod jenkins;
pub mod output;
pub mod params;
pub mod resolver;
pub mod template;

pub use build::Build;
pub use error::{JinnyError, Result};
pub use flow::{BuildFlow, FlowEntry};
pub use jenkins::{ClientSettings, JenkinsApi, JenkinsClient, LastBuildLink};

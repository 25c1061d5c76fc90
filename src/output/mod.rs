mod exports;
mod progress;
mod styling;
mod tables;

pub use exports::{export_html, export_json, write_html};
pub use progress::WalkProgress;
pub use styling::{bright_green, cyan, dim, magenta_bold};
pub use tables::{param_history_table, parameter_table};

use env_logger::Env;

/// Filter used when `RUST_LOG` is unset. Resolver warnings reach the operator.
const DEFAULT_LOG_FILTER: &str = "warn";

fn logger(filter_var: &str) -> env_logger::Builder {
    env_logger::Builder::from_env(
        Env::new()
            .filter_or(filter_var, DEFAULT_LOG_FILTER)
            .write_style("RUST_LOG_STYLE"),
    )
}

/// Installs the global logger, configured by `RUST_LOG`.
pub fn init_logging() {
    logger("RUST_LOG").init();
}

/// Prints the Jenkins Jinny banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("Jenkins Jinny"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Jenkins build relationship inspector")
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::LevelFilter;

    #[test]
    fn warnings_are_shown_without_a_filter_variable() {
        std::env::remove_var("JINNY_TEST_UNSET_LOG");
        assert_eq!(logger("JINNY_TEST_UNSET_LOG").build().filter(), LevelFilter::Warn);
    }

    #[test]
    fn filter_variable_overrides_the_default() {
        std::env::set_var("JINNY_TEST_DEBUG_LOG", "debug");
        assert_eq!(logger("JINNY_TEST_DEBUG_LOG").build().filter(), LevelFilter::Debug);
    }
}

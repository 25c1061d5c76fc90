use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;

use super::styling::{bright_green, bright_yellow};

/// Spinner on stderr for walks over many builds.
pub struct WalkProgress {
    pb: ProgressBar,
}

impl WalkProgress {
    pub fn start(message: impl std::fmt::Display) -> Self {
        Self {
            pb: create_spinner(bright_yellow(message).to_string()),
        }
    }

    pub fn update(&self, message: impl std::fmt::Display) {
        self.pb.set_message(bright_yellow(message).to_string());
    }

    pub fn finish(self, message: impl std::fmt::Display) {
        self.pb
            .finish_with_message(bright_green(format!("{message} ✓")).to_string());
    }

    /// Removes the spinner without leaving a line behind.
    pub fn clear(self) {
        self.pb.finish_and_clear();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

//! Progress reporting for the build pipeline.
//!
//! `NoopProgress` for servers and tests, `IndicatifProgress` for the CLI.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

pub trait Progress: Send + Sync {
    fn set_total(&self, _n: u64) {}
    /// Advance by one item and show a short message.
    fn step(&self, _msg: &str) {}
    fn message(&self, _msg: &str) {}
    fn finish(&self, _msg: &str) {}
}

#[derive(Default, Clone, Copy)]
pub struct NoopProgress;
impl Progress for NoopProgress {}

pub struct IndicatifProgress {
    pb: ProgressBar,
}

impl IndicatifProgress {
    /// Spinner for an unknown total.
    pub fn spinner() -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
            pb.set_style(style.tick_chars("-\\|/ "));
        }
        pb.enable_steady_tick(Duration::from_millis(80));
        Self { pb }
    }

    pub fn bar(len: u64) -> Self {
        let pb = ProgressBar::new(len);
        if let Ok(style) =
            ProgressStyle::with_template("{bar:40.cyan/blue} {pos:>4}/{len:4} {wide_msg}")
        {
            pb.set_style(style);
        }
        Self { pb }
    }
}

impl Progress for IndicatifProgress {
    fn set_total(&self, n: u64) {
        self.pb.set_length(n);
        self.pb.set_position(0);
    }
    fn step(&self, msg: &str) {
        self.pb.inc(1);
        self.pb.set_message(msg.to_string());
    }
    fn message(&self, msg: &str) {
        self.pb.set_message(msg.to_string());
    }
    fn finish(&self, msg: &str) {
        self.pb.finish_with_message(msg.to_string());
    }
}

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the `csv_mapper` binary.
//!
//! [`IndicatifProgress`] renders batch progress as an `indicatif` bar, and
//! [`init_logger`] routes `log` output through `indicatif-log-bridge` so
//! log lines do not tear the bar while it redraws.

use std::sync::Arc;
use std::time::Duration;

use csv_mapper_batch::{ProgressCallback, estimated_time_remaining, format_eta};
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Terminal bar for one geocoding batch.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `set_total()` provides a known length.
    bar_style: ProgressStyle,
    /// Release spacing used for the countdown shown in the prefix.
    min_interval: Duration,
}

impl IndicatifProgress {
    /// Creates a geocoding bar that starts as a spinner and turns into a
    /// full bar once the batch size is known.
    ///
    /// The prefix shows a pessimistic countdown: every outstanding record
    /// is assumed to need one full `min_interval` slot.
    #[must_use]
    pub fn geocoding_bar(
        multi: &MultiProgress,
        message: &str,
        min_interval: Duration,
    ) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::new(multi.add(ProgressBar::new_spinner()), message, min_interval))
    }

    fn new(bar: ProgressBar, message: &str, min_interval: Duration) -> Self {
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.yellow} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());

        let bar_style = ProgressStyle::with_template(
            "  {msg} {wide_bar:.yellow/dim} {pos}/{len} {percent}% [ETA {prefix}]",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Self {
            bar,
            bar_style,
            min_interval,
        }
    }

    fn update_countdown(&self) {
        let remaining = self
            .bar
            .length()
            .unwrap_or(0)
            .saturating_sub(self.bar.position());
        self.bar
            .set_prefix(format_eta(estimated_time_remaining(remaining, self.min_interval)));
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
        self.update_countdown();
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
        self.update_countdown();
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge`.
///
/// Logs at `info` unless `RUST_LOG` says otherwise, so unresolved
/// addresses are reported without extra setup. Every bar must be added to
/// the returned [`MultiProgress`] for log lines to be drawn above it.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hidden(min_interval: Duration) -> IndicatifProgress {
        IndicatifProgress::new(ProgressBar::hidden(), "Geocoding", min_interval)
    }

    #[test]
    fn countdown_shrinks_as_records_complete() {
        let progress = hidden(Duration::from_millis(1300));
        progress.set_total(100);
        assert_eq!(progress.bar.prefix(), "2:10");

        progress.inc(50);
        assert_eq!(progress.bar.prefix(), "1:05");

        progress.inc(50);
        assert_eq!(progress.bar.prefix(), "0:00");
    }

    #[test]
    fn new_batch_resets_position() {
        let progress = hidden(Duration::from_secs(1));
        progress.set_total(3);
        progress.inc(2);
        progress.set_total(5);
        assert_eq!(progress.bar.position(), 0);
        assert_eq!(progress.bar.length(), Some(5));
        assert_eq!(progress.bar.prefix(), "0:05");
    }
}

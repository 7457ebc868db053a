//! Terminal output for driver runs.
//!
//! Status lines go to stdout, failures and warnings to stderr. Colors are
//! only used when the stream supports them.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream};

use drvbuild_lib::dispatch::{SubBuildOutcome, SubBuildStatus};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const WARNING: &str = "⚠";
  pub const INFO: &str = "•";
}

/// Descriptor size. Fragments are small, so KiB is as large as it gets.
pub fn format_bytes(bytes: u64) -> String {
  if bytes < 1024 {
    format!("{bytes} B")
  } else {
    format!("{:.1} KiB", bytes as f64 / 1024.0)
  }
}

pub fn format_duration(duration: Duration) -> String {
  let secs = duration.as_secs();
  let millis = duration.subsec_millis();

  if secs >= 60 {
    let mins = secs / 60;
    let remaining_secs = secs % 60;
    format!("{}m {}s", mins, remaining_secs)
  } else if secs > 0 {
    format!("{}.{:02}s", secs, millis / 10)
  } else {
    format!("{}ms", millis)
  }
}

/// Comma separated list, or a dash when empty.
pub fn format_list(items: &[String]) -> String {
  if items.is_empty() {
    "-".to_string()
  } else {
    items.join(", ")
  }
}

pub fn print_success(message: &str) {
  println!(
    "{} {}",
    symbols::SUCCESS.if_supports_color(Stream::Stdout, |s| s.green()),
    message
  );
}

pub fn print_error(message: &str) {
  eprintln!(
    "{} {}",
    symbols::ERROR.if_supports_color(Stream::Stderr, |s| s.red()),
    message.if_supports_color(Stream::Stderr, |s| s.red())
  );
}

pub fn print_warning(message: &str) {
  eprintln!(
    "{} {}",
    symbols::WARNING.if_supports_color(Stream::Stderr, |s| s.yellow()),
    message.if_supports_color(Stream::Stderr, |s| s.yellow())
  );
}

pub fn print_info(message: &str) {
  println!(
    "{} {}",
    symbols::INFO.if_supports_color(Stream::Stdout, |s| s.blue()),
    message
  );
}

pub fn print_stat(label: &str, value: &str) {
  println!(
    "  {}: {}",
    label.if_supports_color(Stream::Stdout, |s| s.dimmed()),
    value
  );
}

/// One line per module sub-build.
pub fn print_outcome(outcome: &SubBuildOutcome) {
  let elapsed = format_duration(Duration::from_millis(outcome.duration_ms));
  match &outcome.status {
    SubBuildStatus::Succeeded => print_success(&format!("{} ({})", outcome.driver, elapsed)),
    SubBuildStatus::Cancelled => print_warning(&format!("{} cancelled", outcome.driver)),
    status => print_error(&format!("{} {} ({})", outcome.driver, status, elapsed)),
  }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{}", json);
  Ok(())
}

//! Terminal output: status lines, deploy progress, stats and JSON.

use std::time::Duration;

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{OwoColorize, Stream, Style};

use microdeploy_lib::progress::{Progress, Stage};

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

const SUCCESS: &str = "✓";
const FAILURE: &str = "✗";
const INFO: &str = "•";

fn marked(stream: Stream, mark: &str, style: Style, message: &str) -> String {
  format!("{} {}", mark.if_supports_color(stream, |m| m.style(style)), message)
}

pub fn print_success(message: &str) {
  println!("{}", marked(Stream::Stdout, SUCCESS, Style::new().green(), message));
}

pub fn print_info(message: &str) {
  println!("{}", marked(Stream::Stdout, INFO, Style::new().blue(), message));
}

pub fn print_error(message: &str) {
  eprintln!("{}", marked(Stream::Stderr, FAILURE, Style::new().red(), message));
}

pub fn print_stat(label: &str, value: &str) {
  println!("  {}: {value}", label.if_supports_color(Stream::Stdout, |l| l.dimmed()));
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let json = serde_json::to_string_pretty(value).context("Failed to serialize to JSON")?;
  println!("{json}");
  Ok(())
}

/// Size in the largest binary unit that keeps the value at or above one.
pub fn format_bytes(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

  if bytes < 1024 {
    return format!("{bytes} B");
  }
  let mut value = bytes as f64 / 1024.0;
  let mut unit = 0;
  while value >= 1024.0 && unit + 1 < UNITS.len() {
    value /= 1024.0;
    unit += 1;
  }
  format!("{value:.1} {}", UNITS[unit])
}

/// Human-readable duration, rounded to milliseconds.
pub fn format_duration(duration: Duration) -> String {
  let millis = Duration::from_millis(duration.as_millis() as u64);
  if millis.is_zero() {
    return "0ms".to_string();
  }
  humantime::format_duration(millis).to_string()
}

/// Prints a line per package or job as the deploy works through it.
///
/// `Started compiling packages > name` is printed before a package's
/// packaging script runs, so a failed deploy still shows how far it got.
pub struct StageReporter;

impl StageReporter {
  fn line(verb: &str, stage: Stage, item: &str) -> String {
    let stage = stage.to_string();
    format!("{verb} {stage} > {item}")
  }
}

impl Progress for StageReporter {
  fn started(&self, stage: Stage, item: &str) {
    println!("{}", marked(Stream::Stdout, INFO, Style::new().blue(), &Self::line("Started", stage, item)));
  }

  fn finished(&self, stage: Stage, item: &str) {
    println!("{}", marked(Stream::Stdout, SUCCESS, Style::new().green(), &Self::line("Done", stage, item)));
  }

  fn cached(&self, stage: Stage, item: &str) {
    let message = format!("{} (cached)", Self::line("Skipped", stage, item));
    println!("{}", marked(Stream::Stdout, SUCCESS, Style::new().green(), &message));
  }

  fn failed(&self, stage: Stage, item: &str, _error: &str) {
    println!("{}", marked(Stream::Stdout, FAILURE, Style::new().red(), &Self::line("Failed", stage, item)));
  }
}

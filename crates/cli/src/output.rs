//! CLI output formatting utilities.
//!
//! Provides consistent formatting for terminal output including colored status
//! messages, human-readable byte/duration formatting, Unicode symbols and the
//! download progress bar.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Stream};

use nfpm_helper_lib::cache::DownloadProgress;

pub mod symbols {
  pub const SUCCESS: &str = "✓";
  pub const ERROR: &str = "✗";
  pub const INFO: &str = "•";
  pub const ARROW: &str = "→";
}

pub fn format_bytes(bytes: u64) -> String {
  const KB: u64 = 1024;
  const MB: u64 = KB * 1024;
  const GB: u64 = MB * 1024;

  if bytes >= GB {
    format!("{:.1} GB", bytes as f64 / GB as f64)
  } else if bytes >= MB {
    format!("{:.1} MB", bytes as f64 / MB as f64)
  } else if bytes >= KB {
    format!("{:.1} KB", bytes as f64 / KB as f64)
  } else {
    format!("{} B", bytes)
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

/// Download progress drawn as a byte bar on stderr.
///
/// Falls back to a spinner when the server sends no content length. Nothing
/// is drawn when stderr is not a terminal. A one-line summary with the
/// transferred size is printed once the download completes.
#[derive(Default)]
pub struct TerminalProgress {
  bar: Mutex<Option<Transfer>>,
}

struct Transfer {
  bar: ProgressBar,
  label: String,
}

impl TerminalProgress {
  pub fn new() -> Self {
    Self::default()
  }
}

fn bar_style(total_known: bool) -> ProgressStyle {
  let template = if total_known {
    "  {spinner:.dim} {msg}  {bytes:>10}/{total_bytes:<10} [{bar:20.cyan/dim}]"
  } else {
    "  {spinner:.dim} {msg}  {bytes:>10}"
  };

  ProgressStyle::default_bar()
    .template(template)
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏✔")
    .progress_chars("━░")
}

fn download_summary(label: &str, bytes: u64) -> String {
  format!("Downloaded {} ({})", label, format_bytes(bytes))
}

/// Last path segment of a URL, for display.
fn download_label(url: &str) -> &str {
  let path = url.split(['?', '#']).next().unwrap_or(url);
  path.rsplit('/').find(|segment| !segment.is_empty()).unwrap_or(url)
}

impl DownloadProgress for TerminalProgress {
  fn started(&self, url: &str, total: Option<u64>) {
    let bar = match total {
      Some(total) => ProgressBar::new(total),
      None => ProgressBar::new_spinner(),
    };
    bar.set_style(bar_style(total.is_some()));
    let label = download_label(url).to_string();
    bar.set_message(format!("{} {}", symbols::ARROW, label));
    bar.enable_steady_tick(Duration::from_millis(80));

    if let Ok(mut slot) = self.bar.lock() {
      *slot = Some(Transfer { bar, label });
    }
  }

  fn advanced(&self, bytes: u64) {
    if let Ok(slot) = self.bar.lock()
      && let Some(transfer) = slot.as_ref()
    {
      transfer.bar.inc(bytes);
    }
  }

  fn finished(&self) {
    if let Ok(mut slot) = self.bar.lock()
      && let Some(transfer) = slot.take()
    {
      let bytes = transfer.bar.position();
      transfer.bar.finish_and_clear();
      print_info(&download_summary(&transfer.label, bytes));
    }
  }
}

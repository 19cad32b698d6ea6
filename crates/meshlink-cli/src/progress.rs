//! Wait spinner and output formatting.

use indicatif::{ProgressBar, ProgressStyle};
use meshlink_proto::{NodeInfo, Position, node_id_string};
use std::future::Future;
use std::time::Duration;

/// Spinner shown while a request is outstanding
pub struct WaitSpinner {
    bar: ProgressBar,
}

impl WaitSpinner {
    /// Start spinning with `message`
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.into());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// Remove the spinner from the terminal
    pub fn clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Await `future` with a spinner on screen.
pub async fn with_spinner<F: Future>(message: impl Into<String>, future: F) -> F::Output {
    let spinner = WaitSpinner::new(message);
    let output = future.await;
    spinner.clear();
    output
}

/// One-line summary of a node database entry
#[must_use]
pub fn format_node(node: &NodeInfo) -> String {
    let (long_name, short_name) = node
        .user
        .as_ref()
        .map_or(("", ""), |u| (u.long_name.as_str(), u.short_name.as_str()));
    let hops = node
        .hops_away
        .map_or_else(|| "-".to_string(), |h| h.to_string());
    format!(
        "{}  {:<4} {:<24} hops {:<2} ch {} snr {:.1}{}",
        node_id_string(node.num),
        short_name,
        long_name,
        hops,
        node.channel,
        node.snr,
        if node.is_favorite { "  *" } else { "" }
    )
}

/// Coordinates of a position, or a note when it carries none
#[must_use]
pub fn format_position(position: &Position) -> String {
    match (position.latitude(), position.longitude()) {
        (Some(lat), Some(lon)) => {
            let altitude = position
                .altitude
                .map_or_else(String::new, |a| format!(", {a} m"));
            format!("{lat:.5}, {lon:.5}{altitude}")
        }
        _ => "no fix".to_string(),
    }
}

/// Format duration in human-readable format
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1000 {
        format!("{millis} ms")
    } else if millis < 60_000 {
        format!("{:.1}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

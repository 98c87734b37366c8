//! Progress bar helper shared by the long-running loops.

use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar labelled with `label`.
pub(crate) fn progress_bar(len: usize, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
    bar.set_style(style);
    bar.set_message(label.to_string());
    bar
}

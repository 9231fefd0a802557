//! Progress bar over photo pages.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Builds the photo-page progress bar, or `None` when progress is disabled.
pub(crate) fn photo_progress_bar(enabled: bool, total: usize) -> Option<ProgressBar> {
    if !enabled || total == 0 {
        return None;
    }
    let bar = ProgressBar::with_draw_target(
        Some(u64::try_from(total).unwrap_or(u64::MAX)),
        ProgressDrawTarget::stderr(),
    );
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {bar:30} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message("downloading images");
    Some(bar)
}

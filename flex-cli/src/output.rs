//! Operator-facing output.

use flex_client::ProgressFn;
use flex_core::SyncOutcome;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

/// Render a pull/push outcome as printed on stdout.
pub fn render_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::UpToDate { .. } => "Assets are up to date.".to_string(),
        SyncOutcome::Pulled {
            version,
            written,
            deleted,
        } => {
            let mut out = format!("Version {} successfully pulled.", version);
            if let Some(summary) = summary(*written, "written", *deleted) {
                out.push('\n');
                out.push_str(&summary);
            }
            out
        }
        SyncOutcome::Pushed {
            version,
            upserted,
            deleted,
        } => {
            let mut out = format!("New version: {}", version);
            if let Some(summary) = summary(*upserted, "updated", *deleted) {
                out.push('\n');
                out.push_str(&summary);
            }
            out
        }
    }
}

fn summary(changed: usize, verb: &str, deleted: usize) -> Option<String> {
    if changed == 0 && deleted == 0 {
        return None;
    }
    Some(format!(
        "  {} {} {}, {} deleted",
        changed,
        if changed == 1 { "asset" } else { "assets" },
        verb,
        deleted
    ))
}

/// A download bar for archive pulls plus the callback that drives it.
///
/// The bar stays hidden until the first chunk arrives, so inline pulls
/// never draw it.
pub fn download_progress() -> (ProgressBar, ProgressFn) {
    let bar = ProgressBar::hidden();
    if let Ok(style) =
        ProgressStyle::with_template("{spinner} Downloading assets {bytes}/{total_bytes} ({bytes_per_sec})")
    {
        bar.set_style(style);
    }
    let driven = bar.clone();
    let callback: ProgressFn = Arc::new(move |received, total| {
        if driven.is_hidden() {
            driven.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        }
        if let Some(total) = total {
            driven.set_length(total);
        }
        driven.set_position(received);
    });
    (bar, callback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_up_to_date() {
        let outcome = SyncOutcome::UpToDate {
            version: "v3".to_string(),
        };
        assert_eq!(render_outcome(&outcome), "Assets are up to date.");
    }

    #[test]
    fn test_pulled() {
        let outcome = SyncOutcome::Pulled {
            version: "v3".to_string(),
            written: 2,
            deleted: 1,
        };
        assert_eq!(
            render_outcome(&outcome),
            "Version v3 successfully pulled.\n  2 assets written, 1 deleted"
        );
    }

    #[test]
    fn test_pulled_empty_bundle() {
        let outcome = SyncOutcome::Pulled {
            version: "v1".to_string(),
            written: 0,
            deleted: 0,
        };
        assert_eq!(render_outcome(&outcome), "Version v1 successfully pulled.");
    }

    #[test]
    fn test_pushed() {
        let outcome = SyncOutcome::Pushed {
            version: "v4".to_string(),
            upserted: 1,
            deleted: 0,
        };
        assert_eq!(
            render_outcome(&outcome),
            "New version: v4\n  1 asset updated, 0 deleted"
        );
    }

    #[test]
    fn test_progress_callback_updates_bar() {
        let (bar, callback) = download_progress();
        callback(10, Some(40));
        assert_eq!(bar.length(), Some(40));
        assert_eq!(bar.position(), 10);
        bar.finish_and_clear();
    }
}

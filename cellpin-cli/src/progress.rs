// ABOUTME: Upload progress display on stderr backed by indicatif
// ABOUTME: Adapts the SDK's transfer observer callbacks to a progress bar

use cellpin_sdk::{TransferObserver, TransferProgress};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;

pub struct UploadProgress {
    bar: ProgressBar,
    label: String,
}

impl UploadProgress {
    /// Progress bar for uploading `label`; hidden when `enabled` is false or
    /// stderr is not a terminal
    pub fn new(label: impl Into<String>, enabled: bool) -> Self {
        let bar = if enabled && std::io::stderr().is_terminal() {
            ProgressBar::new(0)
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:25.cyan/blue}] {pos}/{len} chunks ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        Self {
            bar,
            label: label.into(),
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }
}

impl TransferObserver for UploadProgress {
    fn started(&mut self, total_chunks: usize, _total_bytes: usize) {
        self.bar.set_length(total_chunks as u64);
        self.bar.set_message(format!("Uploading {}", self.label));
    }

    fn progress(&mut self, progress: &TransferProgress) {
        self.bar.set_position(progress.chunks_sent as u64);
        self.bar
            .set_message(format!("Uploading {} {}", self.label, rate(progress)));
    }

    fn finished(&mut self, progress: &TransferProgress) {
        self.bar.set_position(progress.chunks_sent as u64);
        self.bar.finish_and_clear();
        log::info!(
            "sent {} chunk(s) of {} in {:.2?} ({})",
            progress.chunks_sent,
            self.label,
            progress.elapsed,
            rate(progress)
        );
    }
}

fn rate(progress: &TransferProgress) -> String {
    format!("{:.1} KiB/s", progress.bytes_per_second() / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn snapshot(chunks_sent: usize) -> TransferProgress {
        TransferProgress {
            chunks_sent,
            total_chunks: 8,
            bytes_sent: chunks_sent * 4096,
            total_bytes: 8 * 4096,
            elapsed: Duration::from_secs(2),
        }
    }

    #[test]
    fn test_disabled_progress_is_hidden() {
        assert!(UploadProgress::new("cat.png", false).is_hidden());
    }

    #[test]
    fn test_rate_is_in_kib_per_second() {
        assert_eq!(rate(&snapshot(4)), "8.0 KiB/s");
    }

    #[test]
    fn test_observer_tracks_chunks() {
        let mut progress = UploadProgress::new("cat.png", false);
        progress.started(8, 8 * 4096);
        assert_eq!(progress.bar.length(), Some(8));

        progress.progress(&snapshot(4));
        assert_eq!(progress.bar.position(), 4);

        progress.finished(&snapshot(8));
        assert!(progress.bar.is_finished());
    }
}

use std::sync::Arc;

/// Events emitted while updating feeds and downloading episodes
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// A feed is being fetched
    FetchingFeed {
        /// Worker slot (0 to parallelism-1)
        slot: usize,
        url: String,
    },

    /// A fetched feed was merged into its podcast
    FeedUpdated {
        podcast_title: String,
        total_episodes: usize,
        new_episodes: usize,
    },

    /// A feed could not be fetched or merged
    FeedFailed { url: String, error: String },

    /// A download is starting
    DownloadStarting {
        /// Worker slot (0 to parallelism-1)
        download_id: usize,
        episode_title: String,
        /// Index of this episode in the download queue
        episode_index: usize,
        total_to_download: usize,
        content_length: Option<u64>,
    },

    DownloadProgress {
        download_id: usize,
        bytes_downloaded: u64,
        total_bytes: Option<u64>,
    },

    /// Download is being moved into place (renamed from .partial)
    Finalizing {
        download_id: usize,
        episode_title: String,
    },

    DownloadCompleted {
        download_id: usize,
        episode_title: String,
        bytes_downloaded: u64,
    },

    DownloadFailed {
        download_id: usize,
        episode_title: String,
        error: String,
    },

    /// All feeds of an update were processed
    UpdateCompleted {
        updated_count: usize,
        new_episodes: usize,
        failed_count: usize,
    },

    /// All downloads of a batch were processed
    DownloadsCompleted {
        downloaded_count: usize,
        failed_count: usize,
    },
}

/// Trait for reporting progress events.
///
/// Implementations can use this to display progress bars, log messages,
/// or collect statistics.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// A shared reference to a progress reporter
pub type SharedProgressReporter = Arc<dyn ProgressReporter>;

/// A reporter that ignores all events, for tests and quiet mode
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn report(&self, _event: ProgressEvent) {}
}

impl NoopReporter {
    pub fn shared() -> SharedProgressReporter {
        Arc::new(Self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Reporter that records every event it receives
    #[derive(Default)]
    pub(crate) struct RecordingReporter {
        pub(crate) events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[test]
    fn noop_reporter_handles_all_events() {
        let reporter = NoopReporter;

        reporter.report(ProgressEvent::FetchingFeed {
            slot: 0,
            url: "https://example.com/feed.xml".to_string(),
        });
        reporter.report(ProgressEvent::FeedUpdated {
            podcast_title: "Test Podcast".to_string(),
            total_episodes: 10,
            new_episodes: 5,
        });
        reporter.report(ProgressEvent::DownloadFailed {
            download_id: 1,
            episode_title: "Episode 2".to_string(),
            error: "Connection timeout".to_string(),
        });
        reporter.report(ProgressEvent::DownloadsCompleted {
            downloaded_count: 4,
            failed_count: 1,
        });
    }

    #[test]
    fn recording_reporter_keeps_order() {
        let reporter = RecordingReporter::default();
        reporter.report(ProgressEvent::FeedFailed {
            url: "a".to_string(),
            error: "boom".to_string(),
        });
        reporter.report(ProgressEvent::UpdateCompleted {
            updated_count: 0,
            new_episodes: 0,
            failed_count: 1,
        });

        let events = reporter.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ProgressEvent::FeedFailed { .. }));
    }
}

pub mod command;
pub mod config;
pub mod download;
pub mod error;
pub mod feed;
pub mod http;
pub mod manager;
pub mod model;
pub mod progress;
pub mod store;
pub mod sync;

// Re-export main types for convenience
pub use command::{CommandRegistry, builtin_commands};
pub use config::Config;
pub use error::{
    CommandError, ConfigError, DownloadError, FeedError, ManagerError, PodcastError, StoreError,
};
pub use http::{HttpClient, HttpResponse, ReqwestClient};
pub use manager::{DownloadSummary, Manager, PodcastSummary, UpdateSummary};
pub use model::{Episode, EpisodeSelection, EpisodeStatus, Podcast, StatusFilter, TitleFilter};
pub use progress::{NoopReporter, ProgressEvent, ProgressReporter, SharedProgressReporter};
pub use store::PodcastStore;

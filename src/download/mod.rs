mod filename;
mod transfer;

pub use filename::{media_path_for, unique_path};
pub use transfer::{DownloadContext, DownloadRequest, download_episode};

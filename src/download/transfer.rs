use std::path::{Path, PathBuf};

use futures::StreamExt;
use log::debug;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::DownloadError;
use crate::http::HttpClient;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// What to download and where to put it
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub episode_title: String,
    pub media_url: String,
    pub target: PathBuf,
}

/// Context for tracking a download in concurrent scenarios
#[derive(Debug, Clone)]
pub struct DownloadContext {
    /// Slot ID (0 to max_concurrent-1) for progress bar management
    pub download_id: usize,
    /// Index of this episode in the download queue
    pub episode_index: usize,
    pub total_to_download: usize,
}

/// Download an episode's media to `request.target`
///
/// The body is streamed into `<target>.partial`, which is renamed once
/// complete and removed if the transfer fails. Returns the bytes written.
pub async fn download_episode<C: HttpClient>(
    client: &C,
    request: &DownloadRequest,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    if let Some(parent) = request.target.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DownloadError::CreateDirectoryFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
    }

    let partial_path = partial_path(&request.target);
    let result = transfer(client, request, &partial_path, context, reporter).await;

    let bytes_downloaded = match result {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial_path).await;
            return Err(e);
        }
    };

    reporter.report(ProgressEvent::Finalizing {
        download_id: context.download_id,
        episode_title: request.episode_title.clone(),
    });

    if let Err(e) = tokio::fs::rename(&partial_path, &request.target).await {
        let _ = tokio::fs::remove_file(&partial_path).await;
        return Err(DownloadError::FinalizeFailed {
            path: request.target.clone(),
            source: e,
        });
    }

    reporter.report(ProgressEvent::DownloadCompleted {
        download_id: context.download_id,
        episode_title: request.episode_title.clone(),
        bytes_downloaded,
    });
    debug!(
        "downloaded {} ({} bytes) to {}",
        request.media_url,
        bytes_downloaded,
        request.target.display()
    );

    Ok(bytes_downloaded)
}

async fn transfer<C: HttpClient>(
    client: &C,
    request: &DownloadRequest,
    partial_path: &Path,
    context: &DownloadContext,
    reporter: &SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let url = request.media_url.as_str();

    let response = client
        .get(url)
        .await
        .map_err(|e| DownloadError::HttpFailed {
            url: url.to_string(),
            source: e,
        })?;

    if response.is_error() {
        return Err(DownloadError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    reporter.report(ProgressEvent::DownloadStarting {
        download_id: context.download_id,
        episode_title: request.episode_title.clone(),
        episode_index: context.episode_index,
        total_to_download: context.total_to_download,
        content_length: response.content_length,
    });

    let write_failed = |e| DownloadError::FileWriteFailed {
        path: partial_path.to_path_buf(),
        source: e,
    };

    let mut file = File::create(partial_path)
        .await
        .map_err(|e| DownloadError::FileCreateFailed {
            path: partial_path.to_path_buf(),
            source: e,
        })?;

    let mut bytes_downloaded: u64 = 0;
    let content_length = response.content_length;
    let mut stream = response.body;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::StreamFailed {
            url: url.to_string(),
            source: e,
        })?;

        file.write_all(&chunk).await.map_err(write_failed)?;
        bytes_downloaded += chunk.len() as u64;

        reporter.report(ProgressEvent::DownloadProgress {
            download_id: context.download_id,
            bytes_downloaded,
            total_bytes: content_length,
        });
    }

    file.flush().await.map_err(write_failed)?;

    Ok(bytes_downloaded)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    target.with_file_name(name)
}

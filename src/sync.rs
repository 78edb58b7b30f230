// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::future::Future;
use std::path::Path;

use log::{error, warn};
use tokio::sync::mpsc;
use url::Url;

use crate::download::{DownloadContext, DownloadRequest, download_episode};
use crate::error::{DownloadError, FeedError};
use crate::feed::is_url;
use crate::http::HttpClient;
use crate::model::Podcast;
use crate::progress::{ProgressEvent, SharedProgressReporter};

/// One episode to download, with the position of its podcast and episode in
/// the caller's collection
#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub podcast: usize,
    pub episode: usize,
    pub request: DownloadRequest,
}

/// Run `work` over `items` with at most `max_concurrent` tasks in flight
///
/// A slot pool limits concurrency and gives each task a stable slot id
/// (0 to max_concurrent-1) for progress display. Items are started in order.
/// `on_result` is called on the calling task as each item finishes, with the
/// item's index. A panicking task is logged and produces no result.
pub async fn run_bounded<I, T, F, Fut>(
    items: Vec<I>,
    max_concurrent: usize,
    work: F,
    mut on_result: impl FnMut(usize, T),
) where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(usize, usize, I) -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
{
    let max_concurrent = max_concurrent.max(1);
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();

    let dispatcher = tokio::spawn(async move {
        let (slot_tx, mut slot_rx) = mpsc::channel(max_concurrent);
        for slot in 0..max_concurrent {
            let _ = slot_tx.try_send(slot);
        }

        for (index, item) in items.into_iter().enumerate() {
            // Acquire a slot BEFORE spawning (waits until one is free)
            let Some(slot) = slot_rx.recv().await else {
                break;
            };

            let slot_tx = slot_tx.clone();
            let result_tx = result_tx.clone();
            let task = tokio::spawn(work(slot, index, item));

            tokio::spawn(async move {
                match task.await {
                    Ok(output) => {
                        let _ = result_tx.send((index, output));
                    }
                    Err(e) => error!("worker task {} failed: {}", index, e),
                }
                // Return slot to the pool when done
                let _ = slot_tx.send(slot).await;
            });
        }
    });

    while let Some((index, output)) = result_rx.recv().await {
        on_result(index, output);
    }

    if let Err(e) = dispatcher.await {
        error!("worker pool dispatcher failed: {}", e);
    }
}

/// Fetch a feed from a URL, or from a local file given as a path or `file://` URL
pub async fn fetch_podcast<C: HttpClient>(client: &C, source: &str) -> Result<Podcast, FeedError> {
    if is_url(source) {
        return Podcast::from_url(client, source).await;
    }

    let path = Url::parse(source)
        .ok()
        .filter(|url| url.scheme() == "file")
        .and_then(|url| url.to_file_path().ok());
    match path {
        Some(path) => Podcast::from_file_feed(&path),
        None => Podcast::from_file_feed(Path::new(source)),
    }
}

/// Fetch every feed in `sources`, `parallelism` at a time
///
/// Failures are reported and returned per feed; they never stop the others.
/// Results are in the order of `sources`.
pub async fn fetch_feeds<C: HttpClient + Clone + 'static>(
    client: &C,
    sources: Vec<String>,
    parallelism: usize,
    reporter: &SharedProgressReporter,
) -> Vec<(usize, Result<Podcast, FeedError>)> {
    let client = client.clone();
    let worker_reporter = reporter.clone();

    let mut results = Vec::with_capacity(sources.len());
    run_bounded(
        sources,
        parallelism,
        move |slot, _index, source: String| {
            let client = client.clone();
            let reporter = worker_reporter.clone();
            async move {
                reporter.report(ProgressEvent::FetchingFeed {
                    slot,
                    url: source.clone(),
                });

                let result = fetch_podcast(&client, &source).await;
                if let Err(e) = &result {
                    warn!("failed to fetch {}: {}", source, e);
                    reporter.report(ProgressEvent::FeedFailed {
                        url: source,
                        error: e.to_string(),
                    });
                }
                result
            }
        },
        |index, result| results.push((index, result)),
    )
    .await;

    results.sort_by_key(|(index, _)| *index);
    results
}

/// Download every job, `parallelism` at a time
///
/// `on_result` runs on the calling task once per finished job, so the caller
/// can record each success before the rest complete. Failures are reported
/// and handed to `on_result`; they never stop sibling downloads.
pub async fn download_episodes<C: HttpClient + Clone + 'static>(
    client: &C,
    jobs: Vec<DownloadJob>,
    parallelism: usize,
    reporter: &SharedProgressReporter,
    mut on_result: impl FnMut(DownloadJob, Result<u64, DownloadError>),
) {
    let total_to_download = jobs.len();
    let client = client.clone();
    let worker_reporter = reporter.clone();

    run_bounded(
        jobs,
        parallelism,
        move |download_id, episode_index, job: DownloadJob| {
            let client = client.clone();
            let reporter = worker_reporter.clone();
            async move {
                let context = DownloadContext {
                    download_id,
                    episode_index,
                    total_to_download,
                };

                let result = download_episode(&client, &job.request, &context, &reporter).await;
                if let Err(e) = &result {
                    warn!("failed to download {}: {}", job.request.media_url, e);
                    reporter.report(ProgressEvent::DownloadFailed {
                        download_id,
                        episode_title: job.request.episode_title.clone(),
                        error: e.to_string(),
                    });
                }
                (job, result)
            }
        },
        |_index, (job, result)| on_result(job, result),
    )
    .await;
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;
use tokio::runtime::Runtime;

use crate::config::Config;
use crate::download::{DownloadRequest, media_path_for, unique_path};
use crate::error::{ManagerError, StoreError};
use crate::http::{HttpClient, ReqwestClient};
use crate::model::{
    Episode, EpisodeSelection, EpisodeStatus, Podcast, RenewOutcome, StatusFilter, TitleFilter,
    url_hash,
};
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::store::PodcastStore;
use crate::sync::{self, DownloadJob};

/// One row of the podcast listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodcastSummary {
    pub title: String,
    /// Name of the podcast's document in the feed directory
    pub file: String,
    pub episodes: usize,
    /// Episodes neither skipped nor listened
    pub available: usize,
    /// Episodes downloaded and still on disk
    pub ready: usize,
}

/// Result of an update over several podcasts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub updated: usize,
    pub new_episodes: usize,
    pub failed: usize,
}

/// Result of a download batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub downloaded: usize,
    pub failed: usize,
}

/// Documents accepted by [`Manager::import`]
#[derive(Deserialize)]
#[serde(untagged)]
enum ImportDocument {
    Many(Vec<Podcast>),
    One(Podcast),
}

/// The podcast collection and the operations over it
///
/// All podcasts in the feed directory are loaded when the manager is created.
/// Network work runs on the manager's own runtime, so every operation here
/// is synchronous for the caller.
pub struct Manager<C = ReqwestClient> {
    config: Config,
    store: PodcastStore,
    podcasts: Vec<Podcast>,
    client: C,
    reporter: SharedProgressReporter,
    runtime: Runtime,
}

impl Manager<ReqwestClient> {
    /// Manager using a reqwest client configured from `config`
    pub fn from_config(config: Config, reporter: SharedProgressReporter) -> Result<Self, ManagerError> {
        let client = ReqwestClient::from_config(&config).map_err(ManagerError::HttpClient)?;
        Self::new(config, client, reporter)
    }
}

impl<C: HttpClient + Clone + 'static> Manager<C> {
    pub fn new(
        config: Config,
        client: C,
        reporter: SharedProgressReporter,
    ) -> Result<Self, ManagerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.parallelism.max(1))
            .enable_all()
            .build()
            .map_err(ManagerError::Runtime)?;

        let store = PodcastStore::open(&config.feed_dir)?;
        let podcasts = store.load_all()?;

        Ok(Self {
            config,
            store,
            podcasts,
            client,
            reporter,
            runtime,
        })
    }

    pub fn podcasts(&self) -> &[Podcast] {
        &self.podcasts
    }

    /// Re-read the whole collection from the feed directory
    pub fn reload(&mut self) -> Result<(), ManagerError> {
        self.podcasts = self.store.load_all()?;
        Ok(())
    }

    fn matching(&self, filter: &TitleFilter) -> Vec<usize> {
        self.podcasts
            .iter()
            .enumerate()
            .filter(|(_, podcast)| podcast.matches_filter(filter))
            .map(|(index, _)| index)
            .collect()
    }

    pub fn list_podcasts(&self, filter: &TitleFilter) -> Vec<PodcastSummary> {
        self.matching(filter)
            .into_iter()
            .map(|index| {
                let podcast = &self.podcasts[index];
                let ready = podcast.count_status(EpisodeStatus::Downloaded);

                PodcastSummary {
                    title: podcast.title.clone(),
                    file: podcast.file_name(),
                    episodes: podcast.episodes.len(),
                    available: podcast.count_status(EpisodeStatus::New) + ready,
                    ready,
                }
            })
            .collect()
    }

    /// Selected episodes of every matching podcast
    pub fn list_episodes(
        &self,
        filter: &TitleFilter,
        selection: &EpisodeSelection,
    ) -> Vec<(&Podcast, Vec<&Episode>)> {
        self.matching(filter)
            .into_iter()
            .map(|index| {
                let podcast = &self.podcasts[index];
                let episodes = selection
                    .select(&podcast.episodes)
                    .into_iter()
                    .map(|i| &podcast.episodes[i])
                    .collect();
                (podcast, episodes)
            })
            .collect()
    }

    /// Subscribe to a feed, optionally overriding its title
    pub fn add_podcast(&mut self, source: &str, title: Option<&str>) -> Result<&Podcast, ManagerError> {
        let mut podcast = self
            .runtime
            .block_on(sync::fetch_podcast(&self.client, source))?;

        let path = self.store.ensure_vacant(&podcast.url)?;
        if let Some(title) = title {
            podcast.title = title.to_string();
        }
        podcast.path = Some(path);
        self.store.save(&mut podcast)?;

        info!("added {} ({} episodes)", podcast.title, podcast.episodes.len());
        self.podcasts.push(podcast);
        Ok(&self.podcasts[self.podcasts.len() - 1])
    }

    /// Fetch the feeds of matching podcasts and merge in new episodes
    ///
    /// Podcasts that gained episodes are saved. A feed that fails to fetch or
    /// merge is reported and counted; the others carry on. The collection is
    /// reloaded from disk afterwards.
    pub fn update_podcasts(&mut self, filter: &TitleFilter) -> Result<UpdateSummary, ManagerError> {
        let targets = self.matching(filter);
        let sources = targets
            .iter()
            .map(|&index| self.podcasts[index].url.clone())
            .collect();

        let results = self.runtime.block_on(sync::fetch_feeds(
            &self.client,
            sources,
            self.config.parallelism,
            &self.reporter,
        ));

        let mut summary = UpdateSummary::default();
        for (position, result) in results {
            let podcast = &mut self.podcasts[targets[position]];
            let fetched = match result {
                Ok(fetched) => fetched,
                Err(_) => {
                    summary.failed += 1;
                    continue;
                }
            };

            match podcast.update_from_podcast(fetched) {
                Ok(added) => {
                    if added > 0
                        && let Err(e) = self.store.save(podcast)
                    {
                        warn!("could not save {}: {}", podcast.title, e);
                        self.reporter.report(ProgressEvent::FeedFailed {
                            url: podcast.url.clone(),
                            error: e.to_string(),
                        });
                        summary.failed += 1;
                        continue;
                    }
                    self.reporter.report(ProgressEvent::FeedUpdated {
                        podcast_title: podcast.title.clone(),
                        total_episodes: podcast.episodes.len(),
                        new_episodes: added,
                    });
                    summary.updated += 1;
                    summary.new_episodes += added;
                }
                Err(e) => {
                    warn!("not merging feed into {}: {}", podcast.title, e);
                    self.reporter.report(ProgressEvent::FeedFailed {
                        url: podcast.url.clone(),
                        error: e.to_string(),
                    });
                    summary.failed += 1;
                }
            }
        }

        self.reporter.report(ProgressEvent::UpdateCompleted {
            updated_count: summary.updated,
            new_episodes: summary.new_episodes,
            failed_count: summary.failed,
        });

        self.reload()?;
        Ok(summary)
    }

    /// Download new episodes of matching podcasts
    ///
    /// Only `new` episodes with a media URL are considered, whatever statuses
    /// `selection` names. Each success records the media path and saves the
    /// podcast right away; failures leave the episode untouched.
    pub fn download_episodes(
        &mut self,
        filter: &TitleFilter,
        selection: &EpisodeSelection,
    ) -> Result<DownloadSummary, ManagerError> {
        let selection = EpisodeSelection {
            statuses: StatusFilter::Only(vec![EpisodeStatus::New]),
            ..selection.clone()
        };

        let mut jobs = Vec::new();
        for podcast_index in self.matching(filter) {
            let podcast = &self.podcasts[podcast_index];
            let mut taken: HashSet<PathBuf> = podcast
                .episodes
                .iter()
                .filter_map(|episode| episode.media_path.clone())
                .collect();

            for episode_index in selection.select(&podcast.episodes) {
                let episode = &podcast.episodes[episode_index];
                let Some(media_url) = episode.media_url.clone() else {
                    debug!("{} has no media, not downloading", episode.title);
                    continue;
                };

                // Titles that sanitize alike must not share a file
                let target = unique_path(
                    media_path_for(&self.config.download_dir, podcast, episode),
                    &taken,
                );
                taken.insert(target.clone());

                jobs.push(DownloadJob {
                    podcast: podcast_index,
                    episode: episode_index,
                    request: DownloadRequest {
                        episode_title: episode.title.clone(),
                        media_url,
                        target,
                    },
                });
            }
        }

        let mut summary = DownloadSummary::default();
        let mut save_error = None;
        let podcasts = &mut self.podcasts;
        let store = &self.store;

        self.runtime.block_on(sync::download_episodes(
            &self.client,
            jobs,
            self.config.parallelism,
            &self.reporter,
            |job, result| {
                if result.is_err() {
                    summary.failed += 1;
                    return;
                }

                let podcast = &mut podcasts[job.podcast];
                podcast.episodes[job.episode].media_path = Some(job.request.target);
                summary.downloaded += 1;
                if let Err(e) = store.save(podcast) {
                    warn!("could not record download of {}: {}", job.request.episode_title, e);
                    if save_error.is_none() {
                        save_error = Some(e);
                    }
                }
            },
        ));

        self.reporter.report(ProgressEvent::DownloadsCompleted {
            downloaded_count: summary.downloaded,
            failed_count: summary.failed,
        });

        match save_error {
            Some(e) => Err(e.into()),
            None => Ok(summary),
        }
    }

    /// Skip all but the newest `leave` episodes of matching podcasts
    ///
    /// Returns the number of episodes newly skipped.
    pub fn catch_up(&mut self, filter: &TitleFilter, leave: usize) -> Result<usize, ManagerError> {
        let mut total = 0;
        for index in self.matching(filter) {
            let podcast = &mut self.podcasts[index];
            let marked = podcast.catch_up(leave);
            if marked > 0 {
                debug!("caught up {} episodes of {}", marked, podcast.title);
                self.store.save(podcast)?;
                total += marked;
            }
        }
        Ok(total)
    }

    /// Make selected episodes of matching podcasts downloadable again
    pub fn renew(
        &mut self,
        filter: &TitleFilter,
        selection: &EpisodeSelection,
    ) -> Result<RenewOutcome, ManagerError> {
        let mut total = RenewOutcome::default();
        for index in self.matching(filter) {
            let podcast = &mut self.podcasts[index];
            let outcome = podcast.renew(selection);
            if outcome.changed() {
                self.store.save(podcast)?;
                total.unskipped += outcome.unskipped;
                total.reset += outcome.reset;
            }
        }
        Ok(total)
    }

    /// Retitle the single podcast matching `filter`
    pub fn rename(&mut self, filter: &TitleFilter, title: &str) -> Result<&Podcast, ManagerError> {
        let matches = self.matching(filter);
        let &[index] = matches.as_slice() else {
            return Err(ManagerError::AmbiguousFilter {
                filter: filter.to_string(),
                matches: matches.len(),
            });
        };

        let podcast = &mut self.podcasts[index];
        debug!("renaming {} to {}", podcast.title, title);
        podcast.title = title.to_string();
        self.store.save(podcast)?;
        Ok(&self.podcasts[index])
    }

    /// Remove matching podcasts, returning their titles
    pub fn delete(&mut self, filter: &TitleFilter) -> Result<Vec<String>, ManagerError> {
        let mut deleted = Vec::new();
        for index in self.matching(filter).into_iter().rev() {
            self.store.delete(&self.podcasts[index])?;
            deleted.push(self.podcasts.remove(index).title);
        }
        deleted.reverse();
        Ok(deleted)
    }

    /// Write matching podcasts to `path` as a JSON array of documents
    pub fn export(&self, path: &Path, filter: &TitleFilter) -> Result<usize, ManagerError> {
        let selected: Vec<&Podcast> = self
            .podcasts
            .iter()
            .filter(|podcast| podcast.matches_filter(filter))
            .collect();

        let json = serde_json::to_string_pretty(&selected).map_err(StoreError::from)?;
        std::fs::write(path, json).map_err(|e| ManagerError::ExportFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!("exported {} podcasts to {}", selected.len(), path.display());
        Ok(selected.len())
    }

    /// Add podcasts from an exported file
    ///
    /// Nothing is imported unless every podcast in the file is new to the
    /// collection. Returns the imported titles.
    pub fn import(&mut self, path: &Path) -> Result<Vec<String>, ManagerError> {
        let import_failed = |reason: String| ManagerError::ImportFailed {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| import_failed(e.to_string()))?;
        let document = serde_json::from_str::<ImportDocument>(&content)
            .map_err(|e| import_failed(e.to_string()))?;
        let podcasts = match document {
            ImportDocument::Many(podcasts) => podcasts,
            ImportDocument::One(podcast) => vec![podcast],
        };

        let mut seen = HashSet::new();
        let mut vacant = Vec::with_capacity(podcasts.len());
        for podcast in podcasts {
            let target = self.store.ensure_vacant(&podcast.url)?;
            if !seen.insert(url_hash(&podcast.url)) {
                return Err(StoreError::AlreadyExists {
                    url: podcast.url,
                    path: target,
                }
                .into());
            }
            vacant.push((podcast, target));
        }

        let mut titles = Vec::with_capacity(vacant.len());
        for (mut podcast, target) in vacant {
            podcast.sort_episodes();
            podcast.path = Some(target);
            self.store.save(&mut podcast)?;
            titles.push(podcast.title.clone());
            self.podcasts.push(podcast);
        }

        info!("imported {} podcasts from {}", titles.len(), path.display());
        Ok(titles)
    }
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use super::episode::{Episode, EpisodeStatus};
use super::filter::{EpisodeSelection, TitleFilter};
use crate::error::{FeedError, PodcastError, StoreError};
use crate::feed::{ParsedFeed, fetch_feed, parse_feed_file};
use crate::http::HttpClient;

/// A subscribed feed and the episodes seen in it so far
///
/// Episodes are kept sorted by publish date, oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Podcast {
    pub title: String,
    /// Canonical feed URL and identity of the podcast
    pub url: String,
    #[serde(default)]
    pub episodes: Vec<Episode>,
    /// Backing document, if the podcast was loaded or saved
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

/// Changes made by [`Podcast::renew`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenewOutcome {
    /// Episodes whose skipped flag was cleared
    pub unskipped: usize,
    /// Episodes whose vanished media file was forgotten
    pub reset: usize,
}

impl RenewOutcome {
    pub fn changed(&self) -> bool {
        self.unskipped > 0 || self.reset > 0
    }
}

impl Podcast {
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            episodes: Vec::new(),
            path: None,
        }
    }

    /// Build a podcast from a parsed feed
    ///
    /// `source` is the URL or path the feed was read from; it only becomes
    /// the podcast's URL when the feed names neither a self link nor a link.
    pub fn from_parsed(feed: ParsedFeed, source: &str) -> Self {
        let mut podcast = Self::new(feed.url.unwrap_or_else(|| source.to_string()), feed.title);
        podcast.episodes = feed
            .entries
            .into_iter()
            .map(|entry| Episode::new(entry.title, entry.media_url, entry.published))
            .collect();
        podcast.sort_episodes();
        podcast
    }

    pub async fn from_url<C: HttpClient>(client: &C, url: &str) -> Result<Self, FeedError> {
        let feed = fetch_feed(client, url).await?;
        Ok(Self::from_parsed(feed, url))
    }

    /// Build a podcast from a feed stored in a local file
    pub fn from_file_feed(path: &Path) -> Result<Self, FeedError> {
        let feed = parse_feed_file(path)?;
        let source = std::path::absolute(path)
            .ok()
            .and_then(|absolute| Url::from_file_path(absolute).ok())
            .map(|url| url.to_string())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::from_parsed(feed, &source))
    }

    /// Load a persisted podcast document
    pub fn from_file(path: &Path) -> Result<Self, StoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| StoreError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut podcast: Podcast =
            serde_json::from_str(&content).map_err(|e| StoreError::JsonParseFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        podcast.path = Some(path.to_path_buf());
        podcast.sort_episodes();
        Ok(podcast)
    }

    /// Write the podcast document to `path` and remember it as the backing file
    pub fn save_to_file(&mut self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| StoreError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    /// Content-addressed identifier derived from the URL
    pub fn url_hash(&self) -> String {
        url_hash(&self.url)
    }

    /// Name of the podcast's persisted document
    pub fn file_name(&self) -> String {
        format!("{}.json", self.url_hash())
    }

    pub fn matches_filter(&self, filter: &TitleFilter) -> bool {
        filter.matches(&self.title)
    }

    pub fn sort_episodes(&mut self) {
        self.episodes.sort_by_key(Episode::published_at);
    }

    pub fn count_status(&self, status: EpisodeStatus) -> usize {
        self.episodes.iter().filter(|e| e.status() == status).count()
    }

    /// Merge a freshly fetched copy of the same feed
    ///
    /// Episodes of `other` without a matching episode here are appended;
    /// existing episodes keep their state. Returns the number appended.
    pub fn update_from_podcast(&mut self, other: Podcast) -> Result<usize, PodcastError> {
        if other.url != self.url {
            return Err(PodcastError::MergeConflict {
                ours: self.url.clone(),
                theirs: other.url,
            });
        }

        let mut added = 0;
        for episode in other.episodes {
            if !self.episodes.iter().any(|known| known.is_same_episode(&episode)) {
                debug!("new episode in {}: {}", self.title, episode.title);
                self.episodes.push(episode);
                added += 1;
            }
        }
        self.sort_episodes();
        Ok(added)
    }

    /// Skip every episode except the newest `leave`
    ///
    /// Returns the number of episodes that were not skipped before.
    pub fn catch_up(&mut self, leave: usize) -> usize {
        let end = self.episodes.len().saturating_sub(leave);
        let mut marked = 0;
        for episode in &mut self.episodes[..end] {
            if !episode.skipped {
                episode.skipped = true;
                marked += 1;
            }
        }
        marked
    }

    /// Make the selected episodes eligible for download again
    ///
    /// Clears the skipped flag, and forgets media paths whose file is gone.
    pub fn renew(&mut self, selection: &EpisodeSelection) -> RenewOutcome {
        let mut outcome = RenewOutcome::default();
        for index in selection.select(&self.episodes) {
            let episode = &mut self.episodes[index];
            if episode.skipped {
                episode.skipped = false;
                outcome.unskipped += 1;
            }
            if episode.media_path.as_ref().is_some_and(|path| !path.exists()) {
                episode.media_path = None;
                outcome.reset += 1;
            }
        }
        outcome
    }
}

impl fmt::Display for Podcast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Podcast:")?;
        writeln!(f, "+ title={}", self.title)?;
        writeln!(f, "+ url={}", self.url)?;
        write!(f, "+ episodes={}", self.episodes.len())?;
        for (index, episode) in self.episodes.iter().enumerate() {
            write!(f, "\n  - {:3}: {}", index, episode.title)?;
        }
        Ok(())
    }
}

/// Lower-case hex SHA-256 of the lower-cased URL
pub fn url_hash(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.to_lowercase().as_bytes()))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::feed::parse_feed;
    use tempfile::tempdir;

    pub(crate) const HORSES_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Horse Talk</title>
    <link>https://horses.example.com/</link>
    <description>All about horses</description>
    <atom:link href="https://horses.example.com/feed.xml" rel="self" type="application/rss+xml"/>
    <item>
      <title>Mane</title>
      <pubDate>Mon, 16 Jun 2008 10:00:00 +0000</pubDate>
      <enclosure url="https://horses.example.com/mane.mp3" length="1" type="audio/mpeg"/>
    </item>
    <item>
      <title>Teeth</title>
      <pubDate>Mon, 02 Jun 2008 10:00:00 +0000</pubDate>
      <enclosure url="https://horses.example.com/teeth.mp3" length="1" type="audio/mpeg"/>
    </item>
    <item>
      <title>Hooves</title>
      <pubDate>Mon, 05 May 2008 10:00:00 +0000</pubDate>
      <enclosure url="https://horses.example.com/hooves.mp3" length="1" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    /// Same feed a month later: one new episode, and Teeth moved to a CDN
    pub(crate) const HORSES_FEED_UPDATED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <title>Horse Talk</title>
    <link>https://horses.example.com/</link>
    <description>All about horses</description>
    <atom:link href="https://horses.example.com/feed.xml" rel="self" type="application/rss+xml"/>
    <item>
      <title>Tail</title>
      <pubDate>Mon, 07 Jul 2008 10:00:00 +0000</pubDate>
      <enclosure url="https://horses.example.com/tail.mp3" length="1" type="audio/mpeg"/>
    </item>
    <item>
      <title>Mane</title>
      <pubDate>Mon, 16 Jun 2008 10:00:00 +0000</pubDate>
      <enclosure url="https://horses.example.com/mane.mp3" length="1" type="audio/mpeg"/>
    </item>
    <item>
      <title>Teeth</title>
      <pubDate>Mon, 02 Jun 2008 10:00:00 +0000</pubDate>
      <enclosure url="https://cdn.example.com/horses/teeth.mp3" length="1" type="audio/mpeg"/>
    </item>
    <item>
      <title>Hooves</title>
      <pubDate>Mon, 05 May 2008 10:00:00 +0000</pubDate>
      <enclosure url="https://horses.example.com/hooves.mp3" length="1" type="audio/mpeg"/>
    </item>
  </channel>
</rss>"#;

    fn horses(xml: &str) -> Podcast {
        Podcast::from_parsed(parse_feed(xml.as_bytes()).unwrap(), "https://unused.example.com")
    }

    fn titles(podcast: &Podcast) -> Vec<&str> {
        podcast.episodes.iter().map(|e| e.title.as_str()).collect()
    }

    #[test]
    fn from_parsed_sorts_oldest_first() {
        let podcast = horses(HORSES_FEED);
        assert_eq!(podcast.title, "Horse Talk");
        assert_eq!(podcast.url, "https://horses.example.com/feed.xml");
        assert_eq!(titles(&podcast), vec!["Hooves", "Teeth", "Mane"]);
        assert!(podcast.path.is_none());
    }

    #[test]
    fn from_parsed_falls_back_to_source() {
        let feed = ParsedFeed {
            title: "Nameless".to_string(),
            url: None,
            entries: vec![],
        };
        let podcast = Podcast::from_parsed(feed, "https://source.example.com/rss");
        assert_eq!(podcast.url, "https://source.example.com/rss");
    }

    #[test]
    fn merging_an_update_adds_only_new_episodes() {
        let mut podcast = horses(HORSES_FEED);

        let added = podcast.update_from_podcast(horses(HORSES_FEED_UPDATED)).unwrap();
        assert_eq!(added, 1);
        assert_eq!(podcast.episodes.len(), 4);
        assert_eq!(titles(&podcast), vec!["Hooves", "Teeth", "Mane", "Tail"]);

        let added = podcast.update_from_podcast(horses(HORSES_FEED_UPDATED)).unwrap();
        assert_eq!(added, 0);
        assert_eq!(podcast.episodes.len(), 4);
    }

    #[test]
    fn merging_keeps_same_titled_episodes_with_wrong_weekdays() {
        let mut podcast = Podcast::new("https://mail.example.com/feed", "Mail");
        podcast.episodes.push(Episode::new(
            "Mailbag",
            Some("https://mail.example.com/5.mp3".to_string()),
            "Tue, 05 May 2008 10:00:00 +0000",
        ));

        let mut update = Podcast::new("https://mail.example.com/feed", "Mail");
        update.episodes.push(Episode::new(
            "Mailbag",
            Some("https://mail.example.com/12.mp3".to_string()),
            "Tue, 12 May 2008 10:00:00 +0000",
        ));

        assert_eq!(podcast.update_from_podcast(update).unwrap(), 1);
        assert_eq!(podcast.episodes.len(), 2);
        assert_eq!(
            podcast.episodes[1].media_url.as_deref(),
            Some("https://mail.example.com/12.mp3")
        );
    }

    #[test]
    fn merging_keeps_existing_state() {
        let mut podcast = horses(HORSES_FEED);
        podcast.episodes[1].skipped = true;
        podcast.episodes[0].media_path = Some(PathBuf::from("/nowhere/hooves.mp3"));

        podcast.update_from_podcast(horses(HORSES_FEED_UPDATED)).unwrap();

        let teeth = podcast.episodes.iter().find(|e| e.title == "Teeth").unwrap();
        assert!(teeth.skipped);
        assert_eq!(
            teeth.media_url.as_deref(),
            Some("https://horses.example.com/teeth.mp3")
        );
        assert!(podcast.episodes[0].media_path.is_some());
    }

    #[test]
    fn merging_is_idempotent_for_same_feed() {
        let mut podcast = horses(HORSES_FEED);
        assert_eq!(podcast.update_from_podcast(horses(HORSES_FEED)).unwrap(), 0);
        assert_eq!(podcast.episodes.len(), 3);
    }

    #[test]
    fn merging_different_feeds_fails() {
        let mut podcast = horses(HORSES_FEED);
        let other = Podcast::new("https://cows.example.com/feed.xml", "Cow Talk");

        let err = podcast.update_from_podcast(other).unwrap_err();
        assert!(matches!(err, PodcastError::MergeConflict { ref theirs, .. } if theirs == "https://cows.example.com/feed.xml"));
        assert_eq!(podcast.episodes.len(), 3);
    }

    #[test]
    fn catch_up_without_leave_skips_everything() {
        let mut podcast = horses(HORSES_FEED);
        assert_eq!(podcast.catch_up(0), 3);
        assert!(podcast.episodes.iter().all(|e| e.skipped));
        assert_eq!(podcast.catch_up(0), 0);
    }

    #[test]
    fn catch_up_leaves_newest_episodes() {
        let mut podcast = horses(HORSES_FEED);
        assert_eq!(podcast.catch_up(1), 2);
        assert!(podcast.episodes[0].skipped);
        assert!(podcast.episodes[1].skipped);
        assert!(!podcast.episodes[2].skipped);
        assert_eq!(podcast.catch_up(1), 0);
    }

    #[test]
    fn catch_up_leaving_all_marks_nothing() {
        let mut podcast = horses(HORSES_FEED);
        assert_eq!(podcast.catch_up(3), 0);
        assert_eq!(podcast.catch_up(10), 0);
        assert!(podcast.episodes.iter().all(|e| !e.skipped));
    }

    #[test]
    fn catch_up_counts_only_newly_skipped() {
        let mut podcast = horses(HORSES_FEED);
        podcast.episodes[0].skipped = true;
        assert_eq!(podcast.catch_up(0), 2);
    }

    #[test]
    fn renew_unskips_and_forgets_vanished_files() {
        let dir = tempdir().unwrap();
        let present = dir.path().join("mane.mp3");
        std::fs::write(&present, b"audio").unwrap();

        let mut podcast = horses(HORSES_FEED);
        podcast.episodes[0].skipped = true;
        podcast.episodes[0].media_path = Some(dir.path().join("gone.mp3"));
        podcast.episodes[1].media_path = Some(dir.path().join("also-gone.mp3"));
        podcast.episodes[2].media_path = Some(present.clone());

        let outcome = podcast.renew(&EpisodeSelection::renewable());

        assert_eq!(
            outcome,
            RenewOutcome {
                unskipped: 1,
                reset: 2
            }
        );
        assert!(outcome.changed());
        assert_eq!(podcast.episodes[0].status(), EpisodeStatus::New);
        assert_eq!(podcast.episodes[1].status(), EpisodeStatus::New);
        assert_eq!(podcast.episodes[2].media_path, Some(present));
    }

    #[test]
    fn renew_respects_slices() {
        let mut podcast = horses(HORSES_FEED);
        podcast.catch_up(0);

        let selection = EpisodeSelection {
            last: Some(1),
            ..EpisodeSelection::renewable()
        };
        let outcome = podcast.renew(&selection);

        assert_eq!(outcome.unskipped, 1);
        assert!(podcast.episodes[0].skipped);
        assert!(podcast.episodes[1].skipped);
        assert!(!podcast.episodes[2].skipped);
    }

    #[test]
    fn renew_without_matches_changes_nothing() {
        let mut podcast = horses(HORSES_FEED);
        let outcome = podcast.renew(&EpisodeSelection::renewable());
        assert!(!outcome.changed());
    }

    #[test]
    fn document_roundtrip_preserves_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("horses.json");

        let mut podcast = horses(HORSES_FEED);
        podcast.episodes[0].skipped = true;
        podcast.episodes[1].media_path = Some(dir.path().join("teeth.mp3"));
        podcast.save_to_file(&path).unwrap();
        assert_eq!(podcast.path.as_deref(), Some(path.as_path()));

        let loaded = Podcast::from_file(&path).unwrap();
        assert_eq!(loaded.url, podcast.url);
        assert_eq!(loaded.title, podcast.title);
        assert_eq!(loaded.episodes.len(), podcast.episodes.len());
        for (a, b) in loaded.episodes.iter().zip(&podcast.episodes) {
            assert_eq!(a.title, b.title);
            assert_eq!(a.media_url, b.media_url);
            assert_eq!(a.published, b.published);
            assert_eq!(a.media_path, b.media_path);
            assert_eq!(a.skipped, b.skipped);
        }
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn document_layout_matches_format() {
        let podcast = horses(HORSES_FEED);
        let value = serde_json::to_value(&podcast).unwrap();

        assert_eq!(value["title"], "Horse Talk");
        assert_eq!(value["url"], "https://horses.example.com/feed.xml");
        assert_eq!(value["episodes"].as_array().unwrap().len(), 3);
        assert!(value.get("path").is_none());
    }

    #[test]
    fn from_file_sorts_unsorted_documents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(
            &path,
            r#"{"title": "T", "url": "u", "episodes": [
                {"title": "B", "media_url": null, "published": "2008-06-01", "media_path": null, "skipped": false},
                {"title": "A", "media_url": null, "published": "2008-05-01", "media_path": null, "skipped": true}
            ]}"#,
        )
        .unwrap();

        let podcast = Podcast::from_file(&path).unwrap();
        assert_eq!(titles(&podcast), vec!["A", "B"]);
        assert!(podcast.episodes[0].skipped);
    }

    #[test]
    fn from_file_reports_bad_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Podcast::from_file(&path),
            Err(StoreError::JsonParseFailed { .. })
        ));
    }

    #[test]
    fn from_file_feed_reads_local_feeds() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        std::fs::write(&path, HORSES_FEED).unwrap();

        let podcast = Podcast::from_file_feed(&path).unwrap();
        assert_eq!(podcast.url, "https://horses.example.com/feed.xml");
        assert_eq!(podcast.episodes.len(), 3);
    }

    #[test]
    fn url_hash_ignores_case() {
        assert_eq!(
            url_hash("https://Horses.Example.com/feed.xml"),
            url_hash("https://horses.example.com/feed.xml")
        );
        assert_ne!(
            url_hash("https://horses.example.com/feed.xml"),
            url_hash("https://cows.example.com/feed.xml")
        );
        assert_eq!(url_hash("x").len(), 64);
    }

    #[test]
    fn file_name_is_content_addressed() {
        let podcast = horses(HORSES_FEED);
        assert_eq!(podcast.file_name(), format!("{}.json", podcast.url_hash()));
    }

    #[test]
    fn matches_filter_uses_title() {
        let podcast = horses(HORSES_FEED);
        assert!(podcast.matches_filter(&TitleFilter::new(Some("horse"))));
        assert!(podcast.matches_filter(&TitleFilter::All));
        assert!(!podcast.matches_filter(&TitleFilter::new(Some("cow"))));
    }

    #[test]
    fn count_status_counts_derived_states() {
        let mut podcast = horses(HORSES_FEED);
        podcast.episodes[0].skipped = true;
        assert_eq!(podcast.count_status(EpisodeStatus::Skipped), 1);
        assert_eq!(podcast.count_status(EpisodeStatus::New), 2);
    }
}

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use log::warn;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an episode, derived from its fields on every query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EpisodeStatus {
    New,
    Downloaded,
    Listened,
    Skipped,
}

impl EpisodeStatus {
    pub const ALL: [EpisodeStatus; 4] = [
        EpisodeStatus::New,
        EpisodeStatus::Downloaded,
        EpisodeStatus::Listened,
        EpisodeStatus::Skipped,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Downloaded => "downloaded",
            Self::Listened => "listened",
            Self::Skipped => "skipped",
        }
    }
}

impl fmt::Display for EpisodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EpisodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown episode status '{}'", s))
    }
}

/// A single podcast episode as tracked on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub title: String,
    #[serde(default)]
    pub media_url: Option<String>,
    /// Publish date in the feed's own format, parsed on demand
    #[serde(default)]
    pub published: String,
    /// Location of the downloaded media file
    #[serde(default)]
    pub media_path: Option<PathBuf>,
    #[serde(default)]
    pub skipped: bool,
}

impl Episode {
    pub fn new(title: impl Into<String>, media_url: Option<String>, published: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            media_url,
            published: published.into(),
            media_path: None,
            skipped: false,
        }
    }

    /// Parsed publish date, `None` if the feed's date string is not understood
    pub fn published_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_published(&self.published)
    }

    /// Whether both values describe the same logical episode
    ///
    /// Feeds regularly rewrite media URLs, so a matching title and publish date
    /// count as the same episode too.
    pub fn is_same_episode(&self, other: &Episode) -> bool {
        if self.media_url.is_some() && self.media_url == other.media_url {
            return true;
        }
        self.title == other.title && self.published_at() == other.published_at()
    }

    /// Current status; checks the filesystem each time it is called
    pub fn status(&self) -> EpisodeStatus {
        if self.skipped {
            return EpisodeStatus::Skipped;
        }
        match &self.media_path {
            None => EpisodeStatus::New,
            Some(path) if path.exists() => EpisodeStatus::Downloaded,
            Some(_) => EpisodeStatus::Listened,
        }
    }

    /// Compare against a status name; `"any"` matches every episode
    pub fn has_status(&self, status: &str) -> bool {
        if status == "any" {
            return true;
        }
        if status.parse::<EpisodeStatus>().is_err() {
            warn!("unrecognised episode status '{}'", status);
        }
        self.status().as_str() == status
    }

    /// Whether the episode was published on or after `date`
    pub fn published_since(&self, date: NaiveDate) -> bool {
        self.published_at()
            .is_some_and(|published| published.date_naive() >= date)
    }
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.title, self.status())
    }
}

/// Parse the date formats found in real-world feeds
pub fn parse_published(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }

    let formats = [
        "%a, %d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %z",
        "%Y-%m-%dT%H:%M:%S%:z",
        "%Y-%m-%d %H:%M:%S %z",
    ];
    for format in formats {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    // Feeds often carry a weekday that does not match the date
    if let Some(dated) = strip_weekday(value) {
        if let Ok(dt) = DateTime::parse_from_rfc2822(dated) {
            return Some(dt);
        }
        if let Ok(dt) = DateTime::parse_from_str(dated, "%d %b %Y %H:%M:%S %z") {
            return Some(dt);
        }
    }

    // Dates without an offset are taken as UTC
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
}

/// The date after a leading `Xxx,` weekday, if there is one
fn strip_weekday(value: &str) -> Option<&str> {
    let (weekday, rest) = value.split_once(',')?;
    let weekday = weekday.trim();
    if weekday.len() < 3 || !weekday.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(rest.trim_start())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn episode(title: &str, url: Option<&str>, published: &str) -> Episode {
        Episode::new(title, url.map(String::from), published)
    }

    #[test]
    fn same_media_url_is_same_episode() {
        let a = episode("Hooves", Some("http://example.com/1.mp3"), "Mon, 05 May 2008 10:00:00 +0000");
        let b = episode("Renamed", Some("http://example.com/1.mp3"), "Tue, 06 May 2008 10:00:00 +0000");
        assert!(a.is_same_episode(&b));
        assert!(b.is_same_episode(&a));
    }

    #[test]
    fn same_title_and_date_is_same_episode() {
        let a = episode("Hooves", Some("http://example.com/1.mp3"), "Mon, 05 May 2008 10:00:00 +0000");
        let b = episode("Hooves", Some("http://cdn.example.com/hooves.mp3"), "Mon, 05 May 2008 10:00:00 +0000");
        assert!(a.is_same_episode(&b));
    }

    #[test]
    fn date_equality_uses_parsed_values() {
        let a = episode("Hooves", None, "Mon, 05 May 2008 10:00:00 +0000");
        let b = episode("Hooves", None, "2008-05-05T12:00:00+02:00");
        assert!(a.is_same_episode(&b));
    }

    #[test]
    fn differing_url_and_title_is_different_episode() {
        let a = episode("Hooves", Some("http://example.com/1.mp3"), "Mon, 05 May 2008 10:00:00 +0000");
        let b = episode("Teeth", Some("http://example.com/2.mp3"), "Mon, 05 May 2008 10:00:00 +0000");
        assert!(!a.is_same_episode(&b));
    }

    #[test]
    fn same_title_different_date_is_different_episode() {
        let a = episode("Mailbag", Some("http://example.com/1.mp3"), "Mon, 05 May 2008 10:00:00 +0000");
        let b = episode("Mailbag", Some("http://example.com/2.mp3"), "Mon, 12 May 2008 10:00:00 +0000");
        assert!(!a.is_same_episode(&b));
    }

    #[test]
    fn missing_media_urls_do_not_match_each_other() {
        let a = episode("One", None, "Mon, 05 May 2008 10:00:00 +0000");
        let b = episode("Two", None, "Mon, 05 May 2008 10:00:00 +0000");
        assert!(!a.is_same_episode(&b));
    }

    #[test]
    fn skipped_wins_over_media_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ep.mp3");
        std::fs::write(&path, b"audio").unwrap();

        let mut ep = episode("Hooves", None, "");
        ep.media_path = Some(path);
        ep.skipped = true;
        assert_eq!(ep.status(), EpisodeStatus::Skipped);
    }

    #[test]
    fn status_is_new_without_media_path() {
        let ep = episode("Hooves", None, "");
        assert_eq!(ep.status(), EpisodeStatus::New);
    }

    #[test]
    fn status_follows_the_file_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ep.mp3");
        std::fs::write(&path, b"audio").unwrap();

        let mut ep = episode("Hooves", None, "");
        ep.media_path = Some(path.clone());
        assert_eq!(ep.status(), EpisodeStatus::Downloaded);

        std::fs::remove_file(&path).unwrap();
        assert_eq!(ep.status(), EpisodeStatus::Listened);
    }

    #[test]
    fn has_status_any_matches_everything() {
        let mut ep = episode("Hooves", None, "");
        assert!(ep.has_status("any"));
        ep.skipped = true;
        assert!(ep.has_status("any"));
    }

    #[test]
    fn has_status_compares_names() {
        let ep = episode("Hooves", None, "");
        assert!(ep.has_status("new"));
        assert!(!ep.has_status("skipped"));
    }

    #[test]
    fn has_status_tolerates_unknown_names() {
        let ep = episode("Hooves", None, "");
        assert!(!ep.has_status("bogus"));
    }

    #[test]
    fn status_names_roundtrip() {
        for status in EpisodeStatus::ALL {
            assert_eq!(status.as_str().parse::<EpisodeStatus>().unwrap(), status);
        }
        assert!("fresh".parse::<EpisodeStatus>().is_err());
    }

    #[test]
    fn parses_common_date_formats() {
        assert!(parse_published("Mon, 05 May 2008 10:00:00 +0000").is_some());
        assert!(parse_published("Mon, 05 May 2008 10:00:00 GMT").is_some());
        assert!(parse_published("2008-05-05T10:00:00Z").is_some());
        assert!(parse_published("2008-05-05").is_some());
        assert!(parse_published("").is_none());
        assert!(parse_published("sometime in May").is_none());
    }

    #[test]
    fn wrong_weekday_is_ignored() {
        let parsed = parse_published("Tue, 05 May 2008 10:00:00 +0000").unwrap();
        assert_eq!(parsed, parse_published("Mon, 05 May 2008 10:00:00 +0000").unwrap());
        assert!(parse_published("Fri, 12 May 2008 10:00:00 GMT").is_some());

        assert_eq!(strip_weekday("Tue, 05 May 2008"), Some("05 May 2008"));
        assert_eq!(strip_weekday("05 May 2008"), None);
        assert_eq!(strip_weekday("1, 2"), None);
    }

    #[test]
    fn same_title_with_wrong_weekdays_is_different_episode() {
        let a = episode("Mailbag", Some("http://example.com/1.mp3"), "Tue, 05 May 2008 10:00:00 +0000");
        let b = episode("Mailbag", Some("http://example.com/2.mp3"), "Tue, 12 May 2008 10:00:00 +0000");
        assert!(!a.is_same_episode(&b));
    }

    #[test]
    fn published_since_compares_dates() {
        let ep = episode("Hooves", None, "Mon, 05 May 2008 10:00:00 +0000");
        let may_5 = NaiveDate::from_ymd_opt(2008, 5, 5).unwrap();
        let may_6 = NaiveDate::from_ymd_opt(2008, 5, 6).unwrap();
        assert!(ep.published_since(may_5));
        assert!(!ep.published_since(may_6));

        let undated = episode("Undated", None, "");
        assert!(!undated.published_since(may_5));
    }

    #[test]
    fn deserializes_minimal_document() {
        let ep: Episode = serde_json::from_str(
            r#"{"title": "Episode Test", "media_url": "http://foo.com/ep1.mp3"}"#,
        )
        .unwrap();

        assert_eq!(ep.title, "Episode Test");
        assert_eq!(ep.media_url.as_deref(), Some("http://foo.com/ep1.mp3"));
        assert!(!ep.skipped);
        assert!(ep.media_path.is_none());
        assert_eq!(ep.published, "");
    }

    #[test]
    fn serializes_nulls_explicitly() {
        let ep = episode("Hooves", None, "Mon, 05 May 2008 10:00:00 +0000");
        let value = serde_json::to_value(&ep).unwrap();

        assert!(value["media_url"].is_null());
        assert!(value["media_path"].is_null());
        assert_eq!(value["skipped"], false);
        assert_eq!(value["published"], "Mon, 05 May 2008 10:00:00 +0000");
    }
}

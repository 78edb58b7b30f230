use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use super::episode::{Episode, EpisodeStatus};

/// Case-insensitive title substring filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TitleFilter {
    #[default]
    All,
    Contains(String),
}

impl TitleFilter {
    /// `None` and `"*"` match everything
    pub fn new(filter: Option<&str>) -> Self {
        match filter {
            None | Some("*") => Self::All,
            Some(text) => Self::Contains(text.to_lowercase()),
        }
    }

    pub fn matches(&self, title: &str) -> bool {
        match self {
            Self::All => true,
            Self::Contains(needle) => title.to_lowercase().contains(needle),
        }
    }
}

impl fmt::Display for TitleFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::Contains(needle) => f.write_str(needle),
        }
    }
}

impl FromStr for TitleFilter {
    type Err = String;

    /// An empty filter is rejected; `*` is the way to select everything
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err("title filter is empty; use '*' to match everything".to_string());
        }
        Ok(Self::new(Some(s)))
    }
}

/// Set of statuses an episode must be in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    Any,
    Only(Vec<EpisodeStatus>),
}

impl StatusFilter {
    pub fn matches(&self, status: EpisodeStatus) -> bool {
        match self {
            Self::Any => true,
            Self::Only(statuses) => statuses.contains(&status),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    /// Comma separated status names, or `any`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.split(',').any(|part| part.trim() == "any") {
            return Ok(Self::Any);
        }
        s.split(',')
            .map(|part| part.trim().parse())
            .collect::<Result<Vec<_>, _>>()
            .map(Self::Only)
    }
}

/// Which episodes of a podcast an operation applies to
///
/// Filters are applied first; `first`/`last` then slice the filtered set.
/// When both slices are given `first` wins.
#[derive(Debug, Clone, Default)]
pub struct EpisodeSelection {
    pub statuses: StatusFilter,
    pub title: TitleFilter,
    pub since: Option<NaiveDate>,
    pub first: Option<usize>,
    pub last: Option<usize>,
}

impl EpisodeSelection {
    /// Episodes eligible for download
    pub fn downloadable() -> Self {
        Self {
            statuses: StatusFilter::Only(vec![EpisodeStatus::New]),
            ..Self::default()
        }
    }

    /// Episodes a renewal applies to by default
    pub fn renewable() -> Self {
        Self {
            statuses: StatusFilter::Only(vec![EpisodeStatus::Skipped, EpisodeStatus::Listened]),
            ..Self::default()
        }
    }

    pub fn matches(&self, episode: &Episode) -> bool {
        self.statuses.matches(episode.status())
            && self.title.matches(&episode.title)
            && self.since.is_none_or(|date| episode.published_since(date))
    }

    /// Indices into `episodes` of the selected episodes, in order
    pub fn select(&self, episodes: &[Episode]) -> Vec<usize> {
        let matching: Vec<usize> = episodes
            .iter()
            .enumerate()
            .filter(|(_, episode)| self.matches(episode))
            .map(|(index, _)| index)
            .collect();

        match (self.first, self.last) {
            (Some(n), _) => matching.into_iter().take(n).collect(),
            (None, Some(n)) => {
                let skip = matching.len().saturating_sub(n);
                matching.into_iter().skip(skip).collect()
            }
            (None, None) => matching,
        }
    }
}

mod episode;
mod filter;
mod podcast;

pub use episode::{Episode, EpisodeStatus, parse_published};
pub use filter::{EpisodeSelection, StatusFilter, TitleFilter};
pub use podcast::{Podcast, RenewOutcome, url_hash};

#[cfg(test)]
pub(crate) use podcast::tests::{HORSES_FEED, HORSES_FEED_UPDATED};

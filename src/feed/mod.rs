mod fetch;
mod parse;

pub use fetch::{fetch_feed, fetch_feed_bytes, is_url, parse_feed_file, read_feed_file};
pub use parse::{MEDIA_EXTENSIONS, ParsedEntry, ParsedFeed, media_extension, parse_feed};

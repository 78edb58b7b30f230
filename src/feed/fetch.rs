// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::path::Path;

use bytes::Bytes;
use log::debug;

use crate::error::FeedError;
use crate::http::HttpClient;

use super::parse::{ParsedFeed, parse_feed};

/// Fetch raw feed bytes from a URL (without parsing)
pub async fn fetch_feed_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes, FeedError> {
    let fetch_failed = |source| FeedError::FetchFailed {
        url: url.to_string(),
        source,
    };

    debug!("fetching feed {}", url);
    let response = client.get(url).await.map_err(fetch_failed)?;
    if response.is_error() {
        return Err(FeedError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }
    response.collect().await.map_err(fetch_failed)
}

/// Read raw feed bytes from a local file (without parsing)
pub fn read_feed_file(path: &Path) -> Result<Vec<u8>, FeedError> {
    std::fs::read(path).map_err(|e| FeedError::FileReadFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Fetch and parse a feed from a URL
pub async fn fetch_feed<C: HttpClient>(client: &C, url: &str) -> Result<ParsedFeed, FeedError> {
    let bytes = fetch_feed_bytes(client, url).await?;
    parse_feed(&bytes)
}

/// Parse a feed stored in a local file
pub fn parse_feed_file(path: &Path) -> Result<ParsedFeed, FeedError> {
    let bytes = read_feed_file(path)?;
    parse_feed(&bytes)
}

/// Determine if a string is a URL or a file path
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

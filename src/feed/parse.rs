// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::borrow::Cow;
use std::ops::Range;

use log::{debug, warn};
use url::Url;

use crate::error::FeedError;

/// File extensions accepted as episode media
pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp3", "ogg", "mp4", "wav", "aiff", "au", "avi", "webm", "m4a", "m4v", "ogv",
];

/// A feed as read from the wire, before it becomes a [`crate::Podcast`]
#[derive(Debug, Clone)]
pub struct ParsedFeed {
    pub title: String,
    /// Canonical URL: the feed's self link, else its primary link
    pub url: Option<String>,
    pub entries: Vec<ParsedEntry>,
}

/// One feed entry
#[derive(Debug, Clone)]
pub struct ParsedEntry {
    pub title: String,
    pub published: String,
    pub media_url: Option<String>,
}

/// Parse RSS feed XML bytes
///
/// A feed that only fails because of its declared character encoding is read
/// again as UTF-8; anything else is a badly formed feed.
pub fn parse_feed(xml_bytes: &[u8]) -> Result<ParsedFeed, FeedError> {
    let channel = read_channel(xml_bytes)?;

    let self_link = channel
        .atom_ext()
        .and_then(|atom| atom.links().iter().find(|link| link.rel() == "self"))
        .map(|link| link.href().to_string())
        .filter(|href| !href.is_empty());
    let link = Some(channel.link().trim().to_string()).filter(|l| !l.is_empty());

    let entries = channel.items().iter().map(parse_entry).collect();

    Ok(ParsedFeed {
        title: decode_text(channel.title()),
        url: self_link.or(link),
        entries,
    })
}

fn read_channel(xml_bytes: &[u8]) -> Result<rss::Channel, FeedError> {
    let err = match rss::Channel::read_from(xml_bytes) {
        Ok(channel) => return Ok(channel),
        Err(err) => err,
    };

    let Some(text) = override_encoding(xml_bytes) else {
        return Err(FeedError::BadlyFormed(err));
    };
    let channel = rss::Channel::read_from(text.as_bytes()).map_err(FeedError::BadlyFormed)?;
    warn!("feed declared a character encoding it does not use; read it as UTF-8");
    Ok(channel)
}

/// Re-decode a feed as UTF-8 with its XML declaration rewritten to match
fn override_encoding(xml_bytes: &[u8]) -> Option<String> {
    let lossy = String::from_utf8_lossy(xml_bytes);
    let valid_utf8 = matches!(lossy, Cow::Borrowed(_));
    let declared = declared_encoding(&lossy).map(|range| lossy[range].to_ascii_lowercase());

    let mut text: String = match declared.as_deref() {
        Some("utf-8" | "utf8") | None if valid_utf8 => return None,
        Some("iso-8859-1" | "latin1" | "latin-1" | "us-ascii") if !valid_utf8 => {
            xml_bytes.iter().map(|&b| char::from(b)).collect()
        }
        _ => lossy.into_owned(),
    };

    if let Some(range) = declared_encoding(&text) {
        text.replace_range(range, "UTF-8");
    }
    Some(text)
}

/// Byte range of the encoding name inside the XML declaration
fn declared_encoding(text: &str) -> Option<Range<usize>> {
    let prolog_end = text.find("?>")?;
    let prolog = &text[..prolog_end];
    if !prolog.trim_start().starts_with("<?xml") {
        return None;
    }

    let attr_end = prolog.find("encoding")? + "encoding".len();
    let after_attr = &prolog[attr_end..];
    let value_offset = after_attr.find('=')? + 1;
    let after_eq = &after_attr[value_offset..];
    let quote_offset = after_eq.find(['"', '\''])?;
    let quote = after_eq[quote_offset..].chars().next()?;

    let start = attr_end + value_offset + quote_offset + 1;
    let len = prolog[start..].find(quote)?;
    Some(start..start + len)
}

fn parse_entry(item: &rss::Item) -> ParsedEntry {
    let title = item
        .title()
        .map(decode_text)
        .unwrap_or_else(|| "Untitled Episode".to_string());

    let published = item
        .pub_date()
        .map(String::from)
        .or_else(|| {
            item.dublin_core_ext()
                .and_then(|dc| dc.dates().first().cloned())
        })
        .unwrap_or_default();

    let media_url = resolve_media_url(item);
    if media_url.is_none() {
        debug!("no media link found for entry '{}'", title);
    }

    ParsedEntry {
        title,
        published,
        media_url,
    }
}

/// First media link, in priority order: media:content, feedburner's
/// original enclosure, the enclosure, the entry link
fn resolve_media_url(item: &rss::Item) -> Option<String> {
    let extensions = item.extensions();

    let media_content = extensions
        .get("media")
        .and_then(|media| media.get("content"))
        .into_iter()
        .flatten()
        .filter_map(|ext| ext.attrs().get("url").map(String::as_str));

    let original_enclosure = extensions
        .get("feedburner")
        .and_then(|fb| fb.get("origEnclosureLink"))
        .into_iter()
        .flatten()
        .filter_map(|ext| ext.value());

    let enclosure = item.enclosure().map(|e| e.url());

    media_content
        .chain(original_enclosure)
        .chain(enclosure)
        .chain(item.link())
        .map(str::trim)
        .find(|candidate| media_extension(candidate).is_some())
        .map(String::from)
}

/// Media extension of a URL, if it is one of [`MEDIA_EXTENSIONS`]
pub fn media_extension(url: &str) -> Option<&'static str> {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };

    let filename = path.rsplit('/').next()?;
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    MEDIA_EXTENSIONS.iter().copied().find(|known| *known == ext)
}

fn decode_text(text: &str) -> String {
    html_escape::decode_html_entities(text.trim()).into_owned()
}

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::feed::media_extension;
use crate::model::{Episode, Podcast};

/// Maximum length for the title portion of a filename
const MAX_TITLE_LENGTH: usize = 100;

const DEFAULT_EXTENSION: &str = "mp3";

/// Where an episode's media is stored below the download directory
///
/// Layout: `<download_dir>/<podcast title>/<YYYY-MM-DD|undated>-<title>.<ext>`
pub fn media_path_for(download_dir: &Path, podcast: &Podcast, episode: &Episode) -> PathBuf {
    download_dir
        .join(podcast_dir_name(podcast))
        .join(episode_file_name(episode))
}

/// `path`, or the first `<stem>-N.<ext>` variant of it not in `taken`
pub fn unique_path(path: PathBuf, taken: &HashSet<PathBuf>) -> PathBuf {
    if !taken.contains(&path) {
        return path;
    }

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned());

    let mut n = 2;
    loop {
        let name = match &extension {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        let candidate = path.with_file_name(name);
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Directory name for a podcast; falls back to the URL hash for titles
/// with nothing usable in them
pub fn podcast_dir_name(podcast: &Podcast) -> String {
    let name = sanitize_component(&podcast.title);
    if name.is_empty() {
        podcast.url_hash()
    } else {
        name
    }
}

/// File name for an episode's media
pub fn episode_file_name(episode: &Episode) -> String {
    let date_prefix = episode
        .published_at()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());

    let title = sanitize_component(&episode.title);
    let extension = episode
        .media_url
        .as_deref()
        .and_then(media_extension)
        .unwrap_or(DEFAULT_EXTENSION);

    if title.is_empty() {
        format!("{}.{}", date_prefix, extension)
    } else {
        format!("{}-{}.{}", date_prefix, title, extension)
    }
}

/// Make a title safe as a single path component
///
/// Separators and whitespace runs become a single dash, and the result is
/// cut to [`MAX_TITLE_LENGTH`] characters.
fn sanitize_component(title: &str) -> String {
    let sanitized = sanitize_filename::sanitize_with_options(
        title,
        sanitize_filename::Options {
            replacement: "-",
            ..Default::default()
        },
    );

    let dashed = sanitized
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    let shortened: String = dashed.chars().take(MAX_TITLE_LENGTH).collect();
    shortened.trim_matches(['-', '.']).to_string()
}

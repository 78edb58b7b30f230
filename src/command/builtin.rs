use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use colored::{ColoredString, Colorize};

use super::registry::{CommandRegistry, parse_args};
use crate::error::HandlerError;
use crate::http::HttpClient;
use crate::manager::Manager;
use crate::model::{EpisodeSelection, EpisodeStatus, StatusFilter, TitleFilter};

type Output = Result<String, HandlerError>;

/// Registry with every collection operation of [`Manager`] as a command
///
/// Handlers return the text to show the user.
pub fn builtin_commands<C: HttpClient + Clone + 'static>() -> CommandRegistry<Manager<C>, String> {
    let mut registry = CommandRegistry::new();

    registry.register(
        "add",
        add::<C>,
        "add <url> [title]\n    Subscribe to a feed, optionally under a different title",
    );
    registry.register(
        "ls",
        list::<C>,
        "ls [filter]\n    List podcasts with their episode counts",
    );
    registry.register(
        "episodes",
        episodes::<C>,
        "episodes [filter] [--status s,..] [--match text] [--since YYYY-MM-DD] [--first N|--last N]\n    List episodes and their status",
    );
    registry.register(
        "update",
        update::<C>,
        "update [filter]\n    Fetch feeds and add new episodes",
    );
    registry.register(
        "download",
        download::<C>,
        "download [filter] [--match text] [--since YYYY-MM-DD] [--first N|--last N]\n    Download new episodes",
    );
    registry.register(
        "catchup",
        catch_up::<C>,
        "catchup <filter> [leave]\n    Skip all but the newest [leave] episodes (default 0)",
    );
    registry.register(
        "renew",
        renew::<C>,
        "renew <filter> [--status s,..] [--match text] [--since YYYY-MM-DD] [--first N|--last N]\n    Make skipped and listened episodes downloadable again",
    );
    registry.register(
        "rename",
        rename::<C>,
        "rename <filter> <title>\n    Retitle the one podcast matching the filter",
    );
    registry.register(
        "delete",
        delete::<C>,
        "delete <filter>\n    Unsubscribe from matching podcasts",
    );
    registry.register(
        "export",
        export::<C>,
        "export <path> [filter]\n    Write podcasts to a JSON file",
    );
    registry.register(
        "import",
        import::<C>,
        "import <path>\n    Add podcasts from an exported JSON file",
    );

    registry
}

/// Episode selection options shared by several commands
///
/// When both slices are given `--first` wins.
#[derive(clap::Args, Debug)]
struct SelectionArgs {
    /// Only episodes whose title contains this text
    #[arg(long = "match", value_name = "TEXT")]
    title: Option<TitleFilter>,

    /// Only episodes published on or after this date
    #[arg(long, value_name = "YYYY-MM-DD")]
    since: Option<NaiveDate>,

    /// Only the first N selected episodes
    #[arg(long, value_name = "N")]
    first: Option<usize>,

    /// Only the last N selected episodes
    #[arg(long, value_name = "N")]
    last: Option<usize>,
}

impl SelectionArgs {
    fn apply(self, base: EpisodeSelection, statuses: Option<StatusFilter>) -> EpisodeSelection {
        EpisodeSelection {
            statuses: statuses.unwrap_or(base.statuses),
            title: self.title.unwrap_or(base.title),
            since: self.since,
            first: self.first,
            last: self.last,
        }
    }
}

/// Subscribe to a feed
#[derive(Parser, Debug)]
#[command(name = "add", no_binary_name = true)]
struct AddArgs {
    url: String,
    title: Option<String>,
}

/// Podcasts matching an optional title filter
#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct FilterArgs {
    filter: Option<TitleFilter>,
}

impl FilterArgs {
    fn filter(self) -> TitleFilter {
        self.filter.unwrap_or_default()
    }
}

/// Podcasts matching a required title filter
#[derive(Parser, Debug)]
#[command(no_binary_name = true)]
struct RequiredFilterArgs {
    filter: TitleFilter,
}

#[derive(Parser, Debug)]
#[command(name = "episodes", no_binary_name = true)]
struct EpisodesArgs {
    filter: Option<TitleFilter>,

    /// Comma separated statuses, or `any`
    #[arg(long, value_name = "STATUS,..")]
    status: Option<StatusFilter>,

    #[command(flatten)]
    selection: SelectionArgs,
}

#[derive(Parser, Debug)]
#[command(name = "download", no_binary_name = true)]
struct DownloadArgs {
    filter: Option<TitleFilter>,

    #[command(flatten)]
    selection: SelectionArgs,
}

#[derive(Parser, Debug)]
#[command(name = "catchup", no_binary_name = true)]
struct CatchUpArgs {
    filter: TitleFilter,

    /// Number of newest episodes left alone
    #[arg(default_value_t = 0)]
    leave: usize,
}

#[derive(Parser, Debug)]
#[command(name = "renew", no_binary_name = true)]
struct RenewArgs {
    filter: TitleFilter,

    /// Comma separated statuses, or `any`
    #[arg(long, value_name = "STATUS,..")]
    status: Option<StatusFilter>,

    #[command(flatten)]
    selection: SelectionArgs,
}

#[derive(Parser, Debug)]
#[command(name = "rename", no_binary_name = true)]
struct RenameArgs {
    filter: TitleFilter,
    title: String,
}

#[derive(Parser, Debug)]
#[command(name = "export", no_binary_name = true)]
struct ExportArgs {
    path: PathBuf,
    filter: Option<TitleFilter>,
}

#[derive(Parser, Debug)]
#[command(name = "import", no_binary_name = true)]
struct ImportArgs {
    path: PathBuf,
}

fn status_label(status: EpisodeStatus) -> ColoredString {
    match status {
        EpisodeStatus::New => status.as_str().yellow().bold(),
        EpisodeStatus::Downloaded => status.as_str().green(),
        EpisodeStatus::Listened => status.as_str().dimmed(),
        EpisodeStatus::Skipped => status.as_str().red(),
    }
}

fn count(n: usize) -> ColoredString {
    if n > 0 {
        n.to_string().cyan()
    } else {
        n.to_string().dimmed()
    }
}

fn failures(n: usize) -> ColoredString {
    if n > 0 {
        n.to_string().red().bold()
    } else {
        n.to_string().green()
    }
}

fn add<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let AddArgs { url, title } = parse_args(args)?;

    let podcast = manager.add_podcast(&url, title.as_deref())?;
    Ok(format!(
        "Added {} ({} episodes)",
        podcast.title.bold().green(),
        count(podcast.episodes.len())
    ))
}

fn list<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let filter = parse_args::<FilterArgs>(args)?.filter();

    let summaries = manager.list_podcasts(&filter);
    if summaries.is_empty() {
        return Ok(format!("No podcasts match {}", filter.to_string().yellow()));
    }

    let lines: Vec<String> = summaries
        .into_iter()
        .map(|summary| {
            format!(
                "{}  {} episodes, {} available, {} ready  {}",
                summary.title.bold(),
                count(summary.episodes),
                count(summary.available),
                count(summary.ready),
                summary.file.dimmed()
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

fn episodes<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let args: EpisodesArgs = parse_args(args)?;
    let filter = args.filter.unwrap_or_default();
    let selection = args
        .selection
        .apply(EpisodeSelection::default(), args.status);

    let mut lines = Vec::new();
    for (podcast, episodes) in manager.list_episodes(&filter, &selection) {
        if episodes.is_empty() {
            continue;
        }
        lines.push(podcast.title.bold().magenta().to_string());
        for episode in episodes {
            let date = episode
                .published_at()
                .map(|dt| dt.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "undated".to_string());
            lines.push(format!(
                "  {}  {}  [{}]",
                date.dimmed(),
                episode.title,
                status_label(episode.status())
            ));
        }
    }

    if lines.is_empty() {
        return Ok("No matching episodes".dimmed().to_string());
    }
    Ok(lines.join("\n"))
}

fn update<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let filter = parse_args::<FilterArgs>(args)?.filter();

    let summary = manager.update_podcasts(&filter)?;
    Ok(format!(
        "{} podcasts updated, {} new episodes, {} failed",
        count(summary.updated),
        count(summary.new_episodes),
        failures(summary.failed)
    ))
}

fn download<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let args: DownloadArgs = parse_args(args)?;
    let filter = args.filter.unwrap_or_default();
    let selection = args.selection.apply(EpisodeSelection::downloadable(), None);

    let summary = manager.download_episodes(&filter, &selection)?;
    Ok(format!(
        "{} downloaded, {} failed",
        count(summary.downloaded),
        failures(summary.failed)
    ))
}

fn catch_up<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let CatchUpArgs { filter, leave } = parse_args(args)?;

    let marked = manager.catch_up(&filter, leave)?;
    Ok(format!("{} episodes marked as skipped", count(marked)))
}

fn renew<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let args: RenewArgs = parse_args(args)?;
    let selection = args
        .selection
        .apply(EpisodeSelection::renewable(), args.status);

    let outcome = manager.renew(&args.filter, &selection)?;
    Ok(format!(
        "{} episodes unskipped, {} with missing media reset",
        count(outcome.unskipped),
        count(outcome.reset)
    ))
}

fn rename<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let RenameArgs { filter, title } = parse_args(args)?;

    let podcast = manager.rename(&filter, &title)?;
    Ok(format!("Renamed to {}", podcast.title.bold().green()))
}

fn delete<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let RequiredFilterArgs { filter } = parse_args(args)?;

    let deleted = manager.delete(&filter)?;
    if deleted.is_empty() {
        return Ok(format!("No podcasts match {}", filter.to_string().yellow()));
    }

    let lines: Vec<String> = deleted
        .iter()
        .map(|title| format!("Deleted {}", title.red()))
        .collect();
    Ok(lines.join("\n"))
}

fn export<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let ExportArgs { path, filter } = parse_args(args)?;

    let exported = manager.export(&path, &filter.unwrap_or_default())?;
    Ok(format!(
        "Exported {} podcasts to {}",
        count(exported),
        path.display().to_string().cyan()
    ))
}

fn import<C: HttpClient + Clone + 'static>(manager: &mut Manager<C>, args: Vec<String>) -> Output {
    let ImportArgs { path } = parse_args(args)?;

    let titles = manager.import(&path)?;
    let mut lines = vec![format!("Imported {} podcasts", count(titles.len()))];
    lines.extend(titles.iter().map(|title| format!("  {}", title.green())));
    Ok(lines.join("\n"))
}

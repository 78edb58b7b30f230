use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::LevelFilter;

use podkeeper::{
    CommandRegistry, Config, Manager, NoopReporter, ProgressEvent, ProgressReporter,
    SharedProgressReporter, builtin_commands,
};

// Emoji with fallback for terminals without Unicode support
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");

/// Keep track of podcast subscriptions and their episodes
#[derive(Parser, Debug)]
#[command(name = "podkeeper")]
#[command(about = "Keep track of podcast subscriptions and their episodes")]
#[command(version)]
struct Args {
    /// Command to run; any unambiguous prefix works. `help` lists commands
    command: Option<String>,

    /// Arguments passed to the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Configuration file (default: ~/.config/podkeeper/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the podcast documents
    #[arg(long)]
    feed_dir: Option<PathBuf>,

    /// Directory downloads are stored below
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Number of concurrent feed fetches and downloads
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,

    /// More log output (repeat for more)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
    main_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
            main_bar: Mutex::new(None),
        }
    }

    /// Spinner line for the current batch, created on first use
    fn main_bar(&self) -> ProgressBar {
        let mut main_bar = self.main_bar.lock().unwrap_or_else(|e| e.into_inner());
        main_bar
            .get_or_insert_with(|| {
                let style = ProgressStyle::default_bar()
                    .template("{spinner:.green} {wide_msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner());
                let bar = self.multi.add(ProgressBar::new_spinner());
                bar.set_style(style);
                bar.enable_steady_tick(std::time::Duration::from_millis(100));
                bar
            })
            .clone()
    }

    fn finish_main_bar(&self) {
        let mut main_bar = self.main_bar.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = main_bar.take() {
            bar.finish_and_clear();
        }
    }

    fn get_or_create_bar(&self, download_id: usize) -> ProgressBar {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(bar) = bars.get(&download_id) {
            return bar.clone();
        }

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(0));
        bar.set_style(style);
        bars.insert(download_id, bar.clone());
        bar
    }

    fn finish_bar(&self, download_id: usize) {
        let mut bars = self.bars.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(bar) = bars.remove(&download_id) {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { url, .. } => {
                self.main_bar()
                    .set_message(format!("{SEARCH}Fetching feed: {}", url.cyan()));
            }

            ProgressEvent::FeedUpdated {
                podcast_title,
                total_episodes,
                new_episodes,
            } => {
                let _ = self.multi.println(format!(
                    "{HEADPHONES}{} • {} episodes total, {} new",
                    podcast_title.bold().green(),
                    total_episodes.to_string().cyan(),
                    new_episodes.to_string().yellow()
                ));
            }

            ProgressEvent::FeedFailed { url, error } => {
                let _ = self
                    .multi
                    .println(format!("{FAILURE}{} - {}", url.red(), error.red()));
            }

            ProgressEvent::DownloadStarting {
                download_id,
                episode_title,
                episode_index,
                total_to_download,
                content_length,
            } => {
                self.main_bar().set_message(format!(
                    "Downloading {} episodes",
                    total_to_download.to_string().cyan()
                ));

                let bar = self.get_or_create_bar(download_id);
                bar.set_length(content_length.unwrap_or(0));
                bar.set_position(0);
                bar.set_message(format!(
                    "[{}/{}] {}",
                    (episode_index + 1).to_string().cyan(),
                    total_to_download.to_string().cyan(),
                    truncate_title(&episode_title, 40)
                ));
            }

            ProgressEvent::DownloadProgress {
                download_id,
                bytes_downloaded,
                total_bytes,
            } => {
                let bar = self.get_or_create_bar(download_id);
                if let Some(total) = total_bytes {
                    bar.set_length(total);
                }
                bar.set_position(bytes_downloaded);
            }

            ProgressEvent::Finalizing {
                download_id,
                episode_title,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.set_message(format!("Finalizing {}", truncate_title(&episode_title, 40)));
            }

            ProgressEvent::DownloadCompleted {
                download_id,
                episode_title,
                bytes_downloaded,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.set_position(bytes_downloaded);
                self.finish_bar(download_id);
                let _ = self.multi.println(format!(
                    "{SUCCESS}{}",
                    truncate_title(&episode_title, 60).green()
                ));
            }

            ProgressEvent::DownloadFailed {
                download_id,
                episode_title,
                error,
            } => {
                let bar = self.get_or_create_bar(download_id);
                bar.abandon_with_message(format!(
                    "{FAILURE}{} - {}",
                    truncate_title(&episode_title, 30).red(),
                    error.red()
                ));
                self.finish_bar(download_id);
            }

            ProgressEvent::UpdateCompleted {
                updated_count,
                new_episodes,
                failed_count,
            } => {
                self.finish_main_bar();
                println!(
                    "{PARTY}{} {} feeds, {} new episodes, {} failed",
                    "Update complete:".bold().green(),
                    updated_count.to_string().green().bold(),
                    new_episodes.to_string().yellow(),
                    failed(failed_count)
                );
            }

            ProgressEvent::DownloadsCompleted {
                downloaded_count,
                failed_count,
            } => {
                self.finish_main_bar();
                println!(
                    "{PARTY}{} {} downloaded, {} failed",
                    "Downloads complete:".bold().green(),
                    downloaded_count.to_string().green().bold(),
                    failed(failed_count)
                );
            }
        }
    }
}

fn failed(count: usize) -> colored::ColoredString {
    if count > 0 {
        count.to_string().red().bold()
    } else {
        count.to_string().green()
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.chars().count() <= max_len {
        title.to_string()
    } else {
        let kept: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    // RUST_LOG, when set, overrides the -v level
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn print_help<C>(registry: &CommandRegistry<C, String>, topic: Option<&str>) -> Result<()> {
    match topic {
        Some(topic) => match registry.help(topic) {
            Some(help) => println!("{}", help),
            None => bail!("Unknown command: {}", topic),
        },
        None => {
            println!("{}", "Commands:".bold());
            for name in registry.names() {
                if let Some(help) = registry.help(name) {
                    println!("  {}", help.replace('\n', "\n  "));
                }
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let registry: CommandRegistry<Manager, String> = builtin_commands();

    let command = match args.command.as_deref() {
        None | Some("help") => {
            return print_help(&registry, args.args.first().map(String::as_str));
        }
        Some(command) => command,
    };

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(feed_dir) = args.feed_dir {
        config.feed_dir = feed_dir;
    }
    if let Some(download_dir) = args.download_dir {
        config.download_dir = download_dir;
    }
    if let Some(jobs) = args.jobs {
        config.parallelism = jobs;
    }

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let mut manager = Manager::from_config(config, reporter)
        .context("Failed to open podcast collection")?;

    let output = registry.execute(&mut manager, command, args.args)?;
    if !output.is_empty() {
        println!("{}", output);
    }

    Ok(())
}

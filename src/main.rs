use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use podferry::{
    CleanReport, CommitMode, Config, FeedError, Id3Tagger, JobLog, NoopTagger, ProgressEvent,
    ProgressReporter, ReqwestClient, RunError, RunOptions, RunReport, Selector,
    SharedProgressReporter, SortOrder, SubscriptionStore, Tagger, TransferError, clean,
    run_downloads, transfer,
};
use podferry::feed::{fetch_feed, oldest_episode_date};

// Emoji with fallback for terminals without Unicode support
static FERRY: Emoji<'_, '_> = Emoji("⛴️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HEADPHONES: Emoji<'_, '_> = Emoji("🎧 ", "[i] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static BROOM: Emoji<'_, '_> = Emoji("🧹 ", "[x] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Ferry podcast episodes from RSS feeds onto a portable media player
#[derive(Parser, Debug)]
#[command(name = "podferry")]
#[command(about = "Download podcasts and ferry them onto a portable media player")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "podferry.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tracked subscriptions
    List {
        /// Sort column
        #[arg(short, long, value_enum, default_value_t = OrderArg::Date)]
        order: OrderArg,
    },

    /// Download new episodes into the staging area
    Download {
        /// Only this subscription, by id or name
        #[arg(short, long)]
        podcast: Option<String>,

        /// Cap the backlog window to one year
        #[arg(short, long)]
        year: bool,

        /// Skip audio tag touch-ups
        #[arg(long)]
        no_tag: bool,

        /// Quiet mode - suppress progress output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Toggle whether a subscription is downloaded
    Toggle {
        /// Subscription id or name
        podcast: String,
    },

    /// Move staged episodes onto the device playlist
    Transfer {
        /// How new entries join the playlist
        #[arg(short, long, value_enum)]
        mode: ModeArg,
    },

    /// Delete episodes the listener has already played past
    Clean,

    /// Add a new subscription
    Add {
        /// Display name, also the show directory on the device
        #[arg(short, long)]
        name: String,

        /// Feed URL
        #[arg(short, long)]
        url: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OrderArg {
    Date,
    Id,
    Name,
}

impl From<OrderArg> for SortOrder {
    fn from(arg: OrderArg) -> Self {
        match arg {
            OrderArg::Date => SortOrder::Date,
            OrderArg::Id => SortOrder::Id,
            OrderArg::Name => SortOrder::Name,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Append,
    Insert,
    Overwrite,
}

impl From<ModeArg> for CommitMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Append => CommitMode::Append,
            ModeArg::Insert => CommitMode::Insert,
            ModeArg::Overwrite => CommitMode::Overwrite,
        }
    }
}

/// Progress reporter using indicatif for download runs
struct IndicatifReporter {
    main_bar: ProgressBar,
    multi: MultiProgress,
    bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            main_bar,
            multi,
            bar: Mutex::new(None),
        }
    }

    fn download_bar(&self, length: Option<u64>) -> ProgressBar {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap()
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(length.unwrap_or(0)));
        bar.set_style(style);
        *self.bar.lock().unwrap() = Some(bar.clone());
        bar
    }

    fn finish_bar(&self) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { show, .. } => {
                self.main_bar
                    .set_message(format!("{SEARCH}Checking feed: {}", show.cyan()));
            }

            ProgressEvent::FeedChecked { show, new_episodes } => {
                self.main_bar.set_message(format!(
                    "{HEADPHONES}{} • {} new",
                    show.bold().green(),
                    new_episodes.to_string().yellow()
                ));
            }

            ProgressEvent::DownloadStarting {
                episode_title,
                content_length,
                ..
            } => {
                let bar = self.download_bar(content_length);
                bar.set_message(truncate_title(&episode_title, 40));
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                if let Some(bar) = self.bar.lock().unwrap().as_ref() {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                }
            }

            ProgressEvent::EpisodeStaged { episode_title, .. } => {
                self.finish_bar();
                self.main_bar.set_message(format!(
                    "{SUCCESS}{}",
                    truncate_title(&episode_title, 40).green()
                ));
            }

            ProgressEvent::EpisodeFailed {
                episode_title,
                error,
                ..
            } => {
                if let Some(bar) = self.bar.lock().unwrap().take() {
                    bar.abandon_with_message(format!(
                        "{FAILURE}{} - {}",
                        truncate_title(&episode_title, 30).red(),
                        error.red()
                    ));
                }
            }

            ProgressEvent::RunCompleted { downloaded, failed } => {
                self.main_bar.finish_and_clear();
                println!(
                    "\n{PARTY}{} {} downloaded, {} failed",
                    "Run complete:".bold().green(),
                    downloaded.to_string().green().bold(),
                    if failed > 0 {
                        failed.to_string().red().bold()
                    } else {
                        failed.to_string().green()
                    }
                );
            }

            _ => {}
        }
    }
}

/// Plain status lines for transfer and clean passes
struct TextReporter;

impl ProgressReporter for TextReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::TransferStarting => println!("Copying files…"),

            ProgressEvent::TransferCompleted { errors, .. } => {
                if errors == 0 {
                    println!("{}", "Done.".green());
                }
            }

            ProgressEvent::PlaylistCommitted { mode, entries } => {
                println!(
                    "Writing playlist… {} ({}, {} entries)",
                    "Done".green(),
                    mode,
                    entries
                );
            }

            ProgressEvent::CleanStarting { cutoff } => {
                println!("{BROOM}Removing {} played episodes…", cutoff);
            }

            ProgressEvent::EntryDeleted { path } => {
                println!("Deleting {}", path.dimmed());
            }

            ProgressEvent::BackupFinished { folder, ok } => {
                if ok {
                    println!("Backup of {folder}: {}", "done".green());
                } else {
                    println!("Backup of {folder}: {}", "failed".red());
                }
            }

            _ => {}
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.len() <= max_len {
        title.to_string()
    } else {
        format!("{}...", &title[..max_len.saturating_sub(3)])
    }
}

fn print_subscriptions(store: &SubscriptionStore, order: SortOrder) -> Result<()> {
    let list = store.list(order).context("Failed to list subscriptions")?;

    let max_name = list.iter().map(|s| s.name.len()).max().unwrap_or(5);

    println!(
        "{}",
        format!(
            "{:<4}{:<width$}Last Received",
            "ID",
            "Title",
            width = max_name + 1
        )
        .bold()
    );

    for item in &list {
        let line = format!(
            "{:<4}{:<width$}{}",
            item.id,
            item.name,
            item.last_downloaded.format("%Y-%m-%d %H:%M"),
            width = max_name + 1
        );
        if item.enabled {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
    Ok(())
}

fn print_clean_report(report: &CleanReport) {
    let total = report.total_deleted();
    let shows = report.deleted.len();
    println!(
        "{}",
        format!(
            "{} {} of {} {} have been deleted.",
            total,
            if total == 1 { "episode" } else { "episodes" },
            shows,
            if shows == 1 { "podcast" } else { "podcasts" },
        )
        .bold()
    );

    if report.deleted.is_empty() {
        return;
    }

    let max_len = report.deleted.keys().map(|k| k.len()).max().unwrap_or(0);
    let max_num = report.deleted.values().max().copied().unwrap_or(0);
    println!("{}", "-".repeat(max_len + max_num + 2));
    for (show, count) in &report.deleted {
        println!("{:<width$}  {}", show, "X".repeat(*count), width = max_len);
    }
    if report.unattributed > 0 {
        println!(
            "{}",
            format!("({} entries had no readable show name)", report.unattributed).dimmed()
        );
    }
}

fn print_run_failures(report: &RunReport) {
    if report.failures.is_empty() {
        return;
    }
    println!("\n{}", "Failures:".red().bold());
    for (title, error) in &report.failures {
        println!("  {}{} - {}", CROSS, title.yellow(), error.to_string().dimmed());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    let journal = JobLog::new(config.log_dir.clone());

    match cli.command {
        Command::List { order } => {
            let store = SubscriptionStore::open(&config.database_path)?;
            print_subscriptions(&store, order.into())?;
        }

        Command::Download {
            podcast,
            year,
            no_tag,
            quiet,
        } => {
            println!(
                "\n{}{} {}\n",
                FERRY,
                "podferry".bold().magenta(),
                "- Podcast Downloader".dimmed()
            );

            let store = SubscriptionStore::open(&config.database_path)?;
            let client = ReqwestClient::new();
            let tagger: Box<dyn Tagger> = if no_tag {
                Box::new(NoopTagger)
            } else {
                Box::new(Id3Tagger)
            };
            let reporter: SharedProgressReporter = if quiet {
                podferry::NoopReporter::shared()
            } else {
                Arc::new(IndicatifReporter::new())
            };

            let options = RunOptions {
                target: podcast.as_deref().map(Selector::parse),
                single_year: year,
            };

            match run_downloads(
                &config,
                &store,
                &client,
                tagger.as_ref(),
                &journal,
                &options,
                reporter,
            )
            .await
            {
                Ok(report) => {
                    if !quiet {
                        print_run_failures(&report);
                    }
                }
                Err(e @ (RunError::Busy | RunError::Offline)) => {
                    eprintln!("{}", e.to_string().red());
                    std::process::exit(1);
                }
                Err(e) => return Err(e).context("Download run failed"),
            }
        }

        Command::Toggle { podcast } => {
            let store = SubscriptionStore::open(&config.database_path)?;
            let selector = Selector::parse(&podcast);
            let (name, enabled) = store
                .toggle(&selector)
                .with_context(|| format!("Failed to toggle '{podcast}'"))?;
            println!(
                "Podcast \"{}\" is now {}.",
                name.bold(),
                if enabled { "on".green() } else { "off".yellow() }
            );
            let _ = journal.toggle(&name, enabled);
        }

        Command::Transfer { mode } => {
            let reporter: SharedProgressReporter = Arc::new(TextReporter);
            match transfer(&config, mode.into(), &journal, &reporter) {
                Ok(outcome) => {
                    println!("{SUCCESS}{}", outcome.result.summary().green());
                }
                Err(
                    e @ (TransferError::Busy
                    | TransferError::NotAttached { .. }
                    | TransferError::NothingToDo),
                ) => {
                    eprintln!("{}", e.to_string().yellow());
                    std::process::exit(1);
                }
                Err(TransferError::MoveFailed { errors }) => {
                    eprintln!(
                        "{}",
                        format!("Error: {errors} file(s) could not be copied; staged episodes kept")
                            .red()
                    );
                    std::process::exit(1);
                }
                Err(e) => return Err(e).context("Transfer failed"),
            }
        }

        Command::Clean => {
            let reporter: SharedProgressReporter = Arc::new(TextReporter);
            let report = clean(&config, &reporter).context("Clean pass failed")?;
            print_clean_report(&report);
        }

        Command::Add { name, url } => {
            let store = SubscriptionStore::open(&config.database_path)?;
            let client = ReqwestClient::new();

            let episodes = fetch_feed(&client, &url)
                .await
                .with_context(|| format!("Failed to fetch feed from {url}"))?;
            let start_date = oldest_episode_date(&episodes)
                .ok_or(FeedError::NoDatedEpisodes { name: name.clone() })?
                .to_utc();

            store
                .insert(&name, &url, start_date)
                .with_context(|| format!("Failed to add '{name}'"))?;
            println!(
                "Podcast \"{}\" [{}] has been added to the library",
                name.bold(),
                url.cyan()
            );
            let _ = journal.added(&name, &url);
        }
    }

    Ok(())
}

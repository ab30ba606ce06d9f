//! tubedigest CLI entry point

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use tubedigest::{
    commands::{
        cmd_analyze, cmd_cleanup, cmd_init, cmd_list, cmd_process, cmd_purge, cmd_recover_stale,
        cmd_retry_errors, cmd_run, cmd_show, cmd_status, cmd_submit, print_analysis,
        print_cycle_report, print_init, print_maintenance, print_processed, print_status,
        print_submit_report, print_video, print_videos, ListFilter, RunOptions, SubmitInput,
    },
    config::Config,
    discovery::RawVideo,
    error::{Error, Result},
    meta::{MetaDb, Status},
    progress::LogWriterFactory,
};

#[derive(Parser)]
#[command(name = "tubedigest")]
#[command(version, about = "Queue-driven video digest pipeline", long_about = None)]
struct Cli {
    /// Path to config file (or its directory)
    #[arg(short, long, global = true, env = "TUBEDIGEST_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize configuration and database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Queue candidate videos
    Submit {
        /// JSON file with an array of candidate records
        #[arg(long, conflicts_with = "video_id")]
        file: Option<PathBuf>,

        /// Platform video id of a single candidate
        #[arg(long, requires_all = ["title", "url"])]
        video_id: Option<String>,

        /// Title of the single candidate
        #[arg(long)]
        title: Option<String>,

        /// URL of the single candidate
        #[arg(long)]
        url: Option<String>,

        /// Channel of the single candidate
        #[arg(long)]
        channel: Option<String>,
    },

    /// Run one scheduler cycle (retry errors, recover stale, process)
    Run {
        /// Maximum videos to process (defaults to queue.max_items_per_cycle)
        #[arg(short = 'n', long)]
        max_items: Option<usize>,
    },

    /// Claim and process a single video
    Process,

    /// Return stuck processing videos to the queue
    RecoverStale {
        /// Age in minutes (defaults to queue.stale_minutes)
        #[arg(long)]
        minutes: Option<i64>,
    },

    /// Return errored videos to the queue
    RetryErrors {
        /// Only retry videos with fewer failed attempts than this
        #[arg(long)]
        max_attempts: Option<u32>,
    },

    /// Show system status
    Status,

    /// List videos
    List {
        /// Filter by status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,

        /// Only analyzed videos with a result
        #[arg(long, conflicts_with = "status")]
        analyzed: bool,

        /// Maximum number of videos
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show one video and its analysis
    Show {
        /// Platform video id
        video_id: String,
    },

    /// Analyze a URL without queueing it
    Analyze {
        /// Video URL
        url: String,
    },

    /// Delete videos older than the retention window
    Cleanup {
        /// Age in days (defaults to queue.retention_days)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Delete every video that is not analyzed
    Purge {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    New,
    Processing,
    Analyzed,
    Error,
}

impl From<StatusArg> for Status {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::New => Status::New,
            StatusArg::Processing => Status::Processing,
            StatusArg::Analyzed => Status::Analyzed,
            StatusArg::Error => Status::Error,
        }
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "tubedigest", &mut std::io::stdout());
        return Ok(());
    }

    if let Commands::Init { force } = cli.command {
        let config = cmd_init(Some(base_dir_for(cli.config.as_deref())), force).await?;
        if cli.json {
            println!(
                "{}",
                serde_json::json!({
                    "config_path": config.paths.config_file,
                    "db_path": config.paths.db_file,
                })
            );
        } else {
            print_init(&config);
        }
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;
    let db = MetaDb::new(&config.paths.db_file).await?;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Submit {
            file,
            video_id,
            title,
            url,
            channel,
        } => {
            let input = match (file, video_id, title, url) {
                (Some(path), _, _, _) => SubmitInput::File(path),
                (None, Some(id), Some(title), Some(url)) => {
                    let mut video = RawVideo::new(&id, &title, &url);
                    video.channel_title = channel;
                    SubmitInput::Single(video)
                }
                _ => {
                    return Err(Error::Other(
                        "Pass --file, or --video-id with --title and --url".to_string(),
                    ))
                }
            };

            let report = cmd_submit(&db, input).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_submit_report(&report);
            }
        }

        Commands::Run { max_items } => {
            let options = RunOptions {
                max_items,
                show_progress: !cli.json && std::io::stderr().is_terminal(),
            };
            let report = cmd_run(&config, &db, options).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_cycle_report(&report);
            }
        }

        Commands::Process => {
            let item = cmd_process(&config, &db).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&item)?);
            } else {
                match item {
                    Some(item) => print_processed(&item),
                    None => println!("No video processed."),
                }
            }
        }

        Commands::RecoverStale { minutes } => {
            let report = cmd_recover_stale(&config, &db, minutes).await?;
            print_report(&report, cli.json)?;
        }

        Commands::RetryErrors { max_attempts } => {
            let report = cmd_retry_errors(&config, &db, max_attempts).await?;
            print_report(&report, cli.json)?;
        }

        Commands::Status => {
            let status = cmd_status(&config, &db).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Commands::List {
            status,
            analyzed,
            limit,
        } => {
            let filter = match (status, analyzed) {
                (Some(status), _) => ListFilter::Status(status.into()),
                (None, true) => ListFilter::Analyzed,
                (None, false) => ListFilter::All,
            };
            let videos = cmd_list(&db, filter, limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&videos)?);
            } else {
                print_videos(&videos);
            }
        }

        Commands::Show { video_id } => {
            let row = cmd_show(&db, &video_id).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&row)?);
            } else {
                print_video(&row);
            }
        }

        Commands::Analyze { url } => {
            let analysis = cmd_analyze(&config, &db, &url).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis);
            }
        }

        Commands::Cleanup { days } => {
            let report = cmd_cleanup(&config, &db, days).await?;
            print_report(&report, cli.json)?;
        }

        Commands::Purge { yes } => {
            let report = cmd_purge(&db, yes).await?;
            print_report(&report, cli.json)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(LogWriterFactory))
            .with(filter)
            .init();
    }
}

fn print_report(report: &tubedigest::commands::MaintenanceReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        print_maintenance(report);
    }
    Ok(())
}

/// Base directory named by `--config`: a `.toml` path means its parent
fn base_dir_for(path: Option<&Path>) -> PathBuf {
    match path {
        Some(p) if p.extension().is_some_and(|e| e == "toml") => p
            .parent()
            .map(PathBuf::from)
            .unwrap_or_else(Config::default_base_dir),
        Some(p) => p.to_path_buf(),
        None => Config::default_base_dir(),
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(p) if p.extension().is_some_and(|e| e == "toml") => Config::load(p)?,
        _ => Config::load_from(Some(base_dir_for(path)))?,
    };

    if !config.is_initialized() {
        return Err(Error::NotInitialized);
    }
    Ok(config)
}

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use planet_dl::app::{App, DownloadOptions, FetchResult, ProgressSink};
use planet_dl::config::ConfigLoader;
use planet_dl::downloader::{Aria2Downloader, Downloader};
use planet_dl::error::PlanetError;
use planet_dl::fetcher::HttpMetadataClient;
use planet_dl::output::{ConsoleOutput, JsonOutput, OutputMode};
use planet_dl::reconcile::ReconcileOptions;
use planet_dl::store::Store;

#[derive(Parser)]
#[command(name = "planet-dl")]
#[command(about = "Download the OpenStreetMap planet or a Geofabrik extract from consistent mirrors")]
#[command(version, author)]
struct Cli {
    #[arg(long, short, global = true, help = "Log every request and every ignored listing entry")]
    verbose: bool,

    #[arg(long, global = true, help = "Print the result as JSON instead of progress text")]
    json: bool,

    #[arg(long, global = true, help = "Mirror configuration file (defaults to ./planet-mirrors.json when present)")]
    config: Option<String>,

    #[arg(long, global = true, help = "Per-request timeout in seconds")]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Download the newest planet file most mirrors agree on")]
    Planet(PlanetArgs),
    #[command(about = "Download a single explicit URL")]
    Url(UrlArgs),
    #[command(about = "Download a Geofabrik extract by area id or name")]
    Geofabrik(GeofabrikArgs),
    #[command(about = "List Geofabrik areas")]
    List(ListArgs),
}

#[derive(Args, Clone)]
struct DownloadArgs {
    #[arg(long, short, help = "Destination file")]
    output: Option<PathBuf>,

    #[arg(long, help = "Resolve everything and print the aria2c command without running it")]
    dry_run: bool,

    #[arg(last = true, help = "Extra arguments passed to aria2c verbatim (after `--`)")]
    aria2_args: Vec<String>,
}

#[derive(Args)]
struct PlanetArgs {
    #[arg(long, help = "Use the newest revision even if few mirrors carry it yet")]
    force_latest: bool,

    #[arg(long, help = "Keep the primary planet.openstreetmap.org server in the source list")]
    include_primary: bool,

    #[command(flatten)]
    download: DownloadArgs,
}

#[derive(Args)]
struct UrlArgs {
    url: String,

    #[arg(long, help = "Expected md5 checksum of the file")]
    md5: Option<String>,

    #[command(flatten)]
    download: DownloadArgs,
}

#[derive(Args)]
struct GeofabrikArgs {
    #[arg(help = "Area id (e.g. `monaco`), fully-qualified id, or name")]
    area: String,

    #[arg(long, help = "Ignore the cached catalog")]
    refresh: bool,

    #[arg(long, help = "Save the area's replication state.txt to this file")]
    state: Option<PathBuf>,

    #[command(flatten)]
    download: DownloadArgs,
}

#[derive(Args)]
struct ListArgs {
    #[arg(help = "Only show areas whose id or name contains this text")]
    filter: Option<String>,

    #[arg(long, help = "Ignore the cached catalog")]
    refresh: bool,
}

impl From<DownloadArgs> for DownloadOptions {
    fn from(args: DownloadArgs) -> Self {
        DownloadOptions {
            dry_run: args.dry_run,
            output: args.output,
            extra_args: args.aria2_args,
        }
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<PlanetError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &PlanetError) -> u8 {
    match error {
        PlanetError::AreaNotFound { .. } | PlanetError::NoSources | PlanetError::Consistency(_) => 2,
        PlanetError::Http { .. }
        | PlanetError::Remote { .. }
        | PlanetError::MissingTool(_)
        | PlanetError::Downloader(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("warn,planet_dl={level}"))),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or(config.timeout);
    let client = HttpMetadataClient::new(timeout)?;
    let downloader = Aria2Downloader::new();
    if let Some(version) = downloader.tool_version() {
        tracing::debug!("using {version}");
    }
    let app = App::new(Store::new()?, client, downloader, config.mirrors);

    let sink: &dyn ProgressSink = match output_mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Human => &ConsoleOutput,
    };

    match cli.command {
        Commands::Planet(args) => {
            let options = ReconcileOptions {
                force_latest: args.force_latest,
                include_primary: args.include_primary,
            };
            let result = app.fetch_planet(options, args.download.into(), sink)?;
            print_fetch(&result, output_mode)
        }
        Commands::Url(args) => {
            let result = app.fetch_url(&args.url, args.md5, args.download.into(), sink)?;
            print_fetch(&result, output_mode)
        }
        Commands::Geofabrik(args) => {
            let result = app.fetch_geofabrik(
                &args.area,
                args.refresh,
                args.state,
                args.download.into(),
                sink,
            )?;
            print_fetch(&result, output_mode)
        }
        Commands::List(args) => {
            let result = app.list(args.refresh, args.filter.as_deref(), sink)?;
            match output_mode {
                OutputMode::Json => JsonOutput::print_list(&result).map_err(miette::Report::msg)?,
                OutputMode::Human => ConsoleOutput::print_list(&result),
            }
            Ok(())
        }
    }
}

fn print_fetch(result: &FetchResult, output_mode: OutputMode) -> miette::Result<()> {
    if output_mode == OutputMode::Json {
        JsonOutput::print_fetch(result).map_err(miette::Report::msg)?;
    }
    Ok(())
}

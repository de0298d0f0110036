use std::error::Error as _;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use whereabouts::{server, Error, Result, TimezoneMode, Tracker, TrackerPaths};

#[derive(Parser, Debug)]
#[command(name = "whereabouts")]
#[command(version)]
#[command(about = "Aggregate location pings into a persistent history with live map output", long_about = None)]
struct Cli {
    /// Import a Google location history JSON archive and quit
    #[arg(short = 'i', long = "import", value_name = "FILE")]
    import: Option<PathBuf>,

    /// Export the full location history as GeoJSON and quit
    #[arg(short = 'e', long = "export", value_name = "FILE")]
    export: Option<PathBuf>,

    /// Port to listen on for location POSTs
    #[arg(short, long, default_value_t = 9001)]
    port: u16,

    /// Append log output to this file instead of stderr
    #[arg(short, long, value_name = "FILE")]
    logfile: Option<PathBuf>,

    /// Decimal digits kept when bucketing coordinates (4 or 5 make sense
    /// for phone data); ignored when the store file already exists
    #[arg(long, default_value_t = 4)]
    precision: u8,

    /// Timezone used to bucket timestamps into dates; ignored when the
    /// store file already exists
    #[arg(long, value_enum, default_value = "local")]
    timezone: TimezoneMode,

    /// Blur constant handed through to the heatmap renderer
    #[arg(long, default_value_t = 5)]
    blur: u32,

    /// Path of the persisted history store
    #[arg(long, default_value = "history.json", value_name = "FILE")]
    store: PathBuf,

    /// Path of the heatmap dataset consumed by the map front end
    #[arg(long, default_value = "map.js", value_name = "FILE")]
    heatmap: PathBuf,

    /// Path of the single-point GeoJSON snapshot
    #[arg(long, default_value = "realtime.geojson", value_name = "FILE")]
    snapshot: PathBuf,
}

fn init_logging(logfile: Option<&PathBuf>) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = logfile {
        match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(err) => eprintln!("could not open log file {}: {err}", path.display()),
        }
    }
    builder.init();
}

async fn run(cli: Cli) -> Result<()> {
    let paths = TrackerPaths {
        store: cli.store,
        heatmap: cli.heatmap,
        snapshot: cli.snapshot,
    };
    let mut tracker = Tracker::open(paths, cli.precision, cli.timezone, cli.blur)?;

    if let Some(archive) = cli.import {
        let file = File::open(&archive).map_err(|source| Error::ArchiveOpen {
            path: archive.clone(),
            source,
        })?;
        let count = tracker.import_archive(file)?;
        info!("{} records imported from {}", count, archive.display());
        return Ok(());
    }

    if let Some(out) = cli.export {
        return tracker.export_history(&out);
    }

    server::run(tracker, cli.port).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.logfile.as_ref());

    if let Err(err) = run(cli).await {
        error!("{err}");
        let mut source = err.source();
        while let Some(cause) = source {
            error!("  caused by: {cause}");
            source = cause.source();
        }
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_the_service_contract() {
        let cli = Cli::parse_from(["whereabouts"]);
        assert_eq!(cli.port, 9001);
        assert_eq!(cli.precision, 4);
        assert_eq!(cli.blur, 5);
        assert_eq!(cli.store, PathBuf::from("history.json"));
        assert_eq!(cli.heatmap, PathBuf::from("map.js"));
        assert_eq!(cli.snapshot, PathBuf::from("realtime.geojson"));
        assert!(matches!(cli.timezone, TimezoneMode::Local));
        assert!(cli.import.is_none());
        assert!(cli.export.is_none());
    }

    #[test]
    fn cli_parses_import_and_timezone() {
        let cli = Cli::parse_from([
            "whereabouts",
            "--import",
            "takeout.json",
            "--timezone",
            "utc",
            "--precision",
            "5",
        ]);
        assert_eq!(cli.import, Some(PathBuf::from("takeout.json")));
        assert!(matches!(cli.timezone, TimezoneMode::Utc));
        assert_eq!(cli.precision, 5);
    }
}

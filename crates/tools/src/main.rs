use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use dashboard::{DashboardConfig, FetchDriver};
use formats::Position;
use layers::{ArcSettings, arc_vertices};
use streaming::{DataSource, DirectoryDataSource, HttpDataSource};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod script;

#[derive(Parser, Debug)]
#[command(author, version, about = "Map dashboard layer tools")]
struct Args {
    /// Dashboard config JSON; ATLAS_* environment variables apply on top
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a session script against headless renderers and print the final state
    Simulate {
        /// Session script (JSON with a "steps" array)
        #[arg(long)]
        script: PathBuf,

        /// Directory holding mapData/<dataset>.geojson; defaults to HTTP from the config base_url
        #[arg(long)]
        data: Option<PathBuf>,
    },

    /// Print the 3D arc between two points as JSON [lng, lat, alt] triples
    Arc {
        /// Origin: lng,lat
        #[arg(long)]
        from: String,

        /// Destination: lng,lat
        #[arg(long)]
        to: String,

        #[arg(long, default_value_t = 20)]
        subdivisions: usize,

        #[arg(long, default_value_t = 80_000.0)]
        elevation_scale: f64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => DashboardConfig::from_path(path)?,
        None => DashboardConfig::default(),
    };
    config.apply_env()?;

    match args.command {
        Command::Simulate { script, data } => {
            let payload = std::fs::read_to_string(&script)?;
            let session = script::Script::from_json_str(&payload)?;

            let source: Arc<dyn DataSource> = match data {
                Some(dir) => Arc::new(DirectoryDataSource::new(dir)),
                None => Arc::new(HttpDataSource::new(config.base_url.clone())),
            };
            let driver = FetchDriver::new(source);
            let mut store = script::headless_store(config);

            info!("replaying {} steps", session.steps.len());
            let snapshot = script::run(&mut store, &driver, session).await;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Command::Arc {
            from,
            to,
            subdivisions,
            elevation_scale,
        } => {
            let settings = ArcSettings {
                subdivisions,
                elevation_scale,
            };
            let vertices = arc_vertices(parse_lng_lat(&from)?, parse_lng_lat(&to)?, settings);
            let triples: Vec<[f64; 3]> = vertices
                .iter()
                .map(|p| [p.lng, p.lat, p.alt.unwrap_or(0.0)])
                .collect();
            println!("{}", serde_json::to_string(&triples)?);
        }
    }
    Ok(())
}

fn parse_lng_lat(s: &str) -> Result<Position, String> {
    let (lng, lat) = s
        .split_once(',')
        .ok_or_else(|| format!("expected lng,lat but got {s:?}"))?;
    let lng: f64 = lng
        .trim()
        .parse()
        .map_err(|_| format!("invalid longitude {lng:?}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("invalid latitude {lat:?}"))?;
    Ok(Position::new(lng, lat))
}

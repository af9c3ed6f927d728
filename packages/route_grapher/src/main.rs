use clap::Parser;
use log::{error, info};
use route_grapher::graph::congestion::CongestionRecord;
use route_grapher::processing::lookups::{
    ElevationSample, FixedRoutes, SampledElevations, SampledTags, TagSample,
};
use route_grapher::{
    Collaborators, Coordinate, EngineConfig, EngineError, GraphExport,
    RouteSession,
};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Build a road graph from pre-fetched routes, elevations and way tags
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON session file
    session: PathBuf,
    /// Write the graph here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Print the congestion request for the session's routes and stop
    #[arg(long)]
    congestion_request: bool,
}

/// What a run produced, ready to be written out
enum Output {
    Graph(GraphExport),
    Request(String),
}

#[derive(Debug, Error)]
enum CliError {
    #[error("unable to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid session file: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

fn default_sample_radius() -> f64 {
    250.0
}

/// Everything needed to run a session offline. Settings fall back to the
/// environment when no config block is given.
#[derive(Debug, Deserialize)]
struct SessionFile {
    #[serde(default)]
    config: Option<EngineConfig>,
    #[serde(default)]
    waypoints: Vec<Coordinate>,
    routes: Vec<Vec<Coordinate>>,
    #[serde(default)]
    elevations: Vec<ElevationSample>,
    #[serde(default)]
    tags: Vec<TagSample>,
    #[serde(default)]
    congestion: Vec<CongestionRecord>,
    /// Samples further than this (m) from a point are ignored
    #[serde(default = "default_sample_radius")]
    sample_radius: f64,
}

fn run(args: &Args) -> Result<Output, CliError> {
    let raw = fs::read_to_string(&args.session).map_err(|source| {
        CliError::Io {
            path: args.session.clone(),
            source,
        }
    })?;
    let file: SessionFile = serde_json::from_str(&raw)?;

    let config = match file.config {
        Some(config) => config,
        None => EngineConfig::from_env()?,
    };

    let mut routes = FixedRoutes::new(file.routes);
    let mut elevation =
        SampledElevations::new(file.elevations, file.sample_radius);
    let mut tags = SampledTags::new(file.tags, file.sample_radius);
    let mut lookups = Collaborators {
        routes: &mut routes,
        elevation: &mut elevation,
        tags: &mut tags,
    };

    let mut session = RouteSession::new(config)?;
    if args.congestion_request {
        session.add_routes(&file.waypoints, &mut lookups)?;
        return Ok(Output::Request(session.congestion_request()));
    }

    let mut export = GraphExport::default();
    let summary = session.run(
        &file.waypoints,
        &mut lookups,
        &file.congestion,
        &mut export,
    )?;
    info!("{:?}", summary);

    Ok(Output::Graph(export))
}

fn write(args: &Args, output: &Output) -> Result<(), CliError> {
    let body = match output {
        Output::Graph(export) => serde_json::to_string_pretty(export)?,
        Output::Request(request) => request.clone(),
    };
    match &args.output {
        Some(path) => fs::write(path, body).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        }),
        None => {
            println!("{}", body);
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let outcome = run(&args).and_then(|output| write(&args, &output));
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

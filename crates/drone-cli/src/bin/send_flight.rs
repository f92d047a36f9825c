//! CLI tool to queue a trajectory command on a running drone simulator.

use anyhow::{bail, Result};
use clap::Parser;
use drone_cli::{parse_point, Preset};
use drone_core::{GeoPoint, PathType, TrajectoryCommand};

/// Send a flight command to the drone simulator
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Simulator command URL
    #[arg(long, default_value = "http://localhost:3000")]
    url: String,

    /// Use a ready-made pattern around --center instead of --path/--start/--end
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Preset center as lat,lon[,alt]
    #[arg(long, value_parser = parse_point, default_value = "-33.937687,151.19189864")]
    center: GeoPoint,

    /// Preset radius in degrees
    #[arg(long, default_value_t = 0.002)]
    radius: f64,

    /// Path type: sine, figure8, clockwise, counter-clockwise, patrol, random
    #[arg(long, default_value = "random")]
    path: String,

    /// Start point as lat,lon[,alt]
    #[arg(long, value_parser = parse_point)]
    start: Option<GeoPoint>,

    /// End point as lat,lon[,alt]
    #[arg(long, value_parser = parse_point)]
    end: Option<GeoPoint>,

    /// Control or patrol point, repeatable
    #[arg(long = "point", value_parser = parse_point)]
    points: Vec<GeoPoint>,

    /// Frequency multiplier for sine, repeatable
    #[arg(long = "data")]
    data: Vec<f64>,

    /// Free-form properties passed through with the command
    #[arg(long, default_value = "")]
    props: String,
}

fn build_command(args: &Args) -> Result<TrajectoryCommand> {
    if let Some(preset) = args.preset {
        return Ok(preset.build(args.center, args.radius));
    }

    let (Some(start), Some(end)) = (args.start, args.end) else {
        bail!("--start and --end are required without --preset");
    };
    let path_type = PathType::parse(&args.path);
    if path_type == PathType::Unrecognized {
        eprintln!(
            "Warning: '{}' is not a known path, the drone will fly straight to --end",
            args.path
        );
    }

    let mut command = TrajectoryCommand::new(path_type, start, end)
        .with_points(args.points.clone())
        .with_data(args.data.clone());
    command.properties = args.props.clone();
    Ok(command)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let command = build_command(&args)?;

    println!("Sending {} command to {}...", command.path_type, args.url);
    println!("  Start: ({}, {})", command.start.lat, command.start.lon);
    println!("  End: ({}, {})", command.end.lat, command.end.lon);
    if !command.points.is_empty() {
        println!("  Points: {}", command.points.len());
    }

    // Blocks server-side while the drone's queue is full.
    let response = reqwest::Client::new()
        .post(format!("{}/fly", args.url.trim_end_matches('/')))
        .json(&command)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("Simulator rejected command: {} {}", status, body);
    }

    let body: serde_json::Value = response.json().await?;
    println!(
        "Queued command {}",
        body["command_id"].as_str().unwrap_or("<unknown>")
    );
    Ok(())
}

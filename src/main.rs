use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use datacapturing_rs::cleaning::AcceptAllLocations;
use datacapturing_rs::metrics::track_distance;
use datacapturing_rs::store::InertialFile;
use datacapturing_rs::tracks::{load_cleaned_tracks, load_tracks};
use datacapturing_rs::{
    CaptureConfig, Event, GeoLocation, Measurement, MeasurementStore, MemoryStore,
    MotionStatistics, Pressure, SensorKind, TransferFile, TransferFileSerializer,
};

#[derive(Parser, Debug)]
#[command(name = "capture_tool")]
#[command(about = "Inspect captured measurements and build transfer files", long_about = None)]
struct Args {
    /// JSON config with cleaning and ascend parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the tracks of a measurement dump
    Tracks {
        dump: PathBuf,

        /// Drop locations rejected by the cleaning thresholds
        #[arg(long)]
        clean: bool,
    },
    /// Print speed, distance and ascend of a measurement dump
    Stats {
        dump: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write the transfer file of a measurement dump
    Export {
        dump: PathBuf,

        #[arg(long)]
        out: PathBuf,

        /// Deflate the output, also enabled by `compress` in the config
        #[arg(long)]
        compress: bool,
    },
    /// Decode a transfer file and print what it holds
    Inspect {
        file: PathBuf,

        /// Input is deflated
        #[arg(long)]
        compressed: bool,
    },
}

/// One measurement with its samples, as exported from a device
#[derive(Serialize, Deserialize)]
struct MeasurementDump {
    measurement: Measurement,
    #[serde(default)]
    locations: Vec<GeoLocation>,
    #[serde(default)]
    pressures: Vec<Pressure>,
    #[serde(default)]
    events: Vec<Event>,
    #[serde(default)]
    inertial_files: Vec<InertialFile>,
}

fn load_dump(path: &Path) -> Result<MeasurementDump> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        let reader = BufReader::new(gz);
        Ok(serde_json::from_reader(reader)?)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

/// Loads a dump into a fresh store, returning the measurement id
fn load_store(path: &Path) -> Result<(Arc<MemoryStore>, u64)> {
    let dump = load_dump(path)?;
    let id = dump.measurement.id;
    let store = Arc::new(MemoryStore::new());
    store.insert_measurement(dump.measurement)?;
    for location in dump.locations {
        store.add_location(id, location)?;
    }
    for pressure in dump.pressures {
        store.add_pressure(id, pressure)?;
    }
    for event in dump.events {
        store.append_event(id, event)?;
    }
    for file in dump.inertial_files {
        store.add_inertial_file(id, file)?;
    }
    log::debug!("Loaded measurement {} from {}", id, path.display());
    Ok((store, id))
}

fn format_millis(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn print_tracks(path: &Path, config: &CaptureConfig, clean: bool) -> Result<()> {
    let (store, id) = load_store(path)?;
    let strategy = config.cleaning_strategy();
    let tracks = if clean {
        load_cleaned_tracks(store.as_ref(), id, &strategy)?
    } else {
        load_tracks(store.as_ref(), id)?
    };

    println!("Measurement {}: {} track(s)", id, tracks.len());
    for (i, track) in tracks.iter().enumerate() {
        println!(
            "  #{:<3} {} {:>6} locations {:>6} pressures {:>8.1} s {:>9.1} m",
            i,
            track
                .locations
                .first()
                .map(|l| format_millis(l.timestamp))
                .unwrap_or_default(),
            track.locations.len(),
            track.pressures.len(),
            track.duration_millis() as f64 / 1000.0,
            track_distance(track, &AcceptAllLocations),
        );
    }
    Ok(())
}

fn print_stats(path: &Path, config: &CaptureConfig, json: bool) -> Result<()> {
    let (store, id) = load_store(path)?;
    let strategy = config.cleaning_strategy();
    let tracks = load_tracks(store.as_ref(), id)?;
    let stats = MotionStatistics::compute(&tracks, &strategy, &config.ascend);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }
    println!("Measurement {}", id);
    println!("  Tracks:        {}", stats.track_count);
    println!("  Average speed: {:.2} m/s", stats.average_speed);
    println!("  Max speed:     {:.2} m/s", stats.max_speed);
    println!("  Distance:      {:.1} m", stats.distance);
    match stats.ascend {
        Some(ascend) => println!("  Ascend:        {:.1} m", ascend),
        None => println!("  Ascend:        n/a"),
    }
    Ok(())
}

fn export(path: &Path, out: &Path, compress: bool) -> Result<()> {
    let (store, id) = load_store(path)?;
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    let sink = BufWriter::new(File::create(out)?);
    let written = TransferFileSerializer::new(store).serialize_to(id, compress, sink)?;
    log::info!(
        "Wrote {} bytes to {} ({})",
        written,
        out.display(),
        if compress { "deflated" } else { "plain" }
    );
    Ok(())
}

fn inspect(path: &Path, compressed: bool) -> Result<()> {
    let bytes = fs::read(path)?;
    if bytes.is_empty() {
        bail!("{} is empty", path.display());
    }
    let file = if compressed {
        TransferFile::parse_compressed(&bytes)?
    } else {
        TransferFile::parse(&bytes)?
    };

    println!("{}", path.display());
    println!("  Locations: {}", file.locations.len());
    for sensor in SensorKind::ALL {
        println!(
            "  {:?}: {} points in {} file(s)",
            sensor,
            file.point_count(sensor),
            file.batches(sensor).len()
        );
    }
    println!("  Events:    {}", file.events.len());
    for event in &file.events {
        println!(
            "    {} {:?} {}",
            format_millis(event.timestamp),
            event.event_type,
            event.value.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = CaptureConfig::load_or_default(args.config.as_deref())?;

    match args.command {
        Command::Tracks { dump, clean } => print_tracks(&dump, &config, clean),
        Command::Stats { dump, json } => print_stats(&dump, &config, json),
        Command::Export {
            dump,
            out,
            compress,
        } => export(&dump, &out, compress || config.compress),
        Command::Inspect { file, compressed } => inspect(&file, compressed),
    }
}

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{error, info};
use uecore::calo::geometry::GeometryStore;
use uereco::config::RunConfig;
use uereco::driver::UeDriver;
use uereco::error::RecoResult;
use uereco::event::read_events;

/// uereco - calorimeter window sums and random cones for underlying-event studies
#[derive(Parser, Debug)]
#[command(name = "uereco", version, about)]
struct Cli {
    /// Run configuration (JSON)
    #[arg(long, value_name = "FILE")]
    config: PathBuf,

    /// Events to process (JSON array)
    #[arg(long, value_name = "FILE")]
    events: PathBuf,

    /// Geometry tables (JSON); idealised cylinders when omitted
    #[arg(long, value_name = "FILE")]
    geometry: Option<PathBuf>,

    /// Seed for cone modules that do not set one
    #[arg(long)]
    seed: Option<u64>,

    /// Write event records here instead of stdout
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Debug-level logging
    #[arg(long, short)]
    verbose: bool,
}

fn read_geometry(path: Option<&Path>) -> RecoResult<GeometryStore> {
    match path {
        Some(path) => {
            let reader = BufReader::new(File::open(path)?);
            let geometry: GeometryStore = serde_json::from_reader(reader)?;
            geometry.validate()?;
            Ok(geometry)
        }
        None => {
            info!("no geometry given, using idealised cylindrical geometry");
            Ok(GeometryStore::ideal())
        }
    }
}

fn run(cli: Cli) -> RecoResult<()> {
    let mut config = RunConfig::from_path(&cli.config)?;
    if let Some(seed) = cli.seed {
        for cone in config.cones.iter_mut().filter(|c| c.seed.unwrap_or(0) == 0) {
            cone.seed = Some(seed);
        }
    }

    let geometry = read_geometry(cli.geometry.as_deref())?;
    let events = read_events(&cli.events)?;
    info!("read {} events from {}", events.len(), cli.events.display());

    let mut driver = UeDriver::new(config, geometry)?;
    let records = driver.process_events(&events)?;

    match cli.output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(&path)?);
            serde_json::to_writer_pretty(&mut writer, &records)?;
            writer.flush()?;
            info!("wrote {} records to {}", records.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut writer = BufWriter::new(stdout.lock());
            serde_json::to_writer_pretty(&mut writer, &records)?;
            writeln!(writer)?;
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        error!("{}", e);
        std::process::exit(1);
    }
}

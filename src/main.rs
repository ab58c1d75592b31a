use clap::Parser;
use edmd_lib::cli::{Cli, Commands};
use edmd_lib::config::Settings;
use edmd_lib::ensemble::{self, PackingParams, PackingRequest, PackingResult};
use edmd_lib::io::{self, bin};
use edmd_lib::simulation::{Simulation, SimulationRequest};
use log::{error, info};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Instant;

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(err) = dispatch(cli) {
        // Single-line diagnostic, non-zero exit
        error!("{err}");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::GeneratePackings {
            packing_count,
            particles,
            box_length,
            diameter,
            temperature,
            seed,
            tag,
            data_dir,
        } => generate_packings(
            packing_count,
            particles,
            box_length,
            diameter,
            temperature,
            seed,
            tag,
            data_dir,
        ),
        Commands::Run {
            data_dir,
            config,
            events,
            snapshot_period,
            json,
        } => run_simulations(data_dir, config, events, snapshot_period, json),
    }
}

#[allow(clippy::too_many_arguments)]
fn generate_packings(
    packing_count: usize,
    particles: usize,
    box_length: f64,
    diameter: f64,
    temperature: f64,
    seed: u64,
    tag: String,
    data_dir: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    io::ensure_data_directories(&data_dir)?;
    let started = Instant::now();

    let (tx, rx) = mpsc::channel::<PackingResult>();

    // Writer thread drains completed packings while workers generate
    let writer_dir = data_dir.clone();
    let writer = std::thread::spawn(move || -> Result<usize, String> {
        let mut saved = 0;
        while let Ok(result) = rx.recv() {
            bin::save_file(&result, &writer_dir).map_err(|e| e.to_string())?;
            info!(
                "packing '{}' (id {}) saved with {} particles",
                result.tag,
                result.id,
                result.particles.len()
            );
            saved += 1;
        }
        Ok(saved)
    });

    let requests: Vec<PackingRequest> = (0..packing_count)
        .map(|id| PackingRequest {
            id,
            tag: tag.clone(),
            params: PackingParams {
                n_particles: particles,
                box_lengths: [box_length, box_length, box_length],
                diameter,
                temperature,
                seed: seed + id as u64,
            },
        })
        .collect();

    // Each packing generates independently
    requests
        .into_par_iter()
        .try_for_each_with(tx, |tx, request| ensemble::generate(request, tx.clone()))?;

    let saved = writer.join().expect("packing writer thread panicked")?;
    info!(
        "generated {} packings in {:.2}s",
        saved,
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_simulations(
    data_dir: PathBuf,
    config: Option<PathBuf>,
    events: Option<u64>,
    snapshot_period: Option<f64>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = match config {
        Some(path) => Settings::load(&path)?,
        None => Settings::default(),
    };
    if let Some(events) = events {
        settings.simulation.max_events = events;
    }
    if let Some(period) = snapshot_period {
        settings.simulation.snapshot_period = Some(period);
    }
    settings.validate()?;

    let packing_files = bin::list_files::<PackingResult>(&data_dir)?;
    if packing_files.is_empty() {
        return Err(format!(
            "no packings found under {}; run generate-packings first",
            data_dir.display()
        )
        .into());
    }
    info!("running {} simulations", packing_files.len());
    let started = Instant::now();

    // Each engine is single-threaded; parallelism is across runs
    let results: Vec<Result<(), String>> = packing_files
        .par_iter()
        .map(|path| {
            let packing: PackingResult = bin::load_file(path).map_err(|e| e.to_string())?;

            let mut run_settings = settings.clone();
            run_settings.system.box_lengths = packing.params.box_lengths;
            run_settings.interaction.diameter = packing.params.diameter;

            let request = SimulationRequest {
                id: packing.id,
                tag: format!("{}-run", packing.tag),
                initial_values: packing.particles,
                settings: run_settings,
            };

            let mut simulation = Simulation::new(request).map_err(|e| e.to_string())?;
            let result = simulation.run().map_err(|e| e.to_string())?;

            info!(
                "run {} finished: {} events to t = {:.4} in {:.2}s (KE drift {:+.3e})",
                result.id,
                result.total_events,
                result.end_time,
                result.duration_seconds,
                result.final_ke - result.initial_ke,
            );

            bin::save_file(&result, &data_dir).map_err(|e| e.to_string())?;
            if json {
                io::json::export_json(&result, &data_dir).map_err(|e| e.to_string())?;
            }
            Ok(())
        })
        .collect();

    for result in results {
        result?;
    }

    info!(
        "completed all runs in {:.2}s",
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

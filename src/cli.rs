//! # CLI Module - Command Line Interface for the Simulation Pipeline
//!
//! This module provides a command-line interface for the two-stage
//! event-driven simulation pipeline:
//!
//! ## Stage 1: Packing Generation (`generate-packings`)
//!
//! Creates random non-overlapping sphere packings in parallel and saves
//! each to a separate file in `<data-dir>/packing/`. Packings are seeded,
//! so a batch is reproducible run to run.
//!
//! **Usage**:
//! ```bash
//! edmdsim-rs generate-packings --packing-count 8 --particles 500 --seed 1
//! ```
//!
//! ## Stage 2: Simulation (`run`)
//!
//! Loads every packing from the input directory and runs one event-driven
//! simulation per packing, in parallel across packings (each engine is
//! strictly single-threaded). Results land in `<data-dir>/simulation/`,
//! optionally with JSON copies for inspection.
//!
//! **Usage**:
//! ```bash
//! edmdsim-rs run --events 100000 --config run.toml
//! ```
//!
//! Each command reports timing so batch throughput is visible.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage 1: Generate sphere packings for simulation input
    GeneratePackings {
        /// Number of packings to generate
        #[arg(short = 'c', long, default_value_t = 4)]
        packing_count: usize,

        /// Number of particles per packing
        #[arg(short, long, default_value_t = 500)]
        particles: usize,

        /// Box edge length (cubic box)
        #[arg(short, long, default_value_t = 10.0)]
        box_length: f64,

        /// Sphere diameter
        #[arg(short, long, default_value_t = 1.0)]
        diameter: f64,

        /// Temperature setting the velocity scale
        #[arg(short, long, default_value_t = 1.0)]
        temperature: f64,

        /// Base RNG seed (packing i uses seed + i)
        #[arg(short, long, default_value_t = 1)]
        seed: u64,

        /// Base tag for packing naming
        #[arg(long, default_value = "packing")]
        tag: String,

        /// Root directory for pipeline data
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Stage 2: Run event-driven simulations from generated packings
    Run {
        /// Root directory for pipeline data
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        /// Engine configuration file (TOML); defaults apply when absent
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured number of events to run
        #[arg(short, long)]
        events: Option<u64>,

        /// Override the configured snapshot period (simulation time)
        #[arg(long)]
        snapshot_period: Option<f64>,

        /// Also export results as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

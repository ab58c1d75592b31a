//! Persistence round-trips through temporary directories.

use edmd_lib::config::Settings;
use edmd_lib::ensemble::{generate, generate_particles, PackingParams, PackingRequest, PackingResult};
use edmd_lib::io::{bin, ensure_data_directories, json};
use edmd_lib::simulation::{Simulation, SimulationRequest, SimulationResult};
use std::sync::mpsc;

fn params() -> PackingParams {
    PackingParams {
        n_particles: 20,
        box_lengths: [10.0, 10.0, 10.0],
        diameter: 1.0,
        temperature: 1.0,
        seed: 42,
    }
}

fn packing(id: usize, tag: &str) -> PackingResult {
    let (tx, rx) = mpsc::channel();
    generate(
        PackingRequest {
            id,
            tag: tag.to_string(),
            params: params(),
        },
        tx,
    )
    .expect("generate");
    rx.recv().expect("receive")
}

#[test]
fn data_directories_are_created() {
    let root = tempfile::tempdir().expect("tempdir");
    ensure_data_directories(root.path()).expect("directories");
    assert!(root.path().join("packing").is_dir());
    assert!(root.path().join("simulation").is_dir());
}

#[test]
fn packing_binary_round_trip() {
    let root = tempfile::tempdir().expect("tempdir");
    let original = packing(7, "roundtrip");

    bin::save_file(&original, root.path()).expect("save");
    let files = bin::list_files::<PackingResult>(root.path()).expect("list");
    assert_eq!(files.len(), 1);

    let loaded: PackingResult = bin::load_file(&files[0]).expect("load");
    assert_eq!(loaded.id, original.id);
    assert_eq!(loaded.tag, original.tag);
    assert_eq!(loaded.particles.len(), original.particles.len());
    for (a, b) in loaded.particles.iter().zip(original.particles.iter()) {
        assert_eq!(a.position, b.position);
        assert_eq!(a.velocity, b.velocity);
    }
}

#[test]
fn listing_ignores_foreign_files() {
    let root = tempfile::tempdir().expect("tempdir");
    ensure_data_directories(root.path()).expect("directories");
    std::fs::write(root.path().join("packing/readme.txt"), "not a packing").expect("write");

    let files = bin::list_files::<PackingResult>(root.path()).expect("list");
    assert!(files.is_empty());
}

#[test]
fn simulation_result_round_trips_both_formats() {
    let root = tempfile::tempdir().expect("tempdir");

    let particles = generate_particles(&params()).expect("packing");
    let mut settings = Settings::default();
    settings.simulation.max_events = 50;
    settings.simulation.print_interval = u64::MAX;

    let mut sim = Simulation::new(SimulationRequest {
        id: 3,
        tag: "io-run".to_string(),
        initial_values: particles,
        settings,
    })
    .expect("construction");
    let result = sim.run().expect("run");

    bin::save_file(&result, root.path()).expect("save bin");
    json::export_json(&result, root.path()).expect("save json");

    let files = bin::list_files::<SimulationResult>(root.path()).expect("list");
    assert_eq!(files.len(), 1);
    let from_bin: SimulationResult = bin::load_file(&files[0]).expect("load bin");

    let json_path = root
        .path()
        .join("simulation")
        .join(format!("{}-{}.json", result.tag, result.id));
    let from_json: SimulationResult = json::load_json(&json_path).expect("load json");

    for loaded in [&from_bin, &from_json] {
        assert_eq!(loaded.id, result.id);
        assert_eq!(loaded.total_events, result.total_events);
        assert_eq!(loaded.final_state.len(), result.final_state.len());
        assert!((loaded.end_time - result.end_time).abs() < 1e-15);
        assert!((loaded.final_ke - result.final_ke).abs() < 1e-12);
    }
}

#[test]
fn batch_generation_saves_every_packing() {
    let root = tempfile::tempdir().expect("tempdir");

    for id in 0..3 {
        let result = packing(id, "batch");
        bin::save_file(&result, root.path()).expect("save");
    }

    let files = bin::list_files::<PackingResult>(root.path()).expect("list");
    assert_eq!(files.len(), 3);
    // Listed in deterministic (sorted) order
    let mut sorted = files.clone();
    sorted.sort();
    assert_eq!(files, sorted);
}

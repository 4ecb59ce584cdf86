// Solar Orbits - planar solar system stepper
// Library entry point: loads initial conditions and plays frames into a sink

pub mod config;
pub mod error;
pub mod initial_conditions;
pub mod physics_engine;
pub mod state_manager;

use anyhow::Context;
use parking_lot::RwLock;
use std::fs::File;
use std::io::{self, BufWriter};
use tracing_subscriber::EnvFilter;

pub use config::Config;
pub use error::{ConfigError, PlaybackError, SimulationError};
pub use initial_conditions::{InitialConditions, PlanetRecord, DEFAULT_BODY_IDS};
pub use physics_engine::{
    Attractor, AttractorFrame, Body, BodyFrame, DriftKickIntegrator, Frame, Phase, SimulationState, Trail,
    TrailPolicy, Vector3, MAX_TRAIL_LENGTH, MU_SUN,
};
pub use state_manager::{
    run_playback, start_simulation_loop, FrameSink, JsonLinesSink, PlaybackConfig,
    PlaybackHandle, RunSummary, SharedFrame,
};

/// Logs go to stderr so stdout stays free for frames. `RUST_LOG` overrides
/// the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run() -> anyhow::Result<RunSummary> {
    let config = Config::load();
    init_tracing();
    run_with(&config)
}

/// Loads the initial conditions named by `config` and plays them out
pub fn run_with(config: &Config) -> anyhow::Result<RunSummary> {
    let conditions = InitialConditions::load(&config.input)
        .with_context(|| format!("loading initial conditions from {}", config.input.display()))?;
    let mut sim = conditions
        .to_simulation(&config.bodies)
        .and_then(|sim| sim.with_trail_limit(config.max_trail, config.trail_policy))
        .context("invalid initial conditions")?;

    let playback = config.playback();
    let running = RwLock::new(true);

    let summary = if config.summary_only {
        let summary = run_playback(&mut sim, &playback, &mut SharedFrame::new(), &running)?;
        println!("{}", serde_json::to_string(&summary)?);
        summary
    } else if let Some(path) = &config.output {
        let file = File::create(path)
            .with_context(|| format!("creating frame output {}", path.display()))?;
        let mut sink = JsonLinesSink::new(BufWriter::new(file));
        run_playback(&mut sim, &playback, &mut sink, &running)?
    } else {
        let mut sink = JsonLinesSink::new(io::stdout().lock());
        run_playback(&mut sim, &playback, &mut sink, &running)?
    };

    Ok(summary)
}

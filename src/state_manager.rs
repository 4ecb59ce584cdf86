// State Manager - frame-paced playback of the simulation
// Steps the simulation once per frame and hands each frame to a presentation sink

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::PlaybackError;
use crate::physics_engine::{Frame, SimulationState};

/// Two simulated years at one day per frame
pub const DEFAULT_FRAMES: u64 = 2 * 365;

/// Target wall-clock time between frames
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(20);

// =============================================================================
// PRESENTATION SINKS
// =============================================================================

/// Consumer of per-frame drawable state. Renderers, encoders and writers
/// implement this; the physics never sees them.
pub trait FrameSink {
    fn present(&mut self, frame: &Frame) -> io::Result<()>;

    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Writes one JSON document per frame, newline separated
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> FrameSink for JsonLinesSink<W> {
    fn present(&mut self, frame: &Frame) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, frame)?;
        self.writer.write_all(b"\n")
    }

    fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Latest-frame slot shared with a renderer on another thread.
///
/// Frames are swapped in whole, so readers never see a partial step.
#[derive(Clone, Default)]
pub struct SharedFrame {
    latest: Arc<RwLock<Option<Frame>>>,
}

impl SharedFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<Frame> {
        self.latest.read().clone()
    }
}

impl FrameSink for SharedFrame {
    fn present(&mut self, frame: &Frame) -> io::Result<()> {
        *self.latest.write() = Some(frame.clone());
        Ok(())
    }
}

// =============================================================================
// PLAYBACK LOOP
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackConfig {
    /// Number of frames (steps) to play
    pub frames: u64,
    /// Minimum time between frames; zero plays as fast as possible
    pub interval: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frames: DEFAULT_FRAMES,
            interval: DEFAULT_FRAME_INTERVAL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub frames_played: u64,
    pub final_date: String,
    pub energy_drift: f64,
    pub stopped_early: bool,
}

/// Plays up to `config.frames` frames into `sink`, stopping early when
/// `is_running` is cleared. A simulation fault ends the run.
pub fn run_playback(
    sim: &mut SimulationState,
    config: &PlaybackConfig,
    sink: &mut dyn FrameSink,
    is_running: &RwLock<bool>,
) -> Result<RunSummary, PlaybackError> {
    info!(
        frames = config.frames,
        bodies = sim.bodies().len(),
        start = %sim.date(),
        max_trail = sim.max_trail_length(),
        trail_policy = %sim.trail_policy(),
        "starting playback"
    );

    let mut played = 0;
    let mut stopped_early = false;
    let mut warned_non_finite = false;

    while played < config.frames {
        if !*is_running.read() {
            stopped_early = true;
            break;
        }
        let start = Instant::now();

        let frame = sim.step()?;
        if !warned_non_finite && sim.bodies().iter().any(|b| !b.state.position.is_finite()) {
            warn!(step = frame.step, "body position is no longer finite");
            warned_non_finite = true;
        }
        sink.present(&frame)?;
        played += 1;
        debug!(step = frame.step, date = %frame.date, "frame presented");

        // Sleep to maintain frame rate
        let elapsed = start.elapsed();
        if elapsed < config.interval {
            thread::sleep(config.interval - elapsed);
        }
    }
    sink.finish()?;

    let summary = RunSummary {
        frames_played: played,
        final_date: sim.frame().date,
        energy_drift: sim.energy_drift(),
        stopped_early,
    };
    info!(
        frames = summary.frames_played,
        end = %summary.final_date,
        energy_drift = summary.energy_drift,
        "playback finished"
    );
    Ok(summary)
}

/// Background playback with a shared view of the latest frame
pub struct PlaybackHandle {
    pub latest: SharedFrame,
    pub is_running: Arc<RwLock<bool>>,
    join: JoinHandle<Result<RunSummary, PlaybackError>>,
}

impl PlaybackHandle {
    /// Asks the loop to stop after the frame in flight
    pub fn stop(&self) {
        *self.is_running.write() = false;
    }

    pub fn join(self) -> Result<RunSummary, PlaybackError> {
        self.join.join().map_err(|_| PlaybackError::Panicked)?
    }
}

/// Sink that feeds the shared slot and then the caller's sink
struct Tee {
    shared: SharedFrame,
    inner: Box<dyn FrameSink + Send>,
}

impl FrameSink for Tee {
    fn present(&mut self, frame: &Frame) -> io::Result<()> {
        self.shared.present(frame)?;
        self.inner.present(frame)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.inner.finish()
    }
}

/// Runs the playback loop on its own thread. The thread is the only stepper;
/// observers read whole frames through `PlaybackHandle::latest`.
pub fn start_simulation_loop(
    mut sim: SimulationState,
    config: PlaybackConfig,
    sink: Box<dyn FrameSink + Send>,
) -> PlaybackHandle {
    let latest = SharedFrame::new();
    let is_running = Arc::new(RwLock::new(true));

    let mut tee = Tee {
        shared: latest.clone(),
        inner: sink,
    };
    let running = is_running.clone();
    let join = thread::spawn(move || run_playback(&mut sim, &config, &mut tee, &running));

    PlaybackHandle {
        latest,
        is_running,
        join,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SimulationError;
    use crate::physics_engine::{Body, TrailPolicy, Vector3};
    use chrono::NaiveDate;

    fn sim() -> SimulationState {
        let date = NaiveDate::from_ymd_opt(2019, 8, 12).unwrap();
        let bodies = vec![
            Body::new("3", Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.0172, 0.0)),
            Body::new("4", Vector3::new(0.0, 1.52, 0.0), Vector3::new(-0.0139, 0.0, 0.0)),
        ];
        SimulationState::new(date, bodies).unwrap()
    }

    fn fast(frames: u64) -> PlaybackConfig {
        PlaybackConfig {
            frames,
            interval: Duration::ZERO,
        }
    }

    #[test]
    fn test_json_lines_one_frame_per_line() {
        let mut sim = sim();
        let mut sink = JsonLinesSink::new(Vec::new());
        let running = RwLock::new(true);

        let summary = run_playback(&mut sim, &fast(5), &mut sink, &running).unwrap();
        assert_eq!(summary.frames_played, 5);
        assert_eq!(summary.final_date, "2019-08-17");
        assert!(!summary.stopped_early);

        let out = String::from_utf8(sink.into_inner()).unwrap();
        let frames: Vec<Frame> = out
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(frames.len(), 5);
        assert_eq!(frames[0].date, "2019-08-13");
        assert_eq!(frames[4].bodies[1].trail_x.len(), 5);
    }

    #[test]
    fn test_shared_frame_holds_latest() {
        let mut sim = sim();
        let mut shared = SharedFrame::new();
        assert!(shared.latest().is_none());

        run_playback(&mut sim, &fast(3), &mut shared, &RwLock::new(true)).unwrap();
        let latest = shared.latest().unwrap();
        assert_eq!(latest.step, 3);
        assert_eq!(latest, sim.frame());
    }

    #[test]
    fn test_cleared_flag_stops_before_stepping() {
        let mut sim = sim();
        let mut shared = SharedFrame::new();
        let summary = run_playback(&mut sim, &fast(10), &mut shared, &RwLock::new(false)).unwrap();
        assert_eq!(summary.frames_played, 0);
        assert!(summary.stopped_early);
        assert_eq!(sim.steps(), 0);
    }

    #[test]
    fn test_overflow_ends_playback() {
        let mut sim = sim().with_trail_limit(3, TrailPolicy::Fail).unwrap();
        let mut shared = SharedFrame::new();

        let err = run_playback(&mut sim, &fast(10), &mut shared, &RwLock::new(true)).unwrap_err();
        assert!(matches!(
            err,
            PlaybackError::Simulation(SimulationError::TrailOverflow { max: 3, .. })
        ));
        assert_eq!(shared.latest().unwrap().step, 3);
    }

    #[test]
    fn test_background_loop_runs_to_completion() {
        let handle = start_simulation_loop(sim(), fast(25), Box::new(JsonLinesSink::new(io::sink())));
        let summary = handle.join().unwrap();
        assert_eq!(summary.frames_played, 25);
    }

    #[test]
    fn test_background_loop_stops_on_request() {
        let config = PlaybackConfig {
            frames: 10_000,
            interval: Duration::from_millis(1),
        };
        let handle = start_simulation_loop(sim(), config, Box::new(SharedFrame::new()));
        handle.stop();
        let summary = handle.join().unwrap();
        assert!(summary.stopped_early);
        assert!(summary.frames_played < 10_000);
    }
}

// Host configuration - command line flags with SOLAR_* environment fallbacks
// A `.env` file in the working directory is loaded before parsing.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::initial_conditions::DEFAULT_BODY_IDS;
use crate::physics_engine::{TrailPolicy, MAX_TRAIL_LENGTH};
use crate::state_manager::{PlaybackConfig, DEFAULT_FRAMES};

#[derive(Parser, Debug, Clone)]
#[command(name = "solar-orbits")]
#[command(about = "Planar solar system stepper: plays frames of body positions and trails")]
pub struct Config {
    /// Initial conditions file (JSON)
    #[arg(short, long, env = "SOLAR_INPUT", default_value = "planetas.json")]
    pub input: PathBuf,

    /// Number of frames (simulated days) to play
    #[arg(short, long, env = "SOLAR_FRAMES", default_value_t = DEFAULT_FRAMES)]
    pub frames: u64,

    /// Milliseconds between frames, 0 to run unpaced
    #[arg(long, env = "SOLAR_INTERVAL_MS", default_value_t = 20)]
    pub interval_ms: u64,

    /// Maximum points kept per trail
    #[arg(long, env = "SOLAR_MAX_TRAIL", default_value_t = MAX_TRAIL_LENGTH)]
    pub max_trail: usize,

    /// What to do when a trail reaches the maximum: fail, drop-oldest or downsample
    #[arg(long, env = "SOLAR_TRAIL_POLICY", default_value_t = TrailPolicy::Fail)]
    pub trail_policy: TrailPolicy,

    /// Body ids to load, in rendering order
    #[arg(
        short,
        long,
        env = "SOLAR_BODIES",
        value_delimiter = ',',
        default_values_t = DEFAULT_BODY_IDS.map(String::from).to_vec()
    )]
    pub bodies: Vec<String>,

    /// Write frames as JSON lines to this file instead of stdout
    #[arg(short, long, env = "SOLAR_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Only print the run summary, no per-frame output
    #[arg(long, env = "SOLAR_SUMMARY_ONLY", default_value_t = false)]
    pub summary_only: bool,
}

impl Config {
    /// Loads `.env` (if present) and parses the process arguments
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::parse()
    }

    pub fn playback(&self) -> PlaybackConfig {
        PlaybackConfig {
            frames: self.frames,
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::try_parse_from(["solar-orbits"]).unwrap();
        assert_eq!(cfg.frames, 730);
        assert_eq!(cfg.max_trail, 10_000);
        assert_eq!(cfg.trail_policy, TrailPolicy::Fail);
        assert_eq!(cfg.bodies, vec!["1", "2", "3", "4"]);
        assert_eq!(cfg.playback().interval, Duration::from_millis(20));
        assert!(cfg.output.is_none());
    }

    #[test]
    fn test_flags() {
        let cfg = Config::try_parse_from([
            "solar-orbits",
            "--frames",
            "10",
            "--interval-ms",
            "0",
            "--trail-policy",
            "drop-oldest",
            "--bodies",
            "3,4",
            "--summary-only",
        ])
        .unwrap();
        assert_eq!(cfg.playback().frames, 10);
        assert_eq!(cfg.playback().interval, Duration::ZERO);
        assert_eq!(cfg.trail_policy, TrailPolicy::DropOldest);
        assert_eq!(cfg.bodies, vec!["3", "4"]);
        assert!(cfg.summary_only);
    }

    #[test]
    fn test_bad_policy_rejected() {
        assert!(Config::try_parse_from(["solar-orbits", "--trail-policy", "evict"]).is_err());
    }
}

// Physics Engine - Planar Solar System Mechanics
// Fixed central attractor, drift-then-kick stepping and bounded trails

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult, SimulationError, SimulationResult};

// =============================================================================
// PHYSICAL CONSTANTS (AU / day units)
// =============================================================================

/// Sun's gravitational parameter μ = G * M_sun (AU³/day²)
pub const MU_SUN: f64 = 2.959e-4;

/// Simulated days per step
pub const STEP_DAYS: u64 = 1;

/// Time step in days
pub const DT: f64 = STEP_DAYS as f64;

/// Default ceiling on the number of points kept per trail
pub const MAX_TRAIL_LENGTH: usize = 10_000;

// =============================================================================
// 3D VECTOR MATHEMATICS
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Builds a vector from 2 or 3 components; a planar input gets z = 0.
    pub fn from_components(components: &[f64]) -> Option<Self> {
        match *components {
            [x, y] => Some(Self::new(x, y, 0.0)),
            [x, y, z] => Some(Self::new(x, y, z)),
            _ => None,
        }
    }

    pub fn magnitude_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude_squared().sqrt()
    }

    pub fn scale(&self, s: f64) -> Self {
        Self {
            x: self.x * s,
            y: self.y * s,
            z: self.z * s,
        }
    }

    pub fn div(&self, s: f64) -> Self {
        Self {
            x: self.x / s,
            y: self.y / s,
            z: self.z / s,
        }
    }

    pub fn add(&self, other: &Vector3) -> Vector3 {
        Vector3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// =============================================================================
// STATE VECTOR (Position + Velocity)
// =============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StateVector {
    pub position: Vector3, // AU
    pub velocity: Vector3, // AU/day
}

impl StateVector {
    pub fn new(position: Vector3, velocity: Vector3) -> Self {
        Self { position, velocity }
    }
}

// =============================================================================
// TRAIL
// =============================================================================

/// Rendered (x, y) history of a body, one pair per step.
///
/// Both coordinate sequences always have the same length.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Trail {
    xs: VecDeque<f64>,
    ys: VecDeque<f64>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: f64, y: f64) {
        self.xs.push_back(x);
        self.ys.push_back(y);
    }

    pub fn len(&self) -> usize {
        self.xs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    pub fn xs(&self) -> &VecDeque<f64> {
        &self.xs
    }

    pub fn ys(&self) -> &VecDeque<f64> {
        &self.ys
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        Some((*self.xs.back()?, *self.ys.back()?))
    }

    fn evict_oldest(&mut self) {
        self.xs.pop_front();
        self.ys.pop_front();
    }

    /// Keeps every other point, always retaining the newest one.
    fn downsample(&mut self) {
        let len = self.len();
        let keep = |i: &usize| (len - 1 - i) % 2 == 0;
        self.xs = self
            .xs
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(i))
            .map(|(_, x)| *x)
            .collect();
        self.ys = self
            .ys
            .iter()
            .enumerate()
            .filter(|(i, _)| keep(i))
            .map(|(_, y)| *y)
            .collect();
    }
}

/// What to do when recording a point would push a trail past its ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrailPolicy {
    /// Refuse the step with `SimulationError::TrailOverflow`
    #[default]
    Fail,
    /// Drop the oldest point to make room
    DropOldest,
    /// Halve the trail resolution, then append
    Downsample,
}

impl TrailPolicy {
    /// Makes room for one more point under this policy. `Fail` never
    /// mutates; capacity for it is checked up front by the stepper.
    fn make_room(self, trail: &mut Trail, max: usize) {
        if trail.len() < max {
            return;
        }
        match self {
            TrailPolicy::Fail => {}
            TrailPolicy::DropOldest => {
                while trail.len() >= max {
                    trail.evict_oldest();
                }
            }
            TrailPolicy::Downsample => {
                trail.downsample();
                while trail.len() >= max {
                    trail.evict_oldest();
                }
            }
        }
    }
}

impl FromStr for TrailPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(TrailPolicy::Fail),
            "drop-oldest" | "drop_oldest" => Ok(TrailPolicy::DropOldest),
            "downsample" => Ok(TrailPolicy::Downsample),
            other => Err(format!(
                "unknown trail policy {other:?} (expected fail, drop-oldest or downsample)"
            )),
        }
    }
}

impl fmt::Display for TrailPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrailPolicy::Fail => "fail",
            TrailPolicy::DropOldest => "drop-oldest",
            TrailPolicy::Downsample => "downsample",
        };
        f.write_str(name)
    }
}

// =============================================================================
// BODY
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Body {
    pub id: String,
    pub name: String,
    /// Relative display size
    pub size: f64,
    pub state: StateVector,
    pub trail: Trail,
}

impl Body {
    /// New body with an empty trail. Name defaults to the id.
    pub fn new(id: impl Into<String>, position: Vector3, velocity: Vector3) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            size: 1.0,
            state: StateVector::new(position, velocity),
            trail: Trail::new(),
        }
    }

    /// Builds a body from raw component slices, rejecting anything that is
    /// not a 2- or 3-component vector.
    pub fn from_components(id: impl Into<String>, r: &[f64], v: &[f64]) -> ConfigResult<Self> {
        let id = id.into();
        let dimension_error = |field: &'static str, len: usize| ConfigError::VectorDimension {
            body: id.clone(),
            field,
            len,
        };
        let position = Vector3::from_components(r).ok_or_else(|| dimension_error("r", r.len()))?;
        let velocity = Vector3::from_components(v).ok_or_else(|| dimension_error("v", v.len()))?;
        Ok(Self::new(id, position, velocity))
    }

    pub fn with_display(mut self, name: impl Into<String>, size: f64) -> Self {
        self.name = name.into();
        self.size = size;
        self
    }

    /// Appends the x/y components of `snapshot` to the trail
    pub fn record(&mut self, snapshot: &Vector3) {
        self.trail.push(snapshot.x, snapshot.y);
    }

    /// Specific orbital energy v²/2 - μ/r (AU²/day²)
    pub fn specific_energy(&self, mu: f64) -> f64 {
        let v2 = self.state.velocity.magnitude_squared();
        let r = self.state.position.magnitude();
        0.5 * v2 - mu / r
    }
}

// =============================================================================
// ATTRACTOR + DRIFT-KICK INTEGRATOR
// =============================================================================

/// The fixed gravitational source at the origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Attractor {
    pub mu: f64,
}

impl Attractor {
    pub fn sun() -> Self {
        Self { mu: MU_SUN }
    }

    /// Inverse-square acceleration toward the origin: -μ r / |r|³
    pub fn acceleration_at(&self, position: &Vector3) -> Vector3 {
        position
            .scale(-self.mu)
            .div(position.magnitude_squared().powf(1.5))
    }
}

impl Default for Attractor {
    fn default() -> Self {
        Self::sun()
    }
}

/// First-order stepper that drifts the position with the old velocity, then
/// kicks the velocity with the acceleration at the new position.
///
/// x(t+dt) = x(t) + v(t)*dt
/// v(t+dt) = v(t) + a(x(t+dt))*dt
///
/// The ordering is fixed; changing it changes every trajectory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriftKickIntegrator {
    /// Time step in days
    pub dt: f64,
}

impl DriftKickIntegrator {
    pub fn new(dt: f64) -> Self {
        Self { dt }
    }

    pub fn advance(&self, state: &mut StateVector, attractor: &Attractor) {
        state.position = state.position.add(&state.velocity.scale(self.dt));
        let acceleration = attractor.acceleration_at(&state.position);
        state.velocity = state.velocity.add(&acceleration.scale(self.dt));
    }
}

impl Default for DriftKickIntegrator {
    fn default() -> Self {
        Self::new(DT)
    }
}

// =============================================================================
// ENERGY CALCULATIONS (for drift monitoring)
// =============================================================================

/// Sum of the bodies' specific orbital energies
pub fn calculate_total_energy(bodies: &[Body], mu: f64) -> f64 {
    bodies.iter().map(|b| b.specific_energy(mu)).sum()
}

// =============================================================================
// FRAME OUTPUT
// =============================================================================

/// Drawable state of one body after a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyFrame {
    pub id: String,
    pub name: String,
    pub size: f64,
    pub position: [f64; 2], // AU
    pub trail_x: Vec<f64>,
    pub trail_y: Vec<f64>,
}

/// The fixed source as drawn by a renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttractorFrame {
    pub position: [f64; 2], // AU, always the origin
    pub mu: f64,
}

impl From<&Attractor> for AttractorFrame {
    fn from(attractor: &Attractor) -> Self {
        Self {
            position: [0.0, 0.0],
            mu: attractor.mu,
        }
    }
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub step: u64,
    /// ISO-8601 calendar date
    pub date: String,
    pub attractor: AttractorFrame,
    pub bodies: Vec<BodyFrame>,
    pub energy_drift: f64,
}

impl From<&Body> for BodyFrame {
    fn from(body: &Body) -> Self {
        Self {
            id: body.id.clone(),
            name: body.name.clone(),
            size: body.size,
            position: [body.state.position.x, body.state.position.y],
            trail_x: body.trail.xs().iter().copied().collect(),
            trail_y: body.trail.ys().iter().copied().collect(),
        }
    }
}

// =============================================================================
// SIMULATION STATE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Time and bodies set, no step taken yet
    Initialized,
    /// At least one step taken
    Running,
}

#[derive(Debug, Clone)]
pub struct SimulationState {
    bodies: Vec<Body>,
    attractor: Attractor,
    integrator: DriftKickIntegrator,
    date: NaiveDate,
    steps: u64,
    max_trail_length: usize,
    trail_policy: TrailPolicy,
    initial_energy: f64,
}

impl SimulationState {
    /// Sun-centred simulation starting at `date`
    pub fn new(date: NaiveDate, bodies: Vec<Body>) -> ConfigResult<Self> {
        Self::with_attractor(date, bodies, Attractor::sun())
    }

    pub fn with_attractor(
        date: NaiveDate,
        bodies: Vec<Body>,
        attractor: Attractor,
    ) -> ConfigResult<Self> {
        if bodies.is_empty() {
            return Err(ConfigError::EmptySystem);
        }
        let initial_energy = calculate_total_energy(&bodies, attractor.mu);

        Ok(Self {
            bodies,
            attractor,
            integrator: DriftKickIntegrator::default(),
            date,
            steps: 0,
            max_trail_length: MAX_TRAIL_LENGTH,
            trail_policy: TrailPolicy::Fail,
            initial_energy,
        })
    }

    /// Overrides the trail ceiling and what happens when it is reached
    pub fn with_trail_limit(mut self, max: usize, policy: TrailPolicy) -> ConfigResult<Self> {
        if max == 0 {
            return Err(ConfigError::ZeroTrailCeiling);
        }
        self.max_trail_length = max;
        self.trail_policy = policy;
        Ok(self)
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn body(&self, id: &str) -> Option<&Body> {
        self.bodies.iter().find(|b| b.id == id)
    }

    pub fn attractor(&self) -> &Attractor {
        &self.attractor
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn max_trail_length(&self) -> usize {
        self.max_trail_length
    }

    pub fn trail_policy(&self) -> TrailPolicy {
        self.trail_policy
    }

    pub fn phase(&self) -> Phase {
        if self.steps == 0 {
            Phase::Initialized
        } else {
            Phase::Running
        }
    }

    /// Relative drift of the total specific energy since the start
    pub fn energy_drift(&self) -> f64 {
        let current = calculate_total_energy(&self.bodies, self.attractor.mu);
        if self.initial_energy.abs() > 1e-20 {
            (current - self.initial_energy).abs() / self.initial_energy.abs()
        } else {
            0.0
        }
    }

    /// Advances every body by one day and returns the fresh frame.
    ///
    /// Under `TrailPolicy::Fail` a step that would push a trail past the
    /// ceiling is refused before anything is touched.
    pub fn step(&mut self) -> SimulationResult<Frame> {
        self.check_trail_capacity()?;
        let next_date = self
            .date
            .checked_add_days(Days::new(STEP_DAYS))
            .ok_or(SimulationError::CalendarOverflow { date: self.date })?;

        for body in &mut self.bodies {
            self.integrator.advance(&mut body.state, &self.attractor);
            self.trail_policy
                .make_room(&mut body.trail, self.max_trail_length);
            let position = body.state.position;
            body.record(&position);
        }

        self.date = next_date;
        self.steps += 1;

        Ok(self.frame())
    }

    /// Snapshot of the current drawable state
    pub fn frame(&self) -> Frame {
        Frame {
            step: self.steps,
            date: self.date.format("%Y-%m-%d").to_string(),
            attractor: AttractorFrame::from(&self.attractor),
            bodies: self.bodies.iter().map(BodyFrame::from).collect(),
            energy_drift: self.energy_drift(),
        }
    }

    fn check_trail_capacity(&self) -> SimulationResult<()> {
        if self.trail_policy != TrailPolicy::Fail {
            return Ok(());
        }
        match self
            .bodies
            .iter()
            .find(|b| b.trail.len() >= self.max_trail_length)
        {
            Some(body) => Err(SimulationError::TrailOverflow {
                body: body.id.clone(),
                length: body.trail.len() + 1,
                max: self.max_trail_length,
            }),
            None => Ok(()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

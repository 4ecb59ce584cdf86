// Initial Conditions - typed loader for the planet state file
// Reads the start date and per-body state vectors, validates them into Bodies

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::physics_engine::{Body, SimulationState};

/// Start date format used by the input file
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Bodies loaded when no explicit selection is given (Mercury..Mars ids)
pub const DEFAULT_BODY_IDS: [&str; 4] = ["1", "2", "3", "4"];

// =============================================================================
// INPUT TYPES
// =============================================================================

/// One entry of the input file, keyed by body id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanetRecord {
    pub name: String,
    /// Relative display size
    pub size: f64,
    /// Heliocentric position (AU)
    pub r: Vec<f64>,
    /// Heliocentric velocity (AU/day)
    pub v: Vec<f64>,
}

/// Whole input file: `{"date": "YYYY-MM-DD", "<id>": PlanetRecord, ...}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitialConditions {
    pub date: String,
    #[serde(flatten)]
    pub bodies: BTreeMap<String, PlanetRecord>,
}

/// `YYYY-MM-DD`: exactly ten characters, digits with dashes at 4 and 7
fn is_iso_calendar_date(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

impl PlanetRecord {
    /// Validates the record into a Body with an empty trail
    pub fn to_body(&self, id: &str) -> ConfigResult<Body> {
        Ok(Body::from_components(id, &self.r, &self.v)?.with_display(&self.name, self.size))
    }
}

impl InitialConditions {
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parses the start date; only the plain `YYYY-MM-DD` shape is accepted.
    pub fn start_date(&self) -> ConfigResult<NaiveDate> {
        let invalid = || ConfigError::InvalidDate {
            value: self.date.clone(),
        };
        if !is_iso_calendar_date(&self.date) {
            return Err(invalid());
        }
        NaiveDate::parse_from_str(&self.date, DATE_FORMAT).map_err(|_| invalid())
    }

    /// Bodies for `ids`, in the order requested. Ids present in the file but
    /// not requested are ignored.
    pub fn bodies_for<S: AsRef<str>>(&self, ids: &[S]) -> ConfigResult<Vec<Body>> {
        if ids.is_empty() {
            return Err(ConfigError::EmptySystem);
        }
        ids.iter()
            .map(|id| {
                let id = id.as_ref();
                self.bodies
                    .get(id)
                    .ok_or_else(|| ConfigError::MissingBody(id.to_string()))?
                    .to_body(id)
            })
            .collect()
    }

    /// Builds a ready-to-step simulation from the selected bodies
    pub fn to_simulation<S: AsRef<str>>(&self, ids: &[S]) -> ConfigResult<SimulationState> {
        let date = self.start_date()?;
        let bodies = self.bodies_for(ids)?;
        SimulationState::new(date, bodies)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics_engine::Vector3;

    const SAMPLE: &str = r#"{
        "date": "2019-08-12",
        "1": {"name": "Mercury", "size": 0.38, "r": [-0.39, -0.06, 0.03], "v": [0.0012, -0.0265, -0.0023]},
        "2": {"name": "Venus", "size": 0.95, "r": [0.41, 0.59, -0.02], "v": [-0.0166, 0.0114, 0.0011]},
        "3": {"name": "Earth", "size": 1.0, "r": [0.79, -0.63, 0.0], "v": [0.0104, 0.0134, 0.0]},
        "4": {"name": "Mars", "size": 0.53, "r": [-1.59, 0.53], "v": [-0.0039, -0.0122]},
        "5": {"name": "Jupiter", "size": 11.2, "r": [0.16, -5.23, 0.02], "v": [0.0074, 0.0004, -0.0002]}
    }"#;

    #[test]
    fn test_parse_sample() {
        let ic = InitialConditions::from_json_str(SAMPLE).unwrap();
        assert_eq!(ic.bodies.len(), 5);
        assert_eq!(
            ic.start_date().unwrap(),
            NaiveDate::from_ymd_opt(2019, 8, 12).unwrap()
        );
    }

    #[test]
    fn test_default_selection_keeps_order_and_metadata() {
        let ic = InitialConditions::from_json_str(SAMPLE).unwrap();
        let bodies = ic.bodies_for(&DEFAULT_BODY_IDS).unwrap();

        let ids: Vec<&str> = bodies.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(bodies[2].name, "Earth");
        assert!((bodies[0].size - 0.38).abs() < 1e-12);
        assert!(bodies.iter().all(|b| b.trail.is_empty()));
    }

    #[test]
    fn test_planar_vectors_padded() {
        let ic = InitialConditions::from_json_str(SAMPLE).unwrap();
        let mars = &ic.bodies_for(&["4"]).unwrap()[0];
        assert_eq!(mars.state.position, Vector3::new(-1.59, 0.53, 0.0));
        assert_eq!(mars.state.velocity, Vector3::new(-0.0039, -0.0122, 0.0));
    }

    #[test]
    fn test_missing_body_is_config_fault() {
        let ic = InitialConditions::from_json_str(SAMPLE).unwrap();
        let err = ic.bodies_for(&["1", "9"]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingBody(ref id) if id == "9"));
    }

    #[test]
    fn test_empty_selection_rejected() {
        let ic = InitialConditions::from_json_str(SAMPLE).unwrap();
        let none: [&str; 0] = [];
        assert!(matches!(ic.bodies_for(&none), Err(ConfigError::EmptySystem)));
    }

    #[test]
    fn test_bad_date_rejected() {
        let json = r#"{"date": "12/08/2019", "1": {"name": "Mercury", "size": 0.38, "r": [1, 0, 0], "v": [0, 0.0172, 0]}}"#;
        let ic = InitialConditions::from_json_str(json).unwrap();
        assert!(matches!(
            ic.start_date(),
            Err(ConfigError::InvalidDate { .. })
        ));
        assert!(ic.to_simulation(&["1"]).is_err());
    }

    #[test]
    fn test_non_iso_dates_rejected() {
        for date in ["+262142-12-31", "2019-8-1", "2019-08-1", " 2019-08-12", "2019/08/12", "2019-02-30"] {
            let ic = InitialConditions {
                date: date.to_string(),
                bodies: BTreeMap::new(),
            };
            assert!(
                matches!(ic.start_date(), Err(ConfigError::InvalidDate { .. })),
                "{date:?} accepted"
            );
        }
    }

    #[test]
    fn test_last_four_digit_date_steps() {
        let json = r#"{"date": "9999-12-30", "1": {"name": "Mercury", "size": 0.38, "r": [1, 0, 0], "v": [0, 0.0172, 0]}}"#;
        let mut sim = InitialConditions::from_json_str(json)
            .unwrap()
            .to_simulation(&["1"])
            .unwrap();
        assert_eq!(sim.step().unwrap().date, "9999-12-31");
    }

    #[test]
    fn test_bad_dimension_rejected() {
        let json = r#"{"date": "2019-08-12", "1": {"name": "Mercury", "size": 0.38, "r": [1], "v": [0, 0.0172, 0]}}"#;
        let ic = InitialConditions::from_json_str(json).unwrap();
        assert!(matches!(
            ic.bodies_for(&["1"]),
            Err(ConfigError::VectorDimension { field: "r", len: 1, .. })
        ));
    }

    #[test]
    fn test_missing_field_is_parse_fault() {
        let json = r#"{"date": "2019-08-12", "1": {"name": "Mercury", "r": [1, 0, 0], "v": [0, 1, 0]}}"#;
        assert!(matches!(
            InitialConditions::from_json_str(json),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_fault() {
        let err = InitialConditions::load("definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_to_simulation_starts_initialized() {
        let ic = InitialConditions::from_json_str(SAMPLE).unwrap();
        let sim = ic.to_simulation(&DEFAULT_BODY_IDS).unwrap();
        assert_eq!(sim.steps(), 0);
        assert_eq!(sim.bodies().len(), 4);
        assert_eq!(sim.frame().date, "2019-08-12");
    }
}

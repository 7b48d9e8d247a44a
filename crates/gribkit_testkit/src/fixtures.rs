//! Test fixtures and container helpers.
//!
//! The forecast fixture is five mean-sea-level-pressure fields for
//! 2011-02-25, one per forecast step.

use gribkit_codec::{encode_frame, Record, VALUES_KEY};
use gribkit_storage::{FileBackend, StorageBackend};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Forecast steps of the standard fixture, in file order.
pub const STEP_RANGES: [&str; 5] = ["0", "6", "12", "18", "24"];

/// Base date of every fixture field.
pub const DATA_DATE: i64 = 20110225;

/// Number of grid values in every fixture field.
pub const VALUE_COUNT: usize = 6;

/// Keys the fixture index is usually built over.
pub const INDEX_KEYS: [&str; 2] = ["dataDate", "stepRange"];

/// A reduced-Gaussian pressure field at one forecast step.
pub fn forecast_field(step: &str) -> Record {
    let offset = step.parse::<f64>().unwrap_or(0.0);
    let values: Vec<f64> = (0..VALUE_COUNT)
        .map(|i| 101_325.0 - offset * 10.0 + i as f64 * 0.5)
        .collect();

    Record::builder()
        .field_in("editionNumber", &["ls"], 2)
        .field_in("centre", &["ls", "mars"], "ecmf")
        .field_in("dataDate", &["ls", "time", "mars"], DATA_DATE)
        .field_in("dataTime", &["ls", "time", "mars"], 0)
        .field_in("stepRange", &["ls", "time", "mars"], step)
        .field_in("shortName", &["ls", "parameter"], "msl")
        .field_in("paramId", &["parameter", "mars"], 151)
        .field_in("typeOfLevel", &["ls", "vertical"], "meanSea")
        .field_in("level", &["ls", "vertical", "mars"], 0)
        .missing_in("scaleFactorOfSecondFixedSurface", &["vertical"])
        .field_in("gridType", &["ls", "geography"], "reduced_gg")
        .field_in("pl", &["geography"], vec![2i64, 4, 0])
        .field_in("pv", &["vertical"], vec![0.0, 0.5, 1.0])
        .field_in("numberOfValues", &["data"], VALUE_COUNT as i64)
        .field_in(VALUES_KEY, &["data"], values)
        .build()
}

/// Writes one forecast field per step to `path`, replacing any existing
/// file.
pub fn write_container(path: &Path, steps: &[&str]) {
    let mut file = FileBackend::create(path).expect("Failed to create container file");
    for step in steps {
        let frame = encode_frame(&forecast_field(step)).expect("Failed to encode fixture");
        file.append(&frame).expect("Failed to write fixture");
    }
    file.sync().expect("Failed to sync container file");
}

/// A container file in a temporary directory, removed on drop.
pub struct TempContainer {
    dir: TempDir,
    path: PathBuf,
}

impl TempContainer {
    /// The standard five-step forecast container.
    pub fn forecast() -> Self {
        Self::with_steps(&STEP_RANGES)
    }

    /// A forecast container with the given steps.
    pub fn with_steps(steps: &[&str]) -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("forecast.grib2");
        write_container(&path, steps);
        Self { dir, path }
    }

    /// Path of the container file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A path next to the container for files a test writes.
    pub fn sibling(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

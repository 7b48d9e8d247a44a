//! Built-in sample templates.

use crate::record::{Record, VALUES_KEY};

/// Names of the templates compiled into the codec.
pub const BUILTIN_SAMPLES: &[&str] = &["GRIB2"];

/// Returns a built-in template by name.
#[must_use]
pub fn builtin(name: &str) -> Option<Record> {
    match name {
        "GRIB2" => Some(grib2()),
        _ => None,
    }
}

/// A 2x2 regular lat/lon surface field.
fn grib2() -> Record {
    Record::builder()
        .field_in("editionNumber", &["ls"], 2)
        .field_in("centre", &["ls", "mars"], "ecmf")
        .field_in("dataDate", &["ls", "time", "mars"], 20070323)
        .field_in("dataTime", &["ls", "time", "mars"], 1200)
        .field_in("stepRange", &["ls", "time", "mars"], "0")
        .field_in("shortName", &["ls", "parameter"], "t")
        .field_in("paramId", &["parameter", "mars"], 130)
        .field_in("typeOfLevel", &["ls", "vertical"], "surface")
        .field_in("level", &["ls", "vertical", "mars"], 0)
        .missing_in("scaleFactorOfSecondFixedSurface", &["vertical"])
        .missing_in("scaledValueOfSecondFixedSurface", &["vertical"])
        .field_in("gridType", &["ls", "geography"], "regular_ll")
        .field_in("Ni", &["geography"], 2)
        .field_in("Nj", &["geography"], 2)
        .field_in("pv", &["vertical"], Vec::<f64>::new())
        .field_in("numberOfValues", &["data"], 4)
        .field_in("bitsPerValue", &["data"], 16)
        .field_in(VALUES_KEY, &["data"], vec![273.15, 274.0, 272.5, 273.9])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_listed_sample_exists() {
        for name in BUILTIN_SAMPLES {
            assert!(builtin(name).is_some(), "missing sample {name}");
        }
        assert!(builtin("GRIB0").is_none());
    }

    #[test]
    fn grib2_sample_has_payload() {
        let sample = builtin("GRIB2").unwrap();
        assert_eq!(sample.get(VALUES_KEY).unwrap().unwrap().len(), 4);
        assert!(sample.is_missing("scaleFactorOfSecondFixedSurface").unwrap());
    }
}

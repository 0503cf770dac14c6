use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::domain::{ActivityKind, ActivityRecord};

/// Error raised while reading an activity CSV export.
#[derive(Debug, thiserror::Error)]
pub enum ActivityImportError {
    #[error("failed to read activity export: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid activity CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: '{value}' is not a YYYY-MM-DD date")]
    InvalidDate { row: usize, value: String },
}

/// Reads activity rows from CSV with a `date,type,on_time,rating,distance_km,incidents` header.
pub struct ActivityCsvImporter;

impl ActivityCsvImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<ActivityRecord>, ActivityImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<ActivityRecord>, ActivityImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut records = Vec::new();

        for (index, row) in csv_reader.deserialize::<ActivityRow>().enumerate() {
            let row = row?;
            let date = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d").map_err(|_| {
                ActivityImportError::InvalidDate {
                    row: index + 1,
                    value: row.date.clone(),
                }
            })?;

            records.push(ActivityRecord {
                date,
                kind: row.kind,
                on_time: row.on_time,
                rating: row.rating.unwrap_or(0.0),
                distance_km: row.distance_km.unwrap_or(0.0),
                incidents: row.incidents.unwrap_or(0),
            });
        }

        Ok(records)
    }
}

#[derive(Debug, Deserialize)]
struct ActivityRow {
    date: String,
    #[serde(rename = "type", alias = "kind")]
    kind: ActivityKind,
    #[serde(default, alias = "onTime", deserialize_with = "flexible_bool")]
    on_time: bool,
    #[serde(default)]
    rating: Option<f64>,
    #[serde(default, alias = "distanceKm")]
    distance_km: Option<f64>,
    #[serde(default)]
    incidents: Option<u32>,
}

fn flexible_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(matches!(
        raw.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref(),
        Some("true" | "yes" | "y" | "1")
    ))
}

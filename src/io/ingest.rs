//! CSV ingest of calibration tables.
//!
//! One table per direction, with one row per commanded throttle:
//!
//! ```text
//! Throttle,Left,Right
//! 0%,0,0
//! 10%,0,12
//! 20%,141,150
//! ```
//!
//! Design goals:
//! - **Strict schema**: missing columns are an error (exit code 2)
//! - **No coercion**: a bad cell rejects the whole table with its row number
//! - **Separation of concerns**: no fitting logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{CalibrationSample, ChannelSamples, Direction, MotorChannel, Side};
use crate::error::{AppError, FitError};

const THROTTLE_COLUMN: &str = "throttle";
const LEFT_COLUMN: &str = "left";
const RIGHT_COLUMN: &str = "right";

/// Samples for both sides of one direction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DirectionTable {
    pub left: Vec<CalibrationSample>,
    pub right: Vec<CalibrationSample>,
}

impl DirectionTable {
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Move both sides into `samples` under `direction`.
    pub fn into_channels(self, direction: Direction, samples: &mut ChannelSamples) {
        samples.insert(MotorChannel::new(Side::Left, direction), self.left);
        samples.insert(MotorChannel::new(Side::Right, direction), self.right);
    }
}

/// Open and parse a calibration CSV file.
pub fn load_direction_csv(path: &Path) -> Result<DirectionTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    parse_direction_csv(file)
        .map_err(|e| AppError::new(e.exit_code(), format!("{}: {e}", path.display())))
}

/// Parse a calibration table from any reader.
pub fn parse_direction_csv<R: Read>(reader: R) -> Result<DirectionTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let column = |name: &str| {
        header_map
            .get(name)
            .copied()
            .ok_or_else(|| AppError::new(2, format!("Missing required column '{name}'.")))
    };
    let throttle_idx = column(THROTTLE_COLUMN)?;
    let left_idx = column(LEFT_COLUMN)?;
    let right_idx = column(RIGHT_COLUMN)?;

    let mut table = DirectionTable::default();
    for (idx, result) in reader.records().enumerate() {
        // +2: header is line 1 and lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;

        let cell = |i: usize| record.get(i).unwrap_or("");
        let throttle = parse_throttle(line, cell(throttle_idx))?;
        let left = parse_rpm(line, cell(left_idx))?;
        let right = parse_rpm(line, cell(right_idx))?;

        table.left.push(CalibrationSample::try_new(line, throttle, left)?);
        table.right.push(CalibrationSample::try_new(line, throttle, right)?);
    }

    if table.is_empty() {
        return Err(AppError::new(2, "Calibration table has no rows."));
    }
    Ok(table)
}

/// Parse a throttle cell such as `10%` or `10`.
pub fn parse_throttle(line: usize, raw: &str) -> Result<i64, FitError> {
    let digits = raw.trim().trim_end_matches('%').trim_end();
    digits.parse::<i64>().map_err(|_| FitError::MalformedSample {
        index: line,
        reason: format!("throttle '{raw}' is not an integer percentage"),
    })
}

/// Parse an rpm cell (integer).
pub fn parse_rpm(line: usize, raw: &str) -> Result<i64, FitError> {
    raw.trim().parse::<i64>().map_err(|_| FitError::MalformedSample {
        index: line,
        reason: format!("rpm '{raw}' is not an integer"),
    })
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_ascii_lowercase()
}

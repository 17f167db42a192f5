use crate::error::Result;
use crate::models::MeasuredGroundwater;
use chrono::NaiveDate;
use std::path::Path;
use tracing::{info, warn};

pub fn load_measured_groundwater(path: &Path) -> Result<MeasuredGroundwater> {
    let content = std::fs::read_to_string(path)?;
    let table = parse_measured_groundwater(&content);
    info!(path = %path.display(), records = table.len(), "Loaded measured groundwater depths");
    Ok(table)
}

/// `YYYY-MM-DD depth_cm` per line. Lines that do not parse are skipped.
pub fn parse_measured_groundwater(content: &str) -> MeasuredGroundwater {
    let mut table = MeasuredGroundwater::default();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let date = parts.next().and_then(|s| s.parse::<NaiveDate>().ok());
        let depth = parts.next().and_then(|s| s.parse::<f64>().ok());
        match (date, depth) {
            (Some(date), Some(depth)) if depth >= 0.0 => table.insert(date, depth),
            _ => warn!(line = index + 1, content = %line, "Skipping groundwater record"),
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_records_and_skips_the_rest() {
        let table = parse_measured_groundwater(
            "# date depth\n2021-03-01 120\n2021-03-02\tabc\n2021-02-30 100\n2021-03-04 95.5\n",
        );
        assert_eq!(table.len(), 2);
        let date = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        assert!((table.depth_m(date).unwrap() - 0.955).abs() < 1e-12);
    }
}

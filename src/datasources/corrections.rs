use crate::error::Result;
use crate::models::PrecipCorrection;
use std::path::Path;
use tracing::warn;

pub fn load_precip_correction(path: &Path) -> Result<PrecipCorrection> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_precip_correction(&content))
}

/// `month value` per line with months counted from 1. Months not listed keep
/// a factor of 1.0.
pub fn parse_precip_correction(content: &str) -> PrecipCorrection {
    let mut table = PrecipCorrection::default();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.split_whitespace();
        let month = parts.next().and_then(|s| s.parse::<usize>().ok());
        let factor = parts.next().and_then(|s| s.parse::<f64>().ok());
        let applied = match (month, factor) {
            (Some(month), Some(factor)) if month >= 1 => table.set(month - 1, factor).is_ok(),
            _ => false,
        };
        if !applied {
            warn!(line = index + 1, content = %line, "Skipping precipitation correction");
        }
    }
    table
}

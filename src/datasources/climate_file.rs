use crate::error::{Result, SimError};
use crate::models::{ClimateData, DailyForcing};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

const REQUIRED_COLUMNS: [&str; 6] = ["iso-date", "tmin", "tavg", "tmax", "precip", "globrad"];

pub fn load_climate(path: &Path) -> Result<ClimateData> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        SimError::InvalidData(format!("Failed to read climate file {}: {}", path.display(), e))
    })?;
    let data = parse_climate(&content)?;
    info!(path = %path.display(), days = data.len(), "Loaded climate data");
    Ok(data)
}

/// Parses header-driven climate CSV. Comma or semicolon separated; a units
/// row directly below the header (`[°C]`, ...) is tolerated.
pub fn parse_climate(content: &str) -> Result<ClimateData> {
    let mut lines = content
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty() && !l.trim_start().starts_with('#'));

    let (_, header) = lines
        .next()
        .ok_or_else(|| SimError::InvalidData("climate file is empty".into()))?;
    let delimiter = if header.contains(';') && !header.contains(',') {
        ';'
    } else {
        ','
    };
    let columns: HashMap<String, usize> = header
        .split(delimiter)
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect();

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !columns.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        return Err(SimError::InvalidData(format!(
            "climate file lacks column(s): {}",
            missing.join(", ")
        )));
    }

    let mut data = ClimateData::default();
    for (index, line) in lines {
        let fields: Vec<&str> = line.split(delimiter).map(str::trim).collect();
        if fields.first().is_some_and(|f| f.starts_with('[')) {
            debug!(line = index + 1, "Skipping units row");
            continue;
        }
        match parse_row(&fields, &columns) {
            Ok((date, forcing)) => data.insert(date, forcing),
            Err(reason) => warn!(line = index + 1, %reason, "Skipping climate row"),
        }
    }
    Ok(data)
}

fn parse_row(
    fields: &[&str],
    columns: &HashMap<String, usize>,
) -> std::result::Result<(NaiveDate, DailyForcing), String> {
    let field = |name: &str| -> Option<&str> {
        columns
            .get(name)
            .and_then(|&i| fields.get(i))
            .copied()
            .filter(|f| !f.is_empty())
    };
    let number = |name: &str| -> std::result::Result<f64, String> {
        let raw = field(name).ok_or_else(|| format!("missing {}", name))?;
        raw.parse::<f64>()
            .map_err(|_| format!("{} is not a number: {}", name, raw))
    };
    let optional = |name: &str| -> std::result::Result<Option<f64>, String> {
        match field(name) {
            Some(raw) => raw
                .parse::<f64>()
                .map(Some)
                .map_err(|_| format!("{} is not a number: {}", name, raw)),
            None => Ok(None),
        }
    };

    let raw_date = field("iso-date").ok_or("missing iso-date")?;
    let date = raw_date
        .parse::<NaiveDate>()
        .map_err(|_| format!("invalid date: {}", raw_date))?;

    let mut forcing = DailyForcing::new(
        number("tmin")?,
        number("tavg")?,
        number("tmax")?,
        number("precip")?,
        number("globrad")?,
    );
    if forcing.precip < 0.0 || forcing.globrad < 0.0 {
        return Err("negative precipitation or radiation".into());
    }
    forcing.wind = optional("wind")?;
    forcing.relhumid = optional("relhumid")?;
    forcing.et0 = optional("et0")?;
    Ok((date, forcing))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn columns_follow_header_order() {
        let csv = "\
precip,iso-date,globrad,tmax,tmin,tavg,wind
[mm],[],[MJ/m2],[C],[C],[C],[m/s]
1.5,2021-05-01,18.2,19.0,7.0,13.1,2.5
0,2021-05-02,21.0,22.4,9.1,15.3,
";
        let data = parse_climate(csv).unwrap();
        assert_eq!(data.len(), 2);
        let day = data.get(d(2021, 5, 1)).unwrap();
        assert_eq!(day.precip, 1.5);
        assert_eq!(day.tmin, 7.0);
        assert_eq!(day.wind, Some(2.5));
        assert_eq!(data.get(d(2021, 5, 2)).unwrap().wind, None);
    }

    #[test]
    fn bad_rows_are_skipped() {
        let csv = "\
iso-date;tmin;tavg;tmax;precip;globrad
2021-05-01;7;13;19;1.5;18
2021-13-01;7;13;19;1.5;18
2021-05-03;7;x;19;1.5;18
2021-05-04;7;13;19;-1;18
2021-05-05;7;13;19;0;18
";
        let data = parse_climate(csv).unwrap();
        assert_eq!(data.len(), 2);
        assert!(data.get(d(2021, 5, 5)).is_some());
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let err = parse_climate("iso-date,tmin,tmax,precip,globrad\n").unwrap_err();
        assert!(err.to_string().contains("tavg"));
        assert!(parse_climate("").is_err());
    }
}

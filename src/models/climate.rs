use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weather forcing for one simulated day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyForcing {
    /// °C
    pub tmin: f64,
    pub tavg: f64,
    pub tmax: f64,
    /// mm, uncorrected
    pub precip: f64,
    /// MJ/m2/d
    pub globrad: f64,
    /// m/s at 2 m
    #[serde(default)]
    pub wind: Option<f64>,
    /// %
    #[serde(default)]
    pub relhumid: Option<f64>,
    /// mm, reference evapotranspiration when provided by the source
    #[serde(default)]
    pub et0: Option<f64>,
}

impl DailyForcing {
    pub fn new(tmin: f64, tavg: f64, tmax: f64, precip: f64, globrad: f64) -> Self {
        Self {
            tmin,
            tavg,
            tmax,
            precip,
            globrad,
            wind: None,
            relhumid: None,
            et0: None,
        }
    }

    pub fn with_et0(mut self, et0: f64) -> Self {
        self.et0 = Some(et0);
        self
    }

    /// Reference evapotranspiration, mm. Uses the supplied value or a
    /// Hargreaves-style estimate from temperature range and radiation.
    pub fn reference_et(&self) -> f64 {
        if let Some(et0) = self.et0 {
            return et0.max(0.0);
        }
        // 0.408 converts MJ/m2 to mm; global radiation taken as half of extraterrestrial
        let range = (self.tmax - self.tmin).max(0.0);
        let ra_mm = 0.408 * self.globrad * 2.0;
        (0.0023 * ra_mm * (self.tavg + 17.8) * range.sqrt()).max(0.0)
    }
}

/// Date-indexed climate series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClimateData {
    days: BTreeMap<NaiveDate, DailyForcing>,
}

impl ClimateData {
    pub fn insert(&mut self, date: NaiveDate, forcing: DailyForcing) {
        self.days.insert(date, forcing);
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DailyForcing> {
        self.days.get(&date)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.days.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.days.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

impl FromIterator<(NaiveDate, DailyForcing)> for ClimateData {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, DailyForcing)>>(iter: I) -> Self {
        Self {
            days: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supplied_et0_wins() {
        let f = DailyForcing::new(5.0, 12.0, 19.0, 0.0, 18.0).with_et0(3.2);
        assert_eq!(f.reference_et(), 3.2);
    }

    #[test]
    fn estimated_et0_grows_with_radiation() {
        let dull = DailyForcing::new(5.0, 12.0, 19.0, 0.0, 5.0);
        let bright = DailyForcing::new(5.0, 12.0, 19.0, 0.0, 25.0);
        assert!(bright.reference_et() > dull.reference_et());
        assert!(dull.reference_et() > 0.0);
    }

    #[test]
    fn climate_data_bounds() {
        let d1 = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let data: ClimateData = [
            (d2, DailyForcing::new(0.0, 1.0, 2.0, 0.0, 3.0)),
            (d1, DailyForcing::new(0.0, 1.0, 2.0, 0.0, 3.0)),
        ]
        .into_iter()
        .collect();
        assert_eq!(data.first_date(), Some(d1));
        assert_eq!(data.last_date(), Some(d2));
        assert_eq!(data.len(), 2);
    }
}

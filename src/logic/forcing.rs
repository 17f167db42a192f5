use crate::models::GeneralParameters;
use chrono::{Datelike, NaiveDate};

fn days_in_year(year: i32) -> f64 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366.0
    } else {
        365.0
    }
}

/// Atmospheric CO2 in ppm. A configured concentration above zero wins over
/// the calendar curve.
pub fn co2_for_date(date: NaiveDate, fixed: f64) -> f64 {
    if fixed > 0.0 {
        return fixed;
    }
    let t = date.year() as f64 + date.ordinal() as f64 / days_in_year(date.year());
    222.0 + (0.0119 * (t - 1580.0)).exp() + 2.5 * ((t - 0.5) / 0.1592).sin()
}

/// Groundwater table depth in m, oscillating between the configured extremes
/// with its shallowest point in `min_groundwater_depth_month`.
pub fn groundwater_depth_for_date(date: NaiveDate, general: &GeneralParameters) -> f64 {
    let days = days_in_year(date.year());
    let mean = (general.max_groundwater_depth + general.min_groundwater_depth) / 2.0;
    let amplitude = (general.max_groundwater_depth - general.min_groundwater_depth) / 2.0;
    let phase = general.min_groundwater_depth_month as f64 * 30.0 - 15.0;
    let angle = (date.ordinal() as f64 / days * 360.0 - 90.0 - phase).to_radians();

    let depth = mean + angle.sin() * amplitude;
    if depth < 0.0 {
        20.0
    } else {
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn fixed_co2_wins() {
        assert_eq!(co2_for_date(d(2000, 6, 1), 450.0), 450.0);
    }

    #[test]
    fn co2_curve_is_plausible_and_rising() {
        let c2000 = co2_for_date(d(2000, 7, 1), 0.0);
        let c2020 = co2_for_date(d(2020, 7, 1), 0.0);
        assert!(c2000 > 350.0 && c2000 < 400.0, "{}", c2000);
        assert!(c2020 > c2000);
    }

    #[test]
    fn co2_curve_is_leap_year_aware() {
        // Dec 31 in a leap year is day 366, so t stays below the next year
        let t_leap = co2_for_date(d(2020, 12, 31), 0.0);
        let t_next = co2_for_date(d(2021, 1, 1), 0.0);
        assert!((t_leap - t_next).abs() < 1.0);
    }

    #[test]
    fn groundwater_oscillates_between_extremes() {
        let general = GeneralParameters {
            min_groundwater_depth: 1.0,
            max_groundwater_depth: 3.0,
            min_groundwater_depth_month: 3,
            ..GeneralParameters::default()
        };
        let mut shallowest = f64::MAX;
        let mut deepest = f64::MIN;
        let mut date = d(2021, 1, 1);
        while date.year() == 2021 {
            let depth = groundwater_depth_for_date(date, &general);
            shallowest = shallowest.min(depth);
            deepest = deepest.max(depth);
            date = date.succ_opt().unwrap();
        }
        assert!((shallowest - 1.0).abs() < 0.01);
        assert!((deepest - 3.0).abs() < 0.01);
    }

    #[test]
    fn negative_groundwater_depth_falls_back() {
        let general = GeneralParameters {
            min_groundwater_depth: -4.0,
            max_groundwater_depth: -2.0,
            ..GeneralParameters::default()
        };
        assert_eq!(groundwater_depth_for_date(d(2021, 5, 1), &general), 20.0);
    }
}

use super::soil::SoilLayerParameters;
use crate::error::{Result, SimError};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mineral fertiliser composition. Fractions of the applied N mass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MineralFertiliserParameters {
    pub id: String,
    pub name: String,
    pub carbamid: f64,
    pub nh4: f64,
    pub no3: f64,
}

impl MineralFertiliserParameters {
    pub fn new(id: &str, name: &str, carbamid: f64, no3: f64, nh4: f64) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            carbamid,
            nh4,
            no3,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let parts = [self.carbamid, self.nh4, self.no3];
        if parts.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(SimError::InvalidData(format!(
                "mineral fertiliser '{}' has a negative or non-finite fraction",
                self.id
            )));
        }
        if parts.iter().sum::<f64>() > 1.0 + 1e-6 {
            return Err(SimError::InvalidData(format!(
                "mineral fertiliser '{}' fractions sum above 1",
                self.id
            )));
        }
        Ok(())
    }
}

impl Default for MineralFertiliserParameters {
    fn default() -> Self {
        Self::new("AN", "Ammonium Nitrate", 0.0, 0.5, 0.5)
    }
}

/// Added organic matter: manures, slurries and crop residues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganicMatterParameters {
    pub id: String,
    pub name: String,
    /// kg DM per kg fresh matter
    pub dry_matter_content: f64,
    /// kg N per kg DM
    pub nh4_content: f64,
    pub no3_content: f64,
    pub carbamid_content: f64,
    /// d-1 at standard conditions
    pub slow_dec_coeff: f64,
    pub fast_dec_coeff: f64,
    pub part_to_slow: f64,
    pub part_to_fast: f64,
    pub cn_ratio_slow: f64,
    pub cn_ratio_fast: f64,
    /// kg N per kg fresh matter
    pub n_concentration: f64,
}

impl Default for OrganicMatterParameters {
    fn default() -> Self {
        Self {
            id: "CAM".into(),
            name: "Cattle Manure".into(),
            dry_matter_content: 0.289,
            nh4_content: 0.007,
            no3_content: 0.0,
            carbamid_content: 0.0,
            slow_dec_coeff: 0.002,
            fast_dec_coeff: 0.02,
            part_to_slow: 0.72,
            part_to_fast: 0.18,
            cn_ratio_slow: 100.0,
            cn_ratio_fast: 7.3,
            n_concentration: 0.005,
        }
    }
}

impl OrganicMatterParameters {
    pub fn validate(&self) -> Result<()> {
        let fractions = [
            self.dry_matter_content,
            self.nh4_content,
            self.no3_content,
            self.carbamid_content,
            self.part_to_slow,
            self.part_to_fast,
        ];
        if fractions.iter().any(|f| !(0.0..=1.0).contains(f)) {
            return Err(SimError::InvalidData(format!(
                "organic matter '{}' has a fraction outside [0, 1]",
                self.id
            )));
        }
        if self.part_to_slow + self.part_to_fast > 1.0 + 1e-6 {
            return Err(SimError::InvalidData(format!(
                "organic matter '{}' pool partition sums above 1",
                self.id
            )));
        }
        Ok(())
    }
}

/// Solute load of irrigation water, in mg/l.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IrrigationParameters {
    pub nitrate_concentration: f64,
    pub sulfate_concentration: f64,
}

/// The band the deficit method clamps into.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NMinUserParameters {
    pub min: f64,
    pub max: f64,
    pub delay_in_days: u32,
}

impl Default for NMinUserParameters {
    fn default() -> Self {
        Self {
            min: 40.0,
            max: 120.0,
            delay_in_days: 10,
        }
    }
}

/// Crop-specific sampling depth (m) and mineral N target (kg N/ha).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NMinCropParameters {
    pub sampling_depth: f64,
    pub n_target: f64,
}

impl Default for NMinCropParameters {
    fn default() -> Self {
        Self {
            sampling_depth: 0.9,
            n_target: 120.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomaticIrrigationParameters {
    /// mm per application
    pub amount: f64,
    /// Relative plant-available water in the top 0.3 m that triggers irrigation.
    pub threshold: f64,
    pub water: IrrigationParameters,
}

impl Default for AutomaticIrrigationParameters {
    fn default() -> Self {
        Self {
            amount: 17.0,
            threshold: 0.35,
            water: IrrigationParameters::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HarvestTime {
    #[default]
    Maturity,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomaticHarvestParameters {
    pub harvest_time: HarvestTime,
    pub latest_harvest_doy: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralParameters {
    /// ppm; values <= 0 select the calendar curve
    pub atmospheric_co2: f64,
    /// m
    pub leaching_depth: f64,
    /// m
    pub max_groundwater_depth: f64,
    /// m
    pub min_groundwater_depth: f64,
    /// 1-based calendar month of the shallowest groundwater
    pub min_groundwater_depth_month: u32,
    pub albedo: f64,
    pub use_secondary_yields: bool,
    pub use_automatic_irrigation: bool,
    pub auto_irrigation: AutomaticIrrigationParameters,
    pub use_nmin_fertilising: bool,
    pub nmin_fertiliser_partition: MineralFertiliserParameters,
    pub nmin_user_params: NMinUserParameters,
    pub julian_day_automatic_fertilising: u32,
    pub use_automatic_harvest_trigger: bool,
    pub auto_harvest: AutomaticHarvestParameters,
}

impl Default for GeneralParameters {
    fn default() -> Self {
        Self {
            atmospheric_co2: 0.0,
            leaching_depth: 1.6,
            max_groundwater_depth: 18.0,
            min_groundwater_depth: 20.0,
            min_groundwater_depth_month: 3,
            albedo: 0.23,
            use_secondary_yields: true,
            use_automatic_irrigation: false,
            auto_irrigation: AutomaticIrrigationParameters::default(),
            use_nmin_fertilising: false,
            nmin_fertiliser_partition: MineralFertiliserParameters::default(),
            nmin_user_params: NMinUserParameters::default(),
            julian_day_automatic_fertilising: 74,
            use_automatic_harvest_trigger: false,
            auto_harvest: AutomaticHarvestParameters::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteParameters {
    pub latitude: f64,
    pub slope: f64,
    pub height_nn: f64,
    pub soil_cn_ratio: f64,
    /// kg N/ha/yr
    pub n_deposition: f64,
    pub soil_profile: Vec<SoilLayerParameters>,
}

impl Default for SiteParameters {
    fn default() -> Self {
        Self {
            latitude: 52.8,
            slope: 0.0,
            height_nn: 50.0,
            soil_cn_ratio: 10.0,
            n_deposition: 30.0,
            soil_profile: Vec::new(),
        }
    }
}

impl SiteParameters {
    /// Expands horizons into 0.1 m computation layers. A horizon carrying a
    /// thickness is repeated `thickness * 10` times; the last horizon fills the
    /// profile up to `total_layers`.
    pub fn computation_layers(&self, total_layers: usize) -> Vec<SoilLayerParameters> {
        let mut layers = Vec::new();
        let count = self.soil_profile.len();
        for (i, horizon) in self.soil_profile.iter().enumerate() {
            let mut repeat = horizon
                .thickness
                .map(|t| ((t * 10.0).round() as usize).max(1))
                .unwrap_or(1);
            if i + 1 == count {
                repeat = total_layers.saturating_sub(layers.len()).max(1);
            }
            for _ in 0..repeat {
                let mut layer = horizon.clone();
                layer.thickness = Some(0.1);
                layers.push(layer);
            }
        }
        layers
    }
}

/// Monthly precipitation correction factors, indexed by zero-based month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecipCorrection([f64; 12]);

impl Default for PrecipCorrection {
    fn default() -> Self {
        Self([1.0; 12])
    }
}

impl PrecipCorrection {
    pub fn get(&self, month: usize) -> Result<f64> {
        self.0.get(month).copied().ok_or(SimError::InvalidMonth(month))
    }

    pub fn set(&mut self, month: usize, value: f64) -> Result<()> {
        let slot = self.0.get_mut(month).ok_or(SimError::InvalidMonth(month))?;
        *slot = value;
        Ok(())
    }

    pub fn factor_for(&self, date: NaiveDate) -> f64 {
        self.0[date.month0() as usize]
    }
}

/// Measured groundwater table depths in cm below surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasuredGroundwater {
    depths_cm: BTreeMap<NaiveDate, f64>,
}

impl MeasuredGroundwater {
    pub fn insert(&mut self, date: NaiveDate, depth_cm: f64) {
        self.depths_cm.insert(date, depth_cm);
    }

    /// Depth in m for the date, if one was measured.
    pub fn depth_m(&self, date: NaiveDate) -> Option<f64> {
        self.depths_cm.get(&date).map(|cm| cm / 100.0)
    }

    pub fn len(&self) -> usize {
        self.depths_cm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.depths_cm.is_empty()
    }
}

/// Auxiliary tables handed to the driver at construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CentralParameters {
    pub precip_correction: PrecipCorrection,
    pub measured_groundwater: MeasuredGroundwater,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precip_correction_set_and_get() {
        let mut table = PrecipCorrection::default();
        table.set(3, 1.15).unwrap();
        assert_eq!(table.get(3).unwrap(), 1.15);
        assert_eq!(table.get(4).unwrap(), 1.0);
    }

    #[test]
    fn precip_correction_rejects_month_twelve() {
        let mut table = PrecipCorrection::default();
        assert!(matches!(table.get(12), Err(SimError::InvalidMonth(12))));
        assert!(matches!(table.set(12, 0.9), Err(SimError::InvalidMonth(12))));
        assert_eq!(table, PrecipCorrection::default());
    }

    #[test]
    fn precip_correction_factor_uses_zero_based_month() {
        let mut table = PrecipCorrection::default();
        table.set(0, 1.2).unwrap();
        let jan = NaiveDate::from_ymd_opt(2021, 1, 15).unwrap();
        let feb = NaiveDate::from_ymd_opt(2021, 2, 15).unwrap();
        assert_eq!(table.factor_for(jan), 1.2);
        assert_eq!(table.factor_for(feb), 1.0);
    }

    #[test]
    fn measured_groundwater_converts_to_metres() {
        let mut gw = MeasuredGroundwater::default();
        let d = NaiveDate::from_ymd_opt(2020, 5, 1).unwrap();
        gw.insert(d, 150.0);
        assert_eq!(gw.depth_m(d), Some(1.5));
        assert_eq!(gw.depth_m(d.succ_opt().unwrap()), None);
    }

    #[test]
    fn mineral_fertiliser_validation() {
        assert!(MineralFertiliserParameters::default().validate().is_ok());
        let bad = MineralFertiliserParameters::new("X", "Bad", 0.5, 0.5, 0.5);
        assert!(bad.validate().is_err());
        let negative = MineralFertiliserParameters::new("Y", "Neg", -0.1, 0.5, 0.5);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn computation_layers_expand_thickness_and_fill() {
        let site = SiteParameters {
            soil_profile: vec![
                SoilLayerParameters {
                    thickness: Some(0.3),
                    ..SoilLayerParameters::default()
                },
                SoilLayerParameters {
                    thickness: Some(0.2),
                    sand: 0.8,
                    ..SoilLayerParameters::default()
                },
            ],
            ..SiteParameters::default()
        };
        let layers = site.computation_layers(20);
        assert_eq!(layers.len(), 20);
        assert!(layers.iter().all(|l| l.thickness == Some(0.1)));
        assert_eq!(layers[2].sand, SoilLayerParameters::default().sand);
        assert_eq!(layers[3].sand, 0.8);
    }
}

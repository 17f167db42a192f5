use super::params::MineralFertiliserParameters;
use crate::error::{Result, SimError};
use serde::{Deserialize, Serialize};

const M2_PER_HA: f64 = 10_000.0;
const NO3_TO_N: f64 = 14.0 / 62.0;
const SO4_TO_S: f64 = 32.0 / 96.0;

/// One soil horizon as configured. Concentrations are kg per m3 of soil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilLayerParameters {
    /// m; `None` means a single 0.1 m computation layer
    pub thickness: Option<f64>,
    pub sand: f64,
    pub clay: f64,
    /// kg C per kg soil
    pub soil_organic_carbon: f64,
    /// kg/m3
    pub bulk_density: f64,
    /// m3/m3
    pub field_capacity: f64,
    pub permanent_wilting_point: f64,
    pub saturation: f64,
    /// Initial moisture as a fraction of field capacity.
    pub initial_moisture_fc: f64,
    pub initial_no3: f64,
    pub initial_nh4: f64,
}

impl Default for SoilLayerParameters {
    fn default() -> Self {
        Self {
            thickness: None,
            sand: 0.6,
            clay: 0.1,
            soil_organic_carbon: 0.012,
            bulk_density: 1450.0,
            field_capacity: 0.25,
            permanent_wilting_point: 0.08,
            saturation: 0.42,
            initial_moisture_fc: 0.8,
            initial_no3: 0.003,
            initial_nh4: 0.0005,
        }
    }
}

impl SoilLayerParameters {
    pub fn validate(&self) -> Result<()> {
        let ordered = 0.0 <= self.permanent_wilting_point
            && self.permanent_wilting_point < self.field_capacity
            && self.field_capacity <= self.saturation
            && self.saturation <= 1.0;
        if !ordered {
            return Err(SimError::InvalidData(format!(
                "soil layer water limits must satisfy 0 <= PWP < FC <= SAT <= 1 (got {}, {}, {})",
                self.permanent_wilting_point, self.field_capacity, self.saturation
            )));
        }
        if self.thickness.is_some_and(|t| t <= 0.0) {
            return Err(SimError::InvalidData("soil layer thickness must be positive".into()));
        }
        if self.bulk_density <= 0.0 {
            return Err(SimError::InvalidData("soil bulk density must be positive".into()));
        }
        Ok(())
    }
}

/// Per-layer physical and chemical state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilLayer {
    pub thickness: f64,
    pub sand: f64,
    pub clay: f64,
    pub bulk_density: f64,
    pub field_capacity: f64,
    pub wilting_point: f64,
    pub saturation: f64,
    /// m3/m3
    pub moisture: f64,
    /// °C
    pub temperature: f64,
    /// kg C per kg soil
    pub organic_carbon: f64,
    /// kg N/m3 bound in humus
    pub organic_n: f64,
    pub no3: f64,
    pub nh4: f64,
    pub carbamid: f64,
    /// kg S/m3
    pub sulfate: f64,
}

impl SoilLayer {
    fn from_parameters(p: &SoilLayerParameters, soil_cn_ratio: f64) -> Self {
        let thickness = p.thickness.unwrap_or(0.1);
        let organic_n = p.soil_organic_carbon * p.bulk_density / soil_cn_ratio.max(1.0);
        Self {
            thickness,
            sand: p.sand,
            clay: p.clay,
            bulk_density: p.bulk_density,
            field_capacity: p.field_capacity,
            wilting_point: p.permanent_wilting_point,
            saturation: p.saturation,
            moisture: p.field_capacity * p.initial_moisture_fc,
            temperature: 5.0,
            organic_carbon: p.soil_organic_carbon,
            organic_n,
            no3: p.initial_no3,
            nh4: p.initial_nh4,
            carbamid: 0.0,
            sulfate: 0.0,
        }
    }

    /// Converts a per-m3 concentration of this layer to kg/ha.
    pub fn per_ha(&self, concentration: f64) -> f64 {
        concentration * self.thickness * M2_PER_HA
    }

    /// Converts kg/ha into a per-m3 concentration of this layer.
    pub fn per_m3(&self, kg_per_ha: f64) -> f64 {
        kg_per_ha / (self.thickness * M2_PER_HA)
    }

    pub fn water_mm(&self) -> f64 {
        self.moisture * self.thickness * 1000.0
    }

    pub fn nmin(&self) -> f64 {
        self.no3 + self.nh4
    }

    /// Plant-available water relative to the FC-PWP range, clamped to [0, 1].
    pub fn relative_available_water(&self) -> f64 {
        let range = self.field_capacity - self.wilting_point;
        ((self.moisture - self.wilting_point) / range).clamp(0.0, 1.0)
    }

    pub fn is_frozen(&self) -> bool {
        self.temperature < 0.0
    }
}

/// The vertical discretisation of one soil column and its layer state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoilColumn {
    layers: Vec<SoilLayer>,
    /// mm of water waiting on the surface to infiltrate
    pub ponded_water: f64,
}

impl SoilColumn {
    pub fn new(profile: &[SoilLayerParameters], soil_cn_ratio: f64) -> Result<Self> {
        if profile.is_empty() {
            return Err(SimError::EmptySoilProfile);
        }
        for layer in profile {
            layer.validate()?;
        }
        Ok(Self {
            layers: profile
                .iter()
                .map(|p| SoilLayer::from_parameters(p, soil_cn_ratio))
                .collect(),
            ponded_water: 0.0,
        })
    }

    pub fn layers(&self) -> &[SoilLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [SoilLayer] {
        &mut self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn top(&self) -> &SoilLayer {
        &self.layers[0]
    }

    pub fn top_mut(&mut self) -> &mut SoilLayer {
        &mut self.layers[0]
    }

    pub fn total_depth(&self) -> f64 {
        self.layers.iter().map(|l| l.thickness).sum()
    }

    /// Number of layers whose upper boundary lies above `depth` (at least one).
    pub fn layers_to_depth(&self, depth: f64) -> usize {
        let mut top = 0.0;
        let mut count = 0;
        for layer in &self.layers {
            if top >= depth - 1e-9 {
                break;
            }
            top += layer.thickness;
            count += 1;
        }
        count.max(1)
    }

    /// Index of the layer containing `depth` (clamped to the bottom layer).
    pub fn layer_index_at(&self, depth: f64) -> usize {
        let mut bottom = 0.0;
        for (i, layer) in self.layers.iter().enumerate() {
            bottom += layer.thickness;
            if depth < bottom {
                return i;
            }
        }
        self.layers.len() - 1
    }

    /// Adds `amount` kg N/ha, split by composition, to the top layer.
    pub fn apply_mineral_fertiliser(&mut self, partition: &MineralFertiliserParameters, amount: f64) {
        let top = self.top_mut();
        let conc = top.per_m3(amount);
        top.no3 += conc * partition.no3;
        top.nh4 += conc * partition.nh4;
        top.carbamid += conc * partition.carbamid;
    }

    /// Adds `amount` mm of water carrying NO3 and SO4 (mg/l) to the top layer.
    /// Water beyond saturation stays ponded on the surface.
    pub fn apply_irrigation(&mut self, amount: f64, nitrate_mg_l: f64, sulfate_mg_l: f64) {
        let top = self.top_mut();
        // mg/l * mm == mg/m2
        let no3_n_kg_m2 = amount * nitrate_mg_l * 1e-6 * NO3_TO_N;
        let so4_s_kg_m2 = amount * sulfate_mg_l * 1e-6 * SO4_TO_S;
        top.no3 += no3_n_kg_m2 / top.thickness;
        top.sulfate += so4_s_kg_m2 / top.thickness;

        let room_mm = (top.saturation - top.moisture).max(0.0) * top.thickness * 1000.0;
        let infiltrated = amount.min(room_mm);
        top.moisture += infiltrated / (top.thickness * 1000.0);
        self.ponded_water += amount - infiltrated;
    }

    /// Mixes layer state down to `depth`, weighting by thickness. Returns the
    /// number of layers homogenised.
    pub fn apply_tillage(&mut self, depth: f64) -> usize {
        let n = self.layers_to_depth(depth);
        let mixed = &mut self.layers[..n];
        let total: f64 = mixed.iter().map(|l| l.thickness).sum();
        let mean = |f: &dyn Fn(&SoilLayer) -> f64| -> f64 {
            mixed.iter().map(|l| f(l) * l.thickness).sum::<f64>() / total
        };

        let moisture = mean(&|l| l.moisture);
        let temperature = mean(&|l| l.temperature);
        let organic_carbon = mean(&|l| l.organic_carbon);
        let organic_n = mean(&|l| l.organic_n);
        let no3 = mean(&|l| l.no3);
        let nh4 = mean(&|l| l.nh4);
        let carbamid = mean(&|l| l.carbamid);
        let sulfate = mean(&|l| l.sulfate);

        for layer in mixed.iter_mut() {
            layer.moisture = moisture.clamp(0.0, layer.saturation);
            layer.temperature = temperature;
            layer.organic_carbon = organic_carbon;
            layer.organic_n = organic_n;
            layer.no3 = no3;
            layer.nh4 = nh4;
            layer.carbamid = carbamid;
            layer.sulfate = sulfate;
        }
        n
    }

    /// Mineral N (NO3 + NH4) down to `depth`, kg N/ha.
    pub fn sum_nmin(&self, depth: f64) -> f64 {
        let n = self.layers_to_depth(depth);
        self.layers[..n].iter().map(|l| l.per_ha(l.nmin())).sum()
    }

    pub fn sum_no3(&self, depth: f64) -> f64 {
        let n = self.layers_to_depth(depth);
        self.layers[..n].iter().map(|l| l.per_ha(l.no3)).sum()
    }

    /// Mean organic carbon down to `depth`, in % kg C/kg soil.
    pub fn avg_corg(&self, depth: f64) -> f64 {
        self.weighted_mean(depth, |l| l.organic_carbon) * 100.0
    }

    pub fn mean_water_content(&self, depth: f64) -> f64 {
        self.weighted_mean(depth, |l| l.moisture)
    }

    pub fn mean_90cm_water_content(&self) -> f64 {
        self.mean_water_content(0.9)
    }

    pub fn avg_soil_temperature(&self, depth: f64) -> f64 {
        self.weighted_mean(depth, |l| l.temperature)
    }

    pub fn relative_available_water(&self, depth: f64) -> f64 {
        self.weighted_mean(depth, SoilLayer::relative_available_water)
    }

    fn weighted_mean(&self, depth: f64, f: impl Fn(&SoilLayer) -> f64) -> f64 {
        let n = self.layers_to_depth(depth);
        let layers = &self.layers[..n];
        let total: f64 = layers.iter().map(|l| l.thickness).sum();
        layers.iter().map(|l| f(l) * l.thickness).sum::<f64>() / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(layers: usize) -> SoilColumn {
        let profile = vec![SoilLayerParameters::default(); layers];
        SoilColumn::new(&profile, 10.0).unwrap()
    }

    #[test]
    fn empty_profile_is_rejected() {
        assert!(matches!(
            SoilColumn::new(&[], 10.0),
            Err(SimError::EmptySoilProfile)
        ));
    }

    #[test]
    fn invalid_water_limits_are_rejected() {
        let layer = SoilLayerParameters {
            field_capacity: 0.05,
            permanent_wilting_point: 0.1,
            ..SoilLayerParameters::default()
        };
        assert!(SoilColumn::new(&[layer], 10.0).is_err());
    }

    #[test]
    fn layers_to_depth_counts_upper_boundaries() {
        let c = column(20);
        assert_eq!(c.layers_to_depth(0.3), 3);
        assert_eq!(c.layers_to_depth(0.9), 9);
        assert_eq!(c.layers_to_depth(0.05), 1);
        assert_eq!(c.layers_to_depth(5.0), 20);
    }

    #[test]
    fn mineral_fertiliser_lands_in_top_layer() {
        let mut c = column(5);
        let before = c.sum_nmin(0.5);
        let partition = MineralFertiliserParameters::new("AN", "AN", 0.0, 0.5, 0.5);
        c.apply_mineral_fertiliser(&partition, 40.0);
        assert!((c.sum_nmin(0.5) - before - 40.0).abs() < 1e-9);
        assert!((c.top().per_ha(c.top().no3) - c.layers()[1].per_ha(c.layers()[1].no3) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn irrigation_adds_water_and_ponds_excess() {
        let mut c = column(3);
        let before = c.top().water_mm();
        c.apply_irrigation(10.0, 0.0, 0.0);
        assert!((c.top().water_mm() - before - 10.0).abs() < 1e-9);
        assert_eq!(c.ponded_water, 0.0);

        c.apply_irrigation(500.0, 0.0, 0.0);
        assert!((c.top().moisture - c.top().saturation).abs() < 1e-12);
        assert!(c.ponded_water > 0.0);
    }

    #[test]
    fn irrigation_carries_nitrate() {
        let mut c = column(3);
        let before = c.sum_no3(0.1);
        c.apply_irrigation(20.0, 50.0, 0.0);
        // 20 mm * 50 mg/l = 1000 mg/m2 NO3 -> 0.1 kg NO3/ha
        let expected = 1000.0 * 1e-6 * NO3_TO_N * M2_PER_HA;
        assert!((c.sum_no3(0.1) - before - expected).abs() < 1e-9);
    }

    #[test]
    fn tillage_homogenises_to_depth() {
        let mut c = column(5);
        c.layers_mut()[0].no3 = 0.01;
        c.layers_mut()[1].no3 = 0.0;
        c.layers_mut()[2].no3 = 0.005;
        let deep = c.layers()[3].no3;
        let total_before = c.sum_no3(0.3);

        assert_eq!(c.apply_tillage(0.3), 3);
        let l = c.layers();
        assert!((l[0].no3 - l[1].no3).abs() < 1e-12);
        assert!((l[1].no3 - l[2].no3).abs() < 1e-12);
        assert_eq!(l[3].no3, deep);
        assert!((c.sum_no3(0.3) - total_before).abs() < 1e-9);
    }
}

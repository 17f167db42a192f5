use super::params::{NMinCropParameters, OrganicMatterParameters};
use crate::error::{Result, SimError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Organ {
    Root,
    Leaf,
    Shoot,
    Fruit,
}

impl Organ {
    pub fn as_str(&self) -> &'static str {
        match self {
            Organ::Root => "root",
            Organ::Leaf => "leaf",
            Organ::Shoot => "shoot",
            Organ::Fruit => "fruit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "root" => Some(Organ::Root),
            "leaf" => Some(Organ::Leaf),
            "shoot" | "stem" => Some(Organ::Shoot),
            "fruit" | "storage" => Some(Organ::Fruit),
            _ => None,
        }
    }

    pub fn all() -> &'static [Organ] {
        &[Organ::Root, Organ::Leaf, Organ::Shoot, Organ::Fruit]
    }

    pub fn index(&self) -> usize {
        match self {
            Organ::Root => 0,
            Organ::Leaf => 1,
            Organ::Shoot => 2,
            Organ::Fruit => 3,
        }
    }

    pub fn is_aboveground(&self) -> bool {
        !matches!(self, Organ::Root)
    }
}

impl std::fmt::Display for Organ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Share of an organ's dry biomass counted towards a yield.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YieldComponent {
    pub organ: Organ,
    /// fraction [0, 1]
    pub yield_percentage: f64,
    /// kg DM per kg fresh matter
    pub dry_matter_content: f64,
}

impl YieldComponent {
    pub fn new(organ: Organ, yield_percentage: f64, dry_matter_content: f64) -> Self {
        Self {
            organ,
            yield_percentage,
            dry_matter_content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesParameters {
    pub id: String,
    /// °C
    pub base_temperature: f64,
    /// Daily maximum above which heat stress accrues.
    pub heat_stress_threshold: f64,
    /// g DM per MJ global radiation
    pub radiation_use_efficiency: f64,
    pub extinction_coefficient: f64,
    /// ha leaf per kg leaf DM
    pub specific_leaf_area: f64,
    /// m
    pub max_rooting_depth: f64,
    /// kg N per kg DM in young tissue
    pub max_n_concentration: f64,
    pub min_n_concentration: f64,
    /// kg N/ha/d
    pub max_n_uptake: f64,
    /// Relative available water below which transpiration is limited.
    pub drought_threshold: f64,
    /// Air-filled pore volume (m3/m3) below which roots suffer oxygen stress.
    pub critical_air_content: f64,
}

impl Default for SpeciesParameters {
    fn default() -> Self {
        Self {
            id: "WW".into(),
            base_temperature: 1.0,
            heat_stress_threshold: 31.0,
            radiation_use_efficiency: 1.3,
            extinction_coefficient: 0.6,
            specific_leaf_area: 0.002,
            max_rooting_depth: 1.3,
            max_n_concentration: 0.045,
            min_n_concentration: 0.012,
            max_n_uptake: 5.0,
            drought_threshold: 0.5,
            critical_air_content: 0.03,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CultivarParameters {
    pub id: String,
    /// °C·d from sowing
    pub thermal_time_emergence: f64,
    pub thermal_time_anthesis: f64,
    pub thermal_time_maturity: f64,
    /// m
    pub max_crop_height: f64,
    pub primary_yield: Vec<YieldComponent>,
    pub secondary_yield: Vec<YieldComponent>,
    /// Organs removed by a cut.
    pub cutting_yield: Vec<YieldComponent>,
    /// Fraction of aboveground biomass left standing after a cut.
    pub residual_after_cutting: f64,
    /// Thermal time the crop restarts from after a cut.
    pub thermal_time_after_cutting: f64,
}

impl Default for CultivarParameters {
    fn default() -> Self {
        Self {
            id: "winter wheat".into(),
            thermal_time_emergence: 150.0,
            thermal_time_anthesis: 1250.0,
            thermal_time_maturity: 2000.0,
            max_crop_height: 0.9,
            primary_yield: vec![YieldComponent::new(Organ::Fruit, 1.0, 0.86)],
            secondary_yield: vec![
                YieldComponent::new(Organ::Shoot, 0.8, 0.86),
                YieldComponent::new(Organ::Leaf, 0.8, 0.86),
            ],
            cutting_yield: vec![
                YieldComponent::new(Organ::Leaf, 1.0, 0.2),
                YieldComponent::new(Organ::Shoot, 1.0, 0.2),
            ],
            residual_after_cutting: 0.15,
            thermal_time_after_cutting: 200.0,
        }
    }
}

/// A crop definition and its cycle dates. Shared read-only across schedule,
/// work steps and the planted slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub species: SpeciesParameters,
    #[serde(default)]
    pub cultivar: CultivarParameters,
    #[serde(default)]
    pub seed_date: Option<NaiveDate>,
    #[serde(default)]
    pub harvest_date: Option<NaiveDate>,
    #[serde(default)]
    pub cutting_dates: Vec<NaiveDate>,
    /// Residue composition used when biomass stays on the field.
    #[serde(default)]
    pub residue_params: Option<OrganicMatterParameters>,
    /// Present when the crop takes part in deficit fertilisation.
    #[serde(default)]
    pub nmin_params: Option<NMinCropParameters>,
}

impl Crop {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            species: SpeciesParameters::default(),
            cultivar: CultivarParameters::default(),
            seed_date: None,
            harvest_date: None,
            cutting_dates: Vec::new(),
            residue_params: None,
            nmin_params: None,
        }
    }

    pub fn with_species(mut self, species: SpeciesParameters) -> Self {
        self.species = species;
        self
    }

    pub fn with_cultivar(mut self, cultivar: CultivarParameters) -> Self {
        self.cultivar = cultivar;
        self
    }

    pub fn with_seed_date(mut self, date: NaiveDate) -> Self {
        self.seed_date = Some(date);
        self
    }

    pub fn with_harvest_date(mut self, date: NaiveDate) -> Self {
        self.harvest_date = Some(date);
        self
    }

    pub fn with_cutting_dates(mut self, dates: Vec<NaiveDate>) -> Self {
        self.cutting_dates = dates;
        self
    }

    pub fn with_residue_params(mut self, params: OrganicMatterParameters) -> Self {
        self.residue_params = Some(params);
        self
    }

    pub fn with_nmin_params(mut self, params: NMinCropParameters) -> Self {
        self.nmin_params = Some(params);
        self
    }

    /// Cycle dates must be ordered seed < cuttings < harvest.
    pub fn validate(&self) -> Result<()> {
        if let (Some(seed), Some(harvest)) = (self.seed_date, self.harvest_date) {
            if harvest <= seed {
                return Err(SimError::InvalidData(format!(
                    "crop '{}': harvest date {} is not after seed date {}",
                    self.id, harvest, seed
                )));
            }
        }
        for cut in &self.cutting_dates {
            let after_seed = self.seed_date.map_or(true, |s| *cut > s);
            let before_harvest = self.harvest_date.map_or(true, |h| *cut < h);
            if !after_seed || !before_harvest {
                return Err(SimError::InvalidData(format!(
                    "crop '{}': cutting date {} lies outside the cropping cycle",
                    self.id, cut
                )));
            }
        }
        let c = &self.cultivar;
        if !(c.thermal_time_emergence < c.thermal_time_anthesis
            && c.thermal_time_anthesis < c.thermal_time_maturity)
        {
            return Err(SimError::InvalidData(format!(
                "crop '{}': thermal times must increase emergence < anthesis < maturity",
                self.id
            )));
        }
        if let Some(residue) = &self.residue_params {
            residue.validate()?;
        }
        Ok(())
    }
}

impl std::fmt::Display for Crop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Yield snapshot taken at harvest or cutting. Dry masses in kg/ha.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HarvestYields {
    pub primary_yield: f64,
    pub secondary_yield: f64,
    pub primary_yield_fresh: f64,
    pub secondary_yield_fresh: f64,
    /// kg N/ha in the primary yield
    pub primary_yield_n: f64,
    pub crop_height: f64,
}

/// Read-only view of the crop-growth state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CropStatus {
    pub development_stage: u8,
    pub thermal_time: f64,
    /// kg DM/ha per organ, indexed by `Organ::index`
    pub organ_biomass: [f64; 4],
    pub aboveground_biomass: f64,
    /// kg N/ha
    pub aboveground_biomass_n: f64,
    pub total_n_uptake: f64,
    pub crop_height: f64,
    pub leaf_area_index: f64,
    /// mm, season to date
    pub accumulated_eta: f64,
    pub accumulated_transpiration: f64,
    pub daily_eta: f64,
    pub daily_transpiration: f64,
    pub anthesis_day: Option<u32>,
    pub maturity_day: Option<u32>,
    pub is_mature: bool,
}

impl CropStatus {
    pub fn organ(&self, organ: Organ) -> f64 {
        self.organ_biomass[organ.index()]
    }

    /// kg N per kg DM in aboveground biomass.
    pub fn aboveground_n_concentration(&self) -> f64 {
        if self.aboveground_biomass > 0.0 {
            self.aboveground_biomass_n / self.aboveground_biomass
        } else {
            0.0
        }
    }
}

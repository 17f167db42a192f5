//! Contracts between the simulation driver and the numerical subsystems.

use crate::error::Result;
use crate::models::{
    Crop, CropStatus, DailyForcing, GeneralParameters, HarvestYields, Organ,
    OrganicMatterParameters, SiteParameters, SoilColumn,
};
use chrono::NaiveDate;
use std::sync::Arc;

/// Everything a subsystem needs to know about the day being simulated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DayContext {
    pub date: NaiveDate,
    pub forcing: DailyForcing,
    /// mm, after the monthly correction
    pub precipitation: f64,
    /// ppm
    pub co2_concentration: f64,
    /// m below surface
    pub groundwater_depth: f64,
    /// Fraction of ground shaded by the planted crop, 0 when fallow.
    pub crop_cover: f64,
    /// mm evaporated from the soil surface; set once the moisture step ran.
    pub soil_evaporation: f64,
}

pub trait SoilTemperature {
    fn step(&mut self, column: &mut SoilColumn, ctx: &DayContext);

    fn surface_temperature(&self) -> f64;
}

pub trait SoilMoisture {
    fn step(&mut self, column: &mut SoilColumn, ctx: &DayContext);

    /// Downward flux leaving each layer today, mm.
    fn water_fluxes(&self) -> &[f64];

    /// mm leaving the bottom of the profile today
    fn groundwater_recharge(&self) -> f64;

    fn surface_runoff(&self) -> f64;

    fn evaporation(&self) -> f64;
}

pub trait SoilOrganic {
    fn step(&mut self, column: &mut SoilColumn, ctx: &DayContext);

    /// Adds `amount` kg fresh matter/ha. With `incorporate` the material is
    /// mixed into the plough layer, otherwise it stays in the top layer.
    fn add_organic_matter(
        &mut self,
        column: &mut SoilColumn,
        params: &OrganicMatterParameters,
        amount: f64,
        incorporate: bool,
    );

    /// kg N/ha mineralised today, net of immobilisation
    fn net_mineralisation(&self) -> f64;
}

pub trait SoilTransport {
    fn step(&mut self, column: &mut SoilColumn, ctx: &DayContext, water_fluxes: &[f64]);

    /// kg N/ha leached below the leaching depth today
    fn leached_n(&self) -> f64;
}

/// Today's stress, each in [0, 1] where 0 means unstressed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyStress {
    pub nitrogen: f64,
    pub water: f64,
    pub heat: f64,
    pub oxygen: f64,
}

/// Dry matter and nitrogen taken off a crop, kg/ha.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RemovedBiomass {
    pub dry_matter: f64,
    pub nitrogen: f64,
}

impl std::ops::AddAssign for RemovedBiomass {
    fn add_assign(&mut self, rhs: Self) {
        self.dry_matter += rhs.dry_matter;
        self.nitrogen += rhs.nitrogen;
    }
}

pub trait CropGrowth {
    /// Advances one day. Water and nitrogen uptake are taken from `column`.
    fn step(&mut self, column: &mut SoilColumn, ctx: &DayContext) -> DailyStress;

    fn status(&self) -> CropStatus;

    /// Yields the crop would deliver if harvested now.
    fn yields(&self, use_secondary: bool) -> HarvestYields;

    /// Takes `fraction` of an organ off the plant.
    fn remove_from_organ(&mut self, organ: Organ, fraction: f64) -> RemovedBiomass;

    /// Removes the cut organs and resets development for regrowth.
    fn apply_cutting(&mut self) -> RemovedBiomass;

    /// Biomass left on the field when the crop is terminated. With `exported`
    /// the harvested yields leave the field and only the rest remains.
    fn residues(&self, exported: bool, use_secondary: bool) -> RemovedBiomass;
}

/// Builds the subsystem instances for one run and the growth model of each
/// seeded crop.
pub trait ProcessFactory {
    fn soil_temperature(&self, column: &SoilColumn, site: &SiteParameters) -> Box<dyn SoilTemperature>;

    fn soil_moisture(
        &self,
        column: &SoilColumn,
        site: &SiteParameters,
        general: &GeneralParameters,
    ) -> Box<dyn SoilMoisture>;

    fn soil_organic(&self, column: &SoilColumn, site: &SiteParameters) -> Box<dyn SoilOrganic>;

    fn soil_transport(
        &self,
        column: &SoilColumn,
        general: &GeneralParameters,
    ) -> Box<dyn SoilTransport>;

    fn crop_growth(&self, crop: Arc<Crop>, column: &SoilColumn) -> Result<Box<dyn CropGrowth>>;
}

pub mod automatic_harvest;
pub mod automatic_irrigation;
pub mod deficit_fertilisation;
pub mod engine;

pub use engine::PolicyEngine;

use super::driver::SimulationDriver;
use super::schedule::CultivationSchedule;
use crate::models::{IrrigationParameters, MineralFertiliserParameters, NMinCropParameters};
use chrono::NaiveDate;

/// When in the day a policy is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyPhase {
    /// After scheduled work steps, before the soil step.
    BeforeSoil,
    /// After the crop step.
    AfterCrop,
}

pub struct PolicyContext<'a> {
    pub date: NaiveDate,
    pub schedule: Option<&'a CultivationSchedule>,
}

/// What a policy decided to do today.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyAction {
    Irrigate {
        amount: f64,
        water: IrrigationParameters,
    },
    FertiliseDeficit {
        partition: MineralFertiliserParameters,
        target: NMinCropParameters,
    },
    HarvestCrop {
        exported: bool,
    },
}

/// Trait for automatic management decisions
pub trait ManagementPolicy {
    /// Unique identifier for this policy
    fn id(&self) -> &'static str;

    /// Human-readable name
    fn name(&self) -> &'static str;

    fn phase(&self) -> PolicyPhase;

    /// Inspect the current state and return an action if one is due
    fn evaluate(&self, ctx: &PolicyContext, driver: &SimulationDriver) -> Option<PolicyAction>;
}

use super::{ManagementPolicy, PolicyAction, PolicyContext, PolicyPhase};
use crate::logic::driver::SimulationDriver;
use crate::models::{MineralFertiliserParameters, NMinUserParameters};
use chrono::Datelike;

/// Tops up soil mineral N for crops that carry a deficit target.
///
/// Runs on the configured day of year and once more `delay_in_days` later.
pub struct DeficitFertilisation {
    partition: MineralFertiliserParameters,
    band: NMinUserParameters,
    day_of_year: u32,
}

impl DeficitFertilisation {
    pub fn new(partition: MineralFertiliserParameters, band: NMinUserParameters, day_of_year: u32) -> Self {
        Self {
            partition,
            band,
            day_of_year,
        }
    }

    fn is_due(&self, doy: u32) -> bool {
        doy == self.day_of_year
            || (self.band.delay_in_days > 0 && doy == self.day_of_year + self.band.delay_in_days)
    }
}

impl ManagementPolicy for DeficitFertilisation {
    fn id(&self) -> &'static str {
        "deficit_fertilisation"
    }

    fn name(&self) -> &'static str {
        "Nmin Deficit Fertilisation"
    }

    fn phase(&self) -> PolicyPhase {
        PolicyPhase::BeforeSoil
    }

    fn evaluate(&self, ctx: &PolicyContext, driver: &SimulationDriver) -> Option<PolicyAction> {
        if !self.is_due(ctx.date.ordinal()) {
            return None;
        }
        let target = driver.current_crop()?.nmin_params?;
        Some(PolicyAction::FertiliseDeficit {
            partition: self.partition.clone(),
            target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::driver::tests::{driver, wheat};
    use crate::models::{Crop, NMinCropParameters};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn policy() -> DeficitFertilisation {
        DeficitFertilisation::new(
            MineralFertiliserParameters::default(),
            NMinUserParameters::default(),
            74,
        )
    }

    fn ctx(doy: u32) -> PolicyContext<'static> {
        PolicyContext {
            date: NaiveDate::from_yo_opt(2021, doy).unwrap(),
            schedule: None,
        }
    }

    #[test]
    fn fires_on_configured_day_and_after_delay() {
        let mut driver = driver();
        let crop = Crop::new("WW", "Winter wheat").with_nmin_params(NMinCropParameters::default());
        driver.seed_crop(Arc::new(crop)).unwrap();

        let p = policy();
        assert!(p.evaluate(&ctx(74), &driver).is_some());
        assert!(p.evaluate(&ctx(84), &driver).is_some());
        assert!(p.evaluate(&ctx(75), &driver).is_none());
    }

    #[test]
    fn needs_crop_with_deficit_target() {
        let mut driver = driver();
        let p = policy();
        assert!(p.evaluate(&ctx(74), &driver).is_none());

        driver.seed_crop(wheat()).unwrap();
        assert!(p.evaluate(&ctx(74), &driver).is_none());
    }
}

use super::{ManagementPolicy, PolicyAction, PolicyContext, PolicyPhase};
use crate::logic::driver::SimulationDriver;
use crate::models::AutomaticIrrigationParameters;

/// Depth over which plant-available water is checked, m
const CHECK_DEPTH: f64 = 0.3;

/// Irrigates a planted crop whose schedule asks for irrigation once the
/// topsoil dries below the threshold.
pub struct AutomaticIrrigation {
    params: AutomaticIrrigationParameters,
}

impl AutomaticIrrigation {
    pub fn new(params: AutomaticIrrigationParameters) -> Self {
        Self { params }
    }
}

impl ManagementPolicy for AutomaticIrrigation {
    fn id(&self) -> &'static str {
        "automatic_irrigation"
    }

    fn name(&self) -> &'static str {
        "Automatic Irrigation"
    }

    fn phase(&self) -> PolicyPhase {
        PolicyPhase::BeforeSoil
    }

    fn evaluate(&self, ctx: &PolicyContext, driver: &SimulationDriver) -> Option<PolicyAction> {
        if !driver.is_crop_planted() || !ctx.schedule?.irrigate_crop() {
            return None;
        }
        let available = driver.column().relative_available_water(CHECK_DEPTH);
        if available >= self.params.threshold {
            return None;
        }
        Some(PolicyAction::Irrigate {
            amount: self.params.amount,
            water: self.params.water,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::driver::tests::{driver, wheat};
    use crate::logic::schedule::CultivationSchedule;
    use chrono::NaiveDate;

    fn policy(threshold: f64) -> AutomaticIrrigation {
        AutomaticIrrigation::new(AutomaticIrrigationParameters {
            threshold,
            ..AutomaticIrrigationParameters::default()
        })
    }

    #[test]
    fn irrigates_dry_irrigated_crop() {
        let mut driver = driver();
        driver.seed_crop(wheat()).unwrap();
        let schedule = CultivationSchedule::new("wheat", 0).with_irrigation(true);
        let ctx = PolicyContext {
            date: NaiveDate::from_ymd_opt(2020, 6, 1).unwrap(),
            schedule: Some(&schedule),
        };
        // fresh profile sits at 80% of field capacity
        assert!(policy(0.99).evaluate(&ctx, &driver).is_some());
        assert!(policy(0.1).evaluate(&ctx, &driver).is_none());
    }

    #[test]
    fn skips_fallow_and_rainfed() {
        let mut driver = driver();
        let irrigated = CultivationSchedule::new("wheat", 0).with_irrigation(true);
        let rainfed = CultivationSchedule::new("wheat", 0);
        let date = NaiveDate::from_ymd_opt(2020, 6, 1).unwrap();

        let ctx = PolicyContext {
            date,
            schedule: Some(&irrigated),
        };
        assert!(policy(0.99).evaluate(&ctx, &driver).is_none());

        driver.seed_crop(wheat()).unwrap();
        let ctx = PolicyContext {
            date,
            schedule: Some(&rainfed),
        };
        assert!(policy(0.99).evaluate(&ctx, &driver).is_none());
    }
}

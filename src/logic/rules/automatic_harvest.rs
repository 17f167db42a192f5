use super::{ManagementPolicy, PolicyAction, PolicyContext, PolicyPhase};
use crate::logic::driver::SimulationDriver;
use crate::models::{AutomaticHarvestParameters, HarvestTime};
use chrono::Datelike;

/// Harvests the crop at maturity, or on the latest allowed day of year.
/// A scheduled harvest arriving later finds no crop and is skipped.
pub struct AutomaticHarvestTrigger {
    params: AutomaticHarvestParameters,
}

impl AutomaticHarvestTrigger {
    pub fn new(params: AutomaticHarvestParameters) -> Self {
        Self { params }
    }
}

impl ManagementPolicy for AutomaticHarvestTrigger {
    fn id(&self) -> &'static str {
        "automatic_harvest"
    }

    fn name(&self) -> &'static str {
        "Automatic Harvest Trigger"
    }

    fn phase(&self) -> PolicyPhase {
        PolicyPhase::AfterCrop
    }

    fn evaluate(&self, ctx: &PolicyContext, driver: &SimulationDriver) -> Option<PolicyAction> {
        let status = driver.crop_status()?;
        let ready = match self.params.harvest_time {
            HarvestTime::Maturity => status.is_mature,
        };
        let deadline = self
            .params
            .latest_harvest_doy
            .is_some_and(|doy| ctx.date.ordinal() == doy);

        if ready || deadline {
            Some(PolicyAction::HarvestCrop { exported: true })
        } else {
            None
        }
    }
}

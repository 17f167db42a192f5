use super::{
    automatic_harvest::AutomaticHarvestTrigger, automatic_irrigation::AutomaticIrrigation,
    deficit_fertilisation::DeficitFertilisation, ManagementPolicy, PolicyAction, PolicyContext,
    PolicyPhase,
};
use crate::error::Result;
use crate::logic::driver::SimulationDriver;
use crate::logic::workstep::{Harvest, HarvestMethod};
use crate::models::GeneralParameters;
use tracing::info;

pub struct PolicyEngine {
    policies: Vec<Box<dyn ManagementPolicy>>,
}

impl PolicyEngine {
    /// The policies switched on in `general`.
    pub fn new(general: &GeneralParameters) -> Self {
        let mut policies: Vec<Box<dyn ManagementPolicy>> = Vec::new();
        if general.use_automatic_irrigation {
            policies.push(Box::new(AutomaticIrrigation::new(general.auto_irrigation)));
        }
        if general.use_nmin_fertilising {
            policies.push(Box::new(DeficitFertilisation::new(
                general.nmin_fertiliser_partition.clone(),
                general.nmin_user_params,
                general.julian_day_automatic_fertilising,
            )));
        }
        if general.use_automatic_harvest_trigger {
            policies.push(Box::new(AutomaticHarvestTrigger::new(general.auto_harvest)));
        }
        Self { policies }
    }

    pub fn with_policy(mut self, policy: Box<dyn ManagementPolicy>) -> Self {
        self.policies.push(policy);
        self
    }

    /// Evaluates and carries out every policy of `phase`, in order.
    pub fn run(
        &self,
        phase: PolicyPhase,
        ctx: &PolicyContext,
        driver: &mut SimulationDriver,
    ) -> Result<Vec<PolicyAction>> {
        let mut taken = Vec::new();
        for policy in self.policies.iter().filter(|p| p.phase() == phase) {
            if let Some(action) = policy.evaluate(ctx, driver) {
                info!(policy = policy.id(), date = %ctx.date, ?action, "Policy triggered");
                Self::apply(&action, ctx, driver)?;
                taken.push(action);
            }
        }
        Ok(taken)
    }

    fn apply(action: &PolicyAction, ctx: &PolicyContext, driver: &mut SimulationDriver) -> Result<()> {
        match action {
            PolicyAction::Irrigate { amount, water } => {
                driver.apply_irrigation(*amount, water);
            }
            PolicyAction::FertiliseDeficit { partition, target } => {
                driver.apply_mineral_fertiliser_via_deficit_method(partition, target);
            }
            PolicyAction::HarvestCrop { exported } => {
                let harvest = Harvest {
                    date: ctx.date,
                    method: HarvestMethod::Total,
                    percentage: 100.0,
                    exported: *exported,
                    result: ctx.schedule.and_then(|s| s.cycle_result()),
                };
                harvest.apply(driver)?;
            }
        }
        Ok(())
    }

    pub fn list_policies(&self) -> Vec<(&'static str, &'static str)> {
        self.policies.iter().map(|p| (p.id(), p.name())).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(&GeneralParameters::default())
    }
}

use super::driver::SimulationDriver;
use crate::error::{Result, SimError};
use crate::models::{
    Crop, CropResult, IrrigationParameters, MineralFertiliserParameters, OrganicMatterParameters,
    ResultId, SharedResult,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HarvestMethod {
    #[default]
    Total,
    FruitHarvest,
    Cutting,
    LeafPruning,
    TipPruning,
    ShootPruning,
}

impl HarvestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestMethod::Total => "total",
            HarvestMethod::FruitHarvest => "fruitHarvest",
            HarvestMethod::Cutting => "cutting",
            HarvestMethod::LeafPruning => "leafPruning",
            HarvestMethod::TipPruning => "tipPruning",
            HarvestMethod::ShootPruning => "shootPruning",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|m| m.as_str() == s)
    }

    pub fn all() -> &'static [HarvestMethod] {
        &[
            HarvestMethod::Total,
            HarvestMethod::FruitHarvest,
            HarvestMethod::Cutting,
            HarvestMethod::LeafPruning,
            HarvestMethod::TipPruning,
            HarvestMethod::ShootPruning,
        ]
    }

    /// Methods that take a yield and write the result record.
    pub fn records_yield(&self) -> bool {
        matches!(
            self,
            HarvestMethod::Total | HarvestMethod::FruitHarvest | HarvestMethod::Cutting
        )
    }
}

impl std::fmt::Display for HarvestMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn full_percentage() -> f64 {
    100.0
}

fn exported_by_default() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub date: NaiveDate,
    pub crop: Arc<Crop>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harvest {
    pub date: NaiveDate,
    #[serde(default)]
    pub method: HarvestMethod,
    /// 0-100, ignored by the total method
    #[serde(default = "full_percentage")]
    pub percentage: f64,
    #[serde(default = "exported_by_default")]
    pub exported: bool,
    #[serde(skip)]
    pub result: Option<SharedResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cutting {
    pub date: NaiveDate,
    #[serde(skip)]
    pub result: Option<SharedResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MineralFertiliserApplication {
    pub date: NaiveDate,
    pub partition: MineralFertiliserParameters,
    /// kg N/ha
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganicFertiliserApplication {
    pub date: NaiveDate,
    pub parameters: OrganicMatterParameters,
    /// kg fresh matter/ha
    pub amount: f64,
    #[serde(default)]
    pub incorporation: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TillageApplication {
    pub date: NaiveDate,
    /// m
    pub depth: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IrrigationApplication {
    pub date: NaiveDate,
    /// mm
    pub amount: f64,
    #[serde(default)]
    pub parameters: IrrigationParameters,
}

/// One dated field operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkStep {
    Seed(Seed),
    Harvest(Harvest),
    Cutting(Cutting),
    MineralFertiliserApplication(MineralFertiliserApplication),
    OrganicFertiliserApplication(OrganicFertiliserApplication),
    TillageApplication(TillageApplication),
    IrrigationApplication(IrrigationApplication),
}

impl WorkStep {
    pub fn date(&self) -> NaiveDate {
        match self {
            WorkStep::Seed(s) => s.date,
            WorkStep::Harvest(s) => s.date,
            WorkStep::Cutting(s) => s.date,
            WorkStep::MineralFertiliserApplication(s) => s.date,
            WorkStep::OrganicFertiliserApplication(s) => s.date,
            WorkStep::TillageApplication(s) => s.date,
            WorkStep::IrrigationApplication(s) => s.date,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            WorkStep::Seed(_) => "Seed",
            WorkStep::Harvest(_) => "Harvest",
            WorkStep::Cutting(_) => "Cutting",
            WorkStep::MineralFertiliserApplication(_) => "MineralFertiliserApplication",
            WorkStep::OrganicFertiliserApplication(_) => "OrganicFertiliserApplication",
            WorkStep::TillageApplication(_) => "TillageApplication",
            WorkStep::IrrigationApplication(_) => "IrrigationApplication",
        }
    }

    /// Rejects parameters no simulation could carry out.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> {
            Err(SimError::InvalidWorkStep(format!(
                "{} on {}: {}",
                self.type_name(),
                self.date(),
                msg
            )))
        };
        match self {
            WorkStep::Seed(s) => s
                .crop
                .validate()
                .or_else(|e| invalid(e.to_string())),
            WorkStep::Harvest(s) => {
                if !(0.0..=100.0).contains(&s.percentage) {
                    return invalid(format!("percentage {} outside 0-100", s.percentage));
                }
                Ok(())
            }
            WorkStep::Cutting(_) => Ok(()),
            WorkStep::MineralFertiliserApplication(s) => {
                if !s.amount.is_finite() || s.amount < 0.0 {
                    return invalid(format!("amount {} must be a non-negative number", s.amount));
                }
                s.partition.validate().or_else(|e| invalid(e.to_string()))
            }
            WorkStep::OrganicFertiliserApplication(s) => {
                if !s.amount.is_finite() || s.amount < 0.0 {
                    return invalid(format!("amount {} must be a non-negative number", s.amount));
                }
                s.parameters.validate().or_else(|e| invalid(e.to_string()))
            }
            WorkStep::TillageApplication(s) => {
                if !s.depth.is_finite() || s.depth <= 0.0 {
                    return invalid(format!("depth {} must be positive", s.depth));
                }
                Ok(())
            }
            WorkStep::IrrigationApplication(s) => {
                if !s.amount.is_finite() || s.amount < 0.0 {
                    return invalid(format!("amount {} must be a non-negative number", s.amount));
                }
                Ok(())
            }
        }
    }

    pub fn apply(&self, driver: &mut SimulationDriver) -> Result<()> {
        match self {
            WorkStep::Seed(s) => s.apply(driver),
            WorkStep::Harvest(s) => s.apply(driver),
            WorkStep::Cutting(s) => s.apply(driver),
            WorkStep::MineralFertiliserApplication(s) => {
                driver.apply_mineral_fertiliser(&s.partition, s.amount);
                Ok(())
            }
            WorkStep::OrganicFertiliserApplication(s) => {
                driver.apply_organic_fertiliser(&s.parameters, s.amount, s.incorporation);
                Ok(())
            }
            WorkStep::TillageApplication(s) => {
                driver.apply_tillage(s.depth);
                Ok(())
            }
            WorkStep::IrrigationApplication(s) => {
                driver.apply_irrigation(s.amount, &s.parameters);
                Ok(())
            }
        }
    }
}

impl Seed {
    fn apply(&self, driver: &mut SimulationDriver) -> Result<()> {
        if let Some(current) = driver.current_crop() {
            warn!(
                planted = %current,
                crop = %self.crop,
                date = %self.date,
                "Crop already planted, ignoring seed step"
            );
            return Ok(());
        }
        driver.seed_crop(Arc::clone(&self.crop))
    }
}

impl Harvest {
    pub(crate) fn apply(&self, driver: &mut SimulationDriver) -> Result<()> {
        if !driver.is_crop_planted() {
            // An automatic harvest already took the crop; this is the fallback.
            warn!(
                date = %self.date,
                method = %self.method,
                "No crop to harvest, skipping scheduled harvest"
            );
            return Ok(());
        }

        if self.method.records_yield() {
            driver.snapshot_yields()?;
            if let Some(result) = &self.result {
                record_harvest_results(driver, &mut result.borrow_mut(), self.date)?;
            }
        }

        match self.method {
            HarvestMethod::Total => driver.harvest_total(self.exported),
            HarvestMethod::FruitHarvest => driver.fruit_harvest(self.percentage, self.exported).map(|_| ()),
            HarvestMethod::Cutting => driver.cutting(self.percentage, self.exported).map(|_| ()),
            HarvestMethod::LeafPruning => driver.leaf_pruning(self.percentage, self.exported).map(|_| ()),
            HarvestMethod::TipPruning => driver.tip_pruning(self.percentage, self.exported).map(|_| ()),
            HarvestMethod::ShootPruning => {
                driver.shoot_pruning(self.percentage, self.exported).map(|_| ())
            }
        }
    }
}

impl Cutting {
    fn apply(&self, driver: &mut SimulationDriver) -> Result<()> {
        driver.snapshot_yields()?;
        if let Some(result) = &self.result {
            record_harvest_results(driver, &mut result.borrow_mut(), self.date)?;
        }
        debug!(date = %self.date, "Applying cutting");
        driver.apply_cutting().map(|_| ())
    }
}

impl std::fmt::Display for WorkStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.date(), self.type_name())?;
        match self {
            WorkStep::Seed(s) => write!(f, " {}", s.crop),
            WorkStep::Harvest(s) if s.method == HarvestMethod::Total => write!(f, " ({})", s.method),
            WorkStep::Harvest(s) => write!(f, " ({} {}%)", s.method, s.percentage),
            WorkStep::Cutting(_) => Ok(()),
            WorkStep::MineralFertiliserApplication(s) => {
                write!(f, " {} kg N/ha {}", s.amount, s.partition.name)
            }
            WorkStep::OrganicFertiliserApplication(s) => {
                write!(f, " {} kg/ha {}", s.amount, s.parameters.name)?;
                if s.incorporation {
                    write!(f, " incorporated")?;
                }
                Ok(())
            }
            WorkStep::TillageApplication(s) => write!(f, " {} m", s.depth),
            WorkStep::IrrigationApplication(s) => write!(f, " {} mm", s.amount),
        }
    }
}

/// Writes the full per-event output vector of the planted crop into `record`.
/// Yields come from the latest snapshot in the planted slot.
pub fn record_harvest_results(
    driver: &SimulationDriver,
    record: &mut CropResult,
    date: NaiveDate,
) -> Result<()> {
    let planted = driver.planted_crop().ok_or(SimError::NoActiveCrop {
        operation: "record harvest results",
    })?;
    let status = driver
        .crop_status()
        .ok_or(SimError::NoActiveCrop {
            operation: "record harvest results",
        })?;
    let yields = planted.yields;
    let stress = driver.accumulated_stress();

    record.crop_id = planted.crop.id.clone();
    record.date = Some(date);

    let values = [
        (ResultId::PrimaryYield, yields.primary_yield),
        (ResultId::SecondaryYield, yields.secondary_yield),
        (ResultId::PrimaryYieldFresh, yields.primary_yield_fresh),
        (ResultId::SecondaryYieldFresh, yields.secondary_yield_fresh),
        (ResultId::BiomassNContent, yields.primary_yield_n),
        (ResultId::AboveBiomassNContent, status.aboveground_biomass_n),
        (ResultId::AbovegroundBiomass, status.aboveground_biomass),
        (ResultId::SumNUptake, status.total_n_uptake),
        (ResultId::CropHeight, yields.crop_height),
        (ResultId::SumFertiliser, driver.season_sum_fertiliser()),
        (ResultId::SumIrrigation, planted.applied_irrigation),
        (ResultId::AnthesisDay, status.anthesis_day.map_or(0.0, f64::from)),
        (ResultId::MaturityDay, status.maturity_day.map_or(0.0, f64::from)),
        (ResultId::HarvestDay, f64::from(date.ordinal())),
        (ResultId::EvapotranspirationCrop, status.accumulated_eta),
        (ResultId::TranspirationCrop, status.accumulated_transpiration),
        (ResultId::DaysWithCrop, f64::from(driver.days_with_crop())),
        (ResultId::NitrogenStress, stress.nitrogen),
        (ResultId::WaterStress, stress.water),
        (ResultId::HeatStress, stress.heat),
        (ResultId::OxygenStress, stress.oxygen),
        (ResultId::Moisture90Harvest, driver.mean_90cm_water_content()),
        (ResultId::Corg30Harvest, driver.avg_corg(0.3)),
        (ResultId::Nmin90Harvest, driver.sum_nmin(0.9)),
    ];
    for (id, value) in values {
        record.set(id, value);
    }

    info!(
        crop = %planted.crop,
        %date,
        primary_yield = yields.primary_yield,
        "Recorded harvest results"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::driver::tests::{driver, forcing, wheat};
    use crate::models::shared_result;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn grow(driver: &mut SimulationDriver, days: i64) {
        let mut date = d(2020, 4, 1);
        for i in 0..days {
            driver.reset_daily_counters();
            driver.day_step_soil_only(date, &forcing(i));
            driver.day_step_crop(date, &forcing(i));
            date = date.succ_opt().unwrap();
        }
    }

    #[test]
    fn steps_parse_from_tagged_json() {
        let json = r#"[
            {"type": "Seed", "date": "2020-04-01", "crop": {"id": "SM", "name": "Silage maize"}},
            {"type": "MineralFertiliserApplication", "date": "2020-04-20",
             "partition": {"id": "U", "name": "Urea", "carbamid": 1.0, "nh4": 0.0, "no3": 0.0}, "amount": 40},
            {"type": "OrganicFertiliserApplication", "date": "2020-03-20",
             "parameters": {"id": "CAS"}, "amount": 15000, "incorporation": true},
            {"type": "TillageApplication", "date": "2020-03-25", "depth": 0.3},
            {"type": "IrrigationApplication", "date": "2020-06-01", "amount": 20,
             "parameters": {"nitrate_concentration": 10}},
            {"type": "Cutting", "date": "2020-07-01"},
            {"type": "Harvest", "date": "2020-09-20", "method": "fruitHarvest", "percentage": 60}
        ]"#;
        let steps: Vec<WorkStep> = serde_json::from_str(json).unwrap();
        assert_eq!(steps.len(), 7);
        assert!(steps.iter().all(|s| s.validate().is_ok()));
        assert_eq!(steps[0].type_name(), "Seed");
        match &steps[6] {
            WorkStep::Harvest(h) => {
                assert_eq!(h.method, HarvestMethod::FruitHarvest);
                assert_eq!(h.percentage, 60.0);
                assert!(h.exported);
            }
            other => panic!("unexpected step {:?}", other),
        }

        let out = serde_json::to_value(&steps[3]).unwrap();
        assert_eq!(out["type"], "TillageApplication");
        assert_eq!(out["date"], "2020-03-25");
    }

    #[test]
    fn unknown_step_type_is_rejected() {
        let json = r#"{"type": "Mowing", "date": "2020-05-01"}"#;
        assert!(serde_json::from_str::<WorkStep>(json).is_err());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let harvest = WorkStep::Harvest(Harvest {
            date: d(2020, 9, 1),
            method: HarvestMethod::LeafPruning,
            percentage: 140.0,
            exported: true,
            result: None,
        });
        assert!(matches!(harvest.validate(), Err(SimError::InvalidWorkStep(_))));

        let tillage = WorkStep::TillageApplication(TillageApplication {
            date: d(2020, 3, 1),
            depth: 0.0,
        });
        assert!(tillage.validate().is_err());
    }

    #[test]
    fn harvest_without_crop_is_a_no_op() {
        let mut driver = driver();
        let result = shared_result("WW", 0);
        let harvest = WorkStep::Harvest(Harvest {
            date: d(2020, 9, 1),
            method: HarvestMethod::Total,
            percentage: 100.0,
            exported: true,
            result: Some(result.clone()),
        });
        assert!(harvest.apply(&mut driver).is_ok());
        assert!(result.borrow().is_empty());
    }

    #[test]
    fn cutting_without_crop_fails() {
        let mut driver = driver();
        let cutting = WorkStep::Cutting(Cutting {
            date: d(2020, 6, 1),
            result: None,
        });
        assert!(matches!(
            cutting.apply(&mut driver),
            Err(SimError::NoActiveCrop { .. })
        ));
    }

    #[test]
    fn second_seed_is_ignored() {
        let mut driver = driver();
        let seed = WorkStep::Seed(Seed {
            date: d(2020, 4, 1),
            crop: wheat(),
        });
        seed.apply(&mut driver).unwrap();
        grow(&mut driver, 5);
        seed.apply(&mut driver).unwrap();
        assert_eq!(driver.days_with_crop(), 5);
    }

    #[test]
    fn total_harvest_writes_results() {
        let mut driver = driver();
        driver.seed_crop(wheat()).unwrap();
        grow(&mut driver, 60);
        let days = driver.days_with_crop();
        let expected = driver.crop_status().unwrap();

        let result = shared_result("WW", 3);
        let harvest = WorkStep::Harvest(Harvest {
            date: d(2020, 5, 31),
            method: HarvestMethod::Total,
            percentage: 100.0,
            exported: true,
            result: Some(result.clone()),
        });
        harvest.apply(&mut driver).unwrap();

        assert!(!driver.is_crop_planted());
        let record = result.borrow();
        assert_eq!(record.date, Some(d(2020, 5, 31)));
        assert_eq!(record.custom_id, 3);
        assert_eq!(record.get(ResultId::DaysWithCrop), Some(days as f64));
        assert!(record.get(ResultId::PrimaryYield).is_some());
        assert!(record.get(ResultId::SecondaryYield).unwrap() > 0.0);
        assert_eq!(
            record.get(ResultId::AbovegroundBiomass),
            Some(expected.aboveground_biomass)
        );
        assert_eq!(record.get(ResultId::HarvestDay), Some(152.0));
    }

    #[test]
    fn pruning_writes_no_results() {
        let mut driver = driver();
        driver.seed_crop(wheat()).unwrap();
        grow(&mut driver, 30);
        let result = shared_result("WW", 0);
        let prune = WorkStep::Harvest(Harvest {
            date: d(2020, 5, 1),
            method: HarvestMethod::LeafPruning,
            percentage: 20.0,
            exported: false,
            result: Some(result.clone()),
        });
        prune.apply(&mut driver).unwrap();
        assert!(driver.is_crop_planted());
        assert!(result.borrow().is_empty());
    }

    #[test]
    fn cutting_snapshots_and_regrows() {
        let mut driver = driver();
        driver.seed_crop(Arc::new(Crop::new("CLV", "Clover"))).unwrap();
        grow(&mut driver, 50);
        let biomass = driver.crop_status().unwrap().aboveground_biomass;

        let result = shared_result("CLV", 0);
        let cut = WorkStep::Cutting(Cutting {
            date: d(2020, 5, 20),
            result: Some(result.clone()),
        });
        cut.apply(&mut driver).unwrap();

        assert!(driver.is_crop_planted());
        assert!(driver.crop_status().unwrap().aboveground_biomass < biomass);
        let snapshot = driver.planted_crop().unwrap().yields;
        assert_eq!(result.borrow().get(ResultId::PrimaryYield), Some(snapshot.primary_yield));
    }

    #[test]
    fn reapplying_fertiliser_accumulates_again() {
        let mut driver = driver();
        let step = WorkStep::MineralFertiliserApplication(MineralFertiliserApplication {
            date: d(2020, 4, 10),
            partition: MineralFertiliserParameters::default(),
            amount: 30.0,
        });
        step.apply(&mut driver).unwrap();
        step.apply(&mut driver).unwrap();
        assert_eq!(driver.season_sum_fertiliser(), 60.0);
    }

    #[test]
    fn display_names_date_type_and_detail() {
        let step = WorkStep::TillageApplication(TillageApplication {
            date: d(2021, 3, 10),
            depth: 0.25,
        });
        assert_eq!(step.to_string(), "2021-03-10 TillageApplication 0.25 m");
    }
}

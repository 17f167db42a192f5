use super::driver::SimulationDriver;
use super::rules::{PolicyContext, PolicyEngine, PolicyPhase};
use super::schedule::CultivationSchedule;
use crate::error::{Result, SimError};
use crate::models::{ClimateData, ResultId, RunResults};
use chrono::{Datelike, NaiveDate};
use tracing::{debug, info};

#[derive(Debug, Default)]
struct MeanValue {
    sum: f64,
    count: u32,
}

impl MeanValue {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Collects daily values into monthly and yearly outputs.
#[derive(Debug, Default)]
struct OutputAccumulator {
    corg_10: MeanValue,
    corg_30: MeanValue,
    moisture_90: MeanValue,
    recharge: f64,
    leaching: f64,
    runoff: f64,
    precip: f64,
    eta: f64,
    yearly_recharge: f64,
    yearly_leaching: f64,
}

impl OutputAccumulator {
    fn add_day(&mut self, driver: &SimulationDriver, eta: f64) {
        self.corg_10.add(driver.avg_corg(0.1));
        self.corg_30.add(driver.avg_corg(0.3));
        self.moisture_90.add(driver.mean_90cm_water_content());
        self.recharge += driver.groundwater_recharge();
        self.leaching += driver.n_leaching();
        self.runoff += driver.surface_runoff();
        self.precip += driver.today().map_or(0.0, |ctx| ctx.precipitation);
        self.eta += eta;
        self.yearly_recharge += driver.groundwater_recharge();
        self.yearly_leaching += driver.n_leaching();
    }

    fn flush_month(&mut self, results: &mut RunResults, date: NaiveDate) {
        let values = [
            (ResultId::AvgCorg0To10, self.corg_10.mean()),
            (ResultId::AvgCorg0To30, self.corg_30.mean()),
            (ResultId::MeanMoisture0To90, self.moisture_90.mean()),
            (ResultId::GroundwaterRecharge, self.recharge),
            (ResultId::NLeaching, self.leaching),
            (ResultId::MonthlySurfaceRunoff, self.runoff),
            (ResultId::MonthlyPrecip, self.precip),
            (ResultId::MonthlyEta, self.eta),
        ];
        for (id, value) in values {
            results.push(id, date, value);
        }
        let (yearly_recharge, yearly_leaching) = (self.yearly_recharge, self.yearly_leaching);
        *self = Self {
            yearly_recharge,
            yearly_leaching,
            ..Self::default()
        };
    }

    fn flush_year(&mut self, results: &mut RunResults, date: NaiveDate) {
        results.push(ResultId::YearlyGroundwaterRecharge, date, self.yearly_recharge);
        results.push(ResultId::YearlyNLeaching, date, self.yearly_leaching);
        self.yearly_recharge = 0.0;
        self.yearly_leaching = 0.0;
    }
}

fn record_daily(results: &mut RunResults, driver: &SimulationDriver, date: NaiveDate) -> f64 {
    let status = driver.crop_status().unwrap_or_default();
    let eta = driver.soil_evaporation() + status.daily_transpiration;
    let values = [
        (ResultId::DevelopmentStage, f64::from(status.development_stage)),
        (ResultId::SoilMoisture0To90, driver.mean_90cm_water_content()),
        (ResultId::Corg0To30, driver.avg_corg(0.3)),
        (ResultId::Nmin0To90, driver.sum_nmin(0.9)),
        (ResultId::Evapotranspiration, eta),
        (ResultId::DailyAgb, status.aboveground_biomass),
        (ResultId::DailyAgbN, status.aboveground_biomass_n),
    ];
    for (id, value) in values {
        results.push(id, date, value);
    }
    eta
}

/// Walks every day from `start` to `end` inclusive over the rotation.
pub fn run_simulation(
    driver: &mut SimulationDriver,
    rotation: &[CultivationSchedule],
    climate: &ClimateData,
    start: NaiveDate,
    end: NaiveDate,
    policies: &PolicyEngine,
) -> Result<RunResults> {
    if end < start {
        return Err(SimError::InvalidData(format!(
            "run ends ({}) before it starts ({})",
            end, start
        )));
    }

    let mut results = RunResults::default();
    let mut outputs = OutputAccumulator::default();
    let mut current = 0;
    let mut seeded_by = None;

    info!(%start, %end, schedules = rotation.len(), "Starting simulation run");

    for date in start.iter_days().take_while(|d| *d <= end) {
        let forcing = climate
            .get(date)
            .ok_or_else(|| SimError::InvalidData(format!("no climate data for {}", date)))?;

        driver.reset_daily_counters();

        while let Some(schedule) = rotation.get(current) {
            let was_planted = driver.is_crop_planted();
            if schedule.has_steps_on(date) {
                schedule.apply(date, driver)?;
            }
            if !was_planted && driver.is_crop_planted() {
                seeded_by = Some(current);
            }
            // a crop sown by this schedule stays with it until something harvests it
            let own_crop_in_field = driver.is_crop_planted() && seeded_by == Some(current);
            if own_crop_in_field || schedule.next_scheduled_date(date).is_some() {
                break;
            }
            results.crop_results.extend(schedule.results());
            driver.reset_season_fertiliser_counter();
            current += 1;
            match rotation.get(current) {
                Some(next) => info!(%date, from = schedule.name(), to = next.name(), "Rotation advances"),
                None => debug!(%date, "Rotation exhausted"),
            }
        }

        let ctx = PolicyContext {
            date,
            schedule: rotation.get(current),
        };
        policies.run(PolicyPhase::BeforeSoil, &ctx, driver)?;

        driver.day_step_soil_only(date, forcing);
        driver.day_step_crop(date, forcing);

        policies.run(PolicyPhase::AfterCrop, &ctx, driver)?;

        let eta = record_daily(&mut results, driver, date);
        outputs.add_day(driver, eta);

        let last_day = date == end;
        let next = date.succ_opt();
        if last_day || next.map_or(true, |n| n.month() != date.month()) {
            outputs.flush_month(&mut results, date);
        }
        if last_day || next.map_or(true, |n| n.year() != date.year()) {
            outputs.flush_year(&mut results, date);
        }
    }

    if let Some(schedule) = rotation.get(current) {
        results.crop_results.extend(schedule.results());
    }

    info!(
        crop_results = results.crop_results.len(),
        "Simulation run finished"
    );
    Ok(results)
}

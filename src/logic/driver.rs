use super::forcing::{co2_for_date, groundwater_depth_for_date};
use super::processes::{
    CropGrowth, DailyStress, DayContext, ProcessFactory, RemovedBiomass, SoilMoisture,
    SoilOrganic, SoilTemperature, SoilTransport,
};
use crate::error::{Result, SimError};
use crate::models::{
    CentralParameters, Crop, CropStatus, DailyForcing, GeneralParameters, HarvestYields,
    IrrigationParameters, MineralFertiliserParameters, NMinCropParameters, Organ,
    OrganicMatterParameters, SiteParameters, SoilColumn, SoilLayerParameters,
};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

/// The crop currently on the field together with its growth model.
pub struct PlantedCrop {
    pub crop: Arc<Crop>,
    growth: Box<dyn CropGrowth>,
    /// Yields captured by the latest harvest or cutting.
    pub yields: HarvestYields,
    /// mm irrigated since seeding
    pub applied_irrigation: f64,
}

/// Accumulated daily stress since seeding.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StressTotals {
    pub nitrogen: f64,
    pub water: f64,
    pub heat: f64,
    pub oxygen: f64,
}

impl StressTotals {
    fn add(&mut self, day: DailyStress) {
        self.nitrogen += day.nitrogen.max(0.0);
        self.water += day.water.max(0.0);
        self.heat += day.heat.max(0.0);
        self.oxygen += day.oxygen.max(0.0);
    }
}

/// Advances the coupled soil and crop state one day at a time and carries out
/// management operations against it.
pub struct SimulationDriver {
    general: GeneralParameters,
    site: SiteParameters,
    central: CentralParameters,
    factory: Box<dyn ProcessFactory>,
    column: SoilColumn,
    temperature: Box<dyn SoilTemperature>,
    moisture: Box<dyn SoilMoisture>,
    organic: Box<dyn SoilOrganic>,
    transport: Box<dyn SoilTransport>,
    planted: Option<PlantedCrop>,
    today: Option<DayContext>,
    season_fertiliser: f64,
    daily_fertiliser: f64,
    daily_irrigation: f64,
    stress: StressTotals,
    days_with_crop: u32,
}

impl SimulationDriver {
    pub fn new(
        general: GeneralParameters,
        site: SiteParameters,
        profile: &[SoilLayerParameters],
        central: CentralParameters,
        factory: Box<dyn ProcessFactory>,
    ) -> Result<Self> {
        let column = SoilColumn::new(profile, site.soil_cn_ratio)?;
        general.nmin_fertiliser_partition.validate()?;

        let temperature = factory.soil_temperature(&column, &site);
        let moisture = factory.soil_moisture(&column, &site, &general);
        let organic = factory.soil_organic(&column, &site);
        let transport = factory.soil_transport(&column, &general);

        debug!(layers = column.layer_count(), "Constructed simulation driver");

        Ok(Self {
            general,
            site,
            central,
            factory,
            column,
            temperature,
            moisture,
            organic,
            transport,
            planted: None,
            today: None,
            season_fertiliser: 0.0,
            daily_fertiliser: 0.0,
            daily_irrigation: 0.0,
            stress: StressTotals::default(),
            days_with_crop: 0,
        })
    }

    pub fn general(&self) -> &GeneralParameters {
        &self.general
    }

    pub fn site(&self) -> &SiteParameters {
        &self.site
    }

    pub fn column(&self) -> &SoilColumn {
        &self.column
    }

    /// The context of the most recent soil step.
    pub fn today(&self) -> Option<&DayContext> {
        self.today.as_ref()
    }

    fn day_context(&self, date: NaiveDate, forcing: &DailyForcing) -> DayContext {
        let groundwater_depth = self
            .central
            .measured_groundwater
            .depth_m(date)
            .unwrap_or_else(|| groundwater_depth_for_date(date, &self.general));

        DayContext {
            date,
            forcing: *forcing,
            precipitation: forcing.precip * self.central.precip_correction.factor_for(date),
            co2_concentration: co2_for_date(date, self.general.atmospheric_co2),
            groundwater_depth,
            crop_cover: self.crop_cover(),
            soil_evaporation: 0.0,
        }
    }

    fn crop_cover(&self) -> f64 {
        self.planted.as_ref().map_or(0.0, |p| {
            let lai = p.growth.status().leaf_area_index;
            1.0 - (-p.crop.species.extinction_coefficient * lai).exp()
        })
    }

    // ------------------------------------------------------------------
    // Daily pipeline

    /// Temperature, moisture, organic matter and transport, in that order.
    pub fn day_step_soil_only(&mut self, date: NaiveDate, forcing: &DailyForcing) {
        let mut ctx = self.day_context(date, forcing);

        self.temperature.step(&mut self.column, &ctx);
        self.moisture.step(&mut self.column, &ctx);
        ctx.soil_evaporation = self.moisture.evaporation();
        self.organic.step(&mut self.column, &ctx);
        self.transport
            .step(&mut self.column, &ctx, self.moisture.water_fluxes());

        self.today = Some(ctx);
    }

    pub fn day_step_crop(&mut self, date: NaiveDate, forcing: &DailyForcing) {
        let ctx = match self.today {
            Some(ctx) if ctx.date == date => ctx,
            _ => self.day_context(date, forcing),
        };
        let Some(planted) = self.planted.as_mut() else {
            return;
        };

        let stress = planted.growth.step(&mut self.column, &ctx);
        self.stress.add(stress);
        self.days_with_crop += 1;
    }

    // ------------------------------------------------------------------
    // Crop lifecycle

    pub fn is_crop_planted(&self) -> bool {
        self.planted.is_some()
    }

    pub fn current_crop(&self) -> Option<&Arc<Crop>> {
        self.planted.as_ref().map(|p| &p.crop)
    }

    pub fn planted_crop(&self) -> Option<&PlantedCrop> {
        self.planted.as_ref()
    }

    pub fn crop_status(&self) -> Option<CropStatus> {
        self.planted.as_ref().map(|p| p.growth.status())
    }

    /// Installs a growth model for `crop` and zeroes the lifecycle counters.
    pub fn seed_crop(&mut self, crop: Arc<Crop>) -> Result<()> {
        if let Some(planted) = &self.planted {
            return Err(SimError::CropAlreadyPlanted {
                crop: planted.crop.id.clone(),
            });
        }
        let growth = self.factory.crop_growth(Arc::clone(&crop), &self.column)?;

        self.stress = StressTotals::default();
        self.days_with_crop = 0;
        info!(crop = %crop, "Seeded crop");
        self.planted = Some(PlantedCrop {
            crop,
            growth,
            yields: HarvestYields::default(),
            applied_irrigation: 0.0,
        });
        Ok(())
    }

    fn planted_mut(&mut self, operation: &'static str) -> Result<&mut PlantedCrop> {
        self.planted
            .as_mut()
            .ok_or(SimError::NoActiveCrop { operation })
    }

    /// Copies the yields the crop would deliver now into the planted slot.
    pub fn snapshot_yields(&mut self) -> Result<HarvestYields> {
        let use_secondary = self.general.use_secondary_yields;
        let planted = self.planted_mut("record yields")?;
        planted.yields = planted.growth.yields(use_secondary);
        Ok(planted.yields)
    }

    /// Removes the crop. Residues stay on the field; with `exported` the
    /// yields leave it.
    pub fn harvest_total(&mut self, exported: bool) -> Result<()> {
        let use_secondary = self.general.use_secondary_yields;
        let planted = self.planted.take().ok_or(SimError::NoActiveCrop {
            operation: "harvest",
        })?;

        let residues = planted.growth.residues(exported, use_secondary);
        self.return_residues(&planted.crop, residues, false);
        info!(crop = %planted.crop, exported, "Harvested crop");
        Ok(())
    }

    fn remove_organs(
        &mut self,
        operation: &'static str,
        organs: &[(Organ, f64)],
        percentage: f64,
        exported: bool,
    ) -> Result<RemovedBiomass> {
        let fraction = (percentage / 100.0).clamp(0.0, 1.0);
        let planted = self.planted_mut(operation)?;
        let mut removed = RemovedBiomass::default();
        for (organ, share) in organs {
            removed += planted.growth.remove_from_organ(*organ, fraction * share);
        }
        let crop = Arc::clone(&planted.crop);
        if !exported {
            self.return_residues(&crop, removed, false);
        }
        debug!(operation, percentage, exported, removed = removed.dry_matter, "Removed biomass");
        Ok(removed)
    }

    pub fn fruit_harvest(&mut self, percentage: f64, exported: bool) -> Result<RemovedBiomass> {
        self.remove_organs("harvest fruits", &[(Organ::Fruit, 1.0)], percentage, exported)
    }

    pub fn leaf_pruning(&mut self, percentage: f64, exported: bool) -> Result<RemovedBiomass> {
        self.remove_organs("prune leaves", &[(Organ::Leaf, 1.0)], percentage, exported)
    }

    /// Tips carry young leaves and shoot ends, never fruit.
    pub fn tip_pruning(&mut self, percentage: f64, exported: bool) -> Result<RemovedBiomass> {
        self.remove_organs(
            "prune tips",
            &[(Organ::Leaf, 1.0), (Organ::Shoot, 0.5)],
            percentage,
            exported,
        )
    }

    pub fn shoot_pruning(&mut self, percentage: f64, exported: bool) -> Result<RemovedBiomass> {
        self.remove_organs(
            "prune shoots",
            &[(Organ::Leaf, 1.0), (Organ::Shoot, 1.0), (Organ::Fruit, 1.0)],
            percentage,
            exported,
        )
    }

    /// Removes `percentage` of the organs the cultivar lists as cut material.
    pub fn cutting(&mut self, percentage: f64, exported: bool) -> Result<RemovedBiomass> {
        let organs: Vec<(Organ, f64)> = self
            .planted
            .as_ref()
            .ok_or(SimError::NoActiveCrop { operation: "cut" })?
            .crop
            .cultivar
            .cutting_yield
            .iter()
            .map(|c| (c.organ, c.yield_percentage))
            .collect();
        self.remove_organs("cut", &organs, percentage, exported)
    }

    /// Takes off the cut material and lets the crop regrow.
    pub fn apply_cutting(&mut self) -> Result<RemovedBiomass> {
        let planted = self.planted_mut("cut")?;
        let removed = planted.growth.apply_cutting();
        info!(crop = %planted.crop, removed = removed.dry_matter, "Cut crop");
        Ok(removed)
    }

    /// Ploughs the whole crop into the soil and ends it.
    pub fn incorporate_crop(&mut self) -> Result<()> {
        let use_secondary = self.general.use_secondary_yields;
        let planted = self.planted.take().ok_or(SimError::NoActiveCrop {
            operation: "incorporate",
        })?;
        let biomass = planted.growth.residues(false, use_secondary);
        self.return_residues(&planted.crop, biomass, true);
        info!(crop = %planted.crop, "Incorporated crop");
        Ok(())
    }

    fn return_residues(&mut self, crop: &Crop, residues: RemovedBiomass, incorporate: bool) {
        if residues.dry_matter <= 0.0 {
            return;
        }
        let mut params = crop
            .residue_params
            .clone()
            .unwrap_or_else(default_residue_parameters);
        let fresh = residues.dry_matter / params.dry_matter_content.max(1e-6);
        params.n_concentration = residues.nitrogen / fresh;
        self.organic
            .add_organic_matter(&mut self.column, &params, fresh, incorporate);
    }

    // ------------------------------------------------------------------
    // Management

    pub fn apply_mineral_fertiliser(&mut self, partition: &MineralFertiliserParameters, amount: f64) {
        self.column.apply_mineral_fertiliser(partition, amount);
        self.add_daily_sum_fertiliser(amount);
        debug!(fertiliser = %partition.id, amount, "Applied mineral fertiliser");
    }

    pub fn apply_organic_fertiliser(
        &mut self,
        params: &OrganicMatterParameters,
        amount: f64,
        incorporate: bool,
    ) {
        self.organic
            .add_organic_matter(&mut self.column, params, amount, incorporate);
        self.add_daily_sum_fertiliser(amount * params.n_concentration);
        debug!(fertiliser = %params.id, amount, incorporate, "Applied organic fertiliser");
    }

    /// Tops mineral N up towards the crop's target, limited to the width of
    /// the configured band. Returns the amount applied in kg N/ha.
    pub fn apply_mineral_fertiliser_via_deficit_method(
        &mut self,
        partition: &MineralFertiliserParameters,
        crop_params: &NMinCropParameters,
    ) -> f64 {
        let band = &self.general.nmin_user_params;
        let max_amount = (band.max - band.min).max(0.0);
        let current = self.column.sum_nmin(crop_params.sampling_depth);
        let deficit = (crop_params.n_target - current).clamp(0.0, max_amount);

        if deficit > 0.0 {
            self.apply_mineral_fertiliser(partition, deficit);
        }
        info!(current, target = crop_params.n_target, applied = deficit, "Deficit fertilisation");
        deficit
    }

    pub fn apply_irrigation(&mut self, amount: f64, water: &IrrigationParameters) {
        self.column.apply_irrigation(
            amount,
            water.nitrate_concentration,
            water.sulfate_concentration,
        );
        self.daily_irrigation += amount;
        if let Some(planted) = self.planted.as_mut() {
            planted.applied_irrigation += amount;
        }
        debug!(amount, "Applied irrigation");
    }

    pub fn apply_tillage(&mut self, depth: f64) {
        let layers = self.column.apply_tillage(depth);
        debug!(depth, layers, "Applied tillage");
    }

    fn add_daily_sum_fertiliser(&mut self, amount: f64) {
        self.daily_fertiliser += amount;
        self.season_fertiliser += amount;
    }

    // ------------------------------------------------------------------
    // Counters

    pub fn reset_daily_counters(&mut self) {
        self.daily_fertiliser = 0.0;
        self.daily_irrigation = 0.0;
    }

    pub fn reset_season_fertiliser_counter(&mut self) {
        self.season_fertiliser = 0.0;
    }

    pub fn daily_sum_fertiliser(&self) -> f64 {
        self.daily_fertiliser
    }

    pub fn daily_sum_irrigation(&self) -> f64 {
        self.daily_irrigation
    }

    pub fn season_sum_fertiliser(&self) -> f64 {
        self.season_fertiliser
    }

    pub fn accumulated_stress(&self) -> StressTotals {
        self.stress
    }

    pub fn accumulated_n_stress(&self) -> f64 {
        self.stress.nitrogen
    }

    pub fn accumulated_water_stress(&self) -> f64 {
        self.stress.water
    }

    pub fn accumulated_heat_stress(&self) -> f64 {
        self.stress.heat
    }

    pub fn accumulated_oxygen_stress(&self) -> f64 {
        self.stress.oxygen
    }

    pub fn days_with_crop(&self) -> u32 {
        self.days_with_crop
    }

    // ------------------------------------------------------------------
    // Soil summaries

    pub fn sum_nmin(&self, depth: f64) -> f64 {
        self.column.sum_nmin(depth)
    }

    pub fn avg_corg(&self, depth: f64) -> f64 {
        self.column.avg_corg(depth)
    }

    pub fn mean_90cm_water_content(&self) -> f64 {
        self.column.mean_90cm_water_content()
    }

    pub fn groundwater_recharge(&self) -> f64 {
        self.moisture.groundwater_recharge()
    }

    pub fn surface_runoff(&self) -> f64 {
        self.moisture.surface_runoff()
    }

    pub fn soil_evaporation(&self) -> f64 {
        self.moisture.evaporation()
    }

    pub fn n_leaching(&self) -> f64 {
        self.transport.leached_n()
    }

    pub fn net_mineralisation(&self) -> f64 {
        self.organic.net_mineralisation()
    }

    pub fn surface_temperature(&self) -> f64 {
        self.temperature.surface_temperature()
    }
}

fn default_residue_parameters() -> OrganicMatterParameters {
    OrganicMatterParameters {
        id: "residue".into(),
        name: "Crop residue".into(),
        dry_matter_content: 1.0,
        nh4_content: 0.0,
        no3_content: 0.0,
        carbamid_content: 0.0,
        slow_dec_coeff: 0.012,
        fast_dec_coeff: 0.05,
        part_to_slow: 0.38,
        part_to_fast: 0.62,
        cn_ratio_slow: 47.7,
        cn_ratio_fast: 10.0,
        n_concentration: 0.0,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::logic::bucket::BucketModel;

    pub(crate) fn driver() -> SimulationDriver {
        driver_with(GeneralParameters::default(), CentralParameters::default())
    }

    pub(crate) fn driver_with(general: GeneralParameters, central: CentralParameters) -> SimulationDriver {
        let profile = vec![SoilLayerParameters::default(); 20];
        SimulationDriver::new(
            general,
            SiteParameters::default(),
            &profile,
            central,
            Box::new(BucketModel),
        )
        .unwrap()
    }

    pub(crate) fn wheat() -> Arc<Crop> {
        Arc::new(Crop::new("WW", "Winter wheat"))
    }

    pub(crate) fn forcing(day: i64) -> DailyForcing {
        let t = 12.0 + 8.0 * ((day as f64) / 58.0).sin();
        let precip = if day % 4 == 0 { 9.0 } else { 0.0 };
        DailyForcing::new(t - 6.0, t, t + 6.0, precip, 14.0 + (day % 7) as f64)
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn empty_profile_is_rejected() {
        let result = SimulationDriver::new(
            GeneralParameters::default(),
            SiteParameters::default(),
            &[],
            CentralParameters::default(),
            Box::new(BucketModel),
        );
        assert!(matches!(result, Err(SimError::EmptySoilProfile)));
    }

    #[test]
    fn seeding_twice_is_rejected() {
        let mut driver = driver();
        driver.seed_crop(wheat()).unwrap();
        driver.day_step_crop(d(2020, 4, 2), &forcing(1));
        assert_eq!(driver.days_with_crop(), 1);

        let second = Arc::new(Crop::new("SM", "Silage maize"));
        let result = driver.seed_crop(second);
        assert!(matches!(result, Err(SimError::CropAlreadyPlanted { ref crop }) if crop == "WW"));
        assert_eq!(driver.current_crop().unwrap().id, "WW");
        assert_eq!(driver.days_with_crop(), 1);
    }

    #[test]
    fn total_harvest_clears_the_crop() {
        let mut driver = driver();
        driver.seed_crop(wheat()).unwrap();
        let mut date = d(2020, 4, 1);
        for i in 0..40 {
            driver.day_step_soil_only(date, &forcing(i));
            driver.day_step_crop(date, &forcing(i));
            date = date.succ_opt().unwrap();
        }
        let corg_before = driver.avg_corg(0.1);
        driver.harvest_total(true).unwrap();
        assert!(!driver.is_crop_planted());
        assert!(driver.crop_status().is_none());
        // residues went into the top layer as added organic matter
        assert!(driver.avg_corg(0.1) >= corg_before);
        driver.seed_crop(wheat()).unwrap();
        assert_eq!(driver.days_with_crop(), 0);
    }

    #[test]
    fn crop_operations_need_a_crop() {
        let mut driver = driver();
        assert!(matches!(
            driver.harvest_total(true),
            Err(SimError::NoActiveCrop { .. })
        ));
        assert!(driver.apply_cutting().is_err());
        assert!(driver.leaf_pruning(10.0, false).is_err());
        assert!(driver.incorporate_crop().is_err());
    }

    #[test]
    fn crop_step_without_crop_is_a_no_op() {
        let mut driver = driver();
        driver.day_step_crop(d(2020, 4, 1), &forcing(0));
        assert_eq!(driver.days_with_crop(), 0);
        assert_eq!(driver.accumulated_stress(), StressTotals::default());
    }

    #[test]
    fn fertiliser_counters_follow_the_day() {
        let mut driver = driver();
        let an = MineralFertiliserParameters::default();
        driver.reset_daily_counters();
        driver.apply_mineral_fertiliser(&an, 20.0);
        driver.apply_mineral_fertiliser(&an, 30.0);
        assert_eq!(driver.daily_sum_fertiliser(), 50.0);
        assert_eq!(driver.season_sum_fertiliser(), 50.0);

        driver.reset_daily_counters();
        assert_eq!(driver.daily_sum_fertiliser(), 0.0);
        assert_eq!(driver.season_sum_fertiliser(), 50.0);

        driver.reset_season_fertiliser_counter();
        assert_eq!(driver.season_sum_fertiliser(), 0.0);
    }

    #[test]
    fn organic_fertiliser_counts_its_nitrogen() {
        let mut driver = driver();
        let manure = OrganicMatterParameters::default();
        driver.apply_organic_fertiliser(&manure, 10_000.0, true);
        assert!((driver.daily_sum_fertiliser() - 10_000.0 * manure.n_concentration).abs() < 1e-9);
    }

    #[test]
    fn irrigation_is_counted_per_day_and_per_crop() {
        let mut driver = driver();
        driver.seed_crop(wheat()).unwrap();
        let water = IrrigationParameters::default();
        driver.apply_irrigation(10.0, &water);
        driver.apply_irrigation(5.0, &water);
        assert_eq!(driver.daily_sum_irrigation(), 15.0);
        assert_eq!(driver.planted_crop().unwrap().applied_irrigation, 15.0);
        driver.reset_daily_counters();
        assert_eq!(driver.daily_sum_irrigation(), 0.0);
        assert_eq!(driver.planted_crop().unwrap().applied_irrigation, 15.0);
    }

    #[test]
    fn deficit_method_clamps_to_band() {
        let mut driver = driver();
        let an = MineralFertiliserParameters::default();
        let target = NMinCropParameters {
            sampling_depth: 0.9,
            n_target: 200.0,
        };
        let current = driver.sum_nmin(0.9);
        assert!(200.0 - current > 80.0);

        let applied = driver.apply_mineral_fertiliser_via_deficit_method(&an, &target);
        assert_eq!(applied, 80.0);
        assert_eq!(driver.season_sum_fertiliser(), 80.0);

        let now = driver.sum_nmin(0.9);
        let second = driver.apply_mineral_fertiliser_via_deficit_method(&an, &target);
        assert!((second - (200.0 - now).clamp(0.0, 80.0)).abs() < 1e-9);
    }

    #[test]
    fn deficit_method_applies_nothing_above_target() {
        let mut driver = driver();
        let target = NMinCropParameters {
            sampling_depth: 0.3,
            n_target: 1.0,
        };
        let applied = driver
            .apply_mineral_fertiliser_via_deficit_method(&MineralFertiliserParameters::default(), &target);
        assert_eq!(applied, 0.0);
        assert_eq!(driver.daily_sum_fertiliser(), 0.0);
    }

    #[test]
    fn precip_correction_and_measured_groundwater_shape_the_day() {
        let mut central = CentralParameters::default();
        central.precip_correction.set(4, 1.5).unwrap();
        let date = d(2020, 5, 10);
        central.measured_groundwater.insert(date, 120.0);
        let mut driver = driver_with(GeneralParameters::default(), central);

        let f = DailyForcing::new(8.0, 14.0, 20.0, 10.0, 18.0);
        driver.day_step_soil_only(date, &f);
        let ctx = driver.today().unwrap();
        assert_eq!(ctx.precipitation, 15.0);
        assert_eq!(ctx.groundwater_depth, 1.2);

        driver.day_step_soil_only(date.succ_opt().unwrap(), &f);
        assert_ne!(driver.today().unwrap().groundwater_depth, 1.2);
    }

    #[test]
    fn identical_inputs_give_identical_state() {
        let run = || {
            let mut driver = driver();
            driver.seed_crop(wheat()).unwrap();
            let mut date = d(2020, 3, 15);
            for i in 0..90 {
                driver.reset_daily_counters();
                if i == 20 {
                    driver.apply_mineral_fertiliser(&MineralFertiliserParameters::default(), 60.0);
                }
                driver.day_step_soil_only(date, &forcing(i));
                driver.day_step_crop(date, &forcing(i));
                date = date.succ_opt().unwrap();
            }
            (driver.column().clone(), driver.crop_status(), driver.accumulated_stress())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn partial_removals_keep_the_crop() {
        let mut driver = driver();
        driver.seed_crop(wheat()).unwrap();
        let before = driver.crop_status().unwrap().organ(Organ::Leaf);
        let removed = driver.leaf_pruning(50.0, true).unwrap();
        assert!((removed.dry_matter - before * 0.5).abs() < 1e-9);
        assert!(driver.is_crop_planted());
        driver.tip_pruning(10.0, false).unwrap();
        driver.shoot_pruning(10.0, false).unwrap();
        driver.fruit_harvest(100.0, true).unwrap();
        driver.cutting(50.0, true).unwrap();
        assert!(driver.is_crop_planted());
    }

    #[test]
    fn incorporation_ends_the_crop() {
        let mut driver = driver();
        driver.seed_crop(wheat()).unwrap();
        driver.incorporate_crop().unwrap();
        assert!(!driver.is_crop_planted());
    }
}

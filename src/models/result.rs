use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Every named scalar output of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResultId {
    // per harvest/cutting event
    #[serde(rename = "primYield")]
    PrimaryYield,
    #[serde(rename = "secYield")]
    SecondaryYield,
    #[serde(rename = "primYieldFM")]
    PrimaryYieldFresh,
    #[serde(rename = "secYieldFM")]
    SecondaryYieldFresh,
    #[serde(rename = "biomNContent")]
    BiomassNContent,
    #[serde(rename = "aboveBiomassNContent")]
    AboveBiomassNContent,
    #[serde(rename = "AbBiom")]
    AbovegroundBiomass,
    #[serde(rename = "sumNUptake")]
    SumNUptake,
    #[serde(rename = "cropHeight")]
    CropHeight,
    #[serde(rename = "sumFert")]
    SumFertiliser,
    #[serde(rename = "sumIrrig")]
    SumIrrigation,
    #[serde(rename = "anthesisDay")]
    AnthesisDay,
    #[serde(rename = "maturityDay")]
    MaturityDay,
    #[serde(rename = "harvestDay")]
    HarvestDay,
    #[serde(rename = "ETa_crop")]
    EvapotranspirationCrop,
    #[serde(rename = "Tra_crop")]
    TranspirationCrop,
    #[serde(rename = "daysWithCrop")]
    DaysWithCrop,
    #[serde(rename = "NStress")]
    NitrogenStress,
    #[serde(rename = "WaterStress")]
    WaterStress,
    #[serde(rename = "HeatStress")]
    HeatStress,
    #[serde(rename = "OxygenStress")]
    OxygenStress,
    #[serde(rename = "moist90Harvest")]
    Moisture90Harvest,
    #[serde(rename = "corg30Harvest")]
    Corg30Harvest,
    #[serde(rename = "nmin90Harvest")]
    Nmin90Harvest,

    // monthly
    #[serde(rename = "Corg10cm")]
    AvgCorg0To10,
    #[serde(rename = "Corg30cm")]
    AvgCorg0To30,
    #[serde(rename = "Moist90cm")]
    MeanMoisture0To90,
    #[serde(rename = "GWRech")]
    GroundwaterRecharge,
    #[serde(rename = "monthLeachN")]
    NLeaching,
    #[serde(rename = "monthlySurfaceRunoff")]
    MonthlySurfaceRunoff,
    #[serde(rename = "monthlyPrecip")]
    MonthlyPrecip,
    #[serde(rename = "monthlyETa")]
    MonthlyEta,

    // yearly
    #[serde(rename = "Yearly_GWRech")]
    YearlyGroundwaterRecharge,
    #[serde(rename = "Yearly_monthLeachN")]
    YearlyNLeaching,

    // daily
    #[serde(rename = "devStage")]
    DevelopmentStage,
    #[serde(rename = "soilMoist0_90")]
    SoilMoisture0To90,
    #[serde(rename = "corg0_30")]
    Corg0To30,
    #[serde(rename = "nmin0_90")]
    Nmin0To90,
    #[serde(rename = "ETa")]
    Evapotranspiration,
    #[serde(rename = "dailyAGB")]
    DailyAgb,
    #[serde(rename = "dailyAGB_N")]
    DailyAgbN,
}

/// Display name, unit and short name of an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultIdInfo {
    pub name: &'static str,
    pub unit: &'static str,
    pub short_name: &'static str,
}

impl ResultId {
    pub fn info(&self) -> ResultIdInfo {
        use ResultId::*;
        let (name, unit, short_name) = match self {
            PrimaryYield => ("Primary yield", "kg DM/ha", "primYield"),
            SecondaryYield => ("Secondary yield", "kg DM/ha", "secYield"),
            PrimaryYieldFresh => ("Primary yield fresh matter", "kg FM/ha", "primYieldFM"),
            SecondaryYieldFresh => ("Secondary yield fresh matter", "kg FM/ha", "secYieldFM"),
            BiomassNContent => ("N in harvested biomass", "kg N/ha", "biomNContent"),
            AboveBiomassNContent => ("N in aboveground biomass", "kg N/ha", "aboveBiomassNContent"),
            AbovegroundBiomass => ("Aboveground biomass", "kg DM/ha", "AbBiom"),
            SumNUptake => ("Cumulative N uptake", "kg N/ha", "sumNUptake"),
            CropHeight => ("Crop height at harvest", "m", "cropHeight"),
            SumFertiliser => ("Applied fertiliser N", "kg N/ha", "sumFert"),
            SumIrrigation => ("Applied irrigation water", "mm", "sumIrrig"),
            AnthesisDay => ("Day of anthesis", "doy", "anthesisDay"),
            MaturityDay => ("Day of maturity", "doy", "maturityDay"),
            HarvestDay => ("Day of harvest", "doy", "harvestDay"),
            EvapotranspirationCrop => ("Evapotranspiration during crop cycle", "mm", "ETa_crop"),
            TranspirationCrop => ("Transpiration during crop cycle", "mm", "Tra_crop"),
            DaysWithCrop => ("Days with crop", "d", "daysWithCrop"),
            NitrogenStress => ("Accumulated N stress", "", "NStress"),
            WaterStress => ("Accumulated water stress", "", "WaterStress"),
            HeatStress => ("Accumulated heat stress", "", "HeatStress"),
            OxygenStress => ("Accumulated oxygen stress", "", "OxygenStress"),
            Moisture90Harvest => ("Soil moisture 0-90 cm at harvest", "m3/m3", "moist90Harvest"),
            Corg30Harvest => ("Corg 0-30 cm at harvest", "% kg C/kg soil", "corg30Harvest"),
            Nmin90Harvest => ("Nmin 0-90 cm at harvest", "kg N/ha", "nmin90Harvest"),
            AvgCorg0To10 => ("Mean Corg 0-10 cm", "% kg C/kg soil", "Corg10cm"),
            AvgCorg0To30 => ("Mean Corg 0-30 cm", "% kg C/kg soil", "Corg30cm"),
            MeanMoisture0To90 => ("Mean soil moisture 0-90 cm", "m3/m3", "Moist90cm"),
            GroundwaterRecharge => ("Groundwater recharge", "mm", "GWRech"),
            NLeaching => ("N leaching", "kg N/ha", "monthLeachN"),
            MonthlySurfaceRunoff => ("Surface runoff", "mm", "monthlySurfaceRunoff"),
            MonthlyPrecip => ("Corrected precipitation", "mm", "monthlyPrecip"),
            MonthlyEta => ("Evapotranspiration", "mm", "monthlyETa"),
            YearlyGroundwaterRecharge => ("Yearly groundwater recharge", "mm", "Yearly_GWRech"),
            YearlyNLeaching => ("Yearly N leaching", "kg N/ha", "Yearly_monthLeachN"),
            DevelopmentStage => ("Development stage", "", "devStage"),
            SoilMoisture0To90 => ("Soil moisture 0-90 cm", "m3/m3", "soilMoist0_90"),
            Corg0To30 => ("Corg 0-30 cm", "% kg C/kg soil", "corg0_30"),
            Nmin0To90 => ("Nmin 0-90 cm", "kg N/ha", "nmin0_90"),
            Evapotranspiration => ("Actual evapotranspiration", "mm", "ETa"),
            DailyAgb => ("Aboveground biomass", "kg DM/ha", "dailyAGB"),
            DailyAgbN => ("Aboveground biomass N", "kg N/ha", "dailyAGB_N"),
        };
        ResultIdInfo {
            name,
            unit,
            short_name,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.info().short_name
    }

    pub fn from_short_name(s: &str) -> Option<Self> {
        Self::all().iter().copied().find(|id| id.as_str() == s)
    }

    pub fn all() -> Vec<ResultId> {
        let mut all = crop_result_ids().to_vec();
        all.extend_from_slice(monthly_result_ids());
        all.extend_from_slice(yearly_result_ids());
        all.extend_from_slice(daily_result_ids());
        all
    }
}

impl std::fmt::Display for ResultId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub fn crop_result_ids() -> &'static [ResultId] {
    use ResultId::*;
    &[
        PrimaryYield,
        SecondaryYield,
        PrimaryYieldFresh,
        SecondaryYieldFresh,
        BiomassNContent,
        AboveBiomassNContent,
        AbovegroundBiomass,
        SumNUptake,
        CropHeight,
        SumFertiliser,
        SumIrrigation,
        AnthesisDay,
        MaturityDay,
        HarvestDay,
        EvapotranspirationCrop,
        TranspirationCrop,
        DaysWithCrop,
        NitrogenStress,
        WaterStress,
        HeatStress,
        OxygenStress,
        Moisture90Harvest,
        Corg30Harvest,
        Nmin90Harvest,
    ]
}

pub fn monthly_result_ids() -> &'static [ResultId] {
    use ResultId::*;
    &[
        AvgCorg0To10,
        AvgCorg0To30,
        MeanMoisture0To90,
        GroundwaterRecharge,
        NLeaching,
        MonthlySurfaceRunoff,
        MonthlyPrecip,
        MonthlyEta,
    ]
}

pub fn yearly_result_ids() -> &'static [ResultId] {
    &[
        ResultId::YearlyGroundwaterRecharge,
        ResultId::YearlyNLeaching,
    ]
}

pub fn daily_result_ids() -> &'static [ResultId] {
    use ResultId::*;
    &[
        DevelopmentStage,
        SoilMoisture0To90,
        Corg0To30,
        Nmin0To90,
        Evapotranspiration,
        DailyAgb,
        DailyAgbN,
    ]
}

/// Outputs of one harvest or cutting event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CropResult {
    pub crop_id: String,
    pub custom_id: i64,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub results: BTreeMap<ResultId, f64>,
}

impl CropResult {
    pub fn new(crop_id: &str, custom_id: i64) -> Self {
        Self {
            crop_id: crop_id.to_string(),
            custom_id,
            date: None,
            results: BTreeMap::new(),
        }
    }

    /// Later writes for the same id overwrite earlier ones.
    pub fn set(&mut self, id: ResultId, value: f64) {
        self.results.insert(id, value);
    }

    pub fn get(&self, id: ResultId) -> Option<f64> {
        self.results.get(&id).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// A result record shared between the steps of one cropping cycle.
pub type SharedResult = Rc<RefCell<CropResult>>;

pub fn shared_result(crop_id: &str, custom_id: i64) -> SharedResult {
    Rc::new(RefCell::new(CropResult::new(crop_id, custom_id)))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

/// Everything a run produces: event records plus general time series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    pub crop_results: Vec<CropResult>,
    pub general_results: BTreeMap<ResultId, Vec<DatedValue>>,
}

impl RunResults {
    pub fn push(&mut self, id: ResultId, date: NaiveDate, value: f64) {
        self.general_results
            .entry(id)
            .or_default()
            .push(DatedValue { date, value });
    }

    pub fn series(&self, id: ResultId) -> &[DatedValue] {
        self.general_results
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn crop_results_for(&self, crop_id: &str) -> Vec<&CropResult> {
        self.crop_results
            .iter()
            .filter(|r| r.crop_id == crop_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_names_are_unique_and_resolve() {
        let all = ResultId::all();
        for id in &all {
            assert_eq!(ResultId::from_short_name(id.as_str()), Some(*id));
        }
        let mut names: Vec<_> = all.iter().map(|id| id.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn serde_uses_short_names() {
        let mut record = CropResult::new("WW", 7);
        record.set(ResultId::PrimaryYield, 7200.0);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"primYield\":7200.0"));

        let info = ResultId::Nmin90Harvest.info();
        assert_eq!(info.unit, "kg N/ha");
        assert_eq!(
            serde_json::to_string(&ResultId::Nmin90Harvest).unwrap(),
            format!("\"{}\"", info.short_name)
        );
    }

    #[test]
    fn crop_result_json_is_order_independent() {
        let a = r#"{"crop_id":"SM","custom_id":1,"date":"2021-09-30",
            "results":{"secYield":10.0,"primYield":20.0}}"#;
        let b = r#"{"results":{"primYield":20.0,"secYield":10.0},
            "date":"2021-09-30","custom_id":1,"crop_id":"SM"}"#;
        let ra: CropResult = serde_json::from_str(a).unwrap();
        let rb: CropResult = serde_json::from_str(b).unwrap();
        assert_eq!(ra, rb);
        assert_eq!(ra.get(ResultId::PrimaryYield), Some(20.0));
    }

    #[test]
    fn later_write_overwrites() {
        let shared = shared_result("CLV", 0);
        shared.borrow_mut().set(ResultId::PrimaryYield, 1.0);
        shared.borrow_mut().set(ResultId::PrimaryYield, 2.0);
        assert_eq!(shared.borrow().get(ResultId::PrimaryYield), Some(2.0));
    }

    #[test]
    fn series_of_missing_id_is_empty() {
        let mut results = RunResults::default();
        let d = NaiveDate::from_ymd_opt(2020, 1, 31).unwrap();
        results.push(ResultId::MonthlyPrecip, d, 42.0);
        assert_eq!(results.series(ResultId::MonthlyPrecip).len(), 1);
        assert!(results.series(ResultId::NLeaching).is_empty());
    }
}

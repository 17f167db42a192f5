use super::driver::SimulationDriver;
use super::workstep::{Cutting, Harvest, HarvestMethod, Seed, WorkStep};
use crate::error::{Result, SimError};
use crate::models::{shared_result, Crop, CropResult, SharedResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Included, Unbounded};
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

/// The dated work steps of one cropping cycle. Steps sharing a date keep
/// their insertion order.
#[derive(Debug, Deserialize)]
#[serde(try_from = "ScheduleDocument")]
pub struct CultivationSchedule {
    custom_id: i64,
    name: String,
    crop: Option<Arc<Crop>>,
    irrigate_crop: bool,
    steps: BTreeMap<(NaiveDate, u32), WorkStep>,
    next_seq: u32,
    /// Record shared by every harvest and cut of a crop-derived cycle.
    cycle_result: Option<SharedResult>,
    results: Vec<SharedResult>,
}

impl CultivationSchedule {
    pub fn new(name: &str, custom_id: i64) -> Self {
        Self {
            custom_id,
            name: name.to_string(),
            crop: None,
            irrigate_crop: false,
            steps: BTreeMap::new(),
            next_seq: 0,
            cycle_result: None,
            results: Vec::new(),
        }
    }

    /// Seed, harvest and cuttings from the crop's own dates. All of them
    /// write into one result record.
    pub fn from_crop(crop: Arc<Crop>, name: &str, custom_id: i64) -> Result<Self> {
        crop.validate()?;
        let seed_date = crop.seed_date.ok_or_else(|| {
            SimError::InvalidSchedule(format!("crop '{}' has no seed date", crop.id))
        })?;

        let mut schedule = Self::new(name, custom_id);
        let result = shared_result(&crop.id, custom_id);
        schedule.cycle_result = Some(Rc::clone(&result));
        schedule.results.push(Rc::clone(&result));
        schedule.crop = Some(Arc::clone(&crop));

        schedule.push(WorkStep::Seed(Seed {
            date: seed_date,
            crop: Arc::clone(&crop),
        }));
        if let Some(harvest_date) = crop.harvest_date {
            schedule.push(WorkStep::Harvest(Harvest {
                date: harvest_date,
                method: HarvestMethod::Total,
                percentage: 100.0,
                exported: true,
                result: Some(Rc::clone(&result)),
            }));
        }
        for &date in &crop.cutting_dates {
            schedule.push(WorkStep::Cutting(Cutting {
                date,
                result: Some(Rc::clone(&result)),
            }));
        }
        Ok(schedule)
    }

    pub fn with_irrigation(mut self, irrigate: bool) -> Self {
        self.irrigate_crop = irrigate;
        self
    }

    /// Appends a step. A Harvest without a record gets a fresh one.
    pub fn add_step(&mut self, step: WorkStep) -> Result<()> {
        step.validate()?;
        if let WorkStep::Seed(seed) = &step {
            if self.crop.is_none() {
                self.crop = Some(Arc::clone(&seed.crop));
            }
        }
        self.push(step);
        Ok(())
    }

    fn push(&mut self, mut step: WorkStep) {
        if let WorkStep::Harvest(harvest) = &mut step {
            if harvest.result.is_none() && harvest.method.records_yield() {
                let crop_id = self.crop.as_ref().map(|c| c.id.as_str()).unwrap_or("");
                let result = shared_result(crop_id, self.custom_id);
                self.results.push(Rc::clone(&result));
                harvest.result = Some(result);
            }
        }
        let key = (step.date(), self.next_seq);
        self.next_seq += 1;
        self.steps.insert(key, step);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn custom_id(&self) -> i64 {
        self.custom_id
    }

    pub fn crop(&self) -> Option<&Arc<Crop>> {
        self.crop.as_ref()
    }

    pub fn irrigate_crop(&self) -> bool {
        self.irrigate_crop
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn steps(&self) -> impl Iterator<Item = &WorkStep> {
        self.steps.values()
    }

    pub fn steps_on(&self, date: NaiveDate) -> impl Iterator<Item = &WorkStep> {
        self.steps
            .range((Included((date, 0)), Included((date, u32::MAX))))
            .map(|(_, step)| step)
    }

    pub fn has_steps_on(&self, date: NaiveDate) -> bool {
        self.steps_on(date).next().is_some()
    }

    /// Applies every step scheduled for exactly `date`, in insertion order.
    pub fn apply(&self, date: NaiveDate, driver: &mut SimulationDriver) -> Result<usize> {
        let mut applied = 0;
        for step in self.steps_on(date) {
            debug!(schedule = %self.name, step = step.type_name(), %date, "Applying work step");
            step.apply(driver)?;
            applied += 1;
        }
        Ok(applied)
    }

    /// Smallest scheduled date strictly after `date`.
    pub fn next_scheduled_date(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.steps
            .range((Excluded((date, u32::MAX)), Unbounded))
            .next()
            .map(|((d, _), _)| *d)
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.steps.keys().next().map(|(d, _)| *d)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.steps.keys().next_back().map(|(d, _)| *d)
    }

    /// The record an automatic harvest writes to: the shared cycle record,
    /// or the first harvest record not yet filled.
    pub fn cycle_result(&self) -> Option<SharedResult> {
        if let Some(shared) = &self.cycle_result {
            return Some(Rc::clone(shared));
        }
        self.results
            .iter()
            .find(|r| r.borrow().date.is_none())
            .map(Rc::clone)
    }

    /// Copies of the records written so far.
    pub fn results(&self) -> Vec<CropResult> {
        self.results
            .iter()
            .map(|r| r.borrow().clone())
            .filter(|r| r.date.is_some())
            .collect()
    }

    fn to_document(&self) -> ScheduleDocument {
        ScheduleDocument {
            custom_id: self.custom_id,
            name: self.name.clone(),
            crop: self.crop.clone(),
            irrigate_crop: self.irrigate_crop,
            shared_result: self.cycle_result.is_some(),
            worksteps: self.steps.values().cloned().collect(),
        }
    }
}

/// Serialized form of a schedule. Without work steps the schedule is derived
/// from the crop's dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScheduleDocument {
    #[serde(default)]
    pub custom_id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub crop: Option<Arc<Crop>>,
    #[serde(default)]
    pub irrigate_crop: bool,
    /// Every harvest and cut writes into one record, as for crop-derived steps.
    #[serde(default)]
    pub shared_result: bool,
    #[serde(default)]
    pub worksteps: Vec<WorkStep>,
}

impl TryFrom<ScheduleDocument> for CultivationSchedule {
    type Error = SimError;

    fn try_from(doc: ScheduleDocument) -> Result<Self> {
        if doc.worksteps.is_empty() {
            let crop = doc.crop.ok_or_else(|| {
                SimError::InvalidSchedule(format!(
                    "schedule '{}' has neither work steps nor a crop",
                    doc.name
                ))
            })?;
            return Ok(Self::from_crop(crop, &doc.name, doc.custom_id)?
                .with_irrigation(doc.irrigate_crop));
        }

        let mut schedule = Self::new(&doc.name, doc.custom_id).with_irrigation(doc.irrigate_crop);
        if let Some(crop) = doc.crop {
            crop.validate()?;
            schedule.crop = Some(crop);
        }

        let mut steps = doc.worksteps;
        // stable: same-date steps keep document order
        steps.sort_by_key(WorkStep::date);

        let shared = if doc.shared_result {
            let crop_id = schedule
                .crop
                .as_ref()
                .map(|c| c.id.clone())
                .or_else(|| {
                    steps.iter().find_map(|s| match s {
                        WorkStep::Seed(seed) => Some(seed.crop.id.clone()),
                        _ => None,
                    })
                })
                .unwrap_or_default();
            let result = shared_result(&crop_id, doc.custom_id);
            schedule.cycle_result = Some(Rc::clone(&result));
            schedule.results.push(Rc::clone(&result));
            Some(result)
        } else {
            None
        };

        let mut seeded = false;
        for mut step in steps {
            if let Some(shared) = &shared {
                match &mut step {
                    WorkStep::Harvest(h) if h.method.records_yield() => {
                        h.result = Some(Rc::clone(shared));
                    }
                    WorkStep::Cutting(c) => c.result = Some(Rc::clone(shared)),
                    _ => {}
                }
            }
            match &step {
                WorkStep::Seed(_) => seeded = true,
                WorkStep::Harvest(_) | WorkStep::Cutting(_) if !seeded => {
                    return Err(SimError::InvalidSchedule(format!(
                        "schedule '{}': {} on {} comes before any seed",
                        doc.name,
                        step.type_name(),
                        step.date()
                    )));
                }
                _ => {}
            }
            schedule.add_step(step)?;
        }
        Ok(schedule)
    }
}

impl Serialize for CultivationSchedule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

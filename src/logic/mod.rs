pub mod bucket;
pub mod driver;
pub mod forcing;
pub mod processes;
pub mod rules;
pub mod run;
pub mod schedule;
pub mod workstep;

pub use bucket::BucketModel;
pub use driver::SimulationDriver;
pub use rules::PolicyEngine;
pub use run::run_simulation;
pub use schedule::{CultivationSchedule, ScheduleDocument};
pub use workstep::WorkStep;

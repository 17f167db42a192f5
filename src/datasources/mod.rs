pub mod climate_file;
pub mod corrections;
pub mod groundwater;

pub use climate_file::{load_climate, parse_climate};
pub use corrections::{load_precip_correction, parse_precip_correction};
pub use groundwater::{load_measured_groundwater, parse_measured_groundwater};

use crate::datasources::{load_measured_groundwater, load_precip_correction};
use crate::error::{Result, SimError};
use crate::logic::{CultivationSchedule, ScheduleDocument};
use crate::models::{CentralParameters, Crop, GeneralParameters, SiteParameters, SoilLayerParameters};
use chrono::{Datelike, NaiveDate};
use dialoguer::Input;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub run: RunConfig,
    /// Climate CSV
    pub climate: PathBuf,
    #[serde(default)]
    pub auxiliary: AuxiliaryConfig,
    #[serde(default)]
    pub general: GeneralParameters,
    pub site: SiteParameters,
    #[serde(default)]
    pub rotation: Vec<ScheduleDocument>,
    #[serde(default)]
    pub output: OutputConfig,
    /// Directory relative input paths are resolved against.
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Number of 0.1 m computation layers
    #[serde(default = "default_layers")]
    pub layers: usize,
}

fn default_layers() -> usize {
    20
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuxiliaryConfig {
    pub precip_correction: Option<PathBuf>,
    pub measured_groundwater: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Store results in the SQLite database
    #[serde(default = "default_enabled")]
    pub database: bool,
    pub json: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database: true,
            json: None,
        }
    }
}

fn default_enabled() -> bool {
    true
}

impl Config {
    pub fn load(config_override: Option<PathBuf>) -> Result<Self> {
        let config_path = match config_override {
            Some(p) => p,
            None => Self::find_config_path()?,
        };

        if !config_path.exists() {
            return Err(SimError::Config(format!(
                "Config file not found at {:?}. Run `fieldsim init` to set up.",
                config_path
            )));
        }

        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| SimError::Config(format!("Failed to read config: {}", e)))?;

        let mut config = Self::from_yaml_str(&config_str)?;
        config.base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(config)
    }

    /// Parses and validates a configuration, substituting `${VAR}` first.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let content = Self::substitute_env_vars(content)?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| SimError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.run.end < self.run.start {
            return Err(SimError::Config(format!(
                "run.end ({}) is before run.start ({})",
                self.run.end, self.run.start
            )));
        }
        if self.run.layers == 0 {
            return Err(SimError::Config("run.layers must be at least 1".into()));
        }
        if self.site.soil_profile.is_empty() {
            return Err(SimError::EmptySoilProfile);
        }
        for layer in &self.site.soil_profile {
            layer.validate()?;
        }
        self.general.nmin_fertiliser_partition.validate()?;
        Ok(())
    }

    /// Builds the cultivation schedules in rotation order.
    pub fn rotation(&self) -> Result<Vec<CultivationSchedule>> {
        self.rotation
            .iter()
            .cloned()
            .map(CultivationSchedule::try_from)
            .collect()
    }

    pub fn computation_layers(&self) -> Vec<SoilLayerParameters> {
        self.site.computation_layers(self.run.layers)
    }

    pub fn climate_path(&self) -> PathBuf {
        self.resolve(&self.climate)
    }

    /// Loads the auxiliary tables named in the configuration.
    pub fn central_parameters(&self) -> Result<CentralParameters> {
        let mut central = CentralParameters::default();
        if let Some(path) = &self.auxiliary.precip_correction {
            central.precip_correction = load_precip_correction(&self.resolve(path))?;
        }
        if let Some(path) = &self.auxiliary.measured_groundwater {
            central.measured_groundwater = load_measured_groundwater(&self.resolve(path))?;
        }
        Ok(central)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Search for simulation.yaml in standard locations.
    /// Returns the path of the first found config, or the XDG default path if none found.
    fn find_config_path() -> Result<PathBuf> {
        let local_config = PathBuf::from("config/simulation.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let default_path = Self::default_config_path()?;
        Ok(default_path)
    }

    /// Returns true if a config file can be found in any standard location.
    pub fn exists(config_override: Option<&PathBuf>) -> bool {
        match config_override {
            Some(p) => p.exists(),
            None => Self::find_config_path()
                .map(|p| p.exists())
                .unwrap_or(false),
        }
    }

    /// Default path for writing new config files (~/.config/fieldsim/simulation.yaml).
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SimError::Config("Cannot determine config directory".into()))?
            .join("fieldsim");
        Ok(config_dir.join("simulation.yaml"))
    }

    /// Run interactive setup prompts and write config to disk.
    /// Returns the loaded Config and the path it was written to.
    pub fn setup_interactive(config_override: Option<PathBuf>) -> Result<(Self, PathBuf)> {
        let input_error = |e: dialoguer::Error| SimError::Config(format!("Input error: {}", e));

        println!();
        println!("Let's set up a fieldsim run!");
        println!();

        println!("Run");
        let name: String = Input::new()
            .with_prompt("  Run name")
            .default("baseline".into())
            .interact_text()
            .map_err(input_error)?;
        let first_year: i32 = Input::new()
            .with_prompt("  First year")
            .default(2020)
            .interact_text()
            .map_err(input_error)?;
        let last_year: i32 = Input::new()
            .with_prompt("  Last year")
            .default(first_year)
            .interact_text()
            .map_err(input_error)?;
        let climate: String = Input::new()
            .with_prompt("  Climate CSV")
            .default("climate.csv".into())
            .interact_text()
            .map_err(input_error)?;
        println!();

        println!("Site");
        let latitude: f64 = Input::new()
            .with_prompt("  Latitude")
            .default(52.5)
            .interact_text()
            .map_err(input_error)?;
        println!();

        let start = NaiveDate::from_ymd_opt(first_year, 1, 1)
            .ok_or_else(|| SimError::Config(format!("Invalid first year {}", first_year)))?;
        let end = NaiveDate::from_ymd_opt(last_year, 12, 31)
            .ok_or_else(|| SimError::Config(format!("Invalid last year {}", last_year)))?;

        let mut config = Config {
            run: RunConfig {
                name,
                start,
                end,
                layers: default_layers(),
            },
            climate: PathBuf::from(climate),
            auxiliary: AuxiliaryConfig::default(),
            general: GeneralParameters::default(),
            site: SiteParameters {
                latitude,
                soil_profile: vec![SoilLayerParameters::default()],
                ..SiteParameters::default()
            },
            rotation: Self::starter_rotation(start.year(), end.year()),
            output: OutputConfig::default(),
            base_dir: PathBuf::new(),
        };
        config.validate()?;

        let config_path = match config_override {
            Some(p) => p,
            None => Self::default_config_path()?,
        };
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let yaml = serde_yaml::to_string(&config)
            .map_err(|e| SimError::Config(format!("Failed to serialize config: {}", e)))?;

        let content = format!(
            "# fieldsim run configuration\n# Generated by `fieldsim init`\n# Environment variable substitution (${{VAR}}) is supported.\n\n{}",
            yaml
        );
        std::fs::write(&config_path, content)?;

        println!("Configuration saved to {}", config_path.display());
        println!();

        Ok((config, config_path))
    }

    /// One spring maize crop per simulated year.
    fn starter_rotation(first_year: i32, last_year: i32) -> Vec<ScheduleDocument> {
        (first_year..=last_year)
            .filter_map(|year| {
                let seed = NaiveDate::from_ymd_opt(year, 4, 25)?;
                let harvest = NaiveDate::from_ymd_opt(year, 9, 25)?;
                let crop = Crop::new("SM", "Silage maize")
                    .with_seed_date(seed)
                    .with_harvest_date(harvest);
                Some(ScheduleDocument {
                    custom_id: i64::from(year),
                    name: format!("maize {}", year),
                    crop: Some(Arc::new(crop)),
                    ..ScheduleDocument::default()
                })
            })
            .collect()
    }

    fn substitute_env_vars(content: &str) -> Result<String> {
        let mut result = content.to_string();

        let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
            .map_err(|e| SimError::Config(format!("Invalid substitution pattern: {}", e)))?;

        for cap in re.captures_iter(content) {
            let var_name = &cap[1];
            let placeholder = &cap[0];
            if let Ok(value) = std::env::var(var_name) {
                result = result.replace(placeholder, &value);
            }
        }

        Ok(result)
    }

    pub fn data_dir(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        if let Some(dir) = data_dir_override {
            std::fs::create_dir_all(dir)?;
            return Ok(dir.clone());
        }

        if let Ok(dir) = std::env::var("FIELDSIM_DATA_DIR") {
            let p = PathBuf::from(dir);
            std::fs::create_dir_all(&p)?;
            return Ok(p);
        }

        let data_dir = dirs::data_dir()
            .ok_or_else(|| SimError::Config("Cannot determine data directory".into()))?
            .join("fieldsim");

        std::fs::create_dir_all(&data_dir)?;
        Ok(data_dir)
    }

    pub fn db_path(data_dir_override: Option<&PathBuf>) -> Result<PathBuf> {
        Ok(Self::data_dir(data_dir_override)?.join("fieldsim.db"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
run:
  name: ${FIELDSIM_TEST_RUN_NAME}
  start: 2020-01-01
  end: 2020-12-31
climate: data/climate.csv
auxiliary:
  precip_correction: /abs/correction.txt
general:
  use_automatic_irrigation: true
site:
  latitude: 52.5
  soil_profile:
    - thickness: 0.3
      sand: 0.4
    - clay: 0.2
rotation:
  - name: maize
    crop:
      id: SM
      name: Silage maize
      seed_date: 2020-04-20
      harvest_date: 2020-09-20
  - name: wheat
    custom_id: 2
    worksteps:
      - type: Seed
        date: 2020-10-05
        crop:
          id: WW
          name: Winter wheat
      - type: MineralFertiliserApplication
        date: 2020-11-01
        partition:
          id: AN
          name: Ammonium nitrate
          carbamid: 0.0
          no3: 0.5
          nh4: 0.5
        amount: 40.0
"#;

    #[test]
    fn sample_parses_with_env_substitution() {
        std::env::set_var("FIELDSIM_TEST_RUN_NAME", "baseline");
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.run.name, "baseline");
        assert_eq!(config.run.layers, 20);
        assert!(config.general.use_automatic_irrigation);
        assert!(config.output.database);

        let layers = config.computation_layers();
        assert_eq!(layers.len(), 20);
        assert_eq!(layers[0].sand, 0.4);
        assert_eq!(layers[3].clay, 0.2);

        let rotation = config.rotation().unwrap();
        assert_eq!(rotation.len(), 2);
        assert_eq!(rotation[0].len(), 2);
        assert_eq!(rotation[1].custom_id(), 2);
        assert_eq!(rotation[1].len(), 2);
    }

    #[test]
    fn paths_resolve_against_config_dir() {
        let mut config = Config::from_yaml_str(SAMPLE).unwrap();
        config.base_dir = PathBuf::from("/runs/demo");
        assert_eq!(config.climate_path(), PathBuf::from("/runs/demo/data/climate.csv"));
        assert_eq!(
            config.resolve(Path::new("/abs/correction.txt")),
            PathBuf::from("/abs/correction.txt")
        );
    }

    #[test]
    fn inverted_period_is_rejected() {
        let yaml = SAMPLE.replace("end: 2020-12-31", "end: 2019-12-31");
        assert!(matches!(Config::from_yaml_str(&yaml), Err(SimError::Config(_))));
    }

    #[test]
    fn empty_profile_is_rejected() {
        let yaml = r#"
run: { name: x, start: 2020-01-01, end: 2020-12-31 }
climate: c.csv
site: { soil_profile: [] }
"#;
        assert!(matches!(Config::from_yaml_str(yaml), Err(SimError::EmptySoilProfile)));
    }

    #[test]
    fn starter_rotation_has_one_crop_per_year() {
        let rotation = Config::starter_rotation(2020, 2022);
        assert_eq!(rotation.len(), 3);
        assert_eq!(rotation[2].custom_id, 2022);
    }
}

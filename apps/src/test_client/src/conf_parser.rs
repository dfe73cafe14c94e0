use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config_definition::ScenarioConfig;
use crate::errors::ScenarioError;

fn validate_path(config_file_path: &Path) -> Result<(), ScenarioError> {
    if !config_file_path.exists() {
        return Err(ScenarioError::InvalidPath(config_file_path.to_path_buf()));
    }
    Ok(())
}

pub fn get_conf(config_file_path: &Path) -> Result<ScenarioConfig, ScenarioError> {
    validate_path(config_file_path)?;
    let file = File::open(config_file_path)?;
    let reader = BufReader::new(file);
    let scenario_config: ScenarioConfig = serde_json::from_reader(reader)?;
    scenario_config.validate()?;
    Ok(scenario_config)
}

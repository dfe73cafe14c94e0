pub mod conf_parser;
pub mod config_definition;
pub mod consumer;
pub mod errors;
pub mod producer;
pub mod scenario;

pub use errors::ScenarioError;
pub use scenario::{run_scenario, ScenarioReport};

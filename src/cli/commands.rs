//! CLI command implementations
//!
//! Commands load the engine configuration and the plan, build the execution
//! tree and hand it to the query driver. Output is a single JSON object.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::engine::{QueryContext, QueryDriver};
use crate::observability::{EngineMetrics, Event, Logger, Severity};
use crate::plan::{build, Plan};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Main entry point for CLI
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Run {
            plan,
            config,
            count,
            verbose,
        } => {
            if !verbose {
                Logger::set_min_severity(Severity::Warn);
            }
            respond(execute(&plan, config.as_deref(), count))
        }
        Command::Validate { plan, config } => {
            Logger::set_min_severity(Severity::Warn);
            respond(validate(&plan, config.as_deref()))
        }
    }
}

/// Print the outcome as a JSON envelope; failures are also returned
fn respond(outcome: CliResult<Value>) -> CliResult<()> {
    match outcome {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Load the engine configuration, or the defaults when no file is given
pub fn load_config(path: Option<&Path>) -> CliResult<EngineConfig> {
    let config = match path {
        Some(path) => EngineConfig::load(path).map_err(|e| CliError::config_error(e.to_string()))?,
        None => EngineConfig::default(),
    };
    Logger::info(
        Event::ConfigLoaded,
        &[
            ("batch_size", &config.batch_size.to_string()),
            ("profile", config.profile.as_str()),
        ],
    );
    Ok(config)
}

fn load_plan(path: &Path) -> CliResult<Plan> {
    Plan::load(path).map_err(|e| CliError::plan_error(e.to_string()))
}

/// Execute a plan and return rows (or their count) with statistics
pub fn execute(plan_path: &Path, config_path: Option<&Path>, count: bool) -> CliResult<Value> {
    let config = load_config(config_path)?;
    let plan = load_plan(plan_path)?;

    let metrics = Arc::new(EngineMetrics::new());
    let context = QueryContext::from_config(&config, Arc::clone(&metrics));
    let built = build(&plan, context.clone())?;
    let mut driver = QueryDriver::new(built.tree.root()?, config.batch_size);

    let mut data = if count {
        json!({ "count": driver.count()? })
    } else {
        let blocks = driver.drain()?;
        let rows: Vec<Value> = blocks
            .iter()
            .flat_map(|block| {
                (0..block.size())
                    .map(move |row| block.get(row, built.return_register).cloned().unwrap_or(Value::Null))
            })
            .collect();
        json!({ "rows": rows })
    };

    data["stats"] = serde_json::to_value(context.stats())?;
    data["metrics"] = serde_json::to_value(metrics.snapshot())?;
    data["pool"] = serde_json::to_value(context.pool().stats())?;
    Ok(data)
}

/// Check configuration and plan, build the tree, and describe it
pub fn validate(plan_path: &Path, config_path: Option<&Path>) -> CliResult<Value> {
    let config = load_config(config_path)?;
    let plan = load_plan(plan_path)?;

    let context = QueryContext::from_config(&config, Arc::new(EngineMetrics::new()));
    let built = build(&plan, context)?;

    Ok(json!({
        "valid": true,
        "nodes": built.tree.len(),
        "variables": built.variables,
        "return_register": built.return_register,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::errors::CliErrorCode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn file(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    const PLAN: &str = r#"{
        "source": {"var": "d", "values": [5, 0, 3, 0, 1]},
        "stages": [{"filter": {"var": "d"}}, {"sort": [{"var": "d"}]}],
        "return": "d"
    }"#;

    #[test]
    fn test_execute_rows_and_stats() {
        let plan = file(PLAN);
        let config = file(r#"{"batch_size": 2, "profile": "blocks"}"#);

        let data = execute(plan.path(), Some(config.path()), false).unwrap();
        assert_eq!(data["rows"], json!([1, 3, 5]));
        assert_eq!(data["stats"]["filtered"], 2);
        assert_eq!(data["stats"]["scanned"], 5);
        assert!(data["stats"]["nodes"].as_object().unwrap().contains_key("4"));
        assert_eq!(data["pool"]["outstanding"], 0);
    }

    #[test]
    fn test_execute_count() {
        let plan = file(PLAN);
        let data = execute(plan.path(), None, true).unwrap();
        assert_eq!(data["count"], 3);
        assert_eq!(data["metrics"]["rows_skipped"], 3);
    }

    #[test]
    fn test_bad_inputs() {
        let plan = file(PLAN);
        let config = file(r#"{"batch_size": 0}"#);
        let err = execute(plan.path(), Some(config.path()), false).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);

        let plan = file(r#"{"source": {"var": "d"}, "return": "nope"}"#);
        let err = validate(plan.path(), None).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::PlanError);

        let err = execute(Path::new("/nonexistent/plan.json"), None, false).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::PlanError);
    }

    #[test]
    fn test_validate_describes_tree() {
        let plan = file(PLAN);
        let data = validate(plan.path(), None).unwrap();
        assert_eq!(data["nodes"], 4);
        assert_eq!(data["variables"], json!(["d"]));
    }
}

//! `task-engine` — runs one task through the execution core from the
//! command line, against the crate's built-in mock provider and tool
//! registry.

use std::path::PathBuf;

use task_engine::config::TaskEngineConfig;
use task_engine::error::EngineError;
use task_engine::{run, RunRequest};
use task_types::BudgetPreset;

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("task-engine error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), EngineError> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut command = "run".to_string();
    if let Some(first) = args.first().cloned() {
        args.remove(0);
        if first == "run" || first == "--help" || first == "-h" {
            command = first;
        } else if first.starts_with('-') {
            args.insert(0, first);
        } else {
            return Err(EngineError::Config(format!("unknown subcommand: {first}")));
        }
    }

    if command == "--help" || command == "-h" {
        print_usage();
        return Ok(());
    }

    run_task(args).await
}

async fn run_task(mut remaining: Vec<String>) -> Result<(), EngineError> {
    let mut config_path: Option<PathBuf> = None;
    let mut task_description: Option<String> = None;
    let mut budget_preset: Option<BudgetPreset> = None;

    while let Some(flag) = remaining.first().cloned() {
        remaining.remove(0);
        match flag.as_str() {
            "--config" => config_path = Some(PathBuf::from(take_arg("--config", &mut remaining)?)),
            "--task" => task_description = Some(take_arg("--task", &mut remaining)?),
            "--budget" => {
                let raw = take_arg("--budget", &mut remaining)?;
                budget_preset = Some(parse_budget_preset(&raw)?);
            }
            "--state-dir" => {
                // Accepted for CLI parity; there's no state backend to point it at yet.
                let _ = take_arg("--state-dir", &mut remaining)?;
            }
            other => return Err(EngineError::Config(format!("unknown flag: {other}"))),
        }
    }

    let config = match config_path {
        Some(path) => TaskEngineConfig::from_path(&path)?,
        None => {
            let default_path = PathBuf::from("task-engine.json");
            if default_path.exists() {
                TaskEngineConfig::from_path(&default_path)?
            } else {
                TaskEngineConfig::default()
            }
        }
    };

    init_tracing(&config.log_filter);

    let task_description = task_description
        .ok_or_else(|| EngineError::Config("missing required flag: --task".to_string()))?;
    let request = RunRequest { task_id: "cli-task".to_string(), task_description, budget_preset };

    let now_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let result = run(&config, request, now_ms).await?;
    println!("{}", serde_json::to_string_pretty(&result).expect("TaskResult always serializes"));
    Ok(())
}

fn parse_budget_preset(raw: &str) -> Result<BudgetPreset, EngineError> {
    match raw {
        "minimal" => Ok(BudgetPreset::Minimal),
        "low" => Ok(BudgetPreset::Low),
        "medium" => Ok(BudgetPreset::Medium),
        "high" => Ok(BudgetPreset::High),
        "maximum" => Ok(BudgetPreset::Maximum),
        other => Err(EngineError::Config(format!("unknown budget preset: {other}"))),
    }
}

fn init_tracing(log_filter: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn take_arg(flag: &str, remaining: &mut Vec<String>) -> Result<String, EngineError> {
    if remaining.is_empty() {
        return Err(EngineError::Config(format!("missing value for {flag}")));
    }
    Ok(remaining.remove(0))
}

fn print_usage() {
    println!(
        "task-engine run --task TEXT [--config task-engine.json] [--budget PRESET] [--state-dir PATH]\n\
task-engine --help"
    );
}

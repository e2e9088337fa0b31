//! qcflow CLI - runs QC workflow stages against a summary store.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use qcflow_core::{CheckInput, CheckResult, RunKey, StatusCode, Time};
use qcflow_quality::{
    Aggregator, CheckExecutor, Pipeline, QcConfig, RunInitiator, StartRequest, StoreBackend,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "qcflow")]
#[command(about = "QC workflow aggregation", long_about = None)]
struct Cli {
    /// Config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store backend: json, memory or sqlite
    #[arg(long, global = true)]
    store: Option<StoreBackend>,

    /// Store directory or database file
    #[arg(long, global = true)]
    store_path: Option<PathBuf>,

    /// Read stage input from this file instead of stdin
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a run record from {"GroupID", "StreamID"}
    Start,
    /// Run one check against the record produced by `start`
    Check {
        /// Check name
        name: String,
    },
    /// Aggregate a JSON array of check results
    Aggregate,
    /// Publish an aggregated run record
    Publish,
    /// Run the whole workflow locally
    Run {
        /// Group ID
        #[arg(long)]
        group: String,
        /// Stream ID
        #[arg(long)]
        stream: String,
    },
    /// Show a stored run record
    Show {
        /// Group ID
        #[arg(long)]
        group: String,
        /// Start time (RFC 3339)
        #[arg(long)]
        start_time: Time,
    },
    /// List configured checks
    Checks,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    execute(cli, &mut std::io::stdout()).await
}

/// Run one command. Stage output goes to `out` and nowhere else.
async fn execute(cli: Cli, out: &mut dyn Write) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => QcConfig::load(path).await?,
        None => QcConfig::default(),
    };
    if let Some(backend) = cli.store {
        config.store.backend = backend;
    }
    if let Some(path) = &cli.store_path {
        config.store.path = path.clone();
    }
    debug!(backend = ?config.store.backend, path = %config.store.path.display(), "Using store");

    match cli.command {
        Commands::Start => {
            let request: StartRequest = read_input(cli.input.as_ref())?;
            let store = config.store.open().await?;
            let record = RunInitiator::new(store).start(&request).await?;
            emit(out, &record)?;
            exit_on_failure(&[record.status_code])
        }
        Commands::Check { name } => {
            let input: CheckInput = read_input(cli.input.as_ref())?;
            let registry = config.build_registry()?;
            let check = registry
                .get(&name)
                .ok_or_else(|| anyhow::anyhow!("Unknown check: {}", name))?;
            let store = config.store.open().await?;
            let result = CheckExecutor::for_check(check, store).execute(&input).await?;
            emit(out, &result)?;
            exit_on_failure(&[result.status_code])
        }
        Commands::Aggregate => {
            let results: Vec<CheckResult> = read_input(cli.input.as_ref())?;
            let registry = Arc::new(config.build_registry()?);
            let store = config.store.open().await?;
            let aggregation = Aggregator::new(registry, store).aggregate(&results).await?;
            emit(out, &aggregation.record)?;
            exit_on_failure(&[aggregation.record.status_code])
        }
        Commands::Publish => {
            let payload: Value = read_input(cli.input.as_ref())?;
            let status = config.build_publisher().publish_json(&payload).await;
            emit(out, &serde_json::json!({ "StatusCode": status }))?;
            exit_on_failure(&[Some(status)])
        }
        Commands::Run { group, stream } => {
            let registry = Arc::new(config.build_registry()?);
            let store = config.store.open().await?;
            let pipeline = Pipeline::new(registry, store, config.build_publisher());
            let outcome = pipeline.run(&StartRequest::new(group, stream)).await?;
            let record = &outcome.aggregation.record;
            emit(
                out,
                &serde_json::json!({
                    "Run": record,
                    "Store": outcome.aggregation.observation,
                    "PublishStatus": outcome.publish_status,
                }),
            )?;
            exit_on_failure(&[record.status_code, Some(outcome.publish_status)])
        }
        Commands::Show { group, start_time } => {
            let store = config.store.open().await?;
            let key = RunKey::new(group, start_time);
            match store.fetch(&key).await? {
                Some(record) => emit(out, &record),
                None => {
                    emit(out, &serde_json::json!({ "StatusCode": StatusCode::NOT_FOUND }))?;
                    anyhow::bail!("Run not found: {}", key)
                }
            }
        }
        Commands::Checks => {
            let registry = config.build_registry()?;
            writeln!(out, "Checks ({})", registry.len())?;
            for check in registry.list() {
                writeln!(out, "  {} -> {}", check.spec.name, check.spec.attribute)?;
            }
            Ok(())
        }
    }
}

fn read_input<T: DeserializeOwned>(path: Option<&PathBuf>) -> Result<T> {
    let content = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };
    serde_json::from_str(&content).context("Invalid stage input")
}

fn emit<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Fail when any stage status is not a success.
fn exit_on_failure(statuses: &[Option<StatusCode>]) -> Result<()> {
    match statuses.iter().flatten().find(|s| !s.is_success()) {
        Some(status) => anyhow::bail!("Stage finished with status {}", status),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("qcflow").chain(args.iter().copied())).unwrap()
    }

    fn input_file(dir: &tempfile::TempDir, json: &str) -> String {
        let path = dir.path().join("input.json");
        std::fs::write(&path, json).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[tokio::test]
    async fn test_publish_stdout_is_one_json_object() {
        let dir = tempfile::tempdir().unwrap();
        let input = input_file(
            &dir,
            r#"{"GroupID":"G1","StreamID":"S1","TotalPass":"pass","ProcessName":"x"}"#,
        );
        let mut out = Vec::new();

        execute(cli(&["--input", &input, "publish"]), &mut out).await.unwrap();

        let emitted: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(emitted, serde_json::json!({ "StatusCode": 200 }));
    }

    #[tokio::test]
    async fn test_run_stdout_is_one_json_object() {
        let mut out = Vec::new();

        execute(cli(&["--store", "memory", "run", "--group", "G1", "--stream", "S1"]), &mut out)
            .await
            .unwrap();

        let emitted: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(emitted["Run"]["TotalPass"], "pass");
        assert_eq!(emitted["PublishStatus"], 200);
    }

    #[tokio::test]
    async fn test_show_missing_run_reports_not_found() {
        let mut out = Vec::new();
        let args = [
            "--store",
            "memory",
            "show",
            "--group",
            "G1",
            "--start-time",
            "2024-03-01T12:00:00Z",
        ];

        assert!(execute(cli(&args), &mut out).await.is_err());
        let emitted: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(emitted, serde_json::json!({ "StatusCode": 404 }));
    }

    #[test]
    fn test_any_failed_status_fails_command() {
        assert!(exit_on_failure(&[Some(StatusCode::OK), None]).is_ok());
        assert!(exit_on_failure(&[Some(StatusCode::SERVICE_UNAVAILABLE), Some(StatusCode::OK)])
            .is_err());
        assert!(exit_on_failure(&[Some(StatusCode::OK), Some(StatusCode::BAD_GATEWAY)]).is_err());
    }
}

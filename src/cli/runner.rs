//! CLI runner - executes commands

use crate::auth::AuthProvider;
use crate::cli::commands::{parse_resources, Cli, Commands, OutputFormat};
use crate::engine::{Pipeline, RunConfig, RunContext, RunSummary};
use crate::http::HttpClient;
use crate::loader::{load_pipeline, Source};
use crate::pipelines::list_builtin_info;
use crate::sink::{DuckDbSink, MemorySink, Sink};
use crate::state::StateManager;
use anyhow::{bail, Context};
use serde_json::{json, Value};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command. A run with failed resources exits with 1.
    pub async fn run(&self) -> anyhow::Result<ExitCode> {
        match &self.cli.command {
            Commands::Run {
                resources,
                workers,
                destination,
                dataset,
                dry_run,
            } => {
                self.execute(
                    parse_resources(resources.as_deref()),
                    *workers,
                    destination.clone(),
                    dataset.as_deref(),
                    *dry_run,
                )
                .await
            }
            Commands::Plan { resources } => self.plan(parse_resources(resources.as_deref())),
            Commands::Validate => self.validate(),
            Commands::List => self.list(),
            Commands::State { reset } => self.state(reset.as_deref()).await,
        }
    }

    /// Secrets from `--config-json` or `--config`
    fn load_secrets(&self) -> anyhow::Result<Option<Value>> {
        if let Some(inline) = &self.cli.config_json {
            let value = serde_json::from_str(inline).context("Invalid config JSON")?;
            return Ok(Some(value));
        }
        if let Some(path) = &self.cli.config {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let value = serde_json::from_str(&content).context("Invalid config JSON")?;
            return Ok(Some(value));
        }
        Ok(None)
    }

    /// Load the pipeline. `require_secrets` renders templates even without a
    /// config, so an undefined variable fails instead of reaching the API.
    fn load_source(&self, require_secrets: bool) -> anyhow::Result<Source> {
        let Some(pipeline) = &self.cli.pipeline else {
            bail!("Pipeline not specified (use -p with a built-in name or a YAML file)");
        };
        let secrets = match self.load_secrets()? {
            Some(secrets) => Some(secrets),
            None if require_secrets => Some(json!({})),
            None => None,
        };
        Ok(load_pipeline(pipeline, secrets.as_ref())?)
    }

    fn load_state(&self) -> anyhow::Result<StateManager> {
        Ok(match &self.cli.state {
            Some(path) => StateManager::from_file(path)?,
            None => StateManager::in_memory(),
        })
    }

    /// Run the pipeline
    async fn execute(
        &self,
        resources: Option<Vec<String>>,
        workers: usize,
        destination: Option<PathBuf>,
        dataset: Option<&str>,
        dry_run: bool,
    ) -> anyhow::Result<ExitCode> {
        let source = self.load_source(true)?;
        let dataset = dataset.unwrap_or(&source.name).to_string();

        let sink: Arc<dyn Sink> = if dry_run {
            Arc::new(MemorySink::new())
        } else {
            let path = destination
                .unwrap_or_else(|| PathBuf::from(format!("{}.duckdb", source.name)));
            info!(path = %path.display(), dataset = %dataset, "Opening destination");
            Arc::new(DuckDbSink::open(&path, &dataset)?)
        };

        // Token requests share the API client's connection pool
        let client = HttpClient::with_config(source.client.http_config())?;
        let auth = Arc::new(AuthProvider::with_transport(
            source.client.auth.clone(),
            client.transport(),
        ));
        let state = self.load_state()?;

        let mut config = RunConfig::default().with_max_workers(workers);
        if let Some(resources) = resources {
            config = config.with_resources(resources);
        }
        let pipeline = Pipeline::with_client(source, client, sink).with_config(config);

        let cancel = CancellationToken::new();
        let on_signal = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling run");
                on_signal.cancel();
            }
        });

        let ctx = RunContext::new(auth, state).with_cancel(cancel);
        let summary = pipeline.run(&ctx).await?;
        self.print_summary(&summary)?;

        Ok(if summary.has_failures() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }

    fn print_summary(&self, summary: &RunSummary) -> anyhow::Result<()> {
        match self.cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(summary)?),
            OutputFormat::Pretty => print!("{summary}"),
        }
        Ok(())
    }

    /// Print the fetch order
    fn plan(&self, resources: Option<Vec<String>>) -> anyhow::Result<ExitCode> {
        let source = self.load_source(false)?;
        let mut config = RunConfig::default();
        if let Some(resources) = resources {
            config = config.with_resources(resources);
        }
        let pipeline = Pipeline::new(source, Arc::new(MemorySink::new()))?.with_config(config);
        let plan = pipeline.plan()?;
        let graph = &pipeline.source().graph;

        match self.cli.format {
            OutputFormat::Json => {
                let steps: Vec<Value> = plan
                    .iter()
                    .map(|(name, load)| {
                        json!({
                            "resource": name,
                            "depends_on": graph.dependencies(name),
                            "loaded": load,
                        })
                    })
                    .collect();
                println!("{}", json!({"pipeline": pipeline.source().name, "plan": steps}));
            }
            OutputFormat::Pretty => {
                println!("Pipeline '{}'", pipeline.source().name);
                for (i, (name, load)) in plan.iter().enumerate() {
                    let deps = graph.dependencies(name);
                    let mut line = format!("  {}. {name}", i + 1);
                    if !deps.is_empty() {
                        line.push_str(&format!(" <- {}", deps.join(", ")));
                    }
                    if !load {
                        line.push_str(" (not loaded)");
                    }
                    println!("{line}");
                }
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    /// Validate the pipeline definition
    fn validate(&self) -> anyhow::Result<ExitCode> {
        let source = self.load_source(false)?;
        match self.cli.format {
            OutputFormat::Json => println!(
                "{}",
                json!({
                    "status": "VALID",
                    "pipeline": source.name,
                    "resources": source.resources.len(),
                })
            ),
            OutputFormat::Pretty => println!(
                "Pipeline '{}' is valid ({} resources)",
                source.name,
                source.resources.len()
            ),
        }
        Ok(ExitCode::SUCCESS)
    }

    /// List built-in pipelines
    fn list(&self) -> anyhow::Result<ExitCode> {
        let infos = list_builtin_info();
        match self.cli.format {
            OutputFormat::Json => {
                let pipelines: Vec<Value> = infos
                    .iter()
                    .map(|info| {
                        json!({
                            "name": info.name,
                            "description": info.description,
                            "config_keys": info.config_keys,
                        })
                    })
                    .collect();
                println!("{}", json!({"pipelines": pipelines}));
            }
            OutputFormat::Pretty => {
                for info in &infos {
                    println!("{:<10} {}", info.name, info.description);
                }
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    /// Print (or reset) stored cursors
    async fn state(&self, reset: Option<&str>) -> anyhow::Result<ExitCode> {
        if self.cli.state.is_none() {
            bail!("State file not specified (use --state)");
        }
        let state = self.load_state()?;

        if let Some(resource) = reset {
            state.clear_resource(resource).await?;
            info!(resource, "Cursor reset");
        }

        match self.cli.format {
            OutputFormat::Json => println!("{}", serde_json::to_string(&state.snapshot().await)?),
            OutputFormat::Pretty => println!("{}", state.to_json_pretty().await?),
        }
        Ok(ExitCode::SUCCESS)
    }
}

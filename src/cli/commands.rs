//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Declarative REST-to-DuckDB loader
#[derive(Parser, Debug)]
#[command(name = "restload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Pipeline definition: a built-in name or a YAML file
    #[arg(short, long, global = true)]
    pub pipeline: Option<String>,

    /// Secrets file (JSON object substituted into `{{ config.x }}`)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Inline secrets JSON
    #[arg(long, global = true)]
    pub config_json: Option<String>,

    /// Cursor state file (JSON)
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the pipeline
    Run {
        /// Resources to load (comma-separated, empty = all); upstreams are fetched too
        #[arg(long)]
        resources: Option<String>,

        /// Maximum resources fetched concurrently
        #[arg(short, long, default_value = "4")]
        workers: usize,

        /// DuckDB database file (default: <pipeline>.duckdb)
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Schema holding the tables (default: pipeline name)
        #[arg(long)]
        dataset: Option<String>,

        /// Keep records in memory instead of writing a database
        #[arg(long, conflicts_with = "destination")]
        dry_run: bool,
    },

    /// Print the fetch order and dependencies
    Plan {
        /// Resources to load (comma-separated, empty = all)
        #[arg(long)]
        resources: Option<String>,
    },

    /// Validate the pipeline definition
    Validate,

    /// List built-in pipelines
    List,

    /// Print stored cursors
    State {
        /// Forget the cursor of this resource
        #[arg(long)]
        reset: Option<String>,
    },
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Pretty,
}

/// Split a comma-separated resource list
pub fn parse_resources(arg: Option<&str>) -> Option<Vec<String>> {
    let names: Vec<String> = arg?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    (!names.is_empty()).then_some(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let cli = Cli::parse_from([
            "restload",
            "run",
            "--pipeline",
            "pokemon",
            "--resources",
            "berry, berry_details",
            "--workers",
            "2",
            "--dry-run",
        ]);
        assert_eq!(cli.pipeline.as_deref(), Some("pokemon"));
        match cli.command {
            Commands::Run {
                resources,
                workers,
                dry_run,
                destination,
                ..
            } => {
                assert_eq!(
                    parse_resources(resources.as_deref()),
                    Some(vec!["berry".to_string(), "berry_details".to_string()])
                );
                assert_eq!(workers, 2);
                assert!(dry_run);
                assert!(destination.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_dry_run_conflicts_with_destination() {
        let result = Cli::try_parse_from([
            "restload",
            "run",
            "--dry-run",
            "--destination",
            "out.duckdb",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_resources() {
        assert_eq!(parse_resources(None), None);
        assert_eq!(parse_resources(Some(" , ")), None);
        assert_eq!(parse_resources(Some("a")), Some(vec!["a".to_string()]));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["restload", "state", "--state", "s.json", "--format", "json"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.state, Some(PathBuf::from("s.json")));
    }
}

//! Actor Flow CLI
//!
//! Usage:
//!   flow run flow.yaml --var out=/tmp/out.txt
//!   flow run flow.yaml --vars @vars.json --stream-events
//!   flow validate flow.yaml
//!   flow inspect flow.yaml --format json

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use actor_flow::{
    ActorFactory, EngineConfig, Flow, FlowDefinition, StreamingListener, TracingListener,
};

/// Actor Flow - hierarchical actor-flow execution engine
#[derive(Parser, Debug)]
#[command(name = "flow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a flow
    Run {
        /// Path to flow definition (YAML or JSON)
        file: PathBuf,

        /// Initial variable as name=value (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Initial variables as JSON object string or @file.json
        #[arg(long = "vars")]
        vars_json: Option<String>,

        /// Print execution events as NDJSON
        #[arg(short, long)]
        stream_events: bool,

        /// Engine configuration as JSON string or @file.json
        #[arg(short = 'C', long)]
        config: Option<String>,
    },

    /// Set up a flow without executing it
    Validate {
        /// Path to flow definition (YAML or JSON)
        file: PathBuf,

        /// Initial variable as name=value (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,
    },

    /// Show the actor tree of a flow
    Inspect {
        /// Path to flow definition (YAML or JSON)
        file: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (_, 0) => "warn",
        (_, 1) => "info",
        (_, 2) => "debug",
        (_, _) => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            file,
            vars,
            vars_json,
            stream_events,
            config,
        } => {
            let code = run_flow(file, vars, vars_json, stream_events, config)?;
            std::process::exit(code);
        }
        Commands::Validate { file, vars } => validate_flow(file, vars),
        Commands::Inspect { file, format } => inspect_flow(file, format),
    }
}

/// Run a flow, returning the process exit code
fn run_flow(
    file: PathBuf,
    vars: Vec<String>,
    vars_json: Option<String>,
    stream_events: bool,
    config: Option<String>,
) -> Result<i32> {
    let definition = load_definition(&file)?;
    let config = match config {
        Some(config) => serde_json::from_value::<EngineConfig>(parse_json(&config)?)
            .context("Invalid engine configuration")?,
        None => EngineConfig::default(),
    };

    let mut variables = parse_vars_json(vars_json)?;
    variables.extend(parse_vars(&vars)?);

    let mut flow = Flow::from_definition(definition, &ActorFactory::with_defaults())
        .context(format!("Failed to build flow from {:?}", file))?
        .with_config(&config)
        .with_variables(variables)
        .with_listener(Arc::new(TracingListener));

    if stream_events {
        flow.add_listener(Arc::new(StreamingListener::new(|event| {
            match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::warn!(error = %e, "Cannot serialize event"),
            }
        })));
    }

    let stop = flow.stop_handle();
    ctrlc::set_handler(move || {
        eprintln!("Stopping flow...");
        stop.stop();
    })
    .context("Failed to install Ctrl-C handler")?;

    let report = flow.run();
    match report.outcome.error() {
        Some(err) => eprintln!(
            "Flow '{}' failed after {} attempt(s): {}",
            report.flow, report.attempts, err
        ),
        None => tracing::info!(
            flow = %report.flow,
            outcome = %report.outcome,
            duration_ms = report.duration.as_millis() as u64,
            "Flow done"
        ),
    }
    Ok(report.exit_code().code())
}

/// Validate a flow by setting it up
fn validate_flow(file: PathBuf, vars: Vec<String>) -> Result<()> {
    let definition = load_definition(&file)?;
    let mut flow = Flow::from_definition(definition, &ActorFactory::with_defaults())?
        .with_variables(parse_vars(&vars)?);
    flow.validate()?;

    println!("{} is valid ({} actors)", file.display(), flow.tree().paths().len());
    Ok(())
}

/// Print the actor tree
fn inspect_flow(file: PathBuf, format: String) -> Result<()> {
    let definition = load_definition(&file)?;
    let flow = Flow::from_definition(definition, &ActorFactory::with_defaults())?;
    let outline = flow.tree().outline();

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&outline)?),
        "text" => {
            if let Some(description) = flow.definition().and_then(|d| d.description.as_ref()) {
                println!("{}\n", description);
            }
            for line in &outline {
                let name = line.path.rsplit('.').next().unwrap_or(&line.path);
                print!("{}{} [{}]", "  ".repeat(line.depth), name, line.actor_type);
                if line.skip {
                    print!(" (skipped)");
                }
                if let Some(annotation) = &line.annotation {
                    print!(" # {}", annotation);
                }
                println!();
            }
        }
        other => bail!("Unknown format '{}', expected text or json", other),
    }
    Ok(())
}

fn load_definition(file: &PathBuf) -> Result<FlowDefinition> {
    FlowDefinition::from_file(file).context(format!("Failed to load flow from {:?}", file))
}

/// Parse JSON from a string or @file
fn parse_json(input: &str) -> Result<JsonValue> {
    match input.strip_prefix('@') {
        Some(path) => {
            let content = fs::read_to_string(path).context(format!("Failed to read {}", path))?;
            serde_json::from_str(&content).context(format!("Failed to parse JSON file {}", path))
        }
        None => serde_json::from_str(input).context("Failed to parse JSON"),
    }
}

fn parse_vars(vars: &[String]) -> Result<HashMap<String, String>> {
    vars.iter()
        .map(|var| match var.split_once('=') {
            Some((name, value)) => Ok((name.trim().to_string(), value.to_string())),
            None => bail!("Invalid variable '{}', expected NAME=VALUE", var),
        })
        .collect()
}

fn parse_vars_json(input: Option<String>) -> Result<HashMap<String, String>> {
    let Some(input) = input else {
        return Ok(HashMap::new());
    };
    let JsonValue::Object(map) = parse_json(&input)? else {
        bail!("Variables must be a JSON object");
    };
    Ok(map
        .into_iter()
        .map(|(name, value)| {
            let value = match value {
                JsonValue::String(s) => s,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect())
}

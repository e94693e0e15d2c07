mod commands;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use stepsmith_core::Backend;
use stepsmith_forge::{DEFAULT_MAX_REPAIRS, DEFAULT_TIMEOUT};
use stepsmith_synth::Provider;
use tracing_subscriber::EnvFilter;

use commands::generate::GenerateArgs;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Generate step definitions for BDD feature files.
#[derive(Parser)]
#[command(
    name = "stepsmith",
    version,
    about = "Generate behave, godog and cucumber step definitions from feature files"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a feature file and show every step's role, pattern and identifier
    Parse {
        /// Path to the .feature file
        feature: PathBuf,
        /// Target backend (behave, godog or cucumber)
        #[arg(long)]
        backend: Backend,
    },

    /// Synthesize, validate and write a step-definition project
    Generate {
        /// Path to the .feature file
        feature: PathBuf,
        /// Test configuration (YAML, JSON or TOML)
        #[arg(long)]
        config: PathBuf,
        /// Target backend (behave, godog or cucumber)
        #[arg(long)]
        backend: Backend,
        /// Output directory
        #[arg(long, default_value = "generated")]
        out: PathBuf,
        /// Maximum whole-unit repair attempts
        #[arg(long, default_value_t = DEFAULT_MAX_REPAIRS)]
        max_repairs: u32,
        /// Per-stage toolchain timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
        timeout_secs: u64,
        /// Model provider (openai or anthropic)
        #[arg(long, default_value = "openai")]
        provider: Provider,
        /// Model name (defaults to the provider's default model)
        #[arg(long)]
        model: Option<String>,
        /// Base URL of an OpenAI-compatible or Anthropic endpoint
        #[arg(long)]
        base_url: Option<String>,
        /// Fixed delay between oracle calls in milliseconds (0 disables pacing)
        #[arg(long, default_value_t = 1000)]
        pace_ms: u64,
        /// Token-bucket rate in requests per second; overrides --pace-ms
        #[arg(long)]
        rate: Option<f64>,
        /// Serve oracle answers from a recording instead of the network
        #[arg(long, conflicts_with = "dry_run")]
        replay: Option<PathBuf>,
        /// Save every oracle answer to this file for later --replay
        #[arg(long)]
        record: Option<PathBuf>,
        /// Use placeholder bodies for every step; no oracle is contacted
        #[arg(long)]
        dry_run: bool,
        /// Skip toolchain validation; the result is reported as unverified
        #[arg(long)]
        no_validate: bool,
    },

    /// Run the structural checks for a generated project directory
    Validate {
        /// Project directory (the backend directory under the output root)
        project: PathBuf,
        /// Target backend (behave, godog or cucumber)
        #[arg(long)]
        backend: Backend,
        /// Per-stage toolchain timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },

    /// Run a generated project and compare its result record with the
    /// configuration's expected outputs
    Run {
        /// Project directory (the backend directory under the output root)
        project: PathBuf,
        /// Target backend (behave, godog or cucumber)
        #[arg(long)]
        backend: Backend,
        /// Test configuration holding `expected_outputs`
        #[arg(long)]
        config: PathBuf,
        /// Run timeout in seconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.quiet);

    match cli.command {
        Commands::Parse { feature, backend } => {
            commands::parse::cmd_parse(&feature, backend, cli.output, cli.quiet);
        }
        Commands::Generate {
            feature,
            config,
            backend,
            out,
            max_repairs,
            timeout_secs,
            provider,
            model,
            base_url,
            pace_ms,
            rate,
            replay,
            record,
            dry_run,
            no_validate,
        } => {
            let args = GenerateArgs {
                feature,
                config,
                backend,
                out,
                max_repairs,
                timeout_secs,
                provider,
                model,
                base_url,
                pace_ms,
                rate,
                replay,
                record,
                dry_run,
                no_validate,
            };
            commands::generate::cmd_generate(&args, cli.output, cli.quiet);
        }
        Commands::Validate {
            project,
            backend,
            timeout_secs,
        } => {
            commands::validate::cmd_validate(&project, backend, timeout_secs, cli.output, cli.quiet);
        }
        Commands::Run {
            project,
            backend,
            config,
            timeout_secs,
        } => {
            commands::run::cmd_run(&project, backend, &config, timeout_secs, cli.output, cli.quiet);
        }
    }
}

/// Log to stderr. `RUST_LOG` overrides the default level.
fn init_tracing(quiet: bool) {
    let default = if quiet { "stepsmith=warn" } else { "stepsmith=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("{}", msg),
        OutputFormat::Json => eprintln!("{}", error_json(msg)),
    }
}

/// One-line JSON error object; `msg` may hold multi-line diagnostics.
fn error_json(msg: &str) -> String {
    serde_json::json!({ "error": msg }).to_string()
}

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

/// Report `msg` and exit with status 1.
pub(crate) fn fail(msg: &str, output: OutputFormat, quiet: bool) -> ! {
    report_error(msg, output, quiet);
    process::exit(1);
}

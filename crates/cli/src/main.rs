mod commands;
mod config;

use std::path::PathBuf;
use std::process;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use pyx_core::PyxError;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Pyx to Python transpiler.
#[derive(Parser)]
#[command(name = "pyx", version, about = "Pyx to Python transpiler")]
struct Cli {
    /// Output format for status and errors (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transpile a .pyx file to Python
    Transpile {
        /// Path to the .pyx source file
        file: PathBuf,
        /// Output file (default: input path with a .py extension)
        #[arg(short = 'o', long = "out", conflicts_with = "stdout")]
        out: Option<PathBuf>,
        /// Write the result to standard output
        #[arg(long)]
        stdout: bool,
        /// Omit the disclaimer header
        #[arg(long)]
        no_header: bool,
        /// Omit the echo of the original source
        #[arg(long)]
        no_source: bool,
        /// Marker that opens and closes comment blocks (default: ''')
        #[arg(long)]
        comment_style: Option<String>,
        /// Header text, base64-encoded
        #[arg(long)]
        header_b64: Option<String>,
        /// Collapse runs of blank lines to one
        #[arg(long)]
        squeeze_blank: bool,
        /// Path to a pyx.toml configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run the whole pipeline without writing output
    Check {
        /// Path to the .pyx source file
        file: PathBuf,
        /// Path to a pyx.toml configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Transpile {
            file,
            out,
            stdout,
            no_header,
            no_source,
            comment_style,
            header_b64,
            squeeze_blank,
            config: config_path,
        } => {
            let overrides = config::Overrides {
                no_header,
                no_source,
                comment_style,
                header_b64,
                squeeze_blank,
            };
            commands::transpile::cmd_transpile(commands::transpile::TranspileArgs {
                file: &file,
                out: out.as_deref(),
                stdout,
                config: config_path.as_deref(),
                overrides: &overrides,
                output: cli.output,
                quiet: cli.quiet,
            });
        }
        Commands::Check {
            file,
            config: config_path,
        } => {
            commands::check::cmd_check(&file, config_path.as_deref(), cli.output, cli.quiet);
        }
    }
}

/// Logs go to stderr so `--stdout` output stays clean. `-v` flags win over
/// `PYX_LOG`; with neither, only warnings are shown.
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_env("PYX_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Print a transpilation error and exit with status 1.
pub(crate) fn fail(err: &PyxError, output: OutputFormat, quiet: bool) -> ! {
    match output {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&err.to_json_value())
                .unwrap_or_else(|_| format!("{{\"error\": \"{}\"}}", err.message.replace('"', "\\\"")));
            eprintln!("{}", json);
        }
        OutputFormat::Text => {
            if !quiet {
                eprintln!("error: {}", err);
            }
        }
    }
    process::exit(1);
}

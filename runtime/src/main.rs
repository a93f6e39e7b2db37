use std::path::PathBuf;

use anyhow::Result;
use cardharvest::HarvestError;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use cardharvest_runtime::cli::{self, output};
use cardharvest_runtime::cli::session::{BrowserArgs, SinkKind, TuningArgs};
use cardharvest_runtime::{logging, settings};

#[derive(Parser)]
#[command(
    name = "cardharvest",
    about = "Cardharvest: generate Anki flashcards from a chat assistant's answer",
    version,
    after_help = "Run 'cardharvest <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log level when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    /// Configuration file (JSON); see `cardharvest doctor` for the lookup order
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit the flashcard prompt once, wait for the answer, export it
    Run {
        #[command(flatten)]
        browser: BrowserArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        /// Where the flashcards go
        #[arg(long, value_enum, default_value = "browser")]
        sink: SinkKind,
    },
    /// Keep the chat page open and generate on demand
    Interactive {
        #[command(flatten)]
        browser: BrowserArgs,
        #[command(flatten)]
        tuning: TuningArgs,
        /// Where the flashcards go
        #[arg(long, value_enum, default_value = "browser")]
        sink: SinkKind,
    },
    /// Extract flashcards from a saved answer (text or HTML) without a browser
    Parse {
        /// File holding the assistant's answer
        file: PathBuf,
        /// Treat the file as saved page markup
        #[arg(long)]
        html: bool,
        /// Response container selector for --html (default: configured text selector)
        #[arg(long)]
        selector: Option<String>,
        /// Print the import lines instead of writing the file
        #[arg(long)]
        stdout: bool,
        /// Output directory (default: configured directory, else Downloads)
        #[arg(long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },
    /// Print the instruction prompt
    Prompt,
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish)
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Global flags as environment variables so every command can check them.
    if cli.json {
        std::env::set_var(output::JSON_ENV, "1");
    }
    if cli.quiet {
        std::env::set_var(output::QUIET_ENV, "1");
    }
    if cli.no_color {
        std::env::set_var(output::NO_COLOR_ENV, "1");
    }

    logging::init(&cli.log_level, cli.log_json);

    let config_flag = cli.config.as_deref();
    let result = match cli.command {
        None => {
            let _ = Cli::command().print_help();
            Ok(())
        }
        Some(Commands::Run {
            browser,
            tuning,
            sink,
        }) => match settings::load(config_flag, &tuning.overrides()) {
            Ok((config, _)) => cli::run_cmd::run(config, &browser, sink).await,
            Err(e) => Err(e),
        },
        Some(Commands::Interactive {
            browser,
            tuning,
            sink,
        }) => match settings::load(config_flag, &tuning.overrides()) {
            Ok((config, _)) => cli::interactive::run(config, &browser, sink).await,
            Err(e) => Err(e),
        },
        Some(Commands::Parse {
            file,
            html,
            selector,
            stdout,
            out_dir,
        }) => {
            let overrides = settings::Overrides {
                out_dir,
                ..Default::default()
            };
            match settings::load(config_flag, &overrides) {
                Ok((config, _)) => {
                    cli::parse_cmd::run(config, &file, html, selector.as_deref(), stdout).await
                }
                Err(e) => Err(e),
            }
        }
        Some(Commands::Prompt) => cli::prompt_cmd::run().await,
        Some(Commands::Doctor) => cli::doctor::run(config_flag).await,
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "cardharvest", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if output::is_json() {
            let kind = e
                .downcast_ref::<HarvestError>()
                .map(HarvestError::kind)
                .unwrap_or("error");
            output::print_json(&serde_json::json!({
                "error": true,
                "kind": kind,
                "message": format!("{e:#}"),
            }));
        } else if !output::is_quiet() {
            eprintln!("  Error: {e:#}");
        }
        std::process::exit(1);
    }

    result
}

//! Interactive session against a live chat page.
//!
//! `generate` starts a generation in the background and returns to the
//! prompt at once; a second `generate` while one runs is ignored.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cardharvest::{HarvestConfig, Orchestrator, TriggerOutcome, FLASHCARD_PROMPT};
use rustyline::completion::{Completer, Pair};
use rustyline::config::CompletionType;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{
    Cmd, ConditionalEventHandler, Config, Editor, Event, EventContext, EventHandler, Helper,
    KeyEvent, RepeatCount,
};

use crate::cli::output;
use crate::cli::session::{spawn_reporter, BrowserArgs, ChatSession, SinkKind};
use crate::trigger::SpinnerTrigger;

const COMMANDS: &[(&str, &str)] = &[
    ("/generate", "Submit the flashcard prompt and export the answer"),
    ("/status", "Show the current generation status"),
    ("/prompt", "Print the instruction prompt"),
    ("/config", "Show the active configuration"),
    ("/clear", "Clear the screen"),
    ("/help", "Show available commands"),
    ("/exit", "Quit"),
];

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Generate,
    Status,
    Prompt,
    Config,
    Clear,
    Help,
    Exit,
    Empty,
    Unknown(String),
}

/// Parse one line. The leading `/` is optional.
pub fn parse_command(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let input = line.strip_prefix('/').unwrap_or(line);
    let cmd = input.split_whitespace().next().unwrap_or("");
    match cmd {
        "" | "help" | "h" | "?" => ReplCommand::Help,
        "generate" | "gen" | "g" => ReplCommand::Generate,
        "status" | "s" => ReplCommand::Status,
        "prompt" => ReplCommand::Prompt,
        "config" => ReplCommand::Config,
        "clear" | "cls" => ReplCommand::Clear,
        "exit" | "quit" | "q" => ReplCommand::Exit,
        other => ReplCommand::Unknown(other.to_string()),
    }
}

struct HarvestHelper;

impl Completer for HarvestHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &rustyline::Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let input = &line[..pos];
        if input.contains(' ') {
            return Ok((pos, Vec::new()));
        }
        let matches = COMMANDS
            .iter()
            .filter(|(cmd, _)| cmd.starts_with(input) || cmd[1..].starts_with(input))
            .map(|(cmd, desc)| Pair {
                display: format!("{cmd:<12} {desc}"),
                replacement: format!("{cmd} "),
            })
            .collect();
        Ok((0, matches))
    }
}

impl Hinter for HarvestHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &rustyline::Context<'_>) -> Option<String> {
        if pos < line.len() || !line.starts_with('/') || line.contains(' ') {
            return None;
        }
        COMMANDS
            .iter()
            .find(|(cmd, _)| cmd.starts_with(line) && *cmd != line)
            .map(|(cmd, _)| cmd[line.len()..].to_string())
    }
}

impl Highlighter for HarvestHelper {}
impl Validator for HarvestHelper {}
impl Helper for HarvestHelper {}

struct TabCompleteOrAcceptHint;

impl ConditionalEventHandler for TabCompleteOrAcceptHint {
    fn handle(
        &self,
        _evt: &Event,
        _n: RepeatCount,
        _positive: bool,
        ctx: &EventContext<'_>,
    ) -> Option<Cmd> {
        if ctx.has_hint() {
            Some(Cmd::CompleteHint)
        } else {
            Some(Cmd::Complete)
        }
    }
}

pub async fn run(config: HarvestConfig, browser: &BrowserArgs, sink: SinkKind) -> Result<()> {
    let session = ChatSession::open(browser, config.selectors.clone()).await?;
    session
        .wait_ready(Duration::from_secs(browser.ready_timeout))
        .await?;

    // The line editor owns the terminal, so no spinner; alerts still print.
    let trigger = Arc::new(SpinnerTrigger::hidden());
    let (tx, rx) = cardharvest::events::channel();
    let reporter = spawn_reporter(rx, Arc::clone(&trigger));

    let export_sink = session.sink(sink, &config);
    let orchestrator = Arc::new(
        Orchestrator::new(session.host(), export_sink, config)?.with_events(tx),
    );

    eprintln!();
    eprintln!(
        "  \x1b[32m\u{25c9}\x1b[0m \x1b[1mcardharvest v{}\x1b[0m \x1b[90m(connected to {})\x1b[0m",
        env!("CARGO_PKG_VERSION"),
        browser.url
    );
    eprintln!(
        "    Type \x1b[36m/generate\x1b[0m to make flashcards, \x1b[90mTab\x1b[0m to complete, \x1b[90m/exit\x1b[0m to quit."
    );
    eprintln!();

    let rl_config = Config::builder()
        .history_ignore_space(true)
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .build();
    let mut rl: Editor<HarvestHelper, rustyline::history::DefaultHistory> =
        Editor::with_config(rl_config)?;
    rl.set_helper(Some(HarvestHelper));
    rl.bind_sequence(
        KeyEvent::from('\t'),
        EventHandler::Conditional(Box::new(TabCompleteOrAcceptHint)),
    );

    let hist_path = crate::settings::home_dir().join("history");
    if hist_path.exists() {
        let _ = rl.load_history(&hist_path);
    }

    let prompt = " \x1b[36mcards>\x1b[0m ";
    loop {
        // readline blocks; keep the runtime's other workers free for generations.
        let line = tokio::task::block_in_place(|| rl.readline(prompt));
        match line {
            Ok(line) => match parse_command(&line) {
                ReplCommand::Empty => {}
                ReplCommand::Generate => cmd_generate(&orchestrator, &trigger),
                ReplCommand::Status => cmd_status(&orchestrator),
                ReplCommand::Prompt => println!("{FLASHCARD_PROMPT}"),
                ReplCommand::Config => cmd_config(&orchestrator),
                ReplCommand::Clear => eprint!("\x1b[2J\x1b[H"),
                ReplCommand::Help => cmd_help(),
                ReplCommand::Exit => {
                    if orchestrator.is_busy() {
                        eprintln!("  A generation is still running and will be abandoned.");
                    }
                    eprintln!("  \x1b[90m\u{2728}\x1b[0m Goodbye!");
                    break;
                }
                ReplCommand::Unknown(cmd) => {
                    eprintln!("  Unknown command '/{cmd}'. Type /help for commands.");
                }
            },
            Err(ReadlineError::Interrupted) => {
                eprintln!("  \x1b[90m(Ctrl+C)\x1b[0m Type \x1b[1m/exit\x1b[0m to quit.");
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("  Error: {err}");
                break;
            }
        }
    }

    if let Some(parent) = hist_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = rl.save_history(&hist_path);

    reporter.abort();
    session.close().await
}

fn cmd_generate(orchestrator: &Arc<Orchestrator>, trigger: &Arc<SpinnerTrigger>) {
    if orchestrator.is_busy() {
        eprintln!("  Generation already running; ignored.");
        return;
    }
    let orchestrator = Arc::clone(orchestrator);
    let trigger = Arc::clone(trigger);
    tokio::spawn(async move {
        if let TriggerOutcome::Ignored = orchestrator.trigger(trigger.as_ref()).await {
            trigger.println("  Generation already running; ignored.");
        }
    });
}

fn cmd_status(orchestrator: &Orchestrator) {
    let status = orchestrator.status();
    if output::is_json() {
        output::print_json(&serde_json::json!({
            "status": status,
            "busy": orchestrator.is_busy(),
        }));
    } else {
        eprintln!("  Status: {status}");
    }
}

fn cmd_config(orchestrator: &Orchestrator) {
    match serde_json::to_value(orchestrator.config()) {
        Ok(value) => output::print_json(&value),
        Err(e) => eprintln!("  Could not render config: {e}"),
    }
}

fn cmd_help() {
    eprintln!();
    eprintln!("  Commands:");
    eprintln!();
    for (cmd, desc) in COMMANDS {
        eprintln!("    {cmd:<12} {desc}");
    }
    eprintln!();
}

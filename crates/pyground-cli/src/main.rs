//! `pyground`: the run harness in a terminal.
//!
//! ```text
//! pyground run snippet.py          # run once; exit 0 ok, 1 failed, 2 terminated
//! pyground edit [snippet.py]       # type code, then :run / :clear / :reset / :show / :quit
//! ```

use std::{
    cell::RefCell,
    fs,
    io::IsTerminal,
    path::{Path, PathBuf},
    process::ExitCode,
    rc::Rc,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pyground::{
    Editor, EngineHandle, Playground, PlaygroundConfig, RunOutcome, TextEditor, TokioFrames,
};
use pyground_cpython::CpythonLoader;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

mod terminal;

use terminal::TerminalDisplay;

#[derive(Parser, Debug)]
#[command(name = "pyground", author, version, about = "Run Python snippets under the playground harness")]
struct Cli {
    /// TOML file with playground settings
    #[arg(long, global = true, env = "PYGROUND_CONFIG")]
    config: Option<PathBuf>,
    /// Output ceiling in characters (overrides the config file)
    #[arg(long, global = true)]
    max_output_chars: Option<usize>,
    /// Package to import when the interpreter loads; repeatable
    #[arg(long = "preload", global = true)]
    preload: Vec<String>,
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a file once and exit with its status
    Run {
        /// Python file to run
        file: PathBuf,
    },
    /// Edit and run a snippet interactively
    Edit {
        /// File whose content seeds the editor; the starter snippet otherwise
        file: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)))
        .with_writer(std::io::stderr)
        .init();

    let local = tokio::task::LocalSet::new();
    match local.run_until(dispatch(cli)).await {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<u8> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Run { file } => run_file(&config, &file).await,
        Command::Edit { file } => edit(&config, file.as_deref()).await,
    }
}

/// Reads `--config` (if given), applies flag overrides and validates the result.
fn load_config(cli: &Cli) -> Result<PlaygroundConfig> {
    let mut config = match &cli.config {
        Some(path) => PlaygroundConfig::load(path)?,
        None => PlaygroundConfig::default(),
    };
    if let Some(limit) = cli.max_output_chars {
        config = config.max_output_chars(limit);
    }
    for package in &cli.preload {
        config = config.preload_package(package.clone());
    }
    config.validate()?;
    Ok(config)
}

/// Exit status for a finished run.
fn exit_status(outcome: &RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Succeeded => 0,
        RunOutcome::Failed { .. } | RunOutcome::EngineUnavailable { .. } => 1,
        RunOutcome::Terminated { .. } | RunOutcome::Superseded => 2,
    }
}

fn mount(config: &PlaygroundConfig, id: &str, editor: Rc<RefCell<TextEditor>>) -> Playground<CpythonLoader> {
    let loader = CpythonLoader::new().with_preload(config.preload_packages.iter().cloned());
    Playground::new(
        id,
        config,
        Rc::new(EngineHandle::new(loader)),
        editor,
        Rc::new(RefCell::new(TerminalDisplay::stdio())),
        Rc::new(TokioFrames::new(config.frame_interval())),
    )
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn playground_id(path: Option<&Path>) -> String {
    path.and_then(Path::file_stem)
        .map_or_else(|| "scratch".to_owned(), |stem| stem.to_string_lossy().into_owned())
}

async fn run_file(config: &PlaygroundConfig, path: &Path) -> Result<u8> {
    let source = read_source(path)?;
    let playground = mount(config, &playground_id(Some(path)), TextEditor::shared(source));
    let report = playground.run().await;
    Ok(exit_status(&report.outcome))
}

// =============================================================================
// Interactive mode
// =============================================================================

/// One line of interactive input.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Input<'a> {
    Code(&'a str),
    Run,
    Clear,
    Reset,
    Show,
    Quit,
    Unknown(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let Some(command) = line.trim().strip_prefix(':') else {
        return Input::Code(line);
    };
    match command.trim() {
        "run" | "r" => Input::Run,
        "clear" | "c" => Input::Clear,
        "reset" => Input::Reset,
        "show" | "s" => Input::Show,
        "quit" | "q" => Input::Quit,
        _ => Input::Unknown(command),
    }
}

async fn edit(config: &PlaygroundConfig, path: Option<&Path>) -> Result<u8> {
    let source = path.map(read_source).transpose()?.unwrap_or_default();
    let editor = TextEditor::shared(source);
    let playground = mount(config, &playground_id(path), Rc::clone(&editor));
    let interactive = std::io::stdin().is_terminal();

    print!("{}", playground.initial_code());
    if let Err(err) = playground.boot().await {
        tracing::warn!(%err, "continuing without an engine; the next :run retries");
    }

    let mut status = 0;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if interactive {
            eprint!("> ");
        }
        let Some(line) = lines.next_line().await.context("cannot read stdin")? else {
            break;
        };
        match parse_input(&line) {
            Input::Code(code) => editor.borrow_mut().push_line(code),
            Input::Run => status = exit_status(&playground.run().await.outcome),
            Input::Clear => playground.clear(),
            Input::Reset => playground.reset(),
            Input::Show => print!("{}", editor.borrow().value()),
            Input::Quit => break,
            Input::Unknown(command) => eprintln!("unknown command `:{command}` (try :run, :clear, :reset, :show, :quit)"),
        }
    }
    Ok(status)
}

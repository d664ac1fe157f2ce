//! Mint CLI - the host binary around the runtime core.
//!
//! This is the main entry point for the `mint` interpreter. It parses
//! arguments with clap, bootstraps logging, loads the script through the
//! compiler seam, and hands the main module to the scheduler. With no
//! script and a TTY on stdin it enters the interactive REPL loop.

mod repl;

use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use mint_core::ast::module::MAIN_ID;
use mint_core::ast::ModuleState;
use mint_core::{RuntimeConfig, Scheduler};
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Mint - an interpreter for the mint programming language
#[derive(Parser, Debug)]
#[command(name = "mint")]
#[command(author = "Mint Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run mint scripts or start an interactive session", long_about = None)]
struct Cli {
    /// Enable verbose logging (equivalent to MINT_LOG=debug)
    #[arg(short, long, env = "MINT_VERBOSE")]
    verbose: bool,

    /// Script to execute; the REPL starts when omitted and stdin is a TTY
    script: Option<PathBuf>,

    /// Arguments handed to the script as `va_args`
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(status) => ExitCode::from(status.clamp(0, 255) as u8),
        Err(error) => {
            eprintln!("mint: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_env("MINT_LOG")
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<i32> {
    let scheduler = Scheduler::new(RuntimeConfig::default());

    match cli.script {
        Some(script) => {
            debug!("running script {}", script.display());
            compile_main(&scheduler, &script, &cli.args)?;
            Ok(scheduler.run_main())
        }
        None if std::io::stdin().is_terminal() => repl::run(&scheduler),
        None => Err(anyhow!(
            "no script given and stdin is not a terminal; see --help"
        )),
    }
}

/// Compile the script into the main module through the configured compiler
/// seam, seeding `va_args` with the trailing arguments.
fn compile_main(scheduler: &Scheduler, script: &PathBuf, args: &[String]) -> Result<()> {
    let source = std::fs::read_to_string(script)
        .with_context(|| format!("cannot read '{}'", script.display()))?;

    let mut runtime = scheduler.lock_processor();
    seed_va_args(&mut runtime, args);

    let mut compiler = runtime
        .compiler
        .take()
        .ok_or_else(|| anyhow!("no compiler front-end is linked into this build"))?;
    let result = compiler.compile(&mut runtime, MAIN_ID, &source);
    runtime.compiler = Some(compiler);
    result.map_err(|error| anyhow!("{error}"))?;

    runtime.modules.entry_mut(MAIN_ID).state = ModuleState::Ready;
    Ok(())
}

/// Install the script arguments as a `va_args` iterator in the root
/// package.
fn seed_va_args(runtime: &mut mint_core::Runtime, args: &[String]) {
    use mint_core::memory::builtin::iterator::{create_iterator, IteratorPayload};
    use mint_core::memory::builtin::string::create_string;
    use std::collections::VecDeque;

    let mut items = VecDeque::with_capacity(args.len());
    for argument in args {
        items.push_back(create_string(&runtime.global, &mut runtime.gc, argument));
    }
    let iterator = create_iterator(
        &runtime.global,
        &mut runtime.gc,
        IteratorPayload::items(items),
    );

    let root = runtime.global.root();
    let symbol = mint_util::symbol::known::va_args();
    if let Some(previous) = runtime
        .global
        .package_mut(root)
        .symbols_mut()
        .insert(symbol, iterator)
    {
        runtime.gc.discard(previous);
    }
}

//! Interactive session loop.
//!
//! Reads statements from stdin, compiles each into the main module through
//! the compiler seam, and resumes the main process over the appended
//! bytecode. Results print through the runtime's default printer.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, Result};
use mint_core::ast::module::MAIN_ID;
use mint_core::ast::ModuleState;
use mint_core::Scheduler;

const PROMPT: &str = ">>> ";

/// Run the read-compile-execute loop until EOF. Returns the exit status.
pub fn run(scheduler: &Scheduler) -> Result<i32> {
    {
        let runtime = scheduler.lock_processor();
        if runtime.compiler.is_none() {
            return Err(anyhow!(
                "no compiler front-end is linked into this build; the REPL cannot evaluate input"
            ));
        }
    }

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{PROMPT}");
        io::stdout().flush().ok();

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        {
            let mut runtime = scheduler.lock_processor();
            let mut compiler = runtime
                .compiler
                .take()
                .expect("compiler presence was checked at startup");
            let compiled = compiler.compile(&mut runtime, MAIN_ID, &line);
            runtime.compiler = Some(compiler);

            match compiled {
                Ok(()) => {
                    runtime.modules.entry_mut(MAIN_ID).state = ModuleState::Ready;
                }
                Err(error) => {
                    eprintln!("{error}");
                    continue;
                }
            }
        }

        let status = scheduler.run_main();
        if status != 0 {
            return Ok(status);
        }
    }

    Ok(0)
}

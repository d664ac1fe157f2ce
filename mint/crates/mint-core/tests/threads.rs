//! Multi-process scheduling over the processor lock.

mod common;

use common::Asm;
use mint_core::ast::module::MAIN_ID;
use mint_core::ast::{BufferPrinter, Command, ModuleState};
use mint_core::scheduler::scheduler::{make_thread_process, request_thread};
use mint_core::{RuntimeConfig, Scheduler};
use std::time::Duration;

#[test]
fn a_thread_process_runs_alongside_main() {
    let scheduler = Scheduler::new(RuntimeConfig::default());
    let printer = BufferPrinter::new();
    {
        let mut runtime = scheduler.lock_processor();
        runtime.set_default_printer(Box::new(printer.clone()));
        let mut asm = Asm { rt: &mut *runtime };

        let worker = asm.function(0, false, |asm| {
            asm.print_text("worker ");
            asm.string("");
            asm.op(Command::ExitCall);
        });
        asm.print_text("main ");
        asm.exit_module();

        let worker_ref = {
            let reference = asm.rt.modules.module(MAIN_ID).constant(worker);
            asm.rt.gc.share(reference)
        };
        let process = make_thread_process(&mut runtime, &worker_ref).unwrap();
        let id = request_thread(&mut runtime, process);
        assert!(id.is_some());
        runtime.gc.discard(worker_ref);
        runtime.modules.entry_mut(MAIN_ID).state = ModuleState::Ready;
    }

    let status = scheduler.run_main();
    assert_eq!(status, 0);

    let output = printer.contents();
    assert!(output.contains("main "));
    assert!(output.contains("worker "));
}

#[test]
fn join_thread_times_out_on_unknown_work() {
    let scheduler = Scheduler::new(RuntimeConfig::default());
    // Unknown ids resolve immediately rather than blocking forever.
    assert!(scheduler.join_thread(999, Some(Duration::from_millis(10))));
}

#[test]
fn started_thread_is_joinable() {
    let scheduler = Scheduler::new(RuntimeConfig::default());
    let printer = BufferPrinter::new();
    let id = {
        let mut runtime = scheduler.lock_processor();
        runtime.set_default_printer(Box::new(printer.clone()));
        let mut asm = Asm { rt: &mut *runtime };
        let worker = asm.function(0, false, |asm| {
            asm.print_text("joined-thread ");
            asm.string("");
            asm.op(Command::ExitCall);
        });
        let worker_ref = {
            let reference = asm.rt.modules.module(MAIN_ID).constant(worker);
            asm.rt.gc.share(reference)
        };
        let process = make_thread_process(&mut runtime, &worker_ref).unwrap();
        runtime.gc.discard(worker_ref);
        drop(runtime);

        scheduler.start_thread(process.into_cursor())
    };

    assert!(scheduler.join_thread(id, Some(Duration::from_secs(5))));
    assert!(printer.contents().contains("joined-thread "));
}

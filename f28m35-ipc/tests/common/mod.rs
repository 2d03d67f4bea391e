#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};

use f28m35_ipc::fabric::FlagRegisters;
use f28m35_ipc::memory::{AddressSpace, FunctionTable, WriteProtect};
use f28m35_ipc::responder::{Responder, ServiceReport};
use f28m35_ipc::{Blocking, IpcController};

/// Long enough for any peer thread, short enough that a lost wakeup fails
/// the test instead of hanging it.
pub const PATIENCE: Blocking = Blocking::Bounded(100_000_000);

/// Keep servicing `ctl` until `done` is set, then drain once more.
pub fn serve_until<F, M, P, X, const N: usize>(
    responder: &Responder<'_, M, P, X>,
    ctl: &mut IpcController<'_, F, N>,
    done: &AtomicBool,
) -> ServiceReport
where
    F: FlagRegisters + ?Sized,
    M: AddressSpace + ?Sized,
    P: WriteProtect + ?Sized,
    X: FunctionTable + ?Sized,
{
    let mut total = ServiceReport::default();
    loop {
        let finished = done.load(Ordering::SeqCst);
        let report = responder.service(ctl);
        total.handled += report.handled;
        total.failed += report.failed;
        if finished {
            return total;
        }
        std::thread::yield_now();
    }
}

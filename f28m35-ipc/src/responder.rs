//! Receiving side of the command set
//!
//! [`Responder::service`] is the body of an IPC interrupt handler: it
//! drains the channel's get queue and carries out every request in order.
//! A message with an unknown command code is never acted on; instead the
//! shared [`ErrorIndicator`] is raised for the main loop to deal with.
//!
//! ```ignore
//! #[interrupt]
//! fn MTOCIPC1() {
//!     RESPONDER.service(&mut CONTROLLER);
//! }
//! ```

use core::cell::Cell;

use critical_section::Mutex;

use crate::arch;
use crate::blocking::Blocking;
use crate::controller::IpcController;
use crate::error::{Error, Result};
use crate::fabric::FlagRegisters;
use crate::memory::{with_protection, AddressSpace, FunctionTable, Width, WriteProtect};
use crate::message::{Message, Operand, Operation, Request};

/// What to do once a protocol fault has been latched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FaultPolicy {
    /// Report the fault as an error and keep running.
    #[default]
    Latch,
    /// Stop the core in a spin loop, treating the channel as corrupted.
    Halt,
}

#[derive(Clone, Copy, Default)]
struct FaultState {
    count: u32,
    last: Option<Error>,
}

/// Persistent record of protocol faults seen by the interrupt handler
///
/// Shared between the handler, which raises it, and the main loop, which
/// checks it.
pub struct ErrorIndicator {
    state: Mutex<Cell<FaultState>>,
}

impl Default for ErrorIndicator {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorIndicator {
    /// A clear indicator
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(FaultState {
                count: 0,
                last: None,
            })),
        }
    }

    /// Record a fault
    pub fn raise(&self, error: Error) {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            state.count = state.count.wrapping_add(1);
            state.last = Some(error);
            cell.set(state);
        });
    }

    /// Has any fault been recorded since the last clear?
    pub fn is_raised(&self) -> bool {
        self.last().is_some()
    }

    /// Number of faults recorded since the last clear
    pub fn count(&self) -> u32 {
        critical_section::with(|cs| self.state.borrow(cs).get().count)
    }

    /// Most recent fault
    pub fn last(&self) -> Option<Error> {
        critical_section::with(|cs| self.state.borrow(cs).get().last)
    }

    /// Forget all recorded faults
    pub fn clear(&self) {
        critical_section::with(|cs| self.state.borrow(cs).set(FaultState::default()));
    }

    /// Apply `policy` to the recorded faults.
    ///
    /// Returns the most recent fault as an error under
    /// [`FaultPolicy::Latch`] and never returns under [`FaultPolicy::Halt`]
    /// if a fault was recorded.
    pub fn check(&self, policy: FaultPolicy) -> Result<()> {
        match (self.last(), policy) {
            (None, _) => Ok(()),
            (Some(err), FaultPolicy::Latch) => Err(err),
            (Some(_), FaultPolicy::Halt) => arch::halt(),
        }
    }
}

/// Outcome of one [`Responder::service`] pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServiceReport {
    /// Messages taken off the queue
    pub handled: u32,
    /// Messages that could not be carried out
    pub failed: u32,
}

/// Carries out requests from the peer on local memory
pub struct Responder<'a, M, P, X>
where
    M: AddressSpace + ?Sized,
    P: WriteProtect + ?Sized,
    X: FunctionTable + ?Sized,
{
    memory: &'a M,
    protect: &'a P,
    functions: &'a X,
    errors: &'a ErrorIndicator,
    reply: Blocking,
}

impl<'a, M, P, X> Responder<'a, M, P, X>
where
    M: AddressSpace + ?Sized,
    P: WriteProtect + ?Sized,
    X: FunctionTable + ?Sized,
{
    /// Create a responder acting on `memory`.
    ///
    /// Replies to data reads are queued with [`Blocking::Enabled`].
    pub fn new(
        memory: &'a M,
        protect: &'a P,
        functions: &'a X,
        errors: &'a ErrorIndicator,
    ) -> Self {
        Self {
            memory,
            protect,
            functions,
            errors,
            reply: Blocking::Enabled,
        }
    }

    /// Use `blocking` when queuing replies to data reads.
    pub fn with_reply_blocking(mut self, blocking: Blocking) -> Self {
        self.reply = blocking;
        self
    }

    /// Fault record this responder raises
    pub fn errors(&self) -> &'a ErrorIndicator {
        self.errors
    }

    /// Drain the get queue of `ctl` and carry out every request.
    ///
    /// The channel interrupt flag is acknowledged before draining, so a
    /// message that arrives while draining raises it again rather than
    /// waiting for an unrelated interrupt.
    pub fn service<F, const N: usize>(&self, ctl: &mut IpcController<'_, F, N>) -> ServiceReport
    where
        F: FlagRegisters + ?Sized,
    {
        let mut report = ServiceReport::default();
        ctl.acknowledge_interrupt();
        while let Ok(msg) = ctl.try_get() {
            report.handled += 1;
            if self.handle(ctl, &msg).is_err() {
                report.failed += 1;
            }
        }
        report
    }

    /// Decode and carry out one message.
    ///
    /// A message that does not decode raises the error indicator and has no
    /// other effect.
    pub fn handle<F, const N: usize>(
        &self,
        ctl: &mut IpcController<'_, F, N>,
        msg: &Message,
    ) -> Result<()>
    where
        F: FlagRegisters + ?Sized,
    {
        let request = match msg.decode() {
            Ok(request) => request,
            Err(err) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("IPC: dropping message with command {=u32:#x}", msg.command);
                self.errors.raise(err);
                return Err(err);
            }
        };
        self.apply(ctl, &request)
    }

    /// Carry out a decoded request.
    pub fn apply<F, const N: usize>(
        &self,
        ctl: &mut IpcController<'_, F, N>,
        request: &Request,
    ) -> Result<()>
    where
        F: FlagRegisters + ?Sized,
    {
        let mem = self.memory;
        let protected = request.protected;
        match request.operation {
            Operation::DataRead {
                address,
                width,
                reply_to,
                response,
            } => {
                let value = mem.read(address, width);
                let reply = Operation::DataWrite {
                    address: reply_to,
                    value: Operand::new(width, value),
                    response,
                };
                ctl.send(
                    &Request {
                        operation: reply,
                        protected,
                    },
                    self.reply,
                )
            }
            Operation::DataWrite {
                address,
                value,
                response,
            } => {
                with_protection(self.protect, protected, || {
                    mem.write(address, value.width(), value.value())
                });
                if !response.is_empty() {
                    ctl.fabric().clear(response);
                }
                Ok(())
            }
            Operation::SetBits { address, mask } => {
                with_protection(self.protect, protected, || {
                    let width = mask.width();
                    let old = mem.read(address, width);
                    mem.write(address, width, old | mask.value());
                });
                Ok(())
            }
            Operation::ClearBits { address, mask } => {
                with_protection(self.protect, protected, || {
                    let width = mask.width();
                    let old = mem.read(address, width);
                    mem.write(address, width, old & !mask.value());
                });
                Ok(())
            }
            Operation::BlockRead {
                address,
                shared,
                words,
                response,
            } => {
                with_protection(self.protect, protected, || {
                    mem.copy(address, shared, words, Width::Bits16)
                });
                ctl.fabric().acknowledge(response);
                Ok(())
            }
            Operation::BlockWrite {
                address,
                shared,
                count,
                width,
            } => {
                with_protection(self.protect, protected, || {
                    mem.copy(shared, address, count, width)
                });
                Ok(())
            }
            Operation::FunctionCall { address, param } => {
                let called = with_protection(self.protect, protected, || {
                    self.functions.call(address, param)
                });
                match called {
                    Some(_) => Ok(()),
                    None => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("IPC: no function at {=u32:#x}", address);
                        let err = Error::NoSuchFunction(address);
                        self.errors.raise(err);
                        Err(err)
                    }
                }
            }
        }
    }
}

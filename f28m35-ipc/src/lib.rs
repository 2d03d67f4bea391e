//! Inter-processor communication for the F28M35x dual-core devices
//!
//! The F28M35x pairs a C28x control core with a Cortex-M3 master core. The
//! cores talk through 32 interrupt-capable flags in each direction, two
//! small register sets for single requests, two message RAMs and eight
//! shared Sx RAM blocks whose write access is handed back and forth. This
//! crate builds the IPC protocol on top of those:
//!
//! * [`queue`] and [`controller`]: lock-free mailbox queues in message RAM,
//!   bound to an interrupt channel.
//! * [`message`]: the request vocabulary (data read and write, bit set and
//!   clear, block transfers, remote function calls) and its encoding.
//! * [`responder`]: the receive side that services a channel.
//! * [`lite`]: the queue-less protocol over the command registers.
//! * [`ownership`]: handing Sx blocks between the cores.
//! * [`exchange`]: the periodic parameter exchange built on the above.
//! * [`sim`]: a host model of the chip, for tests and for running the
//!   protocol with a thread per core.
//!
//! Everything that touches hardware goes through small traits
//! ([`fabric::FlagRegisters`], [`memory::AddressSpace`] and friends),
//! implemented by [`pac`] for the real registers and by [`sim`] for the
//! model.
//!
//! # Crate features
//!
//! * **defmt** -
//!   Implement `defmt::Format` for several types and log protocol faults.
//!
//! The crate uses `critical-section` for its error indicator; the
//! application provides the implementation.

#![warn(missing_docs)]
#![no_std]

#[cfg(test)]
extern crate std;

#[doc(hidden)]
pub use paste;

pub mod arch;
pub mod blocking;
mod codec;
pub mod controller;
pub mod error;
pub mod exchange;
pub mod fabric;
pub mod flags;
pub mod host;
pub mod lite;
pub mod memory;
pub mod message;
pub mod ownership;
pub mod pac;
pub mod queue;
pub mod responder;
pub mod shared;
pub mod sim;

// Provide access to common datastructures to avoid repeating ourselves
pub use blocking::Blocking;
pub use controller::IpcController;
pub use error::{Error, Result};
pub use message::{Message, Request};
pub use queue::MailboxQueue;
pub use shared::Core;

//! The signalling fabric between the two cores
//!
//! [`FlagRegisters`] is the local core's view of the IPC flag hardware and
//! [`CommandRegisters`] the view of the single command/address/data register
//! set used by the lite protocol. Both are implemented for the real
//! registers in [`crate::pac`] and for the model in [`crate::sim`].
//!
//! The free functions in this module are the small flag helpers both
//! protocols are built from.

use crate::blocking::Blocking;
use crate::error::{Error, Result};
use crate::flags::IpcFlags;

/// Local core's view of the IPC flag registers
///
/// "Outgoing" flags are the ones this core raises toward the peer;
/// "incoming" flags are the ones the peer raised toward this core.
pub trait FlagRegisters {
    /// Raise `flags` toward the peer.
    fn set(&self, flags: IpcFlags);

    /// Withdraw outgoing `flags` without waiting for the peer.
    fn clear(&self, flags: IpcFlags);

    /// Outgoing flags not yet acknowledged by the peer
    fn outgoing(&self) -> IpcFlags;

    /// Incoming flags not yet acknowledged by this core
    fn incoming(&self) -> IpcFlags;

    /// Acknowledge incoming `flags`, clearing them on the peer's side.
    fn acknowledge(&self, flags: IpcFlags);
}

/// Local core's view of the lite command register sets
///
/// There is one set per direction. The outgoing set is written by this
/// core as requester and its result register by the peer as responder; the
/// incoming set is the mirror image.
pub trait CommandRegisters {
    /// Program the outgoing command register
    fn set_command(&self, command: u32);
    /// Program the outgoing address register
    fn set_address(&self, address: u32);
    /// Program the outgoing data register
    fn set_data(&self, data: u32);
    /// Read the result the peer left for our last request
    fn result(&self) -> u32;

    /// Command register of the peer's request
    fn incoming_command(&self) -> u32;
    /// Address register of the peer's request
    fn incoming_address(&self) -> u32;
    /// Data register of the peer's request
    fn incoming_data(&self) -> u32;
    /// Leave a result for the peer's request
    fn set_incoming_result(&self, value: u32);
}

/// Is any of `flags` still raised toward the peer?
pub fn flag_busy<F: FlagRegisters + ?Sized>(fabric: &F, flags: IpcFlags) -> bool {
    fabric.outgoing().intersects(flags)
}

/// Has the peer raised any of `flags` toward us?
pub fn peer_flag_pending<F: FlagRegisters + ?Sized>(fabric: &F, flags: IpcFlags) -> bool {
    fabric.incoming().intersects(flags)
}

/// Raise `flags` toward the peer.
pub fn send_flag<F: FlagRegisters + ?Sized>(fabric: &F, flags: IpcFlags) {
    fabric.set(flags);
}

/// Wait until the peer raises all of `flags`, then acknowledge them.
pub fn wait_for_flag<F: FlagRegisters + ?Sized>(
    fabric: &F,
    flags: IpcFlags,
    blocking: Blocking,
) -> Result<()> {
    blocking.wait_until(|| fabric.incoming().contains(flags), Error::FlagBusy)?;
    fabric.acknowledge(flags);
    Ok(())
}

/// Wait until the peer acknowledges all of our outgoing `flags`.
pub fn wait_for_ack<F: FlagRegisters + ?Sized>(
    fabric: &F,
    flags: IpcFlags,
    blocking: Blocking,
) -> Result<()> {
    blocking.wait_until(|| !fabric.outgoing().intersects(flags), Error::FlagBusy)
}

/// Two-core barrier on `flags`.
///
/// Both cores call this with the same flags. Each raises them, waits for
/// and acknowledges the peer's, then waits for its own to be acknowledged.
pub fn sync<F: FlagRegisters + ?Sized>(
    fabric: &F,
    flags: IpcFlags,
    blocking: Blocking,
) -> Result<()> {
    fabric.set(flags);
    wait_for_flag(fabric, flags, blocking)?;
    wait_for_ack(fabric, flags, blocking)
}

/// Program the outgoing command registers and raise `flags`.
pub fn send_command<R>(regs: &R, flags: IpcFlags, command: u32, address: u32, data: u32)
where
    R: FlagRegisters + CommandRegisters + ?Sized,
{
    regs.set_command(command);
    regs.set_address(address);
    regs.set_data(data);
    regs.set(flags);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{IPC_FLAG1, IPC_FLAG17, IPC_FLAG2};
    use core::cell::Cell;

    /// A fabric whose peer acknowledges immediately
    #[derive(Default)]
    struct Loopback {
        out: Cell<u32>,
        inc: Cell<u32>,
    }

    impl FlagRegisters for Loopback {
        fn set(&self, flags: IpcFlags) {
            self.out.set(self.out.get() | flags.bits());
        }
        fn clear(&self, flags: IpcFlags) {
            self.out.set(self.out.get() & !flags.bits());
        }
        fn outgoing(&self) -> IpcFlags {
            IpcFlags::from_bits_retain(self.out.get())
        }
        fn incoming(&self) -> IpcFlags {
            IpcFlags::from_bits_retain(self.inc.get())
        }
        fn acknowledge(&self, flags: IpcFlags) {
            self.inc.set(self.inc.get() & !flags.bits());
        }
    }

    #[test]
    fn busy_and_pending() {
        let f = Loopback::default();
        send_flag(&f, IPC_FLAG17);
        assert!(flag_busy(&f, IPC_FLAG17));
        assert!(!flag_busy(&f, IPC_FLAG1));
        f.inc.set(IPC_FLAG2.bits());
        assert!(peer_flag_pending(&f, IPC_FLAG1 | IPC_FLAG2));
    }

    #[test]
    fn wait_for_flag_acknowledges() {
        let f = Loopback::default();
        f.inc.set((IPC_FLAG1 | IPC_FLAG2).bits());
        wait_for_flag(&f, IPC_FLAG1, Blocking::Disabled).unwrap();
        assert_eq!(f.incoming(), IPC_FLAG2);
        assert_eq!(
            wait_for_flag(&f, IPC_FLAG1, Blocking::Disabled),
            Err(Error::FlagBusy)
        );
    }

    #[test]
    fn wait_for_ack_times_out() {
        let f = Loopback::default();
        f.set(IPC_FLAG1);
        assert_eq!(
            wait_for_ack(&f, IPC_FLAG1, Blocking::Bounded(5)),
            Err(Error::Timeout)
        );
        f.clear(IPC_FLAG1);
        assert_eq!(wait_for_ack(&f, IPC_FLAG1, Blocking::Disabled), Ok(()));
    }
}

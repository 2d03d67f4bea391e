//! Shared RAM ownership handoff
//!
//! Write access to each Sx block belongs to exactly one core at a time and
//! is recorded in the master-select register: a set bit means the control
//! core owns the block. Only the master core can write that register, and
//! only with write protection lifted. The control core asks for a change
//! by sending a protected set-bits or clear-bits request to the master.
//!
//! A request only starts the handoff. Before touching the block the caller
//! must poll the register (see [`wait_for_owner`]) until it shows the new
//! owner. Accessing a block out of turn is not prevented here: a write by
//! the core that does not own a block is dropped by the hardware.

use crate::blocking::Blocking;
use crate::controller::IpcController;
use crate::error::{Error, Result};
use crate::fabric::FlagRegisters;
use crate::memory::{Width, WriteAllowed, WriteProtect};
use crate::shared::SxMask;

/// Address of the master-select register, master core view
pub const MSXMSEL: u32 = 0x400F_B210;

/// Which core should own a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Owner {
    /// The control core owns the block (select bit set)
    Ctrl,
    /// The master core owns the block (select bit clear)
    Master,
}

impl Owner {
    /// The other core
    pub const fn other(self) -> Owner {
        match self {
            Owner::Ctrl => Owner::Master,
            Owner::Master => Owner::Ctrl,
        }
    }
}

/// Read access to the master-select register
pub trait OwnershipStatus {
    /// Blocks currently owned by the control core
    fn ctrl_owned(&self) -> SxMask;
}

/// Write access to the master-select register
///
/// Writes only take effect while write protection is lifted.
pub trait SelectRegister: OwnershipStatus {
    /// Hand `blocks` to the control core
    fn assign_to_ctrl(&self, blocks: SxMask);
    /// Hand `blocks` to the master core
    fn assign_to_master(&self, blocks: SxMask);
}

/// Are all of `blocks` owned by `owner`, given the control core's mask?
pub const fn is_owned_by(ctrl_owned: SxMask, blocks: SxMask, owner: Owner) -> bool {
    match owner {
        Owner::Ctrl => ctrl_owned.contains(blocks),
        Owner::Master => !ctrl_owned.intersects(blocks),
    }
}

/// Ask the master core to hand `blocks` to `owner`.
///
/// Does nothing when every block already has the requested owner.
/// Otherwise sends a protected set-bits (to the control core) or clear-bits
/// (to the master core) on [`MSXMSEL`].
pub fn request_memory_access<F, S, const N: usize>(
    ctl: &mut IpcController<'_, F, N>,
    status: &S,
    blocks: SxMask,
    owner: Owner,
    blocking: Blocking,
) -> Result<()>
where
    F: FlagRegisters + ?Sized,
    S: OwnershipStatus + ?Sized,
{
    let current = status.ctrl_owned();
    if is_owned_by(current, blocks, owner) {
        return Ok(());
    }
    #[cfg(feature = "defmt")]
    defmt::debug!("IPC: requesting {=u32:#x} for {}", blocks.bits(), owner);
    match owner {
        Owner::Ctrl => ctl.set_bits_protected(MSXMSEL, blocks.bits(), Width::Bits32, blocking),
        Owner::Master => ctl.clear_bits_protected(MSXMSEL, blocks.bits(), Width::Bits32, blocking),
    }
}

/// Poll until all of `blocks` are owned by `owner`.
///
/// With [`Blocking::Disabled`] this is a single check that fails with
/// [`Error::NotOwned`].
pub fn wait_for_owner<S>(status: &S, blocks: SxMask, owner: Owner, blocking: Blocking) -> Result<()>
where
    S: OwnershipStatus + ?Sized,
{
    blocking.wait_until(
        || is_owned_by(status.ctrl_owned(), blocks, owner),
        Error::NotOwned,
    )
}

/// Something that can move Sx blocks between the cores
///
/// The control core goes through the master core with a message
/// ([`RemoteArbiter`]); the master core writes the register itself
/// ([`LocalArbiter`]). Code that hands blocks back and forth works with
/// either.
pub trait SharedRamArbiter {
    /// Start handing `blocks` to `owner`.
    fn request<F, const N: usize>(
        &self,
        ctl: &mut IpcController<'_, F, N>,
        blocks: SxMask,
        owner: Owner,
        blocking: Blocking,
    ) -> Result<()>
    where
        F: FlagRegisters + ?Sized;

    /// Blocks currently owned by the control core
    fn ctrl_owned(&self) -> SxMask;

    /// Hand `blocks` to `owner` and wait until the register shows it.
    fn acquire<F, const N: usize>(
        &self,
        ctl: &mut IpcController<'_, F, N>,
        blocks: SxMask,
        owner: Owner,
        blocking: Blocking,
    ) -> Result<()>
    where
        F: FlagRegisters + ?Sized,
    {
        self.request(ctl, blocks, owner, blocking)?;
        blocking.wait_until(
            || is_owned_by(self.ctrl_owned(), blocks, owner),
            Error::NotOwned,
        )
    }
}

/// Arbiter for the control core: asks the master core by message
pub struct RemoteArbiter<'a, S: OwnershipStatus + ?Sized> {
    status: &'a S,
}

impl<'a, S: OwnershipStatus + ?Sized> RemoteArbiter<'a, S> {
    /// Request changes through messages, observe them through `status`.
    pub fn new(status: &'a S) -> Self {
        Self { status }
    }
}

impl<S: OwnershipStatus + ?Sized> SharedRamArbiter for RemoteArbiter<'_, S> {
    fn request<F, const N: usize>(
        &self,
        ctl: &mut IpcController<'_, F, N>,
        blocks: SxMask,
        owner: Owner,
        blocking: Blocking,
    ) -> Result<()>
    where
        F: FlagRegisters + ?Sized,
    {
        request_memory_access(ctl, self.status, blocks, owner, blocking)
    }

    fn ctrl_owned(&self) -> SxMask {
        self.status.ctrl_owned()
    }
}

/// Arbiter for the master core: writes the select register directly
pub struct LocalArbiter<'a, R: SelectRegister + ?Sized, P: WriteProtect + ?Sized> {
    select: &'a R,
    protect: &'a P,
}

impl<'a, R: SelectRegister + ?Sized, P: WriteProtect + ?Sized> LocalArbiter<'a, R, P> {
    /// Write `select` with `protect` lifted.
    pub fn new(select: &'a R, protect: &'a P) -> Self {
        Self { select, protect }
    }
}

impl<R: SelectRegister + ?Sized, P: WriteProtect + ?Sized> SharedRamArbiter
    for LocalArbiter<'_, R, P>
{
    fn request<F, const N: usize>(
        &self,
        _ctl: &mut IpcController<'_, F, N>,
        blocks: SxMask,
        owner: Owner,
        _blocking: Blocking,
    ) -> Result<()>
    where
        F: FlagRegisters + ?Sized,
    {
        if is_owned_by(self.select.ctrl_owned(), blocks, owner) {
            return Ok(());
        }
        let _allowed = WriteAllowed::new(self.protect);
        match owner {
            Owner::Ctrl => self.select.assign_to_ctrl(blocks),
            Owner::Master => self.select.assign_to_master(blocks),
        }
        Ok(())
    }

    fn ctrl_owned(&self) -> SxMask {
        self.select.ctrl_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{IpcFlags, IpcInterrupt};
    use crate::message::{Command, CommandKind, Operand, Operation};
    use crate::queue::MailboxQueue;
    use crate::shared::Core;
    use core::cell::Cell;

    struct Select(Cell<u32>);

    impl OwnershipStatus for Select {
        fn ctrl_owned(&self) -> SxMask {
            SxMask::from_bits_truncate(self.0.get())
        }
    }

    struct Silent;

    impl FlagRegisters for Silent {
        fn set(&self, _: IpcFlags) {}
        fn clear(&self, _: IpcFlags) {}
        fn outgoing(&self) -> IpcFlags {
            IpcFlags::empty()
        }
        fn incoming(&self) -> IpcFlags {
            IpcFlags::empty()
        }
        fn acknowledge(&self, _: IpcFlags) {}
    }

    #[test]
    fn ownership_predicate() {
        let owned = SxMask::S0 | SxMask::S1;
        assert!(is_owned_by(owned, SxMask::S0, Owner::Ctrl));
        assert!(!is_owned_by(owned, SxMask::S0 | SxMask::S2, Owner::Ctrl));
        assert!(!is_owned_by(owned, SxMask::S1 | SxMask::S2, Owner::Master));
        assert!(is_owned_by(owned, SxMask::S2 | SxMask::S3, Owner::Master));
    }

    #[test]
    fn requests_only_when_needed() {
        let select = Select(Cell::new(SxMask::S1.bits()));
        let mut to_peer: MailboxQueue = MailboxQueue::new();
        let mut from_peer: MailboxQueue = MailboxQueue::new();
        let (put, mut peer_rx) = to_peer.split();
        let (_, get) = from_peer.split();
        let mut ctl = IpcController::new(
            &Silent,
            Core::Ctrl,
            put,
            get,
            IpcInterrupt::Int1,
            IpcInterrupt::Int1,
        );

        request_memory_access(&mut ctl, &select, SxMask::S1, Owner::Ctrl, Blocking::Disabled)
            .unwrap();
        request_memory_access(&mut ctl, &select, SxMask::S0, Owner::Master, Blocking::Disabled)
            .unwrap();
        assert!(peer_rx.is_empty());

        request_memory_access(
            &mut ctl,
            &select,
            SxMask::S0 | SxMask::S1,
            Owner::Ctrl,
            Blocking::Disabled,
        )
        .unwrap();
        let req = peer_rx.try_dequeue().unwrap().decode().unwrap();
        assert_eq!(req.command(), Command::protected(CommandKind::SetBits));
        assert_eq!(
            req.operation,
            Operation::SetBits {
                address: MSXMSEL,
                mask: Operand::Word32(0b11),
            }
        );

        request_memory_access(&mut ctl, &select, SxMask::S1, Owner::Master, Blocking::Disabled)
            .unwrap();
        let req = peer_rx.try_dequeue().unwrap().decode().unwrap();
        assert_eq!(req.command(), Command::protected(CommandKind::ClearBits));
    }

    #[test]
    fn waiting_for_owner() {
        let select = Select(Cell::new(0));
        assert_eq!(
            wait_for_owner(&select, SxMask::S0, Owner::Ctrl, Blocking::Disabled),
            Err(Error::NotOwned)
        );
        assert_eq!(
            wait_for_owner(&select, SxMask::S0, Owner::Master, Blocking::Disabled),
            Ok(())
        );
    }
}

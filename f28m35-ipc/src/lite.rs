//! IPC lite
//!
//! A queue-less protocol for one outstanding request at a time. The
//! requester programs the command/address/data registers directly and
//! raises a request flag together with a status flag. The responder carries
//! out the command, leaves any result in the data-read register and
//! acknowledges both flags. If it does not recognise the command it
//! acknowledges only the request flag; the status flag left standing is the
//! requester's only sign of the failure.
//!
//! The responder reads the command from the live register when it gets to
//! the request, not from a copy taken when the flag was raised. Nothing
//! here stops a requester from reprogramming the registers before that, in
//! which case the responder sees a mix of two requests. Keep one request
//! per register set in flight: [`LiteRequester`] refuses a new request
//! while the previous one's flags are still up, and that is the only guard.

use crate::blocking::Blocking;
use crate::error::{Error, Result};
use crate::fabric::{flag_busy, send_command, CommandRegisters, FlagRegisters};
use crate::flags::IpcFlags;
use crate::memory::{with_protection, AddressSpace, FunctionTable, Width, WriteProtect};
use crate::message::PROTECTED_BIT;
use crate::ownership::{is_owned_by, Owner, OwnershipStatus, MSXMSEL};
use crate::shared::SxMask;

/// Operations available over the lite registers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LiteOp {
    /// Set bits, result is the updated word
    SetBits(Width),
    /// Clear bits, result is the updated word
    ClearBits(Width),
    /// Write a word, result is the word read back
    DataWrite(Width),
    /// Read a word, result is the word
    DataRead(Width),
    /// Call a function, result is its return value
    FunctionCall,
}

/// A lite command: an operation and its protection setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LiteCommand {
    /// What to do
    pub op: LiteOp,
    /// Lift write protection around the access
    pub protected: bool,
}

impl LiteCommand {
    /// Plain command
    pub const fn plain(op: LiteOp) -> Self {
        Self {
            op,
            protected: false,
        }
    }

    /// Protected command
    pub const fn protected(op: LiteOp) -> Self {
        Self {
            op,
            protected: true,
        }
    }

    /// Value written to the command register
    pub const fn code(self) -> u32 {
        let base = match self.op {
            LiteOp::SetBits(Width::Bits16) => 1,
            LiteOp::SetBits(Width::Bits32) => 2,
            LiteOp::ClearBits(Width::Bits16) => 3,
            LiteOp::ClearBits(Width::Bits32) => 4,
            LiteOp::DataWrite(Width::Bits16) => 5,
            LiteOp::DataWrite(Width::Bits32) => 6,
            LiteOp::DataRead(Width::Bits16) => 7,
            LiteOp::DataRead(Width::Bits32) => 8,
            LiteOp::FunctionCall => 9,
        };
        if self.protected {
            base | PROTECTED_BIT
        } else {
            base
        }
    }

    /// Decode the command register
    pub const fn from_code(code: u32) -> Result<Self> {
        let op = match code & !PROTECTED_BIT {
            1 => LiteOp::SetBits(Width::Bits16),
            2 => LiteOp::SetBits(Width::Bits32),
            3 => LiteOp::ClearBits(Width::Bits16),
            4 => LiteOp::ClearBits(Width::Bits32),
            5 => LiteOp::DataWrite(Width::Bits16),
            6 => LiteOp::DataWrite(Width::Bits32),
            7 => LiteOp::DataRead(Width::Bits16),
            8 => LiteOp::DataRead(Width::Bits32),
            9 => LiteOp::FunctionCall,
            _ => return Err(Error::UnknownCommand(code)),
        };
        Ok(Self {
            op,
            protected: code & PROTECTED_BIT != 0,
        })
    }
}

/// Requesting side of the lite protocol
pub struct LiteRequester<'a, R: FlagRegisters + CommandRegisters + ?Sized> {
    regs: &'a R,
}

impl<'a, R: FlagRegisters + CommandRegisters + ?Sized> LiteRequester<'a, R> {
    /// Issue requests through `regs`
    pub fn new(regs: &'a R) -> Self {
        Self { regs }
    }

    /// Program the registers and raise `flag` and `status`.
    ///
    /// Fails with [`Error::FlagBusy`], leaving every register untouched,
    /// while either flag is still raised from an earlier request.
    pub fn submit(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        command: LiteCommand,
        address: u32,
        data: u32,
    ) -> Result<()> {
        let flags = flag | status;
        if flag_busy(self.regs, flags) {
            return Err(Error::FlagBusy);
        }
        send_command(self.regs, flags, command.code(), address, data);
        Ok(())
    }

    /// Read the word at `address` on the peer into the result register.
    pub fn data_read(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        address: u32,
        width: Width,
    ) -> Result<()> {
        self.submit(flag, status, LiteCommand::plain(LiteOp::DataRead(width)), address, 0)
    }

    /// [`data_read`](Self::data_read) with protection lifted
    pub fn data_read_protected(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        address: u32,
        width: Width,
    ) -> Result<()> {
        self.submit(flag, status, LiteCommand::protected(LiteOp::DataRead(width)), address, 0)
    }

    /// Set the bits of `mask` at `address` on the peer.
    pub fn set_bits(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        address: u32,
        mask: u32,
        width: Width,
    ) -> Result<()> {
        let cmd = LiteCommand::plain(LiteOp::SetBits(width));
        self.submit(flag, status, cmd, address, mask & width.mask())
    }

    /// [`set_bits`](Self::set_bits) on a write-protected register
    pub fn set_bits_protected(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        address: u32,
        mask: u32,
        width: Width,
    ) -> Result<()> {
        let cmd = LiteCommand::protected(LiteOp::SetBits(width));
        self.submit(flag, status, cmd, address, mask & width.mask())
    }

    /// Clear the bits of `mask` at `address` on the peer.
    pub fn clear_bits(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        address: u32,
        mask: u32,
        width: Width,
    ) -> Result<()> {
        let cmd = LiteCommand::plain(LiteOp::ClearBits(width));
        self.submit(flag, status, cmd, address, mask & width.mask())
    }

    /// [`clear_bits`](Self::clear_bits) on a write-protected register
    pub fn clear_bits_protected(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        address: u32,
        mask: u32,
        width: Width,
    ) -> Result<()> {
        let cmd = LiteCommand::protected(LiteOp::ClearBits(width));
        self.submit(flag, status, cmd, address, mask & width.mask())
    }

    /// Write `value` at `address` on the peer.
    pub fn data_write(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        address: u32,
        value: u32,
        width: Width,
    ) -> Result<()> {
        let cmd = LiteCommand::plain(LiteOp::DataWrite(width));
        self.submit(flag, status, cmd, address, value & width.mask())
    }

    /// [`data_write`](Self::data_write) to a write-protected register
    pub fn data_write_protected(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        address: u32,
        value: u32,
        width: Width,
    ) -> Result<()> {
        let cmd = LiteCommand::protected(LiteOp::DataWrite(width));
        self.submit(flag, status, cmd, address, value & width.mask())
    }

    /// Call the function at `address` on the peer; its return value becomes
    /// the result.
    pub fn function_call(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        address: u32,
        param: u32,
    ) -> Result<()> {
        self.submit(flag, status, LiteCommand::plain(LiteOp::FunctionCall), address, param)
    }

    /// Ask the master core to hand `blocks` to `owner` through the lite
    /// registers.
    ///
    /// Does nothing when `status_reg` already shows the requested owner.
    pub fn request_memory_access<S: OwnershipStatus + ?Sized>(
        &self,
        flag: IpcFlags,
        status: IpcFlags,
        status_reg: &S,
        blocks: SxMask,
        owner: Owner,
    ) -> Result<()> {
        if is_owned_by(status_reg.ctrl_owned(), blocks, owner) {
            return Ok(());
        }
        match owner {
            Owner::Ctrl => {
                self.set_bits_protected(flag, status, MSXMSEL, blocks.bits(), Width::Bits32)
            }
            Owner::Master => {
                self.clear_bits_protected(flag, status, MSXMSEL, blocks.bits(), Width::Bits32)
            }
        }
    }

    /// Has the responder taken the request raised on `flag`?
    pub fn is_done(&self, flag: IpcFlags) -> bool {
        !flag_busy(self.regs, flag)
    }

    /// Wait until the responder has taken the request raised on `flag`.
    pub fn wait_done(&self, flag: IpcFlags, blocking: Blocking) -> Result<()> {
        blocking.wait_until(|| self.is_done(flag), Error::FlagBusy)
    }

    /// Result of the last request.
    ///
    /// Fails with [`Error::Rejected`] while `status` is still raised, which
    /// after the request flag dropped means the responder refused it. The
    /// pair stays busy until [`withdraw`](Self::withdraw) drops `status`.
    pub fn result(&self, status: IpcFlags, width: Width) -> Result<u32> {
        if flag_busy(self.regs, status) {
            return Err(Error::Rejected);
        }
        Ok(self.regs.result() & width.mask())
    }

    /// Drop the `status` flag a refused request left raised, freeing the
    /// pair for the next request.
    ///
    /// Fails with [`Error::FlagBusy`] while the responder has not yet taken
    /// the request on `flag`.
    pub fn withdraw(&self, flag: IpcFlags, status: IpcFlags) -> Result<()> {
        if flag_busy(self.regs, flag) {
            return Err(Error::FlagBusy);
        }
        self.regs.clear(status);
        Ok(())
    }
}

/// Responding side of the lite protocol
pub struct LiteResponder<'a, R, M, P, X>
where
    R: FlagRegisters + CommandRegisters + ?Sized,
    M: AddressSpace + ?Sized,
    P: WriteProtect + ?Sized,
    X: FunctionTable + ?Sized,
{
    regs: &'a R,
    memory: &'a M,
    protect: &'a P,
    functions: &'a X,
}

impl<'a, R, M, P, X> LiteResponder<'a, R, M, P, X>
where
    R: FlagRegisters + CommandRegisters + ?Sized,
    M: AddressSpace + ?Sized,
    P: WriteProtect + ?Sized,
    X: FunctionTable + ?Sized,
{
    /// Serve requests arriving on `regs` against local memory
    pub fn new(regs: &'a R, memory: &'a M, protect: &'a P, functions: &'a X) -> Self {
        Self {
            regs,
            memory,
            protect,
            functions,
        }
    }

    /// Wait for a request on `flag` and carry it out.
    ///
    /// On success the result is left for the requester and both `flag` and
    /// `status` are acknowledged. A command that is not understood, or a
    /// function call to an unknown address, acknowledges only `flag`.
    pub fn serve(&self, flag: IpcFlags, status: IpcFlags, blocking: Blocking) -> Result<u32> {
        let regs = self.regs;
        blocking.wait_until(|| regs.incoming().contains(flag), Error::FlagBusy)?;
        let code = regs.incoming_command();
        let command = match LiteCommand::from_code(code) {
            Ok(command) => command,
            Err(err) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("IPC lite: rejecting command {=u32:#x}", code);
                regs.acknowledge(flag);
                return Err(err);
            }
        };
        let address = regs.incoming_address();
        let data = regs.incoming_data();
        match self.execute(command, address, data) {
            Ok(value) => {
                regs.set_incoming_result(value);
                regs.acknowledge(flag | status);
                Ok(value)
            }
            Err(err) => {
                regs.acknowledge(flag);
                Err(err)
            }
        }
    }

    fn execute(&self, command: LiteCommand, address: u32, data: u32) -> Result<u32> {
        let mem = self.memory;
        with_protection(self.protect, command.protected, || match command.op {
            LiteOp::SetBits(w) => {
                let old = mem.read(address, w);
                mem.write(address, w, old | data);
                Ok(mem.read(address, w))
            }
            LiteOp::ClearBits(w) => {
                let old = mem.read(address, w);
                mem.write(address, w, old & !data);
                Ok(mem.read(address, w))
            }
            LiteOp::DataWrite(w) => {
                mem.write(address, w, data);
                Ok(mem.read(address, w))
            }
            LiteOp::DataRead(w) => Ok(mem.read(address, w)),
            LiteOp::FunctionCall => self
                .functions
                .call(address, data)
                .ok_or(Error::NoSuchFunction(address)),
        })
    }
}

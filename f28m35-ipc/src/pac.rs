//! Register blocks touched by the IPC layer, master core view
//!
//! Only the registers this crate needs are described, at their offsets in
//! the Cortex-M3 memory map.

use vcell::VolatileCell;

use crate::fabric::{CommandRegisters, FlagRegisters};
use crate::flags::IpcFlags;
use crate::memory::WriteProtect;
use crate::ownership::{OwnershipStatus, SelectRegister};
use crate::shared::SxMask;

/// IPC flag and lite command registers
#[repr(C)]
pub struct IpcRegisterBlock {
    /// 0x00: acknowledge control-to-master flags
    pub ctomipcack: VolatileCell<u32>,
    /// 0x04: control-to-master flag status
    pub ctomipcsts: VolatileCell<u32>,
    /// 0x08: raise master-to-control flags
    pub mtocipcset: VolatileCell<u32>,
    /// 0x0C: withdraw master-to-control flags
    pub mtocipcclr: VolatileCell<u32>,
    /// 0x10: master-to-control flags still raised
    pub mtocipcflg: VolatileCell<u32>,
    _reserved0: VolatileCell<u32>,
    /// 0x18: free running IPC counter, low word
    pub mipccounterl: VolatileCell<u32>,
    /// 0x1C: free running IPC counter, high word
    pub mipccounterh: VolatileCell<u32>,
    /// 0x20: command of the control core's lite request
    pub ctomipccom: VolatileCell<u32>,
    /// 0x24: address of the control core's lite request
    pub ctomipcaddr: VolatileCell<u32>,
    /// 0x28: data of the control core's lite request
    pub ctomipcdataw: VolatileCell<u32>,
    /// 0x2C: result for the control core's lite request
    pub ctomipcdatar: VolatileCell<u32>,
    /// 0x30: command of our lite request
    pub mtocipccom: VolatileCell<u32>,
    /// 0x34: address of our lite request
    pub mtocipcaddr: VolatileCell<u32>,
    /// 0x38: data of our lite request
    pub mtocipcdataw: VolatileCell<u32>,
    /// 0x3C: result of our lite request
    pub mtocipcdatar: VolatileCell<u32>,
}

/// Shared RAM configuration registers
#[repr(C)]
pub struct RamConfigRegisterBlock {
    _reserved0: [VolatileCell<u32>; 4],
    /// 0x10: Sx master select, bit set = control core owns the block
    pub msxmsel: VolatileCell<u32>,
}

/// The IPC peripheral
pub struct Ipc {
    regs: &'static IpcRegisterBlock,
}

impl Ipc {
    /// Base address of the register block
    pub const PTR: *const IpcRegisterBlock = 0x400F_B700 as *const IpcRegisterBlock;

    /// Take the IPC registers.
    ///
    /// # Safety
    ///
    /// Must only be called on the master core. The caller is responsible for
    /// not letting two owners program the same lite register set.
    pub unsafe fn steal() -> Self {
        Self {
            regs: unsafe { &*Self::PTR },
        }
    }

    /// Free running 64-bit IPC counter
    pub fn counter(&self) -> u64 {
        loop {
            let hi = self.regs.mipccounterh.get();
            let lo = self.regs.mipccounterl.get();
            if hi == self.regs.mipccounterh.get() {
                return (u64::from(hi) << 32) | u64::from(lo);
            }
        }
    }
}

impl FlagRegisters for Ipc {
    fn set(&self, flags: IpcFlags) {
        self.regs.mtocipcset.set(flags.bits());
    }

    fn clear(&self, flags: IpcFlags) {
        self.regs.mtocipcclr.set(flags.bits());
    }

    fn outgoing(&self) -> IpcFlags {
        IpcFlags::from_bits_retain(self.regs.mtocipcflg.get())
    }

    fn incoming(&self) -> IpcFlags {
        IpcFlags::from_bits_retain(self.regs.ctomipcsts.get())
    }

    fn acknowledge(&self, flags: IpcFlags) {
        self.regs.ctomipcack.set(flags.bits());
    }
}

impl CommandRegisters for Ipc {
    fn set_command(&self, command: u32) {
        self.regs.mtocipccom.set(command);
    }

    fn set_address(&self, address: u32) {
        self.regs.mtocipcaddr.set(address);
    }

    fn set_data(&self, data: u32) {
        self.regs.mtocipcdataw.set(data);
    }

    fn result(&self) -> u32 {
        self.regs.mtocipcdatar.get()
    }

    fn incoming_command(&self) -> u32 {
        self.regs.ctomipccom.get()
    }

    fn incoming_address(&self) -> u32 {
        self.regs.ctomipcaddr.get()
    }

    fn incoming_data(&self) -> u32 {
        self.regs.ctomipcdataw.get()
    }

    fn set_incoming_result(&self, value: u32) {
        self.regs.ctomipcdatar.set(value);
    }
}

/// The shared RAM master-select register
pub struct RamConfig {
    regs: &'static RamConfigRegisterBlock,
}

impl RamConfig {
    /// Base address of the register block
    pub const PTR: *const RamConfigRegisterBlock = 0x400F_B200 as *const RamConfigRegisterBlock;

    /// Take the RAM configuration registers.
    ///
    /// # Safety
    ///
    /// Must only be called on the master core, at most once.
    pub unsafe fn steal() -> Self {
        Self {
            regs: unsafe { &*Self::PTR },
        }
    }
}

impl OwnershipStatus for RamConfig {
    fn ctrl_owned(&self) -> SxMask {
        SxMask::from_bits_truncate(self.regs.msxmsel.get())
    }
}

impl SelectRegister for RamConfig {
    fn assign_to_ctrl(&self, blocks: SxMask) {
        let v = self.regs.msxmsel.get();
        self.regs.msxmsel.set(v | blocks.bits());
    }

    fn assign_to_master(&self, blocks: SxMask) {
        let v = self.regs.msxmsel.get();
        self.regs.msxmsel.set(v & !blocks.bits());
    }
}

/// Master core register write protection
pub struct WriteAllowRegister {
    reg: &'static VolatileCell<u32>,
}

impl WriteAllowRegister {
    /// Address of the write-allow register
    pub const PTR: *const VolatileCell<u32> = 0x400F_B980 as *const VolatileCell<u32>;

    /// Key that lifts protection
    pub const KEY: u32 = 0xA5A5_A5A5;

    /// Take the write-allow register.
    ///
    /// # Safety
    ///
    /// Must only be called on the master core, at most once.
    pub unsafe fn steal() -> Self {
        Self {
            reg: unsafe { &*Self::PTR },
        }
    }
}

impl WriteProtect for WriteAllowRegister {
    fn allow_writes(&self) {
        self.reg.set(Self::KEY);
    }

    fn protect_writes(&self) {
        self.reg.set(0);
    }

    fn writes_allowed(&self) -> bool {
        self.reg.get() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::mem::{offset_of, size_of};

    #[test]
    fn layout() {
        assert_eq!(offset_of!(IpcRegisterBlock, ctomipcsts), 0x04);
        assert_eq!(offset_of!(IpcRegisterBlock, mtocipcflg), 0x10);
        assert_eq!(offset_of!(IpcRegisterBlock, mipccounterl), 0x18);
        assert_eq!(offset_of!(IpcRegisterBlock, ctomipccom), 0x20);
        assert_eq!(offset_of!(IpcRegisterBlock, mtocipcdatar), 0x3C);
        assert_eq!(size_of::<IpcRegisterBlock>(), 0x40);
        assert_eq!(offset_of!(RamConfigRegisterBlock, msxmsel), 0x10);
        assert_eq!(
            RamConfig::PTR as usize + offset_of!(RamConfigRegisterBlock, msxmsel),
            crate::ownership::MSXMSEL as usize
        );
    }
}

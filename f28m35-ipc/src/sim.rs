//! Host model of the IPC hardware
//!
//! [`Board`] models everything the IPC layer touches on the real chip: the
//! flag registers in both directions, the two lite register sets, the
//! control core's word-addressed RAM, the master core's byte-addressed RAM,
//! the Sx blocks and message RAMs shared by both, the master-select
//! register and the write protection of both cores. Each core sees the
//! board through a [`CoreView`], which implements the same traits as the
//! real registers, so protocol code runs unchanged with one thread per core.
//!
//! The model enforces what the hardware enforces. A write to an Sx block by
//! the core that does not own it, to the other core's message RAM, or to
//! the master-select register without write access, is dropped and
//! counted in [`Board::dropped_writes`]. An access outside the map below,
//! or an odd master core address, is a bus fault: it is counted in
//! [`Board::bus_faults`], a read returns 0 and a write goes nowhere.
//!
//! Memory map:
//!
//! | region | control view (words) | master view (bytes) |
//! |---|---|---|
//! | local RAM | `0x0000..0x2000` | `0x2000_0000..0x2000_4000` |
//! | Sx blocks | `0xC000..0x1_4000` | `0x2000_8000..0x2001_8000` |
//! | control-to-master message RAM | `0x3_F800..0x3_FC00` | `0x2007_F000..0x2007_F800` |
//! | master-to-control message RAM | `0x3_FC00..0x4_0000` | `0x2007_F800..0x2008_0000` |
//! | master select | n/a | [`MSXMSEL`] |

use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, AtomicU16, AtomicU32, Ordering};

use crate::controller::IpcController;
use crate::fabric::{CommandRegisters, FlagRegisters};
use crate::flags::{IpcFlags, IpcInterrupt};
use crate::memory::{AddressSpace, WriteProtect};
use crate::ownership::{OwnershipStatus, SelectRegister, MSXMSEL};
use crate::queue::{MailboxQueue, DEFAULT_QUEUE_DEPTH};
use crate::shared::{
    Core, SxMask, CTRL_CTOM_MSGRAM_START, CTRL_MTOC_MSGRAM_START, CTRL_SX_START,
    MASTER_CTOM_MSGRAM_START, MASTER_MTOC_MSGRAM_START, MASTER_SX_START, MSGRAM_WORDS,
    SX_BLOCKS, SX_BLOCK_WORDS,
};

/// First word of the control core's local RAM
pub const CTRL_RAM_START: u32 = 0x0000_0000;
/// Size of the control core's local RAM, in words
pub const CTRL_RAM_WORDS: u32 = 0x2000;
/// First byte of the master core's local RAM
pub const MASTER_RAM_START: u32 = 0x2000_0000;
/// Size of the master core's local RAM, in 16-bit words
pub const MASTER_RAM_WORDS: u32 = 0x2000;

const SX_WORDS: u32 = SX_BLOCKS * SX_BLOCK_WORDS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    CtrlRam,
    MasterRam,
    Sx(u32),
    CtoMMsg,
    MtoCMsg,
    Select,
}

struct LiteBank {
    command: AtomicU32,
    address: AtomicU32,
    data: AtomicU32,
    result: AtomicU32,
}

impl LiteBank {
    const fn new() -> Self {
        Self {
            command: AtomicU32::new(0),
            address: AtomicU32::new(0),
            data: AtomicU32::new(0),
            result: AtomicU32::new(0),
        }
    }
}

/// Contents of one lite register set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LiteSnapshot {
    /// Command register
    pub command: u32,
    /// Address register
    pub address: u32,
    /// Data-write register
    pub data: u32,
    /// Data-read register
    pub result: u32,
}

/// The modelled chip
pub struct Board {
    ctom_flags: AtomicU32,
    mtoc_flags: AtomicU32,
    ctom_lite: LiteBank,
    mtoc_lite: LiteBank,
    msxmsel: AtomicU32,
    ctrl_allow: AtomicBool,
    master_allow: AtomicBool,
    dropped: AtomicU32,
    faults: AtomicU32,
    ctrl_ram: [AtomicU16; CTRL_RAM_WORDS as usize],
    master_ram: [AtomicU16; MASTER_RAM_WORDS as usize],
    sx: [AtomicU16; SX_WORDS as usize],
    ctom_msg: [AtomicU16; MSGRAM_WORDS as usize],
    mtoc_msg: [AtomicU16; MSGRAM_WORDS as usize],
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    /// A board straight out of reset: all memory zero, no flags raised,
    /// every Sx block owned by the master core, protection on.
    pub const fn new() -> Self {
        Self {
            ctom_flags: AtomicU32::new(0),
            mtoc_flags: AtomicU32::new(0),
            ctom_lite: LiteBank::new(),
            mtoc_lite: LiteBank::new(),
            msxmsel: AtomicU32::new(0),
            ctrl_allow: AtomicBool::new(false),
            master_allow: AtomicBool::new(false),
            dropped: AtomicU32::new(0),
            faults: AtomicU32::new(0),
            ctrl_ram: [const { AtomicU16::new(0) }; CTRL_RAM_WORDS as usize],
            master_ram: [const { AtomicU16::new(0) }; MASTER_RAM_WORDS as usize],
            sx: [const { AtomicU16::new(0) }; SX_WORDS as usize],
            ctom_msg: [const { AtomicU16::new(0) }; MSGRAM_WORDS as usize],
            mtoc_msg: [const { AtomicU16::new(0) }; MSGRAM_WORDS as usize],
        }
    }

    /// The control core's view
    pub const fn ctrl(&self) -> CtrlView<'_> {
        CoreView::new(self)
    }

    /// The master core's view
    pub const fn master(&self) -> MasterView<'_> {
        CoreView::new(self)
    }

    /// Writes refused so far
    pub fn dropped_writes(&self) -> u32 {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Accesses to unmapped addresses so far
    pub fn bus_faults(&self) -> u32 {
        self.faults.load(Ordering::SeqCst)
    }

    /// Blocks owned by the control core
    pub fn ctrl_owned(&self) -> SxMask {
        SxMask::from_bits_truncate(self.msxmsel.load(Ordering::SeqCst))
    }

    /// The lite register set `core` uses as requester
    pub fn lite_registers(&self, core: Core) -> LiteSnapshot {
        let bank = match core {
            Core::Ctrl => &self.ctom_lite,
            Core::Master => &self.mtoc_lite,
        };
        LiteSnapshot {
            command: bank.command.load(Ordering::SeqCst),
            address: bank.address.load(Ordering::SeqCst),
            data: bank.data.load(Ordering::SeqCst),
            result: bank.result.load(Ordering::SeqCst),
        }
    }

    /// Flags raised by `core`, not yet acknowledged
    pub fn raised_by(&self, core: Core) -> IpcFlags {
        IpcFlags::from_bits_retain(self.flags_of(core).load(Ordering::SeqCst))
    }

    fn flags_of(&self, core: Core) -> &AtomicU32 {
        match core {
            Core::Ctrl => &self.ctom_flags,
            Core::Master => &self.mtoc_flags,
        }
    }

    fn allow_of(&self, core: Core) -> &AtomicBool {
        match core {
            Core::Ctrl => &self.ctrl_allow,
            Core::Master => &self.master_allow,
        }
    }

    fn resolve(&self, core: Core, address: u32) -> Option<(Region, usize)> {
        let found = match core {
            Core::Ctrl => resolve_ctrl(address),
            Core::Master => resolve_master(address),
        };
        if found.is_none() {
            self.faults.fetch_add(1, Ordering::SeqCst);
        }
        found
    }

    fn cell(&self, region: Region, index: usize) -> &AtomicU16 {
        match region {
            Region::CtrlRam => &self.ctrl_ram[index],
            Region::MasterRam => &self.master_ram[index],
            Region::Sx(_) => &self.sx[index],
            Region::CtoMMsg => &self.ctom_msg[index],
            Region::MtoCMsg => &self.mtoc_msg[index],
            Region::Select => unreachable!("the select register is not RAM"),
        }
    }

    fn may_write(&self, core: Core, region: Region) -> bool {
        match region {
            Region::CtrlRam | Region::CtoMMsg => core == Core::Ctrl,
            Region::MasterRam | Region::MtoCMsg => core == Core::Master,
            Region::Sx(block) => {
                let ctrl_owns = self.msxmsel.load(Ordering::SeqCst) & (1 << block) != 0;
                ctrl_owns == (core == Core::Ctrl)
            }
            Region::Select => core == Core::Master && self.master_allow.load(Ordering::SeqCst),
        }
    }

    fn read16(&self, core: Core, address: u32) -> u16 {
        match self.resolve(core, address) {
            Some((Region::Select, half)) => {
                (self.msxmsel.load(Ordering::SeqCst) >> (16 * half)) as u16
            }
            Some((region, index)) => self.cell(region, index).load(Ordering::SeqCst),
            None => 0,
        }
    }

    fn write16(&self, core: Core, address: u32, value: u16) {
        let Some((region, index)) = self.resolve(core, address) else {
            return;
        };
        if !self.may_write(core, region) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
            return;
        }
        match region {
            Region::Select => {
                let shift = 16 * index as u32;
                let old = self.msxmsel.load(Ordering::SeqCst);
                let new = (old & !(0xFFFF << shift)) | (u32::from(value) << shift);
                self.msxmsel.store(new, Ordering::SeqCst);
            }
            _ => self.cell(region, index).store(value, Ordering::SeqCst),
        }
    }
}

fn within(address: u32, start: u32, len: u32) -> Option<u32> {
    address.checked_sub(start).filter(|off| *off < len)
}

fn resolve_ctrl(address: u32) -> Option<(Region, usize)> {
    if let Some(off) = within(address, CTRL_RAM_START, CTRL_RAM_WORDS) {
        Some((Region::CtrlRam, off as usize))
    } else if let Some(off) = within(address, CTRL_SX_START, SX_WORDS) {
        Some((Region::Sx(off / SX_BLOCK_WORDS), off as usize))
    } else if let Some(off) = within(address, CTRL_CTOM_MSGRAM_START, MSGRAM_WORDS) {
        Some((Region::CtoMMsg, off as usize))
    } else {
        within(address, CTRL_MTOC_MSGRAM_START, MSGRAM_WORDS)
            .map(|off| (Region::MtoCMsg, off as usize))
    }
}

fn resolve_master(address: u32) -> Option<(Region, usize)> {
    if address % 2 != 0 {
        return None;
    }
    if let Some(off) = within(address, MSXMSEL, 4) {
        return Some((Region::Select, (off / 2) as usize));
    }
    let word = |start: u32, words: u32| within(address, start, 2 * words).map(|off| off / 2);
    if let Some(off) = word(MASTER_RAM_START, MASTER_RAM_WORDS) {
        Some((Region::MasterRam, off as usize))
    } else if let Some(off) = word(MASTER_SX_START, SX_WORDS) {
        Some((Region::Sx(off / SX_BLOCK_WORDS), off as usize))
    } else if let Some(off) = word(MASTER_CTOM_MSGRAM_START, MSGRAM_WORDS) {
        Some((Region::CtoMMsg, off as usize))
    } else {
        word(MASTER_MTOC_MSGRAM_START, MSGRAM_WORDS).map(|off| (Region::MtoCMsg, off as usize))
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Marker for one side of the board
pub trait Side: sealed::Sealed {
    /// Core this side stands for
    const CORE: Core;
    /// Address units per 16-bit word on this core
    const UNITS: u32;
}

/// The C28x control core
pub enum Ctrl {}
/// The Cortex-M3 master core
pub enum Master {}

impl sealed::Sealed for Ctrl {}
impl sealed::Sealed for Master {}

impl Side for Ctrl {
    const CORE: Core = Core::Ctrl;
    const UNITS: u32 = 1;
}

impl Side for Master {
    const CORE: Core = Core::Master;
    const UNITS: u32 = 2;
}

/// One core's view of a [`Board`]
pub struct CoreView<'b, S: Side> {
    board: &'b Board,
    side: PhantomData<S>,
}

/// View of the control core
pub type CtrlView<'b> = CoreView<'b, Ctrl>;
/// View of the master core
pub type MasterView<'b> = CoreView<'b, Master>;

impl<S: Side> Clone for CoreView<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: Side> Copy for CoreView<'_, S> {}

impl<'b, S: Side> CoreView<'b, S> {
    const fn new(board: &'b Board) -> Self {
        Self {
            board,
            side: PhantomData,
        }
    }

    /// Core this view belongs to
    pub const fn core(&self) -> Core {
        S::CORE
    }

    /// The board behind this view
    pub const fn board(&self) -> &'b Board {
        self.board
    }

    fn lite_out(&self) -> &LiteBank {
        match S::CORE {
            Core::Ctrl => &self.board.ctom_lite,
            Core::Master => &self.board.mtoc_lite,
        }
    }

    fn lite_in(&self) -> &LiteBank {
        match S::CORE {
            Core::Ctrl => &self.board.mtoc_lite,
            Core::Master => &self.board.ctom_lite,
        }
    }
}

impl<S: Side> FlagRegisters for CoreView<'_, S> {
    fn set(&self, flags: IpcFlags) {
        self.board
            .flags_of(S::CORE)
            .fetch_or(flags.bits(), Ordering::SeqCst);
    }

    fn clear(&self, flags: IpcFlags) {
        self.board
            .flags_of(S::CORE)
            .fetch_and(!flags.bits(), Ordering::SeqCst);
    }

    fn outgoing(&self) -> IpcFlags {
        self.board.raised_by(S::CORE)
    }

    fn incoming(&self) -> IpcFlags {
        self.board.raised_by(S::CORE.peer())
    }

    fn acknowledge(&self, flags: IpcFlags) {
        self.board
            .flags_of(S::CORE.peer())
            .fetch_and(!flags.bits(), Ordering::SeqCst);
    }
}

impl<S: Side> CommandRegisters for CoreView<'_, S> {
    fn set_command(&self, command: u32) {
        self.lite_out().command.store(command, Ordering::SeqCst);
    }

    fn set_address(&self, address: u32) {
        self.lite_out().address.store(address, Ordering::SeqCst);
    }

    fn set_data(&self, data: u32) {
        self.lite_out().data.store(data, Ordering::SeqCst);
    }

    fn result(&self) -> u32 {
        self.lite_out().result.load(Ordering::SeqCst)
    }

    fn incoming_command(&self) -> u32 {
        self.lite_in().command.load(Ordering::SeqCst)
    }

    fn incoming_address(&self) -> u32 {
        self.lite_in().address.load(Ordering::SeqCst)
    }

    fn incoming_data(&self) -> u32 {
        self.lite_in().data.load(Ordering::SeqCst)
    }

    fn set_incoming_result(&self, value: u32) {
        self.lite_in().result.store(value, Ordering::SeqCst);
    }
}

impl<S: Side> AddressSpace for CoreView<'_, S> {
    const UNITS_PER_HALFWORD: u32 = S::UNITS;

    fn read16(&self, address: u32) -> u16 {
        self.board.read16(S::CORE, address)
    }

    fn write16(&self, address: u32, value: u16) {
        self.board.write16(S::CORE, address, value)
    }

    fn read32(&self, address: u32) -> u32 {
        let lo = self.read16(address);
        let hi = self.read16(address + S::UNITS);
        u32::from(lo) | (u32::from(hi) << 16)
    }

    fn write32(&self, address: u32, value: u32) {
        self.write16(address, value as u16);
        self.write16(address + S::UNITS, (value >> 16) as u16);
    }
}

impl<S: Side> WriteProtect for CoreView<'_, S> {
    fn allow_writes(&self) {
        self.board.allow_of(S::CORE).store(true, Ordering::SeqCst);
    }

    fn protect_writes(&self) {
        self.board.allow_of(S::CORE).store(false, Ordering::SeqCst);
    }

    fn writes_allowed(&self) -> bool {
        self.board.allow_of(S::CORE).load(Ordering::SeqCst)
    }
}

impl<S: Side> OwnershipStatus for CoreView<'_, S> {
    fn ctrl_owned(&self) -> SxMask {
        self.board.ctrl_owned()
    }
}

/// Only the master core can reach the select register.
impl SelectRegister for MasterView<'_> {
    fn assign_to_ctrl(&self, blocks: SxMask) {
        let v = self.read32(MSXMSEL);
        self.write32(MSXMSEL, v | blocks.bits());
    }

    fn assign_to_master(&self, blocks: SxMask) {
        let v = self.read32(MSXMSEL);
        self.write32(MSXMSEL, v & !blocks.bits());
    }
}

/// The queue pair behind one interrupt channel
///
/// ```
/// use f28m35_ipc::flags::IpcInterrupt;
/// use f28m35_ipc::sim::{Board, Link};
///
/// static BOARD: Board = Board::new();
/// let (ctrl, master) = (BOARD.ctrl(), BOARD.master());
/// let mut link: Link = Link::new();
/// let (c, m) = link.controllers(&ctrl, &master, IpcInterrupt::Int1);
/// assert_eq!(c.in_flight(), 0);
/// assert!(!m.has_pending());
/// ```
pub struct Link<const N: usize = DEFAULT_QUEUE_DEPTH> {
    ctrl_to_master: MailboxQueue<N>,
    master_to_ctrl: MailboxQueue<N>,
}

impl<const N: usize> Default for Link<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Link<N> {
    /// Two empty queues
    pub const fn new() -> Self {
        Self {
            ctrl_to_master: MailboxQueue::new(),
            master_to_ctrl: MailboxQueue::new(),
        }
    }

    /// Both ends of the channel, signalling on `channel` in each direction.
    pub fn controllers<'a>(
        &'a mut self,
        ctrl: &'a CtrlView<'a>,
        master: &'a MasterView<'a>,
        channel: IpcInterrupt,
    ) -> (
        IpcController<'a, CtrlView<'a>, N>,
        IpcController<'a, MasterView<'a>, N>,
    ) {
        let (ctom_put, ctom_get) = self.ctrl_to_master.split();
        let (mtoc_put, mtoc_get) = self.master_to_ctrl.split();
        (
            IpcController::new(ctrl, Core::Ctrl, ctom_put, mtoc_get, channel, channel),
            IpcController::new(master, Core::Master, mtoc_put, ctom_get, channel, channel),
        )
    }
}

/// Fault injector that corrupts one write
///
/// Wraps an [`AddressSpace`]. While armed, the next 16-bit write to
/// `target` lands with `pattern` XORed into it, then the injector disarms.
pub struct Corrupting<'a, M: AddressSpace> {
    inner: &'a M,
    target: u32,
    pattern: u16,
    armed: AtomicBool,
    fired: AtomicU32,
}

impl<'a, M: AddressSpace> Corrupting<'a, M> {
    /// A disarmed injector over `inner`
    pub const fn new(inner: &'a M, target: u32, pattern: u16) -> Self {
        Self {
            inner,
            target,
            pattern,
            armed: AtomicBool::new(false),
            fired: AtomicU32::new(0),
        }
    }

    /// Corrupt the next write to the target.
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Writes corrupted so far
    pub fn fired(&self) -> u32 {
        self.fired.load(Ordering::SeqCst)
    }
}

impl<M: AddressSpace> AddressSpace for Corrupting<'_, M> {
    const UNITS_PER_HALFWORD: u32 = M::UNITS_PER_HALFWORD;

    fn read16(&self, address: u32) -> u16 {
        self.inner.read16(address)
    }

    fn write16(&self, address: u32, value: u16) {
        if address == self.target && self.armed.swap(false, Ordering::SeqCst) {
            self.fired.fetch_add(1, Ordering::SeqCst);
            self.inner.write16(address, value ^ self.pattern);
        } else {
            self.inner.write16(address, value);
        }
    }

    fn read32(&self, address: u32) -> u32 {
        self.inner.read32(address)
    }

    fn write32(&self, address: u32, value: u32) {
        self.write16(address, value as u16);
        self.write16(address + M::UNITS_PER_HALFWORD, (value >> 16) as u16);
    }
}

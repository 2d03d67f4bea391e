//! Shared RAM map and address translation
//!
//! The control core addresses memory in 16-bit words, the master core in
//! bytes. Shared memory comes in two kinds: the two message RAMs (one
//! writable by each core) and the eight Sx blocks whose write access is
//! handed between the cores. The same physical word has a different
//! address on each side, so any address that is handed over to the peer
//! has to be translated first.

/// Identity of a core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Core {
    /// The C28x real-time control core (word addressed)
    Ctrl,
    /// The Cortex-M3 supervisory core (byte addressed)
    Master,
}

impl Core {
    /// The other core
    pub const fn peer(self) -> Core {
        match self {
            Core::Ctrl => Core::Master,
            Core::Master => Core::Ctrl,
        }
    }

    /// Translate an address of shared memory from this core's view to the
    /// peer's view.
    pub const fn to_peer(self, address: u32) -> u32 {
        match self {
            Core::Ctrl => ctrl_to_master(address),
            Core::Master => master_to_ctrl(address),
        }
    }
}

/// First word of the Sx blocks, control core view
pub const CTRL_SX_START: u32 = 0x0000_C000;
/// Size of one Sx block, in 16-bit words
pub const SX_BLOCK_WORDS: u32 = 0x1000;
/// Number of Sx blocks
pub const SX_BLOCKS: u32 = 8;
/// First word of the control-to-master message RAM, control core view
pub const CTRL_CTOM_MSGRAM_START: u32 = 0x0003_F800;
/// First word of the master-to-control message RAM, control core view
pub const CTRL_MTOC_MSGRAM_START: u32 = 0x0003_FC00;
/// Size of one message RAM, in 16-bit words
pub const MSGRAM_WORDS: u32 = 0x400;

/// First byte of the Sx blocks, master core view
pub const MASTER_SX_START: u32 = ctrl_to_master(CTRL_SX_START);
/// First byte of the control-to-master message RAM, master core view
pub const MASTER_CTOM_MSGRAM_START: u32 = ctrl_to_master(CTRL_CTOM_MSGRAM_START);
/// First byte of the master-to-control message RAM, master core view
pub const MASTER_MTOC_MSGRAM_START: u32 = ctrl_to_master(CTRL_MTOC_MSGRAM_START);

const MSGRAM_OFFSET: u32 = 0x2000_0000;
const SX_OFFSET: u32 = 0x1FFF_0000;

/// Translate a control core word address to the master core byte address
/// of the same shared word.
pub const fn ctrl_to_master(address: u32) -> u32 {
    if address >= CTRL_CTOM_MSGRAM_START {
        (address << 1).wrapping_add(MSGRAM_OFFSET)
    } else {
        (address << 1).wrapping_add(SX_OFFSET)
    }
}

/// Translate a master core byte address to the control core word address
/// of the same shared word.
pub const fn master_to_ctrl(address: u32) -> u32 {
    if address >= MASTER_CTOM_MSGRAM_START {
        address.wrapping_sub(MSGRAM_OFFSET) >> 1
    } else {
        address.wrapping_sub(SX_OFFSET) >> 1
    }
}

bitflags::bitflags! {
    /// A set of Sx blocks
    ///
    /// Bit `k` is block S`k`, matching the master-select register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SxMask: u32 {
        /// Block S0
        const S0 = 1 << 0;
        /// Block S1
        const S1 = 1 << 1;
        /// Block S2
        const S2 = 1 << 2;
        /// Block S3
        const S3 = 1 << 3;
        /// Block S4
        const S4 = 1 << 4;
        /// Block S5
        const S5 = 1 << 5;
        /// Block S6
        const S6 = 1 << 6;
        /// Block S7
        const S7 = 1 << 7;
        /// All eight blocks
        const ALL = 0xFF;
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SxMask {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "SxMask({=u32:#x})", self.bits())
    }
}

impl SxMask {
    /// Sx block containing a control core word address, if any
    pub const fn block_of(ctrl_address: u32) -> Option<u32> {
        let end = CTRL_SX_START + SX_BLOCKS * SX_BLOCK_WORDS;
        if ctrl_address >= CTRL_SX_START && ctrl_address < end {
            Some((ctrl_address - CTRL_SX_START) / SX_BLOCK_WORDS)
        } else {
            None
        }
    }

    /// First word of block `k`, control core view
    pub const fn ctrl_start(block: u32) -> u32 {
        CTRL_SX_START + block * SX_BLOCK_WORDS
    }
}

//! Inter-processor flags
//!
//! Each direction of the IPC fabric has 32 flags. Setting a flag on the
//! local side raises it on the peer's incoming status register; the peer
//! clears it by acknowledging. Flags 1 to 4 also raise the peer's IPC
//! interrupts, flags 1 to 16 are general purpose request flags and flags 17
//! to 32 are reserved to track responses to outstanding requests.

/// Number of IPC flags that raise an interrupt on the peer core
pub const NUM_IPC_INTERRUPTS: usize = 4;

bitflags::bitflags! {
    /// A set of IPC flags
    ///
    /// Bit `n - 1` is flag `n`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IpcFlags: u32 {
        /// Flags 1 to 16
        const REQUEST = 0x0000_FFFF;
        /// Flags 17 to 32
        const RESPONSE = 0xFFFF_0000;
    }
}

impl IpcFlags {
    /// Single flag `n`, counting from 1.
    ///
    /// # Panics
    ///
    /// Panics (at compile time when used in a const) if `n` is not in 1..=32.
    pub const fn flag(n: u8) -> Self {
        assert!(n >= 1 && n <= 32, "IPC flags are numbered 1 to 32");
        Self::from_bits_retain(1 << (n - 1))
    }

    /// The part of the set that lies in the response range (flags 17 to 32).
    ///
    /// This is what travels in the high half of a message's first data
    /// word.
    pub const fn response_part(self) -> Self {
        Self::from_bits_retain(self.bits() & Self::RESPONSE.bits())
    }

    /// Is this a usable response flag set: not empty and entirely within
    /// flags 17 to 32?
    pub const fn is_response(self) -> bool {
        !self.is_empty() && Self::RESPONSE.contains(self)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for IpcFlags {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "IpcFlags({=u32:#x})", self.bits())
    }
}

macro_rules! ipc_flag {
    ($first:expr, $($rest:tt),+) => {
        ipc_flag!($first);
        ipc_flag!($($rest),+);
    };
    ($id:expr) => {
        $crate::paste::paste! {
            /// IPC flag number $id
            pub const [<IPC_FLAG $id>]: IpcFlags = IpcFlags::flag($id);
        }
    };
}
ipc_flag!(
    1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 22, 23, 24, 25, 26,
    27, 28, 29, 30, 31, 32
);

/// One of the four interrupt-raising IPC channels
///
/// A controller bound to a channel raises the channel's flag on the peer
/// after every message it puts, and the peer's handler for that interrupt
/// drains the matching queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IpcInterrupt {
    /// IPC interrupt 1, flag 1
    Int1 = 1,
    /// IPC interrupt 2, flag 2
    Int2 = 2,
    /// IPC interrupt 3, flag 3
    Int3 = 3,
    /// IPC interrupt 4, flag 4
    Int4 = 4,
}

impl IpcInterrupt {
    /// The flag that raises this interrupt
    pub const fn flag(self) -> IpcFlags {
        IpcFlags::flag(self as u8)
    }

    /// Zero based index, usable to pick per-channel state
    pub const fn index(self) -> usize {
        self as usize - 1
    }
}

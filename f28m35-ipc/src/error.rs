//! Errors reported by the IPC layer

use core::fmt;

/// Why an IPC operation did not complete.
///
/// Every operation returns its status as a value. There is no panicking or
/// unwinding path in the protocol code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The put queue had no free slot and the call did not block.
    QueueFull,
    /// The get queue held no message and the call did not block.
    QueueEmpty,
    /// A request or status flag was already asserted.
    FlagBusy,
    /// A bounded wait ran out of polls before its condition held.
    Timeout,
    /// A received message carried a command code outside the known set.
    UnknownCommand(u32),
    /// A length tag was neither the 16-bit nor the 32-bit tag.
    InvalidLength(u16),
    /// A request that expects an answer named no response flag, or a flag
    /// outside flags 17 to 32. Carries the flag bits given.
    InvalidResponseFlag(u32),
    /// A block transfer of more words than its 16-bit length field holds.
    BlockTooLong(usize),
    /// A function call named an address with no registered function.
    NoSuchFunction(u32),
    /// A shared RAM block is not owned the way the caller needs.
    NotOwned,
    /// The lite responder left the status flag set, so it did not carry out
    /// the request.
    Rejected,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::QueueFull => f.write_str("put queue full"),
            Error::QueueEmpty => f.write_str("get queue empty"),
            Error::FlagBusy => f.write_str("IPC flag already asserted"),
            Error::Timeout => f.write_str("timed out waiting on the peer core"),
            Error::UnknownCommand(code) => write!(f, "unknown IPC command {code:#010x}"),
            Error::InvalidLength(tag) => write!(f, "invalid length tag {tag}"),
            Error::InvalidResponseFlag(bits) => write!(f, "invalid response flags {bits:#010x}"),
            Error::BlockTooLong(words) => write!(f, "block of {words} words is too long"),
            Error::NoSuchFunction(addr) => write!(f, "no function at {addr:#010x}"),
            Error::NotOwned => f.write_str("shared RAM block not owned as required"),
            Error::Rejected => f.write_str("request rejected by the peer core"),
        }
    }
}

/// Result type used throughout the crate
pub type Result<T> = core::result::Result<T, Error>;

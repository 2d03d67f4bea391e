//! The IPC message and its command set
//!
//! Every message on the wire is the same four 32-bit words:
//!
//! | word | contents |
//! |---|---|
//! | `command` | [`Command`] code |
//! | `address` | target address, in the receiving core's address space |
//! | `data_word1` | bits 0-15 length tag or count, bits 16-31 response flag or width |
//! | `data_word2` | value, mask, shared RAM address or reply address |
//!
//! The receiver never reinterprets these fields ad hoc. [`Request::decode`]
//! turns a message into an [`Operation`] once, and the handlers only ever
//! see the decoded form.

use crate::error::{Error, Result};
use crate::flags::IpcFlags;
use crate::memory::Width;

/// Bit that marks the protected variant of a command
pub const PROTECTED_BIT: u32 = 1 << 16;

/// Fixed-size message as stored in a mailbox slot
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Message {
    /// Command code
    pub command: u32,
    /// Target address on the receiving core
    pub address: u32,
    /// Length / response flag word
    pub data_word1: u32,
    /// Payload word
    pub data_word2: u32,
}

impl Message {
    /// All-zero message, used to initialise mailbox slots
    pub const EMPTY: Self = Self::new(0, 0, 0, 0);

    /// Assemble a message from its four words
    pub const fn new(command: u32, address: u32, data_word1: u32, data_word2: u32) -> Self {
        Self {
            command,
            address,
            data_word1,
            data_word2,
        }
    }

    /// The first data word as a bit field
    pub fn word1(&self) -> DataWord1 {
        DataWord1(self.data_word1)
    }

    /// Decode this message
    pub fn decode(&self) -> Result<Request> {
        Request::decode(self)
    }
}

bitfield::bitfield! {
    /// First data word of a message
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct DataWord1(u32);
    impl Debug;
    /// Length tag (1 = 16-bit, 2 = 32-bit) or number of block elements
    pub u16, length, set_length: 15, 0;
    /// High half: response flag bits, or the element width tag of a block write
    pub u16, upper, set_upper: 31, 16;
}

impl DataWord1 {
    /// Pack a length and the response-range part of `response`
    pub fn with_response(length: u16, response: IpcFlags) -> Self {
        let mut w = DataWord1(response.response_part().bits());
        w.set_length(length);
        w
    }

    /// Response flags carried in the high half
    pub fn response(&self) -> IpcFlags {
        IpcFlags::from_bits_retain(self.0).response_part()
    }

    /// Raw register representation
    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// The seven remote operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u32)]
pub enum CommandKind {
    /// Read-modify-write: OR a mask into a word
    SetBits = 1,
    /// Read-modify-write: clear the bits of a mask in a word
    ClearBits = 2,
    /// Write one word
    DataWrite = 3,
    /// Copy a block from the receiver's memory into shared RAM
    BlockRead = 4,
    /// Copy a block from shared RAM into the receiver's memory
    BlockWrite = 5,
    /// Read one word and send it back with a data write
    DataRead = 6,
    /// Call a function on the receiving core
    FunctionCall = 7,
}

impl CommandKind {
    /// Every kind, in code order
    pub const ALL: [CommandKind; 7] = [
        CommandKind::SetBits,
        CommandKind::ClearBits,
        CommandKind::DataWrite,
        CommandKind::BlockRead,
        CommandKind::BlockWrite,
        CommandKind::DataRead,
        CommandKind::FunctionCall,
    ];
}

/// A command code: a kind plus whether it runs with write protection lifted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    /// What to do
    pub kind: CommandKind,
    /// Lift write protection around the memory access
    pub protected: bool,
}

impl Command {
    /// Plain variant of `kind`
    pub const fn plain(kind: CommandKind) -> Self {
        Self {
            kind,
            protected: false,
        }
    }

    /// Protected variant of `kind`
    pub const fn protected(kind: CommandKind) -> Self {
        Self {
            kind,
            protected: true,
        }
    }

    /// Wire code
    pub const fn code(self) -> u32 {
        let base = self.kind as u32;
        if self.protected {
            base | PROTECTED_BIT
        } else {
            base
        }
    }

    /// Decode a wire code
    pub const fn from_code(code: u32) -> Result<Self> {
        let kind = match code & !PROTECTED_BIT {
            1 => CommandKind::SetBits,
            2 => CommandKind::ClearBits,
            3 => CommandKind::DataWrite,
            4 => CommandKind::BlockRead,
            5 => CommandKind::BlockWrite,
            6 => CommandKind::DataRead,
            7 => CommandKind::FunctionCall,
            _ => return Err(Error::UnknownCommand(code)),
        };
        Ok(Self {
            kind,
            protected: code & PROTECTED_BIT != 0,
        })
    }
}

/// A single data value with its width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operand {
    /// 16-bit value
    Word16(u16),
    /// 32-bit value
    Word32(u32),
}

impl Operand {
    /// Build an operand of `width`, truncating `value`
    pub const fn new(width: Width, value: u32) -> Self {
        match width {
            Width::Bits16 => Operand::Word16(value as u16),
            Width::Bits32 => Operand::Word32(value),
        }
    }

    /// Width of the value
    pub const fn width(self) -> Width {
        match self {
            Operand::Word16(_) => Width::Bits16,
            Operand::Word32(_) => Width::Bits32,
        }
    }

    /// The value, zero extended
    pub const fn value(self) -> u32 {
        match self {
            Operand::Word16(v) => v as u32,
            Operand::Word32(v) => v,
        }
    }
}

/// A decoded remote operation
///
/// Addresses are in the receiving core's address space, including the
/// shared RAM addresses of block transfers, which the sender translated
/// before sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Operation {
    /// Read `width` at `address`, send it back to `reply_to` with a data
    /// write carrying `response`.
    DataRead {
        /// Address to read, on the receiver
        address: u32,
        /// Element width
        width: Width,
        /// Address on the requester that receives the value
        reply_to: u32,
        /// Flag the requester is waiting on
        response: IpcFlags,
    },
    /// Write `value` at `address`, then withdraw `response` if it is set.
    DataWrite {
        /// Address to write
        address: u32,
        /// Value to write
        value: Operand,
        /// Flag to withdraw after writing, if this answers a data read
        response: IpcFlags,
    },
    /// OR `mask` into the word at `address`.
    SetBits {
        /// Address to modify
        address: u32,
        /// Bits to set
        mask: Operand,
    },
    /// Clear the bits of `mask` in the word at `address`.
    ClearBits {
        /// Address to modify
        address: u32,
        /// Bits to clear
        mask: Operand,
    },
    /// Copy `words` 16-bit words from `address` to `shared`, then
    /// acknowledge `response`.
    BlockRead {
        /// Source on the receiver
        address: u32,
        /// Destination in shared RAM
        shared: u32,
        /// Number of 16-bit words
        words: u16,
        /// Flag the requester is waiting on
        response: IpcFlags,
    },
    /// Copy `count` elements of `width` from `shared` to `address`.
    BlockWrite {
        /// Destination on the receiver
        address: u32,
        /// Source in shared RAM
        shared: u32,
        /// Number of elements
        count: u16,
        /// Element width
        width: Width,
    },
    /// Call the function at `address` with `param`. Nothing is sent back.
    FunctionCall {
        /// Function address on the receiver
        address: u32,
        /// Single argument
        param: u32,
    },
}

impl Operation {
    /// Kind of command that carries this operation
    pub const fn kind(&self) -> CommandKind {
        match self {
            Operation::DataRead { .. } => CommandKind::DataRead,
            Operation::DataWrite { .. } => CommandKind::DataWrite,
            Operation::SetBits { .. } => CommandKind::SetBits,
            Operation::ClearBits { .. } => CommandKind::ClearBits,
            Operation::BlockRead { .. } => CommandKind::BlockRead,
            Operation::BlockWrite { .. } => CommandKind::BlockWrite,
            Operation::FunctionCall { .. } => CommandKind::FunctionCall,
        }
    }
}

/// An operation together with its protection setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Request {
    /// What to do
    pub operation: Operation,
    /// Lift write protection around the memory access
    pub protected: bool,
}

impl Request {
    /// Plain request
    pub const fn plain(operation: Operation) -> Self {
        Self {
            operation,
            protected: false,
        }
    }

    /// Protected request
    pub const fn protected(operation: Operation) -> Self {
        Self {
            operation,
            protected: true,
        }
    }

    /// Command code this request is sent with
    pub const fn command(&self) -> Command {
        Command {
            kind: self.operation.kind(),
            protected: self.protected,
        }
    }

    /// Build the wire message
    pub fn encode(&self) -> Message {
        let command = self.command().code();
        match self.operation {
            Operation::DataRead {
                address,
                width,
                reply_to,
                response,
            } => Message::new(
                command,
                address,
                DataWord1::with_response(width.tag(), response).bits(),
                reply_to,
            ),
            Operation::DataWrite {
                address,
                value,
                response,
            } => Message::new(
                command,
                address,
                DataWord1::with_response(value.width().tag(), response).bits(),
                value.value(),
            ),
            Operation::SetBits { address, mask } | Operation::ClearBits { address, mask } => {
                Message::new(command, address, u32::from(mask.width().tag()), mask.value())
            }
            Operation::BlockRead {
                address,
                shared,
                words,
                response,
            } => Message::new(
                command,
                address,
                DataWord1::with_response(words, response).bits(),
                shared,
            ),
            Operation::BlockWrite {
                address,
                shared,
                count,
                width,
            } => {
                let mut w1 = DataWord1(0);
                w1.set_length(count);
                w1.set_upper(width.tag());
                Message::new(command, address, w1.bits(), shared)
            }
            Operation::FunctionCall { address, param } => Message::new(command, address, param, 0),
        }
    }

    /// Decode a wire message
    ///
    /// Fails with [`Error::UnknownCommand`] for a code outside the command
    /// set and [`Error::InvalidLength`] for a bad width tag.
    pub fn decode(msg: &Message) -> Result<Self> {
        let command = Command::from_code(msg.command)?;
        let w1 = msg.word1();
        let address = msg.address;
        let operation = match command.kind {
            CommandKind::DataRead => Operation::DataRead {
                address,
                width: Width::from_tag(w1.length())?,
                reply_to: msg.data_word2,
                response: w1.response(),
            },
            CommandKind::DataWrite => Operation::DataWrite {
                address,
                value: Operand::new(Width::from_tag(w1.length())?, msg.data_word2),
                response: w1.response(),
            },
            CommandKind::SetBits => Operation::SetBits {
                address,
                mask: Operand::new(Width::from_tag(w1.length())?, msg.data_word2),
            },
            CommandKind::ClearBits => Operation::ClearBits {
                address,
                mask: Operand::new(Width::from_tag(w1.length())?, msg.data_word2),
            },
            CommandKind::BlockRead => Operation::BlockRead {
                address,
                shared: msg.data_word2,
                words: w1.length(),
                response: w1.response(),
            },
            CommandKind::BlockWrite => Operation::BlockWrite {
                address,
                shared: msg.data_word2,
                count: w1.length(),
                width: Width::from_tag(w1.upper())?,
            },
            CommandKind::FunctionCall => Operation::FunctionCall {
                address,
                param: msg.data_word1,
            },
        };
        Ok(Self {
            operation,
            protected: command.protected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{IPC_FLAG17, IPC_FLAG20, IPC_FLAG3};

    fn sample(kind: CommandKind) -> Operation {
        match kind {
            CommandKind::DataRead => Operation::DataRead {
                address: 0x2000_1000,
                width: Width::Bits32,
                reply_to: 0x0000_9000,
                response: IPC_FLAG20,
            },
            CommandKind::DataWrite => Operation::DataWrite {
                address: 0x1000,
                value: Operand::Word16(0x42),
                response: IPC_FLAG17,
            },
            CommandKind::SetBits => Operation::SetBits {
                address: 0x400F_B210,
                mask: Operand::Word32(0x0000_0001),
            },
            CommandKind::ClearBits => Operation::ClearBits {
                address: 0x1002,
                mask: Operand::Word16(0x00F0),
            },
            CommandKind::BlockRead => Operation::BlockRead {
                address: 0x2000_0400,
                shared: 0x2000_8000,
                words: 88,
                response: IPC_FLAG17,
            },
            CommandKind::BlockWrite => Operation::BlockWrite {
                address: 0x2000_0400,
                shared: 0x2000_8000,
                count: 44,
                width: Width::Bits32,
            },
            CommandKind::FunctionCall => Operation::FunctionCall {
                address: 0x0001_2345,
                param: 0xDEAD_BEEF,
            },
        }
    }

    #[test]
    fn every_command_survives_the_wire() {
        for kind in CommandKind::ALL {
            for protected in [false, true] {
                let req = Request {
                    operation: sample(kind),
                    protected,
                };
                let msg = req.encode();
                assert_eq!(msg.command & PROTECTED_BIT != 0, protected);
                assert_eq!(msg.decode(), Ok(req), "{kind:?} protected={protected}");
            }
        }
    }

    #[test]
    fn command_codes() {
        assert_eq!(Command::plain(CommandKind::SetBits).code(), 0x0000_0001);
        assert_eq!(
            Command::protected(CommandKind::ClearBits).code(),
            0x0001_0002
        );
        assert_eq!(
            Command::from_code(0x0001_0007),
            Ok(Command::protected(CommandKind::FunctionCall))
        );
        assert_eq!(Command::from_code(0), Err(Error::UnknownCommand(0)));
        assert_eq!(Command::from_code(8), Err(Error::UnknownCommand(8)));
        assert_eq!(
            Command::from_code(0x0002_0001),
            Err(Error::UnknownCommand(0x0002_0001))
        );
    }

    #[test]
    fn word1_layout() {
        let msg = Request::plain(sample(CommandKind::DataRead)).encode();
        assert_eq!(msg.data_word1, 0x0008_0002);
        let msg = Request::plain(sample(CommandKind::BlockWrite)).encode();
        assert_eq!(msg.data_word1, (2 << 16) | 44);
        let msg = Request::plain(sample(CommandKind::FunctionCall)).encode();
        assert_eq!(msg.data_word1, 0xDEAD_BEEF);
        assert_eq!(msg.data_word2, 0);
    }

    #[test]
    fn request_range_flags_are_not_sent() {
        let op = Operation::DataWrite {
            address: 0,
            value: Operand::Word32(1),
            response: IPC_FLAG3 | IPC_FLAG17,
        };
        let msg = Request::plain(op).encode();
        assert_eq!(msg.word1().response(), IPC_FLAG17);
    }

    #[test]
    fn bad_length_tag() {
        let msg = Message::new(3, 0x1000, 16, 0x42);
        assert_eq!(msg.decode(), Err(Error::InvalidLength(16)));
    }
}

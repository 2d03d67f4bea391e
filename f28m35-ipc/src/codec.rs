//! Requester side of the command set
//!
//! Each function builds one [`Request`], encodes it and puts it on the
//! controller's queue. The result is the put's result: `Ok(())` once the
//! message is queued, not once the peer has carried it out. Requests that
//! expect an answer (data read, block read) raise their response flag
//! before queuing; the peer withdraws or acknowledges it when the answer is
//! in place, so waiting for the flag to drop is how the caller learns the
//! round trip finished. Function calls have no completion signal at all.
//!
//! Shared RAM addresses of block transfers are given in the caller's own
//! address space and translated for the peer here.

use crate::blocking::Blocking;
use crate::error::{Error, Result};
use crate::fabric::{flag_busy, FlagRegisters};
use crate::flags::IpcFlags;
use crate::memory::Width;
use crate::message::{Message, Operand, Operation, Request};

use crate::controller::IpcController;

impl<F: FlagRegisters + ?Sized, const N: usize> IpcController<'_, F, N> {
    /// Encode and queue `request`.
    ///
    /// A data read or block read needs a response flag within flags 17 to
    /// 32 that is not already raised by an earlier request; otherwise the
    /// call fails with [`Error::InvalidResponseFlag`] or
    /// [`Error::FlagBusy`] and nothing is queued. If the put itself fails,
    /// the response flag is dropped again.
    pub fn send(&mut self, request: &Request, blocking: Blocking) -> Result<()> {
        let msg = request.encode();
        match request.operation {
            Operation::DataRead { response, .. } | Operation::BlockRead { response, .. } => {
                if !response.is_response() {
                    return Err(Error::InvalidResponseFlag(response.bits()));
                }
                if flag_busy(self.fabric(), response) {
                    return Err(Error::FlagBusy);
                }
                self.fabric().set(response);
                let res = self.put(&msg, blocking);
                if res.is_err() {
                    self.fabric().clear(response);
                }
                res
            }
            _ => self.put(&msg, blocking),
        }
    }

    /// Queue a caller-built message unchanged.
    pub fn send_message(&mut self, msg: &Message, blocking: Blocking) -> Result<()> {
        self.put(msg, blocking)
    }

    fn data_read_inner(
        &mut self,
        protected: bool,
        address: u32,
        reply_to: u32,
        width: Width,
        blocking: Blocking,
        response: IpcFlags,
    ) -> Result<()> {
        let op = Operation::DataRead {
            address,
            width,
            reply_to,
            response,
        };
        self.send(&Request { operation: op, protected }, blocking)
    }

    /// Ask the peer for the word at `address`.
    ///
    /// The value is written to `reply_to` on this core by a data write from
    /// the peer, which then withdraws `response`. Poll
    /// [`crate::fabric::flag_busy`] on `response` to know when it has landed.
    pub fn data_read(
        &mut self,
        address: u32,
        reply_to: u32,
        width: Width,
        blocking: Blocking,
        response: IpcFlags,
    ) -> Result<()> {
        self.data_read_inner(false, address, reply_to, width, blocking, response)
    }

    /// [`data_read`](Self::data_read) of a write-protected location
    pub fn data_read_protected(
        &mut self,
        address: u32,
        reply_to: u32,
        width: Width,
        blocking: Blocking,
        response: IpcFlags,
    ) -> Result<()> {
        self.data_read_inner(true, address, reply_to, width, blocking, response)
    }

    fn data_write_inner(
        &mut self,
        protected: bool,
        address: u32,
        value: u32,
        width: Width,
        blocking: Blocking,
        response: IpcFlags,
    ) -> Result<()> {
        let op = Operation::DataWrite {
            address,
            value: Operand::new(width, value),
            response,
        };
        self.send(&Request { operation: op, protected }, blocking)
    }

    /// Write `value` to `address` on the peer.
    ///
    /// `response` is the flag the peer withdraws on its side once written,
    /// which is how a data read is answered; pass [`IpcFlags::empty()`]
    /// otherwise.
    pub fn data_write(
        &mut self,
        address: u32,
        value: u32,
        width: Width,
        blocking: Blocking,
        response: IpcFlags,
    ) -> Result<()> {
        self.data_write_inner(false, address, value, width, blocking, response)
    }

    /// [`data_write`](Self::data_write) to a write-protected location
    pub fn data_write_protected(
        &mut self,
        address: u32,
        value: u32,
        width: Width,
        blocking: Blocking,
        response: IpcFlags,
    ) -> Result<()> {
        self.data_write_inner(true, address, value, width, blocking, response)
    }

    /// Set the bits of `mask` in the word at `address` on the peer.
    pub fn set_bits(
        &mut self,
        address: u32,
        mask: u32,
        width: Width,
        blocking: Blocking,
    ) -> Result<()> {
        let op = Operation::SetBits {
            address,
            mask: Operand::new(width, mask),
        };
        self.send(&Request::plain(op), blocking)
    }

    /// [`set_bits`](Self::set_bits) on a write-protected register
    pub fn set_bits_protected(
        &mut self,
        address: u32,
        mask: u32,
        width: Width,
        blocking: Blocking,
    ) -> Result<()> {
        let op = Operation::SetBits {
            address,
            mask: Operand::new(width, mask),
        };
        self.send(&Request::protected(op), blocking)
    }

    /// Clear the bits of `mask` in the word at `address` on the peer.
    pub fn clear_bits(
        &mut self,
        address: u32,
        mask: u32,
        width: Width,
        blocking: Blocking,
    ) -> Result<()> {
        let op = Operation::ClearBits {
            address,
            mask: Operand::new(width, mask),
        };
        self.send(&Request::plain(op), blocking)
    }

    /// [`clear_bits`](Self::clear_bits) on a write-protected register
    pub fn clear_bits_protected(
        &mut self,
        address: u32,
        mask: u32,
        width: Width,
        blocking: Blocking,
    ) -> Result<()> {
        let op = Operation::ClearBits {
            address,
            mask: Operand::new(width, mask),
        };
        self.send(&Request::protected(op), blocking)
    }

    fn block_read_inner(
        &mut self,
        protected: bool,
        address: u32,
        share_address: u32,
        words: u16,
        blocking: Blocking,
        response: IpcFlags,
    ) -> Result<()> {
        let op = Operation::BlockRead {
            address,
            shared: self.core().to_peer(share_address),
            words,
            response,
        };
        self.send(&Request { operation: op, protected }, blocking)
    }

    /// Have the peer copy `words` 16-bit words from its `address` into
    /// shared RAM at `share_address` (our view).
    ///
    /// The peer acknowledges `response` once the copy is complete. The
    /// peer must own the shared block at that point.
    pub fn block_read(
        &mut self,
        address: u32,
        share_address: u32,
        words: u16,
        blocking: Blocking,
        response: IpcFlags,
    ) -> Result<()> {
        self.block_read_inner(false, address, share_address, words, blocking, response)
    }

    /// [`block_read`](Self::block_read) into a write-protected region
    pub fn block_read_protected(
        &mut self,
        address: u32,
        share_address: u32,
        words: u16,
        blocking: Blocking,
        response: IpcFlags,
    ) -> Result<()> {
        self.block_read_inner(true, address, share_address, words, blocking, response)
    }

    fn block_write_inner(
        &mut self,
        protected: bool,
        address: u32,
        share_address: u32,
        count: u16,
        width: Width,
        blocking: Blocking,
    ) -> Result<()> {
        let op = Operation::BlockWrite {
            address,
            shared: self.core().to_peer(share_address),
            count,
            width,
        };
        self.send(&Request { operation: op, protected }, blocking)
    }

    /// Have the peer copy `count` elements from shared RAM at
    /// `share_address` (our view) to its `address`.
    ///
    /// There is no completion signal; the peer only reads the shared block.
    pub fn block_write(
        &mut self,
        address: u32,
        share_address: u32,
        count: u16,
        width: Width,
        blocking: Blocking,
    ) -> Result<()> {
        self.block_write_inner(false, address, share_address, count, width, blocking)
    }

    /// [`block_write`](Self::block_write) into a write-protected region
    pub fn block_write_protected(
        &mut self,
        address: u32,
        share_address: u32,
        count: u16,
        width: Width,
        blocking: Blocking,
    ) -> Result<()> {
        self.block_write_inner(true, address, share_address, count, width, blocking)
    }

    /// Call the function at `address` on the peer with `param`.
    ///
    /// Fire and forget: the return value is discarded and nothing tells
    /// the caller the call happened.
    pub fn function_call(&mut self, address: u32, param: u32, blocking: Blocking) -> Result<()> {
        self.send(
            &Request::plain(Operation::FunctionCall { address, param }),
            blocking,
        )
    }

    /// [`function_call`](Self::function_call) with write protection lifted
    /// for the duration of the call
    pub fn function_call_protected(
        &mut self,
        address: u32,
        param: u32,
        blocking: Blocking,
    ) -> Result<()> {
        self.send(
            &Request::protected(Operation::FunctionCall { address, param }),
            blocking,
        )
    }
}

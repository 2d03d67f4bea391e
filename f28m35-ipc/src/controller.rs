//! IPC controller
//!
//! An [`IpcController`] is one core's end of one interrupt channel: the
//! producer of the queue toward the peer, the consumer of the queue coming
//! back, and the flag that wakes the peer's handler. Controllers are set up
//! once at boot and passed to whatever drives the application, instead of
//! being reached through globals.

use core::convert::Infallible;

use crate::arch;
use crate::blocking::Blocking;
use crate::error::{Error, Result};
use crate::fabric::FlagRegisters;
use crate::flags::{IpcFlags, IpcInterrupt};
use crate::message::Message;
use crate::queue::{Consumer, Producer, DEFAULT_QUEUE_DEPTH};
use crate::shared::Core;

/// One core's end of an interrupt channel
pub struct IpcController<'a, F: FlagRegisters + ?Sized, const N: usize = DEFAULT_QUEUE_DEPTH> {
    fabric: &'a F,
    core: Core,
    put: Producer<'a, N>,
    get: Consumer<'a, N>,
    put_flag: IpcFlags,
    get_flag: IpcFlags,
}

impl<'a, F: FlagRegisters + ?Sized, const N: usize> IpcController<'a, F, N> {
    /// Bind a queue pair to interrupt channels.
    ///
    /// `put_channel` is the peer interrupt raised after every put;
    /// `get_channel` is the local interrupt the peer raises when it fills
    /// `get`. Both owned indices are reset, so this must run at boot before
    /// the peer starts using the queues.
    pub fn new(
        fabric: &'a F,
        core: Core,
        mut put: Producer<'a, N>,
        mut get: Consumer<'a, N>,
        put_channel: IpcInterrupt,
        get_channel: IpcInterrupt,
    ) -> Self {
        put.reset();
        get.reset();
        Self {
            fabric,
            core,
            put,
            get,
            put_flag: put_channel.flag(),
            get_flag: get_channel.flag(),
        }
    }

    /// The flag registers this controller signals through
    pub fn fabric(&self) -> &'a F {
        self.fabric
    }

    /// Core this controller runs on
    pub fn core(&self) -> Core {
        self.core
    }

    /// Flag raised on the peer after every put
    pub fn put_flag(&self) -> IpcFlags {
        self.put_flag
    }

    /// Flag the peer raises after filling our get queue
    pub fn get_flag(&self) -> IpcFlags {
        self.get_flag
    }

    /// Queue `msg` for the peer and raise the channel flag.
    ///
    /// The flag is raised exactly once per accepted message. With
    /// [`Blocking::Disabled`] a full queue fails with [`Error::QueueFull`]
    /// and nothing changes.
    pub fn put(&mut self, msg: &Message, blocking: Blocking) -> Result<()> {
        let mut polls = 0;
        loop {
            match self.put.try_enqueue(msg) {
                Ok(()) => break,
                Err(nb::Error::WouldBlock) => blocking.poll_again(&mut polls, Error::QueueFull)?,
                Err(nb::Error::Other(never)) => match never {},
            }
        }
        // the slot has to reach message RAM before the peer sees the flag
        arch::dsb();
        self.fabric.set(self.put_flag);
        Ok(())
    }

    /// Take the oldest message the peer queued for us.
    ///
    /// With [`Blocking::Disabled`] an empty queue fails with
    /// [`Error::QueueEmpty`].
    pub fn get(&mut self, blocking: Blocking) -> Result<Message> {
        let mut polls = 0;
        loop {
            match self.get.try_dequeue() {
                Ok(msg) => return Ok(msg),
                Err(nb::Error::WouldBlock) => blocking.poll_again(&mut polls, Error::QueueEmpty)?,
                Err(nb::Error::Other(never)) => match never {},
            }
        }
    }

    /// Non-blocking get in `nb` form, for use with `nb::block!`
    pub fn try_get(&mut self) -> nb::Result<Message, Infallible> {
        self.get.try_dequeue()
    }

    /// Is there anything in our get queue?
    pub fn has_pending(&self) -> bool {
        !self.get.is_empty()
    }

    /// Number of our messages the peer has not taken yet
    pub fn in_flight(&self) -> usize {
        self.put.len()
    }

    /// Acknowledge the get-channel interrupt flag.
    pub fn acknowledge_interrupt(&self) {
        self.fabric.acknowledge(self.get_flag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::IPC_FLAG1;
    use crate::queue::MailboxQueue;
    use core::cell::Cell;

    #[derive(Default)]
    struct CountingFabric {
        out: Cell<u32>,
        sets: Cell<u32>,
    }

    impl FlagRegisters for CountingFabric {
        fn set(&self, flags: IpcFlags) {
            self.out.set(self.out.get() | flags.bits());
            self.sets.set(self.sets.get() + 1);
        }
        fn clear(&self, flags: IpcFlags) {
            self.out.set(self.out.get() & !flags.bits());
        }
        fn outgoing(&self) -> IpcFlags {
            IpcFlags::from_bits_retain(self.out.get())
        }
        fn incoming(&self) -> IpcFlags {
            IpcFlags::empty()
        }
        fn acknowledge(&self, _flags: IpcFlags) {}
    }

    #[test]
    fn one_flag_per_accepted_put() {
        let fabric = CountingFabric::default();
        let mut to_peer: MailboxQueue<4> = MailboxQueue::new();
        let mut from_peer: MailboxQueue<4> = MailboxQueue::new();
        let (put, _) = to_peer.split();
        let (_, get) = from_peer.split();
        let mut ctl = IpcController::new(
            &fabric,
            Core::Ctrl,
            put,
            get,
            IpcInterrupt::Int1,
            IpcInterrupt::Int1,
        );
        let m = Message::new(3, 0x1000, 1, 0x42);
        for _ in 0..3 {
            ctl.put(&m, Blocking::Disabled).unwrap();
        }
        assert_eq!(ctl.put(&m, Blocking::Disabled), Err(Error::QueueFull));
        assert_eq!(ctl.put(&m, Blocking::Bounded(10)), Err(Error::Timeout));
        assert_eq!(fabric.sets.get(), 3);
        assert_eq!(fabric.outgoing(), IPC_FLAG1);
        assert_eq!(ctl.in_flight(), 3);
    }

    #[test]
    fn get_from_empty_queue() {
        let fabric = CountingFabric::default();
        let mut to_peer: MailboxQueue<4> = MailboxQueue::new();
        let mut from_peer: MailboxQueue<4> = MailboxQueue::new();
        let (put, _) = to_peer.split();
        let (_, get) = from_peer.split();
        let mut ctl = IpcController::new(
            &fabric,
            Core::Master,
            put,
            get,
            IpcInterrupt::Int2,
            IpcInterrupt::Int1,
        );
        assert_eq!(ctl.get(Blocking::Disabled), Err(Error::QueueEmpty));
        assert!(ctl.try_get().is_err());
        assert!(!ctl.has_pending());
    }
}

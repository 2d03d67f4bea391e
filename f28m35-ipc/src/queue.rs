//! Mailbox queues
//!
//! A [`MailboxQueue`] is a fixed-capacity ring of [`Message`] slots for one
//! direction of one interrupt channel. The sending core owns the write
//! index, the receiving core's interrupt handler owns the read index, and
//! each index has exactly one writer in the whole system. That is the only
//! synchronisation there is: no locks, only acquire/release ordering on the
//! indices so that a slot's contents are visible before the index that
//! publishes them.
//!
//! For the peer core to see the queue it has to live in memory both cores
//! can reach, for example with a `#[link_section]` that places the `static`
//! in message RAM.
//!
//! ```
//! use f28m35_ipc::message::Message;
//! use f28m35_ipc::queue::MailboxQueue;
//!
//! let mut queue: MailboxQueue = MailboxQueue::new();
//! let (mut tx, mut rx) = queue.split();
//! tx.try_enqueue(&Message::new(3, 0x1000, 1, 0x42)).unwrap();
//! assert_eq!(rx.try_dequeue().unwrap().data_word2, 0x42);
//! assert!(rx.try_dequeue().is_err());
//! ```

use core::cell::UnsafeCell;
use core::convert::Infallible;
use core::sync::atomic::{AtomicU16, Ordering};

use crate::message::Message;

/// Slots per queue in the stock configuration (index mask `0xF`)
pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// Single-producer, single-consumer ring of messages
///
/// `N` must be a power of two between 2 and 32768; anything else fails to
/// compile. One slot is always left free to tell a full queue from an empty
/// one, so at most `N - 1` messages are queued at a time.
pub struct MailboxQueue<const N: usize = DEFAULT_QUEUE_DEPTH> {
    slots: [UnsafeCell<Message>; N],
    write: AtomicU16,
    read: AtomicU16,
}

// Safety: each slot is written only by the producer while the consumer cannot
// see it, and read only by the consumer after the producer published it with a
// release store of `write`.
unsafe impl<const N: usize> Sync for MailboxQueue<N> {}

impl<const N: usize> Default for MailboxQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> MailboxQueue<N> {
    const MASK: u16 = {
        assert!(
            N.is_power_of_two() && N >= 2 && N <= 1 << 15,
            "mailbox depth must be a power of two between 2 and 32768"
        );
        (N - 1) as u16
    };

    /// Create an empty queue
    pub const fn new() -> Self {
        let _ = Self::MASK;
        Self {
            slots: [const { UnsafeCell::new(Message::EMPTY) }; N],
            write: AtomicU16::new(0),
            read: AtomicU16::new(0),
        }
    }

    /// Maximum number of messages the queue holds
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of messages accepted and not yet dequeued
    pub fn len(&self) -> usize {
        let w = self.write.load(Ordering::Acquire);
        let r = self.read.load(Ordering::Acquire);
        usize::from(w.wrapping_sub(r) & Self::MASK)
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.write.load(Ordering::Acquire) == self.read.load(Ordering::Acquire)
    }

    /// Is the queue full?
    pub fn is_full(&self) -> bool {
        let w = self.write.load(Ordering::Acquire);
        let r = self.read.load(Ordering::Acquire);
        (w.wrapping_add(1) & Self::MASK) == r
    }

    /// Split a queue both ends of which live on this core.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        let queue: &Self = self;
        (Producer { queue }, Consumer { queue })
    }

    /// Producer end of a queue shared with the other core.
    ///
    /// # Safety
    ///
    /// At most one `Producer` for this queue may exist in the whole system,
    /// across both cores.
    pub unsafe fn producer(&self) -> Producer<'_, N> {
        Producer { queue: self }
    }

    /// Consumer end of a queue shared with the other core.
    ///
    /// # Safety
    ///
    /// At most one `Consumer` for this queue may exist in the whole system,
    /// across both cores.
    pub unsafe fn consumer(&self) -> Consumer<'_, N> {
        Consumer { queue: self }
    }
}

/// Sending end of a [`MailboxQueue`]; owns the write index
pub struct Producer<'q, const N: usize = DEFAULT_QUEUE_DEPTH> {
    queue: &'q MailboxQueue<N>,
}

impl<const N: usize> Producer<'_, N> {
    /// Copy `msg` into the next free slot.
    ///
    /// Returns `WouldBlock` without touching the queue when it is full.
    pub fn try_enqueue(&mut self, msg: &Message) -> nb::Result<(), Infallible> {
        let q = self.queue;
        let w = q.write.load(Ordering::Relaxed);
        let r = q.read.load(Ordering::Acquire);
        let next = w.wrapping_add(1) & MailboxQueue::<N>::MASK;
        if next == r {
            return Err(nb::Error::WouldBlock);
        }
        // Safety: slot `w` is outside the consumer's window until `write` moves
        unsafe { q.slots[usize::from(w)].get().write_volatile(*msg) };
        q.write.store(next, Ordering::Release);
        Ok(())
    }

    /// Is there no free slot?
    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    /// Messages waiting in the queue
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Is the queue empty?
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Reset the write index to zero.
    ///
    /// Only meaningful at boot, before the consumer has seen the queue.
    pub fn reset(&mut self) {
        self.queue.write.store(0, Ordering::Release);
    }
}

/// Receiving end of a [`MailboxQueue`]; owns the read index
pub struct Consumer<'q, const N: usize = DEFAULT_QUEUE_DEPTH> {
    queue: &'q MailboxQueue<N>,
}

impl<const N: usize> Consumer<'_, N> {
    /// Copy out the oldest message.
    ///
    /// Returns `WouldBlock` without touching the queue when it is empty.
    pub fn try_dequeue(&mut self) -> nb::Result<Message, Infallible> {
        let q = self.queue;
        let r = q.read.load(Ordering::Relaxed);
        let w = q.write.load(Ordering::Acquire);
        if r == w {
            return Err(nb::Error::WouldBlock);
        }
        // Safety: slot `r` was published by the release store of `write`
        let msg = unsafe { q.slots[usize::from(r)].get().read_volatile() };
        q.read
            .store(r.wrapping_add(1) & MailboxQueue::<N>::MASK, Ordering::Release);
        Ok(msg)
    }

    /// Is there nothing to dequeue?
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Messages waiting in the queue
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Reset the read index to zero.
    ///
    /// Only meaningful at boot, before the producer has used the queue.
    pub fn reset(&mut self) {
        self.queue.read.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn msg(n: u32) -> Message {
        Message::new(3, 0x1000 + n, 1, n)
    }

    #[test]
    fn fills_to_capacity() {
        let mut q: MailboxQueue = MailboxQueue::new();
        assert_eq!(q.capacity(), 15);
        let (mut tx, mut rx) = q.split();
        for n in 0..15 {
            tx.try_enqueue(&msg(n)).unwrap();
        }
        assert!(tx.is_full());
        assert_eq!(tx.try_enqueue(&msg(99)), Err(nb::Error::WouldBlock));
        assert_eq!(tx.len(), 15);
        for n in 0..15 {
            assert_eq!(rx.try_dequeue(), Ok(msg(n)));
        }
        assert_eq!(rx.try_dequeue(), Err(nb::Error::WouldBlock));
    }

    #[test]
    fn full_enqueue_leaves_queue_alone() {
        let mut q: MailboxQueue<4> = MailboxQueue::new();
        let (mut tx, mut rx) = q.split();
        for n in 0..3 {
            tx.try_enqueue(&msg(n)).unwrap();
        }
        assert!(tx.try_enqueue(&msg(7)).is_err());
        assert_eq!(rx.try_dequeue(), Ok(msg(0)));
        tx.try_enqueue(&msg(3)).unwrap();
        for n in 1..4 {
            assert_eq!(rx.try_dequeue(), Ok(msg(n)));
        }
    }

    #[test]
    fn random_sequences_keep_count() {
        let mut rng = SmallRng::seed_from_u64(0x2835);
        let mut q: MailboxQueue<8> = MailboxQueue::new();
        let (mut tx, mut rx) = q.split();
        let mut sent = 0u32;
        let mut received = 0u32;
        for _ in 0..10_000 {
            if rng.random_bool(0.55) {
                match tx.try_enqueue(&msg(sent)) {
                    Ok(()) => sent += 1,
                    Err(_) => assert_eq!(sent - received, 7),
                }
            } else {
                match rx.try_dequeue() {
                    Ok(m) => {
                        assert_eq!(m, msg(received));
                        received += 1;
                    }
                    Err(_) => assert_eq!(sent, received),
                }
            }
            assert_eq!(tx.len() as u32, sent - received);
        }
    }

    #[test]
    fn concurrent_producer_and_consumer() {
        static QUEUE: MailboxQueue = MailboxQueue::new();
        const COUNT: u32 = 5_000;
        std::thread::scope(|s| {
            s.spawn(|| {
                // Safety: the only producer
                let mut tx = unsafe { QUEUE.producer() };
                for n in 0..COUNT {
                    while tx.try_enqueue(&msg(n)).is_err() {
                        std::thread::yield_now();
                    }
                }
            });
            // Safety: the only consumer
            let mut rx = unsafe { QUEUE.consumer() };
            let mut next = 0;
            while next < COUNT {
                match rx.try_dequeue() {
                    Ok(m) => {
                        assert_eq!(m, msg(next));
                        next += 1;
                    }
                    Err(_) => std::thread::yield_now(),
                }
            }
        });
    }
}

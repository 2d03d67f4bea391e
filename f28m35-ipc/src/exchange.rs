//! Periodic parameter exchange over a shared RAM block
//!
//! One round moves a buffer of 16-bit words to the peer and reads it back
//! to check the transport:
//!
//! 1. the caller packs its parameters into words ([`pack_parameters`]);
//! 2. take the shared block and wait until it is ours;
//! 3. stage the words in the block;
//! 4. block-write them to the peer's buffer;
//! 5. hand the block to the peer and wait until it is theirs;
//! 6. block-read the peer's buffer back into the block, tracked by the
//!    response flag;
//! 7. wait for the response flag to drop;
//! 8. compare the echo with what was sent.
//!
//! A mismatch is counted and flagged but is not an error; the control loop
//! carries on. The echo is the only integrity check there is, so a
//! corruption that happens to reproduce the original word goes unnoticed.

use crate::blocking::Blocking;
use crate::controller::IpcController;
use crate::error::{Error, Result};
use crate::fabric::{flag_busy, wait_for_flag, FlagRegisters};
use crate::flags::{IpcFlags, IPC_FLAG17};
use crate::memory::{AddressSpace, Width};
use crate::ownership::{Owner, SharedRamArbiter};
use crate::shared::{SxMask, CTRL_SX_START};

/// Control loop iterations between two exchanges in the stock application
pub const DEFAULT_EXCHANGE_PERIOD: u32 = 30_000;

/// Parameters sent per exchange in the stock application
pub const EXCHANGED_PARAMETERS: usize = 44;

/// Where and how an exchange round moves its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExchangeConfig {
    /// Shared block(s) used as the staging area
    pub blocks: SxMask,
    /// Core running the exchange
    pub local: Owner,
    /// Staging address of the outgoing words, local view
    pub transmit: u32,
    /// Landing address of the echoed words, local view
    pub receive: u32,
    /// Buffer on the peer that receives the words and echoes them
    pub peer_buffer: u32,
    /// Flag tracking the echo
    pub response: IpcFlags,
    /// Wait policy for every step
    pub blocking: Blocking,
}

impl Default for ExchangeConfig {
    /// Control core exchange through S0, flag 17, blocking without limit.
    ///
    /// `peer_buffer` still has to be filled in, typically from
    /// [`await_address`].
    fn default() -> Self {
        Self {
            blocks: SxMask::S0,
            local: Owner::Ctrl,
            transmit: CTRL_SX_START,
            receive: CTRL_SX_START + 0x100,
            peer_buffer: 0,
            response: IPC_FLAG17,
            blocking: Blocking::Enabled,
        }
    }
}

/// Running totals of the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ExchangeStats {
    /// Completed rounds
    pub rounds: u32,
    /// Rounds whose echo did not match
    pub errors: u32,
    /// Did the most recent round mismatch?
    pub mismatch: bool,
}

/// Outcome of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RoundReport {
    /// Words sent
    pub words: u16,
    /// Echoed words that differed
    pub mismatched: u16,
}

impl RoundReport {
    /// Did the echo match?
    pub fn is_clean(&self) -> bool {
        self.mismatched == 0
    }
}

/// The block-transfer round trip
#[derive(Debug)]
pub struct ParameterExchange {
    config: ExchangeConfig,
    stats: ExchangeStats,
}

impl ParameterExchange {
    /// Exchange with `config`
    pub fn new(config: ExchangeConfig) -> Self {
        Self {
            config,
            stats: ExchangeStats::default(),
        }
    }

    /// The configuration in use
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// Point the exchange at a different peer buffer
    pub fn set_peer_buffer(&mut self, address: u32) {
        self.config.peer_buffer = address;
    }

    /// Totals so far
    pub fn stats(&self) -> ExchangeStats {
        self.stats
    }

    /// Run one round with `words`.
    ///
    /// Errors are transport failures (a full queue without blocking, a
    /// timeout); an echo mismatch is reported in the [`RoundReport`] and
    /// the stats instead.
    pub fn run<F, A, M, const N: usize>(
        &mut self,
        ctl: &mut IpcController<'_, F, N>,
        arbiter: &A,
        memory: &M,
        words: &[u16],
    ) -> Result<RoundReport>
    where
        F: FlagRegisters + ?Sized,
        A: SharedRamArbiter + ?Sized,
        M: AddressSpace + ?Sized,
    {
        let cfg = self.config;
        let count = u16::try_from(words.len()).map_err(|_| Error::BlockTooLong(words.len()))?;
        let stride = M::UNITS_PER_HALFWORD;

        arbiter.acquire(ctl, cfg.blocks, cfg.local, cfg.blocking)?;
        for (i, word) in (0u32..).zip(words) {
            memory.write16(cfg.transmit + i * stride, *word);
        }
        ctl.block_write(
            cfg.peer_buffer,
            cfg.transmit,
            count,
            Width::Bits16,
            cfg.blocking,
        )?;

        arbiter.acquire(ctl, cfg.blocks, cfg.local.other(), cfg.blocking)?;
        ctl.block_read(
            cfg.peer_buffer,
            cfg.receive,
            count,
            cfg.blocking,
            cfg.response,
        )?;
        let fabric = ctl.fabric();
        cfg.blocking
            .wait_until(|| !flag_busy(fabric, cfg.response), Error::FlagBusy)?;

        let mut mismatched = 0u16;
        for (i, word) in (0u32..).zip(words) {
            if memory.read16(cfg.receive + i * stride) != *word {
                mismatched += 1;
            }
        }

        self.stats.rounds = self.stats.rounds.wrapping_add(1);
        self.stats.mismatch = mismatched != 0;
        if mismatched != 0 {
            self.stats.errors = self.stats.errors.wrapping_add(1);
            #[cfg(feature = "defmt")]
            defmt::warn!("IPC exchange: {=u16} of {=u16} words differ", mismatched, count);
        }
        Ok(RoundReport {
            words: count,
            mismatched,
        })
    }
}

/// Fires once every `period` calls to [`tick`](Self::tick)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeSchedule {
    period: u32,
    count: u32,
}

impl Default for ExchangeSchedule {
    fn default() -> Self {
        Self::new(DEFAULT_EXCHANGE_PERIOD)
    }
}

impl ExchangeSchedule {
    /// A schedule firing every `period` ticks; a period of 0 counts as 1
    pub const fn new(period: u32) -> Self {
        Self {
            period: if period == 0 { 1 } else { period },
            count: 0,
        }
    }

    /// Count one control loop iteration; true when an exchange is due.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.period {
            self.count = 0;
            true
        } else {
            false
        }
    }
}

/// Split each parameter into two words, low half first.
///
/// Returns the number of words written, which stops short when `words`
/// runs out of room for a whole parameter.
pub fn pack_parameters(params: &[f32], words: &mut [u16]) -> usize {
    let mut written = 0;
    for (param, pair) in params.iter().zip(words.chunks_exact_mut(2)) {
        let bits = param.to_bits();
        pair[0] = bits as u16;
        pair[1] = (bits >> 16) as u16;
        written += 2;
    }
    written
}

/// Reassemble parameters packed by [`pack_parameters`].
///
/// Returns the number of parameters written.
pub fn unpack_parameters(words: &[u16], params: &mut [f32]) -> usize {
    let mut written = 0;
    for (pair, param) in words.chunks_exact(2).zip(params.iter_mut()) {
        *param = f32::from_bits(u32::from(pair[0]) | (u32::from(pair[1]) << 16));
        written += 1;
    }
    written
}

/// Tell the peer where one of our buffers lives.
///
/// Writes `address` into `slot` of our outgoing message RAM and raises
/// `flag`.
pub fn publish_address<M, F>(memory: &M, fabric: &F, slot: u32, address: u32, flag: IpcFlags)
where
    M: AddressSpace + ?Sized,
    F: FlagRegisters + ?Sized,
{
    memory.write32(slot, address);
    fabric.set(flag);
}

/// Learn where one of the peer's buffers lives.
///
/// Waits for `flag`, acknowledges it and reads the address the peer left
/// in `slot` (our view of the peer's outgoing message RAM).
pub fn await_address<M, F>(
    memory: &M,
    fabric: &F,
    slot: u32,
    flag: IpcFlags,
    blocking: Blocking,
) -> Result<u32>
where
    M: AddressSpace + ?Sized,
    F: FlagRegisters + ?Sized,
{
    wait_for_flag(fabric, flag, blocking)?;
    Ok(memory.read32(slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_period() {
        let mut s = ExchangeSchedule::new(3);
        let fired: [bool; 7] = core::array::from_fn(|_| s.tick());
        assert_eq!(fired, [false, false, true, false, false, true, false]);
        let mut d = ExchangeSchedule::default();
        assert_eq!((0..DEFAULT_EXCHANGE_PERIOD).filter(|_| d.tick()).count(), 1);
    }

    #[test]
    fn parameters_pack_low_half_first() {
        let params = [1.0f32, -2.5, 1.0e-3];
        let mut words = [0u16; 6];
        assert_eq!(pack_parameters(&params, &mut words), 6);
        assert_eq!(words[0], 0x0000);
        assert_eq!(words[1], 0x3F80);
        let mut back = [0.0f32; 3];
        assert_eq!(unpack_parameters(&words, &mut back), 3);
        assert_eq!(back, params);
    }

    #[test]
    fn packing_stops_at_capacity() {
        let params = [1.0f32; 4];
        let mut words = [0u16; 5];
        assert_eq!(pack_parameters(&params, &mut words), 4);
        assert_eq!(words[4], 0);
    }
}

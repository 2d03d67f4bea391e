//! How long a call is willing to wait on the peer core.
//!
//! The default for a blocking call is to busy-poll without limit, which is
//! how the chip's own driver behaves: a stalled peer stalls the caller.
//! [`Blocking::Bounded`] is an opt-in safety net that gives up with
//! [`Error::Timeout`] after a number of polls.

use crate::arch;
use crate::error::{Error, Result};

/// Wait policy for a single IPC call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Blocking {
    /// Check once and report failure if the condition does not hold.
    Disabled,
    /// Poll until the condition holds, for as long as it takes.
    #[default]
    Enabled,
    /// Poll until the condition holds, at most this many times.
    Bounded(u32),
}

impl Blocking {
    /// Is this a waiting policy?
    pub fn waits(self) -> bool {
        !matches!(self, Blocking::Disabled)
    }

    /// Account for one failed poll.
    ///
    /// Returns `Err(not_ready)` for [`Blocking::Disabled`] and
    /// `Err(Error::Timeout)` once a bound is used up. Otherwise spins for one
    /// cycle and lets the caller poll again.
    pub(crate) fn poll_again(self, polls: &mut u32, not_ready: Error) -> Result<()> {
        match self {
            Blocking::Disabled => return Err(not_ready),
            Blocking::Enabled => {}
            Blocking::Bounded(limit) => {
                if *polls >= limit {
                    return Err(Error::Timeout);
                }
                *polls += 1;
            }
        }
        arch::nop();
        Ok(())
    }

    /// Poll `ready` under this policy.
    pub fn wait_until<F>(self, mut ready: F, not_ready: Error) -> Result<()>
    where
        F: FnMut() -> bool,
    {
        let mut polls = 0;
        while !ready() {
            self.poll_again(&mut polls, not_ready)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_checks_once() {
        let mut calls = 0;
        let res = Blocking::Disabled.wait_until(
            || {
                calls += 1;
                false
            },
            Error::FlagBusy,
        );
        assert_eq!(res, Err(Error::FlagBusy));
        assert_eq!(calls, 1);
    }

    #[test]
    fn bounded_gives_up() {
        let mut calls = 0;
        let res = Blocking::Bounded(3).wait_until(
            || {
                calls += 1;
                false
            },
            Error::FlagBusy,
        );
        assert_eq!(res, Err(Error::Timeout));
        assert_eq!(calls, 4);
    }

    #[test]
    fn enabled_waits_for_condition() {
        let mut calls = 0;
        let res = Blocking::Enabled.wait_until(
            || {
                calls += 1;
                calls == 10
            },
            Error::FlagBusy,
        );
        assert_eq!(res, Ok(()));
        assert_eq!(calls, 10);
    }
}

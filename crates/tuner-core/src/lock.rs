//! Lock acquisition
//!
//! Every driver moves through the same three states:
//!
//! ```text
//! Unconfigured --set_channel--> Configured --start--> Locked
//!      ^                          ^   |                 |
//!      +---------reset------------+   +<-----stop-------+
//! ```
//!
//! `start` polls a chip-specific lock condition at a fixed interval until it
//! holds or the timeout has been slept through.

use tracing::{trace, warn};

use crate::delay::DelayNs;
use crate::error::{Result, TunerError};

/// Poll interval used by every chip in this workspace
pub const LOCK_POLL_INTERVAL_MS: u32 = 50;

/// Synthesizer/demodulator lock state
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LockState {
    /// No channel staged since construction or the last reset
    #[default]
    Unconfigured,
    /// Registers staged or written, lock not yet confirmed
    Configured,
    /// Hardware reported lock on the staged channel
    Locked,
}

impl LockState {
    /// Returns a human-readable name for the state
    pub fn name(&self) -> &'static str {
        match self {
            LockState::Unconfigured => "unconfigured",
            LockState::Configured => "configured",
            LockState::Locked => "locked",
        }
    }

    /// Gate for `start`
    ///
    /// Returns `Ok(true)` when already locked (nothing to do), `Ok(false)`
    /// when a start should proceed, and `NotReady` before any tuning call.
    pub fn check_start(&self, chip: &str) -> Result<bool> {
        match self {
            LockState::Unconfigured => Err(TunerError::NotReady(format!(
                "{chip}: start before a channel was set"
            ))),
            LockState::Configured => Ok(false),
            LockState::Locked => Ok(true),
        }
    }
}

/// Poll `is_locked` until it reports lock or `timeout_ms` has been slept through
///
/// The check runs before each sleep, so a chip that is already locked costs
/// no delay. On timeout the returned error carries the slept time, which is
/// at least `timeout_ms` and less than `timeout_ms + interval_ms`. Check
/// errors end the poll immediately.
pub fn poll_until_locked<D, F>(
    delay: &mut D,
    timeout_ms: u32,
    interval_ms: u32,
    mut is_locked: F,
) -> Result<u32>
where
    D: DelayNs + ?Sized,
    F: FnMut() -> Result<bool>,
{
    let interval_ms = interval_ms.max(1);
    let mut waited_ms = 0u32;
    loop {
        if is_locked()? {
            trace!("lock observed after {}ms", waited_ms);
            return Ok(waited_ms);
        }
        if waited_ms >= timeout_ms {
            warn!("no lock after {}ms", waited_ms);
            return Err(TunerError::Timeout { waited_ms });
        }
        delay.delay_ms(interval_ms);
        waited_ms = waited_ms.saturating_add(interval_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[derive(Default)]
    struct Counting {
        slept_us: u64,
    }

    impl DelayNs for Counting {
        fn delay_ns(&mut self, ns: u32) {
            self.slept_us += u64::from(ns) / 1000;
        }
    }

    #[test]
    fn test_check_start_gates() {
        assert!(matches!(
            LockState::Unconfigured.check_start("pll"),
            Err(TunerError::NotReady(_))
        ));
        assert!(!LockState::Configured.check_start("pll").unwrap());
        assert!(LockState::Locked.check_start("pll").unwrap());
        assert!(LockState::Unconfigured < LockState::Configured);
    }

    #[test]
    fn test_immediate_lock_costs_nothing() {
        let mut delay = Counting::default();
        let waited = poll_until_locked(&mut delay, 1000, 50, || Ok(true)).unwrap();
        assert_eq!(waited, 0);
        assert_eq!(delay.slept_us, 0);
    }

    #[test]
    fn test_lock_after_three_polls() {
        let mut delay = Counting::default();
        let mut polls = 0;
        let waited = poll_until_locked(&mut delay, 1000, 50, || {
            polls += 1;
            Ok(polls == 3)
        })
        .unwrap();
        assert_eq!(waited, 100);
        assert_eq!(delay.slept_us, 100_000);
    }

    #[test]
    fn test_timeout_bounds() {
        for timeout in [0u32, 1, 49, 50, 51, 2000, 2013] {
            let mut delay = Counting::default();
            let err = poll_until_locked(&mut delay, timeout, 50, || Ok(false)).unwrap_err();
            let TunerError::Timeout { waited_ms } = err else {
                panic!("expected timeout");
            };
            assert!(waited_ms >= timeout);
            assert!(waited_ms < timeout + 50);
            assert_eq!(delay.slept_us, u64::from(waited_ms) * 1000);
        }
    }

    #[test]
    fn test_check_error_stops_poll() {
        let mut delay = Counting::default();
        let err = poll_until_locked(&mut delay, 1000, 50, || {
            Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "nak").into())
        })
        .unwrap_err();
        assert_eq!(err.kind(), "io");
        assert_eq!(delay.slept_us, 0);
    }

    proptest! {
        #[test]
        fn test_timeout_window(timeout in 0u32..5000, interval in 0u32..200) {
            let mut delay = Counting::default();
            let err = poll_until_locked(&mut delay, timeout, interval, || Ok(false)).unwrap_err();
            let TunerError::Timeout { waited_ms } = err else {
                panic!("expected timeout");
            };
            let step = interval.max(1);
            prop_assert!(waited_ms >= timeout);
            prop_assert!(waited_ms < timeout + step);
            prop_assert_eq!(waited_ms % step, 0);
            prop_assert_eq!(delay.slept_us, u64::from(waited_ms) * 1000);
        }

        #[test]
        fn test_lock_on_nth_poll(timeout in 0u32..2000, n in 1u32..60) {
            let mut delay = Counting::default();
            let mut polls = 0u32;
            let result = poll_until_locked(&mut delay, timeout, 50, || {
                polls += 1;
                Ok(polls == n)
            });
            let needed = (n - 1) * 50;
            let last_poll = timeout.div_ceil(50) * 50;
            if needed <= last_poll {
                prop_assert_eq!(result.unwrap(), needed);
            } else {
                prop_assert!(matches!(result, Err(TunerError::Timeout { .. })), "expected Timeout");
            }
        }
    }
}

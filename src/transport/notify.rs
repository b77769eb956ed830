// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Pending-read notification: the `is_pending_read` / `pending_notify` half
//! of the receive path.
//!
//! Same two-tier shape as the router's wake notifier (atomic fast-path,
//! condvar for the idle case), extended with an [`mio::Waker`] so a caller
//! blocked in `wait_for_event`'s `Poll::poll` wakes up the instant another
//! thread (e.g. one delivering to a different peer) marks data pending,
//! without needing the socket itself to become readable.

use mio::Waker;
use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared flag signaling "at least one peer has contiguous data ready to
/// drain", pollable both via spin-check and via a registered [`mio::Poll`].
pub struct PendingNotify {
    data_ready: AtomicBool,
    sleeping: Mutex<bool>,
    condvar: Condvar,
    waker: Option<Waker>,
}

impl PendingNotify {
    pub fn new() -> Self {
        Self {
            data_ready: AtomicBool::new(false),
            sleeping: Mutex::new(false),
            condvar: Condvar::new(),
            waker: None,
        }
    }

    /// Attach an [`mio::Waker`] so `notify()` also wakes a thread parked in
    /// `Poll::poll` on the token this waker was registered with.
    pub fn with_waker(waker: Waker) -> Self {
        Self {
            data_ready: AtomicBool::new(false),
            sleeping: Mutex::new(false),
            condvar: Condvar::new(),
            waker: Some(waker),
        }
    }

    pub fn notify(&self) {
        self.data_ready.store(true, Ordering::Release);
        if *self.sleeping.lock() {
            self.condvar.notify_one();
        }
        if let Some(waker) = &self.waker {
            // Best-effort: if the poll side already woke up for another
            // reason it will still observe data_ready on its next check.
            let _ = waker.wake();
        }
    }

    /// Edge-triggered consumption: clears the flag and reports whether it
    /// was set. Used by the delivery loop when `peers_pending` emptied on
    /// this call (nothing left to re-signal).
    pub fn check_and_clear(&self) -> bool {
        self.data_ready.swap(false, Ordering::Acquire)
    }

    /// Level-triggered peek: leaves the flag set. Used when the delivery
    /// loop still has pending peers after this call, so the next
    /// `wait_for_event` sees the condition immediately rather than blocking.
    pub fn is_ready(&self) -> bool {
        self.data_ready.load(Ordering::Acquire)
    }

    /// Re-arm without clearing, for the level-triggered re-signal path.
    pub fn set(&self) {
        self.data_ready.store(true, Ordering::Release);
    }

    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.data_ready.swap(false, Ordering::Acquire) {
            return true;
        }

        let mut sleeping = self.sleeping.lock();
        if self.data_ready.swap(false, Ordering::Acquire) {
            return true;
        }

        *sleeping = true;
        let result = self.condvar.wait_for(&mut sleeping, timeout);
        *sleeping = false;

        if self.data_ready.swap(false, Ordering::Acquire) {
            !result.timed_out()
        } else {
            false
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn shared_with_waker(waker: Waker) -> Arc<Self> {
        Arc::new(Self::with_waker(waker))
    }
}

impl Default for PendingNotify {
    fn default() -> Self {
        Self::new()
    }
}

/// Construct a `(PendingNotify, Waker-backed registration token)` pair
/// bound to `poll`, so the caller can register the returned token itself.
pub fn notify_with_registered_waker(
    poll: &mio::Poll,
    token: mio::Token,
) -> io::Result<Arc<PendingNotify>> {
    let waker = Waker::new(poll.registry(), token)?;
    Ok(PendingNotify::shared_with_waker(waker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn atomic_fast_path_round_trips() {
        let notify = PendingNotify::new();
        assert!(!notify.is_ready());
        notify.notify();
        assert!(notify.is_ready());
        assert!(notify.check_and_clear());
        assert!(!notify.is_ready());
    }

    #[test]
    fn set_is_level_triggered() {
        let notify = PendingNotify::new();
        notify.set();
        assert!(notify.is_ready());
        assert!(notify.is_ready());
    }

    #[test]
    fn notify_wakes_waiting_thread() {
        let notify = Arc::new(PendingNotify::new());
        let n = Arc::clone(&notify);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            n.notify();
        });

        let woken = notify.wait_timeout(Duration::from_millis(200));
        assert!(woken);
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out_without_notify() {
        let notify = PendingNotify::new();
        assert!(!notify.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn waker_registration_wakes_poll() {
        let poll = mio::Poll::new().expect("poll creation");
        let notify =
            notify_with_registered_waker(&poll, mio::Token(99)).expect("waker registration");

        let mut events = mio::Events::with_capacity(4);
        let handle = thread::spawn({
            let notify = Arc::clone(&notify);
            move || {
                thread::sleep(Duration::from_millis(10));
                notify.notify();
            }
        });

        poll.poll(&mut events, Some(Duration::from_secs(1)))
            .expect("poll succeeds");
        assert!(events.iter().any(|e| e.token() == mio::Token(99)));
        handle.join().unwrap();
    }
}

/*
 *  frame/wake.rs
 *
 *  LyMonS - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Coalescing wake signal for the refresh worker
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Why a wait returned. Cancellation is a reason, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    Signal,
    Interval,
    Cancelled,
}

impl fmt::Display for WakeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WakeReason::Signal => "signal",
            WakeReason::Interval => "interval",
            WakeReason::Cancelled => "cancelled",
        })
    }
}

/// Dirty flag plus broadcast. Any number of `signal()` calls before the
/// flag is consumed collapse into one wake.
#[derive(Debug, Default)]
pub struct WakeSignal {
    pending: AtomicBool,
    notify: Notify,
}

impl WakeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) {
        self.pending.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Wait for a signal, the interval, or cancellation - whichever is first.
    pub async fn wait(&self, interval: Duration, cancel: &CancellationToken) -> WakeReason {
        let deadline = tokio::time::sleep(interval);
        tokio::pin!(deadline);

        loop {
            if cancel.is_cancelled() {
                return WakeReason::Cancelled;
            }

            // register before testing the flag so a signal landing in between is not lost
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.pending.swap(false, Ordering::AcqRel) {
                return WakeReason::Signal;
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return WakeReason::Cancelled,
                // another waiter may have taken the flag; re-check
                _ = &mut notified => continue,
                _ = &mut deadline => return WakeReason::Interval,
            }
        }
    }
}

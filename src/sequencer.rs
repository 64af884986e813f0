// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! A virtual timeline for scheduling note onsets and offsets.
//!
//! The timeline starts on the first `start` after it was idle, and closes again once every
//! started event has been settled by a stop (fired or cancelled) or a retire.

use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use tokio::time::{self, Instant};
use tracing::debug;

use crate::playsync::CancelHandle;

/// The shared clock of a playback session.
#[derive(Debug, Default)]
struct Timeline {
    /// When the current session started. `None` while idle.
    origin: Option<Instant>,
    /// Events accepted but not yet settled.
    in_flight: usize,
}

/// A stop scheduled by [`Sequencer::stop`].
#[derive(Clone)]
pub struct ScheduledStop {
    cancel: CancelHandle,
}

impl ScheduledStop {
    /// Prevents the stop action from running. The timeline is still settled for it.
    /// Returns false if the stop was already cancelled.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Converts session-relative offsets into delays and tracks outstanding events.
#[derive(Clone, Default)]
pub struct Sequencer {
    timeline: Arc<Mutex<Timeline>>,
}

impl Sequencer {
    pub fn new() -> Sequencer {
        Sequencer::default()
    }

    /// Runs `action` at `when` from the start of the session.
    ///
    /// If `when` has already passed, including a zero offset on an idle timeline, the action
    /// runs synchronously before this returns. The event counts as in flight either way.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<F>(&self, action: F, when: Duration)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = {
            let mut timeline = self.timeline.lock();
            let now = Instant::now();
            let elapsed = match timeline.origin {
                Some(origin) => now.saturating_duration_since(origin),
                None => {
                    timeline.origin = Some(now);
                    Duration::ZERO
                }
            };
            timeline.in_flight += 1;
            when.saturating_sub(elapsed)
        };

        if delay.is_zero() {
            action();
            return;
        }

        debug!(delay_ms = delay.as_millis() as u64, "Deferring start.");
        tokio::spawn(async move {
            time::sleep(delay).await;
            action();
        });
    }

    /// Runs `action` after `after`, then settles one in-flight event. Always deferred, even for
    /// a zero duration.
    ///
    /// Must be called from within a tokio runtime.
    pub fn stop<F>(&self, action: F, after: Duration) -> ScheduledStop
    where
        F: FnOnce() + Send + 'static,
    {
        let cancel = CancelHandle::new();
        let timeline = self.timeline.clone();

        {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        debug!("Scheduled stop cancelled.");
                    }
                    _ = time::sleep(after) => {
                        if !cancel.is_cancelled() {
                            action();
                        }
                    }
                }
                Sequencer::settle(&timeline);
            });
        }

        ScheduledStop { cancel }
    }

    /// Settles one in-flight event that will never get a stop, e.g. because its playback failed.
    pub fn retire(&self) {
        Sequencer::settle(&self.timeline);
    }

    fn settle(timeline: &Mutex<Timeline>) {
        let mut timeline = timeline.lock();
        timeline.in_flight = timeline.in_flight.saturating_sub(1);
        if timeline.in_flight == 0 && timeline.origin.take().is_some() {
            debug!("Timeline idle.");
        }
    }

    /// The number of events accepted but not yet settled.
    pub fn in_flight(&self) -> usize {
        self.timeline.lock().in_flight
    }

    /// When the current session started, if one is active.
    pub fn origin(&self) -> Option<Instant> {
        self.timeline.lock().origin
    }

    pub fn is_idle(&self) -> bool {
        let timeline = self.timeline.lock();
        timeline.origin.is_none() && timeline.in_flight == 0
    }
}

impl fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timeline = self.timeline.lock();
        f.debug_struct("Sequencer")
            .field("origin", &timeline.origin)
            .field("in_flight", &timeline.in_flight)
            .finish()
    }
}

// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Represents the current cancel state.
#[derive(PartialEq)]
enum CancelState {
    Untouched,
    Cancelled,
}

/// A cancel handle is attached to a deferred action. Whoever runs the action is responsible
/// for checking it before doing so.
#[derive(Clone)]
pub struct CancelHandle {
    cancelled: Arc<Mutex<CancelState>>,
    notify: Arc<Notify>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle {
            cancelled: Arc::new(Mutex::new(CancelState::Untouched)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Returns true if the action has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.lock() == CancelState::Cancelled
    }

    /// Waits until the handle is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking so a concurrent cancel can't be missed.
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Cancels the action. Returns true if this call did the cancelling.
    pub fn cancel(&self) -> bool {
        let mut cancel_state = self.cancelled.lock();
        if *cancel_state == CancelState::Untouched {
            *cancel_state = CancelState::Cancelled;
            self.notify.notify_waiters();
            return true;
        }
        false
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_cancel_handle_cancelled() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            tokio::spawn(async move { cancel_handle.cancelled().await })
        };

        assert!(cancel_handle.cancel());
        assert!(join.await.is_ok());
        assert!(cancel_handle.is_cancelled());

        // Only the first cancel counts.
        assert!(!cancel_handle.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_handle_untouched() {
        let cancel_handle = CancelHandle::new();

        let result =
            tokio::time::timeout(Duration::from_millis(100), cancel_handle.cancelled()).await;
        assert!(result.is_err());
        assert!(!cancel_handle.is_cancelled());
    }
}

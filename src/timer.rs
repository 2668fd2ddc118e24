//! Countdowns and the background ticks that drive them

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// A visible countdown in whole seconds.
/// Stops at zero and never goes below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Countdown {
    remaining: u32,
    running: bool,
}

impl Countdown {
    /// A countdown that is already running
    pub fn started(seconds: u32) -> Self {
        Self {
            remaining: seconds,
            running: seconds > 0,
        }
    }

    /// A countdown waiting to be started
    pub fn idle(seconds: u32) -> Self {
        Self {
            remaining: seconds,
            running: false,
        }
    }

    /// Take one second off. Returns false once there is nothing left to count.
    pub fn tick(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.running = false;
        }
        true
    }

    /// Freeze the displayed value
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }
}

/// A repeating background tick. Dropping it cancels the pending tick.
#[derive(Debug)]
pub struct Ticker {
    handle: JoinHandle<()>,
}

impl Ticker {
    /// Call `on_tick` every `period` until it returns false
    pub fn spawn<F, Fut>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if !on_tick().await {
                    break;
                }
            }
        });

        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

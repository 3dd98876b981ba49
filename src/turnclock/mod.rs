//! Turn Clock (spec §4.6, C6).
//!
//! `start`/`cancel`/`reset`, emitting `turnTimer` once then `timerUpdate`
//! once per second, and delivering expiry as a *queued* message back onto
//! the owning room's inbox — never a synchronous call into engine state,
//! matching the "coroutine / callback chains → scheduled messages" design
//! note (spec §9).

use std::time::Duration;

use tokio::task::JoinHandle;

/// One clock per room, enforced by `start` cancelling any prior handle —
/// spec: "a room may have at most one active clock".
pub struct TurnClock {
    handle: Option<JoinHandle<()>>,
}

impl Default for TurnClock {
    fn default() -> Self {
        TurnClock { handle: None }
    }
}

impl TurnClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a countdown of `total_seconds`, emitting `on_tick(remaining)`
    /// once per second and invoking `on_expire` when it reaches zero.
    /// Implicitly cancels any clock already running. `on_expire` runs on
    /// the clock's own task, so it must only enqueue a message (e.g. onto
    /// a room's inbox) rather than mutate shared state directly.
    pub fn start<FTick, FExpire>(&mut self, total_seconds: u64, mut on_tick: FTick, on_expire: FExpire)
    where
        FTick: FnMut(u64) + Send + 'static,
        FExpire: FnOnce() + Send + 'static,
    {
        self.cancel();
        on_tick(total_seconds);
        let handle = tokio::spawn(async move {
            let mut remaining = total_seconds;
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.tick().await; // first tick fires immediately; skip it
            loop {
                interval.tick().await;
                if remaining == 0 {
                    break;
                }
                remaining -= 1;
                on_tick(remaining);
                if remaining == 0 {
                    on_expire();
                    break;
                }
            }
        });
        self.handle = Some(handle);
    }

    /// Idempotent: cancelling an already-stopped clock is a no-op.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn reset<FTick, FExpire>(&mut self, total_seconds: u64, on_tick: FTick, on_expire: FExpire)
    where
        FTick: FnMut(u64) + Send + 'static,
        FExpire: FnOnce() + Send + 'static,
    {
        self.start(total_seconds, on_tick, on_expire);
    }

    pub fn is_active(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for TurnClock {
    fn drop(&mut self) {
        self.cancel();
    }
}

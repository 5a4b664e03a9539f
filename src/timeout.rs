//! Per-session idle and hard timeout timers.
//!
//! Two independent single-shot timers per session: idle (reset on
//! activity) and hard (never reset). At most two active timers exist per
//! session at any moment; cancellation on session teardown is synchronous
//! with respect to the timer table, not with respect to an in-flight fire
//! that has already started running.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

struct TimerSlots {
    idle: Option<JoinHandle<()>>,
    hard: Option<JoinHandle<()>>,
}

/// Owns the per-session timer table. Generic over the callback so it has no
/// dependency on `state::AppState` directly (that dependency is supplied by
/// the closure passed to `start_hard`/`reset_idle`).
#[derive(Clone)]
pub struct TimeoutController {
    slots: Arc<Mutex<HashMap<String, TimerSlots>>>,
}

impl Default for TimeoutController {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeoutController {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start the hard timer for a session. Called exactly once, at
    /// admission. `on_fire` is spawned when the duration elapses.
    pub async fn start_hard<F>(&self, session_id: &str, duration: Duration, on_fire: F)
    where
        F: FnOnce() -> tokio::task::JoinHandle<()> + Send + 'static,
    {
        let handle = spawn_timer(duration, on_fire);
        let mut slots = self.slots.lock().await;
        let entry = slots.entry(session_id.to_owned()).or_insert(TimerSlots {
            idle: None,
            hard: None,
        });
        entry.hard = Some(handle);
    }

    /// Reset the idle timer: cancel whatever is pending and schedule a
    /// fresh full-duration timer. Never started more than once per activity
    /// event (callers invoke this once per inbound frame / management push).
    pub async fn reset_idle<F>(&self, session_id: &str, duration: Duration, on_fire: F)
    where
        F: FnOnce() -> tokio::task::JoinHandle<()> + Send + 'static,
    {
        let handle = spawn_timer(duration, on_fire);
        let mut slots = self.slots.lock().await;
        let entry = slots.entry(session_id.to_owned()).or_insert(TimerSlots {
            idle: None,
            hard: None,
        });
        if let Some(old) = entry.idle.take() {
            old.abort();
        }
        entry.idle = Some(handle);
    }

    /// Cancel both timers for a session and remove it from the table. A
    /// no-op if the session has no entry (already cancelled, or never
    /// started).
    pub async fn cancel(&self, session_id: &str) {
        let mut slots = self.slots.lock().await;
        if let Some(entry) = slots.remove(session_id) {
            if let Some(h) = entry.idle {
                h.abort();
            }
            if let Some(h) = entry.hard {
                h.abort();
            }
        }
    }

    #[cfg(test)]
    pub async fn has_entry(&self, session_id: &str) -> bool {
        self.slots.lock().await.contains_key(session_id)
    }
}

fn spawn_timer<F>(duration: Duration, on_fire: F) -> JoinHandle<()>
where
    F: FnOnce() -> tokio::task::JoinHandle<()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(duration).await;
        on_fire();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn idle_timer_fires_after_duration_when_not_reset() {
        let controller = TimeoutController::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        controller
            .reset_idle("sess-1", Duration::from_millis(100), move || {
                let fired = fired_clone.clone();
                tokio::spawn(async move {
                    fired.fetch_add(1, Ordering::SeqCst);
                })
            })
            .await;

        tokio::time::advance(Duration::from_millis(150)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resetting_idle_timer_cancels_the_previous_one() {
        let controller = TimeoutController::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let fired_clone = fired.clone();
            controller
                .reset_idle("sess-1", Duration::from_millis(100), move || {
                    let fired = fired_clone.clone();
                    tokio::spawn(async move {
                        fired.fetch_add(1, Ordering::SeqCst);
                    })
                })
                .await;
            tokio::time::advance(Duration::from_millis(50)).await;
        }

        tokio::task::yield_now().await;
        assert_eq!(
            fired.load(Ordering::SeqCst),
            0,
            "no timer should have run to completion yet"
        );

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_hard_timer_from_firing() {
        let controller = TimeoutController::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        controller
            .start_hard("sess-1", Duration::from_millis(100), move || {
                let fired = fired_clone.clone();
                tokio::spawn(async move {
                    fired.fetch_add(1, Ordering::SeqCst);
                })
            })
            .await;

        controller.cancel("sess-1").await;
        tokio::time::advance(Duration::from_millis(200)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!controller.has_entry("sess-1").await);
    }

    #[tokio::test]
    async fn cancel_on_unknown_session_is_a_no_op() {
        let controller = TimeoutController::new();
        controller.cancel("never-started").await;
    }
}

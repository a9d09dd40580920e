use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

/// Per-user "took damage recently" tracker.
///
/// Holds the instant of each user's last qualifying damage. Entries are
/// dropped on disconnect, so a returning user starts without a cooldown.
pub struct CooldownTracker {
    inner: RwLock<TrackerState>,
}

struct TrackerState {
    cooldown: Option<Duration>,
    last_damage: HashMap<Uuid, Instant>,
}

impl CooldownTracker {
    /// `None` disables the cooldown entirely.
    pub fn new(cooldown: Option<Duration>) -> Self {
        Self {
            inner: RwLock::new(TrackerState {
                cooldown,
                last_damage: HashMap::new(),
            }),
        }
    }

    /// Change the configured duration. Existing damage records are kept and
    /// measured against the new duration.
    pub async fn set_cooldown(&self, cooldown: Option<Duration>) {
        self.inner.write().await.cooldown = cooldown;
    }

    pub async fn cooldown_secs(&self) -> u64 {
        self.inner
            .read()
            .await
            .cooldown
            .map_or(0, |d| d.as_secs())
    }

    /// Record damage taken at `now`. Returns false (and changes nothing)
    /// for amounts that are not strictly positive.
    pub async fn record_damage(&self, user: Uuid, amount: f64, now: Instant) -> bool {
        if amount.is_nan() || amount <= 0.0 {
            return false;
        }
        self.inner.write().await.last_damage.insert(user, now);
        true
    }

    /// Whole seconds left before `user` may teleport, rounded up.
    pub async fn remaining_seconds(&self, user: Uuid, now: Instant) -> u64 {
        let state = self.inner.read().await;
        let Some(cooldown) = state.cooldown else {
            return 0;
        };
        let Some(&last) = state.last_damage.get(&user) else {
            return 0;
        };

        let remaining = cooldown.saturating_sub(now.saturating_duration_since(last));
        ceil_secs(remaining)
    }

    pub async fn forget(&self, user: Uuid) {
        self.inner.write().await.last_damage.remove(&user);
    }

    pub async fn tracked_users(&self) -> usize {
        self.inner.read().await.last_damage.len()
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

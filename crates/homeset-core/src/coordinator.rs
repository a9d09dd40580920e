use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use homeset_types::events::Notice;
use homeset_types::models::{Home, Location, TeleportOutcome};

use crate::cooldown::CooldownTracker;
use crate::error::HomeError;
use crate::host::HomeHost;

/// An armed delayed teleport.
struct PendingTeleport {
    /// Identifies this arm; a timer whose ticket no longer matches is stale.
    ticket: Uuid,
    task: AbortHandle,
    /// Where the player stood when the teleport was armed.
    origin: Location,
    /// The home as resolved at request time.
    home: Home,
}

/// Owns every player's pending delayed teleport (at most one each).
#[derive(Clone)]
pub struct TeleportCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    host: Arc<dyn HomeHost>,
    cooldowns: Arc<CooldownTracker>,
    pending: Mutex<HashMap<Uuid, PendingTeleport>>,
}

impl TeleportCoordinator {
    pub fn new(host: Arc<dyn HomeHost>, cooldowns: Arc<CooldownTracker>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                host,
                cooldowns,
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Start a teleport to an already resolved home.
    ///
    /// Any pending teleport for the user is cancelled first. With no delay
    /// the move happens now, the player is told the result and it is also
    /// returned; otherwise a timer is armed against a snapshot of the
    /// player's current location.
    pub async fn begin(
        &self,
        user: Uuid,
        home: Home,
        delay: Option<Duration>,
    ) -> Result<TeleportOutcome, HomeError> {
        self.cancel(user).await;

        let Some(delay) = delay else {
            let result = self.inner.host.teleport(user, &home.location);
            debug!(%user, home = %home.name, ?result, "Immediate home teleport");
            self.inner.host.notify(user, result.notice(home.name.clone()));
            return Ok(result.outcome(home.name));
        };

        let origin = self
            .inner
            .host
            .location(user)
            .ok_or(HomeError::UserUnavailable(user))?;

        let ticket = Uuid::new_v4();
        let delay_secs = delay.as_secs();
        let name = home.name.clone();

        let mut pending = self.inner.pending.lock().await;
        if let Some(previous) = pending.remove(&user) {
            previous.task.abort();
            debug!(%user, home = %previous.home.name, "Replaced pending home teleport");
        }

        self.inner.host.notify(
            user,
            Notice::DelayStarted {
                home: name.clone(),
                delay_secs,
            },
        );

        let coordinator = self.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            coordinator.fire(user, ticket).await;
        });

        pending.insert(
            user,
            PendingTeleport {
                ticket,
                task: task.abort_handle(),
                origin,
                home,
            },
        );

        info!(%user, home = %name, delay_secs, "Home teleport armed");
        Ok(TeleportOutcome::Scheduled {
            home: name,
            delay_secs,
        })
    }

    /// Feed a position update. Cancels the pending teleport if the player
    /// left the block (or world) they were in when it was armed.
    /// Returns true if something was cancelled.
    pub async fn on_move(&self, user: Uuid, to: &Location) -> bool {
        let cancelled = {
            let mut pending = self.inner.pending.lock().await;
            let moved = pending
                .get(&user)
                .is_some_and(|entry| entry.origin.has_moved_blocks(to));
            if moved { pending.remove(&user) } else { None }
        };

        let Some(entry) = cancelled else {
            return false;
        };

        entry.task.abort();
        debug!(%user, home = %entry.home.name, "Pending home teleport cancelled by movement");
        self.inner.host.notify(user, Notice::DelayCancelledMoved);
        true
    }

    /// Drop the pending teleport without telling anyone. Safe to call when
    /// nothing is pending or the timer already fired.
    pub async fn cancel(&self, user: Uuid) -> bool {
        let removed = self.inner.pending.lock().await.remove(&user);
        match removed {
            Some(entry) => {
                entry.task.abort();
                debug!(%user, home = %entry.home.name, "Pending home teleport cancelled");
                true
            }
            None => false,
        }
    }

    pub async fn is_pending(&self, user: Uuid) -> bool {
        self.inner.pending.lock().await.contains_key(&user)
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.pending.lock().await.len()
    }

    async fn fire(&self, user: Uuid, ticket: Uuid) {
        // Claim the entry first so nothing is left behind whatever happens next.
        let claimed = {
            let mut pending = self.inner.pending.lock().await;
            let current = pending.get(&user).is_some_and(|entry| entry.ticket == ticket);
            if current { pending.remove(&user) } else { None }
        };

        let Some(entry) = claimed else {
            debug!(%user, "Stale home teleport timer ignored");
            return;
        };

        if self.inner.host.location(user).is_none() {
            debug!(%user, home = %entry.home.name, "Player offline at fire time, dropping teleport");
            return;
        }

        let cooldowns = &self.inner.cooldowns;
        let remaining_secs = cooldowns.remaining_seconds(user, Instant::now()).await;
        if remaining_secs > 0 {
            debug!(%user, remaining_secs, "Damage cooldown started during delay");
            self.inner.host.notify(
                user,
                Notice::DamageCooldown {
                    remaining_secs,
                    cooldown_secs: cooldowns.cooldown_secs().await,
                },
            );
            return;
        }

        let result = self.inner.host.teleport(user, &entry.home.location);
        info!(%user, home = %entry.home.name, ?result, "Delayed home teleport fired");
        self.inner.host.notify(user, result.notice(entry.home.name));
    }
}

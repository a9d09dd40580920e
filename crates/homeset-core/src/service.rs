use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use homeset_db::Database;
use homeset_types::models::{Home, HomeName, Location, TeleportOutcome};

use crate::config::Settings;
use crate::cooldown::CooldownTracker;
use crate::coordinator::TeleportCoordinator;
use crate::error::HomeError;
use crate::host::{HomeHost, SharingPolicy};

#[derive(Debug, Clone, PartialEq)]
pub struct SetHomeOutcome {
    pub home: Home,
    /// Sharing was requested but the owner may not share; the home was
    /// saved as personal instead.
    pub sharing_denied: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSharedOutcome {
    pub shared: bool,
    pub sharing_denied: bool,
}

/// Entry point for the command layer and the host's event dispatch.
#[derive(Clone)]
pub struct HomeService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    db: Arc<Database>,
    settings: RwLock<Settings>,
    cooldowns: Arc<CooldownTracker>,
    coordinator: TeleportCoordinator,
    policy: Arc<dyn SharingPolicy>,
    /// Serializes check-then-write sequences (home limit, shared name).
    write_lock: Mutex<()>,
}

impl HomeService {
    pub fn new(
        db: Arc<Database>,
        settings: Settings,
        host: Arc<dyn HomeHost>,
        policy: Arc<dyn SharingPolicy>,
    ) -> Self {
        let cooldowns = Arc::new(CooldownTracker::new(settings.cooldown()));
        let coordinator = TeleportCoordinator::new(host, cooldowns.clone());

        Self {
            inner: Arc::new(ServiceInner {
                db,
                settings: RwLock::new(settings),
                cooldowns,
                coordinator,
                policy,
                write_lock: Mutex::new(()),
            }),
        }
    }

    pub async fn settings(&self) -> Settings {
        self.inner.settings.read().await.clone()
    }

    /// Apply new settings to every later request. Pending teleports keep
    /// the delay they were armed with.
    pub async fn reload(&self, settings: Settings) {
        self.inner.cooldowns.set_cooldown(settings.cooldown()).await;
        info!(?settings, "Settings reloaded");
        *self.inner.settings.write().await = settings;
    }

    // -- Requests --

    pub async fn request_set_home(
        &self,
        owner: Uuid,
        name: &str,
        location: Location,
        wants_shared: bool,
    ) -> Result<SetHomeOutcome, HomeError> {
        let name = HomeName::parse(name)?;
        let home_limit = self.inner.settings.read().await.home_limit();
        let db = &self.inner.db;

        let _guard = self.inner.write_lock.lock().await;

        if let Some(max) = home_limit {
            let exists = db
                .home_exists(owner, &name)
                .map_err(|e| storage_failure(e, owner, &name, "check home"))?;
            let count = db
                .count_homes(owner)
                .map_err(|e| storage_failure(e, owner, &name, "count homes"))?;
            if !exists && count >= max {
                debug!(%owner, home = %name, max, "Home limit reached");
                return Err(HomeError::HomeLimitReached { max });
            }
        }

        let may_share = wants_shared && self.inner.policy.can_manage_shared_homes(owner);
        let sharing_denied = wants_shared && !may_share;

        let saved = if may_share {
            let taken = db
                .is_shared_name_taken(owner, &name)
                .map_err(|e| storage_failure(e, owner, &name, "check shared name"))?;
            if taken {
                return Err(HomeError::SharedNameTaken(name));
            }
            db.save_home_as(owner, &name, &location, true)
        } else if sharing_denied {
            db.save_home_as(owner, &name, &location, false)
        } else {
            db.save_home(owner, &name, &location)
        };
        saved.map_err(|e| storage_failure(e, owner, &name, "save home"))?;

        let home = db
            .find_personal(owner, &name)
            .map_err(|e| storage_failure(e, owner, &name, "reload home"))?
            .ok_or_else(|| HomeError::NotFound(name.clone()))?;

        info!(%owner, home = %name, shared = home.shared, sharing_denied, "Home saved");
        Ok(SetHomeOutcome {
            home,
            sharing_denied,
        })
    }

    /// Resolve `name` (personal first, then shared) and teleport to it,
    /// now or after the configured delay.
    pub async fn request_teleport(
        &self,
        owner: Uuid,
        name: &str,
    ) -> Result<TeleportOutcome, HomeError> {
        let cooldowns = &self.inner.cooldowns;
        let remaining_secs = cooldowns.remaining_seconds(owner, Instant::now()).await;
        if remaining_secs > 0 {
            return Err(HomeError::CoolingDown {
                remaining_secs,
                cooldown_secs: cooldowns.cooldown_secs().await,
            });
        }

        let name = HomeName::parse(name)?;
        let home = self.resolve(owner, &name)?;
        let delay = self.inner.settings.read().await.teleport_delay();

        self.inner.coordinator.begin(owner, home, delay).await
    }

    pub async fn request_delete(&self, owner: Uuid, name: &str) -> Result<bool, HomeError> {
        let name = HomeName::parse(name)?;
        let deleted = self
            .inner
            .db
            .delete_home(owner, &name)
            .map_err(|e| storage_failure(e, owner, &name, "delete home"))?;

        if deleted {
            info!(%owner, home = %name, "Home deleted");
        }
        Ok(deleted)
    }

    pub async fn request_list_personal(&self, owner: Uuid) -> Result<Vec<String>, HomeError> {
        self.inner.db.list_personal(owner).map_err(|e| {
            warn!(%owner, "Failed to list homes: {:#}", e);
            HomeError::Persistence(e)
        })
    }

    pub async fn request_list_shared(&self) -> Result<Vec<String>, HomeError> {
        self.inner.db.list_shared().map_err(|e| {
            warn!("Failed to list shared homes: {:#}", e);
            HomeError::Persistence(e)
        })
    }

    /// Change the visibility of an existing home. Sharing without
    /// permission leaves (or makes) the home personal instead of failing.
    pub async fn request_set_shared(
        &self,
        owner: Uuid,
        name: &str,
        shared: bool,
    ) -> Result<SetSharedOutcome, HomeError> {
        let name = HomeName::parse(name)?;
        let db = &self.inner.db;

        let _guard = self.inner.write_lock.lock().await;

        let exists = db
            .home_exists(owner, &name)
            .map_err(|e| storage_failure(e, owner, &name, "check home"))?;
        if !exists {
            return Err(HomeError::NotFound(name));
        }

        let sharing_denied = shared && !self.inner.policy.can_manage_shared_homes(owner);
        let target = shared && !sharing_denied;

        if target {
            let taken = db
                .is_shared_name_taken(owner, &name)
                .map_err(|e| storage_failure(e, owner, &name, "check shared name"))?;
            if taken {
                return Err(HomeError::SharedNameTaken(name));
            }
        }

        db.set_shared(owner, &name, target)
            .map_err(|e| storage_failure(e, owner, &name, "update visibility"))?;

        info!(%owner, home = %name, shared = target, sharing_denied, "Home visibility updated");
        Ok(SetSharedOutcome {
            shared: target,
            sharing_denied,
        })
    }

    // -- Host events --

    pub async fn on_move(&self, user: Uuid, from: &Location, to: &Location) {
        if self.inner.coordinator.on_move(user, to).await {
            debug!(%user, from_world = %from.world, to_world = %to.world, "Movement cancelled home teleport");
        }
    }

    pub async fn on_damage(&self, user: Uuid, amount: f64) {
        if self
            .inner
            .cooldowns
            .record_damage(user, amount, Instant::now())
            .await
        {
            debug!(%user, amount, "Home cooldown started");
        }
    }

    pub async fn on_disconnect(&self, user: Uuid) {
        self.inner.coordinator.cancel(user).await;
        self.inner.cooldowns.forget(user).await;
        let pending = self.inner.coordinator.pending_count().await;
        let cooling_down = self.inner.cooldowns.tracked_users().await;
        debug!(%user, pending, cooling_down, "Player state cleared");
    }

    pub async fn has_pending_teleport(&self, user: Uuid) -> bool {
        self.inner.coordinator.is_pending(user).await
    }

    fn resolve(&self, owner: Uuid, name: &HomeName) -> Result<Home, HomeError> {
        let db = &self.inner.db;
        let personal = db
            .find_personal(owner, name)
            .map_err(|e| storage_failure(e, owner, name, "load home"))?;
        if let Some(home) = personal {
            return Ok(home);
        }

        db.find_shared(name)
            .map_err(|e| storage_failure(e, owner, name, "load shared home"))?
            .ok_or_else(|| HomeError::NotFound(name.clone()))
    }
}

fn storage_failure(err: anyhow::Error, owner: Uuid, name: &HomeName, action: &str) -> HomeError {
    warn!(%owner, home = %name, "Failed to {}: {:#}", action, err);
    HomeError::Persistence(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MoveResult;
    use homeset_types::events::Notice;

    struct NoopHost;

    impl HomeHost for NoopHost {
        fn location(&self, _user: Uuid) -> Option<Location> {
            None
        }

        fn teleport(&self, _user: Uuid, _target: &Location) -> MoveResult {
            MoveResult::Moved
        }

        fn notify(&self, _user: Uuid, _notice: Notice) {}
    }

    fn service(settings: Settings, can_share: bool) -> HomeService {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let policy = move |_user: Uuid| can_share;
        HomeService::new(db, settings, Arc::new(NoopHost), Arc::new(policy))
    }

    fn spot() -> Location {
        Location {
            world: "world".into(),
            x: 1.0,
            y: 64.0,
            z: 1.0,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    #[tokio::test]
    async fn invalid_names_are_conflicts() {
        let svc = service(Settings::default(), true);
        let err = svc
            .request_set_home(Uuid::new_v4(), "bad name", spot(), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn home_limit_blocks_new_names_only() {
        let settings = Settings {
            max_homes: 2,
            ..Settings::default()
        };
        let svc = service(settings, true);
        let owner = Uuid::new_v4();

        svc.request_set_home(owner, "a", spot(), false).await.unwrap();
        svc.request_set_home(owner, "b", spot(), false).await.unwrap();

        let err = svc
            .request_set_home(owner, "c", spot(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, HomeError::HomeLimitReached { max: 2 }));

        // Overwriting an existing home is always allowed.
        svc.request_set_home(owner, "A", spot(), false).await.unwrap();
    }

    #[tokio::test]
    async fn sharing_without_permission_degrades_to_personal() {
        let svc = service(Settings::default(), false);
        let owner = Uuid::new_v4();

        let outcome = svc
            .request_set_home(owner, "base", spot(), true)
            .await
            .unwrap();
        assert!(outcome.sharing_denied);
        assert!(!outcome.home.shared);
        assert!(svc.request_list_shared().await.unwrap().is_empty());

        let toggled = svc.request_set_shared(owner, "base", true).await.unwrap();
        assert_eq!(
            toggled,
            SetSharedOutcome {
                shared: false,
                sharing_denied: true
            }
        );
    }

    #[tokio::test]
    async fn plain_save_keeps_existing_visibility() {
        let svc = service(Settings::default(), true);
        let owner = Uuid::new_v4();

        svc.request_set_home(owner, "base", spot(), true).await.unwrap();
        let resaved = svc
            .request_set_home(owner, "base", spot(), false)
            .await
            .unwrap();
        assert!(resaved.home.shared);
        assert!(!resaved.sharing_denied);
    }

    #[tokio::test]
    async fn set_shared_requires_existing_home() {
        let svc = service(Settings::default(), true);
        let err = svc
            .request_set_shared(Uuid::new_v4(), "nope", true)
            .await
            .unwrap_err();
        assert!(matches!(err, HomeError::NotFound(_)));
    }

    #[tokio::test]
    async fn unsharing_frees_the_name() {
        let svc = service(Settings::default(), true);
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        svc.request_set_home(alice, "market", spot(), true).await.unwrap();
        svc.request_set_home(bob, "market", spot(), false).await.unwrap();

        let err = svc.request_set_shared(bob, "market", true).await.unwrap_err();
        assert!(matches!(err, HomeError::SharedNameTaken(_)));

        svc.request_set_shared(alice, "market", false).await.unwrap();
        let outcome = svc.request_set_shared(bob, "market", true).await.unwrap();
        assert!(outcome.shared);
    }

    #[tokio::test]
    async fn teleport_to_unknown_home_is_not_found() {
        let svc = service(Settings::default(), true);
        let err = svc
            .request_teleport(Uuid::new_v4(), "nowhere")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn reload_changes_cooldown() {
        let svc = service(Settings::default(), true);
        let owner = Uuid::new_v4();
        svc.request_set_home(owner, "base", spot(), false).await.unwrap();

        svc.on_damage(owner, 5.0).await;
        assert!(svc.request_teleport(owner, "base").await.is_ok());

        svc.reload(Settings {
            cooldown_secs: 30,
            ..Settings::default()
        })
        .await;
        svc.on_damage(owner, 5.0).await;
        let err = svc.request_teleport(owner, "base").await.unwrap_err();
        assert!(matches!(
            err,
            HomeError::CoolingDown {
                cooldown_secs: 30,
                ..
            }
        ));
        assert_eq!(svc.settings().await.cooldown_secs, 30);
    }
}

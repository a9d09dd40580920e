use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use homeset_core::{HomeHost, MoveResult};
use homeset_types::events::{BridgeEvent, Notice};
use homeset_types::models::Location;

/// The game host as seen through the bridge connection.
///
/// Tracks what the game server has told us (online players and their last
/// position, loaded worlds) and turns teleports/notices into
/// [`BridgeEvent`]s for connected bridge clients.
#[derive(Clone)]
pub struct BridgeHost {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    events_tx: broadcast::Sender<BridgeEvent>,

    /// Online players: user_id -> last known location
    players: RwLock<HashMap<Uuid, Location>>,

    /// Worlds currently loaded on the game server
    worlds: RwLock<HashSet<String>>,
}

impl BridgeHost {
    pub fn new() -> Self {
        let (events_tx, _) = broadcast::channel(1024);
        Self {
            inner: Arc::new(BridgeInner {
                events_tx,
                players: RwLock::new(HashMap::new()),
                worlds: RwLock::new(HashSet::new()),
            }),
        }
    }

    /// Subscribe to outgoing bridge events.
    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.inner.events_tx.subscribe()
    }

    pub fn player_joined(&self, user_id: Uuid, location: Location) {
        self.write_players().insert(user_id, location);
    }

    pub fn player_moved(&self, user_id: Uuid, to: Location) {
        if let Some(current) = self.write_players().get_mut(&user_id) {
            *current = to;
        }
    }

    pub fn player_quit(&self, user_id: Uuid) -> bool {
        self.write_players().remove(&user_id).is_some()
    }

    /// Forget every tracked player, returning who was online.
    pub fn drop_all_players(&self) -> Vec<Uuid> {
        self.write_players().drain().map(|(id, _)| id).collect()
    }

    pub fn world_loaded(&self, world: String) {
        self.inner
            .worlds
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(world);
    }

    pub fn world_unloaded(&self, world: &str) {
        self.inner
            .worlds
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(world);
    }

    pub fn online_count(&self) -> usize {
        self.inner
            .players
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    fn is_world_loaded(&self, world: &str) -> bool {
        self.inner
            .worlds
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(world)
    }

    fn write_players(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<Uuid, Location>> {
        self.inner
            .players
            .write()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl HomeHost for BridgeHost {
    fn location(&self, user: Uuid) -> Option<Location> {
        self.inner
            .players
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&user)
            .cloned()
    }

    fn teleport(&self, user: Uuid, target: &Location) -> MoveResult {
        if !self.is_world_loaded(&target.world) {
            return MoveResult::WorldUnavailable;
        }

        let mut players = self.write_players();
        let Some(current) = players.get_mut(&user) else {
            return MoveResult::Refused;
        };

        let event = BridgeEvent::Teleport {
            user_id: user,
            location: target.clone(),
        };
        if self.inner.events_tx.send(event).is_err() {
            // No game host listening.
            return MoveResult::Refused;
        }

        *current = target.clone();
        MoveResult::Moved
    }

    fn notify(&self, user: Uuid, notice: Notice) {
        if !self
            .inner
            .players
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&user)
        {
            debug!(%user, ?notice, "Dropping notice for offline player");
            return;
        }
        let _ = self.inner.events_tx.send(BridgeEvent::notice(user, notice));
    }
}

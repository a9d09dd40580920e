use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use homeset_core::{ErrorKind, HomeError, HomeHost, HomeService, MoveResult, Settings};
use homeset_db::Database;
use homeset_types::events::Notice;
use homeset_types::models::{Location, TeleportOutcome};

/// In-process stand-in for the game server.
#[derive(Default)]
struct FakeWorld {
    players: Mutex<HashMap<Uuid, Location>>,
    moves: Mutex<Vec<(Uuid, Location)>>,
    notices: Mutex<Vec<(Uuid, Notice)>>,
}

impl FakeWorld {
    fn join(&self, user: Uuid, location: Location) {
        self.players.lock().unwrap().insert(user, location);
    }

    fn quit(&self, user: Uuid) {
        self.players.lock().unwrap().remove(&user);
    }

    fn moves_of(&self, user: Uuid) -> Vec<Location> {
        self.moves
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, l)| l.clone())
            .collect()
    }

    fn notices_of(&self, user: Uuid) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| *u == user)
            .map(|(_, n)| n.clone())
            .collect()
    }
}

impl HomeHost for FakeWorld {
    fn location(&self, user: Uuid) -> Option<Location> {
        self.players.lock().unwrap().get(&user).cloned()
    }

    fn teleport(&self, user: Uuid, target: &Location) -> MoveResult {
        let mut players = self.players.lock().unwrap();
        match players.get_mut(&user) {
            Some(current) => {
                *current = target.clone();
                self.moves.lock().unwrap().push((user, target.clone()));
                MoveResult::Moved
            }
            None => MoveResult::Refused,
        }
    }

    fn notify(&self, user: Uuid, notice: Notice) {
        self.notices.lock().unwrap().push((user, notice));
    }
}

fn at(x: f64, y: f64, z: f64) -> Location {
    Location {
        world: "world".to_string(),
        x,
        y,
        z,
        yaw: 45.0,
        pitch: 10.0,
    }
}

fn setup(settings: Settings) -> (Arc<FakeWorld>, HomeService) {
    let world = Arc::new(FakeWorld::default());
    let db = Arc::new(Database::open_in_memory().unwrap());
    let service = HomeService::new(db, settings, world.clone(), Arc::new(|_user: Uuid| true));
    (world, service)
}

async fn wait(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn shared_home_resolution_and_cooldown_scenario() {
    let (world, service) = setup(Settings {
        cooldown_secs: 10,
        ..Settings::default()
    });
    let alice = Uuid::from_u128(1);
    let bob = Uuid::from_u128(2);
    let base = at(100.5, 70.0, -20.5);
    world.join(alice, base.clone());
    world.join(bob, at(0.0, 64.0, 0.0));

    let saved = service
        .request_set_home(alice, "base", base.clone(), true)
        .await
        .unwrap();
    assert!(saved.home.shared);

    // Bob has no personal "base", so he lands on Alice's shared one.
    let outcome = service.request_teleport(bob, "BASE").await.unwrap();
    assert!(matches!(outcome, TeleportOutcome::Teleported { .. }));
    assert_eq!(world.moves_of(bob), vec![base.clone()]);

    // Alice already owns the shared name.
    let err = service
        .request_set_home(bob, "base", at(5.0, 64.0, 5.0), true)
        .await
        .unwrap_err();
    assert!(matches!(err, HomeError::SharedNameTaken(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(service.request_list_personal(bob).await.unwrap().is_empty());

    service.on_damage(alice, 4.0).await;
    wait(3).await;
    let err = service.request_teleport(alice, "base").await.unwrap_err();
    match err {
        HomeError::CoolingDown {
            remaining_secs,
            cooldown_secs,
        } => {
            assert_eq!(remaining_secs, 7);
            assert_eq!(cooldown_secs, 10);
        }
        other => panic!("expected cooldown, got {:?}", other),
    }
    assert!(world.moves_of(alice).is_empty());
    assert!(!service.has_pending_teleport(alice).await);
}

#[tokio::test(start_paused = true)]
async fn personal_home_wins_over_shared() {
    let (world, service) = setup(Settings::default());
    let alice = Uuid::from_u128(1);
    let bob = Uuid::from_u128(2);
    world.join(bob, at(0.0, 64.0, 0.0));

    service
        .request_set_home(alice, "farm", at(10.0, 64.0, 10.0), true)
        .await
        .unwrap();
    service
        .request_set_home(bob, "farm", at(-10.0, 64.0, -10.0), false)
        .await
        .unwrap();

    service.request_teleport(bob, "farm").await.unwrap();
    assert_eq!(world.moves_of(bob), vec![at(-10.0, 64.0, -10.0)]);
}

#[tokio::test(start_paused = true)]
async fn delayed_teleport_uses_snapshot_even_if_home_changes() {
    let (world, service) = setup(Settings {
        teleport_delay_secs: 5,
        ..Settings::default()
    });
    let user = Uuid::new_v4();
    world.join(user, at(0.5, 64.0, 0.5));

    let original = at(50.0, 64.0, 50.0);
    service
        .request_set_home(user, "base", original.clone(), false)
        .await
        .unwrap();

    let outcome = service.request_teleport(user, "base").await.unwrap();
    assert!(matches!(outcome, TeleportOutcome::Scheduled { delay_secs: 5, .. }));

    // Edited and then deleted mid-delay: the armed teleport is not retargeted.
    service
        .request_set_home(user, "base", at(-50.0, 64.0, -50.0), false)
        .await
        .unwrap();
    assert!(service.request_delete(user, "base").await.unwrap());

    wait(6).await;
    assert_eq!(world.moves_of(user), vec![original]);
    assert!(!service.has_pending_teleport(user).await);
}

#[tokio::test(start_paused = true)]
async fn movement_cancels_delayed_teleport() {
    let (world, service) = setup(Settings {
        teleport_delay_secs: 3,
        ..Settings::default()
    });
    let user = Uuid::new_v4();
    let start = at(0.5, 64.0, 0.5);
    world.join(user, start.clone());
    service
        .request_set_home(user, "base", at(9.0, 64.0, 9.0), false)
        .await
        .unwrap();

    service.request_teleport(user, "base").await.unwrap();

    let nudge = at(0.9, 64.2, 0.1);
    service.on_move(user, &start, &nudge).await;
    assert!(service.has_pending_teleport(user).await);

    let step = at(1.1, 64.0, 0.1);
    service.on_move(user, &nudge, &step).await;
    assert!(!service.has_pending_teleport(user).await);

    wait(5).await;
    assert!(world.moves_of(user).is_empty());
    assert_eq!(
        world.notices_of(user).last(),
        Some(&Notice::DelayCancelledMoved)
    );
}

#[tokio::test(start_paused = true)]
async fn disconnect_clears_pending_teleport_and_cooldown() {
    let (world, service) = setup(Settings {
        cooldown_secs: 10,
        teleport_delay_secs: 5,
        ..Settings::default()
    });
    let user = Uuid::new_v4();
    world.join(user, at(0.5, 64.0, 0.5));
    service
        .request_set_home(user, "base", at(9.0, 64.0, 9.0), false)
        .await
        .unwrap();

    service.request_teleport(user, "base").await.unwrap();
    let notices_before = world.notices_of(user).len();
    service.on_damage(user, 1.0).await;

    world.quit(user);
    service.on_disconnect(user).await;
    assert!(!service.has_pending_teleport(user).await);

    wait(10).await;
    assert!(world.moves_of(user).is_empty());
    assert_eq!(world.notices_of(user).len(), notices_before);

    // Returning player starts without a cooldown.
    world.join(user, at(0.5, 64.0, 0.5));
    let outcome = service.request_teleport(user, "base").await.unwrap();
    assert!(matches!(outcome, TeleportOutcome::Scheduled { .. }));
}

#[tokio::test(start_paused = true)]
async fn rerequest_while_pending_fires_once() {
    let (world, service) = setup(Settings {
        teleport_delay_secs: 5,
        ..Settings::default()
    });
    let user = Uuid::new_v4();
    world.join(user, at(0.5, 64.0, 0.5));
    service
        .request_set_home(user, "one", at(1.0, 64.0, 1.0), false)
        .await
        .unwrap();
    service
        .request_set_home(user, "two", at(2.0, 64.0, 2.0), false)
        .await
        .unwrap();

    service.request_teleport(user, "one").await.unwrap();
    wait(4).await;
    service.request_teleport(user, "two").await.unwrap();
    wait(4).await;
    assert!(world.moves_of(user).is_empty(), "first timer must not fire");

    wait(2).await;
    assert_eq!(world.moves_of(user), vec![at(2.0, 64.0, 2.0)]);
}

#[tokio::test(start_paused = true)]
async fn zero_damage_does_not_lock_teleports() {
    let (world, service) = setup(Settings {
        cooldown_secs: 10,
        ..Settings::default()
    });
    let user = Uuid::new_v4();
    world.join(user, at(0.5, 64.0, 0.5));
    service
        .request_set_home(user, "base", at(9.0, 64.0, 9.0), false)
        .await
        .unwrap();

    service.on_damage(user, 0.0).await;
    service.on_damage(user, -2.0).await;
    assert!(service.request_teleport(user, "base").await.is_ok());
}

// gore_server/server/tests/integration/world_tick.rs
mod common;

use common::{build_world, build_world_with, connection, drain, map_with_npcs};
use gore_server_core::concurrent::dispose_queue::DisposeTarget;
use gore_server_core::concurrent::event_queue::WorldEvent;
use gore_server_core::core::config::ServerConfig;
use gore_server_core::core::types::{CharacterId, ItemId, MapId, Vec2};
use gore_server_core::entities::stats::StatKind;
use gore_server_core::entities::user::User;
use gore_server_core::world::UpdateOutcome;
use gore_server_core::ServerError;

fn first_character(world: &gore_server_core::World, map: MapId) -> CharacterId {
    world.get_map(map).and_then(|m| m.characters().next()).map(|c| c.id).expect("map has a character")
}

#[test]
fn clock_regression_resets_time_without_advancing() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[("slime", Vec2::new(300.0, 10.0), None)])]);
    let slime = first_character(&world, MapId(1));

    world.update(1000);
    world.update(1100);
    let before = world.get_map(MapId(1)).unwrap().character(slime).unwrap().position;
    assert!(before.y > 10.0, "gravity should have moved the slime");

    world.dispose_stack().push(DisposeTarget::Character { map: MapId(1), id: slime });
    assert_eq!(world.update(900), UpdateOutcome::ClockRegression);
    assert_eq!(world.last_update(), Some(900));
    assert_eq!(world.stats().clock_regressions, 1);
    assert_eq!(world.get_map(MapId(1)).unwrap().character(slime).unwrap().position, before);
    assert_eq!(world.dispose_stack().len(), 1, "regressed tick must not drain");

    assert_eq!(world.update(950), UpdateOutcome::Advanced { delta_ms: 50, disposed: 1 });
}

#[test]
fn killed_npc_is_disposed_before_next_map_update() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[("slime", Vec2::new(300.0, 400.0), None)])]);
    let slime = first_character(&world, MapId(1));
    world.update(1000);
    world.events().drain();

    assert!(world.kill_character(MapId(1), slime, None, 1000));
    let map = world.get_map(MapId(1)).unwrap();
    assert!(!map.is_indexed(slime));
    assert_eq!(world.dispose_stack().len(), 1);

    let outcome = world.update(1033);
    assert_eq!(outcome, UpdateOutcome::Advanced { delta_ms: 33, disposed: 1 });
    let map = world.get_map(MapId(1)).unwrap();
    assert!(map.character(slime).is_none());
    assert!(map.get_entities::<CharacterId>(&map.bounds()).is_empty());
    assert!(world
        .events()
        .drain()
        .contains(&WorldEvent::CharacterRemoved { map: MapId(1), id: slime }));
}

#[test]
fn death_during_map_update_is_disposed_before_the_next_one() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[("slime", Vec2::new(300.0, 400.0), None)])]);
    let slime = first_character(&world, MapId(1));
    world.update(1000);

    let events = world.events().clone();
    world.get_map_mut(MapId(1)).unwrap().character_mut(slime).unwrap().set_stat(StatKind::Hp, 0, &events);
    assert!(world.dispose_stack().is_empty());

    // The slime dies inside this tick's map pass.
    assert_eq!(world.update(1033), UpdateOutcome::Advanced { delta_ms: 33, disposed: 0 });
    assert_eq!(world.dispose_stack().len(), 1);
    assert!(!world.get_map(MapId(1)).unwrap().is_indexed(slime));

    assert_eq!(world.update(1066), UpdateOutcome::Advanced { delta_ms: 33, disposed: 1 });
    let map = world.get_map(MapId(1)).unwrap();
    assert!(map.character(slime).is_none());
    assert!(map.get_entities::<CharacterId>(&map.bounds()).is_empty());
}

#[test]
fn item_expiring_during_update_is_gone_before_the_next_map_update() {
    let mut config = ServerConfig::default();
    config.engine.item_lifetime_ms = 1000;
    let (mut world, _) = build_world_with(config, vec![map_with_npcs(1, &[("bat", Vec2::new(50.0, 50.0), None)])]);
    let bat = first_character(&world, MapId(1));
    world.update(0);
    assert!(world.kill_character(MapId(1), bat, None, 0));

    let map = world.get_map(MapId(1)).unwrap();
    let dropped: Vec<ItemId> = map.get_entities(&map.bounds());
    assert_eq!(dropped.len(), 1);
    let wing = dropped[0];

    world.update(999);
    assert!(world.dispose_stack().is_empty());
    world.update(1000);
    assert_eq!(world.dispose_stack().len(), 1, "expired item is queued once");
    world.update(1010);
    let map = world.get_map(MapId(1)).unwrap();
    assert!(map.item(wing).is_none());
    assert!(!map.is_indexed(wing));
    assert!(world.events().drain().contains(&WorldEvent::ItemRemoved { map: MapId(1), id: wing }));
}

#[test]
fn double_push_disposes_once() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[("slime", Vec2::new(300.0, 400.0), None)])]);
    let slime = first_character(&world, MapId(1));
    world.update(0);

    world.dispose_stack().push(DisposeTarget::Character { map: MapId(1), id: slime });
    world.dispose_stack().push(DisposeTarget::Character { map: MapId(1), id: slime });
    let report = world.process_dispose_stack();
    assert_eq!(report.disposed, 1);
    assert_eq!(report.skipped, 1);
    assert!(world.dispose_stack().is_empty());
    assert_eq!(world.stats().disposed, 1);
}

#[test]
fn empty_broadcast_is_a_logged_no_op() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[])]);
    let (mut conn, mut rx) = connection(1);
    world.login("alice", &mut conn, 0).unwrap();
    drain(&mut rx);

    assert_eq!(world.send(&[]), 0);
    assert_eq!(world.stats().rejected_broadcasts, 1);
    assert!(drain(&mut rx).is_empty());

    assert_eq!(world.send(b"hello"), 1);
    assert_eq!(drain(&mut rx), vec![bytes::Bytes::from_static(b"hello")]);
}

#[test]
#[cfg_attr(feature = "strict-invariants", should_panic(expected = "lost its user binding"))]
fn get_user_recovers_lost_tag_by_connection_id() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[])]);
    let (mut conn, _rx) = connection(7);
    world.login("Alice", &mut conn, 0).unwrap();
    assert_eq!(world.get_user(&mut conn, false).map(|u| u.name().to_string()), Some("Alice".to_string()));

    conn.clear_tag();
    assert!(world.get_user(&mut conn, false).is_none());
    assert_eq!(world.stats().user_lookup_fallbacks, 0);

    let found = world.get_user(&mut conn, true).map(|u| u.name().to_string());
    assert_eq!(found.as_deref(), Some("Alice"));
    assert_eq!(world.stats().user_lookup_fallbacks, 1);
    assert_eq!(conn.tag(), Some("Alice"));
}

#[test]
fn users_are_case_insensitive_and_names_required() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[])]);
    let (mut conn, _rx) = connection(1);
    let user = world.login("Bob", &mut conn, 0).unwrap();
    let (character, sender) = (user.character, conn.sender().clone());
    assert!(world.find_user("BOB").is_some());

    let (mut other, _rx2) = connection(2);
    assert!(matches!(world.login("bob", &mut other, 0), Err(ServerError::LogicError(_))));

    let nameless = User::new("", other.id(), character, MapId(1), sender, 0);
    assert!(matches!(world.add_user(nameless), Err(ServerError::InvalidArgument(_))));
    assert_eq!(world.user_count(), 1);
}

#[test]
fn unknown_map_is_reported_not_fatal() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[])]);
    assert!(world.get_map(MapId(42)).is_none());
    assert!(!world.kill_character(MapId(42), CharacterId(1), None, 0));
    assert!(matches!(world.update(10), UpdateOutcome::Advanced { .. }));
}

// gore_server/server/tests/integration/respawn.rs
mod common;

use common::{build_world, connection, map_with_npcs};
use gore_server_core::core::types::{CharacterId, ItemId, MapId, Vec2};
use gore_server_core::entities::stats::StatKind;
use gore_server_core::world::UserAction;
use gore_server_core::World;

fn npc_on(world: &World, map: MapId, name: &str) -> CharacterId {
    world
        .get_map(map)
        .and_then(|m| m.characters().find(|c| c.name == name))
        .map(|c| c.id)
        .expect("npc spawned")
}

#[test]
fn npc_respawns_at_full_health_once_its_timer_elapses() {
    let spawn_at = Vec2::new(200.0, 300.0);
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[("rat", spawn_at, None)])]);
    let rat = npc_on(&world, MapId(1), "rat");
    world.update(1000);

    let events = world.events().clone();
    {
        let ch = world.get_map_mut(MapId(1)).unwrap().character_mut(rat).unwrap();
        ch.set_stat(StatKind::Hp, 3, &events);
        ch.set_stat(StatKind::Mp, 1, &events);
    }

    assert!(world.kill_character(MapId(1), rat, None, 1000));
    let map = world.get_map(MapId(1)).unwrap();
    assert!(!map.is_indexed(rat));
    assert!(map.character(rat).is_none());
    assert_eq!(map.respawn_wake_time(rat), Some(6000));
    assert!(world.dispose_stack().is_empty(), "respawning NPCs are not disposed");

    world.update(5999);
    let map = world.get_map(MapId(1)).unwrap();
    assert!(!map.is_indexed(rat));
    assert!(map.character(rat).is_none());

    world.update(6000);
    let map = world.get_map(MapId(1)).unwrap();
    assert!(map.is_indexed(rat));
    let ch = map.character(rat).expect("rat is back");
    assert!(ch.is_alive());
    assert_eq!(ch.map(), Some(MapId(1)));
    assert_eq!(ch.stat(StatKind::Hp), ch.stat(StatKind::MaxHp));
    assert_eq!(ch.stat(StatKind::Mp), ch.stat(StatKind::MaxMp));
    assert_eq!(ch.position, spawn_at);
    assert_eq!(map.respawn_count(), 0);
}

#[test]
fn skipped_ticks_still_release_overdue_respawns() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[("rat", Vec2::new(200.0, 300.0), None)])]);
    let rat = npc_on(&world, MapId(1), "rat");
    world.update(1000);
    world.kill_character(MapId(1), rat, None, 1000);

    // Nothing lands exactly on 6000.
    world.update(4000);
    world.update(9137);
    assert!(world.get_map(MapId(1)).unwrap().is_indexed(rat));
}

#[test]
fn respawn_on_another_map_moves_the_npc() {
    let (mut world, _) = build_world(vec![
        map_with_npcs(1, &[]),
        map_with_npcs(2, &[("bat", Vec2::new(50.0, 50.0), Some(1))]),
    ]);
    let bat = npc_on(&world, MapId(2), "bat");
    world.update(0);
    world.kill_character(MapId(2), bat, None, 0);

    assert!(world.get_map(MapId(2)).unwrap().character(bat).is_none());
    assert_eq!(world.get_map(MapId(1)).unwrap().respawn_wake_time(bat), Some(2000));

    world.update(2000);
    let ch = world.get_map(MapId(1)).unwrap().character(bat).expect("bat moved to map 1");
    assert_eq!(ch.map(), Some(MapId(1)));
    // Template inventory is restocked on respawn.
    assert_eq!(ch.inventory.items().map(|i| i.amount as u32).sum::<u32>(), 2);
}

#[test]
fn dead_npc_drops_its_inventory() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[("bat", Vec2::new(50.0, 50.0), None)])]);
    let bat = npc_on(&world, MapId(1), "bat");
    world.update(0);
    world.kill_character(MapId(1), bat, None, 0);

    let map = world.get_map(MapId(1)).unwrap();
    let dropped: Vec<ItemId> = map.get_entities(&map.bounds());
    assert_eq!(dropped.len(), 1);
    assert_eq!(map.item(dropped[0]).map(|i| i.name.as_str()), Some("wing"));
}

#[test]
fn users_are_restored_in_place_not_disposed() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[])]);
    let (mut conn, _rx) = connection(1);
    let me = world.login("carol", &mut conn, 0).unwrap().character;
    world.update(0);
    assert!(world.user_action("carol", UserAction::Move(Some(gore_server_core::core::types::Direction::Right)), 0));
    world.update(500);

    assert!(world.kill_character(MapId(1), me, None, 500));
    let map = world.get_map(MapId(1)).unwrap();
    let ch = map.character(me).unwrap();
    assert!(ch.is_alive());
    assert_eq!(ch.position, map.spawn_position());
    assert_eq!(ch.stat(StatKind::Hp), ch.stat(StatKind::MaxHp));
    assert!(world.dispose_stack().is_empty());
    assert!(world.find_user("carol").is_some());
}

#[test]
fn loot_from_repeated_kills_expires_instead_of_piling_up() {
    let (mut world, _) = build_world(vec![map_with_npcs(1, &[("bat", Vec2::new(50.0, 50.0), None)])]);
    let bat = npc_on(&world, MapId(1), "bat");
    let mut now = 0;
    world.update(now);
    for _ in 0..50 {
        assert!(world.kill_character(MapId(1), bat, None, now));
        now += 2000;
        world.update(now);
    }
    assert_eq!(world.get_map(MapId(1)).unwrap().items().count(), 50);

    now += 60 * 60 * 1000;
    world.update(now);
    world.update(now + 33);
    let map = world.get_map(MapId(1)).unwrap();
    assert_eq!(map.items().count(), 0);
    assert!(map.get_entities::<ItemId>(&map.bounds()).is_empty());
}

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use archstore::*;
use itertools::Itertools;
use pretty_assertions::assert_eq;

#[derive(Default, Debug, Clone, PartialEq)]
struct Position(i32, i32);

#[derive(Default, Debug, Clone, PartialEq)]
struct Name(String);

struct Selected;

component!(Position, Name);
tag!(Selected);

#[test]
fn playback() -> anyhow::Result<()> {
    let mut store = EntityStore::new();
    let ids = (0..8).map(|_| store.create_entity()).collect_vec();

    let mut cmd = CommandBuffer::new();
    for (i, &id) in ids.iter().enumerate() {
        cmd.add_component(id, Position(i as i32, 0))
            .add_component(id, Name(format!("entity.{i}")));

        if i % 2 == 0 {
            cmd.add_tag::<Selected>(id);
        }
    }

    assert_eq!(cmd.entity_count(), 8);
    assert_eq!(cmd.command_count(), 20);

    // Nothing happens until playback
    assert!(!store.has_component::<Position>(ids[0]));

    cmd.playback(&mut store)?;
    assert!(cmd.is_empty());

    for (i, &id) in ids.iter().enumerate() {
        assert_eq!(*store.get_component::<Position>(id)?, Position(i as i32, 0));
        assert_eq!(store.get_component::<Name>(id)?.0, format!("entity.{i}"));
        assert_eq!(store.has_tag::<Selected>(id), i % 2 == 0);
    }

    let selected = store.find_archetype(&Signature::of::<(Position, Name), (Selected,)>());
    assert_eq!(selected.map(|v| store.archetype(v).len()), Some(4));

    // Updates and removals
    cmd.set_component(ids[1], Position(-1, -1))
        .remove_component::<Name>(ids[1])
        .remove_tag::<Selected>(ids[0]);
    cmd.playback(&mut store)?;

    assert_eq!(*store.get_component::<Position>(ids[1])?, Position(-1, -1));
    assert!(!store.has_component::<Name>(ids[1]));
    assert!(!store.has_tag::<Selected>(ids[0]));

    Ok(())
}

#[test]
fn stale_entity_fails() {
    let mut store = EntityStore::new();
    let alive = store.create_entity();
    let dead = store.create_entity();
    store.delete_entity(dead).unwrap();

    let mut cmd = CommandBuffer::new();
    cmd.add_component(alive, Position(1, 1))
        .add_component(dead, Position(2, 2));

    let err = cmd.playback(&mut store).unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::StaleHandle(dead))
    );

    assert!(!store.has_component::<Position>(alive));
    assert!(cmd.is_empty());
}

#[test]
fn playback_raises_no_events() -> anyhow::Result<()> {
    let mut store = EntityStore::new();
    let id = store.create_entity();

    let count = Arc::new(AtomicUsize::new(0));
    store.on_component_changed({
        let count = count.clone();
        move |_| {
            count.fetch_add(1, Ordering::Relaxed);
        }
    });

    let mut cmd = CommandBuffer::new();
    cmd.add_component(id, Position(0, 0)).add_tag::<Selected>(id);
    cmd.playback(&mut store)?;

    assert!(store.has_component::<Position>(id));
    assert_eq!(count.load(Ordering::Relaxed), 0);

    Ok(())
}

#[test]
fn update_before_removal() -> anyhow::Result<()> {
    let mut store = EntityStore::new();
    let single = store.create_entity();
    let deferred = store.create_entity();

    for id in [single, deferred] {
        store.add_component(id, Position(1, 1))?;
    }

    store.set_component(single, Position(2, 2))?;
    store.remove_component::<Position>(single)?;
    store.add_component(single, Name("late".into()))?;
    store.set_component(single, Name("later".into()))?;

    let mut cmd = CommandBuffer::new();
    cmd.set_component(deferred, Position(2, 2))
        .remove_component::<Position>(deferred)
        .add_component(deferred, Name("late".into()))
        .set_component(deferred, Name("later".into()));

    cmd.playback(&mut store)?;

    assert_eq!(store.signature(deferred)?, store.signature(single)?);
    assert!(!store.has_component::<Position>(deferred));
    assert_eq!(*store.get_component::<Name>(deferred)?, Name("later".into()));

    // An update after the removal fails as it would one call at a time
    cmd.add_component(deferred, Position(3, 3))
        .remove_component::<Position>(deferred)
        .set_component(deferred, Position(4, 4));

    let err = cmd.playback(&mut store).unwrap_err();
    assert_eq!(
        err.downcast_ref::<Error>(),
        Some(&Error::MissingComponent {
            entity: deferred,
            missing: "[Position]".into()
        })
    );
    assert!(!store.has_component::<Position>(deferred));

    Ok(())
}

use std::collections::BTreeMap;

use archstore::*;
use itertools::Itertools;
use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Default, Debug, Clone, PartialEq)]
struct Position(i64, i64);

#[derive(Default, Debug, Clone, PartialEq)]
struct Label(String);

struct Marked;

component!(Position, Label);
tag!(Marked);

#[test]
fn identity() -> Result<(), Error> {
    let mut store = EntityStore::new();
    assert_eq!(store.archetype_count(), 1);

    let a = store.create_entity();
    let b = store.create_entity();

    store.add_component(a, Position(1, 1))?;
    store.add_component(a, Label("a".into()))?;

    store.add_component(b, Label("b".into()))?;
    store.add_component(b, Position(2, 2))?;

    // Insertion order does not matter
    let arch = store.entity_archetype(a)?.id();
    assert_eq!(store.entity_archetype(b)?.id(), arch);
    assert_eq!(
        store.find_archetype(&Signature::of::<(Label, Position), ()>()),
        Some(arch)
    );
    assert_eq!(store.signature(a)?.to_string(), "[Label, Position]");

    // Default, (Position), (Label), (Label, Position)
    assert_eq!(store.archetype_count(), 4);

    Ok(())
}

#[test]
fn round_trip() -> Result<(), Error> {
    let mut store = EntityStore::new();
    let entity = store.create_entity();

    store.add_component(entity, Position(4, 2))?;
    let before = store.entity_archetype(entity)?.id();

    store.add_component(entity, Label("x".into()))?;
    store.add_tag::<Marked>(entity)?;
    store.remove_tag::<Marked>(entity)?;
    store.remove_component::<Label>(entity)?;

    assert_eq!(store.entity_archetype(entity)?.id(), before);
    assert_eq!(*store.get_component::<Position>(entity)?, Position(4, 2));

    Ok(())
}

#[test]
fn info() -> Result<(), Error> {
    let mut store = EntityStore::with_config(StoreConfig::new().with_default_capacity(2));
    let arch = store.get_archetype(&Signature::of::<(Position,), (Marked,)>());

    let ids = (0..3).map(|_| store.create_entity_in(arch)).collect_vec();

    let info = store.archetype(arch).info();
    assert_eq!(info.len(), 3);
    assert_eq!(info.capacity(), 4);
    assert_eq!(info.entities(), &ids[..]);
    assert_eq!(info.signature().to_string(), "[Position, #Marked]");

    let columns = store.archetype(arch).borrow::<Position>().unwrap();
    assert_eq!(columns.len(), 3);
    assert!(store.archetype(arch).borrow::<Label>().is_none());

    Ok(())
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Expected {
    position: Option<Position>,
    label: Option<Label>,
    marked: bool,
}

fn verify(store: &EntityStore, expected: &BTreeMap<Entity, Expected>) {
    for (&entity, expected) in expected {
        let position = store
            .try_get_component::<Position>(entity)
            .unwrap()
            .map(|v| Position::clone(&v));
        let label = store
            .try_get_component::<Label>(entity)
            .unwrap()
            .map(|v| Label::clone(&v));

        assert_eq!(
            Expected {
                position,
                label,
                marked: store.has_tag::<Marked>(entity),
            },
            *expected,
            "{entity}"
        );
    }

    // Every row points back at the node referencing it
    for archetype in store.archetypes() {
        for (row, &entity) in archetype.entities().iter().enumerate() {
            let node = store.node(entity).unwrap();
            assert_eq!(node.archetype(), Some(archetype.id()));
            assert_eq!(node.row(), row);
        }
    }

    assert_eq!(store.len(), expected.len());
}

#[test]
fn random_structural_changes() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let mut rng = StdRng::seed_from_u64(7);
    let mut store = EntityStore::with_config(StoreConfig::new().with_default_capacity(4));
    let mut expected = BTreeMap::new();

    for step in 0..2000 {
        let alive = expected.keys().copied().collect_vec();

        if alive.is_empty() || rng.gen_bool(0.15) {
            expected.insert(store.create_entity(), Expected::default());
            continue;
        }

        let entity = alive[rng.gen_range(0..alive.len())];
        let state = expected.get_mut(&entity).unwrap();

        match rng.gen_range(0..7) {
            0 | 1 => {
                let value = Position(step, -step);
                store.add_component(entity, value.clone())?;
                state.position = Some(value);
            }
            2 => {
                store.remove_component::<Position>(entity)?;
                state.position = None;
            }
            3 => {
                let value = Label(format!("step {step}"));
                store.add_component(entity, value.clone())?;
                state.label = Some(value);
            }
            4 => {
                store.remove_component::<Label>(entity)?;
                state.label = None;
            }
            5 => {
                if state.marked {
                    store.remove_tag::<Marked>(entity)?;
                } else {
                    store.add_tag::<Marked>(entity)?;
                }
                state.marked = !state.marked;
            }
            _ => {
                store.delete_entity(entity)?;
                expected.remove(&entity);
            }
        }

        if step % 50 == 0 {
            verify(&store, &expected);
        }
    }

    verify(&store, &expected);

    Ok(())
}

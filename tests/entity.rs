use std::sync::{Arc, Mutex};

use archstore::*;
use itertools::Itertools;
use pretty_assertions::assert_eq;

#[derive(Default, Debug, Clone, PartialEq)]
struct Health(f32);

#[derive(Default, Debug, Clone, PartialEq)]
struct Mana(u32);

struct Player;

component!(Health, Mana);
tag!(Player);

#[test]
fn create_and_delete() -> Result<(), Error> {
    let mut store = EntityStore::new();
    assert!(store.is_empty());

    let ids = (0..3).map(|_| store.create_entity()).collect_vec();
    assert_eq!(ids.iter().map(|v| v.id()).collect_vec(), [1, 2, 3]);
    assert_eq!(store.len(), 3);

    let node = store.node(ids[0])?;
    assert_eq!(node.archetype(), Some(ArchetypeId::DEFAULT));
    assert!(node.flags().contains(NodeFlags::CREATED));

    store.add_component(ids[0], Health(1.0))?;
    assert!(!store.node(ids[0])?.flags().contains(NodeFlags::CREATED));

    store.delete_entity(ids[1])?;
    assert!(!store.is_alive(ids[1]));
    assert_eq!(store.len(), 2);
    assert_eq!(store.delete_entity(ids[1]), Err(Error::StaleHandle(ids[1])));
    assert_eq!(
        store.add_component(ids[1], Health(2.0)),
        Err(Error::StaleHandle(ids[1]))
    );
    assert_eq!(
        store.format_entity(ids[1]).to_string(),
        "id: 2  (deleted)"
    );

    assert_eq!(store.entities().collect_vec(), [ids[0], ids[2]]);

    // Recycled ids invalidate old handles
    let recycled = store.create_entity();
    assert_eq!(recycled.id(), ids[1].id());
    assert_ne!(recycled, ids[1]);
    assert_eq!(recycled.revision(), ids[1].revision() + 1);
    assert!(!store.is_alive(ids[1]));
    assert_eq!(store.entity_by_id(2), Some(recycled));

    Ok(())
}

#[test]
fn delete_fixes_moved_rows() -> Result<(), Error> {
    let mut store = EntityStore::new();

    let ids = (0..4).map(|_| store.create_entity()).collect_vec();
    for (i, &id) in ids.iter().enumerate() {
        store.add_component(id, Health(i as f32))?;
    }

    store.delete_entity(ids[0])?;

    for (i, &id) in ids.iter().enumerate().skip(1) {
        assert_eq!(*store.get_component::<Health>(id)?, Health(i as f32));
        let node = store.node(id)?;
        assert_eq!(store.archetype(node.archetype().unwrap()).entities()[node.row()], id);
    }

    let archetype = store.entity_archetype(ids[1])?;
    assert_eq!(archetype.len(), 3);

    Ok(())
}

#[test]
fn create_at_id() -> Result<(), Error> {
    let mut store = EntityStore::new();

    let entity = store.create_entity_at(10)?;
    assert_eq!(entity.id(), 10);
    assert_eq!(store.create_entity_at(10), Err(Error::EntityOccupied(10)));
    assert_eq!(store.create_entity_at(0), Err(Error::InvalidId(0)));
    assert_eq!(
        Error::InvalidId(0).to_string(),
        "0 is not a valid entity id"
    );

    // Skipped ids are handed out lowest first
    assert_eq!(store.create_entity().id(), 1);
    assert_eq!(store.create_entity().id(), 2);

    store.delete_entity(entity)?;
    let again = store.create_entity_at(10)?;
    assert_eq!(again.revision(), entity.revision() + 1);

    Ok(())
}

#[test]
fn create_with_components() -> Result<(), Error> {
    let mut store = EntityStore::new();
    let changed = Arc::new(Mutex::new(0));
    store.on_component_changed({
        let changed = changed.clone();
        move |_| *changed.lock().unwrap() += 1
    });

    let a = store.create_entity_with((Health(5.0), Mana(3)), Tags::of::<(Player,)>());
    let b = store.create_entity_with((Mana(1),), Tags::new());

    // Default, (Health, Mana, #Player), (Mana)
    assert_eq!(store.archetype_count(), 3);
    assert_eq!(
        store.signature(a)?,
        Signature::of::<(Health, Mana), (Player,)>()
    );
    assert_eq!(*store.get_component::<Health>(a)?, Health(5.0));
    assert_eq!(*store.get_component::<Mana>(a)?, Mana(3));
    assert_eq!(*store.get_component::<Mana>(b)?, Mana(1));
    assert!(!store.has_component::<Health>(b));

    let tagged = store.create_entity_with((), Tags::of::<(Player,)>());
    assert_eq!(store.signature(tagged)?, Signature::of::<(), (Player,)>());

    assert_eq!(*changed.lock().unwrap(), 0);

    Ok(())
}

#[test]
fn create_in_archetype() -> Result<(), Error> {
    let mut store = EntityStore::new();
    let archetype = store.get_archetype(&Signature::of::<(Health, Mana), (Player,)>());

    let entity = store.create_entity_in(archetype);

    assert_eq!(*store.get_component::<Health>(entity)?, Health::default());
    assert_eq!(*store.get_component::<Mana>(entity)?, Mana::default());
    assert!(store.has_tag::<Player>(entity));
    assert_eq!(store.archetype(archetype).entities(), [entity]);

    Ok(())
}

#[test]
fn pid_as_id() -> Result<(), Error> {
    let mut store =
        EntityStore::with_config(StoreConfig::new().with_pid_type(PidType::UsePidAsId));

    let a = store.create_entity();
    let b = store.create_entity();

    assert_eq!(store.node(a)?.pid(), 1);
    assert_eq!(store.node(b)?.pid(), 2);
    assert_eq!(store.entity_by_pid(2), Some(b));
    assert_eq!(store.entity_by_pid(3), None);

    store.delete_entity(b)?;
    assert_eq!(store.entity_by_pid(2), None);

    Ok(())
}

#[test]
fn random_pids() -> Result<(), Error> {
    let mut store = EntityStore::with_config(StoreConfig::new().with_seed(42));

    let ids = (0..64).map(|_| store.create_entity()).collect_vec();
    let pids = ids
        .iter()
        .map(|&id| store.node(id).map(|v| v.pid()))
        .collect::<Result<Vec<_>, _>>()?;

    assert!(pids.iter().all(|&v| v > 0 && v <= i64::MAX as u64));
    assert!(pids.iter().all_unique());

    for (&id, &pid) in ids.iter().zip(&pids) {
        assert_eq!(store.entity_by_pid(pid), Some(id));
    }

    store.delete_entity(ids[5])?;
    assert_eq!(store.entity_by_pid(pids[5]), None);

    // Same seed, same pids
    let mut other = EntityStore::with_config(StoreConfig::new().with_seed(42));
    let first = other.create_entity();
    assert_eq!(other.node(first)?.pid(), pids[0]);

    Ok(())
}

#[test]
fn hierarchy() -> Result<(), Error> {
    let mut store = EntityStore::new();
    let events = Arc::new(Mutex::new(Vec::new()));

    store.on_child_entities_changed({
        let events = events.clone();
        move |event| events.lock().unwrap().push(event.to_string())
    });

    let root = store.create_entity();
    let a = store.create_entity();
    let b = store.create_entity();
    let c = store.create_entity();

    store.add_child(root, a)?;
    store.add_child(root, b)?;
    store.insert_child(root, c, 0)?;

    assert_eq!(store.children(root)?, [c, a, b]);
    assert_eq!(store.child_count(root)?, 3);
    assert_eq!(store.parent(a)?, Some(root));
    assert_eq!(store.parent(root)?, None);
    assert!(store.node(a)?.flags().contains(NodeFlags::TREE_NODE));

    // Already a child
    store.add_child(root, a)?;
    assert_eq!(store.children(root)?, [c, a, b]);

    assert_eq!(
        store.add_child(a, root),
        Err(Error::HierarchyCycle {
            parent: a,
            child: root
        })
    );
    assert_eq!(
        store.add_child(a, a),
        Err(Error::HierarchyCycle { parent: a, child: a })
    );

    // Moving to another parent detaches it first
    store.add_child(a, b)?;
    assert_eq!(store.children(root)?, [c, a]);
    assert_eq!(store.children(a)?, [b]);

    assert!(store.remove_child(root, c)?);
    assert!(!store.remove_child(root, c)?);
    assert_eq!(store.parent(c)?, None);

    // Children of a deleted entity become roots
    store.delete_entity(a)?;
    assert_eq!(store.parent(b)?, None);
    assert_eq!(store.children(root)?, Vec::<Entity>::new());
    assert!(!store.node(b)?.flags().contains(NodeFlags::TREE_NODE));

    assert_eq!(
        *events.lock().unwrap(),
        [
            "entity: 1 - event > Add Child[0] = 2",
            "entity: 1 - event > Add Child[1] = 3",
            "entity: 1 - event > Add Child[0] = 4",
            "entity: 1 - event > Remove Child[2] = 3",
            "entity: 2 - event > Add Child[0] = 3",
            "entity: 1 - event > Remove Child[0] = 4",
            "entity: 1 - event > Remove Child[0] = 2",
            "entity: 2 - event > Remove Child[0] = 3",
        ]
    );

    Ok(())
}

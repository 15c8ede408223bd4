use archstore::*;
use glam::Vec3;
use itertools::Itertools;
use pretty_assertions::assert_eq;

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct Position(Vec3);

#[derive(Default, Debug, Clone, Copy, PartialEq)]
struct Velocity(Vec3);

#[derive(Default, Debug, Clone, PartialEq)]
struct Health(f32);

struct Frozen;
struct Player;
struct Enemy;

component!(Position, Velocity, Health);
tag!(Frozen, Player, Enemy);

#[test]
fn integrate() -> Result<(), Error> {
    let mut store = EntityStore::new();

    let mut moving = Vec::new();
    for i in 0..5 {
        let id = store.create_entity();
        store.add_component(id, Position(Vec3::splat(i as f32)))?;
        store.add_component(id, Velocity(Vec3::X))?;
        moving.push(id);
    }

    let mut fixed = Vec::new();
    for _ in 0..3 {
        let id = store.create_entity();
        store.add_component(id, Position(Vec3::ONE))?;
        fixed.push(id);
    }

    let mut frozen = Vec::new();
    for _ in 0..2 {
        let id = store.create_entity();
        store.add_component(id, Position(Vec3::ZERO))?;
        store.add_component(id, Velocity(Vec3::Y))?;
        store.add_tag::<Frozen>(id)?;
        frozen.push(id);
    }

    let mut query = store
        .query::<(Position, Velocity)>()
        .without_any_tags(Tags::of::<(Frozen,)>());

    assert_eq!(query.count(&store), 5);

    query.for_each_entity(
        &store,
        |(pos, vel): (&mut Position, &mut Velocity), _: Entity| {
            pos.0 += vel.0;
        },
    );

    for (i, &id) in moving.iter().enumerate() {
        assert_eq!(
            *store.get_component::<Position>(id)?,
            Position(Vec3::splat(i as f32) + Vec3::X)
        );
    }

    for &id in &frozen {
        assert_eq!(*store.get_component::<Position>(id)?, Position(Vec3::ZERO));
    }

    // Same update through chunks
    for mut chunk in query.chunks(&store) {
        assert_eq!(chunk.len(), 5);
        let (pos, vel) = &mut chunk.columns;
        for (pos, vel) in pos.iter_mut().zip(vel.iter()) {
            pos.0 += vel.0;
        }
    }

    assert_eq!(
        *store.get_component::<Position>(moving[0])?,
        Position(Vec3::X * 2.0)
    );

    assert_eq!(store.query::<(Position,)>().count(&store), 10);
    assert_eq!(
        store
            .query::<(Position,)>()
            .without::<(Velocity,)>()
            .entities(&store)
            .collect_vec(),
        fixed
    );
    assert_eq!(
        store
            .query::<(Position,)>()
            .with::<(Velocity,)>()
            .count(&store),
        7
    );

    Ok(())
}

#[test]
fn chunk_rows() -> Result<(), Error> {
    let mut store = EntityStore::new();

    for i in 0..4 {
        let id = store.create_entity();
        store.add_component(id, Health(i as f32))?;
    }

    let mut query = Query::<(Health,)>::new();
    let mut seen = Vec::new();
    for mut chunk in query.chunks(&store) {
        for row in 0..chunk.len() {
            let entity = chunk.entities[row];
            let (health,) = chunk.row_mut(row);
            health.0 *= 10.0;
            seen.push((entity.id(), health.0));
        }
    }

    assert_eq!(seen, [(1, 0.0), (2, 10.0), (3, 20.0), (4, 30.0)]);

    Ok(())
}

#[test]
fn cache_picks_up_new_archetypes() -> Result<(), Error> {
    let mut store = EntityStore::new();
    let mut query = Query::<(Health,)>::new();

    assert_eq!(query.count(&store), 0);

    let id = store.create_entity();
    store.add_component(id, Health(1.0))?;
    assert_eq!(query.count(&store), 1);

    store.add_tag::<Player>(id)?;
    assert_eq!(query.count(&store), 1);
    assert_eq!(query.archetypes(&store).len(), 2);

    // Unrelated archetypes are not matched
    let other = store.create_entity();
    store.add_component(other, Velocity::default())?;
    assert_eq!(query.archetypes(&store).len(), 2);

    // A query may be used with another store
    let empty = EntityStore::new();
    assert_eq!(query.count(&empty), 0);
    assert_eq!(query.count(&store), 1);

    Ok(())
}

#[test]
fn tag_filters() -> Result<(), Error> {
    let mut store = EntityStore::new();

    let mut spawn = |tags: Tags| -> Result<Entity, Error> {
        let id = store.create_entity();
        store.add_component(id, Health(100.0))?;
        store.add_tags(id, tags)?;
        Ok(id)
    };

    let player = spawn(Tags::of::<(Player,)>())?;
    let enemy = spawn(Tags::of::<(Enemy,)>())?;
    let both = spawn(Tags::of::<(Player, Enemy)>())?;
    let none = spawn(Tags::new())?;

    let both_tags = Tags::of::<(Player, Enemy)>();

    let matched = |query: Query<(Health,)>| {
        let mut query = query;
        query.entities(&store).sorted().collect_vec()
    };

    assert_eq!(
        matched(Query::new().all_tags(Tags::of::<(Player,)>())),
        [player, both]
    );
    assert_eq!(
        matched(Query::new().any_tags(both_tags)),
        [player, enemy, both]
    );
    assert_eq!(
        matched(Query::new().without_all_tags(both_tags)),
        [player, enemy, none]
    );
    assert_eq!(matched(Query::new().without_any_tags(both_tags)), [none]);
    assert_eq!(
        matched(Query::new().with_tag::<Player>().with_tag::<Enemy>()),
        [both]
    );

    Ok(())
}

#[test]
fn disabled_entities() -> Result<(), Error> {
    let mut store = EntityStore::new();

    let ids = (0..4).map(|_| store.create_entity()).collect_vec();
    for &id in &ids {
        store.add_component(id, Health(1.0))?;
    }

    store.set_enabled(ids[1], false)?;
    assert!(!store.is_enabled(ids[1])?);
    assert!(store.is_enabled(ids[0])?);

    let mut query = Query::<(Health,)>::new();
    assert_eq!(query.count(&store), 3);
    assert!(!query.entities(&store).contains(&ids[1]));

    let mut all = Query::<(Health,)>::new().with_disabled();
    assert_eq!(all.count(&store), 4);

    store.set_enabled(ids[1], true)?;
    assert_eq!(query.count(&store), 4);

    Ok(())
}

#[test]
fn entities_only() -> Result<(), Error> {
    let mut store = EntityStore::new();
    let a = store.create_entity();
    let b = store.create_entity();
    store.add_tag::<Player>(b)?;

    let mut query = Query::<()>::new().with_tag::<Player>();
    assert_eq!(query.entities(&store).collect_vec(), [b]);

    let mut everything = Query::<()>::new();
    assert_eq!(everything.entities(&store).sorted().collect_vec(), [a, b]);

    Ok(())
}

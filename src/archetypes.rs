use std::collections::HashMap;

use alloc::vec::Vec;

use crate::{
    archetype::{Archetype, ArchetypeId},
    Signature,
};

/// Maps each distinct signature to exactly one archetype
pub(crate) struct Archetypes {
    inner: Vec<Archetype>,
    index: HashMap<Signature, ArchetypeId>,
    /// Incremented for each created archetype
    gen: u32,
    default_capacity: usize,
}

impl Archetypes {
    pub fn new(default_capacity: usize) -> Self {
        let mut archetypes = Self {
            inner: Vec::new(),
            index: HashMap::new(),
            gen: 0,
            default_capacity,
        };

        let root = archetypes.insert(Signature::default());
        debug_assert_eq!(root, ArchetypeId::DEFAULT);

        archetypes
    }

    #[track_caller]
    pub fn get(&self, arch_id: ArchetypeId) -> &Archetype {
        match self.inner.get(arch_id.index()) {
            Some(v) => v,
            None => panic!("Invalid archetype: {arch_id}"),
        }
    }

    #[track_caller]
    pub fn get_mut(&mut self, arch_id: ArchetypeId) -> &mut Archetype {
        match self.inner.get_mut(arch_id.index()) {
            Some(v) => v,
            None => panic!("Invalid archetype: {arch_id}"),
        }
    }

    /// Borrow two distinct archetypes mutably
    #[track_caller]
    pub fn get_disjoint_mut(
        &mut self,
        a: ArchetypeId,
        b: ArchetypeId,
    ) -> (&mut Archetype, &mut Archetype) {
        assert_ne!(a, b, "Archetypes must be disjoint");

        if a < b {
            let (lo, hi) = self.inner.split_at_mut(b.index());
            (&mut lo[a.index()], &mut hi[0])
        } else {
            let (lo, hi) = self.inner.split_at_mut(a.index());
            (&mut hi[0], &mut lo[b.index()])
        }
    }

    pub fn find(&self, signature: &Signature) -> Option<ArchetypeId> {
        self.index.get(signature).copied()
    }

    /// Returns the archetype of `signature`, creating it if it does not exist
    pub fn get_or_create(&mut self, signature: &Signature) -> ArchetypeId {
        match self.index.get(signature) {
            Some(&id) => id,
            None => self.insert(*signature),
        }
    }

    fn insert(&mut self, signature: Signature) -> ArchetypeId {
        assert!(
            !self.index.contains_key(&signature),
            "Archetype {signature} is already registered"
        );

        let id = ArchetypeId(self.inner.len() as u32);
        tracing::debug!(%id, %signature, "creating archetype");

        self.inner.push(Archetype::create_with_signature(
            id,
            signature,
            self.default_capacity,
        ));
        self.index.insert(signature, id);
        self.gen = self.gen.wrapping_add(1);

        id
    }

    /// Structure version of the archetype set
    pub fn gen(&self) -> u32 {
        self.gen
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Archetype> {
        self.inner.iter()
    }
}

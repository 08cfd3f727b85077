//! Typed component store.
//!
//! Entities are plain ids. Each component type lives in its own sparse
//! table keyed by entity id, and every live entity carries a
//! [`ComponentSet`] signature recording which tables hold a row for it.
//! "Entity with components X, Y, Z" is then a signature containment test
//! instead of a walk over untyped component bags.
//!
//! Tables are `BTreeMap`s so that iteration is always in ascending entity
//! id order, which keeps queries deterministic across servers.

use std::collections::BTreeMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::components::{
    Attack, Base, CreateCommand, Decorated, EntityId, Label, MeleeCommand, MovementCommand,
    PlayerOwned, Position, Resource, ResourceCarrier, ShootCommand, Unit,
};
use crate::error::{GameError, Result};

bitflags! {
    /// A set of component types.
    ///
    /// Used both as the per-entity signature and as the filter for queries.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ComponentSet: u32 {
        /// [`Unit`]
        const UNIT = 1 << 0;
        /// [`Position`]
        const POSITION = 1 << 1;
        /// [`PlayerOwned`]
        const PLAYER_OWNED = 1 << 2;
        /// [`Attack`]
        const ATTACK = 1 << 3;
        /// [`Base`]
        const BASE = 1 << 4;
        /// [`Label`]
        const LABEL = 1 << 5;
        /// [`ResourceCarrier`]
        const RESOURCE_CARRIER = 1 << 6;
        /// [`Resource`]
        const RESOURCE = 1 << 7;
        /// [`Decorated`]
        const DECORATED = 1 << 8;
        /// [`MovementCommand`]
        const MOVEMENT_COMMAND = 1 << 9;
        /// [`CreateCommand`]
        const CREATE_COMMAND = 1 << 10;
        /// [`ShootCommand`]
        const SHOOT_COMMAND = 1 << 11;
        /// [`MeleeCommand`]
        const MELEE_COMMAND = 1 << 12;
    }
}

/// Sparse storage for one component type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentTable<T> {
    rows: BTreeMap<EntityId, T>,
}

impl<T> Default for ComponentTable<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T> ComponentTable<T> {
    /// Get the row for an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.rows.get(&id)
    }

    /// Get the row for an entity mutably.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    /// Check if the entity has a row.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.rows.contains_key(&id)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate rows in ascending entity id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &T)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    fn insert(&mut self, id: EntityId, row: T) -> Option<T> {
        self.rows.insert(id, row)
    }

    fn remove(&mut self, id: EntityId) -> Option<T> {
        self.rows.remove(&id)
    }
}

/// A component type with its own table in the [`World`].
pub trait Component: Sized {
    /// Signature bit of this component type.
    const KIND: ComponentSet;

    /// The table holding this component type.
    fn table(world: &World) -> &ComponentTable<Self>;

    /// The table holding this component type, mutably.
    ///
    /// Rows can be edited in place but not inserted or removed through
    /// this reference, so signatures stay in sync with the tables.
    fn table_mut(world: &mut World) -> &mut ComponentTable<Self>;
}

macro_rules! impl_component {
    ($($ty:ty => $field:ident, $kind:ident;)*) => {
        $(
            impl Component for $ty {
                const KIND: ComponentSet = ComponentSet::$kind;

                fn table(world: &World) -> &ComponentTable<Self> {
                    &world.$field
                }

                fn table_mut(world: &mut World) -> &mut ComponentTable<Self> {
                    &mut world.$field
                }
            }
        )*
    };
}

impl_component! {
    Unit => units, UNIT;
    Position => positions, POSITION;
    PlayerOwned => owners, PLAYER_OWNED;
    Attack => attacks, ATTACK;
    Base => bases, BASE;
    Label => labels, LABEL;
    ResourceCarrier => carriers, RESOURCE_CARRIER;
    Resource => resources, RESOURCE;
    Decorated => decorations, DECORATED;
    MovementCommand => movement_commands, MOVEMENT_COMMAND;
    CreateCommand => create_commands, CREATE_COMMAND;
    ShootCommand => shoot_commands, SHOOT_COMMAND;
    MeleeCommand => melee_commands, MELEE_COMMAND;
}

/// The entity store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct World {
    next_id: EntityId,
    signatures: BTreeMap<EntityId, ComponentSet>,
    units: ComponentTable<Unit>,
    positions: ComponentTable<Position>,
    owners: ComponentTable<PlayerOwned>,
    attacks: ComponentTable<Attack>,
    bases: ComponentTable<Base>,
    labels: ComponentTable<Label>,
    carriers: ComponentTable<ResourceCarrier>,
    resources: ComponentTable<Resource>,
    decorations: ComponentTable<Decorated>,
    movement_commands: ComponentTable<MovementCommand>,
    create_commands: ComponentTable<CreateCommand>,
    shoot_commands: ComponentTable<ShootCommand>,
    melee_commands: ComponentTable<MeleeCommand>,
}

impl World {
    /// Create an empty world. The first spawned entity gets id 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: 1,
            signatures: BTreeMap::new(),
            units: ComponentTable::default(),
            positions: ComponentTable::default(),
            owners: ComponentTable::default(),
            attacks: ComponentTable::default(),
            bases: ComponentTable::default(),
            labels: ComponentTable::default(),
            carriers: ComponentTable::default(),
            resources: ComponentTable::default(),
            decorations: ComponentTable::default(),
            movement_commands: ComponentTable::default(),
            create_commands: ComponentTable::default(),
            shoot_commands: ComponentTable::default(),
            melee_commands: ComponentTable::default(),
        }
    }

    /// Spawn a new entity and return a builder for attaching components.
    ///
    /// # Example
    ///
    /// ```
    /// use gridwar_core::components::{Position, Unit};
    /// use gridwar_core::world::World;
    ///
    /// let mut world = World::new();
    /// let id = world.spawn().with(Unit::new()).with(Position::new(3, 3)).id();
    /// assert!(world.has::<Position>(id));
    /// ```
    pub fn spawn(&mut self) -> EntityBuilder<'_> {
        let id = self.next_id;
        self.next_id += 1;
        self.signatures.insert(id, ComponentSet::empty());
        EntityBuilder { world: self, id }
    }

    /// Check if an entity is alive.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.signatures.contains_key(&id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Check if the world has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Live entity ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.signatures.keys().copied()
    }

    /// Component signature of an entity.
    #[must_use]
    pub fn signature(&self, id: EntityId) -> Option<ComponentSet> {
        self.signatures.get(&id).copied()
    }

    /// Attach a component, replacing any existing one of the same type.
    ///
    /// Returns the replaced component, if any.
    ///
    /// # Errors
    ///
    /// Returns [`GameError::EntityNotFound`] if the entity is not alive.
    pub fn add_component<C: Component>(&mut self, id: EntityId, component: C) -> Result<Option<C>> {
        if !self.contains(id) {
            return Err(GameError::EntityNotFound(id));
        }
        Ok(self.insert(id, component))
    }

    /// Detach a component and return it.
    ///
    /// Execution systems use this to consume deferred commands.
    pub fn remove_component<C: Component>(&mut self, id: EntityId) -> Option<C> {
        let removed = C::table_mut(self).remove(id);
        if removed.is_some() {
            if let Some(signature) = self.signatures.get_mut(&id) {
                signature.remove(C::KIND);
            }
        }
        removed
    }

    /// Get a component of an entity.
    #[must_use]
    pub fn get<C: Component>(&self, id: EntityId) -> Option<&C> {
        C::table(self).get(id)
    }

    /// Get a component of an entity mutably.
    pub fn get_mut<C: Component>(&mut self, id: EntityId) -> Option<&mut C> {
        C::table_mut(self).get_mut(id)
    }

    /// Check if an entity has a component.
    #[must_use]
    pub fn has<C: Component>(&self, id: EntityId) -> bool {
        C::table(self).contains(id)
    }

    /// Resolve an entity by id, requiring every component in `required`.
    #[must_use]
    pub fn find_by_id(&self, id: EntityId, required: ComponentSet) -> Option<EntityId> {
        self.signature(id)
            .filter(|signature| signature.contains(required))
            .map(|_| id)
    }

    /// All entities carrying every component in `required`, in id order.
    pub fn find(&self, required: ComponentSet) -> impl Iterator<Item = EntityId> + '_ {
        self.signatures
            .iter()
            .filter(move |(_, signature)| signature.contains(required))
            .map(|(id, _)| *id)
    }

    /// The lowest-id entity carrying every component in `required`.
    #[must_use]
    pub fn first(&self, required: ComponentSet) -> Option<EntityId> {
        self.find(required).next()
    }

    /// Call `f` for every entity carrying every component in `required`.
    pub fn each_entity<F>(&self, required: ComponentSet, mut f: F)
    where
        F: FnMut(EntityId, &Self),
    {
        for id in self.find(required) {
            f(id, self);
        }
    }

    /// Remove an entity and all of its components.
    ///
    /// Returns `false` if the entity was not alive.
    pub fn remove_entity(&mut self, id: EntityId) -> bool {
        if self.signatures.remove(&id).is_none() {
            return false;
        }
        self.units.remove(id);
        self.positions.remove(id);
        self.owners.remove(id);
        self.attacks.remove(id);
        self.bases.remove(id);
        self.labels.remove(id);
        self.carriers.remove(id);
        self.resources.remove(id);
        self.decorations.remove(id);
        self.movement_commands.remove(id);
        self.create_commands.remove(id);
        self.shoot_commands.remove(id);
        self.melee_commands.remove(id);
        true
    }

    fn insert<C: Component>(&mut self, id: EntityId, component: C) -> Option<C> {
        if let Some(signature) = self.signatures.get_mut(&id) {
            signature.insert(C::KIND);
        }
        C::table_mut(self).insert(id, component)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder returned by [`World::spawn`].
pub struct EntityBuilder<'w> {
    world: &'w mut World,
    id: EntityId,
}

impl EntityBuilder<'_> {
    /// Attach a component to the entity being built.
    #[must_use]
    pub fn with<C: Component>(self, component: C) -> Self {
        self.world.insert(self.id, component);
        self
    }

    /// Id of the entity being built.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }
}

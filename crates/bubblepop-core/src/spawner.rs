use std::collections::HashMap;

/// Identifier of a spawned bubble entity.
pub type EntityId = u64;

/// Teardown side of a resolved creation request. One group may own several
/// root entities.
pub trait SpawnGroup: Send + std::fmt::Debug {
    /// Release the underlying resources.
    fn dispose(&mut self);
}

struct GroupRecord {
    group: Box<dyn SpawnGroup>,
    entities: Vec<EntityId>,
}

/// Maps live entities to the creation group that produced them.
///
/// Disposal is idempotent: disposing an unknown or already disposed entity
/// is a silent no-op, so "popped" and "escaped" share one path.
#[derive(Default)]
pub struct SpawnerRegistry {
    groups: HashMap<u64, GroupRecord>,
    entities: HashMap<EntityId, u64>,
    next_key: u64,
}

impl std::fmt::Debug for SpawnerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnerRegistry")
            .field("groups", &self.groups.len())
            .field("entities", &self.entities.len())
            .finish()
    }
}

impl SpawnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, entity: EntityId, group: Box<dyn SpawnGroup>) {
        self.register_group(&[entity], group);
    }

    /// Track every root entity of a resolved spawn under one group.
    pub fn register_group(&mut self, entities: &[EntityId], group: Box<dyn SpawnGroup>) {
        for entity in entities {
            if self.entities.contains_key(entity) {
                tracing::warn!(entity, "Entity registered twice, disposing previous group");
                self.dispose(*entity);
            }
        }
        let key = self.next_key;
        self.next_key += 1;
        for &entity in entities {
            self.entities.insert(entity, key);
        }
        self.groups.insert(
            key,
            GroupRecord {
                group,
                entities: entities.to_vec(),
            },
        );
    }

    /// Tear down the group that produced `entity` and forget all its
    /// entities. Returns whether anything was disposed.
    pub fn dispose(&mut self, entity: EntityId) -> bool {
        let Some(key) = self.entities.remove(&entity) else {
            return false;
        };
        let Some(mut record) = self.groups.remove(&key) else {
            return false;
        };
        for other in &record.entities {
            self.entities.remove(other);
        }
        record.group.dispose();
        true
    }

    /// Dispose every remaining group. Returns how many groups were torn down.
    pub fn dispose_all(&mut self) -> usize {
        self.entities.clear();
        let count = self.groups.len();
        for (_, mut record) in self.groups.drain() {
            record.group.dispose();
        }
        count
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.entities.contains_key(&entity)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

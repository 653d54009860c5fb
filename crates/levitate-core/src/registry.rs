//! Entity registry and the exclusive-selection arbiter.

use crate::entity::{ControllableEntity, EntityConfig};
use crate::host::Host;
use crate::mapping::{reset_entity, MappingParams};
use crate::message::EntityId;
use fnv::FnvHashSet;
use smallvec::SmallVec;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("entity id {0} is already registered")]
    DuplicateId(EntityId),
}

/// Live entities in registration order. At most one is selected.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: SmallVec<[ControllableEntity; 4]>,
    ids: FnvHashSet<EntityId>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, config: EntityConfig) -> Result<(), RegistryError> {
        if !self.ids.insert(config.id) {
            return Err(RegistryError::DuplicateId(config.id));
        }
        log::debug!("registered entity {}", config.id);
        self.entities.push(ControllableEntity::new(config));
        Ok(())
    }

    /// Remove and return the entity with `id`, if present.
    pub fn deregister(&mut self, id: EntityId) -> Option<ControllableEntity> {
        let index = self.entities.iter().position(|e| e.id == id)?;
        self.ids.remove(&id);
        log::debug!("deregistered entity {}", id);
        Some(self.entities.remove(index))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&ControllableEntity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entities(&self) -> &[ControllableEntity] {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut [ControllableEntity] {
        &mut self.entities
    }

    /// Id of the first selected entity, in registry order.
    pub fn selected_id(&self) -> Option<EntityId> {
        self.entities.iter().find(|e| e.selected).map(|e| e.id)
    }

    /// Make `id` the only selected entity. Every entity losing selection is
    /// reset on the host before this returns. An unknown id leaves nothing
    /// selected.
    pub fn select<H: Host>(
        &mut self,
        id: EntityId,
        params: &MappingParams,
        host: &mut H,
    ) -> Option<EntityId> {
        let before = self.selected_id();
        for entity in self.entities.iter_mut() {
            let was_selected = entity.selected;
            entity.selected = entity.id == id;
            if was_selected && !entity.selected {
                reset_entity(entity, params, host);
            }
        }
        let after = self.selected_id();
        if after.is_none() {
            log::warn!("selection of unknown entity {}; nothing is active", id);
        }
        if before != after {
            log::info!("selection {:?} -> {:?}", before, after);
            host.selection_changed(after);
        }
        after
    }
}

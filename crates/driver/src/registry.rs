//! Live instantiated components of one driver, keyed by [`InstanceId`].
//!
//! Lookups on the `run` hot path only take a shard read lock, so concurrent
//! reads proceed alongside the occasional `instantiate`/`destroy` write.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap, DashSet};
use pipeline::InstanceId;

use crate::InstantiatedComponent;

/// Registry of live components plus every identifier ever retired.
///
/// The retired set is never pruned, so it grows by one id per destroyed
/// component for the lifetime of the driver.
pub struct ComponentRegistry<H> {
    live: DashMap<InstanceId, Arc<InstantiatedComponent<H>>>,
    retired: DashSet<InstanceId>,
}

impl<H> Default for ComponentRegistry<H> {
    fn default() -> Self {
        Self {
            live: DashMap::new(),
            retired: DashSet::new(),
        }
    }
}

impl<H> ComponentRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints an identifier that is neither live nor retired.
    pub fn mint_id(&self) -> InstanceId {
        loop {
            let id = InstanceId::new_random();
            if !self.live.contains_key(&id) && !self.retired.contains(&id) {
                return id;
            }
        }
    }

    /// Registers a component under its own id.
    ///
    /// Returns the component back if the id is already taken or retired.
    pub fn insert(
        &self,
        component: Arc<InstantiatedComponent<H>>,
    ) -> Result<(), Arc<InstantiatedComponent<H>>> {
        if self.retired.contains(&component.id()) {
            return Err(component);
        }
        match self.live.entry(component.id()) {
            Entry::Occupied(_) => Err(component),
            Entry::Vacant(slot) => {
                slot.insert(component);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: InstanceId) -> Option<Arc<InstantiatedComponent<H>>> {
        self.live.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Unregisters a component and retires its id for good.
    pub fn remove(&self, id: InstanceId) -> Option<Arc<InstantiatedComponent<H>>> {
        let (_, component) = self.live.remove(&id)?;
        self.retired.insert(id);
        Some(component)
    }

    /// Unregisters every live component.
    pub fn remove_all(&self) -> Vec<Arc<InstantiatedComponent<H>>> {
        let ids: Vec<InstanceId> = self.live.iter().map(|entry| *entry.key()).collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn is_retired(&self, id: InstanceId) -> bool {
        self.retired.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

use serde::{Deserialize, Serialize};

use crate::kernel::constants::DEFAULT_HISTORY_SIZE;
use crate::site::configuration::{Activity, InstallConfiguration};
use crate::site::error::SiteError;

/// Ordered configurations of a site, oldest first, at most one of them current.
///
/// A history is never changed in place: every `with_*` method returns the next
/// snapshot, so a reader holding an older one keeps a consistent view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigurationHistory {
    configurations: Vec<InstallConfiguration>,
    next_id: u64,
    capacity: usize,
}

impl ConfigurationHistory {
    pub fn new(capacity: usize) -> Self {
        Self { configurations: Vec::new(), next_id: 1, capacity: capacity.max(1) }
    }

    pub fn configurations(&self) -> &[InstallConfiguration] {
        &self.configurations
    }

    pub fn current(&self) -> Option<&InstallConfiguration> {
        self.configurations.iter().find(|c| c.current)
    }

    pub fn get(&self, id: u64) -> Option<&InstallConfiguration> {
        self.configurations.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `configuration` as the new current one, evicting old entries over capacity.
    pub fn with_configuration(&self, mut configuration: InstallConfiguration) -> (Self, u64) {
        let mut next = self.clone();
        configuration.id = next.next_id;
        configuration.current = true;
        next.next_id += 1;
        for existing in &mut next.configurations {
            existing.current = false;
        }
        let id = configuration.id;
        next.configurations.push(configuration);
        next.evict();
        (next, id)
    }

    pub fn with_preserved(&self, id: u64, preserved: bool) -> Result<Self, SiteError> {
        let mut next = self.clone();
        let configuration = next.configurations
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(SiteError::UnknownConfiguration(id))?;
        configuration.preserved = preserved;
        next.evict();
        Ok(next)
    }

    /// Record `activity` on the current configuration without starting a new one.
    pub fn with_activity(&self, activity: Activity) -> Result<(Self, u64), SiteError> {
        let mut next = self.clone();
        let current = next.configurations
            .iter_mut()
            .find(|c| c.current)
            .ok_or(SiteError::NoCurrentConfiguration)?;
        current.record(activity);
        let id = current.id;
        Ok((next, id))
    }

    pub fn with_capacity(&self, capacity: usize) -> Self {
        let mut next = self.clone();
        next.capacity = capacity.max(1);
        next.evict();
        next
    }

    /// Drop the oldest configurations that are neither current nor preserved.
    fn evict(&mut self) {
        while self.configurations.len() > self.capacity {
            let Some(index) = self.configurations.iter().position(|c| !c.current && !c.preserved) else {
                break;
            };
            let evicted = self.configurations.remove(index);
            log::debug!("Evicted configuration {} from history", evicted.id);
        }
    }
}

impl Default for ConfigurationHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

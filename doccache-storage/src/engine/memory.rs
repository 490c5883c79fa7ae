//! Process-local engine for tests and ephemeral deployments.

use std::collections::BTreeMap;
use std::sync::RwLock;
use std::time::Duration;

use super::{now_ms, Engine, EngineError, ScanEntry, StoredValue};

/// Ordered in-memory engine. Contents are lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    entries: RwLock<BTreeMap<Vec<u8>, StoredValue>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Engine for MemoryEngine {
    fn get(&self, key: &[u8]) -> Result<Option<StoredValue>, EngineError> {
        let entries = self.entries.read().map_err(|_| EngineError::LockPoisoned)?;
        let now = now_ms();
        Ok(entries
            .get(key)
            .filter(|value| !value.is_expired_at(now))
            .cloned())
    }

    fn put(
        &self,
        key: &[u8],
        value: &[u8],
        ttl: Option<Duration>,
        meta: u8,
    ) -> Result<(), EngineError> {
        let stored = StoredValue::new(value.to_vec(), ttl, meta, now_ms());
        let mut entries = self.entries.write().map_err(|_| EngineError::LockPoisoned)?;
        entries.insert(key.to_vec(), stored);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<bool, EngineError> {
        let mut entries = self.entries.write().map_err(|_| EngineError::LockPoisoned)?;
        Ok(entries
            .remove(key)
            .is_some_and(|value| !value.is_expired_at(now_ms())))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<ScanEntry>, EngineError> {
        let entries = self.entries.read().map_err(|_| EngineError::LockPoisoned)?;
        let now = now_ms();
        Ok(entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| ScanEntry {
                key: key.clone(),
                is_deleted_or_expired: value.is_expired_at(now),
            })
            .collect())
    }

    fn drop_all(&self) -> Result<u64, EngineError> {
        let mut entries = self.entries.write().map_err(|_| EngineError::LockPoisoned)?;
        let count = entries.len() as u64;
        entries.clear();
        Ok(count)
    }

    fn purge_expired(&self) -> Result<Vec<Vec<u8>>, EngineError> {
        let mut entries = self.entries.write().map_err(|_| EngineError::LockPoisoned)?;
        let now = now_ms();
        let stale: Vec<Vec<u8>> = entries
            .iter()
            .filter(|(_, value)| value.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &stale {
            entries.remove(key);
        }
        Ok(stale)
    }

    fn entry_count(&self) -> Result<u64, EngineError> {
        let entries = self.entries.read().map_err(|_| EngineError::LockPoisoned)?;
        Ok(entries.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::contract;

    #[test]
    fn test_put_get_delete() {
        contract::put_get_delete(&MemoryEngine::new());
    }

    #[test]
    fn test_expired_entries_hidden() {
        contract::expired_entries_hidden(&MemoryEngine::new());
    }

    #[test]
    fn test_scan_respects_namespaces() {
        contract::scan_respects_namespaces(&MemoryEngine::new());
    }
}

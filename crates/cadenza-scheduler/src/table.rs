use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::NaiveDateTime;
use tracing::debug;

use crate::types::{Trigger, TriggerAction, TriggerKey, TriggerSpec};

/// Result of [`TriggerTable::upsert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Registry of live recurring triggers, at most one per key.
///
/// Shared as `Arc<TriggerTable>` between the reconciler, which writes it, and
/// the runtime, which reads it once per evaluated minute.
pub struct TriggerTable {
    triggers: RwLock<BTreeMap<TriggerKey, Trigger>>,
}

impl TriggerTable {
    pub fn new() -> Self {
        Self {
            triggers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Insert, or atomically replace the timing and action stored under `key`.
    pub fn upsert(&self, key: TriggerKey, spec: TriggerSpec, action: TriggerAction) -> Upsert {
        let mut triggers = self.triggers.write().expect("trigger table poisoned");
        let trigger = Trigger {
            key: key.clone(),
            spec,
            action,
        };
        match triggers.insert(key, trigger) {
            None => Upsert::Inserted,
            Some(_) => Upsert::Replaced,
        }
    }

    /// Remove `key`. Silent no-op if it is not registered.
    pub fn remove(&self, key: &TriggerKey) -> bool {
        let mut triggers = self.triggers.write().expect("trigger table poisoned");
        let removed = triggers.remove(key).is_some();
        if removed {
            debug!(%key, "trigger removed");
        }
        removed
    }

    pub fn exists(&self, key: &TriggerKey) -> bool {
        self.triggers
            .read()
            .expect("trigger table poisoned")
            .contains_key(key)
    }

    pub fn get(&self, key: &TriggerKey) -> Option<Trigger> {
        self.triggers
            .read()
            .expect("trigger table poisoned")
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.triggers.read().expect("trigger table poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All triggers, ordered by key.
    pub fn snapshot(&self) -> Vec<Trigger> {
        self.triggers
            .read()
            .expect("trigger table poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Triggers whose timing matches the minute `at`.
    pub fn due_at(&self, at: NaiveDateTime) -> Vec<Trigger> {
        self.triggers
            .read()
            .expect("trigger table poisoned")
            .values()
            .filter(|t| t.spec.matches(at))
            .cloned()
            .collect()
    }
}

impl Default for TriggerTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TriggerKind;
    use chrono::{NaiveDate, NaiveTime, Weekday};

    fn stop_spec(h: u32, m: u32) -> (TriggerKey, TriggerSpec) {
        let spec = TriggerSpec::at(
            [Weekday::Mon].into_iter().collect(),
            NaiveTime::from_hms_opt(h, m, 0).unwrap(),
        );
        (TriggerKey::new(TriggerKind::Stop, &spec), spec)
    }

    #[test]
    fn upsert_same_key_replaces() {
        let table = TriggerTable::new();
        let (key, spec) = stop_spec(7, 30);
        assert_eq!(table.upsert(key.clone(), spec, TriggerAction::Stop), Upsert::Inserted);
        assert_eq!(table.upsert(key.clone(), spec, TriggerAction::Stop), Upsert::Replaced);
        assert_eq!(table.len(), 1);
        assert!(table.exists(&key));
    }

    #[test]
    fn remove_is_idempotent() {
        let table = TriggerTable::new();
        let (key, spec) = stop_spec(7, 30);
        table.upsert(key.clone(), spec, TriggerAction::Stop);
        assert!(table.remove(&key));
        assert!(!table.remove(&key));
        assert!(!table.exists(&key));
        assert!(table.is_empty());
    }

    #[test]
    fn due_at_filters_by_minute() {
        let table = TriggerTable::new();
        let (k1, s1) = stop_spec(7, 30);
        let (k2, s2) = stop_spec(8, 0);
        table.upsert(k1.clone(), s1, TriggerAction::Stop);
        table.upsert(k2, s2, TriggerAction::Stop);

        // 2024-01-01 is a Monday.
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(7, 30, 0)
            .unwrap();
        let due = table.due_at(at);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].key, k1);
    }
}

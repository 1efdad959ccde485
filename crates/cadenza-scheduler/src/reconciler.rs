//! Keeps the [`TriggerTable`] in step with the persisted schedule records.
//!
//! Each record yields one start trigger and, when it has an end time, one stop
//! trigger. Records with the same end slot share a single stop trigger; the
//! reconciler remembers which records own each key so deleting one of them
//! leaves the shared trigger armed for the others.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use cadenza_core::{RecordId, ScheduleRecord, ScheduleWindow};
use chrono::Local;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, SchedulerError};
use crate::schedule::next_fire_after;
use crate::table::{TriggerTable, Upsert};
use crate::types::{StartAction, TriggerAction, TriggerKey, TriggerKind, TriggerSpec};

/// A trigger the reconciler wants in the table for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PlannedTrigger {
    key: TriggerKey,
    spec: TriggerSpec,
    action: TriggerAction,
}

fn plan_window(id: RecordId, window: &ScheduleWindow) -> Vec<PlannedTrigger> {
    let start = TriggerSpec::at(window.days, window.start);
    let mut planned = vec![PlannedTrigger {
        key: TriggerKey::new(TriggerKind::Start, &start),
        spec: start,
        action: TriggerAction::Start(StartAction {
            record_id: id,
            media_source: window.media_source.clone(),
            end_time: window.end,
            days: window.days,
        }),
    }];

    if let Some(end) = window.end {
        let stop = TriggerSpec::at(window.days, end);
        planned.push(PlannedTrigger {
            key: TriggerKey::new(TriggerKind::Stop, &stop),
            spec: stop,
            action: TriggerAction::Stop,
        });
    }
    planned
}

/// A record the reconciler refused, kept for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct Rejection {
    pub record_id: RecordId,
    pub code: &'static str,
    pub reason: String,
}

/// Outcome of a full reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub installed: Vec<TriggerKey>,
    pub removed: Vec<TriggerKey>,
    pub rejected: Vec<Rejection>,
}

#[derive(Default)]
struct Ledger {
    /// What each record currently has installed.
    records: BTreeMap<RecordId, Vec<PlannedTrigger>>,
    /// Which records currently want each key.
    owners: HashMap<TriggerKey, BTreeSet<RecordId>>,
}

pub struct ScheduleReconciler {
    table: Arc<TriggerTable>,
    ledger: Mutex<Ledger>,
}

impl ScheduleReconciler {
    pub fn new(table: Arc<TriggerTable>) -> Self {
        Self {
            table,
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn table(&self) -> &Arc<TriggerTable> {
        &self.table
    }

    /// Install `record`'s triggers, first removing whatever it had before.
    ///
    /// Used both for new records and edits. A record that fails validation
    /// ends up with no triggers at all.
    pub fn apply_record(&self, record: &ScheduleRecord) -> Result<Vec<TriggerKey>> {
        let mut ledger = self.ledger.lock().expect("reconciler ledger poisoned");
        self.apply_locked(&mut ledger, record)
    }

    /// Remove every trigger `id` owns alone. Unknown ids are a no-op.
    pub fn remove_record(&self, id: RecordId) -> Vec<TriggerKey> {
        let mut ledger = self.ledger.lock().expect("reconciler ledger poisoned");
        let removed = self.release_locked(&mut ledger, id);
        info!(record_id = %id, removed = removed.len(), "schedule record triggers removed");
        removed
    }

    /// Make the table reflect exactly `records`: records no longer present
    /// lose their triggers, every present record is re-applied.
    pub fn reconcile_all(&self, records: &[ScheduleRecord]) -> ReconcileReport {
        let mut ledger = self.ledger.lock().expect("reconciler ledger poisoned");
        let mut report = ReconcileReport::default();

        let wanted: BTreeSet<RecordId> = records.iter().map(|r| r.id).collect();
        let stale: Vec<RecordId> = ledger
            .records
            .keys()
            .filter(|id| !wanted.contains(id))
            .copied()
            .collect();
        for id in stale {
            report.removed.extend(self.release_locked(&mut ledger, id));
        }

        let mut ordered: Vec<&ScheduleRecord> = records.iter().collect();
        ordered.sort_by_key(|r| r.id);
        for record in ordered {
            match self.apply_locked(&mut ledger, record) {
                Ok(keys) => report.installed.extend(keys),
                Err(err) => {
                    let SchedulerError::InvalidRecord { id, source } = &err;
                    report.rejected.push(Rejection {
                        record_id: *id,
                        code: err.code(),
                        reason: source.to_string(),
                    });
                }
            }
        }

        info!(
            records = records.len(),
            installed = report.installed.len(),
            removed = report.removed.len(),
            rejected = report.rejected.len(),
            triggers = self.table.len(),
            "reconciliation complete"
        );
        report
    }

    /// Keys currently installed on behalf of `id`.
    pub fn keys_for(&self, id: RecordId) -> Vec<TriggerKey> {
        let ledger = self.ledger.lock().expect("reconciler ledger poisoned");
        ledger
            .records
            .get(&id)
            .map(|planned| planned.iter().map(|p| p.key.clone()).collect())
            .unwrap_or_default()
    }

    // --- private helpers ---------------------------------------------------

    fn apply_locked(&self, ledger: &mut Ledger, record: &ScheduleRecord) -> Result<Vec<TriggerKey>> {
        let id = record.id;
        // Old keys go first, even when the new ones turn out identical.
        self.release_locked(ledger, id);

        let window = record.window().map_err(|source| {
            warn!(record_id = %id, error = %source, "schedule record rejected; no triggers installed");
            SchedulerError::InvalidRecord { id, source }
        })?;

        if !window.ignored_days.is_empty() {
            warn!(record_id = %id, ignored = ?window.ignored_days, "unrecognised weekday names ignored");
        }
        if window.crosses_midnight() {
            warn!(
                record_id = %id,
                start = %window.start,
                end = ?window.end,
                "end time is earlier than start time; stop fires that same listed day, not after midnight"
            );
        }

        let planned = plan_window(id, &window);
        let now = Local::now().naive_local();
        for p in &planned {
            let owners = ledger.owners.entry(p.key.clone()).or_default();
            if p.action.kind() == TriggerKind::Start && !owners.is_empty() {
                warn!(key = %p.key, record_id = %id, others = ?owners, "start slot shared with another record; this record now drives it");
            }
            owners.insert(id);

            match self.table.upsert(p.key.clone(), p.spec, p.action.clone()) {
                Upsert::Inserted => info!(
                    key = %p.key,
                    record_id = %id,
                    next_fire = ?next_fire_after(&p.spec, now),
                    "trigger installed"
                ),
                Upsert::Replaced => debug!(key = %p.key, record_id = %id, "trigger re-armed"),
            }
        }

        let keys = planned.iter().map(|p| p.key.clone()).collect();
        ledger.records.insert(id, planned);
        Ok(keys)
    }

    /// Drop `id`'s ownership of its keys. A key leaves the table only when no
    /// other record still wants it; otherwise it is re-armed from a remaining
    /// owner.
    fn release_locked(&self, ledger: &mut Ledger, id: RecordId) -> Vec<TriggerKey> {
        let Some(planned) = ledger.records.remove(&id) else {
            return Vec::new();
        };

        let mut removed = Vec::new();
        for p in planned {
            let remaining = ledger.owners.get_mut(&p.key).and_then(|owners| {
                owners.remove(&id);
                owners.iter().next_back().copied()
            });

            match remaining {
                None => {
                    ledger.owners.remove(&p.key);
                    self.table.remove(&p.key);
                    removed.push(p.key);
                }
                Some(other) => {
                    let replacement = ledger
                        .records
                        .get(&other)
                        .and_then(|planned| planned.iter().find(|q| q.key == p.key));
                    if let Some(q) = replacement {
                        self.table.upsert(q.key.clone(), q.spec, q.action.clone());
                        debug!(key = %q.key, record_id = %other, "shared trigger kept for remaining owner");
                    }
                }
            }
        }
        removed
    }
}

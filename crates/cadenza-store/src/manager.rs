use std::sync::Mutex;

use cadenza_core::{RecordId, ScheduleRecord};
use rusqlite::Connection;
use tracing::{debug, info, instrument, warn};

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::types::{split_days, strip_fraction, NewSchedule, Schedule};

const SELECT_COLUMNS: &str =
    "SELECT id, media_source, start_time, end_time, days, created_at, updated_at FROM schedules";

/// Thread-safe CRUD over the `schedules` table.
///
/// Wraps a single SQLite connection in a `Mutex`; every call is short and
/// synchronous.
pub struct ScheduleStore {
    db: Mutex<Connection>,
}

impl ScheduleStore {
    /// Wrap an open connection, creating the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// In-memory store, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    /// All schedules, oldest id first.
    pub fn list(&self) -> Result<Vec<Schedule>> {
        let db = self.db.lock().expect("schedule db poisoned");
        let mut stmt = db.prepare(&format!("{SELECT_COLUMNS} ORDER BY id"))?;
        let rows = stmt.query_map([], row_to_schedule)?;
        // One undecodable row fails the whole listing: the reconciler treats
        // a missing record as deleted.
        let schedules = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| {
            warn!(error = %e, "schedule row could not be decoded");
            e
        })?;
        Ok(schedules)
    }

    /// Just the records, as the reconciler wants them.
    pub fn records(&self) -> Result<Vec<ScheduleRecord>> {
        Ok(self.list()?.into_iter().map(|s| s.record).collect())
    }

    #[instrument(skip(self), fields(id = %id))]
    pub fn get(&self, id: RecordId) -> Result<Schedule> {
        let db = self.db.lock().expect("schedule db poisoned");
        match db.query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            rusqlite::params![id.0],
            row_to_schedule,
        ) {
            Ok(s) => Ok(s),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound { id }),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    #[instrument(skip(self, new), fields(media = %new.media_source))]
    pub fn create(&self, new: &NewSchedule) -> Result<Schedule> {
        new.check()?;
        let now = chrono::Utc::now().to_rfc3339();
        let id = {
            let db = self.db.lock().expect("schedule db poisoned");
            db.execute(
                "INSERT INTO schedules
                 (media_source, start_time, end_time, days, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                rusqlite::params![
                    new.media_source.trim(),
                    new.start_time.trim(),
                    new.end_time(),
                    new.days_column(),
                    now
                ],
            )?;
            RecordId(db.last_insert_rowid())
        };
        info!(%id, "schedule created");
        self.get(id)
    }

    /// Replace every field of an existing schedule.
    #[instrument(skip(self, new), fields(id = %id))]
    pub fn update(&self, id: RecordId, new: &NewSchedule) -> Result<Schedule> {
        new.check()?;
        let now = chrono::Utc::now().to_rfc3339();
        let rows_changed = {
            let db = self.db.lock().expect("schedule db poisoned");
            db.execute(
                "UPDATE schedules
                 SET media_source = ?1,
                     start_time   = ?2,
                     end_time     = ?3,
                     days         = ?4,
                     updated_at   = ?5
                 WHERE id = ?6",
                rusqlite::params![
                    new.media_source.trim(),
                    new.start_time.trim(),
                    new.end_time(),
                    new.days_column(),
                    now,
                    id.0
                ],
            )?
        };
        if rows_changed == 0 {
            return Err(StoreError::NotFound { id });
        }
        info!("schedule updated");
        self.get(id)
    }

    #[instrument(skip(self), fields(id = %id))]
    pub fn delete(&self, id: RecordId) -> Result<()> {
        let db = self.db.lock().expect("schedule db poisoned");
        let rows_changed = db.execute("DELETE FROM schedules WHERE id = ?1", rusqlite::params![id.0])?;
        if rows_changed == 0 {
            return Err(StoreError::NotFound { id });
        }
        info!("schedule deleted");
        Ok(())
    }

    /// Delete every schedule. Returns the number of rows removed.
    pub fn delete_all(&self) -> Result<usize> {
        let db = self.db.lock().expect("schedule db poisoned");
        let n = db.execute("DELETE FROM schedules", [])?;
        debug!(count = n, "all schedules deleted");
        Ok(n)
    }
}

/// Map a SQLite row to a `Schedule`.
fn row_to_schedule(row: &rusqlite::Row<'_>) -> rusqlite::Result<Schedule> {
    let days: String = row.get(4)?;
    Ok(Schedule {
        record: ScheduleRecord {
            id: RecordId(row.get(0)?),
            media_source: row.get(1)?,
            start_time: row.get(2)?,
            end_time: row.get::<_, Option<String>>(3)?.map(strip_fraction),
            days_of_week: split_days(&days),
        },
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

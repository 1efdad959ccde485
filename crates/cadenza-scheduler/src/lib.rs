//! `cadenza-scheduler`: weekly start/stop triggers for schedule records.
//!
//! # Overview
//!
//! The [`reconciler::ScheduleReconciler`] turns persisted schedule records into
//! triggers keyed by their content and keeps the shared
//! [`table::TriggerTable`] free of duplicates and orphans. The
//! [`runtime::SchedulerRuntime`] evaluates the table once per wall-clock minute
//! and hands every match to a [`runtime::TriggerHandler`] on a bounded worker
//! pool.
//!
//! # Trigger keys
//!
//! | Record field         | Trigger                          |
//! |----------------------|----------------------------------|
//! | `start_time` + days  | `start@mon,fri@07:00`            |
//! | `end_time` + days    | `stop@mon,fri@07:30` (optional)  |

pub mod error;
pub mod reconciler;
pub mod runtime;
pub mod schedule;
pub mod table;
pub mod types;

pub use error::{Result, SchedulerError};
pub use reconciler::{ReconcileReport, Rejection, ScheduleReconciler};
pub use runtime::{SchedulerRuntime, TriggerHandler};
pub use schedule::next_fire_after;
pub use table::{TriggerTable, Upsert};
pub use types::{FireContext, StartAction, Trigger, TriggerAction, TriggerKey, TriggerKind, TriggerSpec};

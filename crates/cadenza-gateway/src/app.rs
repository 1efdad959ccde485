use axum::{
    routing::{get, post, put},
    Router,
};
use cadenza_core::CadenzaConfig;
use cadenza_player::PlayerSession;
use cadenza_scheduler::ScheduleReconciler;
use cadenza_store::ScheduleStore;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::outlet::OutletController;

/// Central shared state: passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: CadenzaConfig,
    pub store: ScheduleStore,
    /// Owns the handle to the trigger table the scheduler runtime reads.
    pub reconciler: ScheduleReconciler,
    pub player: Arc<PlayerSession>,
    pub outlets: Arc<dyn OutletController>,
    /// Held across a schedule write and the reconcile that follows it, so
    /// the trigger table never lags behind a concurrent delete.
    pub schedule_writes: Mutex<()>,
}

impl AppState {
    pub fn new(
        config: CadenzaConfig,
        store: ScheduleStore,
        reconciler: ScheduleReconciler,
        player: Arc<PlayerSession>,
        outlets: Arc<dyn OutletController>,
    ) -> Self {
        Self {
            config,
            store,
            reconciler,
            player,
            outlets,
            schedule_writes: Mutex::new(()),
        }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/schedules",
            get(crate::http::schedules::list_handler).post(crate::http::schedules::create_handler),
        )
        .route(
            "/schedules/{id}",
            put(crate::http::schedules::update_handler)
                .delete(crate::http::schedules::delete_handler),
        )
        .route("/triggers", get(crate::http::triggers::list_handler))
        .route("/player", get(crate::http::player::status_handler))
        .route("/outlets/{index}/on", post(crate::http::outlets::on_handler))
        .route("/outlets/{index}/off", post(crate::http::outlets::off_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

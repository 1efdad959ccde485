//! What happens when a start or stop trigger fires.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use cadenza_player::{resolve_media, PlayerError, PlayerSession, PlayerState, PlaylistBuilder};
use cadenza_scheduler::{FireContext, StartAction, TriggerHandler};
use chrono::Datelike;
use tracing::{error, info, warn};

/// Drives the [`PlayerSession`] from trigger fires.
///
/// Failures are logged and left alone: the session stays wherever the failed
/// operation put it and the next scheduled fire is the retry.
pub struct PlaybackOrchestrator {
    player: Arc<PlayerSession>,
    playlists: Arc<dyn PlaylistBuilder>,
}

impl PlaybackOrchestrator {
    pub fn new(player: Arc<PlayerSession>, playlists: Arc<dyn PlaylistBuilder>) -> Self {
        Self { player, playlists }
    }

    /// Resolve the media and get it playing.
    ///
    /// A stopped player is started with the media preloaded; a running one
    /// gets it queued. `play` applies the configured startup volume.
    pub async fn start_playback(&self, ctx: &FireContext, action: &StartAction) -> Result<(), PlayerError> {
        let today = ctx.at.weekday();
        if !action.days.contains(today) {
            warn!(key = %ctx.key, ?today, days = %action.days, "start fired on an unscheduled day; skipped");
            return Ok(());
        }

        let media = self.resolve(&action.media_source).await?;
        let media = media.to_string_lossy().into_owned();

        let state = self.player.start_or_queue(&media).await?;
        if !matches!(state, PlayerState::Connected | PlayerState::Playing) {
            let reason = self
                .player
                .status()
                .await
                .last_error
                .unwrap_or_else(|| format!("player ended up {state:?}"));
            return Err(PlayerError::Process(reason));
        }

        self.player.play().await?;
        info!(
            key = %ctx.key,
            record_id = %action.record_id,
            %media,
            until = ?action.end_time,
            "playback started"
        );
        Ok(())
    }

    /// Directory scans and playlist writes are blocking file I/O.
    async fn resolve(&self, source: &str) -> Result<PathBuf, PlayerError> {
        let builder = Arc::clone(&self.playlists);
        let source = source.to_string();
        let resolved = tokio::task::spawn_blocking(move || resolve_media(&source, builder.as_ref()))
            .await
            .map_err(|e| PlayerError::Process(format!("media resolution task failed: {e}")))?;
        Ok(resolved?)
    }
}

#[async_trait]
impl TriggerHandler for PlaybackOrchestrator {
    async fn on_start(&self, ctx: &FireContext, action: &StartAction) {
        if let Err(e) = self.start_playback(ctx, action).await {
            error!(
                key = %ctx.key,
                record_id = %action.record_id,
                media = %action.media_source,
                code = e.code(),
                error = %e,
                "start trigger failed"
            );
        }
    }

    async fn on_stop(&self, ctx: &FireContext) {
        match self.player.stop().await {
            Ok(()) => info!(key = %ctx.key, "stop trigger handled"),
            Err(e) => error!(key = %ctx.key, code = e.code(), error = %e, "stop trigger failed"),
        }
    }
}

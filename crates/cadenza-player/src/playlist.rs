//! Turning a schedule's media source into something the player can queue.
//!
//! A directory becomes an M3U playlist written by a [`PlaylistBuilder`]; a
//! file is queued as-is.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use cadenza_core::config::MediaConfig;
use tracing::{debug, info};

use crate::error::MediaError;

const DEFAULT_PLAYLIST_NAME: &str = "playlist1";

/// Builds a playlist file from a directory of media files.
pub trait PlaylistBuilder: Send + Sync {
    fn build_playlist(&self, directory: &Path, name: &str) -> Result<PathBuf, MediaError>;
}

/// Writes extended M3U playlists into a fixed output directory.
pub struct M3uPlaylistBuilder {
    output_dir: PathBuf,
    extensions: Vec<String>,
}

impl M3uPlaylistBuilder {
    pub fn new(output_dir: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            extensions: extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn from_config(config: &MediaConfig) -> Self {
        Self::new(&config.playlist_dir, config.extensions.clone())
    }

    fn is_media(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    /// Media files directly inside `directory`, sorted by file name.
    fn media_files(&self, directory: &Path) -> Result<Vec<PathBuf>, MediaError> {
        let io_err = |source| MediaError::Io {
            path: directory.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(directory).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.is_file() && self.is_media(&path) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }
}

impl PlaylistBuilder for M3uPlaylistBuilder {
    fn build_playlist(&self, directory: &Path, name: &str) -> Result<PathBuf, MediaError> {
        let files = self.media_files(directory)?;
        if files.is_empty() {
            return Err(MediaError::NoMedia(directory.to_path_buf()));
        }

        let out_path = self.output_dir.join(format!("{name}.m3u"));
        let io_err = |source| MediaError::Io {
            path: out_path.clone(),
            source,
        };

        fs::create_dir_all(&self.output_dir).map_err(io_err)?;
        let mut body = String::from("#EXTM3U\n");
        for file in &files {
            let title = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let abs = fs::canonicalize(file).unwrap_or_else(|_| file.clone());
            body.push_str(&format!("#EXTINF:-1,{title}\n{}\n", abs.display()));
        }
        let mut out = fs::File::create(&out_path).map_err(io_err)?;
        out.write_all(body.as_bytes()).map_err(io_err)?;

        info!(playlist = %out_path.display(), entries = files.len(), "playlist written");
        Ok(out_path)
    }
}

/// Playlist name for a directory: its base name, or `playlist1`.
pub fn playlist_name(directory: &Path) -> String {
    directory
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_PLAYLIST_NAME.to_string())
}

/// Resolve a schedule's media source to the path handed to the player.
pub fn resolve_media(source: &str, builder: &dyn PlaylistBuilder) -> Result<PathBuf, MediaError> {
    let path = Path::new(source.trim());
    if path.is_dir() {
        let name = playlist_name(path);
        debug!(directory = %path.display(), %name, "building playlist");
        builder.build_playlist(path, &name)
    } else if path.is_file() {
        Ok(path.to_path_buf())
    } else {
        Err(MediaError::NotFound(path.to_path_buf()))
    }
}

use anyhow::Result;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::api::{ApiError, Track, TrackId, TrackWithUserCounts, UserId};

/// The async seam between the coordinator and the metadata backend.
/// [`crate::api::ApiClient`] is the HTTP implementation; tests script their own.
pub trait TrackService: Send + Sync {
    fn fetch_track(&self, id: TrackId) -> BoxFuture<'_, Result<Track, ApiError>>;

    /// Order-preserving, same length as the input.
    fn map_favorite_and_plays(
        &self,
        user_id: UserId,
        tracks: Vec<Track>,
    ) -> BoxFuture<'_, Result<Vec<TrackWithUserCounts>, ApiError>>;

    fn register_play(
        &self,
        user_id: UserId,
        track_id: TrackId,
    ) -> BoxFuture<'_, Result<(), ApiError>>;
}

impl TrackService for crate::api::ApiClient {
    fn fetch_track(&self, id: TrackId) -> BoxFuture<'_, Result<Track, ApiError>> {
        Box::pin(crate::api::ApiClient::fetch_track(self, id))
    }

    fn map_favorite_and_plays(
        &self,
        user_id: UserId,
        tracks: Vec<Track>,
    ) -> BoxFuture<'_, Result<Vec<TrackWithUserCounts>, ApiError>> {
        Box::pin(crate::api::ApiClient::map_favorite_and_plays(self, user_id, tracks))
    }

    fn register_play(
        &self,
        user_id: UserId,
        track_id: TrackId,
    ) -> BoxFuture<'_, Result<(), ApiError>> {
        Box::pin(crate::api::ApiClient::register_play(self, user_id, track_id))
    }
}

/// Now-playing metadata pushed to the platform transport 🎵
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub title: String,
    pub artist: String,
    /// Empty string when the track has no album.
    pub album: String,
    pub artwork_url: String,
    /// `"{h}x{h}"`, empty when no sized variant exists.
    pub artwork_sizes: String,
}

impl NowPlaying {
    pub fn from_track(track: &Track) -> Self {
        let small = track.images.small.as_ref();
        Self {
            title: track.title.clone(),
            artist: track.artist.clone(),
            album: track.album.clone().unwrap_or_default(),
            artwork_url: small
                .map(|i| i.url.clone())
                .unwrap_or_else(|| track.cover.clone()),
            artwork_sizes: small
                .map(|i| format!("{}x{}", i.height, i.height))
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransportEvent {
    NextTrack,
    PreviousTrack,
}

/// Handed to a [`HostTransport`] at install time; its callbacks feed
/// next/previous presses back into the coordinator loop.
#[derive(Clone)]
pub struct TransportControls {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl TransportControls {
    pub(crate) fn new(tx: mpsc::UnboundedSender<TransportEvent>) -> Self {
        Self { tx }
    }

    pub fn next_track(&self) {
        let _ = self.tx.send(TransportEvent::NextTrack);
    }

    pub fn previous_track(&self) {
        let _ = self.tx.send(TransportEvent::PreviousTrack);
    }
}

/// System-level transport integration (media-session equivalent). Everything
/// here is best-effort: a missing or failing transport never disturbs
/// playback.
pub trait HostTransport: Send {
    /// Register next/previous handlers. Default is a no-op for platforms
    /// without transport buttons.
    fn install(&mut self, _controls: TransportControls) -> Result<()> {
        Ok(())
    }

    /// Called whenever a new track becomes ready.
    fn publish(&mut self, now_playing: &NowPlaying) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ImageVariant, TrackImages};

    fn track(images: TrackImages) -> Track {
        Track {
            id: 1,
            title: "Aurora".to_string(),
            artist: "Lumen".to_string(),
            album: None,
            duration: 180.0,
            cover: "https://img.example.com/full.png".to_string(),
            creator_id: 3,
            images,
        }
    }

    #[test]
    fn now_playing_prefers_small_image() {
        let images = TrackImages {
            small: Some(ImageVariant {
                url: "https://img.example.com/small.png".to_string(),
                height: 120,
            }),
            medium: None,
        };
        let now = NowPlaying::from_track(&track(images));
        assert_eq!(now.artwork_url, "https://img.example.com/small.png");
        assert_eq!(now.artwork_sizes, "120x120");
        assert_eq!(now.album, "");
    }

    #[test]
    fn now_playing_falls_back_to_cover() {
        let now = NowPlaying::from_track(&track(TrackImages::default()));
        assert_eq!(now.artwork_url, "https://img.example.com/full.png");
        assert_eq!(now.artwork_sizes, "");
    }
}

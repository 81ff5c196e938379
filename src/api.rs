use std::collections::{HashMap, HashSet};

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

use crate::config::AppConfig;

pub type TrackId = u64;
pub type UserId = u64;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("track {0} not found")]
    TrackNotFound(TrackId),
    #[error("api request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected api response: {0}")]
    UnexpectedResponse(String),
}

/// Every endpoint wraps its payload in `{ "data": ... }`.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageVariant {
    pub url: String,
    pub height: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackImages {
    #[serde(default)]
    pub small: Option<ImageVariant>,
    #[serde(default)]
    pub medium: Option<ImageVariant>,
}

/// Track metadata as served by the API. Immutable once loaded; the
/// coordinator replaces it wholesale on every load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    /// Seconds.
    pub duration: f64,
    pub cover: String,
    pub creator_id: u64,
    #[serde(default)]
    pub images: TrackImages,
}

/// A track annotated with the signed-in user's counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackWithUserCounts {
    pub track: Track,
    pub favorite: bool,
    pub plays: u32,
}

/// What the coordinator publishes: bare metadata for anonymous listeners,
/// user-annotated metadata when a session was active at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerTrack {
    Bare(Track),
    WithUserCounts(TrackWithUserCounts),
}

impl PlayerTrack {
    pub fn track(&self) -> &Track {
        match self {
            PlayerTrack::Bare(track) => track,
            PlayerTrack::WithUserCounts(t) => &t.track,
        }
    }

    pub fn id(&self) -> TrackId {
        self.track().id
    }

    pub fn user_counts(&self) -> Option<(bool, u32)> {
        match self {
            PlayerTrack::Bare(_) => None,
            PlayerTrack::WithUserCounts(t) => Some((t.favorite, t.plays)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FavoriteEntry {
    track_id: TrackId,
}

#[derive(Debug, Deserialize)]
struct PlayCountEntry {
    track_id: TrackId,
    count: u32,
}

/// HTTP client for the track metadata API and per-user count endpoints.
pub struct ApiClient {
    client: Client,
    api_base: String,
    stream_base: String,
}

impl ApiClient {
    pub fn new(client: Client, config: &AppConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            stream_base: config.stream_base.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch bare metadata for a single track. No caching, no retry.
    pub async fn fetch_track(&self, id: TrackId) -> Result<Track, ApiError> {
        let url = format!("{}/tracks/{}", self.api_base, id);
        let resp = self.client.get(&url).send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::TrackNotFound(id));
        }
        let envelope: ApiEnvelope<Track> = resp.error_for_status()?.json().await?;
        Ok(envelope.data)
    }

    /// Merge the user's favorite flags and play counts onto `tracks`.
    /// Order-preserving, same length as the input; tracks the user has never
    /// touched come back as not-favorite with zero plays.
    pub async fn map_favorite_and_plays(
        &self,
        user_id: UserId,
        tracks: Vec<Track>,
    ) -> Result<Vec<TrackWithUserCounts>, ApiError> {
        if tracks.is_empty() {
            return Ok(Vec::new());
        }

        let ids = tracks
            .iter()
            .map(|t| t.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let params = [("ids", ids.as_str())];

        let url = format!("{}/users/{}/favorites", self.api_base, user_id);
        let resp = self.client.get(&url).query(&params).send().await?;
        let favorites: ApiEnvelope<Vec<FavoriteEntry>> = resp.error_for_status()?.json().await?;

        let url = format!("{}/users/{}/plays", self.api_base, user_id);
        let resp = self.client.get(&url).query(&params).send().await?;
        let plays: ApiEnvelope<Vec<PlayCountEntry>> = resp.error_for_status()?.json().await?;

        let favorite_ids: HashSet<TrackId> =
            favorites.data.into_iter().map(|f| f.track_id).collect();
        let play_counts: HashMap<TrackId, u32> =
            plays.data.into_iter().map(|p| (p.track_id, p.count)).collect();

        Ok(tracks
            .into_iter()
            .map(|track| TrackWithUserCounts {
                favorite: favorite_ids.contains(&track.id),
                plays: play_counts.get(&track.id).copied().unwrap_or(0),
                track,
            })
            .collect())
    }

    /// Record one listen of `track_id` for `user_id`. Callers treat this as
    /// fire-and-forget; the error only matters to whoever wants to log it.
    pub async fn register_play(&self, user_id: UserId, track_id: TrackId) -> Result<(), ApiError> {
        let url = format!("{}/users/{}/plays", self.api_base, user_id);
        self.client
            .post(&url)
            .json(&json!({ "track_id": track_id }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Playable media URL for a track. Wire format is fixed:
    /// `<STREAM_BASE>/<trackId>` plus `?client_id=<clientId>` when signed in.
    pub fn stream_url(&self, track_id: TrackId, client_id: Option<&str>) -> String {
        match client_id {
            Some(client_id) => {
                format!("{}/{}?client_id={}", self.stream_base, track_id, client_id)
            }
            None => format!("{}/{}", self.stream_base, track_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_client() -> ApiClient {
        let config = AppConfig {
            api_base: "https://api.example.com/v2/".to_string(),
            stream_base: "https://api.example.com/v2/stream/".to_string(),
            ..AppConfig::default()
        };
        ApiClient::new(Client::new(), &config)
    }

    #[test]
    fn stream_url_without_session() {
        let api = test_client();
        assert_eq!(
            api.stream_url(144, None),
            "https://api.example.com/v2/stream/144"
        );
    }

    #[test]
    fn stream_url_with_session_appends_client_id() {
        let api = test_client();
        assert_eq!(
            api.stream_url(144, Some("abc123")),
            "https://api.example.com/v2/stream/144?client_id=abc123"
        );
    }

    #[test]
    fn track_deserializes_with_optional_fields_missing() {
        let raw = r#"{
            "id": 5,
            "title": "Night Drive",
            "artist": "Mora",
            "duration": 214.0,
            "cover": "https://img.example.com/5.png",
            "creator_id": 12
        }"#;
        let track: Track = serde_json::from_str(raw).unwrap();
        assert_eq!(track.id, 5);
        assert!(track.album.is_none());
        assert!(track.images.small.is_none());
    }

    #[test]
    fn player_track_exposes_user_counts_only_when_present() {
        let track: Track = serde_json::from_str(
            r#"{"id":1,"title":"t","artist":"a","duration":10.0,"cover":"c","creator_id":2}"#,
        )
        .unwrap();
        let bare = PlayerTrack::Bare(track.clone());
        assert!(bare.user_counts().is_none());

        let counted = PlayerTrack::WithUserCounts(TrackWithUserCounts {
            track,
            favorite: true,
            plays: 4,
        });
        assert_eq!(counted.user_counts(), Some((true, 4)));
    }
}

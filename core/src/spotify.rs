use crate::auth::Credential;
use crate::models::{RecommendedTrack, SeedSet};
use crate::recommend::{MusicApi, RecommendError};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rspotify::{
    model::{ArtistId, RecommendationsAttribute, SimplifiedTrack, TimeRange, TrackId},
    prelude::*,
    AuthCodeSpotify, Token,
};
use serde::Deserialize;

const OP_TOP_TRACKS: &str = "top tracks";
const OP_TOP_ARTISTS: &str = "top artists";
const OP_GENRE_SEEDS: &str = "genre seeds";
const OP_RECOMMENDATIONS: &str = "recommendations";

/// rspotify has no binding for the available-genre-seeds endpoint, so it is
/// fetched directly with the session bearer token.
const GENRE_SEEDS_ENDPOINT: &str =
    "https://api.spotify.com/v1/recommendations/available-genre-seeds";

/// Spotify-backed [`MusicApi`] bound to one session credential.
pub struct SpotifyClient {
    spotify: AuthCodeSpotify,
    http: reqwest::Client,
    bearer: String,
}

impl SpotifyClient {
    pub fn new(credential: &Credential) -> Self {
        // The local expiry is a placeholder; the token is treated as valid
        // until the remote side rejects it with a 401.
        let token = Token {
            access_token: credential.bearer().to_string(),
            expires_in: Duration::seconds(3600),
            expires_at: Some(Utc::now() + Duration::seconds(3600)),
            ..Default::default()
        };

        Self {
            spotify: AuthCodeSpotify::from_token(token),
            http: reqwest::Client::new(),
            bearer: credential.bearer().to_string(),
        }
    }
}

/// A 401 means the bearer token is no longer accepted; everything else is
/// an upstream failure named after the attempted operation.
fn upstream(operation: &'static str, err: rspotify::ClientError) -> RecommendError {
    let message = err.to_string();
    if message.contains("401") {
        RecommendError::AuthRequired
    } else {
        RecommendError::Upstream { operation, message }
    }
}

fn normalize(track: SimplifiedTrack) -> RecommendedTrack {
    let artists: Vec<String> = track.artists.iter().map(|a| a.name.clone()).collect();
    let uri = track
        .id
        .as_ref()
        .map(|id| id.uri())
        .unwrap_or_default();
    RecommendedTrack::new(track.name, &artists, uri)
}

#[derive(Deserialize)]
struct GenreSeedsResponse {
    genres: Vec<String>,
}

#[async_trait]
impl MusicApi for SpotifyClient {
    async fn top_tracks(&self, limit: u32) -> Result<Vec<String>, RecommendError> {
        let page = self
            .spotify
            .current_user_top_tracks_manual(Some(TimeRange::MediumTerm), Some(limit), Some(0))
            .await
            .map_err(|e| upstream(OP_TOP_TRACKS, e))?;

        Ok(page
            .items
            .into_iter()
            .filter_map(|track| track.id.map(|id| id.uri()))
            .collect())
    }

    async fn top_artists(&self, limit: u32) -> Result<Vec<String>, RecommendError> {
        let page = self
            .spotify
            .current_user_top_artists_manual(Some(TimeRange::MediumTerm), Some(limit), Some(0))
            .await
            .map_err(|e| upstream(OP_TOP_ARTISTS, e))?;

        Ok(page
            .items
            .into_iter()
            .map(|artist| artist.id.id().to_string())
            .collect())
    }

    async fn genre_seeds(&self) -> Result<Vec<String>, RecommendError> {
        let response = self
            .http
            .get(GENRE_SEEDS_ENDPOINT)
            .bearer_auth(&self.bearer)
            .send()
            .await
            .map_err(|e| RecommendError::Upstream {
                operation: OP_GENRE_SEEDS,
                message: e.to_string(),
            })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(RecommendError::AuthRequired);
        }

        let body: GenreSeedsResponse = response
            .error_for_status()
            .map_err(|e| RecommendError::Upstream {
                operation: OP_GENRE_SEEDS,
                message: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| RecommendError::Upstream {
                operation: OP_GENRE_SEEDS,
                message: e.to_string(),
            })?;

        Ok(body.genres)
    }

    async fn recommendations(
        &self,
        seeds: &SeedSet,
        limit: u32,
    ) -> Result<Vec<RecommendedTrack>, RecommendError> {
        let attributes: Vec<RecommendationsAttribute> = Vec::new();
        let bad_id = |e: rspotify::model::IdError| RecommendError::Upstream {
            operation: OP_RECOMMENDATIONS,
            message: e.to_string(),
        };

        let result = match seeds {
            SeedSet::Tracks(uris) => {
                let ids = uris
                    .iter()
                    .map(|uri| TrackId::from_id_or_uri(uri))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(bad_id)?;
                self.spotify
                    .recommendations(
                        attributes,
                        None::<Vec<ArtistId>>,
                        None::<Vec<&str>>,
                        Some(ids),
                        None,
                        Some(limit),
                    )
                    .await
            }
            SeedSet::Artists(artist_ids) => {
                let ids = artist_ids
                    .iter()
                    .map(|id| ArtistId::from_id_or_uri(id))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(bad_id)?;
                self.spotify
                    .recommendations(
                        attributes,
                        Some(ids),
                        None::<Vec<&str>>,
                        None::<Vec<TrackId>>,
                        None,
                        Some(limit),
                    )
                    .await
            }
            SeedSet::Genre(genre) => {
                self.spotify
                    .recommendations(
                        attributes,
                        None::<Vec<ArtistId>>,
                        Some(vec![genre.as_str()]),
                        None::<Vec<TrackId>>,
                        None,
                        Some(limit),
                    )
                    .await
            }
        };

        let recommendations = result.map_err(|e| upstream(OP_RECOMMENDATIONS, e))?;
        Ok(recommendations.tracks.into_iter().map(normalize).collect())
    }
}

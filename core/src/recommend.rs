use crate::models::{Recommendation, RecommendedTrack, SeedSet, Selection};
use async_trait::async_trait;
use log::debug;
use rand::seq::SliceRandom;
use std::sync::Arc;
use thiserror::Error;

/// Lower/upper bound on the user-chosen result count.
pub const MIN_COUNT: u32 = 1;
pub const MAX_COUNT: u32 = 20;

/// Seed lists are capped at 5 entries by the remote API tier in use.
pub const TOP_SEED_LIMIT: u32 = 5;

#[derive(Error, Debug)]
pub enum RecommendError {
    #[error("Count must be between 1 and 20, got {0}")]
    InvalidCount(u32),
    #[error("Spotify '{operation}' call failed: {message}")]
    Upstream {
        operation: &'static str,
        message: String,
    },
    #[error("Bearer token rejected; re-authentication required")]
    AuthRequired,
    #[error("No {0} available to seed recommendations")]
    NoSeeds(&'static str),
}

/// Read-only port onto the remote catalog and the user's listening history.
///
/// The implementation owns the session credential; nothing behind this
/// trait reads the environment at call time. Failures carry the attempted
/// operation's name and are never retried here.
#[async_trait]
pub trait MusicApi: Send + Sync {
    /// URIs of the user's most-listened tracks, at most `limit`.
    async fn top_tracks(&self, limit: u32) -> Result<Vec<String>, RecommendError>;

    /// IDs of the user's most-listened artists, at most `limit`.
    async fn top_artists(&self, limit: u32) -> Result<Vec<String>, RecommendError>;

    /// The full catalog genre seed list.
    async fn genre_seeds(&self) -> Result<Vec<String>, RecommendError>;

    /// Recommendations anchored on the one populated seed category,
    /// bounded by `limit`, in remote order.
    async fn recommendations(
        &self,
        seeds: &SeedSet,
        limit: u32,
    ) -> Result<Vec<RecommendedTrack>, RecommendError>;
}

/// Rejects counts outside `[MIN_COUNT, MAX_COUNT]` before any remote call.
pub fn validate_count(count: u32) -> Result<(), RecommendError> {
    if !(MIN_COUNT..=MAX_COUNT).contains(&count) {
        return Err(RecommendError::InvalidCount(count));
    }
    Ok(())
}

pub struct Recommender {
    api: Arc<dyn MusicApi>,
}

impl Recommender {
    pub fn new(api: Arc<dyn MusicApi>) -> Self {
        Self { api }
    }

    /// Fetches the catalog genre list and draws one uniformly at random.
    pub async fn draw_random_genre(&self) -> Result<String, RecommendError> {
        let genres = self.api.genre_seeds().await?;
        genres
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(RecommendError::NoSeeds("genres"))
    }

    /// Resolves a selection into a concrete seed payload.
    ///
    /// Top tracks/artists are capped at [`TOP_SEED_LIMIT`] by the remote
    /// API tier; a `Genre` selection must already carry a concrete genre.
    pub async fn build_seed_set(&self, selection: &Selection) -> Result<SeedSet, RecommendError> {
        match selection {
            Selection::TopTracks => {
                let uris = self.api.top_tracks(TOP_SEED_LIMIT).await?;
                if uris.is_empty() {
                    return Err(RecommendError::NoSeeds("top tracks"));
                }
                Ok(SeedSet::Tracks(uris))
            }
            Selection::TopArtists => {
                let ids = self.api.top_artists(TOP_SEED_LIMIT).await?;
                if ids.is_empty() {
                    return Err(RecommendError::NoSeeds("top artists"));
                }
                Ok(SeedSet::Artists(ids))
            }
            Selection::Genre(genre) => Ok(SeedSet::Genre(genre.clone())),
        }
    }

    /// Calls the recommendation endpoint with the populated seed category.
    ///
    /// `count` outside `[1, 20]` is rejected before the call is made. The
    /// result is truncated to `count`; the remote service may return fewer
    /// but never more.
    pub async fn recommend(
        &self,
        seeds: &SeedSet,
        count: u32,
    ) -> Result<Recommendation, RecommendError> {
        validate_count(count)?;

        let mut tracks = self.api.recommendations(seeds, count).await?;
        tracks.truncate(count as usize);

        debug!(
            "{} recommendations from {} seeds",
            tracks.len(),
            seeds.category()
        );
        Ok(Recommendation::new(tracks))
    }

    /// Single entry point for callers: classify, resolve the seed set
    /// (drawing a random genre when classification fell through and the
    /// text names no catalog genre), then recommend.
    pub async fn resolve_and_recommend(
        &self,
        raw_selection: &str,
        count: u32,
    ) -> Result<Recommendation, RecommendError> {
        validate_count(count)?;

        let selection = match Selection::classify(raw_selection) {
            Selection::Genre(candidate) => Selection::Genre(self.resolve_genre(&candidate).await?),
            selection => selection,
        };
        debug!("'{}' classified as {}", raw_selection, selection);

        let seeds = self.build_seed_set(&selection).await?;
        self.recommend(&seeds, count).await
    }

    /// Keeps the candidate when it names a catalog genre (case-insensitive),
    /// otherwise draws one uniformly at random from the same fetched list.
    async fn resolve_genre(&self, candidate: &str) -> Result<String, RecommendError> {
        let genres = self.api.genre_seeds().await?;

        if let Some(genre) = genres.iter().find(|g| g.eq_ignore_ascii_case(candidate)) {
            return Ok(genre.clone());
        }

        genres
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(RecommendError::NoSeeds("genres"))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::StubApi;
    use super::*;
    use std::sync::atomic::Ordering;

    fn recommender(api: StubApi) -> (Recommender, Arc<StubApi>) {
        let api = Arc::new(api);
        (Recommender::new(api.clone()), api)
    }

    #[tokio::test]
    async fn test_count_below_range_rejected_before_any_call() {
        let (rec, api) = recommender(StubApi::default());

        let result = rec.resolve_and_recommend("Based on my top tracks", 0).await;

        assert!(matches!(result, Err(RecommendError::InvalidCount(0))));
        assert_eq!(api.calls.total(), 0);
    }

    #[tokio::test]
    async fn test_count_above_range_rejected_before_any_call() {
        let (rec, api) = recommender(StubApi::default());

        let result = rec.resolve_and_recommend("Surprise Me!", 21).await;

        assert!(matches!(result, Err(RecommendError::InvalidCount(21))));
        assert_eq!(api.calls.total(), 0);
    }

    #[tokio::test]
    async fn test_top_tracks_scenario_seeds_five_and_returns_five() {
        let (rec, api) = recommender(StubApi::default());

        let result = rec
            .resolve_and_recommend("Based on my top tracks", 5)
            .await
            .unwrap();

        assert_eq!(result.len(), 5);
        assert_eq!(api.calls.top_tracks.load(Ordering::SeqCst), 1);
        assert_eq!(api.calls.genre_seeds.load(Ordering::SeqCst), 0);

        let (seeds, limit) = api.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(limit, 5);
        match seeds {
            SeedSet::Tracks(uris) => assert_eq!(uris.len(), TOP_SEED_LIMIT as usize),
            other => panic!("expected track seeds, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_top_artists_selection_uses_artist_seeds() {
        let (rec, api) = recommender(StubApi::default());

        rec.resolve_and_recommend("Based on my top artists", 10)
            .await
            .unwrap();

        assert_eq!(api.calls.top_artists.load(Ordering::SeqCst), 1);
        let (seeds, _) = api.last_request.lock().unwrap().clone().unwrap();
        assert!(matches!(seeds, SeedSet::Artists(ids) if ids.len() == 5));
    }

    #[tokio::test]
    async fn test_surprise_me_draws_one_genre_from_catalog() {
        let api = StubApi {
            genres: vec!["jazz".to_string()],
            ..Default::default()
        };
        let (rec, api) = recommender(api);

        let result = rec.resolve_and_recommend("Surprise Me!", 3).await.unwrap();

        assert_eq!(result.len(), 3);
        assert_eq!(api.calls.genre_seeds.load(Ordering::SeqCst), 1);

        let (seeds, limit) = api.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(limit, 3);
        assert_eq!(seeds, SeedSet::Genre("jazz".to_string()));
    }

    #[tokio::test]
    async fn test_explicit_genre_is_kept_not_redrawn() {
        let (rec, api) = recommender(StubApi::default());

        rec.resolve_and_recommend("Jazz", 4).await.unwrap();

        // Case-insensitive match against the catalog keeps the explicit
        // genre in catalog casing instead of drawing a random one.
        let (seeds, _) = api.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(seeds, SeedSet::Genre("jazz".to_string()));
    }

    #[tokio::test]
    async fn test_recommend_returns_at_most_count() {
        let api = StubApi {
            available: Some(30),
            ..Default::default()
        };
        let (rec, _) = recommender(api);

        let result = rec
            .recommend(&SeedSet::Genre("jazz".to_string()), 4)
            .await
            .unwrap();
        assert_eq!(result.len(), 4);
    }

    #[tokio::test]
    async fn test_recommend_tolerates_fewer_than_count() {
        let api = StubApi {
            available: Some(2),
            ..Default::default()
        };
        let (rec, _) = recommender(api);

        let result = rec
            .recommend(&SeedSet::Genre("jazz".to_string()), 10)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_listening_history_is_no_seeds() {
        struct EmptyApi;

        #[async_trait]
        impl MusicApi for EmptyApi {
            async fn top_tracks(&self, _limit: u32) -> Result<Vec<String>, RecommendError> {
                Ok(Vec::new())
            }
            async fn top_artists(&self, _limit: u32) -> Result<Vec<String>, RecommendError> {
                Ok(Vec::new())
            }
            async fn genre_seeds(&self) -> Result<Vec<String>, RecommendError> {
                Ok(Vec::new())
            }
            async fn recommendations(
                &self,
                _seeds: &SeedSet,
                _limit: u32,
            ) -> Result<Vec<RecommendedTrack>, RecommendError> {
                panic!("recommendations must not be called without seeds");
            }
        }

        let rec = Recommender::new(Arc::new(EmptyApi));

        let result = rec.build_seed_set(&Selection::TopTracks).await;
        assert!(matches!(result, Err(RecommendError::NoSeeds("top tracks"))));

        let result = rec.draw_random_genre().await;
        assert!(matches!(result, Err(RecommendError::NoSeeds("genres"))));
    }

    #[tokio::test]
    async fn test_draw_random_genre_comes_from_catalog() {
        let (rec, api) = recommender(StubApi::default());

        let genre = rec.draw_random_genre().await.unwrap();

        assert!(api.genres.contains(&genre));
        assert_eq!(api.calls.genre_seeds.load(Ordering::SeqCst), 1);
    }
}

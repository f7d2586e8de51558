//! Tool registry and the three recommendation tools.
//!
//! Each tool is a zero-argument action bound to one fixed seeding strategy.
//! Tools cap their own recommendation call at [`MAX_COUNT`]; trimming to
//! the user's requested count is the model's job.

use crate::models::{Recommendation, Selection};
use crate::recommend::{Recommender, MAX_COUNT};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A named action the reasoning loop may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    /// Shown to the model so it can pick the right tool.
    fn description(&self) -> &str;

    async fn execute(&self, args: Value) -> Result<String, String>;
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// `(name, description)` pairs, sorted by name so the prompt built
    /// from them is stable between runs.
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        let mut descriptions: Vec<(String, String)> = self
            .tools
            .iter()
            .map(|(name, tool)| (name.clone(), tool.description().to_string()))
            .collect();
        descriptions.sort();
        descriptions
    }
}

fn format_lines(recommendation: &Recommendation) -> String {
    recommendation
        .tracks
        .iter()
        .map(|t| t.display_name.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Recommends songs seeded by the user's most-listened tracks.
pub struct TopTracksTool {
    recommender: Arc<Recommender>,
}

impl TopTracksTool {
    pub fn new(recommender: Arc<Recommender>) -> Self {
        Self { recommender }
    }
}

#[async_trait]
impl Tool for TopTracksTool {
    fn name(&self) -> &str {
        "top_tracks_recommendations"
    }

    fn description(&self) -> &str {
        "Fetches the user's top tracks from Spotify and recommends songs based on them. Takes no arguments."
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        let seeds = self
            .recommender
            .build_seed_set(&Selection::TopTracks)
            .await
            .map_err(|e| e.to_string())?;
        let recommendation = self
            .recommender
            .recommend(&seeds, MAX_COUNT)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format_lines(&recommendation))
    }
}

/// Recommends songs seeded by the user's most-listened artists.
pub struct TopArtistsTool {
    recommender: Arc<Recommender>,
}

impl TopArtistsTool {
    pub fn new(recommender: Arc<Recommender>) -> Self {
        Self { recommender }
    }
}

#[async_trait]
impl Tool for TopArtistsTool {
    fn name(&self) -> &str {
        "top_artists_recommendations"
    }

    fn description(&self) -> &str {
        "Fetches the user's top artists from Spotify and recommends songs based on them. Takes no arguments."
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        let seeds = self
            .recommender
            .build_seed_set(&Selection::TopArtists)
            .await
            .map_err(|e| e.to_string())?;
        let recommendation = self
            .recommender
            .recommend(&seeds, MAX_COUNT)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format_lines(&recommendation))
    }
}

/// Draws a random catalog genre and recommends songs from it. The first
/// output line names the genre so the final answer can repeat it.
pub struct GenreTool {
    recommender: Arc<Recommender>,
}

impl GenreTool {
    pub fn new(recommender: Arc<Recommender>) -> Self {
        Self { recommender }
    }
}

#[async_trait]
impl Tool for GenreTool {
    fn name(&self) -> &str {
        "random_genre_recommendations"
    }

    fn description(&self) -> &str {
        "Picks a random genre from Spotify's catalog and recommends songs from it. Takes no arguments."
    }

    async fn execute(&self, _args: Value) -> Result<String, String> {
        let genre = self
            .recommender
            .draw_random_genre()
            .await
            .map_err(|e| e.to_string())?;
        let recommendation = self
            .recommender
            .recommend(&crate::models::SeedSet::Genre(genre.clone()), MAX_COUNT)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!("Genre: {}\n{}", genre, format_lines(&recommendation)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::testing::StubApi;
    use serde_json::json;

    fn recommender() -> Arc<Recommender> {
        Arc::new(Recommender::new(Arc::new(StubApi::default())))
    }

    #[tokio::test]
    async fn test_top_tracks_tool_emits_one_line_per_track() {
        let tool = TopTracksTool::new(recommender());

        let output = tool.execute(json!({})).await.unwrap();

        assert_eq!(output.lines().count(), MAX_COUNT as usize);
        assert!(output.lines().next().unwrap().contains(" - "));
    }

    #[tokio::test]
    async fn test_genre_tool_names_the_drawn_genre() {
        let api = StubApi {
            genres: vec!["jazz".to_string()],
            ..Default::default()
        };
        let tool = GenreTool::new(Arc::new(Recommender::new(Arc::new(api))));

        let output = tool.execute(json!({})).await.unwrap();

        assert!(output.starts_with("Genre: jazz\n"));
    }

    #[tokio::test]
    async fn test_registry_lookup_and_stable_ordering() {
        let recommender = recommender();
        let mut registry = ToolRegistry::new();
        registry.register(TopTracksTool::new(recommender.clone()));
        registry.register(TopArtistsTool::new(recommender.clone()));
        registry.register(GenreTool::new(recommender));

        assert!(registry.get("top_tracks_recommendations").is_some());
        assert!(registry.get("no_such_tool").is_none());
        assert_eq!(
            registry.tool_names(),
            vec![
                "random_genre_recommendations",
                "top_artists_recommendations",
                "top_tracks_recommendations",
            ]
        );
    }
}

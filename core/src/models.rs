/*
    spotify-recs-rs | Rust CLI tool to generate Spotify track recommendations.
    Copyright (C) 2025  spotify-recs-rs contributors

    This program is free software: you can redistribute it and/or modify
    it under the terms of the GNU Affero General Public License as published
    by the Free Software Foundation, either version 3 of the License, or
    (at your option) any later version.

    This program is distributed in the hope that it will be useful,
    but WITHOUT ANY WARRANTY; without even the implied warranty of
    MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
    GNU Affero General Public License for more details.

    You should have received a copy of the GNU Affero General Public License
    along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the user asked their recommendations to be based on.
///
/// Produced from free-form text by [`Selection::classify`]. A `Genre`
/// produced by classification carries the raw text as a genre candidate;
/// the resolver matches it against the catalog (or replaces it with a
/// random draw) before it is used as a seed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    TopTracks,
    TopArtists,
    Genre(String),
}

impl Selection {
    /// Classifies free-form selection text.
    ///
    /// Ordered, case-insensitive substring priority: "tracks" wins over
    /// "artists", anything else falls through to the genre branch. No
    /// fuzzy matching.
    pub fn classify(raw: &str) -> Selection {
        let lowered = raw.to_lowercase();
        if lowered.contains("tracks") {
            Selection::TopTracks
        } else if lowered.contains("artists") {
            Selection::TopArtists
        } else {
            Selection::Genre(raw.trim().to_string())
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::TopTracks => write!(f, "top tracks"),
            Selection::TopArtists => write!(f, "top artists"),
            Selection::Genre(genre) => write!(f, "genre '{}'", genre),
        }
    }
}

/// Seed payload for a recommendation call: exactly one populated category.
///
/// Track seeds are Spotify URIs, artist seeds are Spotify IDs, a genre seed
/// is a single catalog genre name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedSet {
    Tracks(Vec<String>),
    Artists(Vec<String>),
    Genre(String),
}

impl SeedSet {
    /// Name of the populated seed category, for logs and error messages.
    pub fn category(&self) -> &'static str {
        match self {
            SeedSet::Tracks(_) => "tracks",
            SeedSet::Artists(_) => "artists",
            SeedSet::Genre(_) => "genre",
        }
    }
}

/// A single recommended track, normalized for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendedTrack {
    pub display_name: String,
    pub uri: String,
}

impl RecommendedTrack {
    /// Builds the display name as `"{title} - {artist1, artist2, ...}"`,
    /// artists joined in the order the remote API returned them.
    pub fn new(title: impl Into<String>, artists: &[String], uri: impl Into<String>) -> Self {
        let title = title.into();
        let display_name = if artists.is_empty() {
            title
        } else {
            format!("{} - {}", title, artists.join(", "))
        };
        Self {
            display_name,
            uri: uri.into(),
        }
    }
}

impl fmt::Display for RecommendedTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name)
    }
}

/// Ordered recommendation result, at most the requested count.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub tracks: Vec<RecommendedTrack>,
}

impl Recommendation {
    pub fn new(tracks: Vec<RecommendedTrack>) -> Self {
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Outcome of a single agent invocation.
///
/// `tools_invoked` records which tools the model chose, in call order, so
/// the otherwise opaque reasoning step stays observable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTurn {
    pub narrative: String,
    pub tools_invoked: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_tracks_wins_regardless_of_other_words() {
        assert_eq!(
            Selection::classify("Based on my top tracks"),
            Selection::TopTracks
        );
        assert_eq!(
            Selection::classify("my favourite artists and tracks"),
            Selection::TopTracks
        );
        assert_eq!(Selection::classify("TRACKS please"), Selection::TopTracks);
    }

    #[test]
    fn test_classify_artists_without_tracks() {
        assert_eq!(
            Selection::classify("Based on my top artists"),
            Selection::TopArtists
        );
        assert_eq!(Selection::classify("Top ARTISTS"), Selection::TopArtists);
    }

    #[test]
    fn test_classify_falls_through_to_genre() {
        assert_eq!(
            Selection::classify("Surprise Me!"),
            Selection::Genre("Surprise Me!".to_string())
        );
        assert_eq!(
            Selection::classify("  jazz  "),
            Selection::Genre("jazz".to_string())
        );
    }

    #[test]
    fn test_display_name_joins_artists_in_order() {
        let track = RecommendedTrack::new(
            "Song A",
            &["Artist X".to_string(), "Artist Y".to_string()],
            "spotify:track:abc",
        );
        assert_eq!(track.display_name, "Song A - Artist X, Artist Y");
    }

    #[test]
    fn test_display_name_without_artists_is_bare_title() {
        let track = RecommendedTrack::new("Song A", &[], "spotify:track:abc");
        assert_eq!(track.display_name, "Song A");
    }

    #[test]
    fn test_seed_set_category() {
        assert_eq!(SeedSet::Tracks(vec![]).category(), "tracks");
        assert_eq!(SeedSet::Genre("jazz".to_string()).category(), "genre");
    }
}
